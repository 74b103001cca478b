use crate::{Result, Value};
use std::{future::Future, sync::Arc};

/// Name and declared type of one column, `kind` is a typed null (or `Value::Null` when the driver
/// does not report types).
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDesc {
    pub name: String,
    pub kind: Value,
}

impl ColumnDesc {
    pub fn new(name: impl Into<String>, kind: Value) -> Self {
        Self {
            name: name.into(),
            kind: kind.as_null(),
        }
    }
}

/// Columns of the current result set, in order.
pub type RowShape = Arc<[ColumnDesc]>;

/// One row, aligned with the [`RowShape`] it was read from.
pub type Row = Box<[Value]>;

/// Blocking reader over the result sets produced by one executed command.
pub trait RowSource {
    /// Columns of the current result set.
    fn shape(&self) -> RowShape;
    /// Next row of the current result set, `None` once it is exhausted.
    fn next_row(&mut self) -> Result<Option<Row>>;
    /// Skips what is left of the current result set and moves to the next one, returns `false`
    /// when there is none.
    fn next_result(&mut self) -> Result<bool>;
    /// Asks the database to stop producing rows.
    fn cancel(&mut self) {}
    /// Releases the command and the connection.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Suspend capable counterpart of [`RowSource`].
pub trait AsyncRowSource: Send {
    fn shape(&self) -> RowShape;
    fn next_row(&mut self) -> impl Future<Output = Result<Option<Row>>> + Send;
    fn next_result(&mut self) -> impl Future<Output = Result<bool>> + Send;
    fn cancel(&mut self) {}
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }
}

/// What identifies the command a result came from: its text and the connection string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandIdentity {
    pub sql: Arc<str>,
    pub connection: Arc<str>,
}

impl CommandIdentity {
    pub fn new(sql: impl Into<Arc<str>>, connection: impl Into<Arc<str>>) -> Self {
        Self {
            sql: sql.into(),
            connection: connection.into(),
        }
    }
}
