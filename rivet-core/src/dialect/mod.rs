mod access;
mod duckdb;
mod firebird;
mod mysql;
mod oracle;
mod postgres;
mod registry;
mod sql_parts;
mod sqlite;
mod sqlserver;

pub use access::*;
pub use duckdb::*;
pub use firebird::*;
pub use mysql::*;
pub use oracle::*;
pub use postgres::*;
pub use registry::*;
pub use sql_parts::*;
pub use sqlite::*;
pub use sqlserver::*;

use crate::{FieldFlags, MappingError, Result, Value, separated_by};
use rust_decimal::Decimal;
use std::fmt::{self, Debug};

/// How a bound value should be typed by the driver.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ParamHint {
    #[default]
    None,
    /// Non unicode string.
    AnsiString,
    /// Date time with the wide range and precision.
    WideDateTime,
}

impl From<FieldFlags> for ParamHint {
    fn from(flags: FieldFlags) -> Self {
        if flags.ansi {
            ParamHint::AnsiString
        } else if flags.wide_datetime {
            ParamHint::WideDateTime
        } else {
            ParamHint::None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub value: Value,
    pub hint: ParamHint,
}

impl From<Value> for Param {
    fn from(value: Value) -> Self {
        Self {
            value,
            hint: ParamHint::None,
        }
    }
}

/// SQL text and the parameters its placeholders refer to, in placeholder order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Command {
    pub sql: String,
    pub params: Vec<Param>,
}

impl Command {
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.params.iter().map(|p| &p.value)
    }
}

/// How the key generated by an insert reaches the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRetrieval {
    /// No key is generated.
    None,
    /// The insert itself returns a row holding the key.
    Row,
    /// Run this query on the same connection right after the insert.
    FollowUp(&'static str),
    /// Read the output parameter with this name.
    OutParam(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertCommand {
    pub command: Command,
    pub key: KeyRetrieval,
}

/// Collects the parameters of a command while its text is written.
pub struct Bindings<'a> {
    dialect: &'a dyn Dialect,
    prefix: &'static str,
    params: Vec<Param>,
}

impl<'a> Bindings<'a> {
    pub fn new(dialect: &'a dyn Dialect, connection: &str) -> Self {
        Self {
            dialect,
            prefix: dialect.param_prefix(connection),
            params: Vec::new(),
        }
    }

    /// Parameters the caller already refers to in its SQL, as `{prefix}0`, `{prefix}1`...
    pub fn with_args(mut self, args: impl IntoIterator<Item = Value>) -> Self {
        for value in args {
            let value = self.dialect.normalize(value);
            self.params.push(value.into());
        }
        self
    }

    /// Binds `value` and writes its placeholder.
    pub fn push(&mut self, out: &mut String, value: Value, hint: ParamHint) {
        self.dialect
            .write_placeholder(out, self.prefix, self.params.len());
        self.params.push(Param {
            value: self.dialect.normalize(value),
            hint,
        });
    }

    pub fn placeholder(&mut self, value: Value, hint: ParamHint) -> String {
        let mut out = String::new();
        self.push(&mut out, value, hint);
        out
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn into_command(self, sql: String) -> Command {
        Command {
            sql,
            params: self.params,
        }
    }
}

/// Parts of an insert statement, identifiers already escaped.
#[derive(Debug)]
pub struct InsertParts<'a> {
    pub table: &'a str,
    pub columns: &'a [String],
    /// Placeholders or expressions, one per column.
    pub values: &'a [String],
    /// Primary key column to retrieve, when the database generates it.
    pub key: Option<&'a str>,
}

/// SQL strategy of one database product.
///
/// Implementations are stateless, one instance is shared by every command built for a database.
pub trait Dialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Quote an identifier ("name") doubling inner quotes.
    fn write_identifier(&self, out: &mut String, name: &str) {
        write_quoted(out, name, '"', '"');
    }

    /// Quote every part of a possibly schema qualified name.
    fn write_table_name(&self, out: &mut String, name: &str) {
        separated_by(out, name.split('.'), |out, v| self.write_identifier(out, v), ".");
    }

    fn escape(&self, name: &str) -> String {
        let mut out = String::with_capacity(name.len() + 2);
        self.write_identifier(&mut out, name);
        out
    }

    fn escape_table(&self, name: &str) -> String {
        let mut out = String::with_capacity(name.len() + 2);
        self.write_table_name(&mut out, name);
        out
    }

    /// Parameter prefix, some drivers decide it from the connection string.
    fn param_prefix(&self, _connection: &str) -> &'static str {
        "@"
    }

    /// Placeholder of the parameter at `index`, zero based.
    fn write_placeholder(&self, out: &mut String, prefix: &str, index: usize) {
        let mut buffer = itoa::Buffer::new();
        out.push_str(prefix);
        out.push_str(buffer.format(index));
    }

    /// Adjusts a value the driver cannot bind as is.
    fn normalize(&self, value: Value) -> Value {
        value
    }

    /// Ordering used by a window function when the query has none.
    fn default_order_by(&self) -> &'static str {
        "ORDER BY (SELECT NULL)"
    }

    /// Rewrites the statement to return the rows from `skip` to `skip + take`.
    fn write_paged(
        &self,
        out: &mut String,
        parts: &SqlParts,
        skip: u64,
        take: u64,
        bindings: &mut Bindings,
    ) -> Result<()> {
        write_limit_offset(out, parts, skip, take, bindings);
        Ok(())
    }

    /// Template with the table as `{0}` and the condition as `{1}`, selecting 1 or 0.
    fn exists_template(&self) -> &'static str {
        "SELECT EXISTS (SELECT 1 FROM {0} WHERE {1})"
    }

    /// Expression producing the next value of a sequence.
    fn write_sequence_next(&self, out: &mut String, sequence: &str) {
        out.push_str("NEXT VALUE FOR ");
        out.push_str(sequence);
    }

    /// Written between the column list and VALUES.
    fn write_insert_output(&self, _out: &mut String, _key: &str) {}

    /// Written after the values.
    fn write_insert_returning(&self, _out: &mut String, _key: &str) {}

    fn key_retrieval(&self) -> KeyRetrieval;

    fn write_insert(&self, out: &mut String, insert: &InsertParts) -> KeyRetrieval {
        out.push_str("INSERT INTO ");
        out.push_str(insert.table);
        if !insert.columns.is_empty() {
            out.push_str(" (");
            out.push_str(&insert.columns.join(", "));
            out.push(')');
        }
        if let Some(key) = insert.key {
            self.write_insert_output(out, key);
        }
        if insert.columns.is_empty() {
            out.push_str(" DEFAULT VALUES");
        } else {
            out.push_str(" VALUES (");
            out.push_str(&insert.values.join(", "));
            out.push(')');
        }
        match insert.key {
            Some(key) => {
                self.write_insert_returning(out, key);
                self.key_retrieval()
            }
            None => KeyRetrieval::None,
        }
    }
}

impl Debug for dyn Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub(crate) fn write_quoted(out: &mut String, value: &str, open: char, close: char) {
    out.push(open);
    for c in value.chars() {
        if c == close {
            out.push(close);
        }
        out.push(c);
    }
    out.push(close);
}

fn count(value: u64) -> Value {
    Value::Int64(Some(i64::try_from(value).unwrap_or(i64::MAX)))
}

/// `sql LIMIT take OFFSET skip`
pub(crate) fn write_limit_offset(
    out: &mut String,
    parts: &SqlParts,
    skip: u64,
    take: u64,
    bindings: &mut Bindings,
) {
    out.push_str(parts.sql());
    out.push_str("\nLIMIT ");
    bindings.push(out, count(take), ParamHint::None);
    out.push_str(" OFFSET ");
    bindings.push(out, count(skip), ParamHint::None);
}

/// `sql OFFSET skip ROWS FETCH NEXT take ROWS ONLY`, the statement needs an ORDER BY.
pub(crate) fn write_offset_fetch(
    out: &mut String,
    dialect: &dyn Dialect,
    parts: &SqlParts,
    skip: u64,
    take: u64,
    bindings: &mut Bindings,
) {
    if take == 0 {
        // FETCH NEXT 0 ROWS is rejected
        write_empty(out, parts);
        return;
    }
    out.push_str(parts.sql());
    if parts.order_by().is_none() {
        out.push('\n');
        out.push_str(dialect.default_order_by());
    }
    out.push_str("\nOFFSET ");
    bindings.push(out, count(skip), ParamHint::None);
    out.push_str(" ROWS FETCH NEXT ");
    bindings.push(out, count(take), ParamHint::None);
    out.push_str(" ROWS ONLY");
}

/// Numbers the rows with a window function over the original ordering, the ordering moves into
/// the window and a DISTINCT select is wrapped first.
pub(crate) fn write_row_number(
    out: &mut String,
    dialect: &dyn Dialect,
    parts: &SqlParts,
    skip: u64,
    take: u64,
    bindings: &mut Bindings,
) {
    out.push_str("SELECT * FROM (SELECT ROW_NUMBER() OVER (");
    out.push_str(parts.order_by().unwrap_or(dialect.default_order_by()));
    out.push_str(") rivet_rn, ");
    if parts.is_distinct() {
        out.push_str("rivet_inner.* FROM (SELECT ");
        out.push_str(parts.select_removed());
        out.push_str(") rivet_inner");
    } else {
        out.push_str(parts.select_removed());
    }
    out.push_str(") rivet_paged WHERE rivet_rn > ");
    bindings.push(out, count(skip), ParamHint::None);
    out.push_str(" AND rivet_rn <= ");
    bindings.push(out, count(skip.saturating_add(take)), ParamHint::None);
    out.push_str("\nORDER BY rivet_rn");
}

/// `sql ROWS first TO last`, one based and inclusive.
pub(crate) fn write_rows_to(
    out: &mut String,
    parts: &SqlParts,
    skip: u64,
    take: u64,
    bindings: &mut Bindings,
) {
    if take == 0 {
        write_empty(out, parts);
        return;
    }
    out.push_str(parts.sql());
    out.push_str("\nROWS ");
    bindings.push(out, count(skip.saturating_add(1)), ParamHint::None);
    out.push_str(" TO ");
    bindings.push(out, count(skip.saturating_add(take)), ParamHint::None);
}

/// Same columns, no rows.
pub(crate) fn write_empty(out: &mut String, parts: &SqlParts) {
    out.push_str("SELECT * FROM (");
    out.push_str(parts.without_order_by());
    out.push_str(") rivet_empty WHERE 1 = 0");
}

pub(crate) fn reject_unaliased_wildcard(dialect: &dyn Dialect, parts: &SqlParts) -> Result<()> {
    if parts.columns().starts_with('*') {
        return Err(MappingError::UnaliasedWildcard {
            dialect: dialect.name(),
        }
        .into());
    }
    Ok(())
}

/// Booleans as 0 or 1.
pub(crate) fn bool_as_int(value: Value) -> Value {
    match value {
        Value::Boolean(v) => Value::Int32(v.map(i32::from)),
        v => v,
    }
}

/// Unsigned integers as the next wider signed type.
pub(crate) fn widen_unsigned(value: Value) -> Value {
    match value {
        Value::UInt8(v) => Value::Int16(v.map(i16::from)),
        Value::UInt16(v) => Value::Int32(v.map(i32::from)),
        Value::UInt32(v) => Value::Int64(v.map(i64::from)),
        Value::UInt64(v) => Value::Decimal(v.map(Decimal::from)),
        v => v,
    }
}

/// Uuids as their hyphenated text.
pub(crate) fn uuid_as_text(value: Value) -> Value {
    match value {
        Value::Uuid(v) => Value::Varchar(v.map(|v| v.hyphenated().to_string())),
        v => v,
    }
}
