use crate::{
    AsyncGridReader, AsyncRowSource, Bindings, Command, CommandIdentity, Dialect, DialectRegistry,
    Error, GridReader, InsertCommand, InsertParts, Mapper, Record, Result, RowSource, SqlParts,
    Value, fill_template, separated_by, starts_with_ignore_case, truncate_long,
};
use std::{
    fmt::{self, Debug},
    sync::Arc,
};

/// The row count and the page of a paged query.
#[derive(Debug, Clone, PartialEq)]
pub struct PagedCommands {
    pub count: Command,
    pub page: Command,
}

/// A database as seen by the mapping engine: its dialect, its connection string and the mapper.
///
/// Builds the commands the caller executes and the readers over their results.
#[derive(Clone)]
pub struct Provider {
    dialect: Arc<dyn Dialect>,
    connection: Arc<str>,
    mapper: Arc<Mapper>,
}

impl Provider {
    pub fn new(
        dialect: Arc<dyn Dialect>,
        connection: impl Into<Arc<str>>,
        mapper: Arc<Mapper>,
    ) -> Self {
        Self {
            dialect,
            connection: connection.into(),
            mapper,
        }
    }

    /// Picks the dialect from the driver name and the connection string.
    pub fn resolve(
        registry: &DialectRegistry,
        driver: &str,
        connection: impl Into<Arc<str>>,
        mapper: Arc<Mapper>,
    ) -> Self {
        let connection = connection.into();
        let dialect = registry.resolve(driver, &connection);
        Self::new(dialect, connection, mapper)
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub fn connection(&self) -> &str {
        &self.connection
    }

    pub fn mapper(&self) -> &Arc<Mapper> {
        &self.mapper
    }

    pub fn identity(&self, sql: &str) -> CommandIdentity {
        CommandIdentity::new(sql, self.connection.clone())
    }

    /// Reader over the result sets `source` produces for `sql`.
    pub fn grid<S: RowSource>(&self, sql: &str, source: S) -> GridReader<S> {
        GridReader::new(source, self.mapper.clone(), self.identity(sql))
    }

    pub fn grid_async<S: AsyncRowSource>(&self, sql: &str, source: S) -> AsyncGridReader<S> {
        AsyncGridReader::new(source, self.mapper.clone(), self.identity(sql))
    }

    fn bindings(&self) -> Bindings<'_> {
        Bindings::new(self.dialect.as_ref(), &self.connection)
    }

    /// Parameter placeholder at `index`, for callers writing their own SQL.
    pub fn placeholder(&self, index: usize) -> String {
        let mut out = String::new();
        self.dialect.write_placeholder(
            &mut out,
            self.dialect.param_prefix(&self.connection),
            index,
        );
        out
    }

    /// Binds `args` to `sql` as they are, after the dialect normalization.
    pub fn command(
        &self,
        sql: impl Into<String>,
        args: impl IntoIterator<Item = Value>,
    ) -> Command {
        self.bindings().with_args(args).into_command(sql.into())
    }

    /// Counts the rows of `sql` and rewrites it to return `take` rows after the first `skip`.
    ///
    /// `args` are the parameters `sql` already refers to, the paging parameters follow them.
    pub fn page(
        &self,
        skip: u64,
        take: u64,
        sql: &str,
        args: impl IntoIterator<Item = Value>,
    ) -> Result<PagedCommands> {
        let parts = SqlParts::parse(sql)?;
        let args = args.into_iter().collect::<Vec<_>>();
        let count = self
            .bindings()
            .with_args(args.iter().cloned())
            .into_command(parts.count_sql());
        let mut bindings = self.bindings().with_args(args);
        let mut out = String::with_capacity(sql.len() + 64);
        self.dialect
            .write_paged(&mut out, &parts, skip, take, &mut bindings)?;
        log::debug!(
            "Paged ({skip}, {take}) for {:?}: {}",
            self.dialect,
            truncate_long!(out)
        );
        Ok(PagedCommands {
            count,
            page: bindings.into_command(out),
        })
    }

    /// Completes `sql` with the select list and the table of `T` when it is not a full statement.
    ///
    /// A leading `;` is removed and disables the completion.
    pub fn auto_select<T: Record>(&self, sql: &str) -> Result<String> {
        if let Some(sql) = sql.trim_start().strip_prefix(';') {
            return Ok(sql.to_string());
        }
        let sql = sql.trim();
        if ["SELECT", "EXECUTE", "EXEC", "CALL", "WITH", "SET", "DECLARE"]
            .iter()
            .any(|keyword| starts_with_keyword(sql, keyword))
        {
            return Ok(sql.to_string());
        }
        let metadata = self.mapper.metadata::<T>()?;
        let table = self.dialect.escape_table(&metadata.table.table_name);
        let mut out = String::with_capacity(sql.len() + 128);
        out.push_str("SELECT ");
        let len = out.len();
        separated_by(
            &mut out,
            metadata.columns().filter(|b| b.is_selected()),
            |out, binding| {
                out.push_str(&table);
                out.push('.');
                self.dialect.write_identifier(out, &binding.column);
            },
            ", ",
        );
        if out.len() == len {
            out.push_str("NULL");
        }
        if !starts_with_keyword(sql, "FROM") {
            out.push_str(" FROM ");
            out.push_str(&table);
        }
        if !sql.is_empty() {
            out.push(' ');
            out.push_str(sql);
        }
        Ok(out)
    }

    /// Inserts `record`, the primary key is left to the database when it is auto increment.
    pub fn insert<T: Record>(&self, record: &T) -> Result<InsertCommand> {
        let metadata = self.mapper.metadata::<T>()?;
        let table = &metadata.table;
        let mut bindings = self.bindings();
        let mut columns = Vec::new();
        let mut values = Vec::new();
        let mut generated = None;
        for binding in metadata.columns().filter(|b| b.is_writable()) {
            if binding.flags.primary_key && table.auto_increment {
                generated = Some(self.dialect.escape(&binding.column));
                if let Some(sequence) = &table.sequence {
                    let mut next = String::new();
                    self.dialect.write_sequence_next(&mut next, sequence);
                    columns.push(self.dialect.escape(&binding.column));
                    values.push(next);
                }
                continue;
            }
            let value = metadata.value_of(record, binding)?;
            let placeholder = bindings.placeholder(value, binding.flags.into());
            values.push(match binding.insert_template {
                Some(template) => fill_template(template, &[&placeholder]),
                None => placeholder,
            });
            columns.push(self.dialect.escape(&binding.column));
        }
        let mut sql = String::with_capacity(64 + columns.len() * 16);
        let key = self.dialect.write_insert(
            &mut sql,
            &InsertParts {
                table: &self.dialect.escape_table(&table.table_name),
                columns: &columns,
                values: &values,
                key: generated.as_deref(),
            },
        );
        Ok(InsertCommand {
            command: bindings.into_command(sql),
            key,
        })
    }

    /// Updates every writable column of `record`, by primary key.
    pub fn update<T: Record>(&self, record: &T) -> Result<Command> {
        let metadata = self.mapper.metadata::<T>()?;
        let key = metadata.primary_key()?;
        let mut bindings = self.bindings();
        let mut sql = String::with_capacity(128);
        sql.push_str("UPDATE ");
        self.dialect
            .write_table_name(&mut sql, &metadata.table.table_name);
        sql.push_str(" SET ");
        let len = sql.len();
        for binding in metadata
            .columns()
            .filter(|b| b.is_writable() && !b.flags.primary_key)
        {
            if sql.len() > len {
                sql.push_str(", ");
            }
            self.dialect.write_identifier(&mut sql, &binding.column);
            sql.push_str(" = ");
            let value = metadata.value_of(record, binding)?;
            let placeholder = bindings.placeholder(value, binding.flags.into());
            match binding.update_template {
                Some(template) => sql.push_str(&fill_template(template, &[&placeholder])),
                None => sql.push_str(&placeholder),
            }
        }
        if sql.len() == len {
            return Err(Error::msg(format!(
                "Record `{}` has no column to update",
                metadata.record
            )));
        }
        sql.push_str(" WHERE ");
        self.dialect.write_identifier(&mut sql, &key.column);
        sql.push_str(" = ");
        bindings.push(&mut sql, metadata.value_of(record, key)?, key.flags.into());
        Ok(bindings.into_command(sql))
    }

    /// Deletes `record` by primary key.
    pub fn delete<T: Record>(&self, record: &T) -> Result<Command> {
        let metadata = self.mapper.metadata::<T>()?;
        let key = metadata.primary_key()?;
        let mut bindings = self.bindings();
        let mut sql = String::with_capacity(64);
        sql.push_str("DELETE FROM ");
        self.dialect
            .write_table_name(&mut sql, &metadata.table.table_name);
        sql.push_str(" WHERE ");
        self.dialect.write_identifier(&mut sql, &key.column);
        sql.push_str(" = ");
        bindings.push(&mut sql, metadata.value_of(record, key)?, key.flags.into());
        Ok(bindings.into_command(sql))
    }

    /// Whether a row of `T` has primary key `key`, the result is a single 1 or 0.
    pub fn exists<T: Record>(&self, key: impl Into<Value>) -> Result<Command> {
        let metadata = self.mapper.metadata::<T>()?;
        let binding = metadata.primary_key()?;
        let mut bindings = self.bindings();
        let mut condition = self.dialect.escape(&binding.column);
        condition.push_str(" = ");
        let key = match &binding.to_db {
            Some(f) => f(key.into())?,
            None => key.into(),
        };
        bindings.push(&mut condition, key, binding.flags.into());
        let sql = fill_template(
            self.dialect.exists_template(),
            &[
                &self.dialect.escape_table(&metadata.table.table_name),
                &condition,
            ],
        );
        Ok(bindings.into_command(sql))
    }

    /// Stores the key returned by an insert into the primary key of `record`.
    pub fn assign_key<T: Record>(&self, record: &mut T, key: Value) -> Result<()> {
        self.mapper.metadata::<T>()?.set_primary_key(record, key)
    }
}

impl Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("dialect", &self.dialect)
            .field("connection", &truncate_long!(self.connection))
            .finish()
    }
}

/// `sql` starts with `keyword` as a whole word.
fn starts_with_keyword(sql: &str, keyword: &str) -> bool {
    starts_with_ignore_case(sql, keyword)
        && sql[keyword.len()..]
            .chars()
            .next()
            .is_none_or(|c| c.is_whitespace() || c == '(')
}
