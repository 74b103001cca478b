use crate::{
    AccessDialect, Dialect, DuckDbDialect, FirebirdDialect, MappingError, MariaDbDialect,
    MySqlDialect, OracleDialect, PostgresDialect, Result, SqlServer2012Dialect, SqlServerCeDialect,
    SqlServerDialect, SqliteDialect, starts_with_ignore_case,
};
use std::{
    fmt::{self, Debug},
    sync::Arc,
};

/// Decides from the lower cased driver name and connection string.
pub type DialectPredicate = fn(driver: &str, connection: &str) -> bool;

fn rule(
    predicate: DialectPredicate,
    dialect: impl Dialect + 'static,
) -> (DialectPredicate, Arc<dyn Dialect>) {
    (predicate, Arc::new(dialect))
}

/// Picks the dialect of a database from its driver name and connection string.
///
/// Custom registrations, matched as case insensitive prefixes of the driver name, come first.
/// Then the built in rules run in order, the first match wins. Anything else is SQL Server.
pub struct DialectRegistry {
    custom: Vec<(String, Arc<dyn Dialect>)>,
    rules: Vec<(DialectPredicate, Arc<dyn Dialect>)>,
    fallback: Arc<dyn Dialect>,
}

impl DialectRegistry {
    pub fn new() -> Self {
        let rules = vec![
            rule(
                |d, _| d.contains("sqlserver2012") || d.contains("mssql2012"),
                SqlServer2012Dialect {},
            ),
            rule(
                |d, _| d.contains("sqlce") || d.contains("sqlserverce"),
                SqlServerCeDialect {},
            ),
            rule(|d, _| d.contains("mariadb"), MariaDbDialect {}),
            rule(|d, _| d.contains("mysql"), MySqlDialect {}),
            rule(
                |d, _| d.contains("npgsql") || d.contains("postgres") || d.contains("pgsql"),
                PostgresDialect {},
            ),
            rule(|d, _| d.contains("oracle"), OracleDialect {}),
            rule(|d, _| d.contains("sqlite"), SqliteDialect {}),
            rule(|d, _| d.contains("duckdb"), DuckDbDialect {}),
            rule(
                |d, _| d.contains("firebird") || d.starts_with("fb"),
                FirebirdDialect {},
            ),
            rule(
                |d, c| {
                    d.contains("oledb")
                        || d.contains("access")
                        || c.contains("microsoft.ace.oledb")
                        || c.contains("microsoft.jet.oledb")
                },
                AccessDialect {},
            ),
            rule(
                |d, _| d.contains("sqlclient") || d.contains("sqlserver") || d.contains("mssql"),
                SqlServerDialect {},
            ),
        ];
        Self {
            custom: Vec::new(),
            rules,
            fallback: Arc::new(SqlServerDialect {}),
        }
    }

    /// Drivers whose name starts with `prefix` use `dialect`, before any built in rule.
    pub fn register(mut self, prefix: impl Into<String>, dialect: Arc<dyn Dialect>) -> Self {
        self.custom.push((prefix.into(), dialect));
        self
    }

    /// Appends a rule after the built in ones.
    pub fn rule(mut self, predicate: DialectPredicate, dialect: Arc<dyn Dialect>) -> Self {
        self.rules.push((predicate, dialect));
        self
    }

    fn find(&self, driver: &str, connection: &str) -> Option<Arc<dyn Dialect>> {
        if let Some((_, dialect)) = self
            .custom
            .iter()
            .find(|(prefix, _)| starts_with_ignore_case(driver, prefix))
        {
            return Some(dialect.clone());
        }
        let driver = driver.to_lowercase();
        let connection = connection.to_lowercase();
        self.rules
            .iter()
            .find(|(matches, _)| matches(&driver, &connection))
            .map(|(_, dialect)| dialect.clone())
    }

    pub fn resolve(&self, driver: &str, connection: &str) -> Arc<dyn Dialect> {
        let dialect = self.find(driver, connection).unwrap_or_else(|| {
            log::debug!("No dialect matches driver `{driver}`, using {:?}", self.fallback);
            self.fallback.clone()
        });
        log::debug!("Driver `{driver}` resolved to {:?}", dialect);
        dialect
    }

    /// Like [`DialectRegistry::resolve`] but an unmatched driver is an error.
    pub fn resolve_strict(&self, driver: &str, connection: &str) -> Result<Arc<dyn Dialect>> {
        self.find(driver, connection).ok_or_else(|| {
            MappingError::UnknownDialect {
                driver: driver.to_string(),
            }
            .into()
        })
    }
}

impl Default for DialectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for DialectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialectRegistry")
            .field(
                "custom",
                &self.custom.iter().map(|(p, d)| (p, d.name())).collect::<Vec<_>>(),
            )
            .field("rules", &self.rules.len())
            .field("fallback", &self.fallback)
            .finish()
    }
}
