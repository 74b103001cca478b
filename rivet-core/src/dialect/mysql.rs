use crate::{Dialect, KeyRetrieval, Value, uuid_as_text, write_quoted};

fn prefix(connection: &str) -> &'static str {
    // `@name` is a user variable unless the driver is told otherwise
    if connection
        .to_ascii_lowercase()
        .replace(' ', "")
        .contains("allowuservariables=true")
    {
        "?"
    } else {
        "@"
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlDialect {}

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "MySQL"
    }

    fn write_identifier(&self, out: &mut String, name: &str) {
        write_quoted(out, name, '`', '`');
    }

    fn param_prefix(&self, connection: &str) -> &'static str {
        prefix(connection)
    }

    fn normalize(&self, value: Value) -> Value {
        uuid_as_text(value)
    }

    fn key_retrieval(&self) -> KeyRetrieval {
        KeyRetrieval::FollowUp("SELECT LAST_INSERT_ID()")
    }
}

/// Same SQL as MySQL, `RETURNING` is not relied upon.
#[derive(Debug, Default, Clone, Copy)]
pub struct MariaDbDialect {}

impl Dialect for MariaDbDialect {
    fn name(&self) -> &'static str {
        "MariaDB"
    }

    fn write_identifier(&self, out: &mut String, name: &str) {
        write_quoted(out, name, '`', '`');
    }

    fn param_prefix(&self, connection: &str) -> &'static str {
        prefix(connection)
    }

    fn normalize(&self, value: Value) -> Value {
        uuid_as_text(value)
    }

    fn key_retrieval(&self) -> KeyRetrieval {
        KeyRetrieval::FollowUp("SELECT LAST_INSERT_ID()")
    }
}
