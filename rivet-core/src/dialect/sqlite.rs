use crate::{Dialect, KeyRetrieval, Value, bool_as_int, uuid_as_text, widen_unsigned, write_quoted};

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDialect {}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "SQLite"
    }

    fn write_identifier(&self, out: &mut String, name: &str) {
        write_quoted(out, name, '[', ']');
    }

    fn normalize(&self, value: Value) -> Value {
        uuid_as_text(widen_unsigned(bool_as_int(value)))
    }

    fn key_retrieval(&self) -> KeyRetrieval {
        KeyRetrieval::FollowUp("SELECT last_insert_rowid()")
    }
}
