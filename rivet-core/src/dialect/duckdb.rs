use crate::{Dialect, KeyRetrieval, write_positional};

/// Native unsigned and uuid types, nothing to normalize.
#[derive(Debug, Default, Clone, Copy)]
pub struct DuckDbDialect {}

impl Dialect for DuckDbDialect {
    fn name(&self) -> &'static str {
        "DuckDB"
    }

    fn write_placeholder(&self, out: &mut String, _prefix: &str, index: usize) {
        write_positional(out, index);
    }

    fn write_sequence_next(&self, out: &mut String, sequence: &str) {
        out.push_str("nextval('");
        out.push_str(&sequence.replace('\'', "''"));
        out.push_str("')");
    }

    fn write_insert_returning(&self, out: &mut String, key: &str) {
        out.push_str(" RETURNING ");
        out.push_str(key);
    }

    fn key_retrieval(&self) -> KeyRetrieval {
        KeyRetrieval::Row
    }
}
