use crate::{Dialect, KeyRetrieval, Value, widen_unsigned};

/// Writes `$1`, `$2`... whatever the prefix.
pub(crate) fn write_positional(out: &mut String, index: usize) {
    let mut buffer = itoa::Buffer::new();
    out.push('$');
    out.push_str(buffer.format(index + 1));
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDialect {}

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn write_placeholder(&self, out: &mut String, _prefix: &str, index: usize) {
        write_positional(out, index);
    }

    fn normalize(&self, value: Value) -> Value {
        widen_unsigned(value)
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
