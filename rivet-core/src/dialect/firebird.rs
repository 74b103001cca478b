use crate::{
    Bindings, Dialect, KeyRetrieval, Result, SqlParts, Value, bool_as_int, uuid_as_text,
    widen_unsigned, write_rows_to,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct FirebirdDialect {}

impl Dialect for FirebirdDialect {
    fn name(&self) -> &'static str {
        "Firebird"
    }

    fn normalize(&self, value: Value) -> Value {
        uuid_as_text(widen_unsigned(bool_as_int(value)))
    }

    fn write_paged(
        &self,
        out: &mut String,
        parts: &SqlParts,
        skip: u64,
        take: u64,
        bindings: &mut Bindings,
    ) -> Result<()> {
        write_rows_to(out, parts, skip, take, bindings);
        Ok(())
    }

    fn exists_template(&self) -> &'static str {
        "SELECT CASE WHEN EXISTS (SELECT 1 FROM {0} WHERE {1}) THEN 1 ELSE 0 END FROM RDB$DATABASE"
    }

    fn write_insert_returning(&self, out: &mut String, key: &str) {
        out.push_str(" RETURNING ");
        out.push_str(key);
    }

    fn key_retrieval(&self) -> KeyRetrieval {
        KeyRetrieval::Row
    }
}
