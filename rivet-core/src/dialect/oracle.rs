use crate::{
    Bindings, Dialect, KeyRetrieval, Result, SqlParts, Value, bool_as_int,
    reject_unaliased_wildcard, uuid_as_text, widen_unsigned, write_quoted, write_row_number,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct OracleDialect {}

impl Dialect for OracleDialect {
    fn name(&self) -> &'static str {
        "Oracle"
    }

    /// Unquoted names are stored upper case.
    fn write_identifier(&self, out: &mut String, name: &str) {
        write_quoted(out, &name.to_uppercase(), '"', '"');
    }

    fn param_prefix(&self, _connection: &str) -> &'static str {
        ":"
    }

    fn normalize(&self, value: Value) -> Value {
        uuid_as_text(widen_unsigned(bool_as_int(value)))
    }

    fn default_order_by(&self) -> &'static str {
        "ORDER BY NULL"
    }

    fn write_paged(
        &self,
        out: &mut String,
        parts: &SqlParts,
        skip: u64,
        take: u64,
        bindings: &mut Bindings,
    ) -> Result<()> {
        // `ROW_NUMBER() ..., *` is invalid
        reject_unaliased_wildcard(self, parts)?;
        write_row_number(out, self, parts, skip, take, bindings);
        Ok(())
    }

    fn exists_template(&self) -> &'static str {
        "SELECT CASE WHEN EXISTS (SELECT 1 FROM {0} WHERE {1}) THEN 1 ELSE 0 END FROM DUAL"
    }

    fn write_sequence_next(&self, out: &mut String, sequence: &str) {
        out.push_str(sequence);
        out.push_str(".nextval");
    }

    fn write_insert_returning(&self, out: &mut String, key: &str) {
        out.push_str(" RETURNING ");
        out.push_str(key);
        out.push_str(" INTO :newid");
    }

    fn key_retrieval(&self) -> KeyRetrieval {
        KeyRetrieval::OutParam("newid")
    }
}
