use crate::{
    Bindings, Dialect, KeyRetrieval, Result, SqlParts, Value, bool_as_int, widen_unsigned,
    write_offset_fetch, write_quoted, write_row_number,
};

fn write_bracketed(out: &mut String, name: &str) {
    write_quoted(out, name, '[', ']');
}

/// SQL Server up to 2008, pages with `ROW_NUMBER()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlServerDialect {}

impl Dialect for SqlServerDialect {
    fn name(&self) -> &'static str {
        "SQL Server"
    }

    fn write_identifier(&self, out: &mut String, name: &str) {
        write_bracketed(out, name);
    }

    fn normalize(&self, value: Value) -> Value {
        widen_unsigned(bool_as_int(value))
    }

    fn write_paged(
        &self,
        out: &mut String,
        parts: &SqlParts,
        skip: u64,
        take: u64,
        bindings: &mut Bindings,
    ) -> Result<()> {
        write_row_number(out, self, parts, skip, take, bindings);
        Ok(())
    }

    fn exists_template(&self) -> &'static str {
        "IF EXISTS (SELECT 1 FROM {0} WHERE {1}) SELECT 1 ELSE SELECT 0"
    }

    fn write_insert_output(&self, out: &mut String, key: &str) {
        out.push_str(" OUTPUT INSERTED.");
        out.push_str(key);
    }

    fn key_retrieval(&self) -> KeyRetrieval {
        KeyRetrieval::Row
    }
}

/// SQL Server 2012 and later, pages with `OFFSET ... FETCH NEXT`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlServer2012Dialect {}

impl Dialect for SqlServer2012Dialect {
    fn name(&self) -> &'static str {
        "SQL Server 2012"
    }

    fn write_identifier(&self, out: &mut String, name: &str) {
        write_bracketed(out, name);
    }

    fn normalize(&self, value: Value) -> Value {
        widen_unsigned(bool_as_int(value))
    }

    fn write_paged(
        &self,
        out: &mut String,
        parts: &SqlParts,
        skip: u64,
        take: u64,
        bindings: &mut Bindings,
    ) -> Result<()> {
        write_offset_fetch(out, self, parts, skip, take, bindings);
        Ok(())
    }

    fn exists_template(&self) -> &'static str {
        SqlServerDialect {}.exists_template()
    }

    fn write_insert_output(&self, out: &mut String, key: &str) {
        SqlServerDialect {}.write_insert_output(out, key);
    }

    fn key_retrieval(&self) -> KeyRetrieval {
        KeyRetrieval::Row
    }
}

/// SQL Server Compact, one statement per command.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlServerCeDialect {}

impl Dialect for SqlServerCeDialect {
    fn name(&self) -> &'static str {
        "SQL Server CE"
    }

    fn write_identifier(&self, out: &mut String, name: &str) {
        write_bracketed(out, name);
    }

    fn normalize(&self, value: Value) -> Value {
        widen_unsigned(bool_as_int(value))
    }

    fn write_paged(
        &self,
        out: &mut String,
        parts: &SqlParts,
        skip: u64,
        take: u64,
        bindings: &mut Bindings,
    ) -> Result<()> {
        write_offset_fetch(out, self, parts, skip, take, bindings);
        Ok(())
    }

    fn exists_template(&self) -> &'static str {
        "SELECT COUNT(*) FROM {0} WHERE {1}"
    }

    fn key_retrieval(&self) -> KeyRetrieval {
        KeyRetrieval::FollowUp("SELECT @@IDENTITY AS NewID")
    }
}
