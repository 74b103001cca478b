use crate::{
    Bindings, Dialect, KeyRetrieval, MappingError, Result, SqlParts, Value, widen_unsigned,
    write_quoted,
};

/// Microsoft Access through OLE DB. Paging is not available.
#[derive(Debug, Default, Clone, Copy)]
pub struct AccessDialect {}

impl Dialect for AccessDialect {
    fn name(&self) -> &'static str {
        "MS Access"
    }

    fn write_identifier(&self, out: &mut String, name: &str) {
        write_quoted(out, name, '[', ']');
    }

    fn normalize(&self, value: Value) -> Value {
        widen_unsigned(value)
    }

    fn write_paged(
        &self,
        _out: &mut String,
        _parts: &SqlParts,
        _skip: u64,
        _take: u64,
        _bindings: &mut Bindings,
    ) -> Result<()> {
        Err(MappingError::PagingUnsupported {
            dialect: self.name(),
        }
        .into())
    }

    fn exists_template(&self) -> &'static str {
        "SELECT COUNT(*) FROM {0} WHERE {1}"
    }

    fn key_retrieval(&self) -> KeyRetrieval {
        KeyRetrieval::FollowUp("SELECT @@IDENTITY AS NewID")
    }
}
