use std::sync::Arc;

/// Broad category of a [`MappingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The mapping can never succeed, reported when a materializer, plan or command is built.
    Configuration,
    /// The cursor was used in the wrong order or after disposal.
    Usage,
    /// A single value could not be converted. Also reported for every error that is not a
    /// [`MappingError`], row source failures included.
    Conversion,
}

/// Errors raised by the mapping engine, carried inside [`crate::Error`].
///
/// Use `error.downcast_ref::<MappingError>()` to inspect them.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("Field `{field}` of `{record}` has no setter but column `{column}` maps to it")]
    NoSetter {
        record: &'static str,
        field: &'static str,
        column: String,
    },
    #[error("Record `{record}` maps column `{column}` twice")]
    DuplicateColumn { record: &'static str, column: String },
    #[error(
        "Cannot find the split point between `{this}` and `{next}`: no column of the row starts `{next}`"
    )]
    SplitPoint {
        this: &'static str,
        next: &'static str,
    },
    #[error("Cannot join `{record}`: no preceding record has a field of that type")]
    NoJoinCandidate { record: &'static str },
    #[error("Cannot join `{record}`: {candidates} preceding fields have that type")]
    AmbiguousJoin {
        record: &'static str,
        candidates: usize,
    },
    #[error("Paging is not supported by {dialect}")]
    PagingUnsupported { dialect: &'static str },
    #[error("Unable to parse SQL statement for paging: {sql}")]
    UnparsableSql { sql: String },
    #[error("Record `{record}` has no primary key")]
    MissingPrimaryKey { record: &'static str },
    #[error("{dialect} requires an aliased wildcard (`t.*`) in paged queries")]
    UnaliasedWildcard { dialect: &'static str },
    #[error("No dialect matches driver `{driver}`")]
    UnknownDialect { driver: String },
    #[error("The grid reader has been disposed")]
    CursorDisposed,
    #[error("Result set {index} was already consumed, results must be read in order exactly once")]
    ResultConsumed { index: usize },
    #[error("No more result sets are available")]
    NoMoreResults,
    #[error("Column `{column}` is NULL but `{target}` is not nullable")]
    NullIntoNonNullable { column: String, target: &'static str },
}

impl MappingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MappingError::NoSetter { .. }
            | MappingError::DuplicateColumn { .. }
            | MappingError::SplitPoint { .. }
            | MappingError::NoJoinCandidate { .. }
            | MappingError::AmbiguousJoin { .. }
            | MappingError::PagingUnsupported { .. }
            | MappingError::UnparsableSql { .. }
            | MappingError::MissingPrimaryKey { .. }
            | MappingError::UnaliasedWildcard { .. }
            | MappingError::UnknownDialect { .. } => ErrorKind::Configuration,
            MappingError::CursorDisposed
            | MappingError::ResultConsumed { .. }
            | MappingError::NoMoreResults => ErrorKind::Usage,
            MappingError::NullIntoNonNullable { .. } => ErrorKind::Conversion,
        }
    }
}

/// What a reader does with an error after the hook has seen it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Hand the error to the caller.
    Propagate,
    /// End the stream quietly.
    Stop,
}

pub type ErrorHook = Arc<dyn Fn(&crate::Error) -> ErrorAction + Send + Sync>;

/// Category of any error.
///
/// Only [`MappingError`]s carry a kind. Anything else, a failing row source or a custom converter
/// included, is reported as `Conversion`.
pub fn error_kind(error: &crate::Error) -> ErrorKind {
    error
        .downcast_ref::<MappingError>()
        .map(MappingError::kind)
        .unwrap_or(ErrorKind::Conversion)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        let error: crate::Error = MappingError::NoMoreResults.into();
        assert_eq!(error_kind(&error), ErrorKind::Usage);
        let error: crate::Error = MappingError::PagingUnsupported { dialect: "MS Access" }.into();
        assert_eq!(error_kind(&error), ErrorKind::Configuration);
        let error = crate::Error::from(MappingError::CursorDisposed).context("While reading");
        assert_eq!(error_kind(&error), ErrorKind::Usage);
        let error = crate::Error::msg("connection reset");
        assert_eq!(error_kind(&error), ErrorKind::Conversion);
    }
}
