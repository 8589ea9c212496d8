use thiserror::Error;

/// The snapshot does not contain the collateral adjective table at all.
///
/// There is nothing to salvage in that case, callers are expected to abort.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    #[error("no table with a {0:?} header found")]
    TableNotFound(&'static str),

    #[error("table is missing the {0:?} column")]
    MissingColumn(&'static str),
}
