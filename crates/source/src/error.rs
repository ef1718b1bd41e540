use thiserror::Error;

/// Failures raised by a data source while answering a fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("no data is registered for '{0}'")]
    Unknown(String),

    #[error("query failed: {0}")]
    Execution(String),

    #[error("row does not match the declared columns: {0}")]
    SchemaMismatch(String),

    #[error("invalid fixture: {0}")]
    Fixture(String),
}

/// Failures raised by a metadata catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("metadata catalog unavailable: {0}")]
    Unavailable(String),

    #[error("invalid fixture: {0}")]
    Fixture(String),
}
