use thiserror::Error;

/// Errors surfaced by the structured memory pipeline.
#[derive(Debug, Error)]
pub enum StructuredError {
    /// Underlying storage failure (I/O, serialization, connection).
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),

    /// `get`/`update`/`delete` addressed an id the store doesn't have.
    #[error("record {0} not found")]
    RecordNotFound(String),

    /// A payload was checked against a declared [`crate::schema::Schema`] and failed.
    #[error("schema validation failed: {0:?}")]
    SchemaValidation(Vec<FieldIssue>),

    /// Everything a LLM-generated query needed to run failed upfront.
    #[error("query could not be answered: {0}")]
    QueryGeneration(String),

    /// `query` was handed something other than a `SELECT`.
    #[error("only SELECT statements may be executed, got: {0}")]
    UnsafeQuery(String),

    /// The schema referenced by a call isn't registered.
    #[error("unknown schema: {0}")]
    UnknownSchema(String),
}

/// One field-level validation failure.
#[derive(Debug, Clone)]
pub struct FieldIssue {
    /// Offending field name.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

/// Result type used throughout this crate.
pub type Result<T> = core::result::Result<T, StructuredError>;
