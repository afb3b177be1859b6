use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the unstructured memory pipeline.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Underlying storage failure (I/O, serialization, connection).
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),

    /// `update`/`delete` addressed an id the store doesn't have.
    #[error("memory {0} not found")]
    NotFound(Uuid),
}

/// Result type used throughout this crate.
pub type Result<T> = core::result::Result<T, MemoryError>;
