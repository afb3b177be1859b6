//! SQLite adapters for the vector store and structured store contracts
//! (the reference SQL adapter).
//!
//! Both stores accept either their own connection (`connect`) or a shared
//! [`sqlx::SqlitePool`] (`from_pool`) so a single database file can back
//! both the unstructured and structured pipelines.

mod structured;
mod vector;

pub use structured::SqliteStructuredStore;
pub use vector::SqliteVectorStore;
