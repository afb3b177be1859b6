//! Unstructured long-term memory pipeline.
//!
//! Glues a pluggable [`recall_core::EmbeddingModel`] and
//! [`recall_core::LanguageModel`] to a pluggable [`VectorStore`] to implement
//! two operations:
//!
//! - [`MemoryClient::extract`]: distil free-form text into atomic,
//!   third-person facts, embed each one, and consolidate it against the
//!   tenant's nearest neighbours (ADD/UPDATE/DELETE/NONE).
//! - [`MemoryClient::query`]: embed a query and return the nearest facts.
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use recall_memory::{MemoryClient, ExtractOptions, store::InMemoryVectorStore};
//! use recall_openai::OpenAI;
//!
//! let llm = OpenAI::new(std::env::var("OPENAI_API_KEY")?);
//! let embedder = llm.clone();
//! let client = MemoryClient::new(llm, embedder, InMemoryVectorStore::new());
//!
//! let added = client.extract("My name is Ada and I love compilers", "user-1", ExtractOptions::default()).await?;
//! for memory in added {
//!     println!("{}", memory.content);
//! }
//! # Ok(()) }
//! ```

mod client;
mod extract;
pub mod model;
pub mod store;

pub mod error;

pub use client::{ExtractOptions, MemoryClient, QueryOptions};
pub use error::MemoryError;
pub use extract::{ConsolidationAction, ConsolidationDecision, ExtractedFact};
pub use model::{Memory, MemoryUpdate, Metadata};
pub use store::{InMemoryVectorStore, ListOptions, VectorStore};
