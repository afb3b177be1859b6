//! Schema-directed structured memory: typed tables, intent detection, and
//! safe SQL generation.
//!
//! Classifies free-form utterances describing trackable events (payments,
//! workouts, medications, ...) into per-tenant SQL tables, and answers
//! aggregate natural-language questions by generating tenant-scoped SQL.
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use recall_structured::{StructuredClient, schema::{Schema, FieldDef, FieldType}, store::InMemoryStructuredStore};
//! use recall_openai::OpenAI;
//!
//! let llm = OpenAI::new(std::env::var("OPENAI_API_KEY")?);
//! let mut client = StructuredClient::new(llm, InMemoryStructuredStore::new());
//! client.register_schema(
//!     Schema::new("payments", "Money paid to someone")
//!         .with_field(FieldDef::required("recipient", FieldType::String))
//!         .with_field(FieldDef::required("amount", FieldType::Number)),
//! ).await?;
//!
//! let outcome = client.process("Paid Jayden $150 for MMA training", "user-1", None).await?;
//! println!("{outcome:?}");
//! # Ok(()) }
//! ```

mod client;
pub mod intent;
pub mod query_gen;
pub mod record;
pub mod schema;
pub mod store;

pub mod error;

pub use client::{ProcessOutcome, StructuredClient};
pub use error::{FieldIssue, StructuredError};
