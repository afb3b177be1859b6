//! Tool-using agent for multi-hop structured-memory CRUD.
//!
//! Wraps a [`recall_structured::store::StructuredStore`] in six tools —
//! `listSchemas`, `listRecords`, `getRecord`, `searchRecords`,
//! `insertRecord`, `updateRecord`, `deleteRecord` — and drives a bounded
//! LLM tool-calling loop over them. Intended for UPDATE/DELETE requests a
//! single intent-classification pass can't resolve (e.g. "delete the
//! payment to Jayden from last week" needs a search before a delete).
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use recall_agent::AgentClient;
//! use recall_structured::{schema::{Schema, SchemaRegistry, FieldDef, FieldType}, store::InMemoryStructuredStore};
//! use recall_openai::OpenAI;
//!
//! let mut schemas = SchemaRegistry::new();
//! schemas.register(
//!     Schema::new("payments", "Money paid to someone")
//!         .with_field(FieldDef::required("recipient", FieldType::String))
//!         .with_field(FieldDef::required("amount", FieldType::Number)),
//! );
//!
//! let llm = OpenAI::new(std::env::var("OPENAI_API_KEY")?);
//! let agent = AgentClient::new(llm, InMemoryStructuredStore::new(), schemas);
//! let outcome = agent.run("Delete the payment to Jayden", "user-1").await?;
//! println!("{outcome:?}");
//! # Ok(()) }
//! ```

mod client;
mod error;
mod tools;

pub use client::{AgentClient, AgentOutcome, AgentToolCall};
pub use error::{AgentError, Result};
