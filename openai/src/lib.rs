//! `OpenAI`-compatible chat and embedding provider for the memory pipeline,
//! built on `reqwest` and the shared `recall-core` abstractions.
//!
//! Talks to the stable `chat/completions` and `embeddings` endpoints, so the
//! same client also works against Deepseek or `OpenRouter`'s OpenAI-compatible
//! APIs via [`OpenAI::deepseek`] / [`OpenAI::openrouter`] or a custom base URL.
//!
//! ```no_run
//! use recall_core::llm::{LanguageModel, oneshot};
//! use recall_openai::OpenAI;
//! use futures_lite::StreamExt;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let model = OpenAI::new(std::env::var("OPENAI_API_KEY")?).with_model("gpt-5-nano");
//! let mut stream = model.respond(oneshot("You are concise.", "Say hi."));
//! while let Some(event) = stream.next().await {
//!     event?;
//! }
//! # Ok(()) }
//! ```

mod client;
mod embedding;
mod error;
mod request;
mod response;

pub use client::{Builder, OpenAI};
pub use error::OpenAIError;

mod constant;
pub use constant::*;

pub(crate) const DEFAULT_MODEL: &str = GPT5_NANO;
pub(crate) const DEFAULT_BASE_URL: &str = OPENAI_BASE_URL;
pub(crate) const DEFAULT_EMBEDDING_MODEL: &str = EMBEDDING_SMALL;
pub(crate) const DEFAULT_EMBEDDING_DIM: usize = 1536;
