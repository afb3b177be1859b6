//! # recall-core
//!
//! Trait abstractions shared by every piece of the memory pipeline: a
//! provider-agnostic [`LanguageModel`], a provider-agnostic [`EmbeddingModel`],
//! and the message/tool/event plumbing both rely on.
//!
//! Concrete providers (OpenAI, or any other backend) implement these traits;
//! the orchestration crates (`recall-memory`, `recall-structured`,
//! `recall-agent`) are generic over them and never talk to an HTTP API
//! directly.
//!
//! ## Modules
//!
//! - [`embedding`] — turn text into dense vectors, single and batched.
//! - [`llm`] — messages, tool calling, structured-output generation.

#![no_std]
extern crate alloc;

/// Text embeddings: single and batched.
pub mod embedding;
/// Messages, tools, and structured-output generation for chat models.
pub mod llm;

#[doc(inline)]
pub use embedding::EmbeddingModel;
#[doc(inline)]
pub use llm::LanguageModel;

use alloc::string::String;

/// Result type used throughout the crate.
///
/// Type alias for [`anyhow::Result<T>`](anyhow::Result) with [`String`] as default success type.
pub type Result<T = String> = anyhow::Result<T>;

pub use anyhow::Error;
