//! The seven `recall_*` tools backing the MCP server, wired to a
//! [`MemoryClient`].
//!
//! Every tool returns its business outcome as `Ok(envelope_json)` — a
//! `{success, data?, error?}` string — reserving `Err` for failures the
//! caller has no way to recover from (malformed arguments, a storage
//! backend that is unreachable). `userId` resolution and response shaping
//! live here rather than in `recall-memory` itself, since they're an MCP
//! surface concern, not a pipeline one.

use std::borrow::Cow;

use recall_core::llm::Tool;
use recall_memory::{ExtractOptions, ListOptions, Memory, MemoryClient, QueryOptions};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

fn envelope_ok(data: Value) -> String {
    json!({"success": true, "data": data}).to_string()
}

fn envelope_err(error: impl Into<String>) -> String {
    json!({"success": false, "error": error.into()}).to_string()
}

fn missing_user_id() -> String {
    envelope_err("userId is required: pass it explicitly or start the server with --user-id")
}

/// Resolves the effective tenant: the call's own `userId`, falling back to
/// the server-configured default.
fn resolve_user_id(explicit: Option<&str>, default: Option<&str>) -> Option<String> {
    explicit
        .map(str::to_string)
        .or_else(|| default.map(str::to_string))
}

/// A [`Memory`] projected for MCP clients: `embedding` is dropped for
/// brevity, and timestamps are rendered the same way the store persists
/// them (RFC3339), not via `OffsetDateTime`'s space-separated `Display`.
fn memory_json(memory: &Memory) -> Result<Value, time::error::Format> {
    Ok(json!({
        "id": memory.id,
        "content": memory.content,
        "metadata": memory.metadata,
        "createdAt": memory.created_at.format(&Rfc3339)?,
        "updatedAt": memory.updated_at.format(&Rfc3339)?,
    }))
}

/// Projects a whole list of memories, failing the call on the first
/// timestamp that won't format.
fn memories_json(memories: &[Memory]) -> Result<Value, time::error::Format> {
    memories.iter().map(memory_json).collect::<Result<Vec<_>, _>>().map(Value::Array)
}

/// Shared context every `recall_*` tool closes over.
pub(crate) struct ToolContext<LLM, EMB, STORE> {
    pub client: std::sync::Arc<MemoryClient<LLM, EMB, STORE>>,
    pub default_user_id: Option<String>,
}

impl<LLM, EMB, STORE> Clone for ToolContext<LLM, EMB, STORE> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            default_user_id: self.default_user_id.clone(),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddArgs {
    /// Free-form text to extract facts from.
    text: String,
    /// Tenant to store facts under; falls back to the server default.
    #[serde(default)]
    user_id: Option<String>,
    /// Provenance: where this text came from (e.g. "chat").
    #[serde(default)]
    source: Option<String>,
    /// Provenance: an id within `source` (e.g. a message id).
    #[serde(default)]
    source_id: Option<String>,
}

pub(crate) struct AddTool<LLM, EMB, STORE>(pub ToolContext<LLM, EMB, STORE>);

impl<LLM, EMB, STORE> Tool for AddTool<LLM, EMB, STORE>
where
    LLM: recall_core::LanguageModel + Send + Sync,
    EMB: recall_core::EmbeddingModel + Send + Sync,
    STORE: recall_memory::store::VectorStore + Send + Sync,
{
    fn name(&self) -> Cow<'static, str> {
        "recall_add".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Extract and store long-term memories from free-form text.".into()
    }

    type Arguments = AddArgs;

    async fn call(&mut self, arguments: Self::Arguments) -> recall_core::Result {
        let Some(user_id) = resolve_user_id(arguments.user_id.as_deref(), self.0.default_user_id.as_deref()) else {
            return Ok(missing_user_id());
        };
        let options = ExtractOptions {
            source: arguments.source,
            source_id: arguments.source_id,
        };
        match self.0.client.extract(&arguments.text, &user_id, options).await {
            Ok(memories) => match memories_json(&memories) {
                Ok(data) => Ok(envelope_ok(data)),
                Err(e) => Ok(envelope_err(e.to_string())),
            },
            Err(e) => Ok(envelope_err(e.to_string())),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryArgs {
    /// Text to embed and search for.
    query: String,
    #[serde(default)]
    user_id: Option<String>,
    /// Maximum rows to return. Defaults to 10.
    #[serde(default)]
    limit: Option<usize>,
    /// Drop rows scoring below this cosine similarity.
    #[serde(default)]
    threshold: Option<f32>,
}

pub(crate) struct QueryTool<LLM, EMB, STORE>(pub ToolContext<LLM, EMB, STORE>);

impl<LLM, EMB, STORE> Tool for QueryTool<LLM, EMB, STORE>
where
    LLM: recall_core::LanguageModel + Send + Sync,
    EMB: recall_core::EmbeddingModel + Send + Sync,
    STORE: recall_memory::store::VectorStore + Send + Sync,
{
    fn name(&self) -> Cow<'static, str> {
        "recall_query".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Find the memories nearest to a query string.".into()
    }

    type Arguments = QueryArgs;

    async fn call(&mut self, arguments: Self::Arguments) -> recall_core::Result {
        let Some(user_id) = resolve_user_id(arguments.user_id.as_deref(), self.0.default_user_id.as_deref()) else {
            return Ok(missing_user_id());
        };
        let mut options = QueryOptions::default();
        if let Some(limit) = arguments.limit {
            options.limit = limit;
        }
        options.threshold = arguments.threshold;

        match self.0.client.query(&arguments.query, &user_id, options).await {
            Ok(memories) => match memories_json(&memories) {
                Ok(data) => Ok(envelope_ok(data)),
                Err(e) => Ok(envelope_err(e.to_string())),
            },
            Err(e) => Ok(envelope_err(e.to_string())),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListArgs {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
}

pub(crate) struct ListTool<LLM, EMB, STORE>(pub ToolContext<LLM, EMB, STORE>);

impl<LLM, EMB, STORE> Tool for ListTool<LLM, EMB, STORE>
where
    LLM: recall_core::LanguageModel + Send + Sync,
    EMB: recall_core::EmbeddingModel + Send + Sync,
    STORE: recall_memory::store::VectorStore + Send + Sync,
{
    fn name(&self) -> Cow<'static, str> {
        "recall_list".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "List a tenant's memories, most recent first.".into()
    }

    type Arguments = ListArgs;

    async fn call(&mut self, arguments: Self::Arguments) -> recall_core::Result {
        let Some(user_id) = resolve_user_id(arguments.user_id.as_deref(), self.0.default_user_id.as_deref()) else {
            return Ok(missing_user_id());
        };
        let mut options = ListOptions::default();
        if let Some(limit) = arguments.limit {
            options = options.with_limit(limit);
        }
        if let Some(offset) = arguments.offset {
            options = options.with_offset(offset);
        }

        match self.0.client.list(&user_id, options).await {
            Ok(memories) => match memories_json(&memories) {
                Ok(data) => Ok(envelope_ok(data)),
                Err(e) => Ok(envelope_err(e.to_string())),
            },
            Err(e) => Ok(envelope_err(e.to_string())),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct GetArgs {
    /// Memory id, as returned by `recall_add`/`recall_list`/`recall_query`.
    id: String,
}

pub(crate) struct GetTool<LLM, EMB, STORE>(pub ToolContext<LLM, EMB, STORE>);

impl<LLM, EMB, STORE> Tool for GetTool<LLM, EMB, STORE>
where
    LLM: recall_core::LanguageModel + Send + Sync,
    EMB: recall_core::EmbeddingModel + Send + Sync,
    STORE: recall_memory::store::VectorStore + Send + Sync,
{
    fn name(&self) -> Cow<'static, str> {
        "recall_get".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Fetch a single memory by id.".into()
    }

    type Arguments = GetArgs;

    async fn call(&mut self, arguments: Self::Arguments) -> recall_core::Result {
        let Ok(id) = Uuid::parse_str(&arguments.id) else {
            return Ok(envelope_err(format!("invalid id: {}", arguments.id)));
        };
        match self.0.client.get(id).await {
            Ok(Some(memory)) => match memory_json(&memory) {
                Ok(data) => Ok(envelope_ok(data)),
                Err(e) => Ok(envelope_err(e.to_string())),
            },
            Ok(None) => Ok(envelope_err(format!("memory {id} not found"))),
            Err(e) => Ok(envelope_err(e.to_string())),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct UpdateArgs {
    /// Memory id, as returned by `recall_add`/`recall_list`/`recall_query`.
    id: String,
    /// New content; re-embedded if provided.
    #[serde(default)]
    content: Option<String>,
    /// Replacement metadata bag (full replace, not a merge).
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

pub(crate) struct UpdateTool<LLM, EMB, STORE>(pub ToolContext<LLM, EMB, STORE>);

impl<LLM, EMB, STORE> Tool for UpdateTool<LLM, EMB, STORE>
where
    LLM: recall_core::LanguageModel + Send + Sync,
    EMB: recall_core::EmbeddingModel + Send + Sync,
    STORE: recall_memory::store::VectorStore + Send + Sync,
{
    fn name(&self) -> Cow<'static, str> {
        "recall_update".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Update a memory's content and/or metadata; at least one is required.".into()
    }

    type Arguments = UpdateArgs;

    async fn call(&mut self, arguments: Self::Arguments) -> recall_core::Result {
        if arguments.content.is_none() && arguments.metadata.is_none() {
            return Ok(envelope_err("at least one of content or metadata is required"));
        }
        let Ok(id) = Uuid::parse_str(&arguments.id) else {
            return Ok(envelope_err(format!("invalid id: {}", arguments.id)));
        };
        match self.0.client.update(id, arguments.content, arguments.metadata).await {
            Ok(memory) => match memory_json(&memory) {
                Ok(data) => Ok(envelope_ok(data)),
                Err(e) => Ok(envelope_err(e.to_string())),
            },
            Err(e) => Ok(envelope_err(e.to_string())),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct DeleteArgs {
    /// Memory id, as returned by `recall_add`/`recall_list`/`recall_query`.
    id: String,
}

pub(crate) struct DeleteTool<LLM, EMB, STORE>(pub ToolContext<LLM, EMB, STORE>);

impl<LLM, EMB, STORE> Tool for DeleteTool<LLM, EMB, STORE>
where
    LLM: recall_core::LanguageModel + Send + Sync,
    EMB: recall_core::EmbeddingModel + Send + Sync,
    STORE: recall_memory::store::VectorStore + Send + Sync,
{
    fn name(&self) -> Cow<'static, str> {
        "recall_delete".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Delete a memory by id.".into()
    }

    type Arguments = DeleteArgs;

    async fn call(&mut self, arguments: Self::Arguments) -> recall_core::Result {
        let Ok(id) = Uuid::parse_str(&arguments.id) else {
            return Ok(envelope_err(format!("invalid id: {}", arguments.id)));
        };
        match self.0.client.delete(id).await {
            Ok(()) => Ok(envelope_ok(json!({"id": arguments.id}))),
            Err(e) => Ok(envelope_err(e.to_string())),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClearArgs {
    /// Tenant to wipe. Unlike the other tools, this has no server-default
    /// fallback: clearing the wrong tenant by omission is worse than
    /// requiring the caller to be explicit.
    user_id: String,
    /// Must be `true`. `recall_clear` is destructive and irreversible.
    #[serde(default)]
    confirm: bool,
}

pub(crate) struct ClearTool<LLM, EMB, STORE>(pub ToolContext<LLM, EMB, STORE>);

impl<LLM, EMB, STORE> Tool for ClearTool<LLM, EMB, STORE>
where
    LLM: recall_core::LanguageModel + Send + Sync,
    EMB: recall_core::EmbeddingModel + Send + Sync,
    STORE: recall_memory::store::VectorStore + Send + Sync,
{
    fn name(&self) -> Cow<'static, str> {
        "recall_clear".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Delete every memory for a tenant. Destructive; requires confirm:true.".into()
    }

    type Arguments = ClearArgs;

    async fn call(&mut self, arguments: Self::Arguments) -> recall_core::Result {
        if !arguments.confirm {
            return Ok(envelope_err("recall_clear is destructive; pass confirm:true to proceed"));
        }
        match self.0.client.clear(&arguments.user_id).await {
            Ok(()) => Ok(envelope_ok(json!({"userId": arguments.user_id}))),
            Err(e) => Ok(envelope_err(e.to_string())),
        }
    }
}
