//! Orchestrates the unstructured memory pipeline: extract → embed →
//! neighbour lookup → consolidate → mutate, plus thin CRUD delegations.

use recall_core::{EmbeddingModel, LanguageModel};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    error::Result,
    extract::{self, ConsolidationAction, NeighbourRef},
    model::{Memory, MemoryUpdate, Metadata},
    store::{ListOptions, VectorStore, cosine_similarity},
};

/// Neighbours considered during consolidation.
const NEIGHBOURS_CONSIDERED: usize = 5;
const DEFAULT_QUERY_LIMIT: usize = 10;

/// Provenance attached to extracted memories.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Stored under the `source` metadata key.
    pub source: Option<String>,
    /// Stored under the `sourceId` metadata key.
    pub source_id: Option<String>,
}

/// Tuning knobs for [`MemoryClient::query`].
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    /// Maximum rows to return. Defaults to 10.
    pub limit: usize,
    /// Drop rows scoring below this cosine similarity, recomputed client-side.
    pub threshold: Option<f32>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_QUERY_LIMIT,
            threshold: None,
        }
    }
}

/// Glues a pluggable embedder, LLM, and [`VectorStore`] into the unstructured
/// memory workflows. Safe to share across concurrent callers: it holds
/// no mutable state of its own, delegating all mutation to the store.
#[derive(Debug)]
pub struct MemoryClient<LLM, EMB, STORE> {
    llm: LLM,
    embedder: EMB,
    store: STORE,
}

impl<LLM, EMB, STORE> MemoryClient<LLM, EMB, STORE>
where
    LLM: LanguageModel,
    EMB: EmbeddingModel,
    STORE: VectorStore,
{
    /// Builds a client over the given model, embedder, and store.
    pub const fn new(llm: LLM, embedder: EMB, store: STORE) -> Self {
        Self { llm, embedder, store }
    }

    /// Returns the underlying store.
    pub const fn store(&self) -> &STORE {
        &self.store
    }

    /// Extracts facts from `text`, consolidates each against the tenant's
    /// nearest neighbours, and applies the resulting mutation. Returns the
    /// memories that were added or updated; deletions and no-ops contribute
    /// nothing to the returned list.
    pub async fn extract(&self, text: &str, tenant: &str, options: ExtractOptions) -> Result<Vec<Memory>> {
        let facts = extract::extract_facts(&self.llm, text).await;
        let mut applied = Vec::new();

        for fact in facts {
            // Open question (i): empty-string content is dropped rather than
            // stored, since an empty fact carries no information to recall.
            if fact.content.trim().is_empty() {
                continue;
            }

            let embedding = match self.embedder.embed(&fact.content).await {
                Ok(embedding) => embedding,
                Err(_) => continue, // a failed embedding aborts this fact only
            };

            let neighbours = self
                .store
                .query_by_embedding(&embedding, tenant, NEIGHBOURS_CONSIDERED)
                .await?;

            // Ordinal remap: "0".."n-1" -> real UUID, in insertion (neighbour) order.
            // The LLM never sees a real id.
            let remap: Vec<Uuid> = neighbours.iter().map(|m| m.id).collect();
            let refs: Vec<NeighbourRef<'_>> = neighbours
                .iter()
                .enumerate()
                .map(|(i, m)| NeighbourRef {
                    id: i.to_string(),
                    content: &m.content,
                })
                .collect();

            let decision = extract::consolidate(&self.llm, &fact.content, &refs).await;

            let target_id = decision
                .id
                .as_deref()
                .and_then(|ordinal| ordinal.parse::<usize>().ok())
                .and_then(|idx| remap.get(idx).copied());

            let requires_id = matches!(
                decision.action,
                ConsolidationAction::Update | ConsolidationAction::Delete
            );
            let action = if requires_id && target_id.is_none() {
                ConsolidationAction::Add
            } else {
                decision.action
            };

            match action {
                ConsolidationAction::Add => {
                    let content = decision.content.clone().unwrap_or_else(|| fact.content.clone());
                    let metadata = provenance_metadata(&options);
                    let memory = self.store.insert(tenant, content, embedding, metadata).await?;
                    applied.push(memory);
                }
                ConsolidationAction::Update => {
                    let id = target_id.expect("requires_id branch guarantees Some");
                    let content = decision.content.unwrap_or_else(|| fact.content.clone());
                    // Re-embedding is mandatory whenever content changes.
                    let re_embedded = self.embedder.embed(&content).await?;
                    let update = MemoryUpdate {
                        content: Some(content),
                        embedding: Some(re_embedded),
                        metadata: None,
                    };
                    let memory = self.store.update(id, update).await?;
                    applied.push(memory);
                }
                ConsolidationAction::Delete => {
                    let id = target_id.expect("requires_id branch guarantees Some");
                    self.store.delete(id).await?;
                }
                ConsolidationAction::None => {}
            }
        }

        Ok(applied)
    }

    /// Embeds `context` and returns the nearest memories in `tenant`,
    /// optionally dropping rows below `threshold` (recomputed client-side so
    /// the rule is uniform regardless of the adapter's native metric).
    pub async fn query(&self, context: &str, tenant: &str, options: QueryOptions) -> Result<Vec<Memory>> {
        let embedding = self.embedder.embed(context).await?;
        let rows = self
            .store
            .query_by_embedding(&embedding, tenant, options.limit)
            .await?;
        Ok(match options.threshold {
            Some(threshold) => rows
                .into_iter()
                .filter(|m| cosine_similarity(&m.embedding, &embedding) >= threshold)
                .collect(),
            None => rows,
        })
    }

    /// Lists a tenant's memories, `created_at DESC`.
    pub async fn list(&self, tenant: &str, options: ListOptions) -> Result<Vec<Memory>> {
        self.store.list(tenant, options).await
    }

    /// Fetches a memory by id.
    pub async fn get(&self, id: Uuid) -> Result<Option<Memory>> {
        self.store.get(id).await
    }

    /// Partially updates a memory. Re-embeds only when `content` is present.
    pub async fn update(
        &self,
        id: Uuid,
        content: Option<String>,
        metadata: Option<Metadata>,
    ) -> Result<Memory> {
        let embedding = match &content {
            Some(content) => Some(self.embedder.embed(content).await?),
            None => None,
        };
        self.store
            .update(id, MemoryUpdate { content, embedding, metadata })
            .await
    }

    /// Deletes a memory by id. Idempotent.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.store.delete(id).await
    }

    /// Removes every memory for a tenant.
    pub async fn clear(&self, tenant: &str) -> Result<()> {
        self.store.clear(tenant).await
    }

    /// Counts a tenant's memories.
    pub async fn count(&self, tenant: &str) -> Result<usize> {
        self.store.count(tenant).await
    }
}

fn provenance_metadata(options: &ExtractOptions) -> Metadata {
    let mut metadata = Map::new();
    if let Some(source) = &options.source {
        metadata.insert("source".into(), Value::String(source.clone()));
    }
    if let Some(source_id) = &options.source_id {
        metadata.insert("sourceId".into(), Value::String(source_id.clone()));
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryVectorStore;
    use core::future::Future;
    use futures_core::Stream;
    use recall_core::llm::{Event, LLMRequest, model::Profile};
    use schemars::JsonSchema;
    use serde::de::DeserializeOwned;
    use std::sync::Mutex;

    /// A language model that returns queued canned JSON responses.
    struct ScriptedLlm {
        responses: Mutex<std::collections::VecDeque<String>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().map(str::to_string).collect()),
            }
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("scripted llm exhausted")]
    struct ScriptedLlmError;

    impl LanguageModel for ScriptedLlm {
        type Error = ScriptedLlmError;

        fn respond(&self, _request: LLMRequest) -> impl Stream<Item = Result<Event, Self::Error>> + Send {
            futures_lite::stream::once(Ok(Event::Text(String::new())))
        }

        fn generate<T: JsonSchema + DeserializeOwned + 'static>(
            &self,
            _request: LLMRequest,
        ) -> impl Future<Output = recall_core::Result<T>> + Send {
            let next = self.responses.lock().unwrap().pop_front();
            async move {
                let json = next.ok_or_else(|| recall_core::Error::msg("scripted llm exhausted"))?;
                Ok(serde_json::from_str(&json)?)
            }
        }

        fn profile(&self) -> impl Future<Output = Profile> + Send {
            async { Profile::new("scripted", "test", "scripted", "test double", 4096) }
        }
    }

    /// An embedder that hashes text deterministically into a 3-wide vector.
    struct StubEmbedder;

    impl EmbeddingModel for StubEmbedder {
        fn dim(&self) -> usize {
            3
        }

        async fn embed(&self, text: &str) -> recall_core::Result<Vec<f32>> {
            Ok(match text {
                s if s.contains("Google") && s.contains("no longer") => vec![0.1, 0.1, 0.9],
                s if s.contains("Google") => vec![0.9, 0.1, 0.1],
                s if s.contains("John Doe") => vec![0.1, 0.9, 0.2],
                s if s.contains("John") => vec![0.1, 0.9, 0.1],
                _ => vec![0.3, 0.3, 0.3],
            })
        }
    }

    async fn seed(store: &InMemoryVectorStore, tenant: &str, content: &str, embedding: Vec<f32>) -> Uuid {
        store
            .insert(tenant, content.to_string(), embedding, Map::new())
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn add_with_no_neighbours() {
        let store = InMemoryVectorStore::new();
        let llm = ScriptedLlm::new(vec![r#"{"facts":[{"content":"User works at Google"}]}"#]);
        let client = MemoryClient::new(llm, StubEmbedder, store);

        let applied = client.extract("I work at Google", "t", ExtractOptions::default()).await.unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].content, "User works at Google");
        assert_eq!(client.count("t").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_merges_and_reembeds() {
        let store = InMemoryVectorStore::new();
        seed(&store, "t", "User's name is John", vec![0.1, 0.9, 0.1]).await;

        let llm = ScriptedLlm::new(vec![
            r#"{"facts":[{"content":"User's name is John Doe"}]}"#,
            r#"{"action":"UPDATE","id":"0","content":"User's name is John Doe"}"#,
        ]);
        let client = MemoryClient::new(llm, StubEmbedder, store);

        let applied = client
            .extract("My name is John Doe", "t", ExtractOptions::default())
            .await
            .unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].content, "User's name is John Doe");
        assert_eq!(applied[0].embedding, vec![0.1, 0.9, 0.2]);
        assert_eq!(client.count("t").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_removes_and_returns_empty() {
        let store = InMemoryVectorStore::new();
        seed(&store, "t", "User works at Google", vec![0.9, 0.1, 0.1]).await;

        let llm = ScriptedLlm::new(vec![
            r#"{"facts":[{"content":"User no longer works at Google"}]}"#,
            r#"{"action":"DELETE","id":"0"}"#,
        ]);
        let client = MemoryClient::new(llm, StubEmbedder, store);

        let applied = client
            .extract("I quit Google", "t", ExtractOptions::default())
            .await
            .unwrap();
        assert!(applied.is_empty());
        assert_eq!(client.count("t").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn none_is_a_no_op() {
        let store = InMemoryVectorStore::new();
        seed(&store, "t", "User's name is John", vec![0.1, 0.9, 0.1]).await;

        let llm = ScriptedLlm::new(vec![
            r#"{"facts":[{"content":"User's name is John"}]}"#,
            r#"{"action":"NONE"}"#,
        ]);
        let client = MemoryClient::new(llm, StubEmbedder, store);

        let applied = client
            .extract("My name is John", "t", ExtractOptions::default())
            .await
            .unwrap();
        assert!(applied.is_empty());
        assert_eq!(client.count("t").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn invalid_ordinal_degrades_to_add() {
        let store = InMemoryVectorStore::new();
        seed(&store, "t", "User's name is John", vec![0.1, 0.9, 0.1]).await;

        let llm = ScriptedLlm::new(vec![
            r#"{"facts":[{"content":"User's name is Jane"}]}"#,
            r#"{"action":"UPDATE","id":"99","content":"User's name is Jane"}"#,
        ]);
        let client = MemoryClient::new(llm, StubEmbedder, store);

        let applied = client
            .extract("My name is Jane", "t", ExtractOptions::default())
            .await
            .unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(client.count("t").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn query_applies_threshold_client_side() {
        let store = InMemoryVectorStore::new();
        seed(&store, "t", "near", vec![1.0, 0.0, 0.0]).await;
        seed(&store, "t", "far", vec![0.0, 1.0, 0.0]).await;

        let llm = ScriptedLlm::new(vec![]);
        let client = MemoryClient::new(llm, AxisEmbedder, store);

        let results = client
            .query("q", "t", QueryOptions { limit: 10, threshold: Some(0.5) })
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "near");
    }

    struct AxisEmbedder;
    impl EmbeddingModel for AxisEmbedder {
        fn dim(&self) -> usize {
            3
        }
        async fn embed(&self, _text: &str) -> recall_core::Result<Vec<f32>> {
            Ok(vec![1.0, 0.0, 0.0])
        }
    }
}
