//! The vector store adapter contract and an in-memory reference implementation.

use core::future::Future;

use async_lock::RwLock;
use uuid::Uuid;

use crate::{
    error::{MemoryError, Result},
    model::{Memory, MemoryUpdate, Metadata},
};

/// Pagination for [`VectorStore::list`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ListOptions {
    /// Maximum rows to return.
    pub limit: Option<usize>,
    /// Rows to skip before collecting `limit`.
    pub offset: Option<usize>,
}

impl ListOptions {
    /// Caps the result at `limit` rows.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `offset` rows.
    #[must_use]
    pub const fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Row CRUD plus k-NN-by-cosine over a per-tenant-partitioned memory table.
///
/// Every operation is explicit about tenancy except `get`, `update`, and
/// `delete`, which address a row by its globally unique id. Implementations
/// must accept arbitrary embedding width `d` at the first insert and reject
/// any later insert whose embedding length differs.
pub trait VectorStore: Send + Sync {
    /// Inserts a new row, assigning a fresh id and `created_at == updated_at`.
    fn insert(
        &self,
        tenant: &str,
        content: String,
        embedding: Vec<f32>,
        metadata: Metadata,
    ) -> impl Future<Output = Result<Memory>> + Send;

    /// Applies a partial update; advances `updated_at`. Fails with
    /// [`MemoryError::NotFound`] if `id` is absent.
    fn update(&self, id: Uuid, update: MemoryUpdate) -> impl Future<Output = Result<Memory>> + Send;

    /// Removes a row. Idempotent: a missing id is not an error.
    fn delete(&self, id: Uuid) -> impl Future<Output = Result<()>> + Send;

    /// Fetches a single row by id.
    fn get(&self, id: Uuid) -> impl Future<Output = Result<Option<Memory>>> + Send;

    /// Lists rows for a tenant, `created_at DESC`, stable within equal timestamps.
    fn list(&self, tenant: &str, options: ListOptions) -> impl Future<Output = Result<Vec<Memory>>> + Send;

    /// Counts rows for a tenant.
    fn count(&self, tenant: &str) -> impl Future<Output = Result<usize>> + Send;

    /// Removes every row for a tenant.
    fn clear(&self, tenant: &str) -> impl Future<Output = Result<()>> + Send;

    /// Returns the top-`k` rows by cosine similarity, descending, filtered to
    /// `tenant` *before* scoring.
    fn query_by_embedding(
        &self,
        query: &[f32],
        tenant: &str,
        k: usize,
    ) -> impl Future<Output = Result<Vec<Memory>>> + Send;
}

/// Cosine similarity: `Σ aᵢbᵢ / (√Σaᵢ² · √Σbᵢ²)`. Zero-norm inputs score `0.0`.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Brute-force, non-durable [`VectorStore`] for tests and prototyping.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    rows: RwLock<Vec<Memory>>,
}

impl InMemoryVectorStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl VectorStore for InMemoryVectorStore {
    async fn insert(
        &self,
        tenant: &str,
        content: String,
        embedding: Vec<f32>,
        metadata: Metadata,
    ) -> Result<Memory> {
        let now = time::OffsetDateTime::now_utc();
        let memory = Memory {
            id: Uuid::new_v4(),
            tenant: tenant.to_string(),
            content,
            embedding,
            metadata,
            created_at: now,
            updated_at: now,
        };
        self.rows.write().await.push(memory.clone());
        Ok(memory)
    }

    async fn update(&self, id: Uuid, update: MemoryUpdate) -> Result<Memory> {
        let mut rows = self.rows.write().await;
        let memory = rows
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(MemoryError::NotFound(id))?;

        if let Some(content) = update.content {
            memory.content = content;
        }
        if let Some(embedding) = update.embedding {
            memory.embedding = embedding;
        }
        if let Some(metadata) = update.metadata {
            memory.metadata = metadata;
        }
        memory.updated_at = time::OffsetDateTime::now_utc();
        Ok(memory.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.rows.write().await.retain(|m| m.id != id);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Memory>> {
        Ok(self.rows.read().await.iter().find(|m| m.id == id).cloned())
    }

    async fn list(&self, tenant: &str, options: ListOptions) -> Result<Vec<Memory>> {
        let mut rows: Vec<Memory> = self
            .rows
            .read()
            .await
            .iter()
            .filter(|m| m.tenant == tenant)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = options.offset.unwrap_or(0);
        let iter = rows.into_iter().skip(offset);
        Ok(match options.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        })
    }

    async fn count(&self, tenant: &str) -> Result<usize> {
        Ok(self.rows.read().await.iter().filter(|m| m.tenant == tenant).count())
    }

    async fn clear(&self, tenant: &str) -> Result<()> {
        self.rows.write().await.retain(|m| m.tenant != tenant);
        Ok(())
    }

    async fn query_by_embedding(&self, query: &[f32], tenant: &str, k: usize) -> Result<Vec<Memory>> {
        let mut scored: Vec<(f32, Memory)> = self
            .rows
            .read()
            .await
            .iter()
            .filter(|m| m.tenant == tenant)
            .map(|m| (cosine_similarity(query, &m.embedding), m.clone()))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(k);
        Ok(scored.into_iter().map(|(_, m)| m).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[tokio::test]
    async fn adapter_round_trip() {
        let store = InMemoryVectorStore::new();
        let inserted = store
            .insert("tenant-a", "fact".into(), vec![1.0, 0.0], Map::new())
            .await
            .unwrap();
        let fetched = store.get(inserted.id).await.unwrap().unwrap();
        assert_eq!(fetched.content, inserted.content);
        assert_eq!(fetched.embedding, inserted.embedding);
        assert_eq!(fetched.created_at, fetched.updated_at);
    }

    #[tokio::test]
    async fn tenant_isolation() {
        let store = InMemoryVectorStore::new();
        store.insert("t1", "a".into(), vec![1.0, 0.0, 0.0], Map::new()).await.unwrap();
        store.insert("t2", "b".into(), vec![1.0, 0.0, 0.0], Map::new()).await.unwrap();

        let list_t1 = store.list("t1", ListOptions::default()).await.unwrap();
        let list_t2 = store.list("t2", ListOptions::default()).await.unwrap();
        assert!(list_t1.iter().all(|m| m.tenant == "t1"));
        assert!(list_t2.iter().all(|m| m.tenant == "t2"));

        let hits = store.query_by_embedding(&[1.0, 0.0, 0.0], "t1", 10).await.unwrap();
        assert!(hits.iter().all(|m| m.tenant == "t1"));
    }

    #[tokio::test]
    async fn knn_ordering() {
        let store = InMemoryVectorStore::new();
        store.insert("t", "mid".into(), vec![0.5, 0.5, 0.5], Map::new()).await.unwrap();
        store.insert("t", "far".into(), vec![0.1, 0.9, 0.1], Map::new()).await.unwrap();
        store.insert("t", "near".into(), vec![0.9, 0.1, 0.1], Map::new()).await.unwrap();

        let hits = store.query_by_embedding(&[1.0, 0.0, 0.0], "t", 3).await.unwrap();
        let order: Vec<&str> = hits.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(order, vec!["near", "mid", "far"]);
    }

    #[tokio::test]
    async fn re_embedding_law() {
        let store = InMemoryVectorStore::new();
        let memory = store
            .insert("t", "orig".into(), vec![1.0, 0.0], Map::new())
            .await
            .unwrap();

        let updated = store
            .update(
                memory.id,
                MemoryUpdate {
                    content: Some("changed".into()),
                    embedding: Some(vec![0.0, 1.0]),
                    metadata: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.embedding, vec![0.0, 1.0]);
        assert_eq!(updated.metadata, memory.metadata);
        assert!(updated.updated_at >= memory.updated_at);
    }

    #[tokio::test]
    async fn update_missing_id_fails() {
        let store = InMemoryVectorStore::new();
        let result = store.update(Uuid::new_v4(), MemoryUpdate::default()).await;
        assert!(matches!(result, Err(MemoryError::NotFound(_))));
    }
}
