//! SQLite-backed [`VectorStore`].
//!
//! Cosine similarity has no native SQLite operator, so `queryByEmbedding`
//! loads the tenant's rows and scores them in Rust — a brute-force path
//! alongside which a native vector index can coexist.

use std::sync::Arc;

use recall_memory::{
    MemoryError, MemoryUpdate, Metadata,
    model::Memory,
    store::{ListOptions, VectorStore, cosine_similarity},
};
use sqlx::{Row, SqlitePool, sqlite::SqlitePoolOptions};
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// `anyhow`-wrapped result, matching [`recall_memory::error::MemoryError::Storage`].
type Result<T> = core::result::Result<T, MemoryError>;

/// SQLite-backed implementation of the vector store adapter contract.
#[derive(Debug, Clone)]
pub struct SqliteVectorStore {
    pool: Arc<SqlitePool>,
}

impl SqliteVectorStore {
    /// Connects to `url` (a file path or `:memory:`) and materialises the
    /// `memories` table if it doesn't already exist.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&format!("sqlite:{url}?mode=rwc"))
            .await?;
        let store = Self { pool: Arc::new(pool) };
        store.migrate().await?;
        Ok(store)
    }

    /// Adopts an already-connected pool.
    #[must_use]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS memories (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                content TEXT NOT NULL,
                embedding TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&*self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_memories_user_id ON memories(user_id)")
            .execute(&*self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_memory(row: &sqlx::sqlite::SqliteRow) -> Result<Memory> {
    let id: String = row.try_get("id").map_err(storage_err)?;
    let embedding: String = row.try_get("embedding").map_err(storage_err)?;
    let metadata: String = row.try_get("metadata").map_err(storage_err)?;
    let created_at: String = row.try_get("created_at").map_err(storage_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(storage_err)?;

    Ok(Memory {
        id: Uuid::parse_str(&id).map_err(|e| MemoryError::Storage(anyhow::Error::new(e)))?,
        tenant: row.try_get("user_id").map_err(storage_err)?,
        content: row.try_get("content").map_err(storage_err)?,
        embedding: serde_json::from_str(&embedding).map_err(|e| MemoryError::Storage(anyhow::Error::new(e)))?,
        metadata: serde_json::from_str::<Metadata>(&metadata).map_err(|e| MemoryError::Storage(anyhow::Error::new(e)))?,
        created_at: time::OffsetDateTime::parse(&created_at, &Rfc3339).map_err(|e| MemoryError::Storage(anyhow::Error::new(e)))?,
        updated_at: time::OffsetDateTime::parse(&updated_at, &Rfc3339).map_err(|e| MemoryError::Storage(anyhow::Error::new(e)))?,
    })
}

fn storage_err(e: sqlx::Error) -> MemoryError {
    MemoryError::Storage(anyhow::Error::new(e))
}

impl VectorStore for SqliteVectorStore {
    async fn insert(&self, tenant: &str, content: String, embedding: Vec<f32>, metadata: Metadata) -> Result<Memory> {
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

        let embedding_json = serde_json::to_string(&memory.embedding).map_err(|e| MemoryError::Storage(anyhow::Error::new(e)))?;
        let metadata_json = serde_json::to_string(&memory.metadata).map_err(|e| MemoryError::Storage(anyhow::Error::new(e)))?;
        let created_at = memory.created_at.format(&Rfc3339).map_err(|e| MemoryError::Storage(anyhow::Error::new(e)))?;

        sqlx::query(
            "INSERT INTO memories (id, user_id, content, embedding, metadata, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(memory.id.to_string())
        .bind(&memory.tenant)
        .bind(&memory.content)
        .bind(&embedding_json)
        .bind(&metadata_json)
        .bind(&created_at)
        .bind(&created_at)
        .execute(&*self.pool)
        .await
        .map_err(storage_err)?;

        tracing::debug!(id = %memory.id, tenant, "inserted memory");
        Ok(memory)
    }

    async fn update(&self, id: Uuid, update: MemoryUpdate) -> Result<Memory> {
        let mut memory = self.get(id).await?.ok_or(MemoryError::NotFound(id))?;

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

        let embedding_json = serde_json::to_string(&memory.embedding).map_err(|e| MemoryError::Storage(anyhow::Error::new(e)))?;
        let metadata_json = serde_json::to_string(&memory.metadata).map_err(|e| MemoryError::Storage(anyhow::Error::new(e)))?;
        let updated_at = memory.updated_at.format(&Rfc3339).map_err(|e| MemoryError::Storage(anyhow::Error::new(e)))?;

        sqlx::query(
            "UPDATE memories SET content = ?, embedding = ?, metadata = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&memory.content)
        .bind(&embedding_json)
        .bind(&metadata_json)
        .bind(&updated_at)
        .bind(memory.id.to_string())
        .execute(&*self.pool)
        .await
        .map_err(storage_err)?;

        tracing::debug!(id = %memory.id, "updated memory");
        Ok(memory)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM memories WHERE id = ?")
            .bind(id.to_string())
            .execute(&*self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Memory>> {
        let row = sqlx::query("SELECT * FROM memories WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&*self.pool)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(row_to_memory).transpose()
    }

    async fn list(&self, tenant: &str, options: ListOptions) -> Result<Vec<Memory>> {
        // SQLite treats a negative LIMIT as "no limit".
        let limit = options.limit.map_or(-1, |l| l as i64);
        let offset = options.offset.unwrap_or(0) as i64;
        let rows = sqlx::query(
            "SELECT * FROM memories WHERE user_id = ? ORDER BY created_at DESC, rowid ASC LIMIT ? OFFSET ?",
        )
        .bind(tenant)
        .bind(limit)
        .bind(offset)
        .fetch_all(&*self.pool)
        .await
        .map_err(storage_err)?;
        rows.iter().map(row_to_memory).collect()
    }

    async fn count(&self, tenant: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memories WHERE user_id = ?")
            .bind(tenant)
            .fetch_one(&*self.pool)
            .await
            .map_err(storage_err)?;
        Ok(count as usize)
    }

    async fn clear(&self, tenant: &str) -> Result<()> {
        sqlx::query("DELETE FROM memories WHERE user_id = ?")
            .bind(tenant)
            .execute(&*self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn query_by_embedding(&self, query: &[f32], tenant: &str, k: usize) -> Result<Vec<Memory>> {
        let rows = sqlx::query("SELECT * FROM memories WHERE user_id = ?")
            .bind(tenant)
            .fetch_all(&*self.pool)
            .await
            .map_err(storage_err)?;

        let mut scored: Vec<(f32, Memory)> = rows
            .iter()
            .map(row_to_memory)
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .map(|m| (cosine_similarity(query, &m.embedding), m))
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

    async fn store() -> SqliteVectorStore {
        SqliteVectorStore::connect(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn adapter_round_trip() {
        let store = store().await;
        let inserted = store.insert("tenant-a", "fact".into(), vec![1.0, 0.0], Map::new()).await.unwrap();
        let fetched = store.get(inserted.id).await.unwrap().unwrap();
        assert_eq!(fetched.content, inserted.content);
        assert_eq!(fetched.embedding, inserted.embedding);
        assert_eq!(fetched.created_at, fetched.updated_at);
    }

    #[tokio::test]
    async fn tenant_isolation() {
        let store = store().await;
        store.insert("t1", "a".into(), vec![1.0, 0.0, 0.0], Map::new()).await.unwrap();
        store.insert("t2", "b".into(), vec![1.0, 0.0, 0.0], Map::new()).await.unwrap();

        let list_t1 = store.list("t1", ListOptions::default()).await.unwrap();
        assert_eq!(list_t1.len(), 1);
        assert_eq!(list_t1[0].tenant, "t1");

        let neighbours = store.query_by_embedding(&[1.0, 0.0, 0.0], "t2", 10).await.unwrap();
        assert!(neighbours.iter().all(|m| m.tenant == "t2"));
    }

    #[tokio::test]
    async fn query_by_embedding_orders_by_cosine_descending() {
        let store = store().await;
        store.insert("t1", "mid".into(), vec![0.5, 0.5, 0.5], Map::new()).await.unwrap();
        store.insert("t1", "near".into(), vec![0.9, 0.1, 0.1], Map::new()).await.unwrap();
        store.insert("t1", "far".into(), vec![0.1, 0.9, 0.1], Map::new()).await.unwrap();

        let ranked = store.query_by_embedding(&[1.0, 0.0, 0.0], "t1", 3).await.unwrap();
        let contents: Vec<&str> = ranked.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["near", "mid", "far"]);
    }

    #[tokio::test]
    async fn update_with_content_re_embeds_and_advances_timestamp() {
        let store = store().await;
        let inserted = store.insert("t1", "old".into(), vec![1.0, 0.0], Map::new()).await.unwrap();
        let updated = store
            .update(
                inserted.id,
                MemoryUpdate { content: Some("new".into()), embedding: Some(vec![0.0, 1.0]), metadata: None },
            )
            .await
            .unwrap();
        assert_eq!(updated.content, "new");
        assert_eq!(updated.embedding, vec![0.0, 1.0]);
        assert!(updated.updated_at >= inserted.updated_at);
    }

    #[tokio::test]
    async fn clear_removes_only_the_given_tenant() {
        let store = store().await;
        store.insert("t1", "a".into(), vec![1.0], Map::new()).await.unwrap();
        store.insert("t2", "b".into(), vec![1.0], Map::new()).await.unwrap();
        store.clear("t1").await.unwrap();
        assert_eq!(store.count("t1").await.unwrap(), 0);
        assert_eq!(store.count("t2").await.unwrap(), 1);
    }
}
