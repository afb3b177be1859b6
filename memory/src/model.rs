use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

/// Open string-keyed bag attached to a memory. Reserved keys: `source`, `sourceId`.
pub type Metadata = Map<String, Value>;

/// A single persisted memory: a third-person fact plus its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Stable identifier, assigned at insertion.
    pub id: Uuid,
    /// Opaque tenant/user identifier this row is partitioned under.
    pub tenant: String,
    /// Third-person atomic fact.
    pub content: String,
    /// Dense embedding of `content`, `d` elements wide for the lifetime of the store.
    pub embedding: Vec<f32>,
    /// Open metadata bag.
    #[serde(default)]
    pub metadata: Metadata,
    /// Creation timestamp, millisecond precision.
    pub created_at: OffsetDateTime,
    /// Last-mutation timestamp, millisecond precision.
    pub updated_at: OffsetDateTime,
}

/// Partial update for [`Memory`]; `None` fields are left untouched.
///
/// Re-embedding is the caller's responsibility: the store never re-derives
/// `embedding` from `content` on its own.
#[derive(Debug, Clone, Default)]
pub struct MemoryUpdate {
    /// New content, if changing.
    pub content: Option<String>,
    /// New embedding, if changing (must accompany a content change).
    pub embedding: Option<Vec<f32>>,
    /// Replacement metadata bag, if changing.
    pub metadata: Option<Metadata>,
}
