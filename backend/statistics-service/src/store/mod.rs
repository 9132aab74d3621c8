//! Deduplicating aggregate store
//!
//! Writes append a physical row per received event and never reject a duplicate.
//! Reads resolve duplicates lazily: per `(post_id, username)` only the most
//! recently written row survives, and every aggregate is computed over that
//! effective projection.

use async_trait::async_trait;
use event_schema::{EventKind, InteractionEvent};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod clickhouse_db;
pub mod memory;

pub use clickhouse_db::{ClickHouseAggregateStore, ClickHouseStoreConfig};
pub use memory::MemoryAggregateStore;

/// Effective row count for one post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectCount {
    pub post_id: String,
    pub author: String,
    pub count: u64,
}

/// Effective row count for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCount {
    pub username: String,
    pub count: u64,
}

#[async_trait]
pub trait AggregateStore: Send + Sync {
    /// Drop and recreate the aggregate tables. Only called at process start.
    async fn initialize(&self) -> Result<()>;

    /// Append one physical row for `event`
    async fn insert(&self, kind: EventKind, event: &InteractionEvent) -> Result<()>;

    /// Number of distinct effective rows for `post_id`, 0 when none exist
    async fn count(&self, kind: EventKind, post_id: &str) -> Result<u64>;

    /// Up to `k` posts ranked by effective row count, grouped by post and author
    async fn top_subjects(&self, kind: EventKind, k: usize) -> Result<Vec<SubjectCount>>;

    /// Up to `k` acting users ranked by effective row count
    async fn top_actors(&self, kind: EventKind, k: usize) -> Result<Vec<UserCount>>;

    /// Up to `k` post authors ranked by effective rows received on their posts
    async fn top_owners(&self, kind: EventKind, k: usize) -> Result<Vec<UserCount>>;
}
