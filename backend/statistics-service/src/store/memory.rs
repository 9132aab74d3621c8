//! In-memory aggregate store
//!
//! Keeps every physical row with a write sequence number and resolves the
//! effective projection on each read.

use async_trait::async_trait;
use event_schema::{EventKind, InteractionEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use super::{AggregateStore, SubjectCount, UserCount};
use crate::error::Result;

#[derive(Debug, Clone)]
struct PhysicalRow {
    sequence: u64,
    post_id: String,
    author: String,
    username: String,
}

#[derive(Default)]
pub struct MemoryAggregateStore {
    tables: RwLock<HashMap<EventKind, Vec<PhysicalRow>>>,
    sequence: AtomicU64,
}

impl MemoryAggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Physical rows written to `kind`'s table, duplicates included
    pub async fn physical_rows(&self, kind: EventKind) -> usize {
        self.tables
            .read()
            .await
            .get(&kind)
            .map(|rows| rows.len())
            .unwrap_or(0)
    }

    /// Newest physical row per `(post_id, username)`
    async fn effective_rows(&self, kind: EventKind) -> Vec<PhysicalRow> {
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(&kind) else {
            return Vec::new();
        };

        let mut newest: HashMap<(&str, &str), &PhysicalRow> = HashMap::new();
        for row in rows {
            newest
                .entry((row.post_id.as_str(), row.username.as_str()))
                .and_modify(|current| {
                    if row.sequence > current.sequence {
                        *current = row;
                    }
                })
                .or_insert(row);
        }

        newest.into_values().cloned().collect()
    }
}

/// Highest count first, ties broken by key
fn rank<K: Ord>(counts: HashMap<K, u64>, k: usize) -> Vec<(K, u64)> {
    let mut ranked: Vec<(K, u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(k);
    ranked
}

#[async_trait]
impl AggregateStore for MemoryAggregateStore {
    async fn initialize(&self) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.clear();
        for kind in EventKind::ALL {
            tables.insert(kind, Vec::new());
        }
        Ok(())
    }

    async fn insert(&self, kind: EventKind, event: &InteractionEvent) -> Result<()> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.tables
            .write()
            .await
            .entry(kind)
            .or_default()
            .push(PhysicalRow {
                sequence,
                post_id: event.post_id.clone(),
                author: event.author.clone(),
                username: event.username.clone(),
            });
        Ok(())
    }

    async fn count(&self, kind: EventKind, post_id: &str) -> Result<u64> {
        Ok(self
            .effective_rows(kind)
            .await
            .iter()
            .filter(|row| row.post_id == post_id)
            .count() as u64)
    }

    async fn top_subjects(&self, kind: EventKind, k: usize) -> Result<Vec<SubjectCount>> {
        let mut counts: HashMap<(String, String), u64> = HashMap::new();
        for row in self.effective_rows(kind).await {
            *counts.entry((row.post_id, row.author)).or_default() += 1;
        }

        Ok(rank(counts, k)
            .into_iter()
            .map(|((post_id, author), count)| SubjectCount {
                post_id,
                author,
                count,
            })
            .collect())
    }

    async fn top_actors(&self, kind: EventKind, k: usize) -> Result<Vec<UserCount>> {
        let mut counts: HashMap<String, u64> = HashMap::new();
        for row in self.effective_rows(kind).await {
            *counts.entry(row.username).or_default() += 1;
        }

        Ok(rank(counts, k)
            .into_iter()
            .map(|(username, count)| UserCount { username, count })
            .collect())
    }

    async fn top_owners(&self, kind: EventKind, k: usize) -> Result<Vec<UserCount>> {
        let mut counts: HashMap<String, u64> = HashMap::new();
        for row in self.effective_rows(kind).await {
            *counts.entry(row.author).or_default() += 1;
        }

        Ok(rank(counts, k)
            .into_iter()
            .map(|(username, count)| UserCount { username, count })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn like(post: &str, author: &str, user: &str) -> InteractionEvent {
        InteractionEvent::new(post, author, user)
    }

    #[tokio::test]
    async fn test_duplicates_collapse_to_one_effective_row() {
        let store = MemoryAggregateStore::new();
        let event = like("42", "alice", "bob");

        store.insert(EventKind::Like, &event).await.unwrap();
        let once = store.count(EventKind::Like, "42").await.unwrap();
        store.insert(EventKind::Like, &event).await.unwrap();
        let twice = store.count(EventKind::Like, "42").await.unwrap();

        assert_eq!(once, 1);
        assert_eq!(twice, once);
        assert_eq!(store.physical_rows(EventKind::Like).await, 2);
    }

    #[tokio::test]
    async fn test_missing_subject_counts_zero() {
        let store = MemoryAggregateStore::new();
        assert_eq!(store.count(EventKind::View, "nope").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_kinds_are_separate_tables() {
        let store = MemoryAggregateStore::new();
        store
            .insert(EventKind::Like, &like("1", "alice", "bob"))
            .await
            .unwrap();

        assert_eq!(store.count(EventKind::Like, "1").await.unwrap(), 1);
        assert_eq!(store.count(EventKind::View, "1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_newest_duplicate_wins() {
        let store = MemoryAggregateStore::new();
        store
            .insert(EventKind::Like, &like("1", "", "bob"))
            .await
            .unwrap();
        store
            .insert(EventKind::Like, &like("1", "alice", "bob"))
            .await
            .unwrap();

        let top = store.top_subjects(EventKind::Like, 10).await.unwrap();
        assert_eq!(
            top,
            vec![SubjectCount {
                post_id: "1".into(),
                author: "alice".into(),
                count: 1
            }]
        );
    }

    #[tokio::test]
    async fn test_top_subjects_respects_k_and_order() {
        let store = MemoryAggregateStore::new();
        for user in ["a", "b", "c"] {
            store
                .insert(EventKind::Like, &like("1", "alice", user))
                .await
                .unwrap();
        }
        for user in ["a", "b"] {
            store
                .insert(EventKind::Like, &like("2", "carol", user))
                .await
                .unwrap();
        }
        store
            .insert(EventKind::Like, &like("3", "dave", "a"))
            .await
            .unwrap();

        assert!(store.top_subjects(EventKind::Like, 0).await.unwrap().is_empty());

        let top = store.top_subjects(EventKind::Like, 2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].post_id, "1");
        assert_eq!(top[0].count, 3);
        assert_eq!(top[1].post_id, "2");
        for entry in &top {
            let independent = store.count(EventKind::Like, &entry.post_id).await.unwrap();
            assert_eq!(entry.count, independent);
        }
    }

    #[tokio::test]
    async fn test_top_actors_and_owners() {
        let store = MemoryAggregateStore::new();
        store
            .insert(EventKind::Like, &like("1", "alice", "bob"))
            .await
            .unwrap();
        store
            .insert(EventKind::Like, &like("2", "alice", "bob"))
            .await
            .unwrap();
        store
            .insert(EventKind::Like, &like("2", "alice", "bob"))
            .await
            .unwrap();
        store
            .insert(EventKind::Like, &like("3", "carol", "dave"))
            .await
            .unwrap();

        let actors = store.top_actors(EventKind::Like, 1).await.unwrap();
        assert_eq!(
            actors,
            vec![UserCount {
                username: "bob".into(),
                count: 2
            }]
        );

        let owners = store.top_owners(EventKind::Like, 5).await.unwrap();
        assert_eq!(owners[0].username, "alice");
        assert_eq!(owners[0].count, 2);
        assert_eq!(owners.len(), 2);
    }

    #[tokio::test]
    async fn test_initialize_truncates() {
        let store = MemoryAggregateStore::new();
        store
            .insert(EventKind::View, &like("1", "alice", "bob"))
            .await
            .unwrap();
        store.initialize().await.unwrap();

        assert_eq!(store.physical_rows(EventKind::View).await, 0);
    }
}
