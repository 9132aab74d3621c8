//! Aggregation query engine
//!
//! Point counts and top-N rankings over the deduplicated aggregate tables.
//! Nothing is cached; every call re-aggregates through the store.

use event_schema::EventKind;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::config::QueryConfig;
use crate::error::{Result, StatisticsError};
use crate::metrics;
use crate::store::{AggregateStore, SubjectCount, UserCount};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostStatistics {
    pub post_id: String,
    pub likes: u64,
    pub views: u64,
}

/// How `top_users` ranks people
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRanking {
    /// Users who gave the most likes
    #[default]
    Actors,
    /// Authors whose posts received the most likes
    Owners,
}

impl FromStr for UserRanking {
    type Err = StatisticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "actors" | "likers" => Ok(UserRanking::Actors),
            "owners" | "authors" => Ok(UserRanking::Owners),
            other => Err(StatisticsError::Validation(format!(
                "Unknown ranking: {}",
                other
            ))),
        }
    }
}

#[derive(Clone)]
pub struct StatisticsQuery {
    store: Arc<dyn AggregateStore>,
    config: QueryConfig,
}

impl StatisticsQuery {
    pub fn new(store: Arc<dyn AggregateStore>, config: QueryConfig) -> Self {
        Self { store, config }
    }

    fn resolve_limit(&self, requested: Option<usize>, default: usize) -> Result<usize> {
        let limit = requested.unwrap_or(default);
        if limit > self.config.max_limit {
            return Err(StatisticsError::Validation(format!(
                "limit {} exceeds maximum of {}",
                limit, self.config.max_limit
            )));
        }
        Ok(limit)
    }

    /// Distinct users who liked/viewed `post_id`
    pub async fn count(&self, kind: EventKind, post_id: &str) -> Result<u64> {
        let started = Instant::now();
        let result = self.store.count(kind, post_id).await;
        metrics::record_query_duration("count", started.elapsed());
        result
    }

    /// Like and view counts for one post
    pub async fn post_statistics(&self, post_id: &str) -> Result<PostStatistics> {
        let likes = self.count(EventKind::Like, post_id).await?;
        let views = self.count(EventKind::View, post_id).await?;

        debug!(post_id = %post_id, likes, views, "Computed post statistics");

        Ok(PostStatistics {
            post_id: post_id.to_string(),
            likes,
            views,
        })
    }

    /// Posts with the most likes or views
    pub async fn top_posts(
        &self,
        kind: EventKind,
        limit: Option<usize>,
    ) -> Result<Vec<SubjectCount>> {
        let limit = self.resolve_limit(limit, self.config.top_posts_limit)?;

        let started = Instant::now();
        let result = self.store.top_subjects(kind, limit).await;
        metrics::record_query_duration("top_posts", started.elapsed());
        result
    }

    /// Users ranked by likes, either given (`Actors`) or received (`Owners`)
    pub async fn top_users(
        &self,
        limit: Option<usize>,
        ranking: UserRanking,
    ) -> Result<Vec<UserCount>> {
        let limit = self.resolve_limit(limit, self.config.top_users_limit)?;

        let started = Instant::now();
        let result = match ranking {
            UserRanking::Actors => self.store.top_actors(EventKind::Like, limit).await,
            UserRanking::Owners => self.store.top_owners(EventKind::Like, limit).await,
        };
        metrics::record_query_duration("top_users", started.elapsed());
        result
    }
}
