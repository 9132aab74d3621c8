// ============================================
// ClickHouse Aggregate Store
// ============================================
//
// One ReplacingMergeTree table per event kind, sorted by (post_id, username).
// Inserts are plain appends; the engine keeps the last inserted row per sort key
// and `FINAL` applies that merge at read time, so queries always see the
// deduplicated projection even before background merges run.

use async_trait::async_trait;
use clickhouse::{Client, Row};
use event_schema::{EventKind, InteractionEvent};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::{AggregateStore, SubjectCount, UserCount};
use crate::config::ClickHouseConfig;
use crate::error::{Result, StatisticsError};

#[derive(Debug, Clone)]
pub struct ClickHouseStoreConfig {
    pub url: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl From<&ClickHouseConfig> for ClickHouseStoreConfig {
    fn from(config: &ClickHouseConfig) -> Self {
        Self {
            url: config.url.clone(),
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }
}

/// ClickHouse-based implementation of AggregateStore
pub struct ClickHouseAggregateStore {
    client: Client,
    // Same server without a default database, used to create the database itself
    admin: Client,
    database: String,
}

// ============================================
// ClickHouse Row Types
// ============================================

#[derive(Debug, Row, Serialize)]
struct InteractionRow<'a> {
    post_id: &'a str,
    author: &'a str,
    username: &'a str,
}

#[derive(Debug, Row, Deserialize)]
struct CountRow {
    count: u64,
}

#[derive(Debug, Row, Deserialize)]
struct SubjectCountRow {
    post_id: String,
    author: String,
    count: u64,
}

#[derive(Debug, Row, Deserialize)]
struct UserCountRow {
    username: String,
    count: u64,
}

impl ClickHouseAggregateStore {
    pub fn new(config: &ClickHouseStoreConfig) -> Self {
        let admin = Client::default()
            .with_url(&config.url)
            .with_user(&config.username)
            .with_password(&config.password);
        let client = admin.clone().with_database(&config.database);

        info!(
            url = %config.url,
            database = %config.database,
            "ClickHouseAggregateStore initialized"
        );

        Self {
            client,
            admin,
            database: config.database.clone(),
        }
    }

    /// Verify the server is reachable
    pub async fn health_check(&self) -> Result<()> {
        self.admin
            .query("SELECT toUInt64(1) AS count")
            .fetch_one::<CountRow>()
            .await
            .map(|_| ())
            .map_err(|e| {
                error!("ClickHouse health check failed: {}", e);
                StatisticsError::from(e)
            })
    }

    fn create_table_sql(table: &str) -> String {
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                post_id String,
                author String,
                username String
            ) ENGINE = ReplacingMergeTree()
            ORDER BY (post_id, username)
            "#,
            table
        )
    }

    /// Grouped count over the deduplicated table, ordered by count descending
    fn top_sql(table: &str, group_columns: &str) -> String {
        format!(
            r#"
            SELECT {cols}, count() AS count
            FROM {table} FINAL
            GROUP BY {cols}
            ORDER BY count DESC, {cols}
            LIMIT ?
            "#,
            cols = group_columns,
            table = table
        )
    }

    async fn top_users(&self, kind: EventKind, column: &str, k: usize) -> Result<Vec<UserCount>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        // RowBinary decoding is positional, so the grouped column lands in `username`
        let query = Self::top_sql(kind.table(), column);

        let rows = self
            .client
            .query(&query)
            .bind(k as u64)
            .fetch_all::<UserCountRow>()
            .await
            .map_err(|e| {
                error!(error = %e, table = kind.table(), "Failed to fetch top users");
                StatisticsError::from(e)
            })?;

        Ok(rows
            .into_iter()
            .map(|row| UserCount {
                username: row.username,
                count: row.count,
            })
            .collect())
    }
}

#[async_trait]
impl AggregateStore for ClickHouseAggregateStore {
    async fn initialize(&self) -> Result<()> {
        self.admin
            .query(&format!("CREATE DATABASE IF NOT EXISTS {}", self.database))
            .execute()
            .await?;

        for kind in EventKind::ALL {
            let table = kind.table();
            self.client
                .query(&format!("DROP TABLE IF EXISTS {}", table))
                .execute()
                .await?;
            self.client
                .query(&Self::create_table_sql(table))
                .execute()
                .await?;
            debug!(table = %table, "Aggregate table recreated");
        }

        info!(database = %self.database, "ClickHouse aggregate tables initialized");
        Ok(())
    }

    async fn insert(&self, kind: EventKind, event: &InteractionEvent) -> Result<()> {
        let mut insert = self.client.insert(kind.table())?;
        insert
            .write(&InteractionRow {
                post_id: &event.post_id,
                author: &event.author,
                username: &event.username,
            })
            .await?;
        insert.end().await?;
        Ok(())
    }

    async fn count(&self, kind: EventKind, post_id: &str) -> Result<u64> {
        let query = format!(
            "SELECT count() AS count FROM {} FINAL WHERE post_id = ?",
            kind.table()
        );

        let row = self
            .client
            .query(&query)
            .bind(post_id)
            .fetch_one::<CountRow>()
            .await
            .map_err(|e| {
                error!(error = %e, post_id = %post_id, "Failed to count {}", kind.table());
                StatisticsError::from(e)
            })?;

        Ok(row.count)
    }

    async fn top_subjects(&self, kind: EventKind, k: usize) -> Result<Vec<SubjectCount>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows = self
            .client
            .query(&Self::top_sql(kind.table(), "post_id, author"))
            .bind(k as u64)
            .fetch_all::<SubjectCountRow>()
            .await
            .map_err(|e| {
                error!(error = %e, table = kind.table(), "Failed to fetch top posts");
                StatisticsError::from(e)
            })?;

        Ok(rows
            .into_iter()
            .map(|row| SubjectCount {
                post_id: row.post_id,
                author: row.author,
                count: row.count,
            })
            .collect())
    }

    async fn top_actors(&self, kind: EventKind, k: usize) -> Result<Vec<UserCount>> {
        self.top_users(kind, "username", k).await
    }

    async fn top_owners(&self, kind: EventKind, k: usize) -> Result<Vec<UserCount>> {
        self.top_users(kind, "author", k).await
    }
}
