/// Configuration management for Statistics Service
///
/// Loads configuration from environment variables.
use anyhow::{Context, Result};
use event_schema::EventKind;
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Kafka configuration
    pub kafka: KafkaConfig,
    /// ClickHouse configuration
    pub clickhouse: ClickHouseConfig,
    /// Consumer loop settings
    pub consumer: ConsumerConfig,
    /// Query engine settings
    pub query: QueryConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (dev, staging, prod)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// HTTP port for health checks and statistics queries
    pub http_port: u16,
    /// `json` switches the log output to JSON lines
    pub log_format: String,
    /// Aggregate store backend
    pub store: StoreBackend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    ClickHouse,
    Memory,
}

/// Kafka configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    /// Kafka brokers (comma-separated)
    pub brokers: String,
    /// Consumer group ID shared by both consumer loops
    pub group_id: String,
    pub likes_topic: String,
    pub views_topic: String,
    /// Dead-letter topic; dropped messages are only logged when unset
    pub dead_letter_topic: Option<String>,
    /// How long a publish may wait in the producer queue
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
}

/// ClickHouse configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickHouseConfig {
    /// ClickHouse HTTP URL
    pub url: String,
    pub database: String,
    pub username: String,
    pub password: String,
    /// Drop and recreate the aggregate tables on startup
    pub reset_on_start: bool,
}

/// Consumer loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Pause after a failed channel read
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

/// Query engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_top_posts_limit")]
    pub top_posts_limit: usize,
    #[serde(default = "default_top_users_limit")]
    pub top_users_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_posts_limit: default_top_posts_limit(),
            top_users_limit: default_top_users_limit(),
            max_limit: default_max_limit(),
        }
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

// Default values
fn default_publish_timeout_ms() -> u64 {
    5000
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_top_posts_limit() -> usize {
    5
}

fn default_top_users_limit() -> usize {
    3
}

fn default_max_limit() -> usize {
    100
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let store = match env_or("STATISTICS_STORE", "clickhouse").to_lowercase().as_str() {
            "clickhouse" => StoreBackend::ClickHouse,
            "memory" => StoreBackend::Memory,
            other => anyhow::bail!("Unsupported STATISTICS_STORE: {}", other),
        };

        let app = AppConfig {
            env: env_or("APP_ENV", "development"),
            host: env_or("APP_HOST", "0.0.0.0"),
            http_port: env_parse("PORT").unwrap_or(8200), // statistics-service default HTTP port
            log_format: env_or("LOG_FORMAT", "pretty"),
            store,
        };

        let kafka = KafkaConfig {
            brokers: std::env::var("KAFKA_BROKERS")
                .context("KAFKA_BROKERS environment variable not set")?,
            group_id: env_or("KAFKA_STATISTICS_GROUP_ID", "statistics-service"),
            likes_topic: env_or("KAFKA_LIKES_TOPIC", EventKind::Like.topic()),
            views_topic: env_or("KAFKA_VIEWS_TOPIC", EventKind::View.topic()),
            dead_letter_topic: std::env::var("KAFKA_DEAD_LETTER_TOPIC")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            publish_timeout_ms: env_parse("KAFKA_PUBLISH_TIMEOUT_MS")
                .unwrap_or_else(default_publish_timeout_ms),
        };

        let clickhouse = ClickHouseConfig {
            url: match store {
                StoreBackend::ClickHouse => std::env::var("CLICKHOUSE_URL")
                    .context("CLICKHOUSE_URL environment variable not set")?,
                StoreBackend::Memory => env_or("CLICKHOUSE_URL", "http://localhost:8123"),
            },
            database: env_or("CLICKHOUSE_DATABASE", "statistics"),
            username: env_or("CLICKHOUSE_USER", "default"),
            password: env_or("CLICKHOUSE_PASSWORD", ""),
            reset_on_start: env_parse("CLICKHOUSE_RESET_ON_START").unwrap_or(true),
        };

        let consumer = ConsumerConfig {
            retry_backoff_ms: env_parse("CONSUMER_RETRY_BACKOFF_MS")
                .unwrap_or_else(default_retry_backoff_ms),
        };

        let query = QueryConfig {
            top_posts_limit: env_parse("TOP_POSTS_LIMIT").unwrap_or_else(default_top_posts_limit),
            top_users_limit: env_parse("TOP_USERS_LIMIT").unwrap_or_else(default_top_users_limit),
            max_limit: env_parse("TOP_MAX_LIMIT").unwrap_or_else(default_max_limit),
        };

        Ok(Config {
            app,
            kafka,
            clickhouse,
            consumer,
            query,
        })
    }
}
