//! Statistics service
//!
//! At-least-once ingestion of like/view events into deduplicating aggregate
//! tables, plus point and top-N queries over them.
//!
//! ```text
//! InteractionPublisher → EventChannel ("likes" | "views")
//!                            ↓ (redelivery possible)
//!                     InteractionConsumer (one task per kind)
//!                            ↓ append
//!                     AggregateStore (newest row per (post, user) wins on read)
//!                            ↓
//!                     StatisticsQuery → HTTP handlers
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod services;
pub mod store;

pub use error::{Result, StatisticsError};
