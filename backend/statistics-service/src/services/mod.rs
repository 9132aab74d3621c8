pub mod consumer;
pub mod dead_letter;
pub mod producer;
pub mod query;

pub use consumer::{spawn_consumers, ConsumerReport, InteractionConsumer, InteractionConsumerConfig};
pub use dead_letter::{
    ChannelDeadLetterSink, DeadLetter, DeadLetterReason, DeadLetterSink, InMemoryDeadLetterSink,
    LogDeadLetterSink,
};
pub use producer::{InMemoryPostDirectory, InteractionPublisher, PostOwnerLookup, PublisherTopics};
pub use query::{PostStatistics, StatisticsQuery, UserRanking};
