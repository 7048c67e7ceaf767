//! Event stream consumer (spec.md §4.7, component G).
//!
//! [`EventSource`] decouples the consumer loop from the broker: production
//! runs against [`kafka::KafkaSource`] (feature `kafka`, on by default),
//! tests run against [`InMemorySource`]. Both converge on [`StreamConsumer`].

mod backpressure;
mod consumer;
mod event;
#[cfg(feature = "kafka")]
mod kafka;
mod memory;
mod retry;

pub use backpressure::BackpressureController;
pub use consumer::StreamConsumer;
pub use event::{AuditEvent, DeadLetterEvent, OffsetId, PartitionId};
#[cfg(feature = "kafka")]
pub use kafka::KafkaSource;
pub use memory::InMemorySource;
pub use retry::retry_with_backoff;

use crate::error::AppResult;

/// Pull-based source of raw event payloads. Deserialization happens in
/// [`StreamConsumer`], not here, so a schema failure is a consumer-level
/// dead-letter decision, not a source-level one.
#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    async fn poll(&self) -> AppResult<Option<(PartitionId, OffsetId, String)>>;

    async fn commit(&self, partition: PartitionId, offset: OffsetId) -> AppResult<()>;

    async fn dead_letter(&self, payload: String, reason: String, attempt: u32) -> AppResult<()>;
}
