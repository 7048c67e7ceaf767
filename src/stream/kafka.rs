//! Production [`EventSource`] backed by `rdkafka`'s `StreamConsumer`
//! (spec.md §4.7). Gated behind the `kafka` feature so unit tests build the
//! in-memory fake without linking `librdkafka`.
//!
//! Grounded on `examples/other_examples/manifests/RisingwaveLabs-risingwave`,
//! which depends on `rdkafka` for the same partitioned, offset-committed
//! topic consumption shape used here.

use std::time::Duration;

use rdkafka::{
    ClientConfig, Message, Offset, TopicPartitionList,
    consumer::{CommitMode, Consumer, StreamConsumer},
    producer::{FutureProducer, FutureRecord}
};

use super::event::{OffsetId, PartitionId};
use crate::error::{AppResult, stream_decode_error};

pub const SOURCE_TOPIC: &str = "sql-audit-events";
pub const DEAD_LETTER_TOPIC: &str = "sql-audit-events-dlq";

pub struct KafkaSource {
    consumer: StreamConsumer,
    producer: FutureProducer
}

impl KafkaSource {
    pub fn connect(brokers: &str, group_id: &str) -> AppResult<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .create()
            .map_err(|e| stream_decode_error(format!("failed to create kafka consumer: {e}")))?;
        consumer
            .subscribe(&[SOURCE_TOPIC])
            .map_err(|e| stream_decode_error(format!("failed to subscribe to {SOURCE_TOPIC}: {e}")))?;

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .create()
            .map_err(|e| stream_decode_error(format!("failed to create kafka producer: {e}")))?;

        Ok(Self {
            consumer,
            producer
        })
    }
}

#[async_trait::async_trait]
impl super::EventSource for KafkaSource {
    async fn poll(&self) -> AppResult<Option<(PartitionId, OffsetId, String)>> {
        match self.consumer.recv().await {
            Ok(message) => {
                let partition = message.partition();
                let offset = message.offset();
                let payload = message
                    .payload()
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                    .unwrap_or_default();
                Ok(Some((partition, offset, payload)))
            }
            Err(e) => Err(stream_decode_error(format!("kafka recv failed: {e}")))
        }
    }

    async fn commit(&self, partition: PartitionId, offset: OffsetId) -> AppResult<()> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(SOURCE_TOPIC, partition, Offset::Offset(offset + 1))
            .map_err(|e| stream_decode_error(format!("invalid offset: {e}")))?;
        self.consumer
            .commit(&tpl, CommitMode::Async)
            .map_err(|e| stream_decode_error(format!("kafka commit failed: {e}")))
    }

    async fn dead_letter(&self, payload: String, reason: String, attempt: u32) -> AppResult<()> {
        let envelope = super::event::DeadLetterEvent {
            payload,
            failure_reason: reason,
            attempt
        };
        let body = serde_json::to_string(&envelope).map_err(|e| stream_decode_error(e.to_string()))?;
        self.producer
            .send(
                FutureRecord::<(), _>::to(DEAD_LETTER_TOPIC).payload(&body),
                Duration::from_secs(5)
            )
            .await
            .map_err(|(e, _)| stream_decode_error(format!("failed to publish to dead-letter topic: {e}")))?;
        Ok(())
    }
}
