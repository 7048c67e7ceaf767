//! In-memory [`EventSource`] fake, so the consumer loop is testable without
//! a broker (spec.md §4.7 Design Note).

use std::{collections::VecDeque, sync::Mutex};

use super::event::{OffsetId, PartitionId};
use crate::{error::AppResult, stream::EventSource};

#[derive(Default)]
pub struct InMemorySource {
    queue:         Mutex<VecDeque<(PartitionId, OffsetId, String)>>,
    committed:     Mutex<Vec<(PartitionId, OffsetId)>>,
    dead_lettered: Mutex<Vec<(String, String, u32)>>
}

impl InMemorySource {
    pub fn new(messages: Vec<(PartitionId, OffsetId, String)>) -> Self {
        Self {
            queue: Mutex::new(messages.into()),
            ..Self::default()
        }
    }

    pub fn committed(&self) -> Vec<(PartitionId, OffsetId)> {
        self.committed.lock().expect("lock poisoned").clone()
    }

    pub fn dead_lettered(&self) -> Vec<(String, String, u32)> {
        self.dead_lettered.lock().expect("lock poisoned").clone()
    }
}

#[async_trait::async_trait]
impl EventSource for InMemorySource {
    async fn poll(&self) -> AppResult<Option<(PartitionId, OffsetId, String)>> {
        Ok(self.queue.lock().expect("lock poisoned").pop_front())
    }

    async fn commit(&self, partition: PartitionId, offset: OffsetId) -> AppResult<()> {
        self.committed.lock().expect("lock poisoned").push((partition, offset));
        Ok(())
    }

    async fn dead_letter(&self, payload: String, reason: String, attempt: u32) -> AppResult<()> {
        self.dead_lettered.lock().expect("lock poisoned").push((payload, reason, attempt));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn polls_messages_in_order_then_none() {
        let source = InMemorySource::new(vec![(0, 1, "a".to_string()), (0, 2, "b".to_string())]);
        assert_eq!(source.poll().await.unwrap().unwrap().2, "a");
        assert_eq!(source.poll().await.unwrap().unwrap().2, "b");
        assert!(source.poll().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn records_commits_and_dead_letters() {
        let source = InMemorySource::default();
        source.commit(0, 5).await.unwrap();
        source.dead_letter("bad".to_string(), "schema".to_string(), 1).await.unwrap();
        assert_eq!(source.committed(), vec![(0, 5)]);
        assert_eq!(source.dead_lettered()[0].1, "schema");
    }
}
