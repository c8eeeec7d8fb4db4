//! In-memory event source for local mode and tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::{ConsumerError, EventSource, InboundRecord, Result};

const TOPIC: &str = "order-events";

#[derive(Debug, Default)]
struct Partition {
    pending: VecDeque<InboundRecord>,
    next_offset: i64,
    committed: Vec<i64>,
}

/// Single-partition queue standing in for the order-events topic.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventSource {
    partition: Arc<Mutex<Partition>>,
    arrivals: Arc<Notify>,
    unreachable: Arc<AtomicBool>,
}

impl InMemoryEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a raw payload and returns its offset.
    pub async fn push(&self, payload: impl Into<Vec<u8>>) -> i64 {
        let mut partition = self.partition.lock().await;
        let offset = partition.next_offset;
        partition.next_offset += 1;
        partition.pending.push_back(InboundRecord {
            topic: TOPIC.to_string(),
            partition: 0,
            offset,
            key: None,
            payload: payload.into(),
        });
        drop(partition);

        self.arrivals.notify_one();
        offset
    }

    /// Appends a JSON payload and returns its offset.
    pub async fn push_json(&self, value: &serde_json::Value) -> i64 {
        self.push(value.to_string()).await
    }

    /// Highest committed offset, if any.
    pub async fn committed_offset(&self) -> Option<i64> {
        self.partition.lock().await.committed.iter().copied().max()
    }

    /// Every commit in the order it was made.
    pub async fn commits(&self) -> Vec<i64> {
        self.partition.lock().await.committed.clone()
    }

    pub async fn pending_count(&self) -> usize {
        self.partition.lock().await.pending.len()
    }

    /// Simulates a lost broker connection.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ConsumerError::Unhealthy(
                "in-memory source marked unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl EventSource for InMemoryEventSource {
    async fn fetch(&self, timeout: Duration) -> Result<Option<InboundRecord>> {
        self.check_reachable()?;

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(record) = self.partition.lock().await.pending.pop_front() {
                return Ok(Some(record));
            }
            if tokio::time::timeout_at(deadline, self.arrivals.notified())
                .await
                .is_err()
            {
                return Ok(None);
            }
        }
    }

    async fn commit(&self, record: &InboundRecord) -> Result<()> {
        self.check_reachable()?;
        self.partition.lock().await.committed.push(record.offset);
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        self.check_reachable()
    }
}
