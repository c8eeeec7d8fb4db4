use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

/// A record fetched from the stream, detached from the client that read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

/// A stream of order events with a committable cursor.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Waits up to `timeout` for the next record.
    ///
    /// Returns `Ok(None)` when the timeout elapses with no data, which is
    /// not an error.
    async fn fetch(&self, timeout: Duration) -> Result<Option<InboundRecord>>;

    /// Advances the cursor past `record`.
    async fn commit(&self, record: &InboundRecord) -> Result<()>;

    /// Liveness probe: fails if the stream connection or its metadata cannot
    /// be reached, whether or not events are flowing.
    async fn health_check(&self) -> Result<()>;
}

#[async_trait]
impl<T: EventSource + ?Sized> EventSource for Arc<T> {
    async fn fetch(&self, timeout: Duration) -> Result<Option<InboundRecord>> {
        (**self).fetch(timeout).await
    }

    async fn commit(&self, record: &InboundRecord) -> Result<()> {
        (**self).commit(record).await
    }

    async fn health_check(&self) -> Result<()> {
        (**self).health_check().await
    }
}
