use std::time::Duration;

use async_trait::async_trait;
use common_kafka::consumer::{Batch, BatchConsumer, SourceError};

/// The loop's seam to the broker client. The real implementation is
/// `BatchConsumer`; tests drive the loop with scripted doubles.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetches the next bounded batch, waiting at most `wait` for it to fill.
    async fn poll(&self, max: usize, wait: Duration) -> Result<Batch, SourceError>;

    /// Commits the whole batch, once, after every record has been dispatched.
    async fn commit(&self, batch: Batch) -> Result<(), SourceError>;
}

/// Broker connectivity check for the health surface. Holds a read-only view
/// of the client, never mutates consumer state.
#[async_trait]
pub trait BrokerPing: Send + Sync {
    async fn ping(&self, deadline: Duration) -> Result<(), SourceError>;
}

#[async_trait]
impl RecordSource for BatchConsumer {
    async fn poll(&self, max: usize, wait: Duration) -> Result<Batch, SourceError> {
        self.recv_batch(max, wait).await
    }

    async fn commit(&self, batch: Batch) -> Result<(), SourceError> {
        BatchConsumer::commit(self, batch).await
    }
}

#[async_trait]
impl BrokerPing for BatchConsumer {
    async fn ping(&self, deadline: Duration) -> Result<(), SourceError> {
        BatchConsumer::ping(self, deadline).await
    }
}
