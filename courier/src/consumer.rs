use std::sync::Arc;
use std::time::Duration;

use common_kafka::config::ConsumerConfig;
use common_kafka::consumer::SourceError;
use health::HealthHandle;
use metrics::{counter, histogram};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::failure::FailureHandler;
use crate::metric_consts::{
    BATCH_SIZE, COMMIT_FAILURES, FETCH_FAILURES, HANDLER_FAILURES, RECORDS_FAILED,
    RECORDS_PROCESSED,
};
use crate::processor::RecordProcessor;
use crate::source::RecordSource;

/// Drives poll/process/commit cycles until cancellation or a fatal client
/// error, bounding the blast radius of any single bad record.
///
/// Records are dispatched sequentially, in batch order: within a partition
/// the fetch order is the processing order, and that simplicity is traded
/// against throughput on purpose. A failed record is diverted to the failure
/// handler and the whole batch is still committed afterwards; failure means
/// side-channel handling, never redelivery.
pub struct ConsumptionLoop<S> {
    source: S,
    processor: Arc<dyn RecordProcessor>,
    failure: Arc<dyn FailureHandler>,
    liveness: HealthHandle,
    shutdown: CancellationToken,
    max_records_per_poll: usize,
    poll_wait: Duration,
}

impl<S: RecordSource> ConsumptionLoop<S> {
    pub fn new(
        source: S,
        processor: Arc<dyn RecordProcessor>,
        failure: Arc<dyn FailureHandler>,
        liveness: HealthHandle,
        shutdown: CancellationToken,
        config: &ConsumerConfig,
    ) -> Self {
        Self {
            source,
            processor,
            failure,
            liveness,
            shutdown,
            max_records_per_poll: config.max_records_per_poll,
            poll_wait: Duration::from_secs(config.poll_wait_seconds),
        }
    }

    /// Runs until the shutdown token fires or the client reports a fatal
    /// error. Cancellation surfaces as `SourceError::Cancelled`, which the
    /// caller should treat as a clean exit.
    pub async fn run(self) -> Result<(), SourceError> {
        loop {
            if self.shutdown.is_cancelled() {
                warn!("consumption stopped: shutdown signalled");
                return Err(SourceError::Cancelled);
            }
            self.liveness.report_healthy().await;

            let batch = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    warn!("consumption stopped: shutdown signalled mid-poll");
                    return Err(SourceError::Cancelled);
                }
                result = self.source.poll(self.max_records_per_poll, self.poll_wait) => {
                    match result {
                        Ok(batch) => batch,
                        Err(err @ SourceError::ClientClosed) => {
                            error!("consumption stopped: {}", err);
                            return Err(err);
                        }
                        Err(err @ SourceError::Cancelled) => {
                            warn!("consumption stopped: {}", err);
                            return Err(err);
                        }
                        Err(SourceError::Kafka(err)) => {
                            counter!(FETCH_FAILURES).increment(1);
                            error!("fetch failed, retrying next cycle: {}", err);
                            continue;
                        }
                    }
                }
            };

            let total = batch.len();
            histogram!(BATCH_SIZE).record(total as f64);

            let mut failed = 0;
            for record in batch.records() {
                match self.processor.process(record).await {
                    Ok(()) => counter!(RECORDS_PROCESSED).increment(1),
                    Err(err) => {
                        failed += 1;
                        counter!(RECORDS_FAILED).increment(1);
                        error!("failed to process record: {}", err);
                        if let Err(handler_err) = self.failure.handle(record, &err).await {
                            counter!(HANDLER_FAILURES).increment(1);
                            error!("failure handler error, continuing: {}", handler_err);
                        }
                    }
                }
            }

            info!(success = total - failed, failed, "processed batch");

            if !batch.is_empty() {
                if let Err(err) = self.source.commit(batch).await {
                    // Accepted risk: uncommitted offsets get redelivered on restart
                    counter!(COMMIT_FAILURES).increment(1);
                    error!("failed to commit batch offsets: {}", err);
                }
            }
            // the batch is gone on every path here, so the rebalance gate is open
        }
    }
}
