use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::{ClientConfig, Message, Offset, TopicPartitionList};
use thiserror::Error;
use tracing::warn;

use crate::config::{ConfigError, ConsumerConfig, KafkaConfig};
use crate::rebalance::{BatchConsumerContext, RebalanceGate, RebalancePause};

/// One inbound message, decoupled from the rdkafka wire types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Option<Vec<u8>>,
    pub value: Vec<u8>,
    pub topic: String,
}

/// Broker position of one fetched record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionOffset {
    pub partition: i32,
    pub offset: i64,
}

/// An ordered set of records returned by one poll call, plus the offsets to
/// commit once every record has been dispatched. Owns the rebalance pause
/// for the cycle: dropping the batch releases it, whatever the exit path.
pub struct Batch {
    records: Vec<Record>,
    offsets: Vec<PartitionOffset>,
    _pause: RebalancePause,
}

impl Batch {
    pub fn new(records: Vec<Record>, offsets: Vec<PartitionOffset>, pause: RebalancePause) -> Self {
        Self {
            records,
            offsets,
            _pause: pause,
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn offsets(&self) -> &[PartitionOffset] {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("kafka client closed")]
    ClientClosed,
    #[error("consumption cancelled")]
    Cancelled,
    #[error("kafka error: {0}")]
    Kafka(#[from] KafkaError),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Kafka(#[from] KafkaError),
}

/// Single-topic consumer that fetches bounded batches and commits them as a
/// unit. Clones share the underlying client, so a clone can serve broker
/// pings for the health surface without touching consumer state.
#[derive(Clone)]
pub struct BatchConsumer {
    inner: Arc<Inner>,
}

struct Inner {
    consumer: StreamConsumer<BatchConsumerContext>,
    topic: String,
    gate: RebalanceGate,
}

impl BatchConsumer {
    pub fn new(common_config: &KafkaConfig, config: &ConsumerConfig) -> Result<Self, BuildError> {
        common_config.validate()?;
        config.validate()?;

        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &common_config.kafka_hosts)
            .set("statistics.interval.ms", "10000")
            .set("group.id", &config.kafka_consumer_group)
            .set(
                "auto.offset.reset",
                &config.kafka_consumer_offset_reset,
            )
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false");

        if common_config.kafka_tls {
            client_config
                .set("security.protocol", "ssl")
                .set("enable.ssl.certificate.verification", "false");
        };

        let gate = RebalanceGate::new();
        let consumer: StreamConsumer<BatchConsumerContext> =
            client_config.create_with_context(BatchConsumerContext::new(gate.clone()))?;
        consumer.subscribe(&[config.kafka_consumer_topic.as_str()])?;

        let inner = Inner {
            consumer,
            topic: config.kafka_consumer_topic.clone(),
            gate,
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Fetches up to `max` records, waiting at most `wait` for the batch to
    /// fill. The returned batch holds the rebalance gate until it is dropped.
    pub async fn recv_batch(&self, max: usize, wait: Duration) -> Result<Batch, SourceError> {
        let mut records = Vec::with_capacity(max);
        let mut offsets = Vec::with_capacity(max);
        let mut failure: Option<SourceError> = None;

        tokio::select! {
            _ = tokio::time::sleep(wait) => {},
            _ = async {
                while records.len() < max {
                    match self.inner.consumer.recv().await {
                        Ok(message) => {
                            offsets.push(PartitionOffset {
                                partition: message.partition(),
                                offset: message.offset(),
                            });
                            records.push(Record {
                                key: message.key().map(|key| key.to_vec()),
                                value: message.payload().map(|payload| payload.to_vec()).unwrap_or_default(),
                                topic: message.topic().to_string(),
                            });
                        }
                        Err(err) => {
                            // Early exit, this might be a client-level failure
                            failure = Some(classify(err));
                            break;
                        }
                    }
                }
            } => {}
        }

        match failure {
            Some(err @ SourceError::ClientClosed) | Some(err @ SourceError::Cancelled) => {
                // Fetched records are dropped uncommitted, they will be redelivered
                Err(err)
            }
            Some(err) if records.is_empty() => Err(err),
            Some(err) => {
                warn!(
                    "fetch error after {} records, handing back the partial batch: {}",
                    records.len(),
                    err
                );
                Ok(Batch::new(records, offsets, self.inner.gate.pause()))
            }
            None => Ok(Batch::new(records, offsets, self.inner.gate.pause())),
        }
    }

    /// Commits every offset fetched in the batch, regardless of per-record
    /// outcome: failed records were diverted, not queued for redelivery.
    /// Issued once per non-empty batch.
    pub async fn commit(&self, batch: Batch) -> Result<(), SourceError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut list = TopicPartitionList::new();
        for (partition, next) in commit_positions(batch.offsets()) {
            list.add_partition_offset(&self.inner.topic, partition, Offset::Offset(next))?;
        }
        self.inner.consumer.commit(&list, CommitMode::Sync)?;
        Ok(())
        // batch dropped here, releasing the rebalance gate
    }

    /// Cheap broker round-trip for the health surface, not a consume cycle.
    /// `fetch_metadata` blocks, so it runs on the blocking pool rather than
    /// parking a runtime worker for the whole deadline.
    pub async fn ping(&self, deadline: Duration) -> Result<(), SourceError> {
        let inner = self.inner.clone();
        let fetched = tokio::task::spawn_blocking(move || {
            inner.consumer.fetch_metadata(None, deadline).map(|_| ())
        })
        .await;
        match fetched {
            Ok(result) => Ok(result?),
            // The blocking task only dies with the runtime
            Err(_) => Err(SourceError::ClientClosed),
        }
    }

    pub fn topic(&self) -> &str {
        &self.inner.topic
    }
}

/// Folds the fetched offsets of a batch into the next position to commit for
/// each partition seen.
pub fn commit_positions(offsets: &[PartitionOffset]) -> Vec<(i32, i64)> {
    let mut positions: BTreeMap<i32, i64> = BTreeMap::new();
    for fetched in offsets {
        let next = fetched.offset + 1;
        positions
            .entry(fetched.partition)
            .and_modify(|current| *current = (*current).max(next))
            .or_insert(next);
    }
    positions.into_iter().collect()
}

fn classify(err: KafkaError) -> SourceError {
    match err {
        KafkaError::Canceled => SourceError::Cancelled,
        KafkaError::MessageConsumption(
            RDKafkaErrorCode::BrokerDestroy | RDKafkaErrorCode::Fatal,
        ) => SourceError::ClientClosed,
        other => SourceError::Kafka(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_positions_take_the_highest_offset_per_partition() {
        let offsets = [
            PartitionOffset { partition: 0, offset: 41 },
            PartitionOffset { partition: 1, offset: 7 },
            PartitionOffset { partition: 0, offset: 42 },
            PartitionOffset { partition: 1, offset: 5 },
        ];
        assert_eq!(commit_positions(&offsets), vec![(0, 43), (1, 8)]);
    }

    #[test]
    fn commit_positions_of_empty_batch_are_empty() {
        assert!(commit_positions(&[]).is_empty());
    }

    #[test]
    fn client_close_is_fatal() {
        let err = classify(KafkaError::MessageConsumption(RDKafkaErrorCode::BrokerDestroy));
        assert!(matches!(err, SourceError::ClientClosed));
    }

    #[test]
    fn cancellation_is_distinguished_from_failure() {
        assert!(matches!(
            classify(KafkaError::Canceled),
            SourceError::Cancelled
        ));
    }

    #[test]
    fn transient_errors_stay_transient() {
        let err = classify(KafkaError::MessageConsumption(
            RDKafkaErrorCode::OperationTimedOut,
        ));
        assert!(matches!(err, SourceError::Kafka(_)));
    }
}
