use thiserror::Error;

/// Recoverable per-record failures, isolated via the failure handler.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("invalid record payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error("order {0} not found")]
    OrderNotFound(String),
    #[error("order lookup failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("mail delivery request failed: {0}")]
    Delivery(#[from] reqwest::Error),
    #[error("mail API returned {status}: {body}")]
    DeliveryRejected { status: u16, body: String },
}

/// Side-effect delivery failures inside a failure handler. Logged by the
/// loop, never escalated: alerting must not stall the pipeline.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("dead letter publish failed: {0}")]
    DeadLetter(#[from] rdkafka::error::KafkaError),
    #[error("alert delivery failed: {0}")]
    Alert(#[from] reqwest::Error),
    #[error("alert webhook returned {0}")]
    Rejected(u16),
}

/// Failures enqueueing an event through the HTTP surface.
#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to produce to kafka: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}

/// Anything that can keep the process from coming up. Startup failures are
/// fatal by design, they must never surface as runtime errors in the loop.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Consumer(#[from] common_kafka::consumer::BuildError),
    #[error("kafka producer: {0}")]
    Producer(#[from] rdkafka::error::KafkaError),
    #[error("postgres: {0}")]
    Database(#[from] sqlx::Error),
}
