use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common_kafka::consumer::Record;
use common_kafka::dead_letter_topic;
use common_kafka::producer::{send_record, KafkaContext};
use metrics::counter;
use rdkafka::error::KafkaError;
use rdkafka::producer::FutureProducer;
use serde::Serialize;

use crate::error::{HandlerError, ProcessorError};
use crate::metric_consts::{ALERTS_SENT, DEAD_LETTERED};

/// Invoked once per failed record. The handler's own error is logged by the
/// loop and never escalated: alerting and dead-lettering must not stall the
/// pipeline.
#[async_trait]
pub trait FailureHandler: Send + Sync {
    async fn handle(&self, record: &Record, err: &ProcessorError) -> Result<(), HandlerError>;
}

/// Which failure strategy a deployment runs with. One per deployment,
/// never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStrategy {
    DeadLetter,
    Alert,
}

impl FromStr for FailureStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_ref() {
            "dead_letter" => Ok(FailureStrategy::DeadLetter),
            "alert" => Ok(FailureStrategy::Alert),
            _ => Err(format!(
                "unknown failure strategy: {s}, must be dead_letter or alert"
            )),
        }
    }
}

/// Where dead-lettered records go. The real publisher produces through the
/// shared kafka client; tests swap in a recording double.
#[async_trait]
pub trait RecordPublisher: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        value: &[u8],
    ) -> Result<(), KafkaError>;
}

pub struct KafkaPublisher {
    producer: FutureProducer<KafkaContext>,
    timeout: Duration,
}

impl KafkaPublisher {
    pub fn new(producer: FutureProducer<KafkaContext>, timeout: Duration) -> Self {
        Self { producer, timeout }
    }
}

#[async_trait]
impl RecordPublisher for KafkaPublisher {
    async fn publish(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        value: &[u8],
    ) -> Result<(), KafkaError> {
        send_record(&self.producer, topic, key, value, self.timeout).await
    }
}

/// Republishes the failed record's key and value verbatim to the derived
/// dead-letter topic, for offline inspection and reprocessing.
pub struct DeadLetterHandler {
    publisher: Arc<dyn RecordPublisher>,
}

impl DeadLetterHandler {
    pub fn new(publisher: Arc<dyn RecordPublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl FailureHandler for DeadLetterHandler {
    async fn handle(&self, record: &Record, _err: &ProcessorError) -> Result<(), HandlerError> {
        let topic = dead_letter_topic(&record.topic);
        self.publisher
            .publish(&topic, record.key.as_deref(), &record.value)
            .await?;

        counter!(DEAD_LETTERED).increment(1);
        Ok(())
    }
}

#[derive(Serialize)]
struct Text {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

#[derive(Serialize)]
struct Block {
    #[serde(rename = "type")]
    kind: &'static str,
    text: Text,
}

#[derive(Serialize)]
struct Payload {
    blocks: Vec<Block>,
}

/// Posts a structured alert to a chat webhook. Production always alerts,
/// dev only when explicitly asked to.
pub struct AlertHandler {
    client: reqwest::Client,
    webhook_url: String,
    is_prod: bool,
    alert_in_dev: bool,
}

impl AlertHandler {
    pub fn new(
        webhook_url: String,
        is_prod: bool,
        alert_in_dev: bool,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            webhook_url,
            is_prod,
            alert_in_dev,
        })
    }

    fn should_alert(&self) -> bool {
        self.is_prod || self.alert_in_dev
    }

    fn payload(record: &Record, err: &ProcessorError) -> Payload {
        Payload {
            blocks: vec![
                Block {
                    kind: "header",
                    text: Text {
                        kind: "plain_text",
                        text: "Courier processing failure".to_string(),
                    },
                },
                Block {
                    kind: "section",
                    text: Text {
                        kind: "mrkdwn",
                        text: format!(
                            "```failed to process record from {}\nerror: {}\n```",
                            record.topic, err
                        ),
                    },
                },
            ],
        }
    }
}

#[async_trait]
impl FailureHandler for AlertHandler {
    async fn handle(&self, record: &Record, err: &ProcessorError) -> Result<(), HandlerError> {
        if !self.should_alert() {
            return Ok(());
        }

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&Self::payload(record, err))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(HandlerError::Rejected(response.status().as_u16()));
        }

        counter!(ALERTS_SENT).increment(1);
        Ok(())
    }
}
