use async_trait::async_trait;
use common_kafka::consumer::Record;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ProcessorError;
use crate::mailer::MailerClient;
use crate::metric_consts::MAILS_SENT;
use crate::orders::OrdersRepo;
use crate::render;

/// Turns one record into its outbound side effect.
///
/// Implementations must stay idempotent under redelivery (at-least-once is
/// the delivery guarantee) and must not block indefinitely: the loop applies
/// no per-record timeout, so a hanging processor stalls the whole pipeline.
#[async_trait]
pub trait RecordProcessor: Send + Sync {
    async fn process(&self, record: &Record) -> Result<(), ProcessorError>;
}

/// Payload of one record on the consume topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OrderEventKind,
    pub header: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderEventKind {
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

/// Sends one order notification email per record.
pub struct OrderMailProcessor {
    orders: OrdersRepo,
    mailer: MailerClient,
}

impl OrderMailProcessor {
    pub fn new(orders: OrdersRepo, mailer: MailerClient) -> Self {
        Self { orders, mailer }
    }
}

#[async_trait]
impl RecordProcessor for OrderMailProcessor {
    async fn process(&self, record: &Record) -> Result<(), ProcessorError> {
        let event: OrderEvent = serde_json::from_slice(&record.value)?;
        let order = self.orders.get_order(&event.id).await?;

        let mail = self.mailer.compose(
            order.customer.email.clone(),
            render::subject(event.kind, &order.id),
            render::order_email_html(&order, &event.header),
        );
        self.mailer.send(&mail).await?;

        counter!(MAILS_SENT).increment(1);
        Ok(())
    }
}

/// Logs records instead of delivering them. Used in dev environments
/// without a mail relay configured.
pub struct PrintProcessor;

#[async_trait]
impl RecordProcessor for PrintProcessor {
    async fn process(&self, record: &Record) -> Result<(), ProcessorError> {
        let event: OrderEvent = serde_json::from_slice(&record.value)?;
        info!("would send notification: {:?}", event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: &str) -> Record {
        Record {
            key: Some(b"ord-1042".to_vec()),
            value: value.as_bytes().to_vec(),
            topic: "emails_to_send".to_string(),
        }
    }

    #[test]
    fn order_event_decodes_from_wire_json() {
        let event: OrderEvent =
            serde_json::from_str(r#"{"id":"ord-1042","type":"shipped","header":"On the way!"}"#)
                .unwrap();
        assert_eq!(
            event,
            OrderEvent {
                id: "ord-1042".to_string(),
                kind: OrderEventKind::Shipped,
                header: "On the way!".to_string(),
            }
        );
    }

    #[test]
    fn unknown_event_kind_is_rejected() {
        let result: Result<OrderEvent, _> =
            serde_json::from_str(r#"{"id":"ord-1042","type":"teleported","header":"??"}"#);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn print_processor_accepts_well_formed_records() {
        let processor = PrintProcessor;
        let result = processor
            .process(&record(
                r#"{"id":"ord-1042","type":"confirmed","header":"Thanks!"}"#,
            ))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn malformed_payload_is_a_processing_failure() {
        let processor = PrintProcessor;
        let err = processor.process(&record("not json")).await.unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidPayload(_)));
    }
}
