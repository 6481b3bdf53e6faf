use std::future::ready;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use common_kafka::producer::{send_record, KafkaContext};
use health::HealthRegistry;
use metrics::counter;
use rdkafka::producer::FutureProducer;
use serde_json::json;
use tracing::error;

use crate::error::EnqueueError;
use crate::metric_consts::EVENTS_ENQUEUED;
use crate::processor::OrderEvent;
use crate::source::BrokerPing;

const PING_DEADLINE: Duration = Duration::from_secs(5);
const ENQUEUE_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the HTTP surface enqueues accepted events. The real sink produces
/// to the consume topic; tests swap in a recording double.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn enqueue(&self, event: &OrderEvent) -> Result<(), EnqueueError>;
}

pub struct KafkaEventSink {
    producer: FutureProducer<KafkaContext>,
    topic: String,
}

impl KafkaEventSink {
    pub fn new(producer: FutureProducer<KafkaContext>, topic: String) -> Self {
        Self { producer, topic }
    }
}

#[async_trait]
impl EventSink for KafkaEventSink {
    async fn enqueue(&self, event: &OrderEvent) -> Result<(), EnqueueError> {
        let payload = serde_json::to_vec(event)?;
        send_record(
            &self.producer,
            &self.topic,
            Some(event.id.as_bytes()),
            &payload,
            ENQUEUE_TIMEOUT,
        )
        .await?;

        counter!(EVENTS_ENQUEUED).increment(1);
        Ok(())
    }
}

#[derive(Clone)]
struct RouterState {
    probe: Arc<dyn BrokerPing>,
    sink: Arc<dyn EventSink>,
}

pub fn router(
    liveness: HealthRegistry,
    probe: Arc<dyn BrokerPing>,
    sink: Arc<dyn EventSink>,
) -> Router {
    let state = RouterState { probe, sink };

    Router::new()
        .route("/", get(index))
        .route("/_liveness", get(move || ready(liveness.get_status())))
        .route("/v1/health", get(health))
        .route("/v1/send", post(send))
        .with_state(state)
}

async fn index() -> &'static str {
    "courier service"
}

async fn health(State(state): State<RouterState>) -> (StatusCode, &'static str) {
    match state.probe.ping(PING_DEADLINE).await {
        Ok(()) => (StatusCode::OK, "healthy"),
        Err(err) => {
            error!("health check failed to reach kafka: {}", err);
            (StatusCode::SERVICE_UNAVAILABLE, "kafka unreachable")
        }
    }
}

async fn send(
    State(state): State<RouterState>,
    Json(event): Json<OrderEvent>,
) -> (StatusCode, Json<serde_json::Value>) {
    if event.id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "order id must not be empty"})),
        );
    }

    match state.sink.enqueue(&event).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"message": "notification enqueued"})),
        ),
        Err(err) => {
            error!("failed to enqueue event {}: {}", event.id, err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "failed to enqueue notification"})),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::body::Body;
    use axum::http::{header, Request};
    use common_kafka::consumer::SourceError;
    use http_body_util::BodyExt;
    use rdkafka::error::KafkaError;
    use tower::ServiceExt;

    use super::*;
    use crate::processor::OrderEventKind;

    struct StubProbe {
        reachable: bool,
    }

    #[async_trait]
    impl BrokerPing for StubProbe {
        async fn ping(&self, _deadline: Duration) -> Result<(), SourceError> {
            if self.reachable {
                Ok(())
            } else {
                Err(SourceError::Kafka(KafkaError::Canceled))
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        enqueued: Mutex<Vec<OrderEvent>>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn enqueue(&self, event: &OrderEvent) -> Result<(), EnqueueError> {
            self.enqueued.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn test_router(reachable: bool, sink: Arc<RecordingSink>) -> Router {
        router(
            HealthRegistry::new("liveness"),
            Arc::new(StubProbe { reachable }),
            sink,
        )
    }

    fn send_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/send")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok_when_kafka_is_reachable() {
        let app = test_router(true, Arc::new(RecordingSink::default()));
        let response = app
            .oneshot(Request::get("/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_reports_unavailable_when_kafka_is_down() {
        let app = test_router(false, Arc::new(RecordingSink::default()));
        let response = app
            .oneshot(Request::get("/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn liveness_is_unhealthy_before_workers_register() {
        let app = test_router(true, Arc::new(RecordingSink::default()));
        let response = app
            .oneshot(Request::get("/_liveness").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn send_enqueues_a_well_formed_event() {
        let sink = Arc::new(RecordingSink::default());
        let app = test_router(true, sink.clone());

        let response = app
            .oneshot(send_request(
                r#"{"id":"ord-1042","type":"shipped","header":"On the way!"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "notification enqueued");

        let enqueued = sink.enqueued.lock().unwrap();
        assert_eq!(enqueued.len(), 1);
        assert_eq!(enqueued[0].id, "ord-1042");
        assert_eq!(enqueued[0].kind, OrderEventKind::Shipped);
    }

    #[tokio::test]
    async fn send_rejects_an_empty_order_id() {
        let sink = Arc::new(RecordingSink::default());
        let app = test_router(true, sink.clone());

        let response = app
            .oneshot(send_request(
                r#"{"id":"","type":"confirmed","header":"Thanks!"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(sink.enqueued.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_rejects_an_unknown_event_kind() {
        let app = test_router(true, Arc::new(RecordingSink::default()));
        let response = app
            .oneshot(send_request(
                r#"{"id":"ord-1042","type":"teleported","header":"??"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
