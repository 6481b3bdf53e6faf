use std::time::Duration;

use common_kafka::consumer::BatchConsumer;
use common_kafka::producer::{create_kafka_producer, KafkaContext};
use health::{HealthHandle, HealthRegistry};
use rdkafka::producer::FutureProducer;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::config::Config;
use crate::error::StartupError;

/// Long-lived clients shared across the consumer loop and the HTTP server.
pub struct AppContext {
    pub health_registry: HealthRegistry,
    pub worker_liveness: HealthHandle,
    pub consumer: BatchConsumer,
    pub producer: FutureProducer<KafkaContext>,
    pub pool: PgPool,
    pub config: Config,
}

impl AppContext {
    pub async fn new(config: Config) -> Result<Self, StartupError> {
        let health_registry = HealthRegistry::new("liveness");
        let worker_liveness = health_registry
            .register("worker".to_string(), Duration::from_secs(60))
            .await;
        let kafka_liveness = health_registry
            .register("rdkafka".to_string(), Duration::from_secs(30))
            .await;

        let consumer = BatchConsumer::new(&config.kafka, &config.consumer)?;
        let producer = create_kafka_producer(&config.kafka, kafka_liveness).await?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_pg_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&config.database_url)
            .await?;

        info!(
            topic = config.consumer.kafka_consumer_topic,
            group = config.consumer.kafka_consumer_group,
            "app context initialized"
        );

        Ok(Self {
            health_registry,
            worker_liveness,
            consumer,
            producer,
            pool,
            config,
        })
    }
}
