use std::sync::Arc;
use std::time::Duration;

use common_kafka::consumer::SourceError;
use courier::app_context::AppContext;
use courier::config::Config;
use courier::consumer::ConsumptionLoop;
use courier::failure::{
    AlertHandler, DeadLetterHandler, FailureHandler, FailureStrategy, KafkaPublisher,
};
use courier::mailer::MailerClient;
use courier::orders::OrdersRepo;
use courier::processor::{OrderMailProcessor, PrintProcessor, RecordProcessor};
use courier::server::{router, KafkaEventSink};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

common_alloc::used!();

const DEAD_LETTER_PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

fn setup_tracing() {
    let log_layer: tracing_subscriber::filter::Filtered<
        tracing_subscriber::fmt::Layer<tracing_subscriber::Registry>,
        EnvFilter,
        tracing_subscriber::Registry,
    > = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(log_layer).init();
}

#[tokio::main]
async fn main() {
    setup_tracing();
    info!("Starting up...");

    let config = Config::init_with_defaults().expect("Invalid configuration:");
    if let Err(err) = config.validate() {
        panic!("Invalid configuration: {err}");
    }

    let context = AppContext::new(config)
        .await
        .expect("Failed to create app context");
    let config = &context.config;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("SIGINT received, shutting down"),
            _ = sigterm.recv() => info!("SIGTERM received, shutting down"),
        }
        signal_token.cancel();
    });

    let app = router(
        context.health_registry.clone(),
        Arc::new(context.consumer.clone()),
        Arc::new(KafkaEventSink::new(
            context.producer.clone(),
            config.consumer.kafka_consumer_topic.clone(),
        )),
    );
    let app = common_metrics::setup_metrics_routes(app);
    let bind = config.bind();
    tokio::spawn(async move {
        if let Err(err) = common_metrics::serve(app, &bind).await {
            error!("http server failed: {}", err);
        }
    });

    let processor: Arc<dyn RecordProcessor> = if config.mailer_endpoint.is_empty() {
        info!("no mailer endpoint configured, logging notifications instead");
        Arc::new(PrintProcessor)
    } else {
        let mailer = MailerClient::new(
            config.mailer_endpoint.clone(),
            config.mailer_token.clone(),
            config.mailer_from.clone(),
            Duration::from_millis(config.mailer_timeout_ms),
        )
        .expect("Failed to create mailer client");
        Arc::new(OrderMailProcessor::new(
            OrdersRepo::new(context.pool.clone()),
            mailer,
        ))
    };

    let failure: Arc<dyn FailureHandler> = match config.failure_strategy {
        FailureStrategy::DeadLetter => Arc::new(DeadLetterHandler::new(Arc::new(
            KafkaPublisher::new(context.producer.clone(), DEAD_LETTER_PUBLISH_TIMEOUT),
        ))),
        FailureStrategy::Alert => Arc::new(
            AlertHandler::new(
                config.slack_webhook_url.clone(),
                config.prod_mode,
                config.slack_alert_in_dev,
            )
            .expect("Failed to create alert handler"),
        ),
    };

    let consumption = ConsumptionLoop::new(
        context.consumer.clone(),
        processor,
        failure,
        context.worker_liveness.clone(),
        shutdown,
        &config.consumer,
    );

    match consumption.run().await {
        Ok(()) | Err(SourceError::Cancelled) => info!("consumption stopped cleanly"),
        Err(err) => {
            error!("consumption stopped: {}", err);
            std::process::exit(1);
        }
    }
}
