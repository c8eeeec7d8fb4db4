//! Service entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat, StorageMode};
use api::routes::products::{AppState, Deployment};
use common::TlsIdentity;
use compensation::KafkaCompensationPublisher;
use consumer::{EventConsumer, EventSource, KafkaEventSource};
use ledger::{StockLedger, StockStore};
use metrics_exporter_prometheus::PrometheusHandle;
use stock_store::{InMemoryStockStore, PostgresStockStore};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env().expect("invalid configuration");
    init_tracing(&config);

    let metrics_handle =
        api::routes::metrics::install_recorder().expect("failed to install Prometheus recorder");

    // Loaded once here and handed to every Kafka client.
    let tls = config.tls_identity().expect("failed to load TLS identity");

    tracing::info!(
        storage = config.storage.label(),
        kafka_enabled = config.kafka.enabled,
        tls_enabled = tls.is_some(),
        commit_policy = config.consumer.commit_policy.name(),
        "starting stock ledger service"
    );

    match config.storage.clone() {
        StorageMode::InMemory => {
            tracing::warn!("using in-memory store, stock levels are lost on restart");
            serve(config, InMemoryStockStore::new(), tls, metrics_handle).await;
        }
        StorageMode::Postgres { url } => {
            let store = PostgresStockStore::connect(&url, config.database_max_connections)
                .await
                .expect("failed to connect to Postgres");
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            serve(config, store, tls, metrics_handle).await;
        }
    }
}

async fn serve<S: StockStore + 'static>(
    config: Config,
    store: S,
    tls: Option<Arc<TlsIdentity>>,
    metrics_handle: PrometheusHandle,
) {
    let ledger = Arc::new(StockLedger::new(store));
    let deployment = Deployment {
        mode: match config.storage {
            StorageMode::InMemory => "local",
            StorageMode::Postgres { .. } => "production",
        },
        storage: config.storage.label(),
        tls: tls.is_some(),
    };
    let mut state = AppState::new(ledger.clone(), deployment);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut consumer_task = None;

    if config.kafka.enabled {
        let settings = config.kafka_settings(tls);
        let source: Arc<dyn EventSource> = Arc::new(
            KafkaEventSource::new(&settings, &config.kafka.group_id, config.kafka.order_topic.as_str())
                .expect("failed to create Kafka consumer"),
        );

        let mut publisher =
            KafkaCompensationPublisher::new(&settings, config.kafka.compensation_topic.as_str())
                .expect("failed to create Kafka producer");
        if let Some(topic) = &config.kafka.stock_deducted_topic {
            publisher = publisher.with_stock_deducted_topic(topic.as_str());
        }

        let consumer = EventConsumer::new(ledger, source.clone(), config.consumer.clone())
            .with_publisher(Arc::new(publisher));
        state = state.with_stream(source);

        tracing::info!(
            topic = %config.kafka.order_topic,
            group_id = %config.kafka.group_id,
            "starting order-event consumer"
        );
        consumer_task = Some(tokio::spawn(async move {
            let stats = consumer.run(shutdown_rx).await;
            (stats, consumer.state())
        }));
    }

    let app = api::create_app(Arc::new(state), metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // No receivers remain when consumption is disabled.
    let _ = shutdown_tx.send(true);

    if let Some(task) = consumer_task {
        match task.await {
            Ok((stats, state)) => tracing::info!(
                %state,
                completed = stats.events_completed,
                failed = stats.events_failed,
                malformed = stats.events_malformed,
                "order-event consumer stopped"
            ),
            Err(err) => tracing::error!(error = %err, "order-event consumer task panicked"),
        }
    }

    tracing::info!("server shut down gracefully");
}
