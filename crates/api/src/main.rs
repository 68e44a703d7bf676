//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use audit_log::{AuditSink, InMemoryAuditLog, PostgresAuditLog};
use domain::{
    BasketService, BasketStore, Catalog, ExpirySweeper, InMemoryBasketStore, InMemoryCatalog,
    PlainTextEncoder, PostgresBasketStore,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
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
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn load_catalog(config: &Config) -> Arc<dyn Catalog> {
    match &config.catalog_path {
        Some(path) => {
            let catalog = InMemoryCatalog::from_path(path).expect("failed to load catalog");
            tracing::info!(path = %path.display(), entries = catalog.len(), "catalog loaded");
            Arc::new(catalog)
        }
        None => {
            tracing::warn!("CATALOG_PATH not set, every identifier will be treated as unknown");
            Arc::new(InMemoryCatalog::new())
        }
    }
}

/// Runs the HTTP server and the expiry sweeper until shutdown.
async fn serve<S, A>(config: &Config, service: BasketService<S, A>, metrics_handle: PrometheusHandle)
where
    S: BasketStore + 'static,
    A: AuditSink + 'static,
{
    let service = Arc::new(service.with_audit_attempts(config.audit_retry_attempts));

    // Expiry sweeper runs until the shutdown flag flips
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = ExpirySweeper::new(Arc::clone(&service), config.sweeper());
    let sweeper_task = tokio::spawn(sweeper.run(shutdown_rx));

    let state = api::create_state(service, Arc::new(PlainTextEncoder));
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    let _ = shutdown_tx.send(true);
    if let Err(err) = sweeper_task.await {
        tracing::error!(error = %err, "expiry sweeper task failed");
    }

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Load the product catalog
    let catalog = load_catalog(&config);

    // 4. Pick a storage backend and serve
    match &config.database_url {
        Some(url) => {
            let pool = PgPool::connect(url)
                .await
                .expect("failed to connect to database");
            let audit = PostgresAuditLog::new(pool.clone());
            audit
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL storage");

            let service = BasketService::new(PostgresBasketStore::new(pool), audit, catalog);
            serve(&config, service, metrics_handle).await;
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory storage");
            let service =
                BasketService::new(InMemoryBasketStore::new(), InMemoryAuditLog::new(), catalog);
            serve(&config, service, metrics_handle).await;
        }
    }
}
