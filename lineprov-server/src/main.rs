//! Line Provider Server
//!
//! Serves betting events over HTTP and notifies the bet-maker through a
//! message broker whenever an event's outcome status changes.

mod api;
mod config;
mod fixtures;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::file::StorageBackend;
use config::{BrokerKind, BrokerSettings, ConfigLoader, get_database_url};
use lineprov_core::events::status_changed_channel;
use lineprov_core::processors::NotificationDispatcher;
use lineprov_core::publisher::{AmqpConnector, BrokerConnector, MemoryBroker, NotificationPublisher};
use lineprov_core::store::{EventStore, InMemoryEventStore, PgEventStore};
use server::{build_router, run_server};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// How long shutdown waits for in-flight updates to queue their notifications.
const NOTIFICATION_DRAIN_GRACE: Duration = Duration::from_secs(30);

/// Line Provider - betting event service with status change notifications
#[derive(Parser, Debug)]
#[command(name = "lineprov-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "LINEPROV_CONFIG", default_value = "./lineprov-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup (postgres backend only)
    #[arg(long, default_value = "false")]
    migrate: bool,

    /// Insert this many random demo events on startup
    #[arg(long, default_value = "0")]
    seed_fixtures: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting lineprov-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = ConfigLoader::new(&args.config, args.listen)
        .load()
        .map_err(|e| {
            tracing::error!("Failed to load configuration: {}", e);
            e
        })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    // Open the event store
    let (store, db_pool) = open_store(config.storage, args.migrate).await?;

    if args.seed_fixtures > 0 {
        fixtures::seed(store.as_ref(), args.seed_fixtures).await?;
    }

    // Connect to the broker. An unreachable broker is not fatal: the
    // dispatcher reconnects when the next notification arrives.
    let publisher = Arc::new(NotificationPublisher::new(broker_connector(&config.broker)));
    tracing::info!(queue = %config.broker.queue, "Connecting to message broker...");
    if let Err(e) = publisher.connect().await {
        tracing::warn!(error = %e, "Message broker unavailable at startup");
    }

    // Spawn the notification dispatcher
    let (status_tx, status_rx) = status_changed_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatcher = NotificationDispatcher::new(
        publisher.clone(),
        config.broker.queue.clone(),
        status_rx,
        shutdown_rx,
    );
    let dispatch_stats = dispatcher.stats();
    let dispatcher_handle = tokio::spawn(dispatcher.run());

    // Create application state and build the router
    let state = AppState::new(store, publisher.clone(), status_tx, dispatch_stats);
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", config.listen);
    let result = run_server(router, config.listen).await;

    // The router is gone by now; the dispatcher stops once the update tasks
    // that outlived their requests have dropped their senders too.
    shutdown::finish_dispatch(dispatcher_handle, shutdown_tx, NOTIFICATION_DRAIN_GRACE).await;
    publisher.disconnect().await;

    if let Some(pool) = db_pool {
        tracing::info!("Closing database connections...");
        pool.close().await;
    }
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Open the configured event store, returning the pool when one is used.
async fn open_store(
    backend: StorageBackend,
    migrate: bool,
) -> anyhow::Result<(Arc<dyn EventStore>, Option<PgPool>)> {
    match backend {
        StorageBackend::Memory => {
            if migrate {
                tracing::warn!("--migrate has no effect with the memory backend");
            }
            tracing::info!("Using in-memory event store");
            Ok((Arc::new(InMemoryEventStore::new()), None))
        }
        StorageBackend::Postgres => {
            let database_url = get_database_url().map_err(|e| {
                tracing::error!("DATABASE_URL environment variable not set");
                e
            })?;

            tracing::info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&database_url)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to database: {}", e);
                    e
                })?;
            tracing::info!("Database connection established");

            if migrate {
                tracing::info!("Running database migrations...");
                sqlx::migrate!("../migrations")
                    .run(&db_pool)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to run migrations: {}", e);
                        e
                    })?;
                tracing::info!("Migrations completed successfully");
            }

            Ok((Arc::new(PgEventStore::new(db_pool.clone())), Some(db_pool)))
        }
    }
}

/// Pick the broker implementation for the configured URL.
fn broker_connector(settings: &BrokerSettings) -> Arc<dyn BrokerConnector> {
    match settings.kind {
        BrokerKind::Amqp => Arc::new(AmqpConnector::new(
            settings.url.as_str(),
            settings.connect_timeout,
        )),
        BrokerKind::Memory => {
            tracing::warn!("Using in-process broker; notifications never leave this process");
            Arc::new(MemoryBroker::new())
        }
    }
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,lapin=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
