//! CloudBridge connector server.
//!
//! Receives webhook deliveries from linked external clouds, translates
//! them into resource registry commands, and keeps the device projection
//! warm across restarts.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CLOUDBRIDGE_CONFIG` | - | Path to a TOML config file |
//! | `CLOUDBRIDGE_HTTP_PORT` | `8080` | Webhook intake port |
//! | `CLOUDBRIDGE_MONGODB_URI` | `mongodb://localhost:27017` | MongoDB connection URL |
//! | `CLOUDBRIDGE_EVENTS_URL` | - | Public callback URL (required) |
//! | `CLOUDBRIDGE_REGISTRY_URL` | `http://localhost:9083` | Registry command API |
//! | `CLOUDBRIDGE_POOL_SIZE` | `16` | Background task pool width |
//! | `RUST_LOG` | `info` | Log level |

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cb_common::TaskPool;
use cb_config::ConfigLoader;
use cb_connector::api::{self, AppState};
use cb_connector::cache::CorrelationCache;
use cb_connector::{
    register_stored_devices, CloudClient, DeviceRegistry, EventDispatcher, HttpRegistryClient,
    ResourceRegistryClient, SubscriptionManager,
};
use cb_store::MongoStore;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    cb_common::logging::init_logging("cb-connector-server");

    info!("Starting CloudBridge connector");

    let config = ConfigLoader::new()
        .load()
        .context("cannot load configuration")?;

    info!(
        uri = %config.mongodb.uri,
        database = %config.mongodb.database,
        "Connecting to MongoDB"
    );
    let mongo_client = mongodb::Client::with_uri_str(&config.mongodb.uri)
        .await
        .context("cannot connect to MongoDB")?;
    let db = mongo_client.database(&config.mongodb.database);
    let store = Arc::new(MongoStore::new(&db));

    let pool = TaskPool::new(config.connector.pool_size);
    let projection = DeviceRegistry::new(pool.clone());

    // The event-log transport feeds projection updates through this
    // channel; the registry drains it through the bounded pool.
    let (projection_tx, projection_rx) = mpsc::channel(256);
    let projection_handle = Arc::clone(&projection).run(projection_rx);

    let cloud = CloudClient::new(
        config.cloud.events_url.clone(),
        Duration::from_secs(config.cloud.timeout_secs),
    );
    let registry: Arc<dyn ResourceRegistryClient> = Arc::new(HttpRegistryClient::new(
        config.registry.url.clone(),
        Duration::from_secs(config.registry.timeout_secs),
    ));

    let cache = CorrelationCache::new(Duration::from_secs(config.connector.correlation_ttl_secs));
    let manager = Arc::new(SubscriptionManager::new(
        cloud,
        registry,
        store.clone(),
        cache,
    ));

    // Restore the projection's warm set before accepting traffic; a
    // failing cursor aborts startup.
    let registered = register_stored_devices(store.as_ref(), projection.as_ref())
        .await
        .context("cannot re-register stored devices")?;
    info!(registered = registered, "device projection warmed");

    let sweeper_handle = manager.spawn_cache_sweeper(Duration::from_secs(
        config.connector.correlation_sweep_secs,
    ));

    let dispatcher = Arc::new(EventDispatcher::new(manager.clone()));
    let state = AppState {
        dispatcher,
        subscriptions: store.clone(),
        accounts: store,
        projection,
    };

    let addr: SocketAddr = format!("{}:{}", config.http.host, config.http.port)
        .parse()
        .context("invalid http host/port")?;
    info!(%addr, "Webhook intake listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("cannot bind intake listener")?;
    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("intake server failed")?;

    info!("Shutting down");
    sweeper_handle.abort();
    drop(projection_tx);
    let _ = tokio::time::timeout(Duration::from_secs(5), projection_handle).await;

    info!("CloudBridge connector stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
