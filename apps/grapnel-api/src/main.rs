//! Grapnel API server.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use grapnel_api::config::{Config, StoreBackend};
use grapnel_api::cors::build_cors_layer;
use grapnel_api::logging::init_logging;
use grapnel_api::{build_router, AppState};
use grapnel_cache::{Cache, MemoryCache};
use grapnel_db::{MemoryStore, PgStore, Store};
use grapnel_notifications::{NotificationWorker, WorkerConfig};
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() {
    // A missing .env file is fine; real deployments use the environment.
    let _ = dotenvy::dotenv();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("FATAL: Configuration error: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config.log_filter);
    info!(
        env = %config.app_env,
        store = %config.store,
        listen_addr = %config.listen_addr,
        "Starting Grapnel API"
    );

    let store: Arc<dyn Store> = match &config.store {
        StoreBackend::Postgres {
            database_url,
            max_connections,
        } => {
            let pg = match PgStore::connect(database_url, *max_connections).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("Failed to connect to database: {e}");
                    std::process::exit(1);
                }
            };
            if let Err(e) = pg.migrate().await {
                tracing::error!("Failed to run migrations: {e}");
                std::process::exit(1);
            }
            info!("Database migrations applied");
            Arc::new(pg)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());

    let state = match AppState::new(store, cache, &config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to build application state: {e}");
            std::process::exit(1);
        }
    };

    let worker = NotificationWorker::new(
        state.dispatcher.clone(),
        WorkerConfig {
            poll_interval: config.dispatch_interval,
        },
    );
    let worker_handle = worker.spawn();

    let app = build_router(state.clone(), &config.api_prefix)
        .layer(build_cors_layer(&config.cors_origins));

    let listener = match tokio::net::TcpListener::bind(config.listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to address {}: {e}", config.listen_addr);
            std::process::exit(1);
        }
    };
    info!(addr = %config.listen_addr, "Server listening");

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(state.shutdown_flag()))
    .await
    {
        tracing::error!("Server error: {e}");
    }

    worker.shutdown();
    if let Err(e) = worker_handle.await {
        tracing::error!("Notification worker task failed: {e}");
    }
    info!("Server shutdown complete");
}

/// Wait for Ctrl+C or SIGTERM, then mark the service as shutting down so the
/// readiness probe starts failing.
async fn shutdown_signal(shutting_down: Arc<AtomicBool>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }

    shutting_down.store(true, Ordering::Release);
}
