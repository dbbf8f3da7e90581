//! Student Housing Backend API
//!
//! Serves room, student, application and registration endpoints on top of
//! the consistency engines, with a background occupancy reconciler.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware, Router};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use student_housing::api;
use student_housing::db;
use student_housing::jobs::JobScheduler;
use student_housing::notify::LogNotifier;
use student_housing::store::Stores;
use student_housing::{Config, Engines, StoreBackend};

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "student_housing=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build the application router
fn build_router(engines: Engines) -> Router {
    // Layers run last-added first: context -> logging -> handler
    let api_routes = api::create_router()
        .layer(middleware::from_fn(api::middleware::logging_middleware))
        .layer(middleware::from_fn(api::middleware::context_middleware));

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(engines)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for the postgres backend"))?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(url)
        .await?;

    db::verify_connection(&pool).await?;
    db::ensure_schema(&pool).await?;
    if !db::check_schema(&pool).await? {
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }

    tracing::info!("Database connected successfully");
    Ok(pool)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!(
        environment = %config.environment,
        backend = ?config.store_backend,
        "Starting student housing server"
    );

    let pool = match config.store_backend {
        StoreBackend::Postgres => Some(connect(&config).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on shutdown");
            None
        }
    };
    let stores = match &pool {
        Some(pool) => Stores::postgres(pool.clone()),
        None => Stores::in_memory(),
    };

    let engines = Engines::new(stores, Arc::new(LogNotifier::new(config.notify_from.clone())));

    let scheduler = config.reconcile_interval().map(|interval| {
        JobScheduler::new(engines.stores.clone(), engines.locks.clone(), interval).start()
    });
    if scheduler.is_none() {
        tracing::info!("Occupancy reconciliation disabled");
    }

    let app = build_router(engines);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutting down...");
    if let Some(handle) = scheduler {
        handle.abort();
    }
    if let Some(pool) = pool {
        pool.close().await;
        tracing::info!("Database connections closed");
    }
    tracing::info!("Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
