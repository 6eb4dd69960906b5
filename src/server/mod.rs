//! HTTP server: shared context, router assembly and lifecycle.

use crate::catalog::CatalogLookup;
use crate::config::Config;
use crate::storage::ObjectStore;
use crate::streaming::{self, RelayOptions, StreamingEndpoint};
use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use vidserve_db::pool::DbPool;

pub mod error;
pub mod routes_videos;

pub use error::AppError;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// Catalog connection pool
    pub db_pool: DbPool,
    /// Object store holding video and cover bytes
    pub store: Arc<dyn ObjectStore>,
    /// Range-aware media endpoint
    pub streaming: Arc<StreamingEndpoint>,
}

impl AppContext {
    /// Wire the catalog lookup and streaming endpoint over a pool and store.
    pub fn new(config: Config, db_pool: DbPool, store: Arc<dyn ObjectStore>) -> Self {
        let lookup = CatalogLookup::from_config(db_pool.clone(), &config.storage);
        let streaming = StreamingEndpoint::new(
            Arc::new(lookup),
            store.clone(),
            RelayOptions::from(&config.streaming),
        );

        Self {
            config: Arc::new(config),
            db_pool,
            store,
            streaming: Arc::new(streaming),
        }
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let app = Router::new()
        .route("/health", get(health_check))
        .merge(routes_videos::video_routes())
        .merge(streaming::stream_router());

    let app = if ctx.config.server.cors_allow_any {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::HEAD])
            .allow_headers([header::RANGE, header::CONTENT_TYPE])
            .expose_headers([
                header::ACCEPT_RANGES,
                header::CONTENT_RANGE,
                header::CONTENT_LENGTH,
                header::CONTENT_DISPOSITION,
            ]);
        app.layer(cors)
    } else {
        app
    };

    app.layer(TraceLayer::new_for_http()).with_state(ctx)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Bind the configured address and serve until a shutdown signal arrives.
pub async fn start_server(ctx: AppContext) -> Result<()> {
    let server = &ctx.config.server;
    let addr: SocketAddr = format!("{}:{}", server.host, server.port)
        .parse()
        .context("Invalid server address")?;

    let app = create_router(ctx.clone());

    tracing::info!(
        backend = ctx.store.name(),
        chunk_size = ctx.streaming.options().chunk_size,
        "Starting server on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
