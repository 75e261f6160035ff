pub mod error;
pub mod handlers;

use crate::core::{RateSource, RateStore};
use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared application state, passed to all route handlers via `axum::extract::State`.
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn RateSource>,
    pub store: Arc<dyn RateStore>,
}

impl AppState {
    pub fn new(source: Arc<dyn RateSource>, store: Arc<dyn RateStore>) -> Self {
        Self { source, store }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/rate", get(handlers::latest_rate))
        .route(
            "/api/rate/refresh",
            post(handlers::refresh_rate).get(handlers::refresh_rate),
        )
        .route("/api/rate/history", get(handlers::rate_history))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the API on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().context("Failed to read listener address")?;
    info!("Rate API listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")
}

/// Parses `bind` as a bare IPv4 or IPv6 address, e.g. `0.0.0.0` or `::`.
pub fn socket_addr(bind: &str, port: u16) -> Result<SocketAddr> {
    let ip: IpAddr = bind
        .parse()
        .with_context(|| format!("Invalid bind address: {bind}"))?;
    Ok(SocketAddr::new(ip, port))
}

pub async fn bind(bind: &str, port: u16) -> Result<TcpListener> {
    let addr = socket_addr(bind, port)?;
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))
}

pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, gracefully stopping");
}
