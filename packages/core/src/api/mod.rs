//! Optional HTTP surface: liveness and Prometheus scrape endpoints.

pub mod health;
pub mod metrics;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::metrics::AppMetrics;

/// `GET /health` and `GET /metrics`.
pub fn router(metrics: Arc<AppMetrics>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(metrics::render_metrics))
        .with_state(metrics)
        .layer(TraceLayer::new_for_http())
}

/// Bind the HTTP surface. Done before the monitor starts so a bad address
/// fails startup.
pub async fn bind(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("HTTP surface listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Serve `router` on `listener` until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
