//! Metrics HTTP endpoint.
//!
//! - `GET /healthz` - liveness probe (simple OK)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;

use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::get_metrics_handle;

/// Errors from the metrics server.
#[derive(Debug, thiserror::Error)]
pub enum MetricsServerError {
    /// Failed to bind to the port.
    #[error("failed to bind metrics server to port {0}: {1}")]
    BindFailed(u16, String),
    /// Server failed while running.
    #[error("metrics server failed: {0}")]
    ServerFailed(String),
}

/// Prometheus scrape endpoint.
pub struct MetricsServer {
    port: u16,
    cancel: CancellationToken,
}

impl MetricsServer {
    /// Create a new metrics server.
    #[must_use]
    pub const fn new(port: u16, cancel: CancellationToken) -> Self {
        Self { port, cancel }
    }

    fn router() -> Router {
        Router::new()
            .route("/healthz", get(liveness_handler))
            .route("/metrics", get(metrics_handler))
    }

    /// Run the server until cancelled.
    pub async fn run(self) -> Result<(), MetricsServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| MetricsServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Metrics server listening");

        axum::serve(listener, Self::router())
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| MetricsServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Metrics server stopped");
        Ok(())
    }
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "metrics not initialized".to_string(),
            )
        },
        |handle| (StatusCode::OK, handle.render()),
    )
}
