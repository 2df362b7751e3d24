//! HTTP server for the Prometheus `/metrics` endpoint, mirroring the
//! teacher's `healthcheck-server::http_server` 1:1.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use common::MetricsRegistry;
use prometheus_client::encoding::text::encode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct MetricsServer {
    registry: Arc<MetricsRegistry>,
    listen_addr: String,
}

impl MetricsServer {
    pub fn new(registry: Arc<MetricsRegistry>, listen_addr: String) -> Self {
        Self { registry, listen_addr }
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let app = Router::new()
            .route("/metrics", get(metrics_handler))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
            .with_state(self.registry);

        let listener = TcpListener::bind(&self.listen_addr).await?;
        info!(listen_addr = %self.listen_addr, "metrics server listening");
        axum::serve(listener, app).await?;
        Ok(())
    }
}

async fn metrics_handler(State(registry): State<Arc<MetricsRegistry>>) -> Response {
    let mut buffer = String::new();
    if let Err(e) = encode(&mut buffer, &registry.registry) {
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to encode metrics: {e}")).into_response();
    }
    (StatusCode::OK, [("content-type", "text/plain; version=0.0.4")], buffer).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn metrics_handler_does_not_panic() {
        let registry = Arc::new(MetricsRegistry::new());
        registry.record_config_snapshot();
        let _response = metrics_handler(State(registry)).await;
    }
}
