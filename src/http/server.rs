//! Shared HTTP server plumbing.
//!
//! # Responsibilities
//! - Wrap a service router in the common middleware stack
//!   (request ID, per-request span, request timeout)
//! - Mount the Prometheus endpoint when enabled
//! - Serve on a listener until a shutdown signal arrives

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{ObservabilityConfig, ServiceConfig, TimeoutConfig};
use crate::http::request::{request_id_header, MakeRequestUuid, RequestSpan};
use crate::lifecycle::shutdown_signal;
use crate::observability::metrics;

/// Add `/metrics` and the middleware stack shared by both services.
#[allow(deprecated)]
pub fn with_common_layers(
    router: Router,
    service: &ServiceConfig,
    timeouts: &TimeoutConfig,
    observability: &ObservabilityConfig,
) -> Router {
    let router = if observability.metrics_enabled {
        let metrics_router = Router::new()
            .route("/metrics", get(metrics_handler))
            .with_state(metrics::init_metrics());
        router.merge(metrics_router)
    } else {
        router
    };

    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(request_id_header(), MakeRequestUuid))
            .layer(PropagateRequestIdLayer::new(request_id_header()))
            .layer(TraceLayer::new_for_http().make_span_with(RequestSpan::new(service)))
            .layer(TimeoutLayer::new(Duration::from_secs(timeouts.request_secs))),
    )
}

async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (StatusCode::OK, handle.render())
}

/// Serve `router` until Ctrl+C, SIGTERM, or `shutdown` fires.
pub async fn serve(
    name: &str,
    router: Router,
    listener: TcpListener,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(service = %name, address = %addr, "HTTP server starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    tracing::info!(service = %name, "HTTP server stopped");
    Ok(())
}
