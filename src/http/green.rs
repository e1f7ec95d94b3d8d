//! The green (upstream) service.
//!
//! # Routes
//! - `GET /ping`: liveness
//! - `GET /puched`: one hit on the load machine; 200, slow 200, or 410
//! - `GET /error`: always 500
//! - `GET /state`: snapshot of the load machine without hitting it
//! - `GET /metrics`: Prometheus exposition (when enabled)

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::GreenConfig;
use crate::http::response::message;
use crate::http::server::{serve, with_common_layers};
use crate::load::{LoadMonitor, LoadSnapshot, LoadState};
use crate::observability::metrics;

/// Application state injected into green handlers.
#[derive(Clone)]
pub struct GreenState {
    pub monitor: Arc<LoadMonitor>,
}

#[derive(Debug, Serialize)]
struct PuchedBody {
    message: &'static str,
    counter: u64,
}

#[derive(Debug, Serialize)]
struct Empty {}

pub struct GreenServer {
    router: Router,
    config: GreenConfig,
    monitor: Arc<LoadMonitor>,
}

impl GreenServer {
    pub fn new(config: GreenConfig) -> Self {
        let monitor = Arc::new(LoadMonitor::from_config(&config.load));
        let state = GreenState {
            monitor: monitor.clone(),
        };
        let router = with_common_layers(
            Self::routes(state),
            &config.service,
            &config.timeouts,
            &config.observability,
        );
        Self {
            router,
            config,
            monitor,
        }
    }

    pub fn routes(state: GreenState) -> Router {
        Router::new()
            .route("/ping", get(ping))
            .route("/puched", get(puched))
            .route("/error", get(error))
            .route("/state", get(load_state))
            .with_state(state)
    }

    pub fn config(&self) -> &GreenConfig {
        &self.config
    }

    pub fn monitor(&self) -> Arc<LoadMonitor> {
        self.monitor.clone()
    }

    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        serve(&self.config.service.name, self.router, listener, shutdown).await
    }
}

async fn ping() -> Response {
    message(StatusCode::OK, "OK")
}

async fn error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

async fn load_state(State(state): State<GreenState>) -> Json<LoadSnapshot> {
    Json(state.monitor.snapshot())
}

async fn puched(State(state): State<GreenState>) -> Response {
    let start = Instant::now();
    let hit = state.monitor.hit();

    let response = match hit.state {
        LoadState::Nominal => {
            tracing::info!(counter = hit.counter, "Still OK");
            ok_payload(hit.counter)
        }
        LoadState::Degraded => {
            tracing::warn!(counter = hit.counter, "Degraded, answering slowly");
            if let Some(delay) = state.monitor.response_delay(hit.state) {
                tokio::time::sleep(delay).await;
            }
            ok_payload(hit.counter)
        }
        LoadState::Overloaded => {
            tracing::error!(counter = hit.counter, "Overloaded, refusing");
            (StatusCode::GONE, Json(Empty {})).into_response()
        }
    };

    metrics::record_request("/puched", response.status().as_u16(), start);
    response
}

fn ok_payload(counter: u64) -> Response {
    let body = PuchedBody {
        message: "OK",
        counter,
    };
    (StatusCode::OK, Json(body)).into_response()
}
