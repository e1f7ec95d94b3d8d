//! The red (downstream) service.
//!
//! # Routes
//! - `GET /ping`, `GET /status`: liveness
//! - `GET /puch-without-cb`: direct, unprotected call to the upstream
//! - `GET /puch-with-cb`: call through the circuit breaker
//! - `GET /breaker`: breaker state and counts
//! - `GET /metrics`: Prometheus exposition (when enabled)

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::RedConfig;
use crate::http::request::request_id;
use crate::http::response::message;
use crate::http::server::{serve, with_common_layers};
use crate::observability::metrics;
use crate::resilience::{
    map_outcome, BreakerCaller, BreakerState, CallOutcome, Counts, Severity,
};
use crate::resilience::timeouts::with_deadline;
use crate::upstream::{TransportError, UpstreamClient, UpstreamResponse};

type UpstreamFuture = Pin<Box<dyn Future<Output = Result<UpstreamResponse, TransportError>> + Send>>;

/// The remote call made by red's handlers. Abstracted so tests can stand
/// in for the upstream without a network.
pub trait Upstream: Send + Sync + 'static {
    fn get(&self, request_id: Option<String>) -> UpstreamFuture;
}

impl Upstream for UpstreamClient {
    fn get(&self, request_id: Option<String>) -> UpstreamFuture {
        let client = self.clone();
        Box::pin(async move { client.get(request_id.as_deref()).await })
    }
}

/// Application state injected into red handlers.
#[derive(Clone)]
pub struct RedState {
    pub upstream: Arc<dyn Upstream>,
    pub caller: Arc<BreakerCaller>,
    pub config: Arc<RedConfig>,
}

#[derive(Debug, Serialize)]
struct BreakerStatus {
    name: String,
    state: BreakerState,
    counts: Counts,
}

pub struct RedServer {
    router: Router,
    config: Arc<RedConfig>,
    caller: Arc<BreakerCaller>,
}

impl RedServer {
    pub fn new(config: RedConfig) -> Result<Self, TransportError> {
        let upstream = Arc::new(UpstreamClient::new(&config.upstream)?);
        Ok(Self::with_upstream(config, upstream))
    }

    pub fn with_upstream(config: RedConfig, upstream: Arc<dyn Upstream>) -> Self {
        let config = Arc::new(config);
        let caller = Arc::new(BreakerCaller::from_config(
            &config.breaker,
            config.upstream.timeout(),
        ));
        let state = RedState {
            upstream,
            caller: caller.clone(),
            config: config.clone(),
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
            caller,
        }
    }

    pub fn routes(state: RedState) -> Router {
        Router::new()
            .route("/ping", get(ping))
            .route("/status", get(status))
            .route("/puch-without-cb", get(puch_without_cb))
            .route("/puch-with-cb", get(puch_with_cb))
            .route("/breaker", get(breaker_status))
            .with_state(state)
    }

    pub fn config(&self) -> &RedConfig {
        &self.config
    }

    pub fn caller(&self) -> Arc<BreakerCaller> {
        self.caller.clone()
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
    message(StatusCode::OK, "pong")
}

async fn status() -> Response {
    message(StatusCode::OK, "ok")
}

async fn breaker_status(State(state): State<RedState>) -> Json<BreakerStatus> {
    let breaker = state.caller.breaker();
    Json(BreakerStatus {
        name: breaker.name().to_string(),
        state: breaker.state(),
        counts: breaker.counts(),
    })
}

async fn puch_without_cb(State(state): State<RedState>, headers: HeaderMap) -> Response {
    let start = Instant::now();
    let id = request_id(&headers).map(str::to_string);

    let result = with_deadline(state.config.upstream.timeout(), state.upstream.get(id)).await;
    let response = match result {
        Ok(upstream) if upstream.status == StatusCode::OK => {
            tracing::info!("Upstream still OK");
            message(StatusCode::OK, "OK")
        }
        Ok(upstream) if upstream.status == StatusCode::GONE => {
            tracing::error!(status = %upstream.status, "Upstream gone");
            message(StatusCode::GONE, "upstream gone")
        }
        Ok(upstream) => {
            tracing::error!(status = %upstream.status, "Upstream returned unexpected status");
            message(StatusCode::BAD_REQUEST, "upstream returned an error")
        }
        Err(e) => {
            tracing::error!(error = %e, "Upstream unreachable");
            message(StatusCode::GONE, "upstream gone")
        }
    };

    metrics::record_request("/puch-without-cb", response.status().as_u16(), start);
    response
}

async fn puch_with_cb(State(state): State<RedState>, headers: HeaderMap) -> Response {
    let start = Instant::now();
    let id = request_id(&headers).map(str::to_string);
    let upstream = state.upstream.clone();

    let result = state.caller.call(move || upstream.get(id)).await;
    let mapped = map_outcome(&result);

    let label = match &result {
        Ok(outcome) => outcome.label(),
        Err(rejection) => rejection.label(),
    };
    metrics::record_breaker_call(state.caller.breaker().name(), label);

    match (&result, mapped.severity) {
        (_, Severity::Info) => tracing::info!(status = %mapped.status, "Upstream OK"),
        (_, Severity::Warn) => {
            tracing::warn!(status = %mapped.status, "Upstream exceeded latency budget")
        }
        (Ok(CallOutcome::TransportError(e)), Severity::Error) => tracing::error!(
            status = %mapped.status,
            error = %e,
            "{}",
            mapped.message
        ),
        (_, Severity::Error) => tracing::error!(
            status = %mapped.status,
            outcome = label,
            "{}",
            mapped.message
        ),
    }

    metrics::record_request("/puch-with-cb", mapped.status.as_u16(), start);
    mapped.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::{BreakerSettings, CircuitBreaker};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    /// Answers every call the same way and counts invocations.
    struct Scripted {
        status: Option<StatusCode>,
        delay: Duration,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(status: Option<StatusCode>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                status,
                delay,
                calls: AtomicU32::new(0),
            })
        }
    }

    impl Upstream for Scripted {
        fn get(&self, _request_id: Option<String>) -> UpstreamFuture {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let status = self.status;
            let delay = self.delay;
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                match status {
                    Some(status) => Ok(UpstreamResponse::new(status, "{}")),
                    None => Err(TransportError::Request("connection refused".into())),
                }
            })
        }
    }

    fn app(upstream: Arc<Scripted>, threshold: u32) -> (Router, Arc<BreakerCaller>) {
        let breaker = CircuitBreaker::new(BreakerSettings {
            name: "green".into(),
            max_requests: 1,
            interval: None,
            timeout: Duration::from_secs(6),
            ready_to_trip: BreakerSettings::failures_above(threshold),
        });
        let caller = Arc::new(BreakerCaller::new(
            breaker,
            Duration::from_millis(400),
            Duration::from_secs(2),
        ));
        let router = RedServer::routes(RedState {
            upstream,
            caller: caller.clone(),
            config: Arc::new(RedConfig::default()),
        });
        (router, caller)
    }

    async fn get(router: &Router, path: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .clone()
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 4096).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_ping_and_status() {
        let (router, _) = app(Scripted::new(Some(StatusCode::OK), Duration::ZERO), 80);

        let (status, body) = get(&router, "/ping").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "pong");

        let (status, body) = get(&router, "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_cb_fast_ok() {
        let (router, caller) = app(Scripted::new(Some(StatusCode::OK), Duration::ZERO), 80);

        let (status, body) = get(&router, "/puch-with-cb").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "OK");
        assert_eq!(caller.counts().total_successes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_cb_slow_ok_still_returns_ok() {
        let upstream = Scripted::new(Some(StatusCode::OK), Duration::from_millis(450));
        let (router, caller) = app(upstream, 80);

        let (status, body) = get(&router, "/puch-with-cb").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "OK");
        assert_eq!(caller.counts().total_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_cb_gone_then_open() {
        let upstream = Scripted::new(Some(StatusCode::GONE), Duration::ZERO);
        let (router, caller) = app(upstream.clone(), 2);

        for _ in 0..3 {
            let (status, body) = get(&router, "/puch-with-cb").await;
            assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
            assert_eq!(body["message"], "upstream still overloaded");
        }
        assert_eq!(caller.state(), BreakerState::Open);

        let (status, body) = get(&router, "/puch-with-cb").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "upstream about to degrade further");
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_cb_transport_error() {
        let (router, _) = app(Scripted::new(None, Duration::ZERO), 80);

        let (status, body) = get(&router, "/puch-with-cb").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "upstream has a problem");
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_cb_mapping() {
        let (router, _) = app(Scripted::new(Some(StatusCode::OK), Duration::ZERO), 80);
        assert_eq!(get(&router, "/puch-without-cb").await.0, StatusCode::OK);

        let (router, _) = app(Scripted::new(Some(StatusCode::GONE), Duration::ZERO), 80);
        assert_eq!(get(&router, "/puch-without-cb").await.0, StatusCode::GONE);

        let (router, _) = app(Scripted::new(None, Duration::ZERO), 80);
        assert_eq!(get(&router, "/puch-without-cb").await.0, StatusCode::GONE);

        let upstream = Scripted::new(Some(StatusCode::INTERNAL_SERVER_ERROR), Duration::ZERO);
        let (router, _) = app(upstream, 80);
        assert_eq!(get(&router, "/puch-without-cb").await.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_cb_never_touches_breaker() {
        let upstream = Scripted::new(Some(StatusCode::GONE), Duration::ZERO);
        let (router, caller) = app(upstream, 0);

        for _ in 0..5 {
            get(&router, "/puch-without-cb").await;
        }
        assert_eq!(caller.state(), BreakerState::Closed);
        assert_eq!(caller.counts().requests, 0);
    }

    #[tokio::test]
    async fn test_breaker_endpoint() {
        let (router, _) = app(Scripted::new(Some(StatusCode::OK), Duration::ZERO), 80);

        let (status, body) = get(&router, "/breaker").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "green");
        assert_eq!(body["state"], "closed");
        assert_eq!(body["counts"]["requests"], 0);
    }
}
