//! Breaker-wrapped upstream calls.
//!
//! # Responsibilities
//! - Bound each upstream call with a deadline
//! - Time the call and classify it by status and latency
//! - Feed the verdict to the circuit breaker
//!
//! # Classification
//! ```text
//! transport error            → failure, TransportError(cause)
//! 410 Gone                   → failure, UpstreamGone
//! elapsed > latency budget   → failure, SlowOk(body) (data still delivered)
//! anything else              → success, Ok(body)
//! ```

use axum::body::Bytes;
use axum::http::StatusCode;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::resilience::circuit_breaker::{
    BreakerError, BreakerRejection, BreakerSettings, BreakerState, CircuitBreaker, Counts,
};
use crate::resilience::timeouts::with_deadline;
use crate::upstream::{TransportError, UpstreamResponse};

/// Result of a call that the breaker admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Ok(Bytes),
    /// Data arrived, but slower than the latency budget.
    SlowOk(Bytes),
    /// The upstream refused with 410 Gone.
    UpstreamGone,
    TransportError(TransportError),
}

impl CallOutcome {
    /// Label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            CallOutcome::Ok(_) => "ok",
            CallOutcome::SlowOk(_) => "slow_ok",
            CallOutcome::UpstreamGone => "upstream_gone",
            CallOutcome::TransportError(_) => "transport_error",
        }
    }
}

/// Reasons a completed call counts against the breaker.
#[derive(Debug, Error)]
enum Degradation {
    #[error("upstream exceeded latency budget")]
    Slow(Bytes),
    #[error("upstream refused")]
    Gone,
    #[error(transparent)]
    Transport(TransportError),
}

/// Decide how a completed call counts.
fn classify(
    response: UpstreamResponse,
    elapsed: Duration,
    latency_budget: Duration,
) -> Result<Bytes, Degradation> {
    if response.status == StatusCode::GONE {
        return Err(Degradation::Gone);
    }
    if elapsed > latency_budget {
        return Err(Degradation::Slow(response.body));
    }
    Ok(response.body)
}

/// Calls one upstream through a circuit breaker.
#[derive(Debug)]
pub struct BreakerCaller {
    breaker: CircuitBreaker,
    latency_budget: Duration,
    call_timeout: Duration,
}

impl BreakerCaller {
    pub fn new(breaker: CircuitBreaker, latency_budget: Duration, call_timeout: Duration) -> Self {
        Self {
            breaker,
            latency_budget,
            call_timeout,
        }
    }

    pub fn from_config(config: &BreakerConfig, call_timeout: Duration) -> Self {
        Self::new(
            CircuitBreaker::new(BreakerSettings::from_config(config)),
            config.latency_budget(),
            call_timeout,
        )
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn state(&self) -> BreakerState {
        self.breaker.state()
    }

    pub fn counts(&self) -> Counts {
        self.breaker.counts()
    }

    /// Run `remote` through the breaker and classify the result.
    ///
    /// Rejections mean `remote` was never invoked.
    pub async fn call<F, Fut>(&self, remote: F) -> Result<CallOutcome, BreakerRejection>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<UpstreamResponse, TransportError>>,
    {
        let latency_budget = self.latency_budget;
        let deadline = self.call_timeout;

        let result = self
            .breaker
            .call(|| async move {
                let started = Instant::now();
                let response = with_deadline(deadline, remote())
                    .await
                    .map_err(Degradation::Transport)?;
                let elapsed = started.elapsed();
                tracing::debug!(
                    status = %response.status,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Upstream call finished"
                );
                classify(response, elapsed, latency_budget)
            })
            .await;

        match result {
            Ok(body) => Ok(CallOutcome::Ok(body)),
            Err(BreakerError::Inner(Degradation::Slow(body))) => Ok(CallOutcome::SlowOk(body)),
            Err(BreakerError::Inner(Degradation::Gone)) => Ok(CallOutcome::UpstreamGone),
            Err(BreakerError::Inner(Degradation::Transport(e))) => {
                Ok(CallOutcome::TransportError(e))
            }
            Err(BreakerError::Rejected(rejection)) => Err(rejection),
        }
    }
}
