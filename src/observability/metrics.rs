//! Metrics collection and exposition.
//!
//! # Metrics
//! - `puch_requests_total` (counter): requests by route, status
//! - `puch_request_duration_seconds` (histogram): latency by route
//! - `puch_load_hits_total` (counter): load machine hits by resulting state
//! - `puch_load_state` (gauge): 0=nominal, 1=degraded, 2=overloaded
//! - `puch_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `puch_breaker_transitions_total` (counter): by from/to state
//! - `puch_breaker_calls_total` (counter): protected calls by outcome
//!
//! Recording is a no-op until [`init_metrics`] installs the recorder.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

use crate::load::LoadState;
use crate::resilience::BreakerState;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder once per process and return its handle.
pub fn init_metrics() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if ::metrics::set_global_recorder(recorder).is_err() {
                tracing::warn!("A metrics recorder was already installed; /metrics will be empty");
            }
            handle
        })
        .clone()
}

pub fn record_request(route: &'static str, status: u16, start: Instant) {
    let status = status.to_string();
    ::metrics::counter!("puch_requests_total", "route" => route, "status" => status)
        .increment(1);
    ::metrics::histogram!("puch_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_hit(state: LoadState) {
    ::metrics::counter!("puch_load_hits_total", "state" => state.as_str()).increment(1);
    ::metrics::gauge!("puch_load_state").set(f64::from(state.severity()));
}

pub fn record_breaker_state(name: &str, state: BreakerState) {
    let value = match state {
        BreakerState::Closed => 0.0,
        BreakerState::HalfOpen => 1.0,
        BreakerState::Open => 2.0,
    };
    ::metrics::gauge!("puch_breaker_state", "breaker" => name.to_string()).set(value);
}

pub fn record_breaker_transition(name: &str, from: BreakerState, to: BreakerState) {
    ::metrics::counter!(
        "puch_breaker_transitions_total",
        "breaker" => name.to_string(),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
    record_breaker_state(name, to);
}

pub fn record_breaker_call(name: &str, outcome: &'static str) {
    ::metrics::counter!(
        "puch_breaker_calls_total",
        "breaker" => name.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_recorded_series() {
        let handle = init_metrics();
        record_hit(LoadState::Degraded);
        record_breaker_transition("green", BreakerState::Closed, BreakerState::Open);

        let rendered = handle.render();
        assert!(rendered.contains("puch_load_hits_total"));
        assert!(rendered.contains("puch_breaker_transitions_total"));
    }
}
