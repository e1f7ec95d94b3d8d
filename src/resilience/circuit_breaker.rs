//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: upstream assumed unhealthy, requests fail fast
//! - Half-Open: a bounded number of probes test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: ready_to_trip(counts) after a failure
//! Open → Half-Open: after open_timeout
//! Half-Open → Closed: consecutive successes >= max_requests
//! Half-Open → Open: any probe fails
//! ```
//!
//! # Design Decisions
//! - Counts live in generations; every state change (or closed-state
//!   interval expiry) starts a new one and results from older
//!   generations are dropped
//! - The lock is never held across the protected call
//! - A call dropped before completing counts as a failure

use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::observability::metrics;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half-open",
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request counts for the current generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub requests: u32,
    pub total_successes: u32,
    pub total_failures: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl Counts {
    fn on_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    fn on_success(&mut self) {
        self.total_successes = self.total_successes.saturating_add(1);
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures = self.total_failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }

    fn clear(&mut self) {
        *self = Counts::default();
    }
}

/// Why the breaker refused to run a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum BreakerRejection {
    /// The breaker is open.
    #[error("circuit breaker is open")]
    Open,
    /// The breaker is half-open and its probe budget is spent.
    #[error("too many requests")]
    TooManyRequests,
}

impl BreakerRejection {
    /// Label used for metrics.
    pub fn label(self) -> &'static str {
        match self {
            BreakerRejection::Open => "rejected_open",
            BreakerRejection::TooManyRequests => "rejected_too_many_requests",
        }
    }
}

/// Error returned by [`CircuitBreaker::call`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The call never ran.
    #[error(transparent)]
    Rejected(#[from] BreakerRejection),
    /// The call ran and failed.
    #[error("{0}")]
    Inner(E),
}

/// Trip policy evaluated against the counts after every closed-state failure.
pub type ReadyToTrip = Arc<dyn Fn(&Counts) -> bool + Send + Sync>;

/// Breaker tuning.
#[derive(Clone)]
pub struct BreakerSettings {
    pub name: String,
    /// Probes admitted while half-open; also the consecutive successes
    /// needed to close.
    pub max_requests: u32,
    /// Closed-state count clearing period. `None` clears only on state change.
    pub interval: Option<Duration>,
    /// How long the breaker stays open.
    pub timeout: Duration,
    pub ready_to_trip: ReadyToTrip,
}

impl BreakerSettings {
    /// Trip once total failures exceed `threshold`.
    pub fn failures_above(threshold: u32) -> ReadyToTrip {
        Arc::new(move |counts: &Counts| counts.total_failures > threshold)
    }

    pub fn from_config(config: &BreakerConfig) -> Self {
        Self {
            name: config.name.clone(),
            max_requests: config.half_open_max_requests.max(1),
            interval: config.interval(),
            timeout: config.open_timeout(),
            ready_to_trip: Self::failures_above(config.failure_threshold),
        }
    }
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self::from_config(&BreakerConfig::default())
    }
}

impl std::fmt::Debug for BreakerSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerSettings")
            .field("name", &self.name)
            .field("max_requests", &self.max_requests)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    generation: u64,
    counts: Counts,
    expiry: Option<Instant>,
}

/// A three-state circuit breaker guarding one dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    settings: BreakerSettings,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(settings: BreakerSettings) -> Self {
        let expiry = settings.interval.map(|interval| Instant::now() + interval);
        metrics::record_breaker_state(&settings.name, BreakerState::Closed);
        Self {
            settings,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                generation: 0,
                counts: Counts::default(),
                expiry,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// Current state, after applying any due time-based transition.
    pub fn state(&self) -> BreakerState {
        let mut inner = self.lock();
        self.current_state(&mut inner, Instant::now())
    }

    /// Counts of the current generation.
    pub fn counts(&self) -> Counts {
        let mut inner = self.lock();
        self.current_state(&mut inner, Instant::now());
        inner.counts
    }

    /// Run `f` if the breaker admits it, recording the result.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let generation = self.before_request()?;
        let mut attempt = Attempt {
            breaker: self,
            generation,
            settled: false,
        };

        let result = f().await;
        attempt.settle(result.is_ok());
        result.map_err(BreakerError::Inner)
    }

    fn before_request(&self) -> Result<u64, BreakerRejection> {
        let mut inner = self.lock();
        let state = self.current_state(&mut inner, Instant::now());

        match state {
            BreakerState::Open => return Err(BreakerRejection::Open),
            BreakerState::HalfOpen if inner.counts.requests >= self.settings.max_requests => {
                return Err(BreakerRejection::TooManyRequests);
            }
            _ => {}
        }

        inner.counts.on_request();
        Ok(inner.generation)
    }

    fn after_request(&self, generation: u64, success: bool) {
        let mut inner = self.lock();
        let now = Instant::now();
        let state = self.current_state(&mut inner, now);
        if inner.generation != generation {
            return;
        }

        if success {
            self.on_success(&mut inner, state, now);
        } else {
            self.on_failure(&mut inner, state, now);
        }
    }

    fn on_success(&self, inner: &mut Inner, state: BreakerState, now: Instant) {
        match state {
            BreakerState::Closed => inner.counts.on_success(),
            BreakerState::HalfOpen => {
                inner.counts.on_success();
                if inner.counts.consecutive_successes >= self.settings.max_requests {
                    self.set_state(inner, BreakerState::Closed, now);
                }
            }
            BreakerState::Open => {}
        }
    }

    fn on_failure(&self, inner: &mut Inner, state: BreakerState, now: Instant) {
        match state {
            BreakerState::Closed => {
                inner.counts.on_failure();
                if (self.settings.ready_to_trip)(&inner.counts) {
                    self.set_state(inner, BreakerState::Open, now);
                }
            }
            BreakerState::HalfOpen => self.set_state(inner, BreakerState::Open, now),
            BreakerState::Open => {}
        }
    }

    fn current_state(&self, inner: &mut Inner, now: Instant) -> BreakerState {
        match inner.state {
            BreakerState::Closed => {
                if inner.expiry.is_some_and(|expiry| expiry <= now) {
                    self.new_generation(inner, now);
                }
            }
            BreakerState::Open => {
                if inner.expiry.is_some_and(|expiry| expiry <= now) {
                    self.set_state(inner, BreakerState::HalfOpen, now);
                }
            }
            BreakerState::HalfOpen => {}
        }
        inner.state
    }

    fn set_state(&self, inner: &mut Inner, state: BreakerState, now: Instant) {
        if inner.state == state {
            return;
        }

        let previous = inner.state;
        inner.state = state;
        self.new_generation(inner, now);

        match state {
            BreakerState::Open => tracing::warn!(
                breaker = %self.settings.name,
                from = %previous,
                to = %state,
                "Circuit breaker state changed"
            ),
            _ => tracing::info!(
                breaker = %self.settings.name,
                from = %previous,
                to = %state,
                "Circuit breaker state changed"
            ),
        }
        metrics::record_breaker_transition(&self.settings.name, previous, state);
    }

    fn new_generation(&self, inner: &mut Inner, now: Instant) {
        inner.generation += 1;
        inner.counts.clear();
        inner.expiry = match inner.state {
            BreakerState::Closed => self.settings.interval.map(|interval| now + interval),
            BreakerState::Open => Some(now + self.settings.timeout),
            BreakerState::HalfOpen => None,
        };
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Settles an admitted call exactly once, even if its future is dropped.
struct Attempt<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    settled: bool,
}

impl Attempt<'_> {
    fn settle(&mut self, success: bool) {
        self.settled = true;
        self.breaker.after_request(self.generation, success);
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!(breaker = %self.breaker.name(), "Call abandoned before completion");
            self.breaker.after_request(self.generation, false);
        }
    }
}
