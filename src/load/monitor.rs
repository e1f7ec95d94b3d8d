//! Shared handle over the load tracker.
//!
//! # Responsibilities
//! - Serialize hits through a single mutex
//! - Decide the synthetic delay for the degraded response path
//! - Report transitions to logs and metrics
//!
//! The mutex is held only for the transition itself. Any delay is applied
//! by the caller after `hit` returns, so slow responses never serialize.

use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::config::LoadConfig;
use crate::load::state::{Hit, LoadLimits, LoadState, LoadTracker};
use crate::observability::metrics;

/// Point-in-time view of the tracker, without registering a hit.
#[derive(Debug, Clone, Serialize)]
pub struct LoadSnapshot {
    pub state: LoadState,
    pub counter: u64,
    /// Milliseconds until the armed cooldown passes.
    pub cooldown_remaining_ms: Option<u64>,
}

pub struct LoadMonitor {
    tracker: Mutex<LoadTracker>,
    degraded_delay: Duration,
}

impl LoadMonitor {
    pub fn new(limits: LoadLimits, degraded_delay: Duration) -> Self {
        Self {
            tracker: Mutex::new(LoadTracker::new(limits)),
            degraded_delay,
        }
    }

    pub fn from_config(config: &LoadConfig) -> Self {
        Self::new(LoadLimits::from(config), config.degraded_delay())
    }

    /// Register one hit and return the post-transition counter and state.
    pub fn hit(&self) -> Hit {
        self.hit_at(Instant::now())
    }

    pub fn hit_at(&self, now: Instant) -> Hit {
        let (previous, hit) = {
            let mut tracker = self.lock();
            let previous = tracker.state();
            (previous, tracker.hit_at(now))
        };

        if previous != hit.state {
            tracing::info!(
                from = %previous,
                to = %hit.state,
                counter = hit.counter,
                "Load state changed"
            );
        }
        metrics::record_hit(hit.state);

        hit
    }

    /// Extra latency to inject before answering in `state`.
    pub fn response_delay(&self, state: LoadState) -> Option<Duration> {
        match state {
            LoadState::Degraded if !self.degraded_delay.is_zero() => Some(self.degraded_delay),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> LoadSnapshot {
        let now = Instant::now();
        let tracker = self.lock();
        LoadSnapshot {
            state: tracker.state(),
            counter: tracker.counter(),
            cooldown_remaining_ms: tracker
                .remaining(now)
                .map(|left| u64::try_from(left.as_millis()).unwrap_or(u64::MAX)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LoadTracker> {
        // Every transition leaves the tracker valid, so poisoning is ignored.
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
