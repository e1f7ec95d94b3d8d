//! Load state machine.
//!
//! # States
//! - Nominal: responds immediately
//! - Degraded: responds after a synthetic delay
//! - Overloaded: refuses with 410 Gone
//!
//! # State Transitions
//! ```text
//! Nominal → Degraded:     counter >= nominal_limit (arms degraded cooldown)
//! Degraded → Nominal:     cooldown passed and counter <= degraded_limit
//! Degraded → Overloaded:  counter >= degraded_limit (arms overloaded cooldown)
//! Overloaded → Nominal:   cooldown passed and no hits since the last re-arm
//! Overloaded → Overloaded: any other hit re-arms the cooldown
//! ```
//!
//! # Design Decisions
//! - No timer task: expiry is checked lazily when the next hit arrives
//! - `hit_at` takes `now` explicitly so transitions are deterministic in tests
//! - The two degraded checks run one after the other, not as if/else

use serde::Serialize;
use std::time::{Duration, Instant};

use crate::config::LoadConfig;

/// Severity of the upstream's self-reported load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Nominal,
    Degraded,
    Overloaded,
}

impl LoadState {
    /// Numeric severity, used as a gauge value.
    pub fn severity(self) -> u8 {
        match self {
            LoadState::Nominal => 0,
            LoadState::Degraded => 1,
            LoadState::Overloaded => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LoadState::Nominal => "nominal",
            LoadState::Degraded => "degraded",
            LoadState::Overloaded => "overloaded",
        }
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single hit: the post-transition counter and state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub counter: u64,
    pub state: LoadState,
}

/// Limits driving the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadLimits {
    pub nominal_limit: u64,
    pub degraded_limit: u64,
    pub degraded_cooldown: Duration,
    pub overloaded_cooldown: Duration,
}

impl From<&LoadConfig> for LoadLimits {
    fn from(config: &LoadConfig) -> Self {
        Self {
            nominal_limit: config.nominal_limit,
            degraded_limit: config.degraded_limit,
            degraded_cooldown: config.degraded_cooldown(),
            overloaded_cooldown: config.overloaded_cooldown(),
        }
    }
}

impl Default for LoadLimits {
    fn default() -> Self {
        Self::from(&LoadConfig::default())
    }
}

/// The mutable core of the load state machine.
///
/// Not synchronized; see [`LoadMonitor`](super::LoadMonitor) for the shared
/// handle used by request handlers.
#[derive(Debug, Clone)]
pub struct LoadTracker {
    limits: LoadLimits,
    state: LoadState,
    counter: u64,
    expiry: Option<Instant>,
}

impl LoadTracker {
    pub fn new(limits: LoadLimits) -> Self {
        Self {
            limits,
            state: LoadState::Nominal,
            counter: 0,
            expiry: None,
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn expiry(&self) -> Option<Instant> {
        self.expiry
    }

    pub fn limits(&self) -> &LoadLimits {
        &self.limits
    }

    /// Register one hit at the current time.
    pub fn hit(&mut self) -> Hit {
        self.hit_at(Instant::now())
    }

    /// Register one hit at `now` and apply the transition table.
    pub fn hit_at(&mut self, now: Instant) -> Hit {
        let before = self.counter;
        self.counter += 1;

        match self.state {
            LoadState::Nominal => {
                if self.counter >= self.limits.nominal_limit {
                    self.arm(LoadState::Degraded, now + self.limits.degraded_cooldown);
                }
            }
            LoadState::Degraded => {
                if self.expired(now) && self.counter <= self.limits.degraded_limit {
                    self.recover();
                }

                // Re-evaluated on the possibly reset counter.
                if self.counter >= self.limits.degraded_limit {
                    self.arm(LoadState::Overloaded, now + self.limits.overloaded_cooldown);
                }
            }
            LoadState::Overloaded => {
                // `before` is zero unless hits arrived since the last re-arm.
                if self.expired(now) && before == 0 {
                    self.recover();
                } else {
                    self.arm(LoadState::Overloaded, now + self.limits.overloaded_cooldown);
                }
            }
        }

        Hit {
            counter: self.counter,
            state: self.state,
        }
    }

    /// Time left until the current cooldown passes, if one is armed.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.expiry.map(|expiry| expiry.saturating_duration_since(now))
    }

    fn expired(&self, now: Instant) -> bool {
        self.expiry.map_or(true, |expiry| expiry < now)
    }

    fn arm(&mut self, state: LoadState, expiry: Instant) {
        self.counter = 0;
        self.state = state;
        self.expiry = Some(expiry);
    }

    fn recover(&mut self) {
        self.counter = 1;
        self.state = LoadState::Nominal;
        self.expiry = None;
    }
}
