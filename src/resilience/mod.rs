//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! GET /puch-with-cb
//!     → caller.rs (admit through the breaker, time the call)
//!     → timeouts.rs (per-call deadline)
//!     → circuit_breaker.rs (record success/failure, maybe trip)
//!     → outcome.rs (status + message for the caller)
//! ```
//!
//! # Design Decisions
//! - Every upstream call has a deadline
//! - Slow successes count against the breaker but still return data
//! - Breaker outcomes are typed enums; nothing matches on error text

pub mod caller;
pub mod circuit_breaker;
pub mod outcome;
pub mod timeouts;

pub use caller::{BreakerCaller, CallOutcome};
pub use circuit_breaker::{
    BreakerError, BreakerRejection, BreakerSettings, BreakerState, CircuitBreaker, Counts,
};
pub use outcome::{map_outcome, MappedOutcome, Severity};
