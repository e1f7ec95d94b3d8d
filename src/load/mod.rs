//! Upstream load subsystem.
//!
//! # Data Flow
//! ```text
//! GET /puched
//!     → monitor.rs (lock, single hit, unlock)
//!     → state.rs (transition table over state/counter/expiry/now)
//!     → (counter, state) back to the handler
//!     → handler sleeps outside the lock when degraded
//! ```

pub mod monitor;
pub mod state;

pub use monitor::{LoadMonitor, LoadSnapshot};
pub use state::{Hit, LoadLimits, LoadState, LoadTracker};
