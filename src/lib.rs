//! Two cooperating HTTP services demonstrating load shedding and
//! circuit breaking.
//!
//! - green: an upstream whose responses degrade with load
//!   (nominal → degraded → overloaded, recovering after quiet periods)
//! - red: a downstream that calls green either directly or through a
//!   circuit breaker, mapping each outcome to a status code

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod load;
pub mod observability;
pub mod resilience;
pub mod upstream;

pub use config::{GreenConfig, RedConfig};
pub use http::{GreenServer, RedServer};
pub use lifecycle::Shutdown;
