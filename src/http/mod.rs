//! HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, common middleware, graceful shutdown)
//!     → request.rs (request ID, per-request span)
//!     → green.rs / red.rs (service handlers)
//!     → response.rs (JSON message bodies)
//! ```

pub mod green;
pub mod red;
pub mod request;
pub mod response;
pub mod server;

pub use green::{GreenServer, GreenState};
pub use red::{RedServer, RedState, Upstream};
pub use request::X_REQUEST_ID;
