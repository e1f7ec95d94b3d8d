//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, defaults for missing fields)
//!     → validation.rs (semantic checks)
//!     → overrides.rs (flags / environment win)
//!     → GreenConfig | RedConfig (immutable for the process lifetime)
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod overrides;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use overrides::ServiceArgs;
pub use schema::{
    BreakerConfig, GreenConfig, ListenerConfig, LoadConfig, LogFormat, ObservabilityConfig,
    RedConfig, ServiceConfig, TimeoutConfig, UpstreamConfig,
};
pub use validation::{Validate, ValidationError, MAX_COOLDOWN_SECS};
