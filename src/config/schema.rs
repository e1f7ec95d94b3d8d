//! Configuration schema definitions.
//!
//! This module defines the configuration structure for both services.
//! All types derive Serde traits for deserialization from config files,
//! and every field has a default so an empty file is a valid config.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the green (upstream) service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GreenConfig {
    /// Service identity (name, environment, tracing endpoint).
    pub service: ServiceConfig,

    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Inbound request timeout.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Load state machine limits and cooldowns.
    pub load: LoadConfig,
}

impl Default for GreenConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::named("green"),
            listener: ListenerConfig::on_port(8081),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
            load: LoadConfig::default(),
        }
    }
}

/// Root configuration for the red (downstream) service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedConfig {
    pub service: ServiceConfig,

    pub listener: ListenerConfig,

    pub timeouts: TimeoutConfig,

    pub observability: ObservabilityConfig,

    /// Where the protected dependency lives.
    pub upstream: UpstreamConfig,

    /// Circuit breaker and classifier settings.
    pub breaker: BreakerConfig,
}

impl Default for RedConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::named("red"),
            listener: ListenerConfig::on_port(8080),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
            upstream: UpstreamConfig::default(),
            breaker: BreakerConfig::default(),
        }
    }
}

/// Service identity, attached to every request span.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service name used in logs and spans.
    pub name: String,

    /// Deployment environment tag (e.g. "development", "staging").
    pub environment: String,

    /// Collector endpoint for distributed traces, if one is deployed.
    pub tracing_endpoint: Option<String>,
}

impl ServiceConfig {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "puch".to_string(),
            environment: "development".to_string(),
            tracing_endpoint: None,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl ListenerConfig {
    pub fn on_port(port: u16) -> Self {
        Self {
            bind_address: format!("0.0.0.0:{}", port),
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self::on_port(8080)
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Pretty output for development, JSON for production.
    pub log_format: LogFormat,

    /// Expose the Prometheus endpoint at `/metrics`.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
        }
    }
}

/// Load state machine configuration (green).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Hits tolerated in the nominal state before degrading.
    pub nominal_limit: u64,

    /// Hits tolerated in the degraded state before overloading.
    pub degraded_limit: u64,

    /// Cooldown armed on entering the degraded state, in seconds.
    pub degraded_cooldown_secs: u64,

    /// Cooldown armed (and re-armed) in the overloaded state, in seconds.
    pub overloaded_cooldown_secs: u64,

    /// Synthetic latency added to responses while degraded, in milliseconds.
    pub degraded_delay_ms: u64,
}

impl LoadConfig {
    pub fn degraded_cooldown(&self) -> Duration {
        Duration::from_secs(self.degraded_cooldown_secs)
    }

    pub fn overloaded_cooldown(&self) -> Duration {
        Duration::from_secs(self.overloaded_cooldown_secs)
    }

    pub fn degraded_delay(&self) -> Duration {
        Duration::from_millis(self.degraded_delay_ms)
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            nominal_limit: 20,
            degraded_limit: 10,
            degraded_cooldown_secs: 10,
            overloaded_cooldown_secs: 30,
            degraded_delay_ms: 420,
        }
    }
}

/// Upstream dependency configuration (red).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the green service.
    pub base_url: String,

    /// Path probed on every call.
    pub path: String,

    /// Per-call deadline in milliseconds.
    pub timeout_ms: u64,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Full URL of the probed endpoint.
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.path)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://green:8081".to_string(),
            path: "/puched".to_string(),
            timeout_ms: 2000,
        }
    }
}

/// Circuit breaker configuration (red).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Breaker name for logs and metrics.
    pub name: String,

    /// The breaker trips once total failures in the window exceed this.
    pub failure_threshold: u32,

    /// Seconds the breaker stays open before admitting probes.
    pub open_timeout_secs: u64,

    /// Probe calls admitted while half-open.
    pub half_open_max_requests: u32,

    /// Period after which closed-state counts are cleared, in seconds.
    /// Zero keeps counting until the next state change.
    pub interval_secs: u64,

    /// Calls slower than this count as failures, in milliseconds.
    pub latency_budget_ms: u64,
}

impl BreakerConfig {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_secs(self.open_timeout_secs)
    }

    pub fn interval(&self) -> Option<Duration> {
        (self.interval_secs > 0).then(|| Duration::from_secs(self.interval_secs))
    }

    pub fn latency_budget(&self) -> Duration {
        Duration::from_millis(self.latency_budget_ms)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            name: "HTTP GET puched".to_string(),
            failure_threshold: 80,
            open_timeout_secs: 6,
            half_open_max_requests: 1,
            interval_secs: 0,
            latency_budget_ms: 400,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_defaults() {
        let green: GreenConfig = toml::from_str("").unwrap();
        assert_eq!(green.service.name, "green");
        assert_eq!(green.listener.bind_address, "0.0.0.0:8081");
        assert_eq!(green.load.nominal_limit, 20);
        assert_eq!(green.load.degraded_delay(), Duration::from_millis(420));

        let red: RedConfig = toml::from_str("").unwrap();
        assert_eq!(red.service.name, "red");
        assert_eq!(red.breaker.failure_threshold, 80);
        assert_eq!(red.breaker.open_timeout(), Duration::from_secs(6));
        assert_eq!(red.breaker.interval(), None);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let red: RedConfig = toml::from_str(
            r#"
            [upstream]
            base_url = "http://127.0.0.1:9000/"

            [breaker]
            interval_secs = 60

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(red.upstream.url(), "http://127.0.0.1:9000/puched");
        assert_eq!(red.upstream.timeout(), Duration::from_millis(2000));
        assert_eq!(red.breaker.interval(), Some(Duration::from_secs(60)));
        assert_eq!(red.breaker.latency_budget(), Duration::from_millis(400));
        assert_eq!(red.observability.log_format, LogFormat::Json);
    }
}
