//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and addresses.
//! Every error is collected so a bad file is reported in one go.

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{
    BreakerConfig, GreenConfig, ListenerConfig, LoadConfig, RedConfig, UpstreamConfig,
};

/// A single semantic problem in a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: u64 },

    #[error("{field} is not a socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be an http:// URL: {value}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{field} must start with '/': {value}")]
    InvalidPath { field: &'static str, value: String },
}

/// Upper bound for cooldowns and breaker windows, in seconds (one day).
/// Expiries are computed as `now + duration` and must not overflow.
pub const MAX_COOLDOWN_SECS: u64 = 24 * 60 * 60;

/// Semantic validation for a configuration root.
pub trait Validate {
    fn validate(&self) -> Result<(), Vec<ValidationError>>;
}

impl Validate for GreenConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        check_listener(&self.listener, &mut errors);
        check_nonzero("timeouts.request_secs", self.timeouts.request_secs, &mut errors);
        check_load(&self.load, &mut errors);
        finish(errors)
    }
}

impl Validate for RedConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        check_listener(&self.listener, &mut errors);
        check_nonzero("timeouts.request_secs", self.timeouts.request_secs, &mut errors);
        check_upstream(&self.upstream, &mut errors);
        check_breaker(&self.breaker, &mut errors);
        finish(errors)
    }
}

fn finish(errors: Vec<ValidationError>) -> Result<(), Vec<ValidationError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_nonzero(field: &'static str, value: u64, errors: &mut Vec<ValidationError>) {
    if value == 0 {
        errors.push(ValidationError::Zero { field });
    }
}

fn check_at_most(field: &'static str, value: u64, max: u64, errors: &mut Vec<ValidationError>) {
    if value > max {
        errors.push(ValidationError::TooLarge { field, max });
    }
}

fn check_cooldown(field: &'static str, value: u64, errors: &mut Vec<ValidationError>) {
    check_nonzero(field, value, errors);
    check_at_most(field, value, MAX_COOLDOWN_SECS, errors);
}

fn check_listener(listener: &ListenerConfig, errors: &mut Vec<ValidationError>) {
    if listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: listener.bind_address.clone(),
        });
    }
}

fn check_load(load: &LoadConfig, errors: &mut Vec<ValidationError>) {
    check_nonzero("load.nominal_limit", load.nominal_limit, errors);
    check_nonzero("load.degraded_limit", load.degraded_limit, errors);
    check_cooldown("load.degraded_cooldown_secs", load.degraded_cooldown_secs, errors);
    check_cooldown("load.overloaded_cooldown_secs", load.overloaded_cooldown_secs, errors);
}

fn check_upstream(upstream: &UpstreamConfig, errors: &mut Vec<ValidationError>) {
    let scheme_ok = upstream.base_url.starts_with("http://");
    let uri_ok = upstream.url().parse::<hyper::Uri>().is_ok();
    if !scheme_ok || !uri_ok {
        errors.push(ValidationError::InvalidUrl {
            field: "upstream.base_url",
            value: upstream.base_url.clone(),
        });
    }
    if !upstream.path.starts_with('/') {
        errors.push(ValidationError::InvalidPath {
            field: "upstream.path",
            value: upstream.path.clone(),
        });
    }
    check_nonzero("upstream.timeout_ms", upstream.timeout_ms, errors);
}

fn check_breaker(breaker: &BreakerConfig, errors: &mut Vec<ValidationError>) {
    check_cooldown("breaker.open_timeout_secs", breaker.open_timeout_secs, errors);
    check_at_most("breaker.interval_secs", breaker.interval_secs, MAX_COOLDOWN_SECS, errors);
    check_nonzero(
        "breaker.half_open_max_requests",
        u64::from(breaker.half_open_max_requests),
        errors,
    );
    check_nonzero("breaker.latency_budget_ms", breaker.latency_budget_ms, errors);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(GreenConfig::default().validate().is_ok());
        assert!(RedConfig::default().validate().is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = RedConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.upstream.base_url = "https://green".into();
        config.upstream.path = "puched".into();
        config.breaker.half_open_max_requests = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::Zero {
            field: "breaker.half_open_max_requests"
        }));
        assert!(errors.contains(&ValidationError::InvalidPath {
            field: "upstream.path",
            value: "puched".into(),
        }));
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut config = GreenConfig::default();
        config.load.degraded_limit = 0;
        config.load.overloaded_cooldown_secs = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::Zero { field: "load.degraded_limit" },
                ValidationError::Zero { field: "load.overloaded_cooldown_secs" },
            ]
        );
    }

    #[test]
    fn test_oversized_cooldowns_rejected() {
        let mut green = GreenConfig::default();
        green.load.nominal_limit = 1;
        green.load.degraded_cooldown_secs = u64::MAX;
        green.load.overloaded_cooldown_secs = MAX_COOLDOWN_SECS;

        assert_eq!(
            green.validate().unwrap_err(),
            vec![ValidationError::TooLarge {
                field: "load.degraded_cooldown_secs",
                max: MAX_COOLDOWN_SECS,
            }]
        );

        let mut red = RedConfig::default();
        red.breaker.open_timeout_secs = u64::MAX;
        red.breaker.interval_secs = MAX_COOLDOWN_SECS + 1;

        let errors = red.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.contains(&ValidationError::TooLarge {
            field: "breaker.open_timeout_secs",
            max: MAX_COOLDOWN_SECS,
        }));
        assert!(errors.contains(&ValidationError::TooLarge {
            field: "breaker.interval_secs",
            max: MAX_COOLDOWN_SECS,
        }));
    }

    #[tokio::test]
    async fn test_largest_valid_cooldown_can_be_armed() {
        use crate::load::LoadMonitor;
        use crate::resilience::{BreakerSettings, CircuitBreaker};

        let mut green = GreenConfig::default();
        green.load.nominal_limit = 1;
        green.load.degraded_cooldown_secs = MAX_COOLDOWN_SECS;
        green.load.overloaded_cooldown_secs = MAX_COOLDOWN_SECS;
        assert!(green.validate().is_ok());

        let monitor = LoadMonitor::from_config(&green.load);
        assert_eq!(monitor.hit().state, crate::load::LoadState::Degraded);

        let mut red = RedConfig::default();
        red.breaker.open_timeout_secs = MAX_COOLDOWN_SECS;
        red.breaker.interval_secs = MAX_COOLDOWN_SECS;
        red.breaker.failure_threshold = 0;
        assert!(red.validate().is_ok());

        let breaker = CircuitBreaker::new(BreakerSettings::from_config(&red.breaker));
        let result = breaker.call(|| async { Err::<(), _>("boom") }).await;
        assert!(result.is_err());
        assert_eq!(breaker.state(), crate::resilience::BreakerState::Open);
    }
}
