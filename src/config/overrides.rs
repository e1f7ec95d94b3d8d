//! Command-line and environment overrides.
//!
//! Both binaries accept the same identity flags; red additionally accepts an
//! upstream URL. Values given here win over the config file.

use clap::Args;
use std::path::PathBuf;

use crate::config::schema::{ListenerConfig, ServiceConfig};

/// Flags shared by both services.
#[derive(Debug, Clone, Default, Args)]
pub struct ServiceArgs {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "PUCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listening port (binds 0.0.0.0).
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Service name used in logs and spans.
    #[arg(long, env = "SERVICE_NAME")]
    pub service_name: Option<String>,

    /// Trace collector endpoint.
    #[arg(long, env = "JAEGER_ENDPOINT")]
    pub tracing_endpoint: Option<String>,

    /// Deployment environment tag.
    #[arg(long, env = "ENVIRONMENT")]
    pub environment: Option<String>,
}

/// Misspelled variable names read by earlier deployments of both services.
const LEGACY_TRACING_ENDPOINT: &str = "JEAGER_ENDPOINT";
const LEGACY_ENVIRONMENT: &str = "ENVIROMENT";

impl ServiceArgs {
    /// Fill unset fields from the legacy variable names.
    pub fn with_legacy_env(self) -> Self {
        self.with_legacy_lookup(|name| std::env::var(name).ok())
    }

    fn with_legacy_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if self.tracing_endpoint.is_none() {
            self.tracing_endpoint = lookup(LEGACY_TRACING_ENDPOINT);
        }
        if self.environment.is_none() {
            self.environment = lookup(LEGACY_ENVIRONMENT);
        }
        self
    }

    /// Apply the overrides to an already-loaded configuration.
    pub fn apply(&self, service: &mut ServiceConfig, listener: &mut ListenerConfig) {
        if let Some(port) = self.port {
            *listener = ListenerConfig::on_port(port);
        }
        if let Some(name) = &self.service_name {
            service.name = name.clone();
        }
        if let Some(endpoint) = self.tracing_endpoint.as_ref().filter(|e| !e.is_empty()) {
            service.tracing_endpoint = Some(endpoint.clone());
        }
        if let Some(environment) = &self.environment {
            service.environment = environment.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_file_values() {
        let args = ServiceArgs {
            port: Some(9100),
            service_name: Some("green-b".into()),
            tracing_endpoint: Some("http://jaeger:14268/api/traces".into()),
            environment: Some("staging".into()),
            ..Default::default()
        };
        let mut service = ServiceConfig::default();
        let mut listener = ListenerConfig::default();

        args.apply(&mut service, &mut listener);

        assert_eq!(listener.bind_address, "0.0.0.0:9100");
        assert_eq!(service.name, "green-b");
        assert_eq!(service.environment, "staging");
        assert_eq!(
            service.tracing_endpoint.as_deref(),
            Some("http://jaeger:14268/api/traces")
        );
    }

    #[test]
    fn test_absent_overrides_keep_values() {
        let args = ServiceArgs {
            tracing_endpoint: Some(String::new()),
            ..Default::default()
        };
        let mut service = ServiceConfig::default();
        let mut listener = ListenerConfig::on_port(8081);

        args.apply(&mut service, &mut listener);

        assert_eq!(listener.bind_address, "0.0.0.0:8081");
        assert_eq!(service.name, "puch");
        assert_eq!(service.tracing_endpoint, None);
    }

    #[test]
    fn test_legacy_names_fill_gaps_only() {
        let lookup = |name: &str| match name {
            "JEAGER_ENDPOINT" => Some("http://jaeger:14268/api/traces".to_string()),
            "ENVIROMENT" => Some("legacy".to_string()),
            _ => None,
        };

        let args = ServiceArgs::default().with_legacy_lookup(lookup);
        assert_eq!(
            args.tracing_endpoint.as_deref(),
            Some("http://jaeger:14268/api/traces")
        );
        assert_eq!(args.environment.as_deref(), Some("legacy"));

        let args = ServiceArgs {
            environment: Some("production".into()),
            ..Default::default()
        }
        .with_legacy_lookup(lookup);
        assert_eq!(args.environment.as_deref(), Some("production"));
    }
}
