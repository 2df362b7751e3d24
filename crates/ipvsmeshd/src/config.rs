//! Process environment configuration (§6 "Environment"), loaded with `envy`
//! the way `original_source/config/config.go` loads it with `caarlos0/env`:
//! one flat struct, one prefix, defaults baked in rather than discovered.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError};

const ENV_PREFIX: &str = "IPVSMESH_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read process environment: {0}")]
    Env(#[from] envy::Error),

    #[error("invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Mirrors `config.Configuration` field-for-field, plus the ambient
/// metrics/IPC-permission knobs the Go original left to flags the Rust
/// daemon instead exposes as environment variables.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_tls_consistency"))]
pub struct Configuration {
    #[serde(default)]
    pub log_trace: bool,
    #[serde(default)]
    pub log_debug: bool,
    #[serde(default)]
    pub log_verbose: bool,
    #[serde(default)]
    pub daemonize: bool,

    #[serde(default = "default_socket")]
    #[validate(custom = "validate_socket_path")]
    pub socket: String,

    #[serde(default = "default_daemon_timeout_sec")]
    #[validate(range(min = 1, max = 300))]
    pub daemon_timeout_sec: u64,

    #[serde(default = "default_configfile")]
    #[validate(length(min = 1))]
    pub configfile: String,

    #[serde(default)]
    pub tls: bool,
    #[serde(default)]
    pub tlscertfile: String,
    #[serde(default)]
    pub tlskeyfile: String,

    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,

    #[serde(default = "default_metrics_listen_addr")]
    #[validate(length(min = 1))]
    pub metrics_listen_addr: String,

    /// Group to `chown` the control socket to after binding, `-1` meaning
    /// "leave ownership alone" (§4.6, mirrors `daemon.Service.GroupID`).
    #[serde(default = "default_group_id")]
    pub group_id: i32,
}

fn default_socket() -> String {
    "/tmp/ipvsmesh.sock".to_string()
}

fn default_daemon_timeout_sec() -> u64 {
    5
}

fn default_configfile() -> String {
    "/etc/ipvsmesh.yaml".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_listen_addr() -> String {
    "127.0.0.1:9090".to_string()
}

fn default_group_id() -> i32 {
    -1
}

fn validate_socket_path(path: &str) -> Result<(), ValidationError> {
    if !path.starts_with('/') && !path.starts_with("./") {
        return Err(ValidationError::new("socket_path_invalid_format"));
    }
    Ok(())
}

fn validate_tls_consistency(config: &Configuration) -> Result<(), ValidationError> {
    if config.tls && (config.tlscertfile.is_empty() || config.tlskeyfile.is_empty()) {
        return Err(ValidationError::new("tls_requires_cert_and_key"));
    }
    Ok(())
}

impl Configuration {
    /// Load from `IPVSMESH_*` environment variables (§6 "Environment").
    pub fn load() -> Result<Self, ConfigError> {
        let config: Configuration = envy::prefixed(ENV_PREFIX).from_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn daemon_timeout(&self) -> Duration {
        Duration::from_secs(self.daemon_timeout_sec)
    }

    /// The level passed to `common::logging::init` (§1 "Logging"); trace
    /// takes precedence over debug over verbose, matching the Go original's
    /// flag precedence in `cmd/daemon.go`.
    pub fn log_filter(&self) -> &'static str {
        if self.log_trace {
            "trace"
        } else if self.log_debug {
            "debug"
        } else if self.log_verbose {
            "info"
        } else {
            "warn"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Configuration {
        Configuration {
            log_trace: false,
            log_debug: false,
            log_verbose: false,
            daemonize: false,
            socket: default_socket(),
            daemon_timeout_sec: default_daemon_timeout_sec(),
            configfile: default_configfile(),
            tls: false,
            tlscertfile: String::new(),
            tlskeyfile: String::new(),
            metrics_enabled: default_metrics_enabled(),
            metrics_listen_addr: default_metrics_listen_addr(),
            group_id: default_group_id(),
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(defaults().validate().is_ok());
    }

    #[test]
    fn relative_socket_path_without_dot_slash_is_rejected() {
        let mut config = defaults();
        config.socket = "tmp/ipvsmesh.sock".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn tls_enabled_without_cert_is_rejected() {
        let mut config = defaults();
        config.tls = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn tls_enabled_with_cert_and_key_is_accepted() {
        let mut config = defaults();
        config.tls = true;
        config.tlscertfile = "/etc/ipvsmesh/tls.crt".to_string();
        config.tlskeyfile = "/etc/ipvsmesh/tls.key".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn log_filter_precedence_matches_go_flag_order() {
        let mut config = defaults();
        config.log_verbose = true;
        config.log_debug = true;
        config.log_trace = true;
        assert_eq!(config.log_filter(), "trace");

        config.log_trace = false;
        assert_eq!(config.log_filter(), "debug");

        config.log_debug = false;
        assert_eq!(config.log_filter(), "info");

        config.log_verbose = false;
        assert_eq!(config.log_filter(), "warn");
    }
}
