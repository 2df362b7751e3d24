//! The on-disk YAML configuration file (§6) and its structural validation.
//!
//! Parsing here only covers the envelope (`globals`/`services`/
//! `publishers`) and the uniqueness invariant from §3. Plugin-spec
//! validation (dispatching each `spec` to its named plugin) is layered on
//! top by the config watcher, since it needs the plugin registries that
//! this crate does not depend on.

use crate::{Globals, Publisher, Service};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use validator::Validate;

/// Errors from loading or validating a configuration snapshot.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("duplicate service name: {0}")]
    DuplicateServiceName(String),

    #[error("duplicate publisher name: {0}")]
    DuplicatePublisherName(String),

    #[error("invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// A whole-model configuration snapshot (§3, §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub globals: Globals,

    #[serde(default)]
    pub services: Vec<Service>,

    #[serde(default)]
    pub publishers: Vec<Publisher>,
}

impl Validate for Config {
    /// Delegates to each service's and publisher's own field-level
    /// validation (§3). Name-uniqueness is a separate, cross-entry
    /// invariant handled by [`Config::validate_names`], not by this trait.
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        self.globals.validate()?;
        for service in &self.services {
            service.validate()?;
        }
        for publisher in &self.publishers {
            publisher.validate()?;
        }
        Ok(())
    }
}

impl Config {
    /// Parse a configuration document from a YAML string. Does not perform
    /// the name-uniqueness check; call [`Config::validate_names`] after.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let cfg: Config = serde_yaml::from_str(yaml)?;
        Ok(cfg)
    }

    /// Read and parse a configuration file from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Enforce §3's invariant: names are unique within their kind within
    /// one snapshot.
    pub fn validate_names(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for service in &self.services {
            if !seen.insert(service.name.as_str()) {
                return Err(ConfigError::DuplicateServiceName(service.name.clone()));
            }
        }
        let mut seen = HashSet::new();
        for publisher in &self.publishers {
            if !seen.insert(publisher.name.as_str()) {
                return Err(ConfigError::DuplicatePublisherName(publisher.name.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let yaml = r#"
services:
  - name: S1
    address: "tcp://1.2.3.4:80"
    type: fileSource
    spec:
      file: /tmp/backends.txt
"#;
        let cfg = Config::from_yaml(yaml).unwrap();
        assert_eq!(cfg.services.len(), 1);
        assert_eq!(cfg.services[0].sched, "wrr");
        assert_eq!(cfg.services[0].weight, 1000);
        cfg.validate_names().unwrap();
    }

    #[test]
    fn rejects_duplicate_service_names() {
        let yaml = r#"
services:
  - name: S1
    address: "tcp://1.2.3.4:80"
    type: fileSource
    spec: {}
  - name: S1
    address: "tcp://1.2.3.5:80"
    type: fileSource
    spec: {}
"#;
        let cfg = Config::from_yaml(yaml).unwrap();
        assert!(matches!(
            cfg.validate_names(),
            Err(ConfigError::DuplicateServiceName(_))
        ));
    }

    #[test]
    fn defaults_globals_when_absent() {
        let cfg = Config::from_yaml("services: []\n").unwrap();
        assert_eq!(cfg.globals.ipvsctl.file, "/etc/ipvsmesh-ipvsctl.yaml");
        assert_eq!(cfg.globals.ipvsctl.ipvsctl_path, "ipvsctl");
    }

    #[test]
    fn rejects_service_with_zero_weight() {
        let yaml = r#"
services:
  - name: S1
    address: "tcp://1.2.3.4:80"
    type: fileSource
    weight: 0
    spec: {}
"#;
        let cfg = Config::from_yaml(yaml).unwrap();
        assert!(cfg.validate().is_err());
    }
}
