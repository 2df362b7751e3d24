//! Virtual service definitions (§3 Service).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use validator::{Validate, ValidationError};

/// IPVS forwarding mode for a service's destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForwardMode {
    Nat,
    Direct,
    Tunnel,
}

impl Default for ForwardMode {
    fn default() -> Self {
        ForwardMode::Nat
    }
}

impl fmt::Display for ForwardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ForwardMode::Nat => "nat",
            ForwardMode::Direct => "direct",
            ForwardMode::Tunnel => "tunnel",
        };
        write!(f, "{s}")
    }
}

fn default_sched() -> String {
    "wrr".to_string()
}

fn default_weight() -> i64 {
    1000
}

/// A virtual service entry from the declarative model (§3).
///
/// `spec` stays an opaque YAML mapping here; the config watcher re-marshals
/// it into a plugin-specific type during validation (§9 "dynamic typing of
/// spec").
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Service {
    #[validate(length(min = 1))]
    pub name: String,

    #[validate(length(min = 1), custom = "validate_service_address")]
    pub address: String,

    #[serde(rename = "type")]
    #[validate(length(min = 1))]
    pub type_: String,

    #[serde(default = "default_sched")]
    #[validate(length(min = 1))]
    pub sched: String,

    #[serde(default = "default_weight")]
    #[validate(range(min = 1))]
    pub weight: i64,

    #[serde(default)]
    pub forward: ForwardMode,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub spec: serde_yaml::Value,
}

impl Service {
    /// Whether `selector` matches this service's labels: every key/value in
    /// `selector` must appear in `self.labels` (§4.5 match-labels semantics).
    pub fn matches_labels(&self, selector: &BTreeMap<String, String>) -> bool {
        selector
            .iter()
            .all(|(k, v)| self.labels.get(k).map(|lv| lv == v).unwrap_or(false))
    }
}

/// Virtual service addresses are `scheme://host:port` (§3); reject anything
/// without a scheme separator rather than let a typo reach `ipvsctl`.
fn validate_service_address(address: &str) -> Result<(), ValidationError> {
    if !address.contains("://") {
        return Err(ValidationError::new("address_missing_scheme"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_service() -> Service {
        Service {
            name: "S1".to_string(),
            address: "tcp://1.2.3.4:80".to_string(),
            type_: "fileSource".to_string(),
            sched: default_sched(),
            weight: default_weight(),
            forward: ForwardMode::default(),
            labels: BTreeMap::new(),
            spec: serde_yaml::Value::Null,
        }
    }

    #[test]
    fn valid_service_passes_validation() {
        assert!(valid_service().validate().is_ok());
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut s = valid_service();
        s.name.clear();
        assert!(s.validate().is_err());
    }

    #[test]
    fn address_without_scheme_is_rejected() {
        let mut s = valid_service();
        s.address = "1.2.3.4:80".to_string();
        assert!(s.validate().is_err());
    }

    #[test]
    fn zero_weight_is_rejected() {
        let mut s = valid_service();
        s.weight = 0;
        assert!(s.validate().is_err());
    }
}
