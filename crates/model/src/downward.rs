//! Backend endpoints discovered by source plugins (§3 Downward backend).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An endpoint surfaced by a source plugin's downward interface.
///
/// `weight < 0` means "use the owning service's default weight";
/// `weight >= 0` overrides it per-endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownwardBackend {
    pub address: String,

    #[serde(default = "default_weight_sentinel")]
    pub weight: i64,

    #[serde(default)]
    pub additional_info: BTreeMap<String, String>,
}

fn default_weight_sentinel() -> i64 {
    -1
}

impl DownwardBackend {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            weight: default_weight_sentinel(),
            additional_info: BTreeMap::new(),
        }
    }

    pub fn with_weight(mut self, weight: i64) -> Self {
        self.weight = weight;
        self
    }

    /// Resolve the effective destination weight against a service default.
    pub fn effective_weight(&self, service_default: i64) -> i64 {
        if self.weight < 0 {
            service_default
        } else {
            self.weight
        }
    }
}

/// Sort a slice of backends by address for deterministic downstream diffs
/// (§4.3: "two updates with identical backend sets must be byte-equal").
pub fn sort_backends(backends: &mut [DownwardBackend]) {
    backends.sort_by(|a, b| a.address.cmp(&b.address));
}
