//! Publisher payload: an endpoint delta against the previously published
//! state (§3 Endpoint update, §4.5).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether an endpoint appeared or vanished between two consecutive IPVS
/// documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Appeared,
    Vanished,
}

/// A single entry of an endpoint delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaEntry {
    pub change_type: ChangeType,
    pub address: String,
    #[serde(default)]
    pub additional_info: BTreeMap<String, String>,
}

impl DeltaEntry {
    pub fn appeared(address: impl Into<String>, from_service: &str) -> Self {
        let mut additional_info = BTreeMap::new();
        additional_info.insert("fromService".to_string(), from_service.to_string());
        Self {
            change_type: ChangeType::Appeared,
            address: address.into(),
            additional_info,
        }
    }

    pub fn vanished(address: impl Into<String>, from_service: &str) -> Self {
        let mut additional_info = BTreeMap::new();
        additional_info.insert("fromService".to_string(), from_service.to_string());
        Self {
            change_type: ChangeType::Vanished,
            address: address.into(),
            additional_info,
        }
    }
}

/// The message pushed to a sink plugin via `pushUpwardData` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointUpdate {
    /// Nanoseconds since epoch, as a decimal string (§4.5).
    pub timestamp: String,
    pub delta: Vec<DeltaEntry>,
    pub endpoints: Vec<String>,
}
