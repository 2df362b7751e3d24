//! Publisher (observer) definitions (§3 Publisher).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// A publisher entry from the declarative model (§3). Lifecycle mirrors
/// [`crate::Service`]: created/mutated/destroyed by name across snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Publisher {
    #[validate(length(min = 1))]
    pub name: String,

    #[serde(rename = "type")]
    #[validate(length(min = 1))]
    pub type_: String,

    #[serde(default, rename = "matchLabels")]
    pub match_labels: BTreeMap<String, String>,

    #[serde(default)]
    pub spec: serde_yaml::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_type_is_rejected() {
        let p = Publisher {
            name: "P1".to_string(),
            type_: String::new(),
            match_labels: BTreeMap::new(),
            spec: serde_yaml::Value::Null,
        };
        assert!(p.validate().is_err());
    }
}
