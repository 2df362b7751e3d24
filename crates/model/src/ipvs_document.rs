//! The IPVS model document consumed by the external `ipvsctl` helper (§3,
//! §4.4, §6).
//!
//! The document is a nested mapping whose annotation keys contain literal
//! dots (`ipvsmesh.service.name`, `ipvsmesh.<k>`), so it is built and
//! serialized as a `serde_yaml::Value` tree rather than a derived struct —
//! the same "dynamic typing" the original Go implementation uses for this
//! document (it builds `map[string]interface{}` by hand).

use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

/// A single destination (real server) entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpvsDestination {
    pub address: String,
    pub forward: String,
    pub weight: i64,
    /// `additionalInfo[k] = v` pairs, emitted verbatim as `ipvsmesh.<k>`.
    pub annotations: BTreeMap<String, String>,
}

impl IpvsDestination {
    fn to_value(&self) -> Value {
        let mut map = Mapping::new();
        map.insert(Value::from("address"), Value::from(self.address.clone()));
        map.insert(Value::from("forward"), Value::from(self.forward.clone()));
        map.insert(Value::from("weight"), Value::from(self.weight));
        for (k, v) in &self.annotations {
            map.insert(Value::from(format!("ipvsmesh.{k}")), Value::from(v.clone()));
        }
        Value::Mapping(map)
    }
}

/// A single virtual service entry, rendered only when its destination list
/// is non-empty (§3 invariant).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpvsServiceEntry {
    pub address: String,
    pub sched: String,
    pub service_name: String,
    pub service_type: String,
    pub destinations: Vec<IpvsDestination>,
}

impl IpvsServiceEntry {
    fn to_value(&self) -> Value {
        let mut map = Mapping::new();
        map.insert(Value::from("address"), Value::from(self.address.clone()));
        map.insert(
            Value::from("ipvsmesh.service.name"),
            Value::from(self.service_name.clone()),
        );
        map.insert(
            Value::from("ipvsmesh.service.type"),
            Value::from(self.service_type.clone()),
        );
        map.insert(Value::from("sched"), Value::from(self.sched.clone()));
        map.insert(
            Value::from("destinations"),
            Value::Sequence(self.destinations.iter().map(IpvsDestination::to_value).collect()),
        );
        Value::Mapping(map)
    }
}

/// The rendered document: `{ services: [...] }` (§3, §6).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpvsDocument {
    pub services: Vec<IpvsServiceEntry>,
}

impl IpvsDocument {
    pub fn to_value(&self) -> Value {
        let mut root = Mapping::new();
        root.insert(
            Value::from("services"),
            Value::Sequence(self.services.iter().map(IpvsServiceEntry::to_value).collect()),
        );
        Value::Mapping(root)
    }

    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.to_value())
    }

    /// Project `ipvsmesh.service.name` out of each top-level service entry
    /// for this document.
    pub fn service_names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.service_name.clone()).collect()
    }

    /// Read a previously-rendered YAML document back and recover the set of
    /// `ipvsmesh.service.name` values it contains (§8 round-trip property).
    /// Exercises real (de)serialization rather than reusing `self`.
    pub fn service_names_from_yaml(yaml: &str) -> Result<Vec<String>, serde_yaml::Error> {
        let value: Value = serde_yaml::from_str(yaml)?;
        let mut names = Vec::new();
        if let Some(Value::Sequence(services)) = value.get("services") {
            for svc in services {
                if let Some(Value::String(name)) = svc.get("ipvsmesh.service.name") {
                    names.push(name.clone());
                }
            }
        }
        Ok(names)
    }

    /// `(serviceName, address)` pairs for every destination in this
    /// document, used by the publisher router to compute deltas (§4.5).
    pub fn service_address_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for service in &self.services {
            for dest in &service.destinations {
                pairs.push((service.service_name.clone(), dest.address.clone()));
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IpvsDocument {
        IpvsDocument {
            services: vec![IpvsServiceEntry {
                address: "tcp://10.0.0.1:80".into(),
                sched: "wrr".into(),
                service_name: "S1".into(),
                service_type: "fileSource".into(),
                destinations: vec![IpvsDestination {
                    address: "10.0.0.1:80".into(),
                    forward: "nat".into(),
                    weight: 500,
                    annotations: BTreeMap::new(),
                }],
            }],
        }
    }

    #[test]
    fn round_trip_recovers_service_names() {
        let doc = sample();
        let yaml = doc.to_yaml_string().unwrap();
        let names = IpvsDocument::service_names_from_yaml(&yaml).unwrap();
        assert_eq!(names, vec!["S1".to_string()]);
    }

    #[test]
    fn annotation_keys_preserved_verbatim() {
        let mut annotations = BTreeMap::new();
        annotations.insert("az".to_string(), "us-east-1a".to_string());
        let doc = IpvsDocument {
            services: vec![IpvsServiceEntry {
                address: "tcp://10.0.0.1:80".into(),
                sched: "wrr".into(),
                service_name: "S1".into(),
                service_type: "fileSource".into(),
                destinations: vec![IpvsDestination {
                    address: "10.0.0.1:80".into(),
                    forward: "nat".into(),
                    weight: 500,
                    annotations,
                }],
            }],
        };
        let yaml = doc.to_yaml_string().unwrap();
        assert!(yaml.contains("ipvsmesh.az: us-east-1a"));
    }
}
