//! Publisher Router (§4.5): computes per-publisher endpoint deltas against
//! the previously published IPVS document and dispatches them to sink
//! plugins.

use crate::stoppable::StopReceiver;
use crate::types::{ConfigSnapshot, DocumentUpdateMsg};
use common::MetricsRegistry;
use model::{DeltaEntry, EndpointUpdate, IpvsDocument, Publisher, Service};
use plugin::{SinkPlugin, SinkRegistry};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

struct PublisherEntry {
    spec: Publisher,
    sink: Box<dyn SinkPlugin>,
}

/// Owns the publisher spec map and the `last`/`recent` IPVS snapshots (§3
/// Ownership).
pub struct PublisherRouter {
    registry: SinkRegistry,
    publishers: HashMap<String, PublisherEntry>,
    services: Vec<Service>,
    last: IpvsDocument,
    recent: IpvsDocument,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl PublisherRouter {
    pub fn new(registry: SinkRegistry, metrics: Option<Arc<MetricsRegistry>>) -> Self {
        Self {
            registry,
            publishers: HashMap::new(),
            services: Vec::new(),
            last: IpvsDocument::default(),
            recent: IpvsDocument::default(),
            metrics,
        }
    }

    /// Replace `publisher_specs` with the new set (§4.5 "On config update").
    /// Every publisher is reconstructed (insert-new and refresh-existing are
    /// the same operation here; a spec change is modeled as delete+create at
    /// the sink level per §9 open question (a) — sinks are expected to be
    /// idempotent or recover on the next delta).
    pub async fn apply_config(&mut self, snapshot: ConfigSnapshot) {
        self.services = snapshot.services;

        let mut fresh = HashMap::new();
        for spec in snapshot.publishers {
            match self.registry.build(&spec.type_, &spec.spec) {
                Ok(mut sink) => match sink.initialize(&snapshot.globals).await {
                    Ok(()) => {
                        fresh.insert(spec.name.clone(), PublisherEntry { spec, sink });
                    }
                    Err(e) => {
                        error!(publisher = %spec.name, error = %e, "publisher sink rejected globals, dropping publisher");
                    }
                },
                Err(e) => {
                    error!(publisher = %spec.name, error = %e, "unknown publisher type, dropping publisher");
                }
            }
        }
        if let Some(metrics) = &self.metrics {
            metrics.set_active_publishers(fresh.len());
        }
        self.publishers = fresh;
    }

    /// On IPVS document update (§4.5 "On IPVS document update").
    pub async fn apply_document(&mut self, update: DocumentUpdateMsg) {
        self.recent = update.document;

        for (name, entry) in self.publishers.iter() {
            let matching: HashSet<&str> = self
                .services
                .iter()
                .filter(|s| s.matches_labels(&entry.spec.match_labels))
                .map(|s| s.name.as_str())
                .collect();

            let a = project(&self.recent, &matching);
            let b = project(&self.last, &matching);
            let a_set: HashSet<&(String, String)> = a.iter().collect();
            let b_set: HashSet<&(String, String)> = b.iter().collect();

            let mut delta = Vec::new();
            for pair in &a {
                if !b_set.contains(pair) {
                    delta.push(DeltaEntry::appeared(pair.1.clone(), &pair.0));
                }
            }
            for pair in &b {
                if !a_set.contains(pair) {
                    delta.push(DeltaEntry::vanished(pair.1.clone(), &pair.0));
                }
            }

            if delta.is_empty() {
                continue;
            }

            let endpoints = a.iter().map(|(_, addr)| addr.clone()).collect();
            let endpoint_update = EndpointUpdate {
                timestamp: nanos_since_epoch(),
                delta,
                endpoints,
            };

            debug!(publisher = %name, deltas = endpoint_update.delta.len(), "dispatching endpoint update");
            if let Some(metrics) = &self.metrics {
                metrics.record_publisher_dispatch();
            }
            if let Err(e) = entry.sink.push_upward_data(&endpoint_update, name).await {
                warn!(publisher = %name, error = %e, "sink push failed, last still advances");
            }
        }

        self.last = self.recent.clone();
    }

    pub async fn run(
        mut self,
        mut config_rx: mpsc::Receiver<ConfigSnapshot>,
        mut document_rx: mpsc::Receiver<DocumentUpdateMsg>,
        mut stop_rx: StopReceiver,
    ) {
        info!("publisher router started");
        loop {
            tokio::select! {
                maybe_cfg = config_rx.recv() => {
                    match maybe_cfg {
                        Some(cfg) => self.apply_config(cfg).await,
                        None => break,
                    }
                }
                maybe_doc = document_rx.recv() => {
                    match maybe_doc {
                        Some(doc) => self.apply_document(doc).await,
                        None => break,
                    }
                }
                maybe_ack = stop_rx.recv() => {
                    if let Some(ack) = maybe_ack {
                        let _ = ack.send(());
                    }
                    break;
                }
            }
        }
        info!("publisher router stopped");
    }
}

/// `(serviceName, address)` pairs restricted to `matching` (§4.5).
fn project(document: &IpvsDocument, matching: &HashSet<&str>) -> Vec<(String, String)> {
    document
        .service_address_pairs()
        .into_iter()
        .filter(|(name, _)| matching.contains(name.as_str()))
        .collect()
}

fn nanos_since_epoch() -> String {
    let duration = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    duration.as_nanos().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use model::{ChangeType, Globals, IpvsDestination, IpvsServiceEntry};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    struct RecordingSink {
        calls: std::sync::Arc<Mutex<Vec<EndpointUpdate>>>,
    }

    #[async_trait]
    impl SinkPlugin for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn initialize(&mut self, _globals: &Globals) -> plugin::Result<()> {
            Ok(())
        }

        async fn push_upward_data(&self, update: &EndpointUpdate, _target_publisher: &str) -> plugin::Result<()> {
            self.calls.lock().unwrap().push(update.clone());
            Ok(())
        }
    }

    fn service(name: &str, labels: &[(&str, &str)]) -> Service {
        Service {
            name: name.to_string(),
            address: "tcp://10.0.0.1:80".to_string(),
            type_: "fileSource".to_string(),
            sched: "wrr".to_string(),
            weight: 1000,
            forward: model::ForwardMode::Nat,
            labels: labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            spec: serde_yaml::Value::Null,
        }
    }

    fn document(service_name: &str, addrs: &[&str]) -> IpvsDocument {
        IpvsDocument {
            services: vec![IpvsServiceEntry {
                address: "tcp://10.0.0.1:80".into(),
                sched: "wrr".into(),
                service_name: service_name.into(),
                service_type: "fileSource".into(),
                destinations: addrs
                    .iter()
                    .map(|a| IpvsDestination {
                        address: a.to_string(),
                        forward: "nat".into(),
                        weight: 1000,
                        annotations: BTreeMap::new(),
                    })
                    .collect(),
            }],
        }
    }

    fn with_sink(router: &mut PublisherRouter, name: &str, match_labels: &[(&str, &str)]) -> std::sync::Arc<Mutex<Vec<EndpointUpdate>>> {
        let calls = std::sync::Arc::new(Mutex::new(Vec::new()));
        let entry = PublisherEntry {
            spec: Publisher {
                name: name.to_string(),
                type_: "recording".to_string(),
                match_labels: match_labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                spec: serde_yaml::Value::Null,
            },
            sink: Box::new(RecordingSink { calls: calls.clone() }),
        };
        router.publishers.insert(name.to_string(), entry);
        calls
    }

    #[tokio::test]
    async fn publisher_delta_sequence_matches_scenario() {
        let mut router = PublisherRouter::new(SinkRegistry::new(), None);
        router.services = vec![service("S1", &[("tier", "web")])];
        let calls = with_sink(&mut router, "P", &[("tier", "web")]);

        router.apply_document(DocumentUpdateMsg { document: document("S1", &["A"]) }).await;
        router.apply_document(DocumentUpdateMsg { document: document("S1", &["A", "B"]) }).await;
        router.apply_document(DocumentUpdateMsg { document: document("S1", &["B"]) }).await;

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].delta.len(), 1);
        assert_eq!(calls[0].delta[0].change_type, ChangeType::Appeared);
        assert_eq!(calls[0].endpoints, vec!["A".to_string()]);

        assert_eq!(calls[1].delta.len(), 1);
        assert_eq!(calls[1].delta[0].change_type, ChangeType::Appeared);
        assert_eq!(calls[1].endpoints, vec!["A".to_string(), "B".to_string()]);

        assert_eq!(calls[2].delta.len(), 1);
        assert_eq!(calls[2].delta[0].change_type, ChangeType::Vanished);
        assert_eq!(calls[2].endpoints, vec!["B".to_string()]);
    }

    #[tokio::test]
    async fn mismatched_labels_receive_no_invocations() {
        let mut router = PublisherRouter::new(SinkRegistry::new(), None);
        router.services = vec![service("S1", &[("tier", "web")])];
        let calls = with_sink(&mut router, "Q", &[("tier", "db")]);

        router.apply_document(DocumentUpdateMsg { document: document("S1", &["A"]) }).await;
        router.apply_document(DocumentUpdateMsg { document: document("S1", &["A", "B"]) }).await;

        assert!(calls.lock().unwrap().is_empty());
    }
}
