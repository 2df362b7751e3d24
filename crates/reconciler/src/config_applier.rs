//! Config Applier (§4.2): reconciles the active service-worker set and
//! publisher registrations with each incoming snapshot, sole owner of the
//! active worker table.

use crate::service_worker::{ServiceWorker, ServiceWorkerHandle};
use crate::stoppable::StopReceiver;
use crate::types::{ConfigSnapshot, ServiceUpdateMsg, ServiceWorkerCommand};
use common::MetricsRegistry;
use model::{Config, Globals};
use plugin::SourceRegistry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

struct ActiveWorker {
    cmd_tx: mpsc::Sender<ServiceWorkerCommand>,
    stop: ServiceWorkerHandle,
    join: JoinHandle<()>,
}

/// Drives reconciliation (§4.2 "Reconciliation (per snapshot, in order)").
pub struct ConfigApplier {
    registry: Arc<SourceRegistry>,
    ipvs_tx: mpsc::Sender<ServiceUpdateMsg>,
    publisher_config_tx: mpsc::Sender<ConfigSnapshot>,
    workers: HashMap<String, ActiveWorker>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl ConfigApplier {
    pub fn new(
        registry: Arc<SourceRegistry>,
        ipvs_tx: mpsc::Sender<ServiceUpdateMsg>,
        publisher_config_tx: mpsc::Sender<ConfigSnapshot>,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        Self {
            registry,
            ipvs_tx,
            publisher_config_tx,
            workers: HashMap::new(),
            metrics,
        }
    }

    /// Apply one config snapshot end to end (§4.2 steps 1-4).
    pub async fn apply(&mut self, config: Config) {
        let globals: Globals = config.globals.clone();

        // 1. Cache-flush the IPVS applier before touching worker lifecycle.
        if self.ipvs_tx.send(ServiceUpdateMsg::flush()).await.is_err() {
            debug!("ipvs applier channel closed during flush, applier likely shutting down");
        }

        // 2. Forward the snapshot to the Publisher Router.
        let snapshot = ConfigSnapshot::from(config.clone());
        if self.publisher_config_tx.send(snapshot).await.is_err() {
            debug!("publisher router channel closed, applier likely shutting down");
        }

        // 3. Reconcile service workers.
        let desired: HashMap<&str, &model::Service> = config.services.iter().map(|s| (s.name.as_str(), s)).collect();
        let existing: HashSet<String> = self.workers.keys().cloned().collect();

        for name in existing.iter() {
            if !desired.contains_key(name.as_str()) {
                if let Some(worker) = self.workers.remove(name) {
                    info!(service = %name, "stopping removed service worker");
                    worker.stop.stop().await;
                    let _ = worker.join.await;
                }
            }
        }

        for service in &config.services {
            if let Some(worker) = self.workers.get(&service.name) {
                let _ = worker.cmd_tx.send(ServiceWorkerCommand::Update(service.clone())).await;
            } else {
                info!(service = %service.name, "starting service worker");
                let (cmd_tx, stop, join) =
                    ServiceWorker::spawn(service.clone(), globals.clone(), self.registry.clone(), self.ipvs_tx.clone());
                self.workers.insert(service.name.clone(), ActiveWorker { cmd_tx, stop, join });
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.set_active_service_workers(self.workers.len());
        }
    }

    /// Stop every started worker (§4.2 "on shutdown").
    pub async fn shutdown(&mut self) {
        for (name, worker) in self.workers.drain() {
            info!(service = %name, "stopping service worker on shutdown");
            worker.stop.stop().await;
            let _ = worker.join.await;
        }
        if let Some(metrics) = &self.metrics {
            metrics.set_active_service_workers(0);
        }
    }

    pub async fn run(mut self, mut config_rx: mpsc::Receiver<Config>, mut stop_rx: StopReceiver) {
        info!("config applier started");
        loop {
            tokio::select! {
                maybe_cfg = config_rx.recv() => {
                    match maybe_cfg {
                        Some(cfg) => self.apply(cfg).await,
                        None => break,
                    }
                }
                maybe_ack = stop_rx.recv() => {
                    self.shutdown().await;
                    if let Some(ack) = maybe_ack {
                        let _ = ack.send(());
                    }
                    break;
                }
            }
        }
        info!("config applier stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{ForwardMode, Service};

    fn config(names: &[&str]) -> Config {
        Config {
            globals: Globals::default(),
            services: names
                .iter()
                .map(|n| Service {
                    name: n.to_string(),
                    address: "tcp://10.0.0.1:80".to_string(),
                    type_: "static".to_string(),
                    sched: "wrr".to_string(),
                    weight: 1000,
                    forward: ForwardMode::Nat,
                    labels: Default::default(),
                    spec: serde_yaml::from_str("backends: []").unwrap(),
                })
                .collect(),
            publishers: vec![],
        }
    }

    #[tokio::test]
    async fn worker_set_tracks_snapshot_names() {
        let registry = Arc::new(SourceRegistry::with_builtins());
        let (ipvs_tx, mut ipvs_rx) = mpsc::channel(32);
        let (pub_tx, mut pub_rx) = mpsc::channel(8);
        let mut applier = ConfigApplier::new(registry, ipvs_tx, pub_tx, None);

        applier.apply(config(&["S1", "S2"])).await;
        assert_eq!(applier.workers.len(), 2);

        applier.apply(config(&["S2"])).await;
        assert_eq!(applier.workers.len(), 1);
        assert!(applier.workers.contains_key("S2"));

        applier.shutdown().await;
        assert!(applier.workers.is_empty());

        ipvs_rx.close();
        pub_rx.close();
    }
}
