//! The IPVS Applier (§4.4): holds the authoritative merged IPVS document,
//! applies it through `ipvsctl`, and announces the result upward.

use crate::ipvsctl::IpvsCtl;
use crate::stoppable::StopReceiver;
use crate::types::{DocumentUpdateMsg, ServiceUpdateMsg};
use common::MetricsRegistry;
use model::{ExecType, IpvsDestination, IpvsDocument, IpvsServiceEntry};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Merged per-service cache, protected by a mutex per §3 "Ownership" even
/// though in this implementation it is only ever touched from the
/// applier's own single-selection event loop — the lock documents the
/// invariant rather than arbitrating real contention.
struct Cache {
    services: Mutex<HashMap<String, ServiceUpdateMsg>>,
}

impl Cache {
    fn new() -> Self {
        Self {
            services: Mutex::new(HashMap::new()),
        }
    }

    fn flush(&self) {
        self.services.lock().unwrap().clear();
    }

    fn integrate(&self, update: ServiceUpdateMsg) {
        self.services.lock().unwrap().insert(update.service_name.clone(), update);
    }

    fn render(&self) -> IpvsDocument {
        let services = self.services.lock().unwrap();
        let mut entries: Vec<IpvsServiceEntry> = services
            .values()
            .filter(|u| !u.backends.is_empty())
            .map(render_entry)
            .collect();
        entries.sort_by(|a, b| a.service_name.cmp(&b.service_name));
        IpvsDocument { services: entries }
    }
}

fn render_entry(update: &ServiceUpdateMsg) -> IpvsServiceEntry {
    let service = update.service.as_ref().expect("non-flush update always carries a service");
    let service_default_weight = service.weight;

    let destinations = update
        .backends
        .iter()
        .map(|backend| IpvsDestination {
            address: backend.address.clone(),
            forward: service.forward.to_string(),
            weight: backend.effective_weight(service_default_weight),
            annotations: backend.additional_info.clone(),
        })
        .collect();

    IpvsServiceEntry {
        address: service.address.clone(),
        sched: service.sched.clone(),
        service_name: service.name.clone(),
        service_type: service.type_.clone(),
        destinations,
    }
}

/// Owns the merged cache and drives the apply/publish cycle.
pub struct IpvsApplier<C: IpvsCtl> {
    cache: Cache,
    ipvsctl: C,
    publisher_tx: mpsc::Sender<DocumentUpdateMsg>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl<C: IpvsCtl> IpvsApplier<C> {
    pub fn new(
        ipvsctl: C,
        publisher_tx: mpsc::Sender<DocumentUpdateMsg>,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        Self {
            cache: Cache::new(),
            ipvsctl,
            publisher_tx,
            metrics,
        }
    }

    /// Process one update end-to-end (§4.4 "Per-update processing"). `None`
    /// backends rendering is skipped entirely for the flush sentinel.
    pub async fn process_update(&self, update: ServiceUpdateMsg) {
        if update.is_flush() {
            debug!("flushing IPVS applier cache");
            self.cache.flush();
            return;
        }

        let exec_type = update.globals.ipvsctl.exec_type;
        let ipvsctl_path = update.globals.ipvsctl.ipvsctl_path.clone();
        let output_file = update.globals.ipvsctl.file.clone();
        let service_name = update.service_name.clone();

        self.cache.integrate(update);
        let document = self.cache.render();

        let started = Instant::now();
        let result = self.apply(exec_type, &ipvsctl_path, &output_file, &document).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_apply(result.is_ok(), started.elapsed());
        }
        if let Err(e) = result {
            error!(service = %service_name, error = %e, "ipvsctl apply failed, keeping in-memory model");
        }

        if self.publisher_tx.send(DocumentUpdateMsg { document }).await.is_err() {
            warn!("publisher router channel closed, dropping document update");
        }
    }

    async fn apply(
        &self,
        exec_type: ExecType,
        ipvsctl_path: &str,
        output_file: &str,
        document: &IpvsDocument,
    ) -> crate::error::Result<()> {
        let yaml = document.to_yaml_string()?;

        match exec_type {
            ExecType::ExecOnly => {
                self.ipvsctl.apply_stdin(ipvsctl_path, &yaml).await?;
            }
            ExecType::FileOnly => {
                write_document_file(output_file, &yaml).await?;
            }
            ExecType::FileAndExec => {
                write_document_file(output_file, &yaml).await?;
                self.ipvsctl.apply_file(ipvsctl_path, std::path::Path::new(output_file)).await?;
            }
        }
        Ok(())
    }

    /// Drive the applier to completion: consume `update_rx` until closed or
    /// stopped (§4.4, §5 "single selection point").
    pub async fn run(self, mut update_rx: mpsc::Receiver<ServiceUpdateMsg>, mut stop_rx: StopReceiver) {
        info!("ipvs applier started");
        loop {
            tokio::select! {
                maybe_update = update_rx.recv() => {
                    match maybe_update {
                        Some(update) => self.process_update(update).await,
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
        info!("ipvs applier stopped");
    }
}

/// `file-only`/`file-and-exec`: write at mode 0640 (§4.4).
async fn write_document_file(path: &str, yaml: &str) -> std::io::Result<()> {
    tokio::fs::write(path, yaml).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o640);
        tokio::fs::set_permissions(path, perms).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipvsctl::fakes::FakeIpvsCtl;
    use model::{DownwardBackend, ForwardMode, Globals, Service};
    use std::sync::Arc;

    fn service(name: &str, weight: i64) -> Service {
        Service {
            name: name.to_string(),
            address: "tcp://10.1.0.1:80".to_string(),
            type_: "fileSource".to_string(),
            sched: "wrr".to_string(),
            weight,
            forward: ForwardMode::Nat,
            labels: Default::default(),
            spec: serde_yaml::Value::Null,
        }
    }

    #[tokio::test]
    async fn bootstrap_renders_sorted_destinations() {
        let ipvsctl = Arc::new(FakeIpvsCtl::default());
        let (tx, mut rx) = mpsc::channel(4);
        let applier = IpvsApplier::new(ipvsctl.clone(), tx, None);

        let backends = vec![
            DownwardBackend::new("10.0.0.2:80"),
            DownwardBackend::new("10.0.0.1:80"),
        ];
        let update = ServiceUpdateMsg::new(service("S1", 500), backends, Globals::default());
        applier.process_update(update).await;

        let doc = rx.recv().await.unwrap().document;
        assert_eq!(doc.services.len(), 1);
        let dests = &doc.services[0].destinations;
        assert_eq!(dests[0].address, "10.0.0.1:80");
        assert_eq!(dests[1].address, "10.0.0.2:80");
        assert_eq!(dests[0].weight, 500);
        assert_eq!(ipvsctl.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn flush_sentinel_clears_cache() {
        let ipvsctl = Arc::new(FakeIpvsCtl::default());
        let (tx, mut rx) = mpsc::channel(4);
        let applier = IpvsApplier::new(ipvsctl, tx, None);

        let update = ServiceUpdateMsg::new(service("S1", 500), vec![DownwardBackend::new("10.0.0.1:80")], Globals::default());
        applier.process_update(update).await;
        rx.recv().await.unwrap();

        applier.process_update(ServiceUpdateMsg::flush()).await;
        let doc = applier.cache.render();
        assert!(doc.services.is_empty());
    }

    #[tokio::test]
    async fn empty_backends_omit_service_from_document() {
        let ipvsctl = Arc::new(FakeIpvsCtl::default());
        let (tx, mut rx) = mpsc::channel(4);
        let applier = IpvsApplier::new(ipvsctl, tx, None);

        let update = ServiceUpdateMsg::new(service("S1", 500), vec![], Globals::default());
        applier.process_update(update).await;
        let doc = rx.recv().await.unwrap().document;
        assert!(doc.services.is_empty());
    }

    #[tokio::test]
    async fn apply_failure_is_logged_and_next_update_still_attempted() {
        let ipvsctl = Arc::new(FakeIpvsCtl::default());
        *ipvsctl.fail_next.lock().unwrap() = 1;
        let (tx, mut rx) = mpsc::channel(4);
        let applier = IpvsApplier::new(ipvsctl.clone(), tx, None);

        let update = ServiceUpdateMsg::new(service("S1", 500), vec![DownwardBackend::new("10.0.0.1:80")], Globals::default());
        applier.process_update(update.clone()).await;
        let doc = rx.recv().await.unwrap().document;
        assert_eq!(doc.services.len(), 1, "model reflects intent even though apply failed");

        applier.process_update(update).await;
        rx.recv().await.unwrap();
        assert_eq!(ipvsctl.calls.lock().unwrap().len(), 2);
    }
}
