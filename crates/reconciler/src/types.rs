//! Messages carried on the engine's internal channels (§2, §3).

use model::{DownwardBackend, Globals, IpvsDocument, Service};

/// A per-service update emitted by a Service Worker onto the IPVS-update
/// channel, or the flush sentinel (`service_name == ""`) emitted by the
/// Config Applier (§4.2, §4.4).
#[derive(Debug, Clone)]
pub struct ServiceUpdateMsg {
    pub service_name: String,
    pub service: Option<Service>,
    pub backends: Vec<DownwardBackend>,
    pub globals: Globals,
}

impl ServiceUpdateMsg {
    pub fn new(service: Service, backends: Vec<DownwardBackend>, globals: Globals) -> Self {
        Self {
            service_name: service.name.clone(),
            service: Some(service),
            backends,
            globals,
        }
    }

    /// The cache-flush sentinel (§4.2, §4.4, glossary "Flush sentinel").
    pub fn flush() -> Self {
        Self {
            service_name: String::new(),
            service: None,
            backends: Vec::new(),
            globals: Globals::default(),
        }
    }

    pub fn is_flush(&self) -> bool {
        self.service_name.is_empty()
    }
}

/// The unit of work handed to a running Service Worker besides the initial
/// spec it was spawned with (§4.3).
#[derive(Debug)]
pub enum ServiceWorkerCommand {
    /// Replace the service reference and re-trigger a query.
    Update(Service),
}

/// The unit of work handed to a running Publisher Router besides IPVS
/// document updates (§4.5): a fresh whole-model snapshot to re-derive
/// `publisher_specs` and `services` from.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub globals: Globals,
    pub services: Vec<Service>,
    pub publishers: Vec<model::Publisher>,
}

impl From<model::Config> for ConfigSnapshot {
    fn from(cfg: model::Config) -> Self {
        Self {
            globals: cfg.globals,
            services: cfg.services,
            publishers: cfg.publishers,
        }
    }
}

/// Rendered document handed from the IPVS Applier to the Publisher Router
/// on the publisher-update channel (§2, §4.4).
#[derive(Debug, Clone)]
pub struct DocumentUpdateMsg {
    pub document: IpvsDocument,
}
