//! The reconciliation engine: the pipeline of actors described in §2-§5 of
//! the system design — config watcher, config applier, service worker,
//! IPVS applier, publisher router — connected by typed channels.

pub mod config_applier;
pub mod config_watcher;
pub mod error;
pub mod ipvs_applier;
pub mod ipvsctl;
pub mod publisher_router;
pub mod service_worker;
pub mod stoppable;
pub mod types;

pub use config_applier::ConfigApplier;
pub use config_watcher::ConfigWatcher;
pub use error::{ReconcilerError, Result};
pub use ipvs_applier::IpvsApplier;
pub use ipvsctl::{IpvsCtl, ProcessIpvsCtl};
pub use publisher_router::PublisherRouter;
pub use service_worker::ServiceWorker;
pub use stoppable::{StopHandle, StopReceiver};
