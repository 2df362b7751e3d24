//! Service Worker (§4.3): one task per service, owns its source plugin
//! instance, surfaces backend changes as per-service IPVS updates.

use crate::stoppable::StopReceiver;
use crate::types::{ServiceUpdateMsg, ServiceWorkerCommand};
use model::{Globals, Service};
use plugin::{SourcePlugin, SourceRegistry};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A running plugin instance plus the handle needed to stop its
/// notification loop (§3 Ownership: "A Service Worker exclusively owns its
/// source plugin instance and its stop channel").
struct PluginHandle {
    plugin: Arc<dyn SourcePlugin>,
    quit_tx: Option<oneshot::Sender<()>>,
    notify_task: Option<JoinHandle<()>>,
}

pub struct ServiceWorker {
    service: Service,
    globals: Globals,
    registry: Arc<SourceRegistry>,
    ipvs_tx: mpsc::Sender<ServiceUpdateMsg>,
    notify_tx: mpsc::Sender<()>,
    notify_rx: mpsc::Receiver<()>,
    handle: Option<PluginHandle>,
}

impl ServiceWorker {
    /// Construct, initialize the plugin, and spawn the task running this
    /// worker's event loop. Returns the command/stop handles used by the
    /// Config Applier.
    pub fn spawn(
        service: Service,
        globals: Globals,
        registry: Arc<SourceRegistry>,
        ipvs_tx: mpsc::Sender<ServiceUpdateMsg>,
    ) -> (mpsc::Sender<ServiceWorkerCommand>, ServiceWorkerHandle, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = crate::stoppable::StopHandle::channel();
        let (notify_tx, notify_rx) = mpsc::channel(1);

        let worker = ServiceWorker {
            service,
            globals,
            registry,
            ipvs_tx,
            notify_tx,
            notify_rx,
            handle: None,
        };

        let join = tokio::spawn(worker.run(cmd_rx, stop_rx));
        (cmd_tx, ServiceWorkerHandle(stop_tx), join)
    }

    async fn run(mut self, mut cmd_rx: mpsc::Receiver<ServiceWorkerCommand>, mut stop_rx: StopReceiver) {
        let name = self.service.name.clone();
        info!(service = %name, "service worker started");

        self.start_plugin().await;
        self.query_and_emit().await;

        loop {
            tokio::select! {
                maybe_tick = self.notify_rx.recv() => {
                    if maybe_tick.is_some() {
                        self.query_and_emit().await;
                    }
                }
                maybe_cmd = cmd_rx.recv() => {
                    match maybe_cmd {
                        Some(ServiceWorkerCommand::Update(new_service)) => {
                            debug!(service = %name, "updating service worker spec");
                            self.stop_plugin().await;
                            self.service = new_service;
                            self.start_plugin().await;
                            self.query_and_emit().await;
                        }
                        None => break,
                    }
                }
                maybe_ack = stop_rx.recv() => {
                    self.stop_plugin().await;
                    if let Some(ack) = maybe_ack {
                        let _ = ack.send(());
                    }
                    break;
                }
            }
        }

        info!(service = %name, "service worker stopped");
    }

    /// Build and initialize this worker's plugin instance, spawning its
    /// notification loop if it advertises a downward interface (§4.3).
    async fn start_plugin(&mut self) {
        let name = self.service.name.clone();
        let mut plugin = match self.registry.build(&self.service.type_, &self.service.spec) {
            Ok(p) => p,
            Err(e) => {
                error!(service = %name, error = %e, "failed to construct source plugin");
                return;
            }
        };

        if let Err(e) = plugin.initialize(&self.globals).await {
            error!(service = %name, error = %e, "source plugin rejected globals");
            return;
        }

        let plugin: Arc<dyn SourcePlugin> = Arc::from(plugin);
        let mut quit_tx = None;
        let mut notify_task = None;

        if plugin.has_downward_interface() {
            let (qtx, qrx) = oneshot::channel();
            let notify_tx = self.notify_tx.clone();
            let plugin_for_task = plugin.clone();
            let task_name = name.clone();
            notify_task = Some(tokio::spawn(async move {
                if let Err(e) = plugin_for_task.run_notification_loop(notify_tx, qrx).await {
                    warn!(service = %task_name, error = %e, "source plugin notification loop exited with error");
                }
            }));
            quit_tx = Some(qtx);
        }

        self.handle = Some(PluginHandle {
            plugin,
            quit_tx,
            notify_task,
        });
    }

    async fn stop_plugin(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            if let Some(quit_tx) = handle.quit_tx.take() {
                let _ = quit_tx.send(());
            }
            if let Some(task) = handle.notify_task.take() {
                let _ = task.await;
            }
        }
    }

    async fn query_and_emit(&self) {
        let Some(handle) = &self.handle else { return };
        let name = self.service.name.clone();

        match handle.plugin.get_downward_data().await {
            Ok(mut backends) => {
                model::downward::sort_backends(&mut backends);
                let update = ServiceUpdateMsg::new(self.service.clone(), backends, self.globals.clone());
                if self.ipvs_tx.send(update).await.is_err() {
                    warn!(service = %name, "ipvs applier channel closed");
                }
            }
            Err(e) => {
                warn!(service = %name, error = %e, "downward query failed, keeping prior backend set");
            }
        }
    }
}

/// Newtype wrapper so callers (Config Applier) get a named, documented
/// handle rather than a bare `StopHandle`.
pub struct ServiceWorkerHandle(crate::stoppable::StopHandle);

impl ServiceWorkerHandle {
    pub async fn stop(&self) {
        self.0.stop().await;
    }
}
