//! The Supervisor (§4.6, §10): wires the four reconciliation actors
//! together, serves the control-socket `Stop` RPC, and drives shutdown in
//! reverse registration order with a bounded wait budget — the Rust
//! counterpart of `original_source/daemon/daemon.go`'s `Service`.

use crate::config::Configuration;
use crate::control::ControlService;
use crate::http_server::MetricsServer;
use common::MetricsRegistry;
use plugin::{SinkRegistry, SourceRegistry};
use reconciler::ipvsctl::ProcessIpvsCtl;
use reconciler::stoppable::StopHandle;
use reconciler::{ConfigApplier, ConfigWatcher, IpvsApplier, PublisherRouter};
use std::path::Path;
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnixListenerStream;
use tonic::transport::{Identity, Server, ServerTlsConfig};
use tracing::{info, warn};

pub struct Supervisor {
    config: Configuration,
}

impl Supervisor {
    pub fn new(config: Configuration) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("starting ipvsmeshd supervisor");

        let metrics: Option<Arc<MetricsRegistry>> = if self.config.metrics_enabled {
            info!(addr = %self.config.metrics_listen_addr, "metrics enabled");
            Some(Arc::new(MetricsRegistry::new()))
        } else {
            info!("metrics disabled");
            None
        };

        let (config_tx, config_rx) = mpsc::channel(8);
        let (ipvs_tx, ipvs_rx) = mpsc::channel(64);
        let (doc_tx, doc_rx) = mpsc::channel(64);
        let (pub_cfg_tx, pub_cfg_rx) = mpsc::channel(8);

        let watcher = ConfigWatcher::new(
            self.config.configfile.clone(),
            SourceRegistry::with_builtins(),
            SinkRegistry::with_builtins(),
            metrics.clone(),
        );
        let (watcher_stop, watcher_stop_rx) = StopHandle::channel();

        let applier = ConfigApplier::new(
            Arc::new(SourceRegistry::with_builtins()),
            ipvs_tx.clone(),
            pub_cfg_tx.clone(),
            metrics.clone(),
        );
        let (applier_stop, applier_stop_rx) = StopHandle::channel();

        let ipvs_applier = IpvsApplier::new(ProcessIpvsCtl, doc_tx, metrics.clone());
        let (ipvs_stop, ipvs_stop_rx) = StopHandle::channel();

        let router = PublisherRouter::new(SinkRegistry::with_builtins(), metrics.clone());
        let (router_stop, router_stop_rx) = StopHandle::channel();

        let metrics_handle = metrics.clone().map(|registry| {
            let server = MetricsServer::new(registry, self.config.metrics_listen_addr.clone());
            tokio::spawn(async move {
                if let Err(e) = server.run().await {
                    warn!(error = %e, "metrics server error");
                }
            })
        });

        // Registration order: watcher, applier, ipvs applier, router — stop
        // runs in the reverse of this order (§4.6).
        let watcher_handle = tokio::spawn(watcher.run(config_tx, watcher_stop_rx));
        let applier_handle = tokio::spawn(applier.run(config_rx, applier_stop_rx));
        let ipvs_handle = tokio::spawn(ipvs_applier.run(ipvs_rx, ipvs_stop_rx));
        let router_handle = tokio::spawn(router.run(pub_cfg_rx, doc_rx, router_stop_rx));

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let control_handle = tokio::spawn(serve_control_socket(self.config.clone(), shutdown_tx));

        info!("all tasks spawned, supervisor running");

        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
            _ = shutdown_rx.recv() => info!("stop requested over control socket"),
        }

        let timeout = self.config.daemon_timeout();
        info!(timeout_secs = timeout.as_secs(), "stopping workers in reverse registration order");
        let shutdown = async {
            router_stop.stop().await;
            ipvs_stop.stop().await;
            applier_stop.stop().await;
            watcher_stop.stop().await;
        };
        if tokio::time::timeout(timeout, shutdown).await.is_err() {
            warn!("shutdown wait budget exceeded, proceeding with teardown anyway");
        }

        control_handle.abort();
        if let Some(handle) = metrics_handle {
            handle.abort();
        }
        let _ = tokio::join!(watcher_handle, applier_handle, ipvs_handle, router_handle);

        if Path::new(&self.config.socket).exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket) {
                warn!(error = %e, "failed to remove control socket file");
            }
        }

        info!("ipvsmeshd stopped");
        Ok(())
    }
}

/// Binds the control socket with `umask 0007` (new files `rwxrwx---`),
/// optionally `chown`s it to `group_id`, optionally wraps it in TLS loaded
/// from `tlscertfile`/`tlskeyfile`, and serves the `Control` service until
/// the listener is dropped (§4.6, §2 supplement 1).
async fn serve_control_socket(config: Configuration, shutdown_tx: mpsc::Sender<()>) {
    if Path::new(&config.socket).exists() {
        if let Err(e) = std::fs::remove_file(&config.socket) {
            warn!(socket = %config.socket, error = %e, "failed to remove stale control socket");
            return;
        }
    }

    let previous_umask = unsafe { libc::umask(0o007) };
    let listener = match UnixListener::bind(&config.socket) {
        Ok(l) => l,
        Err(e) => {
            unsafe { libc::umask(previous_umask) };
            warn!(socket = %config.socket, error = %e, "unable to listen on control socket");
            return;
        }
    };
    unsafe { libc::umask(previous_umask) };

    if config.group_id >= 0 {
        let path = std::ffi::CString::new(config.socket.as_str()).expect("socket path has no interior nul");
        let result = unsafe { libc::chown(path.as_ptr(), u32::MAX, config.group_id as libc::gid_t) };
        if result != 0 {
            warn!(socket = %config.socket, gid = config.group_id, "unable to chgrp control socket");
        }
    }

    info!(socket = %config.socket, tls = config.tls, "control socket listening");

    let control = ControlService::into_server(shutdown_tx);
    let incoming = UnixListenerStream::new(listener);

    let mut builder = Server::builder();
    if config.tls {
        match load_tls_config(&config.tlscertfile, &config.tlskeyfile).await {
            Ok(tls_config) => {
                builder = match builder.tls_config(tls_config) {
                    Ok(b) => b,
                    Err(e) => {
                        warn!(error = %e, "invalid TLS configuration, serving control socket without TLS");
                        Server::builder()
                    }
                };
            }
            Err(e) => {
                warn!(error = %e, "failed to load TLS cert/key, serving control socket without TLS");
            }
        }
    }

    if let Err(e) = builder.add_service(control).serve_with_incoming(incoming).await {
        warn!(error = %e, "control socket server error");
    }
}

async fn load_tls_config(cert_path: &str, key_path: &str) -> std::io::Result<ServerTlsConfig> {
    let cert = tokio::fs::read(cert_path).await?;
    let key = tokio::fs::read(key_path).await?;
    Ok(ServerTlsConfig::new().identity(Identity::from_pem(cert, key)))
}
