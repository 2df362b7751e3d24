//! Config Watcher (§4.1): watches a YAML file on disk, parses and validates
//! it, and publishes whole-model snapshots on the config channel.

use crate::stoppable::StopReceiver;
use common::MetricsRegistry;
use model::Config;
use notify::{Config as NotifyConfig, Event, PollWatcher, RecursiveMode, Watcher};
use plugin::{SinkRegistry, SourceRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use validator::Validate;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Watches `path`, re-reading and re-validating it on every modification,
/// publishing successfully-validated snapshots on `config_tx`.
pub struct ConfigWatcher {
    path: PathBuf,
    source_registry: SourceRegistry,
    sink_registry: SinkRegistry,
    last_mod_time: Option<SystemTime>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl ConfigWatcher {
    pub fn new(
        path: impl Into<PathBuf>,
        source_registry: SourceRegistry,
        sink_registry: SinkRegistry,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        Self {
            path: path.into(),
            source_registry,
            sink_registry,
            last_mod_time: None,
            metrics,
        }
    }

    /// Validate every service/publisher spec against its plugin registry
    /// (§4.1 "Validation"). The whole snapshot is atomic: any one plugin
    /// rejecting its spec discards the entire snapshot.
    async fn validate(&self, config: &Config) -> Result<(), String> {
        for service in &config.services {
            let mut plugin = self
                .source_registry
                .build(&service.type_, &service.spec)
                .map_err(|e| format!("service {}: {e}", service.name))?;
            plugin
                .initialize(&config.globals)
                .await
                .map_err(|e| format!("service {}: {e}", service.name))?;
        }
        for publisher in &config.publishers {
            let mut sink = self
                .sink_registry
                .build(&publisher.type_, &publisher.spec)
                .map_err(|e| format!("publisher {}: {e}", publisher.name))?;
            sink.initialize(&config.globals)
                .await
                .map_err(|e| format!("publisher {}: {e}", publisher.name))?;
        }
        Ok(())
    }

    /// `stat` the file and, if modified since `last_mod_time`, read, parse
    /// and validate. `last_mod_time` is only advanced on success (§4.1
    /// "this is intentional: a failed parse does not suppress retry").
    async fn check_and_publish(&mut self, config_tx: &mpsc::Sender<Config>) {
        let modified = file_mtime(&self.path).await;
        let is_newer = match (modified, self.last_mod_time) {
            (Some(m), Some(last)) => m > last,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !is_newer {
            return;
        }

        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) => {
                warn!(file = %self.path.display(), error = %e, "failed to read config file");
                return;
            }
        };

        let config = match Config::from_yaml(&contents).and_then(|c| {
            c.validate_names()?;
            Validate::validate(&c)?;
            Ok(c)
        }) {
            Ok(c) => c,
            Err(e) => {
                warn!(file = %self.path.display(), error = %e, "failed to parse config file, retaining prior state");
                return;
            }
        };

        if let Err(e) = self.validate(&config).await {
            warn!(file = %self.path.display(), error = %e, "snapshot rejected by a plugin, discarding");
            return;
        }

        self.last_mod_time = modified;
        debug!(file = %self.path.display(), services = config.services.len(), publishers = config.publishers.len(), "publishing config snapshot");
        if config_tx.send(config).await.is_err() {
            warn!("config channel closed, config applier likely shutting down");
            return;
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_config_snapshot();
        }
    }

    /// Register Write/Create/Remove interest on the file's parent directory
    /// with a poll interval of 100ms (§4.1 "Algorithm"), firing an
    /// artificial first event at startup to bootstrap. Runs until stopped.
    pub async fn run(mut self, config_tx: mpsc::Sender<Config>, mut stop_rx: StopReceiver) {
        info!(file = %self.path.display(), "config watcher started");

        let (events_tx, mut events_rx) = mpsc::channel::<notify::Result<Event>>(16);
        let watch_dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut watcher = match PollWatcher::new(
            move |res| {
                let _ = events_tx.blocking_send(res);
            },
            NotifyConfig::default().with_poll_interval(POLL_INTERVAL),
        ) {
            Ok(w) => w,
            Err(e) => {
                warn!(error = %e, "failed to start file watcher, falling back to bootstrap-only read");
                self.check_and_publish(&config_tx).await;
                let _ = stop_rx.recv().await;
                return;
            }
        };

        if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
            warn!(dir = %watch_dir.display(), error = %e, "failed to watch config directory");
        }

        // Bootstrap event: force an initial read regardless of mtime.
        self.check_and_publish(&config_tx).await;

        loop {
            tokio::select! {
                maybe_event = events_rx.recv() => {
                    match maybe_event {
                        Some(Ok(event)) if event.paths.iter().any(|p| p == &self.path) => {
                            self.check_and_publish(&config_tx).await;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => warn!(error = %e, "file watcher reported an error"),
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
        info!("config watcher stopped");
    }
}

async fn file_mtime(path: &Path) -> Option<SystemTime> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.modified().ok(),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(service_name: &str) -> String {
        format!(
            "services:\n  - name: {service_name}\n    address: \"tcp://10.0.0.1:80\"\n    type: static\n    spec:\n      backends: []\n"
        )
    }

    #[tokio::test]
    async fn bootstrap_publishes_first_snapshot_without_a_prior_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        tokio::fs::write(&path, yaml("S1")).await.unwrap();

        let watcher = ConfigWatcher::new(&path, SourceRegistry::with_builtins(), SinkRegistry::with_builtins(), None);
        let (tx, mut rx) = mpsc::channel(4);
        let (_stop, stop_rx) = crate::stoppable::StopHandle::channel();

        let join = tokio::spawn(watcher.run(tx, stop_rx));
        let config = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        assert_eq!(config.services[0].name, "S1");

        join.abort();
    }

    #[tokio::test]
    async fn invalid_spec_discards_whole_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        tokio::fs::write(&path, "services:\n  - name: S1\n    address: \"tcp://10.0.0.1:80\"\n    type: nonexistent\n    spec: {}\n")
            .await
            .unwrap();

        let mut watcher = ConfigWatcher::new(&path, SourceRegistry::with_builtins(), SinkRegistry::with_builtins(), None);
        let (tx, mut rx) = mpsc::channel(4);
        watcher.check_and_publish(&tx).await;

        assert!(watcher.last_mod_time.is_none());
        drop(tx);
        assert!(rx.try_recv().is_err());
    }
}
