//! `file` source plugin: reads backend addresses from a flat text file, one
//! `host:port` per line. Grounded in `original_source/plugins/proxy-from-file`
//! and `socket-front-proxy`'s downward-data shape.

use crate::{PluginError, Result, SourcePlugin};
use async_trait::async_trait;
use model::{DownwardBackend, Globals};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Duration};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    pub file: PathBuf,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    200
}

#[async_trait]
impl SourcePlugin for FileSource {
    fn name(&self) -> &str {
        "fileSource"
    }

    async fn initialize(&mut self, _globals: &Globals) -> Result<()> {
        Ok(())
    }

    fn has_downward_interface(&self) -> bool {
        true
    }

    async fn get_downward_data(&self) -> Result<Vec<DownwardBackend>> {
        let contents = match tokio::fs::read_to_string(&self.file).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(PluginError::Io(e)),
        };

        let mut backends: Vec<DownwardBackend> = contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(DownwardBackend::new)
            .collect();

        model::downward::sort_backends(&mut backends);
        Ok(backends)
    }

    async fn run_notification_loop(&self, notify_tx: mpsc::Sender<()>, mut quit_rx: oneshot::Receiver<()>) -> Result<()> {
        let mut ticker = interval(Duration::from_millis(self.poll_interval_ms));
        let mut last_modified: Option<SystemTime> = file_mtime(&self.file).await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let modified = file_mtime(&self.file).await;
                    if modified != last_modified {
                        last_modified = modified;
                        debug!(file = %self.file.display(), "file source change detected");
                        if notify_tx.send(()).await.is_err() {
                            return Ok(());
                        }
                    }
                }
                _ = &mut quit_rx => {
                    return Ok(());
                }
            }
        }
    }
}

async fn file_mtime(path: &PathBuf) -> Option<SystemTime> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.modified().ok(),
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(file = %path.display(), error = %e, "failed to stat file source");
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_and_sorts_backends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backends.txt");
        tokio::fs::write(&path, "10.0.0.2:80\n10.0.0.1:80\n# comment\n\n").await.unwrap();

        let source = FileSource {
            file: path,
            poll_interval_ms: 200,
        };
        let backends = source.get_downward_data().await.unwrap();
        assert_eq!(backends.len(), 2);
        assert_eq!(backends[0].address, "10.0.0.1:80");
        assert_eq!(backends[1].address, "10.0.0.2:80");
    }

    #[tokio::test]
    async fn missing_file_yields_empty_backend_list() {
        let source = FileSource {
            file: PathBuf::from("/nonexistent/backends.txt"),
            poll_interval_ms: 200,
        };
        let backends = source.get_downward_data().await.unwrap();
        assert!(backends.is_empty());
    }
}
