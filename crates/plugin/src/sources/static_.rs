//! `static` source plugin: a fixed backend list with no downward interface.
//! No `original_source/` analog — this is the minimal `SourcePlugin`
//! implementation needed to exercise the reconciler and as a bootstrap
//! fixture for a config file with no real source plugin configured.

use crate::{Result, SourcePlugin};
use async_trait::async_trait;
use model::{DownwardBackend, Globals};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticSource {
    #[serde(default)]
    pub backends: Vec<String>,
}

#[async_trait]
impl SourcePlugin for StaticSource {
    fn name(&self) -> &str {
        "staticSource"
    }

    async fn initialize(&mut self, _globals: &Globals) -> Result<()> {
        Ok(())
    }

    fn has_downward_interface(&self) -> bool {
        false
    }

    async fn get_downward_data(&self) -> Result<Vec<DownwardBackend>> {
        let mut backends: Vec<DownwardBackend> = self.backends.iter().map(DownwardBackend::new).collect();
        model::downward::sort_backends(&mut backends);
        Ok(backends)
    }

    async fn run_notification_loop(&self, _notify_tx: mpsc::Sender<()>, quit_rx: oneshot::Receiver<()>) -> Result<()> {
        // No downward interface: just wait to be told to quit.
        let _ = quit_rx.await;
        Ok(())
    }
}
