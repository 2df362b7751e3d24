//! `log` sink plugin: the simplest possible sink, emits each update via
//! `tracing`. Useful as a default/smoke-test sink.

use crate::{Result, SinkPlugin};
use async_trait::async_trait;
use model::{EndpointUpdate, Globals};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogSink {}

#[async_trait]
impl SinkPlugin for LogSink {
    fn name(&self) -> &str {
        "logPublisher"
    }

    async fn initialize(&mut self, _globals: &Globals) -> Result<()> {
        Ok(())
    }

    async fn push_upward_data(&self, update: &EndpointUpdate, target_publisher: &str) -> Result<()> {
        info!(
            publisher = target_publisher,
            deltas = update.delta.len(),
            endpoints = update.endpoints.len(),
            "endpoint update"
        );
        Ok(())
    }
}
