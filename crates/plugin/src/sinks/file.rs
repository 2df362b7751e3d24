//! `file` sink plugin: appends each endpoint update as one JSON line.
//! Grounded in `original_source/plugins/file-publisher`.

use crate::{PluginError, Result, SinkPlugin};
use async_trait::async_trait;
use model::{EndpointUpdate, Globals};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSink {
    #[serde(rename = "outputFile")]
    pub output_file: PathBuf,
}

#[async_trait]
impl SinkPlugin for FileSink {
    fn name(&self) -> &str {
        "filePublisher"
    }

    async fn initialize(&mut self, _globals: &Globals) -> Result<()> {
        Ok(())
    }

    async fn push_upward_data(&self, update: &EndpointUpdate, _target_publisher: &str) -> Result<()> {
        let mut line = serde_json::to_vec(update).map_err(|e| PluginError::Operation(e.to_string()))?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.output_file)
            .await?;
        file.write_all(&line).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::ChangeType;

    #[tokio::test]
    async fn appends_one_json_line_per_update() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let sink = FileSink { output_file: path.clone() };

        let update = EndpointUpdate {
            timestamp: "1".to_string(),
            delta: vec![model::DeltaEntry {
                change_type: ChangeType::Appeared,
                address: "10.0.0.1:80".into(),
                additional_info: Default::default(),
            }],
            endpoints: vec!["10.0.0.1:80".into()],
        };
        sink.push_upward_data(&update, "P").await.unwrap();
        sink.push_upward_data(&update, "P").await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
