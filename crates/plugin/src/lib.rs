//! The source/sink plugin interface (§6) and a constructor registry keyed by
//! string `type` tag (§9 "the registry is a string→constructor table").

pub mod registry;
pub mod sinks;
pub mod sources;

use async_trait::async_trait;
use model::{DownwardBackend, EndpointUpdate, Globals};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

pub use registry::{SinkRegistry, SourceRegistry};

/// Errors surfaced by plugin construction or operation.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("unknown plugin type: {0}")]
    UnknownType(String),

    #[error("invalid plugin spec: {0}")]
    InvalidSpec(#[from] serde_yaml::Error),

    #[error("plugin rejected spec: {0}")]
    InitializeFailed(String),

    #[error("plugin operation failed: {0}")]
    Operation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PluginError>;

/// A discoverer of backend endpoints for a single service (§6).
#[async_trait]
pub trait SourcePlugin: Send + Sync {
    /// Plugin's self-reported name (distinct from the config `type` tag).
    fn name(&self) -> &str;

    /// Re-initialize the plugin's view of the world against the current
    /// globals. Called once at construction and again on every config
    /// `Update` (§4.3).
    async fn initialize(&mut self, globals: &Globals) -> Result<()>;

    /// Whether this plugin pushes change notifications (§4.3). Source
    /// plugins without a downward interface are queried only once, at
    /// startup/update.
    fn has_downward_interface(&self) -> bool;

    /// Query the current backend set.
    async fn get_downward_data(&self) -> Result<Vec<DownwardBackend>>;

    /// Run until `quit_rx` fires, sending a unit value on `notify_tx`
    /// whenever the backend set may have changed. Only called when
    /// [`Self::has_downward_interface`] is true.
    async fn run_notification_loop(&self, notify_tx: mpsc::Sender<()>, quit_rx: oneshot::Receiver<()>) -> Result<()>;

    /// Source plugins never push upward data (§6).
    fn has_upward_interface(&self) -> bool {
        false
    }
}

/// An exporter of endpoint-state deltas for a publisher (§6).
#[async_trait]
pub trait SinkPlugin: Send + Sync {
    fn name(&self) -> &str;

    async fn initialize(&mut self, globals: &Globals) -> Result<()>;

    /// Export an endpoint update for `target_publisher`.
    async fn push_upward_data(&self, update: &EndpointUpdate, target_publisher: &str) -> Result<()>;
}
