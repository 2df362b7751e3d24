//! The local IPC control surface (§6 "IPC control", §2 supplement 1):
//! a single `Stop` RPC mirroring `localinterface.DaemonService.Stop` from
//! `original_source/localinterface/`.

use ipvsmeshd_proto::control_server::{Control, ControlServer};
use ipvsmeshd_proto::Empty;
use tokio::sync::mpsc;
use tonic::{Request, Response, Status};
use tracing::info;

pub struct ControlService {
    shutdown_tx: mpsc::Sender<()>,
}

impl ControlService {
    pub fn into_server(shutdown_tx: mpsc::Sender<()>) -> ControlServer<Self> {
        ControlServer::new(Self { shutdown_tx })
    }
}

#[tonic::async_trait]
impl Control for ControlService {
    async fn stop(&self, _request: Request<Empty>) -> Result<Response<Empty>, Status> {
        info!("stop requested over control socket");
        let _ = self.shutdown_tx.send(()).await;
        Ok(Response::new(Empty {}))
    }
}
