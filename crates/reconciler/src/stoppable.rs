//! Single-slot stop channel: the sender transfers a completion handle, the
//! receiver signals completion by sending on it (§5 "a sender transfers a
//! completion handle and the receiver signals completion").

use tokio::sync::{mpsc, oneshot};

/// A handle used by an owner (Config Applier, Supervisor) to stop one actor
/// and wait for its acknowledgement.
#[derive(Clone)]
pub struct StopHandle {
    tx: mpsc::Sender<oneshot::Sender<()>>,
}

/// The receiving half, selected on inside an actor's event loop.
pub type StopReceiver = mpsc::Receiver<oneshot::Sender<()>>;

impl StopHandle {
    pub fn channel() -> (Self, StopReceiver) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }

    /// Signal the actor and block until it acknowledges. A closed receiver
    /// (actor already gone) is treated as an immediate acknowledgement.
    pub async fn stop(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(ack_tx).await.is_ok() {
            let _ = ack_rx.await;
        }
    }
}
