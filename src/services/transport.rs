//! In-process duplex channel between a host session and a display surface.

use crate::protocol::{DisplayMessage, HostMessage};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendError, TryRecvError};

/// Host half: receives display requests, sends host replies
pub struct HostEndpoint {
    pub inbound: mpsc::Receiver<DisplayMessage>,
    pub outbound: mpsc::Sender<HostMessage>,
}

/// Display half: sends requests, receives replies
pub struct DisplayEndpoint {
    outbound: mpsc::Sender<DisplayMessage>,
    inbound: mpsc::Receiver<HostMessage>,
}

/// Two bounded channels wired back to back
pub fn channel_pair(capacity: usize) -> (HostEndpoint, DisplayEndpoint) {
    let (display_tx, display_rx) = mpsc::channel(capacity.max(1));
    let (host_tx, host_rx) = mpsc::channel(capacity.max(1));
    (
        HostEndpoint {
            inbound: display_rx,
            outbound: host_tx,
        },
        DisplayEndpoint {
            outbound: display_tx,
            inbound: host_rx,
        },
    )
}

impl DisplayEndpoint {
    pub async fn send(&self, message: DisplayMessage) -> Result<(), SendError<DisplayMessage>> {
        self.outbound.send(message).await
    }

    /// For callers outside the runtime, such as the terminal event loop
    pub fn blocking_send(&self, message: DisplayMessage) -> Result<(), SendError<DisplayMessage>> {
        self.outbound.blocking_send(message)
    }

    pub async fn recv(&mut self) -> Option<HostMessage> {
        self.inbound.recv().await
    }

    pub fn try_recv(&mut self) -> Result<HostMessage, TryRecvError> {
        self.inbound.try_recv()
    }

    /// For callers outside the runtime
    pub fn blocking_recv(&mut self) -> Option<HostMessage> {
        self.inbound.blocking_recv()
    }
}
