use crate::engine::Engine;
use crate::protocol::{DisplayMessage, HostMessage};
use crate::query::{EngineCall, EngineReply, LoadState, QueryCoordinator};
use crate::services::transport::HostEndpoint;
use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// The host side of one open document.
///
/// Display requests go into the coordinator. Engine calls run as tokio tasks
/// that report back through an internal channel, so replies may arrive in
/// any order and the coordinator's token check sorts them out.
pub struct HostSession<E: Engine + 'static> {
    engine: Arc<E>,
    coordinator: QueryCoordinator,
    replies_tx: mpsc::UnboundedSender<EngineReply>,
    replies_rx: mpsc::UnboundedReceiver<EngineReply>,
}

impl<E: Engine + 'static> HostSession<E> {
    pub fn new(engine: Arc<E>, page_size: usize) -> Self {
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();
        Self {
            engine,
            coordinator: QueryCoordinator::new(page_size),
            replies_tx,
            replies_rx,
        }
    }

    pub fn coordinator(&self) -> &QueryCoordinator {
        &self.coordinator
    }

    /// Act on one display request. Must be called inside a tokio runtime.
    pub fn handle_display_message(&mut self, message: DisplayMessage) {
        let call = match message {
            DisplayMessage::Query { sql, limit } => {
                // A zero limit means the display has no opinion
                let page_size = if limit == 0 {
                    self.coordinator.default_page_size()
                } else {
                    limit
                };
                self.coordinator.submit_with_page_size(&sql, page_size)
            }
            DisplayMessage::More { sql, offset, .. } => {
                let cursor = self.coordinator.cursor();
                if sql != cursor.query() {
                    debug!(target: "stale", "Ignoring more request for a superseded query");
                    None
                } else {
                    if offset != cursor.offset() && !cursor.is_exhausted() {
                        debug!(
                            target: "transport",
                            "Display offset {} differs from cursor offset {}; using cursor",
                            offset,
                            cursor.offset()
                        );
                    }
                    self.coordinator.load_more()
                }
            }
        };

        if let Some(call) = call {
            self.dispatch(call);
        }
    }

    fn dispatch(&self, call: EngineCall) {
        let engine = Arc::clone(&self.engine);
        let replies = self.replies_tx.clone();
        tokio::spawn(async move {
            let reply = call.execute(engine.as_ref()).await;
            // The session may be gone by the time a call finishes
            let _ = replies.send(reply);
        });
    }

    /// Feed a finished call to the coordinator; stale replies produce nothing
    pub fn apply_reply(&mut self, reply: EngineReply) -> Option<HostMessage> {
        self.coordinator.on_reply(reply).map(HostMessage::from)
    }

    fn is_loading(&self) -> bool {
        matches!(
            self.coordinator.state(),
            LoadState::LoadingFresh | LoadState::LoadingMore
        )
    }

    /// Serve until the display side closes.
    ///
    /// A call still in flight when the display closes is answered before
    /// returning. Fails if replies can no longer be delivered.
    pub async fn run(
        mut self,
        mut inbound: mpsc::Receiver<DisplayMessage>,
        outbound: mpsc::Sender<HostMessage>,
    ) -> Result<()> {
        let mut inbound_open = true;
        loop {
            if !inbound_open && !self.is_loading() {
                info!(target: "transport", "Display closed, ending session");
                return Ok(());
            }

            tokio::select! {
                message = inbound.recv(), if inbound_open => match message {
                    Some(message) => {
                        debug!(target: "transport", "Display -> host: {:?}", message);
                        self.handle_display_message(message);
                    }
                    None => inbound_open = false,
                },
                Some(reply) = self.replies_rx.recv() => {
                    if let Some(message) = self.apply_reply(reply) {
                        outbound
                            .send(message)
                            .await
                            .map_err(|_| anyhow!("Display channel closed with a reply pending"))?;
                    }
                }
            }
        }
    }

    /// Serve over an in-process endpoint
    pub async fn serve(self, endpoint: HostEndpoint) -> Result<()> {
        self.run(endpoint.inbound, endpoint.outbound).await
    }

    /// Run the session as a task on the current runtime
    pub fn spawn(self, endpoint: HostEndpoint) -> JoinHandle<Result<()>> {
        tokio::spawn(self.serve(endpoint))
    }
}
