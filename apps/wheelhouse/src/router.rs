//! Applies decoded inbound frames to the state store.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use wheelhouse_proto::ServerFrame;

use crate::state::ConsoleState;

/// The one mutation point for [`ConsoleState`].
///
/// The channel supervisor calls [`apply`](Self::apply) for each frame
/// in transport arrival order, so mutations are serialized by
/// construction. Conflicting `logs` responses therefore resolve
/// last-arrived-wins, regardless of request issuance order.
pub struct MessageRouter {
    state: Arc<ConsoleState>,
    diagnostics: Option<mpsc::UnboundedSender<serde_json::Value>>,
}

impl MessageRouter {
    pub fn new(state: Arc<ConsoleState>) -> Self {
        Self {
            state,
            diagnostics: None,
        }
    }

    /// Forward `error` frame payloads to `sink` in addition to the log.
    pub fn with_diagnostics(mut self, sink: mpsc::UnboundedSender<serde_json::Value>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    pub fn state(&self) -> &Arc<ConsoleState> {
        &self.state
    }

    pub fn apply(&self, frame: ServerFrame) {
        match frame {
            ServerFrame::Processes { data, .. } => {
                trace!(target: "router", count = data.len(), "roster snapshot");
                self.state.replace_processes(data);
            }
            ServerFrame::Status { data, .. } => {
                trace!(target: "router", "status snapshot");
                self.state.replace_status(data);
            }
            ServerFrame::Logs { data, .. } => {
                trace!(
                    target: "router",
                    process_id = %data.process_id,
                    lines = data.logs.len(),
                    "log tail"
                );
                self.state.replace_logs(data.process_id, data.logs);
            }
            ServerFrame::Error { data, .. } => {
                warn!(target: "router", payload = %data, "backend error frame");
                if let Some(sink) = &self.diagnostics {
                    let _ = sink.send(data);
                }
            }
            ServerFrame::Pong { .. } => {
                trace!(target: "router", "pong");
            }
            ServerFrame::Unknown => {
                debug!(target: "router", "ignoring frame with unknown type");
            }
        }
    }
}
