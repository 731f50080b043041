//! Outbound log-window requests and the intent behind them.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use wheelhouse_proto::{ClientFrame, LogWindow};

use crate::channel::ChannelManager;

/// Tracks which (process, window) a consumer currently wants and
/// issues `request_logs` frames for it.
///
/// Requests carry no correlation identifier. If two requests for one
/// process are in flight, the buffer ends up holding whichever
/// response arrives last on the wire, not necessarily the one for the
/// most recently issued request. Switching process or window does not
/// clear the existing buffer; the stale tail stays visible until the
/// fresh `logs` frame lands.
pub struct LogTailController {
    channel: Arc<ChannelManager>,
    intent: Mutex<Option<(String, LogWindow)>>,
}

impl LogTailController {
    pub fn new(channel: Arc<ChannelManager>) -> Self {
        Self {
            channel,
            intent: Mutex::new(None),
        }
    }

    /// Record the desired tail and request it. Re-invoking with the
    /// same pair re-issues the request (manual refresh).
    pub fn request(&self, process_id: impl Into<String>, window: LogWindow) {
        let process_id = process_id.into();
        debug!(target: "logs", process_id = %process_id, window = %window, "requesting log tail");
        *self.intent.lock() = Some((process_id.clone(), window));
        self.channel.send(ClientFrame::RequestLogs {
            process_id,
            lines: window,
        });
    }

    /// Re-issue the current intent, if any. Callers do this after the
    /// connectivity watch flips back to Open, since frames sent while
    /// the channel was down were dropped.
    pub fn refresh(&self) {
        let intent = self.intent.lock().clone();
        if let Some((process_id, window)) = intent {
            debug!(target: "logs", process_id = %process_id, window = %window, "refreshing log tail");
            self.channel.send(ClientFrame::RequestLogs {
                process_id,
                lines: window,
            });
        }
    }

    pub fn intent(&self) -> Option<(String, LogWindow)> {
        self.intent.lock().clone()
    }
}
