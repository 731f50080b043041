//! Client-side view of the backend's live state.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use wheelhouse_proto::{LogLine, ProcessSnapshot, StatusSnapshot};

const CHANGE_CHANNEL_CAPACITY: usize = 128;

/// What just changed, for consumers that re-render selectively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    Roster,
    Status,
    Logs { process_id: String },
}

/// Single source of truth for roster, status, and log buffers.
///
/// Reads clone out under a short lock; mutation is crate-private so
/// the message router stays the only writer. Contents survive
/// connection drops untouched and are only replaced by fresh frames.
pub struct ConsoleState {
    processes: RwLock<Vec<ProcessSnapshot>>,
    status: RwLock<Option<StatusSnapshot>>,
    logs: RwLock<HashMap<String, Vec<LogLine>>>,
    changes: broadcast::Sender<StateChange>,
}

impl ConsoleState {
    pub fn new() -> Arc<Self> {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Arc::new(Self {
            processes: RwLock::new(Vec::new()),
            status: RwLock::new(None),
            logs: RwLock::new(HashMap::new()),
            changes,
        })
    }

    pub fn processes(&self) -> Vec<ProcessSnapshot> {
        self.processes.read().clone()
    }

    /// `None` until the first `status` frame arrives.
    pub fn status(&self) -> Option<StatusSnapshot> {
        self.status.read().clone()
    }

    /// `None` means no log data was requested or received for this
    /// process yet, as opposed to an empty tail.
    pub fn logs(&self, process_id: &str) -> Option<Vec<LogLine>> {
        self.logs.read().get(process_id).cloned()
    }

    pub fn log_process_ids(&self) -> Vec<String> {
        self.logs.read().keys().cloned().collect()
    }

    /// Receiver of change notifications; dropping it unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    pub(crate) fn replace_processes(&self, roster: Vec<ProcessSnapshot>) {
        *self.processes.write() = roster;
        self.notify(StateChange::Roster);
    }

    pub(crate) fn replace_status(&self, snapshot: StatusSnapshot) {
        *self.status.write() = Some(snapshot);
        self.notify(StateChange::Status);
    }

    /// Wholesale replacement: the buffer is whatever the latest `logs`
    /// frame carried, never a client-side merge or append.
    pub(crate) fn replace_logs(&self, process_id: String, lines: Vec<LogLine>) {
        self.logs.write().insert(process_id.clone(), lines);
        self.notify(StateChange::Logs { process_id });
    }

    fn notify(&self, change: StateChange) {
        // Err just means nobody is subscribed right now.
        let _ = self.changes.send(change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wheelhouse_proto::LogStream;

    fn proc(id: &str, name: &str, running: bool) -> ProcessSnapshot {
        ProcessSnapshot {
            id: id.into(),
            name: name.into(),
            is_running: running,
            pid: None,
            restart_count: 0,
            started_at: None,
            last_restart_at: None,
            pid_file: None,
            log_file: None,
        }
    }

    fn line(text: &str) -> LogLine {
        LogLine {
            line: text.into(),
            stream: LogStream::Stdout,
            timestamp: None,
        }
    }

    #[test]
    fn roster_is_replaced_never_merged() {
        let state = ConsoleState::new();
        state.replace_processes(vec![proc("p1", "web", true), proc("p2", "worker", true)]);
        state.replace_processes(vec![proc("p3", "cron", false)]);

        let roster = state.processes();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].id, "p3");
    }

    #[test]
    fn status_is_none_until_first_frame() {
        let state = ConsoleState::new();
        assert!(state.status().is_none());
    }

    #[test]
    fn log_buffer_is_replaced_wholesale() {
        let state = ConsoleState::new();
        state.replace_logs("p1".into(), vec![line("a"), line("b")]);
        state.replace_logs("p1".into(), vec![line("c")]);

        let tail = state.logs("p1").expect("buffer");
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].line, "c");
        assert!(state.logs("p2").is_none());
    }

    #[test]
    fn mutations_notify_subscribers() {
        let state = ConsoleState::new();
        let mut rx = state.subscribe();

        state.replace_processes(vec![proc("p1", "web", true)]);
        state.replace_logs("p1".into(), vec![line("hello")]);

        assert_eq!(rx.try_recv().unwrap(), StateChange::Roster);
        assert_eq!(
            rx.try_recv().unwrap(),
            StateChange::Logs {
                process_id: "p1".into()
            }
        );
    }
}
