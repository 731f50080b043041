//! Real-time synchronization core for the wheelhouse fleet console.
//!
//! One persistent WebSocket carries the backend's live state into a
//! client-side store: the process roster, the status snapshot, and
//! per-process log tails. [`channel::ChannelManager`] owns the
//! connection and reconnects on drop, [`router::MessageRouter`] is the
//! single mutation point for [`state::ConsoleState`], and
//! [`logs::LogTailController`] issues outbound log-window requests.
//! Everything else the console does goes through the plain REST
//! wrappers in [`rest`].

pub mod channel;
pub mod logs;
pub mod rest;
pub mod router;
pub mod state;
pub mod telemetry;

pub use channel::{ChannelManager, ConnectionState};
pub use logs::LogTailController;
pub use rest::{ApiError, ConsoleApi};
pub use router::MessageRouter;
pub use state::{ConsoleState, StateChange};
