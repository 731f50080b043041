//! Owns the single duplex connection to the fleet backend.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;
use wheelhouse_proto::{decode_server_frame, encode_client_frame, ClientFrame};

use crate::router::MessageRouter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
}

impl ConnectionState {
    pub fn is_open(self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

/// Sole owner of the transport handle.
///
/// [`open`](Self::open) spawns one supervisor task that dials the
/// endpoint, pumps frames for the connection's lifetime, and sleeps a
/// fixed delay before redialing after every close. Only the supervisor
/// issues connects, and only after the previous connection reached
/// Closed, so at most one Connecting/Open connection exists at a time.
/// [`teardown`](Self::teardown) aborts the supervisor, which cancels a
/// pending reconnect sleep along with any in-flight dial.
pub struct ChannelManager {
    url: Url,
    reconnect_delay: Duration,
    router: Arc<MessageRouter>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    outbound: Arc<RwLock<Option<mpsc::UnboundedSender<ClientFrame>>>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelManager {
    pub fn new(url: Url, reconnect_delay: Duration, router: MessageRouter) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Closed);
        Self {
            url,
            reconnect_delay,
            router: Arc::new(router),
            state_tx: Arc::new(state_tx),
            outbound: Arc::new(RwLock::new(None)),
            supervisor: Mutex::new(None),
        }
    }

    /// Start (or restart after a teardown) the supervisor task.
    /// A no-op while a supervisor is already running.
    pub fn open(&self) {
        let mut slot = self.supervisor.lock();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!(target: "channel", "open ignored, supervisor already running");
            return;
        }
        let url = self.url.clone();
        let delay = self.reconnect_delay;
        let router = self.router.clone();
        let state_tx = self.state_tx.clone();
        let outbound = self.outbound.clone();
        *slot = Some(tokio::spawn(supervise(
            url, delay, router, state_tx, outbound,
        )));
    }

    /// Fire-and-forget, at-most-once: when the channel is not open the
    /// frame is dropped with a warning and the caller sees no error.
    /// The connectivity watch is the signal for callers that care.
    pub fn send(&self, frame: ClientFrame) {
        let guard = self.outbound.read();
        match guard.as_ref() {
            Some(tx) => {
                if tx.send(frame).is_err() {
                    warn!(target: "channel", "outbound frame dropped, link going down");
                }
            }
            None => {
                warn!(target: "channel", "outbound frame dropped, channel not open");
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.subscribe().borrow()
    }

    /// Connectivity indicator for consumers; flips on every transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Close the live connection and cancel any scheduled reconnect.
    pub fn teardown(&self) {
        if let Some(handle) = self.supervisor.lock().take() {
            handle.abort();
        }
        *self.outbound.write() = None;
        self.state_tx.send_replace(ConnectionState::Closed);
        info!(target: "channel", "channel torn down");
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        if let Some(handle) = self.supervisor.lock().take() {
            handle.abort();
        }
    }
}

async fn supervise(
    url: Url,
    reconnect_delay: Duration,
    router: Arc<MessageRouter>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    outbound: Arc<RwLock<Option<mpsc::UnboundedSender<ClientFrame>>>>,
) {
    loop {
        // send_replace: transitions must be recorded even while no
        // watch receiver is alive, `state()` subscribes after the fact.
        state_tx.send_replace(ConnectionState::Connecting);
        match connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                info!(target: "channel", url = %url, "channel open");
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                *outbound.write() = Some(outbound_tx);
                state_tx.send_replace(ConnectionState::Open);

                run_connection(stream, outbound_rx, &router).await;

                *outbound.write() = None;
                state_tx.send_replace(ConnectionState::Closed);
                warn!(
                    target: "channel",
                    delay_ms = reconnect_delay.as_millis() as u64,
                    "channel closed, reconnect scheduled"
                );
            }
            Err(err) => {
                state_tx.send_replace(ConnectionState::Closed);
                warn!(
                    target: "channel",
                    error = %err,
                    delay_ms = reconnect_delay.as_millis() as u64,
                    "connect failed, reconnect scheduled"
                );
            }
        }
        tokio::time::sleep(reconnect_delay).await;
    }
}

/// Pump one connection until it drops. Inbound frames are applied in
/// arrival order from this single task, which is what serializes all
/// state mutations without locking on the hot path.
async fn run_connection(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut outbound_rx: mpsc::UnboundedReceiver<ClientFrame>,
    router: &MessageRouter,
) {
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => match frame {
                Some(frame) => match encode_client_frame(&frame) {
                    Ok(json) => {
                        if sink.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(target: "channel", error = %err, "failed to encode outbound frame");
                    }
                },
                // Sender slot was cleared; connection is going away.
                None => break,
            },
            message = source.next() => match message {
                Some(Ok(Message::Text(text))) => match decode_server_frame(&text) {
                    Ok(frame) => router.apply(frame),
                    Err(err) => {
                        warn!(target: "channel", error = %err, "dropping malformed inbound frame");
                    }
                },
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // This protocol is JSON text; tungstenite answers pings itself.
                Some(Ok(_)) => {}
            },
        }
    }
}
