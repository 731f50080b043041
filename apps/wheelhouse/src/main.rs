//! Headless fleet console: connects to the backend, mirrors live
//! state, and streams updates until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use url::Url;
use wheelhouse_proto::{LogStream, LogWindow};

use wheelhouse_core::{
    telemetry, ChannelManager, ConnectionState, ConsoleApi, ConsoleState, LogTailController,
    MessageRouter, StateChange,
};

#[derive(Debug, Parser)]
#[command(name = "wheelhouse", version, about = "Operator console for a running server fleet")]
struct Args {
    /// WebSocket endpoint of the fleet backend.
    #[arg(long, env = "WHEELHOUSE_ENDPOINT", default_value = "ws://127.0.0.1:9400/ws")]
    endpoint: Url,

    /// Base URL of the backend's REST API, for the session check and
    /// the out-of-band console endpoints.
    #[arg(long, env = "WHEELHOUSE_API_BASE")]
    api_base: Option<String>,

    /// Bearer token for the REST API.
    #[arg(long, env = "WHEELHOUSE_API_TOKEN")]
    api_token: Option<String>,

    /// Delay between reconnect attempts, in milliseconds.
    #[arg(long, env = "WHEELHOUSE_RECONNECT_DELAY_MS", default_value_t = 3000)]
    reconnect_delay_ms: u64,

    /// Tail logs for this process id.
    #[arg(long)]
    follow: Option<String>,

    /// Log window to request: a line count or "all".
    #[arg(long, default_value = "200")]
    lines: LogWindow,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    telemetry::init()?;

    let state = ConsoleState::new();
    let router = MessageRouter::new(state.clone());
    let channel = Arc::new(ChannelManager::new(
        args.endpoint.clone(),
        Duration::from_millis(args.reconnect_delay_ms),
        router,
    ));
    let tail = LogTailController::new(channel.clone());

    if let Some(base) = &args.api_base {
        let mut api = ConsoleApi::new(base.clone());
        if let Some(token) = &args.api_token {
            api = api.with_token(token.clone());
        }
        match api.session_check::<serde_json::Value>().await {
            Ok(session) => info!(session = %session, "backend session ok"),
            Err(err) => warn!(error = %err, "session check failed, live sync continues"),
        }
    }

    let mut changes = state.subscribe();
    let mut connectivity = channel.watch_state();
    channel.open();

    info!(endpoint = %args.endpoint, "wheelhouse console starting");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = connectivity.changed() => {
                if changed.is_err() {
                    break;
                }
                match *connectivity.borrow_and_update() {
                    ConnectionState::Open => {
                        info!("backend link up");
                        // Requests sent while the link was down were
                        // dropped, so re-issue the log intent.
                        if tail.intent().is_some() {
                            tail.refresh();
                        } else if let Some(id) = &args.follow {
                            tail.request(id.clone(), args.lines);
                        }
                    }
                    ConnectionState::Connecting => {}
                    ConnectionState::Closed => warn!("backend link down"),
                }
            }
            change = changes.recv() => match change {
                Ok(StateChange::Roster) => {
                    let roster = state.processes();
                    let running = roster.iter().filter(|p| p.is_running).count();
                    info!(total = roster.len(), running, "process roster updated");
                }
                Ok(StateChange::Status) => {
                    if let Some(status) = state.status() {
                        info!(
                            http_port = status.http_port,
                            routes = status.route_count,
                            uptime_s = status.uptime_seconds,
                            rss_bytes = status.memory.rss_bytes,
                            "status updated"
                        );
                    }
                }
                Ok(StateChange::Logs { process_id }) => {
                    if args.follow.as_deref() == Some(process_id.as_str()) {
                        if let Some(tail_lines) = state.logs(&process_id) {
                            for entry in &tail_lines {
                                let tag = match entry.stream {
                                    LogStream::Stdout => "out",
                                    LogStream::Stderr => "err",
                                };
                                println!("[{process_id}:{tag}] {}", entry.line);
                            }
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "change feed lagged, state reads stay consistent");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    channel.teardown();
    info!("wheelhouse console stopped");
    Ok(())
}
