//! Wire protocol for the wheelhouse console ↔ fleet backend channel.
//! Keeping this in a dedicated crate allows regeneration of bindings
//! for TypeScript/Go/etc. without pulling in heavier runtime code.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use time::OffsetDateTime;

/// Frames the backend pushes over the duplex channel.
///
/// Every data-bearing frame carries the originating timestamp. A frame
/// whose `type` tag is not recognized decodes to [`ServerFrame::Unknown`]
/// so newer backends stay compatible with older consoles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Processes {
        data: Vec<ProcessSnapshot>,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    Status {
        data: StatusSnapshot,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    Logs {
        data: LogsPayload,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    Error {
        #[serde(default)]
        data: serde_json::Value,
        #[serde(default, with = "time::serde::rfc3339::option")]
        timestamp: Option<OffsetDateTime>,
    },
    Pong {
        #[serde(default, with = "time::serde::rfc3339::option")]
        timestamp: Option<OffsetDateTime>,
    },
    #[serde(other)]
    Unknown,
}

/// Frames the console sends to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    RequestLogs {
        #[serde(rename = "processId")]
        process_id: String,
        lines: LogWindow,
    },
    Ping,
}

/// One supervised process as reported by the backend. Full-snapshot
/// semantics: a `processes` frame always carries the whole roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSnapshot {
    pub id: String,
    pub name: String,
    pub is_running: bool,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub restart_count: u32,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_restart_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub pid_file: Option<String>,
    #[serde(default)]
    pub log_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub http_port: u16,
    #[serde(default)]
    pub https_port: Option<u16>,
    pub route_count: u32,
    pub uptime_seconds: u64,
    pub memory: MemoryUsage,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub rss_bytes: u64,
    pub heap_used_bytes: u64,
    pub heap_total_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsPayload {
    pub process_id: String,
    pub logs: Vec<LogLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogLine {
    pub line: String,
    pub stream: LogStream,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// Requested tail size for a `request_logs` frame: a bounded line
/// count, or the entire available history. On the wire this is either
/// a JSON number or the string `"all"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogWindow {
    Lines(u32),
    All,
}

impl Serialize for LogWindow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LogWindow::Lines(n) => serializer.serialize_u32(*n),
            LogWindow::All => serializer.serialize_str("all"),
        }
    }
}

impl<'de> Deserialize<'de> for LogWindow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct WindowVisitor;

        impl<'de> Visitor<'de> for WindowVisitor {
            type Value = LogWindow;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a positive line count or the string \"all\"")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<LogWindow, E> {
                let lines = u32::try_from(value)
                    .map_err(|_| E::custom(format!("line count {value} out of range")))?;
                Ok(LogWindow::Lines(lines))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<LogWindow, E> {
                let lines = u32::try_from(value)
                    .map_err(|_| E::custom(format!("line count {value} out of range")))?;
                Ok(LogWindow::Lines(lines))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<LogWindow, E> {
                if value == "all" {
                    Ok(LogWindow::All)
                } else {
                    Err(E::custom(format!("unknown log window {value:?}")))
                }
            }
        }

        deserializer.deserialize_any(WindowVisitor)
    }
}

impl fmt::Display for LogWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogWindow::Lines(n) => write!(f, "{n}"),
            LogWindow::All => f.write_str("all"),
        }
    }
}

impl FromStr for LogWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(LogWindow::All);
        }
        s.parse::<u32>()
            .map(LogWindow::Lines)
            .map_err(|_| format!("expected a line count or \"all\", got {s:?}"))
    }
}

/// Inbound payload that could not be mapped onto [`ServerFrame`].
/// Distinct from an unknown `type` tag, which is forward-compatible
/// and decodes to [`ServerFrame::Unknown`].
#[derive(Debug, Error)]
#[error("malformed frame: {0}")]
pub struct FrameDecodeError(#[from] serde_json::Error);

pub fn decode_server_frame(text: &str) -> Result<ServerFrame, FrameDecodeError> {
    Ok(serde_json::from_str(text)?)
}

/// Encoding is total over the outbound variants; the `Result` only
/// propagates allocation-level serializer failures.
pub fn encode_client_frame(frame: &ClientFrame) -> serde_json::Result<String> {
    serde_json::to_string(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_processes_frame() {
        let text = json!({
            "type": "processes",
            "data": [{
                "id": "p1",
                "name": "web",
                "isRunning": true,
                "pid": 4242,
                "restartCount": 3,
                "pidFile": "/run/web.pid"
            }],
            "timestamp": "2026-08-29T10:15:00Z"
        })
        .to_string();

        match decode_server_frame(&text).expect("decode") {
            ServerFrame::Processes { data, .. } => {
                assert_eq!(data.len(), 1);
                assert_eq!(data[0].id, "p1");
                assert!(data[0].is_running);
                assert_eq!(data[0].pid, Some(4242));
                assert_eq!(data[0].restart_count, 3);
                assert_eq!(data[0].started_at, None);
            }
            other => panic!("expected processes frame, got {other:?}"),
        }
    }

    #[test]
    fn decodes_logs_frame() {
        let text = json!({
            "type": "logs",
            "data": {
                "processId": "p1",
                "logs": [
                    { "line": "listening on :8080", "stream": "stdout" },
                    { "line": "EADDRINUSE", "stream": "stderr",
                      "timestamp": "2026-08-29T10:15:01Z" }
                ]
            },
            "timestamp": "2026-08-29T10:15:02Z"
        })
        .to_string();

        match decode_server_frame(&text).expect("decode") {
            ServerFrame::Logs { data, .. } => {
                assert_eq!(data.process_id, "p1");
                assert_eq!(data.logs.len(), 2);
                assert_eq!(data.logs[0].stream, LogStream::Stdout);
                assert_eq!(data.logs[1].stream, LogStream::Stderr);
                assert!(data.logs[1].timestamp.is_some());
            }
            other => panic!("expected logs frame, got {other:?}"),
        }
    }

    #[test]
    fn unknown_discriminant_is_tolerated() {
        let text = json!({ "type": "metrics_v2", "data": { "nonsense": [1, 2] } }).to_string();
        assert!(matches!(
            decode_server_frame(&text).expect("decode"),
            ServerFrame::Unknown
        ));
    }

    #[test]
    fn malformed_payload_is_a_typed_error() {
        // Right tag, wrong payload shape.
        let text = json!({
            "type": "status",
            "data": "not-an-object",
            "timestamp": "2026-08-29T10:15:00Z"
        })
        .to_string();
        assert!(decode_server_frame(&text).is_err());
        assert!(decode_server_frame("{{{ not json").is_err());
    }

    #[test]
    fn pong_without_timestamp_decodes() {
        let frame = decode_server_frame(r#"{"type":"pong"}"#).expect("decode");
        assert!(matches!(frame, ServerFrame::Pong { timestamp: None }));
    }

    #[test]
    fn encodes_request_logs_with_numeric_window() {
        let frame = ClientFrame::RequestLogs {
            process_id: "p1".into(),
            lines: LogWindow::Lines(100),
        };
        let value: serde_json::Value =
            serde_json::from_str(&encode_client_frame(&frame).expect("encode")).expect("json");
        assert_eq!(
            value,
            json!({ "type": "request_logs", "processId": "p1", "lines": 100 })
        );
    }

    #[test]
    fn encodes_request_logs_with_all_window() {
        let frame = ClientFrame::RequestLogs {
            process_id: "p1".into(),
            lines: LogWindow::All,
        };
        let value: serde_json::Value =
            serde_json::from_str(&encode_client_frame(&frame).expect("encode")).expect("json");
        assert_eq!(value["lines"], json!("all"));
    }

    #[test]
    fn encodes_ping() {
        let encoded = encode_client_frame(&ClientFrame::Ping).expect("encode");
        assert_eq!(encoded, r#"{"type":"ping"}"#);
    }

    #[test]
    fn log_window_round_trips_and_parses() {
        assert_eq!("all".parse::<LogWindow>(), Ok(LogWindow::All));
        assert_eq!("250".parse::<LogWindow>(), Ok(LogWindow::Lines(250)));
        assert!("some".parse::<LogWindow>().is_err());

        let reparsed: LogWindow = serde_json::from_str("\"all\"").expect("all");
        assert_eq!(reparsed, LogWindow::All);
        let reparsed: LogWindow = serde_json::from_str("42").expect("count");
        assert_eq!(reparsed, LogWindow::Lines(42));
        assert!(serde_json::from_str::<LogWindow>("-3").is_err());
    }
}
