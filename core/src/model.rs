//! Domain model types for the Proxy Log Viewer

use crate::{parser, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamp format attached to every received entry (e.g. `03-14 09:26:53`)
pub const TIME_FORMAT: &str = "%m-%d %H:%M:%S";

/// Severity level a log view (and a subscription) is scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Warning,
    #[default]
    Info,
    Debug,
    Error,
    All,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Warning,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Error,
        LogLevel::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Warning => "warning",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Error => "error",
            LogLevel::All => "all",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LogLevel::Warning => "Warning",
            LogLevel::Info => "Info",
            LogLevel::Debug => "Debug",
            LogLevel::Error => "Error",
            LogLevel::All => "All",
        }
    }

    /// Level sent to the core. The core has no "all" level, so it is
    /// requested as its most verbose one.
    pub fn transport_level(&self) -> LogLevel {
        match self {
            LogLevel::All => LogLevel::Debug,
            other => *other,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "warning" => Ok(LogLevel::Warning),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "error" => Ok(LogLevel::Error),
            "all" => Ok(LogLevel::All),
            _ => Err(Error::InvalidLevel(s.to_string())),
        }
    }
}

/// A log message as sent by the core, over the socket or in a history batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: String,
}

impl LogRecord {
    pub fn new(kind: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: payload.into(),
        }
    }

    /// Decode one inbound socket message
    pub fn from_json(raw: &str) -> crate::Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::decode(format!("{}: {}", e, truncate(raw))))
    }
}

/// Structured fields extracted from a connection log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDetail {
    pub conn_type: String,
    pub source: String,
    pub process_name: Option<String>,
    pub target: String,
    #[serde(rename = "match")]
    pub rule: String,
    pub match_detail: Option<String>,
    pub using: String,
}

/// A received log entry, ready for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub time: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: String,
    pub detail: Option<ParsedDetail>,
}

impl LogEntry {
    /// Build an entry with an explicit timestamp
    pub fn from_record(record: LogRecord, time: impl Into<String>) -> Self {
        let detail = parser::parse_log_detail(&record.payload);
        Self {
            time: time.into(),
            kind: record.kind,
            payload: record.payload,
            detail,
        }
    }

    /// Build an entry stamped with the current local time
    pub fn received_now(record: LogRecord) -> Self {
        let time = chrono::Local::now().format(TIME_FORMAT).to_string();
        Self::from_record(record, time)
    }

    /// Lowercased severity label, for styling
    pub fn kind_key(&self) -> String {
        self.kind.to_lowercase()
    }
}

/// Address and secret of the running proxy core's controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConnectionInfo {
    pub server: String,
    pub secret: String,
}

impl ConnectionInfo {
    pub fn new(server: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            secret: secret.into(),
        }
    }

    /// WebSocket URL of the log stream for the given level
    pub fn logs_url(&self, level: LogLevel) -> String {
        format!(
            "ws://{}/logs?token={}&level={}",
            self.server,
            urlencoding::encode(&self.secret),
            level.transport_level()
        )
    }
}

fn truncate(raw: &str) -> &str {
    match raw.char_indices().nth(120) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}
