//! Proxy Log Viewer Core Library
//!
//! This crate provides log-line parsing, the bounded per-level log store,
//! search highlighting, and the live WebSocket log subscription used by the
//! viewer UI.

pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod search;
pub mod store;
pub mod subscription;
pub mod ws;

pub use config::ViewerConfig;
pub use error::{Error, Result};
pub use model::*;
pub use parser::parse_log_detail;
pub use search::{LogFilter, SearchMatcher};
pub use store::{LogStore, MAX_LOG_NUM};
pub use subscription::{
    AliveToken, FeedConnector, FeedEvent, FeedHandle, FeedSink, LiveLogs, LogHistory,
    SubscriptionState,
};
pub use ws::WsConnector;
