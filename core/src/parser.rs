//! Extraction of structured connection details from core log lines
//!
//! The proxy core reports every routed connection as a single line:
//!
//! ```text
//! [TCP] 192.168.1.5:52311(chrome) --> www.example.com:443 match DomainSuffix(example.com) using Proxy
//! ```
//!
//! Lines of any other shape carry no detail and are shown as plain text.

use crate::ParsedDetail;
use regex::Regex;
use std::sync::OnceLock;

const CONNECTION_LINE: &str = r"^\s*\[(?P<conn_type>[^\]]+?)\]\s+(?P<source>\S+?)(?:\((?P<process_name>[^)]+?)\))?\s*?-->\s*?(?P<target>\S+?)\s+?match\s+?(?P<rule>\S+?)(?:\((?P<match_detail>[^)]+?)\))?\s+?using\s+?(?P<using>.+?)\s*$";

fn connection_line() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CONNECTION_LINE).ok()).as_ref()
}

/// Try to extract connection details from a log line.
///
/// Returns `None` when the line does not describe a routed connection.
pub fn parse_log_detail(line: &str) -> Option<ParsedDetail> {
    let caps = connection_line()?.captures(line)?;
    let field = |name: &str| caps.name(name).map(|m| m.as_str().to_string());

    let using = caps.name("using")?.as_str().trim();
    if using.is_empty() {
        return None;
    }

    Some(ParsedDetail {
        conn_type: field("conn_type")?,
        source: field("source")?,
        process_name: field("process_name"),
        target: field("target")?,
        rule: field("rule")?,
        match_detail: field("match_detail"),
        using: using.to_string(),
    })
}
