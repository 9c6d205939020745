//! Start-line summaries
//!
//! Pulls the method and path out of a request line, or the status code out of
//! a status line, for display and export. Only the first line of the captured
//! payload is looked at; headers and bodies are never parsed.

use serde::Serialize;

use crate::domain::EventKind;

const METHODS: [&str; 7] = ["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StartLine {
    Request { method: String, path: String },
    Response { status: u16 },
}

impl StartLine {
    /// Summarize the first line of `payload` according to `kind`
    ///
    /// Returns `None` when the line is truncated or does not look like a
    /// start line of that kind.
    pub fn parse(kind: EventKind, payload: &[u8]) -> Option<Self> {
        let line = first_line(payload);
        let mut fields = line.split_ascii_whitespace();
        let first = fields.next()?;
        let second = fields.next()?;

        match kind {
            EventKind::Request => {
                let method = first.to_ascii_uppercase();
                METHODS
                    .contains(&method.as_str())
                    .then(|| StartLine::Request { method, path: second.to_string() })
            }
            EventKind::Response => {
                if !first.starts_with("HTTP/") {
                    return None;
                }
                second.parse().ok().map(|status| StartLine::Response { status })
            }
        }
    }
}

impl std::fmt::Display for StartLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartLine::Request { method, path } => write!(f, "{method} {path}"),
            StartLine::Response { status } => write!(f, "{status}"),
        }
    }
}

fn first_line(payload: &[u8]) -> String {
    let end = payload.iter().position(|&b| b == b'\n').unwrap_or(payload.len());
    String::from_utf8_lossy(&payload[..end]).trim().to_string()
}
