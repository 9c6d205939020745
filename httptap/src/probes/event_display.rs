use std::io::Write;

use super::event_reader::CapturedEvent;

/// One-line headless rendering of an event
///
/// `[REQ] 12.345678s pid=1 tid=2 fd=5 GET /api`, falling back to the
/// escaped payload when the start line cannot be summarized.
pub fn format_event(event: &CapturedEvent) -> String {
    let summary = event.start_line().map_or_else(
        || String::from_utf8_lossy(&event.payload).escape_debug().to_string(),
        |line| line.to_string(),
    );
    format!("[{}] {} {} {} {summary}", event.kind, event.timestamp_ns, event.origin, event.fd)
}

pub fn display_event(event: &CapturedEvent) {
    println!("{}", format_event(event));
}

/// Counters kept by the consumer
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EventCounts {
    pub requests: u64,
    pub responses: u64,
    pub filtered: u64,
    pub decode_errors: u64,
}

pub fn display_statistics(counts: &EventCounts) {
    eprintln!(
        "stats: requests={} responses={} filtered={} decode_errors={}",
        counts.requests, counts.responses, counts.filtered, counts.decode_errors
    );
}

/// Display progress for a bounded capture
pub fn display_progress(elapsed_secs: u64, duration: u64, events: u64) {
    print!("\r   Progress: {elapsed_secs}s / {duration}s ({events} events)   ");
    std::io::stdout().flush().ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventKind, Fd, Origin, Timestamp};

    fn event(kind: EventKind, payload: &[u8]) -> CapturedEvent {
        CapturedEvent {
            timestamp_ns: Timestamp(1_500_000_000),
            origin: Origin::new(42, 43, 7),
            fd: Fd(5),
            kind,
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn test_format_request() {
        let line = format_event(&event(EventKind::Request, b"GET /health HTTP/1.1\r\n"));
        assert_eq!(line, "[REQ] 1.500000s pid=42 tid=43 fd=5 GET /health");
    }

    #[test]
    fn test_format_unparsed_payload_is_escaped() {
        let line = format_event(&event(EventKind::Response, b"HTTP"));
        assert!(line.starts_with("[RESP] "));
        assert!(line.ends_with("fd=5 HTTP"));

        let line = format_event(&event(EventKind::Request, b"GET\r\n"));
        assert!(line.ends_with("GET\\r\\n"));
    }
}
