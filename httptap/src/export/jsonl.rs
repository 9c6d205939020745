//! JSON-lines event export
//!
//! One JSON object per captured event, written as events arrive so a capture
//! that is interrupted still leaves a usable file behind.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::domain::ExportError;
use crate::http_line::StartLine;
use crate::probes::CapturedEvent;

#[derive(Serialize)]
struct ExportRecord<'a> {
    #[serde(flatten)]
    event: &'a CapturedEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_line: Option<StartLine>,
}

/// Streams [`CapturedEvent`]s to any writer
///
/// ```
/// use httptap::export::JsonLinesExporter;
///
/// let mut buffer = Vec::new();
/// let exporter = JsonLinesExporter::new(&mut buffer);
/// assert_eq!(exporter.finish().unwrap(), 0);
/// ```
pub struct JsonLinesExporter<W: Write> {
    writer: W,
    event_count: u64,
}

impl JsonLinesExporter<BufWriter<File>> {
    /// Create (or truncate) `path` and export into it
    ///
    /// # Errors
    /// Returns an error if the file cannot be created
    pub fn create(path: &Path) -> Result<Self, ExportError> {
        let file = File::create(path)
            .map_err(|e| ExportError::WriteFailed(format!("{}: {e}", path.display())))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> JsonLinesExporter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, event_count: 0 }
    }

    /// Append one event as a single line
    ///
    /// # Errors
    /// Returns an error if serialization or the underlying write fails
    pub fn write_event(&mut self, event: &CapturedEvent) -> Result<(), ExportError> {
        let record = ExportRecord { event, start_line: event.start_line() };
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        self.event_count += 1;
        Ok(())
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Flush and return the number of events written
    ///
    /// # Errors
    /// Returns an error if the final flush fails
    pub fn finish(mut self) -> Result<u64, ExportError> {
        self.writer.flush()?;
        Ok(self.event_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventKind, Fd, Origin, Timestamp};

    fn event(kind: EventKind, payload: &[u8]) -> CapturedEvent {
        CapturedEvent {
            timestamp_ns: Timestamp(7),
            origin: Origin::new(10, 11, 12),
            fd: Fd(3),
            kind,
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn test_one_line_per_event() {
        let mut buffer = Vec::new();
        let mut exporter = JsonLinesExporter::new(&mut buffer);
        exporter.write_event(&event(EventKind::Request, b"GET /a HTTP/1.1\r\n")).unwrap();
        exporter.write_event(&event(EventKind::Response, b"HTTP/1.1 500 Oops\r\n")).unwrap();
        assert_eq!(exporter.finish().unwrap(), 2);

        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<serde_json::Value> =
            text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);

        assert_eq!(lines[0]["kind"], "request");
        assert_eq!(lines[0]["start_line"]["method"], "GET");
        assert_eq!(lines[0]["start_line"]["path"], "/a");
        assert_eq!(lines[0]["fd"], 3);
        assert_eq!(lines[0]["timestamp_ns"], 7);
        assert_eq!(lines[1]["start_line"]["status"], 500);
    }

    #[test]
    fn test_unparsed_start_line_is_omitted() {
        let mut buffer = Vec::new();
        let mut exporter = JsonLinesExporter::new(&mut buffer);
        exporter.write_event(&event(EventKind::Response, b"HTTP")).unwrap();
        exporter.finish().unwrap();

        let value: serde_json::Value = serde_json::from_slice(buffer.trim_ascii_end()).unwrap();
        assert!(value.get("start_line").is_none());
        assert_eq!(value["payload"], "HTTP");
    }
}
