//! # Event Processing
//!
//! Consumes raw records from the `EVENTS` ring buffer and routes them.
//!
//! ## Pipeline
//!
//! 1. Decode; malformed records are counted and skipped
//! 2. Apply the optional process filter
//! 3. Count by kind
//! 4. **Headless**: print to stdout
//! 5. **Export**: append to the JSON-lines file
//!
//! Filtering happens here rather than in the kernel, so the probes stay
//! identical for every invocation.

use std::io::Write;

use log::warn;

use super::event_display::{display_event, EventCounts};
use super::event_reader::{decode_event, CapturedEvent};
use crate::domain::{EventKind, ExportError, Pid};
use crate::export::JsonLinesExporter;

/// Encapsulates event processing logic and state
pub struct EventProcessor<W: Write> {
    headless: bool,
    pid_filter: Option<Pid>,

    pub counts: EventCounts,

    exporter: Option<JsonLinesExporter<W>>,
}

impl<W: Write> EventProcessor<W> {
    #[must_use]
    pub fn new(
        headless: bool,
        pid_filter: Option<Pid>,
        exporter: Option<JsonLinesExporter<W>>,
    ) -> Self {
        Self { headless, pid_filter, counts: EventCounts::default(), exporter }
    }

    /// Decode and process one raw ring buffer record
    ///
    /// # Errors
    /// Returns an error only if the exporter fails; malformed records are
    /// counted and skipped
    pub fn process_bytes(&mut self, bytes: &[u8]) -> Result<(), ExportError> {
        match decode_event(bytes) {
            Ok(event) => self.process_event(&event),
            Err(e) => {
                self.counts.decode_errors += 1;
                warn!("Skipping malformed event: {e}");
                Ok(())
            }
        }
    }

    /// Process a single decoded event
    ///
    /// # Errors
    /// Returns an error if the exporter fails to write the event
    pub fn process_event(&mut self, event: &CapturedEvent) -> Result<(), ExportError> {
        if self.pid_filter.is_some_and(|pid| pid != event.origin.pid) {
            self.counts.filtered += 1;
            return Ok(());
        }

        match event.kind {
            EventKind::Request => self.counts.requests += 1,
            EventKind::Response => self.counts.responses += 1,
        }

        if self.headless {
            display_event(event);
        }

        if let Some(ref mut exporter) = self.exporter {
            exporter.write_event(event)?;
        }
        Ok(())
    }

    /// Events that passed the filter
    pub fn accepted(&self) -> u64 {
        self.counts.requests + self.counts.responses
    }

    /// Take the exporter (for the final flush)
    pub fn take_exporter(&mut self) -> Option<JsonLinesExporter<W>> {
        self.exporter.take()
    }
}
