//! # Event Decoding
//!
//! Turns raw ring buffer records into owned [`CapturedEvent`]s. Records are
//! validated rather than trusted: a short record, an unknown event type or an
//! out-of-range payload length is rejected.

use httptap_common::{HttpEvent, MAX_DATA};
use serde::Serialize;

use crate::domain::{DecodeError, EventKind, Fd, Origin, Timestamp};
use crate::http_line::StartLine;

/// A decoded, owned HTTP event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapturedEvent {
    pub timestamp_ns: Timestamp,
    pub origin: Origin,
    pub fd: Fd,
    pub kind: EventKind,
    #[serde(serialize_with = "serialize_payload")]
    pub payload: Vec<u8>,
}

impl CapturedEvent {
    /// Method/path or status summary of the payload's first line
    pub fn start_line(&self) -> Option<StartLine> {
        StartLine::parse(self.kind, &self.payload)
    }
}

impl TryFrom<&HttpEvent> for CapturedEvent {
    type Error = DecodeError;

    fn try_from(event: &HttpEvent) -> Result<Self, Self::Error> {
        let kind = EventKind::from_wire(event.event_type)
            .ok_or(DecodeError::UnknownEventType(event.event_type))?;
        if event.data_len as usize > MAX_DATA - 1 {
            return Err(DecodeError::PayloadTooLong(event.data_len));
        }

        Ok(Self {
            timestamp_ns: Timestamp(event.ts_ns),
            origin: Origin::new(event.pid, event.tid, event.cgroup_id),
            fd: Fd(event.fd),
            kind,
            payload: event.payload().to_vec(),
        })
    }
}

/// Decode one raw record as read from the `EVENTS` ring buffer
///
/// # Errors
/// Returns [`DecodeError`] if the record is malformed
pub fn decode_event(bytes: &[u8]) -> Result<CapturedEvent, DecodeError> {
    let expected = std::mem::size_of::<HttpEvent>();
    if bytes.len() < expected {
        return Err(DecodeError::Truncated { got: bytes.len(), expected });
    }

    // SAFETY: the length was checked above and HttpEvent is a repr(C)
    // plain-old-data struct valid for any bit pattern.
    #[allow(unsafe_code)]
    let event = unsafe { std::ptr::read_unaligned(bytes.as_ptr().cast::<HttpEvent>()) };

    CapturedEvent::try_from(&event)
}

fn serialize_payload<S: serde::Serializer>(payload: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&String::from_utf8_lossy(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lay a record out field by field, the way the kernel writes it
    fn encode(event: &HttpEvent) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(std::mem::size_of::<HttpEvent>());
        bytes.extend_from_slice(&event.ts_ns.to_le_bytes());
        bytes.extend_from_slice(&event.cgroup_id.to_le_bytes());
        bytes.extend_from_slice(&event.pid.to_le_bytes());
        bytes.extend_from_slice(&event.tid.to_le_bytes());
        bytes.extend_from_slice(&event.fd.to_le_bytes());
        bytes.extend_from_slice(&event.data_len.to_le_bytes());
        bytes.push(event.event_type);
        bytes.extend_from_slice(&[0u8; 3]);
        bytes.extend_from_slice(&event.data);
        bytes.resize(std::mem::size_of::<HttpEvent>(), 0);
        bytes
    }

    fn response_event() -> HttpEvent {
        let payload = b"HTTP/1.1 200 OK\r\n";
        let mut event = HttpEvent::zeroed();
        event.ts_ns = 99;
        event.pid = 1;
        event.tid = 2;
        event.cgroup_id = 3;
        event.fd = 5;
        event.event_type = EventKind::Response.wire_value();
        event.data[..payload.len()].copy_from_slice(payload);
        event.data_len = payload.len() as u32;
        event
    }

    #[test]
    fn test_decode_valid_record() {
        let event = response_event();
        let decoded = decode_event(&encode(&event)).unwrap();

        assert_eq!(decoded.kind, EventKind::Response);
        assert_eq!(decoded.fd, Fd(5));
        assert_eq!(decoded.origin, Origin::new(1, 2, 3));
        assert_eq!(decoded.timestamp_ns, Timestamp(99));
        assert_eq!(decoded.payload, b"HTTP/1.1 200 OK\r\n");
        assert_eq!(decoded.start_line(), Some(StartLine::Response { status: 200 }));
    }

    #[test]
    fn test_decode_rejects_short_record() {
        let event = response_event();
        let bytes = encode(&event);
        assert!(matches!(decode_event(&bytes[..20]), Err(DecodeError::Truncated { got: 20, .. })));
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let mut event = response_event();
        event.event_type = 9;
        assert_eq!(decode_event(&encode(&event)), Err(DecodeError::UnknownEventType(9)));
    }

    #[test]
    fn test_decode_rejects_oversized_length() {
        let mut event = response_event();
        event.data_len = MAX_DATA as u32;
        assert_eq!(
            decode_event(&encode(&event)),
            Err(DecodeError::PayloadTooLong(MAX_DATA as u32))
        );
    }

    #[test]
    fn test_serialized_payload_is_text() {
        let decoded = CapturedEvent::try_from(&response_event()).unwrap();
        let json = serde_json::to_value(&decoded).unwrap();
        assert_eq!(json["kind"], "response");
        assert_eq!(json["payload"], "HTTP/1.1 200 OK\r\n");
        assert_eq!(json["origin"]["pid"], 1);
    }
}
