//! # Event Emitter
//!
//! Turns a classified buffer into a published [`HttpEvent`]:
//!
//! 1. Clamp the length to `MAX_DATA - 1`; an empty payload emits nothing
//! 2. Reserve a ring slot; a saturated ring drops the event
//! 3. Copy the payload out of user memory; a fault discards the reservation
//! 4. Stamp timestamp, origin, descriptor and kind, then submit
//!
//! A consumer therefore sees either a complete record or nothing at all.

use std::sync::Arc;

use httptap_common::MAX_DATA;

use super::clock::Clock;
use super::memory::UserMemory;
use super::ring::EventRing;
use super::stats::CaptureStats;
use crate::domain::{EventKind, Fd, Origin};

/// What happened to a publish attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The record is in the ring
    Submitted,
    /// Zero-length payload, nothing reserved
    Empty,
    /// No free slot in the ring
    DroppedNoSpace,
    /// The payload became unreadable after the slot was reserved
    Discarded,
}

pub struct EventEmitter<C> {
    ring: Arc<EventRing>,
    clock: C,
    stats: Arc<CaptureStats>,
}

impl<C: Clock> EventEmitter<C> {
    pub fn new(ring: Arc<EventRing>, clock: C, stats: Arc<CaptureStats>) -> Self {
        Self { ring, clock, stats }
    }

    /// Publish up to `MAX_DATA - 1` bytes starting at `src`
    #[allow(clippy::cast_possible_truncation)]
    pub fn publish<M: UserMemory>(
        &self,
        memory: &M,
        kind: EventKind,
        origin: &Origin,
        fd: Fd,
        src: u64,
        len: u64,
    ) -> PublishOutcome {
        let emit_len = len.min((MAX_DATA - 1) as u64) as usize;
        if emit_len == 0 {
            return PublishOutcome::Empty;
        }

        let Some(mut slot) = self.ring.reserve() else {
            self.stats.record_dropped_no_space();
            return PublishOutcome::DroppedNoSpace;
        };

        let record = slot.record_mut();
        if memory.read_user(src, &mut record.data[..emit_len]).is_err() {
            slot.discard();
            self.stats.record_discarded();
            return PublishOutcome::Discarded;
        }
        record.data[emit_len] = 0;

        record.ts_ns = self.clock.now_ns();
        record.cgroup_id = origin.cgroup_id.0;
        record.pid = origin.pid.0;
        record.tid = origin.tid.0;
        record.fd = fd.0;
        record.data_len = emit_len as u32;
        record.event_type = kind.wire_value();

        slot.submit();
        self.stats.record_submitted();
        PublishOutcome::Submitted
    }

    pub fn ring(&self) -> &Arc<EventRing> {
        &self.ring
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::memory::RegionMemory;

    struct FixedClock(u64);

    impl Clock for FixedClock {
        fn now_ns(&self) -> u64 {
            self.0
        }
    }

    fn emitter(slots: usize) -> EventEmitter<FixedClock> {
        EventEmitter::new(
            Arc::new(EventRing::with_slots(slots)),
            FixedClock(777),
            Arc::new(CaptureStats::default()),
        )
    }

    #[test]
    fn test_round_trip_short_payload() {
        let payload = b"GET /health HTTP/1.1\r\n";
        let mut mem = RegionMemory::new();
        mem.map(0x4000, payload.to_vec());
        let emitter = emitter(4);
        let origin = Origin::new(10, 11, 12);

        let outcome = emitter.publish(
            &mem,
            EventKind::Request,
            &origin,
            Fd(3),
            0x4000,
            payload.len() as u64,
        );
        assert_eq!(outcome, PublishOutcome::Submitted);

        let event = emitter.ring().pop().unwrap();
        assert_eq!(event.data_len as usize, payload.len());
        assert_eq!(event.payload(), payload);
        assert_eq!(event.data[payload.len()], 0);
        assert_eq!((event.pid, event.tid, event.cgroup_id), (10, 11, 12));
        assert_eq!(event.fd, 3);
        assert_eq!(event.ts_ns, 777);
        assert_eq!(event.event_type, EventKind::Request.wire_value());
    }

    #[test]
    fn test_truncates_to_capacity() {
        let payload = vec![b'x'; 300];
        let mut mem = RegionMemory::new();
        mem.map(0x4000, payload.clone());
        let emitter = emitter(4);

        let outcome = emitter.publish(
            &mem,
            EventKind::Response,
            &Origin::new(1, 1, 0),
            Fd(4),
            0x4000,
            300,
        );
        assert_eq!(outcome, PublishOutcome::Submitted);

        let event = emitter.ring().pop().unwrap();
        assert_eq!(event.data_len as usize, MAX_DATA - 1);
        assert_eq!(event.payload(), &payload[..MAX_DATA - 1]);
        assert_eq!(event.data[MAX_DATA - 1], 0);
    }

    #[test]
    fn test_empty_payload_reserves_nothing() {
        let emitter = emitter(1);
        let outcome = emitter.publish(
            &RegionMemory::new(),
            EventKind::Request,
            &Origin::new(1, 1, 0),
            Fd(1),
            0x4000,
            0,
        );
        assert_eq!(outcome, PublishOutcome::Empty);
        assert_eq!(emitter.ring().free_slots(), 1);
    }

    #[test]
    fn test_copy_fault_discards_reservation() {
        let emitter = emitter(1);
        let outcome = emitter.publish(
            &RegionMemory::new(),
            EventKind::Request,
            &Origin::new(1, 1, 0),
            Fd(1),
            0xdead_0000,
            64,
        );
        assert_eq!(outcome, PublishOutcome::Discarded);
        assert!(emitter.ring().is_empty());
        assert_eq!(emitter.ring().free_slots(), 1);
        assert_eq!(emitter.stats.snapshot().discarded, 1);
    }

    #[test]
    fn test_full_ring_drops() {
        let mut mem = RegionMemory::new();
        mem.map(0x4000, b"HTTP/1.1 204 No Content\r\n".to_vec());
        let emitter = emitter(1);
        let origin = Origin::new(1, 1, 0);

        let first = emitter.publish(&mem, EventKind::Response, &origin, Fd(1), 0x4000, 25);
        let second = emitter.publish(&mem, EventKind::Response, &origin, Fd(1), 0x4000, 25);

        assert_eq!(first, PublishOutcome::Submitted);
        assert_eq!(second, PublishOutcome::DroppedNoSpace);
        assert_eq!(emitter.ring().len(), 1);
        assert_eq!(emitter.stats.snapshot().dropped_no_space, 1);
    }
}
