//! # Bounded Event Ring
//!
//! Fixed number of record slots shared by any number of producers and
//! drained by a consumer. Producers follow the same protocol as a BPF ring
//! buffer:
//!
//! 1. [`EventRing::reserve`] claims a slot, or fails immediately when every
//!    slot is taken (the event is dropped, never waited for).
//! 2. The record is filled in the [`Reservation`], invisible to consumers.
//! 3. [`Reservation::submit`] publishes the whole record at once, or
//!    [`Reservation::discard`] (or dropping the reservation) gives the slot
//!    back with nothing published.
//!
//! Slot accounting is a single atomic counter covering both outstanding
//! reservations and queued records, so a submit always finds room in the
//! underlying lock-free queue.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_queue::ArrayQueue;
use httptap_common::HttpEvent;

pub struct EventRing {
    queue: ArrayQueue<HttpEvent>,
    /// Reserved + queued slots
    used: AtomicUsize,
}

impl EventRing {
    /// Create a ring with `slots` record slots (at least one)
    pub fn with_slots(slots: usize) -> Self {
        let slots = slots.max(1);
        Self { queue: ArrayQueue::new(slots), used: AtomicUsize::new(0) }
    }

    /// Claim a slot for one record
    ///
    /// Returns `None` when the ring is saturated.
    pub fn reserve(&self) -> Option<Reservation<'_>> {
        let capacity = self.capacity();
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                (used < capacity).then_some(used + 1)
            })
            .ok()?;
        Some(Reservation { ring: self, record: HttpEvent::zeroed(), done: false })
    }

    /// Take the oldest published record
    pub fn pop(&self) -> Option<HttpEvent> {
        let record = self.queue.pop()?;
        self.release();
        Some(record)
    }

    /// Take every record published so far
    pub fn drain(&self) -> Vec<HttpEvent> {
        std::iter::from_fn(|| self.pop()).collect()
    }

    /// Number of published records waiting to be consumed
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Slots neither reserved nor holding a record
    pub fn free_slots(&self) -> usize {
        self.capacity().saturating_sub(self.used.load(Ordering::Acquire))
    }

    fn release(&self) {
        self.used.fetch_sub(1, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for EventRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRing")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("free_slots", &self.free_slots())
            .finish()
    }
}

/// A claimed, not yet published slot
///
/// Dropping it without calling [`submit`](Reservation::submit) discards it.
pub struct Reservation<'a> {
    ring: &'a EventRing,
    record: HttpEvent,
    done: bool,
}

impl Reservation<'_> {
    /// The record being built
    pub fn record_mut(&mut self) -> &mut HttpEvent {
        &mut self.record
    }

    /// Publish the record
    pub fn submit(mut self) {
        self.done = true;
        if self.ring.queue.push(self.record).is_err() {
            // Unreachable while slot accounting holds; never leak the slot.
            self.ring.release();
        }
    }

    /// Give the slot back without publishing anything
    pub fn discard(mut self) {
        self.done = true;
        self.ring.release();
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.ring.release();
        }
    }
}
