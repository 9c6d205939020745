//! # Shared Data Structures (eBPF ↔ Userspace)
//!
//! Defines the wire record, correlation entry, classifier and budget constants
//! shared between the kernel-side tracepoint programs and userspace. All
//! shared types use `#[repr(C)]` for a consistent layout across the
//! kernel/userspace boundary.
//!
//! ## Key Types
//!
//! - [`HttpEvent`] - Fixed-size record passed through the `EVENTS` ring buffer
//! - [`PendingRead`] - Entry-time arguments of an in-flight `read`/`recvfrom`
//! - [`IoVec`] - Layout of a userspace `struct iovec` (first `writev` segment)
//! - [`HttpClass`] - Result of the prefix classifier
//!
//! The classifier ([`classify`]) is a fixed set of literal comparisons with no
//! loops, so the same function is accepted by the BPF verifier and used by the
//! host-agnostic capture engine.

#![cfg_attr(not(test), no_std)]

// ============================================================================
// Budgets
// ============================================================================

/// Payload capacity of an [`HttpEvent`], including the NUL terminator.
///
/// At most `MAX_DATA - 1` payload bytes are captured per event.
pub const MAX_DATA: usize = 128;

/// Number of bytes read from a user buffer to classify it.
pub const PREFIX_LEN: usize = 4;

/// Maximum number of in-flight reads tracked at once (one per thread).
pub const PENDING_CAPACITY: u32 = 65_535;

/// Size of the kernel `EVENTS` ring buffer in bytes (16 MiB).
pub const RING_BYTE_SIZE: u32 = 1 << 24;

// ============================================================================
// Event Type Constants
// ============================================================================

/// Outbound HTTP request start line (`GET `, `POST`, ...)
pub const EVENT_REQUEST: u8 = 1;

/// HTTP response status line (`HTTP/1.1 200 OK`)
pub const EVENT_RESPONSE: u8 = 2;

// ============================================================================
// Diagnostic counters (indices into the per-CPU `STATS` array)
// ============================================================================

/// Events successfully submitted to the ring buffer
pub const STAT_SUBMITTED: u32 = 0;

/// Events lost because the ring buffer had no free slot
pub const STAT_DROPPED_NO_SPACE: u32 = 1;

/// Reservations discarded because the payload copy failed
pub const STAT_DISCARDED: u32 = 2;

/// Read entries the correlation table failed to store
pub const STAT_PENDING_REFUSED: u32 = 3;

/// Number of counters in the `STATS` array
pub const STAT_COUNT: u32 = 4;

// ============================================================================
// Shared Data Structures
// ============================================================================

/// Event sent from the capture probes to userspace
///
/// One record is produced per syscall whose buffer matched the classifier.
///
/// **Memory Layout**: `#[repr(C)]`, little-endian as produced by the host.
/// Fields in order: timestamp, cgroup, pid, tid, fd, payload length, event
/// type, 3 bytes padding, payload.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct HttpEvent {
    /// Monotonic timestamp in nanoseconds (`bpf_ktime_get_ns()`)
    pub ts_ns: u64,

    /// cgroup v2 id of the calling task
    pub cgroup_id: u64,

    /// Process ID (TGID in Linux terms)
    pub pid: u32,

    /// Thread ID (PID in Linux terms)
    pub tid: u32,

    /// File descriptor the syscall operated on
    pub fd: i32,

    /// Number of valid bytes in `data`, always `<= MAX_DATA - 1`
    pub data_len: u32,

    /// [`EVENT_REQUEST`] or [`EVENT_RESPONSE`]
    pub event_type: u8,

    /// Padding for 4-byte alignment of `data`
    #[allow(clippy::pub_underscore_fields)]
    pub _pad: [u8; 3],

    /// Payload prefix, NUL-terminated at `data_len`
    pub data: [u8; MAX_DATA],
}

impl HttpEvent {
    /// An all-zero record, used as the starting point of a reservation
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            ts_ns: 0,
            cgroup_id: 0,
            pid: 0,
            tid: 0,
            fd: 0,
            data_len: 0,
            event_type: 0,
            _pad: [0; 3],
            data: [0; MAX_DATA],
        }
    }

    /// Captured payload bytes (without the NUL terminator)
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        let len = (self.data_len as usize).min(MAX_DATA - 1);
        &self.data[..len]
    }
}

/// Entry-time arguments of a `read`/`recvfrom` call, keyed by thread ID
///
/// Written by the entry probe, consumed and deleted by the exit probe.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PendingRead {
    /// Userspace address of the destination buffer
    pub buf: u64,

    /// File descriptor being read
    pub fd: i32,

    /// Padding for 8-byte alignment
    #[allow(clippy::pub_underscore_fields)]
    pub _pad: u32,
}

impl PendingRead {
    #[must_use]
    pub const fn new(fd: i32, buf: u64) -> Self {
        Self { buf, fd, _pad: 0 }
    }
}

/// Userspace `struct iovec` on 64-bit targets
///
/// Only the first element of a `writev` vector is ever read.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IoVec {
    pub iov_base: u64,
    pub iov_len: u64,
}

// ============================================================================
// Protocol Classifier
// ============================================================================

/// Result of classifying a buffer prefix
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpClass {
    None = 0,
    Request = EVENT_REQUEST,
    Response = EVENT_RESPONSE,
}

impl HttpClass {
    /// Wire event type for a positive classification
    #[must_use]
    pub const fn event_type(self) -> Option<u8> {
        match self {
            HttpClass::None => None,
            HttpClass::Request => Some(EVENT_REQUEST),
            HttpClass::Response => Some(EVENT_RESPONSE),
        }
    }
}

/// Classify the first [`PREFIX_LEN`] bytes of a buffer
///
/// Request tokens are `GET `, `POST`, `PUT `, `DELE`, `PATC`, `HEAD` and
/// `OPTI`; `HTTP` is a response. Non-HTTP traffic that happens to share one of
/// these prefixes is reported as HTTP.
#[inline(always)]
#[must_use]
pub fn classify(prefix: &[u8; PREFIX_LEN]) -> HttpClass {
    match prefix {
        b"GET " | b"POST" | b"PUT " | b"DELE" | b"PATC" | b"HEAD" | b"OPTI" => HttpClass::Request,
        b"HTTP" => HttpClass::Response,
        _ => HttpClass::None,
    }
}

/// Classify an arbitrary slice, returning [`HttpClass::None`] when fewer than
/// [`PREFIX_LEN`] bytes are available
#[must_use]
pub fn classify_bytes(buf: &[u8]) -> HttpClass {
    match buf.first_chunk::<PREFIX_LEN>() {
        Some(prefix) => classify(prefix),
        None => HttpClass::None,
    }
}

#[cfg(feature = "user")]
use aya::Pod;

// Plain-old-data so userspace can read these straight out of BPF maps.
#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for HttpEvent {}

#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for PendingRead {}
