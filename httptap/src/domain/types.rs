//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers prevent mixing up a thread ID with a process ID or a
//! file descriptor, and make function signatures more expressive.

use httptap_common::{EVENT_REQUEST, EVENT_RESPONSE};
use serde::Serialize;
use std::fmt;

/// Process ID (TGID in Linux terms)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID:{}", self.0)
    }
}

impl From<i32> for Pid {
    #[allow(clippy::cast_sign_loss)]
    fn from(pid: i32) -> Self {
        Pid(pid as u32)
    }
}

/// Thread ID (PID in Linux terms, TID in userspace)
///
/// Key of the pending-read correlation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Tid(pub u32);

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TID:{}", self.0)
    }
}

/// cgroup v2 ID of the task that issued the syscall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct CgroupId(pub u64);

/// File descriptor argument of the observed syscall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Fd(pub i32);

impl fmt::Display for Fd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd={}", self.0)
    }
}

/// Timestamp in nanoseconds on the monotonic clock (since boot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Convert to seconds (f64)
    #[allow(clippy::cast_precision_loss)]
    pub fn as_seconds(self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}s", self.as_seconds())
    }
}

/// Who issued an observed syscall
///
/// Supplied by the attachment host for every probe invocation and stamped
/// onto each published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Origin {
    pub pid: Pid,
    pub tid: Tid,
    pub cgroup_id: CgroupId,
}

impl Origin {
    pub fn new(pid: u32, tid: u32, cgroup_id: u64) -> Self {
        Self { pid: Pid(pid), tid: Tid(tid), cgroup_id: CgroupId(cgroup_id) }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid={} tid={}", self.pid.0, self.tid.0)
    }
}

/// Direction of a captured HTTP message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Request,
    Response,
}

impl EventKind {
    /// Wire value of the `event_type` field
    pub fn wire_value(self) -> u8 {
        match self {
            EventKind::Request => EVENT_REQUEST,
            EventKind::Response => EVENT_RESPONSE,
        }
    }

    /// Parse the wire `event_type` field
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            EVENT_REQUEST => Some(EventKind::Request),
            EVENT_RESPONSE => Some(EventKind::Response),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Request => write!(f, "REQ"),
            EventKind::Response => write!(f, "RESP"),
        }
    }
}
