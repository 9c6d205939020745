//! Host-agnostic capture engine
//!
//! The same state machine as the kernel tracepoint programs, behind the
//! [`SyscallObserver`] interface so any attachment technology can drive it:
//! - Prefix classification (shared with the kernel via `httptap_common`)
//! - Pending-read correlation table
//! - Bounded event ring with reserve/submit/discard
//! - Per-syscall probe dispatch
//!
//! User-memory access and the clock are injected.

pub mod clock;
pub mod dispatch;
pub mod emitter;
pub mod memory;
pub mod observer;
pub mod pending;
pub mod ring;
pub mod stats;

pub use clock::{Clock, MonotonicClock};
pub use dispatch::ProbeDispatch;
pub use emitter::{EventEmitter, PublishOutcome};
pub use memory::{MemoryFault, ProcessMemory, RegionMemory, UserMemory};
pub use observer::{Family, Syscall, SyscallArgs, SyscallObserver};
pub use pending::PendingTable;
pub use ring::{EventRing, Reservation};
pub use stats::{CaptureStats, StatsSnapshot};
