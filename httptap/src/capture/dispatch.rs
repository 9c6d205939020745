//! # Syscall Probe Dispatch
//!
//! The per-syscall state machines that drive the classifier, the pending-read
//! table and the emitter.
//!
//! ## Write family (`write`, `writev`, `sendto`), on entry
//!
//! 1. Resolve `(fd, buf, count)`; `writev` uses only the first `iovec`
//! 2. `count < PREFIX_LEN` → nothing
//! 3. Read the prefix; a fault → nothing
//! 4. Classify and check [`Syscall::accepts`]
//! 5. Publish `count` bytes (truncated by the emitter)
//!
//! ## Read family (`read`, `recvfrom`)
//!
//! - Entry stores `(fd, buf)` under the thread ID, replacing any older entry
//! - Exit looks the entry up (missing → nothing), classifies the first `ret`
//!   bytes if `ret >= PREFIX_LEN`, publishes responses, and always deletes
//!   the entry
//!
//! Tasks whose address space the [`UserMemory`] backend cannot read are
//! skipped on both hooks.
//!
//! Every failure is a silent, bounded no-op. The only visible effect of a
//! failure is a missing event (and a counter in [`CaptureStats`]).

use std::sync::Arc;

use httptap_common::{classify, HttpClass, IoVec, PendingRead, PENDING_CAPACITY, PREFIX_LEN};

use super::clock::Clock;
use super::emitter::{EventEmitter, PublishOutcome};
use super::memory::UserMemory;
use super::observer::{Family, Syscall, SyscallArgs, SyscallObserver};
use super::pending::PendingTable;
use super::ring::EventRing;
use super::stats::CaptureStats;
use crate::domain::{EventKind, Fd, Origin};

const MIN_CLASSIFY_LEN: u64 = PREFIX_LEN as u64;

pub struct ProbeDispatch<M, C> {
    memory: M,
    pending: PendingTable,
    emitter: EventEmitter<C>,
    stats: Arc<CaptureStats>,
}

impl<M: UserMemory, C: Clock> ProbeDispatch<M, C> {
    /// Dispatcher publishing into `ring`, with the default pending-read budget
    pub fn new(memory: M, clock: C, ring: Arc<EventRing>) -> Self {
        Self::with_pending_capacity(memory, clock, ring, PENDING_CAPACITY as usize)
    }

    pub fn with_pending_capacity(
        memory: M,
        clock: C,
        ring: Arc<EventRing>,
        pending_capacity: usize,
    ) -> Self {
        let stats = Arc::new(CaptureStats::default());
        Self {
            memory,
            pending: PendingTable::with_capacity(pending_capacity),
            emitter: EventEmitter::new(ring, clock, Arc::clone(&stats)),
            stats,
        }
    }

    /// Entry hook; returns the publish outcome for write-family calls that
    /// reached the emitter
    pub fn handle_entry(
        &self,
        task: &Origin,
        syscall: Syscall,
        args: &SyscallArgs,
    ) -> Option<PublishOutcome> {
        if !self.memory.covers(task.pid) {
            return None;
        }
        match syscall.family() {
            Family::Write => self.handle_send(task, syscall, args),
            Family::Read => {
                let entry = PendingRead::new(args.fd(), args.get(1));
                if !self.pending.put(task.tid, entry) {
                    self.stats.record_pending_refused();
                }
                None
            }
        }
    }

    /// Exit hook; returns the publish outcome for read-family calls that
    /// reached the emitter
    pub fn handle_exit(&self, task: &Origin, syscall: Syscall, ret: i64) -> Option<PublishOutcome> {
        if syscall.family() != Family::Read || !self.memory.covers(task.pid) {
            return None;
        }

        let Some(entry) = self.pending.get(task.tid) else {
            self.stats.record_correlation_miss();
            return None;
        };

        let outcome = self.complete_read(task, syscall, entry, ret);
        self.pending.delete(task.tid);
        outcome
    }

    #[allow(clippy::cast_sign_loss)]
    fn complete_read(
        &self,
        task: &Origin,
        syscall: Syscall,
        entry: PendingRead,
        ret: i64,
    ) -> Option<PublishOutcome> {
        if ret < MIN_CLASSIFY_LEN as i64 {
            return None;
        }
        let kind = self.classify_at(syscall, entry.buf)?;
        Some(self.emitter.publish(&self.memory, kind, task, Fd(entry.fd), entry.buf, ret as u64))
    }

    fn handle_send(
        &self,
        task: &Origin,
        syscall: Syscall,
        args: &SyscallArgs,
    ) -> Option<PublishOutcome> {
        let (buf, count) = match syscall {
            Syscall::Writev => self.first_segment(args)?,
            _ => (args.get(1), args.get(2)),
        };

        if count < MIN_CLASSIFY_LEN {
            return None;
        }
        let kind = self.classify_at(syscall, buf)?;
        Some(self.emitter.publish(&self.memory, kind, task, Fd(args.fd()), buf, count))
    }

    /// `(iov_base, iov_len)` of the first element of a `writev` vector
    fn first_segment(&self, args: &SyscallArgs) -> Option<(u64, u64)> {
        let (iov_ptr, vlen) = (args.get(1), args.get(2));
        if vlen == 0 {
            return None;
        }

        let mut raw = [0u8; std::mem::size_of::<IoVec>()];
        self.memory.read_user(iov_ptr, &mut raw).ok()?;
        let (base, len) = raw.split_at(8);
        Some((u64::from_ne_bytes(base.try_into().ok()?), u64::from_ne_bytes(len.try_into().ok()?)))
    }

    /// Read the prefix at `buf` and map it to an event kind this syscall
    /// reports
    fn classify_at(&self, syscall: Syscall, buf: u64) -> Option<EventKind> {
        let mut prefix = [0u8; PREFIX_LEN];
        self.memory.read_user(buf, &mut prefix).ok()?;

        let class = classify(&prefix);
        if !syscall.accepts(class) {
            return None;
        }
        match class {
            HttpClass::Request => Some(EventKind::Request),
            HttpClass::Response => Some(EventKind::Response),
            HttpClass::None => None,
        }
    }

    pub fn pending(&self) -> &PendingTable {
        &self.pending
    }

    pub fn ring(&self) -> &Arc<EventRing> {
        self.emitter.ring()
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }
}

impl<M: UserMemory, C: Clock> SyscallObserver for ProbeDispatch<M, C> {
    fn on_entry(&self, task: &Origin, syscall: Syscall, args: &SyscallArgs) {
        let _ = self.handle_entry(task, syscall, args);
    }

    fn on_exit(&self, task: &Origin, syscall: Syscall, ret: i64) {
        let _ = self.handle_exit(task, syscall, ret);
    }
}
