//! # eBPF Kernel-Side Capture
//!
//! Tracepoint programs that classify HTTP traffic at the syscall boundary.
//!
//! ## Programs
//!
//! - **Write family** (single-shot on entry): `trace_write_entry`,
//!   `trace_sendto_entry`, `trace_writev_entry`
//! - **Read family** (entry records, exit classifies): `trace_read_entry` /
//!   `trace_read_exit`, `trace_recvfrom_entry` / `trace_recvfrom_exit`
//!
//! ## Maps (Shared with Userspace)
//!
//! - `EVENTS` - Ring buffer (16MB) of [`HttpEvent`] records
//! - `PENDING_READS` - Thread ID → in-flight read arguments (LRU)
//! - `STATS` - Per-CPU drop/submit counters
//!
//! Every failure path (unreadable buffer, short count, full ring, missing
//! correlation entry) returns without output. Nothing is retried or logged.
//!
//! ## Build
//!
//! Always compiled in release mode:
//! ```bash
//! cargo xtask build-ebpf
//! ```

#![no_std]
#![no_main]
#![allow(unused_unsafe)]

use aya_ebpf::{
    helpers::{
        bpf_get_current_cgroup_id, bpf_get_current_pid_tgid, bpf_ktime_get_ns,
        bpf_probe_read_user, bpf_probe_read_user_buf,
    },
    macros::{map, tracepoint},
    maps::{LruHashMap, PerCpuArray, RingBuf},
    programs::TracePointContext,
};
use httptap_common::{
    classify, HttpClass, HttpEvent, IoVec, PendingRead, EVENT_REQUEST, EVENT_RESPONSE, MAX_DATA,
    PENDING_CAPACITY, PREFIX_LEN, RING_BYTE_SIZE, STAT_COUNT, STAT_DISCARDED,
    STAT_DROPPED_NO_SPACE, STAT_PENDING_REFUSED, STAT_SUBMITTED,
};

// ============================================================================
// Tracepoint layouts
// ============================================================================

// /sys/kernel/tracing/events/syscalls/sys_enter_write/format
//
// 	field:int __syscall_nr;	offset:8;	size:4;	signed:1;
// 	field:unsigned int fd;	offset:16;	size:8;	signed:0;
// 	field:const char * buf;	offset:24;	size:8;	signed:0;
// 	field:size_t count;	offset:32;	size:8;	signed:0;
//
// Every sys_enter_* tracepoint lays its arguments out as consecutive 8-byte
// slots starting at offset 16.
const SYSCALL_ARGS_OFFSET: usize = 16;

// /sys/kernel/tracing/events/syscalls/sys_exit_read/format
//
// 	field:long ret;	offset:16;	size:8;	signed:1;
const SYSCALL_RETURN_OFFSET: usize = 16;

/// Bytes shorter than this cannot be classified
const MIN_CLASSIFY_LEN: u64 = PREFIX_LEN as u64;

// ============================================================================
// eBPF Maps
// ============================================================================

/// Ring buffer for sending events to userspace
///
/// - **Size**: 16MB
/// - **Usage**: probes `reserve()` a record, fill it, then `submit()` or
///   `discard()`; userspace drains with `ring_buf.next()`
/// - A full buffer makes `reserve()` fail and the event is lost
#[map]
static EVENTS: RingBuf = RingBuf::with_byte_size(RING_BYTE_SIZE, 0);

/// Map: Thread ID (TID) → in-flight `read`/`recvfrom` arguments
///
/// Inserted with `BPF_ANY` on entry (a newer call on the same thread replaces
/// the older one) and always removed on exit. When full, the kernel evicts the
/// least recently used entry, so a read whose exit never fires cannot pin a slot.
#[map]
static PENDING_READS: LruHashMap<u32, PendingRead> =
    LruHashMap::with_max_entries(PENDING_CAPACITY, 0);

/// Per-CPU counters, indexed by the `STAT_*` constants
#[map]
static STATS: PerCpuArray<u64> = PerCpuArray::with_max_entries(STAT_COUNT, 0);

// ============================================================================
// Helpers
// ============================================================================

#[inline(always)]
fn bump(index: u32) {
    if let Some(counter) = STATS.get_ptr_mut(index) {
        unsafe { *counter += 1 };
    }
}

#[inline(always)]
fn syscall_arg(ctx: &TracePointContext, n: usize) -> Option<u64> {
    unsafe { ctx.read_at::<u64>(SYSCALL_ARGS_OFFSET + n * 8).ok() }
}

#[inline(always)]
fn syscall_ret(ctx: &TracePointContext) -> Option<i64> {
    unsafe { ctx.read_at::<i64>(SYSCALL_RETURN_OFFSET).ok() }
}

#[inline(always)]
fn current_tid() -> u32 {
    unsafe { bpf_get_current_pid_tgid() as u32 }
}

/// Read and classify the first bytes of a user buffer
///
/// An unreadable buffer classifies as [`HttpClass::None`].
#[inline(always)]
fn classify_user(buf: u64) -> HttpClass {
    match unsafe { bpf_probe_read_user(buf as *const [u8; PREFIX_LEN]) } {
        Ok(prefix) => classify(&prefix),
        Err(_) => HttpClass::None,
    }
}

/// Reserve a record, copy up to `MAX_DATA - 1` bytes of `buf` into it and
/// publish it
#[inline(always)]
fn emit_event(buf: u64, count: u64, fd: i32, event_type: u8) {
    let len = if count > (MAX_DATA - 1) as u64 { MAX_DATA - 1 } else { count as usize };
    if len == 0 {
        return;
    }

    let Some(mut entry) = EVENTS.reserve::<HttpEvent>(0) else {
        bump(STAT_DROPPED_NO_SPACE);
        return;
    };

    let pid_tgid = unsafe { bpf_get_current_pid_tgid() };
    let event = entry.as_mut_ptr();

    unsafe {
        // Masking keeps the slice bound provable for the verifier.
        let len = len & (MAX_DATA - 1);
        if bpf_probe_read_user_buf(buf as *const u8, &mut (*event).data[..len]).is_err() {
            entry.discard(0);
            bump(STAT_DISCARDED);
            return;
        }
        (*event).data[len] = 0;

        (*event).ts_ns = bpf_ktime_get_ns();
        (*event).cgroup_id = bpf_get_current_cgroup_id();
        (*event).pid = (pid_tgid >> 32) as u32;
        (*event).tid = pid_tgid as u32;
        (*event).fd = fd;
        (*event).data_len = len as u32;
        (*event).event_type = event_type;
        (*event)._pad = [0u8; 3];
    }

    entry.submit(0);
    bump(STAT_SUBMITTED);
}

// ============================================================================
// Write family
// ============================================================================

/// Shared body of `write` and `sendto`: `(fd, buf, count, ...)`
///
/// Only outbound requests are reported on these paths.
#[inline(always)]
fn handle_send(ctx: &TracePointContext) -> Option<()> {
    let fd = syscall_arg(ctx, 0)? as i32;
    let buf = syscall_arg(ctx, 1)?;
    let count = syscall_arg(ctx, 2)?;

    if count < MIN_CLASSIFY_LEN {
        return None;
    }
    if classify_user(buf) != HttpClass::Request {
        return None;
    }

    emit_event(buf, count, fd, EVENT_REQUEST);
    Some(())
}

#[tracepoint]
pub fn trace_write_entry(ctx: TracePointContext) -> u32 {
    let _ = handle_send(&ctx);
    0
}

#[tracepoint]
pub fn trace_sendto_entry(ctx: TracePointContext) -> u32 {
    let _ = handle_send(&ctx);
    0
}

/// `writev(fd, iov, vlen)`: only the first segment is inspected, and both
/// requests and responses are reported
#[tracepoint]
pub fn trace_writev_entry(ctx: TracePointContext) -> u32 {
    let _ = try_writev(&ctx);
    0
}

#[inline(always)]
fn try_writev(ctx: &TracePointContext) -> Option<()> {
    let fd = syscall_arg(ctx, 0)? as i32;
    let iov_ptr = syscall_arg(ctx, 1)?;
    let vlen = syscall_arg(ctx, 2)?;

    if vlen == 0 {
        return None;
    }

    let iov = unsafe { bpf_probe_read_user(iov_ptr as *const IoVec).ok()? };
    if iov.iov_len < MIN_CLASSIFY_LEN {
        return None;
    }

    let event_type = classify_user(iov.iov_base).event_type()?;
    emit_event(iov.iov_base, iov.iov_len, fd, event_type);
    Some(())
}

// ============================================================================
// Read family
// ============================================================================

/// Shared entry body of `read` and `recvfrom`: remember `(fd, buf)`
#[inline(always)]
fn record_pending_read(ctx: &TracePointContext) -> Option<()> {
    let tid = current_tid();
    let pending = PendingRead::new(syscall_arg(ctx, 0)? as i32, syscall_arg(ctx, 1)?);

    if PENDING_READS.insert(&tid, &pending, 0).is_err() {
        bump(STAT_PENDING_REFUSED);
    }
    Some(())
}

/// Shared exit body of `read` and `recvfrom`
///
/// The pending entry is removed on every path once it has been found.
#[inline(always)]
fn complete_pending_read(ctx: &TracePointContext) {
    let tid = current_tid();

    let Some(pending) = (unsafe { PENDING_READS.get(&tid).copied() }) else {
        return;
    };

    let ret = syscall_ret(ctx).unwrap_or(-1);
    if ret >= MIN_CLASSIFY_LEN as i64 && classify_user(pending.buf) == HttpClass::Response {
        emit_event(pending.buf, ret as u64, pending.fd, EVENT_RESPONSE);
    }

    let _ = PENDING_READS.remove(&tid);
}

#[tracepoint]
pub fn trace_read_entry(ctx: TracePointContext) -> u32 {
    let _ = record_pending_read(&ctx);
    0
}

#[tracepoint]
pub fn trace_read_exit(ctx: TracePointContext) -> u32 {
    complete_pending_read(&ctx);
    0
}

#[tracepoint]
pub fn trace_recvfrom_entry(ctx: TracePointContext) -> u32 {
    let _ = record_pending_read(&ctx);
    0
}

#[tracepoint]
pub fn trace_recvfrom_exit(ctx: TracePointContext) -> u32 {
    complete_pending_read(&ctx);
    0
}

#[cfg(all(not(test), target_os = "none"))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}
