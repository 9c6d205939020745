//! Syscall interception interface
//!
//! The attachment technology (tracepoints, ptrace, library interposition,
//! replay) is whatever drives a [`SyscallObserver`]. It must call
//! `on_entry`/`on_exit` synchronously on the thread that made the syscall,
//! with entry always before the matching exit.

use std::fmt;

use httptap_common::HttpClass;

use crate::domain::Origin;

/// Raw syscall argument registers, in ABI order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyscallArgs(pub [u64; 6]);

impl SyscallArgs {
    /// Build from the leading arguments; the rest are zero
    pub fn new(leading: &[u64]) -> Self {
        let mut args = [0u64; 6];
        let n = leading.len().min(6);
        args[..n].copy_from_slice(&leading[..n]);
        Self(args)
    }

    pub fn get(&self, n: usize) -> u64 {
        self.0.get(n).copied().unwrap_or(0)
    }

    /// First argument as a file descriptor
    #[allow(clippy::cast_possible_truncation)]
    pub fn fd(&self) -> i32 {
        self.0[0] as i32
    }
}

/// The observed syscalls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Syscall {
    Write,
    Writev,
    Sendto,
    Read,
    Recvfrom,
}

/// How a syscall is correlated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// Buffer is complete at entry, classified immediately
    Write,
    /// Buffer is filled by the kernel, classified at exit
    Read,
}

impl Syscall {
    pub const ALL: [Syscall; 5] =
        [Syscall::Write, Syscall::Writev, Syscall::Sendto, Syscall::Read, Syscall::Recvfrom];

    pub fn name(self) -> &'static str {
        match self {
            Syscall::Write => "write",
            Syscall::Writev => "writev",
            Syscall::Sendto => "sendto",
            Syscall::Read => "read",
            Syscall::Recvfrom => "recvfrom",
        }
    }

    /// Accepts `write`, `sys_enter_write` and `sys_exit_write` forms
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name
            .strip_prefix("sys_enter_")
            .or_else(|| name.strip_prefix("sys_exit_"))
            .unwrap_or(name);
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    pub fn family(self) -> Family {
        match self {
            Syscall::Write | Syscall::Writev | Syscall::Sendto => Family::Write,
            Syscall::Read | Syscall::Recvfrom => Family::Read,
        }
    }

    /// Whether a classification on this syscall produces an event
    ///
    /// `write` and `sendto` only report requests. `writev` also reports
    /// responses, since servers commonly send status line and headers that
    /// way. The read family only reports responses.
    pub fn accepts(self, class: HttpClass) -> bool {
        matches!(
            (self, class),
            (Syscall::Write | Syscall::Sendto, HttpClass::Request)
                | (Syscall::Writev, HttpClass::Request | HttpClass::Response)
                | (Syscall::Read | Syscall::Recvfrom, HttpClass::Response)
        )
    }
}

impl fmt::Display for Syscall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hooks invoked around each observed syscall
pub trait SyscallObserver {
    /// The syscall is about to run with `args`
    fn on_entry(&self, task: &Origin, syscall: Syscall, args: &SyscallArgs);

    /// The syscall returned `ret` (bytes transferred, or a negative errno)
    fn on_exit(&self, task: &Origin, syscall: Syscall, ret: i64);
}
