//! # eBPF Program Loading and Attachment
//!
//! Loads the compiled kernel object and attaches each program to its
//! `syscalls` tracepoint.
//!
//! ## Attachment Points
//!
//! | program                | tracepoint                   |
//! |------------------------|------------------------------|
//! | `trace_write_entry`    | `syscalls/sys_enter_write`   |
//! | `trace_sendto_entry`   | `syscalls/sys_enter_sendto`  |
//! | `trace_writev_entry`   | `syscalls/sys_enter_writev`  |
//! | `trace_read_entry`     | `syscalls/sys_enter_read`    |
//! | `trace_read_exit`      | `syscalls/sys_exit_read`     |
//! | `trace_recvfrom_entry` | `syscalls/sys_enter_recvfrom`|
//! | `trace_recvfrom_exit`  | `syscalls/sys_exit_recvfrom` |

use std::path::Path;

use aya::{programs::TracePoint, Ebpf};
use log::info;

use crate::domain::ProbeError;

pub const TRACEPOINT_CATEGORY: &str = "syscalls";

/// Where `cargo xtask build-ebpf` leaves the kernel object
pub const DEFAULT_OBJECT_PATH: &str = "target/bpfel-unknown-none/release/httptap";

/// `(program, tracepoint)` pairs, in attachment order
///
/// Read-family exits are attached before their entries so a pending entry
/// never outlives a missing exit program.
pub const PROBES: [(&str, &str); 7] = [
    ("trace_read_exit", "sys_exit_read"),
    ("trace_recvfrom_exit", "sys_exit_recvfrom"),
    ("trace_read_entry", "sys_enter_read"),
    ("trace_recvfrom_entry", "sys_enter_recvfrom"),
    ("trace_write_entry", "sys_enter_write"),
    ("trace_sendto_entry", "sys_enter_sendto"),
    ("trace_writev_entry", "sys_enter_writev"),
];

/// Load the eBPF program object from `path`
///
/// Must be the release build: debug builds pull in formatting code the
/// verifier rejects.
///
/// # Errors
/// Returns an error if the object cannot be read, parsed or its maps created
pub fn load_ebpf_program(path: &Path) -> Result<Ebpf, ProbeError> {
    Ebpf::load_file(path)
        .map_err(|e| ProbeError::EbpfLoadFailed(format!("{}: {e}", path.display())))
}

/// Load and attach every program in [`PROBES`]
///
/// Returns the number of attached programs.
///
/// # Errors
/// Returns an error on the first program that is missing, fails the
/// verifier, or cannot be attached
pub fn attach_syscall_probes(bpf: &mut Ebpf) -> Result<usize, ProbeError> {
    for (program_name, tracepoint) in PROBES {
        attach_tracepoint(bpf, program_name, tracepoint)?;
        info!("✓ Attached tracepoint: {TRACEPOINT_CATEGORY}/{tracepoint}");
    }
    Ok(PROBES.len())
}

fn attach_tracepoint(
    bpf: &mut Ebpf,
    program_name: &str,
    tracepoint: &str,
) -> Result<(), ProbeError> {
    let program: &mut TracePoint = bpf
        .program_mut(program_name)
        .ok_or_else(|| ProbeError::ProgramNotFound(program_name.to_string()))?
        .try_into()?;
    program.load()?;
    program.attach(TRACEPOINT_CATEGORY, tracepoint).map_err(|e| ProbeError::AttachFailed {
        program: program_name.to_string(),
        category: TRACEPOINT_CATEGORY.to_string(),
        tracepoint: tracepoint.to_string(),
        error: e.to_string(),
    })?;
    Ok(())
}
