//! Pre-flight checks for httptap
//!
//! Validates system requirements before attempting to load eBPF programs.
//! Provides clear, actionable error messages when requirements aren't met.

#![allow(unsafe_code)] // geteuid() requires unsafe

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::probes::{PROBES, TRACEPOINT_CATEGORY};

/// Oldest kernel with `BPF_MAP_TYPE_RINGBUF`
const MIN_KERNEL_VERSION: (u32, u32) = (5, 8);

/// tracefs mount points, newest layout first
const TRACEFS_ROOTS: [&str; 2] = ["/sys/kernel/tracing", "/sys/kernel/debug/tracing"];

/// Run all pre-flight checks before eBPF loading
///
/// # Errors
/// Returns the first failed check, with a hint on how to fix it
pub fn run_preflight_checks(object_path: &Path) -> Result<()> {
    check_privileges()?;
    check_kernel_version()?;
    check_tracepoints()?;
    check_object_exists(object_path)?;
    Ok(())
}

/// Check if running with sufficient privileges for eBPF
fn check_privileges() -> Result<()> {
    if unsafe { libc::geteuid() } == 0 {
        return Ok(());
    }

    // CAP_BPF + CAP_PERFMON would also do, but checking them needs more
    // than libc gives us
    bail!(
        "Permission denied: httptap requires root privileges to load eBPF programs.\n\n\
         Run with: sudo httptap ..."
    );
}

/// Check if the kernel version is sufficient for the ring buffer map
fn check_kernel_version() -> Result<()> {
    let version_str = std::fs::read_to_string("/proc/version")
        .context("Failed to read kernel version from /proc/version")?;

    // "Linux version 6.1.0-arch1-1 ..."
    let release = version_str.split_whitespace().nth(2).unwrap_or("unknown");
    let Some(version) = parse_kernel_release(release) else {
        // Can't parse, assume it's fine
        return Ok(());
    };

    if version < MIN_KERNEL_VERSION {
        bail!(
            "Kernel version {}.{} is too old.\n\n\
             httptap requires Linux {}.{} or newer for eBPF ring buffer support.\n\
             Current kernel: {release}",
            version.0,
            version.1,
            MIN_KERNEL_VERSION.0,
            MIN_KERNEL_VERSION.1,
        );
    }

    Ok(())
}

/// `(major, minor)` from a release string like `5.15.0-generic`
fn parse_kernel_release(release: &str) -> Option<(u32, u32)> {
    let mut parts = release.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts
        .next()?
        .chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .ok()?;
    Some((major, minor))
}

/// Check that every tracepoint we attach to is exposed by tracefs
fn check_tracepoints() -> Result<()> {
    let Some(root) = tracefs_events_dir() else {
        // tracefs not mounted where we can see it; attach will report
        return Ok(());
    };

    let missing = missing_tracepoints(&root);
    if !missing.is_empty() {
        bail!(
            "Syscall tracepoints not available: {}\n\n\
             The kernel must be built with CONFIG_FTRACE_SYSCALLS.",
            missing.join(", ")
        );
    }
    Ok(())
}

fn tracefs_events_dir() -> Option<PathBuf> {
    TRACEFS_ROOTS
        .iter()
        .map(|root| Path::new(root).join("events").join(TRACEPOINT_CATEGORY))
        .find(|dir| dir.is_dir())
}

fn missing_tracepoints(events_dir: &Path) -> Vec<&'static str> {
    PROBES
        .iter()
        .map(|(_, tracepoint)| *tracepoint)
        .filter(|tracepoint| !events_dir.join(tracepoint).exists())
        .collect()
}

/// Check that the kernel object has been built
fn check_object_exists(object_path: &Path) -> Result<()> {
    if !object_path.is_file() {
        bail!(
            "eBPF object not found: {}\n\n\
             Build it with: cargo xtask build-ebpf",
            object_path.display()
        );
    }
    Ok(())
}

/// Check if the target process exists
///
/// # Errors
/// Returns an error if `/proc/<pid>` is missing
pub fn check_process_exists(pid: u32) -> Result<()> {
    let proc_path = format!("/proc/{pid}");
    if !Path::new(&proc_path).exists() {
        bail!(
            "Process {pid} not found.\n\n\
             Is the process still running? Check with: ps -p {pid}"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kernel_release() {
        assert_eq!(parse_kernel_release("5.15.0-generic"), Some((5, 15)));
        assert_eq!(parse_kernel_release("6.1.0-arch1-1"), Some((6, 1)));
        assert_eq!(parse_kernel_release("5.8"), Some((5, 8)));
        assert_eq!(parse_kernel_release("unknown"), None);
        assert!(parse_kernel_release("4.19.0").unwrap() < MIN_KERNEL_VERSION);
    }

    #[test]
    fn test_missing_tracepoints() {
        let dir = tempfile::tempdir().unwrap();
        for (_, tracepoint) in &PROBES[..5] {
            std::fs::create_dir(dir.path().join(tracepoint)).unwrap();
        }
        let missing = missing_tracepoints(dir.path());
        assert_eq!(missing, vec![PROBES[5].1, PROBES[6].1]);
    }

    #[test]
    fn test_object_not_found() {
        let result = check_object_exists(Path::new("/nonexistent/httptap.o"));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("eBPF object not found"));
        assert!(err.contains("xtask build-ebpf"));
    }

    #[test]
    fn test_process_not_found() {
        let result = check_process_exists(999_999_999);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[test]
    fn test_own_process_exists() {
        assert!(check_process_exists(std::process::id()).is_ok());
    }
}
