//! # httptap - eBPF-based plaintext HTTP capture
//!
//! httptap observes the data-transfer syscalls of every process on the host
//! and reports the first bytes of anything that looks like an HTTP/1.x
//! request or response, without touching the applications involved.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Any process on the host                      │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ write / writev / sendto / read / recvfrom
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     eBPF Programs (Kernel)                      │
//! │  • sys_enter_{write,writev,sendto}: classify, emit requests     │
//! │  • sys_enter_{read,recvfrom}: remember (fd, buf) per thread     │
//! │  • sys_exit_{read,recvfrom}: classify filled buffer, emit resp  │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ EVENTS ring buffer (fixed 168-byte records)
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       httptap (This Crate)                      │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │   Probes     │──▶│    Event     │──▶│   Export     │         │
//! │  │  (loader)    │   │  Processor   │   │  (JSON lines)│         │
//! │  └──────────────┘   └──────────────┘   └──────────────┘         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`capture`]: The probe logic as a host-agnostic engine. Drives the
//!   same classifier, pending-read correlation and bounded ring as the
//!   kernel programs, behind a [`capture::SyscallObserver`] interface with
//!   injected user-memory access and clock.
//!
//! - [`probes`]: Kernel side plumbing
//!   - `ebpf_setup`: Load the object and attach the `syscalls` tracepoints
//!   - `event_reader`: Validate and decode ring buffer records
//!   - `event_processor`: Filter, print and export decoded events
//!   - `diagnostics`: Drop counters from the kernel `STATS` map
//!
//! - [`http_line`]: Method/path or status summary of a captured start line
//!
//! - [`export`]: JSON-lines event files
//!
//! - [`preflight`]: Privilege, kernel and tracefs checks
//!
//! - [`cli`]: Command-line argument parsing and configuration
//!
//! - [`domain`]: Core domain types (Pid, Tid, Fd, Origin) and errors
//!
//! ## What Is Captured
//!
//! Only the first 127 bytes (`MAX_DATA - 1`) of each matching transfer. A
//! buffer is classified by its first four bytes; `write` and `sendto`
//! report requests, `read` and `recvfrom` report responses, and `writev`
//! (first segment only) reports either. TLS, HTTP/2 and
//! reassembly across calls are out of reach by construction.
//!
//! ## Typical Usage
//!
//! ```bash
//! # Build the kernel object once
//! cargo xtask build-ebpf
//!
//! # Print every request and response on the host
//! sudo ./httptap --headless
//!
//! # Record one process for a minute
//! sudo ./httptap --pid <PID> --export http.jsonl --duration 60
//! ```

pub mod capture;
pub mod cli;
pub mod domain;
pub mod export;
pub mod http_line;
pub mod preflight;
pub mod probes;
