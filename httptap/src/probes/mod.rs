//! Kernel probe plumbing
//!
//! - eBPF program loading and tracepoint attachment
//! - Ring buffer record decoding
//! - Event processing (filter, display, export)
//! - Drop diagnostics from the kernel `STATS` map

pub mod diagnostics;
pub mod ebpf_setup;
pub mod event_display;
pub mod event_processor;
pub mod event_reader;

pub use diagnostics::{print_capture_diagnostics, read_kernel_stats};
pub use ebpf_setup::{
    attach_syscall_probes, load_ebpf_program, DEFAULT_OBJECT_PATH, PROBES, TRACEPOINT_CATEGORY,
};
pub use event_display::{
    display_event, display_progress, display_statistics, format_event, EventCounts,
};
pub use event_processor::EventProcessor;
pub use event_reader::{decode_event, CapturedEvent};
