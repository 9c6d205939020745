//! Structured error types for httptap
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! None of these are raised from inside a probe: capture-time failures are
//! silent drops. They cover loading, decoding and exporting.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Failed to load eBPF program: {0}")]
    EbpfLoadFailed(String),

    #[error("Program {0} not found in eBPF object")]
    ProgramNotFound(String),

    #[error("Map {0} not found in eBPF object")]
    MapNotFound(String),

    #[error("Failed to attach {program} to {category}/{tracepoint}: {error}")]
    AttachFailed { program: String, category: String, tracepoint: String, error: String },

    #[error(transparent)]
    Program(#[from] aya::programs::ProgramError),

    #[error(transparent)]
    Map(#[from] aya::maps::MapError),

    #[error(transparent)]
    Aya(#[from] aya::EbpfError),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Event record too short: {got} bytes, expected {expected}")]
    Truncated { got: usize, expected: usize },

    #[error("Unknown event type: {0}")]
    UnknownEventType(u8),

    #[error("Payload length {0} exceeds record capacity")]
    PayloadTooLong(u32),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write event file: {0}")]
    WriteFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
