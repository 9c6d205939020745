//! Event export
//!
//! Captured events are written as JSON lines, one object per event, for
//! loading into `jq` or any log pipeline.

pub mod jsonl;

pub use jsonl::JsonLinesExporter;
