//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

use crate::probes::DEFAULT_OBJECT_PATH;

#[derive(Parser, Debug)]
#[command(
    name = "httptap",
    about = "Capture plaintext HTTP request and response lines at the syscall boundary",
    after_help = "\
EXAMPLES:
    sudo httptap --headless                      Print every request and response
    sudo httptap --pid 1234 --headless           Only one process
    sudo httptap --export http.jsonl --duration 30

ENVIRONMENT:
    RUST_LOG=info                                Show attach and loop diagnostics"
)]
pub struct Args {
    /// Only report events from this process ID
    #[arg(short, long, env = "HTTPTAP_PID")]
    pub pid: Option<u32>,

    /// Write events as JSON lines to FILE
    #[arg(long, value_name = "FILE", env = "HTTPTAP_EXPORT")]
    pub export: Option<PathBuf>,

    /// Stop after N seconds (0 = unlimited)
    #[arg(long, default_value = "0", env = "HTTPTAP_DURATION")]
    pub duration: u64,

    /// Print each event to stdout
    #[arg(long)]
    pub headless: bool,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,

    /// Compiled eBPF object to load
    #[arg(long, value_name = "FILE", default_value = DEFAULT_OBJECT_PATH, env = "HTTPTAP_OBJECT")]
    pub object: PathBuf,
}

impl Args {
    /// Nothing would ever be shown or saved
    pub fn has_output(&self) -> bool {
        self.headless || self.export.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["httptap"]).unwrap();
        assert_eq!(args.pid, None);
        assert_eq!(args.duration, 0);
        assert!(!args.headless);
        assert!(!args.has_output());
        assert_eq!(args.object, PathBuf::from(DEFAULT_OBJECT_PATH));
    }

    #[test]
    fn test_flags() {
        let args = Args::try_parse_from([
            "httptap",
            "--pid",
            "42",
            "--export",
            "out.jsonl",
            "--duration",
            "5",
            "--quiet",
        ])
        .unwrap();
        assert_eq!(args.pid, Some(42));
        assert_eq!(args.export, Some(PathBuf::from("out.jsonl")));
        assert_eq!(args.duration, 5);
        assert!(args.quiet);
        assert!(args.has_output());
    }

    #[test]
    fn test_rejects_bad_pid() {
        let err = Args::try_parse_from(["httptap", "--pid", "abc"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
