//! # httptap - Main Entry Point
//!
//! Loads the kernel programs, attaches them to the syscall tracepoints and
//! drains the `EVENTS` ring buffer until Ctrl+C, the duration limit, or the
//! filtered process exits.

#![allow(clippy::too_many_lines)]

use anyhow::{Context, Result};
use aya::maps::RingBuf;
use clap::Parser;
use log::{info, warn};
use std::time::{Duration, Instant};

use httptap::cli::Args;
use httptap::domain::Pid;
use httptap::export::JsonLinesExporter;
use httptap::preflight::{check_process_exists, run_preflight_checks};
use httptap::probes::{
    attach_syscall_probes, display_progress, display_statistics, load_ebpf_program,
    print_capture_diagnostics, read_kernel_stats, EventProcessor,
};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_NOPERM: i32 = 77;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const STATUS_INTERVAL: Duration = Duration::from_secs(10);

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = format!("{err:#}").to_lowercase();
    if msg.contains("permission denied") || msg.contains("requires root") {
        EXIT_NOPERM
    } else if msg.contains("invalid argument combination") {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

#[tokio::main]
async fn run() -> Result<()> {
    let args = Args::parse();
    let quiet = args.quiet;

    if quiet && !args.has_output() {
        anyhow::bail!(
            "Invalid argument combination: --quiet without --headless or --export shows nothing.\n\n\
             Add --headless to print events or --export FILE to save them"
        );
    }

    run_preflight_checks(&args.object)?;
    if let Some(pid) = args.pid {
        check_process_exists(pid)?;
    }

    if !quiet {
        println!("httptap v{}", env!("CARGO_PKG_VERSION"));
        match args.pid {
            Some(pid) => println!("pid: {pid}"),
            None => println!("pid: all"),
        }
    }

    let mut bpf = load_ebpf_program(&args.object).context("Failed to load eBPF object")?;
    let attached = attach_syscall_probes(&mut bpf).context("Failed to attach tracepoints")?;
    info!("Attached {attached} syscall tracepoints");

    let mut ring_buf =
        RingBuf::try_from(bpf.take_map("EVENTS").context("EVENTS map not found")?)?;

    let exporter = args.export.as_deref().map(JsonLinesExporter::create).transpose()?;
    if !quiet {
        if let Some(ref export_path) = args.export {
            println!("export: {}", export_path.display());
        }
        if !args.has_output() {
            println!("counting only (use --headless or --export to see events)");
        }
    }

    let mut processor = EventProcessor::new(args.headless, args.pid.map(Pid), exporter);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let capture_start = Instant::now();
    let duration_limit =
        if args.duration > 0 { Some(Duration::from_secs(args.duration)) } else { None };
    let proc_path = args.pid.map(|pid| format!("/proc/{pid}"));

    let mut last_status_time = Instant::now();
    let mut stats_timer = Instant::now();
    let mut exit_reason = "interrupted";

    loop {
        if let Some(limit) = duration_limit {
            if capture_start.elapsed() >= limit {
                exit_reason = "duration limit reached";
                break;
            }
        }

        if let Some(ref proc_path) = proc_path {
            if !std::path::Path::new(proc_path).exists() {
                exit_reason = "process exited";
                break;
            }
        }

        if processor.accepted() == 0 && last_status_time.elapsed() > STATUS_INTERVAL {
            info!("Still waiting for events... (no events received yet)");
            last_status_time = Instant::now();
        }

        while let Some(item) = ring_buf.next() {
            processor.process_bytes(&item).context("Failed to export event")?;
        }

        if args.headless && stats_timer.elapsed() > STATUS_INTERVAL {
            display_statistics(&processor.counts);
            stats_timer = Instant::now();
        } else if !args.headless && !quiet {
            if let Some(limit) = duration_limit {
                display_progress(
                    capture_start.elapsed().as_secs(),
                    limit.as_secs(),
                    processor.accepted(),
                );
            }
        }

        tokio::select! {
            () = tokio::time::sleep(POLL_INTERVAL) => {}
            _ = &mut ctrl_c => {
                break;
            }
        }
    }

    if !quiet || args.headless {
        let counts = processor.counts;
        eprintln!(
            "\n{}: {:.1}s, {} requests, {} responses (filtered: {}, malformed: {})",
            exit_reason,
            capture_start.elapsed().as_secs_f64(),
            counts.requests,
            counts.responses,
            counts.filtered,
            counts.decode_errors,
        );
    }

    match read_kernel_stats(&bpf) {
        Ok(stats) => {
            if !quiet || stats.lost() > 0 {
                print_capture_diagnostics(&stats);
            }
        }
        Err(e) => warn!("Could not read capture counters: {e}"),
    }

    if let Some(exporter) = processor.take_exporter() {
        let written = exporter.finish().context("Failed to flush export file")?;
        if !quiet {
            if let Some(ref export_path) = args.export {
                println!("saved: {} ({written} events)", export_path.display());
            }
        }
    }

    Ok(())
}
