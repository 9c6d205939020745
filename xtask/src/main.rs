use anyhow::{bail, Context, Result};
use clap::Parser;
use std::process::Command;

const EBPF_PACKAGE: &str = "httptap-ebpf";

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Parser)]
enum Cmd {
    /// Build the kernel programs (always release)
    BuildEbpf {
        #[arg(long, default_value = "bpfel-unknown-none")]
        target: String,
    },
    /// Build everything and run httptap under sudo
    Run {
        #[arg(long, default_value = "bpfel-unknown-none")]
        target: String,
        /// Arguments passed through to httptap
        #[arg(last = true)]
        run_args: Vec<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Cmd::BuildEbpf { target } => build_ebpf(&target)?,
        Cmd::Run { target, run_args } => run(&target, &run_args)?,
    }

    Ok(())
}

fn build_ebpf(target: &str) -> Result<()> {
    // Debug builds pull in formatting code (LowerHex) the BPF linker rejects
    let status = Command::new("cargo")
        .args(["+nightly", "build", "--package", EBPF_PACKAGE, "--target", target])
        .args(["-Z", "build-std=core", "--release"])
        .status()
        .context("Failed to build eBPF program")?;

    if !status.success() {
        bail!("Failed to build eBPF program");
    }

    println!("✓ eBPF program built successfully");
    println!("  Target: {target}");
    println!("  Object: target/{target}/release/httptap");

    Ok(())
}

fn run(target: &str, run_args: &[String]) -> Result<()> {
    build_ebpf(target)?;

    let status = Command::new("cargo")
        .args(["build", "--release", "--package", "httptap"])
        .status()
        .context("Failed to build httptap")?;
    if !status.success() {
        bail!("Failed to build httptap");
    }

    let object = format!("target/{target}/release/httptap");
    let status = Command::new("sudo")
        .args(["-E", "target/release/httptap", "--object", &object])
        .args(run_args)
        .status()
        .context("Failed to run httptap")?;
    if !status.success() {
        bail!("httptap exited with {status}");
    }

    Ok(())
}
