//! Build helper for the kernel-side crate.
//!
//! ```bash
//! cargo xtask build-ebpf
//! cargo build --release
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::process::Command;

/// The BPF object is embedded by `gotrace` from this package's release output
const EBPF_PACKAGE: &str = "gotrace-ebpf";

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Parser)]
enum Cmd {
    /// Compile the uprobe programs to BPF bytecode
    BuildEbpf {
        #[arg(long, default_value = "bpfel-unknown-none")]
        target: String,
        /// Accepted for compatibility; the BPF object is always built in release
        #[arg(long)]
        release: bool,
    },
}

fn main() -> Result<()> {
    match Args::parse().command {
        Cmd::BuildEbpf { target, .. } => build_ebpf(&target),
    }
}

fn build_ebpf(target: &str) -> Result<()> {
    // Debug builds pull in core::fmt code the BPF linker rejects; release
    // LTO strips it.
    let status = Command::new("cargo")
        .args(["+nightly", "build", "--package", EBPF_PACKAGE, "--target", target])
        .args(["-Z", "build-std=core", "--release"])
        .status()
        .with_context(|| format!("Failed to run cargo for {EBPF_PACKAGE}"))?;

    if !status.success() {
        bail!("Failed to build {EBPF_PACKAGE} ({status})");
    }

    println!("✓ {EBPF_PACKAGE} built");
    println!("  Object: target/{target}/release/gotrace");
    Ok(())
}
