//! # eBPF Program Loading and Attachment
//!
//! Loads compiled eBPF bytecode, writes the probe configuration, and attaches
//! the boundary handlers to the traced functions.
//!
//! ## Attachment Points
//!
//! - **Uprobe** `go_call_entry`: first instruction of each traced symbol
//! - **Uretprobe** `go_call_exit`: return of each traced symbol
//!
//! Go moves goroutine stacks when they grow. A uretprobe rewrites the return
//! address on the stack, so tracing functions that can grow the stack may
//! crash the target; `--entry-only` skips the return probe.

use anyhow::{Context, Result};
use aya::{include_bytes_aligned, maps::HashMap, programs::UProbe, Ebpf};
use aya_log::EbpfLogger;
use gotrace_common::{
    ProbeLayout, CONFIG_ENTRY_LEN_SLOT, CONFIG_ENTRY_PTR_SLOT, CONFIG_MAP, CONFIG_RETURN_LEN_SLOT,
    CONFIG_RETURN_PTR_SLOT,
};
use log::{info, warn};

use crate::domain::{Pid, TracerError};

/// Name of the entry program in the BPF object
pub const ENTRY_PROGRAM: &str = "go_call_entry";

/// Name of the return program in the BPF object
pub const EXIT_PROGRAM: &str = "go_call_exit";

/// Which symbols ended up with which probes.
#[derive(Debug, Default)]
pub struct AttachSummary {
    pub entry: Vec<String>,
    pub exit: Vec<String>,
}

/// Load the eBPF program binary
///
/// Always uses the release build: debug builds pull in formatting code the
/// BPF linker cannot handle.
///
/// # Errors
/// Returns [`TracerError::EbpfLoad`] if the kernel rejects the object
pub fn load_ebpf_program() -> Result<Ebpf> {
    let bpf =
        Ebpf::load(include_bytes_aligned!("../../../target/bpfel-unknown-none/release/gotrace"))
            .map_err(TracerError::EbpfLoad)?;
    Ok(bpf)
}

/// Initialize eBPF logger
pub fn init_ebpf_logger(bpf: &mut Ebpf) {
    if let Err(e) = EbpfLogger::init(bpf) {
        warn!("Failed to initialize eBPF logger: {e}");
    }
}

/// Write the argument layout into the `CONFIG` map.
///
/// Must run before attaching; handlers read it on every hit.
///
/// # Errors
/// Returns an error if the `CONFIG` map is missing or the update fails
pub fn write_probe_layout(bpf: &mut Ebpf, layout: &ProbeLayout) -> Result<()> {
    let mut config: HashMap<_, u32, u64> =
        HashMap::try_from(bpf.map_mut(CONFIG_MAP).context("CONFIG map not found")?)?;

    for (key, slot) in [
        (CONFIG_ENTRY_PTR_SLOT, layout.entry_ptr),
        (CONFIG_ENTRY_LEN_SLOT, layout.entry_len),
        (CONFIG_RETURN_PTR_SLOT, layout.return_ptr),
        (CONFIG_RETURN_LEN_SLOT, layout.return_len),
    ] {
        config.insert(key, u64::from(slot.index()), 0)?;
    }

    info!(
        "✓ Probe layout: entry ptr/len = slot {}/{}, return ptr/len = slot {}/{}",
        layout.entry_ptr.index(),
        layout.entry_len.index(),
        layout.return_ptr.index(),
        layout.return_len.index()
    );
    Ok(())
}

/// Attach the entry probe (and the return probe unless `entry_only`) to
/// every symbol.
///
/// A symbol that fails to attach is skipped with a warning.
///
/// # Errors
/// Returns [`TracerError::NoProbesAttached`] when no entry probe could be
/// attached, or an error if a program is missing or fails to load.
pub fn attach_call_probes(
    bpf: &mut Ebpf,
    target_path: &str,
    symbols: &[String],
    pid: Option<Pid>,
    entry_only: bool,
) -> Result<AttachSummary> {
    let mut summary = AttachSummary {
        entry: attach_program(bpf, ENTRY_PROGRAM, target_path, symbols, pid)?,
        exit: Vec::new(),
    };

    if summary.entry.is_empty() {
        return Err(TracerError::NoProbesAttached { binary: target_path.to_string() }.into());
    }

    if entry_only {
        info!("Return probes disabled (--entry-only)");
    } else {
        // Only pair returns with calls we can actually see
        summary.exit = attach_program(bpf, EXIT_PROGRAM, target_path, &summary.entry, pid)?;
    }

    Ok(summary)
}

fn attach_program(
    bpf: &mut Ebpf,
    program_name: &str,
    target_path: &str,
    symbols: &[String],
    pid: Option<Pid>,
) -> Result<Vec<String>> {
    let program: &mut UProbe = bpf
        .program_mut(program_name)
        .with_context(|| format!("{program_name} program not found"))?
        .try_into()?;
    program.load().with_context(|| format!("Failed to load {program_name}"))?;

    let mut attached = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        match program.attach(Some(symbol.as_str()), 0, target_path, pid.map(|p| p.0)) {
            Ok(_) => {
                info!("✓ Attached {program_name}: {symbol}");
                attached.push(symbol.clone());
            }
            Err(e) => {
                let err = TracerError::ProbeAttachFailed {
                    probe: program_name.to_string(),
                    symbol: symbol.clone(),
                    binary: target_path.to_string(),
                    error: e.to_string(),
                };
                warn!("⚠️  {err}");
            }
        }
    }
    Ok(attached)
}
