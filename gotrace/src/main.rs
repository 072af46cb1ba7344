//! # gotrace - Main Entry Point
//!
//! - **Process** (`gotrace <PROCESS>` or `--pid <PID>`): trace one running process
//! - **Binary** (`--target <PATH>`): trace every process running the binary

#![allow(clippy::too_many_lines)]

use anyhow::{Context, Result};
use aya::maps::RingBuf;
use clap::Parser;
use gotrace_common::{CALL_EVENTS_MAP, RETURN_EVENTS_MAP};
use log::{info, warn};
use std::fs::File;
use std::io::BufWriter;
use std::time::{Duration, Instant};

use gotrace::cli::Args;
use gotrace::clock::BootClock;
use gotrace::domain::Pid;
use gotrace::export::JsonExporter;
use gotrace::preflight::{check_process_exists, run_preflight_checks};
use gotrace::process_lookup::{find_process_by_name, resolve_exe_path};
use gotrace::probes::{
    attach_call_probes, display_statistics, init_ebpf_logger, load_ebpf_program,
    pending_call_count, pending_calls_report, write_probe_layout, EventProcessor,
};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_NOPERM: i32 = 77;

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
    let msg = err.to_string().to_lowercase();
    if msg.contains("permission denied") || msg.contains("requires root") {
        EXIT_NOPERM
    } else if msg.contains("missing required argument") || msg.contains("cannot use process") {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

/// Resolve PID and binary path from CLI arguments.
///
/// - `gotrace my-app` - find process by name, auto-detect binary
/// - `gotrace --pid 1234` - explicit PID, binary from /proc
/// - `gotrace --pid 1234 --target ./app` - explicit PID and binary
/// - `gotrace --target ./app` - no PID, every process running the binary
fn resolve_pid_and_target(args: &Args) -> Result<(Option<Pid>, String)> {
    if let Some(ref name) = args.process {
        if args.pid.is_some() || args.target.is_some() {
            anyhow::bail!(
                "Cannot use PROCESS argument with --pid or --target.\n\n\
                 Use either:\n  \
                 gotrace my-app              (auto-detect)\n  \
                 gotrace --pid 1234          (explicit PID)"
            );
        }
        let info = find_process_by_name(name)?;
        let target = info.exe_path.to_string_lossy().into_owned();
        return Ok((Some(info.pid), target));
    }

    let explicit_target = args
        .target
        .as_ref()
        .map(|t| {
            std::fs::canonicalize(t)
                .with_context(|| format!("Failed to resolve path: {t}"))
                .map(|p| p.to_string_lossy().into_owned())
        })
        .transpose()?;

    match (args.pid.map(Pid), explicit_target) {
        (Some(pid), Some(target)) => Ok((Some(pid), target)),
        (Some(pid), None) => {
            let target = resolve_exe_path(pid)?.to_string_lossy().into_owned();
            Ok((Some(pid), target))
        }
        (None, Some(target)) => Ok((None, target)),
        (None, None) => anyhow::bail!(
            "Missing required argument: PROCESS, --pid or --target\n\n\
             Usage:\n  \
             gotrace my-app              Auto-detect PID and binary\n  \
             gotrace --pid 1234          Explicit PID, auto-detect binary\n  \
             gotrace --target ./app      Every process running ./app\n\n\
             Run 'gotrace --help' for more options"
        ),
    }
}

#[tokio::main]
async fn run() -> Result<()> {
    let args = Args::parse();
    let quiet = args.quiet;

    let (pid, target_path) = resolve_pid_and_target(&args)?;

    let symbols = run_preflight_checks(
        &target_path,
        &args.requested_symbols(),
        args.symbol_pattern.as_ref(),
        quiet,
    )?;
    if let Some(pid) = pid {
        check_process_exists(pid.0)?;
    }

    if !quiet {
        println!("gotrace v{}", env!("CARGO_PKG_VERSION"));
        println!("target: {target_path}");
        match pid {
            Some(pid) => println!("pid: {}", pid.0),
            None => println!("pid: all processes running the target"),
        }
    }

    let mut bpf = load_ebpf_program()?;
    init_ebpf_logger(&mut bpf);
    write_probe_layout(&mut bpf, &args.probe_layout())?;
    let attached = attach_call_probes(&mut bpf, &target_path, &symbols, pid, args.entry_only)?;

    if !quiet {
        println!("entry probes: {}", attached.entry.join(", "));
        if !args.entry_only {
            println!("return probes: {}", attached.exit.join(", "));
        }
    }

    let mut call_events =
        RingBuf::try_from(bpf.take_map(CALL_EVENTS_MAP).context("CALL_EVENTS map not found")?)?;
    let mut return_events = RingBuf::try_from(
        bpf.take_map(RETURN_EVENTS_MAP).context("RETURN_EVENTS map not found")?,
    )?;

    let clock = BootClock::detect()?;
    let trace_exporter = args.export.as_ref().map(|_| JsonExporter::new(&target_path, &symbols));

    if !quiet {
        if let Some(ref export_path) = args.export {
            println!("export: {}", export_path.display());
        }
    }

    let mut processor = EventProcessor::new(quiet, clock, trace_exporter);

    let mut last_status_time = Instant::now();

    // Setup Ctrl+C handler
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let tracing_start = Instant::now();
    let duration_limit =
        if args.duration > 0 { Some(Duration::from_secs(args.duration)) } else { None };

    // Only a single-process trace can end with its target
    let proc_path = pid.map(|pid| format!("/proc/{}", pid.0));

    let mut exit_reason = "interrupted";

    loop {
        if let Some(limit) = duration_limit {
            if tracing_start.elapsed() >= limit {
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

        if processor.event_count() == 0 && last_status_time.elapsed() > Duration::from_secs(10) {
            info!("Still waiting for events... (no calls observed yet)");
            last_status_time = Instant::now();
        }

        while let Some(item) = call_events.next() {
            processor.process_call_sample(&item);
        }
        while let Some(item) = return_events.next() {
            processor.process_return_sample(&item);
        }

        tokio::select! {
            () = tokio::time::sleep(Duration::from_millis(100)) => {}
            _ = &mut ctrl_c => {
                break;
            }
        }
    }

    // Pick up whatever arrived while shutting down
    while let Some(item) = call_events.next() {
        processor.process_call_sample(&item);
    }
    while let Some(item) = return_events.next() {
        processor.process_return_sample(&item);
    }

    eprintln!(
        "\n{exit_reason}: {:.1}s, {} events",
        tracing_start.elapsed().as_secs_f64(),
        processor.event_count()
    );
    display_statistics(&processor.stats);

    match pending_calls_report(args.entry_only, || pending_call_count(&bpf)) {
        Ok(Some(line)) => eprintln!("{line}"),
        Ok(None) => {}
        Err(e) => warn!("Could not read pending calls: {e}"),
    }

    if let Some(exporter) = processor.take_exporter() {
        if let Some(ref export_path) = args.export {
            let file = File::create(export_path).context("Failed to create export file")?;
            exporter
                .export(BufWriter::new(file), &processor.stats)
                .context("Failed to export trace")?;

            if !quiet {
                println!("saved: {} ({} events)", export_path.display(), exporter.len());
            }
        }
    }

    Ok(())
}
