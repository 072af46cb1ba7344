//! CLI argument definitions

use clap::Parser;
use gotrace_common::{ProbeLayout, Slot};
use regex::Regex;
use std::path::PathBuf;

/// Traced when neither `--symbol` nor `--symbol-pattern` is given
pub const DEFAULT_SYMBOL: &str = "main.getUserByID";

fn parse_slot(raw: &str) -> Result<Slot, String> {
    let index: u64 = raw.parse().map_err(|e| format!("{e}"))?;
    Slot::from_index(index).ok_or_else(|| format!("slot must be in 1..=9, got {index}"))
}

/// Patterns match from the start of the symbol name, so a plain prefix such
/// as `main\.` selects every function in package main.
fn parse_symbol_pattern(raw: &str) -> Result<Regex, String> {
    Regex::new(&format!("^(?:{raw})")).map_err(|e| e.to_string())
}

#[derive(Parser)]
#[command(
    name = "gotrace",
    about = "Trace string arguments, return values and latency of Go functions",
    after_help = "\
EXAMPLES:
    sudo gotrace my-app                                  Trace main.getUserByID in a running process
    sudo gotrace --pid 1234 -s 'database/sql.(*DB).QueryRow' --entry-ptr-slot 4 --entry-len-slot 5
    sudo gotrace --target ./app -s main.handle           Trace every process running ./app
    sudo gotrace my-app --symbol-pattern 'main\\.'       Trace every function in package main"
)]
pub struct Args {
    /// Process name to trace (auto-detects PID and binary)
    #[arg(value_name = "PROCESS")]
    pub process: Option<String>,

    /// Process ID to trace (binary path auto-detected from /proc)
    #[arg(short, long)]
    pub pid: Option<i32>,

    /// Path to the Go binary; without --pid every process running it is traced
    #[arg(short, long)]
    pub target: Option<String>,

    /// Function symbol to trace (repeatable) [default: main.getUserByID]
    #[arg(short, long = "symbol", value_name = "SYMBOL")]
    pub symbols: Vec<String>,

    /// Also trace every function whose name matches this prefix or regex
    #[arg(long, value_name = "PREFIX|REGEX", value_parser = parse_symbol_pattern)]
    pub symbol_pattern: Option<Regex>,

    /// Argument slot (1-9) holding the traced string's data pointer
    #[arg(long, value_parser = parse_slot, default_value = "2")]
    pub entry_ptr_slot: Slot,

    /// Argument slot (1-9) holding the traced string's length
    #[arg(long, value_parser = parse_slot, default_value = "3")]
    pub entry_len_slot: Slot,

    /// Result slot (1-9) holding the returned string's data pointer
    #[arg(long, value_parser = parse_slot, default_value = "1")]
    pub return_ptr_slot: Slot,

    /// Result slot (1-9) holding the returned string's length
    #[arg(long, value_parser = parse_slot, default_value = "2")]
    pub return_len_slot: Slot,

    /// Only attach the entry probe (no return values or latency)
    #[arg(long)]
    pub entry_only: bool,

    /// Export collected events to a JSON file
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Stop after N seconds (0 = unlimited)
    #[arg(long, default_value = "0")]
    pub duration: u64,

    /// Suppress per-event output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Explicit symbols, or the default when no symbol selection was given.
    #[must_use]
    pub fn requested_symbols(&self) -> Vec<String> {
        if self.symbols.is_empty() && self.symbol_pattern.is_none() {
            vec![DEFAULT_SYMBOL.to_string()]
        } else {
            self.symbols.clone()
        }
    }

    #[must_use]
    pub fn probe_layout(&self) -> ProbeLayout {
        ProbeLayout {
            entry_ptr: self.entry_ptr_slot,
            entry_len: self.entry_len_slot,
            return_ptr: self.return_ptr_slot,
            return_len: self.return_len_slot,
        }
    }
}
