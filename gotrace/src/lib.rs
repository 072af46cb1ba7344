//! # gotrace - Go Function Boundary Tracer
//!
//! Attaches eBPF uprobes to the entry and return of compiled Go functions and
//! reports the string argument each call received, the string it returned,
//! and how long it took. No changes to the traced program are needed.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              Go process (target)             │
//! └──────────────────────┬───────────────────────┘
//!                        │ uprobe / uretprobe
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │            eBPF programs (kernel)            │
//! │  go_call_entry → CALL_EVENTS  + CALL_STARTS  │
//! │  go_call_exit  → RETURN_EVENTS               │
//! └──────────────────────┬───────────────────────┘
//!                        │ ring buffers
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │               gotrace (this crate)           │
//! │  records → event_processor → display/export  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`probes`]: eBPF program loading, attachment and event consumption
//! - [`records`]: Decoding raw ring-buffer samples
//! - [`clock`]: Kernel monotonic timestamps to wall-clock time
//! - [`export`]: JSON export of a tracing run
//! - [`preflight`]: Privilege, kernel and symbol checks before loading
//! - [`process_lookup`]: Resolve a process name to PID and binary
//! - [`cli`]: Command-line arguments
//! - [`domain`]: Core types and errors
//!
//! ## Typical Usage
//!
//! ```bash
//! sudo ./gotrace my-go-app
//! sudo ./gotrace --pid 1234 -s main.lookup --export calls.json
//! ```

pub mod cli;
pub mod clock;
pub mod domain;
pub mod export;
pub mod preflight;
pub mod probes;
pub mod process_lookup;
pub mod records;
