//! Probe lifecycle and event consumption
//!
//! - eBPF program loading, configuration and attachment
//! - Decoding and display of drained events
//! - Shutdown diagnostics

pub mod diagnostics;
pub mod ebpf_setup;
pub mod event_display;
pub mod event_processor;

pub use diagnostics::{pending_call_count, pending_calls_report};
pub use ebpf_setup::{
    attach_call_probes, init_ebpf_logger, load_ebpf_program, write_probe_layout, AttachSummary,
};
pub use event_display::{display_statistics, format_duration, TraceStats};
pub use event_processor::EventProcessor;
