//! # Event Processing
//!
//! Consumes samples from the two eBPF ring buffers.
//!
//! ## Event Routing
//!
//! - `CALL_EVENTS` → [`EventProcessor::process_call_sample`]
//! - `RETURN_EVENTS` → [`EventProcessor::process_return_sample`]
//!
//! The buffers are independent, so a return may be drained before its call.
//! Nothing here relies on cross-buffer order; durations are computed in the
//! kernel.
//!
//! ## Output Modes
//!
//! - **Console**: print each event (unless `--quiet`)
//! - **Export**: add to the JSON exporter

use gotrace_common::{CallEvent, ReturnEvent};
use log::warn;

use super::event_display::{display_call, display_return, TraceStats};
use crate::clock::BootClock;
use crate::export::JsonExporter;
use crate::records::{decode_call, decode_return};

/// Encapsulates event processing logic and state
pub struct EventProcessor {
    quiet: bool,
    clock: BootClock,

    pub stats: TraceStats,

    trace_exporter: Option<JsonExporter>,
}

impl EventProcessor {
    #[must_use]
    pub fn new(quiet: bool, clock: BootClock, trace_exporter: Option<JsonExporter>) -> Self {
        Self { quiet, clock, stats: TraceStats::default(), trace_exporter }
    }

    /// Total events accepted from both buffers
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.stats.calls + self.stats.returns
    }

    /// Process one raw sample from `CALL_EVENTS`
    pub fn process_call_sample(&mut self, bytes: &[u8]) {
        match decode_call(bytes) {
            Ok(event) => self.handle_call(&event),
            Err(e) => {
                self.stats.malformed += 1;
                warn!("Dropping call sample: {e}");
            }
        }
    }

    /// Process one raw sample from `RETURN_EVENTS`
    pub fn process_return_sample(&mut self, bytes: &[u8]) {
        match decode_return(bytes) {
            Ok(event) => self.handle_return(&event),
            Err(e) => {
                self.stats.malformed += 1;
                warn!("Dropping return sample: {e}");
            }
        }
    }

    /// Take the trace exporter (for final export)
    pub fn take_exporter(&mut self) -> Option<JsonExporter> {
        self.trace_exporter.take()
    }

    fn handle_call(&mut self, event: &CallEvent) {
        self.stats.calls += 1;

        if let Some(ref mut exporter) = self.trace_exporter {
            exporter.add_call(event, &self.clock);
        }
        if !self.quiet {
            display_call(event, &self.clock);
        }
    }

    fn handle_return(&mut self, event: &ReturnEvent) {
        self.stats.returns += 1;
        match event.elapsed() {
            Some(elapsed) => {
                self.stats.returns_timed += 1;
                self.stats.total_elapsed_ns = self.stats.total_elapsed_ns.saturating_add(elapsed);
                self.stats.max_elapsed_ns = self.stats.max_elapsed_ns.max(elapsed);
            }
            None => self.stats.returns_untimed += 1,
        }

        if let Some(ref mut exporter) = self.trace_exporter {
            exporter.add_return(event, &self.clock);
        }
        if !self.quiet {
            display_return(event, &self.clock);
        }
    }
}
