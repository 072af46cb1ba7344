// Time conversions intentionally lose precision for display purposes
#![allow(clippy::cast_precision_loss)]

use gotrace_common::{CallEvent, ReturnEvent};
use serde::Serialize;

use crate::clock::BootClock;
use crate::domain::Tid;
use crate::records::{call_text, payload_text};

/// Counters kept by the event processor
#[derive(Debug, Default, Clone, Serialize)]
pub struct TraceStats {
    pub calls: u64,
    pub returns: u64,
    /// Returns paired with an entry on the same thread
    pub returns_timed: u64,
    /// Returns with no pending entry (reentrancy, entry dropped, or the
    /// goroutine moved threads)
    pub returns_untimed: u64,
    /// Samples that failed to decode
    pub malformed: u64,
    pub total_elapsed_ns: u64,
    pub max_elapsed_ns: u64,
}

impl TraceStats {
    #[must_use]
    pub fn mean_elapsed_ns(&self) -> Option<u64> {
        self.total_elapsed_ns.checked_div(self.returns_timed)
    }
}

/// Human-readable duration: ns below 1µs, then µs, ms, s.
#[must_use]
pub fn format_duration(ns: u64) -> String {
    match ns {
        0..=999 => format!("{ns}ns"),
        1_000..=999_999 => format!("{:.2}µs", ns as f64 / 1_000.0),
        1_000_000..=999_999_999 => format!("{:.2}ms", ns as f64 / 1_000_000.0),
        _ => format!("{:.2}s", ns as f64 / 1_000_000_000.0),
    }
}

/// Display a call event
pub fn display_call(event: &CallEvent, clock: &BootClock) {
    println!(
        "[CALL]   {} {} len={} {:?}",
        clock.format(event.timestamp_ns),
        Tid(event.thread_id),
        event.length,
        call_text(event)
    );
}

/// Display a return event
pub fn display_return(event: &ReturnEvent, clock: &BootClock) {
    let elapsed = event.elapsed().map_or_else(|| "?".to_string(), format_duration);
    println!(
        "[RETURN] {} {} elapsed={elapsed} {:?}",
        clock.format(event.timestamp_ns),
        Tid(event.thread_id),
        payload_text(event.data())
    );
}

/// Display tracing statistics
pub fn display_statistics(stats: &TraceStats) {
    let mean = stats.mean_elapsed_ns().map_or_else(|| "-".to_string(), format_duration);
    eprintln!(
        "stats: calls={} returns={} (timed={}, untimed={}) malformed={} mean={mean} max={}",
        stats.calls,
        stats.returns,
        stats.returns_timed,
        stats.returns_untimed,
        stats.malformed,
        format_duration(stats.max_elapsed_ns),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_units() {
        assert_eq!(format_duration(50), "50ns");
        assert_eq!(format_duration(1_500), "1.50µs");
        assert_eq!(format_duration(2_250_000), "2.25ms");
        assert_eq!(format_duration(3_000_000_000), "3.00s");
    }

    #[test]
    fn test_mean_elapsed() {
        let mut stats = TraceStats::default();
        assert_eq!(stats.mean_elapsed_ns(), None);
        stats.returns_timed = 4;
        stats.total_elapsed_ns = 400;
        assert_eq!(stats.mean_elapsed_ns(), Some(100));
    }
}
