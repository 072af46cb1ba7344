use gotrace_common::{CallEvent, ReturnEvent};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::clock::BootClock;
use crate::domain::ExportError;
use crate::probes::TraceStats;
use crate::records::{call_text, payload_text};

/// One entry event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub thread_id: u32,
    /// Kernel monotonic timestamp
    pub timestamp_ns: u64,
    /// RFC 3339 wall-clock rendering of `timestamp_ns`
    pub wall_time: String,
    pub length: u32,
    pub payload: String,
}

/// One return event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnRecord {
    pub thread_id: u32,
    pub timestamp_ns: u64,
    pub wall_time: String,
    pub payload: String,
    /// `None` when no entry was pending for the thread
    pub elapsed_ns: Option<u64>,
}

#[derive(Debug, Serialize)]
struct TraceDocument<'a> {
    target: &'a str,
    symbols: &'a [String],
    calls: &'a [CallRecord],
    returns: &'a [ReturnRecord],
    stats: &'a TraceStats,
}

/// Buffers events for a JSON export at the end of the run
pub struct JsonExporter {
    target: String,
    symbols: Vec<String>,
    calls: Vec<CallRecord>,
    returns: Vec<ReturnRecord>,
}

impl JsonExporter {
    #[must_use]
    pub fn new(target: &str, symbols: &[String]) -> Self {
        Self {
            target: target.to_string(),
            symbols: symbols.to_vec(),
            calls: Vec::new(),
            returns: Vec::new(),
        }
    }

    pub fn add_call(&mut self, event: &CallEvent, clock: &BootClock) {
        self.calls.push(CallRecord {
            thread_id: event.thread_id,
            timestamp_ns: event.timestamp_ns,
            wall_time: clock.format(event.timestamp_ns),
            length: event.length,
            payload: call_text(event),
        });
    }

    pub fn add_return(&mut self, event: &ReturnEvent, clock: &BootClock) {
        self.returns.push(ReturnRecord {
            thread_id: event.thread_id,
            timestamp_ns: event.timestamp_ns,
            wall_time: clock.format(event.timestamp_ns),
            payload: payload_text(event.data()),
            elapsed_ns: event.elapsed(),
        });
    }

    /// Number of buffered events
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len() + self.returns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the document to `writer`, pretty-printed.
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails
    pub fn export<W: Write>(&self, mut writer: W, stats: &TraceStats) -> Result<(), ExportError> {
        let document = TraceDocument {
            target: &self.target,
            symbols: &self.symbols,
            calls: &self.calls,
            returns: &self.returns,
            stats,
        };
        serde_json::to_writer_pretty(&mut writer, &document)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}
