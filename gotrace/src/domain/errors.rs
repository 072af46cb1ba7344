//! Structured error types for gotrace
//!
//! Using thiserror for automatic Display implementation and error chaining.

use super::types::Pid;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TracerError {
    #[error("Process {0} not found")]
    ProcessNotFound(Pid),

    #[error("Failed to attach {probe} to {symbol} in {binary}: {error}")]
    ProbeAttachFailed { probe: String, symbol: String, binary: String, error: String },

    #[error("No probes attached to {binary}: none of the requested symbols could be traced")]
    NoProbesAttached { binary: String },

    #[error("Symbol {symbol} not found in {binary}")]
    SymbolNotFound { symbol: String, binary: String },

    #[error("Failed to load eBPF object")]
    EbpfLoad(#[source] aya::EbpfError),
}

/// A ring-buffer sample that could not be turned into an event.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RecordError {
    #[error("{kind} sample truncated: got {len} bytes, expected {expected}")]
    Truncated { kind: &'static str, len: usize, expected: usize },

    #[error("call sample declares length {length}, payload holds at most {max}")]
    LengthOutOfRange { length: u32, max: usize },
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracer_error_display() {
        let err = TracerError::ProcessNotFound(Pid(1234));
        assert_eq!(err.to_string(), "Process PID:1234 not found");
    }

    #[test]
    fn test_probe_attach_error() {
        let err = TracerError::ProbeAttachFailed {
            probe: "go_call_exit".to_string(),
            symbol: "main.getUserByID".to_string(),
            binary: "/srv/app".to_string(),
            error: "symbol not found".to_string(),
        };
        assert!(err.to_string().contains("go_call_exit"));
        assert!(err.to_string().contains("main.getUserByID"));
    }

    #[test]
    fn test_ebpf_load_keeps_source() {
        use std::error::Error;

        let err = TracerError::EbpfLoad(aya::EbpfError::NoBTF);
        assert_eq!(err.to_string(), "Failed to load eBPF object");
        let source = err.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("no BTF parsed for object"));
    }

    #[test]
    fn test_truncated_record() {
        let err = RecordError::Truncated { kind: "call", len: 12, expected: 144 };
        assert_eq!(err.to_string(), "call sample truncated: got 12 bytes, expected 144");
    }
}
