//! Trace export functionality
//!
//! Writes the collected call and return events, plus run statistics, as a
//! single JSON document for offline analysis.

pub mod json;

pub use json::JsonExporter;
