//! Domain model for gotrace
//!
//! Core newtypes and structured errors shared by the loader and consumer.

pub mod errors;
pub mod types;

pub use types::{Pid, Tid};

pub use errors::{ExportError, RecordError, TracerError};
