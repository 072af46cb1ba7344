//! Decoding of ring-buffer samples into typed events.
//!
//! Samples are parsed field by field from their little-endian layout
//! (see `gotrace_common::wire`), so a short or misaligned sample is an error
//! rather than undefined behaviour.

use gotrace_common::{CallEvent, ReturnEvent, CALL_EVENT_SIZE, MAX_PAYLOAD, RETURN_EVENT_SIZE};

use crate::domain::RecordError;

/// Decode a `CALL_EVENTS` sample.
///
/// # Errors
/// [`RecordError::Truncated`] for short samples and
/// [`RecordError::LengthOutOfRange`] if the length field breaks the
/// `length < MAX_PAYLOAD` invariant.
pub fn decode_call(bytes: &[u8]) -> Result<CallEvent, RecordError> {
    let event = CallEvent::from_bytes(bytes).ok_or(RecordError::Truncated {
        kind: "call",
        len: bytes.len(),
        expected: CALL_EVENT_SIZE,
    })?;
    if event.length as usize >= MAX_PAYLOAD {
        return Err(RecordError::LengthOutOfRange { length: event.length, max: MAX_PAYLOAD - 1 });
    }
    Ok(event)
}

/// Decode a `RETURN_EVENTS` sample.
///
/// # Errors
/// [`RecordError::Truncated`] for short samples.
pub fn decode_return(bytes: &[u8]) -> Result<ReturnEvent, RecordError> {
    ReturnEvent::from_bytes(bytes).ok_or(RecordError::Truncated {
        kind: "return",
        len: bytes.len(),
        expected: RETURN_EVENT_SIZE,
    })
}

/// Render payload bytes for display, stopping at the first NUL.
///
/// For return payloads, which carry no length: the zero tail is the only
/// terminator, so an embedded NUL ends the text.
#[must_use]
pub fn payload_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Render the argument of a call event.
///
/// `length` is authoritative, so every copied byte is kept, embedded NULs
/// included.
#[must_use]
pub fn call_text(event: &CallEvent) -> String {
    String::from_utf8_lossy(event.data()).into_owned()
}
