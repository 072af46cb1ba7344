//! Samples as the kernel writes them, decoded through the public API.

use gotrace::domain::RecordError;
use gotrace::records::{decode_call, decode_return, payload_text};
use gotrace_common::{
    CallEvent, ReturnEvent, CALL_EVENT_SIZE, MAX_PAYLOAD, MAX_RETURN_PAYLOAD, RETURN_EVENT_SIZE,
};

#[test]
fn test_call_sample_from_raw_bytes() {
    // Hand-built little-endian sample: ts=0x0102, len=3, "abc", tid=77
    let mut raw = [0u8; CALL_EVENT_SIZE];
    raw[0..8].copy_from_slice(&0x0102u64.to_le_bytes());
    raw[8..12].copy_from_slice(&3u32.to_le_bytes());
    raw[12..15].copy_from_slice(b"abc");
    raw[140..144].copy_from_slice(&77u32.to_le_bytes());

    let event = decode_call(&raw).unwrap();
    assert_eq!(event.timestamp_ns, 0x0102);
    assert_eq!(event.length, 3);
    assert_eq!(event.data(), b"abc");
    assert_eq!(event.thread_id, 77);
}

#[test]
fn test_return_sample_from_raw_bytes() {
    let mut raw = [0u8; RETURN_EVENT_SIZE];
    raw[..5].copy_from_slice(b"alice");
    raw[64..72].copy_from_slice(&9_000u64.to_le_bytes());
    raw[72..80].copy_from_slice(&250u64.to_le_bytes());
    raw[80] = 1;
    raw[84..88].copy_from_slice(&5u32.to_le_bytes());

    let event = decode_return(&raw).unwrap();
    assert_eq!(event.data(), b"alice");
    assert_eq!(event.timestamp_ns, 9_000);
    assert_eq!(event.elapsed(), Some(250));
    assert_eq!(event.thread_id, 5);
}

#[test]
fn test_longest_valid_argument_keeps_terminator() {
    let mut event = CallEvent::zeroed();
    event.length = u32::try_from(MAX_PAYLOAD - 1).unwrap();
    event.payload[..MAX_PAYLOAD - 1].fill(b'x');

    let decoded = decode_call(&event.to_bytes()).unwrap();
    assert_eq!(decoded.payload[MAX_PAYLOAD - 1], 0);
    assert_eq!(payload_text(decoded.data()).len(), MAX_PAYLOAD - 1);
}

#[test]
fn test_return_without_entry_has_no_elapsed() {
    let mut event = ReturnEvent::zeroed();
    event.payload[..MAX_RETURN_PAYLOAD - 1].fill(b'y');
    let decoded = decode_return(&event.to_bytes()).unwrap();
    assert_eq!(decoded.elapsed(), None);
    assert_eq!(decoded.data().len(), MAX_RETURN_PAYLOAD - 1);
}

#[test]
fn test_oversized_length_field_is_rejected() {
    let mut raw = [0u8; CALL_EVENT_SIZE];
    raw[8..12].copy_from_slice(&500u32.to_le_bytes());
    assert!(matches!(decode_call(&raw), Err(RecordError::LengthOutOfRange { length: 500, .. })));
}

#[test]
fn test_short_samples_are_rejected() {
    assert!(matches!(
        decode_call(&[0u8; CALL_EVENT_SIZE - 1]),
        Err(RecordError::Truncated { kind: "call", .. })
    ));
    assert!(decode_return(&[0u8; RETURN_EVENT_SIZE - 1]).is_err());
}
