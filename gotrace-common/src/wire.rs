//! Byte-level encoding of the ring-buffer records.
//!
//! BPF writes the `#[repr(C)]` structs directly; these functions produce and
//! parse the same little-endian layout without `unsafe`, so the consumer
//! never has to trust that a sample is well aligned or correctly sized.

use crate::{
    CallEvent, ReturnEvent, CALL_EVENT_SIZE, MAX_PAYLOAD, MAX_RETURN_PAYLOAD, RETURN_EVENT_SIZE,
};

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

fn u64_at(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}

impl CallEvent {
    #[must_use]
    pub fn to_bytes(&self) -> [u8; CALL_EVENT_SIZE] {
        let mut out = [0u8; CALL_EVENT_SIZE];
        out[0..8].copy_from_slice(&self.timestamp_ns.to_le_bytes());
        out[8..12].copy_from_slice(&self.length.to_le_bytes());
        out[12..12 + MAX_PAYLOAD].copy_from_slice(&self.payload);
        out[140..144].copy_from_slice(&self.thread_id.to_le_bytes());
        out
    }

    /// Parse a sample; `None` if it is shorter than [`CALL_EVENT_SIZE`].
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < CALL_EVENT_SIZE {
            return None;
        }
        let mut payload = [0u8; MAX_PAYLOAD];
        payload.copy_from_slice(&bytes[12..12 + MAX_PAYLOAD]);
        Some(Self {
            timestamp_ns: u64_at(bytes, 0),
            length: u32_at(bytes, 8),
            payload,
            thread_id: u32_at(bytes, 140),
        })
    }
}

impl ReturnEvent {
    #[must_use]
    pub fn to_bytes(&self) -> [u8; RETURN_EVENT_SIZE] {
        let mut out = [0u8; RETURN_EVENT_SIZE];
        out[0..MAX_RETURN_PAYLOAD].copy_from_slice(&self.payload);
        out[64..72].copy_from_slice(&self.timestamp_ns.to_le_bytes());
        out[72..80].copy_from_slice(&self.elapsed_ns.to_le_bytes());
        out[80] = self.present;
        out[84..88].copy_from_slice(&self.thread_id.to_le_bytes());
        out
    }

    /// Parse a sample; `None` if it is shorter than [`RETURN_EVENT_SIZE`].
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < RETURN_EVENT_SIZE {
            return None;
        }
        let mut payload = [0u8; MAX_RETURN_PAYLOAD];
        payload.copy_from_slice(&bytes[..MAX_RETURN_PAYLOAD]);
        Some(Self {
            payload,
            timestamp_ns: u64_at(bytes, 64),
            elapsed_ns: u64_at(bytes, 72),
            present: bytes[80],
            _padding: [0u8; 3],
            thread_id: u32_at(bytes, 84),
        })
    }
}
