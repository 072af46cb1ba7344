//! # Shared Data Structures (eBPF ↔ Userspace)
//!
//! Defines the records, constants and boundary-handler logic shared between
//! the kernel-side uprobe programs and the userspace loader. All records use
//! `#[repr(C)]` so the layout is identical on both sides of the ring buffer.
//!
//! ## Key Types
//!
//! - [`CallEvent`] - emitted at function entry with the traced string argument
//! - [`ReturnEvent`] - emitted at function return with the string result and
//!   the elapsed time since the matching entry
//! - [`abi::CallingConvention`] - Go `ABIInternal` register table
//! - [`probe::BoundaryProbe`] - the entry/exit handler pair
//!
//! The handler logic is written against small traits ([`probe::TrapContext`],
//! [`probe::CorrelationStore`], [`probe::EventTransport`]) so the same code
//! runs inside BPF and in host-side unit tests.

#![cfg_attr(not(test), no_std)]

pub mod abi;
pub mod bounded;
pub mod probe;
pub mod wire;

pub use abi::{CallingConvention, Register, Slot, GO_AMD64};
pub use bounded::{bounded_copy, UserMemory};
pub use probe::{
    BoundaryProbe, CorrelationStore, EventTransport, ExitRecord, ProbeError, ProbeLayout,
    Reservation, TrapContext,
};

// ============================================================================
// Sizes
// ============================================================================

/// Capacity of the entry payload. Valid lengths are `0..MAX_PAYLOAD`, so the
/// payload always ends with at least one zero byte.
pub const MAX_PAYLOAD: usize = 128;

/// Capacity of the return-value payload. Valid lengths are `0..MAX_RETURN_PAYLOAD`.
pub const MAX_RETURN_PAYLOAD: usize = 64;

/// Wire size of [`CallEvent`] in bytes.
pub const CALL_EVENT_SIZE: usize = 144;

/// Wire size of [`ReturnEvent`] in bytes.
pub const RETURN_EVENT_SIZE: usize = 88;

// ============================================================================
// Map names (shared so the loader never drifts from the BPF object)
// ============================================================================

/// Ring buffer carrying [`CallEvent`] records.
pub const CALL_EVENTS_MAP: &str = "CALL_EVENTS";

/// Ring buffer carrying [`ReturnEvent`] records.
pub const RETURN_EVENTS_MAP: &str = "RETURN_EVENTS";

/// LRU hash map: thread id → entry timestamp.
pub const CALL_STARTS_MAP: &str = "CALL_STARTS";

/// Hash map: config key → value, written by the loader before attach.
pub const CONFIG_MAP: &str = "CONFIG";

/// Maximum number of in-flight calls tracked for duration correlation.
pub const MAX_IN_FLIGHT_CALLS: u32 = 10_240;

// ============================================================================
// CONFIG map keys
// ============================================================================

/// Slot index (1..=9) of the argument holding the entry string pointer.
pub const CONFIG_ENTRY_PTR_SLOT: u32 = 0;

/// Slot index (1..=9) of the argument holding the entry string length.
pub const CONFIG_ENTRY_LEN_SLOT: u32 = 1;

/// Slot index (1..=9) of the result holding the returned string pointer.
pub const CONFIG_RETURN_PTR_SLOT: u32 = 2;

/// Slot index (1..=9) of the result holding the returned string length.
pub const CONFIG_RETURN_LEN_SLOT: u32 = 3;

// ============================================================================
// Shared Data Structures
// ============================================================================

/// Event sent from the entry handler to userspace via `CALL_EVENTS`.
///
/// **Wire layout** (little-endian, 144 bytes):
///
/// | offset | field          | size |
/// |--------|----------------|------|
/// | 0      | `timestamp_ns` | 8    |
/// | 8      | `length`       | 4    |
/// | 12     | `payload`      | 128  |
/// | 140    | `thread_id`    | 4    |
///
/// `thread_id` sits in what would otherwise be tail padding, so the first
/// three fields keep the exact offsets consumers expect.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallEvent {
    /// Monotonic timestamp (`bpf_ktime_get_ns()`), nanoseconds since boot
    pub timestamp_ns: u64,

    /// Number of valid bytes in `payload`. Always `< MAX_PAYLOAD`.
    pub length: u32,

    /// Bytes copied from the traced argument, zero beyond `length`
    pub payload: [u8; MAX_PAYLOAD],

    /// Kernel thread id (lower half of `pid_tgid`) of the calling thread
    pub thread_id: u32,
}

impl CallEvent {
    /// An all-zero event, the starting point for every entry handler run.
    #[must_use]
    pub const fn zeroed() -> Self {
        Self { timestamp_ns: 0, length: 0, payload: [0u8; MAX_PAYLOAD], thread_id: 0 }
    }

    /// The valid prefix of the payload.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        let len = (self.length as usize).min(MAX_PAYLOAD);
        &self.payload[..len]
    }
}

impl Default for CallEvent {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Event sent from the exit handler to userspace via `RETURN_EVENTS`.
///
/// **Wire layout** (little-endian, 88 bytes):
///
/// | offset | field          | size |
/// |--------|----------------|------|
/// | 0      | `payload`      | 64   |
/// | 64     | `timestamp_ns` | 8    |
/// | 72     | `elapsed_ns`   | 8    |
/// | 80     | `present`      | 1    |
/// | 81     | `_padding`     | 3    |
/// | 84     | `thread_id`    | 4    |
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnEvent {
    /// Bytes copied from the returned string, zero-terminated. All zero if
    /// the return value could not be read.
    pub payload: [u8; MAX_RETURN_PAYLOAD],

    /// Monotonic timestamp at return, nanoseconds since boot
    pub timestamp_ns: u64,

    /// Time since the matching entry. Only meaningful when `present == 1`.
    pub elapsed_ns: u64,

    /// 1 if a matching entry was found and `elapsed_ns` is valid, else 0
    pub present: u8,

    /// Padding for 4-byte alignment of `thread_id`
    #[allow(clippy::pub_underscore_fields)]
    pub _padding: [u8; 3],

    /// Kernel thread id of the returning thread
    pub thread_id: u32,
}

impl ReturnEvent {
    /// An all-zero event with no elapsed duration.
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            payload: [0u8; MAX_RETURN_PAYLOAD],
            timestamp_ns: 0,
            elapsed_ns: 0,
            present: 0,
            _padding: [0u8; 3],
            thread_id: 0,
        }
    }

    /// Elapsed time since the matching entry, if one was found.
    #[must_use]
    pub fn elapsed(&self) -> Option<u64> {
        (self.present != 0).then_some(self.elapsed_ns)
    }

    /// The payload up to (not including) the first zero byte.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        let end = self.payload.iter().position(|&b| b == 0).unwrap_or(MAX_RETURN_PAYLOAD);
        &self.payload[..end]
    }
}

impl Default for ReturnEvent {
    fn default() -> Self {
        Self::zeroed()
    }
}

const _: () = assert!(core::mem::size_of::<CallEvent>() == CALL_EVENT_SIZE);
const _: () = assert!(core::mem::size_of::<ReturnEvent>() == RETURN_EVENT_SIZE);

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::offset_of;

    #[test]
    fn call_event_field_offsets() {
        assert_eq!(offset_of!(CallEvent, timestamp_ns), 0);
        assert_eq!(offset_of!(CallEvent, length), 8);
        assert_eq!(offset_of!(CallEvent, payload), 12);
        assert_eq!(offset_of!(CallEvent, thread_id), 140);
    }

    #[test]
    fn return_event_field_offsets() {
        assert_eq!(offset_of!(ReturnEvent, payload), 0);
        assert_eq!(offset_of!(ReturnEvent, timestamp_ns), 64);
        assert_eq!(offset_of!(ReturnEvent, elapsed_ns), 72);
        assert_eq!(offset_of!(ReturnEvent, present), 80);
        assert_eq!(offset_of!(ReturnEvent, thread_id), 84);
    }

    #[test]
    fn return_event_elapsed_requires_present_flag() {
        let mut event = ReturnEvent::zeroed();
        event.elapsed_ns = 50;
        assert_eq!(event.elapsed(), None);
        event.present = 1;
        assert_eq!(event.elapsed(), Some(50));
    }

    #[test]
    fn return_event_data_stops_at_nul() {
        let mut event = ReturnEvent::zeroed();
        event.payload[..5].copy_from_slice(b"alice");
        assert_eq!(event.data(), b"alice");
    }
}
