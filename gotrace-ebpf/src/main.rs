//! # eBPF Kernel-Side Instrumentation
//!
//! Uprobe programs attached to the entry and return of Go functions. The
//! handler logic lives in `gotrace_common::probe`; this crate supplies the
//! BPF-backed handles it runs against.
//!
//! ## Programs
//!
//! - **Uprobe**: `go_call_entry` - copies the traced string argument
//! - **Uretprobe**: `go_call_exit` - copies the returned string and reports
//!   the time since the matching entry
//!
//! ## Maps (Shared with Userspace)
//!
//! - `CALL_EVENTS` - Ring buffer (256KB) of `CallEvent`
//! - `RETURN_EVENTS` - Ring buffer (256KB) of `ReturnEvent`
//! - `CALL_STARTS` - LRU map thread id → entry timestamp
//! - `CONFIG` - Argument layout written by the loader
//!
//! ## Build
//!
//! Always compiled in release mode (debug includes incompatible formatting code):
//! ```bash
//! cargo xtask build-ebpf --release
//! ```

#![no_std]
#![no_main]
#![allow(unused_unsafe)]

use aya_ebpf::{
    bindings::pt_regs,
    helpers::{bpf_get_current_pid_tgid, bpf_ktime_get_ns, bpf_probe_read_user_buf},
    macros::{map, uprobe, uretprobe},
    maps::{ring_buf::RingBufEntry, HashMap, LruHashMap, RingBuf},
    programs::{ProbeContext, RetProbeContext},
};
use aya_log_ebpf::debug;
use gotrace_common::{
    BoundaryProbe, CorrelationStore, EventTransport, ProbeError, ProbeLayout, Register,
    Reservation, TrapContext, UserMemory, GO_AMD64, MAX_IN_FLIGHT_CALLS,
};

// ============================================================================
// eBPF Maps - Shared data structures between kernel and userspace
// ============================================================================

/// Entry events, consumed by userspace with `ring_buf.next()`
#[map]
static CALL_EVENTS: RingBuf = RingBuf::with_byte_size(256 * 1024, 0);

/// Return events. Kept apart from `CALL_EVENTS` so each buffer holds one
/// record shape.
#[map]
static RETURN_EVENTS: RingBuf = RingBuf::with_byte_size(256 * 1024, 0);

/// Map: Thread ID (TID) → entry timestamp
///
/// LRU so that entries whose return is never seen (panics, goroutine
/// migration, detached uretprobe) age out under pressure instead of filling
/// the table.
#[map]
static CALL_STARTS: LruHashMap<u32, u64> = LruHashMap::with_max_entries(MAX_IN_FLIGHT_CALLS, 0);

/// Map: Config key → Config value
///
/// - **Key 0..=3**: 1-based ABI slots for entry ptr/len and return ptr/len
#[map]
static CONFIG: HashMap<u32, u64> = HashMap::with_max_entries(16, 0);

// ============================================================================
// Handles over the maps
// ============================================================================

/// Register snapshot from a uprobe or uretprobe context.
struct Trap {
    regs: *const pt_regs,
}

impl UserMemory for Trap {
    fn read_user(&self, addr: u64, dst: &mut [u8]) -> Result<(), i64> {
        unsafe { bpf_probe_read_user_buf(addr as *const u8, dst).map_err(i64::from) }
    }
}

impl TrapContext for Trap {
    fn register(&self, reg: Register) -> u64 {
        let regs = unsafe { &*self.regs };
        match reg {
            Register::Rax => regs.rax,
            Register::Rbx => regs.rbx,
            Register::Rcx => regs.rcx,
            Register::Rdi => regs.rdi,
            Register::Rsi => regs.rsi,
            Register::R8 => regs.r8,
            Register::R9 => regs.r9,
            Register::R10 => regs.r10,
            Register::R11 => regs.r11,
            Register::Rip => regs.rip,
            Register::Rsp => regs.rsp,
        }
    }

    fn now_ns(&self) -> u64 {
        unsafe { bpf_ktime_get_ns() }
    }

    fn thread_id(&self) -> u32 {
        // Lower half of pid_tgid is the kernel thread id
        unsafe { bpf_get_current_pid_tgid() as u32 }
    }
}

struct Starts(&'static LruHashMap<u32, u64>);

impl CorrelationStore for Starts {
    fn start_of(&self, thread_id: u32) -> Option<u64> {
        unsafe { self.0.get(&thread_id).copied() }
    }

    fn record_start(&self, thread_id: u32, timestamp_ns: u64) {
        // BPF_ANY: overwrite a pending entry from a reentrant call
        let _ = self.0.insert(&thread_id, &timestamp_ns, 0);
    }

    fn clear(&self, thread_id: u32) {
        let _ = self.0.remove(&thread_id);
    }
}

struct Ring(&'static RingBuf);

struct Reserved<T: 'static>(RingBufEntry<T>);

impl<T: 'static> EventTransport<T> for Ring {
    type Slot = Reserved<T>;

    fn reserve(&self) -> Option<Reserved<T>> {
        self.0.reserve::<T>(0).map(Reserved)
    }
}

impl<T: 'static> Reservation<T> for Reserved<T> {
    fn commit(mut self, record: T) {
        self.0.write(record);
        self.0.submit(0);
    }

    fn discard(self) {
        self.0.discard(0);
    }
}

fn layout() -> ProbeLayout {
    ProbeLayout::from_config(|key| unsafe { CONFIG.get(&key).copied() })
}

// ============================================================================
// eBPF Program Hooks
// ============================================================================

/// Hook: first instruction of a traced Go function
#[uprobe]
pub fn go_call_entry(ctx: ProbeContext) -> u32 {
    let trap = Trap { regs: ctx.regs };
    let (starts, calls, returns) =
        (Starts(&CALL_STARTS), Ring(&CALL_EVENTS), Ring(&RETURN_EVENTS));
    let probe = BoundaryProbe::new(&GO_AMD64, layout(), &starts, &calls, &returns);

    match probe.on_entry(&trap) {
        Ok(_) => 0,
        Err(ProbeError::BoundsViolation { declared }) => {
            debug!(&ctx, "entry: length {} out of bounds, call dropped", declared);
            1
        }
        Err(_) => 1,
    }
}

/// Hook: return address of a traced Go function
#[uretprobe]
pub fn go_call_exit(ctx: RetProbeContext) -> u32 {
    let trap = Trap { regs: ctx.regs };
    let (starts, calls, returns) =
        (Starts(&CALL_STARTS), Ring(&CALL_EVENTS), Ring(&RETURN_EVENTS));
    let probe = BoundaryProbe::new(&GO_AMD64, layout(), &starts, &calls, &returns);

    match probe.on_exit(&trap) {
        Ok(record) => {
            if let Err(ProbeError::BoundsViolation { declared }) = record.payload {
                debug!(&ctx, "exit: return length {} out of bounds, payload empty", declared);
            }
            0
        }
        Err(_) => 1,
    }
}

#[cfg(all(not(test), target_os = "none"))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}
