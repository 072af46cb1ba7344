//! # Boundary Handlers
//!
//! The entry/exit handler pair that runs in uprobe context every time a
//! traced function is called or returns.
//!
//! Handlers never block and never retry. Every failure is a local early
//! return; the traced process never observes one. The only trace left by a
//! failure is a missing (entry) or payload-less (exit) event.
//!
//! ## Shared state
//!
//! The correlation store and both transports are handed in as explicit
//! handles when the [`BoundaryProbe`] is built. In BPF they wrap `#[map]`
//! statics; in tests they wrap in-memory doubles.
//!
//! ## Reentrancy
//!
//! Correlation is keyed by thread id only. A recursive or reentrant call on
//! the same thread overwrites the pending entry, so the outer return either
//! reports the inner call's start or finds nothing. That loss of precision is
//! accepted; it is never treated as an error.

use crate::abi::{CallingConvention, Register, Slot};
use crate::bounded::{bounded_copy, UserMemory};
use crate::{CallEvent, ReturnEvent};

/// Why a handler run lost (part of) its event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeError {
    /// No transport slot could be reserved; nothing was emitted.
    TransportFull,
    /// Declared length was negative, disallowed zero, or at/over capacity.
    BoundsViolation { declared: i64 },
    /// Reading the traced process's memory faulted.
    CopyFault { code: i64 },
}

/// Register snapshot and host services available inside a trap.
pub trait TrapContext: UserMemory {
    /// Raw value of `reg` at the probed instruction.
    fn register(&self, reg: Register) -> u64;

    /// Monotonic host clock in nanoseconds.
    fn now_ns(&self) -> u64;

    /// Id of the thread that hit the probe.
    fn thread_id(&self) -> u32;
}

/// Thread id → entry timestamp table.
///
/// All methods take `&self`: the store is shared by every CPU running a
/// handler and must be safe for concurrent use.
pub trait CorrelationStore {
    fn start_of(&self, thread_id: u32) -> Option<u64>;

    /// Insert or overwrite. A full table may silently evict or refuse.
    fn record_start(&self, thread_id: u32, timestamp_ns: u64);

    fn clear(&self, thread_id: u32);
}

/// Fixed-capacity multi-producer transport of `T` records.
pub trait EventTransport<T> {
    type Slot: Reservation<T>;

    /// Reserve space for one record, `None` when full.
    fn reserve(&self) -> Option<Self::Slot>;
}

/// A reserved transport slot. Exactly one of `commit`/`discard` must run.
pub trait Reservation<T> {
    /// Publish `record`; consumers see it whole or not at all.
    fn commit(self, record: T);

    /// Release the slot without publishing anything.
    fn discard(self);
}

/// Which ABI slots carry the traced string at entry and at return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeLayout {
    pub entry_ptr: Slot,
    pub entry_len: Slot,
    pub return_ptr: Slot,
    pub return_len: Slot,
}

impl ProbeLayout {
    /// A `string` second parameter and a `string` first result, e.g.
    /// `func getUserByID(id int, name string) string`.
    pub const DEFAULT: Self = Self {
        entry_ptr: Slot::S2,
        entry_len: Slot::S3,
        return_ptr: Slot::S1,
        return_len: Slot::S2,
    };

    /// Build a layout from raw config values, keeping the default for any
    /// value that is missing or not a valid slot.
    #[must_use]
    pub fn from_config(lookup: impl Fn(u32) -> Option<u64>) -> Self {
        let pick = |key: u32, fallback: Slot| {
            lookup(key).and_then(Slot::from_index).unwrap_or(fallback)
        };
        Self {
            entry_ptr: pick(crate::CONFIG_ENTRY_PTR_SLOT, Self::DEFAULT.entry_ptr),
            entry_len: pick(crate::CONFIG_ENTRY_LEN_SLOT, Self::DEFAULT.entry_len),
            return_ptr: pick(crate::CONFIG_RETURN_PTR_SLOT, Self::DEFAULT.return_ptr),
            return_len: pick(crate::CONFIG_RETURN_LEN_SLOT, Self::DEFAULT.return_len),
        }
    }
}

impl Default for ProbeLayout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// What the exit handler managed to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitRecord {
    /// Length of the copied return value, or why it is empty.
    pub payload: Result<usize, ProbeError>,
    /// Elapsed time, if a matching entry was found.
    pub elapsed_ns: Option<u64>,
}

/// Entry/exit handler pair bound to its shared resources.
pub struct BoundaryProbe<'a, S, C, R> {
    abi: &'a CallingConvention,
    layout: ProbeLayout,
    starts: &'a S,
    calls: &'a C,
    returns: &'a R,
}

impl<'a, S, C, R> BoundaryProbe<'a, S, C, R>
where
    S: CorrelationStore,
    C: EventTransport<CallEvent>,
    R: EventTransport<ReturnEvent>,
{
    pub fn new(
        abi: &'a CallingConvention,
        layout: ProbeLayout,
        starts: &'a S,
        calls: &'a C,
        returns: &'a R,
    ) -> Self {
        Self { abi, layout, starts, calls, returns }
    }

    /// Handle a function entry: copy the traced argument, remember the start
    /// time for this thread, and emit a [`CallEvent`].
    ///
    /// Returns the number of payload bytes emitted.
    ///
    /// # Errors
    /// [`ProbeError::TransportFull`] leaves everything untouched. A bounds or
    /// copy failure releases the reserved slot and leaves the correlation
    /// store untouched.
    pub fn on_entry<T: TrapContext + ?Sized>(&self, ctx: &T) -> Result<usize, ProbeError> {
        let slot = self.calls.reserve().ok_or(ProbeError::TransportFull)?;

        let src = ctx.register(self.abi.arg(self.layout.entry_ptr));
        let declared = as_go_int(ctx.register(self.abi.arg(self.layout.entry_len)));

        let mut event = CallEvent::zeroed();
        let len = match bounded_copy(ctx, src, declared, &mut event.payload, true) {
            Ok(len) => len,
            Err(e) => {
                slot.discard();
                return Err(e);
            }
        };

        #[allow(clippy::cast_possible_truncation)]
        let length = len as u32;
        event.length = length;
        event.thread_id = ctx.thread_id();
        event.timestamp_ns = ctx.now_ns();

        self.starts.record_start(event.thread_id, event.timestamp_ns);
        slot.commit(event);
        Ok(len)
    }

    /// Handle a function return: copy the returned string, pair with the
    /// pending entry for this thread, and emit a [`ReturnEvent`].
    ///
    /// An unreadable return value still produces an event with an empty
    /// payload, since the timing is useful on its own.
    ///
    /// # Errors
    /// Only [`ProbeError::TransportFull`], in which case the pending entry is
    /// left in place.
    pub fn on_exit<T: TrapContext + ?Sized>(&self, ctx: &T) -> Result<ExitRecord, ProbeError> {
        let thread_id = ctx.thread_id();
        let start = self.starts.start_of(thread_id);

        let slot = self.returns.reserve().ok_or(ProbeError::TransportFull)?;

        let mut event = ReturnEvent::zeroed();
        event.thread_id = thread_id;

        let src = ctx.register(self.abi.ret(self.layout.return_ptr));
        let declared = as_go_int(ctx.register(self.abi.ret(self.layout.return_len)));
        let payload = bounded_copy(ctx, src, declared, &mut event.payload, true);

        let now = ctx.now_ns();
        event.timestamp_ns = now;

        let elapsed_ns = start.map(|start| now.saturating_sub(start));
        if let Some(elapsed) = elapsed_ns {
            event.elapsed_ns = elapsed;
            event.present = 1;
            self.starts.clear(thread_id);
        }

        slot.commit(event);
        Ok(ExitRecord { payload, elapsed_ns })
    }
}

/// Go's `int` is a signed 64-bit value held in a full register.
#[allow(clippy::cast_possible_wrap)]
const fn as_go_int(raw: u64) -> i64 {
    raw as i64
}
