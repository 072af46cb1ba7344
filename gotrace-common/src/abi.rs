//! Calling-convention table for Go's register ABI (`ABIInternal`) on amd64.
//!
//! Go passes the first nine integer-class arguments in
//! RAX, RBX, RCX, RDI, RSI, R8, R9, R10, R11 and returns results in the same
//! sequence. A `string` takes two consecutive slots: data pointer, then length.
//!
//! Slots are an enum rather than an integer so an unmapped slot cannot be
//! written down; lookups are a plain array index.

/// Number of integer register slots in the Go amd64 ABI.
pub const SLOT_COUNT: usize = 9;

/// Physical registers exposed by the trap context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Rax,
    Rbx,
    Rcx,
    Rdi,
    Rsi,
    R8,
    R9,
    R10,
    R11,
    /// Program counter
    Rip,
    /// Stack pointer
    Rsp,
}

/// Abstract argument/result position, 1-based as in the function signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Slot {
    S1 = 1,
    S2 = 2,
    S3 = 3,
    S4 = 4,
    S5 = 5,
    S6 = 6,
    S7 = 7,
    S8 = 8,
    S9 = 9,
}

impl Slot {
    /// 1-based position of this slot.
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Slot for a 1-based position, `None` outside `1..=9`.
    #[must_use]
    pub const fn from_index(index: u64) -> Option<Self> {
        match index {
            1 => Some(Self::S1),
            2 => Some(Self::S2),
            3 => Some(Self::S3),
            4 => Some(Self::S4),
            5 => Some(Self::S5),
            6 => Some(Self::S6),
            7 => Some(Self::S7),
            8 => Some(Self::S8),
            9 => Some(Self::S9),
            _ => None,
        }
    }

    const fn offset(self) -> usize {
        self as usize - 1
    }
}

/// Maps argument and result slots to the registers that hold them at
/// handler invocation time.
#[derive(Debug, Clone, Copy)]
pub struct CallingConvention {
    args: [Register; SLOT_COUNT],
    results: [Register; SLOT_COUNT],
    pc: Register,
    sp: Register,
}

impl CallingConvention {
    /// Register holding argument `slot` at function entry.
    #[must_use]
    pub const fn arg(&self, slot: Slot) -> Register {
        self.args[slot.offset()]
    }

    /// Register holding result `slot` at function return.
    #[must_use]
    pub const fn ret(&self, slot: Slot) -> Register {
        self.results[slot.offset()]
    }

    #[must_use]
    pub const fn pc(&self) -> Register {
        self.pc
    }

    #[must_use]
    pub const fn sp(&self) -> Register {
        self.sp
    }
}

const GO_AMD64_INT_REGS: [Register; SLOT_COUNT] = [
    Register::Rax,
    Register::Rbx,
    Register::Rcx,
    Register::Rdi,
    Register::Rsi,
    Register::R8,
    Register::R9,
    Register::R10,
    Register::R11,
];

/// Go 1.17+ `ABIInternal` on amd64.
pub const GO_AMD64: CallingConvention = CallingConvention {
    args: GO_AMD64_INT_REGS,
    results: GO_AMD64_INT_REGS,
    pc: Register::Rip,
    sp: Register::Rsp,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_amd64_argument_order() {
        assert_eq!(GO_AMD64.arg(Slot::S1), Register::Rax);
        assert_eq!(GO_AMD64.arg(Slot::S2), Register::Rbx);
        assert_eq!(GO_AMD64.arg(Slot::S3), Register::Rcx);
        assert_eq!(GO_AMD64.arg(Slot::S4), Register::Rdi);
        assert_eq!(GO_AMD64.arg(Slot::S9), Register::R11);
    }

    #[test]
    fn string_result_uses_rax_rbx() {
        assert_eq!(GO_AMD64.ret(Slot::S1), Register::Rax);
        assert_eq!(GO_AMD64.ret(Slot::S2), Register::Rbx);
    }

    #[test]
    fn slot_index_round_trips() {
        for i in 1..=9u64 {
            let slot = Slot::from_index(i).unwrap();
            assert_eq!(u64::from(slot.index()), i);
        }
        assert_eq!(Slot::from_index(0), None);
        assert_eq!(Slot::from_index(10), None);
    }
}
