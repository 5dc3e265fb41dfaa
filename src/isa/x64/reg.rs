//! x86-64 register naming and the operand-stack pool assignment.
//!
//! Grounded on `platform/x86_64.c`'s `reg_t` enum and its two pool arrays
//! (`stack_regs`/`stack_xmms`): the operand stack never hands out `rax`,
//! `rcx`, `rdx`, or `rsp`/`rbp` — those are reserved for instruction
//! sequences that need a scratch register (`idiv`'s `rax:rdx` pair, shift
//! counts in `rcx`) or are the frame/stack pointers. `rdi`/`rsi`/`r8`-`r9`
//! are also excluded: the SysV ABI argument registers, kept free so a call
//! doesn't have to shuffle live operand-stack values out of the way first.

use crate::opstack::Slot;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Reg {
    Rax, Rcx, Rdx, Rbx, Rsp, Rbp, Rsi, Rdi,
    R8, R9, R10, R11, R12, R13, R14, R15,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Xmm {
    Xmm0, Xmm1, Xmm2, Xmm3, Xmm4, Xmm5, Xmm6, Xmm7,
    Xmm8, Xmm9, Xmm10, Xmm11, Xmm12, Xmm13, Xmm14, Xmm15,
}

impl Reg {
    /// The 4-bit encoding (ModRM/SIB reg field is only the low 3 bits; the
    /// 4th selects REX.B/R/X).
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn low3(self) -> u8 {
        self.code() & 0b111
    }

    pub fn needs_rex_extension(self) -> bool {
        self.code() & 0b1000 != 0
    }

    /// True for `spl`/`bpl`/`sil`/`dil`, whose 8-bit encoding requires a
    /// REX prefix to disambiguate from the legacy `ah`/`ch`/`dh`/`bh`.
    pub fn needs_rex_for_8bit(self) -> bool {
        matches!(self, Reg::Rsp | Reg::Rbp | Reg::Rsi | Reg::Rdi)
    }

    pub fn name(self) -> &'static str {
        match self {
            Reg::Rax => "rax", Reg::Rcx => "rcx", Reg::Rdx => "rdx", Reg::Rbx => "rbx",
            Reg::Rsp => "rsp", Reg::Rbp => "rbp", Reg::Rsi => "rsi", Reg::Rdi => "rdi",
            Reg::R8 => "r8", Reg::R9 => "r9", Reg::R10 => "r10", Reg::R11 => "r11",
            Reg::R12 => "r12", Reg::R13 => "r13", Reg::R14 => "r14", Reg::R15 => "r15",
        }
    }
}

impl Xmm {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn low3(self) -> u8 {
        self.code() & 0b111
    }

    pub fn needs_rex_extension(self) -> bool {
        self.code() & 0b1000 != 0
    }
}

/// The round-robin integer pool, in allocation order. Matches
/// `stack_regs[]` in `platform/x86_64.c`.
pub const INT_POOL: [Reg; crate::opstack::NUM_REG_SLOTS] =
    [Reg::Rbx, Reg::R12, Reg::R13, Reg::R14, Reg::R15, Reg::R10, Reg::R11];

/// The round-robin float pool, matching `stack_xmms[]`.
pub const FLOAT_POOL: [Xmm; crate::opstack::NUM_REG_SLOTS] = [
    Xmm::Xmm8, Xmm::Xmm9, Xmm::Xmm10, Xmm::Xmm11, Xmm::Xmm12, Xmm::Xmm13, Xmm::Xmm14,
];

/// Resolve a pooled [`Slot`] to a concrete integer register. Panics on
/// `Slot::Spill` — callers must check [`Slot`] first and route spills
/// through the native-stack spill area instead.
pub fn int_reg(slot: Slot) -> Reg {
    match slot {
        Slot::Reg(i) => INT_POOL[i],
        Slot::Spill(_) => panic!("int_reg called on a spilled slot"),
    }
}

pub fn float_reg(slot: Slot) -> Xmm {
    match slot {
        Slot::Reg(i) => FLOAT_POOL[i],
        Slot::Spill(_) => panic!("float_reg called on a spilled slot"),
    }
}

/// Callee-saved registers this back end's prologue/epilogue pushes and
/// pops, beyond `rbp` itself — exactly the pooled integer registers, since
/// they must survive across calls the same way a local variable would.
pub const CALLEE_SAVED: [Reg; 5] = [Reg::Rbx, Reg::R12, Reg::R13, Reg::R14, Reg::R15];

/// SysV integer argument registers, in order.
pub const SYSV_INT_ARGS: [Reg; 6] = [Reg::Rdi, Reg::Rsi, Reg::Rdx, Reg::Rcx, Reg::R8, Reg::R9];
pub const SYSV_FLOAT_ARGS: [Xmm; 8] = [
    Xmm::Xmm0, Xmm::Xmm1, Xmm::Xmm2, Xmm::Xmm3, Xmm::Xmm4, Xmm::Xmm5, Xmm::Xmm6, Xmm::Xmm7,
];

/// Win64 integer argument registers — positional, shared with the floating
/// pool index (arg *i* is either `WIN64_INT_ARGS[i]` or `WIN64_FLOAT_ARGS[i]`,
/// never both at once, per `platform/win-x86_64.c`'s `jitc_asm_func`).
pub const WIN64_INT_ARGS: [Reg; 4] = [Reg::Rcx, Reg::Rdx, Reg::R8, Reg::R9];
pub const WIN64_FLOAT_ARGS: [Xmm; 4] = [Xmm::Xmm0, Xmm::Xmm1, Xmm::Xmm2, Xmm::Xmm3];
