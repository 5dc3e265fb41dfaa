//! Condition-code mapping from the portable [`crate::ir::Cond`] to the
//! x86-64 `Jcc`/`SETcc` opcode suffix bytes, grounded on the `jz`/`jnz`/
//! `sete`/`setne`/`setl`/`setle`/`setg`/`setge` table rows in
//! `platform/x86_64.c`.

use crate::ir::Cond;

impl Cond {
    /// Second opcode byte of the two-byte `0F 8x` near-`Jcc` encoding.
    pub fn jcc_opcode(self) -> u8 {
        match self {
            Cond::Eq => 0x84,
            Cond::Ne => 0x85,
            Cond::Lt => 0x8C,
            Cond::Le => 0x8E,
            Cond::Gt => 0x8F,
            Cond::Ge => 0x8D,
        }
    }

    /// Second opcode byte of the two-byte `0F 9x` `SETcc` encoding.
    pub fn setcc_opcode(self) -> u8 {
        match self {
            Cond::Eq => 0x94,
            Cond::Ne => 0x95,
            Cond::Lt => 0x9C,
            Cond::Le => 0x9E,
            Cond::Gt => 0x9F,
            Cond::Ge => 0x9D,
        }
    }

    /// The condition that holds exactly when `self` does not — used by
    /// `land`/`lor` to invert a jump-over-short-circuit test.
    pub fn negate(self) -> Cond {
        match self {
            Cond::Eq => Cond::Ne,
            Cond::Ne => Cond::Eq,
            Cond::Lt => Cond::Ge,
            Cond::Le => Cond::Gt,
            Cond::Gt => Cond::Le,
            Cond::Ge => Cond::Lt,
        }
    }
}
