//! The Microsoft x64 calling convention, grounded on
//! `platform/win-x86_64.c`'s positional scheme: argument *i* always
//! occupies integer slot *i* or float slot *i* (never both), only four
//! slots exist, the caller always reserves 32 bytes of shadow space, and
//! `rdi`/`rsi`/`xmm6`-`xmm15` join the callee-saved set.

use super::Abi;
use crate::isa::x64::reg::{self, Reg, Xmm};

pub struct Win64;

/// `reg::CALLEE_SAVED` (the pooled GPRs, `rbx`/`r12`-`r15`) plus the two
/// extra integer registers Win64 additionally preserves across calls; the
/// XMM half of the extra set (`xmm6`-`xmm15`) never needs listing here
/// since this back end never allocates an XMM register outside the
/// pooled `xmm8`-`xmm14` range.
const CALLEE_SAVED: [Reg; 7] = [
    Reg::Rbx,
    Reg::R12,
    Reg::R13,
    Reg::R14,
    Reg::R15,
    Reg::Rdi,
    Reg::Rsi,
];

impl Abi for Win64 {
    fn int_arg_regs(&self) -> &'static [Reg] {
        &reg::WIN64_INT_ARGS
    }

    fn float_arg_regs(&self) -> &'static [Xmm] {
        &reg::WIN64_FLOAT_ARGS
    }

    fn shadow_space(&self) -> i32 {
        32
    }

    fn shares_arg_index(&self) -> bool {
        true
    }

    fn max_register_aggregate_bytes(&self) -> u64 {
        8
    }

    fn callee_saved(&self) -> &'static [Reg] {
        &CALLEE_SAVED
    }
}
