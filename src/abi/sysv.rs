//! The System V AMD64 calling convention, grounded on
//! `arch/sysv-x86_64.c`'s `jitc_asm_func`/`jitc_asm_call`: six integer
//! argument registers, eight XMM argument registers, independent counters
//! for each, no shadow space, and four extra callee-saved GPRs
//! (`rbx`,`r12`-`r15`) beyond `rbp`.

use super::Abi;
use crate::isa::x64::reg::{self, Reg, Xmm};

pub struct SysV;

impl Abi for SysV {
    fn int_arg_regs(&self) -> &'static [Reg] {
        &reg::SYSV_INT_ARGS
    }

    fn float_arg_regs(&self) -> &'static [Xmm] {
        &reg::SYSV_FLOAT_ARGS
    }

    fn shadow_space(&self) -> i32 {
        0
    }

    fn shares_arg_index(&self) -> bool {
        false
    }

    fn max_register_aggregate_bytes(&self) -> u64 {
        16
    }

    fn callee_saved(&self) -> &'static [Reg] {
        &reg::CALLEE_SAVED
    }

    fn variadic_float_count_in_al(&self) -> bool {
        true
    }
}
