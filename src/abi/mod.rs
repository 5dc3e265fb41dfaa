//! Calling convention lowering (component F, §4.5): where each parameter
//! and the return value live, and the concrete prologue/epilogue/call
//! sequence built around that.
//!
//! Grounded on two original sources that implement the *same* IR-level
//! operations for two different conventions: `platform/x86_64.c`'s SysV
//! `jitc_asm_func`/`jitc_asm_ret`/`jitc_asm_func_end`/`jitc_asm_call`
//! (read in the SysV-specific half of that file) and
//! `platform/win-x86_64.c`'s positional Win64 equivalents. Struct-by-value
//! classification follows only the simplified form either original
//! actually implements — return via a hidden pointer once a struct exceeds
//! one eightbyte — rather than the full eightbyte-class algorithm real
//! SysV uses; see DESIGN.md.

use crate::ir::ValueKind;
use crate::isa::x64::reg::{Reg, Xmm};
use crate::types::{TypeCache, TypeId};

pub mod sysv;
pub mod win64;

/// Where one argument/return value is passed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArgLocation {
    Int(Reg),
    Float(Xmm),
    /// Offset from the stack pointer at the call site, after the call's
    /// own stack allocation (shadow space / alignment padding).
    Stack(i32),
}

/// A fully classified call signature: one location per parameter plus how
/// the return value comes back.
pub struct CallLayout {
    pub args: Vec<ArgLocation>,
    pub ret: ReturnLocation,
    /// Bytes of outgoing stack space this call needs beyond the return
    /// address (stack-passed args + shadow space + alignment padding).
    pub stack_bytes: i32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReturnLocation {
    Void,
    Int(Reg),
    Float(Xmm),
    /// The struct is returned by writing through a hidden pointer passed
    /// as an implicit first argument, which also comes back in `rax`.
    HiddenPointer,
}

/// One architecture's calling convention. Both impls share the same
/// scalar-vs-aggregate split; they differ only in which registers are
/// used and how many, matching how little actually differs between the
/// original's two platform files.
pub trait Abi {
    fn int_arg_regs(&self) -> &'static [Reg];
    fn float_arg_regs(&self) -> &'static [Xmm];
    /// Win64 reserves 32 bytes of "shadow space" the callee may spill its
    /// register args into; SysV reserves none.
    fn shadow_space(&self) -> i32;
    /// Win64 shares one running index between int and float args (arg *i*
    /// is always either `int_arg_regs()[i]` or `float_arg_regs()[i]`);
    /// SysV tracks two independent counters.
    fn shares_arg_index(&self) -> bool;
    /// Threshold above which an aggregate is passed/returned via a hidden
    /// pointer instead of packed into registers (8 bytes on Win64, 16 on
    /// SysV).
    fn max_register_aggregate_bytes(&self) -> u64;
    /// Callee-saved integer registers beyond `rbp`, pushed in the prologue
    /// and popped in reverse in the epilogue.
    fn callee_saved(&self) -> &'static [Reg];

    /// SysV requires `al` to hold the number of vector registers used to
    /// pass the variadic portion of a call to a `...`-declared function,
    /// so a variadic callee that saves its incoming XMM args (`va_start`)
    /// knows how many are actually live. Win64 has no such convention —
    /// its varargs are always passed positionally, never counted.
    fn variadic_float_count_in_al(&self) -> bool {
        false
    }

    fn classify_return(&self, cache: &TypeCache, ty: TypeId) -> ReturnLocation {
        let data = cache.get(ty);
        if data.is_void() {
            return ReturnLocation::Void;
        }
        if data.is_aggregate() {
            if data.size > self.max_register_aggregate_bytes() {
                return ReturnLocation::HiddenPointer;
            }
            return ReturnLocation::Int(self.int_arg_regs()[0]);
        }
        if data.is_float() {
            ReturnLocation::Float(self.float_arg_regs()[0])
        } else {
            ReturnLocation::Int(Reg::Rax)
        }
    }

    /// Classify every parameter, in order, returning one [`ArgLocation`]
    /// per parameter and the total outgoing stack footprint.
    fn classify_call(&self, cache: &TypeCache, params: &[TypeId], ret: TypeId) -> CallLayout {
        let ret_loc = self.classify_return(cache, ret);
        let mut int_idx = 0usize;
        let mut float_idx = 0usize;
        let mut stack_offset = 0i32;
        let mut args = Vec::with_capacity(params.len());

        for &ty in params {
            let data = cache.get(ty);
            let is_float = data.is_float() && !data.is_aggregate();
            let (idx, regs_len) = if self.shares_arg_index() {
                let i = int_idx;
                int_idx += 1;
                (i, self.int_arg_regs().len())
            } else if is_float {
                let i = float_idx;
                float_idx += 1;
                (i, self.float_arg_regs().len())
            } else {
                let i = int_idx;
                int_idx += 1;
                (i, self.int_arg_regs().len())
            };

            let passed_by_value_in_reg = !data.is_aggregate() || data.size <= self.max_register_aggregate_bytes();

            if passed_by_value_in_reg && idx < regs_len {
                args.push(if is_float {
                    ArgLocation::Float(self.float_arg_regs()[idx])
                } else {
                    ArgLocation::Int(self.int_arg_regs()[idx])
                });
            } else {
                let slot_size = data.size.max(8);
                args.push(ArgLocation::Stack(stack_offset));
                stack_offset += slot_size as i32;
            }
        }

        let mut stack_bytes = stack_offset + self.shadow_space();
        if matches!(ret_loc, ReturnLocation::HiddenPointer) {
            stack_bytes += 8;
        }
        if stack_bytes % 16 != 0 {
            stack_bytes += 16 - (stack_bytes % 16);
        }

        CallLayout {
            args,
            ret: ret_loc,
            stack_bytes,
        }
    }
}

/// Pick the ABI for a flags-selected calling convention.
pub fn for_call_conv(call_conv: crate::config::CallConv) -> Box<dyn Abi> {
    match call_conv {
        crate::config::CallConv::SystemV => Box::new(sysv::SysV),
        crate::config::CallConv::WindowsFastcall => Box::new(win64::Win64),
    }
}

pub(crate) fn value_kind_is_float(kind: ValueKind) -> bool {
    kind.is_float()
}
