//! The legalizer (component D): turns an abstract [`StackItem`] into a
//! concrete register the emitter can operate on, materializing literals,
//! loading locals, and dereferencing computed addresses as needed.
//!
//! Grounded on the lazy-materialization design read directly off
//! `jitc_asm_load`/`jitc_asm_lstack` in `platform/x86_64.c`: a `load` never
//! emits a memory read by itself, it just leaves an address tagged
//! `LvalueAbs`; the read happens here, inside whichever instruction
//! actually consumes the value. Popping and re-pushing an already-resident
//! `Rvalue` is a deliberate no-op round trip (see the doc comment on
//! [`ensure_int_reg`]) that keeps every call site uniform.

use super::emit::{Emitter, Mem};
use super::reg::{self, Reg, Xmm};
use super::table::Width;
use crate::ir::ValueKind;
use crate::opstack::{OperandStack, Slot, StackItem};

pub(crate) fn int_reg_of(item: &StackItem) -> Reg {
    match item {
        StackItem::Rvalue { slot, .. } | StackItem::LvalueAbs { slot, .. } => reg::int_reg(*slot),
        _ => unreachable!("int_reg_of called on a non-pooled item"),
    }
}

pub(crate) fn float_reg_of(item: &StackItem) -> Xmm {
    match item {
        StackItem::Rvalue { slot, .. } | StackItem::LvalueAbs { slot, .. } => reg::float_reg(*slot),
        _ => unreachable!("float_reg_of called on a non-pooled item"),
    }
}

/// Pop the top item and guarantee it now lives in an integer register,
/// returning that register. An item already resident in a register round
/// trips through `pop`+`push_rvalue`: `pop` frees its round-robin slot and
/// `push_rvalue` immediately reclaims the same index, so the net effect on
/// both the physical register and the allocator's bookkeeping is a no-op —
/// this lets every IR opcode handler call through one function regardless
/// of which `StackItem` variant it finds on top.
pub fn ensure_int_reg(em: &mut Emitter, stack: &mut OperandStack, frame: Reg) -> Reg {
    let item = stack.pop();
    match item {
        StackItem::Rvalue { slot, kind, unsigned } => {
            let new = stack.push_rvalue(kind, unsigned);
            let dst = int_reg_of(new);
            let src = reg::int_reg(slot);
            if dst != src {
                em.mov_reg_reg(Width::of(kind), dst, src);
            }
            dst
        }
        StackItem::Literal { value, kind, unsigned } => {
            let new = stack.push_rvalue(kind, unsigned);
            let dst = int_reg_of(new);
            em.mov_reg_imm(Width::of(kind), dst, value);
            dst
        }
        StackItem::Lvalue { offset, kind, unsigned } => {
            let new = stack.push_rvalue(kind, unsigned);
            let dst = int_reg_of(new);
            em.mov_reg_mem(Width::of(kind), dst, Mem::new(frame, offset));
            dst
        }
        StackItem::LvalueAbs { slot, extra_offset, kind, unsigned } => {
            let addr = reg::int_reg(slot);
            let new = stack.push_rvalue(kind, unsigned);
            let dst = int_reg_of(new);
            em.mov_reg_mem(Width::of(kind), dst, Mem::new(addr, extra_offset));
            dst
        }
    }
}

/// Like [`ensure_int_reg`] but for the XMM pool.
pub fn ensure_float_reg(em: &mut Emitter, stack: &mut OperandStack, frame: Reg) -> Xmm {
    let item = stack.pop();
    let is_double = item.kind() == ValueKind::F64;
    match item {
        StackItem::Rvalue { slot, .. } => {
            let (kind, unsigned) = (item.kind(), item.is_unsigned());
            let new = stack.push_rvalue(kind, unsigned);
            let dst = float_reg_of(new);
            let src = reg::float_reg(slot);
            if dst != src {
                em.movss_sd(is_double, dst, src);
            }
            dst
        }
        StackItem::Literal { .. } => {
            unreachable!("float literals are materialized via a rip-relative load, handled in lower.rs")
        }
        StackItem::Lvalue { offset, kind, unsigned } => {
            let new = stack.push_rvalue(kind, unsigned);
            let dst = float_reg_of(new);
            em.load_float(dst, Mem::new(frame, offset), is_double);
            dst
        }
        StackItem::LvalueAbs { slot, extra_offset, kind, unsigned } => {
            let addr = reg::int_reg(slot);
            let new = stack.push_rvalue(kind, unsigned);
            let dst = float_reg_of(new);
            em.load_float(dst, Mem::new(addr, extra_offset), is_double);
            dst
        }
    }
}

/// Find the `[base+disp]` operand for a target without consuming it
/// through a register — used by `store`/`sadd`/... so a read-modify-write
/// accumulate op touches memory once instead of load-then-store.
pub fn target_mem(item: &StackItem, frame: Reg) -> Mem {
    match item {
        StackItem::Lvalue { offset, .. } => Mem::new(frame, *offset),
        StackItem::LvalueAbs { slot, extra_offset, .. } => Mem::new(reg::int_reg(*slot), *extra_offset),
        other => unreachable!("{other:?} is not an addressable assignment target"),
    }
}

pub fn is_addressable(item: &StackItem) -> bool {
    item.is_addressable()
}

pub fn slot_of(item: &StackItem) -> Option<Slot> {
    match item {
        StackItem::Rvalue { slot, .. } | StackItem::LvalueAbs { slot, .. } => Some(*slot),
        _ => None,
    }
}
