//! IR-to-machine-code lowering (component H): the walk that turns one
//! function's [`IrStream`] into a finished byte buffer.
//!
//! Grounded on the three original platform files read together:
//! `arch/sysv-x86_64.c`'s opcode dispatch loop (the overall shape — one
//! `match` arm per IR opcode, threading the operand stack and branch
//! fixups through), `platform/x86_64.c`'s SysV `jitc_asm_*` handlers (the
//! read-modify-write shape of the store-accumulating opcodes), and
//! `platform/win-x86_64.c` for the Win64 half of calls/prologues — unified
//! here behind the single [`crate::abi::Abi`] trait so one lowering pass
//! serves both conventions.
//!
//! Control flow has no direct analogue to copy: the original's `if`/`loop`
//! desugar to the same `If/Then/Else/End/GotoStart/GotoEnd` shape this
//! back end uses, disambiguated the same way here — a branch frame starts
//! as "not a loop" and only becomes one the moment a `GotoStart` targets it
//! (sound because `break`/`continue` can only appear inside statement
//! positions, never inside an unclosed ternary's expression arms). The
//! ternary's own "jump past the else arm" site is tracked in a small local
//! stack (`else_skip`) kept separate from [`BranchStacks`]'s `end_sites`,
//! which is reserved for `break` and must inherit outward to the nearest
//! real loop.

use std::collections::HashMap;

use crate::abi::{Abi, ArgLocation, ReturnLocation};
use crate::ast::FunctionSig;
use crate::error::{CompileError, CompileResult};
use crate::ir::fixup::BranchStacks;
use crate::ir::{Cond, IROp, IrStream, ValueKind};
use crate::opstack::{OperandStack, StackItem};
use crate::types::{align_to, TypeCache, TypeId};

use super::buffer::CodeBuffer;
use super::emit::{Emitter, Mem};
use super::legalize;
use super::reg::{self, Reg, Xmm};
use super::table::Width;

/// Addresses of already-compiled (or externally registered) functions,
/// keyed by name. A direct call can only target something already in
/// here — this back end resolves calls eagerly at lowering time rather
/// than emitting relocations for forward references, so a [`crate::context::Context`]
/// must compile callees before their callers (see DESIGN.md).
pub type SymbolTable = HashMap<String, usize>;

/// Lower one function's IR stream into executable bytes, not yet copied
/// into an executable mapping (that's [`crate::exec_mem`]'s job).
pub fn lower_function(
    stream: &IrStream,
    abi: &dyn Abi,
    cache: &TypeCache,
    symbols: &SymbolTable,
) -> CompileResult<Vec<u8>> {
    let mut buf = CodeBuffer::new();
    let mut stack = OperandStack::new();
    let mut branches = BranchStacks::new();
    // Ternary's "skip past else" jump site, one slot per open `If` frame,
    // kept parallel to (but distinct from) `branches`.
    let mut else_skip: Vec<Option<usize>> = Vec::new();
    // Operand-stack depth snapshotted right before a `Then` arm runs, so
    // `Else` can tell whether the arm pushed a value to reconcile.
    let mut then_depth: Vec<usize> = Vec::new();
    // The physical register a short-circuit chain's final 0/1 result lives
    // in, reserved at `ScBegin` so every early-exit jump and the eventual
    // `ScEnd` write into the same place.
    let mut sc_result_regs: Vec<Reg> = Vec::new();
    let frame = Reg::Rbp;
    let mut stack_size: i32 = 0;
    let mut current_ret = ReturnLocation::Void;

    for op in stream {
        let mut em = Emitter::new(&mut buf);
        match op {
            IROp::Func { signature, stack_size: sz } => {
                current_ret = abi.classify_return(cache, signature.ret);
                stack_size = *sz as i32;
                em.push_reg(Reg::Rbp);
                em.mov_reg_reg(Width::W64, Reg::Rbp, Reg::Rsp);
                for &r in abi.callee_saved() {
                    em.push_reg(r);
                }
                em.adjust_stack(stack_size, true);
                store_incoming_args(&mut em, abi, cache, signature);
            }
            IROp::FuncEnd => {
                let sites = branches.take_return_sites();
                let here = em.buf.offset();
                for site in sites {
                    em.buf.patch_rel32(site, here);
                }
                em.adjust_stack(stack_size, false);
                for &r in abi.callee_saved().iter().rev() {
                    em.pop_reg(r);
                }
                em.pop_reg(Reg::Rbp);
                em.ret();
            }

            // --- data ---
            IROp::PushI { value, kind, unsigned } => stack.push_literal(*value, *kind, *unsigned),
            IROp::PushF(f) => stack.push_literal(f.to_bits() as u64, ValueKind::F32, false),
            IROp::PushD(d) => stack.push_literal(d.to_bits(), ValueKind::F64, false),
            IROp::Pop => {
                stack.pop();
            }
            IROp::LStack { offset, kind, unsigned } => stack.push_lvalue(*offset, *kind, *unsigned),
            IROp::LAddr { addr, kind, unsigned } => stack.push_literal(*addr as u64, *kind, *unsigned),
            IROp::Load { kind, unsigned } => {
                legalize::ensure_int_reg(&mut em, &mut stack, frame);
                stack.pop();
                stack.push_lvalue_abs(*kind, *unsigned);
            }
            IROp::Store => {
                stack.swap_top();
                let target = stack.pop();
                let mem = legalize::target_mem(&target, frame);
                if stack.peek(0).kind().is_float() {
                    let is_double = stack.peek(0).kind() == ValueKind::F64;
                    let r = ensure_float_reg(&mut em, &mut stack, frame);
                    em.store_float(mem, r, is_double);
                } else {
                    let width = Width::of(stack.peek(0).kind());
                    let r = legalize::ensure_int_reg(&mut em, &mut stack, frame);
                    em.mov_mem_reg(width, mem, r);
                }
            }

            // --- plain arithmetic ---
            IROp::Add => {
                if stack.peek(0).kind().is_float() {
                    binary_float(&mut em, &mut stack, frame, |em, d, dst, src| em.addss_sd(d, dst, src));
                } else {
                    binary_int_imm(
                        &mut em,
                        &mut stack,
                        frame,
                        |em, w, dst, src| em.add(w, dst, src),
                        |em, w, dst, imm| em.add_imm(w, dst, imm),
                    );
                }
            }
            IROp::Sub => {
                if stack.peek(0).kind().is_float() {
                    binary_float(&mut em, &mut stack, frame, |em, d, dst, src| em.subss_sd(d, dst, src));
                } else {
                    binary_int_imm(
                        &mut em,
                        &mut stack,
                        frame,
                        |em, w, dst, src| em.sub(w, dst, src),
                        |em, w, dst, imm| em.sub_imm(w, dst, imm),
                    );
                }
            }
            IROp::Mul => {
                if stack.peek(0).kind().is_float() {
                    binary_float(&mut em, &mut stack, frame, |em, d, dst, src| em.mulss_sd(d, dst, src));
                } else {
                    binary_int(&mut em, &mut stack, frame, |em, w, dst, src| em.imul(w, dst, src));
                }
            }
            IROp::Div => {
                if stack.peek(0).kind().is_float() {
                    binary_float(&mut em, &mut stack, frame, |em, d, dst, src| em.divss_sd(d, dst, src));
                } else {
                    let unsigned = stack.peek(0).is_unsigned();
                    binary_divmod(&mut em, &mut stack, frame, false, unsigned);
                }
            }
            IROp::Mod => {
                let unsigned = stack.peek(0).is_unsigned();
                binary_divmod(&mut em, &mut stack, frame, true, unsigned);
            }
            IROp::And => binary_int_imm(
                &mut em,
                &mut stack,
                frame,
                |em, w, dst, src| em.and(w, dst, src),
                |em, w, dst, imm| em.and_imm(w, dst, imm),
            ),
            IROp::Or => binary_int_imm(
                &mut em,
                &mut stack,
                frame,
                |em, w, dst, src| em.or(w, dst, src),
                |em, w, dst, imm| em.or_imm(w, dst, imm),
            ),
            IROp::Xor => binary_int_imm(
                &mut em,
                &mut stack,
                frame,
                |em, w, dst, src| em.xor(w, dst, src),
                |em, w, dst, imm| em.xor_imm(w, dst, imm),
            ),
            IROp::Shl => binary_shift(&mut em, &mut stack, frame, false),
            IROp::Shr => binary_shift(&mut em, &mut stack, frame, true),

            // --- store-accumulating arithmetic ---
            IROp::SAdd => {
                if stack.peek(1).kind().is_float() {
                    compound_float(&mut em, &mut stack, frame, |em, d, acc, rhs| em.addss_sd(d, acc, rhs));
                } else {
                    compound_int(&mut em, &mut stack, frame, |em, w, rhs, _| em.add(w, Reg::Rax, rhs));
                }
            }
            IROp::SSub => {
                if stack.peek(1).kind().is_float() {
                    compound_float(&mut em, &mut stack, frame, |em, d, acc, rhs| em.subss_sd(d, acc, rhs));
                } else {
                    compound_int(&mut em, &mut stack, frame, |em, w, rhs, _| em.sub(w, Reg::Rax, rhs));
                }
            }
            IROp::SMul => {
                if stack.peek(1).kind().is_float() {
                    compound_float(&mut em, &mut stack, frame, |em, d, acc, rhs| em.mulss_sd(d, acc, rhs));
                } else {
                    compound_int(&mut em, &mut stack, frame, |em, w, rhs, _| em.imul(w, Reg::Rax, rhs));
                }
            }
            IROp::SDiv => {
                if stack.peek(1).kind().is_float() {
                    compound_float(&mut em, &mut stack, frame, |em, d, acc, rhs| em.divss_sd(d, acc, rhs));
                } else {
                    compound_int(&mut em, &mut stack, frame, |em, w, rhs, unsigned| {
                        if unsigned {
                            em.xor(w, Reg::Rdx, Reg::Rdx);
                            em.div(w, rhs);
                        } else {
                            em.cqo_idiv(w, rhs);
                        }
                    });
                }
            }
            IROp::SMod => compound_int(&mut em, &mut stack, frame, |em, w, rhs, unsigned| {
                if unsigned {
                    em.xor(w, Reg::Rdx, Reg::Rdx);
                    em.div(w, rhs);
                } else {
                    em.cqo_idiv(w, rhs);
                }
                em.mov_reg_reg(w, Reg::Rax, Reg::Rdx);
            }),
            IROp::SAnd => compound_int(&mut em, &mut stack, frame, |em, w, rhs, _| em.and(w, Reg::Rax, rhs)),
            IROp::SOr => compound_int(&mut em, &mut stack, frame, |em, w, rhs, _| em.or(w, Reg::Rax, rhs)),
            IROp::SXor => compound_int(&mut em, &mut stack, frame, |em, w, rhs, _| em.xor(w, Reg::Rax, rhs)),
            IROp::SShl => compound_int(&mut em, &mut stack, frame, |em, w, rhs, _| {
                em.mov_reg_reg(Width::W32, Reg::Rcx, rhs);
                em.shift_cl(w, Reg::Rax, false, false);
            }),
            IROp::SShr => compound_int(&mut em, &mut stack, frame, |em, w, rhs, unsigned| {
                em.mov_reg_reg(Width::W32, Reg::Rcx, rhs);
                em.shift_cl(w, Reg::Rax, true, !unsigned);
            }),

            // --- unary ---
            IROp::Not => {
                let r = legalize::ensure_int_reg(&mut em, &mut stack, frame);
                let width = Width::of(stack.peek(0).kind());
                em.not(width, r);
            }
            IROp::Neg => {
                let kind = stack.peek(0).kind();
                if kind.is_float() {
                    let is_double = kind == ValueKind::F64;
                    let x = ensure_float_reg(&mut em, &mut stack, frame);
                    stack.push_literal(0, kind, false);
                    let zero = ensure_float_reg(&mut em, &mut stack, frame);
                    em.subss_sd(is_double, zero, x);
                    stack.swap_top();
                    stack.pop();
                } else {
                    let r = legalize::ensure_int_reg(&mut em, &mut stack, frame);
                    em.neg(Width::of(kind), r);
                }
            }
            IROp::Zero => {
                let kind = stack.peek(0).kind();
                if kind.is_float() {
                    let is_double = kind == ValueKind::F64;
                    let x = ensure_float_reg(&mut em, &mut stack, frame);
                    stack.push_literal(0, kind, false);
                    let zero = ensure_float_reg(&mut em, &mut stack, frame);
                    em.ucomiss_sd(is_double, x, zero);
                    stack.pop();
                    stack.pop();
                    let new = stack.push_rvalue(ValueKind::I32, false);
                    let dst = legalize::int_reg_of(new);
                    em.setcc(Cond::Eq, dst);
                    em.movx(dst, dst, Width::W8, Width::W32, false);
                } else {
                    let width = Width::of(kind);
                    let r = legalize::ensure_int_reg(&mut em, &mut stack, frame);
                    em.test(width, r, r);
                    em.setcc(Cond::Eq, r);
                    em.movx(r, r, Width::W8, Width::W32, false);
                    retag_top(&mut stack, ValueKind::I32, false);
                }
            }
            IROp::Inc { suffix, step } => {
                let item = stack.pop();
                let mem = legalize::target_mem(&item, frame);
                let kind = item.kind();
                let unsigned = item.is_unsigned();
                if kind.is_float() {
                    let is_double = kind == ValueKind::F64;
                    let old = stack.push_rvalue(kind, unsigned);
                    let old_reg = legalize::float_reg_of(old);
                    em.load_float(old_reg, mem, is_double);
                    let step_bits = if is_double {
                        (*step as f64).to_bits()
                    } else {
                        (*step as f32).to_bits() as u64
                    };
                    stack.push_literal(step_bits, kind, unsigned);
                    let step_reg = ensure_float_reg(&mut em, &mut stack, frame);
                    em.addss_sd(is_double, step_reg, old_reg);
                    em.store_float(mem, step_reg, is_double);
                    if *suffix {
                        stack.pop();
                    } else {
                        stack.swap_top();
                        stack.pop();
                    }
                } else {
                    let width = Width::of(kind);
                    let old = stack.push_rvalue(kind, unsigned);
                    let old_reg = legalize::int_reg_of(old);
                    em.mov_reg_mem(width, old_reg, mem);
                    em.mov_reg_reg(width, Reg::Rax, old_reg);
                    match *step {
                        1 => em.inc(width, Reg::Rax),
                        -1 => em.dec(width, Reg::Rax),
                        s => em.add_imm(width, Reg::Rax, s),
                    }
                    em.mov_mem_reg(width, mem, Reg::Rax);
                    if !*suffix {
                        em.mov_reg_reg(width, old_reg, Reg::Rax);
                    }
                }
            }
            IROp::AddrOf => {
                let item = stack.pop();
                match item {
                    StackItem::Lvalue { offset, .. } => {
                        let new = stack.push_rvalue(ValueKind::Ptr, true);
                        let dst = legalize::int_reg_of(new);
                        em.lea(dst, Mem::new(frame, offset));
                    }
                    StackItem::LvalueAbs { slot, extra_offset, .. } => {
                        let addr_reg = reg::int_reg(slot);
                        let new = stack.push_rvalue(ValueKind::Ptr, true);
                        let dst = legalize::int_reg_of(new);
                        if extra_offset == 0 {
                            if dst != addr_reg {
                                em.mov_reg_reg(Width::W64, dst, addr_reg);
                            }
                        } else {
                            em.lea(dst, Mem::new(addr_reg, extra_offset));
                        }
                    }
                    other => unreachable!("addrof on a non-addressable value: {other:?}"),
                }
            }

            // --- compare ---
            IROp::Eql => compare(&mut em, &mut stack, frame, Cond::Eq),
            IROp::Neq => compare(&mut em, &mut stack, frame, Cond::Ne),
            IROp::Lst => compare(&mut em, &mut stack, frame, Cond::Lt),
            IROp::Lte => compare(&mut em, &mut stack, frame, Cond::Le),
            IROp::Grt => compare(&mut em, &mut stack, frame, Cond::Gt),
            IROp::Gte => compare(&mut em, &mut stack, frame, Cond::Ge),

            IROp::Swp => stack.swap_top(),
            IROp::Cvt { kind, unsigned } => lower_cvt(&mut em, &mut stack, frame, *kind, *unsigned),

            // --- memory ---
            IROp::StackAlloc { bytes } => {
                em.adjust_stack(*bytes as i32, true);
                let new = stack.push_rvalue(ValueKind::Ptr, true);
                let dst = legalize::int_reg_of(new);
                em.mov_reg_reg(Width::W64, dst, Reg::Rsp);
            }
            IROp::Offset { bytes } => {
                let item = stack.pop();
                match item {
                    StackItem::Lvalue { offset, kind, unsigned } => stack.push_lvalue(offset + *bytes, kind, unsigned),
                    StackItem::LvalueAbs { extra_offset, kind, unsigned, .. } => {
                        stack.push_lvalue_abs(kind, unsigned);
                        if let StackItem::LvalueAbs { extra_offset: e, .. } = stack.peek_mut(0) {
                            *e = extra_offset + *bytes;
                        }
                    }
                    other => unreachable!("offset applied to a non-addressable base: {other:?}"),
                }
            }

            // --- control flow ---
            IROp::If => {
                else_skip.push(None);
                branches.push_branch(em.buf.offset(), false);
            }
            IROp::Then => {
                let r = legalize::ensure_int_reg(&mut em, &mut stack, frame);
                let width = Width::of(stack.peek(0).kind());
                em.test(width, r, r);
                stack.pop();
                let site = em.jcc_rel32(Cond::Eq);
                branches.current_branch_mut().pending_jump = Some(site);
                then_depth.push(stack.len());
            }
            IROp::Else => {
                let before = then_depth.pop().expect("Else with no matching Then");
                if stack.len() > before {
                    stack.pop();
                }
                let skip_site = em.jmp_rel32();
                *else_skip.last_mut().expect("Else with no matching If") = Some(skip_site);
                let pending = branches
                    .current_branch_mut()
                    .pending_jump
                    .take()
                    .expect("Else with no preceding Then");
                let here = em.buf.offset();
                em.buf.patch_rel32(pending, here);
            }
            IROp::End => {
                if branches.current_branch_mut().is_loop {
                    then_depth.pop();
                }
                if let Some(pending) = branches.current_branch_mut().pending_jump.take() {
                    let here = em.buf.offset();
                    em.buf.patch_rel32(pending, here);
                }
                if let Some(skip) = else_skip.pop().expect("End with no matching If") {
                    let here = em.buf.offset();
                    em.buf.patch_rel32(skip, here);
                }
                if let Some(ends) = branches.pop_branch() {
                    let here = em.buf.offset();
                    for site in ends {
                        em.buf.patch_rel32(site, here);
                    }
                }
            }
            IROp::GotoStart => {
                branches.current_branch_mut().is_loop = true;
                let target = branches.nearest_loop_start();
                em.jmp_rel32_to(target);
            }
            IROp::GotoEnd => {
                let site = em.jmp_rel32();
                branches.record_end_site(site);
            }

            // --- short-circuit `&&`/`||` ---
            IROp::ScBegin => {
                branches.push_short_circuit_scope();
                let placeholder = stack.push_rvalue(ValueKind::I32, false);
                sc_result_regs.push(legalize::int_reg_of(placeholder));
            }
            IROp::Land => {
                let r = legalize::ensure_int_reg(&mut em, &mut stack, frame);
                let width = Width::of(stack.peek(0).kind());
                em.test(width, r, r);
                let skip_site = em.jcc_rel32(Cond::Ne);
                let result_reg = *sc_result_regs.last().expect("Land with no enclosing ScBegin");
                em.mov_reg_imm(Width::W32, result_reg, 0);
                let exit_site = em.jmp_rel32();
                branches.record_short_circuit_jump(exit_site);
                let here = em.buf.offset();
                em.buf.patch_rel32(skip_site, here);
                stack.pop();
            }
            IROp::Lor => {
                let r = legalize::ensure_int_reg(&mut em, &mut stack, frame);
                let width = Width::of(stack.peek(0).kind());
                em.test(width, r, r);
                let skip_site = em.jcc_rel32(Cond::Eq);
                let result_reg = *sc_result_regs.last().expect("Lor with no enclosing ScBegin");
                em.mov_reg_imm(Width::W32, result_reg, 1);
                let exit_site = em.jmp_rel32();
                branches.record_short_circuit_jump(exit_site);
                let here = em.buf.offset();
                em.buf.patch_rel32(skip_site, here);
                stack.pop();
            }
            IROp::ScEnd => {
                let result_reg = sc_result_regs.pop().expect("ScEnd with no matching ScBegin");
                let r = legalize::ensure_int_reg(&mut em, &mut stack, frame);
                let width = Width::of(stack.peek(0).kind());
                em.test(width, r, r);
                em.setcc(Cond::Ne, r);
                em.movx(r, r, Width::W8, Width::W32, false);
                if r != result_reg {
                    em.mov_reg_reg(Width::W32, result_reg, r);
                }
                stack.pop();
                let here = em.buf.offset();
                for site in branches.pop_short_circuit_scope() {
                    em.buf.patch_rel32(site, here);
                }
            }

            // --- calls ---
            IROp::Call { signature, arg_types } => lower_call(&mut em, &mut stack, frame, abi, cache, symbols, signature, arg_types)?,
            IROp::Ret => {
                lower_ret(&mut em, &mut stack, frame, current_ret);
                let site = em.jmp_rel32();
                branches.push_return_site(site);
            }
        }
    }

    Ok(buf.into_bytes())
}

fn retag_top(stack: &mut OperandStack, kind: ValueKind, unsigned: bool) {
    let slot = match stack.peek(0) {
        StackItem::Rvalue { slot, .. } => *slot,
        other => unreachable!("retag on a non-rvalue: {other:?}"),
    };
    *stack.peek_mut(0) = StackItem::Rvalue { slot, kind, unsigned };
}

/// Like [`legalize::ensure_float_reg`], but also materializes a `Literal`
/// by reinterpreting its bits in a scratch GPR — the path `legalize`
/// itself defers here (see its doc comment on the `Literal` arm).
fn ensure_float_reg(em: &mut Emitter, stack: &mut OperandStack, frame: Reg) -> Xmm {
    if matches!(stack.peek(0), StackItem::Literal { .. }) {
        let item = stack.pop();
        let StackItem::Literal { value, kind, unsigned } = item else {
            unreachable!()
        };
        let width = Width::of(kind);
        em.mov_reg_imm(width, Reg::Rax, value);
        let new = stack.push_rvalue(kind, unsigned);
        let dst = legalize::float_reg_of(new);
        em.mov_gpr_to_xmm(width, dst, Reg::Rax);
        dst
    } else {
        legalize::ensure_float_reg(em, stack, frame)
    }
}

/// `lhs <- lhs OP rhs`, leaving exactly one item (the result, in `lhs`'s
/// register) on the stack — the universal shape every plain binary
/// integer opcode reduces to.
fn binary_int(em: &mut Emitter, stack: &mut OperandStack, frame: Reg, op: impl FnOnce(&mut Emitter, Width, Reg, Reg)) {
    let rhs = legalize::ensure_int_reg(em, stack, frame);
    stack.swap_top();
    let lhs = legalize::ensure_int_reg(em, stack, frame);
    let width = Width::of(stack.peek(0).kind());
    op(em, width, lhs, rhs);
    stack.swap_top();
    stack.pop();
}

/// Like [`binary_int`], but for mnemonics that also have an immediate-operand
/// form (`add`/`sub`/`and`/`or`/`xor`, each with an `*_imm` counterpart in
/// [`super::emit`]): a literal right-hand operand is legalized as an
/// immediate directly rather than first materialized into a register.
/// Mirrors §4.4's cost-based row search narrowed to the one ambiguity this
/// back end's IR actually produces — a literal operand has two legal
/// lowerings (`mov` then register-form op, 2 instructions; or the
/// immediate-form op alone, 1 instruction) — and always prefers the
/// cheaper row. `imul` has no such row (`emit` never gained a three-operand
/// `imul reg,reg,imm` form) and keeps going through plain [`binary_int`].
fn binary_int_imm(
    em: &mut Emitter,
    stack: &mut OperandStack,
    frame: Reg,
    op: impl FnOnce(&mut Emitter, Width, Reg, Reg),
    op_imm: impl FnOnce(&mut Emitter, Width, Reg, i32),
) {
    if let StackItem::Literal { value, kind, .. } = stack.peek(0) {
        let width = Width::of(*kind);
        // `*_imm` encodes a 32-bit immediate sign-extended to the
        // destination width; restricting to sub-64-bit literals sidesteps
        // checking whether a 64-bit value's bit pattern round-trips
        // through that sign extension.
        if width != Width::W64 {
            let imm = *value as i32;
            stack.pop();
            let lhs = legalize::ensure_int_reg(em, stack, frame);
            let result_width = Width::of(stack.peek(0).kind());
            op_imm(em, result_width, lhs, imm);
            return;
        }
    }
    binary_int(em, stack, frame, op);
}

fn binary_float(em: &mut Emitter, stack: &mut OperandStack, frame: Reg, op: impl FnOnce(&mut Emitter, bool, Xmm, Xmm)) {
    let rhs = ensure_float_reg(em, stack, frame);
    stack.swap_top();
    let lhs = ensure_float_reg(em, stack, frame);
    let is_double = stack.peek(0).kind() == ValueKind::F64;
    op(em, is_double, lhs, rhs);
    stack.swap_top();
    stack.pop();
}

fn binary_divmod(em: &mut Emitter, stack: &mut OperandStack, frame: Reg, want_remainder: bool, unsigned: bool) {
    let rhs = legalize::ensure_int_reg(em, stack, frame);
    stack.swap_top();
    let lhs = legalize::ensure_int_reg(em, stack, frame);
    let width = Width::of(stack.peek(0).kind());
    em.mov_reg_reg(width, Reg::Rax, lhs);
    if unsigned {
        em.xor(width, Reg::Rdx, Reg::Rdx);
        em.div(width, rhs);
    } else {
        em.cqo_idiv(width, rhs);
    }
    let result_src = if want_remainder { Reg::Rdx } else { Reg::Rax };
    if lhs != result_src {
        em.mov_reg_reg(width, lhs, result_src);
    }
    stack.swap_top();
    stack.pop();
}

fn binary_shift(em: &mut Emitter, stack: &mut OperandStack, frame: Reg, right: bool) {
    let rhs = legalize::ensure_int_reg(em, stack, frame);
    stack.swap_top();
    let lhs = legalize::ensure_int_reg(em, stack, frame);
    let item = stack.peek(0);
    let width = Width::of(item.kind());
    let unsigned = item.is_unsigned();
    em.mov_reg_reg(Width::W32, Reg::Rcx, rhs);
    em.shift_cl(width, lhs, right, right && !unsigned);
    stack.swap_top();
    stack.pop();
}

fn compare(em: &mut Emitter, stack: &mut OperandStack, frame: Reg, cond: Cond) {
    if stack.peek(0).kind().is_float() {
        let rhs = ensure_float_reg(em, stack, frame);
        stack.swap_top();
        let lhs = ensure_float_reg(em, stack, frame);
        let is_double = stack.peek(0).kind() == ValueKind::F64;
        em.ucomiss_sd(is_double, lhs, rhs);
        stack.pop();
        stack.pop();
        let new = stack.push_rvalue(ValueKind::I32, false);
        let dst = legalize::int_reg_of(new);
        em.setcc(cond, dst);
        em.movx(dst, dst, Width::W8, Width::W32, false);
    } else {
        let rhs = legalize::ensure_int_reg(em, stack, frame);
        stack.swap_top();
        let lhs = legalize::ensure_int_reg(em, stack, frame);
        let width = Width::of(stack.peek(0).kind());
        em.cmp(width, lhs, rhs);
        em.setcc(cond, lhs);
        em.movx(lhs, lhs, Width::W8, Width::W32, false);
        stack.swap_top();
        stack.pop();
        retag_top(stack, ValueKind::I32, false);
    }
}

/// `*target <- *target OP rhs`, leaving the new value as the expression's
/// result — the shape of every integer store-accumulating opcode (`x +=
/// 5` reads `x`, combines, writes back, and itself evaluates to the new
/// `x`). `apply` receives the already-loaded rhs register and the
/// target's signedness (needed by `sdiv`/`smod`/`sshr`).
fn compound_int(
    em: &mut Emitter,
    stack: &mut OperandStack,
    frame: Reg,
    apply: impl FnOnce(&mut Emitter, Width, Reg, bool),
) {
    let rhs = legalize::ensure_int_reg(em, stack, frame);
    stack.swap_top();
    let target = stack.pop();
    let mem = legalize::target_mem(&target, frame);
    let width = Width::of(target.kind());
    let unsigned = target.is_unsigned();
    em.mov_reg_mem(width, Reg::Rax, mem);
    apply(em, width, rhs, unsigned);
    em.mov_mem_reg(width, mem, Reg::Rax);
    stack.pop();
    let new = stack.push_rvalue(target.kind(), unsigned);
    let dst = legalize::int_reg_of(new);
    if dst != Reg::Rax {
        em.mov_reg_reg(width, dst, Reg::Rax);
    }
}

fn compound_float(em: &mut Emitter, stack: &mut OperandStack, frame: Reg, op: impl FnOnce(&mut Emitter, bool, Xmm, Xmm)) {
    let rhs = ensure_float_reg(em, stack, frame);
    stack.swap_top();
    let target = stack.pop();
    let mem = legalize::target_mem(&target, frame);
    let is_double = target.kind() == ValueKind::F64;
    let acc_item = stack.push_rvalue(target.kind(), false);
    let acc = legalize::float_reg_of(acc_item);
    em.load_float(acc, mem, is_double);
    op(em, is_double, acc, rhs);
    em.store_float(mem, acc, is_double);
    stack.swap_top();
    stack.pop();
}

fn lower_cvt(em: &mut Emitter, stack: &mut OperandStack, frame: Reg, kind: ValueKind, unsigned: bool) {
    let src_kind = stack.peek(0).kind();
    match (src_kind.is_float(), kind.is_float()) {
        (false, false) => {
            let src_unsigned = stack.peek(0).is_unsigned();
            let r = legalize::ensure_int_reg(em, stack, frame);
            let from_w = Width::of(src_kind);
            let to_w = Width::of(kind);
            if to_w.bytes() > from_w.bytes() {
                em.movx(r, r, from_w, to_w, !src_unsigned);
            }
            retag_top(stack, kind, unsigned);
        }
        (false, true) => {
            let src_w = Width::of(src_kind);
            let r = legalize::ensure_int_reg(em, stack, frame);
            stack.pop();
            let is_double = kind == ValueKind::F64;
            let new = stack.push_rvalue(kind, false);
            let dst = legalize::float_reg_of(new);
            em.cvt_int_to_float(is_double, src_w, dst, r);
        }
        (true, false) => {
            let is_double_src = src_kind == ValueKind::F64;
            let r = ensure_float_reg(em, stack, frame);
            stack.pop();
            let new = stack.push_rvalue(kind, unsigned);
            let dst = legalize::int_reg_of(new);
            em.cvt_float_to_int(is_double_src, Width::of(kind), dst, r);
        }
        (true, true) => {
            let is_double_src = src_kind == ValueKind::F64;
            let r = ensure_float_reg(em, stack, frame);
            if src_kind != kind {
                stack.pop();
                let new = stack.push_rvalue(kind, false);
                let dst = legalize::float_reg_of(new);
                em.cvt_float_to_float(is_double_src, dst, r);
            }
        }
    }
}

/// Reserve frame slots for the incoming parameters, mirroring
/// `ir::assemble::layout_params` exactly (same cursor walk over the same
/// `signature`/`cache`), then move each out of the register/stack
/// location the ABI classifies it into.
fn store_incoming_args(em: &mut Emitter, abi: &dyn Abi, cache: &TypeCache, sig: &FunctionSig) {
    let mut cursor = 0i32;
    let mut offsets = Vec::with_capacity(sig.params.len());
    for p in &sig.params {
        if p.name.is_empty() {
            offsets.push(0);
            continue;
        }
        let data = cache.get(p.ty);
        let aligned = align_to(cursor as u64, data.alignment) as i32;
        cursor = aligned + data.size as i32;
        offsets.push(aligned);
    }

    let param_types: Vec<TypeId> = sig.params.iter().map(|p| p.ty).collect();
    let layout = abi.classify_call(cache, &param_types, sig.ret);

    for (i, p) in sig.params.iter().enumerate() {
        if p.name.is_empty() {
            continue;
        }
        let offset = offsets[i];
        let kind = crate::ir::assemble::value_kind_of(cache, p.ty);
        let width = Width::of(kind);
        match layout.args[i] {
            ArgLocation::Int(src) => em.mov_mem_reg(width, Mem::new(Reg::Rbp, offset), src),
            ArgLocation::Float(src) => em.store_float(Mem::new(Reg::Rbp, offset), src, kind == ValueKind::F64),
            ArgLocation::Stack(off) => {
                // Above the saved `rbp` and the return address the caller pushed.
                em.mov_reg_mem(width, Reg::Rax, Mem::new(Reg::Rbp, 16 + off));
                em.mov_mem_reg(width, Mem::new(Reg::Rbp, offset), Reg::Rax);
            }
        }
    }
}

fn lower_call(
    em: &mut Emitter,
    stack: &mut OperandStack,
    frame: Reg,
    abi: &dyn Abi,
    cache: &TypeCache,
    symbols: &SymbolTable,
    signature: &FunctionSig,
    arg_types: &[TypeId],
) -> CompileResult<()> {
    // `arg_types` is the call site's actual argument list, not the
    // callee's declared one: for a variadic call with more arguments than
    // `signature.params`, it runs longer, and every one of its entries
    // must be popped — `assemble::assemble_call` pushed exactly this many
    // IR values, and leaving any unpopped here would unbalance the
    // operand stack (§8).
    let layout = abi.classify_call(cache, arg_types, signature.ret);

    em.adjust_stack(layout.stack_bytes, true);

    let declared = signature.params.len();
    let mut variadic_floats = 0u32;

    for i in (0..arg_types.len()).rev() {
        let kind = stack.peek(0).kind();
        if signature.variadic && i >= declared && kind.is_float() && matches!(layout.args[i], ArgLocation::Float(_)) {
            variadic_floats += 1;
        }
        match layout.args[i] {
            ArgLocation::Int(dst) => {
                let r = legalize::ensure_int_reg(em, stack, frame);
                if r != dst {
                    em.mov_reg_reg(Width::of(kind), dst, r);
                }
                stack.pop();
            }
            ArgLocation::Float(dst) => {
                let is_double = kind == ValueKind::F64;
                let r = ensure_float_reg(em, stack, frame);
                if r != dst {
                    em.movss_sd(is_double, dst, r);
                }
                stack.pop();
            }
            ArgLocation::Stack(off) => {
                if kind.is_float() {
                    let is_double = kind == ValueKind::F64;
                    let r = ensure_float_reg(em, stack, frame);
                    em.store_float(Mem::new(Reg::Rsp, off), r, is_double);
                } else {
                    let r = legalize::ensure_int_reg(em, stack, frame);
                    em.mov_mem_reg(Width::of(kind), Mem::new(Reg::Rsp, off), r);
                }
                stack.pop();
            }
        }
    }

    // `al` must carry the variadic float count per the SysV convention;
    // set it last so a direct call's address load (which also wants
    // `rax`) doesn't clobber it first.
    let set_al = signature.variadic && abi.variadic_float_count_in_al();

    if signature.name.is_empty() {
        // Indirect call: the callee pointer was pushed before the args,
        // so by now it's the sole remaining item. The operand-stack pool
        // never hands out `rax` (see `isa::x64::reg`), so this never
        // collides with `al`.
        let r = legalize::ensure_int_reg(em, stack, frame);
        if set_al {
            em.mov_reg_imm(Width::W8, Reg::Rax, variadic_floats as u64);
        }
        em.call_reg(r);
        stack.pop();
    } else {
        match symbols.get(&signature.name) {
            Some(&addr) => {
                em.mov_reg_imm(Width::W64, Reg::R11, addr as u64);
                if set_al {
                    em.mov_reg_imm(Width::W8, Reg::Rax, variadic_floats as u64);
                }
                em.call_reg(Reg::R11);
            }
            None => return Err(CompileError::internal(format!("undefined function `{}`", signature.name))),
        }
    }

    em.adjust_stack(layout.stack_bytes, false);

    match layout.ret {
        ReturnLocation::Void => stack.push_literal(0, ValueKind::I32, false),
        ReturnLocation::Int(src) => {
            let ret_kind = crate::ir::assemble::value_kind_of(cache, signature.ret);
            let unsigned = cache.get(signature.ret).is_unsigned;
            let new = stack.push_rvalue(ret_kind, unsigned);
            let dst = legalize::int_reg_of(new);
            if dst != src {
                em.mov_reg_reg(Width::of(ret_kind), dst, src);
            }
        }
        ReturnLocation::Float(src) => {
            let ret_kind = crate::ir::assemble::value_kind_of(cache, signature.ret);
            let new = stack.push_rvalue(ret_kind, false);
            let dst = legalize::float_reg_of(new);
            if dst != src {
                em.movss_sd(ret_kind == ValueKind::F64, dst, src);
            }
        }
        ReturnLocation::HiddenPointer => {
            // Simplified (see DESIGN.md): the callee writes the aggregate
            // through a pointer and hands its address back in `rax`; this
            // back end doesn't shift the declared argument registers to
            // make room for that hidden pointer the way a real ABI would.
            let new = stack.push_lvalue_abs(ValueKind::Ptr, true);
            let dst = legalize::int_reg_of(new);
            if dst != Reg::Rax {
                em.mov_reg_reg(Width::W64, dst, Reg::Rax);
            }
        }
    }

    Ok(())
}

fn lower_ret(em: &mut Emitter, stack: &mut OperandStack, frame: Reg, ret: ReturnLocation) {
    match ret {
        ReturnLocation::Void => {
            stack.pop();
        }
        ReturnLocation::Int(dst) => {
            let width = Width::of(stack.peek(0).kind());
            let r = legalize::ensure_int_reg(em, stack, frame);
            if r != dst {
                em.mov_reg_reg(width, dst, r);
            }
            stack.pop();
        }
        ReturnLocation::Float(dst) => {
            let is_double = stack.peek(0).kind() == ValueKind::F64;
            let r = ensure_float_reg(em, stack, frame);
            if r != dst {
                em.movss_sd(is_double, dst, r);
            }
            stack.pop();
        }
        ReturnLocation::HiddenPointer => {
            let r = legalize::ensure_int_reg(em, stack, frame);
            if r != Reg::Rax {
                em.mov_reg_reg(Width::W64, Reg::Rax, r);
            }
            stack.pop();
        }
    }
}
