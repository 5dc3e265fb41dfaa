//! Mnemonic-level machine code emission (component E).
//!
//! Grounded on `arch/sysv-x86_64.c`'s direct encoder (`header`, `modrm`,
//! `mov_imm`, `mov_reg`, `alu`, `imul`, `idiv`, `unary`, `shift`,
//! `signextend`, `jmp`, `jcond`, `call`, `ret`, `push`/`pop`): each
//! function there becomes one method here, generalized from that file's
//! fixed 3-callee-saved-register scheme to the full operand-stack pool.
//! Floating-point forms (`movss`/`movsd`/`addss`/...) are filled in from
//! the equivalent table rows in `platform/x86_64.c`, since the SysV
//! encoder never implemented them (its own `// TODO: floating point`).

use super::buffer::CodeBuffer;
use super::reg::{Reg, Xmm};
use super::table::{modrm_byte, Width, REX_B, REX_R, REX_W};
use crate::ir::Cond;

/// A memory operand: `[base + disp]`. This back end never needs an index
/// register or scale — every address is either `rbp`-relative (locals) or
/// held directly in a pooled register (`LvalueAbs`).
#[derive(Copy, Clone, Debug)]
pub struct Mem {
    pub base: Reg,
    pub disp: i32,
}

impl Mem {
    pub fn new(base: Reg, disp: i32) -> Mem {
        Mem { base, disp }
    }
}

fn rex(w: bool, r: bool, x: bool, b: bool) -> Option<u8> {
    let mut byte = 0u8;
    let mut any = w;
    if w {
        byte |= REX_W;
    }
    if r {
        byte |= REX_R;
        any = true;
    }
    if x {
        byte |= REX_X;
        any = true;
    }
    if b {
        byte |= REX_B;
        any = true;
    }
    any.then_some(byte | 0b0100_0000)
}

pub struct Emitter<'a> {
    pub buf: &'a mut CodeBuffer,
}

impl<'a> Emitter<'a> {
    pub fn new(buf: &'a mut CodeBuffer) -> Emitter<'a> {
        Emitter { buf }
    }

    fn prefix_width(&mut self, width: Width) {
        if width == Width::W16 {
            self.buf.push_u8(0x66);
        }
    }

    fn emit_rex(&mut self, width: Width, reg_ext: bool, rm_ext: bool) {
        if let Some(byte) = rex(width == Width::W64, reg_ext, false, rm_ext) {
            self.buf.push_u8(byte);
        }
    }

    fn modrm_reg_reg(&mut self, reg: u8, rm: u8) {
        self.buf.push_u8(modrm_byte(0b11, reg, rm));
    }

    /// Emit ModRM (+ disp) for `[mem.base + mem.disp]`, using the
    /// disp8/disp32/no-disp form the displacement actually needs — with
    /// one exception: `rbp`/`r13` as a base always needs at least a disp8,
    /// since mode 0b00 with rm==101 means RIP-relative instead.
    fn modrm_reg_mem(&mut self, reg: u8, mem: Mem) {
        let rm = mem.base.low3();
        let needs_disp8_anyway = rm == 0b101;
        if mem.disp == 0 && !needs_disp8_anyway {
            self.buf.push_u8(modrm_byte(0b00, reg, rm));
        } else if i8::try_from(mem.disp).is_ok() {
            self.buf.push_u8(modrm_byte(0b01, reg, rm));
            self.buf.push_u8(mem.disp as i8 as u8);
        } else {
            self.buf.push_u8(modrm_byte(0b10, reg, rm));
            self.buf.push_i32(mem.disp);
        }
    }

    // --- data movement ---

    pub fn mov_reg_reg(&mut self, width: Width, dst: Reg, src: Reg) {
        self.prefix_width(width);
        self.emit_rex(width, src.needs_rex_extension(), dst.needs_rex_extension());
        self.buf.push_u8(if width == Width::W8 { 0x88 } else { 0x89 });
        self.modrm_reg_reg(src.low3(), dst.low3());
    }

    pub fn mov_reg_imm(&mut self, width: Width, dst: Reg, imm: u64) {
        self.prefix_width(width);
        self.emit_rex(width, false, dst.needs_rex_extension());
        self.buf
            .push_u8((if width == Width::W8 { 0xB0 } else { 0xB8 }) | dst.low3());
        match width {
            Width::W8 => self.buf.push_u8(imm as u8),
            Width::W16 => {
                self.buf.push_u8(imm as u8);
                self.buf.push_u8((imm >> 8) as u8);
            }
            Width::W32 => self.buf.push_u32(imm as u32),
            Width::W64 => self.buf.push_u64(imm),
        }
    }

    /// Load `dst <- [mem]`.
    pub fn mov_reg_mem(&mut self, width: Width, dst: Reg, mem: Mem) {
        self.prefix_width(width);
        self.emit_rex(width, dst.needs_rex_extension(), mem.base.needs_rex_extension());
        self.buf.push_u8(if width == Width::W8 { 0x8A } else { 0x8B });
        self.modrm_reg_mem(dst.low3(), mem);
    }

    /// Store `[mem] <- src`.
    pub fn mov_mem_reg(&mut self, width: Width, mem: Mem, src: Reg) {
        self.prefix_width(width);
        self.emit_rex(width, src.needs_rex_extension(), mem.base.needs_rex_extension());
        self.buf.push_u8(if width == Width::W8 { 0x88 } else { 0x89 });
        self.modrm_reg_mem(src.low3(), mem);
    }

    pub fn lea(&mut self, dst: Reg, mem: Mem) {
        self.emit_rex(Width::W64, dst.needs_rex_extension(), mem.base.needs_rex_extension());
        self.buf.push_u8(0x8D);
        self.modrm_reg_mem(dst.low3(), mem);
    }

    /// Zero/sign-extend `dst <- reg` from `from` up to `to`.
    pub fn movx(&mut self, dst: Reg, src: Reg, from: Width, to: Width, is_signed: bool) {
        if from == Width::W32 && to == Width::W64 && !is_signed {
            // A plain 32-bit mov already zero-extends the top half.
            self.mov_reg_reg(Width::W32, dst, src);
            return;
        }
        self.emit_rex(to, dst.needs_rex_extension(), src.needs_rex_extension());
        if from == Width::W32 && to == Width::W64 {
            self.buf.push_u8(0x63); // movsxd
        } else {
            self.buf.push_u8(0x0F);
            let base = if is_signed { 0xBE } else { 0xB6 };
            self.buf.push_u8(base | u8::from(from != Width::W8));
        }
        self.modrm_reg_reg(dst.low3(), src.low3());
    }

    // --- integer ALU: dst <- dst OP src (reg,reg) ---

    fn alu_reg_reg(&mut self, opcode: u8, width: Width, dst: Reg, src: Reg) {
        self.prefix_width(width);
        self.emit_rex(width, src.needs_rex_extension(), dst.needs_rex_extension());
        self.buf.push_u8(opcode & if width == Width::W8 { 0xFE } else { 0xFF });
        self.modrm_reg_reg(src.low3(), dst.low3());
    }

    pub fn add(&mut self, width: Width, dst: Reg, src: Reg) {
        self.alu_reg_reg(0x01, width, dst, src);
    }
    pub fn sub(&mut self, width: Width, dst: Reg, src: Reg) {
        self.alu_reg_reg(0x29, width, dst, src);
    }
    pub fn and(&mut self, width: Width, dst: Reg, src: Reg) {
        self.alu_reg_reg(0x21, width, dst, src);
    }
    pub fn or(&mut self, width: Width, dst: Reg, src: Reg) {
        self.alu_reg_reg(0x09, width, dst, src);
    }
    pub fn xor(&mut self, width: Width, dst: Reg, src: Reg) {
        self.alu_reg_reg(0x31, width, dst, src);
    }
    pub fn cmp(&mut self, width: Width, a: Reg, b: Reg) {
        self.alu_reg_reg(0x39, width, a, b);
    }
    pub fn test(&mut self, width: Width, a: Reg, b: Reg) {
        self.alu_reg_reg(0x85, width, a, b);
    }

    /// `dst <- dst OP imm32` (sign-extended), via the `0x81 /ext` group —
    /// the immediate forms of `add`/`sub`/`and`/`or`/`xor`/`cmp` (opcode
    /// extension field selects which), matching `modrm_op2` rows 0x81 in
    /// `platform/x86_64.c`.
    fn alu_reg_imm(&mut self, ext: u8, width: Width, dst: Reg, imm: i32) {
        self.prefix_width(width);
        self.emit_rex(width, false, dst.needs_rex_extension());
        self.buf.push_u8(if width == Width::W8 { 0x80 } else { 0x81 });
        self.buf.push_u8(modrm_byte(0b11, ext, dst.low3()));
        if width == Width::W8 {
            self.buf.push_u8(imm as u8);
        } else if width == Width::W16 {
            // The 0x66-prefixed 16-bit form of this group takes a 2-byte
            // immediate (`iw`), not the 4-byte `id` the 32/64-bit forms take.
            self.buf.push_u8(imm as u8);
            self.buf.push_u8((imm >> 8) as u8);
        } else {
            self.buf.push_i32(imm);
        }
    }

    pub fn add_imm(&mut self, width: Width, dst: Reg, imm: i32) {
        self.alu_reg_imm(0b000, width, dst, imm);
    }
    pub fn sub_imm(&mut self, width: Width, dst: Reg, imm: i32) {
        self.alu_reg_imm(0b101, width, dst, imm);
    }
    pub fn and_imm(&mut self, width: Width, dst: Reg, imm: i32) {
        self.alu_reg_imm(0b100, width, dst, imm);
    }
    pub fn or_imm(&mut self, width: Width, dst: Reg, imm: i32) {
        self.alu_reg_imm(0b001, width, dst, imm);
    }
    pub fn xor_imm(&mut self, width: Width, dst: Reg, imm: i32) {
        self.alu_reg_imm(0b110, width, dst, imm);
    }
    pub fn cmp_imm(&mut self, width: Width, dst: Reg, imm: i32) {
        self.alu_reg_imm(0b111, width, dst, imm);
    }

    pub fn imul(&mut self, width: Width, dst: Reg, src: Reg) {
        self.prefix_width(width);
        self.emit_rex(width, dst.needs_rex_extension(), src.needs_rex_extension());
        self.buf.push_u8(0x0F);
        self.buf.push_u8(0xAF);
        self.modrm_reg_reg(dst.low3(), src.low3());
    }

    /// Signed divide: `rax:rdx <- rax / divisor`, result in `rax`, remainder
    /// in `rdx`, per the SysV `idiv` calling sequence.
    pub fn cqo_idiv(&mut self, width: Width, divisor: Reg) {
        self.sign_extend_rax(width);
        self.emit_rex(width, false, divisor.needs_rex_extension());
        self.buf.push_u8(0xF7);
        self.buf.push_u8(modrm_byte(0b11, 0b111, divisor.low3()));
    }

    /// Unsigned divide: `rdx:rax <- rax / divisor`, result in `rax`,
    /// remainder in `rdx`. Callers must zero `rdx` first (`xor edx,edx`)
    /// instead of sign-extending it — unsigned division has no `cqo` step.
    pub fn div(&mut self, width: Width, divisor: Reg) {
        self.emit_rex(width, false, divisor.needs_rex_extension());
        self.buf.push_u8(0xF7);
        self.buf.push_u8(modrm_byte(0b11, 0b110, divisor.low3()));
    }

    pub fn sign_extend_rax(&mut self, width: Width) {
        match width {
            Width::W8 => self.buf.push_u8(0x98),  // cbw
            Width::W16 => {
                self.buf.push_u8(0x66);
                self.buf.push_u8(0x99); // cwd
            }
            Width::W32 => self.buf.push_u8(0x99), // cdq
            Width::W64 => {
                self.emit_rex(Width::W64, false, false);
                self.buf.push_u8(0x99); // cqo
            }
        }
    }

    fn unary_ext(&mut self, opcode: u8, ext: u8, width: Width, reg: Reg) {
        self.prefix_width(width);
        self.emit_rex(width, false, reg.needs_rex_extension());
        self.buf.push_u8(opcode & if width == Width::W8 { 0xFE } else { 0xFF });
        self.buf.push_u8(modrm_byte(0b11, ext, reg.low3()));
    }

    pub fn not(&mut self, width: Width, reg: Reg) {
        self.unary_ext(0xF7, 0b010, width, reg);
    }
    pub fn neg(&mut self, width: Width, reg: Reg) {
        self.unary_ext(0xF7, 0b011, width, reg);
    }
    pub fn inc(&mut self, width: Width, reg: Reg) {
        self.unary_ext(0xFF, 0b000, width, reg);
    }
    pub fn dec(&mut self, width: Width, reg: Reg) {
        self.unary_ext(0xFF, 0b001, width, reg);
    }

    /// `reg <- reg << cl` / `reg >> cl` (arithmetic for signed, logical for
    /// unsigned — selected by the caller via `arithmetic`).
    pub fn shift_cl(&mut self, width: Width, reg: Reg, right: bool, arithmetic: bool) {
        let ext = if !right { 0b100 } else if arithmetic { 0b111 } else { 0b101 };
        self.unary_ext(0xD3, ext, width, reg);
    }

    pub fn setcc(&mut self, cond: Cond, reg: Reg) {
        if reg.needs_rex_for_8bit() || reg.needs_rex_extension() {
            self.emit_rex(Width::W8, false, reg.needs_rex_extension());
        }
        self.buf.push_u8(0x0F);
        self.buf.push_u8(cond.setcc_opcode());
        self.buf.push_u8(modrm_byte(0b11, 0b000, reg.low3()));
    }

    // --- control flow ---

    pub fn jmp_rel32(&mut self) -> usize {
        self.buf.push_u8(0xE9);
        self.buf.push_rel32_placeholder()
    }

    pub fn jcc_rel32(&mut self, cond: Cond) -> usize {
        self.buf.push_u8(0x0F);
        self.buf.push_u8(cond.jcc_opcode());
        self.buf.push_rel32_placeholder()
    }

    /// An unconditional jump to an already-known offset — the loop
    /// backedge (`continue`/the trailing `GotoStart`), whose target
    /// (the condition re-check) was laid down earlier in the stream.
    pub fn jmp_rel32_to(&mut self, target: usize) {
        self.buf.push_u8(0xE9);
        let site = self.buf.push_rel32_placeholder();
        self.buf.patch_rel32(site, target);
    }

    pub fn call_reg(&mut self, reg: Reg) {
        self.emit_rex(Width::W32, false, reg.needs_rex_extension());
        self.buf.push_u8(0xFF);
        self.buf.push_u8(modrm_byte(0b11, 0b010, reg.low3()));
    }

    pub fn ret(&mut self) {
        self.buf.push_u8(0xC3);
    }

    pub fn leave(&mut self) {
        self.buf.push_u8(0xC9);
    }

    pub fn push_reg(&mut self, reg: Reg) {
        if reg.needs_rex_extension() {
            self.buf.push_u8(REX_B);
        }
        self.buf.push_u8(0x50 | reg.low3());
    }

    pub fn pop_reg(&mut self, reg: Reg) {
        if reg.needs_rex_extension() {
            self.buf.push_u8(REX_B);
        }
        self.buf.push_u8(0x58 | reg.low3());
    }

    /// `rsp += bytes` (`alloc=false`) or `rsp -= bytes` (`alloc=true`).
    pub fn adjust_stack(&mut self, bytes: i32, alloc: bool) {
        if bytes == 0 {
            return;
        }
        self.emit_rex(Width::W64, false, false);
        self.buf.push_u8(0x81);
        self.buf.push_u8(modrm_byte(0b11, 0b100 | u8::from(alloc), Reg::Rsp.low3()));
        self.buf.push_i32(bytes);
    }

    // --- SSE scalar float, grounded on the `mov`/`add`/`sub`/`imul`/`idiv`/
    // `cmp` two-byte f2/f3-prefixed rows in `platform/x86_64.c` ---

    fn sse(&mut self, prefix: u8, opcode: u8, dst: Xmm, src: Xmm) {
        self.buf.push_u8(prefix);
        if dst.needs_rex_extension() || src.needs_rex_extension() {
            self.emit_rex(Width::W32, dst.needs_rex_extension(), src.needs_rex_extension());
        }
        self.buf.push_u8(0x0F);
        self.buf.push_u8(opcode);
        self.modrm_reg_reg(dst.low3(), src.low3());
    }

    fn sse_prefix(is_double: bool) -> u8 {
        if is_double {
            0xF2
        } else {
            0xF3
        }
    }

    pub fn movss_sd(&mut self, is_double: bool, dst: Xmm, src: Xmm) {
        self.sse(Self::sse_prefix(is_double), 0x10, dst, src);
    }

    /// `dst(xmm) <- [mem]`.
    pub fn load_float(&mut self, dst: Xmm, mem: Mem, is_double: bool) {
        self.buf.push_u8(Self::sse_prefix(is_double));
        if dst.needs_rex_extension() || mem.base.needs_rex_extension() {
            self.emit_rex(Width::W32, dst.needs_rex_extension(), mem.base.needs_rex_extension());
        }
        self.buf.push_u8(0x0F);
        self.buf.push_u8(0x10);
        self.modrm_reg_mem(dst.low3(), mem);
    }

    /// `[mem] <- src(xmm)`.
    pub fn store_float(&mut self, mem: Mem, src: Xmm, is_double: bool) {
        self.buf.push_u8(Self::sse_prefix(is_double));
        if src.needs_rex_extension() || mem.base.needs_rex_extension() {
            self.emit_rex(Width::W32, src.needs_rex_extension(), mem.base.needs_rex_extension());
        }
        self.buf.push_u8(0x0F);
        self.buf.push_u8(0x11);
        self.modrm_reg_mem(src.low3(), mem);
    }

    /// Reinterpret the bit pattern of a GPR as a scalar in an XMM register
    /// (`movq`/`movd`), used to materialize float literals without a
    /// rip-relative constant pool: the literal's bits are loaded into a
    /// scratch GPR with an ordinary `mov`, then reinterpreted here.
    pub fn mov_gpr_to_xmm(&mut self, width: Width, dst: Xmm, src: Reg) {
        self.buf.push_u8(0x66);
        self.emit_rex(width, dst.needs_rex_extension(), src.needs_rex_extension());
        self.buf.push_u8(0x0F);
        self.buf.push_u8(0x6E);
        self.modrm_reg_reg(dst.low3(), src.low3());
    }
    pub fn addss_sd(&mut self, is_double: bool, dst: Xmm, src: Xmm) {
        self.sse(Self::sse_prefix(is_double), 0x58, dst, src);
    }
    pub fn subss_sd(&mut self, is_double: bool, dst: Xmm, src: Xmm) {
        self.sse(Self::sse_prefix(is_double), 0x5C, dst, src);
    }
    pub fn mulss_sd(&mut self, is_double: bool, dst: Xmm, src: Xmm) {
        self.sse(Self::sse_prefix(is_double), 0x59, dst, src);
    }
    pub fn divss_sd(&mut self, is_double: bool, dst: Xmm, src: Xmm) {
        self.sse(Self::sse_prefix(is_double), 0x5E, dst, src);
    }
    pub fn ucomiss_sd(&mut self, is_double: bool, a: Xmm, b: Xmm) {
        if is_double {
            self.buf.push_u8(0x66);
        }
        self.buf.push_u8(0x0F);
        self.buf.push_u8(0x2E);
        self.modrm_reg_reg(a.low3(), b.low3());
    }

    pub fn cvt_int_to_float(&mut self, is_double: bool, width: Width, dst: Xmm, src: Reg) {
        self.buf.push_u8(Self::sse_prefix(is_double));
        self.emit_rex(width, dst.needs_rex_extension(), src.needs_rex_extension());
        self.buf.push_u8(0x0F);
        self.buf.push_u8(0x2A);
        self.modrm_reg_reg(dst.low3(), src.low3());
    }

    pub fn cvt_float_to_int(&mut self, is_double: bool, width: Width, dst: Reg, src: Xmm) {
        self.buf.push_u8(Self::sse_prefix(is_double));
        self.emit_rex(width, dst.needs_rex_extension(), src.needs_rex_extension());
        self.buf.push_u8(0x0F);
        self.buf.push_u8(0x2C);
        self.modrm_reg_reg(dst.low3(), src.low3());
    }

    pub fn cvt_float_to_float(&mut self, from_double: bool, dst: Xmm, src: Xmm) {
        self.buf.push_u8(Self::sse_prefix(from_double));
        self.buf.push_u8(0x0F);
        self.buf.push_u8(0x5A);
        self.modrm_reg_reg(dst.low3(), src.low3());
    }
}
