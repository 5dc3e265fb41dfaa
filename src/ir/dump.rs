//! Textual IR dump, substituted for the machine emitter when
//! `Flags::debug_emission` is set (§6's "debug emission" option).

use super::{IROp, IrStream};
use std::fmt::Write as _;

pub fn dump(stream: &IrStream) -> String {
    let mut out = String::new();
    let mut indent = 0usize;
    for op in stream {
        if matches!(op, IROp::End | IROp::FuncEnd | IROp::Else) {
            indent = indent.saturating_sub(1);
        }
        let pad = "  ".repeat(indent);
        let _ = writeln!(out, "{pad}{}", describe(op));
        if matches!(op, IROp::If | IROp::Then | IROp::Else | IROp::Func { .. }) {
            indent += 1;
        }
    }
    out
}

fn describe(op: &IROp) -> String {
    match op {
        IROp::PushI {
            value,
            kind,
            unsigned,
        } => format!("pushi {value} {kind:?} unsigned={unsigned}"),
        IROp::PushF(v) => format!("pushf {v}"),
        IROp::PushD(v) => format!("pushd {v}"),
        IROp::Pop => "pop".into(),
        IROp::Load { kind, unsigned } => format!("load {kind:?} unsigned={unsigned}"),
        IROp::LAddr {
            addr,
            kind,
            unsigned,
        } => format!("laddr {addr:#x} {kind:?} unsigned={unsigned}"),
        IROp::LStack {
            offset,
            kind,
            unsigned,
        } => format!("lstack {offset} {kind:?} unsigned={unsigned}"),
        IROp::Store => "store".into(),
        IROp::Add => "add".into(),
        IROp::Sub => "sub".into(),
        IROp::Mul => "mul".into(),
        IROp::Div => "div".into(),
        IROp::Mod => "mod".into(),
        IROp::Shl => "shl".into(),
        IROp::Shr => "shr".into(),
        IROp::And => "and".into(),
        IROp::Or => "or".into(),
        IROp::Xor => "xor".into(),
        IROp::SAdd => "sadd".into(),
        IROp::SSub => "ssub".into(),
        IROp::SMul => "smul".into(),
        IROp::SDiv => "sdiv".into(),
        IROp::SMod => "smod".into(),
        IROp::SShl => "sshl".into(),
        IROp::SShr => "sshr".into(),
        IROp::SAnd => "sand".into(),
        IROp::SOr => "sor".into(),
        IROp::SXor => "sxor".into(),
        IROp::Not => "not".into(),
        IROp::Neg => "neg".into(),
        IROp::Inc { suffix, step } => format!("inc suffix={suffix} step={step}"),
        IROp::Zero => "zero".into(),
        IROp::AddrOf => "addrof".into(),
        IROp::Eql => "eql".into(),
        IROp::Neq => "neq".into(),
        IROp::Lst => "lst".into(),
        IROp::Lte => "lte".into(),
        IROp::Grt => "grt".into(),
        IROp::Gte => "gte".into(),
        IROp::Swp => "swp".into(),
        IROp::Cvt { kind, unsigned } => format!("cvt {kind:?} unsigned={unsigned}"),
        IROp::StackAlloc { bytes } => format!("stackalloc {bytes}"),
        IROp::Offset { bytes } => format!("offset {bytes}"),
        IROp::If => "if".into(),
        IROp::Then => "then".into(),
        IROp::Else => "else".into(),
        IROp::End => "end".into(),
        IROp::GotoStart => "goto_start".into(),
        IROp::GotoEnd => "goto_end".into(),
        IROp::ScBegin => "sc_begin".into(),
        IROp::Land => "land".into(),
        IROp::Lor => "lor".into(),
        IROp::ScEnd => "sc_end".into(),
        IROp::Call { signature, arg_types } => format!("call {} ({} args)", signature.name, arg_types.len()),
        IROp::Ret => "ret".into(),
        IROp::Func {
            signature,
            stack_size,
        } => format!("func {} stack_size={stack_size}", signature.name),
        IROp::FuncEnd => "func_end".into(),
    }
}
