//! The linear IR stream (§3.3) and its assembler (§4.1).
//!
//! `IROp` is the closed opcode set from the original `OPCODES` X-macro,
//! translated into a Rust sum type instead of a tagged union plus a
//! 3-element parameter array — each opcode's parameter shapes are now
//! encoded directly in its variant instead of being reinterpreted at the
//! call site.

pub mod assemble;
pub mod dump;
pub mod fixup;

use crate::ast::FunctionSig;
use crate::types::TypeId;

/// The reduced value-kind lattice the back end actually schedules
/// registers and encodings over — narrower than [`crate::types::TypeKind`],
/// which additionally describes aggregates, arrays, and function types
/// that have already been lowered away by the time IR is emitted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueKind {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Ptr,
}

impl ValueKind {
    pub fn is_float(self) -> bool {
        matches!(self, ValueKind::F32 | ValueKind::F64)
    }

    pub fn bytes(self) -> u32 {
        match self {
            ValueKind::I8 => 1,
            ValueKind::I16 => 2,
            ValueKind::I32 => 4,
            ValueKind::I64 => 8,
            ValueKind::F32 => 4,
            ValueKind::F64 => 8,
            ValueKind::Ptr => 8,
        }
    }

    /// Promote narrower-than-`i32` integers before arithmetic, per the
    /// "promotion to Int32" lowering rule in §4.1.
    pub fn promoted(self) -> ValueKind {
        match self {
            ValueKind::I8 | ValueKind::I16 => ValueKind::I32,
            other => other,
        }
    }

    /// Collapse a full [`crate::types::TypeData`] shape down to the reduced
    /// lattice the back end schedules registers over: pointers, arrays,
    /// and function types all become `Ptr` (the original's `correct_kind`
    /// rule of "anything past `Pointer` becomes `Pointer`"). Structs/unions
    /// have no single `ValueKind` of their own — callers walk their fields
    /// or pass them by address instead of calling this on an aggregate.
    pub fn from_type(data: &crate::types::TypeData) -> ValueKind {
        use crate::types::{FloatWidth, IntWidth, TypeKind};
        match &data.kind {
            TypeKind::Int(IntWidth::I8) => ValueKind::I8,
            TypeKind::Int(IntWidth::I16) => ValueKind::I16,
            TypeKind::Int(IntWidth::I32) => ValueKind::I32,
            TypeKind::Int(IntWidth::I64) => ValueKind::I64,
            TypeKind::Float(FloatWidth::F32) => ValueKind::F32,
            TypeKind::Float(FloatWidth::F64) => ValueKind::F64,
            TypeKind::Void | TypeKind::Varargs => ValueKind::I32,
            TypeKind::Pointer(_) | TypeKind::Array(..) | TypeKind::Function { .. } => {
                ValueKind::Ptr
            }
            TypeKind::Struct { .. } | TypeKind::Union { .. } => {
                panic!("ValueKind::from_type called on an aggregate; walk its fields instead")
            }
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Cond {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// One IR operation. Variants are grouped to match §3.3's categories:
/// data, arithmetic (plain and store-accumulating), unary, compare, `swp`,
/// `cvt`, memory, control, and call/return.
#[derive(Clone, Debug)]
pub enum IROp {
    // --- data ---
    PushI {
        value: u64,
        kind: ValueKind,
        unsigned: bool,
    },
    PushF(f32),
    PushD(f64),
    Pop,
    Load {
        kind: ValueKind,
        unsigned: bool,
    },
    /// Load from a fixed absolute address (string literals, globals).
    LAddr {
        addr: usize,
        kind: ValueKind,
        unsigned: bool,
    },
    LStack {
        offset: i32,
        kind: ValueKind,
        unsigned: bool,
    },
    Store,

    // --- arithmetic ---
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    And,
    Or,
    Xor,
    // store-accumulating variants: pop rhs, load lvalue, op, store back.
    SAdd,
    SSub,
    SMul,
    SDiv,
    SMod,
    SShl,
    SShr,
    SAnd,
    SOr,
    SXor,

    // --- unary ---
    Not,
    Neg,
    Inc {
        suffix: bool,
        step: i32,
    },
    Zero,
    AddrOf,

    // --- compare ---
    Eql,
    Neq,
    Lst,
    Lte,
    Grt,
    Gte,

    Swp,
    Cvt {
        kind: ValueKind,
        unsigned: bool,
    },

    // --- memory ---
    StackAlloc {
        bytes: u32,
    },
    Offset {
        bytes: i32,
    },

    // --- control ---
    If,
    Then,
    Else,
    End,
    GotoStart,
    GotoEnd,

    /// Open a short-circuit scope for a `&&`/`||` chain (§4.3). Not part of
    /// the portable opcode set in the strictest sense — grounded directly
    /// on the x86-64 backend's `sc_begin`/`land`/`lor`/`sc_end` handlers,
    /// which exist to complete what the AST-to-IR lowering left as a gap.
    ScBegin,
    /// Test the operand just pushed; short-circuit to `false` if it is
    /// zero, otherwise continue to the next operand in the chain.
    Land,
    /// Test the operand just pushed; short-circuit to `true` if it is
    /// nonzero, otherwise continue to the next operand in the chain.
    Lor,
    /// Close the scope: patch every short-circuit jump to land here, then
    /// normalize the final operand to a 0/1 `Int8`.
    ScEnd,

    // --- call/return ---
    Call {
        signature: FunctionSig,
        /// The call site's actual argument types, in push order — may run
        /// longer than `signature.params` when `signature.variadic` is set
        /// and extra arguments were passed. Classified and popped
        /// positionally by `isa::x64::lower::lower_call`, so it always has
        /// to agree with however many values `ir::assemble::assemble_call`
        /// actually pushed for this call.
        arg_types: Vec<TypeId>,
    },
    Ret,
    Func {
        signature: FunctionSig,
        stack_size: u32,
    },
    FuncEnd,
}

/// A complete IR stream for one function.
pub type IrStream = Vec<IROp>;
