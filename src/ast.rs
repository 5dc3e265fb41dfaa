//! The typed AST (§3.2): read-only input to the back end.
//!
//! The front end (§4.8, §4.9) builds and owns this tree; from here on
//! everything treats it as `&Ast`. `exprtype` and `su_number` start
//! unset/zero and are filled in by the type checker and by
//! [`crate::ir::assemble`] respectively — both mutate in place rather than
//! rebuilding the tree, matching the original's "annotate, don't rewrite"
//! approach.

use crate::types::TypeId;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    PrefixIncrement,
    PrefixDecrement,
    SuffixIncrement,
    SuffixDecrement,
    PtrPrefixIncrement,
    PtrPrefixDecrement,
    PtrSuffixIncrement,
    PtrSuffixDecrement,
    ArithPlus,
    ArithNegate,
    LogicNegate,
    BinaryNegate,
    AddressOf,
    Dereference,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Cast,
    CompoundExpr,
    FunctionCall,
    PtrAddition,
    PtrSubtraction,
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Modulo,
    BitshiftLeft,
    BitshiftRight,
    LessThan,
    GreaterThan,
    LessThanOrEqualTo,
    GreaterThanOrEqualTo,
    Equals,
    NotEquals,
    And,
    Or,
    Xor,
    LogicAnd,
    LogicOr,
    Assignment,
    AssignPtrAddition,
    AssignPtrSubtraction,
    AssignAddition,
    AssignSubtraction,
    AssignMultiplication,
    AssignDivision,
    AssignModulo,
    AssignBitshiftLeft,
    AssignBitshiftRight,
    AssignAnd,
    AssignOr,
    AssignXor,
}

impl BinaryOp {
    /// The non-assigning arithmetic op a compound-assignment decomposes
    /// into, per the lowering rule in §4.1 ("`<op>` followed by `store`").
    pub fn decompose(self) -> Option<BinaryOp> {
        use BinaryOp::*;
        Some(match self {
            AssignPtrAddition => PtrAddition,
            AssignPtrSubtraction => PtrSubtraction,
            AssignAddition => Addition,
            AssignSubtraction => Subtraction,
            AssignMultiplication => Multiplication,
            AssignDivision => Division,
            AssignModulo => Modulo,
            AssignBitshiftLeft => BitshiftLeft,
            AssignBitshiftRight => BitshiftRight,
            AssignAnd => And,
            AssignOr => Or,
            AssignXor => Xor,
            _ => return None,
        })
    }

    pub fn is_compound_assign(self) -> bool {
        self.decompose().is_some()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Decltype {
    None,
    Static,
    Extern,
    Typedef,
}

#[derive(Clone, Debug)]
pub struct Param {
    pub name: String,
    pub ty: TypeId,
}

#[derive(Clone, Debug)]
pub struct FunctionSig {
    pub name: String,
    pub ret: TypeId,
    pub params: Vec<Param>,
    pub variadic: bool,
}

/// A single AST node. Every expression-producing variant carries
/// `exprtype`; only the type checker is allowed to write it, and only the
/// IR assembler is allowed to write `su_number`.
#[derive(Clone, Debug)]
pub struct Ast {
    pub node: Node,
    pub exprtype: Option<TypeId>,
    pub su_number: u32,
}

impl Ast {
    pub fn new(node: Node) -> Self {
        Ast {
            node,
            exprtype: None,
            su_number: 0,
        }
    }

    pub fn ty(&self) -> TypeId {
        self.exprtype
            .expect("exprtype must be assigned by the type checker before codegen")
    }
}

#[derive(Clone, Debug)]
pub enum Node {
    Unary {
        op: UnaryOp,
        inner: Box<Ast>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Ast>,
        right: Box<Ast>,
    },
    Ternary {
        when: Box<Ast>,
        then: Box<Ast>,
        otherwise: Box<Ast>,
    },
    Scope(Vec<Ast>),
    List(Vec<Ast>),
    Declaration {
        name: String,
        decltype: Decltype,
        ty: TypeId,
        init: Option<Box<Ast>>,
        /// Frame offset relative to `rbp`, assigned by the stack-layout
        /// pass in §4.1. `None` until that pass runs.
        frame_offset: Option<i32>,
    },
    Function {
        sig: FunctionSig,
        body: Box<Ast>,
    },
    /// `init`/`step` are a front-end concern: a C `for` loop is desugared
    /// by the parser into a preceding `Declaration` statement and a `step`
    /// expression appended to the end of `body`, so the back end only ever
    /// sees a uniform condition+body shape.
    Loop {
        cond: Option<Box<Ast>>,
        body: Box<Ast>,
    },
    Break,
    Continue,
    Return(Option<Box<Ast>>),
    Integer {
        value: u64,
        width: crate::types::IntWidth,
        is_unsigned: bool,
    },
    Floating {
        value: f64,
        is_single: bool,
    },
    StringLit(String),
    Variable(String),
    WalkStruct {
        base: Box<Ast>,
        field_name: String,
        offset: u64,
    },
}

impl Node {
    /// True if evaluating this subtree can have a side effect (assignment,
    /// call, or pre/post increment) — the gate the Sethi-Ullman reorder in
    /// §4.1/§5 must check before swapping evaluation order.
    pub fn is_pure(&self) -> bool {
        match self {
            Node::Unary { op, inner } => {
                !matches!(
                    op,
                    UnaryOp::PrefixIncrement
                        | UnaryOp::PrefixDecrement
                        | UnaryOp::SuffixIncrement
                        | UnaryOp::SuffixDecrement
                        | UnaryOp::PtrPrefixIncrement
                        | UnaryOp::PtrPrefixDecrement
                        | UnaryOp::PtrSuffixIncrement
                        | UnaryOp::PtrSuffixDecrement
                ) && inner.node.is_pure()
            }
            Node::Binary { op, left, right } => {
                !matches!(op, BinaryOp::FunctionCall)
                    && !op.is_compound_assign()
                    && *op != BinaryOp::Assignment
                    && left.node.is_pure()
                    && right.node.is_pure()
            }
            Node::Ternary {
                when,
                then,
                otherwise,
            } => when.node.is_pure() && then.node.is_pure() && otherwise.node.is_pure(),
            Node::WalkStruct { base, .. } => base.node.is_pure(),
            Node::Integer { .. }
            | Node::Floating { .. }
            | Node::StringLit(_)
            | Node::Variable(_) => true,
            _ => false,
        }
    }
}
