//! Bottom-up type checker (component L, §4.9): assigns every expression's
//! `exprtype`, resolves identifiers against a lexical scope, resolves
//! struct/union field offsets, and rewrites plain `+`/`-` into the pointer
//! variants `ir/assemble.rs` already knows how to scale.
//!
//! Declared types are already [`TypeId`]s by the time a tree reaches here —
//! `frontend::parser` resolves type syntax against the [`TypeCache`]
//! directly, since a declared type never depends on a value. What's left
//! for this pass is everything that DOES depend on other expressions: an
//! identifier's type comes from its nearest enclosing declaration, a
//! struct access's offset comes from the base's resolved type, and `a + b`
//! is only known to be pointer arithmetic once `a`'s type is known.

use std::collections::HashMap;

use crate::ast::{Ast, BinaryOp, FunctionSig, Node, UnaryOp};
use crate::error::{CompileError, CompileResult, Location};
use crate::types::{FloatWidth, TypeCache, TypeId, TypeKind};

/// A stack of lexical blocks, innermost last — variables and their
/// declared types, mirroring the nesting of `Scope`/`Loop`/function
/// bodies. Purely a name→type lookup; `ir::assemble::Layout` computes
/// frame offsets separately, later, from the same tree.
struct Scopes {
    blocks: Vec<HashMap<String, TypeId>>,
}

impl Scopes {
    fn new() -> Self {
        Scopes { blocks: vec![HashMap::new()] }
    }

    fn push(&mut self) {
        self.blocks.push(HashMap::new());
    }

    fn pop(&mut self) {
        self.blocks.pop();
    }

    fn declare(&mut self, name: String, ty: TypeId) {
        self.blocks.last_mut().expect("at least one block").insert(name, ty);
    }

    fn lookup(&self, name: &str) -> Option<TypeId> {
        self.blocks.iter().rev().find_map(|b| b.get(name).copied())
    }
}

struct Checker<'a> {
    cache: &'a mut TypeCache,
    functions: &'a HashMap<String, FunctionSig>,
    scopes: Scopes,
}

pub fn check_function(
    sig: &FunctionSig,
    body: &mut Ast,
    cache: &mut TypeCache,
    functions: &HashMap<String, FunctionSig>,
) -> CompileResult<()> {
    let mut checker = Checker {
        cache,
        functions,
        scopes: Scopes::new(),
    };
    for param in &sig.params {
        checker.scopes.declare(param.name.clone(), param.ty);
    }
    checker.check_stmt(body)
}

fn here() -> Location {
    // Front-end errors past parsing don't carry a live cursor; callers
    // that need a precise location attach one at the point of detection.
    Location::default()
}

impl<'a> Checker<'a> {
    fn check_stmt(&mut self, node: &mut Ast) -> CompileResult<()> {
        match &mut node.node {
            Node::Scope(stmts) => {
                self.scopes.push();
                for stmt in stmts {
                    self.check_stmt(stmt)?;
                }
                self.scopes.pop();
            }
            Node::Declaration { name, ty, init, .. } => {
                if let Some(init) = init {
                    self.check_expr(init)?;
                }
                self.scopes.declare(name.clone(), *ty);
            }
            Node::Loop { cond, body } => {
                if let Some(cond) = cond {
                    self.check_expr(cond)?;
                }
                self.check_stmt(body)?;
            }
            Node::Ternary { when, then, otherwise } => {
                // Statement position: this is an `if`/`else`, not a value.
                self.check_expr(when)?;
                self.check_stmt(then)?;
                self.check_stmt(otherwise)?;
            }
            Node::Break | Node::Continue => {}
            Node::Return(expr) => {
                if let Some(expr) = expr {
                    self.check_expr(expr)?;
                }
            }
            Node::Function { .. } => {
                return Err(CompileError::internal("nested function definitions are not supported"));
            }
            _ => {
                self.check_expr(node)?;
            }
        }
        Ok(())
    }

    fn check_expr(&mut self, node: &mut Ast) -> CompileResult<()> {
        let ty = match &mut node.node {
            Node::Integer { width, is_unsigned, .. } => self.cache.int(*width, *is_unsigned),
            Node::Floating { is_single, .. } => {
                self.cache.float(if *is_single { FloatWidth::F32 } else { FloatWidth::F64 })
            }
            Node::StringLit(_) => {
                let char_ty = self.cache.int(crate::types::IntWidth::I8, false);
                self.cache.pointer(char_ty)
            }
            Node::Variable(name) => self
                .scopes
                .lookup(name)
                .ok_or_else(|| CompileError::semantic(here(), format!("undeclared identifier `{name}`")))?,
            Node::Unary { op, inner } => self.check_unary(op, inner)?,
            Node::Binary { op, left, right } => self.check_binary(op, left, right)?,
            Node::Ternary { when, then, otherwise } => {
                // Expression position: `cond ? a : b`.
                self.check_expr(when)?;
                self.check_expr(then)?;
                self.check_expr(otherwise)?;
                self.common_arith_type(then.ty(), otherwise.ty())
            }
            Node::WalkStruct { base, field_name, offset } => {
                self.check_expr(base)?;
                let data = self.cache.get(base.ty());
                let fields = match &data.kind {
                    TypeKind::Struct { fields, .. } | TypeKind::Union { fields, .. } => fields,
                    _ => {
                        return Err(CompileError::semantic(
                            here(),
                            "member access on a non-aggregate type",
                        ))
                    }
                };
                let field = fields
                    .iter()
                    .find(|f| &f.name == field_name)
                    .ok_or_else(|| CompileError::semantic(here(), format!("no member named `{field_name}`")))?;
                *offset = field.offset;
                field.ty
            }
            Node::Scope(_) | Node::List(_) | Node::Declaration { .. } | Node::Loop { .. }
            | Node::Break | Node::Continue | Node::Return(_) | Node::Function { .. } => {
                return Err(CompileError::internal("statement node reached in expression position"));
            }
        };
        node.exprtype = Some(ty);
        Ok(())
    }

    fn check_unary(&mut self, op: &mut UnaryOp, inner: &mut Ast) -> CompileResult<TypeId> {
        self.check_expr(inner)?;
        let inner_data = self.cache.get(inner.ty());
        let inner_is_pointer = inner_data.is_pointer();

        // Pointer increment/decrement steps by the pointee's size, not by
        // one byte — rewrite to the variant `ir/assemble.rs` scales.
        if inner_is_pointer {
            *op = match *op {
                UnaryOp::PrefixIncrement => UnaryOp::PtrPrefixIncrement,
                UnaryOp::PrefixDecrement => UnaryOp::PtrPrefixDecrement,
                UnaryOp::SuffixIncrement => UnaryOp::PtrSuffixIncrement,
                UnaryOp::SuffixDecrement => UnaryOp::PtrSuffixDecrement,
                other => other,
            };
        }

        let ty = match *op {
            UnaryOp::AddressOf => self.cache.pointer(inner.ty()),
            UnaryOp::Dereference => match &self.cache.get(inner.ty()).kind {
                TypeKind::Pointer(base) => *base,
                _ => return Err(CompileError::semantic(here(), "dereference of a non-pointer type")),
            },
            UnaryOp::LogicNegate => self.cache.int(crate::types::IntWidth::I32, false),
            UnaryOp::PrefixIncrement
            | UnaryOp::PrefixDecrement
            | UnaryOp::SuffixIncrement
            | UnaryOp::SuffixDecrement
            | UnaryOp::PtrPrefixIncrement
            | UnaryOp::PtrPrefixDecrement
            | UnaryOp::PtrSuffixIncrement
            | UnaryOp::PtrSuffixDecrement
            | UnaryOp::ArithPlus
            | UnaryOp::ArithNegate
            | UnaryOp::BinaryNegate => inner.ty(),
        };
        Ok(ty)
    }

    fn check_binary(&mut self, op: &mut BinaryOp, left: &mut Ast, right: &mut Ast) -> CompileResult<TypeId> {
        if *op == BinaryOp::Cast {
            // `right` is a synthetic marker the parser stamped with the
            // cast's target type; it is never itself evaluated as an
            // expression (see `frontend::parser::cast_marker`).
            self.check_expr(left)?;
            return Ok(right.ty());
        }
        if *op == BinaryOp::FunctionCall {
            return self.check_call(left, right);
        }

        self.check_expr(left)?;
        self.check_expr(right)?;

        match *op {
            BinaryOp::CompoundExpr => Ok(right.ty()),
            BinaryOp::LogicAnd | BinaryOp::LogicOr => Ok(self.cache.int(crate::types::IntWidth::I32, false)),
            BinaryOp::Addition | BinaryOp::Subtraction => {
                self.rewrite_ptr_arith(op, left, right);
                if matches!(*op, BinaryOp::PtrAddition | BinaryOp::PtrSubtraction) {
                    Ok(left.ty())
                } else {
                    Ok(self.common_arith_type(left.ty(), right.ty()))
                }
            }
            BinaryOp::AssignAddition | BinaryOp::AssignSubtraction => {
                self.rewrite_ptr_arith(op, left, right);
                Ok(left.ty())
            }
            BinaryOp::Multiplication
            | BinaryOp::Division
            | BinaryOp::Modulo
            | BinaryOp::BitshiftLeft
            | BinaryOp::BitshiftRight
            | BinaryOp::And
            | BinaryOp::Or
            | BinaryOp::Xor => Ok(self.common_arith_type(left.ty(), right.ty())),
            BinaryOp::LessThan
            | BinaryOp::GreaterThan
            | BinaryOp::LessThanOrEqualTo
            | BinaryOp::GreaterThanOrEqualTo
            | BinaryOp::Equals
            | BinaryOp::NotEquals => Ok(self.cache.int(crate::types::IntWidth::I32, false)),
            BinaryOp::Assignment => Ok(left.ty()),
            BinaryOp::AssignMultiplication
            | BinaryOp::AssignDivision
            | BinaryOp::AssignModulo
            | BinaryOp::AssignBitshiftLeft
            | BinaryOp::AssignBitshiftRight
            | BinaryOp::AssignAnd
            | BinaryOp::AssignOr
            | BinaryOp::AssignXor => Ok(left.ty()),
            BinaryOp::PtrAddition | BinaryOp::PtrSubtraction | BinaryOp::AssignPtrAddition | BinaryOp::AssignPtrSubtraction => {
                Ok(left.ty())
            }
            BinaryOp::Cast | BinaryOp::FunctionCall => unreachable!("handled above"),
        }
    }

    /// `a + b`/`a - b` where one side is a pointer and the other an
    /// integer becomes `PtrAddition`/`PtrSubtraction`, normalized so the
    /// pointer operand is always on the left — `assemble_ptr_arith` scales
    /// whichever operand sits on the right.
    fn rewrite_ptr_arith(&mut self, op: &mut BinaryOp, left: &mut Ast, right: &mut Ast) {
        let left_ptr = self.cache.get(left.ty()).is_pointer();
        let right_ptr = self.cache.get(right.ty()).is_pointer();
        match *op {
            BinaryOp::Addition if right_ptr && !left_ptr => {
                std::mem::swap(left, right);
                *op = BinaryOp::PtrAddition;
            }
            BinaryOp::Addition if left_ptr => *op = BinaryOp::PtrAddition,
            BinaryOp::Subtraction if left_ptr => *op = BinaryOp::PtrSubtraction,
            BinaryOp::AssignAddition if left_ptr => *op = BinaryOp::AssignPtrAddition,
            BinaryOp::AssignSubtraction if left_ptr => *op = BinaryOp::AssignPtrSubtraction,
            _ => {}
        }
    }

    fn check_call(&mut self, left: &mut Ast, right: &mut Ast) -> CompileResult<TypeId> {
        let ret = if let Node::Variable(name) = &left.node {
            let sig = self
                .functions
                .get(name)
                .ok_or_else(|| CompileError::semantic(here(), format!("call to undeclared function `{name}`")))?;
            let ret = sig.ret;
            // `left` still needs an exprtype for `ir::assemble`'s generic
            // walk, even though direct calls resolve through the symbol
            // table by name rather than by value.
            left.exprtype = Some(self.cache.pointer(ret));
            ret
        } else {
            self.check_expr(left)?;
            match &self.cache.get(left.ty()).kind {
                TypeKind::Pointer(inner) => match &self.cache.get(*inner).kind {
                    TypeKind::Function { ret, .. } => *ret,
                    _ => return Err(CompileError::semantic(here(), "called value is not a function")),
                },
                _ => return Err(CompileError::semantic(here(), "called value is not a function")),
            }
        };

        match &mut right.node {
            Node::List(items) => {
                for item in items {
                    self.check_expr(item)?;
                }
            }
            Node::Scope(items) if items.is_empty() => {}
            _ => self.check_expr(right)?,
        }

        Ok(ret)
    }

    /// C's "usual arithmetic conversions", simplified: both operands
    /// promote to at least `int`; float beats int; wider beats narrower;
    /// unsigned beats signed at the same final width. Exact corner cases
    /// (signed/unsigned of equal rank converting per the standard's rank
    /// table) are not reproduced — see DESIGN.md.
    fn common_arith_type(&mut self, a: TypeId, b: TypeId) -> TypeId {
        let da = self.cache.get(a).clone();
        let db = self.cache.get(b).clone();
        if da.is_float() || db.is_float() {
            let wa = if let TypeKind::Float(w) = da.kind { w.bytes() } else { 0 };
            let wb = if let TypeKind::Float(w) = db.kind { w.bytes() } else { 0 };
            let bytes = wa.max(wb).max(4);
            let width = if bytes > 4 { FloatWidth::F64 } else { FloatWidth::F32 };
            return self.cache.float(width);
        }
        let bytes = da.size.max(db.size).max(4);
        let width = if bytes > 4 {
            crate::types::IntWidth::I64
        } else {
            crate::types::IntWidth::I32
        };
        let is_unsigned = (da.is_unsigned && da.size >= bytes) || (db.is_unsigned && db.size >= bytes);
        self.cache.int(width, is_unsigned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Decltype, Param};
    use crate::types::IntWidth;

    fn int_sig(name: &str, cache: &mut TypeCache) -> FunctionSig {
        let i32_ty = cache.int(IntWidth::I32, false);
        FunctionSig {
            name: name.into(),
            ret: i32_ty,
            params: Vec::new(),
            variadic: false,
        }
    }

    #[test]
    fn literal_addition_gets_int_type() {
        let mut cache = TypeCache::new();
        let sig = int_sig("main", &mut cache);
        let mut body = Ast::new(Node::Return(Some(Box::new(Ast::new(Node::Binary {
            op: BinaryOp::Addition,
            left: Box::new(Ast::new(Node::Integer { value: 1, width: IntWidth::I32, is_unsigned: false })),
            right: Box::new(Ast::new(Node::Integer { value: 2, width: IntWidth::I32, is_unsigned: false })),
        })))));
        let functions = HashMap::new();
        check_function(&sig, &mut body, &mut cache, &functions).unwrap();
        let i32_ty = cache.int(IntWidth::I32, false);
        if let Node::Return(Some(expr)) = &body.node {
            assert_eq!(expr.exprtype, Some(i32_ty));
        } else {
            panic!("expected return");
        }
    }

    #[test]
    fn pointer_plus_int_rewrites_to_ptr_addition() {
        let mut cache = TypeCache::new();
        let i32_ty = cache.int(IntWidth::I32, false);
        let ptr_ty = cache.pointer(i32_ty);
        let sig = FunctionSig {
            name: "f".into(),
            ret: i32_ty,
            params: vec![Param { name: "p".into(), ty: ptr_ty }],
            variadic: false,
        };
        let mut body = Ast::new(Node::Scope(vec![Ast::new(Node::Declaration {
            name: "q".into(),
            decltype: Decltype::None,
            ty: ptr_ty,
            init: Some(Box::new(Ast::new(Node::Binary {
                op: BinaryOp::Addition,
                left: Box::new(Ast::new(Node::Variable("p".into()))),
                right: Box::new(Ast::new(Node::Integer { value: 1, width: IntWidth::I32, is_unsigned: false })),
            }))),
            frame_offset: None,
        })]));
        let functions = HashMap::new();
        check_function(&sig, &mut body, &mut cache, &functions).unwrap();
        if let Node::Scope(stmts) = &body.node {
            if let Node::Declaration { init: Some(init), .. } = &stmts[0].node {
                if let Node::Binary { op, .. } = &init.node {
                    assert_eq!(*op, BinaryOp::PtrAddition);
                } else {
                    panic!("expected binary");
                }
            } else {
                panic!("expected declaration");
            }
        } else {
            panic!("expected scope");
        }
    }
}
