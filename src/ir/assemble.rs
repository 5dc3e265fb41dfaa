//! The IR assembler (component G, §4.1): typed AST in, linear [`IrStream`]
//! out.
//!
//! Three passes, run in order over one function body:
//!
//! 1. [`compute_su_numbers`] — Sethi-Ullman numbers, memoized onto
//!    `Ast::su_number`.
//! 2. [`layout_function`] — stack frame offsets, memoized onto
//!    `Node::Declaration::frame_offset`, plus the name→(type, offset) map
//!    the lowering pass resolves variables through.
//! 3. [`assemble_function`] — the actual AST walk, grounded statement for
//!    statement and expression for expression on the original compiler's
//!    `assemble()`.

use std::collections::HashMap;

use crate::ast::{Ast, BinaryOp, Decltype, FunctionSig, Node, Param, UnaryOp};
use crate::ir::{IROp, IrStream, ValueKind};
use crate::types::{align_to, TypeCache, TypeId, TypeKind};

/// Per-function variable table: every named automatic local, resolved by
/// name (this back end does not model block-scoped shadowing — see
/// DESIGN.md).
pub type VarMap = HashMap<String, (TypeId, i32)>;

pub struct Layout {
    pub vars: VarMap,
    pub stack_size: u32,
}

/// Allocate frame offsets for every local declared in `body`, in a single
/// left-to-right walk with sibling reuse: a block's direct child
/// declarations are laid out sequentially, but independent nested
/// branches (both arms of a ternary, a loop's condition and body, any
/// nested block) all start from the same post-leaf cursor and are sized by
/// the maximum over them, not the sum — grounded directly on the original
/// `append_to_size_tree`/`process_size_tree` two-phase walk.
pub fn layout_function(sig: &FunctionSig, body: &mut Ast, cache: &TypeCache) -> Layout {
    let mut vars = VarMap::new();
    let cursor = layout_params(sig, &mut vars, cache);
    let size = layout_node(body, cursor, &mut vars, cache);
    Layout {
        vars,
        stack_size: align_to(size.max(0) as u64, 16) as u32,
    }
}

/// Reserve frame slots for the incoming parameters, exactly like a
/// sequence of leading declarations — `isa::x64::lower`'s prologue
/// recomputes this same offset sequence independently (from `signature`
/// and the type cache alone) to know where to store each incoming
/// register/stack argument, so the two passes must never diverge.
pub fn layout_params(sig: &FunctionSig, vars: &mut VarMap, cache: &TypeCache) -> i32 {
    let mut cursor = 0i32;
    for p in &sig.params {
        if p.name.is_empty() {
            continue; // the trailing `...` varargs marker carries no storage
        }
        let data = cache.get(p.ty);
        let aligned = align_to(cursor as u64, data.alignment) as i32;
        cursor = aligned + data.size as i32;
        vars.insert(p.name.clone(), (p.ty, aligned));
    }
    cursor
}

fn layout_sequence(children: &mut [&mut Ast], start: i32, vars: &mut VarMap, cache: &TypeCache) -> i32 {
    let mut cursor = start;
    for child in children.iter_mut() {
        if let Node::Declaration {
            name,
            ty,
            frame_offset,
            decltype,
            ..
        } = &mut child.node
        {
            if *decltype != Decltype::None {
                // static/extern/typedef locals are not automatic storage.
                continue;
            }
            let data = cache.get(*ty);
            let aligned = align_to(cursor as u64, data.alignment) as i32;
            cursor = aligned + data.size as i32;
            *frame_offset = Some(aligned);
            if !name.is_empty() {
                vars.insert(name.clone(), (*ty, aligned));
            }
        }
    }
    let mut max_end = cursor;
    for child in children.iter_mut() {
        if !matches!(child.node, Node::Declaration { .. }) {
            let end = layout_node(child, cursor, vars, cache);
            max_end = max_end.max(end);
        }
    }
    max_end
}

fn layout_node(node: &mut Ast, start: i32, vars: &mut VarMap, cache: &TypeCache) -> i32 {
    match &mut node.node {
        Node::Scope(stmts) | Node::List(stmts) => {
            let mut refs: Vec<&mut Ast> = stmts.iter_mut().collect();
            layout_sequence(&mut refs, start, vars, cache)
        }
        Node::Ternary {
            when,
            then,
            otherwise,
        } => {
            let mut refs = [when.as_mut(), then.as_mut(), otherwise.as_mut()];
            layout_sequence(&mut refs, start, vars, cache)
        }
        Node::Loop { cond, body } => {
            let mut refs: Vec<&mut Ast> = cond
                .iter_mut()
                .map(|b| b.as_mut())
                .chain(std::iter::once(body.as_mut()))
                .collect();
            layout_sequence(&mut refs, start, vars, cache)
        }
        Node::Function { body, .. } => layout_node(body, start, vars, cache),
        _ => start,
    }
}

fn combine_su(l: u32, r: u32) -> u32 {
    if l == r {
        l + 1
    } else {
        l.max(r)
    }
}

/// Assign Sethi-Ullman numbers bottom-up, memoized onto `Ast::su_number`.
/// Grounded on the original `get_su_number`, corrected so a bare unary node
/// recurses into its operand instead of itself.
pub fn compute_su_numbers(node: &mut Ast) -> u32 {
    let su = match &mut node.node {
        Node::Unary { inner, .. } => compute_su_numbers(inner),
        Node::Binary {
            op: BinaryOp::FunctionCall,
            left,
            right,
        } => {
            compute_su_numbers(left);
            compute_su_numbers(right);
            1
        }
        Node::Binary { left, right, .. } => {
            let l = compute_su_numbers(left);
            let r = compute_su_numbers(right);
            combine_su(l, r)
        }
        Node::Ternary {
            when,
            then,
            otherwise,
        } => {
            let w = compute_su_numbers(when);
            let t = compute_su_numbers(then);
            let o = compute_su_numbers(otherwise);
            combine_su(w, t.max(o))
        }
        Node::Scope(stmts) | Node::List(stmts) => {
            for s in stmts.iter_mut() {
                compute_su_numbers(s);
            }
            1
        }
        Node::Declaration { init, .. } => {
            if let Some(init) = init {
                compute_su_numbers(init);
            }
            1
        }
        Node::Loop { cond, body } => {
            if let Some(c) = cond {
                compute_su_numbers(c);
            }
            compute_su_numbers(body);
            1
        }
        Node::Return(expr) => {
            if let Some(e) = expr {
                compute_su_numbers(e);
            }
            1
        }
        Node::WalkStruct { base, .. } => compute_su_numbers(base),
        Node::Function { body, .. } => {
            compute_su_numbers(body);
            1
        }
        Node::Break | Node::Continue | Node::Integer { .. } | Node::Floating { .. }
        | Node::StringLit(_) | Node::Variable(_) => 1,
    };
    node.su_number = su;
    su
}

/// Collapse a fully described type to the reduced lattice the back end
/// schedules over, treating aggregates as opaque addresses (this back end
/// does not pass structs by value — see DESIGN.md).
pub(crate) fn value_kind_of(cache: &TypeCache, ty: TypeId) -> ValueKind {
    let data = cache.get(ty);
    if data.is_aggregate() {
        ValueKind::Ptr
    } else {
        ValueKind::from_type(data)
    }
}

fn pointee_size(cache: &TypeCache, ty: TypeId) -> u64 {
    match &cache.get(ty).kind {
        TypeKind::Pointer(base) => cache.get(*base).size.max(1),
        _ => 1,
    }
}

/// Assemble one function's IR stream: frame layout, su numbers, then the
/// walk itself. `body` must be `Node::Scope` (a function's block).
pub fn assemble_function(sig: &FunctionSig, body: &mut Ast, cache: &TypeCache) -> IrStream {
    compute_su_numbers(body);
    let layout = layout_function(sig, body, cache);

    let mut stream = IrStream::new();
    stream.push(IROp::Func {
        signature: sig.clone(),
        stack_size: layout.stack_size,
    });

    let mut last_was_return = false;
    if let Node::Scope(stmts) = &body.node {
        for stmt in stmts {
            assemble_stmt(&mut stream, stmt, &layout.vars, cache);
            last_was_return = matches!(stmt.node, Node::Return(_));
        }
    }
    if !last_was_return {
        stream.push(IROp::PushI {
            value: 0,
            kind: ValueKind::I32,
            unsigned: false,
        });
        stream.push(IROp::Ret);
    }
    stream.push(IROp::FuncEnd);
    log::trace!("assembled `{}`:\n{}", sig.name, crate::ir::dump::dump(&stream));
    stream
}

fn assemble_stmt(stream: &mut IrStream, node: &Ast, vars: &VarMap, cache: &TypeCache) {
    match &node.node {
        Node::Declaration {
            ty,
            init,
            frame_offset,
            decltype,
            ..
        } => {
            if *decltype != Decltype::None {
                return;
            }
            if let Some(init) = init {
                assemble_expr(stream, init, vars, cache);
                let offset = frame_offset.expect("layout pass must run before assembly");
                let data = cache.get(*ty);
                stream.push(IROp::LStack {
                    offset,
                    kind: value_kind_of(cache, *ty),
                    unsigned: data.is_unsigned,
                });
                stream.push(IROp::Store);
                stream.push(IROp::Pop);
            }
        }
        Node::Scope(stmts) | Node::List(stmts) => {
            for s in stmts {
                assemble_stmt(stream, s, vars, cache);
            }
        }
        Node::Loop { cond, body } => {
            stream.push(IROp::If);
            match cond {
                Some(c) => assemble_expr(stream, c, vars, cache),
                None => stream.push(IROp::PushI {
                    value: 1,
                    kind: ValueKind::I32,
                    unsigned: false,
                }),
            }
            stream.push(IROp::Then);
            assemble_stmt(stream, body, vars, cache);
            stream.push(IROp::GotoStart);
            stream.push(IROp::End);
        }
        Node::Ternary {
            when,
            then,
            otherwise,
        } => {
            // `if`/`else` has no AST node of its own — the original's own
            // tagged AST set doesn't have one either, only Ternary and
            // Loop — so the parser desugars `if (c) a else b` into a
            // Ternary whose arms are statement blocks. It lowers exactly
            // like a value-producing ternary (same `if/then/else/end`
            // shape), just with nothing to merge at the end; a bare
            // `c ? f() : g();` statement takes the same path and comes out
            // identical either way, so no separate case is needed for it.
            stream.push(IROp::If);
            assemble_expr(stream, when, vars, cache);
            stream.push(IROp::Then);
            assemble_stmt(stream, then, vars, cache);
            stream.push(IROp::Else);
            assemble_stmt(stream, otherwise, vars, cache);
            stream.push(IROp::End);
        }
        Node::Break => stream.push(IROp::GotoEnd),
        Node::Continue => stream.push(IROp::GotoStart),
        Node::Return(expr) => {
            match expr {
                Some(e) => assemble_expr(stream, e, vars, cache),
                None => stream.push(IROp::PushI {
                    value: 0,
                    kind: ValueKind::I64,
                    unsigned: true,
                }),
            }
            stream.push(IROp::Ret);
        }
        _ => {
            // An expression used as a statement: evaluate for effect, then
            // discard the value it leaves on the operand stack.
            assemble_expr(stream, node, vars, cache);
            stream.push(IROp::Pop);
        }
    }
}

fn promote(stream: &mut IrStream, ast: &Ast, cache: &TypeCache) {
    let kind = value_kind_of(cache, ast.ty());
    if matches!(kind, ValueKind::I8 | ValueKind::I16) {
        let unsigned = cache.get(ast.ty()).is_unsigned;
        stream.push(IROp::Cvt {
            kind: ValueKind::I32,
            unsigned,
        });
    }
}

fn assemble_expr(stream: &mut IrStream, node: &Ast, vars: &VarMap, cache: &TypeCache) {
    match &node.node {
        Node::Integer {
            value,
            width,
            is_unsigned,
        } => {
            let kind = match width {
                crate::types::IntWidth::I8 => ValueKind::I8,
                crate::types::IntWidth::I16 => ValueKind::I16,
                crate::types::IntWidth::I32 => ValueKind::I32,
                crate::types::IntWidth::I64 => ValueKind::I64,
            };
            stream.push(IROp::PushI {
                value: *value,
                kind,
                unsigned: *is_unsigned,
            });
        }
        Node::Floating { value, is_single } => {
            if *is_single {
                stream.push(IROp::PushF(*value as f32));
            } else {
                stream.push(IROp::PushD(*value));
            }
        }
        Node::StringLit(_) => {
            // String literals are placed in a read-only data pool by the
            // compiler context (§4.10); the assembler only knows it wants
            // a pointer to wherever that pool ends up, resolved when the
            // code buffer's data section is finalized.
            stream.push(IROp::LAddr {
                addr: 0,
                kind: ValueKind::Ptr,
                unsigned: true,
            });
        }
        Node::Variable(name) => {
            let (ty, offset) = vars
                .get(name)
                .unwrap_or_else(|| panic!("undeclared variable `{name}` reached codegen"));
            let data = cache.get(*ty);
            stream.push(IROp::LStack {
                offset: *offset,
                kind: value_kind_of(cache, *ty),
                unsigned: data.is_unsigned,
            });
        }
        Node::Unary { op, inner } => assemble_unary(stream, *op, inner, node, vars, cache),
        Node::Binary { op, left, right } => {
            assemble_binary(stream, *op, left, right, node, vars, cache)
        }
        Node::Ternary {
            when,
            then,
            otherwise,
        } => {
            stream.push(IROp::If);
            assemble_expr(stream, when, vars, cache);
            stream.push(IROp::Then);
            assemble_expr(stream, then, vars, cache);
            stream.push(IROp::Else);
            assemble_expr(stream, otherwise, vars, cache);
            stream.push(IROp::End);
        }
        Node::WalkStruct { base, offset, .. } => {
            assemble_expr(stream, base, vars, cache);
            stream.push(IROp::Offset {
                bytes: *offset as i32,
            });
        }
        Node::Scope(_)
        | Node::List(_)
        | Node::Declaration { .. }
        | Node::Function { .. }
        | Node::Loop { .. }
        | Node::Break
        | Node::Continue
        | Node::Return(_) => {
            unreachable!("statement node reached in expression position")
        }
    }
}

fn assemble_unary(
    stream: &mut IrStream,
    op: UnaryOp,
    inner: &Ast,
    node: &Ast,
    vars: &VarMap,
    cache: &TypeCache,
) {
    use UnaryOp::*;
    match op {
        ArithPlus => {
            assemble_expr(stream, inner, vars, cache);
            promote(stream, inner, cache);
        }
        ArithNegate => {
            assemble_expr(stream, inner, vars, cache);
            promote(stream, inner, cache);
            stream.push(IROp::Neg);
        }
        LogicNegate => {
            assemble_expr(stream, inner, vars, cache);
            promote(stream, inner, cache);
            stream.push(IROp::Zero);
        }
        BinaryNegate => {
            assemble_expr(stream, inner, vars, cache);
            promote(stream, inner, cache);
            stream.push(IROp::Not);
        }
        Dereference => {
            assemble_expr(stream, inner, vars, cache);
            promote(stream, inner, cache);
            let data = cache.get(node.ty());
            stream.push(IROp::Load {
                kind: value_kind_of(cache, node.ty()),
                unsigned: data.is_unsigned,
            });
        }
        AddressOf => {
            assemble_expr(stream, inner, vars, cache);
            stream.push(IROp::AddrOf);
        }
        PrefixIncrement | PrefixDecrement | SuffixIncrement | SuffixDecrement => {
            assemble_expr(stream, inner, vars, cache);
            let suffix = matches!(op, SuffixIncrement | SuffixDecrement);
            let negative = matches!(op, PrefixDecrement | SuffixDecrement);
            stream.push(IROp::Inc {
                suffix,
                step: if negative { -1 } else { 1 },
            });
        }
        PtrPrefixIncrement | PtrPrefixDecrement | PtrSuffixIncrement | PtrSuffixDecrement => {
            assemble_expr(stream, inner, vars, cache);
            let step = pointee_size(cache, inner.ty()) as i32;
            let suffix = matches!(op, PtrSuffixIncrement | PtrSuffixDecrement);
            let negative = matches!(op, PtrPrefixDecrement | PtrSuffixDecrement);
            stream.push(IROp::Inc {
                suffix,
                step: if negative { -step } else { step },
            });
        }
    }
}

fn emit_operands_in_su_order(stream: &mut IrStream, left: &Ast, right: &Ast, vars: &VarMap, cache: &TypeCache) {
    if left.node.is_pure() && right.node.is_pure() && right.su_number > left.su_number {
        assemble_expr(stream, right, vars, cache);
        assemble_expr(stream, left, vars, cache);
        stream.push(IROp::Swp);
    } else {
        assemble_expr(stream, left, vars, cache);
        assemble_expr(stream, right, vars, cache);
    }
}

fn plain_irop(op: BinaryOp) -> IROp {
    use BinaryOp::*;
    match op {
        Addition => IROp::Add,
        Subtraction => IROp::Sub,
        Multiplication => IROp::Mul,
        Division => IROp::Div,
        Modulo => IROp::Mod,
        BitshiftLeft => IROp::Shl,
        BitshiftRight => IROp::Shr,
        And => IROp::And,
        Or => IROp::Or,
        Xor => IROp::Xor,
        Equals => IROp::Eql,
        NotEquals => IROp::Neq,
        LessThan => IROp::Lst,
        LessThanOrEqualTo => IROp::Lte,
        GreaterThan => IROp::Grt,
        GreaterThanOrEqualTo => IROp::Gte,
        other => unreachable!("{other:?} is not a plain binary op"),
    }
}

fn compound_irop(op: BinaryOp) -> IROp {
    use BinaryOp::*;
    match op {
        AssignAddition => IROp::SAdd,
        AssignSubtraction => IROp::SSub,
        AssignMultiplication => IROp::SMul,
        AssignDivision => IROp::SDiv,
        AssignModulo => IROp::SMod,
        AssignBitshiftLeft => IROp::SShl,
        AssignBitshiftRight => IROp::SShr,
        AssignAnd => IROp::SAnd,
        AssignOr => IROp::SOr,
        AssignXor => IROp::SXor,
        other => unreachable!("{other:?} is not a compound-assign op"),
    }
}

/// Flatten a left-associative chain of the same `&&`/`||` operator into one
/// `sc_begin ... land/lor ... sc_end` scope, rather than nesting a fresh
/// scope per node — grounded on the x86-64 backend's `sc_begin`/`land`/
/// `lor`/`sc_end` handlers (never wired up by the original's AST walk,
/// which left `LogicAnd`/`LogicOr` as a stub).
fn collect_logic_chain<'a>(node: &'a Ast, op: BinaryOp) -> Vec<&'a Ast> {
    match &node.node {
        Node::Binary {
            op: inner_op,
            left,
            right,
        } if *inner_op == op => {
            let mut operands = collect_logic_chain(left, op);
            operands.push(right);
            operands
        }
        _ => vec![node],
    }
}

fn assemble_logic_chain(stream: &mut IrStream, op: BinaryOp, node: &Ast, vars: &VarMap, cache: &TypeCache) {
    let operands = collect_logic_chain(node, op);
    let link = if op == BinaryOp::LogicAnd { IROp::Land } else { IROp::Lor };
    stream.push(IROp::ScBegin);
    let last = operands.len() - 1;
    for (i, operand) in operands.iter().enumerate() {
        assemble_expr(stream, operand, vars, cache);
        if i != last {
            stream.push(link.clone());
        }
    }
    stream.push(IROp::ScEnd);
}

fn scale_by_pointee(stream: &mut IrStream, ptr_ty: TypeId, cache: &TypeCache) {
    let size = pointee_size(cache, ptr_ty);
    stream.push(IROp::PushI {
        value: size,
        kind: ValueKind::I64,
        unsigned: true,
    });
    stream.push(IROp::Mul);
}

fn assemble_ptr_arith(stream: &mut IrStream, op: BinaryOp, left: &Ast, right: &Ast, vars: &VarMap, cache: &TypeCache) {
    use BinaryOp::*;
    match op {
        PtrAddition | PtrSubtraction => {
            assemble_expr(stream, left, vars, cache);
            assemble_expr(stream, right, vars, cache);
            scale_by_pointee(stream, left.ty(), cache);
            stream.push(if op == PtrSubtraction { IROp::Sub } else { IROp::Add });
        }
        AssignPtrAddition | AssignPtrSubtraction => {
            assemble_expr(stream, left, vars, cache); // addressable target, stays on the stack
            assemble_expr(stream, right, vars, cache);
            scale_by_pointee(stream, left.ty(), cache);
            stream.push(if op == AssignPtrSubtraction {
                IROp::SSub
            } else {
                IROp::SAdd
            });
        }
        other => unreachable!("{other:?} is not pointer arithmetic"),
    }
}

fn assemble_call(stream: &mut IrStream, left: &Ast, right: &Ast, _node: &Ast, vars: &VarMap, cache: &TypeCache) {
    let args: Vec<&Ast> = match &right.node {
        Node::List(items) => items.iter().collect(),
        Node::Declaration { .. } | Node::Scope(_) => Vec::new(),
        _ => vec![right],
    };

    let fn_data = cache.get(left.ty());
    let (ret, params, variadic) = match &fn_data.kind {
        TypeKind::Function {
            ret,
            params,
            variadic,
        } => (*ret, params.clone(), *variadic),
        TypeKind::Pointer(inner) => match &cache.get(*inner).kind {
            TypeKind::Function {
                ret,
                params,
                variadic,
            } => (*ret, params.clone(), *variadic),
            _ => panic!("call target's pointee is not a function type"),
        },
        _ => panic!("call target is not a function type"),
    };

    let direct_name = match &left.node {
        Node::Variable(name) => Some(name.clone()),
        _ => None,
    };

    // Indirect calls push the callee value ahead of the arguments so the
    // lowering stage has something to dereference; direct calls resolve
    // the target by name through the symbol table instead.
    if direct_name.is_none() {
        assemble_expr(stream, left, vars, cache);
    }
    for arg in &args {
        assemble_expr(stream, arg, vars, cache);
    }

    let arg_types: Vec<TypeId> = args.iter().map(|arg| arg.ty()).collect();

    let sig = FunctionSig {
        name: direct_name.unwrap_or_default(),
        ret,
        params: params
            .into_iter()
            .map(|ty| Param {
                name: String::new(),
                ty,
            })
            .collect(),
        variadic,
    };
    stream.push(IROp::Call { signature: sig, arg_types });
}

fn assemble_binary(
    stream: &mut IrStream,
    op: BinaryOp,
    left: &Ast,
    right: &Ast,
    node: &Ast,
    vars: &VarMap,
    cache: &TypeCache,
) {
    use BinaryOp::*;
    match op {
        Cast => {
            assemble_expr(stream, left, vars, cache);
            let data = cache.get(node.ty());
            stream.push(IROp::Cvt {
                kind: value_kind_of(cache, node.ty()),
                unsigned: data.is_unsigned,
            });
        }
        CompoundExpr => {
            assemble_expr(stream, left, vars, cache);
            stream.push(IROp::Pop);
            assemble_expr(stream, right, vars, cache);
        }
        FunctionCall => assemble_call(stream, left, right, node, vars, cache),
        LogicAnd | LogicOr => assemble_logic_chain(stream, op, node, vars, cache),
        PtrAddition | PtrSubtraction | AssignPtrAddition | AssignPtrSubtraction => {
            assemble_ptr_arith(stream, op, left, right, vars, cache)
        }
        Assignment => {
            emit_operands_in_su_order(stream, left, right, vars, cache);
            stream.push(IROp::Store);
        }
        _ if op.is_compound_assign() => {
            emit_operands_in_su_order(stream, left, right, vars, cache);
            stream.push(compound_irop(op));
        }
        _ => {
            emit_operands_in_su_order(stream, left, right, vars, cache);
            stream.push(plain_irop(op));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Param as AstParam;
    use crate::types::IntWidth;

    fn int_lit(v: u64) -> Ast {
        Ast::new(Node::Integer {
            value: v,
            width: IntWidth::I32,
            is_unsigned: false,
        })
    }

    #[test]
    fn one_plus_two_lowers_to_two_pushes_and_an_add() {
        let mut cache = TypeCache::new();
        let i32_ty = cache.int(IntWidth::I32, false);
        let mut add = Ast::new(Node::Binary {
            op: BinaryOp::Addition,
            left: Box::new(int_lit(1)),
            right: Box::new(int_lit(2)),
        });
        add.exprtype = Some(i32_ty);
        let mut ret = Ast::new(Node::Return(Some(Box::new(add))));
        ret.exprtype = Some(i32_ty);
        let mut body = Ast::new(Node::Scope(vec![ret]));

        let sig = FunctionSig {
            name: "main".into(),
            ret: i32_ty,
            params: Vec::<AstParam>::new(),
            variadic: false,
        };
        let stream = assemble_function(&sig, &mut body, &cache);

        let ops: Vec<&str> = stream
            .iter()
            .map(|op| match op {
                IROp::Func { .. } => "func",
                IROp::PushI { .. } => "pushi",
                IROp::Add => "add",
                IROp::Ret => "ret",
                IROp::FuncEnd => "func_end",
                _ => "other",
            })
            .collect();
        assert_eq!(ops, vec!["func", "pushi", "pushi", "add", "ret", "func_end"]);
    }

    #[test]
    fn declaration_with_initializer_allocates_a_frame_slot() {
        let mut cache = TypeCache::new();
        let i32_ty = cache.int(IntWidth::I32, false);
        let decl = Ast::new(Node::Declaration {
            name: "x".into(),
            decltype: Decltype::None,
            ty: i32_ty,
            init: Some(Box::new(int_lit(10))),
            frame_offset: None,
        });
        let mut body = Ast::new(Node::Scope(vec![decl]));
        let sig = FunctionSig {
            name: "f".into(),
            ret: i32_ty,
            params: Vec::<AstParam>::new(),
            variadic: false,
        };
        let layout = layout_function(&sig, &mut body, &cache);
        assert_eq!(layout.vars.get("x"), Some(&(i32_ty, 0)));
        assert_eq!(layout.stack_size, 16); // 4 bytes, aligned up to 16
    }
}
