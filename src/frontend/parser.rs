//! Recursive-descent parser (component K, §4.8): tokens in, a translation
//! unit of [`Node::Function`] items out.
//!
//! Grounded on `parser.c`'s two halves: `jitc_parse_base_type`'s specifier
//! bitmask table (duplicated here as [`Specifiers`]/[`resolve_specifiers`])
//! and its declarator loop (pointer/array/identifier, folded into
//! [`Parser::parse_declarator`]). The original's statement dispatch
//! (`jitc_parse_statement`'s keyword-by-keyword `if`/`else if` chain) was
//! never filled in past the keyword matches themselves — every body here is
//! new, built the same way the dispatch shape suggests, grounded on how
//! `ir/assemble.rs` already expects each statement shape to arrive (a `for`
//! desugars to a `Scope` holding the init and a `Loop` whose body has the
//! step appended, exactly as `Node::Loop`'s doc comment requires).
//!
//! Type syntax is resolved to a [`TypeId`] immediately, here, rather than
//! deferred to the checker — a declared type never depends on an
//! expression's value, so there is nothing for §4.9's bottom-up pass to
//! wait on. What the checker (§4.9) still owns exclusively is every
//! expression's `exprtype`, name resolution against the lexical scope, and
//! the pointer-arithmetic operator rewrite (see `typecheck.rs`).
//!
//! Declarator grammar is deliberately narrower than full C: pointers,
//! optional array dimensions, and a flat parameter list — no function
//! pointers, no multi-level abstract declarators. See DESIGN.md.

use std::collections::HashMap;

use crate::ast::{Ast, BinaryOp, Decltype, FunctionSig, Node, Param, UnaryOp};
use crate::error::{CompileError, CompileResult, Location};
use crate::types::{IntWidth, TypeCache, TypeId, TypeKind};

use super::lexer::{lex, Token, TokenKind};

/// Base-type specifier bitmask, mirroring `parser.c`'s `jitc_specifiers_t`.
/// A hand-rolled bitset rather than a crate — eight fixed flags checked
/// against a handful of literal combinations is simpler written out than
/// brought in.
#[derive(Copy, Clone, PartialEq, Eq)]
struct Specifiers(u16);

impl Specifiers {
    const INT: Specifiers = Specifiers(1 << 0);
    const SHORT: Specifiers = Specifiers(1 << 1);
    const LONG1: Specifiers = Specifiers(1 << 2);
    const LONG2: Specifiers = Specifiers(1 << 3);
    const CHAR: Specifiers = Specifiers(1 << 4);
    const VOID: Specifiers = Specifiers(1 << 5);
    const FLOAT: Specifiers = Specifiers(1 << 6);
    const DOUBLE: Specifiers = Specifiers(1 << 7);

    fn empty() -> Self {
        Specifiers(0)
    }

    fn is_empty(self) -> bool {
        self.0 == 0
    }

    fn contains(self, other: Specifiers) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Specifiers {
    type Output = Specifiers;
    fn bitor(self, rhs: Specifiers) -> Specifiers {
        Specifiers(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for Specifiers {
    fn bitor_assign(&mut self, rhs: Specifiers) {
        self.0 |= rhs.0;
    }
}

/// The cast target's resolved type is threaded through as the `exprtype`
/// of a synthetic, never-evaluated right operand (see `typecheck.rs`'s
/// `BinaryOp::Cast` arm) — this keeps `ast::Node::Binary`'s two-operand
/// shape exactly as `ir/assemble.rs` already expects it, instead of adding
/// a third field that back end would need a case for.
fn cast_marker(target: TypeId) -> Ast {
    let mut marker = Ast::new(Node::Variable("<cast-target>".into()));
    marker.exprtype = Some(target);
    marker
}

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    cache: &'a mut TypeCache,
    struct_tags: HashMap<String, TypeId>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, cache: &'a mut TypeCache) -> Self {
        Parser {
            tokens,
            pos: 0,
            cache,
            struct_tags: HashMap::new(),
        }
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn loc(&self) -> Location {
        self.tokens[self.pos].location.clone()
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> CompileResult<Token> {
        if self.peek() == &kind {
            Ok(self.advance())
        } else {
            Err(CompileError::parser(self.loc(), what, format!("{:?}", self.peek())))
        }
    }

    fn expect_identifier(&mut self) -> CompileResult<String> {
        match self.peek().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(CompileError::parser(self.loc(), "identifier", format!("{other:?}"))),
        }
    }

    // ---- types ----

    /// Parse `{specifiers|struct-def} -> (TypeId, Decltype)`. Returns
    /// `Ok(None)` if the current token starts no type at all (used by
    /// callers that need to fall back to an expression statement).
    fn try_parse_base_type(&mut self) -> CompileResult<Option<(TypeId, Decltype)>> {
        let mut specs = Specifiers::empty();
        let mut is_unsigned = false;
        let mut is_const = false;
        let mut decltype = Decltype::None;
        let mut struct_type: Option<TypeId> = None;
        let mut saw_any = false;

        loop {
            match self.peek().clone() {
                TokenKind::Extern => {
                    decltype = Decltype::Extern;
                    self.advance();
                }
                TokenKind::Static => {
                    decltype = Decltype::Static;
                    self.advance();
                }
                TokenKind::Typedef => {
                    decltype = Decltype::Typedef;
                    self.advance();
                }
                TokenKind::Const => {
                    is_const = true;
                    self.advance();
                }
                TokenKind::Unsigned => {
                    is_unsigned = true;
                    self.advance();
                }
                TokenKind::Char => {
                    specs |= Specifiers::CHAR;
                    self.advance();
                }
                TokenKind::Short => {
                    specs |= Specifiers::SHORT;
                    self.advance();
                }
                TokenKind::Int => {
                    specs |= Specifiers::INT;
                    self.advance();
                }
                TokenKind::Float => {
                    specs |= Specifiers::FLOAT;
                    self.advance();
                }
                TokenKind::Double => {
                    specs |= Specifiers::DOUBLE;
                    self.advance();
                }
                TokenKind::Void => {
                    specs |= Specifiers::VOID;
                    self.advance();
                }
                TokenKind::Long => {
                    specs |= if specs.contains(Specifiers::LONG1) {
                        Specifiers::LONG2
                    } else {
                        Specifiers::LONG1
                    };
                    self.advance();
                }
                TokenKind::Struct | TokenKind::Union => {
                    struct_type = Some(self.parse_struct_or_union()?);
                    saw_any = true;
                    break;
                }
                _ => break,
            }
            saw_any = true;
        }

        if !saw_any {
            return Ok(None);
        }
        if let Some(ty) = struct_type {
            return Ok(Some((ty, decltype)));
        }

        let kind = resolve_specifiers(specs, is_unsigned, self.loc())?;
        let ty = match kind {
            TypeKind::Void => self.cache.void(),
            TypeKind::Int(w) => self.cache.int(w, is_unsigned),
            TypeKind::Float(w) => self.cache.float(w),
            _ => unreachable!("resolve_specifiers only returns Void/Int/Float"),
        };
        Ok(Some((ty, decltype)))
    }

    fn parse_struct_or_union(&mut self) -> CompileResult<TypeId> {
        let is_union = matches!(self.peek(), TokenKind::Union);
        self.advance();
        let name = match self.peek().clone() {
            TokenKind::Identifier(n) => {
                self.advance();
                Some(n)
            }
            _ => None,
        };

        if self.eat(&TokenKind::BraceOpen) {
            let mut field_types = Vec::new();
            while !self.eat(&TokenKind::BraceClose) {
                let (base_ty, _) = self
                    .try_parse_base_type()?
                    .ok_or_else(|| CompileError::parser(self.loc(), "field type", format!("{:?}", self.peek())))?;
                loop {
                    let (field_name, field_ty) = self.parse_declarator(base_ty)?;
                    let field_name = field_name
                        .ok_or_else(|| CompileError::parser(self.loc(), "field name", "abstract declarator"))?;
                    field_types.push((field_name, field_ty));
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::Semicolon, "';'")?;
            }
            let fields = self.cache.layout_fields(&field_types, is_union);
            let kind = if is_union {
                TypeKind::Union { name: name.clone(), fields }
            } else {
                TypeKind::Struct { name: name.clone(), fields }
            };
            let ty = self.cache.intern(kind, false, false);
            if let Some(n) = name {
                self.struct_tags.insert(n, ty);
            }
            Ok(ty)
        } else {
            let name = name.ok_or_else(|| CompileError::parser(self.loc(), "struct tag or body", format!("{:?}", self.peek())))?;
            self.struct_tags
                .get(&name)
                .copied()
                .ok_or_else(|| CompileError::semantic(self.loc(), format!("undefined struct/union `{name}`")))
        }
    }

    /// `{'*'} [identifier] {'[' [int] ']'}`, wrapping `base` accordingly.
    fn parse_declarator(&mut self, base: TypeId) -> CompileResult<(Option<String>, TypeId)> {
        let mut ty = base;
        while self.eat(&TokenKind::Asterisk) {
            ty = self.cache.pointer(ty);
        }
        let name = match self.peek().clone() {
            TokenKind::Identifier(n) => {
                self.advance();
                Some(n)
            }
            _ => None,
        };
        let mut dims = Vec::new();
        while self.eat(&TokenKind::BracketOpen) {
            let dim = match self.peek().clone() {
                TokenKind::Integer { value, .. } => {
                    self.advance();
                    Some(value)
                }
                _ => None,
            };
            self.expect(TokenKind::BracketClose, "']'")?;
            dims.push(dim);
        }
        for dim in dims.into_iter().rev() {
            ty = self.cache.intern(TypeKind::Array(ty, dim), false, false);
        }
        Ok((name, ty))
    }

    // ---- top level ----

    pub fn parse_translation_unit(&mut self) -> CompileResult<Vec<Ast>> {
        let mut functions = Vec::new();
        while self.peek() != &TokenKind::Eof {
            if let Some(func) = self.parse_top_level_item()? {
                functions.push(func);
            }
        }
        Ok(functions)
    }

    fn parse_top_level_item(&mut self) -> CompileResult<Option<Ast>> {
        let (base_ty, _decltype) = self
            .try_parse_base_type()?
            .ok_or_else(|| CompileError::parser(self.loc(), "declaration", format!("{:?}", self.peek())))?;

        if self.eat(&TokenKind::Semicolon) {
            // A bare `struct Foo { ... };` — the type is already registered.
            return Ok(None);
        }

        let mut ty = base_ty;
        while self.eat(&TokenKind::Asterisk) {
            ty = self.cache.pointer(ty);
        }
        let name = self.expect_identifier()?;
        self.expect(TokenKind::ParenOpen, "'('")?;
        let (params, variadic) = self.parse_param_list()?;
        self.expect(TokenKind::ParenClose, "')'")?;

        let sig = FunctionSig {
            name,
            ret: ty,
            params,
            variadic,
        };

        if self.eat(&TokenKind::Semicolon) {
            // Prototype only — no callers in this translation unit can
            // resolve it until a body is compiled (see DESIGN.md).
            return Ok(None);
        }

        let body = self.parse_block()?;
        Ok(Some(Ast::new(Node::Function {
            sig,
            body: Box::new(body),
        })))
    }

    fn parse_param_list(&mut self) -> CompileResult<(Vec<Param>, bool)> {
        let mut params = Vec::new();
        if self.peek() == &TokenKind::ParenClose {
            return Ok((params, false));
        }
        // Bare `(void)` means zero parameters; `void *` and friends fall
        // through to the normal type parse below.
        if self.peek() == &TokenKind::Void
            && self.tokens.get(self.pos + 1).map(|t| &t.kind) == Some(&TokenKind::ParenClose)
        {
            self.advance();
            return Ok((params, false));
        }
        loop {
            if self.eat(&TokenKind::Ellipsis) {
                return Ok((params, true));
            }
            let (base_ty, _) = self
                .try_parse_base_type()?
                .ok_or_else(|| CompileError::parser(self.loc(), "parameter type", format!("{:?}", self.peek())))?;
            let (name, ty) = self.parse_declarator(base_ty)?;
            params.push(Param {
                name: name.unwrap_or_default(),
                ty,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok((params, false))
    }

    // ---- statements ----

    fn parse_block(&mut self) -> CompileResult<Ast> {
        self.expect(TokenKind::BraceOpen, "'{'")?;
        let mut stmts = Vec::new();
        while !self.eat(&TokenKind::BraceClose) {
            stmts.push(self.parse_statement()?);
        }
        Ok(Ast::new(Node::Scope(stmts)))
    }

    fn starts_type(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Int | TokenKind::Char | TokenKind::Short | TokenKind::Long
                | TokenKind::Float | TokenKind::Double | TokenKind::Void
                | TokenKind::Unsigned | TokenKind::Const | TokenKind::Struct
                | TokenKind::Union | TokenKind::Static | TokenKind::Extern
                | TokenKind::Typedef
        )
    }

    fn parse_statement(&mut self) -> CompileResult<Ast> {
        match self.peek().clone() {
            TokenKind::BraceOpen => self.parse_block(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Break => {
                self.advance();
                self.expect(TokenKind::Semicolon, "';'")?;
                Ok(Ast::new(Node::Break))
            }
            TokenKind::Continue => {
                self.advance();
                self.expect(TokenKind::Semicolon, "';'")?;
                Ok(Ast::new(Node::Continue))
            }
            TokenKind::Return => {
                self.advance();
                let expr = if self.peek() == &TokenKind::Semicolon {
                    None
                } else {
                    Some(Box::new(self.parse_expr()?))
                };
                self.expect(TokenKind::Semicolon, "';'")?;
                Ok(Ast::new(Node::Return(expr)))
            }
            TokenKind::Semicolon => {
                self.advance();
                Ok(Ast::new(Node::Scope(Vec::new())))
            }
            _ if self.starts_type() => self.parse_declaration_statement(),
            _ => {
                let expr = self.parse_expr()?;
                self.expect(TokenKind::Semicolon, "';'")?;
                Ok(expr)
            }
        }
    }

    fn parse_if(&mut self) -> CompileResult<Ast> {
        self.advance();
        self.expect(TokenKind::ParenOpen, "'('")?;
        let when = self.parse_expr()?;
        self.expect(TokenKind::ParenClose, "')'")?;
        let then = self.parse_statement()?;
        let otherwise = if self.eat(&TokenKind::Else) {
            self.parse_statement()?
        } else {
            Ast::new(Node::Scope(Vec::new()))
        };
        Ok(Ast::new(Node::Ternary {
            when: Box::new(when),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }))
    }

    fn parse_while(&mut self) -> CompileResult<Ast> {
        self.advance();
        self.expect(TokenKind::ParenOpen, "'('")?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::ParenClose, "')'")?;
        let body = self.parse_statement()?;
        Ok(Ast::new(Node::Loop {
            cond: Some(Box::new(cond)),
            body: Box::new(body),
        }))
    }

    /// Desugars into `Scope([init, Loop{cond, body: Scope([body, step])}])`
    /// exactly as `Node::Loop`'s own doc comment requires: the back end
    /// only ever sees a uniform condition+body loop.
    fn parse_for(&mut self) -> CompileResult<Ast> {
        self.advance();
        self.expect(TokenKind::ParenOpen, "'('")?;
        let init = if self.peek() == &TokenKind::Semicolon {
            Ast::new(Node::Scope(Vec::new()))
        } else if self.starts_type() {
            self.parse_declaration_statement()?
        } else {
            let e = self.parse_expr()?;
            self.expect(TokenKind::Semicolon, "';'")?;
            e
        };
        let cond = if self.peek() == &TokenKind::Semicolon {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokenKind::Semicolon, "';'")?;
        let step = if self.peek() == &TokenKind::ParenClose {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokenKind::ParenClose, "')'")?;
        let body = self.parse_statement()?;

        let mut body_stmts = vec![body];
        if let Some(step) = step {
            body_stmts.push(step);
        }
        let loop_node = Ast::new(Node::Loop {
            cond: cond.map(Box::new),
            body: Box::new(Ast::new(Node::Scope(body_stmts))),
        });
        Ok(Ast::new(Node::Scope(vec![init, loop_node])))
    }

    fn parse_declaration_statement(&mut self) -> CompileResult<Ast> {
        let (base_ty, decltype) = self.try_parse_base_type()?.expect("caller checked starts_type");
        let mut decls = Vec::new();
        loop {
            let (name, ty) = self.parse_declarator(base_ty)?;
            let name = name.ok_or_else(|| CompileError::parser(self.loc(), "declarator name", "abstract declarator"))?;
            let init = if self.eat(&TokenKind::Eq) {
                Some(Box::new(self.parse_assignment()?))
            } else {
                None
            };
            decls.push(Ast::new(Node::Declaration {
                name,
                decltype,
                ty,
                init,
                frame_offset: None,
            }));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::Semicolon, "';'")?;
        if decls.len() == 1 {
            Ok(decls.into_iter().next().unwrap())
        } else {
            Ok(Ast::new(Node::Scope(decls)))
        }
    }

    // ---- expressions ----
    // Precedence climbing, lowest to highest: assignment, ternary, ||, &&,
    // |, ^, &, ==/!=, relational, shift, additive, multiplicative, then
    // unary/postfix/primary.

    fn parse_expr(&mut self) -> CompileResult<Ast> {
        // The comma operator, represented by `BinaryOp::CompoundExpr`.
        let mut left = self.parse_assignment()?;
        while self.eat(&TokenKind::Comma) {
            let right = self.parse_assignment()?;
            left = Ast::new(Node::Binary {
                op: BinaryOp::CompoundExpr,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_assignment(&mut self) -> CompileResult<Ast> {
        let left = self.parse_ternary()?;
        let op = match self.peek() {
            TokenKind::Eq => Some(BinaryOp::Assignment),
            TokenKind::PlusEq => Some(BinaryOp::AssignAddition),
            TokenKind::MinusEq => Some(BinaryOp::AssignSubtraction),
            TokenKind::StarEq => Some(BinaryOp::AssignMultiplication),
            TokenKind::SlashEq => Some(BinaryOp::AssignDivision),
            TokenKind::PercentEq => Some(BinaryOp::AssignModulo),
            TokenKind::AmpEq => Some(BinaryOp::AssignAnd),
            TokenKind::PipeEq => Some(BinaryOp::AssignOr),
            TokenKind::CaretEq => Some(BinaryOp::AssignXor),
            TokenKind::ShlEq => Some(BinaryOp::AssignBitshiftLeft),
            TokenKind::ShrEq => Some(BinaryOp::AssignBitshiftRight),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let right = self.parse_assignment()?;
            return Ok(Ast::new(Node::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            }));
        }
        Ok(left)
    }

    fn parse_ternary(&mut self) -> CompileResult<Ast> {
        let cond = self.parse_binary(0)?;
        if self.eat(&TokenKind::Question) {
            let then = self.parse_assignment()?;
            self.expect(TokenKind::Colon, "':'")?;
            let otherwise = self.parse_assignment()?;
            return Ok(Ast::new(Node::Ternary {
                when: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            }));
        }
        Ok(cond)
    }

    /// Binary operator precedence table, loosest (0) to tightest.
    fn binop_at(&self, level: u8) -> Option<BinaryOp> {
        match (level, self.peek()) {
            (0, TokenKind::PipePipe) => Some(BinaryOp::LogicOr),
            (1, TokenKind::AmpAmp) => Some(BinaryOp::LogicAnd),
            (2, TokenKind::Pipe) => Some(BinaryOp::Or),
            (3, TokenKind::Caret) => Some(BinaryOp::Xor),
            (4, TokenKind::Ampersand) => Some(BinaryOp::And),
            (5, TokenKind::EqEq) => Some(BinaryOp::Equals),
            (5, TokenKind::NotEq) => Some(BinaryOp::NotEquals),
            (6, TokenKind::Lt) => Some(BinaryOp::LessThan),
            (6, TokenKind::Gt) => Some(BinaryOp::GreaterThan),
            (6, TokenKind::LtEq) => Some(BinaryOp::LessThanOrEqualTo),
            (6, TokenKind::GtEq) => Some(BinaryOp::GreaterThanOrEqualTo),
            (7, TokenKind::Shl) => Some(BinaryOp::BitshiftLeft),
            (7, TokenKind::Shr) => Some(BinaryOp::BitshiftRight),
            (8, TokenKind::Plus) => Some(BinaryOp::Addition),
            (8, TokenKind::Minus) => Some(BinaryOp::Subtraction),
            (9, TokenKind::Asterisk) => Some(BinaryOp::Multiplication),
            (9, TokenKind::Slash) => Some(BinaryOp::Division),
            (9, TokenKind::Percent) => Some(BinaryOp::Modulo),
            _ => None,
        }
    }

    const MAX_LEVEL: u8 = 9;

    fn parse_binary(&mut self, level: u8) -> CompileResult<Ast> {
        if level > Self::MAX_LEVEL {
            return self.parse_cast();
        }
        let mut left = self.parse_binary(level + 1)?;
        while let Some(op) = self.binop_at(level) {
            self.advance();
            let right = self.parse_binary(level + 1)?;
            left = Ast::new(Node::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_cast(&mut self) -> CompileResult<Ast> {
        if self.peek() == &TokenKind::ParenOpen {
            let save = self.pos;
            self.advance();
            if self.starts_type() {
                if let Ok(Some((base_ty, _))) = self.try_parse_base_type() {
                    let (_, ty) = self.parse_declarator(base_ty)?;
                    if self.eat(&TokenKind::ParenClose) {
                        let operand = self.parse_cast()?;
                        return Ok(Ast::new(Node::Binary {
                            op: BinaryOp::Cast,
                            left: Box::new(operand),
                            right: Box::new(cast_marker(ty)),
                        }));
                    }
                }
            }
            self.pos = save;
        }
        self.parse_unary()
    }

    fn parse_unary(&mut self) -> CompileResult<Ast> {
        let op = match self.peek() {
            TokenKind::PlusPlus => Some(UnaryOp::PrefixIncrement),
            TokenKind::MinusMinus => Some(UnaryOp::PrefixDecrement),
            TokenKind::Plus => Some(UnaryOp::ArithPlus),
            TokenKind::Minus => Some(UnaryOp::ArithNegate),
            TokenKind::Bang => Some(UnaryOp::LogicNegate),
            TokenKind::Tilde => Some(UnaryOp::BinaryNegate),
            TokenKind::Ampersand => Some(UnaryOp::AddressOf),
            TokenKind::Asterisk => Some(UnaryOp::Dereference),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let inner = self.parse_cast()?;
            return Ok(Ast::new(Node::Unary {
                op,
                inner: Box::new(inner),
            }));
        }
        if self.eat(&TokenKind::Sizeof) {
            return self.parse_sizeof();
        }
        self.parse_postfix()
    }

    fn parse_sizeof(&mut self) -> CompileResult<Ast> {
        // `sizeof(type)` is folded to a constant immediately — the size of
        // a declared type never depends on runtime state.
        if self.peek() == &TokenKind::ParenOpen {
            let save = self.pos;
            self.advance();
            if self.starts_type() {
                if let Some((base_ty, _)) = self.try_parse_base_type()? {
                    let (_, ty) = self.parse_declarator(base_ty)?;
                    if self.eat(&TokenKind::ParenClose) {
                        let size = self.cache.get(ty).size;
                        return Ok(Ast::new(Node::Integer {
                            value: size,
                            width: IntWidth::I64,
                            is_unsigned: true,
                        }));
                    }
                }
            }
            self.pos = save;
        }
        // `sizeof expr` (as opposed to `sizeof(type)`) needs the operand's
        // resolved type, which only exists after the checker's bottom-up
        // pass runs — and none of this front end's call sites need it, so
        // it is left unsupported rather than threaded through a node shape
        // `ir/assemble.rs` has no case for.
        Err(CompileError::parser(
            self.loc(),
            "a parenthesized type name after sizeof",
            format!("{:?}", self.peek()),
        ))
    }

    fn parse_postfix(&mut self) -> CompileResult<Ast> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek().clone() {
                TokenKind::ParenOpen => {
                    self.advance();
                    let args = self.parse_call_args()?;
                    self.expect(TokenKind::ParenClose, "')'")?;
                    expr = Ast::new(Node::Binary {
                        op: BinaryOp::FunctionCall,
                        left: Box::new(expr),
                        right: Box::new(args),
                    });
                }
                TokenKind::Dot => {
                    self.advance();
                    let field = self.expect_identifier()?;
                    expr = Ast::new(Node::WalkStruct {
                        base: Box::new(expr),
                        field_name: field,
                        offset: 0,
                    });
                }
                TokenKind::Arrow => {
                    self.advance();
                    let field = self.expect_identifier()?;
                    let deref = Ast::new(Node::Unary {
                        op: UnaryOp::Dereference,
                        inner: Box::new(expr),
                    });
                    expr = Ast::new(Node::WalkStruct {
                        base: Box::new(deref),
                        field_name: field,
                        offset: 0,
                    });
                }
                TokenKind::BracketOpen => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::BracketClose, "']'")?;
                    let sum = Ast::new(Node::Binary {
                        op: BinaryOp::PtrAddition,
                        left: Box::new(expr),
                        right: Box::new(index),
                    });
                    expr = Ast::new(Node::Unary {
                        op: UnaryOp::Dereference,
                        inner: Box::new(sum),
                    });
                }
                TokenKind::PlusPlus => {
                    self.advance();
                    expr = Ast::new(Node::Unary {
                        op: UnaryOp::SuffixIncrement,
                        inner: Box::new(expr),
                    });
                }
                TokenKind::MinusMinus => {
                    self.advance();
                    expr = Ast::new(Node::Unary {
                        op: UnaryOp::SuffixDecrement,
                        inner: Box::new(expr),
                    });
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> CompileResult<Ast> {
        if self.peek() == &TokenKind::ParenClose {
            return Ok(Ast::new(Node::Scope(Vec::new())));
        }
        let mut args = vec![self.parse_assignment()?];
        while self.eat(&TokenKind::Comma) {
            args.push(self.parse_assignment()?);
        }
        if args.len() == 1 {
            Ok(args.into_iter().next().unwrap())
        } else {
            Ok(Ast::new(Node::List(args)))
        }
    }

    fn parse_primary(&mut self) -> CompileResult<Ast> {
        match self.peek().clone() {
            TokenKind::Integer { value, width, is_unsigned } => {
                self.advance();
                Ok(Ast::new(Node::Integer { value, width, is_unsigned }))
            }
            TokenKind::Float { value, is_single } => {
                self.advance();
                Ok(Ast::new(Node::Floating { value, is_single }))
            }
            TokenKind::StringLit(s) => {
                self.advance();
                Ok(Ast::new(Node::StringLit(s)))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Ast::new(Node::Variable(name)))
            }
            TokenKind::ParenOpen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::ParenClose, "')'")?;
                Ok(inner)
            }
            other => Err(CompileError::parser(self.loc(), "expression", format!("{other:?}"))),
        }
    }
}

fn resolve_specifiers(specs: Specifiers, is_unsigned: bool, loc: Location) -> CompileResult<TypeKind> {
    use Specifiers as S;
    let specs = if specs.is_empty() && is_unsigned { S::INT } else { specs };
    let kind = if specs == S::VOID {
        TypeKind::Void
    } else if specs == S::CHAR {
        TypeKind::Int(IntWidth::I8)
    } else if specs == S::SHORT || specs == (S::SHORT | S::INT) {
        TypeKind::Int(IntWidth::I16)
    } else if specs == S::INT {
        TypeKind::Int(IntWidth::I32)
    } else if specs == S::LONG1
        || specs == (S::LONG1 | S::INT)
        || specs == (S::LONG1 | S::LONG2)
        || specs == (S::LONG1 | S::LONG2 | S::INT)
    {
        TypeKind::Int(IntWidth::I64)
    } else if specs == S::FLOAT {
        TypeKind::Float(crate::types::FloatWidth::F32)
    } else if specs == S::DOUBLE || specs == (S::LONG1 | S::DOUBLE) {
        TypeKind::Float(crate::types::FloatWidth::F64)
    } else {
        return Err(CompileError::parser(loc, "valid specifier combination", "conflicting type specifiers"));
    };
    Ok(kind)
}

/// Lex then parse one translation unit.
pub fn parse(source: &str, filename: &str, cache: &mut TypeCache) -> CompileResult<Vec<Ast>> {
    let tokens = lex(source, filename)?;
    let mut parser = Parser::new(tokens, cache);
    parser.parse_translation_unit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_trivial_main() {
        let mut cache = TypeCache::new();
        let unit = parse("int main() { return 1 + 2; }", "<test>", &mut cache).unwrap();
        assert_eq!(unit.len(), 1);
        match &unit[0].node {
            Node::Function { sig, .. } => assert_eq!(sig.name, "main"),
            _ => panic!("expected a function"),
        }
    }

    #[test]
    fn parses_for_loop_desugaring() {
        let mut cache = TypeCache::new();
        let unit = parse(
            "int main(){int s=0; for(int i=1;i<=10;i++) s+=i; return s;}",
            "<test>",
            &mut cache,
        )
        .unwrap();
        assert_eq!(unit.len(), 1);
    }

    #[test]
    fn parses_struct_and_sizeof() {
        let mut cache = TypeCache::new();
        let unit = parse(
            "struct{char a;long b;char c;}; int main(){return sizeof(struct{char a;long b;char c;});}",
            "<test>",
            &mut cache,
        )
        .unwrap();
        assert_eq!(unit.len(), 1);
    }
}
