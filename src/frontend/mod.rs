//! Front end: lexing, parsing, and type checking (§4.7-4.9), producing the
//! typed [`crate::ast::Ast`] the back end consumes.

pub mod lexer;
pub mod parser;
pub mod preprocess;
pub mod typecheck;

use std::collections::HashMap;

use crate::ast::{Ast, FunctionSig, Node};
use crate::error::CompileResult;
use crate::types::TypeCache;

/// One parsed, type-checked function ready for `ir::assemble::assemble_function`.
pub struct CheckedFunction {
    pub sig: FunctionSig,
    pub body: Ast,
}

/// Run the full front end over one translation unit: lex, parse, then
/// type-check every function definition in turn. Mirrors `jitc_parse`'s
/// role in the original — one entry point `context.rs` calls per source
/// string.
///
/// Every signature in the unit is collected before any body is checked, so
/// a function may call one defined later in the same source text (as
/// `sum`/`main` in the golden tests never actually require, but any
/// multi-function file would).
pub fn compile_unit(source: &str, filename: &str, cache: &mut TypeCache) -> CompileResult<Vec<CheckedFunction>> {
    let items = parser::parse(source, filename, cache)?;
    let mut raw: Vec<(FunctionSig, Ast)> = Vec::with_capacity(items.len());
    for item in items {
        let Node::Function { sig, body } = item.node else {
            unreachable!("parser only ever emits Node::Function at the top level");
        };
        raw.push((sig, *body));
    }

    let functions: HashMap<String, FunctionSig> = raw.iter().map(|(sig, _)| (sig.name.clone(), sig.clone())).collect();

    let mut checked = Vec::with_capacity(raw.len());
    for (sig, mut body) in raw {
        typecheck::check_function(&sig, &mut body, cache, &functions)?;
        checked.push(CheckedFunction { sig, body });
    }
    Ok(checked)
}
