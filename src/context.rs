//! Compiler context (component M, §4.10/§6): the front door that ties the
//! front end, assembler, lowering pass, and executable memory manager
//! together into the `create_context`/`parse`/`get`/`destroy_context` API
//! `jitc.h` exposes.
//!
//! One `Context` owns one [`TypeCache`], one [`symbols::SymbolTable`], and
//! one [`exec_mem::ExecutableRegion`] per compiled function — never a
//! single region shared across the whole context, matching
//! `exec_mem::ExecutableRegion`'s own documented intent. `parse` compiles
//! the functions of one translation unit strictly in the order the front
//! end returns them, because `isa::x64::lower_function` can only resolve a
//! direct call against a callee already present in the symbol table (see
//! DESIGN.md) — there is no relocation/forward-reference mechanism here,
//! so mutually recursive functions are a known limitation, not an oversight.
//!
//! The original's `jitc_destroy_context` is subsumed by `Drop`: every field
//! (executable regions, caches) frees itself when the context goes out of
//! scope, so there is no explicit destructor to call.
//!
//! Nothing here uses [`crate::scheduler::Scheduler`] — direct calls must
//! resolve against already-compiled callees, which forces functions within
//! one translation unit to compile in order. The pool exists for embedders
//! who want to drive several independent contexts (or independent,
//! call-free translation units) at once; reach it via `Scheduler::host()`.

use std::path::Path;

use crate::abi::{self, Abi};
use crate::config::Flags;
use crate::error::{CompileError, CompileResult, Location};
use crate::exec_mem::ExecutableRegion;
use crate::frontend::{self, CheckedFunction};
use crate::ir::{assemble, dump};
use crate::isa::x64::lower_function;
use crate::symbols::{self, Frame, SymbolTable};
use crate::types::TypeCache;

/// A just-in-time compiler context: one type cache, one symbol table, and
/// the executable memory backing every function compiled into it so far.
pub struct Context {
    cache: TypeCache,
    symbols: SymbolTable,
    regions: Vec<ExecutableRegion>,
    abi: Box<dyn Abi>,
    flags: Flags,
    /// Populated instead of executable code when `flags.debug_emission` is
    /// set: `(function name, textual IR dump)` pairs, in compile order.
    dumps: Vec<(String, String)>,
}

impl Context {
    /// Create a context for an explicit target configuration (`jitc_create_context`
    /// takes no flags in the original; this crate exposes them directly
    /// instead of a separate `jitc_create_header`-style follow-up call).
    pub fn new(flags: Flags) -> Self {
        let abi = abi::for_call_conv(flags.call_conv);
        Context {
            cache: TypeCache::new(),
            symbols: SymbolTable::new(),
            regions: Vec::new(),
            abi,
            flags,
            dumps: Vec::new(),
        }
    }

    /// A context targeting the host triple, the common embedding case.
    pub fn host() -> Self {
        Self::new(Flags::host())
    }

    /// Compile one translation unit's worth of source text and make every
    /// function definition it contains callable through [`Context::get`].
    ///
    /// On a semantic or internal error, functions already compiled earlier
    /// in `source` remain registered and callable (§7: no partial
    /// function's code is ever installed, but prior, fully-compiled
    /// functions are not rolled back).
    pub fn parse(&mut self, source: &str, filename: &str) -> CompileResult<()> {
        let preprocessed = frontend::preprocess::run(source, filename, &self.flags.include_paths, &self.flags.predefined_macros).map_err(|err| {
            log::error!("{filename}: {err}");
            err
        })?;
        let checked = frontend::compile_unit(&preprocessed, filename, &mut self.cache).map_err(|err| {
            log::error!("{filename}: {err}");
            err
        })?;
        for function in checked {
            self.compile_function(function)?;
        }
        Ok(())
    }

    /// Read `path` and parse it as one translation unit (`jitc_parse_file`).
    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> CompileResult<()> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|err| {
            CompileError::syntax(
                Location {
                    file: path.display().to_string(),
                    row: 0,
                    col: 0,
                },
                format!("could not read {}: {err}", path.display()),
            )
        })?;
        self.parse(&source, &path.display().to_string())
    }

    /// The entry address of a previously compiled function, or `None` if no
    /// function by that name was ever registered (`jitc_get`). Callers cast
    /// this to the matching function-pointer type themselves, the same way
    /// the original casts the `void*` it returns.
    pub fn get(&self, name: &str) -> Option<usize> {
        self.symbols.address_of(name)
    }

    /// Textual IR dumps recorded while `flags.debug_emission` was set, one
    /// entry per function, in compile order.
    pub fn dumps(&self) -> &[(String, String)] {
        &self.dumps
    }

    /// Walk the `rbp` chain starting at a live frame pointer captured
    /// inside a function this context compiled, annotating each frame with
    /// the function symbol its return address falls inside.
    ///
    /// # Safety
    /// `rbp` must be a frame pointer established by this context's own
    /// generated prologues (or zero).
    pub unsafe fn backtrace(&self, rbp: usize, max_frames: usize) -> Vec<Frame> {
        symbols::walk_stack(rbp, &self.symbols, max_frames)
    }

    fn compile_function(&mut self, function: CheckedFunction) -> CompileResult<()> {
        let CheckedFunction { sig, mut body } = function;
        log::debug!("compiling `{}`", sig.name);
        let stream = assemble::assemble_function(&sig, &mut body, &self.cache);

        if self.flags.debug_emission {
            self.dumps.push((sig.name.clone(), dump::dump(&stream)));
            return Ok(());
        }

        let address_table = self.symbols.to_address_table();
        let code = lower_function(&stream, self.abi.as_ref(), &self.cache, &address_table).map_err(|err| {
            log::error!("lowering `{}` failed: {err}", sig.name);
            err
        })?;

        let mut region = ExecutableRegion::new(code.len()).map_err(|err| {
            let err = CompileError::internal(format!("failed to reserve executable memory for `{}`: {err}", sig.name));
            log::error!("{err}");
            err
        })?;
        let offset = region.push(&code);
        region.make_executable().map_err(|err| {
            let err = CompileError::internal(format!("failed to make `{}`'s code executable: {err}", sig.name));
            log::error!("{err}");
            err
        })?;

        let start = region.address_of(offset);
        let end = start + code.len();
        self.regions.push(region);
        self.symbols.register(start, end, sig);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiles(source: &str) -> Context {
        let mut ctx = Context::host();
        ctx.parse(source, "<test>").expect("compile failed");
        ctx
    }

    #[test]
    fn addition_returns_three() {
        let ctx = compiles("int main(){return 1+2;}");
        let addr = ctx.get("main").expect("main not registered");
        let main_fn: extern "C" fn() -> i32 = unsafe { std::mem::transmute(addr) };
        assert_eq!(main_fn(), 3);
    }

    #[test]
    fn calling_an_earlier_function_resolves() {
        let ctx = compiles("int sum(int a,int b){return a+b;} int main(){return sum(40,2);}");
        let addr = ctx.get("main").expect("main not registered");
        let main_fn: extern "C" fn() -> i32 = unsafe { std::mem::transmute(addr) };
        assert_eq!(main_fn(), 42);
    }

    #[test]
    fn unknown_symbol_is_none() {
        let ctx = compiles("int main(){return 0;}");
        assert!(ctx.get("nonexistent").is_none());
    }

    #[test]
    fn debug_emission_records_dumps_instead_of_executable_code() {
        let mut ctx = Context::new(Flags::host().with_debug_emission(true));
        ctx.parse("int main(){return 1+2;}", "<test>").expect("compile failed");
        assert!(ctx.get("main").is_none());
        assert_eq!(ctx.dumps().len(), 1);
        assert_eq!(ctx.dumps()[0].0, "main");
        assert!(!ctx.dumps()[0].1.is_empty());
    }

    #[test]
    fn parse_error_does_not_roll_back_earlier_functions() {
        let mut ctx = Context::host();
        ctx.parse("int ok(){return 5;}", "<test>").expect("first function should compile");
        let err = ctx.parse("int broken(){return undeclared_name;}", "<test>");
        assert!(err.is_err());
        assert!(ctx.get("ok").is_some());
    }

    #[test]
    fn predefined_macro_is_expanded_before_parsing() {
        let mut ctx = Context::new(Flags::host().with_macro("ANSWER", "42"));
        ctx.parse("int main(){return ANSWER;}", "<test>").expect("compile failed");
        let addr = ctx.get("main").expect("main not registered");
        let main_fn: extern "C" fn() -> i32 = unsafe { std::mem::transmute(addr) };
        assert_eq!(main_fn(), 42);
    }

    #[test]
    fn include_path_splices_a_header_before_parsing() {
        let dir = std::env::temp_dir().join(format!("jitc-test-include-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create temp include dir");
        std::fs::write(dir.join("answer.h"), "int helper(){return 7;}").expect("write temp header");

        let mut ctx = Context::new(Flags::host().with_include_path(dir.to_string_lossy()));
        ctx.parse("#include \"answer.h\"\nint main(){return helper();}", "<test>").expect("compile failed");
        let addr = ctx.get("main").expect("main not registered");
        let main_fn: extern "C" fn() -> i32 = unsafe { std::mem::transmute(addr) };
        assert_eq!(main_fn(), 7);

        std::fs::remove_dir_all(&dir).ok();
    }
}
