//! A just-in-time compiler back end for a small C-family language:
//! lex → parse → type-check → Sethi-Ullman IR lowering → x86-64 encoding
//! → ABI-aware calling sequences → executable memory, fronted by
//! [`Context`].
//!
//! ```no_run
//! use jitc::{Context, Flags};
//!
//! let mut ctx = Context::new(Flags::host());
//! ctx.parse("int main(){return 1+2;}", "<memory>").unwrap();
//! let main_addr = ctx.get("main").unwrap();
//! let main_fn: extern "C" fn() -> i32 = unsafe { std::mem::transmute(main_addr) };
//! assert_eq!(main_fn(), 3);
//! ```

pub mod abi;
pub mod ast;
pub mod config;
pub mod context;
pub mod error;
pub mod exec_mem;
pub mod frontend;
pub mod ir;
pub mod isa;
pub mod opstack;
pub mod scheduler;
pub mod symbols;
pub mod test_runner;
pub mod types;

pub use config::{CallConv, Flags};
pub use context::Context;
pub use error::{CompileError, CompileResult, Location};
