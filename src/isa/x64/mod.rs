//! The x86-64 back end: buffer, encoder, legalizer, and lowering pass
//! wired together behind one entry point.

pub mod buffer;
pub mod cond;
pub mod emit;
pub mod legalize;
pub mod lower;
pub mod reg;
pub mod table;

pub use lower::{lower_function, SymbolTable};
