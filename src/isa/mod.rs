//! ISA backends. Only x86-64 is implemented; the crate is structured so a
//! second architecture slots in beside it (see the `arm64` feature stub
//! noted in DESIGN.md).

#[cfg(feature = "x64")]
pub mod x64;
