//! Function address map (§3.5) and the `rbp`-chain backtrace helper
//! (§4.6) built on top of it.
//!
//! The original tracks compiled functions in `context->symbols`, a bare
//! name → pointer map (`jitc.c`'s `jitc_create_context`/`jitc_get`) with no
//! return-address bookkeeping at all; debug-info beyond this map is an
//! explicit non-goal. The backtrace helper here is new — grounded on the
//! frame layout `isa::x64::lower` already establishes in every function's
//! prologue (`push rbp; mov rbp, rsp`), which is exactly the classic
//! frame-pointer chain a walker needs: at any `rbp`, the saved caller `rbp`
//! sits at `[rbp]` and the return address at `[rbp + 8]`.

use std::collections::HashMap;

use crate::ast::FunctionSig;
use crate::isa::x64::SymbolTable as AddressTable;

/// One compiled function's extent and signature, keyed by name in
/// [`SymbolTable`].
#[derive(Clone, Debug)]
pub struct FunctionRecord {
    pub start: usize,
    pub end: usize,
    pub signature: FunctionSig,
}

/// Every function compiled so far in one [`crate::context::Context`].
/// Read-mostly once a function is registered — lowering only ever looks up
/// addresses by name, never mutates an existing entry (see DESIGN.md on the
/// "callees must already be compiled" scope decision).
#[derive(Default)]
pub struct SymbolTable {
    by_name: HashMap<String, FunctionRecord>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            by_name: HashMap::new(),
        }
    }

    pub fn register(&mut self, start: usize, end: usize, signature: FunctionSig) {
        let name = signature.name.clone();
        self.by_name.insert(name, FunctionRecord { start, end, signature });
    }

    pub fn lookup(&self, name: &str) -> Option<&FunctionRecord> {
        self.by_name.get(name)
    }

    pub fn address_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).map(|r| r.start)
    }

    /// Every function whose `[start, end)` range contains `pc`, by name.
    /// Linear scan — the function count in one compile unit never gets
    /// large enough to justify an interval tree.
    pub fn find_by_pc(&self, pc: usize) -> Option<&str> {
        self.by_name
            .values()
            .find(|r| pc >= r.start && pc < r.end)
            .map(|r| r.signature.name.as_str())
    }

    /// A flat name→address view, the shape [`crate::isa::x64::lower::lower_function`]
    /// resolves direct calls through.
    pub fn to_address_table(&self) -> AddressTable {
        self.by_name.iter().map(|(name, r)| (name.clone(), r.start)).collect()
    }
}

/// One entry in a walked call stack.
#[derive(Clone, Debug)]
pub struct Frame {
    pub pc: usize,
    pub function: Option<String>,
}

/// Walk the `rbp` chain starting at `start_rbp`, stopping at the first
/// frame whose return address doesn't land inside any known function (the
/// native caller that invoked into the JIT) or after `max_frames`,
/// whichever comes first — there is no reliable terminator bit in a bare
/// frame-pointer chain, so an unrecognized `pc` is the signal to stop.
///
/// # Safety
/// `start_rbp` must be a live frame pointer established by this backend's
/// own prologue (or zero, meaning "no frames").
pub unsafe fn walk_stack(start_rbp: usize, symbols: &SymbolTable, max_frames: usize) -> Vec<Frame> {
    let mut frames = Vec::new();
    let mut rbp = start_rbp;
    for _ in 0..max_frames {
        if rbp == 0 || rbp % std::mem::align_of::<usize>() != 0 {
            break;
        }
        let return_addr = std::ptr::read((rbp + 8) as *const usize);
        let function = symbols.find_by_pc(return_addr).map(|s| s.to_string());
        let recognized = function.is_some();
        frames.push(Frame {
            pc: return_addr,
            function,
        });
        if !recognized {
            break;
        }
        rbp = std::ptr::read(rbp as *const usize);
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TypeCache, TypeId};

    fn sig(name: &str, void_ty: TypeId) -> FunctionSig {
        FunctionSig {
            name: name.into(),
            ret: void_ty,
            params: Vec::new(),
            variadic: false,
        }
    }

    #[test]
    fn lookup_round_trips_through_register() {
        let mut cache = TypeCache::new();
        let void_ty = cache.void();
        let mut table = SymbolTable::new();
        table.register(0x1000, 0x1040, sig("main", void_ty));
        assert_eq!(table.address_of("main"), Some(0x1000));
        assert_eq!(table.find_by_pc(0x1010), Some("main"));
        assert_eq!(table.find_by_pc(0x2000), None);
    }

    #[test]
    fn to_address_table_matches_registered_entries() {
        let mut cache = TypeCache::new();
        let void_ty = cache.void();
        let mut table = SymbolTable::new();
        table.register(0x1000, 0x1040, sig("main", void_ty));
        table.register(0x2000, 0x2040, sig("helper", void_ty));
        let flat = table.to_address_table();
        assert_eq!(flat.get("main"), Some(&0x1000));
        assert_eq!(flat.get("helper"), Some(&0x2000));
    }
}
