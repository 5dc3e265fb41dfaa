//! Branch & short-circuit fixup (§4.3).
//!
//! ISA-independent bookkeeping: a "jump site" is just the byte offset of a
//! jump instruction's displacement immediate inside the code buffer: the
//! ISA-specific lowering stage (`isa::x64::lower`) is the only code that
//! knows how to turn that offset into a patched displacement, via
//! [`crate::isa::x64::buffer::CodeBuffer::patch_rel32`]. This module only
//! tracks *which* offsets need patching and *where* control-flow
//! constructs nest, exactly mirroring the three LIFO stacks of the
//! original design.

/// One pending branch frame: an `if`/loop under construction.
#[derive(Debug, Default)]
pub struct BranchFrame {
    /// Byte offset to jump back to for `goto_start` (loop condition).
    pub branch_start: usize,
    /// Pending `end`-jump sites: patched to the post-end cursor when this
    /// frame is a loop, or inherited into the parent frame otherwise so
    /// `goto_end` always resolves to the nearest enclosing loop.
    pub end_sites: Vec<usize>,
    pub is_loop: bool,
    /// The most recently emitted conditional-jump site, patched when the
    /// next block (`then`/`else`) begins.
    pub pending_jump: Option<usize>,
}

/// The three LIFO stacks from §4.3: short-circuit sites, branch frames, and
/// pending `ret` jump sites (patched at `func_end`). A short-circuit frame
/// is a stack of stacks: each `sc_begin`/`sc_end` pair owns one list of
/// jump sites, all patched together to the scope's exit point.
#[derive(Default)]
pub struct BranchStacks {
    pub short_circuits: Vec<Vec<usize>>,
    pub branches: Vec<BranchFrame>,
    pub returns: Vec<usize>,
}

impl BranchStacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_branch(&mut self, branch_start: usize, is_loop: bool) {
        self.branches.push(BranchFrame {
            branch_start,
            end_sites: Vec::new(),
            is_loop,
            pending_jump: None,
        });
    }

    pub fn current_branch_mut(&mut self) -> &mut BranchFrame {
        self.branches
            .last_mut()
            .expect("goto_start/goto_end/then/else with no enclosing if/loop")
    }

    /// Record a pending `end`-jump site against the nearest enclosing loop
    /// (for `break`/`goto_end`), per the "always lands at the nearest
    /// enclosing loop" rule.
    pub fn record_end_site(&mut self, site: usize) {
        for frame in self.branches.iter_mut().rev() {
            frame.end_sites.push(site);
            if frame.is_loop {
                return;
            }
        }
        panic!("goto_end with no enclosing loop");
    }

    /// Record a pending `branch_start`-jump site (for `continue`/`goto_start`)
    /// against the nearest enclosing loop.
    pub fn nearest_loop_start(&self) -> usize {
        self.branches
            .iter()
            .rev()
            .find(|f| f.is_loop)
            .map(|f| f.branch_start)
            .expect("goto_start with no enclosing loop")
    }

    /// Pop the current branch frame, returning its end-jump sites. If it
    /// is not a loop, those sites are inherited into the parent frame
    /// instead of being returned for immediate patching.
    pub fn pop_branch(&mut self) -> Option<Vec<usize>> {
        let frame = self.branches.pop().expect("unbalanced if/loop nesting");
        if frame.is_loop {
            Some(frame.end_sites)
        } else {
            if let Some(parent) = self.branches.last_mut() {
                parent.end_sites.extend(frame.end_sites);
            }
            None
        }
    }

    pub fn push_short_circuit_scope(&mut self) {
        self.short_circuits.push(Vec::new());
    }

    pub fn record_short_circuit_jump(&mut self, site: usize) {
        self.short_circuits
            .last_mut()
            .expect("land/lor with no enclosing sc_begin")
            .push(site);
    }

    /// Close the innermost short-circuit scope, returning its jump sites
    /// for immediate patching (unlike branch frames, these never nest
    /// into a parent — each `sc_begin`/`sc_end` pair is self-contained).
    pub fn pop_short_circuit_scope(&mut self) -> Vec<usize> {
        self.short_circuits
            .pop()
            .expect("sc_end with no matching sc_begin")
    }

    pub fn push_return_site(&mut self, site: usize) {
        self.returns.push(site);
    }

    pub fn take_return_sites(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.returns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_site_lands_on_nearest_loop() {
        let mut stacks = BranchStacks::new();
        stacks.push_branch(0, true); // loop
        stacks.push_branch(10, false); // nested if, not a loop
        stacks.record_end_site(42);
        // popping the `if` frame inherits its end sites into the loop frame.
        assert!(stacks.pop_branch().is_none());
        let ends = stacks.pop_branch().unwrap();
        assert_eq!(ends, vec![42]);
    }
}
