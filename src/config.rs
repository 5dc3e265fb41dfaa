//! Compiler-context configuration surface (§6 of SPEC_FULL.md).
//!
//! Grounded on the teacher's `settings::Flags` pattern: a small, explicit,
//! clonable struct rather than a global. `Flags` selects the ABI/encoder
//! variant from a `target_lexicon::Triple` the same way `cranelift-codegen`
//! picks an ISA backend from the triple's architecture.

use target_lexicon::{OperatingSystem, Triple};

/// Which ABI & calling convention the back end lowers calls against.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CallConv {
    SystemV,
    WindowsFastcall,
}

impl CallConv {
    pub fn from_triple(triple: &Triple) -> Self {
        match triple.operating_system {
            OperatingSystem::Windows => CallConv::WindowsFastcall,
            _ => CallConv::SystemV,
        }
    }
}

/// Top-level configuration for a [`crate::context::Context`].
#[derive(Clone, Debug)]
pub struct Flags {
    /// Target triple; selects ABI and eventually the ISA backend (only
    /// x86-64 is implemented today, see DESIGN.md on the arm64 stub).
    pub triple: Triple,
    /// Calling convention derived from `triple`, cached for fast lookup.
    pub call_conv: CallConv,
    /// Directories searched (in order) for `#include "..."` resolution.
    /// Handled by [`crate::frontend::preprocess`]'s minimal stand-in: one
    /// level of splicing, no recursive re-preprocessing of the included
    /// text's own directives.
    pub include_paths: Vec<String>,
    /// Macros seeded into the preprocessor table before parsing, as
    /// `(name, replacement)` pairs. Expanded the same way a source-level
    /// `#define NAME replacement` is: whole-word literal substitution,
    /// object-like macros only (no parameters).
    pub predefined_macros: Vec<(String, String)>,
    /// When set, the machine emitter stage is replaced by a textual IR
    /// dump (see [`crate::ir::dump`]); no executable code is produced.
    pub debug_emission: bool,
}

impl Flags {
    pub fn new(triple: Triple) -> Self {
        let call_conv = CallConv::from_triple(&triple);
        Flags {
            triple,
            call_conv,
            include_paths: Vec::new(),
            predefined_macros: Vec::new(),
            debug_emission: false,
        }
    }

    /// Flags for the host triple, the common case for an in-process JIT.
    pub fn host() -> Self {
        Self::new(Triple::host())
    }

    pub fn with_include_path(mut self, path: impl Into<String>) -> Self {
        self.include_paths.push(path.into());
        self
    }

    pub fn with_macro(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.predefined_macros.push((name.into(), value.into()));
        self
    }

    pub fn with_debug_emission(mut self, enabled: bool) -> Self {
        self.debug_emission = enabled;
        self
    }
}

impl Default for Flags {
    fn default() -> Self {
        Self::host()
    }
}
