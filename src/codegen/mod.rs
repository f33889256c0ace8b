//! Stack-machine x86-64 code generator. See `spec.md` §4.6, the single
//! largest section of the specification. Submodules mirror
//! `original_source/src/codegen/`: `context` (shared mutable state),
//! `asm` (the textual GAS writer), `expr`/`stmt`/`decl` (the three
//! evaluators, smallest to largest grain).

pub mod asm;
pub mod context;
pub mod decl;
pub mod expr;
pub mod stmt;

pub use decl::emit_program;
