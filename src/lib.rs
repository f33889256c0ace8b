//! `mini`: a whole-program compiler for a small statically typed systems
//! language, emitting x86-64 System V assembly. See `spec.md` for the full
//! specification this crate implements.
//!
//! The parser itself is out of core scope (`spec.md` §1) — this crate
//! exposes the pipeline from lowered AST onward as a library, plus a thin
//! CLI binary (`src/main.rs`) built on [`driver::run`].

pub mod ast;
pub mod codegen;
pub mod convert;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod hir;
pub mod layout;
pub mod semantic;
pub mod span;
pub mod symbol;
pub mod tables;
