//! Semantic checks that run on HIR before layout/codegen. See `spec.md`
//! §4.2 (control-flow completeness) and §4.3 (dead-variable elimination).

pub mod cflow;
pub mod unused;

use crate::diagnostics::Reporter;
use crate::hir::{Decl, Program};

/// Runs every semantic pass over a lowered program: control-flow
/// completeness first (it reads the original, unsimplified HIR), then
/// dead-variable elimination, which mutates function bodies in place.
pub fn check_program(program: &mut Program, reporter: &mut Reporter) {
    for decl in &program.decls {
        if let Decl::Function(f) = decl {
            cflow::check_function(f, reporter);
        }
    }
    for decl in &mut program.decls {
        if let Decl::Function(f) = decl {
            unused::eliminate_unused(f, reporter);
        }
    }
}
