//! The error taxonomy from `spec.md` §7, as a concrete Rust type.
//!
//! Pipeline stages that can only fail in one well-defined way return
//! `Result<T, CompileError>`; the outer pipeline boundary (see `lib.rs`)
//! converts these into [`crate::diagnostics::Diagnostic`]s and accumulates
//! them in a [`crate::diagnostics::Reporter`] rather than short-circuiting
//! the whole compilation on the first one, per §7 "Recovery granularity".
//!
//! Internal invariant violations (§7 "Internal errors (fatal)") are not
//! variants here — they are not meant to be recoverable, so they `panic!`
//! at the point of detection instead (see `spec.md` §5).

use thiserror::Error;

use crate::span::Span;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("unknown variable `{name}`")]
    UnknownVariable { name: String, span: Span },
    #[error("unknown struct `{name}`")]
    UnknownStruct { name: String, span: Span },
    #[error("unknown enum `{name}`")]
    UnknownEnum { name: String, span: Span },
    #[error("enum `{enum_name}` has no variant `{variant}`")]
    UnknownVariant { enum_name: String, variant: String, span: Span },
    #[error("struct `{struct_name}` has no field `{field}`")]
    UnknownField { struct_name: String, field: String, span: Span },
    #[error("`{name}` is not callable")]
    NotCallable { name: String, span: Span },

    #[error("implicit conversion failed: cannot convert to the expected type")]
    ImplicitConversionFailed { span: Span },
    #[error("operator used with incompatible operand types")]
    IncompatibleOperands { span: Span },
    #[error("invalid cast")]
    BadCast { span: Span },
    #[error("cannot dereference a non-pointer expression")]
    DerefNonPointer { span: Span },
    #[error("left-hand side of assignment is not an lvalue")]
    NotAnLValue { span: Span },
    #[error("invalid struct access")]
    InvalidAccess { span: Span },

    #[error("function `{name}` does not return on all paths")]
    NotAllPathsReturn { name: String, span: Span },
    #[error("`break`/`continue` used outside of any loop")]
    LoopControlOutsideLoop { span: Span },
    #[error("wrong number of arguments: expected {expected}, found {found}")]
    WrongArgumentCount { expected: usize, found: usize, span: Span },

    #[error("`void` cannot be used as an object type")]
    VoidAsObjectType { span: Span },
    #[error("constant expression is not a valid constant")]
    NotAConstant { span: Span },

    #[error("duplicate top-level declaration `{name}`")]
    DuplicateDeclaration { name: String, span: Span },
}

impl CompileError {
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            CompileError::UnknownVariable { span, .. }
            | CompileError::UnknownStruct { span, .. }
            | CompileError::UnknownEnum { span, .. }
            | CompileError::UnknownVariant { span, .. }
            | CompileError::UnknownField { span, .. }
            | CompileError::NotCallable { span, .. }
            | CompileError::ImplicitConversionFailed { span }
            | CompileError::IncompatibleOperands { span }
            | CompileError::BadCast { span }
            | CompileError::DerefNonPointer { span }
            | CompileError::NotAnLValue { span }
            | CompileError::InvalidAccess { span }
            | CompileError::NotAllPathsReturn { span, .. }
            | CompileError::LoopControlOutsideLoop { span }
            | CompileError::WrongArgumentCount { span, .. }
            | CompileError::VoidAsObjectType { span }
            | CompileError::NotAConstant { span }
            | CompileError::DuplicateDeclaration { span, .. } => *span,
        }
    }
}

impl From<CompileError> for crate::diagnostics::Diagnostic {
    fn from(err: CompileError) -> Self {
        crate::diagnostics::Diagnostic::error(err.span(), err.to_string())
    }
}
