//! Control-flow completeness check. See `spec.md` §4.2, ported from
//! `original_source/src/hirgen/cflow.cc`.

use crate::diagnostics::{Diagnostic, Reporter};
use crate::error::CompileError;
use crate::hir::{Function, Stmt, Type};

/// Whether a statement definitely returns on every path through it.
/// `While` never counts — the condition might be false on first entry.
#[must_use]
pub fn definitely_returns(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Return(..) => true,
        Stmt::If(_, then, Some(els), _) => definitely_returns(then) && definitely_returns(els),
        Stmt::If(_, _, None, _) => false,
        // Any statement in the block definitely returning is enough — not
        // just the last one, per `spec.md` §4.2.
        Stmt::Block(stmts, _) => stmts.iter().any(definitely_returns),
        Stmt::Expr(_) | Stmt::Break(_) | Stmt::Continue(_) | Stmt::While(..) => false,
    }
}

/// Checks one function: if its return type is not `Void`, every path
/// through its body must reach a `Return`.
pub fn check_function(func: &Function, reporter: &mut Reporter) {
    if func.ret.is_void() {
        return;
    }
    let Some(body) = &func.body else {
        return;
    };
    if !body.iter().any(definitely_returns) {
        reporter.push(Diagnostic::from(CompileError::NotAllPathsReturn {
            name: String::new(),
            span: func.span,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::{BuiltinKind, Expr, ExprKind};
    use crate::span::{FileId, Pos, Span};

    fn span() -> Span {
        Span::new(FileId(0), Pos::new(0, 0), Pos::new(0, 0))
    }

    fn ret() -> Stmt {
        Stmt::Return(Some(Expr::new(ExprKind::Integer(0), span())), span())
    }

    #[test]
    fn bare_return_definitely_returns() {
        assert!(definitely_returns(&ret()));
    }

    #[test]
    fn while_never_counts() {
        let cond = Expr::new(ExprKind::Bool(true), span());
        let w = Stmt::While(cond, Box::new(ret()), span());
        assert!(!definitely_returns(&w));
    }

    #[test]
    fn if_without_else_does_not_definitely_return() {
        let cond = Expr::new(ExprKind::Bool(true), span());
        let i = Stmt::If(cond, Box::new(ret()), None, span());
        assert!(!definitely_returns(&i));
    }

    #[test]
    fn if_with_both_branches_returning_definitely_returns() {
        let cond = Expr::new(ExprKind::Bool(true), span());
        let i = Stmt::If(cond, Box::new(ret()), Some(Box::new(ret())), span());
        assert!(definitely_returns(&i));
    }

    #[test]
    fn block_with_any_returning_statement_definitely_returns() {
        let block = Stmt::Block(vec![ret(), Stmt::Break(span())], span());
        assert!(definitely_returns(&block));
    }

    #[test]
    fn function_missing_a_return_is_reported() {
        let mut reporter = Reporter::new();
        let func = Function {
            name: crate::symbol::Interner::new().intern("f"),
            params: vec![],
            ret: Type::Builtin(BuiltinKind::Int32),
            decls: vec![],
            body: Some(vec![Stmt::Expr(Expr::new(ExprKind::Integer(1), span()))]),
            span: span(),
        };
        check_function(&func, &mut reporter);
        assert!(reporter.has_errors());
    }

    #[test]
    fn void_function_needs_no_return() {
        let mut reporter = Reporter::new();
        let func = Function {
            name: crate::symbol::Interner::new().intern("f"),
            params: vec![],
            ret: Type::void(),
            decls: vec![],
            body: Some(vec![Stmt::Expr(Expr::new(ExprKind::Integer(1), span()))]),
            span: span(),
        };
        check_function(&func, &mut reporter);
        assert!(!reporter.has_errors());
    }
}
