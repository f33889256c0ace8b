//! Dead-variable elimination. See `spec.md` §4.3, ported from
//! `original_source/src/hiropt/unused.cc`'s `full_`-flagged fixpoint pass.

use hashbrown::HashSet;

use crate::ast::InfixOp;
use crate::diagnostics::{Diagnostic, Reporter};
use crate::hir::{Expr, ExprKind, Function, Stmt};
use crate::symbol::Symbol;

/// Runs the fixpoint to completion on one function: repeatedly drops
/// `decls` not referenced anywhere, then drops (or empties) any statement
/// that referenced a just-dropped local, until a pass removes nothing.
/// Also warns on unused parameters, which are never removed.
pub fn eliminate_unused(func: &mut Function, reporter: &mut Reporter) {
    let Some(body) = func.body.as_mut() else { return };

    loop {
        let mut used = HashSet::new();
        for stmt in body.iter() {
            collect_used_stmt(stmt, &mut used);
        }

        let mut removed = HashSet::new();
        func.decls.retain(|d| {
            if used.contains(&d.name) {
                true
            } else {
                reporter.push(Diagnostic::warn(d.span, "unused variable"));
                removed.insert(d.name);
                false
            }
        });

        if removed.is_empty() {
            for param in &func.params {
                if !used.contains(&param.name) {
                    reporter.push(Diagnostic::warn(func.span, "unused parameter"));
                }
            }
            return;
        }

        process_stmts(body, &removed);
    }
}

/// Collects variables *read* by a statement list: a plain `Variable` used
/// as the whole left-hand side of an assignment is exempt (a write-only
/// local is still dead) — the crucial subtlety from `spec.md` §4.3.
fn collect_used_stmt(stmt: &Stmt, used: &mut HashSet<Symbol>) {
    match stmt {
        Stmt::Expr(e) => collect_used_expr(e, used),
        Stmt::Return(opt, _) => {
            if let Some(e) = opt {
                collect_used_expr(e, used);
            }
        }
        Stmt::Break(_) | Stmt::Continue(_) => {}
        Stmt::While(cond, body, _) => {
            collect_used_expr(cond, used);
            collect_used_stmt(body, used);
        }
        Stmt::If(cond, then, els, _) => {
            collect_used_expr(cond, used);
            collect_used_stmt(then, used);
            if let Some(e) = els {
                collect_used_stmt(e, used);
            }
        }
        Stmt::Block(stmts, _) => {
            for s in stmts {
                collect_used_stmt(s, used);
            }
        }
    }
}

fn collect_used_expr(expr: &Expr, used: &mut HashSet<Symbol>) {
    match &expr.kind {
        ExprKind::Variable(s) => {
            used.insert(*s);
        }
        ExprKind::Infix(InfixOp::Assign, lhs, rhs) => {
            collect_used_as_lvalue(lhs, used);
            collect_used_expr(rhs, used);
        }
        ExprKind::Infix(_, l, r) => {
            collect_used_expr(l, used);
            collect_used_expr(r, used);
        }
        ExprKind::Unary(_, e) | ExprKind::Access(e, _) | ExprKind::Cast(e, _) | ExprKind::ESizeof(e) => {
            collect_used_expr(e, used);
        }
        ExprKind::Index(base, idx) => {
            collect_used_expr(base, used);
            collect_used_expr(idx, used);
        }
        ExprKind::Call(f, args) => {
            collect_used_expr(f, used);
            for a in args {
                collect_used_expr(a, used);
            }
        }
        ExprKind::Struct(_, inits) => {
            for init in inits {
                collect_used_expr(&init.value, used);
            }
        }
        ExprKind::Array(elems) => {
            for e in elems {
                collect_used_expr(e, used);
            }
        }
        ExprKind::TSizeof(_)
        | ExprKind::EnumSelect(_)
        | ExprKind::Integer(_)
        | ExprKind::StringLiteral(_)
        | ExprKind::Char(_)
        | ExprKind::Bool(_)
        | ExprKind::NullPtr => {}
    }
}

/// A plain `Variable` as the entire assignment target reads nothing; a
/// compound lvalue (`a[i]`, `p.field`, `*p`) still reads its sub-parts.
fn collect_used_as_lvalue(expr: &Expr, used: &mut HashSet<Symbol>) {
    if matches!(expr.kind, ExprKind::Variable(_)) {
        return;
    }
    collect_used_expr(expr, used);
}

/// Whether any variable in `removed` appears anywhere in `expr` — writer or
/// reader alike, unlike [`collect_used_expr`]'s LHS exemption: a statement
/// that only writes a now-dead local is itself dead.
fn expr_references(expr: &Expr, removed: &HashSet<Symbol>) -> bool {
    match &expr.kind {
        ExprKind::Variable(s) => removed.contains(s),
        ExprKind::Infix(_, l, r) => expr_references(l, removed) || expr_references(r, removed),
        ExprKind::Unary(_, e) | ExprKind::Access(e, _) | ExprKind::Cast(e, _) | ExprKind::ESizeof(e) => {
            expr_references(e, removed)
        }
        ExprKind::Index(base, idx) => expr_references(base, removed) || expr_references(idx, removed),
        ExprKind::Call(f, args) => expr_references(f, removed) || args.iter().any(|a| expr_references(a, removed)),
        ExprKind::Struct(_, inits) => inits.iter().any(|i| expr_references(&i.value, removed)),
        ExprKind::Array(elems) => elems.iter().any(|e| expr_references(e, removed)),
        ExprKind::TSizeof(_)
        | ExprKind::EnumSelect(_)
        | ExprKind::Integer(_)
        | ExprKind::StringLiteral(_)
        | ExprKind::Char(_)
        | ExprKind::Bool(_)
        | ExprKind::NullPtr => false,
    }
}

/// Retains statements not referencing `removed`, recursing into nested
/// blocks and loop/if bodies. A bare `Block` left with no statements is
/// dropped entirely (step 4); a `while`/`if` body is never dropped outright
/// (the statement needs *some* body) but is emptied if it referenced a dead
/// local.
fn process_stmts(stmts: &mut Vec<Stmt>, removed: &HashSet<Symbol>) {
    stmts.retain_mut(|stmt| match stmt {
        Stmt::Expr(e) => !expr_references(e, removed),
        Stmt::Return(opt, _) => !opt.as_ref().is_some_and(|e| expr_references(e, removed)),
        Stmt::Break(_) | Stmt::Continue(_) => true,
        Stmt::While(cond, body, _) => {
            if expr_references(cond, removed) {
                false
            } else {
                scrub_as_body(body, removed);
                true
            }
        }
        Stmt::If(cond, then, els, _) => {
            if expr_references(cond, removed) {
                false
            } else {
                scrub_as_body(then, removed);
                if let Some(e) = els {
                    scrub_as_body(e, removed);
                }
                true
            }
        }
        Stmt::Block(inner, _) => {
            process_stmts(inner, removed);
            !inner.is_empty()
        }
    });
}

fn scrub_as_body(stmt: &mut Stmt, removed: &HashSet<Symbol>) {
    let span = stmt.span();
    let cond_hits = match stmt {
        Stmt::While(cond, _, _) | Stmt::If(cond, _, _, _) => expr_references(cond, removed),
        _ => false,
    };
    if cond_hits {
        *stmt = Stmt::Block(Vec::new(), span);
        return;
    }
    match stmt {
        Stmt::Block(inner, _) => process_stmts(inner, removed),
        Stmt::Expr(e) => {
            if expr_references(e, removed) {
                *stmt = Stmt::Block(Vec::new(), span);
            }
        }
        Stmt::Return(opt, _) => {
            if opt.as_ref().is_some_and(|e| expr_references(e, removed)) {
                *stmt = Stmt::Block(Vec::new(), span);
            }
        }
        Stmt::While(_, body, _) => scrub_as_body(body, removed),
        Stmt::If(_, then, els, _) => {
            scrub_as_body(then, removed);
            if let Some(e) = els {
                scrub_as_body(e, removed);
            }
        }
        Stmt::Break(_) | Stmt::Continue(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::{BuiltinKind, Param, Type, VarDecl};
    use crate::span::{FileId, Pos, Span};
    use crate::symbol::Interner;

    fn span() -> Span {
        Span::new(FileId(0), Pos::new(0, 0), Pos::new(0, 0))
    }

    fn var(s: Symbol) -> Expr {
        Expr::new(ExprKind::Variable(s), span())
    }

    fn int(n: u64) -> Expr {
        Expr::new(ExprKind::Integer(n), span())
    }

    #[test]
    fn write_only_local_is_removed() {
        let mut interner = Interner::new();
        let f_name = interner.intern("f");
        let x = interner.intern("x");

        // function f() { let x: int32; x = 1; }
        let assign = Stmt::Expr(Expr::new(
            ExprKind::Infix(InfixOp::Assign, Box::new(var(x)), Box::new(int(1))),
            span(),
        ));
        let mut func = Function {
            name: f_name,
            params: vec![],
            ret: Type::void(),
            decls: vec![VarDecl { name: x, ty: Type::Builtin(BuiltinKind::Int32), span: span() }],
            body: Some(vec![assign]),
            span: span(),
        };

        let mut reporter = Reporter::new();
        eliminate_unused(&mut func, &mut reporter);

        assert!(func.decls.is_empty(), "x is never read, so it must be eliminated");
        assert!(func.body.unwrap().is_empty(), "the dead assignment to x must be dropped");
        assert!(reporter.diagnostics().iter().any(|d| d.what.contains("unused variable")));
    }

    #[test]
    fn read_local_survives() {
        let mut interner = Interner::new();
        let f_name = interner.intern("f");
        let x = interner.intern("x");

        // function f() { let x: int32; return x; }
        let ret = Stmt::Return(Some(var(x)), span());
        let mut func = Function {
            name: f_name,
            params: vec![],
            ret: Type::Builtin(BuiltinKind::Int32),
            decls: vec![VarDecl { name: x, ty: Type::Builtin(BuiltinKind::Int32), span: span() }],
            body: Some(vec![ret]),
            span: span(),
        };

        let mut reporter = Reporter::new();
        eliminate_unused(&mut func, &mut reporter);

        assert_eq!(func.decls.len(), 1);
        assert_eq!(func.body.unwrap().len(), 1);
    }

    #[test]
    fn unused_parameter_warns_but_is_kept() {
        let mut interner = Interner::new();
        let f_name = interner.intern("f");
        let p = interner.intern("p");

        let mut func = Function {
            name: f_name,
            params: vec![Param { name: p, ty: Type::Builtin(BuiltinKind::Int32) }],
            ret: Type::void(),
            decls: vec![],
            body: Some(vec![]),
            span: span(),
        };

        let mut reporter = Reporter::new();
        eliminate_unused(&mut func, &mut reporter);

        assert_eq!(func.params.len(), 1, "parameters are never removed");
        assert!(reporter.diagnostics().iter().any(|d| d.what.contains("unused parameter")));
    }

    #[test]
    fn chained_dead_write_is_removed_transitively() {
        // let x: int32; let y: int32; y = x; x = 1;
        // Neither x nor y is ever read: both die, in two fixpoint rounds.
        let mut interner = Interner::new();
        let f_name = interner.intern("f");
        let x = interner.intern("x");
        let y = interner.intern("y");

        let y_eq_x = Stmt::Expr(Expr::new(
            ExprKind::Infix(InfixOp::Assign, Box::new(var(y)), Box::new(var(x))),
            span(),
        ));
        let x_eq_1 = Stmt::Expr(Expr::new(
            ExprKind::Infix(InfixOp::Assign, Box::new(var(x)), Box::new(int(1))),
            span(),
        ));
        let mut func = Function {
            name: f_name,
            params: vec![],
            ret: Type::void(),
            decls: vec![
                VarDecl { name: x, ty: Type::Builtin(BuiltinKind::Int32), span: span() },
                VarDecl { name: y, ty: Type::Builtin(BuiltinKind::Int32), span: span() },
            ],
            body: Some(vec![y_eq_x, x_eq_1]),
            span: span(),
        };

        let mut reporter = Reporter::new();
        eliminate_unused(&mut func, &mut reporter);

        assert!(func.decls.is_empty());
        assert!(func.body.unwrap().is_empty());
    }
}
