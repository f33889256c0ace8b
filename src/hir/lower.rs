//! HIR lowering: the name translator plus the two-pass algorithm from
//! `spec.md` §4.1, ported from `original_source/src/hirgen/*.cc`.

use im::HashMap as ImHashMap;
use smallvec::SmallVec;

use crate::ast;
use crate::diagnostics::{Diagnostic, Reporter};
use crate::error::CompileError;
use crate::hir::{self, BuiltinKind, Type};
use crate::span::Span;
use crate::symbol::{Interner, Symbol};
use crate::tables::{EnumTable, FuncInfoEntry, FuncInfoTable, StringTable, StructEntry, StructFieldEntry, StructTable};

/// Scope stack mapping source names to globally-unique HIR names. Each
/// scope is an `im::HashMap`, so `enter_scope` is a cheap structurally
/// shared clone and `leave_scope` is an O(1) pop — matching the Design Note
/// that "outer tables are held by shared reference to a parent" without
/// hand-rolling parent pointers.
pub struct NameTranslator {
    scopes: Vec<ImHashMap<Symbol, Symbol>>,
    scope_counter: u32,
}

impl Default for NameTranslator {
    fn default() -> Self {
        NameTranslator { scopes: vec![ImHashMap::new()], scope_counter: 0 }
    }
}

impl NameTranslator {
    #[must_use]
    pub fn new() -> Self {
        NameTranslator::default()
    }

    pub fn enter_scope(&mut self) {
        self.scope_counter += 1;
        self.scopes.push(self.scopes.last().cloned().unwrap_or_default());
    }

    pub fn leave_scope(&mut self) {
        self.scopes.pop();
        assert!(!self.scopes.is_empty(), "internal error: left the top-level scope");
    }

    /// Registers `name` with a fresh `<name>_<scope_id>` unique HIR name in
    /// the current (innermost) scope, shadowing any outer binding of the
    /// same source name.
    pub fn reg_name(&mut self, name: &str, interner: &mut Interner) -> Symbol {
        let unique = interner.intern_scoped(name, self.scope_counter);
        self.scopes.last_mut().expect("scope stack never empty").insert(interner.intern(name), unique);
        unique
    }

    /// Registers `name` as itself (used for top-level declarations, which
    /// are globally visible under their source spelling).
    pub fn reg_name_raw(&mut self, name: &str, interner: &mut Interner) -> Symbol {
        let sym = interner.intern(name);
        self.scopes[0].insert(sym, sym);
        sym
    }

    /// Looks up `name` from the innermost scope outward.
    #[must_use]
    pub fn lookup(&self, name: Symbol) -> Option<Symbol> {
        self.scopes.last().and_then(|s| s.get(&name).copied())
    }

}

/// Shared state threaded through HIR lowering: symbol interner, the global
/// tables being populated, and the diagnostic reporter.
pub struct LowerCtx<'a> {
    pub interner: &'a mut Interner,
    pub strings: &'a mut StringTable,
    pub structs: &'a mut StructTable,
    pub enums: &'a mut EnumTable,
    pub funcs: &'a mut FuncInfoTable,
    pub reporter: &'a mut Reporter,
    pub translator: NameTranslator,
}

/// Hoisted declarations and emitted statements accumulated while lowering a
/// single function body.
#[derive(Default)]
struct FnBuild {
    decls: Vec<hir::VarDecl>,
}

pub fn lower_program(ast_decls: &[ast::Decl], ctx: &mut LowerCtx<'_>) -> hir::Program {
    // Pass 1: register every top-level name with itself, per `spec.md`
    // §4.1 step 1. The source does not detect duplicates; this
    // implementation does, per the spec's guidance to "reject duplicates".
    let mut seen: hashbrown::HashSet<Symbol> = hashbrown::HashSet::new();
    for decl in ast_decls {
        if matches!(decl, ast::Decl::Import(_)) {
            continue;
        }
        let name_sym = ctx.interner.intern(decl.name());
        if !seen.insert(name_sym) {
            ctx.reporter.push(Diagnostic::from(CompileError::DuplicateDeclaration {
                name: decl.name().to_string(),
                span: decl.span(),
            }));
            continue;
        }
        ctx.translator.reg_name_raw(decl.name(), ctx.interner);
        match decl {
            ast::Decl::Struct(s) => {
                ctx.structs.insert(name_sym, StructEntry::new(s.span));
            }
            ast::Decl::Enum(e) => {
                ctx.enums.insert(name_sym, e.span, hashbrown::HashMap::new());
            }
            _ => {}
        }
    }

    // Pass 2: lower each declaration.
    let mut program = hir::Program::default();
    for decl in ast_decls {
        match decl {
            ast::Decl::Function(f) => {
                if let Some(func) = lower_function(f, ctx) {
                    program.decls.push(hir::Decl::Function(func));
                }
            }
            ast::Decl::Struct(s) => {
                if let Some(st) = lower_struct(s, ctx) {
                    program.decls.push(hir::Decl::Struct(st));
                }
            }
            ast::Decl::Enum(e) => {
                if let Some(en) = lower_enum(e, ctx) {
                    program.decls.push(hir::Decl::Enum(en));
                }
            }
            ast::Decl::Import(_) => {
                // Linkage is out of scope (`spec.md` §4.1 step 2: "pass
                // through names unchanged; linkage is out of scope").
            }
        }
    }
    program
}

fn lower_type(ty: &ast::Type, span: Span, ctx: &mut LowerCtx<'_>) -> Option<Type> {
    Some(match ty {
        ast::Type::Void => Type::Builtin(BuiltinKind::Void),
        ast::Type::Int8 => Type::Builtin(BuiltinKind::Int8),
        ast::Type::Int16 => Type::Builtin(BuiltinKind::Int16),
        ast::Type::Int32 => Type::Builtin(BuiltinKind::Int32),
        ast::Type::Int64 => Type::Builtin(BuiltinKind::Int64),
        ast::Type::UInt8 => Type::Builtin(BuiltinKind::UInt8),
        ast::Type::UInt16 => Type::Builtin(BuiltinKind::UInt16),
        ast::Type::UInt32 => Type::Builtin(BuiltinKind::UInt32),
        ast::Type::UInt64 => Type::Builtin(BuiltinKind::UInt64),
        ast::Type::ISize => Type::Builtin(BuiltinKind::ISize),
        ast::Type::USize => Type::Builtin(BuiltinKind::USize),
        ast::Type::Bool => Type::Builtin(BuiltinKind::Bool),
        ast::Type::Char => Type::Builtin(BuiltinKind::Char),
        ast::Type::Pointer(of) => Type::Pointer(Box::new(lower_type(of, span, ctx)?)),
        ast::Type::Array(of, size_expr) => {
            let of_ty = lower_type(of, span, ctx)?;
            let n = const_eval(size_expr, ctx)?;
            Type::Array(Box::new(of_ty), n)
        }
        ast::Type::Name(ident) => {
            let sym = ctx.interner.intern(ident);
            if !ctx.structs.exists(sym) && !ctx.enums.exists(sym) {
                ctx.reporter.push(Diagnostic::from(CompileError::UnknownStruct {
                    name: ident.clone(),
                    span,
                }));
                return None;
            }
            Type::Name(sym)
        }
    })
}

/// Constant-expression evaluator for array sizes and enum discriminants.
/// Supports `+ - * / % & | ^ << >> ~` and integer literals (`spec.md` §4.1
/// step 2 "Enum"); anything else is an error at evaluation.
fn const_eval(expr: &ast::Expr, ctx: &mut LowerCtx<'_>) -> Option<u64> {
    match &expr.kind {
        ast::ExprKind::Integer(n) => Some(*n),
        ast::ExprKind::Unary(ast::UnaryOp::Inv, inner) => const_eval(inner, ctx).map(|v| !v),
        ast::ExprKind::Unary(ast::UnaryOp::Minus, inner) => {
            const_eval(inner, ctx).map(|v| v.wrapping_neg())
        }
        ast::ExprKind::Infix(op, lhs, rhs) => {
            let l = const_eval(lhs, ctx)?;
            let r = const_eval(rhs, ctx)?;
            match op {
                ast::InfixOp::Add => Some(l.wrapping_add(r)),
                ast::InfixOp::Sub => Some(l.wrapping_sub(r)),
                ast::InfixOp::Mul => Some(l.wrapping_mul(r)),
                ast::InfixOp::Div if r != 0 => Some(l / r),
                ast::InfixOp::Mod if r != 0 => Some(l % r),
                ast::InfixOp::BitAnd => Some(l & r),
                ast::InfixOp::BitOr => Some(l | r),
                ast::InfixOp::BitXor => Some(l ^ r),
                ast::InfixOp::LShift => Some(l << (r & 63)),
                ast::InfixOp::RShift => Some(l >> (r & 63)),
                _ => {
                    ctx.reporter.push(Diagnostic::from(CompileError::NotAConstant { span: expr.span }));
                    None
                }
            }
        }
        _ => {
            ctx.reporter.push(Diagnostic::from(CompileError::NotAConstant { span: expr.span }));
            None
        }
    }
}

fn lower_struct(s: &ast::Struct, ctx: &mut LowerCtx<'_>) -> Option<hir::Struct> {
    let name = ctx.interner.intern(&s.name);
    let mut fields = Vec::with_capacity(s.fields.len());
    for f in &s.fields {
        let ty = lower_type(&f.ty, s.span, ctx)?;
        let fname = ctx.interner.intern(&f.name);
        fields.push(hir::StructField { name: fname, ty });
    }
    // Populate the struct table entry registered in pass 1 with field data
    // (layout itself is computed lazily by `crate::layout`).
    if let Some(entry) = ctx.structs.get_mut(name) {
        entry.field_order = fields.iter().map(|f| f.name).collect();
        entry.fields = fields
            .iter()
            .map(|f| (f.name, StructFieldEntry { ty: f.ty.clone(), offset: 0 }))
            .collect();
    }
    Some(hir::Struct { name, fields, span: s.span })
}

fn lower_enum(e: &ast::Enum, ctx: &mut LowerCtx<'_>) -> Option<hir::Enum> {
    let name = ctx.interner.intern(&e.name);
    let mut fields = Vec::with_capacity(e.fields.len());
    let mut next_value = 0u64;
    let mut table = hashbrown::HashMap::new();
    for f in &e.fields {
        let value = match &f.init {
            Some(expr) => const_eval(expr, ctx)?,
            None => next_value,
        };
        next_value = value.wrapping_add(1);
        let fname = ctx.interner.intern(&f.name);
        fields.push((fname, value));
        table.insert(fname, value);
    }
    ctx.enums.insert(name, e.span, table);
    Some(hir::Enum { name, fields, span: e.span })
}

fn lower_function(f: &ast::Function, ctx: &mut LowerCtx<'_>) -> Option<hir::Function> {
    let name = ctx.interner.intern(&f.name);
    let ret = match &f.ret {
        Some(t) => lower_type(t, f.span, ctx)?,
        None => Type::void(),
    };

    ctx.translator.enter_scope();
    let mut params = Vec::with_capacity(f.params.len());
    let mut param_entries = Vec::with_capacity(f.params.len());
    for p in &f.params {
        let ty = lower_type(&p.ty, f.span, ctx)?;
        let unique = ctx.translator.reg_name(&p.name, ctx.interner);
        params.push(hir::Param { name: unique, ty: ty.clone() });
        param_entries.push((unique, ty));
    }

    let (decls, body) = if let Some(items) = &f.body {
        let mut build = FnBuild::default();
        let stmts = lower_block_items(items, ctx, &mut build);
        (build.decls, Some(stmts))
    } else {
        (Vec::new(), None)
    };

    ctx.funcs.insert(
        name,
        FuncInfoEntry {
            params: param_entries,
            ret_type: ret.clone(),
            variadic: false,
            is_extern: body.is_none(),
            span: f.span,
        },
    );
    ctx.translator.leave_scope();
    Some(hir::Function { name, params, ret, decls, body, span: f.span })
}

/// Lowers one block's items, hoisting `let`s into `build.decls` and
/// flattening initializers into assignment statements, per `spec.md` §4.1
/// step 3. Returns the flat statement list for this block (no nested
/// `let`s remain).
fn lower_block_items(items: &[ast::BlockItem], ctx: &mut LowerCtx<'_>, build: &mut FnBuild) -> Vec<hir::Stmt> {
    let mut out = Vec::new();
    for item in items {
        match item {
            ast::BlockItem::VarDecls(bodies) => {
                for body in bodies {
                    let Some(ty) = lower_type(&body.ty, body.span, ctx) else { continue };
                    let unique = ctx.translator.reg_name(&body.name, ctx.interner);
                    build.decls.push(hir::VarDecl { name: unique, ty, span: body.span });
                    if let Some(init) = &body.init {
                        let Some(init_hir) = lower_expr(init, ctx) else { continue };
                        out.push(hir::Stmt::Expr(hir::Expr::new(
                            hir::ExprKind::Infix(
                                ast::InfixOp::Assign,
                                Box::new(hir::Expr::new(hir::ExprKind::Variable(unique), body.span)),
                                Box::new(init_hir),
                            ),
                            body.span,
                        )));
                    }
                }
            }
            ast::BlockItem::Statement(stmt) => {
                if let Some(lowered) = lower_stmt(stmt, ctx, build) {
                    out.push(lowered);
                }
            }
        }
    }
    out
}

fn lower_stmt(stmt: &ast::Stmt, ctx: &mut LowerCtx<'_>, build: &mut FnBuild) -> Option<hir::Stmt> {
    Some(match &stmt.kind {
        ast::StmtKind::Expr(e) => hir::Stmt::Expr(lower_expr(e, ctx)?),
        ast::StmtKind::Return(e) => {
            hir::Stmt::Return(e.as_ref().and_then(|e| lower_expr(e, ctx)), stmt.span)
        }
        ast::StmtKind::Break => hir::Stmt::Break(stmt.span),
        ast::StmtKind::Continue => hir::Stmt::Continue(stmt.span),
        ast::StmtKind::While(cond, body) => {
            let cond = lower_expr(cond, ctx)?;
            let body = lower_stmt(body, ctx, build)?;
            hir::Stmt::While(cond, Box::new(body), stmt.span)
        }
        ast::StmtKind::If(cond, then, els) => {
            let cond = lower_expr(cond, ctx)?;
            let then = lower_stmt(then, ctx, build)?;
            let els = els.as_ref().and_then(|e| lower_stmt(e, ctx, build)).map(Box::new);
            hir::Stmt::If(cond, Box::new(then), els, stmt.span)
        }
        ast::StmtKind::Block(items) => {
            // A nested block is a fresh scope, so a shadowed name inside it
            // receives a distinct unique HIR name (`spec.md` §8 property 6).
            ctx.translator.enter_scope();
            let stmts = lower_block_items(items, ctx, build);
            ctx.translator.leave_scope();
            hir::Stmt::Block(stmts, stmt.span)
        }
    })
}

fn lower_expr(expr: &ast::Expr, ctx: &mut LowerCtx<'_>) -> Option<hir::Expr> {
    let kind = match &expr.kind {
        ast::ExprKind::Unary(op, e) => hir::ExprKind::Unary(*op, Box::new(lower_expr(e, ctx)?)),
        ast::ExprKind::Infix(op, l, r) => {
            hir::ExprKind::Infix(*op, Box::new(lower_expr(l, ctx)?), Box::new(lower_expr(r, ctx)?))
        }
        ast::ExprKind::Index(e, i) => {
            hir::ExprKind::Index(Box::new(lower_expr(e, ctx)?), Box::new(lower_expr(i, ctx)?))
        }
        ast::ExprKind::Call(f, args) => {
            let f = lower_expr(f, ctx)?;
            let mut lowered_args = Vec::with_capacity(args.len());
            for a in args {
                lowered_args.push(lower_expr(a, ctx)?);
            }
            hir::ExprKind::Call(Box::new(f), lowered_args)
        }
        ast::ExprKind::Access(e, field) => {
            hir::ExprKind::Access(Box::new(lower_expr(e, ctx)?), ctx.interner.intern(field))
        }
        ast::ExprKind::Cast(e, ty) => {
            hir::ExprKind::Cast(Box::new(lower_expr(e, ctx)?), lower_type(ty, expr.span, ctx)?)
        }
        ast::ExprKind::ESizeof(e) => hir::ExprKind::ESizeof(Box::new(lower_expr(e, ctx)?)),
        ast::ExprKind::TSizeof(ty) => hir::ExprKind::TSizeof(lower_type(ty, expr.span, ctx)?),
        ast::ExprKind::EnumSelect(enum_name, variant) => {
            // See the Open Question resolution: treat `Enum::Variant`
            // unambiguously as `(enum_name, variant)`, not a swap-prone
            // src/dst pair.
            let enum_name = ctx.interner.intern(enum_name);
            let variant = ctx.interner.intern(variant);
            hir::ExprKind::EnumSelect(hir::EnumSelectExpr { enum_name, variant })
        }
        ast::ExprKind::Variable(name) => {
            let sym = ctx.interner.intern(name);
            let Some(unique) = ctx.translator.lookup(sym) else {
                ctx.reporter.push(Diagnostic::from(CompileError::UnknownVariable {
                    name: name.clone(),
                    span: expr.span,
                }));
                return None;
            };
            hir::ExprKind::Variable(unique)
        }
        ast::ExprKind::Integer(n) => hir::ExprKind::Integer(*n),
        ast::ExprKind::String(bytes) => {
            hir::ExprKind::StringLiteral(ctx.strings.intern(bytes, ctx.interner))
        }
        ast::ExprKind::Char(c) => hir::ExprKind::Char(*c),
        ast::ExprKind::Bool(b) => hir::ExprKind::Bool(*b),
        ast::ExprKind::NullPtr => hir::ExprKind::NullPtr,
        ast::ExprKind::Struct(name, inits) => {
            let sym = ctx.interner.intern(name);
            let mut lowered: SmallVec<[hir::StructInit; 4]> = SmallVec::new();
            for init in inits {
                let value = lower_expr(&init.value, ctx)?;
                lowered.push(hir::StructInit { name: ctx.interner.intern(&init.name), value: Box::new(value) });
            }
            hir::ExprKind::Struct(sym, lowered)
        }
        ast::ExprKind::Array(elems) => {
            let mut lowered: SmallVec<[hir::Expr; 4]> = SmallVec::new();
            for e in elems {
                lowered.push(lower_expr(e, ctx)?);
            }
            hir::ExprKind::Array(lowered)
        }
    };
    Some(hir::Expr::new(kind, expr.span))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::{FileId, Pos};

    fn span() -> Span {
        Span::new(FileId(0), Pos::new(0, 0), Pos::new(0, 0))
    }

    fn fresh_ctx() -> (Interner, StringTable, StructTable, EnumTable, FuncInfoTable, Reporter) {
        (Interner::new(), StringTable::new(), StructTable::new(), EnumTable::new(), FuncInfoTable::new(), Reporter::new())
    }

    #[test]
    fn shadowing_in_nested_block_yields_distinct_unique_names() {
        let (mut interner, mut strings, mut structs, mut enums, mut funcs, mut reporter) = fresh_ctx();
        let mut ctx = LowerCtx {
            interner: &mut interner,
            strings: &mut strings,
            structs: &mut structs,
            enums: &mut enums,
            funcs: &mut funcs,
            reporter: &mut reporter,
            translator: NameTranslator::new(),
        };

        // function main() { let x: int32; { let x: int32; } }
        let inner_block = ast::Stmt::new(
            ast::StmtKind::Block(vec![ast::BlockItem::VarDecls(vec![ast::VarBody {
                name: "x".into(),
                ty: ast::Type::Int32,
                init: None,
                span: span(),
            }])]),
            span(),
        );
        let f = ast::Function {
            name: "main".into(),
            params: vec![],
            ret: Some(ast::Type::Int32),
            body: Some(vec![
                ast::BlockItem::VarDecls(vec![ast::VarBody {
                    name: "x".into(),
                    ty: ast::Type::Int32,
                    init: None,
                    span: span(),
                }]),
                ast::BlockItem::Statement(inner_block),
            ]),
            span: span(),
        };

        let lowered = lower_function(&f, &mut ctx).expect("lowers");
        assert_eq!(lowered.decls.len(), 2, "both `x`s hoisted into decls");
        assert_ne!(lowered.decls[0].name, lowered.decls[1].name, "shadowed x gets a distinct unique name");
    }

    #[test]
    fn let_initializer_becomes_assignment_statement() {
        let (mut interner, mut strings, mut structs, mut enums, mut funcs, mut reporter) = fresh_ctx();
        let mut ctx = LowerCtx {
            interner: &mut interner,
            strings: &mut strings,
            structs: &mut structs,
            enums: &mut enums,
            funcs: &mut funcs,
            reporter: &mut reporter,
            translator: NameTranslator::new(),
        };
        let f = ast::Function {
            name: "main".into(),
            params: vec![],
            ret: Some(ast::Type::Int32),
            body: Some(vec![ast::BlockItem::VarDecls(vec![ast::VarBody {
                name: "x".into(),
                ty: ast::Type::Int32,
                init: Some(ast::Expr::new(ast::ExprKind::Integer(5), span())),
                span: span(),
            }])]),
            span: span(),
        };
        let lowered = lower_function(&f, &mut ctx).expect("lowers");
        assert_eq!(lowered.decls.len(), 1);
        let body = lowered.body.unwrap();
        assert_eq!(body.len(), 1);
        match &body[0] {
            hir::Stmt::Expr(e) => match &e.kind {
                hir::ExprKind::Infix(ast::InfixOp::Assign, _, _) => {}
                other => panic!("expected assignment, got {other:?}"),
            },
            other => panic!("expected expr statement, got {other:?}"),
        }
    }

    #[test]
    fn enum_discriminants_default_and_increment() {
        let (mut interner, mut strings, mut structs, mut enums, mut funcs, mut reporter) = fresh_ctx();
        let mut ctx = LowerCtx {
            interner: &mut interner,
            strings: &mut strings,
            structs: &mut structs,
            enums: &mut enums,
            funcs: &mut funcs,
            reporter: &mut reporter,
            translator: NameTranslator::new(),
        };
        let e = ast::Enum {
            name: "Color".into(),
            fields: vec![
                ast::EnumField { name: "R".into(), init: None },
                ast::EnumField { name: "G".into(), init: Some(ast::Expr::new(ast::ExprKind::Integer(5), span())) },
                ast::EnumField { name: "B".into(), init: None },
            ],
            span: span(),
        };
        let lowered = lower_enum(&e, &mut ctx).expect("lowers");
        let values: Vec<u64> = lowered.fields.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![0, 5, 6]);
    }

    #[test]
    fn unknown_variable_is_reported_not_panicked() {
        let (mut interner, mut strings, mut structs, mut enums, mut funcs, mut reporter) = fresh_ctx();
        let mut ctx = LowerCtx {
            interner: &mut interner,
            strings: &mut strings,
            structs: &mut structs,
            enums: &mut enums,
            funcs: &mut funcs,
            reporter: &mut reporter,
            translator: NameTranslator::new(),
        };
        let e = ast::Expr::new(ast::ExprKind::Variable("nope".into()), span());
        assert!(lower_expr(&e, &mut ctx).is_none());
        assert!(ctx.reporter.has_errors());
    }
}
