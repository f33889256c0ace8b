//! Statement code generation: loops, conditionals, `return`, blocks. See
//! `spec.md` §4.6 "Loops & control", "If", "Return",
//! `original_source/src/codegen/stmt.cc`.

use crate::codegen::context::CodegenContext;
use crate::codegen::expr::{gen_convert, gen_rvalue, emit_memcpy};
use crate::diagnostics::Diagnostic;
use crate::error::CompileError;
use crate::hir::{BuiltinKind, Stmt, Type};
use crate::layout;
use crate::span::Span;

fn fail(ctx: &mut CodegenContext<'_>, err: CompileError) -> Result<(), ()> {
    ctx.reporter.push(Diagnostic::from(err));
    Err(())
}

/// Evaluates `cond` as rvalue, requires `Bool`, and pops the result into
/// `%al`, leaving a `testb %al, %al` ready for the caller to branch on.
fn gen_cond_into_al(ctx: &mut CodegenContext<'_>, cond: &crate::hir::Expr, span: Span) -> Result<(), ()> {
    let ty = gen_rvalue(ctx, cond, Some(&Type::Builtin(BuiltinKind::Bool)))?;
    if ty != Type::Builtin(BuiltinKind::Bool) {
        return fail(ctx, CompileError::IncompatibleOperands { span });
    }
    ctx.pop_slot_into("%rax");
    ctx.out.instr2("testb", "%al", "%al");
    Ok(())
}

/// Generates one statement. Per `spec.md` §7 "Recovery granularity",
/// statement-level errors are recorded on `ctx.reporter` but do not prevent
/// sibling statements in the enclosing block from being attempted.
pub fn gen_stmt(ctx: &mut CodegenContext<'_>, stmt: &Stmt, ret_ty: &Type) -> Result<(), ()> {
    match stmt {
        Stmt::Expr(e) => {
            // "Expression-statement: save callee_size, evaluate, restore
            // (freeing the pushed result). No copy out."
            ctx.checkpoint(|ctx| gen_rvalue(ctx, e, None))?;
            Ok(())
        }
        Stmt::Return(value, span) => gen_return(ctx, value.as_ref(), ret_ty, *span),
        Stmt::Break(span) => {
            let Some((_, end)) = ctx.current_loop(*span) else { return Err(()) };
            ctx.out.instr1("jmp", &ctx.label_name(end));
            Ok(())
        }
        Stmt::Continue(span) => {
            let Some((start, _)) = ctx.current_loop(*span) else { return Err(()) };
            ctx.out.instr1("jmp", &ctx.label_name(start));
            Ok(())
        }
        Stmt::While(cond, body, span) => gen_while(ctx, cond, body, ret_ty, *span),
        Stmt::If(cond, then, els, span) => gen_if(ctx, cond, then, els.as_deref(), ret_ty, *span),
        Stmt::Block(stmts, _) => {
            for s in stmts {
                // Each statement's failure is independent; keep going so
                // later statements can still surface their own diagnostics.
                let _ = gen_stmt(ctx, s, ret_ty);
            }
            Ok(())
        }
    }
}

fn gen_while(ctx: &mut CodegenContext<'_>, cond: &crate::hir::Expr, body: &Stmt, ret_ty: &Type, span: Span) -> Result<(), ()> {
    let start = ctx.labels.next();
    let end = ctx.labels.next();
    ctx.out.label(&ctx.label_name(start));
    gen_cond_into_al(ctx, cond, span)?;
    ctx.out.instr1("je", &ctx.label_name(end));
    ctx.push_loop(start, end);
    let _ = gen_stmt(ctx, body, ret_ty);
    ctx.pop_loop();
    ctx.out.instr1("jmp", &ctx.label_name(start));
    ctx.out.label(&ctx.label_name(end));
    Ok(())
}

fn gen_if(
    ctx: &mut CodegenContext<'_>,
    cond: &crate::hir::Expr,
    then: &Stmt,
    els: Option<&Stmt>,
    ret_ty: &Type,
    span: Span,
) -> Result<(), ()> {
    let else_label = ctx.labels.next();
    let end_label = ctx.labels.next();
    gen_cond_into_al(ctx, cond, span)?;
    ctx.out.instr1("je", &ctx.label_name(else_label));
    let _ = gen_stmt(ctx, then, ret_ty);
    ctx.out.instr1("jmp", &ctx.label_name(end_label));
    ctx.out.label(&ctx.label_name(else_label));
    if let Some(els) = els {
        let _ = gen_stmt(ctx, els, ret_ty);
    }
    ctx.out.label(&ctx.label_name(end_label));
    Ok(())
}

fn gen_return(ctx: &mut CodegenContext<'_>, value: Option<&crate::hir::Expr>, ret_ty: &Type, span: Span) -> Result<(), ()> {
    match value {
        None => {
            if !ret_ty.is_void() {
                return fail(ctx, CompileError::IncompatibleOperands { span });
            }
        }
        Some(e) => {
            if ret_ty.is_void() {
                return fail(ctx, CompileError::IncompatibleOperands { span });
            }
            let vty = gen_rvalue(ctx, e, Some(ret_ty))?;
            gen_convert(ctx, &vty, ret_ty, span)?;
            let size = layout::size_of(ret_ty, ctx.structs, span).map_err(|err| {
                ctx.reporter.push(Diagnostic::from(err));
            })?;
            if size > 8 {
                // The value on top of the stack is its address; byte-copy
                // into the caller-allocated slot whose address the
                // prologue saved, then return that address in `%rax`.
                let slot = ctx
                    .return_slot_offset
                    .unwrap_or_else(|| panic!("internal error: missing return slot for a >8-byte return type"));
                ctx.pop_slot_into("%rbx");
                ctx.out.instr2("movq", &format!("-{slot}(%rbp)"), "%rax");
                emit_memcpy(ctx, size);
                ctx.out.instr2("movq", &format!("-{slot}(%rbp)"), "%rax");
            } else if layout::is_fat(ret_ty, ctx.enums) {
                // <=8-byte aggregate: packed into `%rax` per the System V
                // small-aggregate return convention, not passed by address
                // (the callee's frame, and thus that address, is gone by
                // the time the caller reads `%rax`).
                ctx.pop_slot_into("%rax");
                ctx.out.instr2("movq", "(%rax)", "%rax");
            } else {
                ctx.pop_slot_into("%rax");
            }
        }
    }
    ctx.out.instr1("jmp", &ctx.end_label());
    Ok(())
}

