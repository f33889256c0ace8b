//! The two-mode (rvalue/lvalue) stack-machine expression emitter. See
//! `spec.md` §4.6, the largest single section of the specification and the
//! direct counterpart of `original_source/src/codegen/expr.cc`.
//!
//! Every rvalue evaluation leaves exactly one 8-byte slot on top of the
//! hardware stack: for a non-fat value, the value itself (in the low bytes,
//! zero-padded); for a fat value (array/struct, see [`crate::layout::is_fat`]),
//! the address of storage materialized lower in the frame. Every lvalue
//! evaluation leaves the address of the designated storage location.

use crate::ast::{InfixOp, UnaryOp};
use crate::codegen::context::CodegenContext;
use crate::convert::{self, ConversionKind};
use crate::diagnostics::Diagnostic;
use crate::error::CompileError;
use crate::hir::{Expr, ExprKind, Type};
use crate::layout;
use crate::span::Span;

/// `Ok(ty)` is the expression's inferred type with its value/address now on
/// top of the stack; `Err(())` means a diagnostic was already pushed to
/// `ctx.reporter` and the caller should short-circuit (`spec.md` §7
/// "Propagation": "each evaluator returns a success flag").
pub type GenResult = Result<Type, ()>;

fn fail(ctx: &mut CodegenContext<'_>, err: CompileError) -> GenResult {
    ctx.reporter.push(Diagnostic::from(err));
    Err(())
}

fn fat(ctx: &CodegenContext<'_>, ty: &Type) -> bool {
    layout::is_fat(ty, ctx.enums)
}

/// Emits the implicit conversion from `from` to `to` in place on `(%rsp)`,
/// per `spec.md` §4.5. Assumes the top slot currently holds a `from`-typed
/// non-fat value (fat conversions — array decay, identical-struct — need no
/// code, since the slot already holds the right bits: an address).
pub(crate) fn gen_convert(ctx: &mut CodegenContext<'_>, from: &Type, to: &Type, span: Span) -> Result<(), ()> {
    match convert::implicit_conversion(from, to) {
        Some(ConversionKind::NoOp | ConversionKind::ArrayDecay) => Ok(()),
        Some(ConversionKind::SignExtend { from_width, to_width }) => {
            ctx.out.instr2("movq", "(%rsp)", "%rax");
            emit_sext(ctx, from_width, to_width);
            ctx.out.instr2("movq", "%rax", "(%rsp)");
            Ok(())
        }
        Some(ConversionKind::ZeroExtend { from_width, to_width }) => {
            ctx.out.instr2("movq", "(%rsp)", "%rax");
            emit_zext(ctx, from_width, to_width);
            ctx.out.instr2("movq", "%rax", "(%rsp)");
            Ok(())
        }
        None => {
            fail(ctx, CompileError::ImplicitConversionFailed { span })?;
            unreachable!()
        }
    }
}

fn emit_sext(ctx: &mut CodegenContext<'_>, from_width: u64, to_width: u64) {
    let src = reg_of_width("%rax", from_width);
    let dst = reg_of_width("%rax", to_width);
    if from_width == to_width {
        return;
    }
    ctx.out.instr2(if to_width == 8 { "movsxd" } else { "movsx" }, &src, &dst);
}

fn emit_zext(ctx: &mut CodegenContext<'_>, from_width: u64, to_width: u64) {
    if from_width == to_width {
        return;
    }
    let src = reg_of_width("%rax", from_width);
    let dst = reg_of_width("%rax", to_width);
    if from_width == 4 && to_width == 8 {
        // A 32-bit write already zeroes the upper 32 bits on x86-64.
        ctx.out.instr2("movl", &src, &reg_of_width("%rax", 4));
    } else {
        ctx.out.instr2("movzx", &src, &dst);
    }
}

fn reg_of_width(base: &str, width: u64) -> String {
    let (r8, r16, r32, r64) = match base {
        "%rax" => ("%al", "%ax", "%eax", "%rax"),
        "%rbx" => ("%bl", "%bx", "%ebx", "%rbx"),
        "%rcx" => ("%cl", "%cx", "%ecx", "%rcx"),
        "%rdx" => ("%dl", "%dx", "%edx", "%rdx"),
        _ => (base, base, base, base),
    };
    match width {
        1 => r8,
        2 => r16,
        4 => r32,
        _ => r64,
    }
    .to_string()
}

/// Evaluates `expr` as an rvalue, leaving its value (or, if fat, its
/// address) on top of the stack. `hint` is the expected type, used for
/// array/struct-literal element inference (`spec.md` §4.6 "Assignment").
pub fn gen_rvalue(ctx: &mut CodegenContext<'_>, expr: &Expr, hint: Option<&Type>) -> GenResult {
    match &expr.kind {
        ExprKind::Integer(n) => {
            ctx.out.instr2("movq", &format!("${n}"), "%rax");
            ctx.push_slot();
            Ok(Type::Builtin(crate::hir::BuiltinKind::ISize))
        }
        ExprKind::Bool(b) => {
            ctx.out.instr2("movq", if *b { "$1" } else { "$0" }, "%rax");
            ctx.push_slot();
            Ok(Type::Builtin(crate::hir::BuiltinKind::Bool))
        }
        ExprKind::Char(c) => {
            ctx.out.instr2("movq", &format!("${c}"), "%rax");
            ctx.push_slot();
            Ok(Type::Builtin(crate::hir::BuiltinKind::Char))
        }
        ExprKind::NullPtr => {
            ctx.out.instr2("movq", "$0", "%rax");
            ctx.push_slot();
            Ok(Type::Pointer(Box::new(Type::void())))
        }
        ExprKind::StringLiteral(sym) => {
            ctx.out.instr2("leaq", &format!("{}(%rip)", ctx.interner.resolve(*sym)), "%rax");
            ctx.push_slot();
            Ok(Type::Pointer(Box::new(Type::Builtin(crate::hir::BuiltinKind::Char))))
        }
        ExprKind::TSizeof(ty) => {
            let size = layout::size_of(ty, ctx.structs, expr.span).map_err(|e| fail_noop(ctx, e))?;
            ctx.out.instr2("movq", &format!("${size}"), "%rax");
            ctx.push_slot();
            Ok(Type::Builtin(crate::hir::BuiltinKind::USize))
        }
        ExprKind::ESizeof(inner) => {
            // `sizeof(expr)` only needs `expr`'s type; it must not execute
            // `expr` or leave any trace of evaluating it in the output.
            let inner_ty = ctx.speculative(|ctx| gen_rvalue(ctx, inner, None))?;
            let size = layout::size_of(&inner_ty, ctx.structs, expr.span).map_err(|e| fail_noop(ctx, e))?;
            ctx.out.instr2("movq", &format!("${size}"), "%rax");
            ctx.push_slot();
            Ok(Type::Builtin(crate::hir::BuiltinKind::USize))
        }
        ExprKind::EnumSelect(sel) => {
            if !ctx.enums.variant_exists(sel.enum_name, sel.variant) {
                return fail(ctx, CompileError::UnknownVariant {
                    enum_name: ctx.interner.resolve(sel.enum_name).to_string(),
                    variant: ctx.interner.resolve(sel.variant).to_string(),
                    span: expr.span,
                });
            }
            let value = ctx.enums.query_variant(sel.enum_name, sel.variant).expect("checked above");
            ctx.out.instr2("movq", &format!("${value}"), "%rax");
            ctx.push_slot();
            Ok(Type::Name(sel.enum_name))
        }
        ExprKind::Variable(name) => {
            let ty = ctx.lvars.ty(*name).clone();
            if fat(ctx, &ty) {
                ctx.out.instr2("leaq", &ctx.local_addr(*name), "%rax");
            } else {
                ctx.out.instr2("movq", &ctx.local_addr(*name), "%rax");
            }
            ctx.push_slot();
            Ok(ty)
        }
        ExprKind::Unary(op, sub) => gen_unary(ctx, *op, sub, expr.span),
        ExprKind::Infix(InfixOp::Assign, lhs, rhs) => gen_assign(ctx, lhs, rhs, expr.span),
        ExprKind::Infix(op, lhs, rhs) if op.is_comparison() => gen_comparison(ctx, *op, lhs, rhs, expr.span),
        ExprKind::Infix(op, lhs, rhs) if op.is_logical() => gen_logical(ctx, *op, lhs, rhs, expr.span),
        ExprKind::Infix(op, lhs, rhs) => gen_arith(ctx, *op, lhs, rhs, expr.span),
        ExprKind::Index(..) | ExprKind::Access(..) => {
            let ty = gen_lvalue(ctx, expr)?;
            if fat(ctx, &ty) {
                Ok(ty)
            } else {
                ctx.pop_slot_into("%rax");
                ctx.out.instr2("movq", "(%rax)", "%rax");
                load_sized(ctx, &ty);
                ctx.push_slot();
                Ok(ty)
            }
        }
        ExprKind::Cast(sub, target) => gen_cast(ctx, sub, target, expr.span),
        ExprKind::Call(callee, args) => gen_call(ctx, callee, args, expr.span),
        ExprKind::Struct(name, inits) => gen_struct_literal(ctx, *name, inits, expr.span),
        ExprKind::Array(elems) => gen_array_literal(ctx, elems, hint, expr.span),
    }
}

fn fail_noop(ctx: &mut CodegenContext<'_>, err: CompileError) {
    ctx.reporter.push(Diagnostic::from(err));
}

/// Loads a non-fat value narrower than 8 bytes from `(%rax)` into `%rax`,
/// matching its width so garbage in the high bytes never leaks into the
/// slot. Builtins whose `Type` determines width; pointers are always 8.
fn load_sized(ctx: &mut CodegenContext<'_>, ty: &Type) {
    let width = match ty {
        Type::Builtin(b) => b.width(),
        Type::Pointer(_) => 8,
        Type::Name(_) => 8, // enum: non-fat, encoded as u64
        Type::Array(..) => unreachable!("fat types never reach load_sized"),
    };
    if width < 8 {
        // Zero the slot so upper bytes of the 8-byte stack cell are clean.
        ctx.out.instr2("movzx", &reg_of_width("%rax", width), "%rax");
    }
}

/// Evaluates `expr` as an lvalue, leaving the address of its storage on top
/// of the stack. Valid only for `Variable`, `Deref`, `Index`, `Access`.
pub fn gen_lvalue(ctx: &mut CodegenContext<'_>, expr: &Expr) -> GenResult {
    match &expr.kind {
        ExprKind::Variable(name) => {
            let ty = ctx.lvars.ty(*name).clone();
            ctx.out.instr2("leaq", &ctx.local_addr(*name), "%rax");
            ctx.push_slot();
            Ok(ty)
        }
        ExprKind::Unary(UnaryOp::Deref, inner) => {
            let inner_ty = gen_rvalue(ctx, inner, None)?;
            let Type::Pointer(pointee) = inner_ty else {
                return fail(ctx, CompileError::DerefNonPointer { span: expr.span });
            };
            ctx.pop_slot_into("%rax");
            ctx.push_slot();
            Ok(*pointee)
        }
        ExprKind::Index(base, index) => gen_index(ctx, base, index, expr.span),
        ExprKind::Access(base, field) => gen_access(ctx, base, *field, expr.span),
        _ => fail(ctx, CompileError::NotAnLValue { span: expr.span }),
    }
}

fn gen_unary(ctx: &mut CodegenContext<'_>, op: UnaryOp, sub: &Expr, span: Span) -> GenResult {
    match op {
        UnaryOp::Ref => {
            let pointee = gen_lvalue(ctx, sub)?;
            Ok(Type::Pointer(Box::new(pointee)))
        }
        UnaryOp::Deref => {
            let ty = gen_lvalue(ctx, sub)?;
            if fat(ctx, &ty) {
                Ok(ty)
            } else {
                ctx.pop_slot_into("%rax");
                ctx.out.instr2("movq", "(%rax)", "%rax");
                load_sized(ctx, &ty);
                ctx.push_slot();
                Ok(ty)
            }
        }
        UnaryOp::Minus => {
            let ty = gen_rvalue(ctx, sub, None)?;
            let Type::Builtin(b) = &ty else {
                return fail(ctx, CompileError::IncompatibleOperands { span });
            };
            if !b.is_integer() {
                return fail(ctx, CompileError::IncompatibleOperands { span });
            }
            ctx.pop_slot_into("%rax");
            ctx.out.instr1("negq", "%rax");
            ctx.push_slot();
            Ok(Type::Builtin(signed_equivalent(*b)))
        }
        UnaryOp::Inv => {
            let ty = gen_rvalue(ctx, sub, None)?;
            let Type::Builtin(b) = &ty else {
                return fail(ctx, CompileError::IncompatibleOperands { span });
            };
            if !b.is_integer() {
                return fail(ctx, CompileError::IncompatibleOperands { span });
            }
            ctx.pop_slot_into("%rax");
            ctx.out.instr1("notq", "%rax");
            ctx.push_slot();
            Ok(ty)
        }
        UnaryOp::Neg => {
            let ty = gen_rvalue(ctx, sub, None)?;
            if !matches!(ty, Type::Builtin(crate::hir::BuiltinKind::Bool)) {
                return fail(ctx, CompileError::IncompatibleOperands { span });
            }
            ctx.pop_slot_into("%rax");
            ctx.out.instr2("xorb", "$1", "%al");
            ctx.push_slot();
            Ok(ty)
        }
    }
}

fn signed_equivalent(b: crate::hir::BuiltinKind) -> crate::hir::BuiltinKind {
    use crate::hir::BuiltinKind::*;
    match b {
        UInt8 => Int8,
        UInt16 => Int16,
        UInt32 => Int32,
        UInt64 | USize => Int64,
        other => other,
    }
}

/// Pointer arithmetic: scales the non-pointer side by the pointee's size.
fn gen_pointer_arith(ctx: &mut CodegenContext<'_>, op: InfixOp, ptr_ty: Type, span: Span) -> GenResult {
    let Type::Pointer(pointee) = &ptr_ty else { unreachable!() };
    let elem_size = layout::size_of(pointee, ctx.structs, span).map_err(|e| {
        fail_noop(ctx, e);
    })?;
    // rhs (the offset) is on top, lhs (the pointer) below it.
    ctx.pop_slot_into("%rbx"); // offset
    ctx.pop_slot_into("%rax"); // pointer
    ctx.out.instr2("imulq", &format!("${elem_size}"), "%rbx");
    match op {
        InfixOp::Add => ctx.out.instr2("addq", "%rbx", "%rax"),
        InfixOp::Sub => ctx.out.instr2("subq", "%rbx", "%rax"),
        _ => unreachable!("only +/- are valid pointer arithmetic"),
    }
    ctx.push_slot();
    Ok(ptr_ty)
}

fn gen_arith(ctx: &mut CodegenContext<'_>, op: InfixOp, lhs: &Expr, rhs: &Expr, span: Span) -> GenResult {
    let lty = gen_rvalue(ctx, lhs, None)?;
    let rty = gen_rvalue(ctx, rhs, None)?;

    if (lty.is_pointer() || rty.is_pointer()) && matches!(op, InfixOp::Add | InfixOp::Sub) {
        let usize_ty = Type::Builtin(crate::hir::BuiltinKind::USize);
        let (ptr_ty, rescue) = if lty.is_pointer() { (lty.clone(), rty.clone()) } else { (rty.clone(), lty.clone()) };
        gen_convert(ctx, &rescue, &usize_ty, span)?;
        return gen_pointer_arith(ctx, op, ptr_ty, span);
    }

    let Some(merged) = convert::merge(&lty, &rty).filter(|m| m.as_builtin().is_some()) else {
        return fail(ctx, CompileError::IncompatibleOperands { span });
    };
    // Widen both operands in place to the merged type: rhs (top slot) first,
    // then lhs (the slot below it).
    gen_convert(ctx, &rty, &merged, span)?;
    ctx.pop_slot_into("%rbx");
    gen_convert_at_rsp(ctx, &lty, &merged, span)?;

    match op {
        InfixOp::Mul | InfixOp::Div | InfixOp::Mod => {
            ctx.pop_slot_into("%rax");
            let width = merged.as_builtin().expect("arith merge always yields a builtin").width();
            let signed = merged.as_builtin().expect("checked above").is_signed();
            match op {
                InfixOp::Mul => {
                    ctx.out.instr1(if signed { "imulq" } else { "mulq" }, "%rbx");
                }
                InfixOp::Div | InfixOp::Mod => {
                    if signed {
                        ctx.out.instr("cqto");
                        ctx.out.instr1("idivq", "%rbx");
                    } else {
                        ctx.out.instr2("xorq", "%rdx", "%rdx");
                        ctx.out.instr1("divq", "%rbx");
                    }
                    if matches!(op, InfixOp::Mod) {
                        if width == 1 {
                            ctx.out.instr2("movb", "%ah", "%al");
                        } else {
                            ctx.out.instr2("movq", "%rdx", "%rax");
                        }
                    }
                }
                _ => unreachable!(),
            }
            ctx.push_slot();
        }
        InfixOp::BitAnd | InfixOp::BitOr | InfixOp::BitXor => {
            ctx.pop_slot_into("%rax");
            let mnemonic = match op {
                InfixOp::BitAnd => "andq",
                InfixOp::BitOr => "orq",
                InfixOp::BitXor => "xorq",
                _ => unreachable!(),
            };
            ctx.out.instr2(mnemonic, "%rbx", "%rax");
            ctx.push_slot();
        }
        InfixOp::LShift | InfixOp::RShift => {
            // rhs went into %rbx above; the shift amount must be in %cl.
            ctx.out.instr2("movq", "%rbx", "%rcx");
            ctx.pop_slot_into("%rax");
            let signed = merged.as_builtin().expect("checked above").is_signed();
            let mnemonic = match (op, signed) {
                (InfixOp::LShift, _) => "shlq",
                (InfixOp::RShift, true) => "sarq",
                (InfixOp::RShift, false) => "shrq",
                _ => unreachable!(),
            };
            ctx.out.instr2(mnemonic, "%cl", "%rax");
            ctx.push_slot();
        }
        InfixOp::Add | InfixOp::Sub => {
            ctx.pop_slot_into("%rax");
            ctx.out.instr2(if op == InfixOp::Add { "addq" } else { "subq" }, "%rbx", "%rax");
            ctx.push_slot();
        }
        _ => unreachable!("logical/comparison/assign handled elsewhere"),
    }
    Ok(merged)
}

/// As [`gen_convert`] but converting the slot one below the current top
/// (used when rhs has already been popped into `%rbx` and lhs is still the
/// top-of-stack slot).
fn gen_convert_at_rsp(ctx: &mut CodegenContext<'_>, from: &Type, to: &Type, span: Span) -> Result<(), ()> {
    gen_convert(ctx, from, to, span)
}

fn gen_comparison(ctx: &mut CodegenContext<'_>, op: InfixOp, lhs: &Expr, rhs: &Expr, span: Span) -> GenResult {
    // `>`/`>=` are implemented by swapping operands and reusing `setl`/`setle`.
    let (lhs, rhs, op) = match op {
        InfixOp::Gt => (rhs, lhs, InfixOp::Lt),
        InfixOp::Ge => (rhs, lhs, InfixOp::Le),
        _ => (lhs, rhs, op),
    };
    let lty = gen_rvalue(ctx, lhs, None)?;
    let rty = gen_rvalue(ctx, rhs, None)?;
    let Some(merged) = convert::merge(&lty, &rty) else {
        return fail(ctx, CompileError::IncompatibleOperands { span });
    };
    gen_convert(ctx, &rty, &merged, span)?;
    ctx.pop_slot_into("%rbx");
    gen_convert(ctx, &lty, &merged, span)?;
    ctx.pop_slot_into("%rax");
    ctx.out.instr2("cmpq", "%rbx", "%rax");
    let set = match op {
        InfixOp::Eq => "sete",
        InfixOp::Ne => "setne",
        InfixOp::Lt => "setl",
        InfixOp::Le => "setle",
        _ => unreachable!(),
    };
    ctx.out.instr1(set, "%al");
    ctx.out.instr2("movzx", "%al", "%rax");
    ctx.push_slot();
    Ok(Type::Builtin(crate::hir::BuiltinKind::Bool))
}

fn gen_logical(ctx: &mut CodegenContext<'_>, op: InfixOp, lhs: &Expr, rhs: &Expr, span: Span) -> GenResult {
    let bool_ty = Type::Builtin(crate::hir::BuiltinKind::Bool);
    let lty = gen_rvalue(ctx, lhs, None)?;
    if lty != bool_ty {
        return fail(ctx, CompileError::IncompatibleOperands { span });
    }
    let rty = gen_rvalue(ctx, rhs, None)?;
    if rty != bool_ty {
        return fail(ctx, CompileError::IncompatibleOperands { span });
    }
    ctx.pop_slot_into("%rbx");
    ctx.pop_slot_into("%rax");
    ctx.out.instr2(if op == InfixOp::Or { "orb" } else { "andb" }, "%bl", "%al");
    ctx.out.instr2("movzx", "%al", "%rax");
    ctx.push_slot();
    Ok(bool_ty)
}

fn gen_assign(ctx: &mut CodegenContext<'_>, lhs: &Expr, rhs: &Expr, span: Span) -> GenResult {
    let lty = gen_lvalue(ctx, lhs)?;
    let rty = gen_rvalue(ctx, rhs, Some(&lty))?;
    if fat(ctx, &lty) {
        // rhs is already an address (identical-struct / decayed-array
        // assignment is not legal here, so rhs must itself be the same
        // fat type); byte-copy it into the lvalue's storage.
        if convert::implicit_conversion(&rty, &lty).is_none() {
            return fail(ctx, CompileError::ImplicitConversionFailed { span });
        }
        ctx.pop_slot_into("%rbx"); // src address
        ctx.pop_slot_into("%rax"); // dst address
        let size = layout::size_of(&lty, ctx.structs, span).map_err(|e| fail_noop(ctx, e))?;
        emit_memcpy(ctx, size);
        // dst address already in %rax
        ctx.push_slot();
    } else {
        gen_convert(ctx, &rty, &lty, span)?;
        ctx.pop_slot_into("%rbx"); // value
        ctx.pop_slot_into("%rax"); // address
        store_sized(ctx, &lty, "%rbx", "%rax", 0);
        ctx.push_slot();
    }
    Ok(lty)
}

fn store_sized(ctx: &mut CodegenContext<'_>, ty: &Type, value_reg: &str, addr_reg: &str, offset: u64) {
    let width = match ty {
        Type::Builtin(b) => b.width(),
        Type::Pointer(_) | Type::Name(_) => 8,
        Type::Array(..) => unreachable!("fat types use the byte-copy path"),
    };
    let mnemonic = match width {
        1 => "movb",
        2 => "movw",
        4 => "movl",
        _ => "movq",
    };
    let dst = if offset == 0 { format!("({addr_reg})") } else { format!("{offset}({addr_reg})") };
    ctx.out.instr2(mnemonic, &reg_of_width(value_reg, width), &dst);
}

/// Greedy 8/4/2/1-byte byte-copy loop from `%rbx` (src) to `%rax` (dst),
/// `size` bytes, per `spec.md` §4.6 "Assignment".
pub(crate) fn emit_memcpy(ctx: &mut CodegenContext<'_>, size: u64) {
    let mut offset = 0u64;
    let mut remaining = size;
    for (width, suffix) in [(8u64, "q"), (4, "l"), (2, "w"), (1, "b")] {
        while remaining >= width {
            let reg = reg_of_width("%rcx", width);
            ctx.out.instr2(&format!("mov{suffix}"), &format!("{offset}(%rbx)"), &reg);
            ctx.out.instr2(&format!("mov{suffix}"), &reg, &format!("{offset}(%rax)"));
            offset += width;
            remaining -= width;
        }
    }
}

fn gen_index(ctx: &mut CodegenContext<'_>, base: &Expr, index: &Expr, span: Span) -> GenResult {
    let base_ty = gen_rvalue(ctx, base, None)?;
    let elem_ty = match &base_ty {
        Type::Array(of, _) => (**of).clone(),
        Type::Pointer(of) => (**of).clone(),
        _ => return fail(ctx, CompileError::IncompatibleOperands { span }),
    };
    let idx_ty = gen_rvalue(ctx, index, None)?;
    let usize_ty = Type::Builtin(crate::hir::BuiltinKind::USize);
    gen_convert(ctx, &idx_ty, &usize_ty, span)?;
    ctx.pop_slot_into("%rbx"); // index
    ctx.pop_slot_into("%rax"); // base address (array) or pointer value
    let elem_size = layout::size_of(&elem_ty, ctx.structs, span).map_err(|e| fail_noop(ctx, e))?;
    ctx.out.instr2("movq", "%rax", "%r11"); // stash base address; mulq clobbers %rax/%rdx
    ctx.out.instr2("movq", "%rbx", "%rax"); // index
    ctx.out.instr2("movq", &format!("${elem_size}"), "%rcx");
    ctx.out.instr1("mulq", "%rcx"); // rdx:rax = index * elem_size; result (offset) low in %rax
    ctx.out.instr2("addq", "%r11", "%rax"); // rax = base address + offset
    ctx.push_slot();
    Ok(elem_ty)
}

fn gen_access(ctx: &mut CodegenContext<'_>, base: &Expr, field: crate::symbol::Symbol, span: Span) -> GenResult {
    let base_ty = gen_rvalue(ctx, base, None)?;
    let struct_name = match &base_ty {
        Type::Name(n) => *n,
        Type::Pointer(inner) => match inner.as_ref() {
            Type::Name(n) => *n,
            _ => return fail(ctx, CompileError::InvalidAccess { span }),
        },
        _ => return fail(ctx, CompileError::InvalidAccess { span }),
    };
    if !ctx.structs.exists(struct_name) {
        return fail(ctx, CompileError::UnknownStruct { name: ctx.interner.resolve(struct_name).to_string(), span });
    }
    crate::layout::compute_struct_layout(struct_name, ctx.structs, span, &mut hashbrown::HashSet::new())
        .map_err(|e| fail_noop(ctx, e))?;
    let Some(field_entry) = ctx.structs.query(struct_name).field(field).cloned() else {
        return fail(ctx, CompileError::UnknownField {
            struct_name: ctx.interner.resolve(struct_name).to_string(),
            field: ctx.interner.resolve(field).to_string(),
            span,
        });
    };
    ctx.pop_slot_into("%rax");
    ctx.out.instr2("addq", &format!("${}", field_entry.offset), "%rax");
    ctx.push_slot();
    Ok(field_entry.ty)
}

fn gen_cast(ctx: &mut CodegenContext<'_>, sub: &Expr, target: &Type, span: Span) -> GenResult {
    let from = gen_rvalue(ctx, sub, Some(target))?;
    if let Some(kind) = convert::implicit_conversion(&from, target) {
        match kind {
            ConversionKind::NoOp | ConversionKind::ArrayDecay => {}
            ConversionKind::SignExtend { from_width, to_width } => {
                ctx.out.instr2("movq", "(%rsp)", "%rax");
                emit_sext(ctx, from_width, to_width);
                ctx.out.instr2("movq", "%rax", "(%rsp)");
            }
            ConversionKind::ZeroExtend { from_width, to_width } => {
                ctx.out.instr2("movq", "(%rsp)", "%rax");
                emit_zext(ctx, from_width, to_width);
                ctx.out.instr2("movq", "%rax", "(%rsp)");
            }
        }
        return Ok(target.clone());
    }
    // Not an implicit conversion: an explicit cast additionally allows a
    // forced reinterpretation between integer builtins (including
    // narrowing, which implicit conversion forbids) and between any two
    // pointer types, since the user asked for it explicitly.
    match (&from, target) {
        (Type::Builtin(fb), Type::Builtin(tb)) if fb.is_integer() && tb.is_integer() => {
            ctx.out.instr2("movq", "(%rsp)", "%rax");
            let tw = tb.width();
            if tw < 8 {
                ctx.out.instr2("andq", &format!("${}", (1u64 << (tw * 8)) - 1), "%rax");
            }
            ctx.out.instr2("movq", "%rax", "(%rsp)");
            Ok(target.clone())
        }
        (Type::Pointer(_), Type::Pointer(_)) => Ok(target.clone()),
        _ => fail(ctx, CompileError::BadCast { span }),
    }
}

/// Caller-side call-argument marshalling and emission. See `spec.md` §4.6
/// "Call".
fn gen_call(ctx: &mut CodegenContext<'_>, callee: &Expr, args: &[Expr], span: Span) -> GenResult {
    let ExprKind::Variable(name) = &callee.kind else {
        return fail(ctx, CompileError::NotCallable { name: String::new(), span });
    };
    if !ctx.funcs.exists(*name) {
        return fail(ctx, CompileError::NotCallable { name: ctx.interner.resolve(*name).to_string(), span });
    }
    let info = ctx.funcs.get(*name).expect("checked above").clone();
    if !info.variadic && args.len() != info.params.len() {
        return fail(ctx, CompileError::WrongArgumentCount { expected: info.params.len(), found: args.len(), span });
    }

    let ret_is_large = !info.ret_type.is_void()
        && layout::is_fat(&info.ret_type, ctx.enums)
        && layout::size_of(&info.ret_type, ctx.structs, span).unwrap_or(0) > 8;

    // Reserve the caller-allocated return slot first, if needed, so %rdi
    // can be loaded with its address right before the call.
    let ret_slot_size = if ret_is_large {
        layout::size_of(&info.ret_type, ctx.structs, span).map_err(|e| fail_noop(ctx, e))?
    } else {
        0
    };
    // `ret_slot_mark` is `callee_size` immediately after reserving the
    // return slot; by the time the call is emitted, `%rsp` has grown by
    // `callee_size - ret_slot_mark` more (argument temporaries), so the
    // slot's base is at that many bytes above the then-current `%rsp`.
    let ret_slot_mark = if ret_is_large {
        ctx.alloc_fat(ret_slot_size, 16);
        ctx.callee_size
    } else {
        0
    };

    let reg_capacity = if ret_is_large { 5 } else { 6 };

    for (i, arg) in args.iter().enumerate() {
        let expected = info.params.get(i).map(|(_, t)| t.clone());
        let ty = gen_rvalue(ctx, arg, expected.as_ref())?;
        if let Some(expected) = &expected {
            gen_convert(ctx, &ty, expected, span)?;
        }
        if i < reg_capacity {
            ctx.pop_slot_into(crate::codegen::context::ARG_REGS[if ret_is_large { i + 1 } else { i }]);
        }
        // Arguments beyond `reg_capacity` are left on the stack, forming
        // the argument block in left-to-right push order (`spec.md` §4.6
        // "Call": "onto an 'argument block' allocated ... immediately below
        // the current frame extension").
    }

    if ret_is_large {
        let delta = ctx.callee_size - ret_slot_mark;
        ctx.out.instr2("leaq", &format!("{delta}(%rsp)"), "%rdi");
    }
    ctx.out.instr2("xorq", "%rax", "%rax"); // %al = 0: no variadic float args
    let call_target = ctx.interner.resolve(*name);
    if info.is_extern {
        ctx.out.instr1("callq", &format!("{call_target}@PLT"));
    } else {
        ctx.out.instr1("callq", call_target);
    }
    ctx.out.instr1("pushq", "%rax");
    ctx.callee_size += 8;
    Ok(info.ret_type)
}

fn gen_struct_literal(ctx: &mut CodegenContext<'_>, name: crate::symbol::Symbol, inits: &[crate::hir::StructInit], span: Span) -> GenResult {
    if !ctx.structs.exists(name) {
        return fail(ctx, CompileError::UnknownStruct { name: ctx.interner.resolve(name).to_string(), span });
    }
    let (size, align) = layout::compute_struct_layout(name, ctx.structs, span, &mut hashbrown::HashSet::new())
        .map_err(|e| {
            fail_noop(ctx, e);
        })?;
    ctx.alloc_fat(size, align);
    ctx.out.instr2("movq", "%rsp", "%r12"); // stash the base address across field evaluation
    for init in inits {
        let Some(field) = ctx.structs.query(name).field(init.name).cloned() else {
            return fail(ctx, CompileError::UnknownField {
                struct_name: ctx.interner.resolve(name).to_string(),
                field: ctx.interner.resolve(init.name).to_string(),
                span,
            });
        };
        let vty = gen_rvalue(ctx, &init.value, Some(&field.ty))?;
        gen_convert(ctx, &vty, &field.ty, span)?;
        if fat(ctx, &field.ty) {
            ctx.pop_slot_into("%rbx");
            ctx.out.instr2("leaq", &format!("{}(%r12)", field.offset), "%rax");
            let fsize = layout::size_of(&field.ty, ctx.structs, span).map_err(|e| fail_noop(ctx, e))?;
            emit_memcpy(ctx, fsize);
        } else {
            ctx.pop_slot_into("%rbx");
            store_sized(ctx, &field.ty, "%rbx", "%r12", field.offset);
        }
    }
    ctx.out.instr2("movq", "%r12", "%rax");
    ctx.push_slot();
    Ok(Type::Name(name))
}

fn gen_array_literal(ctx: &mut CodegenContext<'_>, elems: &[Expr], hint: Option<&Type>, span: Span) -> GenResult {
    let elem_ty = match hint {
        Some(Type::Array(of, _)) => (**of).clone(),
        // No hint: infer the element type from the first element without
        // actually emitting or executing it — it is evaluated for real
        // below, in the loop over `elems`.
        _ if !elems.is_empty() => ctx.speculative(|ctx| gen_rvalue(ctx, &elems[0], None))?,
        _ => return fail(ctx, CompileError::NotAConstant { span }),
    };
    let elem_size = layout::size_of(&elem_ty, ctx.structs, span).map_err(|e| fail_noop(ctx, e))?;
    let elem_align = layout::align_of(&elem_ty, ctx.structs, span).map_err(|e| fail_noop(ctx, e))?;
    let total = elem_size * elems.len() as u64;
    ctx.alloc_fat(total, elem_align.max(1));
    ctx.out.instr2("movq", "%rsp", "%r12");
    for (i, elem) in elems.iter().enumerate() {
        let vty = gen_rvalue(ctx, elem, Some(&elem_ty))?;
        gen_convert(ctx, &vty, &elem_ty, span)?;
        let offset = elem_size * i as u64;
        if fat(ctx, &elem_ty) {
            ctx.pop_slot_into("%rbx");
            ctx.out.instr2("leaq", &format!("{offset}(%r12)"), "%rax");
            emit_memcpy(ctx, elem_size);
        } else {
            ctx.pop_slot_into("%rbx");
            store_sized(ctx, &elem_ty, "%rbx", "%r12", offset);
        }
    }
    ctx.out.instr2("movq", "%r12", "%rax");
    ctx.push_slot();
    Ok(Type::Array(Box::new(elem_ty), elems.len() as u64))
}
