//! Function prologue/epilogue and whole-program assembly assembly. See
//! `spec.md` §4.6 "Function body" and §6.3 "Emitted assembly", the direct
//! counterpart of `original_source/src/codegen/decl.cc`.

use crate::codegen::context::{arg_reg_width, CodegenContext};
use crate::codegen::stmt::gen_stmt;
use crate::diagnostics::{Diagnostic, Reporter};
use crate::hir::{self, Function};
use crate::layout;
use crate::symbol::Interner;
use crate::tables::{EnumTable, FuncInfoTable, StringTable, StructTable};

/// Number of integer argument registers a non-hidden-pointer parameter list
/// may use before spilling the rest to the incoming stack argument block.
const INT_ARG_REGS: usize = 6;

/// Generates one function's assembly, or `None` for an extern declaration
/// (`spec.md` §3.3: "A function with no body represents an extern
/// (imported) function" — nothing to emit, the call site references the
/// symbol directly via `@PLT`).
pub fn gen_function(
    func: &Function,
    structs: &mut StructTable,
    enums: &EnumTable,
    funcs: &FuncInfoTable,
    strings: &StringTable,
    interner: &Interner,
    reporter: &mut Reporter,
) -> Option<String> {
    let body = func.body.as_ref()?;
    let name = interner.resolve(func.name).to_string();
    let mut ctx = CodegenContext::new(name.clone(), structs, enums, funcs, strings, interner, reporter);

    let ret_is_large = !func.ret.is_void()
        && layout::is_fat(&func.ret, ctx.enums)
        && layout::size_of(&func.ret, ctx.structs, func.span).unwrap_or(0) > 8;

    if ret_is_large {
        let offset = ctx.lvars.reserve(8, 8);
        ctx.return_slot_offset = Some(offset);
    }

    // Every incoming parameter gets a stack slot too: there is no register
    // allocator (`spec.md` §1 Non-goals), so a parameter referenced by name
    // in the body is read back out of memory exactly like a local.
    for param in &func.params {
        let size = layout::size_of(&param.ty, ctx.structs, func.span).unwrap_or(8);
        let align = layout::align_of(&param.ty, ctx.structs, func.span).unwrap_or(8);
        let offset = ctx.lvars.reserve(size, align);
        ctx.lvars.insert(param.name, offset, param.ty.clone());
    }

    // Construct the local-variable table by walking hoisted `decls` in
    // order, aligning each to its type's alignment and accumulating the
    // offset (`spec.md` §4.6 "Function body").
    for decl in &func.decls {
        let size = layout::size_of(&decl.ty, ctx.structs, decl.span).unwrap_or(8);
        let align = layout::align_of(&decl.ty, ctx.structs, decl.span).unwrap_or(8);
        let offset = ctx.lvars.reserve(size, align);
        ctx.lvars.insert(decl.name, offset, decl.ty.clone());
    }

    let frame_size = layout::round_up(ctx.lvars.size(), 16);

    ctx.out.directive(".text");
    ctx.out.directive(&format!(".type {name}, @function"));
    ctx.out.directive(&format!(".global {name}"));
    ctx.out.label(&name);
    ctx.out.instr1("pushq", "%rbp");
    ctx.out.instr2("movq", "%rsp", "%rbp");
    if frame_size > 0 {
        ctx.out.instr2("subq", &format!("${frame_size}"), "%rsp");
    }

    // Spill the incoming hidden return pointer and every register/stack
    // argument into its slot. A large return shifts every integer parameter
    // one register to the right, since `%rdi` carries the hidden pointer.
    if ret_is_large {
        let slot = ctx.return_slot_offset.expect("just set above");
        ctx.out.instr2("movq", "%rdi", &format!("-{slot}(%rbp)"));
    }
    let reg_base: usize = if ret_is_large { 1 } else { 0 };
    for (i, param) in func.params.iter().enumerate() {
        let reg_index = i + reg_base;
        let dst = ctx.local_addr(param.name);
        let is_fat = layout::is_fat(&param.ty, ctx.enums);
        // A fat parameter's slot holds its bytes directly, matching how
        // `Variable` reads it back (`leaq local_addr, %rax`). The caller
        // passed only the address of its own copy (`spec.md`'s "aggregates
        // by reference"), so the prologue must byte-copy in, not just store
        // the incoming pointer.
        if reg_index < INT_ARG_REGS {
            if is_fat {
                ctx.out.instr2("movq", arg_reg_width(reg_index, 8), "%rbx");
                ctx.out.instr2("leaq", &dst, "%rax");
                let size = layout::size_of(&param.ty, ctx.structs, func.span).unwrap_or(0);
                crate::codegen::expr::emit_memcpy(&mut ctx, size);
            } else {
                let width = layout::size_of(&param.ty, ctx.structs, func.span).unwrap_or(8).min(8);
                ctx.out.instr2("movq", arg_reg_width(reg_index, width.max(1)), &dst);
            }
        } else {
            // Beyond the register window, the caller pushed this argument
            // into the stack argument block; from the callee's frame it
            // sits above the return address at `16 + 8*j(%rbp)`.
            let j = reg_index - INT_ARG_REGS;
            let src = format!("{}(%rbp)", 16 + 8 * j);
            if is_fat {
                ctx.out.instr2("movq", &src, "%rbx");
                ctx.out.instr2("leaq", &dst, "%rax");
                let size = layout::size_of(&param.ty, ctx.structs, func.span).unwrap_or(0);
                crate::codegen::expr::emit_memcpy(&mut ctx, size);
            } else {
                ctx.out.instr2("movq", &src, "%rax");
                ctx.out.instr2("movq", "%rax", &dst);
            }
        }
    }

    for stmt in body {
        // A statement-level failure is recorded on the reporter but does not
        // stop later statements from being attempted (`spec.md` §7
        // "Recovery granularity").
        let _ = gen_stmt(&mut ctx, stmt, &func.ret);
    }

    ctx.out.label(&ctx.end_label());
    ctx.out.instr2("movq", "%rbp", "%rsp");
    ctx.out.instr1("popq", "%rbp");
    ctx.out.instr("retq");
    ctx.out.blank();

    Some(ctx.out.finish())
}

/// Emits `.rodata` entries for every interned string literal, as raw
/// `.byte` sequences under the literal's unique label (`spec.md` §6.3:
/// "Interned strings are emitted under unique labels in a read-only
/// section").
fn emit_string_table(strings: &StringTable, interner: &Interner, out: &mut crate::codegen::asm::AsmWriter) {
    if strings.entries().is_empty() {
        return;
    }
    out.directive(".section .rodata");
    for (sym, bytes) in strings.entries() {
        out.label(interner.resolve(*sym));
        let mut literal = bytes.clone();
        literal.push(0); // NUL-terminate, per the source language's C-style strings.
        let joined = literal.iter().map(|b| b.to_string()).collect::<Vec<_>>().join(", ");
        out.directive(&format!(".byte {joined}"));
    }
    out.blank();
}

/// Assembles a whole lowered program into one GAS source text: every
/// function's code, followed by the interned string table. Structs and
/// enums contribute only to the type/layout tables consulted during
/// function codegen — they emit no assembly of their own.
pub fn emit_program(
    program: &hir::Program,
    structs: &mut StructTable,
    enums: &EnumTable,
    funcs: &FuncInfoTable,
    strings: &StringTable,
    interner: &Interner,
    reporter: &mut Reporter,
) -> String {
    let mut text = String::new();
    for decl in &program.decls {
        if let hir::Decl::Function(f) = decl {
            if let Some(asm) = gen_function(f, structs, enums, funcs, strings, interner, reporter) {
                text.push_str(&asm);
            }
        }
    }
    let mut trailer = crate::codegen::asm::AsmWriter::new();
    emit_string_table(strings, interner, &mut trailer);
    text.push_str(&trailer.finish());
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::{BuiltinKind, Type};
    use crate::span::{FileId, Pos, Span};

    fn span() -> Span {
        Span::new(FileId(0), Pos::new(0, 0), Pos::new(0, 0))
    }

    #[test]
    fn identity_function_spills_param_and_returns_it() {
        let mut interner = Interner::new();
        let name = interner.intern("identity");
        let x = interner.intern("x_0");
        let mut structs = StructTable::new();
        let enums = EnumTable::new();
        let funcs = FuncInfoTable::new();
        let strings = StringTable::new();
        let mut reporter = Reporter::new();

        let func = Function {
            name,
            params: vec![hir::Param { name: x, ty: Type::Builtin(BuiltinKind::Int32) }],
            ret: Type::Builtin(BuiltinKind::Int32),
            decls: vec![],
            body: Some(vec![hir::Stmt::Return(
                Some(hir::Expr::new(hir::ExprKind::Variable(x), span())),
                span(),
            )]),
            span: span(),
        };

        let asm = gen_function(&func, &mut structs, &enums, &funcs, &strings, &interner, &mut reporter)
            .expect("function with a body emits code");
        assert!(!reporter.has_errors());
        assert!(asm.contains("identity:"));
        assert!(asm.contains("pushq %rbp"));
        assert!(asm.contains("identity.END:"));
        assert!(asm.contains("retq"));
    }

    #[test]
    fn extern_function_emits_nothing() {
        let mut interner = Interner::new();
        let name = interner.intern("puts");
        let mut structs = StructTable::new();
        let enums = EnumTable::new();
        let funcs = FuncInfoTable::new();
        let strings = StringTable::new();
        let mut reporter = Reporter::new();

        let func = Function {
            name,
            params: vec![],
            ret: Type::Builtin(BuiltinKind::Int32),
            decls: vec![],
            body: None,
            span: span(),
        };

        assert!(gen_function(&func, &mut structs, &enums, &funcs, &strings, &interner, &mut reporter).is_none());
    }
}
