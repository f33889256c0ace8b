//! Mutable state threaded through code generation. See `spec.md`'s Design
//! Note: "the `callee_size` counter, label id generator, per-function
//! tables, output suppression flag for speculative evaluation, current-loop
//! label stack consolidates into a single `CodegenContext` passed by
//! mutable reference", ported from `original_source/src/codegen/context.h`.

use crate::codegen::asm::AsmWriter;
use crate::diagnostics::{Diagnostic, Reporter};
use crate::error::CompileError;
use crate::span::Span;
use crate::symbol::Interner;
use crate::tables::{EnumTable, FuncInfoTable, LVarTable, StringTable, StructTable};

/// The System V integer argument registers, in passing order.
pub const ARG_REGS: [&str; 6] = ["%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9"];

/// Width-appropriate sub-register name for one of the six argument
/// registers, used when a ≤8-byte argument narrower than a quadword is
/// moved directly rather than through the stack.
#[must_use]
pub fn arg_reg_width(index: usize, width: u64) -> &'static str {
    const W8: [&str; 6] = ["%dil", "%sil", "%dl", "%cl", "%r8b", "%r9b"];
    const W16: [&str; 6] = ["%di", "%si", "%dx", "%cx", "%r8w", "%r9w"];
    const W32: [&str; 6] = ["%edi", "%esi", "%edx", "%ecx", "%r8d", "%r9d"];
    const W64: [&str; 6] = ["%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9"];
    match width {
        1 => W8[index],
        2 => W16[index],
        4 => W32[index],
        _ => W64[index],
    }
}

/// A monotonic per-function counter minting unique label ids, per
/// `spec.md` §4.6 "Label allocation".
#[derive(Debug, Default)]
pub struct LabelIdGenerator {
    next: u32,
}

impl LabelIdGenerator {
    #[must_use]
    pub fn new() -> Self {
        LabelIdGenerator::default()
    }

    pub fn next(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Everything one function's code generation needs: the growing assembly
/// buffer, the local-variable table, read access to the whole-program
/// symbol tables, and the bookkeeping described in `spec.md` §4.6.
pub struct CodegenContext<'a> {
    pub out: AsmWriter,
    pub lvars: LVarTable,
    pub structs: &'a mut StructTable,
    pub enums: &'a EnumTable,
    pub funcs: &'a FuncInfoTable,
    pub strings: &'a StringTable,
    pub interner: &'a Interner,
    pub reporter: &'a mut Reporter,
    /// Bytes of stack currently pushed for temporaries beyond the fixed
    /// frame. Checkpointed and restored around subexpression evaluation so
    /// a failed or completed subexpression's scratch space is freed.
    pub callee_size: u64,
    pub labels: LabelIdGenerator,
    /// Stack of `(start_label_id, end_label_id)` for nested loops, so
    /// `break`/`continue` can target the innermost enclosing loop and a
    /// reference outside any loop can be diagnosed.
    loop_stack: Vec<(u32, u32)>,
    pub func_name: String,
    /// `-offset(%rbp)` for the hidden return-aggregate pointer, if this
    /// function returns a >8-byte value.
    pub return_slot_offset: Option<u64>,
}

impl<'a> CodegenContext<'a> {
    #[must_use]
    pub fn new(
        func_name: String,
        structs: &'a mut StructTable,
        enums: &'a EnumTable,
        funcs: &'a FuncInfoTable,
        strings: &'a StringTable,
        interner: &'a Interner,
        reporter: &'a mut Reporter,
    ) -> Self {
        CodegenContext {
            out: AsmWriter::new(),
            lvars: LVarTable::new(),
            structs,
            enums,
            funcs,
            strings,
            interner,
            reporter,
            callee_size: 0,
            labels: LabelIdGenerator::new(),
            loop_stack: Vec::new(),
            func_name,
            return_slot_offset: None,
        }
    }

    /// A unique assembly label for this function, e.g. `<name>.L3`.
    #[must_use]
    pub fn label_name(&self, id: u32) -> String {
        format!("{}.L{}", self.func_name, id)
    }

    #[must_use]
    pub fn end_label(&self) -> String {
        format!("{}.END", self.func_name)
    }

    pub fn push_loop(&mut self, start: u32, end: u32) {
        self.loop_stack.push((start, end));
    }

    pub fn pop_loop(&mut self) {
        self.loop_stack.pop();
    }

    /// Looks up the innermost enclosing loop's labels, reporting
    /// `LoopControlOutsideLoop` (and returning `None`) if `break`/`continue`
    /// was used outside any loop.
    pub fn current_loop(&mut self, span: Span) -> Option<(u32, u32)> {
        if let Some(&top) = self.loop_stack.last() {
            Some(top)
        } else {
            self.reporter.push(Diagnostic::from(CompileError::LoopControlOutsideLoop { span }));
            None
        }
    }

    /// Allocates `size` (rounded up to `align`) bytes of temporary stack
    /// space and returns the new `callee_size`-relative top offset.
    pub fn grow_callee(&mut self, size: u64, align: u64) -> u64 {
        if align > 1 {
            self.callee_size = crate::layout::round_up(self.callee_size, align);
        }
        self.callee_size += size;
        self.callee_size
    }

    /// Runs `f`, then restores `callee_size` to its value before the call —
    /// freeing any subexpression temporaries `f` pushed, whether or not it
    /// produced a usable result. Mirrors [`Reporter::suppressed`]'s
    /// save/restore shape but for stack accounting instead of diagnostics.
    /// Per `spec.md` §5: "a single `addq` to pop the temporaries."
    pub fn checkpoint<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = self.callee_size;
        let result = f(self);
        if self.callee_size > saved {
            self.out.instr2("addq", &format!("${}", self.callee_size - saved), "%rsp");
        }
        self.callee_size = saved;
        result
    }

    /// Runs `f` purely to read off its result (e.g. an inferred type) with
    /// *no* assembly emitted, no diagnostics recorded, and the
    /// stack-accounting effect fully reverted afterward — the "speculative
    /// evaluation" Design Note's "suppression counter on the output writer
    /// and a save/restore pair on the codegen context", used where a
    /// sub-evaluation must not have runtime side effects (`ESizeof`'s
    /// operand is never actually executed).
    pub fn speculative<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved_callee = self.callee_size;
        let was_suppressed = self.out.is_suppressed();
        self.out.set_suppress(true);
        let result = self.reporter_suppressed(f);
        self.out.set_suppress(was_suppressed);
        self.callee_size = saved_callee;
        result
    }

    fn reporter_suppressed<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.reporter.bump_suppress();
        let result = f(self);
        self.reporter.unbump_suppress();
        result
    }

    /// Pushes one 8-byte evaluation-stack slot holding `%rax` — the uniform
    /// per-expression-value representation from `spec.md` §4.6 ("Every
    /// evaluated value occupies at least 8 bytes of stack in rvalue mode").
    pub fn push_slot(&mut self) {
        self.out.instr1("pushq", "%rax");
        self.callee_size += 8;
    }

    /// Pops the top 8-byte slot into `reg`.
    pub fn pop_slot_into(&mut self, reg: &str) {
        self.out.instr1("popq", reg);
        self.callee_size -= 8;
    }

    /// Reserves `size` bytes (rounded up to `align`) of scratch storage
    /// below the current stack top for a materialized fat object, per the
    /// glossary's "Fat object": "storage allocated elsewhere in the frame."
    /// Leaves `%rsp` pointing at the start of the reserved region; the
    /// caller is expected to `movq %rsp, %rax` and [`push_slot`] to record
    /// that address as the expression's 8-byte evaluation-stack slot.
    pub fn alloc_fat(&mut self, size: u64, align: u64) -> u64 {
        let aligned = crate::layout::round_up(size.max(1), align.max(1));
        self.out.instr2("subq", &format!("${aligned}"), "%rsp");
        self.callee_size += aligned;
        aligned
    }

    /// The `-offset(%rbp)` operand referring to a local/parameter's slot.
    #[must_use]
    pub fn local_addr(&self, name: crate::symbol::Symbol) -> String {
        format!("-{}(%rbp)", self.lvars.offset(name))
    }
}
