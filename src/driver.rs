//! CLI glue: reads a source file, runs the pipeline, renders diagnostics,
//! and emits assembly/object/executable/HIR-pretty-print output. See
//! `SPEC_FULL.md` §6.1. The parser itself is out of core scope (`spec.md`
//! §1), so this module depends only on the [`Parser`] trait contract; a real
//! frontend can be plugged in by implementing it.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use clap::Parser as ClapDerive;

use crate::ast;
use crate::codegen;
use crate::diagnostics::{Diagnostic, Reporter};
use crate::hir::{self, lower::LowerCtx};
use crate::semantic;
use crate::span::{FileId, SourceCache};
use crate::symbol::Interner;
use crate::tables::{EnumTable, FuncInfoTable, StringTable, StructTable};

/// The contract a frontend must satisfy to feed this pipeline (`spec.md`
/// §1/§4.7: "a contract producing AST nodes"). There is no lexer/parser in
/// this crate; [`NullParser`] exists so the driver's plumbing compiles and
/// is exercisable without one.
pub trait Parser {
    fn parse(&self, src: &str, file: FileId) -> Result<Vec<ast::Decl>, Vec<Diagnostic>>;
}

/// A stand-in frontend that always fails, since this crate ships no
/// lexer/parser. Real frontends implement [`Parser`] and are passed to
/// [`run`] in its place.
pub struct NullParser;

impl Parser for NullParser {
    fn parse(&self, _src: &str, file: FileId) -> Result<Vec<ast::Decl>, Vec<Diagnostic>> {
        Err(vec![Diagnostic::error(
            crate::span::Span::synthetic(file),
            "no parser frontend is wired into this build of `mini`",
        )])
    }
}

/// What `-c`/`-S`/`--emit-hir` (or none of them) select, per `spec.md` §6.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitKind {
    Assembly,
    Object,
    Hir,
    Executable,
}

/// `mini <input> [-o <output>] [-c] [-S] [--emit-hir]`, per `spec.md` §6.1.
/// At most one of `-c`/`-S`/`--emit-hir` may be given; `clap`'s `ArgGroup`
/// enforces that rather than hand-rolled validation after parsing.
#[derive(Debug, ClapDerive)]
#[command(name = "mini", about = "A whole-program compiler for a small statically typed systems language")]
pub struct Cli {
    /// Source file to compile.
    pub input: PathBuf,

    /// Output path; defaults depend on the selected emit kind.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Emit a relocatable object file instead of linking an executable.
    #[arg(short = 'c', group = "emit")]
    pub object: bool,

    /// Emit GAS assembly text instead of linking an executable.
    #[arg(short = 'S', group = "emit")]
    pub assembly: bool,

    /// Emit a pretty-printed HIR dump instead of linking an executable.
    #[arg(long = "emit-hir", group = "emit")]
    pub emit_hir: bool,
}

impl Cli {
    #[must_use]
    pub fn emit_kind(&self) -> EmitKind {
        if self.object {
            EmitKind::Object
        } else if self.assembly {
            EmitKind::Assembly
        } else if self.emit_hir {
            EmitKind::Hir
        } else {
            EmitKind::Executable
        }
    }

    /// The default output path for the selected emit kind, used when `-o`
    /// is absent.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        if let Some(out) = &self.output {
            return out.clone();
        }
        match self.emit_kind() {
            EmitKind::Executable => PathBuf::from("a.out"),
            EmitKind::Object => self.input.with_extension("o"),
            EmitKind::Assembly => self.input.with_extension("s"),
            EmitKind::Hir => self.input.with_extension("hir"),
        }
    }
}

/// Pretty-prints a lowered program's shape: one line per function naming
/// its hoisted locals, for `--emit-hir` output and the round-trip property
/// in `spec.md` §8.
#[must_use]
pub fn pretty_print_hir(program: &hir::Program, interner: &Interner) -> String {
    let mut out = String::new();
    for decl in &program.decls {
        match decl {
            hir::Decl::Function(f) => {
                out.push_str(&format!("function {}(", interner.resolve(f.name)));
                for (i, p) in f.params.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(interner.resolve(p.name));
                }
                out.push_str(") {\n");
                for d in &f.decls {
                    out.push_str(&format!("  let {};\n", interner.resolve(d.name)));
                }
                if f.is_extern() {
                    out.push_str("  <extern>\n");
                }
                out.push_str("}\n");
            }
            hir::Decl::Struct(s) => {
                out.push_str(&format!("struct {} {{ .. }}\n", interner.resolve(s.name)));
            }
            hir::Decl::Enum(e) => {
                out.push_str(&format!("enum {} {{ .. }}\n", interner.resolve(e.name)));
            }
        }
    }
    out
}

fn invoke(program: &str, args: &[&std::ffi::OsStr]) -> std::io::Result<()> {
    let status = Command::new(program).args(args).status()?;
    if !status.success() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("{program} exited with {status}"),
        ));
    }
    Ok(())
}

/// Assembles `asm` (via `as`) and, for an executable, links the result
/// (via `ld` with the System V dynamic linker) into `output`, using
/// temporary files for the intermediate `.s`/`.o` artifacts (`spec.md`
/// §4.7 "Assembler/linker").
fn assemble_and_link(asm: &str, emit: EmitKind, output: &Path) -> std::io::Result<()> {
    let mut asm_file = tempfile::Builder::new().suffix(".s").tempfile()?;
    asm_file.write_all(asm.as_bytes())?;
    let asm_path = asm_file.into_temp_path();

    if emit == EmitKind::Object {
        invoke("as", &[asm_path.as_os_str(), std::ffi::OsStr::new("-o"), output.as_os_str()])?;
        return Ok(());
    }

    let obj_file = tempfile::Builder::new().suffix(".o").tempfile()?;
    let obj_path = obj_file.into_temp_path();
    invoke("as", &[asm_path.as_os_str(), std::ffi::OsStr::new("-o"), obj_path.as_os_str()])?;
    invoke(
        "ld",
        &[
            std::ffi::OsStr::new("-dynamic-linker"),
            std::ffi::OsStr::new("/lib64/ld-linux-x86-64.so.2"),
            std::ffi::OsStr::new("-o"),
            output.as_os_str(),
            obj_path.as_os_str(),
            std::ffi::OsStr::new("-lc"),
        ],
    )
}

/// Runs the whole pipeline for `cli`, rendering diagnostics and writing
/// output per the selected `EmitKind`. Returns the process exit code: `0`
/// unless any `Error`-level diagnostic was emitted (`spec.md` §7
/// "Propagation"), regardless of whether partial output was still written.
pub fn run(cli: &Cli, parser: &dyn Parser) -> i32 {
    let text = match std::fs::read_to_string(&cli.input) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("mini: cannot read {}: {e}", cli.input.display());
            return 1;
        }
    };

    let mut cache = SourceCache::new();
    let file = cache.add(&cli.input, text.clone());
    let mut reporter = Reporter::new();

    log::debug!("parsing {}", cli.input.display());
    let ast_decls = match parser.parse(&text, file) {
        Ok(decls) => decls,
        Err(diags) => {
            for d in diags {
                reporter.push(d);
            }
            reporter.render_all(&mut cache);
            return 1;
        }
    };

    let mut interner = Interner::new();
    let mut strings = StringTable::new();
    let mut structs = StructTable::new();
    let mut enums = EnumTable::new();
    let mut funcs = FuncInfoTable::new();

    log::debug!("lowering {} top-level declarations", ast_decls.len());
    let mut lower_ctx = LowerCtx {
        interner: &mut interner,
        strings: &mut strings,
        structs: &mut structs,
        enums: &mut enums,
        funcs: &mut funcs,
        reporter: &mut reporter,
        translator: crate::hir::lower::NameTranslator::new(),
    };
    let mut program = hir::lower::lower_program(&ast_decls, &mut lower_ctx);

    log::debug!("running semantic checks");
    semantic::check_program(&mut program, &mut reporter);

    let output = cli.output_path();
    let emit = cli.emit_kind();

    if emit == EmitKind::Hir {
        let text = pretty_print_hir(&program, &interner);
        if let Err(e) = std::fs::write(&output, text) {
            eprintln!("mini: cannot write {}: {e}", output.display());
            reporter.render_all(&mut cache);
            return 1;
        }
        reporter.render_all(&mut cache);
        return i32::from(reporter.has_errors());
    }

    log::debug!("generating code");
    let asm = codegen::emit_program(&program, &mut structs, &enums, &funcs, &strings, &interner, &mut reporter);

    match emit {
        EmitKind::Assembly => {
            if let Err(e) = std::fs::write(&output, &asm) {
                eprintln!("mini: cannot write {}: {e}", output.display());
                reporter.render_all(&mut cache);
                return 1;
            }
        }
        EmitKind::Object | EmitKind::Executable => {
            if let Err(e) = assemble_and_link(&asm, emit, &output) {
                eprintln!("mini: {e}");
                reporter.render_all(&mut cache);
                return 1;
            }
        }
        EmitKind::Hir => unreachable!("handled above"),
    }

    reporter.render_all(&mut cache);
    i32::from(reporter.has_errors())
}
