//! Diagnostics and the suppress-counter reporter.
//!
//! Grounded on `original_source/src/report.h`'s `Reporter`: a flat list of
//! `(span, level, message)` triples plus a suppress counter used during
//! speculative evaluation (argument-type inference builds an
//! `ArgumentAssignmentTable` by running the rvalue generator once just to
//! read off `inferred_type`, and must not let that dry run surface
//! diagnostics or mutate output).

use ariadne::{Color, Label, Report, ReportKind, sources};

use crate::span::{Span, SourceCache};

/// Diagnostic severity. `Warn` never fails compilation; `Error` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub span: Span,
    pub level: Level,
    pub what: String,
    pub details: Option<String>,
}

impl Diagnostic {
    #[must_use]
    pub fn error(span: Span, what: impl Into<String>) -> Self {
        Diagnostic { span, level: Level::Error, what: what.into(), details: None }
    }

    #[must_use]
    pub fn warn(span: Span, what: impl Into<String>) -> Self {
        Diagnostic { span, level: Level::Warn, what: what.into(), details: None }
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Collects diagnostics across a whole-program compilation and suppresses
/// them during speculative sub-evaluations.
#[derive(Default)]
pub struct Reporter {
    diagnostics: Vec<Diagnostic>,
    suppress_depth: u32,
}

impl Reporter {
    #[must_use]
    pub fn new() -> Self {
        Reporter::default()
    }

    /// Records a diagnostic unless currently suppressed.
    pub fn push(&mut self, diag: Diagnostic) {
        if self.suppress_depth == 0 {
            self.diagnostics.push(diag);
        }
    }

    /// Runs `f` with emission suppressed; any diagnostics `f` tries to push
    /// are discarded, matching §4.6's "Speculative parsing / dry-run
    /// evaluation" contract. Nests correctly (an outer suppression is not
    /// lifted by an inner `suppressed` call returning).
    pub fn suppressed<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.suppress_depth += 1;
        let result = f(self);
        self.suppress_depth -= 1;
        result
    }

    /// Increments the suppress depth without a matching closure, for
    /// callers (like [`crate::codegen::context::CodegenContext::speculative`])
    /// that need to hold suppression open across a borrow of something
    /// other than the `Reporter` itself. Must be paired with
    /// [`Reporter::unbump_suppress`].
    pub fn bump_suppress(&mut self) {
        self.suppress_depth += 1;
    }

    pub fn unbump_suppress(&mut self) {
        self.suppress_depth -= 1;
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.level == Level::Error)
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.diagnostics.iter().any(|d| d.level == Level::Warn)
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Renders every collected diagnostic to stderr via `ariadne`, colorized.
    pub fn render_all(&self, cache: &mut SourceCache) {
        for diag in &self.diagnostics {
            render_one(diag, cache);
        }
    }
}

fn render_one(diag: &Diagnostic, cache: &mut SourceCache) {
    let kind = match diag.level {
        Level::Info => ReportKind::Advice,
        Level::Warn => ReportKind::Warning,
        Level::Error => ReportKind::Error,
    };
    let color = match diag.level {
        Level::Info => Color::Blue,
        Level::Warn => Color::Yellow,
        Level::Error => Color::Red,
    };
    let file = diag.span.file;
    let start = cache.byte_offset(file, diag.span.start);
    let end = cache.byte_offset(file, diag.span.end).max(start + 1);
    let path = cache.path(file).to_string_lossy().into_owned();

    let mut builder = Report::build(kind, (path.clone(), start..end)).with_message(&diag.what);
    let mut label = Label::new((path.clone(), start..end)).with_color(color);
    if let Some(details) = &diag.details {
        label = label.with_message(details);
    }
    builder = builder.with_label(label);
    let report = builder.finish();
    let source = cache.ariadne_source(file).clone();
    let _ = report.eprint(sources([(path, source)]));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::{FileId, Pos};

    fn span() -> Span {
        Span::new(FileId(0), Pos::new(0, 0), Pos::new(0, 1))
    }

    #[test]
    fn suppressed_discards_diagnostics() {
        let mut r = Reporter::new();
        r.suppressed(|r| r.push(Diagnostic::error(span(), "should not appear")));
        assert!(!r.has_errors());
        assert!(r.diagnostics().is_empty());
    }

    #[test]
    fn unsuppressed_records_diagnostics() {
        let mut r = Reporter::new();
        r.push(Diagnostic::error(span(), "boom"));
        assert!(r.has_errors());
    }

    #[test]
    fn warn_never_counts_as_error() {
        let mut r = Reporter::new();
        r.push(Diagnostic::warn(span(), "unused variable"));
        assert!(!r.has_errors());
    }

    #[test]
    fn nested_suppression_restores_outer_state() {
        let mut r = Reporter::new();
        r.suppressed(|r| {
            r.suppressed(|r| r.push(Diagnostic::error(span(), "inner")));
            r.push(Diagnostic::error(span(), "outer-suppressed")); // still suppressed
        });
        assert!(r.diagnostics().is_empty());
        r.push(Diagnostic::error(span(), "visible"));
        assert_eq!(r.diagnostics().len(), 1);
    }
}
