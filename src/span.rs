//! Source positions, spans, and the file/source cache.
//!
//! The lexer and parser are out of core scope (see `spec.md` §1), but every
//! AST/HIR node still carries a [`Span`] so diagnostics can point back at
//! the text that produced them.

use std::path::{Path, PathBuf};

use ariadne::Source;
use hashbrown::HashMap;

/// A zero-based `(row, col)` position in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pos {
    pub row: u32,
    pub col: u32,
}

impl Pos {
    #[must_use]
    pub fn new(row: u32, col: u32) -> Self {
        Pos { row, col }
    }
}

/// Index into the [`SourceCache`]. Assigned in load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub u32);

/// `(file_id, start, end)`. Spans form a monoid under union: the union of
/// two spans is the span covering both (min start, max end), and is only
/// meaningful when both spans share a `file_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub file: FileId,
    pub start: Pos,
    pub end: Pos,
}

impl Span {
    #[must_use]
    pub fn new(file: FileId, start: Pos, end: Pos) -> Self {
        Span { file, start, end }
    }

    /// A placeholder span for synthesized nodes that have no source text of
    /// their own (e.g. a default `Void` return type the user never wrote).
    #[must_use]
    pub fn synthetic(file: FileId) -> Self {
        Span { file, start: Pos::new(0, 0), end: Pos::new(0, 0) }
    }

    /// Union of two spans sharing a file: `(min start, max end)`.
    #[must_use]
    pub fn union(self, other: Span) -> Span {
        debug_assert_eq!(self.file, other.file, "union of spans from different files");
        Span {
            file: self.file,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Maps [`FileId`]s to file paths and their text, for diagnostic rendering.
/// Any caching strategy suffices per `spec.md` §4.7; this one is a simple
/// append-only table loaded once at startup (or populated directly from
/// in-memory strings in tests).
#[derive(Default)]
pub struct SourceCache {
    files: Vec<(PathBuf, String)>,
    rendered: HashMap<FileId, Source>,
}

impl SourceCache {
    #[must_use]
    pub fn new() -> Self {
        SourceCache::default()
    }

    /// Registers a file's contents and returns its id.
    pub fn add(&mut self, path: impl AsRef<Path>, text: String) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push((path.as_ref().to_path_buf(), text));
        id
    }

    #[must_use]
    pub fn path(&self, id: FileId) -> &Path {
        &self.files[id.0 as usize].0
    }

    #[must_use]
    pub fn text(&self, id: FileId) -> &str {
        &self.files[id.0 as usize].1
    }

    /// The `ariadne::Source` used to render a diagnostic for this file,
    /// built lazily and cached on first use.
    pub fn ariadne_source(&mut self, id: FileId) -> &Source {
        self.rendered
            .entry(id)
            .or_insert_with(|| Source::from(self.files[id.0 as usize].1.clone()))
    }

    /// Converts a `(row, col)` position to a byte offset, for `ariadne`
    /// which wants byte ranges rather than row/col pairs.
    #[must_use]
    pub fn byte_offset(&self, id: FileId, pos: Pos) -> usize {
        let text = &self.files[id.0 as usize].1;
        let mut offset = 0;
        for (row_idx, line) in text.split_inclusive('\n').enumerate() {
            if row_idx as u32 == pos.row {
                return offset + (pos.col as usize).min(line.len());
            }
            offset += line.len();
        }
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_takes_min_start_max_end() {
        let f = FileId(0);
        let a = Span::new(f, Pos::new(1, 0), Pos::new(1, 5));
        let b = Span::new(f, Pos::new(0, 2), Pos::new(2, 1));
        let u = a.union(b);
        assert_eq!(u.start, Pos::new(0, 2));
        assert_eq!(u.end, Pos::new(2, 1));
    }

    #[test]
    fn byte_offset_walks_lines() {
        let mut cache = SourceCache::new();
        let id = cache.add("t.mini", "abc\ndefg\n".to_string());
        assert_eq!(cache.byte_offset(id, Pos::new(0, 0)), 0);
        assert_eq!(cache.byte_offset(id, Pos::new(1, 2)), 4 + 2);
    }
}
