//! Central database of all source files in a batch.

use crate::file_id::FileId;
use crate::resolved_span::ResolvedSpan;
use crate::source_file::{FileRole, SourceFile};
use crate::span::Span;
use std::io;
use std::path::{Path, PathBuf};

/// The source database, owning all loaded source text and resolving
/// [`FileId`] + byte offsets to line/column coordinates for diagnostics.
pub struct SourceDb {
    files: Vec<SourceFile>,
}

impl SourceDb {
    /// Creates an empty source database.
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// Loads a source file from the filesystem and returns its [`FileId`].
    pub fn load_file(&mut self, path: &Path, role: FileRole) -> Result<FileId, io::Error> {
        let content = std::fs::read_to_string(path)?;
        Ok(self.add_source(path, content, role))
    }

    /// Adds a source file from an in-memory string.
    pub fn add_source(
        &mut self,
        name: impl Into<PathBuf>,
        content: impl Into<String>,
        role: FileRole,
    ) -> FileId {
        let id = FileId::from_raw(self.files.len() as u32);
        self.files
            .push(SourceFile::new(id, name.into(), content.into(), role));
        id
    }

    /// Returns the [`SourceFile`] for the given [`FileId`].
    ///
    /// # Panics
    ///
    /// Panics if the `FileId` is invalid.
    pub fn get_file(&self, id: FileId) -> &SourceFile {
        &self.files[id.index()]
    }

    /// Iterates over every file in load order.
    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.iter()
    }

    /// Iterates over the primary files in load order.
    pub fn primary_files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.iter().filter(|f| f.role.is_primary())
    }

    /// Returns the number of loaded files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if no file has been loaded.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Resolves a [`Span`] to human-readable line/column coordinates.
    pub fn resolve_span(&self, span: Span) -> ResolvedSpan {
        let file = self.get_file(span.file);
        let (start_line, start_col) = file.line_col(span.start);
        let (end_line, end_col) = file.line_col(span.end.saturating_sub(1).max(span.start));
        ResolvedSpan {
            file_path: file.path.clone(),
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }
}

impl Default for SourceDb {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_get() {
        let mut db = SourceDb::new();
        let id = db.add_source("1.input", "let x = \"a\"", FileRole::Primary);
        assert_eq!(db.get_file(id).content, "let x = \"a\"");
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn primary_files_filters_roles() {
        let mut db = SourceDb::new();
        db.add_source("<prelude>", "", FileRole::Prelude);
        let a = db.add_source("a.input", "", FileRole::Primary);
        db.add_source("b.input", "", FileRole::Secondary);
        let c = db.add_source("c.input", "", FileRole::Primary);
        let primaries: Vec<FileId> = db.primary_files().map(|f| f.id).collect();
        assert_eq!(primaries, vec![a, c]);
    }

    #[test]
    fn resolve_span() {
        let mut db = SourceDb::new();
        let id = db.add_source("t.input", "let a\nlet bb\n", FileRole::Primary);
        let resolved = db.resolve_span(Span::new(id, 10, 12));
        assert_eq!(resolved.file_path, PathBuf::from("t.input"));
        assert_eq!((resolved.start_line, resolved.start_col), (2, 5));
        assert_eq!((resolved.end_line, resolved.end_col), (2, 6));
    }

    #[test]
    fn load_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.input");
        std::fs::write(&path, "let a = 1").unwrap();

        let mut db = SourceDb::new();
        let id = db.load_file(&path, FileRole::Secondary).unwrap();
        assert_eq!(db.get_file(id).content, "let a = 1");
        assert_eq!(db.get_file(id).role, FileRole::Secondary);
    }

    #[test]
    fn load_missing_file_errors() {
        let mut db = SourceDb::new();
        assert!(db
            .load_file(Path::new("/nonexistent/x.input"), FileRole::Primary)
            .is_err());
        assert!(db.is_empty());
    }
}
