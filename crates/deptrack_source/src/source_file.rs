//! Source file representation with line-start indexing.

use crate::file_id::FileId;
use deptrack_common::ContentHash;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How a file participates in a batch.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum FileRole {
    /// Type-checked in this batch; gets a dependency record.
    Primary,
    /// Parsed and declared so primaries can see it, never type-checked here.
    Secondary,
    /// The built-in prelude.
    Prelude,
}

impl FileRole {
    /// Returns `true` for [`FileRole::Primary`].
    pub fn is_primary(self) -> bool {
        self == FileRole::Primary
    }
}

/// A source file loaded into the batch.
pub struct SourceFile {
    /// The unique identifier for this file within the [`SourceDb`](crate::SourceDb).
    pub id: FileId,
    /// The filesystem path of this file (or a synthetic name for in-memory sources).
    pub path: PathBuf,
    /// The full text content of the file.
    pub content: String,
    /// Role of the file in the batch.
    pub role: FileRole,
    /// Hash of the raw file content.
    pub content_hash: ContentHash,
    line_starts: Vec<u32>,
}

impl SourceFile {
    /// Creates a new `SourceFile` with precomputed line starts and content hash.
    pub fn new(id: FileId, path: PathBuf, content: String, role: FileRole) -> Self {
        let line_starts = compute_line_starts(&content);
        let content_hash = ContentHash::from_bytes(content.as_bytes());
        Self {
            id,
            path,
            content,
            role,
            content_hash,
            line_starts,
        }
    }

    /// The name used for this file in records and manifests: the final path
    /// component, or the whole path when it has none.
    pub fn display_name(&self) -> String {
        display_name(&self.path)
    }

    /// Converts a byte offset into 1-indexed (line, column) coordinates.
    pub fn line_col(&self, byte_offset: u32) -> (u32, u32) {
        let line_idx = match self.line_starts.binary_search(&byte_offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let line = (line_idx as u32) + 1;
        let col = byte_offset - self.line_starts[line_idx] + 1;
        (line, col)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn compute_line_starts(content: &str) -> Vec<u32> {
    let mut starts = vec![0u32];
    for (i, byte) in content.bytes().enumerate() {
        if byte == b'\n' {
            starts.push((i + 1) as u32);
        }
    }
    starts
}
