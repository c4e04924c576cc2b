//! The emission manifest.
//!
//! One manifest is written per batch. For every primary file it records where
//! the reference-dependency record went and whether it is complete. A file
//! whose record could not be written is listed as unavailable, which tells
//! the build driver to treat its dependencies as unknown.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use deptrack_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::emitter::write_atomic;
use crate::error::EmitError;
use crate::format::FORMAT_VERSION;

/// Whether a file's record can be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordStatus {
    /// The record was written in full.
    Complete,
    /// No record is available for the file.
    Unavailable {
        /// Why the record is missing.
        reason: String,
    },
}

/// Manifest entry for a single primary file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Where the record was (or would have been) written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<PathBuf>,
    /// Completion status.
    pub status: RecordStatus,
    /// The file's interface hash, as lowercase hex, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface_hash: Option<String>,
}

/// Per-file emission status for one batch, keyed by file display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmissionManifest {
    /// Record format version of the listed records.
    pub format_version: u32,
    /// Entries in file-name order.
    pub files: BTreeMap<String, ManifestEntry>,
}

impl Default for EmissionManifest {
    fn default() -> Self {
        Self::new()
    }
}

impl EmissionManifest {
    /// Creates an empty manifest.
    pub fn new() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            files: BTreeMap::new(),
        }
    }

    /// Marks `file`'s record at `record` as complete.
    pub fn mark_complete(&mut self, file: &str, record: Option<PathBuf>, interface_hash: ContentHash) {
        self.files.insert(
            file.to_string(),
            ManifestEntry {
                record,
                status: RecordStatus::Complete,
                interface_hash: Some(interface_hash.to_string()),
            },
        );
    }

    /// Marks `file`'s record as unavailable for `reason`.
    pub fn mark_unavailable(&mut self, file: &str, record: Option<PathBuf>, reason: impl Into<String>) {
        self.files.insert(
            file.to_string(),
            ManifestEntry {
                record,
                status: RecordStatus::Unavailable {
                    reason: reason.into(),
                },
                interface_hash: None,
            },
        );
    }

    /// Returns the entry for `file`.
    pub fn get(&self, file: &str) -> Option<&ManifestEntry> {
        self.files.get(file)
    }

    /// Returns `true` if `file` has a complete record.
    pub fn is_complete(&self, file: &str) -> bool {
        matches!(
            self.files.get(file).map(|e| &e.status),
            Some(RecordStatus::Complete)
        )
    }

    /// Names of the files whose records are unavailable.
    pub fn unavailable(&self) -> impl Iterator<Item = &str> {
        self.files
            .iter()
            .filter(|(_, e)| matches!(e.status, RecordStatus::Unavailable { .. }))
            .map(|(name, _)| name.as_str())
    }

    /// Writes the manifest to `path` atomically.
    pub fn save(&self, path: &Path) -> Result<(), EmitError> {
        let mut json =
            serde_json::to_string_pretty(self).map_err(|e| EmitError::Serialization {
                reason: e.to_string(),
            })?;
        json.push('\n');
        write_atomic(path, json.as_bytes())
    }

    /// Loads a manifest from `path`.
    pub fn load(path: &Path) -> Result<Self, EmitError> {
        let content = std::fs::read_to_string(path).map_err(|e| EmitError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let manifest: Self = serde_json::from_str(&content).map_err(|e| EmitError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(EmitError::VersionMismatch {
                path: path.to_path_buf(),
                expected: FORMAT_VERSION,
                actual: manifest.format_version,
            });
        }
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_manifest_is_empty() {
        let m = EmissionManifest::new();
        assert_eq!(m.format_version, FORMAT_VERSION);
        assert!(m.files.is_empty());
    }

    #[test]
    fn status_tracking() {
        let mut m = EmissionManifest::new();
        m.mark_complete("a.input", Some(PathBuf::from("out/a.deps")), ContentHash::from_bytes(b"a"));
        m.mark_unavailable("b.input", Some(PathBuf::from("out/b.deps")), "permission denied");
        assert!(m.is_complete("a.input"));
        assert!(!m.is_complete("b.input"));
        assert!(!m.is_complete("c.input"));
        assert_eq!(m.unavailable().collect::<Vec<_>>(), ["b.input"]);
        assert!(m.get("b.input").unwrap().interface_hash.is_none());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let mut m = EmissionManifest::new();
        m.mark_complete("a.input", None, ContentHash::from_bytes(b"a"));
        m.mark_unavailable("b.input", None, "cancelled");
        m.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"complete\""));
        assert!(text.contains("\"unavailable\""));
        assert_eq!(EmissionManifest::load(&path).unwrap(), m);
    }

    #[test]
    fn load_corrupt_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, "not valid json {{{").unwrap();
        assert!(matches!(
            EmissionManifest::load(&path),
            Err(EmitError::Parse { .. })
        ));
    }
}
