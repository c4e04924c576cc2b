//! The on-disk shape of a reference-dependency record.
//!
//! Field order in these structs is the key order in the emitted JSON, so the
//! output for a given record is byte-for-byte stable.

use deptrack_common::ContentHash;
use deptrack_query::{DependencyKind, EntityKind, FileRecord, ProvidedEntity, UsedEntity};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::EmitError;

/// Current record format version. Increment on breaking changes.
pub const FORMAT_VERSION: u32 = 1;

/// A record as serialized to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFile {
    /// Record format version.
    pub format_version: u32,
    /// Display name of the recorded file.
    pub file: String,
    /// Interface hash of the file, as lowercase hex.
    pub interface_hash: String,
    /// Entities the file provides.
    pub provides: Vec<ProvidedEntry>,
    /// Entities the file depends on.
    pub depends: Vec<DependsEntry>,
}

/// One provided entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidedEntry {
    /// Batch-local sequence number; insignificant across runs.
    pub sequence: u32,
    /// Stable identifier.
    pub identifier: String,
    /// Entity kind tag.
    pub kind: EntityKind,
    /// Interface fingerprint, as lowercase hex.
    pub fingerprint: String,
    /// Present and `true` for file-private names.
    #[serde(default, skip_serializing_if = "is_false")]
    pub private: bool,
}

/// One used entity with the sequence numbers of its consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependsEntry {
    /// Batch-local sequence number of the provider.
    pub sequence: u32,
    /// Stable identifier of the provider.
    pub identifier: String,
    /// Dependency kind.
    pub kind: DependencyKind,
    /// Consumer declarations; empty for file-level uses.
    #[serde(default)]
    pub consumers: Vec<u32>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl From<&FileRecord> for RecordFile {
    fn from(record: &FileRecord) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            file: record.file.clone(),
            interface_hash: record.interface_hash.to_string(),
            provides: record
                .provides
                .iter()
                .map(|p| ProvidedEntry {
                    sequence: p.sequence,
                    identifier: p.identifier.clone(),
                    kind: p.kind,
                    fingerprint: p.fingerprint.to_string(),
                    private: p.private,
                })
                .collect(),
            depends: record
                .depends
                .iter()
                .map(|d| DependsEntry {
                    sequence: d.sequence,
                    identifier: d.identifier.clone(),
                    kind: d.kind,
                    consumers: d.consumers.clone(),
                })
                .collect(),
        }
    }
}

impl RecordFile {
    /// Converts back into a [`FileRecord`], checking the version and hashes.
    ///
    /// `path` is only used for error messages.
    pub fn into_record(self, path: &Path) -> Result<FileRecord, EmitError> {
        if self.format_version != FORMAT_VERSION {
            return Err(EmitError::VersionMismatch {
                path: path.to_path_buf(),
                expected: FORMAT_VERSION,
                actual: self.format_version,
            });
        }
        let parse_hash = |text: &str, what: &str| {
            ContentHash::parse_hex(text).ok_or_else(|| EmitError::Parse {
                path: path.to_path_buf(),
                reason: format!("invalid {what} `{text}`"),
            })
        };

        let interface_hash = parse_hash(&self.interface_hash, "interface hash")?;
        let provides = self
            .provides
            .into_iter()
            .map(|p| {
                Ok(ProvidedEntity {
                    sequence: p.sequence,
                    fingerprint: parse_hash(&p.fingerprint, "fingerprint")?,
                    identifier: p.identifier,
                    kind: p.kind,
                    private: p.private,
                })
            })
            .collect::<Result<Vec<_>, EmitError>>()?;
        let depends = self
            .depends
            .into_iter()
            .map(|d| UsedEntity {
                sequence: d.sequence,
                identifier: d.identifier,
                kind: d.kind,
                consumers: d.consumers,
            })
            .collect();

        Ok(FileRecord {
            file: self.file,
            interface_hash,
            provides,
            depends,
        })
    }
}
