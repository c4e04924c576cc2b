//! Deterministic rendering and atomic writing of records.

use std::path::{Path, PathBuf};

use deptrack_query::FileRecord;
use tracing::{debug, error, warn};

use crate::error::EmitError;
use crate::format::RecordFile;

/// Renders `record` as pretty-printed JSON with a trailing newline.
///
/// Identical records render to identical bytes.
pub fn render_record(record: &FileRecord) -> Result<String, EmitError> {
    let mut text = serde_json::to_string_pretty(&RecordFile::from(record)).map_err(|e| {
        EmitError::Serialization {
            reason: e.to_string(),
        }
    })?;
    text.push('\n');
    Ok(text)
}

/// Writes `record` to `path`.
///
/// The record is first written to a sibling temporary file and then renamed
/// into place, so readers never observe a partial record. If anything fails,
/// the temporary file and any stale record at `path` are removed: a missing
/// record means "unknown" to the build driver, while an outdated one would be
/// trusted.
pub fn emit_record(record: &FileRecord, path: &Path) -> Result<(), EmitError> {
    let text = render_record(record)?;
    match write_atomic(path, text.as_bytes()) {
        Ok(()) => {
            debug!(path = %path.display(), depends = record.depends.len(), "emitted record");
            Ok(())
        }
        Err(err) => {
            error!(path = %path.display(), %err, "failed to emit record");
            remove_stale_record(path);
            Err(err)
        }
    }
}

/// Deletes the record at `path` if there is one.
///
/// Returns `false` and logs a warning when a record may still be there.
pub fn remove_stale_record(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not remove stale record");
            false
        }
    }
}

/// Reads and validates the record at `path`.
pub fn load_record(path: &Path) -> Result<FileRecord, EmitError> {
    let text = std::fs::read_to_string(path).map_err(|e| EmitError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_record(&text, path)
}

/// Parses record JSON. `path` is only used in error messages.
pub fn parse_record(text: &str, path: &Path) -> Result<FileRecord, EmitError> {
    let file: RecordFile = serde_json::from_str(text).map_err(|e| EmitError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    file.into_record(path)
}

/// Writes `bytes` to a temporary sibling of `path` and renames it over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), EmitError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| EmitError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }
    let tmp = temp_sibling(path);
    let result = std::fs::write(&tmp, bytes)
        .and_then(|()| std::fs::rename(&tmp, path))
        .map_err(|e| EmitError::Io {
            path: path.to_path_buf(),
            source: e,
        });
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use deptrack_common::ContentHash;
    use deptrack_query::{DependencyKind, EntityKind, ProvidedEntity, UsedEntity};

    fn sample(file: &str) -> FileRecord {
        let provides = vec![
            ProvidedEntity {
                sequence: 0,
                identifier: "main".to_string(),
                kind: EntityKind::TopLevel,
                fingerprint: ContentHash::from_bytes(b"func main ( )"),
                private: false,
            },
        ];
        FileRecord {
            file: file.to_string(),
            interface_hash: FileRecord::compute_interface_hash(&provides),
            provides,
            depends: vec![UsedEntity {
                sequence: 4,
                identifier: "print".to_string(),
                kind: DependencyKind::UsesTopLevelName,
                consumers: vec![0],
            }],
        }
    }

    #[test]
    fn render_is_deterministic() {
        let a = render_record(&sample("main.input")).unwrap();
        let b = render_record(&sample("main.input")).unwrap();
        assert_eq!(a, b);
        assert!(a.ends_with("}\n"));
        assert!(a.starts_with("{\n  \"format_version\": 1,"));
    }

    #[test]
    fn emit_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/main.deps");
        let record = sample("main.input");
        emit_record(&record, &path).unwrap();
        assert_eq!(load_record(&path).unwrap(), record);

        // no temporary files left behind
        let names: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn failed_emit_cleans_temporary_file() {
        let dir = tempfile::tempdir().unwrap();
        // the destination is a directory, so the rename must fail
        let path = dir.path().join("main.deps");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();
        let err = emit_record(&sample("main.input"), &path).unwrap_err();
        assert!(matches!(err, EmitError::Io { .. }));
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn failed_emit_when_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        // parent is a file: directory creation fails
        let path = blocker.join("main.deps");
        assert!(emit_record(&sample("main.input"), &path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn stale_record_removal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.deps");
        std::fs::write(&path, "{}").unwrap();
        assert!(remove_stale_record(&path));
        assert!(!path.exists());
        // already gone
        assert!(remove_stale_record(&path));

        let occupied = dir.path().join("dir.deps");
        std::fs::create_dir(&occupied).unwrap();
        assert!(!remove_stale_record(&occupied));
        assert!(occupied.exists());
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.deps");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_record(&path), Err(EmitError::Parse { .. })));
        assert!(matches!(
            load_record(&dir.path().join("missing.deps")),
            Err(EmitError::Io { .. })
        ));
    }
}
