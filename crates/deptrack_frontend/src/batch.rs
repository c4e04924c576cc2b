//! The batch coordinator: parses every input, builds the declaration index,
//! checks primaries on parallel workers and emits one record per primary.
//!
//! ```text
//! SourceDb ─┬─ parse (par_iter) ─► ModuleIndex::build ─► check primaries (par_iter)
//!           └─ prelude                                    │ one Tracker per worker
//!                                                         ▼
//!                                  drain_record ─► emit_record ─► manifest
//! ```
//!
//! The session (entities, query cache, dependency graph) is shared by all
//! workers. Each worker owns its tracker and therefore its consumer-context
//! stack. Only emission performs I/O.

use crate::checker::{CheckOutcome, FileChecker};
use crate::declare::{ModuleIndex, ParsedFile};
use crate::{errors, parse_file, prelude};
use deptrack_common::{InternalError, Interner, TrackResult};
use deptrack_config::{Precision, TrackerConfig};
use deptrack_diagnostics::{Diagnostic, DiagnosticSink};
use deptrack_emit::{emit_record, remove_stale_record, EmissionManifest};
use deptrack_query::{FileRecord, Session, SessionOptions, SessionStats};
use deptrack_source::{FileId, FileRole, SourceDb};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Shared cancellation flag. Cloning shares the flag.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of every batch holding this flag.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Batch settings.
#[derive(Clone, Debug)]
pub struct BatchOptions {
    /// Worker threads; `0` lets rayon decide.
    pub jobs: usize,
    /// Whether the built-in prelude is added.
    pub prelude: bool,
    /// Member-lookup over-approximation.
    pub precision: Precision,
    /// Warn about evaluations outside any consumer context.
    pub warn_missing_context: bool,
    /// Default directory for records of primaries without an explicit path.
    pub output_dir: Option<PathBuf>,
    /// Extension of records written to `output_dir`.
    pub extension: String,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::from(&TrackerConfig::default())
    }
}

impl From<&TrackerConfig> for BatchOptions {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            jobs: config.batch.jobs,
            prelude: config.batch.prelude,
            precision: config.tracking.precision,
            warn_missing_context: config.tracking.warn_missing_context,
            output_dir: config.emit.output_dir.as_ref().map(PathBuf::from),
            extension: config.emit.extension.clone(),
        }
    }
}

/// Everything a batch produced.
pub struct BatchOutput {
    /// Records of the primaries that completed, in input order.
    pub records: Vec<FileRecord>,
    /// Per-primary emission status.
    pub manifest: EmissionManifest,
    /// All diagnostics, sorted.
    pub diagnostics: Vec<Diagnostic>,
    /// Session counters at the end of the batch.
    pub stats: SessionStats,
    /// Whether the batch was cancelled.
    pub cancelled: bool,
    /// The sources, including the prelude, for rendering diagnostics.
    pub sources: SourceDb,
}

impl BatchOutput {
    /// The record of the primary named `name`.
    pub fn record(&self, name: &str) -> Option<&FileRecord> {
        self.records.iter().find(|r| r.file == name)
    }

    /// Returns `true` if any diagnostic is an error.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity.is_error())
    }
}

enum FileResult {
    Emitted(FileRecord),
    Unavailable(FileRecord, String),
    Kept(FileRecord),
    Cancelled,
}

/// One batch of source files.
pub struct Batch {
    sources: SourceDb,
    options: BatchOptions,
    outputs: FxHashMap<FileId, PathBuf>,
    manifest_path: Option<PathBuf>,
    cancel: CancelFlag,
}

impl Batch {
    /// Creates a batch over `sources`. Files with [`FileRole::Primary`] are
    /// checked; when there are none, every file is.
    pub fn new(sources: SourceDb, options: BatchOptions) -> Self {
        Self {
            sources,
            options,
            outputs: FxHashMap::default(),
            manifest_path: None,
            cancel: CancelFlag::new(),
        }
    }

    /// Uses `flag` for cancellation instead of a private flag.
    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = flag;
        self
    }

    /// Writes the record of `file` to `path`.
    pub fn with_output(mut self, file: FileId, path: impl Into<PathBuf>) -> Self {
        self.outputs.insert(file, path.into());
        self
    }

    /// Writes the emission manifest to `path`.
    pub fn with_manifest(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = Some(path.into());
        self
    }

    fn output_path(&self, file: FileId, name: &str) -> Option<PathBuf> {
        if let Some(path) = self.outputs.get(&file) {
            return Some(path.clone());
        }
        let dir = self.options.output_dir.as_ref()?;
        let stem = Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        Some(dir.join(format!("{stem}.{}", self.options.extension)))
    }

    /// Runs the batch.
    ///
    /// Problems in the sources and emission failures become diagnostics;
    /// `Err` is reserved for an unusable environment.
    pub fn run(mut self) -> TrackResult<BatchOutput> {
        if self.options.prelude {
            prelude::add_prelude(&mut self.sources);
        }
        let mut primaries: FxHashSet<FileId> =
            self.sources.primary_files().map(|f| f.id).collect();
        if primaries.is_empty() {
            // whole-module mode
            primaries = self
                .sources
                .files()
                .filter(|f| f.role != FileRole::Prelude)
                .map(|f| f.id)
                .collect();
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.jobs)
            .build()
            .map_err(|e| InternalError::new(format!("failed to start worker pool: {e}")))?;

        let interner = Arc::new(Interner::new());
        let session = Session::with_options(
            interner,
            SessionOptions {
                warn_missing_context: self.options.warn_missing_context,
            },
        );
        let sink = DiagnosticSink::new();

        let parsed: Vec<ParsedFile> = pool.install(|| {
            let files: Vec<_> = self.sources.files().collect();
            files
                .par_iter()
                .map(|file| ParsedFile {
                    id: file.id,
                    name: file.display_name(),
                    role: if primaries.contains(&file.id) {
                        FileRole::Primary
                    } else {
                        file.role
                    },
                    ast: parse_file(file.id, &self.sources, session.interner(), &sink),
                })
                .collect()
        });

        let index = ModuleIndex::build(parsed, &session, self.options.precision);
        let mut order: Vec<&ParsedFile> = index
            .files()
            .iter()
            .filter(|f| f.role.is_primary())
            .collect();
        order.sort_by_key(|f| f.id);
        info!(
            primaries = order.len(),
            files = index.files().len(),
            jobs = pool.current_num_threads(),
            "checking batch"
        );

        let results: Vec<(String, Option<PathBuf>, FileResult)> = pool.install(|| {
            order
                .par_iter()
                .map(|file| {
                    let path = self.output_path(file.id, &file.name);
                    let result = self.process(file, path.as_deref(), &index, &session, &sink);
                    (file.name.clone(), path, result)
                })
                .collect()
        });

        let mut records = Vec::new();
        let mut manifest = EmissionManifest::new();
        let mut cancelled = false;
        for (name, path, result) in results {
            match result {
                FileResult::Emitted(record) => {
                    manifest.mark_complete(&name, path, record.interface_hash);
                    records.push(record);
                }
                FileResult::Unavailable(record, reason) => {
                    manifest.mark_unavailable(&name, path, reason);
                    records.push(record);
                }
                FileResult::Kept(record) => {
                    manifest.mark_complete(&name, None, record.interface_hash);
                    records.push(record);
                }
                FileResult::Cancelled => {
                    cancelled = true;
                    manifest.mark_unavailable(&name, path, "cancelled");
                }
            }
        }

        if let Some(path) = &self.manifest_path {
            if let Err(err) = manifest.save(path) {
                error!(path = %path.display(), %err, "failed to write emission manifest");
                sink.emit(errors::dependencies_unavailable(
                    &path.display().to_string(),
                    &err.to_string(),
                ));
            }
        }

        let stats = session.stats();
        debug!(?stats, cancelled, "batch finished");
        Ok(BatchOutput {
            records,
            manifest,
            diagnostics: sink.take_all(),
            stats,
            cancelled,
            sources: self.sources,
        })
    }

    fn process(
        &self,
        file: &ParsedFile,
        path: Option<&Path>,
        index: &ModuleIndex,
        session: &Session,
        sink: &DiagnosticSink,
    ) -> FileResult {
        let tracker = session.tracker();
        let outcome = FileChecker::new(index, &tracker, sink, &self.cancel).check(file);
        if outcome == CheckOutcome::Cancelled || self.cancel.is_cancelled() {
            session.discard(file.id);
            if let Some(path) = path {
                // a stale record would be trusted by the build driver
                remove_stale_record(path);
            }
            return FileResult::Cancelled;
        }

        let record = session.drain_record(file.id, &file.name);
        let Some(path) = path else {
            return FileResult::Kept(record);
        };
        match emit_record(&record, path) {
            Ok(()) => FileResult::Emitted(record),
            Err(err) => {
                let reason = err.to_string();
                sink.emit(errors::dependencies_unavailable(&file.name, &reason));
                FileResult::Unavailable(record, reason)
            }
        }
    }
}
