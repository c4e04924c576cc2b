//! Reference-dependency records on disk.
//!
//! This crate turns the immutable [`FileRecord`](deptrack_query::FileRecord)s
//! produced by a batch into deterministic JSON files, reads them back, and
//! compares them modulo sequence numbers. An [`EmissionManifest`] tells the
//! build driver which records are complete and which are unavailable.

#![warn(missing_docs)]

pub mod emitter;
pub mod error;
pub mod format;
pub mod manifest;
pub mod normalize;

pub use emitter::{emit_record, load_record, parse_record, remove_stale_record, render_record};
pub use error::EmitError;
pub use format::{RecordFile, FORMAT_VERSION};
pub use manifest::{EmissionManifest, ManifestEntry, RecordStatus};
pub use normalize::{diff, equivalent, normalize, NormalizedRecord, RecordDiff};
