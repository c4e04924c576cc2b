//! Source file management and span tracking for a compilation batch.
//!
//! The [`SourceDb`] owns every input of a batch (primary files, secondary
//! files and the prelude), hands out [`FileId`]s, and resolves [`Span`]s to
//! line/column coordinates for diagnostics.

#![warn(missing_docs)]

pub mod file_id;
pub mod resolved_span;
pub mod source_db;
pub mod source_file;
pub mod span;

pub use file_id::FileId;
pub use resolved_span::ResolvedSpan;
pub use source_db::SourceDb;
pub use source_file::{FileRole, SourceFile};
pub use span::Span;
