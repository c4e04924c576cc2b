//! Fine-grained dependency tracking over a memoizing query cache.
//!
//! A [`Session`] owns everything shared by the workers of one batch: the
//! [`EntityTable`], the [`FingerprintStore`], the [`QueryCache`] and the
//! [`DependencyGraph`]. Each worker evaluates queries through its own
//! [`Tracker`], which keeps the worker's consumer-context stack and records a
//! dependency edge for every evaluation, whether the result was computed or
//! served from the cache.
//!
//! ```text
//! Tracker::evaluate(query)
//!   ├─ cache hit  ──────────────┐
//!   └─ cache miss → compute ────┤  footprint (transitive entity uses)
//!                               ▼
//!        merge into parent query frame + record under current context
//! ```
//!
//! At the end of a primary file, [`Session::drain_record`] turns the file's
//! edges and declarations into an immutable [`FileRecord`].

#![warn(missing_docs)]

pub mod cache;
pub mod context;
pub mod entity;
pub mod error;
pub mod fingerprint;
pub mod footprint;
pub mod graph;
pub mod record;
pub mod recorder;
pub mod session;

pub use cache::{CacheStats, Query, QueryCache};
pub use context::{ConsumerContext, ContextGuard, ContextStack};
pub use entity::{Entity, EntityId, EntityKey, EntityKind, EntityTable, Namespace, Scope};
pub use error::QueryError;
pub use fingerprint::FingerprintStore;
pub use footprint::{Footprint, Use};
pub use graph::{DependencyEdge, DependencyGraph, DependencyKind};
pub use record::{FileRecord, ProvidedEntity, UsedEntity};
pub use recorder::Tracker;
pub use session::{Session, SessionOptions, SessionStats};
