//! State shared by every worker of one batch.

use crate::cache::{CacheStats, QueryCache};
use crate::entity::{EntityId, EntityKey, EntityKind, EntityTable};
use crate::fingerprint::FingerprintStore;
use crate::footprint::Footprint;
use crate::graph::{DependencyEdge, DependencyGraph};
use crate::record::FileRecord;
use crate::recorder::Tracker;
use deptrack_common::{ContentHash, Interner};
use deptrack_source::FileId;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Behaviour switches for a [`Session`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionOptions {
    /// Log a warning whenever a top-level evaluation runs without a consumer
    /// context and its uses are therefore not recorded.
    pub warn_missing_context: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            warn_missing_context: true,
        }
    }
}

/// Summary counters of a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Query cache counters.
    pub cache: CacheStats,
    /// Interned entities.
    pub entities: usize,
    /// Edges not yet drained into records.
    pub pending_edges: usize,
    /// Top-level evaluations whose uses had no consumer to record under.
    pub missing_context: u64,
}

/// The entity table, fingerprints, query cache and dependency graph of one
/// batch. Shared by reference between worker threads; each worker evaluates
/// through its own [`Tracker`].
pub struct Session {
    interner: Arc<Interner>,
    entities: EntityTable,
    fingerprints: FingerprintStore,
    pub(crate) cache: QueryCache,
    pub(crate) graph: DependencyGraph,
    options: SessionOptions,
    missing_context: AtomicU64,
}

impl Session {
    /// Creates a session with default options.
    pub fn new(interner: Arc<Interner>) -> Self {
        Self::with_options(interner, SessionOptions::default())
    }

    /// Creates a session with explicit options.
    pub fn with_options(interner: Arc<Interner>, options: SessionOptions) -> Self {
        Self {
            interner,
            entities: EntityTable::new(),
            fingerprints: FingerprintStore::new(),
            cache: QueryCache::new(),
            graph: DependencyGraph::new(),
            options,
            missing_context: AtomicU64::new(0),
        }
    }

    /// The batch interner.
    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    /// The entity table.
    pub fn entities(&self) -> &EntityTable {
        &self.entities
    }

    /// The query cache.
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// The dependency graph.
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// The options this session was created with.
    pub fn options(&self) -> SessionOptions {
        self.options
    }

    /// A fresh tracker for the calling worker.
    pub fn tracker(&self) -> Tracker<'_> {
        Tracker::new(self)
    }

    /// Registers a declaration and drops its memoized fingerprint.
    pub fn declare(
        &self,
        key: EntityKey,
        kind: EntityKind,
        file: FileId,
        interface: &str,
    ) -> EntityId {
        let id = self.entities.declare(key, kind, file, interface);
        self.fingerprints.invalidate(id);
        id
    }

    /// Interns `key` without declaring it.
    pub fn intern(&self, key: EntityKey, kind: EntityKind) -> EntityId {
        self.entities.intern(key, kind)
    }

    /// The interface fingerprint of `id`.
    pub fn fingerprint(&self, id: EntityId) -> Option<ContentHash> {
        let entity = self.entities.get(id)?;
        Some(self.fingerprints.fingerprint(id, &entity, &self.interner))
    }

    /// The stable identifier of `id`.
    pub fn identifier(&self, id: EntityId) -> Option<String> {
        self.entities.key(id).map(|key| key.render(&self.interner))
    }

    /// The edges recorded so far for `file`, in record order.
    pub fn edges_for(&self, file: FileId) -> Vec<DependencyEdge> {
        self.graph.edges_for(file, &self.entities, &self.interner)
    }

    /// Removes the edges of `file` from the graph and assembles its record
    /// under the display name `name`.
    ///
    /// Must only be called once every worker has finished with `file`.
    pub fn drain_record(&self, file: FileId, name: &str) -> FileRecord {
        let edges = self.graph.take_file(file, &self.entities, &self.interner);
        let declared = self.entities.declared_in(file);
        debug!(file = name, edges = edges.len(), provides = declared.len(), "draining record");
        FileRecord::build(self, name, declared, &edges)
    }

    /// Drops the edges of `file` without producing a record.
    pub fn discard(&self, file: FileId) {
        self.graph.discard_file(file);
    }

    /// Forgets everything but the interner and options.
    pub fn reset(&mut self) {
        self.entities.clear();
        self.fingerprints.clear();
        self.cache.clear();
        self.graph.clear();
        self.missing_context.store(0, Ordering::Relaxed);
    }

    /// Snapshot of the session counters.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            cache: self.cache.stats(),
            entities: self.entities.len(),
            pending_edges: self.graph.edge_count(),
            missing_context: self.missing_context.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn note_missing_context(&self, footprint: &Footprint) {
        self.missing_context.fetch_add(1, Ordering::Relaxed);
        if self.options.warn_missing_context {
            warn!(
                uses = footprint.len(),
                "query evaluated outside any consumer context; uses not recorded"
            );
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("options", &self.options)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DependencyKind;

    fn session() -> Session {
        Session::new(Arc::new(Interner::new()))
    }

    fn key(session: &Session, name: &str) -> EntityKey {
        EntityKey::top_level(session.interner().get_or_intern(name))
    }

    #[test]
    fn redeclaration_changes_fingerprint() {
        let session = session();
        let file = FileId::from_raw(0);
        let id = session.declare(key(&session, "f"), EntityKind::TopLevel, file, "func f ( ) -> Int");
        let before = session.fingerprint(id).unwrap();
        assert_eq!(session.fingerprint(id), Some(before));

        session.declare(key(&session, "f"), EntityKind::TopLevel, FileId::from_raw(1), "func f ( ) -> Bool");
        assert_ne!(session.fingerprint(id), Some(before));
    }

    #[test]
    fn drain_record_orders_and_empties() {
        let session = session();
        let file = FileId::from_raw(0);
        let g = session.declare(key(&session, "g"), EntityKind::TopLevel, file, "func g ( )");
        let f = session.declare(key(&session, "f"), EntityKind::TopLevel, file, "func f ( )");
        let private = session.declare(
            EntityKey::file_private(session.interner().get_or_intern("p"), file),
            EntityKind::TopLevel,
            file,
            "private let p = 1",
        );
        let string = session.intern(key(&session, "String"), EntityKind::Nominal);
        let count = session.intern(key(&session, "count"), EntityKind::Unresolved);

        let tracker = session.tracker();
        {
            let _file = tracker.enter_file(file);
            for decl in [g, f] {
                let _decl = tracker.enter_decl(decl);
                tracker.touch_entity(string);
            }
            tracker.touch_entity(count);
        }

        let record = session.drain_record(file, "main.input");
        assert_eq!(record.file, "main.input");
        let provided: Vec<&str> = record.provides.iter().map(|p| p.identifier.as_str()).collect();
        assert_eq!(provided, ["f", "g", "p"]);
        assert!(record.provides.iter().any(|p| p.sequence == private.as_raw() && p.private));

        let used: Vec<(&str, DependencyKind)> = record
            .depends
            .iter()
            .map(|d| (d.identifier.as_str(), d.kind))
            .collect();
        assert_eq!(
            used,
            [
                ("String", DependencyKind::UsesType),
                ("count", DependencyKind::UsesTopLevelName)
            ]
        );
        assert_eq!(record.consumers_of("String", DependencyKind::UsesType), ["f", "g"]);
        assert!(record.consumers_of("count", DependencyKind::UsesTopLevelName).is_empty());
        assert!(record.is_canonical());

        assert_eq!(session.stats().pending_edges, 0);
        let again = session.drain_record(file, "main.input");
        assert!(again.depends.is_empty());
        assert_eq!(again.interface_hash, record.interface_hash);
    }

    #[test]
    fn interface_hash_ignores_private_changes() {
        let file = FileId::from_raw(0);
        let build = |private_text: &str| {
            let session = session();
            session.declare(key(&session, "f"), EntityKind::TopLevel, file, "func f ( )");
            session.declare(
                EntityKey::file_private(session.interner().get_or_intern("p"), file),
                EntityKind::TopLevel,
                file,
                private_text,
            );
            session.drain_record(file, "a.input").interface_hash
        };
        assert_eq!(build("private let p = 1"), build("private let p : Int = 2"));
    }

    #[test]
    fn discard_drops_edges() {
        let session = session();
        let file = FileId::from_raw(0);
        let x = session.intern(key(&session, "x"), EntityKind::Unresolved);
        let tracker = session.tracker();
        let _file = tracker.enter_file(file);
        tracker.touch_entity(x);
        assert_eq!(session.edges_for(file).len(), 1);
        session.discard(file);
        assert!(session.edges_for(file).is_empty());
    }

    #[test]
    fn reset_forgets_batch_state() {
        let mut session = session();
        let file = FileId::from_raw(0);
        session.declare(key(&session, "f"), EntityKind::TopLevel, file, "func f ( )");
        {
            let tracker = session.tracker();
            let _file = tracker.enter_file(file);
            tracker.touch_key(key(&session, "y"), EntityKind::Unresolved, DependencyKind::UsesTopLevelName);
        }
        assert_eq!(session.stats().entities, 2);
        session.reset();
        let stats = session.stats();
        assert_eq!((stats.entities, stats.pending_edges), (0, 0));
    }
}
