//! Per-worker query evaluation with dependency recording.
//!
//! A [`Tracker`] belongs to exactly one worker. It owns the worker's consumer
//! context stack and the stack of queries currently being computed. Every
//! entity touched during a computation lands in the innermost query frame;
//! when the query finishes, its footprint is memoized with the value, merged
//! into the enclosing frame, and recorded against the current consumer.
//! A cache hit replays the memoized footprint the same way, so whether a
//! value was computed or reused never changes the recorded edges.

use crate::cache::{Memo, Query};
use crate::context::{ConsumerContext, ContextGuard, ContextStack};
use crate::entity::{EntityId, EntityKey, EntityKind};
use crate::error::QueryError;
use crate::footprint::Footprint;
use crate::graph::DependencyKind;
use crate::session::Session;
use deptrack_source::FileId;
use std::any::Any;
use std::cell::RefCell;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::trace;

trait ActiveQuery {
    fn as_any(&self) -> &dyn Any;
    fn describe(&self) -> String;
}

impl<Q: Query> ActiveQuery for Q {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn describe(&self) -> String {
        format!("{self:?}")
    }
}

struct Frame {
    query: Box<dyn ActiveQuery>,
    footprint: Footprint,
}

/// Pops a query frame on drop, including when `compute` unwinds.
struct FrameGuard<'a> {
    frames: &'a RefCell<Vec<Frame>>,
    depth: usize,
}

impl<'a> FrameGuard<'a> {
    fn push(frames: &'a RefCell<Vec<Frame>>, query: Box<dyn ActiveQuery>) -> Self {
        let mut stack = frames.borrow_mut();
        let depth = stack.len();
        stack.push(Frame {
            query,
            footprint: Footprint::new(),
        });
        Self { frames, depth }
    }

    fn finish(self) -> Footprint {
        self.frames
            .borrow_mut()
            .get_mut(self.depth)
            .map(|frame| std::mem::take(&mut frame.footprint))
            .unwrap_or_default()
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.frames.borrow_mut().truncate(self.depth);
    }
}

/// One worker's view of a [`Session`].
///
/// Not `Sync`: create one per thread with [`Session::tracker`].
pub struct Tracker<'s> {
    session: &'s Session,
    contexts: RefCell<ContextStack>,
    frames: RefCell<Vec<Frame>>,
}

impl<'s> Tracker<'s> {
    /// Creates a tracker with empty context and query stacks.
    pub fn new(session: &'s Session) -> Self {
        Self {
            session,
            contexts: RefCell::new(ContextStack::new()),
            frames: RefCell::new(Vec::new()),
        }
    }

    /// The session this tracker records into.
    pub fn session(&self) -> &'s Session {
        self.session
    }

    /// Evaluates `query`, reusing a memoized value when one is resident.
    ///
    /// Hit or miss, the query's footprint is attributed to the innermost
    /// consumer context and to the enclosing query. A failed computation is
    /// not memoized, but whatever it touched before failing is still
    /// attributed.
    pub fn evaluate<Q: Query>(&self, db: &Q::Db, query: Q) -> Result<Q::Value, QueryError> {
        let cache = self.session.cache();
        if let Some(memo) = cache.lookup(&query) {
            trace!(?query, uses = memo.footprint.len(), "query hit");
            self.attribute(&memo.footprint);
            return Ok(memo.value);
        }

        if let Some(cycle) = self.find_cycle(&query) {
            cache.note_cycle();
            trace!(?query, "query cycle");
            return Err(cycle);
        }

        let frame = FrameGuard::push(&self.frames, Box::new(query.clone()));
        let result = query.compute(db, self);
        let footprint = frame.finish();

        match result {
            Ok(value) => {
                trace!(?query, uses = footprint.len(), "query computed");
                let memo = cache.insert(
                    query,
                    Memo {
                        value,
                        footprint: Arc::new(footprint),
                    },
                );
                self.attribute(&memo.footprint);
                Ok(memo.value)
            }
            Err(err) => {
                self.attribute(&footprint);
                Err(err)
            }
        }
    }

    /// Reports a use of `entity` as `kind` by the running computation.
    pub fn touch(&self, entity: EntityId, kind: DependencyKind) {
        {
            let mut frames = self.frames.borrow_mut();
            if let Some(frame) = frames.last_mut() {
                frame.footprint.insert(entity, kind);
                return;
            }
        }
        let mut footprint = Footprint::new();
        footprint.insert(entity, kind);
        self.attribute(&footprint);
    }

    /// Reports a use of `entity` classified by its entity kind.
    pub fn touch_entity(&self, entity: EntityId) {
        let kind = self
            .session
            .entities()
            .kind(entity)
            .unwrap_or(EntityKind::Unresolved);
        for &dep in DependencyKind::classify(kind) {
            self.touch(entity, dep);
        }
    }

    /// Interns `key` and reports a use of it as `kind`.
    pub fn touch_key(&self, key: EntityKey, entity_kind: EntityKind, kind: DependencyKind) -> EntityId {
        let id = self.session.intern(key, entity_kind);
        self.touch(id, kind);
        id
    }

    /// Makes `context` the innermost consumer until the guard drops.
    pub fn enter(&self, context: ConsumerContext) -> ContextGuard<'_> {
        ContextGuard::push(&self.contexts, context)
    }

    /// Enters a file-level consumer context.
    pub fn enter_file(&self, file: FileId) -> ContextGuard<'_> {
        self.enter(ConsumerContext::file(file))
    }

    /// Enters a declaration-level consumer context inside the current file,
    /// or the declaration's own file when no file context is active.
    pub fn enter_decl(&self, decl: EntityId) -> ContextGuard<'_> {
        let file = self
            .current_context()
            .map(|ctx| ctx.file)
            .or_else(|| self.session.entities().get(decl).and_then(|e| e.file))
            .unwrap_or(FileId::DUMMY);
        self.enter(ConsumerContext::decl(file, decl))
    }

    /// The innermost consumer context, if any.
    pub fn current_context(&self) -> Option<ConsumerContext> {
        self.contexts.borrow().current()
    }

    /// Number of queries currently being computed on this worker.
    pub fn active_queries(&self) -> usize {
        self.frames.borrow().len()
    }

    fn find_cycle<Q: Query>(&self, query: &Q) -> Option<QueryError> {
        let frames = self.frames.borrow();
        let start = frames
            .iter()
            .position(|frame| frame.query.as_any().downcast_ref::<Q>() == Some(query))?;
        Some(QueryError::Cyclic {
            query: format!("{query:?}"),
            stack: frames[start..].iter().map(|f| f.query.describe()).collect(),
        })
    }

    fn attribute(&self, footprint: &Footprint) {
        if footprint.is_empty() {
            return;
        }
        let outermost = {
            let mut frames = self.frames.borrow_mut();
            match frames.last_mut() {
                Some(parent) => {
                    parent.footprint.extend(footprint);
                    false
                }
                None => true,
            }
        };
        match self.current_context() {
            Some(context) => self.session.graph().record(context, footprint),
            // an enclosing query reports it once it finishes
            None if !outermost => {}
            None => self.session.note_missing_context(footprint),
        }
    }
}

impl Debug for Tracker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("context", &self.current_context())
            .field("active_queries", &self.active_queries())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKey;
    use crate::session::SessionOptions;
    use deptrack_common::Interner;
    use std::sync::Arc;

    /// Names known to the toy database; anything else resolves to nothing.
    struct Names {
        known: Vec<&'static str>,
    }

    fn db() -> Names {
        Names {
            known: vec!["x", "base", "link1", "link2", "link3"],
        }
    }

    #[derive(Clone, PartialEq, Eq, Hash, Debug)]
    struct Lookup(&'static str);

    impl Query for Lookup {
        type Value = bool;
        type Db = Names;

        fn compute(&self, db: &Names, tracker: &Tracker<'_>) -> Result<bool, QueryError> {
            let name = tracker.session().interner().get_or_intern(self.0);
            tracker.touch_key(
                EntityKey::top_level(name),
                EntityKind::Unresolved,
                DependencyKind::UsesTopLevelName,
            );
            Ok(db.known.contains(&self.0))
        }
    }

    #[derive(Clone, PartialEq, Eq, Hash, Debug)]
    struct Chain(u32);

    impl Query for Chain {
        type Value = u32;
        type Db = Names;

        fn compute(&self, db: &Names, tracker: &Tracker<'_>) -> Result<u32, QueryError> {
            match self.0 {
                0 => {
                    tracker.evaluate(db, Lookup("base"))?;
                    Ok(0)
                }
                n => {
                    let link: &'static str = ["link1", "link2", "link3"][(n as usize - 1) % 3];
                    tracker.evaluate(db, Lookup(link))?;
                    Ok(tracker.evaluate(db, Chain(n - 1))? + 1)
                }
            }
        }
    }

    #[derive(Clone, PartialEq, Eq, Hash, Debug)]
    struct Cyclic(u32);

    impl Query for Cyclic {
        type Value = ();
        type Db = Names;

        fn compute(&self, db: &Names, tracker: &Tracker<'_>) -> Result<(), QueryError> {
            let name = if self.0 == 0 { "cyc0" } else { "cyc1" };
            tracker.evaluate(db, Lookup(name))?;
            tracker.evaluate(db, Cyclic((self.0 + 1) % 2))
        }
    }

    #[derive(Clone, PartialEq, Eq, Hash, Debug)]
    struct Boom;

    impl Query for Boom {
        type Value = ();
        type Db = Names;

        fn compute(&self, db: &Names, tracker: &Tracker<'_>) -> Result<(), QueryError> {
            tracker.evaluate(db, Lookup("x"))?;
            panic!("checker bug");
        }
    }

    fn session() -> Session {
        Session::new(Arc::new(Interner::new()))
    }

    fn provider_names(session: &Session, file: FileId) -> Vec<String> {
        session
            .edges_for(file)
            .iter()
            .map(|e| session.identifier(e.provider).unwrap())
            .collect()
    }

    #[test]
    fn cache_hit_still_records_edge() {
        let session = session();
        let tracker = session.tracker();
        let db = db();
        let a = FileId::from_raw(0);
        let b = FileId::from_raw(1);

        {
            let _file = tracker.enter_file(a);
            assert!(tracker.evaluate(&db, Lookup("x")).unwrap());
        }
        {
            let _file = tracker.enter_file(b);
            assert!(tracker.evaluate(&db, Lookup("x")).unwrap());
        }

        assert_eq!(session.cache().stats().hits, 1);
        assert_eq!(provider_names(&session, a), ["x"]);
        assert_eq!(provider_names(&session, b), ["x"]);
    }

    #[test]
    fn hit_replays_transitive_footprint() {
        let session = session();
        let tracker = session.tracker();
        let db = db();
        let a = FileId::from_raw(0);
        let b = FileId::from_raw(1);
        let c = FileId::from_raw(2);

        {
            let _file = tracker.enter_file(a);
            assert_eq!(tracker.evaluate(&db, Chain(2)).unwrap(), 2);
        }
        {
            let _file = tracker.enter_file(b);
            assert_eq!(tracker.evaluate(&db, Chain(2)).unwrap(), 2);
        }
        {
            let _file = tracker.enter_file(c);
            assert_eq!(tracker.evaluate(&db, Chain(1)).unwrap(), 1);
        }

        assert_eq!(provider_names(&session, a), ["base", "link1", "link2"]);
        assert_eq!(provider_names(&session, b), ["base", "link1", "link2"]);
        assert_eq!(provider_names(&session, c), ["base", "link1"]);
    }

    #[test]
    fn no_context_no_edge() {
        let session = Session::with_options(
            Arc::new(Interner::new()),
            SessionOptions {
                warn_missing_context: false,
            },
        );
        let tracker = session.tracker();
        let db = db();

        tracker.evaluate(&db, Chain(1)).unwrap();
        assert_eq!(session.graph().edge_count(), 0);
        // one report for the outermost evaluation, none for the nested ones
        assert_eq!(session.stats().missing_context, 1);

        let file = FileId::from_raw(3);
        let _file = tracker.enter_file(file);
        tracker.evaluate(&db, Chain(1)).unwrap();
        assert_eq!(provider_names(&session, file), ["base", "link1"]);
    }

    #[test]
    fn touch_outside_query_records_directly() {
        let session = session();
        let tracker = session.tracker();
        let file = FileId::from_raw(0);
        let string = session.interner().get_or_intern("String");
        let id = session.intern(EntityKey::top_level(string), EntityKind::Nominal);

        let _file = tracker.enter_file(file);
        tracker.touch_entity(id);
        let edges = session.edges_for(file);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].kind, DependencyKind::UsesType);
    }

    #[test]
    fn cycle_is_an_error_and_not_cached() {
        let session = session();
        let tracker = session.tracker();
        let db = db();
        let file = FileId::from_raw(0);
        let _file = tracker.enter_file(file);

        let err = tracker.evaluate(&db, Cyclic(0)).unwrap_err();
        assert_eq!(
            err,
            QueryError::Cyclic {
                query: "Cyclic(0)".to_string(),
                stack: vec!["Cyclic(0)".to_string(), "Cyclic(1)".to_string()],
            }
        );
        assert!(!session.cache().contains(&Cyclic(0)));
        assert!(!session.cache().contains(&Cyclic(1)));
        assert_eq!(session.cache().stats().cycles, 1);
        assert_eq!(tracker.active_queries(), 0);
        assert_eq!(tracker.current_context(), Some(ConsumerContext::file(file)));
        // what the failed computations touched is still attributed
        assert_eq!(provider_names(&session, file), ["cyc0", "cyc1"]);

        // a second attempt fails the same way instead of reading a poisoned memo
        assert!(tracker.evaluate(&db, Cyclic(1)).is_err());
    }

    #[test]
    fn panic_in_compute_restores_stacks() {
        let session = session();
        let tracker = session.tracker();
        let db = db();
        let file = FileId::from_raw(0);
        let _file = tracker.enter_file(file);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let decl = session.intern(
                EntityKey::top_level(session.interner().get_or_intern("f")),
                EntityKind::TopLevel,
            );
            let _decl = tracker.enter_decl(decl);
            tracker.evaluate(&db, Boom)
        }));
        assert!(result.is_err());
        assert_eq!(tracker.active_queries(), 0);
        assert_eq!(tracker.current_context(), Some(ConsumerContext::file(file)));
        assert!(!session.cache().contains(&Boom));
        assert!(tracker.evaluate(&db, Lookup("x")).unwrap());
    }

    #[test]
    fn edges_go_to_innermost_context() {
        let session = session();
        let tracker = session.tracker();
        let db = db();
        let file = FileId::from_raw(0);
        let f = session.declare(
            EntityKey::top_level(session.interner().get_or_intern("f")),
            EntityKind::TopLevel,
            file,
            "func f ( )",
        );

        let _file = tracker.enter_file(file);
        {
            let _decl = tracker.enter_decl(f);
            assert_eq!(tracker.current_context(), Some(ConsumerContext::decl(file, f)));
            tracker.evaluate(&db, Lookup("x")).unwrap();
        }
        tracker.evaluate(&db, Lookup("base")).unwrap();

        let edges = session.edges_for(file);
        assert_eq!(edges.len(), 2);
        assert_eq!(session.identifier(edges[0].provider).as_deref(), Some("base"));
        assert_eq!(edges[0].consumer.decl, None);
        assert_eq!(session.identifier(edges[1].provider).as_deref(), Some("x"));
        assert_eq!(edges[1].consumer.decl, Some(f));
    }

    #[test]
    fn racing_workers_record_identical_edges() {
        let session = session();
        let db = db();
        let files: Vec<FileId> = (0..8).map(FileId::from_raw).collect();

        std::thread::scope(|scope| {
            for &file in &files {
                let session = &session;
                let db = &db;
                scope.spawn(move || {
                    let tracker = session.tracker();
                    let _file = tracker.enter_file(file);
                    assert_eq!(tracker.evaluate(db, Chain(3)).unwrap(), 3);
                });
            }
        });

        for &file in &files {
            assert_eq!(
                provider_names(&session, file),
                ["base", "link1", "link2", "link3"]
            );
        }
        let stats = session.cache().stats();
        assert_eq!(stats.entries, 8);
    }
}
