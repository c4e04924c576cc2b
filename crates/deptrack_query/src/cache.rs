//! Memoized query results shared by all workers of a batch.
//!
//! Every query type gets its own memo table, created on first use and looked
//! up by `TypeId`. Each memo keeps the computed value together with the
//! query's [`Footprint`], which the [`Tracker`] replays whenever the memo is
//! served so that cache hits record the same edges a fresh computation would.

use crate::error::QueryError;
use crate::footprint::Footprint;
use crate::recorder::Tracker;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::any::{Any, TypeId};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A memoizable computation over a database.
///
/// The query value is the cache key, so it must be cheap to clone and hash.
/// `compute` reports what it depends on by touching entities on the tracker
/// and by evaluating further queries through it; it must not depend on
/// anything it does not report.
pub trait Query: Clone + Eq + Hash + Debug + Send + Sync + 'static {
    /// The memoized result.
    type Value: Clone + Send + Sync + 'static;
    /// The database the query reads from.
    type Db: ?Sized;

    /// Computes the value. Called at most once per key while the memo is
    /// resident, except when two workers race on the same miss.
    fn compute(&self, db: &Self::Db, tracker: &Tracker<'_>) -> Result<Self::Value, QueryError>;
}

#[derive(Clone)]
pub(crate) struct Memo<V> {
    pub(crate) value: V,
    pub(crate) footprint: Arc<Footprint>,
}

struct MemoTable<Q: Query> {
    memos: RwLock<FxHashMap<Q, Memo<Q::Value>>>,
}

trait ErasedTable: Send + Sync {
    fn len(&self) -> usize;
    fn clear(&self);
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<Q: Query> ErasedTable for MemoTable<Q> {
    fn len(&self) -> usize {
        self.memos.read().len()
    }

    fn clear(&self) {
        self.memos.write().clear();
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Counters describing cache behaviour over a batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Evaluations answered from a memo.
    pub hits: u64,
    /// Evaluations that ran `compute`.
    pub misses: u64,
    /// Computations whose result lost an insertion race and was dropped.
    pub discarded: u64,
    /// Evaluations rejected as cyclic.
    pub cycles: u64,
    /// Memos currently resident.
    pub entries: usize,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    discarded: AtomicU64,
    cycles: AtomicU64,
}

/// Type-erased store of memo tables, one per query type.
#[derive(Default)]
pub struct QueryCache {
    tables: RwLock<FxHashMap<TypeId, Arc<dyn ErasedTable>>>,
    counters: Counters,
}

impl QueryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn table<Q: Query>(&self) -> Arc<MemoTable<Q>> {
        let type_id = TypeId::of::<Q>();
        let erased = {
            let tables = self.tables.read();
            tables.get(&type_id).cloned()
        };
        let erased = match erased {
            Some(table) => table,
            None => self
                .tables
                .write()
                .entry(type_id)
                .or_insert_with(|| {
                    Arc::new(MemoTable::<Q> {
                        memos: RwLock::new(FxHashMap::default()),
                    })
                })
                .clone(),
        };
        match erased.as_any().downcast::<MemoTable<Q>>() {
            Ok(table) => table,
            Err(_) => unreachable!("memo table registered under a foreign TypeId"),
        }
    }

    pub(crate) fn lookup<Q: Query>(&self, query: &Q) -> Option<Memo<Q::Value>> {
        let memo = self.table::<Q>().memos.read().get(query).cloned();
        match memo {
            Some(_) => self.counters.hits.fetch_add(1, Ordering::Relaxed),
            None => self.counters.misses.fetch_add(1, Ordering::Relaxed),
        };
        memo
    }

    /// Inserts a computed memo unless another worker got there first, in
    /// which case the resident memo wins and is returned instead.
    pub(crate) fn insert<Q: Query>(&self, query: Q, memo: Memo<Q::Value>) -> Memo<Q::Value> {
        let table = self.table::<Q>();
        let mut memos = table.memos.write();
        match memos.get(&query) {
            Some(existing) => {
                self.counters.discarded.fetch_add(1, Ordering::Relaxed);
                existing.clone()
            }
            None => {
                memos.insert(query, memo.clone());
                memo
            }
        }
    }

    pub(crate) fn note_cycle(&self) {
        self.counters.cycles.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns `true` if `query` has a resident memo. Does not count as a hit.
    pub fn contains<Q: Query>(&self, query: &Q) -> bool {
        self.table::<Q>().memos.read().contains_key(query)
    }

    /// Number of resident memos over all query types.
    pub fn len(&self) -> usize {
        self.tables.read().values().map(|t| t.len()).sum()
    }

    /// Returns `true` if no memo is resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            discarded: self.counters.discarded.load(Ordering::Relaxed),
            cycles: self.counters.cycles.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    /// Drops every memo. Counters are kept.
    pub(crate) fn clear(&self) {
        for table in self.tables.read().values() {
            table.clear();
        }
    }
}
