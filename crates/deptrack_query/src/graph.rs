//! The batch-wide dependency graph, partitioned by consumer file.

use crate::context::ConsumerContext;
use crate::entity::{EntityId, EntityKind, EntityTable};
use crate::footprint::Footprint;
use deptrack_common::Interner;
use deptrack_source::FileId;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a consumer depends on a provider.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyKind {
    /// Looked up a top-level name or operator.
    UsesTopLevelName,
    /// Referred to a nominal type.
    UsesType,
    /// Looked up a member of a type.
    UsesMember,
    /// Looked up a member through `AnyObject`.
    UsesDynamicLookup,
    /// Converted a literal through its default type.
    UsesLiteralConversion,
    /// Depended on a class's superclass chain.
    InheritsSuperclass,
}

impl DependencyKind {
    /// Every kind, in record order.
    pub const ALL: [DependencyKind; 6] = [
        DependencyKind::UsesTopLevelName,
        DependencyKind::UsesType,
        DependencyKind::UsesMember,
        DependencyKind::UsesDynamicLookup,
        DependencyKind::UsesLiteralConversion,
        DependencyKind::InheritsSuperclass,
    ];

    /// Returns the kebab-case name used in records.
    pub fn as_str(self) -> &'static str {
        match self {
            DependencyKind::UsesTopLevelName => "uses-top-level-name",
            DependencyKind::UsesType => "uses-type",
            DependencyKind::UsesMember => "uses-member",
            DependencyKind::UsesDynamicLookup => "uses-dynamic-lookup",
            DependencyKind::UsesLiteralConversion => "uses-literal-conversion",
            DependencyKind::InheritsSuperclass => "inherits-superclass",
        }
    }

    /// Parses a kebab-case name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    /// The dependency kinds implied by touching an entity of `kind` without a
    /// more specific use.
    pub fn classify(kind: EntityKind) -> &'static [DependencyKind] {
        match kind {
            EntityKind::TopLevel | EntityKind::Operator | EntityKind::Unresolved => {
                &[DependencyKind::UsesTopLevelName]
            }
            EntityKind::Nominal => &[DependencyKind::UsesType],
            EntityKind::Member => &[DependencyKind::UsesMember],
            EntityKind::DynamicLookup => &[DependencyKind::UsesDynamicLookup],
            EntityKind::LiteralConversion => &[DependencyKind::UsesLiteralConversion],
            EntityKind::Extension => &[DependencyKind::UsesType, DependencyKind::UsesMember],
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A consumer context depends on a provider entity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DependencyEdge {
    /// The file and declaration that issued the use.
    pub consumer: ConsumerContext,
    /// The entity used.
    pub provider: EntityId,
    /// How it was used.
    pub kind: DependencyKind,
}

/// Edge sets keyed by consumer file.
///
/// Workers only ever add to their own primary file's partition, so a single
/// mutex around the map is only contended for the duration of an insert.
#[derive(Default)]
pub struct DependencyGraph {
    files: Mutex<FxHashMap<FileId, FxHashSet<DependencyEdge>>>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one edge. Returns `false` if it was already present.
    pub fn add_edge(&self, edge: DependencyEdge) -> bool {
        self.files
            .lock()
            .entry(edge.consumer.file)
            .or_default()
            .insert(edge)
    }

    /// Adds an edge from `consumer` for every use in `footprint`.
    pub fn record(&self, consumer: ConsumerContext, footprint: &Footprint) {
        if footprint.is_empty() {
            return;
        }
        let mut files = self.files.lock();
        let edges = files.entry(consumer.file).or_default();
        for u in footprint.iter() {
            edges.insert(DependencyEdge {
                consumer,
                provider: u.entity,
                kind: u.kind,
            });
        }
    }

    /// Returns the edges of `file` in deterministic order: by provider
    /// identifier, then kind, then consumer declaration identifier, with the
    /// raw provider id only breaking ties between equal identifiers.
    pub fn edges_for(
        &self,
        file: FileId,
        entities: &EntityTable,
        interner: &Interner,
    ) -> Vec<DependencyEdge> {
        let edges: Vec<DependencyEdge> = self
            .files
            .lock()
            .get(&file)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        sort_edges(edges, entities, interner)
    }

    /// Removes and returns the edges of `file`, sorted as in [`edges_for`](Self::edges_for).
    pub fn take_file(
        &self,
        file: FileId,
        entities: &EntityTable,
        interner: &Interner,
    ) -> Vec<DependencyEdge> {
        let edges: Vec<DependencyEdge> = self
            .files
            .lock()
            .remove(&file)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        sort_edges(edges, entities, interner)
    }

    /// Drops the edges of `file` without producing them.
    pub fn discard_file(&self, file: FileId) {
        self.files.lock().remove(&file);
    }

    /// Total number of edges over all files.
    pub fn edge_count(&self) -> usize {
        self.files.lock().values().map(FxHashSet::len).sum()
    }

    /// Removes every edge.
    pub fn clear(&self) {
        self.files.lock().clear();
    }
}

fn sort_edges(
    edges: Vec<DependencyEdge>,
    entities: &EntityTable,
    interner: &Interner,
) -> Vec<DependencyEdge> {
    let render = |id: EntityId| {
        entities
            .key(id)
            .map(|key| key.render(interner))
            .unwrap_or_default()
    };
    let mut keyed: Vec<((String, DependencyKind, String, EntityId), DependencyEdge)> = edges
        .into_iter()
        .map(|edge| {
            let consumer = edge.consumer.decl.map(render).unwrap_or_default();
            ((render(edge.provider), edge.kind, consumer, edge.provider), edge)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.into_iter().map(|(_, edge)| edge).collect()
}
