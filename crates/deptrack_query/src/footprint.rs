//! The set of entity uses a query computation depends on.

use crate::entity::EntityId;
use crate::graph::DependencyKind;
use std::collections::BTreeSet;

/// One classified use of an entity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Use {
    /// The provider entity.
    pub entity: EntityId,
    /// How it was used.
    pub kind: DependencyKind,
}

/// The transitive uses of one query computation: what it touched itself plus
/// the footprints of every query it evaluated. Stored next to the memoized
/// value and replayed on every cache hit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Footprint {
    uses: BTreeSet<Use>,
}

impl Footprint {
    /// Creates an empty footprint.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a use; returns `false` if it was already present.
    pub fn insert(&mut self, entity: EntityId, kind: DependencyKind) -> bool {
        self.uses.insert(Use { entity, kind })
    }

    /// Adds every use of `other`.
    pub fn extend(&mut self, other: &Footprint) {
        self.uses.extend(other.uses.iter().copied());
    }

    /// Returns `true` if `entity` was used as `kind`.
    pub fn contains(&self, entity: EntityId, kind: DependencyKind) -> bool {
        self.uses.contains(&Use { entity, kind })
    }

    /// Iterates over the uses in `(entity, kind)` order.
    pub fn iter(&self) -> impl Iterator<Item = Use> + '_ {
        self.uses.iter().copied()
    }

    /// Number of distinct uses.
    pub fn len(&self) -> usize {
        self.uses.len()
    }

    /// Returns `true` if nothing was used.
    pub fn is_empty(&self) -> bool {
        self.uses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_deduplicates() {
        let mut fp = Footprint::new();
        let e = EntityId::from_raw(4);
        assert!(fp.insert(e, DependencyKind::UsesType));
        assert!(!fp.insert(e, DependencyKind::UsesType));
        assert!(fp.insert(e, DependencyKind::UsesTopLevelName));
        assert_eq!(fp.len(), 2);
    }

    #[test]
    fn extend_is_union() {
        let mut a = Footprint::new();
        a.insert(EntityId::from_raw(1), DependencyKind::UsesMember);
        let mut b = Footprint::new();
        b.insert(EntityId::from_raw(1), DependencyKind::UsesMember);
        b.insert(EntityId::from_raw(2), DependencyKind::UsesLiteralConversion);
        a.extend(&b);
        assert_eq!(a.len(), 2);
        assert!(a.contains(EntityId::from_raw(2), DependencyKind::UsesLiteralConversion));
    }
}
