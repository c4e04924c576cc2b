//! Interface fingerprints of entities.

use crate::entity::{Entity, EntityId};
use deptrack_common::{ContentHash, ContentHasher, Interner};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Computes and memoizes one fingerprint per entity.
///
/// The fingerprint covers the entity's kind, its identifier and the interface
/// text supplied when it was declared, never its implementation. Identical
/// interface text always yields the same hash, in this batch or any other.
#[derive(Default)]
pub struct FingerprintStore {
    memo: RwLock<FxHashMap<EntityId, ContentHash>>,
}

impl FingerprintStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the fingerprint of `entity`, computing it on first request.
    pub fn fingerprint(&self, id: EntityId, entity: &Entity, interner: &Interner) -> ContentHash {
        if let Some(&hash) = self.memo.read().get(&id) {
            return hash;
        }
        let hash = interface_fingerprint(entity, interner);
        self.memo.write().insert(id, hash);
        hash
    }

    /// Forgets the memoized fingerprint of `id` after its interface changed.
    pub fn invalidate(&self, id: EntityId) {
        self.memo.write().remove(&id);
    }

    pub(crate) fn clear(&self) {
        self.memo.write().clear();
    }
}

/// Hashes `kind ‖ identifier ‖ interface`. Undeclared entities hash their
/// identifier only.
pub fn interface_fingerprint(entity: &Entity, interner: &Interner) -> ContentHash {
    let mut hasher = ContentHasher::new();
    hasher
        .write_str(entity.kind.as_str())
        .write_str(&entity.key.render(interner));
    match &entity.interface {
        Some(text) => hasher.write_u32(1).write_str(text),
        None => hasher.write_u32(0),
    };
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityKey, EntityKind};
    use std::sync::Arc;

    fn entity(interner: &Interner, name: &str, interface: Option<&str>) -> Entity {
        Entity {
            key: EntityKey::top_level(interner.get_or_intern(name)),
            kind: EntityKind::TopLevel,
            file: None,
            contributors: Vec::new(),
            interface: interface.map(Arc::from),
        }
    }

    #[test]
    fn same_interface_same_hash() {
        let interner = Interner::new();
        let a = entity(&interner, "v", Some("fileprivate var v : String"));
        let b = entity(&interner, "v", Some("fileprivate var v : String"));
        assert_eq!(
            interface_fingerprint(&a, &interner),
            interface_fingerprint(&b, &interner)
        );
    }

    #[test]
    fn signature_change_changes_hash() {
        let interner = Interner::new();
        let a = entity(&interner, "v", Some("fileprivate var v : String"));
        let b = entity(&interner, "v", Some("fileprivate var v : Int"));
        assert_ne!(
            interface_fingerprint(&a, &interner),
            interface_fingerprint(&b, &interner)
        );
    }

    #[test]
    fn declared_and_undeclared_differ() {
        let interner = Interner::new();
        let declared = entity(&interner, "x", Some(""));
        let undeclared = entity(&interner, "x", None);
        assert_ne!(
            interface_fingerprint(&declared, &interner),
            interface_fingerprint(&undeclared, &interner)
        );
    }

    #[test]
    fn memo_and_invalidate() {
        let interner = Interner::new();
        let store = FingerprintStore::new();
        let id = EntityId::from_raw(0);
        let old = entity(&interner, "f", Some("func f ( ) -> Int"));
        let new = entity(&interner, "f", Some("func f ( ) -> Bool"));
        let first = store.fingerprint(id, &old, &interner);
        // memoized: a different entity under the same id still answers the old hash
        assert_eq!(store.fingerprint(id, &new, &interner), first);
        store.invalidate(id);
        assert_ne!(store.fingerprint(id, &new, &interner), first);
    }
}
