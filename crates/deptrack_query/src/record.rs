//! The per-file reference-dependency record.

use crate::entity::{EntityId, EntityKind};
use crate::graph::{DependencyEdge, DependencyKind};
use crate::session::Session;
use deptrack_common::{ContentHash, ContentHasher};
use std::collections::BTreeMap;

/// An entity declared in the recorded file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvidedEntity {
    /// Batch-local sequence number. Only meaningful inside this record.
    pub sequence: u32,
    /// Stable identifier.
    pub identifier: String,
    /// Entity kind tag.
    pub kind: EntityKind,
    /// Interface fingerprint.
    pub fingerprint: ContentHash,
    /// `true` for `private`/`fileprivate` top-level names.
    pub private: bool,
}

/// An entity the recorded file depends on, with the declarations that use it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UsedEntity {
    /// Batch-local sequence number of the provider.
    pub sequence: u32,
    /// Stable identifier of the provider.
    pub identifier: String,
    /// How it is used.
    pub kind: DependencyKind,
    /// Sequence numbers of the consuming declarations, sorted by their
    /// identifiers. File-level uses contribute no consumer.
    pub consumers: Vec<u32>,
}

/// Everything one primary file provides and depends on, in canonical order.
///
/// Both lists are sorted by `(identifier, kind)`, so two runs over the same
/// inputs produce records that differ at most in sequence numbers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRecord {
    /// Display name of the recorded file.
    pub file: String,
    /// Hash over the identifiers, kinds and fingerprints of the file's
    /// non-private provided entities.
    pub interface_hash: ContentHash,
    /// Declarations of the file.
    pub provides: Vec<ProvidedEntity>,
    /// Uses made while processing the file.
    pub depends: Vec<UsedEntity>,
}

impl FileRecord {
    /// Assembles the record of `file` from its declarations and drained edges.
    pub(crate) fn build(
        session: &Session,
        name: &str,
        declared: Vec<EntityId>,
        edges: &[DependencyEdge],
    ) -> Self {
        let identifier = |id: EntityId| session.identifier(id).unwrap_or_default();

        let mut provides: Vec<ProvidedEntity> = declared
            .into_iter()
            .filter_map(|id| {
                let entity = session.entities().get(id)?;
                Some(ProvidedEntity {
                    sequence: id.as_raw(),
                    identifier: identifier(id),
                    kind: entity.kind,
                    fingerprint: session.fingerprint(id)?,
                    private: entity.is_file_private(),
                })
            })
            .collect();
        provides.sort_by(|a, b| {
            (&a.identifier, a.kind, a.sequence).cmp(&(&b.identifier, b.kind, b.sequence))
        });

        let mut grouped: BTreeMap<(String, DependencyKind, EntityId), Vec<(String, u32)>> =
            BTreeMap::new();
        for edge in edges {
            let consumers = grouped
                .entry((identifier(edge.provider), edge.kind, edge.provider))
                .or_default();
            if let Some(decl) = edge.consumer.decl {
                consumers.push((identifier(decl), decl.as_raw()));
            }
        }
        let mut depends: Vec<(Vec<String>, UsedEntity)> = grouped
            .into_iter()
            .map(|((identifier, kind, provider), mut consumers)| {
                consumers.sort();
                consumers.dedup();
                let names = consumers.iter().map(|(name, _)| name.clone()).collect();
                let used = UsedEntity {
                    sequence: provider.as_raw(),
                    identifier,
                    kind,
                    consumers: consumers.into_iter().map(|(_, seq)| seq).collect(),
                };
                (names, used)
            })
            .collect();
        // equal identifiers only arise for distinct providers; order those
        // by who uses them before falling back to the sequence number
        depends.sort_by(|(an, a), (bn, b)| {
            (&a.identifier, a.kind, an, a.sequence).cmp(&(&b.identifier, b.kind, bn, b.sequence))
        });

        Self {
            file: name.to_string(),
            interface_hash: Self::compute_interface_hash(&provides),
            provides,
            depends: depends.into_iter().map(|(_, used)| used).collect(),
        }
    }

    /// Hashes the non-private entries of `provides` in their given order.
    pub fn compute_interface_hash(provides: &[ProvidedEntity]) -> ContentHash {
        let mut hasher = ContentHasher::new();
        for entity in provides.iter().filter(|p| !p.private) {
            hasher
                .write_str(&entity.identifier)
                .write_str(entity.kind.as_str())
                .write_hash(entity.fingerprint);
        }
        hasher.finish()
    }

    /// Returns `true` if the file uses `identifier` as `kind`.
    pub fn uses(&self, identifier: &str, kind: DependencyKind) -> bool {
        self.depends
            .iter()
            .any(|d| d.identifier == identifier && d.kind == kind)
    }

    /// Returns `true` if the file uses `identifier` in any way.
    pub fn uses_entity(&self, identifier: &str) -> bool {
        self.depends.iter().any(|d| d.identifier == identifier)
    }

    /// Returns `true` if the file declares `identifier`.
    pub fn provides_entity(&self, identifier: &str) -> bool {
        self.provides.iter().any(|p| p.identifier == identifier)
    }

    /// Resolves a consumer sequence number to the identifier of the
    /// declaration it names.
    pub fn identifier_of(&self, sequence: u32) -> Option<&str> {
        self.provides
            .iter()
            .find(|p| p.sequence == sequence)
            .map(|p| p.identifier.as_str())
    }

    /// The identifiers of the declarations using `identifier` as `kind`.
    pub fn consumers_of(&self, identifier: &str, kind: DependencyKind) -> Vec<&str> {
        self.depends
            .iter()
            .filter(|d| d.identifier == identifier && d.kind == kind)
            .flat_map(|d| d.consumers.iter())
            .filter_map(|&seq| self.identifier_of(seq))
            .collect()
    }

    /// Returns `true` if both lists are in canonical order and the interface
    /// hash matches the provided entities.
    pub fn is_canonical(&self) -> bool {
        let provides_sorted = self
            .provides
            .windows(2)
            .all(|w| (&w[0].identifier, w[0].kind) <= (&w[1].identifier, w[1].kind));
        let depends_sorted = self
            .depends
            .windows(2)
            .all(|w| (&w[0].identifier, w[0].kind) <= (&w[1].identifier, w[1].kind));
        let consumers_sorted = self.depends.iter().all(|d| {
            d.consumers
                .windows(2)
                .all(|w| self.identifier_of(w[0]) <= self.identifier_of(w[1]))
        });
        provides_sorted
            && depends_sorted
            && consumers_sorted
            && self.interface_hash == Self::compute_interface_hash(&self.provides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provided(identifier: &str, private: bool, byte: u8) -> ProvidedEntity {
        ProvidedEntity {
            sequence: byte as u32,
            identifier: identifier.to_string(),
            kind: EntityKind::TopLevel,
            fingerprint: ContentHash::from_bytes(&[byte]),
            private,
        }
    }

    #[test]
    fn interface_hash_ignores_private_entities() {
        let public = vec![provided("a", false, 1)];
        let mut with_private = public.clone();
        with_private.push(provided("z", true, 2));
        assert_eq!(
            FileRecord::compute_interface_hash(&public),
            FileRecord::compute_interface_hash(&with_private)
        );
    }

    #[test]
    fn interface_hash_tracks_fingerprints() {
        let a = vec![provided("a", false, 1)];
        let b = vec![provided("a", false, 2)];
        assert_ne!(
            FileRecord::compute_interface_hash(&a),
            FileRecord::compute_interface_hash(&b)
        );
    }

    #[test]
    fn queries_over_lists() {
        let provides = vec![provided("f", false, 1), provided("g", false, 2)];
        let record = FileRecord {
            file: "main.input".to_string(),
            interface_hash: FileRecord::compute_interface_hash(&provides),
            provides,
            depends: vec![UsedEntity {
                sequence: 9,
                identifier: "String".to_string(),
                kind: DependencyKind::UsesType,
                consumers: vec![1, 2],
            }],
        };
        assert!(record.is_canonical());
        assert!(record.uses("String", DependencyKind::UsesType));
        assert!(!record.uses("String", DependencyKind::UsesMember));
        assert!(record.uses_entity("String"));
        assert!(record.provides_entity("g"));
        assert_eq!(record.consumers_of("String", DependencyKind::UsesType), ["f", "g"]);
    }

    #[test]
    fn unsorted_record_is_not_canonical() {
        let provides = vec![provided("g", false, 1), provided("f", false, 2)];
        let record = FileRecord {
            file: "main.input".to_string(),
            interface_hash: FileRecord::compute_interface_hash(&provides),
            provides,
            depends: Vec::new(),
        };
        assert!(!record.is_canonical());
    }
}
