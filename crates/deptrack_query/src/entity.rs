//! Dependency-trackable entities and the batch-local table that interns them.

use deptrack_common::{Ident, Interner};
use deptrack_source::FileId;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Batch-local handle to an interned entity.
///
/// Ids are handed out in interning order, which depends on worker
/// scheduling. Records expose the raw value as a sequence number that carries
/// no meaning across runs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates an `EntityId` from a raw index. Intended for tests.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// The name space an entity's name lives in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Namespace {
    /// Top-level values, functions, types and typealiases.
    TopLevel,
    /// Operator declarations (`infix operator +++`).
    Operator,
    /// Members of the named holder type.
    Member(Ident),
    /// Every member of the holder type named by the key's `name`.
    AnyMember,
    /// Extensions of the type named by the key's `name`.
    Extension,
    /// Members reachable through dynamic lookup, by name only.
    Dynamic,
    /// Literal conversions, named by literal kind.
    Literal,
}

/// Visibility scope of an entity's key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Scope {
    /// Visible to the whole module.
    Module,
    /// Only visible inside one file.
    File(FileId),
}

/// The identity of an entity: two lookups that produce equal keys refer to the
/// same entity, whether or not it is declared anywhere.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct EntityKey {
    /// Name space of `name`.
    pub namespace: Namespace,
    /// The entity's own name (the extended type for extensions).
    pub name: Ident,
    /// Where the key is visible.
    pub scope: Scope,
    /// Disambiguates several extensions of one type in one file.
    pub ordinal: u32,
}

impl EntityKey {
    /// A module-visible top-level name.
    pub fn top_level(name: Ident) -> Self {
        Self::new(Namespace::TopLevel, name, Scope::Module)
    }

    /// A `private`/`fileprivate` top-level name of `file`.
    pub fn file_private(name: Ident, file: FileId) -> Self {
        Self::new(Namespace::TopLevel, name, Scope::File(file))
    }

    /// An operator declaration.
    pub fn operator(symbol: Ident) -> Self {
        Self::new(Namespace::Operator, symbol, Scope::Module)
    }

    /// Member `name` of `holder`.
    pub fn member(holder: Ident, name: Ident) -> Self {
        Self::new(Namespace::Member(holder), name, Scope::Module)
    }

    /// The whole membership of `holder`.
    pub fn any_member(holder: Ident) -> Self {
        Self::new(Namespace::AnyMember, holder, Scope::Module)
    }

    /// The `ordinal`-th extension of `extended` in `file`.
    pub fn extension(extended: Ident, file: FileId, ordinal: u32) -> Self {
        Self {
            namespace: Namespace::Extension,
            name: extended,
            scope: Scope::File(file),
            ordinal,
        }
    }

    /// A dynamically looked-up member name.
    pub fn dynamic(name: Ident) -> Self {
        Self::new(Namespace::Dynamic, name, Scope::Module)
    }

    /// A literal conversion such as `string-literal`.
    pub fn literal(kind: Ident) -> Self {
        Self::new(Namespace::Literal, kind, Scope::Module)
    }

    fn new(namespace: Namespace, name: Ident, scope: Scope) -> Self {
        Self {
            namespace,
            name,
            scope,
            ordinal: 0,
        }
    }

    /// Renders the stable identifier written to records.
    ///
    /// The scope is not part of the identifier: a file never sees another
    /// file's private names, so identifiers stay unique within one record.
    pub fn render(&self, interner: &Interner) -> String {
        let name = interner.resolve(self.name);
        match self.namespace {
            Namespace::TopLevel => name.to_string(),
            Namespace::Operator => format!("operator {name}"),
            Namespace::Member(holder) => format!("{}.{name}", interner.resolve(holder)),
            Namespace::AnyMember => format!("{name}.*"),
            Namespace::Extension if self.ordinal == 0 => format!("extension {name}"),
            Namespace::Extension => format!("extension {name}#{}", self.ordinal),
            Namespace::Dynamic => format!("dynamic.{name}"),
            Namespace::Literal => format!("literal {name}"),
        }
    }
}

/// What kind of thing an entity is. Drives dependency-kind classification.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    /// A top-level `var`, `let`, `func` or `typealias`.
    TopLevel,
    /// A `struct`, `class` or `protocol`.
    Nominal,
    /// A member of a nominal type or extension.
    Member,
    /// An `extension` block.
    Extension,
    /// An operator declaration.
    Operator,
    /// A literal conversion.
    LiteralConversion,
    /// A dynamically looked-up member name.
    DynamicLookup,
    /// A name that was looked up but is not declared (yet).
    Unresolved,
}

impl EntityKind {
    /// Returns the kebab-case name used in records.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::TopLevel => "top-level",
            EntityKind::Nominal => "nominal",
            EntityKind::Member => "member",
            EntityKind::Extension => "extension",
            EntityKind::Operator => "operator",
            EntityKind::LiteralConversion => "literal-conversion",
            EntityKind::DynamicLookup => "dynamic-lookup",
            EntityKind::Unresolved => "unresolved",
        }
    }
}

/// An interned entity.
#[derive(Clone, Debug)]
pub struct Entity {
    /// Identity of the entity.
    pub key: EntityKey,
    /// Kind tag.
    pub kind: EntityKind,
    /// Declaring file, if the entity is declared at all.
    pub file: Option<FileId>,
    /// Every file that declared the key, first declaration first.
    pub contributors: Vec<FileId>,
    /// Canonical interface text the fingerprint is computed over.
    pub interface: Option<Arc<str>>,
}

impl Entity {
    /// Returns `true` for top-level names restricted to their file.
    pub fn is_file_private(&self) -> bool {
        matches!(self.key.namespace, Namespace::TopLevel | Namespace::Operator)
            && matches!(self.key.scope, Scope::File(_))
    }

    /// Returns `true` for keys that collect declarations from many files
    /// (`Holder.*`, `dynamic.name`). Each contributing file provides them.
    pub fn is_aggregate(&self) -> bool {
        matches!(self.key.namespace, Namespace::AnyMember | Namespace::Dynamic)
    }

    /// Returns `true` if `file` lists this entity among its provides.
    pub fn is_provided_by(&self, file: FileId) -> bool {
        self.file == Some(file) || (self.is_aggregate() && self.contributors.contains(&file))
    }
}

#[derive(Default)]
struct TableInner {
    ids: FxHashMap<EntityKey, EntityId>,
    entities: Vec<Entity>,
}

/// Interns entities lazily as declarations are registered and names are
/// looked up. Lives for one batch.
#[derive(Default)]
pub struct EntityTable {
    inner: RwLock<TableInner>,
}

impl EntityTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entity for `key`, interning it with `kind` if unseen.
    pub fn intern(&self, key: EntityKey, kind: EntityKind) -> EntityId {
        if let Some(&id) = self.inner.read().ids.get(&key) {
            return id;
        }
        let mut inner = self.inner.write();
        if let Some(&id) = inner.ids.get(&key) {
            return id;
        }
        let id = EntityId(inner.entities.len() as u32);
        inner.entities.push(Entity {
            key,
            kind,
            file: None,
            contributors: Vec::new(),
            interface: None,
        });
        inner.ids.insert(key, id);
        id
    }

    /// Registers a declaration of `key` in `file` with its interface text.
    ///
    /// A key declared more than once (a redeclaration in another file) keeps
    /// its first declaring file, and its interface becomes the sorted union of
    /// all declared interfaces so a change to any of them changes the
    /// fingerprint.
    pub fn declare(
        &self,
        key: EntityKey,
        kind: EntityKind,
        file: FileId,
        interface: &str,
    ) -> EntityId {
        let id = self.intern(key, kind);
        let mut inner = self.inner.write();
        let entity = &mut inner.entities[id.index()];
        if entity.kind == EntityKind::Unresolved || entity.file.is_none() {
            entity.kind = kind;
        }
        entity.file.get_or_insert(file);
        if !entity.contributors.contains(&file) {
            entity.contributors.push(file);
        }
        entity.interface = Some(match entity.interface.take() {
            None => Arc::from(interface),
            Some(existing) => {
                let mut parts: Vec<&str> = existing.split('\n').collect();
                parts.push(interface);
                parts.sort_unstable();
                Arc::from(parts.join("\n"))
            }
        });
        id
    }

    /// Returns the id of `key` if it has been interned.
    pub fn lookup(&self, key: &EntityKey) -> Option<EntityId> {
        self.inner.read().ids.get(key).copied()
    }

    /// Returns a copy of the entity for `id`.
    pub fn get(&self, id: EntityId) -> Option<Entity> {
        self.inner.read().entities.get(id.index()).cloned()
    }

    /// Returns the kind tag of `id`.
    pub fn kind(&self, id: EntityId) -> Option<EntityKind> {
        self.inner.read().entities.get(id.index()).map(|e| e.kind)
    }

    /// Returns the key of `id`.
    pub fn key(&self, id: EntityId) -> Option<EntityKey> {
        self.inner.read().entities.get(id.index()).map(|e| e.key)
    }

    /// Returns every entity `file` provides, in interning order.
    pub fn declared_in(&self, file: FileId) -> Vec<EntityId> {
        self.inner
            .read()
            .entities
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_provided_by(file))
            .map(|(i, _)| EntityId(i as u32))
            .collect()
    }

    /// Returns the number of interned entities.
    pub fn len(&self) -> usize {
        self.inner.read().entities.len()
    }

    /// Returns `true` if nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn clear(&self) {
        *self.inner.write() = TableInner::default();
    }
}
