//! Declaration index: every declaration of the batch, registered as an
//! entity and indexed for name lookup.
//!
//! The index is built once per batch, before any primary is checked, and is
//! read-only afterwards. It is the database the front-end queries compute
//! over. Building it only registers declarations; it never touches the
//! dependency recorder, so no edges originate here.

use crate::ast::{Decl, DeclKind, NominalKind, SourceFileAst};
use deptrack_common::Ident;
use deptrack_config::Precision;
use deptrack_query::{EntityId, EntityKey, EntityKind, Session};
use deptrack_source::{FileId, FileRole};
use rustc_hash::FxHashMap;
use tracing::debug;

/// A parsed input file.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    /// Id in the batch's source database.
    pub id: FileId,
    /// Display name used in records.
    pub name: String,
    /// Role in the batch.
    pub role: FileRole,
    /// Parsed declarations.
    pub ast: SourceFileAst,
}

/// A handle to one declaration: a top-level item, or a member of one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DeclRef {
    /// Declaring file.
    pub file: FileId,
    /// Index of the top-level item in the file.
    pub index: u32,
    /// Index of the member within the item, for member declarations.
    pub member: Option<u32>,
    /// The entity the declaration registered.
    pub entity: EntityId,
}

/// All declarations of a batch, by name.
#[derive(Default)]
pub struct ModuleIndex {
    files: Vec<ParsedFile>,
    positions: FxHashMap<FileId, usize>,
    top_level: FxHashMap<Ident, Vec<DeclRef>>,
    file_private: FxHashMap<(FileId, Ident), Vec<DeclRef>>,
    members: FxHashMap<(Ident, Ident), Vec<DeclRef>>,
    nominals: FxHashMap<Ident, DeclRef>,
    operators: FxHashMap<Ident, DeclRef>,
    dynamic_members: FxHashMap<Ident, Vec<DeclRef>>,
    refs: FxHashMap<(FileId, u32, Option<u32>), DeclRef>,
    precision: Precision,
}

impl ModuleIndex {
    /// Registers every declaration of `files` with `session` and indexes
    /// them.
    ///
    /// The prelude is declared first and the other files in id order, so
    /// entity registration does not depend on how parsing was scheduled.
    pub fn build(mut files: Vec<ParsedFile>, session: &Session, precision: Precision) -> Self {
        files.sort_by_key(|f| (f.role != FileRole::Prelude, f.id));
        let mut index = Self {
            precision,
            ..Self::default()
        };
        for (position, file) in files.iter().enumerate() {
            index.positions.insert(file.id, position);
            index.declare_file(file, session);
        }
        index.files = files;
        debug!(
            files = index.files.len(),
            top_level = index.top_level.len(),
            members = index.members.len(),
            "declaration index built"
        );
        index
    }

    fn declare_file(&mut self, file: &ParsedFile, session: &Session) {
        let mut extension_ordinals: FxHashMap<Ident, u32> = FxHashMap::default();

        for (index, decl) in file.ast.items.iter().enumerate() {
            let index = index as u32;
            let private = decl.visibility.is_file_private();
            let top_key = if private {
                EntityKey::file_private(decl.name, file.id)
            } else {
                EntityKey::top_level(decl.name)
            };

            let (key, kind) = match &decl.kind {
                DeclKind::Error => continue,
                DeclKind::Var { .. } | DeclKind::Func { .. } | DeclKind::Typealias { .. } => {
                    (top_key, EntityKind::TopLevel)
                }
                DeclKind::Nominal { .. } => (top_key, EntityKind::Nominal),
                DeclKind::Extension { .. } => {
                    let ordinal = extension_ordinals.entry(decl.name).or_insert(0);
                    let key = EntityKey::extension(decl.name, file.id, *ordinal);
                    *ordinal += 1;
                    (key, EntityKind::Extension)
                }
                DeclKind::OperatorDecl => (EntityKey::operator(decl.name), EntityKind::Operator),
            };
            let entity = session.declare(key, kind, file.id, &decl.interface);
            let decl_ref = DeclRef {
                file: file.id,
                index,
                member: None,
                entity,
            };
            self.refs.insert((file.id, index, None), decl_ref);

            match &decl.kind {
                DeclKind::OperatorDecl => {
                    self.operators.entry(decl.name).or_insert(decl_ref);
                }
                DeclKind::Extension { members, .. } => {
                    self.declare_members(decl.name, None, members, decl_ref, session);
                }
                DeclKind::Nominal { kind, members, .. } => {
                    if private {
                        self.file_private
                            .entry((file.id, decl.name))
                            .or_default()
                            .push(decl_ref);
                    } else {
                        self.top_level.entry(decl.name).or_default().push(decl_ref);
                        self.nominals.entry(decl.name).or_insert(decl_ref);
                    }
                    self.declare_members(decl.name, Some(*kind), members, decl_ref, session);
                }
                _ if private => {
                    self.file_private
                        .entry((file.id, decl.name))
                        .or_default()
                        .push(decl_ref);
                }
                _ => self.top_level.entry(decl.name).or_default().push(decl_ref),
            }
        }
        debug!(file = %file.name, items = file.ast.items.len(), "declared file");
    }

    fn declare_members(
        &mut self,
        holder: Ident,
        holder_kind: Option<NominalKind>,
        members: &[Decl],
        parent: DeclRef,
        session: &Session,
    ) {
        for (member_index, member) in members.iter().enumerate() {
            if matches!(member.kind, DeclKind::Error) {
                continue;
            }
            let entity = session.declare(
                EntityKey::member(holder, member.name),
                EntityKind::Member,
                parent.file,
                &member.interface,
            );
            // the membership as a whole, for conservative member lookups
            session.declare(
                EntityKey::any_member(holder),
                EntityKind::Member,
                parent.file,
                &member.interface,
            );
            let decl_ref = DeclRef {
                member: Some(member_index as u32),
                entity,
                ..parent
            };
            self.refs.insert((parent.file, parent.index, decl_ref.member), decl_ref);
            self.members
                .entry((holder, member.name))
                .or_default()
                .push(decl_ref);

            if holder_kind == Some(NominalKind::Class) {
                session.declare(
                    EntityKey::dynamic(member.name),
                    EntityKind::DynamicLookup,
                    parent.file,
                    &member.interface,
                );
                self.dynamic_members
                    .entry(member.name)
                    .or_default()
                    .push(decl_ref);
            }
        }
    }

    /// Module-visible top-level declarations named `name`.
    pub fn lookup_module(&self, name: Ident) -> &[DeclRef] {
        self.top_level.get(&name).map_or(&[], Vec::as_slice)
    }

    /// `private`/`fileprivate` top-level declarations of `file` named `name`.
    pub fn lookup_in_file(&self, file: FileId, name: Ident) -> &[DeclRef] {
        self.file_private
            .get(&(file, name))
            .map_or(&[], Vec::as_slice)
    }

    /// Members named `name` declared in `holder` or one of its extensions.
    pub fn members(&self, holder: Ident, name: Ident) -> &[DeclRef] {
        self.members
            .get(&(holder, name))
            .map_or(&[], Vec::as_slice)
    }

    /// Class members named `name`, whatever their class.
    pub fn dynamic_members(&self, name: Ident) -> &[DeclRef] {
        self.dynamic_members
            .get(&name)
            .map_or(&[], Vec::as_slice)
    }

    /// The first module-visible nominal type named `name`.
    pub fn nominal(&self, name: Ident) -> Option<DeclRef> {
        self.nominals.get(&name).copied()
    }

    /// The operator declaration for `symbol`.
    pub fn operator(&self, symbol: Ident) -> Option<DeclRef> {
        self.operators.get(&symbol).copied()
    }

    /// The handle of item `index` of `file`, or of its member `member`.
    pub fn decl_ref(&self, file: FileId, index: u32, member: Option<u32>) -> Option<DeclRef> {
        self.refs.get(&(file, index, member)).copied()
    }

    /// The declaration `decl_ref` points at.
    pub fn decl(&self, decl_ref: DeclRef) -> Option<&Decl> {
        let file = self.file(decl_ref.file)?;
        let item = file.ast.items.get(decl_ref.index as usize)?;
        match decl_ref.member {
            None => Some(item),
            Some(member) => match &item.kind {
                DeclKind::Nominal { members, .. } | DeclKind::Extension { members, .. } => {
                    members.get(member as usize)
                }
                _ => None,
            },
        }
    }

    /// The type whose member `decl_ref` is, if it is a member.
    pub fn holder_of(&self, decl_ref: DeclRef) -> Option<Ident> {
        decl_ref.member?;
        let file = self.file(decl_ref.file)?;
        file.ast.items.get(decl_ref.index as usize).map(|item| item.name)
    }

    /// The parsed file with id `id`.
    pub fn file(&self, id: FileId) -> Option<&ParsedFile> {
        self.positions.get(&id).and_then(|&p| self.files.get(p))
    }

    /// Every parsed file, prelude first.
    pub fn files(&self) -> &[ParsedFile] {
        &self.files
    }

    /// The configured member-lookup precision.
    pub fn precision(&self) -> Precision {
        self.precision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_source;
    use deptrack_common::Interner;
    use deptrack_diagnostics::DiagnosticSink;
    use std::sync::Arc;

    fn parsed(session: &Session, id: u32, name: &str, role: FileRole, source: &str) -> ParsedFile {
        let sink = DiagnosticSink::new();
        let ast = parse_source(source, FileId::from_raw(id), session.interner(), &sink);
        assert!(!sink.has_errors());
        ParsedFile {
            id: FileId::from_raw(id),
            name: name.to_string(),
            role,
            ast,
        }
    }

    fn build(sources: &[(&str, FileRole, &str)]) -> (Session, ModuleIndex) {
        let session = Session::new(Arc::new(Interner::new()));
        let files = sources
            .iter()
            .enumerate()
            .map(|(i, (name, role, src))| parsed(&session, i as u32, name, *role, src))
            .collect();
        let index = ModuleIndex::build(files, &session, Precision::Conservative);
        (session, index)
    }

    fn ident(session: &Session, name: &str) -> Ident {
        session.interner().get_or_intern(name)
    }

    #[test]
    fn indexes_top_level_and_private() {
        let (session, index) = build(&[
            ("a.input", FileRole::Primary, "func f() {}\nfileprivate let x = 1"),
            ("b.input", FileRole::Primary, "private let x = 2"),
        ]);
        let a = FileId::from_raw(0);
        let b = FileId::from_raw(1);
        assert_eq!(index.lookup_module(ident(&session, "f")).len(), 1);
        assert!(index.lookup_module(ident(&session, "x")).is_empty());
        let xa = index.lookup_in_file(a, ident(&session, "x"));
        let xb = index.lookup_in_file(b, ident(&session, "x"));
        assert_eq!((xa.len(), xb.len()), (1, 1));
        // same name, distinct entities
        assert_ne!(xa[0].entity, xb[0].entity);
        assert_eq!(session.identifier(xa[0].entity).as_deref(), Some("x"));
    }

    #[test]
    fn members_and_extensions() {
        let (session, index) = build(&[
            ("p", FileRole::Prelude, "struct S { var a: Int }"),
            ("m.input", FileRole::Primary, "extension S { func b() {} }\nextension S {}"),
        ]);
        let s = ident(&session, "S");
        let a = index.members(s, ident(&session, "a"));
        let b = index.members(s, ident(&session, "b"));
        assert_eq!((a.len(), b.len()), (1, 1));
        assert_eq!(index.holder_of(b[0]), Some(s));
        assert!(matches!(index.decl(b[0]).map(|d| &d.kind), Some(DeclKind::Func { .. })));
        assert_eq!(session.identifier(b[0].entity).as_deref(), Some("S.b"));

        let m = FileId::from_raw(1);
        let provided: Vec<String> = session
            .entities()
            .declared_in(m)
            .into_iter()
            .filter_map(|id| session.identifier(id))
            .collect();
        assert!(provided.contains(&"extension S".to_string()));
        assert!(provided.contains(&"extension S#1".to_string()));
        assert!(provided.contains(&"S.b".to_string()));
        // the prelude owns the membership, but every contributing file provides it
        assert!(provided.contains(&"S.*".to_string()));
        let owner = session
            .entities()
            .lookup(&EntityKey::any_member(s))
            .and_then(|id| session.entities().get(id))
            .and_then(|e| e.file);
        assert_eq!(owner, Some(FileId::from_raw(0)));
    }

    #[test]
    fn prelude_is_declared_first() {
        let (session, index) = build(&[
            ("m.input", FileRole::Primary, "extension S { func b() {} }"),
            ("p", FileRole::Prelude, "struct S {}"),
        ]);
        assert_eq!(index.files()[0].role, FileRole::Prelude);
        let s = index.nominal(ident(&session, "S")).unwrap();
        assert_eq!(s.file, FileId::from_raw(1));
    }

    #[test]
    fn class_members_are_dynamic() {
        let (session, index) = build(&[(
            "a.input",
            FileRole::Primary,
            "class C { func run() {} }\nstruct D { func run() {} }",
        )]);
        let run = index.dynamic_members(ident(&session, "run"));
        assert_eq!(run.len(), 1);
        assert_eq!(index.holder_of(run[0]), Some(ident(&session, "C")));
        assert!(session
            .entities()
            .lookup(&EntityKey::dynamic(ident(&session, "run")))
            .is_some());
    }

    #[test]
    fn operators_are_indexed() {
        let (session, index) = build(&[(
            "a.input",
            FileRole::Primary,
            "infix operator +++\nfunc +++ (a: Int, b: Int) -> Int { return a }",
        )]);
        let symbol = ident(&session, "+++");
        let op = index.operator(symbol).unwrap();
        assert_eq!(session.identifier(op.entity).as_deref(), Some("operator +++"));
        assert_eq!(index.lookup_module(symbol).len(), 1);
    }
}
