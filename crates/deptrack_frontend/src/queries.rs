//! Name-resolution and typing queries.
//!
//! Each query is a small, context-free fact about the module: what a name
//! refers to, what a declaration's type is, which members a type has. All of
//! them run through [`Tracker::evaluate`], so every entity a query touches,
//! directly or through the queries it evaluates, is recorded against
//! whichever declaration asked, even when the answer comes from the cache.
//!
//! Lookups touch the key they looked for whether or not anything is declared
//! under it: declaring the name later must invalidate the consumer.

use crate::ast::{DeclKind, NominalKind};
use crate::checker::ExprChecker;
use crate::declare::{DeclRef, ModuleIndex};
use crate::ty::Ty;
use deptrack_common::Ident;
use deptrack_config::Precision;
use deptrack_query::{DependencyKind, EntityKey, EntityKind, Query, QueryError, Tracker};
use deptrack_source::FileId;
use std::sync::Arc;

/// Declarations found by a lookup, in declaration order.
pub type Decls = Arc<[DeclRef]>;

/// Module-visible top-level declarations named `name`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct LookupModule {
    /// The looked-up name.
    pub name: Ident,
}

impl Query for LookupModule {
    type Value = Decls;
    type Db = ModuleIndex;

    fn compute(&self, db: &ModuleIndex, tracker: &Tracker<'_>) -> Result<Decls, QueryError> {
        tracker.touch_key(
            EntityKey::top_level(self.name),
            EntityKind::Unresolved,
            DependencyKind::UsesTopLevelName,
        );
        Ok(db.lookup_module(self.name).into())
    }
}

/// `private`/`fileprivate` top-level declarations of one file.
///
/// Only a hit is recorded: a file-private name can only appear by editing the
/// file that looks it up.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct LookupInFile {
    /// File whose private scope is searched.
    pub file: FileId,
    /// The looked-up name.
    pub name: Ident,
}

impl Query for LookupInFile {
    type Value = Decls;
    type Db = ModuleIndex;

    fn compute(&self, db: &ModuleIndex, tracker: &Tracker<'_>) -> Result<Decls, QueryError> {
        let found = db.lookup_in_file(self.file, self.name);
        for decl in found {
            tracker.touch(decl.entity, DependencyKind::UsesTopLevelName);
        }
        Ok(found.into())
    }
}

/// Unqualified name resolution from a file: its private scope first, then
/// the module.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ResolveName {
    /// File the name appears in.
    pub file: FileId,
    /// The name.
    pub name: Ident,
}

impl Query for ResolveName {
    type Value = Decls;
    type Db = ModuleIndex;

    fn compute(&self, db: &ModuleIndex, tracker: &Tracker<'_>) -> Result<Decls, QueryError> {
        let local = tracker.evaluate(
            db,
            LookupInFile {
                file: self.file,
                name: self.name,
            },
        )?;
        if !local.is_empty() {
            return Ok(local);
        }
        tracker.evaluate(db, LookupModule { name: self.name })
    }
}

/// The type named `name` as written in `file`, as an instance type.
///
/// Typealiases are followed. An unknown name yields [`Ty::Error`] and still
/// records a `uses-type` edge on the name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ResolveType {
    /// File the type reference appears in.
    pub file: FileId,
    /// The referenced type name.
    pub name: Ident,
}

impl Query for ResolveType {
    type Value = Ty;
    type Db = ModuleIndex;

    fn compute(&self, db: &ModuleIndex, tracker: &Tracker<'_>) -> Result<Ty, QueryError> {
        let local = db.lookup_in_file(self.file, self.name);
        let found = if local.is_empty() {
            db.lookup_module(self.name)
        } else {
            local
        };

        for &decl_ref in found {
            match db.decl(decl_ref).map(|d| &d.kind) {
                Some(DeclKind::Nominal { .. }) => {
                    tracker.touch(decl_ref.entity, DependencyKind::UsesType);
                    return Ok(Ty::Nominal(self.name));
                }
                Some(DeclKind::Typealias { target }) => {
                    tracker.touch(decl_ref.entity, DependencyKind::UsesType);
                    return tracker.evaluate(
                        db,
                        ResolveType {
                            file: decl_ref.file,
                            name: target.name,
                        },
                    );
                }
                _ => {}
            }
        }

        tracker.touch_key(
            EntityKey::top_level(self.name),
            EntityKind::Unresolved,
            DependencyKind::UsesType,
        );
        Ok(Ty::Error)
    }
}

/// The type of a declaration.
///
/// Variables use their annotation or infer from their initializer, functions
/// produce a function type, nominal types and typealiases produce the
/// metatype of the type they name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DeclType {
    /// The declaration.
    pub decl: DeclRef,
}

impl Query for DeclType {
    type Value = Ty;
    type Db = ModuleIndex;

    fn compute(&self, db: &ModuleIndex, tracker: &Tracker<'_>) -> Result<Ty, QueryError> {
        let Some(decl) = db.decl(self.decl) else {
            return Ok(Ty::Error);
        };
        let file = self.decl.file;
        let resolve = |name: Ident| tracker.evaluate(db, ResolveType { file, name });

        match &decl.kind {
            DeclKind::Var { ty: Some(ty), .. } => resolve(ty.name),
            DeclKind::Var {
                ty: None,
                init: Some(init),
                ..
            } => {
                let mut checker = ExprChecker::new(db, tracker, file, db.holder_of(self.decl));
                checker.check_expr(init)
            }
            DeclKind::Var { .. } => Ok(Ty::Error),
            DeclKind::Func { params, ret, .. } => {
                let params = params
                    .iter()
                    .map(|p| resolve(p.ty.name))
                    .collect::<Result<Vec<_>, _>>()?;
                let ret = match ret {
                    Some(ret) => resolve(ret.name)?,
                    None => Ty::Void,
                };
                Ok(Ty::Function {
                    params: params.into(),
                    ret: Box::new(ret),
                })
            }
            DeclKind::Nominal { .. } => Ok(Ty::Metatype(decl.name)),
            DeclKind::Typealias { target } => Ok(match resolve(target.name)? {
                Ty::Nominal(name) => Ty::Metatype(name),
                _ => Ty::Error,
            }),
            DeclKind::Extension { .. } | DeclKind::OperatorDecl => Ok(Ty::Void),
            DeclKind::Error => Ok(Ty::Error),
        }
    }
}

/// A kind of literal whose default type comes from a prelude typealias.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum LiteralKind {
    /// `"text"`
    String,
    /// `"text \(value)"`
    StringInterpolation,
    /// `42`
    Integer,
    /// `true`, `false`
    Boolean,
}

impl LiteralKind {
    /// Name of the literal-conversion entity.
    pub fn entity_name(self) -> &'static str {
        match self {
            LiteralKind::String => "string-literal",
            LiteralKind::StringInterpolation => "string-interpolation",
            LiteralKind::Integer => "integer-literal",
            LiteralKind::Boolean => "boolean-literal",
        }
    }

    /// The typealias naming the literal's default type.
    pub fn default_type_alias(self) -> &'static str {
        match self {
            LiteralKind::String | LiteralKind::StringInterpolation => "StringLiteralType",
            LiteralKind::Integer => "IntegerLiteralType",
            LiteralKind::Boolean => "BooleanLiteralType",
        }
    }
}

/// The default type of a literal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct LiteralType {
    /// Which literal.
    pub kind: LiteralKind,
}

impl Query for LiteralType {
    type Value = Ty;
    type Db = ModuleIndex;

    fn compute(&self, db: &ModuleIndex, tracker: &Tracker<'_>) -> Result<Ty, QueryError> {
        let session = tracker.session();
        let conversion = session.interner().get_or_intern(self.kind.entity_name());
        tracker.touch_key(
            EntityKey::literal(conversion),
            EntityKind::LiteralConversion,
            DependencyKind::UsesLiteralConversion,
        );
        if self.kind == LiteralKind::StringInterpolation {
            // an interpolation is also a string literal
            return tracker.evaluate(
                db,
                LiteralType {
                    kind: LiteralKind::String,
                },
            );
        }

        let alias = session.interner().get_or_intern(self.kind.default_type_alias());
        let found = tracker.evaluate(db, LookupModule { name: alias })?;
        match found.first() {
            Some(&decl) => Ok(match tracker.evaluate(db, DeclType { decl })? {
                Ty::Metatype(name) => Ty::Nominal(name),
                _ => Ty::Error,
            }),
            None => Ok(Ty::Error),
        }
    }
}

/// Members named `name` of `holder`, searching superclasses.
///
/// Under [`Precision::Conservative`] the lookup also depends on the holder's
/// whole membership (`Holder.*`), so adding any member invalidates it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct MemberLookup {
    /// Type whose members are searched.
    pub holder: Ident,
    /// Member name.
    pub name: Ident,
}

impl Query for MemberLookup {
    type Value = Decls;
    type Db = ModuleIndex;

    fn compute(&self, db: &ModuleIndex, tracker: &Tracker<'_>) -> Result<Decls, QueryError> {
        tracker.touch_key(
            EntityKey::member(self.holder, self.name),
            EntityKind::Unresolved,
            DependencyKind::UsesMember,
        );
        if db.precision() == Precision::Conservative {
            tracker.touch_key(
                EntityKey::any_member(self.holder),
                EntityKind::Member,
                DependencyKind::UsesMember,
            );
        }

        let found = db.members(self.holder, self.name);
        if !found.is_empty() {
            return Ok(found.into());
        }
        match tracker.evaluate(db, Superclass { class: self.holder })? {
            Some(superclass) => tracker.evaluate(
                db,
                MemberLookup {
                    holder: superclass,
                    name: self.name,
                },
            ),
            None => Ok(Decls::from(Vec::new())),
        }
    }
}

/// The superclass of `class`, if it is a class inheriting from a class.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Superclass {
    /// The class.
    pub class: Ident,
}

impl Query for Superclass {
    type Value = Option<Ident>;
    type Db = ModuleIndex;

    fn compute(&self, db: &ModuleIndex, tracker: &Tracker<'_>) -> Result<Option<Ident>, QueryError> {
        let Some(class_ref) = db.nominal(self.class) else {
            return Ok(None);
        };
        let Some(DeclKind::Nominal {
            kind: NominalKind::Class,
            inherits,
            ..
        }) = db.decl(class_ref).map(|d| &d.kind)
        else {
            return Ok(None);
        };
        tracker.touch(class_ref.entity, DependencyKind::InheritsSuperclass);

        let Some(first) = inherits.first() else {
            return Ok(None);
        };
        // recorded even when it does not name a class: declaring one later
        // must invalidate lookups that fell through
        tracker.touch_key(
            EntityKey::top_level(first.name),
            EntityKind::Unresolved,
            DependencyKind::InheritsSuperclass,
        );
        let Some(super_ref) = db.nominal(first.name) else {
            return Ok(None);
        };
        match db.decl(super_ref).map(|d| &d.kind) {
            Some(DeclKind::Nominal {
                kind: NominalKind::Class,
                ..
            }) => {
                tracker.touch(super_ref.entity, DependencyKind::InheritsSuperclass);
                Ok(Some(first.name))
            }
            _ => Ok(None),
        }
    }
}

/// Members named `name` reachable through dynamic lookup on `AnyObject`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DynamicLookup {
    /// Member name.
    pub name: Ident,
}

impl Query for DynamicLookup {
    type Value = Decls;
    type Db = ModuleIndex;

    fn compute(&self, db: &ModuleIndex, tracker: &Tracker<'_>) -> Result<Decls, QueryError> {
        tracker.touch_key(
            EntityKey::dynamic(self.name),
            EntityKind::DynamicLookup,
            DependencyKind::UsesDynamicLookup,
        );
        Ok(db.dynamic_members(self.name).into())
    }
}

/// Implementations of the binary operator `op`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ResolveOperator {
    /// Operator symbol.
    pub op: Ident,
}

impl Query for ResolveOperator {
    type Value = Decls;
    type Db = ModuleIndex;

    fn compute(&self, db: &ModuleIndex, tracker: &Tracker<'_>) -> Result<Decls, QueryError> {
        tracker.touch_key(
            EntityKey::operator(self.op),
            EntityKind::Unresolved,
            DependencyKind::UsesTopLevelName,
        );
        tracker.evaluate(db, LookupModule { name: self.op })
    }
}
