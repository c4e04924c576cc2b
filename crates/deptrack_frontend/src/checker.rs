//! The checker: walks a primary file's declarations and bodies, resolving
//! every name through queries.
//!
//! The checker itself records nothing. It only maintains the consumer
//! context (one per declaration, nested for members) and asks queries; the
//! tracker attributes what those queries touch.

use crate::ast::{Decl, DeclKind, Expr, NominalKind, Stmt};
use crate::batch::CancelFlag;
use crate::declare::{DeclRef, ModuleIndex, ParsedFile};
use crate::errors;
use crate::queries::{
    DeclType, Decls, DynamicLookup, LiteralKind, LiteralType, MemberLookup, ResolveName,
    ResolveOperator, ResolveType, Superclass,
};
use crate::ty::Ty;
use deptrack_common::Ident;
use deptrack_diagnostics::DiagnosticSink;
use deptrack_query::{QueryError, Tracker};
use deptrack_source::FileId;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

/// How checking a file ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Every declaration was visited.
    Completed,
    /// The batch was cancelled part-way; the file's edges are incomplete.
    Cancelled,
}

/// Types expressions inside one declaration.
pub struct ExprChecker<'a, 's> {
    db: &'a ModuleIndex,
    tracker: &'a Tracker<'s>,
    file: FileId,
    self_holder: Option<Ident>,
    scopes: Vec<FxHashMap<Ident, Ty>>,
}

impl<'a, 's> ExprChecker<'a, 's> {
    /// Creates a checker for code in `file`. `self_holder` is the enclosing
    /// type for member bodies.
    pub fn new(
        db: &'a ModuleIndex,
        tracker: &'a Tracker<'s>,
        file: FileId,
        self_holder: Option<Ident>,
    ) -> Self {
        Self {
            db,
            tracker,
            file,
            self_holder,
            scopes: Vec::new(),
        }
    }

    /// Pushes a new innermost scope holding `bindings`.
    pub fn push_scope(&mut self, bindings: impl IntoIterator<Item = (Ident, Ty)>) {
        self.scopes.push(bindings.into_iter().collect());
    }

    /// Drops the innermost scope.
    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn local(&self, name: Ident) -> Option<Ty> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(&name).cloned())
    }

    fn evaluate_type(&self, decls: &Decls) -> Result<Ty, QueryError> {
        match decls.first() {
            Some(&decl) => self.tracker.evaluate(self.db, DeclType { decl }),
            None => Ok(Ty::Error),
        }
    }

    fn literal(&self, kind: LiteralKind) -> Result<Ty, QueryError> {
        self.tracker.evaluate(self.db, LiteralType { kind })
    }

    /// Checks a statement list in its own scope.
    pub fn check_stmts(&mut self, stmts: &[Stmt]) -> Result<(), QueryError> {
        self.push_scope([]);
        let result = stmts.iter().try_for_each(|stmt| self.check_stmt(stmt));
        self.pop_scope();
        result
    }

    fn check_stmt(&mut self, stmt: &Stmt) -> Result<(), QueryError> {
        match stmt {
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.check_expr(value)?;
                }
            }
            Stmt::Local { name, ty, init, .. } => {
                let declared = match ty {
                    Some(ty) => Some(self.tracker.evaluate(
                        self.db,
                        ResolveType {
                            file: self.file,
                            name: ty.name,
                        },
                    )?),
                    None => None,
                };
                let inferred = match init {
                    Some(init) => self.check_expr(init)?,
                    None => Ty::Error,
                };
                let bound = declared.unwrap_or(inferred);
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(*name, bound);
                }
            }
            Stmt::Expr(expr) => {
                self.check_expr(expr)?;
            }
            Stmt::Error(_) => {}
        }
        Ok(())
    }

    /// Computes the type of `expr`.
    pub fn check_expr(&mut self, expr: &Expr) -> Result<Ty, QueryError> {
        match expr {
            Expr::IntLit(_) => self.literal(LiteralKind::Integer),
            Expr::BoolLit(..) => self.literal(LiteralKind::Boolean),
            Expr::StringLit { segments, .. } => {
                for segment in segments {
                    self.check_expr(segment)?;
                }
                if segments.is_empty() {
                    self.literal(LiteralKind::String)
                } else {
                    self.literal(LiteralKind::StringInterpolation)
                }
            }
            Expr::Name { name, .. } => self.check_name(*name),
            Expr::SelfRef(_) => Ok(self.self_holder.map_or(Ty::Error, Ty::Nominal)),
            Expr::Member { base, name, .. } => {
                let base = self.check_expr(base)?;
                self.check_member(&base, *name)
            }
            Expr::Call { callee, args, .. } => {
                let callee = self.check_expr(callee)?;
                for arg in args {
                    self.check_expr(arg)?;
                }
                Ok(callee.call_result())
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                let lhs = self.check_expr(lhs)?;
                let rhs = self.check_expr(rhs)?;
                self.check_operator(*op, lhs, rhs)
            }
            Expr::Error(_) => Ok(Ty::Error),
        }
    }

    /// Locals, then members of the enclosing type, then file and module
    /// scope.
    fn check_name(&mut self, name: Ident) -> Result<Ty, QueryError> {
        if let Some(ty) = self.local(name) {
            return Ok(ty);
        }
        if let Some(holder) = self.self_holder {
            let members = self.tracker.evaluate(self.db, MemberLookup { holder, name })?;
            if !members.is_empty() {
                return self.evaluate_type(&members);
            }
        }
        let found = self.tracker.evaluate(
            self.db,
            ResolveName {
                file: self.file,
                name,
            },
        )?;
        self.evaluate_type(&found)
    }

    fn check_member(&mut self, base: &Ty, name: Ident) -> Result<Ty, QueryError> {
        let Some(holder) = base.holder() else {
            return Ok(Ty::Error);
        };
        let interner = self.tracker.session().interner();
        let found = if matches!(base, Ty::Nominal(_)) && interner.resolve(holder) == "AnyObject" {
            self.tracker.evaluate(self.db, DynamicLookup { name })?
        } else {
            self.tracker.evaluate(self.db, MemberLookup { holder, name })?
        };
        self.evaluate_type(&found)
    }

    /// Picks the first implementation whose parameters match the operand
    /// types, or the first implementation at all.
    fn check_operator(&mut self, op: Ident, lhs: Ty, rhs: Ty) -> Result<Ty, QueryError> {
        let candidates = self.tracker.evaluate(self.db, ResolveOperator { op })?;
        let mut fallback = None;
        for &decl in candidates.iter() {
            if let Ty::Function { params, ret } = self.tracker.evaluate(self.db, DeclType { decl })? {
                if params.len() == 2 && params[0] == lhs && params[1] == rhs {
                    return Ok(*ret);
                }
                fallback.get_or_insert(*ret);
            }
        }
        Ok(fallback.unwrap_or(Ty::Error))
    }
}

/// Checks the declarations of one primary file.
pub struct FileChecker<'a, 's> {
    db: &'a ModuleIndex,
    tracker: &'a Tracker<'s>,
    sink: &'a DiagnosticSink,
    cancel: &'a CancelFlag,
}

impl<'a, 's> FileChecker<'a, 's> {
    /// Creates a checker recording through `tracker`.
    pub fn new(
        db: &'a ModuleIndex,
        tracker: &'a Tracker<'s>,
        sink: &'a DiagnosticSink,
        cancel: &'a CancelFlag,
    ) -> Self {
        Self {
            db,
            tracker,
            sink,
            cancel,
        }
    }

    /// Checks every declaration of `file` under its own consumer context.
    ///
    /// Cancellation is polled between top-level declarations.
    pub fn check(&self, file: &ParsedFile) -> CheckOutcome {
        let _file = self.tracker.enter_file(file.id);
        for (index, decl) in file.ast.items.iter().enumerate() {
            if self.cancel.is_cancelled() {
                debug!(file = %file.name, "checking cancelled");
                return CheckOutcome::Cancelled;
            }
            let Some(decl_ref) = self.db.decl_ref(file.id, index as u32, None) else {
                continue;
            };
            self.check_guarded(decl, decl_ref, None);
        }
        CheckOutcome::Completed
    }

    fn check_guarded(&self, decl: &Decl, decl_ref: DeclRef, holder: Option<Ident>) {
        let _decl = self.tracker.enter_decl(decl_ref.entity);
        trace!(entity = decl_ref.entity.as_raw(), "checking declaration");
        if let Err(err) = self.check_decl(decl, decl_ref, holder) {
            self.sink.emit(errors::cyclic_query(&err, decl.span));
        }
    }

    fn resolve_type(&self, file: FileId, name: Ident) -> Result<Ty, QueryError> {
        self.tracker.evaluate(self.db, ResolveType { file, name })
    }

    fn check_decl(
        &self,
        decl: &Decl,
        decl_ref: DeclRef,
        holder: Option<Ident>,
    ) -> Result<(), QueryError> {
        let file = decl_ref.file;
        match &decl.kind {
            DeclKind::Var {
                ty, init, getter, ..
            } => {
                self.tracker.evaluate(self.db, DeclType { decl: decl_ref })?;
                let mut checker = ExprChecker::new(self.db, self.tracker, file, holder);
                // an unannotated initializer was already checked by DeclType
                if let (Some(_), Some(init)) = (ty, init) {
                    checker.check_expr(init)?;
                }
                if let Some(getter) = getter {
                    checker.check_stmts(getter)?;
                }
            }
            DeclKind::Func { params, body, .. } => {
                let ty = self.tracker.evaluate(self.db, DeclType { decl: decl_ref })?;
                if let Some(body) = body {
                    let mut checker = ExprChecker::new(self.db, self.tracker, file, holder);
                    let param_tys: Vec<Ty> = match &ty {
                        Ty::Function { params, .. } => params.to_vec(),
                        _ => Vec::new(),
                    };
                    checker.push_scope(
                        params
                            .iter()
                            .enumerate()
                            .map(|(i, p)| (p.name, param_tys.get(i).cloned().unwrap_or(Ty::Error))),
                    );
                    checker.check_stmts(body)?;
                    checker.pop_scope();
                }
            }
            DeclKind::Nominal {
                kind,
                inherits,
                members,
            } => {
                for inherited in inherits {
                    self.resolve_type(file, inherited.name)?;
                }
                if *kind == NominalKind::Class {
                    self.tracker
                        .evaluate(self.db, Superclass { class: decl.name })?;
                }
                self.check_members(members, decl_ref, decl.name);
            }
            DeclKind::Extension {
                extended,
                conforms,
                members,
            } => {
                self.resolve_type(file, extended.name)?;
                for conformance in conforms {
                    self.resolve_type(file, conformance.name)?;
                }
                self.check_members(members, decl_ref, extended.name);
            }
            DeclKind::Typealias { target } => {
                self.resolve_type(file, target.name)?;
            }
            DeclKind::OperatorDecl | DeclKind::Error => {}
        }
        Ok(())
    }

    fn check_members(&self, members: &[Decl], parent: DeclRef, holder: Ident) {
        for (index, member) in members.iter().enumerate() {
            if let Some(member_ref) = self.db.decl_ref(parent.file, parent.index, Some(index as u32)) {
                self.check_guarded(member, member_ref, Some(holder));
            }
        }
    }
}
