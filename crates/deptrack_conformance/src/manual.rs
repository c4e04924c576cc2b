//! A syntax-walking tracker.
//!
//! Walks the top-level declarations of a file and writes down every name
//! they mention, without resolving anything and without the query cache.
//! It over-approximates nothing it cannot see in the text, so every name it
//! reports that some file declares must also appear in the request-based
//! record of the same file.
//!
//! Member declarations are not walked: inside them a bare name may resolve
//! to a member of `self`, which only the type checker can tell.

use deptrack_common::{Ident, Interner};
use deptrack_frontend::ast::{Decl, DeclKind, Expr, SourceFileAst, Stmt, TypeRef};
use rustc_hash::FxHashSet;
use std::collections::{BTreeMap, BTreeSet};

/// Names mentioned by each top-level declaration of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualRecord {
    /// Consumer declaration name to the identifiers it mentions.
    pub uses: BTreeMap<String, BTreeSet<String>>,
}

impl ManualRecord {
    /// Every identifier mentioned anywhere in the file.
    pub fn all_names(&self) -> BTreeSet<&str> {
        self.uses
            .values()
            .flat_map(|names| names.iter().map(String::as_str))
            .collect()
    }
}

/// Walks `ast` and records the names each top-level declaration mentions.
pub fn track(ast: &SourceFileAst, interner: &Interner) -> ManualRecord {
    let mut record = ManualRecord::default();
    for decl in &ast.items {
        let mut walker = Walker {
            interner,
            scopes: Vec::new(),
            names: BTreeSet::new(),
        };
        walker.decl(decl);
        if walker.names.is_empty() {
            continue;
        }
        let name = interner.resolve(decl.name);
        let consumer = match decl.kind {
            DeclKind::Extension { .. } => format!("extension {name}"),
            _ => name.to_string(),
        };
        record.uses.entry(consumer).or_default().extend(walker.names);
    }
    record
}

/// Identifiers of the top-level declarations in `asts`, as they appear in
/// records. Operator declarations render as `operator SYM`.
pub fn declared(asts: &[&SourceFileAst], interner: &Interner) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for ast in asts {
        for decl in &ast.items {
            let name = interner.resolve(decl.name);
            match &decl.kind {
                DeclKind::OperatorDecl => {
                    names.insert(format!("operator {name}"));
                }
                DeclKind::Extension { .. } | DeclKind::Error => {}
                _ => {
                    names.insert(name.to_string());
                }
            }
        }
    }
    names
}

struct Walker<'a> {
    interner: &'a Interner,
    scopes: Vec<FxHashSet<Ident>>,
    names: BTreeSet<String>,
}

impl Walker<'_> {
    fn mention(&mut self, name: String) {
        self.names.insert(name);
    }

    fn is_local(&self, name: Ident) -> bool {
        self.scopes.iter().any(|scope| scope.contains(&name))
    }

    fn ty(&mut self, ty: &TypeRef) {
        let name = self.interner.resolve(ty.name).to_string();
        self.mention(name);
    }

    fn decl(&mut self, decl: &Decl) {
        match &decl.kind {
            DeclKind::Var {
                ty, init, getter, ..
            } => {
                if let Some(ty) = ty {
                    self.ty(ty);
                }
                if let Some(init) = init {
                    self.expr(init);
                }
                if let Some(getter) = getter {
                    self.block(getter, FxHashSet::default());
                }
            }
            DeclKind::Func {
                params, ret, body, ..
            } => {
                for param in params {
                    self.ty(&param.ty);
                }
                if let Some(ret) = ret {
                    self.ty(ret);
                }
                if let Some(body) = body {
                    self.block(body, params.iter().map(|p| p.name).collect());
                }
            }
            DeclKind::Nominal { inherits, .. } => {
                for ty in inherits {
                    self.ty(ty);
                }
            }
            DeclKind::Extension {
                extended, conforms, ..
            } => {
                self.ty(extended);
                for ty in conforms {
                    self.ty(ty);
                }
            }
            DeclKind::Typealias { target } => self.ty(target),
            DeclKind::OperatorDecl | DeclKind::Error => {}
        }
    }

    fn block(&mut self, stmts: &[Stmt], bindings: FxHashSet<Ident>) {
        self.scopes.push(bindings);
        for stmt in stmts {
            match stmt {
                Stmt::Return { value, .. } => {
                    if let Some(value) = value {
                        self.expr(value);
                    }
                }
                Stmt::Local { name, ty, init, .. } => {
                    if let Some(ty) = ty {
                        self.ty(ty);
                    }
                    if let Some(init) = init {
                        self.expr(init);
                    }
                    if let Some(scope) = self.scopes.last_mut() {
                        scope.insert(*name);
                    }
                }
                Stmt::Expr(expr) => self.expr(expr),
                Stmt::Error(_) => {}
            }
        }
        self.scopes.pop();
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::IntLit(_) => self.mention("literal integer-literal".to_string()),
            Expr::BoolLit(..) => self.mention("literal boolean-literal".to_string()),
            Expr::StringLit { segments, .. } => {
                self.mention("literal string-literal".to_string());
                if !segments.is_empty() {
                    self.mention("literal string-interpolation".to_string());
                }
                for segment in segments {
                    self.expr(segment);
                }
            }
            Expr::Name { name, .. } => {
                if !self.is_local(*name) {
                    let name = self.interner.resolve(*name).to_string();
                    self.mention(name);
                }
            }
            Expr::Member { base, .. } => self.expr(base),
            Expr::Call { callee, args, .. } => {
                self.expr(callee);
                for arg in args {
                    self.expr(arg);
                }
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                let op = format!("operator {}", self.interner.resolve(*op));
                self.mention(op);
                self.expr(lhs);
                self.expr(rhs);
            }
            Expr::SelfRef(_) | Expr::Error(_) => {}
        }
    }
}
