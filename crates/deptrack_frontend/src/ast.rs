//! AST node types for the declaration language.
//!
//! Every node carries a [`Span`]. Error recovery is represented by `Error`
//! variants in [`DeclKind`], [`Stmt`] and [`Expr`].

use deptrack_common::Ident;
use deptrack_source::Span;
use serde::{Deserialize, Serialize};

// ============================================================================
// Top-level
// ============================================================================

/// A parsed source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFileAst {
    /// Top-level declarations in source order.
    pub items: Vec<Decl>,
    /// The span covering the entire file.
    pub span: Span,
}

/// Access level written on a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Visibility {
    /// No modifier, or `internal`.
    #[default]
    Internal,
    /// `public`
    Public,
    /// `private`
    Private,
    /// `fileprivate`
    Fileprivate,
}

impl Visibility {
    /// Returns `true` for `private` and `fileprivate`.
    pub fn is_file_private(self) -> bool {
        matches!(self, Visibility::Private | Visibility::Fileprivate)
    }
}

/// A declaration, at top level or as a member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decl {
    /// What is declared.
    pub kind: DeclKind,
    /// Declared name. For extensions, the extended type; for operator
    /// declarations and operator functions, the symbol.
    pub name: Ident,
    /// Access modifier.
    pub visibility: Visibility,
    /// Whether the declaration is `static`.
    pub is_static: bool,
    /// Canonical interface text: the declaration's tokens separated by single
    /// spaces, without function bodies, getter bodies and the initializers of
    /// annotated variables.
    pub interface: String,
    /// Source span of the whole declaration.
    pub span: Span,
}

/// The kind-specific part of a [`Decl`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeclKind {
    /// `var` or `let`.
    Var {
        /// Type annotation.
        ty: Option<TypeRef>,
        /// Initializer expression.
        init: Option<Expr>,
        /// Computed-property body.
        getter: Option<Vec<Stmt>>,
        /// `true` for `let`.
        is_let: bool,
    },
    /// `func`, including operator implementations.
    Func {
        /// Parameters in order.
        params: Vec<Param>,
        /// Declared result type; `None` means `Void`.
        ret: Option<TypeRef>,
        /// Body; absent for requirements and built-in operators.
        body: Option<Vec<Stmt>>,
        /// Whether the name is an operator symbol.
        is_operator: bool,
    },
    /// `struct`, `class` or `protocol`.
    Nominal {
        /// Which nominal keyword introduced it.
        kind: NominalKind,
        /// Inheritance clause: superclass first (for classes), then protocols.
        inherits: Vec<TypeRef>,
        /// Member declarations.
        members: Vec<Decl>,
    },
    /// `extension T: P { ... }`.
    Extension {
        /// The extended type.
        extended: TypeRef,
        /// Added conformances.
        conforms: Vec<TypeRef>,
        /// Member declarations.
        members: Vec<Decl>,
    },
    /// `typealias Name = Target`.
    Typealias {
        /// The aliased type.
        target: TypeRef,
    },
    /// `infix operator SYM`.
    OperatorDecl,
    /// A declaration that failed to parse.
    Error,
}

/// The keyword of a nominal type declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NominalKind {
    /// `struct`
    Struct,
    /// `class`
    Class,
    /// `protocol`
    Protocol,
}

/// A function parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    /// Parameter name as used in the body.
    pub name: Ident,
    /// Parameter type.
    pub ty: TypeRef,
    /// Source span.
    pub span: Span,
}

/// A reference to a type by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    /// The referenced type name.
    pub name: Ident,
    /// Source span.
    pub span: Span,
}

// ============================================================================
// Statements and expressions
// ============================================================================

/// A statement in a function or getter body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    /// `return [expr]`
    Return {
        /// Returned value.
        value: Option<Expr>,
        /// Source span.
        span: Span,
    },
    /// `let|var name[: T] = expr`
    Local {
        /// Bound name.
        name: Ident,
        /// Type annotation.
        ty: Option<TypeRef>,
        /// Initializer.
        init: Option<Expr>,
        /// Source span.
        span: Span,
    },
    /// An expression evaluated for its effect.
    Expr(Expr),
    /// A statement that failed to parse.
    Error(Span),
}

/// An expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    /// Integer literal.
    IntLit(Span),
    /// `true` or `false`.
    BoolLit(bool, Span),
    /// String literal. `segments` holds the interpolated expressions; a
    /// literal with no interpolation has none.
    StringLit {
        /// Interpolated expressions in order.
        segments: Vec<Expr>,
        /// Source span.
        span: Span,
    },
    /// A bare name.
    Name {
        /// The referenced name.
        name: Ident,
        /// Source span.
        span: Span,
    },
    /// `self`
    SelfRef(Span),
    /// `base.name`
    Member {
        /// The accessed value.
        base: Box<Expr>,
        /// Member name.
        name: Ident,
        /// Source span.
        span: Span,
    },
    /// `callee(args)`; argument labels are dropped.
    Call {
        /// Called expression.
        callee: Box<Expr>,
        /// Arguments in order.
        args: Vec<Expr>,
        /// Source span.
        span: Span,
    },
    /// `lhs op rhs`
    Binary {
        /// Operator symbol.
        op: Ident,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
        /// Source span.
        span: Span,
    },
    /// An expression that failed to parse.
    Error(Span),
}

impl Expr {
    /// Returns the span of this expression.
    pub fn span(&self) -> Span {
        match self {
            Expr::IntLit(span)
            | Expr::BoolLit(_, span)
            | Expr::SelfRef(span)
            | Expr::Error(span) => *span,
            Expr::StringLit { span, .. }
            | Expr::Name { span, .. }
            | Expr::Member { span, .. }
            | Expr::Call { span, .. }
            | Expr::Binary { span, .. } => *span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deptrack_source::FileId;

    #[test]
    fn expr_span() {
        let span = Span::new(FileId::from_raw(0), 3, 9);
        let expr = Expr::Member {
            base: Box::new(Expr::SelfRef(Span::new(FileId::from_raw(0), 3, 7))),
            name: Ident::from_raw(0),
            span,
        };
        assert_eq!(expr.span(), span);
    }

    #[test]
    fn file_private_visibility() {
        assert!(Visibility::Private.is_file_private());
        assert!(Visibility::Fileprivate.is_file_private());
        assert!(!Visibility::Public.is_file_private());
        assert!(!Visibility::default().is_file_private());
    }
}
