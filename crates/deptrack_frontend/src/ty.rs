//! Types computed by the checker.
//!
//! Only as much typing as name resolution needs: a value is either an
//! instance of a named type, a type used as a value, or a function.

use deptrack_common::{Ident, Interner};
use std::fmt;
use std::sync::Arc;

/// The type of an expression or declaration.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    /// An instance of the named type.
    Nominal(Ident),
    /// The named type itself, as in `Derived()` or `String.self`.
    Metatype(Ident),
    /// A function value.
    Function {
        /// Parameter types.
        params: Arc<[Ty]>,
        /// Result type.
        ret: Box<Ty>,
    },
    /// No value.
    Void,
    /// Unknown; produced by unresolved names and malformed code. Every
    /// operation on it yields `Error` again without reporting anything.
    Error,
}

impl Ty {
    /// The nominal type whose members a member access on this type searches.
    pub fn holder(&self) -> Option<Ident> {
        match self {
            Ty::Nominal(name) | Ty::Metatype(name) => Some(*name),
            _ => None,
        }
    }

    /// The result of calling a value of this type.
    pub fn call_result(&self) -> Ty {
        match self {
            Ty::Function { ret, .. } => ret.as_ref().clone(),
            Ty::Metatype(name) => Ty::Nominal(*name),
            _ => Ty::Error,
        }
    }

    /// Renders the type with resolved names.
    pub fn display<'a>(&'a self, interner: &'a Interner) -> TyDisplay<'a> {
        TyDisplay { ty: self, interner }
    }
}

/// Display adapter returned by [`Ty::display`].
pub struct TyDisplay<'a> {
    ty: &'a Ty,
    interner: &'a Interner,
}

impl fmt::Display for TyDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ty {
            Ty::Nominal(name) => write!(f, "{}", self.interner.resolve(*name)),
            Ty::Metatype(name) => write!(f, "{}.Type", self.interner.resolve(*name)),
            Ty::Function { params, ret } => {
                write!(f, "(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param.display(self.interner))?;
                }
                write!(f, ") -> {}", ret.display(self.interner))
            }
            Ty::Void => write!(f, "()"),
            Ty::Error => write!(f, "<error>"),
        }
    }
}
