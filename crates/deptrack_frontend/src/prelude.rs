//! The built-in prelude: standard types, literal protocols and operators.
//!
//! The prelude is an ordinary source file with the [`FileRole::Prelude`]
//! role. Its declarations are visible to every file of a batch, and its
//! entities show up in records like any other provider, so a primary that
//! uses `String` depends on `String` and on whatever literal typealias
//! resolved it.

use deptrack_source::{FileId, FileRole, SourceDb};

/// Name under which the prelude is registered in the [`SourceDb`].
pub const PRELUDE_NAME: &str = "<prelude>";

/// Source text of the prelude.
pub const PRELUDE_SOURCE: &str = r#"
protocol AnyObject {}
protocol ExpressibleByStringLiteral {}
protocol ExpressibleByStringInterpolation: ExpressibleByStringLiteral {}
protocol ExpressibleByIntegerLiteral {}
protocol ExpressibleByBooleanLiteral {}

struct String: ExpressibleByStringLiteral, ExpressibleByStringInterpolation {
    var count: Int
    var isEmpty: Bool
}
struct Int: ExpressibleByIntegerLiteral {
    var description: String
}
struct Bool: ExpressibleByBooleanLiteral {
    var description: String
}

typealias StringLiteralType = String
typealias IntegerLiteralType = Int
typealias BooleanLiteralType = Bool

infix operator +
infix operator -
infix operator *
infix operator ==
infix operator <

func + (lhs: Int, rhs: Int) -> Int
func + (lhs: String, rhs: String) -> String
func - (lhs: Int, rhs: Int) -> Int
func * (lhs: Int, rhs: Int) -> Int
func == (lhs: Int, rhs: Int) -> Bool
func < (lhs: Int, rhs: Int) -> Bool

func print(_ item: String)
"#;

/// Adds the prelude to `db` and returns its id.
pub fn add_prelude(db: &mut SourceDb) -> FileId {
    db.add_source(PRELUDE_NAME, PRELUDE_SOURCE, FileRole::Prelude)
}
