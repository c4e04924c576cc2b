//! A small front end that drives the dependency tracker.
//!
//! The front end parses a small declaration language, declares every
//! entity with its interface text, and then checks primary files by asking
//! memoized queries for everything it needs to know. The queries are the
//! only code that touches entities; the tracker turns those touches into
//! dependency edges attributed to the declaration being checked.
//!
//! # Architecture
//!
//! - **Lexer** ([`lexer`]) and **parser** ([`parser`]): recursive descent with
//!   Pratt expressions and recovery to the next declaration.
//! - **Declarations** ([`declare`]): the [`ModuleIndex`] every query reads.
//! - **Queries** ([`queries`]): name, type, member, literal and operator
//!   resolution.
//! - **Checker** ([`checker`]): walks declarations under consumer contexts.
//! - **Batch** ([`batch`]): parallel driver that emits one record per primary.

#![warn(missing_docs)]

pub mod ast;
pub mod batch;
pub mod checker;
pub mod declare;
pub mod errors;
mod expr;
pub mod lexer;
pub mod parser;
pub mod prelude;
pub mod queries;
pub mod token;
pub mod ty;

pub use ast::SourceFileAst;
pub use batch::{Batch, BatchOptions, BatchOutput, CancelFlag};
pub use checker::{CheckOutcome, FileChecker};
pub use declare::{ModuleIndex, ParsedFile};

use deptrack_common::Interner;
use deptrack_diagnostics::DiagnosticSink;
use deptrack_source::{FileId, SourceDb};

/// Parses source text belonging to `file`.
pub fn parse_source(
    source: &str,
    file: FileId,
    interner: &Interner,
    sink: &DiagnosticSink,
) -> SourceFileAst {
    let tokens = lexer::lex(source, file, sink);
    let mut parser = parser::Parser::new(tokens, source, file, interner, sink);
    parser.parse_source_file()
}

/// Parses a file of the source database.
///
/// Syntax errors are reported to `sink` and leave `Error` nodes in the AST;
/// the declarations around them are still returned.
pub fn parse_file(
    file_id: FileId,
    source_db: &SourceDb,
    interner: &Interner,
    sink: &DiagnosticSink,
) -> SourceFileAst {
    parse_source(&source_db.get_file(file_id).content, file_id, interner, sink)
}
