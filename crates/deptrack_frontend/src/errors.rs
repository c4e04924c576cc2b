//! Diagnostic codes emitted by the front end and the batch coordinator.
//!
//! `E100`--`E101` are problems in the user's sources. `D300`--`D301` are
//! problems of dependency tracking itself: they never fail the batch, but
//! tell the build driver that some incremental data is missing.

use deptrack_diagnostics::{Category, Diagnostic, DiagnosticCode, Label};
use deptrack_query::QueryError;
use deptrack_source::Span;

/// Lexical error (unterminated string, stray character).
pub const E100: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 100,
};

/// Syntax error.
pub const E101: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 101,
};

/// A query depended on itself.
pub const D300: DiagnosticCode = DiagnosticCode {
    category: Category::Tracking,
    number: 300,
};

/// Incremental dependency data for a file is unavailable.
pub const D301: DiagnosticCode = DiagnosticCode {
    category: Category::Tracking,
    number: 301,
};

/// Creates a D300 warning for a query error raised while checking the
/// declaration at `span`.
pub fn cyclic_query(err: &QueryError, span: Span) -> Diagnostic {
    match err {
        QueryError::Cyclic { .. } => Diagnostic::warning(D300, err.to_string(), span)
            .with_label(Label::new(span, "while checking this declaration"))
            .with_note(format!("evaluation stack: {}", err.cycle_path()))
            .with_help("add an explicit type annotation to break the cycle"),
    }
}

/// Creates a D301 warning for a file whose record could not be written.
pub fn dependencies_unavailable(file: &str, reason: &str) -> Diagnostic {
    Diagnostic::warning(
        D301,
        format!("incremental dependency data for `{file}` is unavailable"),
        Span::DUMMY,
    )
    .with_note(reason.to_string())
}
