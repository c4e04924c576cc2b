//! Diagnostic rendering for terminal output.

use crate::diagnostic::Diagnostic;
use crate::severity::Severity;
use deptrack_source::SourceDb;

/// Formats diagnostics into output strings.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a formatted string.
    fn render(&self, diag: &Diagnostic, source_db: &SourceDb) -> String;
}

/// Renders diagnostics in a rustc-style terminal format:
///
/// ```text
/// error[E101]: expected '}'
///   --> 1.input:1:12
///   |
/// 1 | struct S { var a: Int
///   |            ^ unclosed body
///   = note: ...
/// ```
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes for the severity header.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn header(&self, diag: &Diagnostic) -> String {
        let severity = diag.severity.to_string();
        if !self.color {
            return severity;
        }
        let ansi = match diag.severity {
            Severity::Error => "31",
            Severity::Warning => "33",
        };
        format!("\x1b[1;{ansi}m{severity}\x1b[0m")
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic, source_db: &SourceDb) -> String {
        let mut out = format!("{}[{}]: {}\n", self.header(diag), diag.code, diag.message);

        if !diag.primary_span.is_dummy() {
            let resolved = source_db.resolve_span(diag.primary_span);
            out.push_str(&format!("  --> {resolved}\n"));

            let file = source_db.get_file(diag.primary_span.file);
            let (line, col) = file.line_col(diag.primary_span.start);
            let line_num = line.to_string();
            let padding = " ".repeat(line_num.len());
            let line_content = source_line(&file.content, diag.primary_span.start);

            out.push_str(&format!("{padding} |\n"));
            out.push_str(&format!("{line_num} | {line_content}\n"));

            let carets = "^".repeat(diag.primary_span.len().max(1) as usize);
            let col_padding = " ".repeat((col as usize).saturating_sub(1));
            let primary_msg = diag
                .labels
                .iter()
                .find(|l| l.span == diag.primary_span)
                .map(|l| format!(" {}", l.message))
                .unwrap_or_default();
            out.push_str(&format!("{padding} | {col_padding}{carets}{primary_msg}\n"));
        }

        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }
        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }
        out
    }
}

fn source_line(content: &str, byte_offset: u32) -> &str {
    let offset = (byte_offset as usize).min(content.len());
    let start = content[..offset].rfind('\n').map_or(0, |pos| pos + 1);
    let end = content[offset..]
        .find('\n')
        .map_or(content.len(), |pos| offset + pos);
    &content[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Category, DiagnosticCode};
    use crate::label::Label;
    use deptrack_source::{FileRole, Span};

    #[test]
    fn render_error_with_span() {
        let mut source_db = SourceDb::new();
        let file = source_db.add_source("1.input", "let x = \"a\nlet y = 1\n", FileRole::Primary);

        let code = DiagnosticCode::new(Category::Error, 100);
        let span = Span::new(file, 8, 10);
        let diag = Diagnostic::error(code, "unterminated string literal", span)
            .with_label(Label::new(span, "string starts here"));

        let output = TerminalRenderer::new(false).render(&diag, &source_db);
        assert!(output.contains("error[E100]: unterminated string literal"));
        assert!(output.contains("--> 1.input:1:9"));
        assert!(output.contains("1 | let x = \"a"));
        assert!(output.contains("^^ string starts here"));
    }

    #[test]
    fn render_batch_level_warning() {
        let source_db = SourceDb::new();
        let code = DiagnosticCode::new(Category::Tracking, 301);
        let diag = Diagnostic::warning(code, "dependency record for 2.input unavailable", Span::DUMMY)
            .with_note("permission denied");

        let output = TerminalRenderer::new(false).render(&diag, &source_db);
        assert!(output.contains("warning[D301]"));
        assert!(output.contains("= note: permission denied"));
        assert!(!output.contains("-->"));
    }

    #[test]
    fn color_wraps_severity() {
        let source_db = SourceDb::new();
        let code = DiagnosticCode::new(Category::Error, 101);
        let diag = Diagnostic::error(code, "boom", Span::DUMMY);
        let output = TerminalRenderer::new(true).render(&diag, &source_db);
        assert!(output.starts_with("\x1b[1;31merror\x1b[0m[E101]"));
    }
}
