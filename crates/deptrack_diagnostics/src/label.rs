//! Labels that annotate source spans within a diagnostic.

use deptrack_source::Span;
use serde::{Deserialize, Serialize};

/// A message attached to a source span, printed after the span's carets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// The annotated span.
    pub span: Span,
    /// The message displayed next to the underline.
    pub message: String,
}

impl Label {
    /// Creates a label for `span`.
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }
}
