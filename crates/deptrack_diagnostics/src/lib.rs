//! Structured diagnostics for the tracker and its reference front end.
//!
//! [`Diagnostic`]s carry a severity, a [`DiagnosticCode`], a primary span and
//! optional labels, notes and help. The thread-safe [`DiagnosticSink`]
//! collects them from parallel workers and [`TerminalRenderer`] formats them.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod label;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use label::Label;
pub use renderer::{DiagnosticRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
