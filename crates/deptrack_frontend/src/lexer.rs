//! Lexical analyzer for the declaration language.
//!
//! Converts source text into a sequence of [`Token`]s: keywords, identifiers,
//! operator symbols, integer and string literals, and punctuation. Line and
//! block comments are skipped. A string literal with `\(...)` interpolations
//! is a single token; the parser lexes each interpolation again with
//! [`lex_range`]. Errors are reported to the [`DiagnosticSink`] and produce
//! [`TokenKind::Error`] tokens.

use crate::errors;
use crate::token::{lookup_keyword, Token, TokenKind};
use deptrack_diagnostics::{Diagnostic, DiagnosticSink, Label};
use deptrack_source::{FileId, Span};

/// Lexes the whole of `source`.
///
/// The returned vector always ends with a [`TokenKind::Eof`] token.
pub fn lex(source: &str, file: FileId, sink: &DiagnosticSink) -> Vec<Token> {
    lex_range(source, 0, source.len(), file, sink)
}

/// Lexes `source[start..end]`, producing spans relative to the whole of
/// `source`.
pub fn lex_range(
    source: &str,
    start: usize,
    end: usize,
    file: FileId,
    sink: &DiagnosticSink,
) -> Vec<Token> {
    let mut lexer = Lexer {
        source: source.as_bytes(),
        pos: start,
        end: end.min(source.len()),
        file,
        sink,
    };
    lexer.lex_all()
}

struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    end: usize,
    file: FileId,
    sink: &'a DiagnosticSink,
}

impl Lexer<'_> {
    fn lex_all(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            if self.pos >= self.end {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    span: Span::new(self.file, self.end as u32, self.end as u32),
                });
                break;
            }
            tokens.push(self.next_token());
        }
        tokens
    }

    fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        let idx = self.pos + offset;
        if idx < self.end {
            self.source[idx]
        } else {
            0
        }
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(self.file, start as u32, self.pos as u32)
    }

    fn error(&self, msg: &str, span: Span) {
        self.sink.emit(Diagnostic::error(errors::E100, msg, span));
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.pos < self.end && self.source[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.pos >= self.end {
                return;
            }
            if self.peek() == b'/' && self.peek_at(1) == b'/' {
                while self.pos < self.end && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            if self.peek() == b'/' && self.peek_at(1) == b'*' {
                let start = self.pos;
                self.pos += 2;
                loop {
                    if self.pos >= self.end {
                        self.error("unterminated block comment", self.span_from(start));
                        break;
                    }
                    if self.peek() == b'*' && self.peek_at(1) == b'/' {
                        self.pos += 2;
                        break;
                    }
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }

    fn next_token(&mut self) -> Token {
        let start = self.pos;
        let b = self.peek();

        if is_ident_start(b) {
            while self.pos < self.end && is_ident_char(self.source[self.pos]) {
                self.pos += 1;
            }
            let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap_or("");
            let kind = lookup_keyword(text).unwrap_or(TokenKind::Identifier);
            return Token {
                kind,
                span: self.span_from(start),
            };
        }

        if b.is_ascii_digit() {
            while self.pos < self.end && (self.source[self.pos].is_ascii_digit() || self.source[self.pos] == b'_') {
                self.pos += 1;
            }
            return Token {
                kind: TokenKind::IntLiteral,
                span: self.span_from(start),
            };
        }

        if b == b'"' {
            return self.lex_string(start);
        }

        if is_operator_char(b) {
            return self.lex_operator(start);
        }

        self.pos += 1;
        let kind = match b {
            b'(' => TokenKind::LeftParen,
            b')' => TokenKind::RightParen,
            b'{' => TokenKind::LeftBrace,
            b'}' => TokenKind::RightBrace,
            b':' => TokenKind::Colon,
            b',' => TokenKind::Comma,
            b'.' => TokenKind::Dot,
            b';' => TokenKind::Semicolon,
            _ => {
                // skip the rest of a multi-byte character
                while self.pos < self.end && (self.source[self.pos] & 0xC0) == 0x80 {
                    self.pos += 1;
                }
                self.error("unexpected character", self.span_from(start));
                TokenKind::Error
            }
        };
        Token {
            kind,
            span: self.span_from(start),
        }
    }

    fn lex_operator(&mut self, start: usize) -> Token {
        while self.pos < self.end && is_operator_char(self.source[self.pos]) {
            self.pos += 1;
        }
        let kind = match &self.source[start..self.pos] {
            b"=" => TokenKind::Equals,
            b"->" => TokenKind::Arrow,
            _ => TokenKind::OperatorSymbol,
        };
        Token {
            kind,
            span: self.span_from(start),
        }
    }

    /// Lexes a string literal starting at the opening quote. Interpolated
    /// expressions may contain nested parentheses and string literals.
    fn lex_string(&mut self, start: usize) -> Token {
        self.pos += 1;
        if self.skip_string_body() {
            Token {
                kind: TokenKind::StringLiteral,
                span: self.span_from(start),
            }
        } else {
            let span = self.span_from(start);
            self.sink.emit(
                Diagnostic::error(errors::E100, "unterminated string literal", span)
                    .with_label(Label::new(span, "missing closing quote")),
            );
            Token {
                kind: TokenKind::Error,
                span: self.span_from(start),
            }
        }
    }

    /// Advances past the closing quote. Returns `false` at a newline or end
    /// of input.
    fn skip_string_body(&mut self) -> bool {
        while self.pos < self.end {
            match self.source[self.pos] {
                b'"' => {
                    self.pos += 1;
                    return true;
                }
                b'\n' => return false,
                b'\\' if self.peek_at(1) == b'(' => {
                    self.pos += 2;
                    if !self.skip_interpolation() {
                        return false;
                    }
                }
                b'\\' => self.pos += 2,
                _ => self.pos += 1,
            }
        }
        false
    }

    fn skip_interpolation(&mut self) -> bool {
        let mut depth = 1usize;
        while self.pos < self.end {
            match self.source[self.pos] {
                b'(' => {
                    depth += 1;
                    self.pos += 1;
                }
                b')' => {
                    depth -= 1;
                    self.pos += 1;
                    if depth == 0 {
                        return true;
                    }
                }
                b'"' => {
                    self.pos += 1;
                    if !self.skip_string_body() {
                        return false;
                    }
                }
                b'\n' => return false,
                _ => self.pos += 1,
            }
        }
        false
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_operator_char(b: u8) -> bool {
    matches!(
        b,
        b'+' | b'-' | b'*' | b'/' | b'=' | b'<' | b'>' | b'!' | b'&' | b'|' | b'^' | b'%' | b'~' | b'?'
    )
}

/// Finds the `\(...)` interpolations of a string literal token.
///
/// `text` is the token text including its quotes and `base` its offset in
/// the file. Returns the absolute byte range of each interpolated expression,
/// without the surrounding `\(` and `)`.
pub fn interpolation_ranges(text: &str, base: usize) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut ranges = Vec::new();
    let mut i = 1;
    while i + 1 < bytes.len() {
        match bytes[i] {
            b'\\' if bytes[i + 1] == b'(' => {
                let inner_start = i + 2;
                let mut depth = 1usize;
                let mut j = inner_start;
                let mut in_string = false;
                while j < bytes.len() && depth > 0 {
                    match bytes[j] {
                        b'\\' if in_string => j += 1,
                        b'"' => in_string = !in_string,
                        b'(' if !in_string => depth += 1,
                        b')' if !in_string => depth -= 1,
                        _ => {}
                    }
                    j += 1;
                }
                if depth == 0 {
                    ranges.push((base + inner_start, base + j - 1));
                }
                i = j;
            }
            b'\\' => i += 2,
            _ => i += 1,
        }
    }
    ranges
}
