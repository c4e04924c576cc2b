//! Token types for the declaration-language lexer.

use deptrack_source::Span;
use serde::{Deserialize, Serialize};

/// A token kind.
///
/// Literal values and names are not stored in the token; they are read back
/// from the source text through the token's span.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum TokenKind {
    // === Keywords ===
    /// `var`
    Var,
    /// `let`
    Let,
    /// `func`
    Func,
    /// `struct`
    Struct,
    /// `class`
    Class,
    /// `protocol`
    Protocol,
    /// `extension`
    Extension,
    /// `typealias`
    Typealias,
    /// `infix`
    Infix,
    /// `operator`
    Operator,
    /// `return`
    Return,
    /// `private`
    Private,
    /// `fileprivate`
    Fileprivate,
    /// `internal`
    Internal,
    /// `public`
    Public,
    /// `static`
    Static,
    /// `self`
    SelfValue,
    /// `true`
    True,
    /// `false`
    False,

    // === Names and literals ===
    /// A plain identifier.
    Identifier,
    /// A run of operator characters such as `+` or `+++`.
    OperatorSymbol,
    /// A decimal integer literal.
    IntLiteral,
    /// A string literal, including any `\(...)` interpolations.
    StringLiteral,

    // === Punctuation ===
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `:`
    Colon,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `;`
    Semicolon,
    /// `=`
    Equals,
    /// `->`
    Arrow,

    // === Special ===
    /// A character sequence the lexer could not make sense of.
    Error,
    /// End of input.
    Eof,
}

impl TokenKind {
    /// Returns `true` for declaration modifiers.
    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            TokenKind::Private
                | TokenKind::Fileprivate
                | TokenKind::Internal
                | TokenKind::Public
                | TokenKind::Static
        )
    }

    /// Returns `true` for tokens that can start a declaration.
    pub fn starts_decl(self) -> bool {
        self.is_modifier()
            || matches!(
                self,
                TokenKind::Var
                    | TokenKind::Let
                    | TokenKind::Func
                    | TokenKind::Struct
                    | TokenKind::Class
                    | TokenKind::Protocol
                    | TokenKind::Extension
                    | TokenKind::Typealias
                    | TokenKind::Infix
            )
    }
}

/// A lexed token with its kind and source location.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Token {
    /// The kind of this token.
    pub kind: TokenKind,
    /// The source span covering this token's text.
    pub span: Span,
}

/// Looks up a keyword. Keywords are case-sensitive.
pub fn lookup_keyword(s: &str) -> Option<TokenKind> {
    match s {
        "var" => Some(TokenKind::Var),
        "let" => Some(TokenKind::Let),
        "func" => Some(TokenKind::Func),
        "struct" => Some(TokenKind::Struct),
        "class" => Some(TokenKind::Class),
        "protocol" => Some(TokenKind::Protocol),
        "extension" => Some(TokenKind::Extension),
        "typealias" => Some(TokenKind::Typealias),
        "infix" => Some(TokenKind::Infix),
        "operator" => Some(TokenKind::Operator),
        "return" => Some(TokenKind::Return),
        "private" => Some(TokenKind::Private),
        "fileprivate" => Some(TokenKind::Fileprivate),
        "internal" => Some(TokenKind::Internal),
        "public" => Some(TokenKind::Public),
        "static" => Some(TokenKind::Static),
        "self" => Some(TokenKind::SelfValue),
        "true" => Some(TokenKind::True),
        "false" => Some(TokenKind::False),
        _ => None,
    }
}
