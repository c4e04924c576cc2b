//! Core parser infrastructure and declaration parsing rules.
//!
//! The [`Parser`] struct provides primitive operations (advance, expect, eat)
//! and error recovery, while the methods here parse source files, declarations,
//! member blocks and statements. Expressions live in `expr.rs`.

use crate::ast::*;
use crate::errors;
use crate::token::{Token, TokenKind};
use deptrack_common::{Ident, Interner};
use deptrack_diagnostics::{Diagnostic, DiagnosticSink};
use deptrack_source::{FileId, Span};

/// A recursive descent parser for the declaration language.
///
/// Consumes a token stream produced by the lexer and builds a
/// [`SourceFileAst`]. Errors are reported to the diagnostic sink and
/// represented as `Error` variants in the AST.
pub struct Parser<'src> {
    pub(crate) tokens: Vec<Token>,
    pub(crate) pos: usize,
    pub(crate) source: &'src str,
    pub(crate) file: FileId,
    pub(crate) interner: &'src Interner,
    pub(crate) sink: &'src DiagnosticSink,
    /// Token index ranges left out of interface text, in source order.
    excluded: Vec<(usize, usize)>,
}

impl<'src> Parser<'src> {
    /// Creates a new parser from a token stream produced by the lexer.
    ///
    /// The `tokens` must have been lexed from `source` for the given `file`.
    pub fn new(
        tokens: Vec<Token>,
        source: &'src str,
        file: FileId,
        interner: &'src Interner,
        sink: &'src DiagnosticSink,
    ) -> Self {
        Self {
            tokens,
            pos: 0,
            source,
            file,
            interner,
            sink,
            excluded: Vec::new(),
        }
    }

    // ========================================================================
    // Primitive operations
    // ========================================================================

    pub(crate) fn current(&self) -> TokenKind {
        self.tokens[self.pos].kind
    }

    pub(crate) fn current_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    pub(crate) fn current_text(&self) -> &'src str {
        self.text_of(self.pos)
    }

    fn text_of(&self, index: usize) -> &'src str {
        let span = self.tokens[index].span;
        self.source
            .get(span.start as usize..span.end as usize)
            .unwrap_or("")
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.current() == kind
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.current() == TokenKind::Eof
    }

    pub(crate) fn peek_kind(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map_or(TokenKind::Eof, |t| t.kind)
    }

    pub(crate) fn prev_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            self.current_span()
        }
    }

    pub(crate) fn advance(&mut self) {
        if !self.at_eof() {
            self.pos += 1;
        }
    }

    /// Consumes the current token if it matches `kind`.
    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Expects the current token to match `kind`. Emits an error if not.
    pub(crate) fn expect(&mut self, kind: TokenKind) {
        if !self.eat(kind) {
            self.expected(&format!("{kind:?}"));
        }
    }

    /// Expects and returns an identifier. Emits an error and returns a
    /// placeholder if not.
    pub(crate) fn expect_ident(&mut self) -> Ident {
        if self.at(TokenKind::Identifier) {
            let ident = self.interner.get_or_intern(self.current_text());
            self.advance();
            ident
        } else {
            self.expected("identifier");
            self.interner.get_or_intern("<missing>")
        }
    }

    // ========================================================================
    // Error handling and recovery
    // ========================================================================

    pub(crate) fn error(&self, msg: &str) {
        self.sink
            .emit(Diagnostic::error(errors::E101, msg, self.current_span()));
    }

    pub(crate) fn expected(&self, what: &str) {
        let actual = format!("{:?}", self.current());
        self.sink.emit(Diagnostic::error(
            errors::E101,
            format!("expected {what}, found {actual}"),
            self.current_span(),
        ));
    }

    /// Skips at least one token, then up to the next declaration start, `}` or
    /// end of file.
    fn recover_to_decl(&mut self) {
        self.advance();
        while !self.at_eof() && !self.at(TokenKind::RightBrace) && !self.current().starts_decl() {
            self.advance();
        }
    }

    // ========================================================================
    // Interface text
    // ========================================================================

    fn exclude_from(&mut self, start: usize) {
        if start < self.pos {
            self.excluded.push((start, self.pos));
        }
    }

    fn is_excluded(&self, index: usize) -> bool {
        let k = self.excluded.partition_point(|&(start, _)| start <= index);
        k > 0 && index < self.excluded[k - 1].1
    }

    /// The canonical interface of tokens `start..end`: texts joined by single
    /// spaces, skipping excluded ranges. Whitespace, comments and bodies
    /// therefore never affect it.
    fn interface_text(&self, start: usize, end: usize) -> String {
        let mut text = String::new();
        for index in start..end {
            if self.is_excluded(index) || self.tokens[index].kind == TokenKind::Semicolon {
                continue;
            }
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(self.text_of(index));
        }
        text
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    /// Parses a complete source file.
    pub fn parse_source_file(&mut self) -> SourceFileAst {
        let start = self.current_span();
        let mut items = Vec::new();
        while !self.at_eof() {
            if self.eat(TokenKind::Semicolon) {
                continue;
            }
            if self.current().starts_decl() {
                items.push(self.parse_decl());
            } else {
                items.push(self.error_decl("expected declaration"));
            }
        }
        let span = match (items.first(), items.last()) {
            (Some(first), Some(last)) => first.span.to(last.span),
            _ => start,
        };
        SourceFileAst { items, span }
    }

    fn error_decl(&mut self, msg: &str) -> Decl {
        let span = self.current_span();
        self.error(msg);
        self.recover_to_decl();
        Decl {
            kind: DeclKind::Error,
            name: self.interner.get_or_intern("<error>"),
            visibility: Visibility::Internal,
            is_static: false,
            interface: String::new(),
            span,
        }
    }

    /// Parses one declaration with its modifiers.
    pub(crate) fn parse_decl(&mut self) -> Decl {
        let start_index = self.pos;
        let start_span = self.current_span();
        let mut visibility = Visibility::Internal;
        let mut is_static = false;
        loop {
            match self.current() {
                TokenKind::Private => visibility = Visibility::Private,
                TokenKind::Fileprivate => visibility = Visibility::Fileprivate,
                TokenKind::Internal => visibility = Visibility::Internal,
                TokenKind::Public => visibility = Visibility::Public,
                TokenKind::Static => is_static = true,
                _ => break,
            }
            self.advance();
        }

        let (name, kind) = match self.current() {
            TokenKind::Var | TokenKind::Let => self.parse_var(),
            TokenKind::Func => self.parse_func(),
            TokenKind::Struct | TokenKind::Class | TokenKind::Protocol => self.parse_nominal(),
            TokenKind::Extension => self.parse_extension(),
            TokenKind::Typealias => self.parse_typealias(),
            TokenKind::Infix => self.parse_operator_decl(),
            _ => return self.error_decl("expected declaration after modifiers"),
        };
        self.eat(TokenKind::Semicolon);

        Decl {
            kind,
            name,
            visibility,
            is_static,
            interface: self.interface_text(start_index, self.pos),
            span: start_span.to(self.prev_span()),
        }
    }

    fn parse_var(&mut self) -> (Ident, DeclKind) {
        let is_let = self.at(TokenKind::Let);
        self.advance();
        let name = self.expect_ident();
        let ty = if self.eat(TokenKind::Colon) {
            Some(self.parse_type_ref())
        } else {
            None
        };

        let mut init = None;
        let mut getter = None;
        if self.at(TokenKind::Equals) {
            let start = self.pos;
            self.advance();
            init = Some(self.parse_expr());
            // with an annotation the initializer is an implementation detail
            if ty.is_some() {
                self.exclude_from(start);
            }
        } else if self.at(TokenKind::LeftBrace) && !is_let {
            let start = self.pos;
            getter = Some(self.parse_block());
            self.exclude_from(start);
        }

        (
            name,
            DeclKind::Var {
                ty,
                init,
                getter,
                is_let,
            },
        )
    }

    fn parse_func(&mut self) -> (Ident, DeclKind) {
        self.advance();
        let (name, is_operator) = match self.current() {
            TokenKind::OperatorSymbol => {
                let symbol = self.interner.get_or_intern(self.current_text());
                self.advance();
                (symbol, true)
            }
            _ => (self.expect_ident(), false),
        };

        self.expect(TokenKind::LeftParen);
        let mut params = Vec::new();
        while !self.at(TokenKind::RightParen) && !self.at_eof() {
            params.push(self.parse_param());
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightParen);

        let ret = if self.eat(TokenKind::Arrow) {
            Some(self.parse_type_ref())
        } else {
            None
        };

        let body = if self.at(TokenKind::LeftBrace) {
            let start = self.pos;
            let body = self.parse_block();
            self.exclude_from(start);
            Some(body)
        } else {
            None
        };

        (
            name,
            DeclKind::Func {
                params,
                ret,
                body,
                is_operator,
            },
        )
    }

    /// Parses `[label] name: Type`. The argument label is not kept.
    fn parse_param(&mut self) -> Param {
        let start = self.current_span();
        let mut name = self.expect_ident();
        if self.at(TokenKind::Identifier) {
            name = self.expect_ident();
        }
        self.expect(TokenKind::Colon);
        let ty = self.parse_type_ref();
        Param {
            name,
            ty,
            span: start.to(self.prev_span()),
        }
    }

    pub(crate) fn parse_type_ref(&mut self) -> TypeRef {
        let span = self.current_span();
        let name = if self.at(TokenKind::Identifier) {
            self.expect_ident()
        } else {
            self.expected("type name");
            self.interner.get_or_intern("<missing>")
        };
        TypeRef { name, span }
    }

    fn parse_type_list(&mut self) -> Vec<TypeRef> {
        let mut types = Vec::new();
        if self.eat(TokenKind::Colon) {
            loop {
                types.push(self.parse_type_ref());
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        types
    }

    fn parse_nominal(&mut self) -> (Ident, DeclKind) {
        let kind = match self.current() {
            TokenKind::Class => NominalKind::Class,
            TokenKind::Protocol => NominalKind::Protocol,
            _ => NominalKind::Struct,
        };
        self.advance();
        let name = self.expect_ident();
        let inherits = self.parse_type_list();
        let members = self.parse_member_block();
        (
            name,
            DeclKind::Nominal {
                kind,
                inherits,
                members,
            },
        )
    }

    fn parse_extension(&mut self) -> (Ident, DeclKind) {
        self.advance();
        let extended = self.parse_type_ref();
        let conforms = self.parse_type_list();
        let members = self.parse_member_block();
        (
            extended.name,
            DeclKind::Extension {
                extended,
                conforms,
                members,
            },
        )
    }

    fn parse_typealias(&mut self) -> (Ident, DeclKind) {
        self.advance();
        let name = self.expect_ident();
        self.expect(TokenKind::Equals);
        let target = self.parse_type_ref();
        (name, DeclKind::Typealias { target })
    }

    fn parse_operator_decl(&mut self) -> (Ident, DeclKind) {
        self.advance();
        self.expect(TokenKind::Operator);
        let symbol = if self.at(TokenKind::OperatorSymbol) {
            let symbol = self.interner.get_or_intern(self.current_text());
            self.advance();
            symbol
        } else {
            self.expected("operator symbol");
            self.interner.get_or_intern("<missing>")
        };
        (symbol, DeclKind::OperatorDecl)
    }

    fn parse_member_block(&mut self) -> Vec<Decl> {
        let mut members = Vec::new();
        self.expect(TokenKind::LeftBrace);
        while !self.at(TokenKind::RightBrace) && !self.at_eof() {
            if self.eat(TokenKind::Semicolon) {
                continue;
            }
            if self.current().starts_decl() {
                members.push(self.parse_decl());
            } else {
                members.push(self.error_decl("expected member declaration"));
            }
        }
        self.expect(TokenKind::RightBrace);
        members
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// Parses `{ stmt* }`.
    pub(crate) fn parse_block(&mut self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        self.expect(TokenKind::LeftBrace);
        while !self.at(TokenKind::RightBrace) && !self.at_eof() {
            if self.eat(TokenKind::Semicolon) {
                continue;
            }
            let before = self.pos;
            stmts.push(self.parse_stmt());
            if self.pos == before {
                // nothing consumed: skip the offending token
                self.advance();
            }
        }
        self.expect(TokenKind::RightBrace);
        stmts
    }

    fn parse_stmt(&mut self) -> Stmt {
        let start = self.current_span();
        match self.current() {
            TokenKind::Return => {
                self.advance();
                let value = if matches!(
                    self.current(),
                    TokenKind::RightBrace | TokenKind::Semicolon | TokenKind::Eof
                ) {
                    None
                } else {
                    Some(self.parse_expr())
                };
                Stmt::Return {
                    value,
                    span: start.to(self.prev_span()),
                }
            }
            TokenKind::Let | TokenKind::Var => {
                self.advance();
                let name = self.expect_ident();
                let ty = if self.eat(TokenKind::Colon) {
                    Some(self.parse_type_ref())
                } else {
                    None
                };
                let init = if self.eat(TokenKind::Equals) {
                    Some(self.parse_expr())
                } else {
                    None
                };
                Stmt::Local {
                    name,
                    ty,
                    init,
                    span: start.to(self.prev_span()),
                }
            }
            kind if kind.starts_decl() => {
                self.error("nested declarations are not supported");
                Stmt::Error(start)
            }
            _ => Stmt::Expr(self.parse_expr()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::parse_source;
    use deptrack_common::Interner;
    use deptrack_diagnostics::DiagnosticSink;
    use deptrack_source::FileId;

    fn parse(source: &str) -> (SourceFileAst, DiagnosticSink, Interner) {
        let interner = Interner::new();
        let sink = DiagnosticSink::new();
        let ast = parse_source(source, FileId::from_raw(0), &interner, &sink);
        (ast, sink, interner)
    }

    fn parse_ok(source: &str) -> (SourceFileAst, Interner) {
        let (ast, sink, interner) = parse(source);
        let errors = sink.take_all();
        assert!(
            errors.is_empty(),
            "unexpected errors: {:?}",
            errors.iter().map(|e| &e.message).collect::<Vec<_>>()
        );
        (ast, interner)
    }

    #[test]
    fn computed_property_and_let() {
        let (ast, interner) =
            parse_ok("fileprivate var v: String { return \"\\(x)\" }; fileprivate let x = \"a\"");
        assert_eq!(ast.items.len(), 2);

        let v = &ast.items[0];
        assert_eq!(interner.resolve(v.name), "v");
        assert_eq!(v.visibility, Visibility::Fileprivate);
        assert_eq!(v.interface, "fileprivate var v : String");
        match &v.kind {
            DeclKind::Var {
                ty: Some(ty),
                getter: Some(body),
                is_let: false,
                ..
            } => {
                assert_eq!(interner.resolve(ty.name), "String");
                match &body[0] {
                    Stmt::Return {
                        value: Some(Expr::StringLit { segments, .. }),
                        ..
                    } => {
                        assert_eq!(segments.len(), 1);
                        assert!(matches!(segments[0], Expr::Name { .. }));
                    }
                    other => panic!("expected return of string literal, got {other:?}"),
                }
            }
            other => panic!("expected computed var, got {other:?}"),
        }

        let x = &ast.items[1];
        assert_eq!(x.interface, "fileprivate let x = \"a\"");
    }

    #[test]
    fn function_interface_excludes_body() {
        let (a, _) = parse_ok("func f(a: Int) -> Int { return a + 1 }");
        let (b, _) = parse_ok("func f(a: Int) -> Int {\n  // comment\n  return a * 2\n}");
        assert_eq!(a.items[0].interface, "func f ( a : Int ) -> Int");
        assert_eq!(a.items[0].interface, b.items[0].interface);
    }

    #[test]
    fn annotated_initializer_is_not_interface() {
        let (ast, _) = parse_ok("let a: Int = 1\nlet b = 2");
        assert_eq!(ast.items[0].interface, "let a : Int");
        assert_eq!(ast.items[1].interface, "let b = 2");
    }

    #[test]
    fn nominal_members_and_inheritance() {
        let (ast, interner) = parse_ok(
            "class Base {}\nclass Derived: Base, P {\n  var name: String\n  static func make() -> Derived { return Derived() }\n}",
        );
        let derived = &ast.items[1];
        match &derived.kind {
            DeclKind::Nominal {
                kind: NominalKind::Class,
                inherits,
                members,
            } => {
                let names: Vec<&str> = inherits.iter().map(|t| interner.resolve(t.name)).collect();
                assert_eq!(names, ["Base", "P"]);
                assert_eq!(members.len(), 2);
                assert!(members[1].is_static);
            }
            other => panic!("expected class, got {other:?}"),
        }
        assert_eq!(
            derived.interface,
            "class Derived : Base , P { var name : String static func make ( ) -> Derived }"
        );
    }

    #[test]
    fn extension_and_operators() {
        let (ast, interner) = parse_ok(
            "infix operator +++\nfunc +++ (lhs: Int, rhs: Int) -> Int { return lhs + rhs }\nextension String: P { func twice() -> String { return self + self } }",
        );
        assert!(matches!(ast.items[0].kind, DeclKind::OperatorDecl));
        assert_eq!(interner.resolve(ast.items[0].name), "+++");
        match &ast.items[1].kind {
            DeclKind::Func {
                params,
                is_operator: true,
                ..
            } => assert_eq!(params.len(), 2),
            other => panic!("expected operator func, got {other:?}"),
        }
        match &ast.items[2].kind {
            DeclKind::Extension {
                extended, members, ..
            } => {
                assert_eq!(interner.resolve(extended.name), "String");
                assert_eq!(members.len(), 1);
            }
            other => panic!("expected extension, got {other:?}"),
        }
    }

    #[test]
    fn typealias_and_protocol_requirements() {
        let (ast, _) = parse_ok(
            "typealias StringLiteralType = String\nprotocol P { func f() -> Int }",
        );
        assert!(matches!(ast.items[0].kind, DeclKind::Typealias { .. }));
        match &ast.items[1].kind {
            DeclKind::Nominal { members, .. } => {
                assert!(matches!(members[0].kind, DeclKind::Func { body: None, .. }));
            }
            other => panic!("expected protocol, got {other:?}"),
        }
    }

    #[test]
    fn recovers_from_garbage() {
        let (ast, sink, _) = parse("42 let x = 1\nfunc f( { }\nlet y = 2");
        assert!(sink.has_errors());
        assert!(matches!(ast.items[0].kind, DeclKind::Error));
        assert!(ast
            .items
            .iter()
            .any(|d| d.interface == "let y = 2"));
    }

    #[test]
    fn locals_and_calls() {
        let (ast, _) = parse_ok("func f() { let n = g(x: 1, 2).count; print(n) }");
        match &ast.items[0].kind {
            DeclKind::Func { body: Some(body), .. } => {
                assert_eq!(body.len(), 2);
                match &body[0] {
                    Stmt::Local {
                        init: Some(Expr::Member { base, .. }),
                        ..
                    } => match base.as_ref() {
                        Expr::Call { args, .. } => assert_eq!(args.len(), 2),
                        other => panic!("expected call, got {other:?}"),
                    },
                    other => panic!("expected local, got {other:?}"),
                }
            }
            other => panic!("expected func, got {other:?}"),
        }
    }
}
