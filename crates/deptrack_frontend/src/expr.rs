//! Pratt expression parser.
//!
//! Binary operators are arbitrary operator symbols. Precedence is fixed by
//! symbol; user-defined operators share the default level:
//!
//! | BP (L,R) | Operators |
//! |----------|-----------|
//! | (1,2)    | `||` |
//! | (3,4)    | `&&` |
//! | (5,6)    | `==` `!=` `<` `<=` `>` `>=` |
//! | (7,8)    | everything else |
//! | (9,10)   | `+` `-` |
//! | (11,12)  | `*` `/` `%` |
//!
//! Postfix member access and calls bind tighter than any binary operator.

use crate::ast::*;
use crate::lexer;
use crate::parser::Parser;
use crate::token::TokenKind;

fn infix_binding_power(symbol: &str) -> (u8, u8) {
    match symbol {
        "||" => (1, 2),
        "&&" => (3, 4),
        "==" | "!=" | "<" | "<=" | ">" | ">=" => (5, 6),
        "+" | "-" => (9, 10),
        "*" | "/" | "%" => (11, 12),
        _ => (7, 8),
    }
}

impl Parser<'_> {
    /// Parses an expression.
    pub fn parse_expr(&mut self) -> Expr {
        self.parse_expr_bp(0)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Expr {
        let mut lhs = self.parse_postfix_expr();
        while self.at(TokenKind::OperatorSymbol) {
            let (l_bp, r_bp) = infix_binding_power(self.current_text());
            if l_bp < min_bp {
                break;
            }
            let op = self.interner.get_or_intern(self.current_text());
            self.advance();
            let rhs = self.parse_expr_bp(r_bp);
            let span = lhs.span().to(rhs.span());
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        lhs
    }

    fn parse_postfix_expr(&mut self) -> Expr {
        let mut expr = self.parse_primary_expr();
        loop {
            if self.eat(TokenKind::Dot) {
                let name = self.expect_ident();
                let span = expr.span().to(self.prev_span());
                expr = Expr::Member {
                    base: Box::new(expr),
                    name,
                    span,
                };
            } else if self.at(TokenKind::LeftParen) {
                let args = self.parse_call_args();
                let span = expr.span().to(self.prev_span());
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    span,
                };
            } else {
                return expr;
            }
        }
    }

    /// Parses `( [label:] expr, ... )`.
    fn parse_call_args(&mut self) -> Vec<Expr> {
        let mut args = Vec::new();
        self.expect(TokenKind::LeftParen);
        while !self.at(TokenKind::RightParen) && !self.at_eof() {
            if self.at(TokenKind::Identifier) && self.peek_kind(1) == TokenKind::Colon {
                self.advance();
                self.advance();
            }
            args.push(self.parse_expr());
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightParen);
        args
    }

    fn parse_primary_expr(&mut self) -> Expr {
        let span = self.current_span();
        match self.current() {
            TokenKind::IntLiteral => {
                self.advance();
                Expr::IntLit(span)
            }
            TokenKind::True | TokenKind::False => {
                let value = self.at(TokenKind::True);
                self.advance();
                Expr::BoolLit(value, span)
            }
            TokenKind::StringLiteral => {
                let segments = self.parse_interpolations();
                self.advance();
                Expr::StringLit { segments, span }
            }
            TokenKind::Identifier => {
                let name = self.expect_ident();
                Expr::Name { name, span }
            }
            TokenKind::SelfValue => {
                self.advance();
                Expr::SelfRef(span)
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expr();
                self.expect(TokenKind::RightParen);
                inner
            }
            _ => {
                self.expected("expression");
                Expr::Error(span)
            }
        }
    }

    /// Lexes and parses each `\(...)` of the current string literal token.
    fn parse_interpolations(&mut self) -> Vec<Expr> {
        let span = self.current_span();
        let ranges = lexer::interpolation_ranges(self.current_text(), span.start as usize);
        let mut segments = Vec::with_capacity(ranges.len());
        for (start, end) in ranges {
            let tokens = lexer::lex_range(self.source, start, end, self.file, self.sink);
            let mut inner = Parser::new(tokens, self.source, self.file, self.interner, self.sink);
            segments.push(inner.parse_expr());
            if !inner.at_eof() {
                inner.error("unexpected tokens in string interpolation");
            }
        }
        segments
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::lexer;
    use crate::parser::Parser;
    use deptrack_common::Interner;
    use deptrack_diagnostics::DiagnosticSink;
    use deptrack_source::FileId;

    fn parse_expr(source: &str, interner: &Interner) -> (Expr, usize) {
        let sink = DiagnosticSink::new();
        let tokens = lexer::lex(source, FileId::from_raw(0), &sink);
        let mut parser = Parser::new(tokens, source, FileId::from_raw(0), interner, &sink);
        let expr = parser.parse_expr();
        (expr, sink.error_count())
    }

    fn op_of<'a>(expr: &Expr, interner: &'a Interner) -> &'a str {
        match expr {
            Expr::Binary { op, .. } => interner.resolve(*op),
            other => panic!("expected binary, got {other:?}"),
        }
    }

    #[test]
    fn precedence() {
        let interner = Interner::new();
        let (expr, errors) = parse_expr("a + b * c == d", &interner);
        assert_eq!(errors, 0);
        assert_eq!(op_of(&expr, &interner), "==");
        if let Expr::Binary { lhs, .. } = &expr {
            assert_eq!(op_of(lhs, &interner), "+");
            if let Expr::Binary { rhs, .. } = lhs.as_ref() {
                assert_eq!(op_of(rhs, &interner), "*");
            }
        }
    }

    #[test]
    fn custom_operator_is_left_associative() {
        let interner = Interner::new();
        let (expr, _) = parse_expr("a +++ b +++ c", &interner);
        match expr {
            Expr::Binary { lhs, rhs, .. } => {
                assert!(matches!(*lhs, Expr::Binary { .. }));
                assert!(matches!(*rhs, Expr::Name { .. }));
            }
            other => panic!("expected binary, got {other:?}"),
        }
    }

    #[test]
    fn postfix_chain() {
        let interner = Interner::new();
        let (expr, _) = parse_expr("self.items.first(x).count", &interner);
        match expr {
            Expr::Member { base, name, .. } => {
                assert_eq!(interner.resolve(name), "count");
                assert!(matches!(*base, Expr::Call { .. }));
            }
            other => panic!("expected member, got {other:?}"),
        }
    }

    #[test]
    fn nested_interpolation() {
        let interner = Interner::new();
        let source = "\"a\\(f(\"\\(x)\"))b\"";
        let (expr, errors) = parse_expr(source, &interner);
        assert_eq!(errors, 0);
        let Expr::StringLit { segments, .. } = expr else {
            panic!("expected string literal");
        };
        let Expr::Call { args, .. } = &segments[0] else {
            panic!("expected call in interpolation");
        };
        let Expr::StringLit { segments: inner, .. } = &args[0] else {
            panic!("expected nested string");
        };
        match &inner[0] {
            Expr::Name { name, span } => {
                assert_eq!(interner.resolve(*name), "x");
                assert_eq!(&source[span.start as usize..span.end as usize], "x");
            }
            other => panic!("expected name, got {other:?}"),
        }
    }

    #[test]
    fn missing_operand_is_an_error() {
        let interner = Interner::new();
        let (expr, errors) = parse_expr("a + )", &interner);
        assert_eq!(errors, 1);
        match expr {
            Expr::Binary { rhs, .. } => assert!(matches!(*rhs, Expr::Error(_))),
            other => panic!("expected binary, got {other:?}"),
        }
    }
}
