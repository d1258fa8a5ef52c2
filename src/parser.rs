//! Recursive-descent parser: token stream -> AST.
//!
//! Mismatches are reported and the parser synchronizes past them rather than
//! aborting: a single bad token must not discard the rest of the program.

use crate::ast::{BaseType, BinOp, Expr, Program, Stmt, TypeDesc, MAX_CALL_ARGS};
use crate::error::CompileError;
use crate::token::{Token, TokenWithSpan};

pub struct Parser {
    tokens: Vec<TokenWithSpan>,
    pos: usize,
    errors: Vec<CompileError>,
}

impl Parser {
    pub fn new(tokens: Vec<TokenWithSpan>) -> Self {
        Parser { tokens, pos: 0, errors: Vec::new() }
    }

    pub fn errors(&self) -> &[CompileError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn error(&mut self, err: CompileError) {
        self.errors.push(err);
    }

    fn current(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|t| &t.token)
            .unwrap_or(&Token::Eof)
    }

    fn at(&self, tok: &Token) -> bool {
        self.current() == tok
    }

    fn advance(&mut self) -> Token {
        let t = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    /// Consumes `tok` if it is current. Otherwise records a diagnostic and
    /// skips the unexpected token (if any remains) so parsing can resume,
    /// matching `Parser_ExpectTok`'s report-and-continue behavior.
    fn expect(&mut self, tok: Token) {
        if self.at(&tok) {
            self.advance();
        } else {
            self.error(CompileError::ParseExpected {
                expected: format!("{tok:?}"),
                got: format!("{:?}", self.current()),
            });
            if !self.at(&Token::Eof) {
                self.advance();
            }
        }
    }

    pub fn parse(&mut self) -> Program {
        let mut stmts = Vec::new();
        while !self.at(&Token::Eof) {
            let before = self.pos;
            stmts.push(self.parse_stmt());
            if self.pos == before {
                self.advance();
            }
        }
        stmts
    }

    fn parse_type(&mut self) -> Option<TypeDesc> {
        let base = match self.current() {
            Token::Void => BaseType::Void,
            Token::Int => BaseType::Int,
            Token::Char => BaseType::Char,
            _ => return None,
        };
        self.advance();
        let mut pointer_depth = 0;
        while self.at(&Token::Star) {
            self.advance();
            pointer_depth += 1;
        }
        Some(TypeDesc { base, pointer_depth })
    }

    fn parse_stmt_list(&mut self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        while !self.at(&Token::RBrace) && !self.at(&Token::Eof) {
            let before = self.pos;
            stmts.push(self.parse_stmt());
            if self.pos == before {
                self.advance();
            }
        }
        stmts
    }

    fn parse_stmt(&mut self) -> Stmt {
        if let Token::Return = self.current() {
            self.advance();
            let value = if self.at(&Token::Semicolon) {
                None
            } else {
                Some(self.parse_expr())
            };
            self.expect(Token::Semicolon);
            return Stmt::Return(value);
        }

        if let Token::While = self.current() {
            self.advance();
            self.expect(Token::LParen);
            let cond = self.parse_expr();
            self.expect(Token::RParen);
            self.expect(Token::LBrace);
            let body = self.parse_stmt_list();
            self.expect(Token::RBrace);
            return Stmt::While { cond, body };
        }

        if self.current().is_type_start() {
            let ty = self.parse_type().expect("is_type_start guarantees parse_type succeeds");
            let name = self.expect_ident();

            if self.at(&Token::LParen) {
                return self.parse_func_stmt(name, ty);
            }
            return self.parse_vardecl(name, ty);
        }

        let expr = self.parse_expr();
        self.expect(Token::Semicolon);
        Stmt::Expr(expr)
    }

    fn expect_ident(&mut self) -> String {
        match self.current().clone() {
            Token::Ident(n) => {
                self.advance();
                n
            }
            got => {
                self.error(CompileError::ParseExpected { expected: "identifier".into(), got: format!("{got:?}") });
                String::new()
            }
        }
    }

    fn parse_func_stmt(&mut self, name: String, return_type: TypeDesc) -> Stmt {
        self.expect(Token::LParen);
        let mut params = Vec::new();
        let mut too_many_reported = false;
        if !self.at(&Token::RParen) {
            loop {
                let pty = self.parse_type().unwrap_or_else(|| {
                    self.error(CompileError::ParseExpected {
                        expected: "a type".into(),
                        got: format!("{:?}", self.current()),
                    });
                    TypeDesc::not_a_type()
                });
                let pname = self.expect_ident();

                if params.len() >= MAX_CALL_ARGS {
                    if !too_many_reported {
                        self.error(CompileError::TooManyParams { max: MAX_CALL_ARGS });
                        too_many_reported = true;
                    }
                } else {
                    params.push((pname, pty));
                }

                if self.at(&Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(Token::RParen);
        self.expect(Token::LBrace);
        let body = self.parse_stmt_list();
        self.expect(Token::RBrace);

        Stmt::Func { name, return_type, params, body }
    }

    fn parse_vardecl(&mut self, name: String, ty: TypeDesc) -> Stmt {
        let init = if self.at(&Token::Equal) {
            self.advance();
            Some(self.parse_expr())
        } else {
            None
        };
        self.expect(Token::Semicolon);
        Stmt::VarDecl { name, ty, init }
    }

    /// A single optional binary operator, no precedence chaining beyond one level.
    fn parse_expr(&mut self) -> Expr {
        let left = self.parse_primary();

        let op = match self.current() {
            Token::Plus => Some(BinOp::Add),
            Token::LAngle => Some(BinOp::LessThan),
            _ => None,
        };

        if let Some(op) = op {
            self.advance();
            let right = self.parse_primary();
            Expr::BinaryOp(op, Box::new(left), Box::new(right))
        } else {
            left
        }
    }

    /// An optional call-via-paren or assign-via-equal applied to a secondary.
    fn parse_primary(&mut self) -> Expr {
        let secondary = self.parse_secondary();

        if self.at(&Token::LParen) {
            self.advance();
            let mut args = Vec::new();
            let mut too_many_reported = false;
            if !self.at(&Token::RParen) {
                loop {
                    let arg = self.parse_expr();
                    if args.len() >= MAX_CALL_ARGS {
                        if !too_many_reported {
                            self.error(CompileError::TooManyArguments { max: MAX_CALL_ARGS });
                            too_many_reported = true;
                        }
                    } else {
                        args.push(arg);
                    }
                    if self.at(&Token::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
            self.expect(Token::RParen);
            return Expr::Call(Box::new(secondary), args);
        }

        if self.at(&Token::Equal) {
            self.advance();
            let value = self.parse_expr();
            return Expr::Assign(Box::new(secondary), Box::new(value));
        }

        secondary
    }

    fn parse_secondary(&mut self) -> Expr {
        match self.current().clone() {
            Token::NumberLit(n) => {
                self.advance();
                Expr::NumberLit(n)
            }
            Token::CharLit(c) => {
                self.advance();
                Expr::CharLit(c)
            }
            Token::StringLit(s) => {
                self.advance();
                Expr::StringLit(s)
            }
            Token::Ident(name) => {
                self.advance();
                Expr::Ident(name)
            }
            Token::LParen => {
                self.advance();
                let expr = self.parse_expr();
                self.expect(Token::RParen);
                expr
            }
            Token::Ampersand => {
                self.advance();
                let inner = self.parse_secondary();
                Expr::AddressOf(Box::new(inner))
            }
            Token::PlusPlus => {
                self.advance();
                let inner = self.parse_secondary();
                Expr::Inc(Box::new(inner))
            }
            Token::Star => {
                self.advance();
                let inner = self.parse_secondary();
                Expr::Deref(Box::new(inner))
            }
            other => {
                self.error(CompileError::ParseExpectedExpr);
                if !matches!(other, Token::Eof) {
                    self.advance();
                }
                // A placeholder keeps the tree well-formed so the caller can
                // keep parsing past the bad token instead of aborting.
                Expr::NumberLit(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> (Program, Vec<CompileError>) {
        let tokens = Lexer::new(src).tokenize();
        let mut parser = Parser::new(tokens);
        let program = parser.parse();
        (program, parser.errors().to_vec())
    }

    #[test]
    fn test_empty_void_main() {
        let (prog, errs) = parse("void main() { return; }");
        assert!(errs.is_empty());
        assert_eq!(prog.len(), 1);
        match &prog[0] {
            Stmt::Func { name, params, body, .. } => {
                assert_eq!(name, "main");
                assert!(params.is_empty());
                assert_eq!(body.len(), 1);
            }
            _ => panic!("expected function"),
        }
    }

    #[test]
    fn test_vardecl_with_init() {
        let (prog, errs) = parse("void main() { int x = 41; }");
        assert!(errs.is_empty());
        match &prog[0] {
            Stmt::Func { body, .. } => match &body[0] {
                Stmt::VarDecl { name, init, .. } => {
                    assert_eq!(name, "x");
                    assert_eq!(init, &Some(Expr::NumberLit(41)));
                }
                _ => panic!("expected vardecl"),
            },
            _ => panic!("expected function"),
        }
    }

    #[test]
    fn test_pointer_type() {
        let (prog, errs) = parse("int *main(int *x) { return; }");
        assert!(errs.is_empty());
        match &prog[0] {
            Stmt::Func { return_type, params, .. } => {
                assert_eq!(return_type.pointer_depth, 1);
                assert_eq!(params[0].1.pointer_depth, 1);
            }
            _ => panic!("expected function"),
        }
    }

    #[test]
    fn test_call_with_args() {
        let (prog, errs) = parse("void main() { puts(\"hi\"); }");
        assert!(errs.is_empty());
        match &prog[0] {
            Stmt::Func { body, .. } => match &body[0] {
                Stmt::Expr(Expr::Call(callee, args)) => {
                    assert_eq!(**callee, Expr::Ident("puts".into()));
                    assert_eq!(args.len(), 1);
                }
                _ => panic!("expected call"),
            },
            _ => panic!("expected function"),
        }
    }

    #[test]
    fn test_while_with_less_than() {
        let (prog, errs) = parse("void main() { while (i < 3) { ++i; } }");
        assert!(errs.is_empty());
        match &prog[0] {
            Stmt::Func { body, .. } => match &body[0] {
                Stmt::While { cond, body } => {
                    assert!(matches!(cond, Expr::BinaryOp(BinOp::LessThan, _, _)));
                    assert_eq!(body.len(), 1);
                }
                _ => panic!("expected while"),
            },
            _ => panic!("expected function"),
        }
    }

    #[test]
    fn test_assign() {
        let (prog, errs) = parse("void main() { int x = 0; x = 1; }");
        assert!(errs.is_empty());
        match &prog[0] {
            Stmt::Func { body, .. } => match &body[1] {
                Stmt::Expr(Expr::Assign(target, value)) => {
                    assert_eq!(**target, Expr::Ident("x".into()));
                    assert_eq!(**value, Expr::NumberLit(1));
                }
                _ => panic!("expected assign"),
            },
            _ => panic!("expected function"),
        }
    }

    #[test]
    fn test_too_many_arguments_reported_but_parsing_continues() {
        let (prog, errs) = parse("void main() { f(1,2,3,4,5,6,7); g(); }");
        assert!(errs.contains(&CompileError::TooManyArguments { max: MAX_CALL_ARGS }));
        match &prog[0] {
            Stmt::Func { body, .. } => assert_eq!(body.len(), 2),
            _ => panic!("expected function"),
        }
    }

    #[test]
    fn test_no_operator_precedence_chaining_reports_and_continues() {
        // Only one binary operator is consumed; the stray second `+` is
        // reported as an unexpected token where `;` was expected, but parsing
        // resynchronizes and still reaches the following statement.
        let (prog, errs) = parse("void main() { return 1 + 2 + 3; }");
        assert!(errs.iter().any(|e| matches!(e, CompileError::ParseExpected { .. })));
        match &prog[0] {
            Stmt::Func { body, .. } => assert_eq!(body.len(), 2),
            _ => panic!("expected function"),
        }
    }

    #[test]
    fn test_missing_expr_after_return_yields_bare_return() {
        let (prog, errs) = parse("void main() { return ; }");
        assert!(errs.is_empty());
        match &prog[0] {
            Stmt::Func { body, .. } => assert_eq!(body[0], Stmt::Return(None)),
            _ => panic!("expected function"),
        }
    }

    #[test]
    fn test_unrecognized_expression_token_reports_and_recovers() {
        // `)` can't start an expression; the parser records the error, skips
        // it, and keeps parsing instead of discarding the rest of the source.
        let (prog, errs) = parse("void main() { int x = ); return; }");
        assert!(errs.contains(&CompileError::ParseExpectedExpr));
        match &prog[0] {
            Stmt::Func { body, .. } => assert_eq!(body.len(), 2),
            _ => panic!("expected function"),
        }
    }
}
