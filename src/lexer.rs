//! Lexer: turns a source string into an ordered token stream, single pass.

use crate::token::{Token, TokenWithSpan};
use log::trace;

pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.current();
        if let Some(ch) = c {
            self.pos += 1;
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> Token {
        let mut digits = String::new();
        while let Some(c) = self.current() {
            if c.is_ascii_digit() {
                digits.push(c);
                self.advance();
            } else {
                break;
            }
        }
        Token::NumberLit(digits.parse().unwrap_or(0))
    }

    fn decode_escape(c: char) -> char {
        match c {
            'n' => '\n',
            other => other,
        }
    }

    fn read_string(&mut self) -> Token {
        self.advance(); // opening quote
        let mut s = String::new();
        loop {
            match self.current() {
                None | Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    if let Some(escaped) = self.current() {
                        s.push(Self::decode_escape(escaped));
                        self.advance();
                    }
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
            }
        }
        Token::StringLit(s)
    }

    fn read_char(&mut self) -> Token {
        self.advance(); // opening quote
        let value = match self.current() {
            Some('\\') => {
                self.advance();
                let escaped = self.current().unwrap_or('\0');
                self.advance();
                Self::decode_escape(escaped)
            }
            Some(c) => {
                self.advance();
                c
            }
            None => '\0',
        };
        if self.current() == Some('\'') {
            self.advance();
        }
        Token::CharLit(value as u8)
    }

    fn read_ident(&mut self) -> String {
        let mut ident = String::new();
        while let Some(c) = self.current() {
            if c.is_alphanumeric() || c == '_' {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }
        ident
    }

    pub fn next_token(&mut self) -> TokenWithSpan {
        self.skip_whitespace();

        let line = self.line;
        let column = self.column;

        let token = match self.current() {
            None => Token::Eof,
            Some(c) => match c {
                '0'..='9' => self.read_number(),

                'a'..='z' | 'A'..='Z' | '_' => {
                    let ident = self.read_ident();
                    Token::is_keyword(&ident).unwrap_or(Token::Ident(ident))
                }

                '"' => self.read_string(),
                '\'' => self.read_char(),

                '(' => { self.advance(); Token::LParen }
                ')' => { self.advance(); Token::RParen }
                '{' => { self.advance(); Token::LBrace }
                '}' => { self.advance(); Token::RBrace }
                ',' => { self.advance(); Token::Comma }
                ';' => { self.advance(); Token::Semicolon }
                '=' => { self.advance(); Token::Equal }
                '<' => { self.advance(); Token::LAngle }
                '>' => { self.advance(); Token::RAngle }
                '*' => { self.advance(); Token::Star }
                '&' => { self.advance(); Token::Ampersand }

                '+' => {
                    self.advance();
                    if self.current() == Some('+') {
                        self.advance();
                        Token::PlusPlus
                    } else {
                        Token::Plus
                    }
                }

                '/' => {
                    self.advance();
                    if self.current() == Some('/') {
                        while let Some(c) = self.current() {
                            if c == '\n' {
                                break;
                            }
                            self.advance();
                        }
                        return self.next_token();
                    }
                    Token::Slash
                }

                other => {
                    trace!("lexer: skipping unrecognized character {other:?} at {line}:{column}");
                    self.advance();
                    return self.next_token();
                }
            },
        };

        TokenWithSpan::new(token, line, column)
    }

    pub fn tokenize(&mut self) -> Vec<TokenWithSpan> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = tok.token == Token::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        Lexer::new(src).tokenize().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            kinds("void int char return while"),
            vec![Token::Void, Token::Int, Token::Char, Token::Return, Token::While, Token::Eof]
        );
    }

    #[test]
    fn test_identifiers_and_numbers() {
        assert_eq!(
            kinds("foo 42"),
            vec![Token::Ident("foo".into()), Token::NumberLit(42), Token::Eof]
        );
    }

    #[test]
    fn test_string_literal_with_newline_escape() {
        assert_eq!(
            kinds("\"hi\\n\""),
            vec![Token::StringLit("hi\n".into()), Token::Eof]
        );
    }

    #[test]
    fn test_string_literal_other_escape_is_literal() {
        // \X for any X other than \n decodes to the literal character X.
        assert_eq!(
            kinds(r#""a\qb""#),
            vec![Token::StringLit("aqb".into()), Token::Eof]
        );
    }

    #[test]
    fn test_char_literal() {
        assert_eq!(kinds("'a'"), vec![Token::CharLit(b'a'), Token::Eof]);
    }

    #[test]
    fn test_plus_plus_vs_plus() {
        assert_eq!(kinds("++ +"), vec![Token::PlusPlus, Token::Plus, Token::Eof]);
    }

    #[test]
    fn test_line_comment_is_skipped() {
        assert_eq!(kinds("int x; // a trailing comment\nreturn;"),
            vec![Token::Int, Token::Ident("x".into()), Token::Semicolon, Token::Return, Token::Semicolon, Token::Eof]);
    }

    #[test]
    fn test_slash_not_comment() {
        assert_eq!(kinds("a / b"), vec![Token::Ident("a".into()), Token::Slash, Token::Ident("b".into()), Token::Eof]);
    }

    #[test]
    fn test_unknown_character_is_skipped_silently() {
        assert_eq!(kinds("a # b"), vec![Token::Ident("a".into()), Token::Ident("b".into()), Token::Eof]);
    }

    #[test]
    fn test_punctuation() {
        assert_eq!(
            kinds("(){},;=&<>*"),
            vec![
                Token::LParen, Token::RParen, Token::LBrace, Token::RBrace,
                Token::Comma, Token::Semicolon, Token::Equal, Token::Ampersand,
                Token::LAngle, Token::RAngle, Token::Star, Token::Eof
            ]
        );
    }

    #[test]
    fn test_whitespace_does_not_affect_token_sequence() {
        assert_eq!(kinds("int   x ;"), kinds("int x;"));
    }
}
