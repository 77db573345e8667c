//! Template lexer.
//!
//! Source text alternates between literal text and `{{ ... }}` actions. The
//! lexer tracks which side of a delimiter it is on and produces `Text` tokens
//! outside actions and the action vocabulary inside them.

mod cursor;

use cursor::Cursor;

use crate::token::{keyword_from_str, Token, TokenKind};

/// Converts template source into a stream of tokens, ending with `Eof`.
pub struct Lexer<'src> {
    cursor: Cursor<'src>,
    in_action: bool,
    emitted_eof: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            cursor: Cursor::new(source),
            in_action: false,
            emitted_eof: false,
        }
    }

    /// Tokenize the entire source. The result always ends with `Eof`.
    pub fn tokenize(source: &str) -> Vec<Token> {
        Lexer::new(source).collect()
    }

    fn next_token(&mut self) -> Token {
        if self.in_action {
            self.lex_action()
        } else {
            self.lex_text()
        }
    }

    // ── Text mode ────────────────────────────────────────────────────────

    fn lex_text(&mut self) -> Token {
        let start = self.cursor.pos();
        if self.cursor.is_eof() {
            return Token::new(TokenKind::Eof, start, start);
        }
        if self.cursor.starts_with("{{") {
            return self.lex_left_delim(start);
        }
        self.cursor.skip_to("{{");
        Token::new(TokenKind::Text, start, self.cursor.pos())
    }

    /// `{{`, `{{- `, or a full `{{/* ... */}}` comment.
    fn lex_left_delim(&mut self, start: u32) -> Token {
        self.cursor.advance_bytes(2);
        if self.cursor.starts_with("- ")
            || self.cursor.starts_with("-\t")
            || self.cursor.starts_with("-\n")
        {
            self.cursor.advance_bytes(2);
        }
        if self.cursor.starts_with("/*") {
            return self.lex_comment(start);
        }
        self.in_action = true;
        Token::new(TokenKind::LeftDelim, start, self.cursor.pos())
    }

    fn lex_comment(&mut self, start: u32) -> Token {
        if !self.cursor.skip_to("*/") {
            return Token::new(TokenKind::Error, start, self.cursor.pos());
        }
        self.cursor.advance_bytes(2);
        if self.cursor.starts_with(" -}}") {
            self.cursor.advance_bytes(4);
        } else if self.cursor.starts_with("}}") {
            self.cursor.advance_bytes(2);
        } else {
            // Comment not immediately closed: treat the rest of the action as
            // part of the bad comment.
            self.cursor.skip_to("}}");
            self.cursor.advance_bytes(2);
            return Token::new(TokenKind::Error, start, self.cursor.pos());
        }
        Token::new(TokenKind::Comment, start, self.cursor.pos())
    }

    // ── Action mode ──────────────────────────────────────────────────────

    fn lex_action(&mut self) -> Token {
        let before_ws = self.cursor.pos();
        self.cursor.eat_while(char::is_whitespace);
        let had_space = self.cursor.pos() > before_ws;
        let start = self.cursor.pos();

        if had_space && self.cursor.starts_with("-}}") {
            self.cursor.advance_bytes(3);
            self.in_action = false;
            return Token::new(TokenKind::RightDelim, start, self.cursor.pos());
        }
        if self.cursor.starts_with("}}") {
            self.cursor.advance_bytes(2);
            self.in_action = false;
            return Token::new(TokenKind::RightDelim, start, self.cursor.pos());
        }

        let Some(c) = self.cursor.peek() else {
            // Unclosed action: the parser reports it when it hits Eof.
            self.in_action = false;
            return Token::new(TokenKind::Eof, start, start);
        };

        match c {
            '(' => self.single_char_token(TokenKind::LParen, start),
            ')' => self.single_char_token(TokenKind::RParen, start),
            ',' => self.single_char_token(TokenKind::Comma, start),
            '|' => self.single_char_token(TokenKind::Pipe, start),
            '=' => self.single_char_token(TokenKind::Assign, start),
            ':' => {
                self.cursor.advance();
                if self.cursor.peek() == Some('=') {
                    self.cursor.advance();
                    Token::new(TokenKind::Declare, start, self.cursor.pos())
                } else {
                    Token::new(TokenKind::Error, start, self.cursor.pos())
                }
            }
            '"' => self.lex_quoted(start, '"', TokenKind::StringLiteral),
            '\'' => self.lex_quoted(start, '\'', TokenKind::CharLiteral),
            '`' => self.lex_raw_string(start),
            '$' => {
                self.cursor.advance();
                self.cursor.eat_while(is_ident_continue);
                Token::new(TokenKind::Variable, start, self.cursor.pos())
            }
            '.' => self.lex_dot(start),
            '0'..='9' => self.lex_number(start),
            '+' | '-' if self.cursor.peek_next().is_some_and(|n| n.is_ascii_digit()) => {
                self.lex_number(start)
            }
            c if is_ident_start(c) => self.lex_ident(start),
            _ => self.single_char_token(TokenKind::Error, start),
        }
    }

    fn single_char_token(&mut self, kind: TokenKind, start: u32) -> Token {
        self.cursor.advance();
        Token::new(kind, start, self.cursor.pos())
    }

    /// `.` -> `Dot`, `.Name` -> `Field`, `.5` -> `FloatLiteral`.
    fn lex_dot(&mut self, start: u32) -> Token {
        match self.cursor.peek_next() {
            Some(n) if n.is_ascii_digit() => self.lex_number(start),
            Some(n) if is_ident_start(n) => {
                self.cursor.advance();
                self.cursor.eat_while(is_ident_continue);
                Token::new(TokenKind::Field, start, self.cursor.pos())
            }
            _ => self.single_char_token(TokenKind::Dot, start),
        }
    }

    fn lex_ident(&mut self, start: u32) -> Token {
        self.cursor.eat_while(is_ident_continue);
        let text = self.cursor.slice(start, self.cursor.pos());
        let kind = keyword_from_str(text).unwrap_or(TokenKind::Ident);
        Token::new(kind, start, self.cursor.pos())
    }

    fn lex_number(&mut self, start: u32) -> Token {
        if matches!(self.cursor.peek(), Some('+' | '-')) {
            self.cursor.advance();
        }
        if self.cursor.starts_with("0x") || self.cursor.starts_with("0X") {
            self.cursor.advance_bytes(2);
            self.cursor.eat_while(|c| c.is_ascii_hexdigit() || c == '_');
            return Token::new(TokenKind::IntLiteral, start, self.cursor.pos());
        }
        let mut is_float = false;
        self.cursor.eat_while(|c| c.is_ascii_digit() || c == '_');
        if self.cursor.peek() == Some('.')
            && self.cursor.peek_next().is_some_and(|c| c.is_ascii_digit())
        {
            is_float = true;
            self.cursor.advance();
            self.cursor.eat_while(|c| c.is_ascii_digit() || c == '_');
        }
        if matches!(self.cursor.peek(), Some('e' | 'E')) {
            is_float = true;
            self.cursor.advance();
            if matches!(self.cursor.peek(), Some('+' | '-')) {
                self.cursor.advance();
            }
            self.cursor.eat_while(|c| c.is_ascii_digit());
        }
        let kind = if is_float {
            TokenKind::FloatLiteral
        } else {
            TokenKind::IntLiteral
        };
        Token::new(kind, start, self.cursor.pos())
    }

    /// A `"..."` string or `'c'` char constant with backslash escapes.
    fn lex_quoted(&mut self, start: u32, quote: char, kind: TokenKind) -> Token {
        self.cursor.advance();
        loop {
            match self.cursor.advance() {
                Some('\\') => {
                    self.cursor.advance();
                }
                Some(c) if c == quote => {
                    return Token::new(kind, start, self.cursor.pos());
                }
                Some('\n') | None => {
                    return Token::new(TokenKind::Error, start, self.cursor.pos());
                }
                Some(_) => {}
            }
        }
    }

    fn lex_raw_string(&mut self, start: u32) -> Token {
        self.cursor.advance();
        if !self.cursor.skip_to("`") {
            return Token::new(TokenKind::Error, start, self.cursor.pos());
        }
        self.cursor.advance();
        Token::new(TokenKind::RawStringLiteral, start, self.cursor.pos())
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.emitted_eof {
            return None;
        }
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            self.emitted_eof = true;
        }
        Some(token)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::tokenize(src).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn text_and_field_action() {
        use TokenKind::*;
        assert_eq!(
            kinds("Hi {{.Name}}!"),
            vec![Text, LeftDelim, Field, RightDelim, Text, Eof]
        );
    }

    #[test]
    fn field_chain_is_adjacent_fields() {
        let tokens = Lexer::tokenize("{{.User.Name}}");
        assert_eq!(tokens[1].kind, TokenKind::Field);
        assert_eq!(tokens[2].kind, TokenKind::Field);
        assert_eq!(tokens[1].span.end, tokens[2].span.start);
    }

    #[test]
    fn declarations_and_literals() {
        use TokenKind::*;
        assert_eq!(
            kinds(r#"{{$x := "a\"b"}}{{$x = 1.5}}{{'c'}}{{`raw`}}"#),
            vec![
                LeftDelim, Variable, Declare, StringLiteral, RightDelim,
                LeftDelim, Variable, Assign, FloatLiteral, RightDelim,
                LeftDelim, CharLiteral, RightDelim,
                LeftDelim, RawStringLiteral, RightDelim,
                Eof,
            ]
        );
    }

    #[test]
    fn keywords_dot_and_pipe() {
        use TokenKind::*;
        assert_eq!(
            kinds("{{if eq . -1 | not}}{{end}}"),
            vec![
                LeftDelim, If, Ident, Dot, IntLiteral, Pipe, Ident, RightDelim,
                LeftDelim, End, RightDelim,
                Eof,
            ]
        );
    }

    #[test]
    fn trim_markers() {
        use TokenKind::*;
        assert_eq!(
            kinds("a {{- .X -}} b"),
            vec![Text, LeftDelim, Field, RightDelim, Text, Eof]
        );
    }

    #[test]
    fn comment_is_one_token() {
        use TokenKind::*;
        assert_eq!(
            kinds("{{/* go:code\ntype Input struct{} */}}{{- /* x */ -}}"),
            vec![Comment, Comment, Eof]
        );
    }

    #[test]
    fn unclosed_action_ends_at_eof() {
        assert_eq!(kinds("{{.A"), vec![TokenKind::LeftDelim, TokenKind::Field, TokenKind::Eof]);
    }
}
