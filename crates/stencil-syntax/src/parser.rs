//! Recursive descent parser from tokens to [`SourceFile`].
//!
//! Errors never stop the parse: a malformed action is skipped up to its
//! closing delimiter and the surrounding body keeps parsing, so analysis can
//! still run on the rest of the file.

use stencil_common::Span;

use crate::ast::{Branch, Command, Expr, Node, Pipeline, SourceFile, Variable};
use crate::error::ParseError;
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

/// Why `parse_body` stopped.
enum Stop {
    /// `{{end}}`, with the span of the whole action.
    End(Span),
    /// `{{else`, with the parser positioned right after the keyword.
    Else(Span),
    Eof(Span),
}

pub(crate) struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
}

impl<'src> Parser<'src> {
    pub(crate) fn new(source: &'src str) -> Self {
        Self {
            source,
            tokens: Lexer::tokenize(source),
            pos: 0,
            errors: Vec::new(),
        }
    }

    pub(crate) fn parse_file(mut self) -> (SourceFile, Vec<ParseError>) {
        let mut nodes = Vec::new();
        loop {
            let (mut body, stop) = self.parse_body();
            nodes.append(&mut body);
            match stop {
                Stop::Eof(_) => break,
                Stop::End(span) => self.error("unexpected {{end}}", span),
                Stop::Else(span) => {
                    self.error("unexpected {{else}}", span);
                    self.skip_action();
                }
            }
        }
        (SourceFile { nodes }, self.errors)
    }

    // ── Token helpers ───────────────────────────────────────────────────

    fn peek(&self) -> Token {
        self.nth(0)
    }

    fn nth(&self, n: usize) -> Token {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        self.tokens[idx]
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn bump(&mut self) -> Token {
        let tok = self.peek();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    fn text(&self, tok: Token) -> &'src str {
        &self.source[tok.span.to_range()]
    }

    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.errors.push(ParseError::new(message, span));
    }

    /// Skip to and past the next `}}`. Returns the span of the last token consumed.
    fn skip_action(&mut self) -> Span {
        let mut last = self.peek().span;
        while !self.at(TokenKind::Eof) {
            let tok = self.bump();
            last = tok.span;
            if tok.kind == TokenKind::RightDelim {
                break;
            }
        }
        last
    }

    fn expect_right_delim(&mut self) -> Span {
        let tok = self.peek();
        match tok.kind {
            TokenKind::RightDelim => self.bump().span,
            TokenKind::Eof => {
                self.error("unclosed action", tok.span);
                tok.span
            }
            _ => {
                let text = self.text(tok).to_string();
                self.error(format!("unexpected `{}` in action", text), tok.span);
                self.skip_action()
            }
        }
    }

    // ── Bodies ──────────────────────────────────────────────────────────

    fn parse_body(&mut self) -> (Vec<Node>, Stop) {
        let mut nodes = Vec::new();
        loop {
            let tok = self.peek();
            match tok.kind {
                TokenKind::Eof => return (nodes, Stop::Eof(tok.span)),
                TokenKind::Text => {
                    self.bump();
                    nodes.push(Node::Text(tok.span));
                }
                TokenKind::Comment => {
                    self.bump();
                    let text = comment_text(self.text(tok)).to_string();
                    nodes.push(Node::Comment {
                        text,
                        span: tok.span,
                    });
                }
                TokenKind::LeftDelim => match self.nth(1).kind {
                    TokenKind::End => {
                        self.bump();
                        self.bump();
                        let close = self.expect_right_delim();
                        return (nodes, Stop::End(tok.span.merge(close)));
                    }
                    TokenKind::Else => {
                        self.bump();
                        let else_tok = self.bump();
                        return (nodes, Stop::Else(tok.span.merge(else_tok.span)));
                    }
                    _ => nodes.push(self.parse_action()),
                },
                _ => {
                    self.bump();
                    self.error("unterminated comment", tok.span);
                }
            }
        }
    }

    /// Parse a body that must be closed by `{{end}}`; stray `{{else}}`s are
    /// reported and skipped.
    fn parse_body_until_end(&mut self, what: &str, open: Span) -> (Vec<Node>, Span) {
        let mut nodes = Vec::new();
        loop {
            let (mut body, stop) = self.parse_body();
            nodes.append(&mut body);
            match stop {
                Stop::End(span) => return (nodes, span),
                Stop::Else(span) => {
                    self.error(format!("unexpected {{{{else}}}} in {{{{{}}}}}", what), span);
                    self.skip_action();
                }
                Stop::Eof(span) => {
                    self.errors.push(ParseError::with_related(
                        format!("unclosed {{{{{}}}}}: missing {{{{end}}}}", what),
                        span,
                        format!("`{}` opened here", what),
                        open,
                    ));
                    return (nodes, span);
                }
            }
        }
    }

    // ── Actions ─────────────────────────────────────────────────────────

    /// Parse one `{{ ... }}` action starting at its left delimiter.
    fn parse_action(&mut self) -> Node {
        let open = self.bump().span;
        let keyword = self.peek();
        match keyword.kind {
            TokenKind::If | TokenKind::With | TokenKind::Range => {
                self.bump();
                self.parse_branch(keyword.kind, open)
            }
            TokenKind::Define => {
                self.bump();
                let (name, name_span) = self.expect_template_name();
                self.expect_right_delim();
                let (body, end) = self.parse_body_until_end("define", open);
                Node::Define {
                    name,
                    name_span,
                    body,
                    span: open.merge(end),
                }
            }
            TokenKind::Block => {
                self.bump();
                let (name, name_span) = self.expect_template_name();
                let pipeline = self.parse_pipeline(false);
                self.expect_right_delim();
                let (body, end) = self.parse_body_until_end("block", open);
                Node::Block {
                    name,
                    name_span,
                    pipeline,
                    body,
                    span: open.merge(end),
                }
            }
            TokenKind::Template => {
                self.bump();
                let (name, name_span) = self.expect_template_name();
                let pipeline = if self.at(TokenKind::RightDelim) {
                    None
                } else {
                    Some(self.parse_pipeline(false))
                };
                let close = self.expect_right_delim();
                Node::Template {
                    name,
                    name_span,
                    pipeline,
                    span: open.merge(close),
                }
            }
            TokenKind::Break | TokenKind::Continue => {
                self.bump();
                let close = self.expect_right_delim();
                let span = open.merge(close);
                if keyword.kind == TokenKind::Break {
                    Node::Break(span)
                } else {
                    Node::Continue(span)
                }
            }
            _ => {
                let pipeline = self.parse_pipeline(true);
                let close = self.expect_right_delim();
                Node::Action {
                    pipeline,
                    span: open.merge(close),
                }
            }
        }
    }

    fn parse_branch(&mut self, kind: TokenKind, open: Span) -> Node {
        let what = match kind {
            TokenKind::If => "if",
            TokenKind::With => "with",
            _ => "range",
        };
        let pipeline = self.parse_pipeline(true);
        self.expect_right_delim();
        let (body, stop) = self.parse_body();
        let (else_body, end) = match stop {
            Stop::End(span) => (None, span),
            Stop::Else(else_span) => {
                let chained = (kind == TokenKind::If && self.at(TokenKind::If))
                    || (kind == TokenKind::With && self.at(TokenKind::With));
                if chained {
                    self.bump();
                    let nested = self.parse_branch(kind, else_span);
                    let end = nested.span();
                    (Some(vec![nested]), end)
                } else {
                    self.expect_right_delim();
                    let (else_nodes, end) = self.parse_body_until_end(what, open);
                    (Some(else_nodes), end)
                }
            }
            Stop::Eof(span) => {
                self.errors.push(ParseError::with_related(
                    format!("unclosed {{{{{}}}}}: missing {{{{end}}}}", what),
                    span,
                    format!("`{}` opened here", what),
                    open,
                ));
                (None, span)
            }
        };
        let branch = Branch {
            pipeline,
            body,
            else_body,
            span: open.merge(end),
        };
        match kind {
            TokenKind::If => Node::If(branch),
            TokenKind::With => Node::With(branch),
            _ => Node::Range(branch),
        }
    }

    fn expect_template_name(&mut self) -> (String, Span) {
        let tok = self.peek();
        match tok.kind {
            TokenKind::StringLiteral => {
                self.bump();
                (unquote(self.text(tok)), tok.span)
            }
            TokenKind::RawStringLiteral => {
                self.bump();
                (raw_unquote(self.text(tok)).to_string(), tok.span)
            }
            _ => {
                self.error("expected quoted template name", tok.span);
                (String::new(), tok.span)
            }
        }
    }

    // ── Pipelines ───────────────────────────────────────────────────────

    fn parse_pipeline(&mut self, allow_decl: bool) -> Pipeline {
        let start = self.peek().span;
        let mut decl = Vec::new();
        let mut is_assign = false;

        if allow_decl && self.at_declaration() {
            loop {
                let tok = self.bump();
                decl.push(Variable {
                    name: self.text(tok).to_string(),
                    span: tok.span,
                });
                if self.at(TokenKind::Comma) {
                    self.bump();
                    continue;
                }
                break;
            }
            is_assign = self.bump().kind == TokenKind::Assign;
        }

        let mut commands = Vec::new();
        loop {
            if let Some(cmd) = self.parse_command() {
                commands.push(cmd);
            }
            if self.at(TokenKind::Pipe) {
                self.bump();
                continue;
            }
            break;
        }

        let end = commands
            .last()
            .map(|c| c.span)
            .or_else(|| decl.last().map(|v| v.span))
            .unwrap_or(start);
        if commands.is_empty() {
            self.error("missing value for command", start);
        }
        Pipeline {
            decl,
            is_assign,
            commands,
            span: start.merge(end),
        }
    }

    /// `$x :=`, `$x =`, or `$i, $e :=` ahead.
    fn at_declaration(&self) -> bool {
        if self.nth(0).kind != TokenKind::Variable {
            return false;
        }
        match self.nth(1).kind {
            TokenKind::Declare | TokenKind::Assign => true,
            TokenKind::Comma => {
                self.nth(2).kind == TokenKind::Variable
                    && matches!(self.nth(3).kind, TokenKind::Declare | TokenKind::Assign)
            }
            _ => false,
        }
    }

    fn parse_command(&mut self) -> Option<Command> {
        let mut args = Vec::new();
        while !matches!(
            self.peek().kind,
            TokenKind::Pipe | TokenKind::RightDelim | TokenKind::RParen | TokenKind::Eof
        ) {
            match self.parse_operand() {
                Some(expr) => args.push(expr),
                None => break,
            }
        }
        let first = args.first()?.span();
        let last = args.last().map(Expr::span).unwrap_or(first);
        Some(Command {
            args,
            span: first.merge(last),
        })
    }

    /// A term followed by any directly attached `.Field` chain.
    fn parse_operand(&mut self) -> Option<Expr> {
        let mut expr = self.parse_term()?;
        loop {
            let tok = self.peek();
            if tok.kind != TokenKind::Field || tok.span.start != expr.span().end {
                break;
            }
            self.bump();
            let span = expr.span().merge(tok.span);
            expr = Expr::Field {
                base: Box::new(expr),
                name: self.text(tok)[1..].to_string(),
                name_span: tok.span,
                span,
            };
        }
        Some(expr)
    }

    fn parse_term(&mut self) -> Option<Expr> {
        let tok = self.peek();
        let span = tok.span;
        let expr = match tok.kind {
            TokenKind::Dot => Expr::Dot(span),
            TokenKind::Field => Expr::Field {
                base: Box::new(Expr::Dot(Span::new(span.start, span.start))),
                name: self.text(tok)[1..].to_string(),
                name_span: span,
                span,
            },
            TokenKind::Variable => Expr::Variable(Variable {
                name: self.text(tok).to_string(),
                span,
            }),
            TokenKind::Ident => Expr::Ident {
                name: self.text(tok).to_string(),
                span,
            },
            TokenKind::StringLiteral => Expr::Str {
                value: unquote(self.text(tok)),
                span,
            },
            TokenKind::RawStringLiteral => Expr::Str {
                value: raw_unquote(self.text(tok)).to_string(),
                span,
            },
            TokenKind::CharLiteral => {
                let value = unquote(self.text(tok)).chars().next().map_or(0, |c| c as i64);
                Expr::Int { value, span }
            }
            TokenKind::IntLiteral => match parse_int(self.text(tok)) {
                Some(value) => Expr::Int { value, span },
                None => {
                    let text = self.text(tok).to_string();
                    self.error(format!("invalid number `{}`", text), span);
                    Expr::Int { value: 0, span }
                }
            },
            TokenKind::FloatLiteral => {
                let text = self.text(tok).replace('_', "");
                match text.parse::<f64>() {
                    Ok(value) => Expr::Float { value, span },
                    Err(_) => {
                        self.error(format!("invalid number `{}`", text), span);
                        Expr::Float { value: 0.0, span }
                    }
                }
            }
            TokenKind::True | TokenKind::False => Expr::Bool {
                value: tok.kind == TokenKind::True,
                span,
            },
            TokenKind::Nil => Expr::Nil(span),
            TokenKind::LParen => {
                self.bump();
                let pipeline = self.parse_pipeline(false);
                let close = self.peek();
                if close.kind == TokenKind::RParen {
                    self.bump();
                } else {
                    self.error("unclosed left paren", span);
                }
                return Some(Expr::Paren {
                    pipeline: Box::new(pipeline),
                    span: span.merge(close.span),
                });
            }
            _ => {
                let text = self.text(tok).to_string();
                self.error(format!("unexpected `{}` in command", text), span);
                if !matches!(tok.kind, TokenKind::RightDelim | TokenKind::Eof) {
                    self.bump();
                }
                return None;
            }
        };
        self.bump();
        Some(expr)
    }
}

/// The content of a `{{/* ... */}}` comment, between the markers.
fn comment_text(action: &str) -> &str {
    let start = action.find("/*").map_or(0, |i| i + 2);
    let end = action.rfind("*/").unwrap_or(action.len()).max(start);
    &action[start..end]
}

fn raw_unquote(text: &str) -> &str {
    text.trim_start_matches('`').trim_end_matches('`')
}

/// Strip quotes from a `"..."` or `'.'` literal and resolve escapes.
fn unquote(text: &str) -> String {
    let inner = if text.len() >= 2 {
        &text[1..text.len() - 1]
    } else {
        text
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                if let Some(ch) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    out.push(ch);
                }
            }
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                if let Some(ch) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    out.push(ch);
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn parse_int(text: &str) -> Option<i64> {
    let cleaned = text.replace('_', "");
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest.to_string()),
        None => (false, cleaned.trim_start_matches('+').to_string()),
    };
    let value = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unquote_handles_escapes() {
        assert_eq!(unquote(r#""a\"b\n""#), "a\"b\n");
        assert_eq!(unquote(r"'\x41'"), "A");
    }

    #[test]
    fn parse_int_variants() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("-1_000"), Some(-1000));
        assert_eq!(parse_int("0xff"), Some(255));
        assert_eq!(parse_int("99999999999999999999"), None);
    }

    #[test]
    fn comment_text_strips_markers() {
        assert_eq!(comment_text("{{/* hi */}}"), " hi ");
        assert_eq!(comment_text("{{- /* x */ -}}"), " x ");
    }
}
