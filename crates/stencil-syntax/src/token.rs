use stencil_common::Span;

/// A token produced by the template lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, start: u32, end: u32) -> Self {
        Self {
            kind,
            span: Span::new(start, end),
        }
    }
}

/// Every kind of token in the template language.
///
/// Outside of actions the lexer only produces `Text`; inside `{{ ... }}` it
/// produces the action vocabulary. A whole `{{/* ... */}}` comment is a single
/// `Comment` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Text,
    Comment,
    /// `{{` or `{{- `.
    LeftDelim,
    /// `}}` or ` -}}`.
    RightDelim,

    // ── Keywords ───────────────────────────────────────────────────────
    Block,
    Break,
    Continue,
    Define,
    Else,
    End,
    If,
    Range,
    Template,
    With,
    True,
    False,
    Nil,

    // ── Operands ───────────────────────────────────────────────────────
    /// A function name such as `eq` or `printf`.
    Ident,
    /// `.Name`, one segment of a field chain.
    Field,
    /// A bare `.`.
    Dot,
    /// `$` or `$name`.
    Variable,
    StringLiteral,
    RawStringLiteral,
    CharLiteral,
    IntLiteral,
    FloatLiteral,

    // ── Punctuation ────────────────────────────────────────────────────
    /// `:=`
    Declare,
    /// `=`
    Assign,
    Pipe,
    LParen,
    RParen,
    Comma,

    Error,
    Eof,
}

/// Map an identifier to its keyword kind, if it is one.
pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
    Some(match s {
        "block" => TokenKind::Block,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "define" => TokenKind::Define,
        "else" => TokenKind::Else,
        "end" => TokenKind::End,
        "if" => TokenKind::If,
        "range" => TokenKind::Range,
        "template" => TokenKind::Template,
        "with" => TokenKind::With,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "nil" => TokenKind::Nil,
        _ => return None,
    })
}
