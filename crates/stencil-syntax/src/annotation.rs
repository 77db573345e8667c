//! Type declarations embedded in template comments.
//!
//! A template can describe the shape of its context with a comment of the form
//!
//! ```text
//! {{/* go:code
//! type Input struct {
//!     Name  string
//!     Items []struct{ Title string }
//! }
//! */}}
//! ```
//!
//! This module parses the Go-like declaration language into [`TypeDecl`]s. It
//! only builds syntax; turning declarations into analysis types is the type
//! checker's job.

use stencil_common::Span;

use crate::error::ParseError;

/// Marker that opens a declaration comment.
pub const DECLARATION_MARKER: &str = "go:code";

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// `string`, `Input`, or a qualified `time.Time` (kept whole).
    Name(String),
    Slice(Box<TypeExpr>),
    Map(Box<TypeExpr>, Box<TypeExpr>),
    Pointer(Box<TypeExpr>),
    Struct(Vec<FieldDecl>),
    /// `interface{...}` or `any`.
    Interface,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
}

/// If `comment` is a declaration comment, return the text after the marker and
/// its byte offset within `comment`.
pub fn declaration_body(comment: &str) -> Option<(&str, usize)> {
    let trimmed = comment.trim_start();
    let rest = trimmed.strip_prefix(DECLARATION_MARKER)?;
    let offset = comment.len() - rest.len();
    Some((rest, offset))
}

/// Parse the declarations in the body of a `go:code` comment.
///
/// Spans are relative to `text`.
pub fn parse_declarations(text: &str) -> Result<Vec<TypeDecl>, ParseError> {
    let tokens = tokenize(text)?;
    let mut parser = DeclParser {
        text,
        tokens,
        pos: 0,
    };
    parser.parse_file()
}

// ── Tokens ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tok {
    Ident,
    Number,
    Str,
    Punct(char),
    Newline,
    Eof,
}

#[derive(Debug, Clone, Copy)]
struct DeclToken {
    tok: Tok,
    span: Span,
}

fn tokenize(text: &str) -> Result<Vec<DeclToken>, ParseError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0usize;
    let push = |tokens: &mut Vec<DeclToken>, tok, start: usize, end: usize| {
        tokens.push(DeclToken {
            tok,
            span: Span::new(start as u32, end as u32),
        })
    };
    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        match c {
            b'\n' => {
                i += 1;
                push(&mut tokens, Tok::Newline, start, i);
            }
            b' ' | b'\t' | b'\r' => i += 1,
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'`' | b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != c {
                    i += 1;
                }
                if i >= bytes.len() {
                    return Err(ParseError::new(
                        "unterminated string in declaration",
                        Span::new(start as u32, i as u32),
                    ));
                }
                i += 1;
                push(&mut tokens, Tok::Str, start, i);
            }
            b'0'..=b'9' => {
                while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
                    i += 1;
                }
                push(&mut tokens, Tok::Number, start, i);
            }
            b'[' | b']' | b'{' | b'}' | b'(' | b')' | b'*' | b'.' | b',' | b';' | b'=' => {
                i += 1;
                push(&mut tokens, Tok::Punct(c as char), start, i);
            }
            _ if c == b'_' || c.is_ascii_alphabetic() || c >= 0x80 => {
                while i < bytes.len()
                    && (bytes[i] == b'_' || bytes[i].is_ascii_alphanumeric() || bytes[i] >= 0x80)
                {
                    i += 1;
                }
                push(&mut tokens, Tok::Ident, start, i);
            }
            _ => {
                return Err(ParseError::new(
                    format!("unexpected character `{}` in declaration", c as char),
                    Span::new(start as u32, start as u32 + 1),
                ));
            }
        }
    }
    push(&mut tokens, Tok::Eof, text.len(), text.len());
    Ok(tokens)
}

// ── Parser ─────────────────────────────────────────────────────────────

struct DeclParser<'a> {
    text: &'a str,
    tokens: Vec<DeclToken>,
    pos: usize,
}

impl<'a> DeclParser<'a> {
    fn peek(&self) -> DeclToken {
        self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> DeclToken {
        let tok = self.peek();
        if tok.tok != Tok::Eof {
            self.pos += 1;
        }
        tok
    }

    fn text(&self, tok: DeclToken) -> &'a str {
        &self.text[tok.span.to_range()]
    }

    fn at_punct(&self, c: char) -> bool {
        self.peek().tok == Tok::Punct(c)
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek().tok, Tok::Newline | Tok::Punct(';')) {
            self.bump();
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let tok = self.peek();
        let found = match tok.tok {
            Tok::Eof => "end of declaration".to_string(),
            Tok::Newline => "newline".to_string(),
            _ => format!("`{}`", self.text(tok)),
        };
        ParseError::new(format!("expected {}, found {}", expected, found), tok.span)
    }

    fn expect_punct(&mut self, c: char) -> Result<(), ParseError> {
        if self.at_punct(c) {
            self.bump();
            Ok(())
        } else {
            Err(self.unexpected(&format!("`{}`", c)))
        }
    }

    fn expect_ident(&mut self) -> Result<DeclToken, ParseError> {
        if self.peek().tok == Tok::Ident {
            Ok(self.bump())
        } else {
            Err(self.unexpected("identifier"))
        }
    }

    fn parse_file(&mut self) -> Result<Vec<TypeDecl>, ParseError> {
        let mut decls = Vec::new();
        loop {
            self.skip_separators();
            let tok = self.peek();
            match tok.tok {
                Tok::Eof => return Ok(decls),
                Tok::Ident if self.text(tok) == "type" => {
                    self.bump();
                    if self.at_punct('(') {
                        self.bump();
                        loop {
                            self.skip_separators();
                            if self.at_punct(')') {
                                self.bump();
                                break;
                            }
                            decls.push(self.parse_type_spec()?);
                        }
                    } else {
                        decls.push(self.parse_type_spec()?);
                    }
                }
                Tok::Ident if matches!(self.text(tok), "package" | "import") => {
                    while !matches!(self.peek().tok, Tok::Newline | Tok::Eof) {
                        self.bump();
                    }
                }
                _ => return Err(self.unexpected("`type`")),
            }
        }
    }

    fn parse_type_spec(&mut self) -> Result<TypeDecl, ParseError> {
        let name = self.expect_ident()?;
        // `type A = B` aliases are treated like definitions.
        if self.at_punct('=') {
            self.bump();
        }
        let ty = self.parse_type()?;
        let end = self.tokens[self.pos.saturating_sub(1)].span;
        Ok(TypeDecl {
            name: self.text(name).to_string(),
            ty,
            span: name.span.merge(end),
        })
    }

    fn parse_type(&mut self) -> Result<TypeExpr, ParseError> {
        let tok = self.peek();
        match tok.tok {
            Tok::Punct('*') => {
                self.bump();
                Ok(TypeExpr::Pointer(Box::new(self.parse_type()?)))
            }
            Tok::Punct('[') => {
                self.bump();
                // Arrays are sequences too; the length is irrelevant.
                if self.peek().tok == Tok::Number {
                    self.bump();
                }
                self.expect_punct(']')?;
                Ok(TypeExpr::Slice(Box::new(self.parse_type()?)))
            }
            Tok::Punct('(') => {
                self.bump();
                let inner = self.parse_type()?;
                self.expect_punct(')')?;
                Ok(inner)
            }
            Tok::Ident => match self.text(tok) {
                "map" => {
                    self.bump();
                    self.expect_punct('[')?;
                    let key = self.parse_type()?;
                    self.expect_punct(']')?;
                    let value = self.parse_type()?;
                    Ok(TypeExpr::Map(Box::new(key), Box::new(value)))
                }
                "struct" => {
                    self.bump();
                    self.parse_struct_body()
                }
                "interface" => {
                    self.bump();
                    self.skip_braced()?;
                    Ok(TypeExpr::Interface)
                }
                "any" => {
                    self.bump();
                    Ok(TypeExpr::Interface)
                }
                _ => {
                    self.bump();
                    let mut name = self.text(tok).to_string();
                    if self.at_punct('.') {
                        self.bump();
                        let member = self.expect_ident()?;
                        name.push('.');
                        name.push_str(self.text(member));
                    }
                    Ok(TypeExpr::Name(name))
                }
            },
            _ => Err(self.unexpected("type")),
        }
    }

    fn parse_struct_body(&mut self) -> Result<TypeExpr, ParseError> {
        self.expect_punct('{')?;
        let mut fields = Vec::new();
        loop {
            self.skip_separators();
            if self.at_punct('}') {
                self.bump();
                return Ok(TypeExpr::Struct(fields));
            }
            if self.at_punct('*') {
                // Embedded pointer: `*Base`.
                self.bump();
                let name = self.expect_ident()?;
                let name = self.text(name).to_string();
                fields.push(FieldDecl {
                    ty: TypeExpr::Name(name.clone()),
                    name,
                });
                self.skip_tag();
                continue;
            }
            let first = self.expect_ident()?;
            let mut names = vec![self.text(first).to_string()];
            while self.at_punct(',') {
                self.bump();
                let next = self.expect_ident()?;
                names.push(self.text(next).to_string());
            }
            let embedded = names.len() == 1
                && matches!(self.peek().tok, Tok::Newline | Tok::Punct(';') | Tok::Punct('}') | Tok::Str);
            if embedded {
                let name = names.remove(0);
                fields.push(FieldDecl {
                    ty: TypeExpr::Name(name.clone()),
                    name,
                });
            } else {
                let ty = self.parse_type()?;
                for name in names {
                    fields.push(FieldDecl {
                        name,
                        ty: ty.clone(),
                    });
                }
            }
            self.skip_tag();
        }
    }

    fn skip_tag(&mut self) {
        if self.peek().tok == Tok::Str {
            self.bump();
        }
    }

    fn skip_braced(&mut self) -> Result<(), ParseError> {
        self.expect_punct('{')?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.bump().tok {
                Tok::Punct('{') => depth += 1,
                Tok::Punct('}') => depth -= 1,
                Tok::Eof => return Err(self.unexpected("`}`")),
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> TypeExpr {
        TypeExpr::Name(n.to_string())
    }

    #[test]
    fn marker_detection() {
        let (body, offset) = declaration_body(" go:code\ntype A int").unwrap();
        assert_eq!(body, "\ntype A int");
        assert_eq!(offset, 8);
        assert!(declaration_body(" just a note ").is_none());
    }

    #[test]
    fn struct_with_nested_and_containers() {
        let decls = parse_declarations(
            "type Input struct {\n  Name string `json:\"name\"`\n  A, B int\n  Tags []string\n  Meta map[string]any\n  User struct { Email string }\n}",
        )
        .unwrap();
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].name, "Input");
        let TypeExpr::Struct(fields) = &decls[0].ty else {
            panic!("expected struct, got {:?}", decls[0].ty);
        };
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Name", "A", "B", "Tags", "Meta", "User"]);
        assert_eq!(fields[0].ty, name("string"));
        assert_eq!(fields[3].ty, TypeExpr::Slice(Box::new(name("string"))));
        assert_eq!(
            fields[4].ty,
            TypeExpr::Map(Box::new(name("string")), Box::new(TypeExpr::Interface))
        );
    }

    #[test]
    fn grouped_declarations_and_qualified_names() {
        let decls =
            parse_declarations("type (\n  A struct{ When time.Time; Next *A }\n  B []A\n)").unwrap();
        assert_eq!(decls.len(), 2);
        let TypeExpr::Struct(fields) = &decls[0].ty else {
            panic!("expected struct");
        };
        assert_eq!(fields[0].ty, name("time.Time"));
        assert_eq!(fields[1].ty, TypeExpr::Pointer(Box::new(name("A"))));
        assert_eq!(decls[1].ty, TypeExpr::Slice(Box::new(name("A"))));
    }

    #[test]
    fn embedded_field() {
        let decls = parse_declarations("type A struct {\n Base\n X int\n}").unwrap();
        let TypeExpr::Struct(fields) = &decls[0].ty else {
            panic!("expected struct");
        };
        assert_eq!(fields[0], FieldDecl { name: "Base".into(), ty: name("Base") });
    }

    #[test]
    fn errors_carry_spans() {
        let err = parse_declarations("type Input struct {\n Name \n").unwrap_err();
        assert!(err.message.contains("expected"), "{}", err.message);
        let err = parse_declarations("func main() {}").unwrap_err();
        assert_eq!(err.span, Span::new(0, 4));
    }
}
