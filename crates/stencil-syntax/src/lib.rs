//! Stencil syntax: lexer, parser and syntax tree for Go-style text templates.
//!
//! The parser is error-tolerant: it always produces a [`SourceFile`] and
//! reports problems as [`ParseError`]s next to it, so the type checker can
//! analyse whatever parsed.
//!
//! - [`lexer`]: text/action tokenizer
//! - [`ast`]: the syntax tree consumed by the type checker
//! - [`annotation`]: `go:code` type declaration comments

pub mod annotation;
pub mod ast;
pub mod error;
pub mod lexer;
mod parser;
pub mod token;

pub use ast::SourceFile;
pub use error::ParseError;

/// Result of parsing one template source.
#[derive(Debug, Clone)]
pub struct Parse {
    pub file: SourceFile,
    pub errors: Vec<ParseError>,
}

impl Parse {
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parse template source text.
pub fn parse(source: &str) -> Parse {
    let (file, errors) = parser::Parser::new(source).parse_file();
    Parse { file, errors }
}
