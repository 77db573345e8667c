//! Diagnostics produced by analysis.
//!
//! Problems are values: every error site records a `Diagnostic` in the
//! [`DiagnosticSink`], substitutes `Any` for whatever failed, and keeps going.

use std::fmt;

use rustc_hash::FxHashSet;
use serde::Serialize;
use serde_json::json;
use stencil_common::{LineIndex, Span};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticKind {
    /// Two concrete types meet where one type is required.
    TypeMismatch,
    /// `{{template "x"}}` names a template nobody defines.
    UnknownTemplate,
    /// A template name is defined more than once.
    DuplicateDefinition,
    /// A construct the analysis cannot type.
    UnsupportedConstruct,
    /// A variable is used or reassigned before any declaration.
    UndefinedVariable,
}

impl DiagnosticKind {
    /// Stable code shown in rendered reports.
    pub fn code(self) -> &'static str {
        match self {
            DiagnosticKind::TypeMismatch => "T0001",
            DiagnosticKind::UnknownTemplate => "T0002",
            DiagnosticKind::DuplicateDefinition => "T0003",
            DiagnosticKind::UndefinedVariable => "T0004",
            DiagnosticKind::UnsupportedConstruct => "W0001",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            DiagnosticKind::UnsupportedConstruct => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DiagnosticKind::TypeMismatch => "type mismatch",
            DiagnosticKind::UnknownTemplate => "unknown template",
            DiagnosticKind::DuplicateDefinition => "duplicate definition",
            DiagnosticKind::UnsupportedConstruct => "unsupported construct",
            DiagnosticKind::UndefinedVariable => "undefined variable",
        };
        f.write_str(text)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub file: String,
    pub span: Span,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, file: &str, span: Span, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            message: message.into(),
            file: file.to_string(),
            span,
            severity: kind.severity(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// One JSON object describing the diagnostic, with 1-based line/column
    /// positions resolved through `index`.
    pub fn to_json(&self, index: &LineIndex) -> serde_json::Value {
        json!({
            "file": self.file,
            "code": self.kind.code(),
            "kind": self.kind,
            "severity": self.severity,
            "message": self.message,
            "start": index.position(self.span.start),
            "end": index.position(self.span.end),
        })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Collects diagnostics across passes, dropping repeats.
///
/// The fixpoint driver re-tracks every template each pass, so the same
/// problem is met again and again. A diagnostic is kept only the first time
/// its (file, kind, span, message) is seen; order of first sighting is kept.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    seen: FxHashSet<Diagnostic>,
    items: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic. Returns `false` if it was already recorded.
    pub fn push(&mut self, diagnostic: Diagnostic) -> bool {
        if self.seen.contains(&diagnostic) {
            return false;
        }
        self.seen.insert(diagnostic.clone());
        self.items.push(diagnostic);
        true
    }

    /// Record several diagnostics, returning how many were new.
    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) -> usize {
        diagnostics.into_iter().filter(|d| self.push(d.clone())).count()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn for_file<'s>(&'s self, file: &'s str) -> impl Iterator<Item = &'s Diagnostic> + 's {
        self.items.iter().filter(move |d| d.file == file)
    }
}
