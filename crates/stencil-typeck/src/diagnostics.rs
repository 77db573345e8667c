//! Ariadne-based rendering for diagnostics.
//!
//! Output is colorless by default for stable test snapshots. Each report
//! carries the diagnostic's code, its message, a label at the offending span
//! and a hint when one applies.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use stencil_syntax::ParseError;

use crate::error::{Diagnostic, DiagnosticKind, Severity};

/// Code for syntax errors, which come from the parser rather than analysis.
pub const PARSE_ERROR_CODE: &str = "P0001";

#[derive(Clone, Copy, Debug, Default)]
pub struct RenderOptions {
    pub color: bool,
}

// ── Span Helpers ───────────────────────────────────────────────────────

/// Clamp a range into `source` and make it at least one byte wide where
/// possible: ariadne cannot label an empty span.
fn clamp(range: Range<usize>, source_len: usize) -> Range<usize> {
    let start = range.start.min(source_len);
    let end = range.end.min(source_len).max(start);
    if start == end {
        start..(end + 1).min(source_len)
    } else {
        start..end
    }
}

fn label_text(kind: DiagnosticKind) -> &'static str {
    match kind {
        DiagnosticKind::TypeMismatch => "type conflict here",
        DiagnosticKind::UnknownTemplate => "invoked here",
        DiagnosticKind::DuplicateDefinition => "defined again here",
        DiagnosticKind::UnsupportedConstruct => "not typed",
        DiagnosticKind::UndefinedVariable => "not declared",
    }
}

fn help_text(kind: DiagnosticKind) -> Option<&'static str> {
    match kind {
        DiagnosticKind::UnknownTemplate => {
            Some("define it with {{define \"name\"}}...{{end}} in one of the analysed files")
        }
        DiagnosticKind::DuplicateDefinition => Some("template names must be unique across files"),
        DiagnosticKind::UndefinedVariable => Some("declare it first with {{$name := ...}}"),
        _ => None,
    }
}

// ── Rendering ──────────────────────────────────────────────────────────

/// Render a diagnostic against its file's source, without color.
pub fn render_diagnostic(diagnostic: &Diagnostic, source: &str) -> String {
    render_diagnostic_with(diagnostic, source, RenderOptions::default())
}

pub fn render_diagnostic_with(
    diagnostic: &Diagnostic,
    source: &str,
    options: RenderOptions,
) -> String {
    let span = clamp(diagnostic.span.to_range(), source.len());
    let (kind, color) = match diagnostic.severity {
        Severity::Error => (ReportKind::Error, Color::Red),
        Severity::Warning => (ReportKind::Warning, Color::Yellow),
    };
    let mut builder = Report::build(kind, span.clone())
        .with_code(diagnostic.kind.code())
        .with_message(&diagnostic.message)
        .with_config(Config::default().with_color(options.color))
        .with_label(
            Label::new(span)
                .with_message(label_text(diagnostic.kind))
                .with_color(color),
        );
    if let Some(help) = help_text(diagnostic.kind) {
        builder.set_help(help);
    }
    write_report(builder.finish(), source)
}

/// Render a syntax error.
pub fn render_parse_error(error: &ParseError, source: &str, options: RenderOptions) -> String {
    let span = clamp(error.span.to_range(), source.len());
    let mut builder = Report::build(ReportKind::Error, span.clone())
        .with_code(PARSE_ERROR_CODE)
        .with_message(&error.message)
        .with_config(Config::default().with_color(options.color))
        .with_label(
            Label::new(span)
                .with_message(&error.message)
                .with_color(Color::Red),
        );
    if let Some((message, related)) = &error.related {
        builder.add_label(
            Label::new(clamp(related.to_range(), source.len()))
                .with_message(message)
                .with_color(Color::Blue),
        );
    }
    write_report(builder.finish(), source)
}

fn write_report(report: Report<'_, Range<usize>>, source: &str) -> String {
    let mut buf = Vec::new();
    report
        .write(Source::from(source), &mut buf)
        .expect("writing to a Vec cannot fail");
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_common::Span;

    #[test]
    fn mismatch_report_has_code_and_message() {
        let source = "{{if eq .Count \"x\"}}{{end}}";
        let d = Diagnostic::new(
            DiagnosticKind::TypeMismatch,
            "page.tmpl",
            Span::new(5, 19),
            "incompatible types for comparison: int and string",
        );
        let out = render_diagnostic(&d, source);
        assert!(out.contains("T0001"), "{}", out);
        assert!(out.contains("incompatible types for comparison: int and string"));
        assert!(out.contains("type conflict here"));
        assert!(!out.contains('\u{1b}'), "colorless output expected");
    }

    #[test]
    fn warnings_and_help() {
        let source = "{{template \"nope\"}}";
        let d = Diagnostic::new(
            DiagnosticKind::UnknownTemplate,
            "page.tmpl",
            Span::new(0, 19),
            "no such template: nope",
        );
        let out = render_diagnostic(&d, source);
        assert!(out.contains("T0002"));
        assert!(out.contains("define it with"));

        let w = Diagnostic::new(
            DiagnosticKind::UnsupportedConstruct,
            "page.tmpl",
            Span::new(2, 9),
            "can't give argument to non-function",
        );
        let out = render_diagnostic(&w, source);
        assert!(out.contains("Warning"));
        assert!(out.contains("W0001"));
    }

    #[test]
    fn empty_spans_are_widened() {
        assert_eq!(clamp(3..3, 10), 3..4);
        assert_eq!(clamp(10..10, 10), 10..10);
        assert_eq!(clamp(4..40, 10), 4..10);
    }

    #[test]
    fn parse_error_report() {
        let source = "{{if .X}}open";
        let parse = stencil_syntax::parse(source);
        let out = render_parse_error(&parse.errors[0], source, RenderOptions::default());
        assert!(out.contains(PARSE_ERROR_CODE));
        assert!(out.contains("unclosed"));
    }
}
