//! Integration tests for variable declaration, reassignment and scoping.

use std::collections::BTreeMap;

use stencil_typeck::{analyze, Analysis, AnalysisConfig, Diagnostic, DiagnosticKind};

// ── Helpers ────────────────────────────────────────────────────────────

fn analyze_one(src: &str) -> Analysis {
    let parse = stencil_syntax::parse(src);
    assert!(parse.ok(), "parse errors: {:?}", parse.errors);
    let mut files = BTreeMap::new();
    files.insert("t.tmpl".to_string(), parse.file);
    analyze(&files, &AnalysisConfig::default())
}

fn diagnostics(src: &str) -> Vec<Diagnostic> {
    analyze_one(src).diagnostics().cloned().collect()
}

const COUNT_INPUT: &str = "{{/* go:code\ntype Input struct { Count int } */}}";

// ── Reassignment ───────────────────────────────────────────────────────

/// Handing an unknown value to a scalar slot is accepted silently.
#[test]
fn test_any_into_scalar_slots() {
    for src in [
        r#"{{$x := ""}}{{$x = .Anything}}{{$x}}"#,
        "{{$x := 0}}{{$x = .Anything}}{{$x}}",
        "{{$x := false}}{{$x = .Anything}}{{$x}}",
    ] {
        assert!(diagnostics(src).is_empty(), "unexpected diagnostics for {}", src);
    }
}

/// A variable seeded from an unknown field can take a default.
#[test]
fn test_default_after_unknown() {
    assert!(diagnostics(r#"{{$x := .Unknown}}{{$x = "default"}}{{$x}}"#).is_empty());
}

/// Assigning a concrete value of another kind is a mismatch.
#[test]
fn test_scalar_conflict() {
    let src = format!("{}{}", COUNT_INPUT, r#"{{$str := ""}}{{$str = .Count}}"#);
    let d = diagnostics(&src);
    assert_eq!(d.len(), 1);
    assert_eq!(d[0].kind, DiagnosticKind::TypeMismatch);
    assert_eq!(d[0].message, "cannot assign int to $str (type string)");
}

/// Literal reassignment of the same kind is fine.
#[test]
fn test_same_kind_reassignment() {
    let src = format!("{}{}", COUNT_INPUT, "{{$n := 0}}{{$n = .Count}}{{$n = 5}}");
    assert!(diagnostics(&src).is_empty());
}

/// The slot keeps its scalar type after taking an unknown value.
#[test]
fn test_scalar_slot_keeps_type() {
    let d = diagnostics(r#"{{$x := ""}}{{$x = .Anything}}{{$x = 1}}"#);
    assert_eq!(d.len(), 1);
    assert_eq!(d[0].kind, DiagnosticKind::TypeMismatch);
    assert_eq!(d[0].message, "cannot assign int to $x (type string)");
}

/// Reassigning an alias whose record grows later is reported once.
#[test]
fn test_growing_alias_conflict_reported_once() {
    let d = diagnostics("{{.User.Name}}{{$u := .User}}{{$u = 5}}{{.User.Email}}");
    assert_eq!(d.len(), 1);
    assert_eq!(d[0].message, "cannot assign int to $u (type struct)");
}

/// Reassigning an alias detaches it from the context.
#[test]
fn test_reassigned_alias_detaches() {
    let a = analyze_one(r#"{{$u := .User}}{{$u = "guest"}}{{$u.Name}}"#);
    let d: Vec<_> = a.diagnostics().collect();
    assert_eq!(d.len(), 1);
    assert_eq!(d[0].message, "can't evaluate field Name in type string");
    insta::assert_snapshot!(a.template("t.tmpl").unwrap().ty.to_string(), @"struct{User any}");
}

// ── Scoping ────────────────────────────────────────────────────────────

/// Reassignment inside a branch reaches the outer declaration.
#[test]
fn test_reassign_in_branch() {
    assert!(diagnostics("{{$x := 1}}{{if .Ok}}{{$x = 2}}{{end}}{{$x}}").is_empty());
}

/// Declarations inside a branch do not leak out.
#[test]
fn test_branch_declarations_do_not_leak() {
    let d = diagnostics("{{if .Ok}}{{$y := 1}}{{$y}}{{end}}{{$y}}");
    assert_eq!(d.len(), 1);
    assert_eq!(d[0].kind, DiagnosticKind::UndefinedVariable);
    assert_eq!(d[0].message, "undefined variable: $y");
}

/// A variable declared in an `if` pipeline is visible in both branches.
#[test]
fn test_if_pipeline_declaration() {
    assert!(diagnostics("{{if $v := .Value}}{{$v}}{{else}}{{$v}}{{end}}").is_empty());
}

/// Shadowing in a child scope leaves the outer binding alone.
#[test]
fn test_shadowing() {
    let src = format!(
        "{}{}",
        COUNT_INPUT, r#"{{$x := ""}}{{with .Count}}{{$x := .}}{{$x = 3}}{{end}}{{$x = "s"}}"#
    );
    assert!(diagnostics(&src).is_empty());
}

/// Assigning to a variable that was never declared.
#[test]
fn test_assign_undeclared() {
    let d = diagnostics("{{$z = 1}}");
    assert_eq!(d.len(), 1);
    assert_eq!(d[0].kind, DiagnosticKind::UndefinedVariable);
}
