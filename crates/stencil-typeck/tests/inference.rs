//! Integration tests for context type inference within single templates.
//!
//! Each test parses template source, runs the whole analysis, and checks the
//! rendered context type of a template plus any diagnostics.

use std::collections::BTreeMap;

use stencil_typeck::{analyze, Analysis, AnalysisConfig, DiagnosticKind};

// ── Helpers ────────────────────────────────────────────────────────────

/// Analyse a single file named `t.tmpl`.
fn analyze_one(src: &str) -> Analysis {
    analyze_files(&[("t.tmpl", src)])
}

fn analyze_files(sources: &[(&str, &str)]) -> Analysis {
    let files: BTreeMap<_, _> = sources
        .iter()
        .map(|(name, src)| {
            let parse = stencil_syntax::parse(src);
            assert!(parse.ok(), "parse errors in {}: {:?}", name, parse.errors);
            (name.to_string(), parse.file)
        })
        .collect();
    analyze(&files, &AnalysisConfig::default())
}

fn ty_of(analysis: &Analysis, template: &str) -> String {
    analysis
        .template(template)
        .unwrap_or_else(|| panic!("no template {}", template))
        .ty
        .to_string()
}

fn kinds(analysis: &Analysis) -> Vec<DiagnosticKind> {
    analysis.diagnostics().map(|d| d.kind).collect()
}

// ── Field Access ───────────────────────────────────────────────────────

/// A single field access yields an open struct with that field.
#[test]
fn test_single_field() {
    let a = analyze_one("{{.Name}}");
    insta::assert_snapshot!(ty_of(&a, "t.tmpl"), @"struct{Name any}");
    assert!(a.template("t.tmpl").unwrap().ty.is_open());
    assert!(a.converged);
}

/// Several fields are collected regardless of access order.
#[test]
fn test_multiple_fields() {
    let a = analyze_one("{{.Name}} {{.Age}} {{.Email}}");
    let b = analyze_one("{{.Email}} {{.Name}} {{.Age}}");
    insta::assert_snapshot!(ty_of(&a, "t.tmpl"), @"struct{Age any; Email any; Name any}");
    assert_eq!(ty_of(&a, "t.tmpl"), ty_of(&b, "t.tmpl"));
}

/// Chained accesses build nested structs.
#[test]
fn test_nested_fields() {
    let a = analyze_one("{{.User.Name}} {{.User.Email}}");
    insta::assert_snapshot!(ty_of(&a, "t.tmpl"), @"struct{User struct{Email any; Name any}}");
}

/// `with` rebinds the dot to the selected value.
#[test]
fn test_with_rebinds_dot() {
    let a = analyze_one("{{with .User}}{{.Name}}{{else}}{{.Fallback}}{{end}}");
    insta::assert_snapshot!(ty_of(&a, "t.tmpl"), @"struct{Fallback any; User struct{Name any}}");
}

/// `$` refers to the whole context even where the dot has moved.
#[test]
fn test_root_variable() {
    let a = analyze_one("{{with .User}}{{$.Title}}{{end}}");
    insta::assert_snapshot!(ty_of(&a, "t.tmpl"), @"struct{Title any; User any}");
}

/// Variables bound to context paths alias them.
#[test]
fn test_variable_alias() {
    let a = analyze_one("{{$u := .User}}{{$u.Name}}");
    insta::assert_snapshot!(ty_of(&a, "t.tmpl"), @"struct{User struct{Name any}}");
}

// ── Range ──────────────────────────────────────────────────────────────

/// Ranging over an unknown field makes it a slice and types the element.
#[test]
fn test_range_element() {
    let a = analyze_one("{{range .Items}}{{.Title}}{{end}}");
    insta::assert_snapshot!(ty_of(&a, "t.tmpl"), @"struct{Items []struct{Title any}}");
}

/// `range $i, $e :=` binds index and element.
#[test]
fn test_range_variables() {
    let a = analyze_one("{{range $i, $e := .Items}}{{$e.Title}}{{if eq $i 0}}first{{end}}{{end}}");
    insta::assert_snapshot!(ty_of(&a, "t.tmpl"), @"struct{Items []struct{Title any}}");
    assert!(kinds(&a).is_empty());
}

/// Ranging over a map binds key and value types.
#[test]
fn test_range_map() {
    let a = analyze_one(
        "{{/* go:code\ntype Input struct { Tags map[string]int } */}}\
         {{range $k, $v := .Tags}}{{if eq $k \"a\"}}{{end}}{{if gt $v 1}}{{end}}{{end}}",
    );
    assert!(kinds(&a).is_empty(), "{:?}", kinds(&a));
}

/// Ranging over a scalar is a mismatch.
#[test]
fn test_range_over_string() {
    let a = analyze_one("{{/* go:code\ntype Input struct { Name string } */}}{{range .Name}}{{end}}");
    let messages: Vec<&str> = a.diagnostics().map(|d| d.message.as_str()).collect();
    assert_eq!(messages, vec!["range can't iterate over string"]);
}

/// Ranging over an int is allowed.
#[test]
fn test_range_over_int() {
    let a = analyze_one("{{/* go:code\ntype Input struct { N int } */}}{{range $i := .N}}{{if gt $i 2}}{{end}}{{end}}");
    assert!(kinds(&a).is_empty());
}

/// A record that gains fields after the error site is reported once.
#[test]
fn test_range_over_growing_record_reported_once() {
    let a = analyze_one("{{.User.Name}}{{range .User}}{{end}}{{.User.Email}}");
    let messages: Vec<&str> = a.diagnostics().map(|d| d.message.as_str()).collect();
    assert_eq!(messages, vec!["range can't iterate over struct"]);
    insta::assert_snapshot!(ty_of(&a, "t.tmpl"), @"struct{User struct{Email any; Name any}}");
}

// ── Comparisons ────────────────────────────────────────────────────────

/// Comparing with a string literal types the field as string.
#[test]
fn test_eq_string() {
    let a = analyze_one(r#"{{if eq .Status "active"}}on{{end}}"#);
    insta::assert_snapshot!(ty_of(&a, "t.tmpl"), @"struct{Status string}");
}

/// Ordered comparison with an int literal types the field as int.
#[test]
fn test_gt_int() {
    let a = analyze_one("{{if gt .Count 0}}some{{end}}");
    insta::assert_snapshot!(ty_of(&a, "t.tmpl"), @"struct{Count int}");
}

/// Comparing with a bool literal types the field as bool.
#[test]
fn test_eq_bool() {
    let a = analyze_one("{{if eq .Enabled true}}yes{{end}}");
    insta::assert_snapshot!(ty_of(&a, "t.tmpl"), @"struct{Enabled bool}");
}

/// `else if` comparisons on the same field agree.
#[test]
fn test_else_if_same_field() {
    let a = analyze_one(r#"{{if eq .Status "a"}}A{{else if eq .Status "b"}}B{{end}}"#);
    insta::assert_snapshot!(ty_of(&a, "t.tmpl"), @"struct{Status string}");
    assert!(kinds(&a).is_empty());
}

/// Comparing the same field against different kinds is reported once.
#[test]
fn test_conflicting_comparisons() {
    let a = analyze_one(r#"{{if eq .Status "a"}}{{end}}{{if eq .Status 1}}{{end}}"#);
    assert_eq!(kinds(&a), vec![DiagnosticKind::TypeMismatch]);
    let d = a.diagnostics().next().unwrap();
    assert_eq!(d.message, "incompatible types for comparison: string and int");
}

// ── Declared Types ─────────────────────────────────────────────────────

/// A declared type is kept by name and stays closed.
#[test]
fn test_declared_type_is_kept() {
    let a = analyze_one(
        "{{/* go:code\ntype Input struct {\n  Name string\n  Age int\n} */}}{{.Name}} {{.Age}}",
    );
    let info = a.template("t.tmpl").unwrap();
    assert!(info.declared);
    assert_eq!(info.ty.to_string(), "Input");
    assert!(!info.ty.is_open());
    assert!(kinds(&a).is_empty());
}

/// Unknown fields on a declared struct are reported exactly once.
#[test]
fn test_unknown_field_on_declared() {
    let a = analyze_one(
        "{{/* go:code\ntype Input struct { Name string } */}}{{.Nope}}{{if .Name}}{{end}}",
    );
    assert_eq!(kinds(&a), vec![DiagnosticKind::TypeMismatch]);
    assert_eq!(
        a.diagnostics().next().unwrap().message,
        "type Input has no field Nope"
    );
    assert!(!a.template("t.tmpl").unwrap().ty.is_open());
}

/// Comparing a declared field against the wrong literal kind.
#[test]
fn test_declared_comparison_mismatch() {
    let a = analyze_one(
        "{{/* go:code\ntype Input struct { Count int } */}}{{if eq .Count \"x\"}}{{end}}",
    );
    assert_eq!(kinds(&a), vec![DiagnosticKind::TypeMismatch]);
}

// ── Builtins & Unsupported Forms ───────────────────────────────────────

/// Arguments of unknown functions still contribute their fields.
#[test]
fn test_unknown_function_arguments() {
    let a = analyze_one("{{humanize .Size}} {{len .Items}} {{printf \"%s\" .Title}}");
    insta::assert_snapshot!(ty_of(&a, "t.tmpl"), @"struct{Items any; Size any; Title any}");
}

/// Method calls with arguments are warned about, not failed.
#[test]
fn test_method_call_warns() {
    let a = analyze_one(r#"{{.User.Format "short"}}"#);
    assert_eq!(kinds(&a), vec![DiagnosticKind::UnsupportedConstruct]);
    assert!(!a.has_errors());
}
