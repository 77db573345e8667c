use insta::assert_yaml_snapshot;
use serde::Serialize;
use stencil_syntax::lexer::Lexer;

/// A human-readable representation of a token for snapshot testing.
#[derive(Serialize)]
struct TokenSnapshot {
    kind: String,
    text: String,
    span: (u32, u32),
}

/// Tokenize source and return a list of snapshot-friendly token representations.
fn tokenize_snapshot(source: &str) -> Vec<TokenSnapshot> {
    Lexer::tokenize(source)
        .into_iter()
        .map(|tok| TokenSnapshot {
            kind: format!("{:?}", tok.kind),
            text: source[tok.span.to_range()].to_string(),
            span: (tok.span.start, tok.span.end),
        })
        .collect()
}

// ── Token streams ──────────────────────────────────────────────────────

#[test]
fn test_declaration_with_pipe() {
    assert_yaml_snapshot!(tokenize_snapshot("Hi {{$x := .User.Name | len}}"), @r#"
    - kind: Text
      text: "Hi "
      span:
        - 0
        - 3
    - kind: LeftDelim
      text: "{{"
      span:
        - 3
        - 5
    - kind: Variable
      text: $x
      span:
        - 5
        - 7
    - kind: Declare
      text: ":="
      span:
        - 8
        - 10
    - kind: Field
      text: ".User"
      span:
        - 11
        - 16
    - kind: Field
      text: ".Name"
      span:
        - 16
        - 21
    - kind: Pipe
      text: "|"
      span:
        - 22
        - 23
    - kind: Ident
      text: len
      span:
        - 24
        - 27
    - kind: RightDelim
      text: "}}"
      span:
        - 27
        - 29
    - kind: Eof
      text: ""
      span:
        - 29
        - 29
    "#);
}

#[test]
fn test_keywords_and_text() {
    assert_yaml_snapshot!(tokenize_snapshot("{{if eq .A 1}}x{{end}}"), @r#"
    - kind: LeftDelim
      text: "{{"
      span:
        - 0
        - 2
    - kind: If
      text: if
      span:
        - 2
        - 4
    - kind: Ident
      text: eq
      span:
        - 5
        - 7
    - kind: Field
      text: ".A"
      span:
        - 8
        - 10
    - kind: IntLiteral
      text: "1"
      span:
        - 11
        - 12
    - kind: RightDelim
      text: "}}"
      span:
        - 12
        - 14
    - kind: Text
      text: x
      span:
        - 14
        - 15
    - kind: LeftDelim
      text: "{{"
      span:
        - 15
        - 17
    - kind: End
      text: end
      span:
        - 17
        - 20
    - kind: RightDelim
      text: "}}"
      span:
        - 20
        - 22
    - kind: Eof
      text: ""
      span:
        - 22
        - 22
    "#);
}
