//! Syntax tree for parsed templates.
//!
//! The tree is deliberately plain: owned nodes with byte spans. Analysis
//! borrows it for the duration of a run and never mutates it.

use stencil_common::Span;

/// One parsed template source file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceFile {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text between actions.
    Text(Span),
    /// `{{/* ... */}}`. `text` is the content between `/*` and `*/`.
    Comment { text: String, span: Span },
    /// `{{pipeline}}`, including variable declarations and assignments.
    Action { pipeline: Pipeline, span: Span },
    If(Branch),
    With(Branch),
    Range(Branch),
    /// `{{define "name"}}body{{end}}`.
    Define {
        name: String,
        name_span: Span,
        body: Vec<Node>,
        span: Span,
    },
    /// `{{block "name" pipeline}}body{{end}}`: a definition plus an invocation.
    Block {
        name: String,
        name_span: Span,
        pipeline: Pipeline,
        body: Vec<Node>,
        span: Span,
    },
    /// `{{template "name" pipeline}}`.
    Template {
        name: String,
        name_span: Span,
        pipeline: Option<Pipeline>,
        span: Span,
    },
    Break(Span),
    Continue(Span),
}

impl Node {
    pub fn span(&self) -> Span {
        match self {
            Node::Text(span) | Node::Break(span) | Node::Continue(span) => *span,
            Node::Comment { span, .. }
            | Node::Action { span, .. }
            | Node::Define { span, .. }
            | Node::Block { span, .. }
            | Node::Template { span, .. } => *span,
            Node::If(branch) | Node::With(branch) | Node::Range(branch) => branch.span,
        }
    }
}

/// The shared shape of `if`, `with` and `range`.
///
/// `else if` / `else with` chains are represented the way the template
/// language defines them: the else body holds a single nested branch node.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub pipeline: Pipeline,
    pub body: Vec<Node>,
    pub else_body: Option<Vec<Node>>,
    pub span: Span,
}

/// A possibly-declaring pipeline: `$x := cmd | cmd`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    /// Declared or assigned variables (`$i, $e := ...` declares two).
    pub decl: Vec<Variable>,
    /// `=` rather than `:=`.
    pub is_assign: bool,
    pub commands: Vec<Command>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Including the leading `$`.
    pub name: String,
    pub span: Span,
}

/// One stage of a pipeline: a function name followed by arguments, or a
/// single operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `.`
    Dot(Span),
    /// `$` or `$name`.
    Variable(Variable),
    /// `base.Name`; a leading `.Name` has a `Dot` base.
    Field {
        base: Box<Expr>,
        name: String,
        name_span: Span,
        span: Span,
    },
    /// A function name.
    Ident { name: String, span: Span },
    Str { value: String, span: Span },
    Int { value: i64, span: Span },
    Float { value: f64, span: Span },
    Bool { value: bool, span: Span },
    Nil(Span),
    /// `(pipeline)`.
    Paren { pipeline: Box<Pipeline>, span: Span },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Dot(span) | Expr::Nil(span) => *span,
            Expr::Variable(var) => var.span,
            Expr::Field { span, .. }
            | Expr::Ident { span, .. }
            | Expr::Str { span, .. }
            | Expr::Int { span, .. }
            | Expr::Float { span, .. }
            | Expr::Bool { span, .. }
            | Expr::Paren { span, .. } => *span,
        }
    }

    /// Whether this is a literal constant.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Expr::Str { .. } | Expr::Int { .. } | Expr::Float { .. } | Expr::Bool { .. } | Expr::Nil(_)
        )
    }
}
