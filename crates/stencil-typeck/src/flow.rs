//! Flow-sensitive walk over one template body.
//!
//! The tracker threads a binding environment through the body in source
//! order, applies every back-constraint the evaluator produces, and records
//! template invocations as call sites for the fixpoint driver.

use stencil_common::Span;
use stencil_syntax::ast::{Branch, Node, Pipeline, Variable};

use crate::env::{AccessRoot, Binding, Env, Typed, DOT};
use crate::error::{Diagnostic, DiagnosticKind};
use crate::eval::{Constraint, EvalOutput, Evaluator};
use crate::symbols::TemplateId;
use crate::ty::Ty;
use crate::unify::unify;

/// A `{{template}}` or `{{block}}` invocation observed during a walk.
#[derive(Clone, Debug)]
pub struct CallSite<'a> {
    pub caller: TemplateId,
    pub callee: &'a str,
    pub argument: Option<&'a Pipeline>,
    /// The caller's bindings at the call, for re-evaluating the argument
    /// against later context types.
    pub env: Env,
    pub file: &'a str,
    pub span: Span,
}

#[derive(Debug)]
pub struct FlowResult<'a> {
    /// The inferred context type.
    pub context: Ty,
    pub calls: Vec<CallSite<'a>>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Walk `body` of template `caller`, starting from `context`.
pub fn track<'a>(caller: TemplateId, file: &'a str, body: &'a [Node], context: Ty) -> FlowResult<'a> {
    let mut tracker = FlowTracker {
        caller,
        file,
        env: Env::new(context),
        calls: Vec::new(),
        diagnostics: Vec::new(),
    };
    tracker.nodes(body);
    FlowResult {
        context: tracker.env.into_context(),
        calls: tracker.calls,
        diagnostics: tracker.diagnostics,
    }
}

struct FlowTracker<'a> {
    caller: TemplateId,
    file: &'a str,
    env: Env,
    calls: Vec<CallSite<'a>>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> FlowTracker<'a> {
    fn nodes(&mut self, nodes: &'a [Node]) {
        for node in nodes {
            self.node(node);
        }
    }

    fn node(&mut self, node: &'a Node) {
        match node {
            Node::Action { pipeline, .. } => {
                self.statement(pipeline);
            }
            Node::If(branch) => self.if_node(branch),
            Node::With(branch) => self.with_node(branch),
            Node::Range(branch) => self.range_node(branch),
            Node::Template {
                name,
                pipeline,
                span,
                ..
            } => self.call(name, pipeline.as_ref(), *span),
            Node::Block {
                name,
                pipeline,
                span,
                ..
            } => self.call(name, Some(pipeline), *span),
            // Separate templates; the symbol table tracks them on their own.
            Node::Define { .. } => {}
            Node::Text(_) | Node::Comment { .. } | Node::Break(_) | Node::Continue(_) => {}
        }
    }

    fn if_node(&mut self, branch: &'a Branch) {
        self.env.push_scope();
        self.statement(&branch.pipeline);
        self.scoped(&branch.body, None);
        if let Some(else_body) = &branch.else_body {
            self.scoped(else_body, None);
        }
        self.env.pop_scope();
    }

    fn with_node(&mut self, branch: &'a Branch) {
        self.env.push_scope();
        let value = self.statement(&branch.pipeline);
        self.scoped(&branch.body, Some(binding_for(&value)));
        if let Some(else_body) = &branch.else_body {
            self.scoped(else_body, None);
        }
        self.env.pop_scope();
    }

    fn range_node(&mut self, branch: &'a Branch) {
        self.env.push_scope();
        let pipeline = &branch.pipeline;
        let target = self.evaluate(pipeline, |eval, typed| {
            let items = eval.range_over(&typed, pipeline.span);
            (typed, items)
        });
        let (_, items) = target;
        let elem = self.env.refresh(items.elem);
        let elem_binding = binding_for(&elem);

        self.env.push_scope();
        self.env.declare(DOT, elem_binding.clone());
        match pipeline.decl.as_slice() {
            [] => {}
            [elem_var] => self.bind(elem_var, elem_binding, elem.ty, pipeline.is_assign),
            [key_var, elem_var, ..] => {
                self.bind(key_var, Binding::Value(items.key.clone()), items.key, pipeline.is_assign);
                self.bind(elem_var, elem_binding, elem.ty, pipeline.is_assign);
            }
        }
        self.nodes(&branch.body);
        self.env.pop_scope();

        if let Some(else_body) = &branch.else_body {
            self.scoped(else_body, None);
        }
        self.env.pop_scope();
    }

    /// Walk `nodes` in a child scope, optionally rebinding the dot.
    fn scoped(&mut self, nodes: &'a [Node], dot: Option<Binding>) {
        self.env.push_scope();
        if let Some(dot) = dot {
            self.env.declare(DOT, dot);
        }
        self.nodes(nodes);
        self.env.pop_scope();
    }

    /// Evaluate a pipeline and perform its declaration or assignment.
    fn statement(&mut self, pipeline: &'a Pipeline) -> Typed {
        let (value, _) = self.evaluate(pipeline, |_, typed| (typed, ()));
        if let Some(var) = pipeline.decl.first() {
            self.bind(var, binding_for(&value), value.ty.clone(), pipeline.is_assign);
        }
        value
    }

    fn bind(&mut self, var: &Variable, binding: Binding, ty: Ty, is_assign: bool) {
        if is_assign {
            self.reassign(var, ty);
        } else {
            self.env.declare(var.name.clone(), binding);
        }
    }

    /// `$x = value`.
    fn reassign(&mut self, var: &Variable, value: Ty) {
        let Some(current) = self.env.resolve(&var.name) else {
            self.report(
                DiagnosticKind::UndefinedVariable,
                var.span,
                format!("undefined variable: {}", var.name),
            );
            return;
        };
        let current = current.ty;
        // `Any` is neutral, so a scalar slot handed an unknown value keeps
        // its type here.
        let (next, err) = unify(&current, &value);
        if err.is_some() {
            self.report(
                DiagnosticKind::TypeMismatch,
                var.span,
                format!(
                    "cannot assign {} to {} (type {})",
                    value.label(),
                    var.name,
                    current.label()
                ),
            );
        }
        self.env.assign(&var.name, Binding::Value(next));
    }

    fn call(&mut self, name: &'a str, argument: Option<&'a Pipeline>, span: Span) {
        if let Some(pipeline) = argument {
            self.evaluate(pipeline, |_, typed| (typed, ()));
        }
        self.calls.push(CallSite {
            caller: self.caller,
            callee: name,
            argument,
            env: self.env.clone(),
            file: self.file,
            span,
        });
    }

    /// Evaluate `pipeline`, let `then` run more evaluator queries on the
    /// result, and apply everything the evaluator reported.
    fn evaluate<R>(
        &mut self,
        pipeline: &Pipeline,
        then: impl FnOnce(&mut Evaluator<'_>, Typed) -> (Typed, R),
    ) -> (Typed, R) {
        let mut out = EvalOutput::default();
        let (typed, extra) = {
            let mut eval = Evaluator::new(&self.env, self.file, &mut out);
            let typed = eval.pipeline(pipeline);
            then(&mut eval, typed)
        };
        self.diagnostics.extend(out.diagnostics);
        for constraint in out.constraints {
            self.apply(constraint);
        }
        (self.env.refresh(typed), extra)
    }

    /// Merge a back-constraint into the binding it is rooted at.
    fn apply(&mut self, constraint: Constraint) {
        let current = match &constraint.root {
            AccessRoot::Context => self.env.context().clone(),
            AccessRoot::Var(name) => match self.env.lookup(name) {
                Some(Binding::Value(ty)) => ty.clone(),
                _ => return,
            },
        };
        let shape = current.shape_at(&constraint.path, constraint.ty.clone());
        let (merged, err) = unify(&current, &shape);
        if let Some(err) = err {
            self.report(
                DiagnosticKind::TypeMismatch,
                constraint.span,
                format!("{}: {}", constraint.describe(), err),
            );
        }
        match &constraint.root {
            AccessRoot::Context => self.env.set_context(merged),
            AccessRoot::Var(name) => {
                self.env.assign(name, Binding::Value(merged));
            }
        }
    }

    fn report(&mut self, kind: DiagnosticKind, span: Span, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::new(kind, self.file, span, message));
    }
}

/// Binding for a value about to be named: values read straight out of the
/// context stay aliases of it, everything else is detached.
fn binding_for(value: &Typed) -> Binding {
    match &value.access {
        Some(access) if access.root == AccessRoot::Context => Binding::Place(access.path.clone()),
        _ => Binding::Value(value.ty.clone()),
    }
}
