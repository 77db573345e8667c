//! Expression typing.
//!
//! The evaluator reads the binding environment and never writes it. What it
//! learns about the context travels out as [`Constraint`]s ("the value at
//! this path has this shape"), which the flow tracker applies; problems travel
//! out as diagnostics. Every failure yields `Any` so evaluation always
//! finishes.

use stencil_common::Span;
use stencil_syntax::ast::{Command, Expr, Pipeline};

use crate::env::{Access, AccessRoot, Env, Typed, DOT};
use crate::error::{Diagnostic, DiagnosticKind};
use crate::ty::{render_path, BasicKind, PathSeg, Ty};

/// A back-constraint: the value reached from `root` along `path` has type
/// `ty` (merged by unification, never replaced).
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    pub root: AccessRoot,
    pub path: Vec<PathSeg>,
    pub ty: Ty,
    pub span: Span,
}

impl Constraint {
    /// The constrained location as written in a template.
    pub fn describe(&self) -> String {
        match &self.root {
            AccessRoot::Context => render_path(DOT, &self.path),
            AccessRoot::Var(name) => render_path(name, &self.path),
        }
    }
}

#[derive(Debug, Default)]
pub struct EvalOutput {
    pub diagnostics: Vec<Diagnostic>,
    pub constraints: Vec<Constraint>,
}

/// The key and element types a `range` binds.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeItems {
    pub key: Ty,
    pub elem: Typed,
}

/// Functions that format their arguments into text.
const STRING_BUILTINS: &[&str] = &["print", "printf", "println", "html", "js", "urlquery"];

pub struct Evaluator<'e> {
    env: &'e Env,
    file: &'e str,
    out: &'e mut EvalOutput,
}

impl<'e> Evaluator<'e> {
    pub fn new(env: &'e Env, file: &'e str, out: &'e mut EvalOutput) -> Self {
        Evaluator { env, file, out }
    }

    /// Type a pipeline. Each command's value is passed to the next command as
    /// its final argument.
    pub fn pipeline(&mut self, pipeline: &Pipeline) -> Typed {
        let mut piped: Option<(Typed, Span)> = None;
        for command in &pipeline.commands {
            let value = self.command(command, piped.take());
            piped = Some((value, command.span));
        }
        piped.map(|(value, _)| value).unwrap_or_else(Typed::any)
    }

    /// The argument of a `template`/`block` invocation; none means `Any`.
    pub fn call_argument(&mut self, argument: Option<&Pipeline>) -> Typed {
        match argument {
            Some(pipeline) => self.pipeline(pipeline),
            None => Typed::any(),
        }
    }

    fn command(&mut self, command: &Command, piped: Option<(Typed, Span)>) -> Typed {
        let Some((head, args)) = command.args.split_first() else {
            return Typed::any();
        };
        if let Expr::Ident { name, span } = head {
            return self.call(name, *span, args, piped);
        }
        if args.is_empty() && piped.is_none() {
            return self.operand(head);
        }

        for arg in args {
            self.operand(arg);
        }
        let message = match head {
            Expr::Field { name, .. } => {
                format!("method call `{}` with arguments cannot be typed", name)
            }
            _ => "can't give argument to non-function".to_string(),
        };
        self.operand(head);
        self.report(DiagnosticKind::UnsupportedConstruct, command.span, message);
        Typed::any()
    }

    /// Type a single operand.
    pub fn operand(&mut self, expr: &Expr) -> Typed {
        match expr {
            Expr::Dot(_) => self.env.resolve(DOT).unwrap_or_else(Typed::any),
            Expr::Variable(var) => match self.env.resolve(&var.name) {
                Some(typed) => typed,
                None => {
                    self.report(
                        DiagnosticKind::UndefinedVariable,
                        var.span,
                        format!("undefined variable: {}", var.name),
                    );
                    Typed::any()
                }
            },
            Expr::Field {
                base,
                name,
                name_span,
                span,
            } => {
                if base.is_literal() {
                    self.report(
                        DiagnosticKind::UnsupportedConstruct,
                        *span,
                        format!("can't select field `{}` on a literal", name),
                    );
                    return Typed::any();
                }
                let base = self.operand(base);
                self.select(base, name, *name_span)
            }
            Expr::Ident { name, span } => self.call(name, *span, &[], None),
            Expr::Str { .. } => Typed::value(Ty::string()),
            Expr::Int { .. } => Typed::value(Ty::int()),
            Expr::Float { .. } => Typed::value(Ty::float()),
            Expr::Bool { .. } => Typed::value(Ty::bool()),
            Expr::Nil(_) => Typed::any(),
            Expr::Paren { pipeline, .. } => self.pipeline(pipeline),
        }
    }

    /// `base.name`.
    fn select(&mut self, base: Typed, name: &str, span: Span) -> Typed {
        let access = base
            .access
            .as_ref()
            .map(|a| a.child(PathSeg::Field(name.to_string())));
        match base.ty.underlying() {
            Ty::Any => {
                self.constrain(access.as_ref(), Ty::Any, span);
                Typed { ty: Ty::Any, access }
            }
            Ty::Struct(record) => match record.fields.get(name) {
                Some(ty) => Typed {
                    ty: ty.clone(),
                    access,
                },
                None if record.open => {
                    self.constrain(access.as_ref(), Ty::Any, span);
                    Typed { ty: Ty::Any, access }
                }
                None => {
                    self.report(
                        DiagnosticKind::TypeMismatch,
                        span,
                        format!("type {} has no field {}", base.ty.label(), name),
                    );
                    Typed::any()
                }
            },
            Ty::Map(_, value) => Typed {
                ty: (**value).clone(),
                access,
            },
            _ => {
                self.report(
                    DiagnosticKind::TypeMismatch,
                    span,
                    format!("can't evaluate field {} in type {}", name, base.ty.label()),
                );
                Typed::any()
            }
        }
    }

    /// A call of a named function. Arguments are always evaluated so their
    /// own accesses contribute constraints, even for unknown functions.
    fn call(
        &mut self,
        name: &str,
        span: Span,
        args: &[Expr],
        piped: Option<(Typed, Span)>,
    ) -> Typed {
        let mut values: Vec<(Typed, Span)> = args
            .iter()
            .map(|arg| (self.operand(arg), arg.span()))
            .collect();
        values.extend(piped);

        match name {
            "eq" | "ne" => {
                if let Some(((first, _), rest)) = values.split_first() {
                    for (other, other_span) in rest {
                        self.compare(first, other, false, span.merge(*other_span));
                    }
                }
                Typed::value(Ty::bool())
            }
            "lt" | "le" | "gt" | "ge" => {
                if let [(a, _), (b, b_span)] = values.as_slice() {
                    self.compare(a, b, true, span.merge(*b_span));
                }
                Typed::value(Ty::bool())
            }
            "not" => Typed::value(Ty::bool()),
            "and" | "or" => {
                let mut types = values.iter().map(|(v, _)| &v.ty);
                match types.next() {
                    Some(first) if types.all(|t| t == first) => Typed::value(first.clone()),
                    _ => Typed::any(),
                }
            }
            "len" => Typed::value(Ty::int()),
            "index" => {
                let mut iter = values.into_iter().map(|(v, _)| v);
                let Some(mut current) = iter.next() else {
                    return Typed::any();
                };
                for _key in iter {
                    current = index_into(current);
                }
                current
            }
            "slice" => values
                .into_iter()
                .next()
                .map(|(v, _)| Typed::value(v.ty))
                .unwrap_or_else(Typed::any),
            _ if STRING_BUILTINS.contains(&name) => Typed::value(Ty::string()),
            _ => Typed::any(),
        }
    }

    /// Compare two operands. An unknown side with a known location takes the
    /// other side's scalar type.
    fn compare(&mut self, a: &Typed, b: &Typed, ordered: bool, span: Span) {
        match (a.ty.underlying(), b.ty.underlying()) {
            (Ty::Any, Ty::Basic(_)) => self.constrain(a.access.as_ref(), b.ty.clone(), span),
            (Ty::Basic(_), Ty::Any) => self.constrain(b.access.as_ref(), a.ty.clone(), span),
            (Ty::Basic(k1), Ty::Basic(k2)) if k1 != k2 => self.report(
                DiagnosticKind::TypeMismatch,
                span,
                format!(
                    "incompatible types for comparison: {} and {}",
                    a.ty.label(),
                    b.ty.label()
                ),
            ),
            (Ty::Basic(BasicKind::Bool), Ty::Basic(BasicKind::Bool)) if ordered => self.report(
                DiagnosticKind::TypeMismatch,
                span,
                "invalid type for ordered comparison: bool",
            ),
            _ => {}
        }
    }

    /// What `range` over `target` binds.
    pub fn range_over(&mut self, target: &Typed, span: Span) -> RangeItems {
        let elem_access = target.access.as_ref().map(|a| a.child(PathSeg::Elem));
        match target.ty.underlying() {
            Ty::Slice(elem) => RangeItems {
                key: Ty::int(),
                elem: Typed {
                    ty: (**elem).clone(),
                    access: elem_access,
                },
            },
            Ty::Map(key, value) => RangeItems {
                key: (**key).clone(),
                elem: Typed {
                    ty: (**value).clone(),
                    access: elem_access,
                },
            },
            Ty::Basic(BasicKind::Int) => RangeItems {
                key: Ty::int(),
                elem: Typed::value(Ty::int()),
            },
            Ty::Any => {
                self.constrain(target.access.as_ref(), Ty::slice(Ty::Any), span);
                RangeItems {
                    key: Ty::int(),
                    elem: Typed {
                        ty: Ty::Any,
                        access: elem_access,
                    },
                }
            }
            _ => {
                self.report(
                    DiagnosticKind::TypeMismatch,
                    span,
                    format!("range can't iterate over {}", target.ty.label()),
                );
                RangeItems {
                    key: Ty::Any,
                    elem: Typed::any(),
                }
            }
        }
    }

    fn constrain(&mut self, access: Option<&Access>, ty: Ty, span: Span) {
        if let Some(access) = access {
            self.out.constraints.push(Constraint {
                root: access.root.clone(),
                path: access.path.clone(),
                ty,
                span,
            });
        }
    }

    fn report(&mut self, kind: DiagnosticKind, span: Span, message: impl Into<String>) {
        self.out
            .diagnostics
            .push(Diagnostic::new(kind, self.file, span, message));
    }
}

/// One step of `index`: the element or value type of a container.
fn index_into(container: Typed) -> Typed {
    let access = container.access.as_ref().map(|a| a.child(PathSeg::Elem));
    match container.ty.underlying() {
        Ty::Slice(elem) => Typed {
            ty: (**elem).clone(),
            access,
        },
        Ty::Map(_, value) => Typed {
            ty: (**value).clone(),
            access,
        },
        // Indexing a string yields a byte.
        Ty::Basic(BasicKind::String) => Typed::value(Ty::int()),
        _ => Typed::any(),
    }
}
