//! Declared context types from `go:code` comments.

use stencil_syntax::annotation::{declaration_body, parse_declarations, TypeDecl, TypeExpr};
use stencil_syntax::ast::Node;

use crate::error::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::ty::Ty;

/// The declaration that conventionally describes a template's context.
pub const INPUT_TYPE: &str = "Input";

/// The context type declared by the first `go:code` comment directly inside
/// `body`, if any.
///
/// A comment that fails to parse is reported as an unsupported construct and
/// otherwise ignored.
pub fn declared_context(body: &[Node], file: &str, sink: &mut DiagnosticSink) -> Option<Ty> {
    for node in body {
        let Node::Comment { text, span } = node else {
            continue;
        };
        let Some((decl_text, _)) = declaration_body(text) else {
            continue;
        };
        match parse_declarations(decl_text) {
            Ok(decls) => {
                let chosen = decls
                    .iter()
                    .find(|d| d.name == INPUT_TYPE)
                    .or_else(|| decls.first())?;
                return Some(DeclResolver::new(&decls).named(&chosen.name));
            }
            Err(err) => {
                sink.push(Diagnostic::new(
                    DiagnosticKind::UnsupportedConstruct,
                    file,
                    *span,
                    format!("ignoring type declaration: {}", err.message),
                ));
                return None;
            }
        }
    }
    None
}

struct DeclResolver<'d> {
    decls: &'d [TypeDecl],
    /// Names being expanded, to cut self-reference.
    resolving: Vec<&'d str>,
}

impl<'d> DeclResolver<'d> {
    fn new(decls: &'d [TypeDecl]) -> Self {
        DeclResolver {
            decls,
            resolving: Vec::new(),
        }
    }

    fn named(&mut self, name: &str) -> Ty {
        if let Some(basic) = builtin(name) {
            return basic;
        }
        let decls = self.decls;
        let Some(decl) = decls.iter().find(|d| d.name == name) else {
            return Ty::Any;
        };
        if self.resolving.contains(&decl.name.as_str()) {
            return Ty::Any;
        }
        self.resolving.push(&decl.name);
        let underlying = self.convert(&decl.ty);
        self.resolving.pop();
        Ty::named(name, underlying)
    }

    fn convert(&mut self, expr: &TypeExpr) -> Ty {
        match expr {
            TypeExpr::Name(name) => self.named(name),
            TypeExpr::Slice(elem) => Ty::slice(self.convert(elem)),
            TypeExpr::Map(key, value) => Ty::map(self.convert(key), self.convert(value)),
            TypeExpr::Pointer(inner) => self.convert(inner),
            TypeExpr::Struct(fields) => {
                let fields: Vec<(String, Ty)> = fields
                    .iter()
                    .map(|f| (f.name.clone(), self.convert(&f.ty)))
                    .collect();
                Ty::closed_struct(fields)
            }
            TypeExpr::Interface => Ty::Any,
        }
    }
}

fn builtin(name: &str) -> Option<Ty> {
    let ty = match name {
        "string" => Ty::string(),
        "int" | "int8" | "int16" | "int32" | "int64" | "uint" | "uint8" | "uint16"
        | "uint32" | "uint64" | "uintptr" | "byte" | "rune" => Ty::int(),
        "float32" | "float64" => Ty::float(),
        "bool" => Ty::bool(),
        "any" | "error" => Ty::Any,
        _ => return None,
    };
    Some(ty)
}
