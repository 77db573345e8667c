//! Template symbol table.
//!
//! Every file contributes a root template (named after the file id) plus one
//! template per `define` or `block`. Definitions live in an arena indexed by
//! [`TemplateId`]; names map to the first definition seen.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use stencil_common::Span;
use stencil_syntax::ast::{Node, SourceFile};

use crate::declared::declared_context;
use crate::error::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::ty::Ty;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateId(pub u32);

impl TemplateId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
pub struct TemplateDef<'a> {
    pub name: String,
    pub file: &'a str,
    pub body: &'a [Node],
    pub name_span: Span,
    /// Context type from a `go:code` declaration in the body.
    pub declared: Option<Ty>,
    /// Current context type. Written only by the fixpoint driver.
    pub ty: Ty,
    /// Templates that invoked this one in the last pass.
    pub callers: Vec<TemplateId>,
}

#[derive(Debug, Default)]
pub struct SymbolTable<'a> {
    defs: Vec<TemplateDef<'a>>,
    by_name: FxHashMap<String, TemplateId>,
    by_file: BTreeMap<&'a str, Vec<TemplateId>>,
}

impl<'a> SymbolTable<'a> {
    /// Collect templates from `files` in file id order.
    pub fn build(files: &'a BTreeMap<String, SourceFile>, sink: &mut DiagnosticSink) -> Self {
        let mut table = SymbolTable::default();
        for (file, source) in files {
            table.by_file.entry(file.as_str()).or_default();
            table.register(file, file, Span::default(), &source.nodes, sink);
            table.collect(file, &source.nodes, sink);
        }
        table
    }

    fn collect(&mut self, file: &'a str, nodes: &'a [Node], sink: &mut DiagnosticSink) {
        for node in nodes {
            match node {
                Node::Define {
                    name,
                    name_span,
                    body,
                    ..
                }
                | Node::Block {
                    name,
                    name_span,
                    body,
                    ..
                } => {
                    self.register(file, name, *name_span, body, sink);
                    self.collect(file, body, sink);
                }
                Node::If(branch) | Node::With(branch) | Node::Range(branch) => {
                    self.collect(file, &branch.body, sink);
                    if let Some(else_body) = &branch.else_body {
                        self.collect(file, else_body, sink);
                    }
                }
                _ => {}
            }
        }
    }

    fn register(
        &mut self,
        file: &'a str,
        name: &str,
        name_span: Span,
        body: &'a [Node],
        sink: &mut DiagnosticSink,
    ) {
        if let Some(existing) = self.by_name.get(name) {
            let first_file = self.defs[existing.index()].file;
            sink.push(Diagnostic::new(
                DiagnosticKind::DuplicateDefinition,
                file,
                name_span,
                format!("template `{}` is already defined in {}", name, first_file),
            ));
            return;
        }
        let declared = declared_context(body, file, sink);
        let id = TemplateId(self.defs.len() as u32);
        self.defs.push(TemplateDef {
            name: name.to_string(),
            file,
            body,
            name_span,
            ty: declared.clone().unwrap_or(Ty::Any),
            declared,
            callers: Vec::new(),
        });
        self.by_name.insert(name.to_string(), id);
        self.by_file.entry(file).or_default().push(id);
    }

    pub fn lookup(&self, name: &str) -> Option<TemplateId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: TemplateId) -> &TemplateDef<'a> {
        &self.defs[id.index()]
    }

    pub fn get_mut(&mut self, id: TemplateId) -> &mut TemplateDef<'a> {
        &mut self.defs[id.index()]
    }

    /// All template ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = TemplateId> {
        (0..self.defs.len() as u32).map(TemplateId)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Templates defined in `file`, in source order with the root first.
    pub fn file_templates(&self, file: &str) -> &[TemplateId] {
        self.by_file.get(file).map(Vec::as_slice).unwrap_or(&[])
    }

    /// File ids in sorted order.
    pub fn files(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.by_file.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(sources: &[(&str, &str)]) -> BTreeMap<String, SourceFile> {
        sources
            .iter()
            .map(|(name, src)| (name.to_string(), stencil_syntax::parse(src).file))
            .collect()
    }

    #[test]
    fn roots_defines_and_blocks() {
        let files = files(&[(
            "page.tmpl",
            r#"{{define "a"}}x{{end}}{{if .X}}{{block "b" .}}y{{end}}{{end}}"#,
        )]);
        let mut sink = DiagnosticSink::new();
        let table = SymbolTable::build(&files, &mut sink);
        let names: Vec<&str> = table
            .file_templates("page.tmpl")
            .iter()
            .map(|id| table.get(*id).name.as_str())
            .collect();
        assert_eq!(names, vec!["page.tmpl", "a", "b"]);
        assert!(sink.is_empty());
    }

    #[test]
    fn duplicates_keep_the_first() {
        let files = files(&[
            ("a.tmpl", r#"{{define "card"}}{{.A}}{{end}}"#),
            ("b.tmpl", r#"{{define "card"}}{{.B}}{{end}}"#),
        ]);
        let mut sink = DiagnosticSink::new();
        let table = SymbolTable::build(&files, &mut sink);
        let card = table.lookup("card").unwrap();
        assert_eq!(table.get(card).file, "a.tmpl");
        assert_eq!(sink.len(), 1);
        let d = &sink.as_slice()[0];
        assert_eq!(d.kind, DiagnosticKind::DuplicateDefinition);
        assert_eq!(d.file, "b.tmpl");
        assert_eq!(d.message, "template `card` is already defined in a.tmpl");
    }

    #[test]
    fn declared_types_seed_their_template() {
        let files = files(&[(
            "page.tmpl",
            "{{/* go:code\ntype Input struct { Title string } */}}{{define \"inner\"}}{{.X}}{{end}}",
        )]);
        let mut sink = DiagnosticSink::new();
        let table = SymbolTable::build(&files, &mut sink);
        let root = table.get(table.lookup("page.tmpl").unwrap());
        assert_eq!(root.ty.to_string(), "Input");
        assert!(root.declared.is_some());
        let inner = table.get(table.lookup("inner").unwrap());
        assert!(inner.declared.is_none());
        assert_eq!(inner.ty, Ty::Any);
    }
}
