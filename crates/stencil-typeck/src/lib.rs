//! Stencil type checker: infers the type of the dot in Go-style templates.
//!
//! Template contexts are untyped at the source level. This crate recovers a
//! structural type for every template's context from how the template uses
//! it (field accesses, comparisons, `range`, variable flow) and from how other
//! templates invoke it, iterating across a whole set of files to a fixpoint.
//!
//! # Architecture
//!
//! - [`ty`]: Type representation (Ty, open and closed records, Named)
//! - [`unify`]: Structural unification
//! - [`env`]: Binding environment with scope stack
//! - [`eval`]: Expression typing and back-constraints
//! - [`flow`]: Flow-sensitive walk over one template body
//! - [`declared`]: Context types from `go:code` comments
//! - [`symbols`]: Template table
//! - [`fixpoint`]: Call-site propagation and the pass loop
//! - [`error`]: Diagnostics and the deduplicating sink
//! - [`diagnostics`]: Ariadne rendering

pub mod declared;
pub mod diagnostics;
pub mod env;
pub mod error;
pub mod eval;
pub mod fixpoint;
pub mod flow;
pub mod symbols;
pub mod ty;
pub mod unify;

use std::collections::BTreeMap;

use serde::Deserialize;
use stencil_syntax::ast::SourceFile;

pub use crate::error::{Diagnostic, DiagnosticKind, Severity};
pub use crate::fixpoint::{Convergence, Workspace};
pub use crate::ty::Ty;

/// Knobs for an analysis run.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AnalysisConfig {
    /// Upper bound on fixpoint passes.
    pub max_passes: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig { max_passes: 10 }
    }
}

/// What analysis found out about one template.
#[derive(Clone, Debug, PartialEq)]
pub struct TemplateInfo {
    pub name: String,
    pub file: String,
    /// Inferred context type.
    pub ty: Ty,
    /// Whether the context type was declared with a `go:code` comment.
    pub declared: bool,
    /// Names of the templates that invoke this one.
    pub callers: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FileAnalysis {
    pub file: String,
    pub templates: Vec<TemplateInfo>,
    pub diagnostics: Vec<Diagnostic>,
}

/// The result of analysing a set of template files.
#[derive(Clone, Debug, PartialEq)]
pub struct Analysis {
    /// One entry per file, in file id order.
    pub files: Vec<FileAnalysis>,
    pub passes: usize,
    pub converged: bool,
}

impl Analysis {
    pub fn template(&self, name: &str) -> Option<&TemplateInfo> {
        self.files
            .iter()
            .flat_map(|f| f.templates.iter())
            .find(|t| t.name == name)
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.files.iter().flat_map(|f| f.diagnostics.iter())
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics().any(Diagnostic::is_error)
    }
}

/// Analyse `files` (keyed by file id) to a fixpoint.
pub fn analyze(files: &BTreeMap<String, SourceFile>, config: &AnalysisConfig) -> Analysis {
    let mut workspace = Workspace::new(files, config.clone());
    let convergence = workspace.run_to_fixpoint();
    summarize(&workspace, convergence)
}

fn summarize(workspace: &Workspace<'_>, convergence: Convergence) -> Analysis {
    let symbols = workspace.symbols();
    let files = symbols
        .files()
        .map(|file| FileAnalysis {
            file: file.to_string(),
            templates: symbols
                .file_templates(file)
                .iter()
                .map(|id| {
                    let def = symbols.get(*id);
                    TemplateInfo {
                        name: def.name.clone(),
                        file: def.file.to_string(),
                        ty: def.ty.clone(),
                        declared: def.declared.is_some(),
                        callers: def
                            .callers
                            .iter()
                            .map(|caller| symbols.get(*caller).name.clone())
                            .collect(),
                    }
                })
                .collect(),
            diagnostics: workspace.sink().for_file(file).cloned().collect(),
        })
        .collect();
    Analysis {
        files,
        passes: convergence.passes,
        converged: convergence.converged,
    }
}
