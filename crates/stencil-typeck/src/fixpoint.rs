//! Whole-workspace inference.
//!
//! A pass tracks every template against its committed context type, commits
//! what it learned, then pushes the argument type of every call site into
//! the callee. Passes repeat until nothing changes or the pass budget runs
//! out.

use std::collections::BTreeMap;

use stencil_syntax::ast::SourceFile;
use tracing::{debug, trace, warn};

use crate::env::Typed;
use crate::error::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::eval::{EvalOutput, Evaluator};
use crate::flow::{self, CallSite};
use crate::symbols::{SymbolTable, TemplateDef, TemplateId};
use crate::ty::Ty;
use crate::unify::unify;
use crate::AnalysisConfig;

/// How a fixpoint run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Convergence {
    /// Passes run by this call.
    pub passes: usize,
    /// Whether the last pass changed nothing.
    pub converged: bool,
}

pub struct Workspace<'a> {
    symbols: SymbolTable<'a>,
    sink: DiagnosticSink,
    config: AnalysisConfig,
}

impl<'a> Workspace<'a> {
    /// Build the symbol table for `files`. No inference runs yet.
    pub fn new(files: &'a BTreeMap<String, SourceFile>, config: AnalysisConfig) -> Self {
        let mut sink = DiagnosticSink::new();
        let symbols = SymbolTable::build(files, &mut sink);
        debug!(templates = symbols.len(), files = files.len(), "symbol table built");
        Workspace {
            symbols,
            sink,
            config,
        }
    }

    /// Run one pass. Returns the number of templates whose context changed.
    pub fn run_pass(&mut self) -> usize {
        let before: Vec<Ty> = self.symbols.ids().map(|id| self.symbols.get(id).ty.clone()).collect();

        let mut calls = Vec::new();
        for id in self.symbols.ids().collect::<Vec<_>>() {
            let def = self.symbols.get(id);
            let result = flow::track(id, def.file, def.body, def.ty.clone());
            self.sink.extend(result.diagnostics);
            calls.extend(result.calls);
            self.commit(id, &result.context);
        }

        let mut callers: BTreeMap<TemplateId, Vec<TemplateId>> = BTreeMap::new();
        for call in &calls {
            if let Some(callee) = self.propagate(call) {
                let list = callers.entry(callee).or_default();
                if !list.contains(&call.caller) {
                    list.push(call.caller);
                }
            }
        }
        for id in self.symbols.ids().collect::<Vec<_>>() {
            self.symbols.get_mut(id).callers = callers.remove(&id).unwrap_or_default();
        }

        self.symbols
            .ids()
            .zip(before)
            .filter(|(id, old)| self.symbols.get(*id).ty != *old)
            .count()
    }

    /// Run passes until one changes nothing or `max_passes` is reached.
    ///
    /// Running again on a converged workspace performs a single pass that
    /// changes nothing.
    pub fn run_to_fixpoint(&mut self) -> Convergence {
        let max_passes = self.config.max_passes.max(1);
        for pass in 1..=max_passes {
            let changed = self.run_pass();
            debug!(pass, changed, "fixpoint pass complete");
            if changed == 0 {
                return Convergence {
                    passes: pass,
                    converged: true,
                };
            }
        }
        warn!(
            max_passes,
            "template types did not converge; keeping the last types reached"
        );
        Convergence {
            passes: max_passes,
            converged: false,
        }
    }

    /// Merge an inferred context into the committed one.
    fn commit(&mut self, id: TemplateId, inferred: &Ty) {
        let def = self.symbols.get_mut(id);
        let (merged, err) = unify(&def.ty, inferred);
        if let Some(err) = err {
            trace!(template = %def.name, %err, "inferred context conflicts with committed one");
        }
        if merged != def.ty {
            trace!(template = %def.name, ty = %merged, "context refined");
            def.ty = merged;
        }
    }

    /// Push a call site's argument type into its callee.
    fn propagate(&mut self, call: &CallSite<'a>) -> Option<TemplateId> {
        let Some(callee) = self.symbols.lookup(call.callee) else {
            self.sink.push(Diagnostic::new(
                DiagnosticKind::UnknownTemplate,
                call.file,
                call.span,
                format!("no such template: {}", call.callee),
            ));
            return None;
        };

        // Re-resolve the caller's bindings against its freshly committed
        // context. Problems in the argument were reported while tracking.
        let mut env = call.env.clone();
        env.set_context(self.symbols.get(call.caller).ty.clone());
        let mut scratch = EvalOutput::default();
        let Typed { ty: argument, .. } =
            Evaluator::new(&env, call.file, &mut scratch).call_argument(call.argument);

        let def = self.symbols.get_mut(callee);
        let (merged, err) = unify(&def.ty, &argument);
        if let Some(err) = err {
            let message = format!("argument for template `{}`: {}", def.name, err);
            self.sink.push(Diagnostic::new(
                DiagnosticKind::TypeMismatch,
                call.file,
                call.span,
                message,
            ));
        }
        let def = self.symbols.get_mut(callee);
        if merged != def.ty {
            trace!(template = %def.name, ty = %merged, "context refined by call site");
            def.ty = merged;
        }
        Some(callee)
    }

    pub fn template(&self, name: &str) -> Option<&TemplateDef<'a>> {
        self.symbols.lookup(name).map(|id| self.symbols.get(id))
    }

    pub fn symbols(&self) -> &SymbolTable<'a> {
        &self.symbols
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.sink.as_slice()
    }

    pub(crate) fn sink(&self) -> &DiagnosticSink {
        &self.sink
    }
}
