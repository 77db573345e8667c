//! Binding environment with scope stack.
//!
//! Maps variable names (`$x`, `$`) and the dot (`.`) to bindings. Entering an
//! `if`/`with`/`range` body or an else branch pushes a frame; leaving pops
//! it. Lookups search from the innermost frame outward.

use rustc_hash::FxHashMap;

use crate::ty::{PathSeg, Ty};

/// Name under which the dot is bound.
pub const DOT: &str = ".";
/// Name of the variable that always refers to the template's whole context.
pub const ROOT_VAR: &str = "$";

/// What a name refers to.
#[derive(Clone, Debug, PartialEq)]
pub enum Binding {
    /// An alias of a path inside the template's context. Resolving it reads
    /// the context as it is now, so refinements show through.
    Place(Vec<PathSeg>),
    /// A value with its own type, detached from the context.
    Value(Ty),
}

/// Where a value lives: the binding it was reached from plus a path.
#[derive(Clone, Debug, PartialEq)]
pub enum AccessRoot {
    Context,
    Var(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Access {
    pub root: AccessRoot,
    pub path: Vec<PathSeg>,
}

impl Access {
    pub fn child(&self, seg: PathSeg) -> Access {
        let mut path = self.path.clone();
        path.push(seg);
        Access {
            root: self.root.clone(),
            path,
        }
    }
}

/// A type together with the place it was read from, if it has one.
#[derive(Clone, Debug, PartialEq)]
pub struct Typed {
    pub ty: Ty,
    pub access: Option<Access>,
}

impl Typed {
    pub fn value(ty: Ty) -> Typed {
        Typed { ty, access: None }
    }

    pub fn any() -> Typed {
        Typed::value(Ty::Any)
    }
}

/// A binding environment: the template's context type plus a stack of scopes.
#[derive(Clone, Debug)]
pub struct Env {
    context: Ty,
    /// Index 0 is the template's outermost scope.
    scopes: Vec<FxHashMap<String, Binding>>,
}

impl Env {
    /// A fresh environment where `.` and `$` both alias the whole context.
    pub fn new(context: Ty) -> Self {
        let mut root = FxHashMap::default();
        root.insert(DOT.to_string(), Binding::Place(Vec::new()));
        root.insert(ROOT_VAR.to_string(), Binding::Place(Vec::new()));
        Env {
            context,
            scopes: vec![root],
        }
    }

    pub fn context(&self) -> &Ty {
        &self.context
    }

    pub fn set_context(&mut self, context: Ty) {
        self.context = context;
    }

    pub fn into_context(self) -> Ty {
        self.context
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    /// # Panics
    ///
    /// Panics if called when only the outermost scope remains.
    pub fn pop_scope(&mut self) {
        assert!(self.scopes.len() > 1, "cannot pop the template scope");
        self.scopes.pop();
    }

    /// Bind `name` in the innermost scope, shadowing outer bindings.
    pub fn declare(&mut self, name: impl Into<String>, binding: Binding) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), binding);
        }
    }

    /// Replace the binding of `name` in the nearest scope that declares it.
    /// Returns `false` if no scope does.
    pub fn assign(&mut self, name: &str, binding: Binding) -> bool {
        match self.scopes.iter_mut().rev().find_map(|scope| scope.get_mut(name)) {
            Some(slot) => {
                *slot = binding;
                true
            }
            None => false,
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// The current type of `name` plus where it lives.
    pub fn resolve(&self, name: &str) -> Option<Typed> {
        self.lookup(name).map(|binding| match binding {
            Binding::Place(path) => Typed {
                ty: self.context.project(path),
                access: Some(Access {
                    root: AccessRoot::Context,
                    path: path.clone(),
                }),
            },
            Binding::Value(ty) => Typed {
                ty: ty.clone(),
                access: Some(Access {
                    root: AccessRoot::Var(name.to_string()),
                    path: Vec::new(),
                }),
            },
        })
    }

    /// Re-read a typed value from the environment after constraints have
    /// been applied, so its type reflects them.
    pub fn refresh(&self, typed: Typed) -> Typed {
        let Some(access) = &typed.access else {
            return typed;
        };
        let base = match &access.root {
            AccessRoot::Context => Some(self.context.clone()),
            AccessRoot::Var(name) => match self.lookup(name) {
                Some(Binding::Value(ty)) => Some(ty.clone()),
                _ => None,
            },
        };
        match base {
            Some(base) => Typed {
                ty: base.project(&access.path),
                access: typed.access.clone(),
            },
            None => typed,
        }
    }

    /// Number of scopes on the stack.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}
