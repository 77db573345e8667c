//! Type representation for template contexts.
//!
//! `Ty` is the lattice inference works over. `Any` carries no information,
//! `Struct` records are structural and may be open (more fields may exist) or
//! closed (exhaustively declared), and `Named` wraps a declared type so its
//! name survives unification.

use std::collections::BTreeMap;
use std::fmt;

/// A scalar kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BasicKind {
    String,
    Int,
    Float,
    Bool,
}

impl BasicKind {
    /// The name used when rendering, following the host language's spelling.
    pub fn name(self) -> &'static str {
        match self {
            BasicKind::String => "string",
            BasicKind::Int => "int",
            BasicKind::Float => "float64",
            BasicKind::Bool => "bool",
        }
    }
}

/// A record type.
///
/// Fields live in a sorted map: equality ignores the order fields were
/// observed in, and rendering is deterministic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructTy {
    pub fields: BTreeMap<String, Ty>,
    /// More fields may exist than the ones recorded.
    pub open: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ty {
    /// Unknown. Unifies with everything and contributes nothing.
    Any,
    Basic(BasicKind),
    Struct(StructTy),
    Slice(Box<Ty>),
    Map(Box<Ty>, Box<Ty>),
    /// A declared type: a name plus its underlying structure.
    Named(String, Box<Ty>),
}

/// One step of a path from a binding into its value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathSeg {
    /// `.Name`
    Field(String),
    /// An element of a slice, a value of a map, or the item of a `range`.
    Elem,
}

impl Ty {
    pub fn string() -> Ty {
        Ty::Basic(BasicKind::String)
    }

    pub fn int() -> Ty {
        Ty::Basic(BasicKind::Int)
    }

    pub fn float() -> Ty {
        Ty::Basic(BasicKind::Float)
    }

    pub fn bool() -> Ty {
        Ty::Basic(BasicKind::Bool)
    }

    pub fn slice(elem: Ty) -> Ty {
        Ty::Slice(Box::new(elem))
    }

    pub fn map(key: Ty, value: Ty) -> Ty {
        Ty::Map(Box::new(key), Box::new(value))
    }

    pub fn named(name: impl Into<String>, underlying: Ty) -> Ty {
        Ty::Named(name.into(), Box::new(underlying))
    }

    /// An open struct with the given fields.
    pub fn open_struct<N: Into<String>>(fields: impl IntoIterator<Item = (N, Ty)>) -> Ty {
        Ty::record(fields, true)
    }

    /// A closed (fully declared) struct with the given fields.
    pub fn closed_struct<N: Into<String>>(fields: impl IntoIterator<Item = (N, Ty)>) -> Ty {
        Ty::record(fields, false)
    }

    fn record<N: Into<String>>(fields: impl IntoIterator<Item = (N, Ty)>, open: bool) -> Ty {
        Ty::Struct(StructTy {
            fields: fields.into_iter().map(|(n, t)| (n.into(), t)).collect(),
            open,
        })
    }

    /// A short name for the kind of type, for messages.
    pub fn kind_name(&self) -> &'static str {
        match self.underlying() {
            Ty::Any => "any",
            Ty::Basic(kind) => kind.name(),
            Ty::Struct(_) => "struct",
            Ty::Slice(_) => "slice",
            Ty::Map(..) => "map",
            Ty::Named(..) => "named",
        }
    }

    /// How a type is named in diagnostic messages: the declared name for
    /// `Named`, otherwise the kind. Unlike `Display` this never changes as a
    /// record gains fields, so a message reported on one pass is repeated
    /// verbatim on the next.
    pub fn label(&self) -> &str {
        match self {
            Ty::Named(name, _) => name,
            _ => self.kind_name(),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Ty::Any)
    }

    /// The structure behind any `Named` wrappers.
    pub fn underlying(&self) -> &Ty {
        match self {
            Ty::Named(_, inner) => inner.underlying(),
            other => other,
        }
    }

    /// Whether the type is a record whose field set may be incomplete.
    ///
    /// `Any` counts as open: nothing is known about it yet.
    pub fn is_open(&self) -> bool {
        match self.underlying() {
            Ty::Any => true,
            Ty::Struct(s) => s.open,
            _ => false,
        }
    }

    /// Whether any part of the type is still unknown or open.
    pub fn is_partial(&self) -> bool {
        match self {
            Ty::Any => true,
            Ty::Basic(_) => false,
            Ty::Struct(s) => s.open || s.fields.values().any(Ty::is_partial),
            Ty::Slice(elem) => elem.is_partial(),
            Ty::Map(key, value) => key.is_partial() || value.is_partial(),
            Ty::Named(_, inner) => inner.is_partial(),
        }
    }

    /// Look up a struct field, seeing through `Named`.
    pub fn field(&self, name: &str) -> Option<&Ty> {
        match self.underlying() {
            Ty::Struct(s) => s.fields.get(name),
            _ => None,
        }
    }

    /// The type found by following `path` from this type. Steps into unknown
    /// or mismatched structure give `Any`.
    pub fn project(&self, path: &[PathSeg]) -> Ty {
        let Some((seg, rest)) = path.split_first() else {
            return self.clone();
        };
        let next = match (seg, self.underlying()) {
            (PathSeg::Field(name), Ty::Struct(s)) => s.fields.get(name).cloned(),
            (PathSeg::Field(_), Ty::Map(_, value)) => Some((**value).clone()),
            (PathSeg::Elem, Ty::Slice(elem)) => Some((**elem).clone()),
            (PathSeg::Elem, Ty::Map(_, value)) => Some((**value).clone()),
            (PathSeg::Elem, Ty::Basic(BasicKind::Int)) => Some(Ty::int()),
            _ => None,
        };
        next.unwrap_or(Ty::Any).project(rest)
    }

    /// The smallest type that, unified with `self`, places `leaf` at `path`.
    ///
    /// Each struct level of the result copies the openness of the level of
    /// `self` it refines, so a constraint never opens a closed record. A path
    /// through a field a closed record lacks yields `Any` (no constraint).
    pub fn shape_at(&self, path: &[PathSeg], leaf: Ty) -> Ty {
        let Some((seg, rest)) = path.split_first() else {
            return leaf;
        };
        match (seg, self.underlying()) {
            (PathSeg::Field(name), Ty::Struct(s)) => match s.fields.get(name) {
                Some(field) => Ty::record([(name.clone(), field.shape_at(rest, leaf))], s.open),
                None if s.open => Ty::open_struct([(name.clone(), Ty::Any.shape_at(rest, leaf))]),
                None => Ty::Any,
            },
            (PathSeg::Field(name), Ty::Any) => {
                Ty::open_struct([(name.clone(), Ty::Any.shape_at(rest, leaf))])
            }
            (PathSeg::Field(_), Ty::Map(_, value)) | (PathSeg::Elem, Ty::Map(_, value)) => {
                Ty::map(Ty::Any, value.shape_at(rest, leaf))
            }
            (PathSeg::Elem, Ty::Slice(elem)) => Ty::slice(elem.shape_at(rest, leaf)),
            (PathSeg::Elem, Ty::Any) => Ty::slice(Ty::Any.shape_at(rest, leaf)),
            _ => Ty::Any,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Any => write!(f, "any"),
            Ty::Basic(kind) => write!(f, "{}", kind.name()),
            Ty::Struct(s) => {
                write!(f, "struct{{")?;
                for (i, (name, ty)) in s.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{} {}", name, ty)?;
                }
                write!(f, "}}")
            }
            Ty::Slice(elem) => write!(f, "[]{}", elem),
            Ty::Map(key, value) => write!(f, "map[{}]{}", key, value),
            Ty::Named(name, _) => write!(f, "{}", name),
        }
    }
}

/// Render a binding name plus path the way it is written in a template:
/// `.User.Name`, `$item.Title`, `.Items[]`.
pub fn render_path(root: &str, path: &[PathSeg]) -> String {
    let mut out = if root == "." && !path.is_empty() {
        String::new()
    } else {
        root.to_string()
    };
    for seg in path {
        match seg {
            PathSeg::Field(name) => {
                out.push('.');
                out.push_str(name);
            }
            PathSeg::Elem => out.push_str("[]"),
        }
    }
    out
}
