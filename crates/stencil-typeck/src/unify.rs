//! Structural unification over [`Ty`].
//!
//! Unlike the unification of an inference-variable solver, nothing here is
//! bound or mutated: `unify` reads two types and builds the most specific
//! type consistent with both. Conflicts degrade to `Any` and are reported as a
//! [`Mismatch`] so the caller can attach a source position.

use std::fmt;

use crate::ty::{StructTy, Ty};

/// Two concrete types that cannot be reconciled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mismatch {
    pub expected: Ty,
    pub found: Ty,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}, found {}", self.expected.label(), self.found.label())
    }
}

/// Merge two types into one.
///
/// Returns the merged type and the first conflict met, if any. A conflict at
/// the top level yields `Any`; a conflict inside a struct field or container
/// element only degrades that part.
pub fn unify(a: &Ty, b: &Ty) -> (Ty, Option<Mismatch>) {
    match (a, b) {
        (Ty::Any, other) | (other, Ty::Any) => (other.clone(), None),

        (Ty::Basic(k1), Ty::Basic(k2)) => {
            if k1 == k2 {
                (a.clone(), None)
            } else {
                mismatch(a, b)
            }
        }

        (Ty::Named(n1, u1), Ty::Named(n2, u2)) => {
            let (inner, err) = unify(u1, u2);
            // The smaller name wins so that the result does not depend on
            // argument order.
            let name = if n1 <= n2 { n1 } else { n2 };
            keep_name(name, inner, err)
        }
        (Ty::Named(name, inner), other) => {
            let (merged, err) = unify(inner, other);
            keep_name(name, merged, err)
        }
        (other, Ty::Named(name, inner)) => {
            let (merged, err) = unify(other, inner);
            keep_name(name, merged, err)
        }

        (Ty::Struct(s1), Ty::Struct(s2)) => unify_structs(s1, s2),

        (Ty::Slice(e1), Ty::Slice(e2)) => {
            let (elem, err) = unify(e1, e2);
            (Ty::slice(elem), err)
        }

        (Ty::Map(k1, v1), Ty::Map(k2, v2)) => {
            let (key, key_err) = unify(k1, k2);
            let (value, value_err) = unify(v1, v2);
            (Ty::map(key, value), key_err.or(value_err))
        }

        _ => mismatch(a, b),
    }
}

/// Fold a sequence of observations into one type, keeping the first conflict.
pub fn unify_all<'t>(types: impl IntoIterator<Item = &'t Ty>) -> (Ty, Option<Mismatch>) {
    types
        .into_iter()
        .fold((Ty::Any, None), |(acc, err), ty| {
            let (merged, next) = unify(&acc, ty);
            (merged, err.or(next))
        })
}

fn mismatch(a: &Ty, b: &Ty) -> (Ty, Option<Mismatch>) {
    (
        Ty::Any,
        Some(Mismatch {
            expected: a.clone(),
            found: b.clone(),
        }),
    )
}

fn keep_name(name: &str, merged: Ty, err: Option<Mismatch>) -> (Ty, Option<Mismatch>) {
    if merged.is_any() && err.is_some() {
        (Ty::Any, err)
    } else {
        (Ty::named(name, merged), err)
    }
}

fn unify_structs(s1: &StructTy, s2: &StructTy) -> (Ty, Option<Mismatch>) {
    let mut fields = s1.fields.clone();
    let mut first_err = None;
    for (name, ty2) in &s2.fields {
        let merged = match s1.fields.get(name) {
            Some(ty1) => {
                let (merged, err) = unify(ty1, ty2);
                first_err = first_err.or(err);
                merged
            }
            None => ty2.clone(),
        };
        fields.insert(name.clone(), merged);
    }
    (
        Ty::Struct(StructTy {
            fields,
            open: s1.open || s2.open,
        }),
        first_err,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_is_neutral() {
        let t = Ty::open_struct([("Name", Ty::string())]);
        assert_eq!(unify(&Ty::Any, &t), (t.clone(), None));
        assert_eq!(unify(&t, &Ty::Any), (t, None));
    }

    #[test]
    fn different_basics_conflict() {
        let (ty, err) = unify(&Ty::int(), &Ty::string());
        assert_eq!(ty, Ty::Any);
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some("expected int, found string")
        );
    }

    #[test]
    fn struct_union_and_openness() {
        let a = Ty::open_struct([("Name", Ty::Any)]);
        let b = Ty::closed_struct([("Name", Ty::string()), ("Age", Ty::int())]);
        let (ty, err) = unify(&a, &b);
        assert!(err.is_none());
        assert_eq!(ty, Ty::open_struct([("Name", Ty::string()), ("Age", Ty::int())]));

        let (closed, _) = unify(&b, &b);
        assert!(!closed.is_open());
    }

    #[test]
    fn nested_conflict_only_degrades_the_field() {
        let a = Ty::open_struct([("Count", Ty::int()), ("Name", Ty::string())]);
        let b = Ty::open_struct([("Count", Ty::string())]);
        let (ty, err) = unify(&a, &b);
        assert!(err.is_some());
        assert_eq!(ty, Ty::open_struct([("Count", Ty::Any), ("Name", Ty::string())]));
    }

    #[test]
    fn shape_conflicts() {
        let (ty, err) = unify(&Ty::slice(Ty::Any), &Ty::open_struct([("A", Ty::Any)]));
        assert_eq!(ty, Ty::Any);
        assert!(err.is_some());
        let (ty, err) = unify(&Ty::slice(Ty::Any), &Ty::map(Ty::string(), Ty::Any));
        assert_eq!(ty, Ty::Any);
        assert!(err.is_some());
    }

    #[test]
    fn names_are_sticky() {
        let declared = Ty::named("Input", Ty::closed_struct([("Name", Ty::string())]));
        let inferred = Ty::open_struct([("Name", Ty::Any)]);
        let (ty, err) = unify(&declared, &inferred);
        assert!(err.is_none());
        assert_eq!(ty.to_string(), "Input");
        assert_eq!(ty.field("Name"), Some(&Ty::string()));

        let (ty, err) = unify(&declared, &Ty::int());
        assert_eq!(ty, Ty::Any);
        assert!(err.is_some());
    }

    #[test]
    fn two_names_pick_the_smaller() {
        let a = Ty::named("B", Ty::closed_struct([("X", Ty::int())]));
        let b = Ty::named("A", Ty::closed_struct([("X", Ty::int())]));
        assert_eq!(unify(&a, &b).0.to_string(), "A");
        assert_eq!(unify(&b, &a).0.to_string(), "A");
    }

    #[test]
    fn unify_all_folds() {
        let types = [
            Ty::open_struct([("A", Ty::Any)]),
            Ty::open_struct([("B", Ty::int())]),
            Ty::open_struct([("A", Ty::string())]),
        ];
        let (ty, err) = unify_all(&types);
        assert!(err.is_none());
        assert_eq!(ty.to_string(), "struct{A string; B int}");
    }
}
