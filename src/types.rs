//! Structural types for Fax values.
//!
//! Types arrive from the parser as wire strings (`"int"`, `"ptr<int>"`,
//! `"array<Point>"`) and are parsed into `Ty`. The checker interns them so
//! binding records can compare types by id.

use std::collections::HashMap;
use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    Int,
    Float,
    Bool,
    Str,
    Void,
    /// A user-defined struct, by name. Whether the name is actually
    /// registered is the type registry's concern.
    Named(String),
    Array(Box<Ty>),
    /// Shared (immutable) view.
    Ref(Box<Ty>),
    /// Exclusive (mutable) view.
    Ptr(Box<Ty>),
    /// Error-tolerance type: agrees with everything so one bad expression
    /// does not cascade into follow-on diagnostics.
    Unknown,
}

impl Ty {
    /// Parses a wire type string. Unrecognized names become `Named`;
    /// `"auto"` and `"unknown"` become `Unknown`.
    pub fn parse(s: &str) -> Ty {
        let s = s.trim();
        if let Some(inner) = generic_arg(s, "ptr") {
            return Ty::Ptr(Box::new(Ty::parse(inner)));
        }
        if let Some(inner) = generic_arg(s, "ref") {
            return Ty::Ref(Box::new(Ty::parse(inner)));
        }
        if let Some(inner) = generic_arg(s, "array") {
            return Ty::Array(Box::new(Ty::parse(inner)));
        }
        match s {
            "int" => Ty::Int,
            "float" => Ty::Float,
            "bool" => Ty::Bool,
            "string" => Ty::Str,
            "void" => Ty::Void,
            "auto" | "unknown" | "" => Ty::Unknown,
            name => Ty::Named(name.to_string()),
        }
    }

    /// Copy semantics: scalar primitives are copied on use, everything else
    /// moves. Shared views copy like scalars; exclusive views do not.
    pub fn is_copy(&self) -> bool {
        matches!(self, Ty::Int | Ty::Float | Ty::Bool | Ty::Void | Ty::Ref(_))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Ty::Ref(_) | Ty::Ptr(_))
    }

    /// Structural agreement with `Unknown` acting as a wildcard.
    pub fn agrees_with(&self, other: &Ty) -> bool {
        match (self, other) {
            (Ty::Unknown, _) | (_, Ty::Unknown) => true,
            (Ty::Array(a), Ty::Array(b)) => a.agrees_with(b),
            (Ty::Ref(a), Ty::Ref(b)) => a.agrees_with(b),
            (Ty::Ptr(a), Ty::Ptr(b)) => a.agrees_with(b),
            (a, b) => a == b,
        }
    }
}

fn generic_arg<'a>(s: &'a str, head: &str) -> Option<&'a str> {
    s.strip_prefix(head)?
        .strip_prefix('<')?
        .strip_suffix('>')
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Int => write!(f, "int"),
            Ty::Float => write!(f, "float"),
            Ty::Bool => write!(f, "bool"),
            Ty::Str => write!(f, "string"),
            Ty::Void => write!(f, "void"),
            Ty::Named(name) => write!(f, "{}", name),
            Ty::Array(inner) => write!(f, "array<{}>", inner),
            Ty::Ref(inner) => write!(f, "ref<{}>", inner),
            Ty::Ptr(inner) => write!(f, "ptr<{}>", inner),
            Ty::Unknown => write!(f, "unknown"),
        }
    }
}

impl Serialize for Ty {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Ty {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Err(D::Error::custom("empty type string"));
        }
        Ok(Ty::parse(&s))
    }
}

/// Stable id of an interned type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TyId(u32);

/// Deduplicating arena of types. Interning makes equality a `TyId`
/// comparison in the hot binding-state paths.
#[derive(Debug, Default)]
pub struct TypeInterner {
    types: Vec<Ty>,
    ids: HashMap<Ty, TyId>,
}

impl TypeInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, ty: Ty) -> TyId {
        if let Some(&id) = self.ids.get(&ty) {
            return id;
        }
        let id = TyId(self.types.len() as u32);
        self.types.push(ty.clone());
        self.ids.insert(ty, id);
        id
    }

    pub fn resolve(&self, id: TyId) -> &Ty {
        &self.types[id.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_wire_strings() {
        assert_eq!(Ty::parse("int"), Ty::Int);
        assert_eq!(Ty::parse("ptr<int>"), Ty::Ptr(Box::new(Ty::Int)));
        assert_eq!(
            Ty::parse("array<ref<Point>>"),
            Ty::Array(Box::new(Ty::Ref(Box::new(Ty::Named("Point".into())))))
        );
        assert_eq!(Ty::parse("auto"), Ty::Unknown);
    }

    #[test]
    fn display_round_trips() {
        for s in ["int", "ptr<string>", "array<int>", "ref<Point>"] {
            assert_eq!(Ty::parse(s).to_string(), s);
        }
    }

    #[test]
    fn unknown_agrees_with_anything() {
        assert!(Ty::Unknown.agrees_with(&Ty::Int));
        assert!(Ty::Named("P".into()).agrees_with(&Ty::Unknown));
        assert!(!Ty::Int.agrees_with(&Ty::Float));
    }

    #[test]
    fn interner_dedups() {
        let mut interner = TypeInterner::new();
        let a = interner.intern(Ty::parse("array<int>"));
        let b = interner.intern(Ty::parse("array<int>"));
        let c = interner.intern(Ty::Int);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(interner.resolve(a), &Ty::Array(Box::new(Ty::Int)));
    }

    #[test]
    fn copy_classification() {
        assert!(Ty::Int.is_copy());
        assert!(Ty::Ref(Box::new(Ty::Int)).is_copy());
        assert!(!Ty::Str.is_copy());
        assert!(!Ty::Named("Point".into()).is_copy());
        assert!(!Ty::Ptr(Box::new(Ty::Int)).is_copy());
    }
}
