//! Declarative editable-field schemas.
//!
//! Each content type declares, once at startup, which field paths a client
//! may write and what semantic type each carries. The update engine operates
//! only against these tables; it never inspects concrete Rust types.

use std::collections::BTreeMap;

/// Semantic type of an editable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Int,
    Bool,
    /// Sequence of strings; element additions/removals are detected by
    /// value-set difference and logged as their own audit actions.
    StrList,
    /// Whole nested JSON object assigned as one value.
    Object,
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Str => write!(f, "string"),
            FieldKind::Int => write!(f, "integer"),
            FieldKind::Bool => write!(f, "boolean"),
            FieldKind::StrList => write!(f, "string list"),
            FieldKind::Object => write!(f, "object"),
        }
    }
}

/// Descriptor for one field path.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub kind: FieldKind,
    pub editable: bool,
}

/// Per-type table of field paths. Paths are dotted for nested fields
/// (`avatar.source`); sequence elements are addressed by the engine as
/// `path[index]` in audit keys but declared here by their list path.
#[derive(Debug, Default)]
pub struct Schema {
    fields: BTreeMap<&'static str, FieldSpec>,
}

impl Schema {
    pub fn new(entries: &[(&'static str, FieldKind, bool)]) -> Self {
        let fields = entries
            .iter()
            .map(|&(path, kind, editable)| (path, FieldSpec { kind, editable }))
            .collect();
        Self { fields }
    }

    pub fn field(&self, path: &str) -> Option<&FieldSpec> {
        self.fields.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }
}
