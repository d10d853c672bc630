// Compiled form descriptions. No serde_json::Value here.
//
// Every node lives in one arena owned by `FormRegistry`; nodes point at each
// other through `FormNodeRef` indices so recursive and shared type graphs
// need no special casing.
use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;

use crate::diagnostics::Diagnostic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormNodeRef(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    UInt,
    Int,
    Float,
    String,
    Bool,
}

/// Inclusive bounds. `non_zero` marks the `NonZero*` family, whose valid
/// range has a hole rather than a different edge.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Constraints {
    pub min: Option<i128>,
    pub max: Option<i128>,
    pub non_zero: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormNode {
    Leaf { primitive: Primitive, constraints: Constraints },
    /// Empty `fields` is a marker type.
    Struct { fields: Vec<(String, FormNodeRef)> },
    /// `None` payload = unit variant.
    Enum { variants: Vec<(String, Option<FormNodeRef>)>, is_option: bool },
    Alias { inner: FormNodeRef },
    /// Serialized as a flat array even though the schema describes a struct.
    /// `axis_fields` are dotted paths (`x`, `x_axis.y`, `translation.z`).
    VectorOverride {
        type_path: String,
        axis_fields: Vec<String>,
        element: Primitive,
        constraints: Constraints,
    },
}

/// Arena slot. `Pending` covers the window between reserving a named node
/// and filling it in, which is when cyclic references get handed out.
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    Pending,
    Ready(FormNode),
    Abandoned,
}

/// All compiled forms of one schema load.
#[derive(Debug, Clone, Default)]
pub struct FormRegistry {
    pub(crate) slots: Vec<Slot>,
    pub(crate) names: IndexMap<String, FormNodeRef>,
    pub(crate) diagnostics: Vec<Diagnostic>,
    /// Types that already failed, so each failure is diagnosed once.
    pub(crate) failed: HashSet<String>,
}

impl Constraints {
    pub const NONE: Self = Self { min: None, max: None, non_zero: false };

    pub fn range(min: i128, max: i128) -> Self {
        Self { min: Some(min), max: Some(max), non_zero: false }
    }

    pub fn at_least(min: i128) -> Self {
        Self { min: Some(min), max: None, non_zero: false }
    }

    pub fn admits(&self, n: i128) -> bool {
        self.min.is_none_or(|min| n >= min)
            && self.max.is_none_or(|max| n <= max)
            && !(self.non_zero && n == 0)
    }

    /// Smallest admissible value nearest to zero, used for default fill.
    pub fn default_integer(&self) -> i128 {
        let mut n = 0;
        if let Some(min) = self.min {
            n = n.max(min);
        }
        if let Some(max) = self.max {
            n = n.min(max);
        }
        if self.non_zero && n == 0 {
            n = if self.max.is_some_and(|max| max < 1) { -1 } else { 1 };
        }
        n
    }
}

impl fmt::Display for Constraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (Some(min), Some(max)) => write!(f, "{min}..={max}")?,
            (Some(min), None) => write!(f, "{min}..")?,
            (None, Some(max)) => write!(f, "..={max}")?,
            (None, None) => f.write_str("..")?,
        }
        if self.non_zero {
            f.write_str(" excluding 0")?;
        }
        Ok(())
    }
}

impl FormNode {
    pub fn leaf(primitive: Primitive) -> Self {
        Self::Leaf { primitive, constraints: Constraints::NONE }
    }

    pub fn marker() -> Self {
        Self::Struct { fields: Vec::new() }
    }

    pub fn is_marker(&self) -> bool {
        matches!(self, Self::Struct { fields } if fields.is_empty())
    }

    pub fn variant(&self, name: &str) -> Option<Option<FormNodeRef>> {
        match self {
            Self::Enum { variants, .. } => {
                variants.iter().find(|(n, _)| n == name).map(|(_, payload)| *payload)
            }
            _ => None,
        }
    }
}

impl FormRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a handle. `None` only for nodes whose compilation was abandoned.
    pub fn node(&self, node: FormNodeRef) -> Option<&FormNode> {
        match self.slots.get(node.0)? {
            Slot::Ready(form) => Some(form),
            Slot::Pending | Slot::Abandoned => None,
        }
    }

    /// Look up a type by path; `#/$defs/` prefixes are accepted.
    pub fn lookup(&self, type_path: &str) -> Option<FormNodeRef> {
        self.names.get(crate::schema::strip_defs_prefix(type_path)).copied()
    }

    pub fn get(&self, type_path: &str) -> Option<&FormNode> {
        self.lookup(type_path).and_then(|r| self.node(r))
    }

    pub fn contains(&self, type_path: &str) -> bool {
        self.lookup(type_path).is_some()
    }

    /// Named types in registration order.
    pub fn type_paths(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Type path of a named node, or its handle for anonymous ones.
    pub fn describe(&self, node: FormNodeRef) -> String {
        self.names
            .iter()
            .find(|(_, handle)| **handle == node)
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| format!("{node:?}"))
    }

    // ---- arena plumbing used by the compiler ----

    pub(crate) fn push(&mut self, node: FormNode) -> FormNodeRef {
        self.slots.push(Slot::Ready(node));
        FormNodeRef(self.slots.len() - 1)
    }

    pub(crate) fn reserve(&mut self, type_path: &str) -> FormNodeRef {
        self.slots.push(Slot::Pending);
        let handle = FormNodeRef(self.slots.len() - 1);
        self.names.insert(type_path.to_string(), handle);
        handle
    }

    pub(crate) fn fill(&mut self, handle: FormNodeRef, node: FormNode) {
        self.slots[handle.0] = Slot::Ready(node);
    }

    pub(crate) fn abandon(&mut self, type_path: &str, handle: FormNodeRef) {
        self.slots[handle.0] = Slot::Abandoned;
        self.names.shift_remove(type_path);
    }

    pub(crate) fn register(&mut self, type_path: &str, node: FormNode) -> FormNodeRef {
        let handle = self.push(node);
        self.names.insert(type_path.to_string(), handle);
        handle
    }
}

// ------------------------------- Tests ------------------------------------ //
