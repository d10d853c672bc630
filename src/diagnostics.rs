//! Non-fatal compile diagnostics.
//!
//! A diagnostic never stops the pass: the offending type, field or variant is
//! left out of the registry and everything else keeps compiling.
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiagnosticKind {
    #[error("`{0}` kind has no form representation")]
    UnsupportedKind(String),
    #[error("{kind} with {arity} elements is not supported (only single-element wrappers are)")]
    UnsupportedTupleArity { kind: String, arity: usize },
    #[error("`object` value type has no known representation")]
    UnsupportedValue,
    #[error("unknown `{tag}` sub-kind; treating as an unbounded non-negative integer")]
    UnknownNumericKind { tag: String },
    #[error("malformed entry: {0}")]
    MalformedEntry(String),
    #[error("reference to `{0}`, which the document does not declare")]
    UnknownReference(String),
    #[error("reference to `{0}`, which could not be compiled")]
    UnavailableReference(String),
}

/// A diagnostic plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub type_path: String,
    /// Field or variant name when the diagnostic only drops part of a type.
    pub member: Option<String>,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(type_path: impl Into<String>, kind: DiagnosticKind) -> Self {
        Self { type_path: type_path.into(), member: None, kind }
    }

    pub fn for_member(type_path: impl Into<String>, member: impl Into<String>, kind: DiagnosticKind) -> Self {
        Self { type_path: type_path.into(), member: Some(member.into()), kind }
    }

    /// Whether the named type (not just one of its members) is missing from
    /// the registry because of this diagnostic.
    pub fn omits_type(&self) -> bool {
        self.member.is_none() && !matches!(self.kind, DiagnosticKind::UnknownNumericKind { .. })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.member {
            Some(member) => write!(f, "{}.{member}: {}", self.type_path, self.kind),
            None => write!(f, "{}: {}", self.type_path, self.kind),
        }
    }
}
