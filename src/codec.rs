//! Instance ⇄ wire JSON.
//!
//! Both directions recurse on the [`FormNode`](crate::form::FormNode) rather
//! than on the instance, so the node always decides the wire shape. Error and
//! issue locations use JSONPath-style strings rooted at `$`.
pub mod extract;
pub mod inject;

pub use extract::{extract, ExtractError};
pub use inject::{inject, inject_strict, InjectIssue, InjectIssueKind, InjectReport};

use serde_json::Value;

pub(crate) const ROOT: &str = "$";

pub(crate) fn field_path(parent: &str, key: &str) -> String {
    format!("{parent}.{key}")
}

pub(crate) fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

/// Short name of a JSON value's type, for messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
