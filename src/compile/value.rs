use crate::diagnostics::DiagnosticKind;
use crate::form::{Constraints, FormNode, Primitive};

/// How a `Value`-kind entry is represented.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueForm {
    Leaf(FormNode),
    /// Leaf plus a non-fatal diagnostic (unknown numeric sub-kind).
    Fallback(FormNode, DiagnosticKind),
    /// `core::time::Duration`: serialized as `{"secs": u64, "nanos": u32}`.
    Duration,
}

/// Types the registry reports as opaque `object` values but which serialize
/// as plain strings.
const STRING_WRAPPERS: &[&str] = &[
    "alloc::borrow::Cow<str>",
    "smol_str::SmolStr",
    "uuid::Uuid",
    "std::path::PathBuf",
    "bevy_platform::path::PathBuf",
];

pub const DURATION: &str = "core::time::Duration";
pub const NANOS_PER_SEC: i128 = 999_999_999;

pub fn classify(type_path: &str, type_tag: Option<&str>) -> Result<ValueForm, DiagnosticKind> {
    let Some(tag) = type_tag else {
        return Err(DiagnosticKind::MalformedEntry("`Value` entry without a `type` tag".into()));
    };
    match tag {
        "uint" | "int" => Ok(integer(type_path, tag)),
        "float" => Ok(ValueForm::Leaf(FormNode::leaf(Primitive::Float))),
        "string" => Ok(ValueForm::Leaf(FormNode::leaf(Primitive::String))),
        "boolean" => Ok(ValueForm::Leaf(FormNode::leaf(Primitive::Bool))),
        "object" => object(type_path),
        other => Err(DiagnosticKind::MalformedEntry(format!("unhandled `Value` type tag `{other}`"))),
    }
}

fn integer(type_path: &str, tag: &str) -> ValueForm {
    match integer_leaf(type_path) {
        Some(leaf) => ValueForm::Leaf(leaf),
        None => {
            let primitive = if tag == "uint" { Primitive::UInt } else { Primitive::Int };
            ValueForm::Fallback(
                FormNode::Leaf { primitive, constraints: Constraints::at_least(0) },
                DiagnosticKind::UnknownNumericKind { tag: tag.to_string() },
            )
        }
    }
}

/// Leaf for a primitive integer type name (`u8`, `i32`, …).
pub fn integer_leaf(name: &str) -> Option<FormNode> {
    let (primitive, constraints) = match name {
        "u8" => (Primitive::UInt, Constraints::range(0, u8::MAX.into())),
        "u16" => (Primitive::UInt, Constraints::range(0, u16::MAX.into())),
        "u32" => (Primitive::UInt, Constraints::range(0, u32::MAX.into())),
        "u64" | "usize" | "u128" => (Primitive::UInt, Constraints::at_least(0)),
        "i8" => (Primitive::Int, Constraints::range(i8::MIN.into(), i8::MAX.into())),
        "i16" => (Primitive::Int, Constraints::range(i16::MIN.into(), i16::MAX.into())),
        "i32" => (Primitive::Int, Constraints::range(i32::MIN.into(), i32::MAX.into())),
        "i64" | "isize" | "i128" => (Primitive::Int, Constraints::NONE),
        _ => return None,
    };
    Some(FormNode::Leaf { primitive, constraints })
}

fn object(type_path: &str) -> Result<ValueForm, DiagnosticKind> {
    if type_path == DURATION {
        return Ok(ValueForm::Duration);
    }
    if STRING_WRAPPERS.contains(&type_path) {
        return Ok(ValueForm::Leaf(FormNode::leaf(Primitive::String)));
    }
    if let Some(inner) = non_zero_inner(type_path) {
        if let Some(FormNode::Leaf { primitive, mut constraints }) = integer_leaf(&inner) {
            if primitive == Primitive::UInt {
                constraints.min = Some(1);
            } else {
                constraints.non_zero = true;
            }
            return Ok(ValueForm::Leaf(FormNode::Leaf { primitive, constraints }));
        }
    }
    Err(DiagnosticKind::UnsupportedValue)
}

/// `core::num::NonZeroU8` and `core::num::NonZero<u8>` both name `u8`.
fn non_zero_inner(type_path: &str) -> Option<String> {
    let name = type_path
        .strip_prefix("core::num::")
        .or_else(|| type_path.strip_prefix("std::num::"))?;
    if let Some(generic) = name.strip_prefix("NonZero<") {
        return generic.strip_suffix('>').map(str::to_string);
    }
    name.strip_prefix("NonZero").map(str::to_ascii_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraints_of(form: ValueForm) -> (Primitive, Constraints) {
        match form {
            ValueForm::Leaf(FormNode::Leaf { primitive, constraints }) => (primitive, constraints),
            other => panic!("expected leaf, got {other:?}"),
        }
    }

    #[test]
    fn integer_ranges() {
        let (p, c) = constraints_of(classify("u8", Some("uint")).unwrap());
        assert_eq!(p, Primitive::UInt);
        assert_eq!((c.min, c.max), (Some(0), Some(255)));

        let (p, c) = constraints_of(classify("i32", Some("int")).unwrap());
        assert_eq!(p, Primitive::Int);
        assert_eq!((c.min, c.max), (Some(i32::MIN as i128), Some(i32::MAX as i128)));

        let (_, c) = constraints_of(classify("i64", Some("int")).unwrap());
        assert_eq!(c, Constraints::NONE);
    }

    #[test]
    fn unknown_numeric_kind_falls_back() {
        match classify("u256", Some("uint")).unwrap() {
            ValueForm::Fallback(FormNode::Leaf { primitive, constraints }, DiagnosticKind::UnknownNumericKind { tag }) => {
                assert_eq!(primitive, Primitive::UInt);
                assert_eq!(constraints, Constraints::at_least(0));
                assert_eq!(tag, "uint");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn object_catalogue() {
        assert_eq!(classify(DURATION, Some("object")).unwrap(), ValueForm::Duration);
        let (p, _) = constraints_of(classify("uuid::Uuid", Some("object")).unwrap());
        assert_eq!(p, Primitive::String);

        let (p, c) = constraints_of(classify("core::num::NonZeroU8", Some("object")).unwrap());
        assert_eq!(p, Primitive::UInt);
        assert_eq!((c.min, c.max), (Some(1), Some(255)));

        let (p, c) = constraints_of(classify("core::num::NonZero<i16>", Some("object")).unwrap());
        assert_eq!(p, Primitive::Int);
        assert!(c.non_zero && !c.admits(0) && c.admits(-1));

        assert_eq!(
            classify("bevy_ecs::entity::Entity", Some("object")).unwrap_err(),
            DiagnosticKind::UnsupportedValue
        );
    }

    #[test]
    fn missing_tag_is_malformed() {
        assert!(matches!(classify("x", None), Err(DiagnosticKind::MalformedEntry(_))));
    }
}
