use serde_json::{Map, Value};

use super::{field_path, index_path, ROOT};
use crate::form::{FormNode, FormNodeRef, FormRegistry};
use crate::instance::{Instance, Scalar};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("{path}: instance is not shaped like a {expected}")]
    ShapeMismatch { path: String, expected: &'static str },
    #[error("{path}: `{variant}` is not a variant of this enum")]
    UnknownVariant { path: String, variant: String },
    #[error("{path}: form node {node:?} is not available in this registry")]
    DanglingReference { path: String, node: FormNodeRef },
    #[error("{path}: {value} has no JSON representation")]
    NonFinite { path: String, value: String },
}

/// Serialize `instance` in the wire format of `node`. Read-only.
pub fn extract(registry: &FormRegistry, instance: &Instance, node: FormNodeRef) -> Result<Value, ExtractError> {
    extract_at(registry, instance, node, ROOT)
}

fn extract_at(registry: &FormRegistry, instance: &Instance, node: FormNodeRef, path: &str) -> Result<Value, ExtractError> {
    let form = registry
        .node(node)
        .ok_or_else(|| ExtractError::DanglingReference { path: path.to_string(), node })?;
    let mismatch = |expected| ExtractError::ShapeMismatch { path: path.to_string(), expected };

    match (form, instance) {
        (FormNode::Leaf { primitive, .. }, Instance::Scalar(scalar)) if scalar.primitive() == *primitive => {
            finite(scalar, path)
        }
        (FormNode::Leaf { .. }, _) => Err(mismatch("scalar of the leaf's primitive")),

        (FormNode::VectorOverride { axis_fields, element, .. }, Instance::Vector(axes)) => {
            let mut out = Vec::with_capacity(axis_fields.len());
            for (i, axis) in axis_fields.iter().enumerate() {
                match axes.get(axis) {
                    Some(scalar) if scalar.primitive() == *element => out.push(finite(scalar, &index_path(path, i))?),
                    _ => {
                        return Err(ExtractError::ShapeMismatch { path: index_path(path, i), expected: "vector axis" });
                    }
                }
            }
            Ok(Value::Array(out))
        }
        (FormNode::VectorOverride { .. }, _) => Err(mismatch("vector")),

        (FormNode::Struct { fields }, Instance::Struct(values)) => {
            let mut out = Map::new();
            for (name, child) in fields {
                let field_at = field_path(path, name);
                let value = values
                    .get(name)
                    .ok_or_else(|| ExtractError::ShapeMismatch { path: field_at.clone(), expected: "struct field" })?;
                out.insert(name.clone(), extract_at(registry, value, *child, &field_at)?);
            }
            Ok(Value::Object(out))
        }
        (FormNode::Struct { .. }, _) => Err(mismatch("struct")),

        (FormNode::Alias { inner }, Instance::Alias(value)) => extract_at(registry, value, *inner, path),
        (FormNode::Alias { .. }, _) => Err(mismatch("single-element wrapper")),

        (FormNode::Enum { variants, is_option }, Instance::Enum { variant, payload }) => {
            let Some((_, child)) = variants.iter().find(|(name, _)| name == variant) else {
                return Err(ExtractError::UnknownVariant { path: path.to_string(), variant: variant.clone() });
            };
            match (child, payload) {
                (None, None) if *is_option => Ok(Value::Null),
                (None, None) => Ok(Value::String(variant.clone())),
                (Some(child), Some(payload)) if *is_option => extract_at(registry, payload, *child, path),
                (Some(child), Some(payload)) => {
                    let inner = extract_at(registry, payload, *child, &field_path(path, variant))?;
                    Ok(Value::Object(Map::from_iter([(variant.clone(), inner)])))
                }
                (None, Some(_)) => Err(mismatch("unit variant")),
                (Some(_), None) => Err(mismatch("variant with a payload")),
            }
        }
        (FormNode::Enum { .. }, _) => Err(mismatch("enum")),
    }
}

fn finite(scalar: &Scalar, path: &str) -> Result<Value, ExtractError> {
    match scalar {
        Scalar::Float(f) if !f.is_finite() => Err(ExtractError::NonFinite { path: path.to_string(), value: f.to_string() }),
        _ => Ok(scalar.to_json()),
    }
}

// ------------------------------- Tests ------------------------------------ //
