//! Editable values bound to compiled forms.
//!
//! An [`Instance`] has the same shape as the [`FormNode`] it was created
//! from. Instances are built eagerly and completely: every nested struct,
//! alias and selected enum payload exists from the moment the instance does,
//! so editors never observe a half-initialized value.
use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::Value;

use crate::form::{Constraints, FormNode, FormNodeRef, FormRegistry, Primitive};

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    UInt(u64),
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instance {
    Scalar(Scalar),
    /// Axis path (`x`, `x_axis.y`) → value, in serialization order.
    Vector(IndexMap<String, Scalar>),
    Struct(IndexMap<String, Instance>),
    Enum { variant: String, payload: Option<Box<Instance>> },
    Alias(Box<Instance>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstanceError {
    #[error("form node {0:?} is not available in this registry")]
    DanglingReference(FormNodeRef),
    #[error("`{0}` only refers to itself; no finite default exists")]
    Recursive(String),
    #[error("`{0}` has no variants to select")]
    NoVariants(String),
    #[error("`{type_path}` has no variant named `{variant}`")]
    UnknownVariant { type_path: String, variant: String },
    #[error("instance does not have the shape of `{0}`")]
    ShapeMismatch(String),
}

// ————————————————————————————————————————————————————————————————————————————
// SCALARS
// ————————————————————————————————————————————————————————————————————————————

impl Scalar {
    /// Zero value for a primitive, nudged into `constraints`.
    pub fn default_for(primitive: Primitive, constraints: &Constraints) -> Self {
        let n = constraints.default_integer();
        match primitive {
            Primitive::UInt => Self::UInt(u64::try_from(n).unwrap_or(0)),
            Primitive::Int => Self::Int(i64::try_from(n).unwrap_or(0)),
            Primitive::Float => Self::Float(0.0),
            Primitive::String => Self::String(String::new()),
            Primitive::Bool => Self::Bool(false),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::UInt(n) => Value::from(*n),
            Self::Int(n) => Value::from(*n),
            // serde_json maps non-finite floats to null
            Self::Float(f) => Value::from(*f),
            Self::String(s) => Value::from(s.as_str()),
            Self::Bool(b) => Value::from(*b),
        }
    }

    /// NaN and the infinities have no wire form.
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Float(f) => f.is_finite(),
            _ => true,
        }
    }

    pub fn primitive(&self) -> Primitive {
        match self {
            Self::UInt(_) => Primitive::UInt,
            Self::Int(_) => Primitive::Int,
            Self::Float(_) => Primitive::Float,
            Self::String(_) => Primitive::String,
            Self::Bool(_) => Primitive::Bool,
        }
    }
}

impl From<u64> for Scalar {
    fn from(n: u64) -> Self { Self::UInt(n) }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self { Self::Int(n) }
}

impl From<f64> for Scalar {
    fn from(f: f64) -> Self { Self::Float(f) }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self { Self::Bool(b) }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self { Self::String(s.to_string()) }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self { Self::String(s) }
}

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTION
// ————————————————————————————————————————————————————————————————————————————

impl Instance {
    /// Fully default-filled instance of `node`.
    ///
    /// Enums select their first variant whose payload has a finite default,
    /// so recursive types like `enum Tree { Node(Box<Tree>), Leaf }` still
    /// construct.
    pub fn default_for(registry: &FormRegistry, node: FormNodeRef) -> Result<Self, InstanceError> {
        DefaultFill { registry, visiting: HashSet::new() }.fill(node)
    }

    /// Default-filled instance of the type named `type_path`.
    pub fn default_for_type(registry: &FormRegistry, type_path: &str) -> Option<Result<Self, InstanceError>> {
        registry.lookup(type_path).map(|node| Self::default_for(registry, node))
    }
}

struct DefaultFill<'a> {
    registry: &'a FormRegistry,
    visiting: HashSet<FormNodeRef>,
}

impl DefaultFill<'_> {
    fn fill(&mut self, node: FormNodeRef) -> Result<Instance, InstanceError> {
        let form = self.registry.node(node).ok_or(InstanceError::DanglingReference(node))?;
        if !self.visiting.insert(node) {
            return Err(InstanceError::Recursive(self.registry.describe(node)));
        }
        let out = self.fill_form(node, form);
        self.visiting.remove(&node);
        out
    }

    fn fill_form(&mut self, node: FormNodeRef, form: &FormNode) -> Result<Instance, InstanceError> {
        match form {
            FormNode::Leaf { primitive, constraints } => {
                Ok(Instance::Scalar(Scalar::default_for(*primitive, constraints)))
            }
            FormNode::VectorOverride { axis_fields, element, constraints, .. } => Ok(Instance::Vector(
                axis_fields
                    .iter()
                    .map(|axis| (axis.clone(), Scalar::default_for(*element, constraints)))
                    .collect(),
            )),
            FormNode::Struct { fields } => {
                let mut values = IndexMap::with_capacity(fields.len());
                for (name, child) in fields {
                    values.insert(name.clone(), self.fill(*child)?);
                }
                Ok(Instance::Struct(values))
            }
            FormNode::Alias { inner } => Ok(Instance::Alias(Box::new(self.fill(*inner)?))),
            FormNode::Enum { variants, .. } => {
                let mut last_err = None;
                for (name, payload) in variants {
                    match payload {
                        None => return Ok(Instance::Enum { variant: name.clone(), payload: None }),
                        Some(child) => match self.fill(*child) {
                            Ok(value) => {
                                return Ok(Instance::Enum { variant: name.clone(), payload: Some(Box::new(value)) });
                            }
                            Err(err @ InstanceError::Recursive(_)) => last_err = Some(err),
                            Err(err) => return Err(err),
                        },
                    }
                }
                Err(last_err.unwrap_or_else(|| InstanceError::NoVariants(self.registry.describe(node))))
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// EDITING
// ————————————————————————————————————————————————————————————————————————————

impl Instance {
    pub fn scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            Self::Alias(inner) => inner.scalar(),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Instance> {
        match self {
            Self::Struct(fields) => fields.get(name),
            _ => None,
        }
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Instance> {
        match self {
            Self::Struct(fields) => fields.get_mut(name),
            _ => None,
        }
    }

    pub fn axis(&self, path: &str) -> Option<&Scalar> {
        match self {
            Self::Vector(axes) => axes.get(path),
            _ => None,
        }
    }

    /// Overwrite an existing axis. Returns `false`, leaving the axis as it
    /// was, if there is no such axis or `value` is not finite.
    pub fn set_axis(&mut self, path: &str, value: impl Into<Scalar>) -> bool {
        let value = value.into();
        if !value.is_finite() {
            return false;
        }
        match self {
            Self::Vector(axes) => match axes.get_mut(path) {
                Some(slot) => {
                    *slot = value;
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    /// Overwrite the scalar held by this instance (through aliases). Non-finite
    /// floats are refused.
    pub fn set_scalar(&mut self, value: impl Into<Scalar>) -> bool {
        let value = value.into();
        if !value.is_finite() {
            return false;
        }
        self.put_scalar(value)
    }

    fn put_scalar(&mut self, value: Scalar) -> bool {
        match self {
            Self::Scalar(slot) => {
                *slot = value;
                true
            }
            Self::Alias(inner) => inner.put_scalar(value),
            _ => false,
        }
    }

    pub fn variant(&self) -> Option<&str> {
        match self {
            Self::Enum { variant, .. } => Some(variant),
            _ => None,
        }
    }

    pub fn payload(&self) -> Option<&Instance> {
        match self {
            Self::Enum { payload, .. } => payload.as_deref(),
            _ => None,
        }
    }

    pub fn payload_mut(&mut self) -> Option<&mut Instance> {
        match self {
            Self::Enum { payload, .. } => payload.as_deref_mut(),
            _ => None,
        }
    }

    /// Switch an enum instance to `variant`. Re-selecting the current variant
    /// keeps its payload; any other choice starts from a fresh default.
    pub fn select_variant(&mut self, registry: &FormRegistry, node: FormNodeRef, variant: &str) -> Result<(), InstanceError> {
        let form = registry.node(node).ok_or(InstanceError::DanglingReference(node))?;
        let FormNode::Enum { variants, .. } = form else {
            return Err(InstanceError::ShapeMismatch(registry.describe(node)));
        };
        let Self::Enum { variant: current, payload } = self else {
            return Err(InstanceError::ShapeMismatch(registry.describe(node)));
        };
        if current.as_str() == variant {
            return Ok(());
        }
        let Some((_, child)) = variants.iter().find(|(name, _)| name == variant) else {
            return Err(InstanceError::UnknownVariant { type_path: registry.describe(node), variant: variant.to_string() });
        };
        *payload = match child {
            Some(child) => Some(Box::new(Instance::default_for(registry, *child)?)),
            None => None,
        };
        *current = variant.to_string();
        Ok(())
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(registry: &mut FormRegistry, name: &str, primitive: Primitive, constraints: Constraints) -> FormNodeRef {
        registry.register(name, FormNode::Leaf { primitive, constraints })
    }

    #[test]
    fn struct_defaults_are_eager_and_constrained() {
        let mut reg = FormRegistry::new();
        let name = leaf(&mut reg, "alloc::string::String", Primitive::String, Constraints::NONE);
        let small = leaf(&mut reg, "core::num::NonZeroU8", Primitive::UInt, Constraints { min: Some(1), max: Some(255), non_zero: false });
        let flag = leaf(&mut reg, "bool", Primitive::Bool, Constraints::NONE);
        let player = reg.register(
            "a::Player",
            FormNode::Struct { fields: vec![("name".into(), name), ("small".into(), small), ("flag".into(), flag)] },
        );
        let inst = Instance::default_for(&reg, player).unwrap();
        assert_eq!(inst.field("name").unwrap().scalar(), Some(&Scalar::String(String::new())));
        assert_eq!(inst.field("small").unwrap().scalar(), Some(&Scalar::UInt(1)));
        assert_eq!(inst.field("flag").unwrap().scalar(), Some(&Scalar::Bool(false)));
    }

    #[test]
    fn recursive_enum_picks_a_terminating_variant() {
        let mut reg = FormRegistry::new();
        let tree = reg.reserve("a::Tree");
        let node = reg.register("a::Tree::Node", FormNode::Alias { inner: tree });
        reg.fill(tree, FormNode::Enum {
            variants: vec![("Node".into(), Some(node)), ("Leaf".into(), None)],
            is_option: false,
        });
        let inst = Instance::default_for(&reg, tree).unwrap();
        assert_eq!(inst.variant(), Some("Leaf"));
    }

    #[test]
    fn purely_recursive_struct_has_no_default() {
        let mut reg = FormRegistry::new();
        let a = reg.reserve("a::Loop");
        reg.fill(a, FormNode::Struct { fields: vec![("me".into(), a)] });
        assert_eq!(Instance::default_for(&reg, a), Err(InstanceError::Recursive("a::Loop".into())));
    }

    #[test]
    fn shared_children_are_not_mistaken_for_cycles() {
        let mut reg = FormRegistry::new();
        let f = leaf(&mut reg, "f32", Primitive::Float, Constraints::NONE);
        let pair = reg.register("a::Pair", FormNode::Struct { fields: vec![("a".into(), f), ("b".into(), f)] });
        assert!(Instance::default_for(&reg, pair).is_ok());
    }

    #[test]
    fn select_variant_default_fills_payload() {
        let mut reg = FormRegistry::new();
        let i = leaf(&mut reg, "i32", Primitive::Int, Constraints::range(i32::MIN.into(), i32::MAX.into()));
        let low = reg.register("a::E::Low", FormNode::Alias { inner: i });
        let e = reg.register("a::E", FormNode::Enum {
            variants: vec![("Off".into(), None), ("Low".into(), Some(low))],
            is_option: false,
        });
        let mut inst = Instance::default_for(&reg, e).unwrap();
        assert_eq!(inst.variant(), Some("Off"));
        inst.select_variant(&reg, e, "Low").unwrap();
        assert_eq!(inst.payload().unwrap().scalar(), Some(&Scalar::Int(0)));
        assert!(inst.payload_mut().unwrap().set_scalar(-4i64));
        inst.select_variant(&reg, e, "Low").unwrap();
        assert_eq!(inst.payload().unwrap().scalar(), Some(&Scalar::Int(-4)));
        assert!(matches!(inst.select_variant(&reg, e, "High"), Err(InstanceError::UnknownVariant { .. })));
    }

    #[test]
    fn vector_axes_are_editable() {
        let mut reg = FormRegistry::new();
        let v = reg.register("glam::Vec2", crate::compile::overrides::vector_override("glam::Vec2").unwrap());
        let mut inst = Instance::default_for(&reg, v).unwrap();
        assert!(inst.set_axis("y", 2.5));
        assert!(!inst.set_axis("z", 1.0));
        assert_eq!(inst.axis("y"), Some(&Scalar::Float(2.5)));
        assert_eq!(inst.axis("x"), Some(&Scalar::Float(0.0)));
    }

    #[test]
    fn non_finite_floats_are_refused() {
        let mut reg = FormRegistry::new();
        let f = leaf(&mut reg, "f32", Primitive::Float, Constraints::default());
        let mut inst = Instance::default_for(&reg, f).unwrap();
        assert!(inst.set_scalar(1.5));
        assert!(!inst.set_scalar(f64::NAN));
        assert!(!inst.set_scalar(f64::NEG_INFINITY));
        assert_eq!(inst.scalar(), Some(&Scalar::Float(1.5)));

        let v = reg.register("glam::Vec2", crate::compile::overrides::vector_override("glam::Vec2").unwrap());
        let mut inst = Instance::default_for(&reg, v).unwrap();
        assert!(!inst.set_axis("x", f64::INFINITY));
        assert_eq!(inst.axis("x"), Some(&Scalar::Float(0.0)));
    }
}
