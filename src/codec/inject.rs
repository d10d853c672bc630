//! Wire JSON → instance.
//!
//! Injection never fails as a whole. Each value that cannot be taken is
//! recorded as an [`InjectIssue`] and skipped, leaving whatever the instance
//! held before in its place. Callers that want all-or-nothing semantics use
//! [`inject_strict`].
use serde_json::{Map, Value};
use tracing::debug;

use super::{field_path, index_path, json_kind, ROOT};
use crate::form::{Constraints, FormNode, FormNodeRef, FormRegistry, Primitive};
use crate::instance::{Instance, InstanceError, Scalar};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InjectIssueKind {
    #[error("expected {expected}, found {found}")]
    ShapeMismatch { expected: &'static str, found: &'static str },
    #[error("{value} is outside {allowed}")]
    OutOfRange { value: i128, allowed: Constraints },
    #[error("`{0}` is not a variant of this enum")]
    UnknownVariant(String),
    #[error("`{0}` carries data and cannot be given as a bare name")]
    NotUnitVariant(String),
    #[error("expected {expected} elements, found {found}")]
    LengthMismatch { expected: usize, found: usize },
    #[error("field `{0}` is missing; previous value kept")]
    MissingField(String),
    #[error("field `{0}` is not part of this type")]
    UnexpectedField(String),
    #[error("form node {0:?} is not available in this registry")]
    DanglingReference(FormNodeRef),
    #[error("could not construct a default: {0}")]
    NoDefault(InstanceError),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{path}: {kind}")]
pub struct InjectIssue {
    pub path: String,
    pub kind: InjectIssueKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InjectReport {
    pub issues: Vec<InjectIssue>,
}

impl InjectReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues other than [`InjectIssueKind::MissingField`], which only means
    /// the source document was written against an older schema.
    pub fn rejections(&self) -> impl Iterator<Item = &InjectIssue> {
        self.issues.iter().filter(|issue| !matches!(issue.kind, InjectIssueKind::MissingField(_)))
    }
}

/// Write `value` into `instance` following the wire shape of `node`.
pub fn inject(registry: &FormRegistry, instance: &mut Instance, node: FormNodeRef, value: &Value) -> InjectReport {
    let mut injector = Injector { registry, issues: Vec::new() };
    injector.inject(instance, node, value, ROOT);
    InjectReport { issues: injector.issues }
}

/// Like [`inject`], but `instance` is only modified when every value was
/// accepted. The first issue is returned otherwise.
pub fn inject_strict(registry: &FormRegistry, instance: &mut Instance, node: FormNodeRef, value: &Value) -> Result<(), InjectIssue> {
    let mut staged = instance.clone();
    let report = inject(registry, &mut staged, node, value);
    match report.issues.into_iter().next() {
        Some(issue) => Err(issue),
        None => {
            *instance = staged;
            Ok(())
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

struct Injector<'a> {
    registry: &'a FormRegistry,
    issues: Vec<InjectIssue>,
}

impl Injector<'_> {
    fn issue(&mut self, path: &str, kind: InjectIssueKind) {
        debug!(path, %kind, "rejected value");
        self.issues.push(InjectIssue { path: path.to_string(), kind });
    }

    fn mismatch(&mut self, path: &str, expected: &'static str, value: &Value) {
        self.issue(path, InjectIssueKind::ShapeMismatch { expected, found: json_kind(value) });
    }

    fn inject(&mut self, instance: &mut Instance, node: FormNodeRef, value: &Value, path: &str) {
        let registry = self.registry;
        let Some(form) = registry.node(node) else {
            self.issue(path, InjectIssueKind::DanglingReference(node));
            return;
        };
        if !shape_matches(form, instance) {
            match Instance::default_for(registry, node) {
                Ok(fresh) => *instance = fresh,
                Err(err) => {
                    self.issue(path, InjectIssueKind::NoDefault(err));
                    return;
                }
            }
        }

        match form {
            FormNode::Leaf { primitive, constraints } => match scalar_from_json(*primitive, constraints, value) {
                Ok(scalar) => {
                    instance.set_scalar(scalar);
                }
                Err(kind) => self.issue(path, kind),
            },
            FormNode::VectorOverride { axis_fields, element, constraints, .. } => {
                self.inject_vector(instance, axis_fields, *element, constraints, value, path)
            }
            FormNode::Struct { fields } => self.inject_struct(instance, fields, value, path),
            FormNode::Alias { inner } => {
                if let Instance::Alias(wrapped) = instance {
                    self.inject(wrapped, *inner, value, path);
                }
            }
            FormNode::Enum { variants, is_option: true } => self.inject_option(instance, variants, value, path),
            FormNode::Enum { variants, is_option: false } => self.inject_enum(instance, variants, value, path),
        }
    }

    fn inject_vector(
        &mut self,
        instance: &mut Instance,
        axis_fields: &[String],
        element: Primitive,
        constraints: &Constraints,
        value: &Value,
        path: &str,
    ) {
        let Value::Array(items) = value else {
            return self.mismatch(path, "array", value);
        };
        if items.len() != axis_fields.len() {
            return self.issue(path, InjectIssueKind::LengthMismatch { expected: axis_fields.len(), found: items.len() });
        }
        for (i, (axis, item)) in axis_fields.iter().zip(items).enumerate() {
            match scalar_from_json(element, constraints, item) {
                Ok(scalar) => {
                    instance.set_axis(axis, scalar);
                }
                Err(kind) => self.issue(&index_path(path, i), kind),
            }
        }
    }

    fn inject_struct(&mut self, instance: &mut Instance, fields: &[(String, FormNodeRef)], value: &Value, path: &str) {
        let Value::Object(object) = value else {
            return self.mismatch(path, "object", value);
        };
        let Instance::Struct(values) = instance else { return };
        for (name, child) in fields {
            let field_at = field_path(path, name);
            let Some(field_value) = object.get(name) else {
                self.issue(&field_at, InjectIssueKind::MissingField(name.clone()));
                continue;
            };
            if let Some(slot) = values.get_mut(name) {
                self.inject(slot, *child, field_value, &field_at);
                continue;
            }
            match Instance::default_for(self.registry, *child) {
                Ok(mut fresh) => {
                    self.inject(&mut fresh, *child, field_value, &field_at);
                    values.insert(name.clone(), fresh);
                }
                Err(err) => self.issue(&field_at, InjectIssueKind::NoDefault(err)),
            }
        }
        for key in object.keys() {
            if !fields.iter().any(|(name, _)| name == key) {
                self.issue(&field_path(path, key), InjectIssueKind::UnexpectedField(key.clone()));
            }
        }
    }

    /// `null` is `None`; anything else is the `Some` payload itself.
    fn inject_option(&mut self, instance: &mut Instance, variants: &[(String, Option<FormNodeRef>)], value: &Value, path: &str) {
        let target = if value.is_null() { "None" } else { "Some" };
        let Some((name, child)) = variants.iter().find(|(name, _)| name == target) else {
            return self.issue(path, InjectIssueKind::UnknownVariant(target.to_string()));
        };
        if !self.switch_variant(instance, name, *child, path) {
            return;
        }
        if let (Some(child), Some(payload)) = (child, instance.payload_mut()) {
            self.inject(payload, *child, value, path);
        }
    }

    fn inject_enum(&mut self, instance: &mut Instance, variants: &[(String, Option<FormNodeRef>)], value: &Value, path: &str) {
        match value {
            Value::String(name) => match variants.iter().find(|(n, _)| n == name) {
                None => self.issue(path, InjectIssueKind::UnknownVariant(name.clone())),
                Some((_, Some(_))) => self.issue(path, InjectIssueKind::NotUnitVariant(name.clone())),
                Some((name, None)) => {
                    self.switch_variant(instance, name, None, path);
                }
            },
            Value::Object(object) => {
                let Some((name, inner)) = single_entry(object) else {
                    return self.mismatch(path, "object with exactly one variant key", value);
                };
                let at = field_path(path, name);
                match variants.iter().find(|(n, _)| n == name) {
                    None => self.issue(path, InjectIssueKind::UnknownVariant(name.clone())),
                    Some((_, None)) => self.mismatch(&at, "no payload for a unit variant", inner),
                    Some((name, Some(child))) => {
                        if self.switch_variant(instance, name, Some(*child), path) {
                            if let Some(payload) = instance.payload_mut() {
                                self.inject(payload, *child, inner, &at);
                            }
                        }
                    }
                }
            }
            _ => self.mismatch(path, "variant name or single-key object", value),
        }
    }

    /// Select `name`, default-filling its payload unless it is already the
    /// selected variant. Returns `false` if the payload could not be built.
    fn switch_variant(&mut self, instance: &mut Instance, name: &str, child: Option<FormNodeRef>, path: &str) -> bool {
        let Instance::Enum { variant, payload } = instance else { return false };
        if variant.as_str() == name {
            return true;
        }
        let fresh = match child {
            None => None,
            Some(child) => match Instance::default_for(self.registry, child) {
                Ok(value) => Some(Box::new(value)),
                Err(err) => {
                    self.issue(path, InjectIssueKind::NoDefault(err));
                    return false;
                }
            },
        };
        *variant = name.to_string();
        *payload = fresh;
        true
    }
}

fn single_entry(object: &Map<String, Value>) -> Option<(&String, &Value)> {
    let mut entries = object.iter();
    match (entries.next(), entries.next()) {
        (Some(entry), None) => Some(entry),
        _ => None,
    }
}

/// Top-level shape check only; children are checked as injection reaches them.
fn shape_matches(form: &FormNode, instance: &Instance) -> bool {
    matches!(
        (form, instance),
        (FormNode::Leaf { .. }, Instance::Scalar(_))
            | (FormNode::VectorOverride { .. }, Instance::Vector(_))
            | (FormNode::Struct { .. }, Instance::Struct(_))
            | (FormNode::Alias { .. }, Instance::Alias(_))
            | (FormNode::Enum { .. }, Instance::Enum { .. })
    )
}

fn scalar_from_json(primitive: Primitive, constraints: &Constraints, value: &Value) -> Result<Scalar, InjectIssueKind> {
    let mismatch = |expected| InjectIssueKind::ShapeMismatch { expected, found: json_kind(value) };
    match primitive {
        Primitive::UInt | Primitive::Int => {
            let n = integer_of(value).ok_or_else(|| mismatch("integer"))?;
            if !constraints.admits(n) {
                return Err(InjectIssueKind::OutOfRange { value: n, allowed: *constraints });
            }
            let out_of_range = || InjectIssueKind::OutOfRange { value: n, allowed: *constraints };
            Ok(match primitive {
                Primitive::UInt => Scalar::UInt(u64::try_from(n).map_err(|_| out_of_range())?),
                _ => Scalar::Int(i64::try_from(n).map_err(|_| out_of_range())?),
            })
        }
        Primitive::Float => value.as_f64().map(Scalar::Float).ok_or_else(|| mismatch("number")),
        Primitive::String => value.as_str().map(Scalar::from).ok_or_else(|| mismatch("string")),
        Primitive::Bool => value.as_bool().map(Scalar::Bool).ok_or_else(|| mismatch("boolean")),
    }
}

fn integer_of(value: &Value) -> Option<i128> {
    let Value::Number(n) = value else { return None };
    n.as_u64().map(i128::from).or_else(|| n.as_i64().map(i128::from))
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::extract;
    use crate::compile::overrides::vector_override;
    use serde_json::json;

    struct Fixture {
        reg: FormRegistry,
        player: FormNodeRef,
        motion: FormNodeRef,
        health: FormNodeRef,
        position: FormNodeRef,
    }

    fn fixture() -> Fixture {
        let mut reg = FormRegistry::new();
        let s = reg.register("alloc::string::String", FormNode::leaf(Primitive::String));
        let f = reg.register("f32", FormNode::leaf(Primitive::Float));
        let u8_ = reg.register("u8", FormNode::Leaf { primitive: Primitive::UInt, constraints: Constraints::range(0, 255) });
        let level = reg.register("a::Level", FormNode::Alias { inner: u8_ });
        let some = reg.register("core::option::Option<a::Level>::Some", FormNode::Alias { inner: level });
        let health = reg.register(
            "core::option::Option<a::Level>",
            FormNode::Enum { variants: vec![("None".into(), None), ("Some".into(), Some(some))], is_option: true },
        );
        let rotate = reg.register("a::Motion::Rotate", FormNode::Struct { fields: vec![("speed".into(), f)] });
        let motion = reg.register(
            "a::Motion",
            FormNode::Enum { variants: vec![("Idle".into(), None), ("Rotate".into(), Some(rotate))], is_option: false },
        );
        let position = reg.register("glam::Vec3", vector_override("glam::Vec3").unwrap());
        let player = reg.register(
            "a::Player",
            FormNode::Struct {
                fields: vec![
                    ("name".into(), s),
                    ("health".into(), health),
                    ("motion".into(), motion),
                    ("position".into(), position),
                ],
            },
        );
        Fixture { reg, player, motion, health, position }
    }

    #[test]
    fn injected_documents_extract_unchanged() {
        let fx = fixture();
        let doc = json!({
            "name": "Ferris",
            "health": 7,
            "motion": {"Rotate": {"speed": 1.5}},
            "position": [4.0, 5.0, 6.0]
        });
        let mut inst = Instance::default_for(&fx.reg, fx.player).unwrap();
        let report = inject(&fx.reg, &mut inst, fx.player, &doc);
        assert!(report.is_clean(), "{:?}", report.issues);
        assert_eq!(extract(&fx.reg, &inst, fx.player).unwrap(), doc);
    }

    #[test]
    fn extract_then_inject_changes_nothing() {
        let fx = fixture();
        let mut inst = Instance::default_for(&fx.reg, fx.player).unwrap();
        inject(&fx.reg, &mut inst, fx.player, &json!({"name": "x", "health": null, "motion": "Idle", "position": [1, 2, 3]}));
        let before = inst.clone();
        let wire = extract(&fx.reg, &inst, fx.player).unwrap();
        assert!(inject(&fx.reg, &mut inst, fx.player, &wire).is_clean());
        assert_eq!(inst, before);
        assert_eq!(extract(&fx.reg, &inst, fx.player).unwrap(), wire);
    }

    #[test]
    fn option_accepts_null_and_bare_values() {
        let fx = fixture();
        let mut inst = Instance::default_for(&fx.reg, fx.health).unwrap();
        assert!(inject(&fx.reg, &mut inst, fx.health, &json!(5)).is_clean());
        assert_eq!(inst.variant(), Some("Some"));
        assert_eq!(extract(&fx.reg, &inst, fx.health).unwrap(), json!(5));
        assert!(inject(&fx.reg, &mut inst, fx.health, &Value::Null).is_clean());
        assert_eq!(inst.variant(), Some("None"));
    }

    #[test]
    fn enum_rules() {
        let fx = fixture();
        let mut inst = Instance::default_for(&fx.reg, fx.motion).unwrap();

        let report = inject(&fx.reg, &mut inst, fx.motion, &json!("Rotate"));
        assert_eq!(report.issues[0].kind, InjectIssueKind::NotUnitVariant("Rotate".into()));

        let report = inject(&fx.reg, &mut inst, fx.motion, &json!("Fly"));
        assert_eq!(report.issues[0].kind, InjectIssueKind::UnknownVariant("Fly".into()));

        let report = inject(&fx.reg, &mut inst, fx.motion, &json!({"Rotate": {}, "Idle": null}));
        assert!(matches!(report.issues[0].kind, InjectIssueKind::ShapeMismatch { .. }));
        assert_eq!(inst.variant(), Some("Idle"));

        // switching default-fills the payload before applying what was given
        let report = inject(&fx.reg, &mut inst, fx.motion, &json!({"Rotate": {}}));
        assert_eq!(report.issues, [InjectIssue { path: "$.Rotate.speed".into(), kind: InjectIssueKind::MissingField("speed".into()) }]);
        assert_eq!(extract(&fx.reg, &inst, fx.motion).unwrap(), json!({"Rotate": {"speed": 0.0}}));
    }

    #[test]
    fn bad_values_are_skipped_individually() {
        let fx = fixture();
        let mut inst = Instance::default_for(&fx.reg, fx.player).unwrap();
        let report = inject(
            &fx.reg,
            &mut inst,
            fx.player,
            &json!({"name": 3, "health": 300, "motion": "Idle", "position": [1.0, "two", 3.0], "score": 9}),
        );
        let found: Vec<_> = report.issues.iter().map(|i| (i.path.as_str(), &i.kind)).collect();
        assert_eq!(
            found,
            [
                ("$.name", &InjectIssueKind::ShapeMismatch { expected: "string", found: "integer" }),
                ("$.health", &InjectIssueKind::OutOfRange { value: 300, allowed: Constraints::range(0, 255) }),
                ("$.position[1]", &InjectIssueKind::ShapeMismatch { expected: "number", found: "string" }),
                ("$.score", &InjectIssueKind::UnexpectedField("score".into())),
            ]
        );
        assert_eq!(
            extract(&fx.reg, &inst, fx.player).unwrap(),
            json!({"name": "", "health": 0, "motion": "Idle", "position": [1.0, 0.0, 3.0]})
        );
    }

    #[test]
    fn vector_length_must_match() {
        let fx = fixture();
        let mut inst = Instance::default_for(&fx.reg, fx.position).unwrap();
        let report = inject(&fx.reg, &mut inst, fx.position, &json!([1.0, 2.0]));
        assert_eq!(report.issues[0].kind, InjectIssueKind::LengthMismatch { expected: 3, found: 2 });
        assert_eq!(extract(&fx.reg, &inst, fx.position).unwrap(), json!([0.0, 0.0, 0.0]));
    }

    #[test]
    fn missing_fields_keep_prior_values() {
        let fx = fixture();
        let mut inst = Instance::default_for(&fx.reg, fx.player).unwrap();
        inject(&fx.reg, &mut inst, fx.player, &json!({"name": "kept", "health": 1, "motion": "Idle", "position": [0, 0, 0]}));
        let report = inject(&fx.reg, &mut inst, fx.player, &json!({"health": 2, "motion": "Idle", "position": [0, 0, 0]}));
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.rejections().count(), 0);
        assert_eq!(inst.field("name").unwrap().scalar(), Some(&Scalar::String("kept".into())));
    }

    #[test]
    fn strict_injection_is_all_or_nothing() {
        let fx = fixture();
        let mut inst = Instance::default_for(&fx.reg, fx.player).unwrap();
        let before = inst.clone();
        let err = inject_strict(&fx.reg, &mut inst, fx.player, &json!({"name": "x", "health": -1, "motion": "Idle", "position": [0, 0, 0]}))
            .unwrap_err();
        assert_eq!(err.to_string(), "$.health: -1 is outside 0..=255");
        assert_eq!(inst, before);

        inject_strict(&fx.reg, &mut inst, fx.player, &json!({"name": "x", "health": 1, "motion": "Idle", "position": [0, 0, 0]}))
            .unwrap();
        assert_eq!(inst.field("name").unwrap().scalar(), Some(&Scalar::String("x".into())));
    }

    #[test]
    fn mis_shaped_instances_are_rebuilt() {
        let fx = fixture();
        let mut inst = Instance::Scalar(Scalar::Bool(true));
        let report = inject(&fx.reg, &mut inst, fx.motion, &json!("Idle"));
        assert!(report.is_clean());
        assert_eq!(inst.variant(), Some("Idle"));
    }
}
