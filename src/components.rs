//! Components: the registry entries a scene object can carry, and the set
//! actually attached to one object.
//!
//! Component data travels as glTF extras: a list of single-key objects,
//! `[{"<type path>": <wire value>}, …]`, usually stored under the `skein`
//! key of the extras object.
use indexmap::map::Entry;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::codec::{extract, inject, json_kind, ExtractError, InjectIssue, InjectIssueKind, InjectReport, ROOT};
use crate::form::FormRegistry;
use crate::identity::stable_key;
use crate::instance::{Instance, InstanceError};
use crate::presets::Presets;
use crate::schema::SchemaDocument;

/// Key of the extras object that holds the component list.
pub const EXTRAS_KEY: &str = "skein";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentInfo {
    pub type_path: String,
    pub short_path: Option<String>,
    pub storage_key: String,
    /// Whether the type made it into the registry; components that did not
    /// compile can be listed but not edited.
    pub compiled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ComponentCatalogue {
    components: Vec<ComponentInfo>,
}

#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    #[error("`{0}` is not a compiled type")]
    UnknownType(String),
    #[error("`{0}` is already attached")]
    AlreadyPresent(String),
    #[error("`{0}` is not attached")]
    NotPresent(String),
    #[error("`{type_path}` has no preset named `{preset}`")]
    UnknownPreset { type_path: String, preset: String },
    #[error("malformed extras at {path}: expected {expected}, found {found}")]
    MalformedExtras { path: String, expected: &'static str, found: &'static str },
    #[error(transparent)]
    Instance(#[from] InstanceError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// Inject issues of one component.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentReport {
    pub type_path: String,
    pub report: InjectReport,
}

/// The components attached to one scene object, in attachment order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentSet {
    components: IndexMap<String, Instance>,
    /// Entries whose type path is not in the registry, kept verbatim.
    pub unrecognized_components: IndexMap<String, Value>,
}

// ————————————————————————————————————————————————————————————————————————————
// CATALOGUE
// ————————————————————————————————————————————————————————————————————————————

impl ComponentCatalogue {
    pub fn from_document(doc: &SchemaDocument, registry: &FormRegistry) -> Self {
        let components = doc
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_component())
            .map(|(type_path, entry)| ComponentInfo {
                type_path: type_path.clone(),
                short_path: entry.short_path.clone(),
                storage_key: stable_key(type_path),
                compiled: registry.contains(type_path),
            })
            .collect();
        Self { components }
    }

    /// Keep only components from the named crates. An empty list keeps all.
    pub fn retain_crates(&mut self, safelist: &[String]) {
        if safelist.is_empty() {
            return;
        }
        self.components.retain(|info| {
            let crate_name = info.type_path.split("::").next().unwrap_or_default();
            safelist.iter().any(|allowed| allowed == crate_name)
        });
    }

    pub fn get(&self, type_path: &str) -> Option<&ComponentInfo> {
        self.components.iter().find(|info| info.type_path == type_path)
    }

    pub fn by_storage_key(&self, storage_key: &str) -> Option<&ComponentInfo> {
        self.components.iter().find(|info| info.storage_key == storage_key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.components.iter()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// COMPONENT SETS
// ————————————————————————————————————————————————————————————————————————————

impl ComponentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `type_path` with its default value: the application's
    /// `"default"` preset when `presets` has one, the form's zero value
    /// otherwise.
    pub fn insert_default(&mut self, registry: &FormRegistry, presets: &Presets, type_path: &str) -> Result<InjectReport, ComponentError> {
        self.attach(registry, type_path, presets.default_value(type_path))
    }

    /// Attach `type_path` seeded from the named preset.
    pub fn insert_preset(
        &mut self,
        registry: &FormRegistry,
        presets: &Presets,
        type_path: &str,
        preset: &str,
    ) -> Result<InjectReport, ComponentError> {
        let value = preset_value(presets, type_path, preset)?;
        self.attach(registry, type_path, Some(value))
    }

    /// Overwrite an attached component with one of its presets.
    pub fn apply_preset(
        &mut self,
        registry: &FormRegistry,
        presets: &Presets,
        type_path: &str,
        preset: &str,
    ) -> Result<InjectReport, ComponentError> {
        let node = registry.lookup(type_path).ok_or_else(|| ComponentError::UnknownType(type_path.to_string()))?;
        let value = preset_value(presets, type_path, preset)?;
        let instance = self.components.get_mut(type_path).ok_or_else(|| ComponentError::NotPresent(type_path.to_string()))?;
        Ok(inject(registry, instance, node, value))
    }

    fn attach(&mut self, registry: &FormRegistry, type_path: &str, seed: Option<&Value>) -> Result<InjectReport, ComponentError> {
        let node = registry.lookup(type_path).ok_or_else(|| ComponentError::UnknownType(type_path.to_string()))?;
        if self.components.contains_key(type_path) {
            return Err(ComponentError::AlreadyPresent(type_path.to_string()));
        }
        let mut instance = Instance::default_for(registry, node)?;
        let report = match seed {
            Some(value) => inject(registry, &mut instance, node, value),
            None => InjectReport::default(),
        };
        self.components.insert(type_path.to_string(), instance);
        Ok(report)
    }

    pub fn remove(&mut self, type_path: &str) -> Option<Instance> {
        self.components.shift_remove(type_path)
    }

    pub fn get(&self, type_path: &str) -> Option<&Instance> {
        self.components.get(type_path)
    }

    pub fn get_mut(&mut self, type_path: &str) -> Option<&mut Instance> {
        self.components.get_mut(type_path)
    }

    pub fn contains(&self, type_path: &str) -> bool {
        self.components.contains_key(type_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Instance)> {
        self.components.iter().map(|(path, instance)| (path.as_str(), instance))
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Move the data stored under `from` to the type `to`, for when a
    /// component was renamed or moved between modules. `from` may be an
    /// attached component or an unrecognized one.
    pub fn rename_type_path(&mut self, registry: &FormRegistry, from: &str, to: &str) -> Result<InjectReport, ComponentError> {
        let node = registry.lookup(to).ok_or_else(|| ComponentError::UnknownType(to.to_string()))?;
        if self.components.contains_key(to) {
            return Err(ComponentError::AlreadyPresent(to.to_string()));
        }
        let value = match (self.unrecognized_components.get(from), self.components.get(from)) {
            (Some(raw), _) => raw.clone(),
            (None, Some(instance)) => {
                let old = registry.lookup(from).ok_or_else(|| ComponentError::UnknownType(from.to_string()))?;
                extract(registry, instance, old)?
            }
            (None, None) => return Err(ComponentError::NotPresent(from.to_string())),
        };
        let mut instance = Instance::default_for(registry, node)?;
        let report = inject(registry, &mut instance, node, &value);
        self.unrecognized_components.shift_remove(from);
        self.components.shift_remove(from);
        self.components.insert(to.to_string(), instance);
        Ok(report)
    }

    /// The extras list: attached components first, then unrecognized ones.
    pub fn to_extras(&self, registry: &FormRegistry) -> Result<Value, ComponentError> {
        let mut out = Vec::with_capacity(self.components.len() + self.unrecognized_components.len());
        for (type_path, instance) in &self.components {
            let node = registry.lookup(type_path).ok_or_else(|| ComponentError::UnknownType(type_path.clone()))?;
            out.push(single(type_path.clone(), extract(registry, instance, node)?));
        }
        for (type_path, raw) in &self.unrecognized_components {
            out.push(single(type_path.clone(), raw.clone()));
        }
        Ok(Value::Array(out))
    }

    /// Rebuild a set from an extras list, or from an extras object holding
    /// the list under [`EXTRAS_KEY`]. A component whose type has no finite
    /// default is reported and kept verbatim with the unrecognized ones.
    pub fn from_extras(registry: &FormRegistry, extras: &Value) -> Result<(Self, Vec<ComponentReport>), ComponentError> {
        let (list, base) = match extras {
            Value::Array(list) => (list, "$"),
            Value::Object(object) => match object.get(EXTRAS_KEY) {
                Some(Value::Array(list)) => (list, "$.skein"),
                Some(other) => return Err(malformed("$.skein", "array", other)),
                None => return Ok((Self::new(), Vec::new())),
            },
            other => return Err(malformed("$", "array or object", other)),
        };

        let mut set = Self::new();
        let mut reports = Vec::new();
        for (i, entry) in list.iter().enumerate() {
            let Some((type_path, value)) = single_entry(entry) else {
                return Err(malformed(&format!("{base}[{i}]"), "single-key object", entry));
            };
            let Some(node) = registry.lookup(type_path) else {
                debug!(%type_path, "keeping unrecognized component");
                set.unrecognized_components.insert(type_path.clone(), value.clone());
                continue;
            };
            let instance = match set.components.entry(type_path.clone()) {
                Entry::Occupied(existing) => existing.into_mut(),
                Entry::Vacant(slot) => match Instance::default_for(registry, node) {
                    Ok(instance) => slot.insert(instance),
                    Err(error) => {
                        debug!(%type_path, %error, "keeping component without a default");
                        set.unrecognized_components.insert(type_path.clone(), value.clone());
                        let issue = InjectIssue { path: ROOT.to_string(), kind: InjectIssueKind::NoDefault(error) };
                        reports.push(ComponentReport { type_path: type_path.clone(), report: InjectReport { issues: vec![issue] } });
                        continue;
                    }
                },
            };
            let report = inject(registry, instance, node, value);
            if !report.is_clean() {
                reports.push(ComponentReport { type_path: type_path.clone(), report });
            }
        }
        Ok((set, reports))
    }
}

fn preset_value<'p>(presets: &'p Presets, type_path: &str, preset: &str) -> Result<&'p Value, ComponentError> {
    presets
        .get(type_path, preset)
        .ok_or_else(|| ComponentError::UnknownPreset { type_path: type_path.to_string(), preset: preset.to_string() })
}

fn single(key: String, value: Value) -> Value {
    Value::Object(Map::from_iter([(key, value)]))
}

fn single_entry(value: &Value) -> Option<(&String, &Value)> {
    match value {
        Value::Object(object) if object.len() == 1 => object.iter().next(),
        _ => None,
    }
}

fn malformed(path: &str, expected: &'static str, found: &Value) -> ComponentError {
    ComponentError::MalformedExtras { path: path.to_string(), expected, found: json_kind(found) }
}

// ------------------------------- Tests ------------------------------------ //
