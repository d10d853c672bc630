//! Named component values published by the host application.
//!
//! The application answers `skein/presets` (and embeds the same map in its
//! manifest) with `type path → preset name → wire value`. Every component
//! that implements `Default` carries that value as the `"default"` preset,
//! which is what a freshly attached component should start from.
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path_de;
use crate::schema::{self, DocumentFormat, Manifest, SchemaError};

/// Preset holding the application's `Default` value.
pub const DEFAULT_PRESET: &str = "default";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Presets {
    by_type: IndexMap<String, IndexMap<String, Value>>,
}

impl Presets {
    pub fn parse(src: &str) -> Result<Self, SchemaError> {
        Ok(path_de::from_str_with_path(src)?)
    }

    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        Ok(path_de::from_value_with_path(value)?)
    }

    /// Unwrap a `skein/presets` JSON-RPC response.
    pub fn from_brp_response(src: &str) -> Result<Self, SchemaError> {
        Self::from_value(schema::brp_result(src)?)
    }

    /// Read presets from a bare map, a JSON-RPC response, or the `presets`
    /// member of a manifest.
    pub fn load(path: &Path, format: DocumentFormat) -> Result<Self, SchemaError> {
        let src = schema::read(path)?;
        match format {
            DocumentFormat::Registry => Self::parse(&src),
            DocumentFormat::BrpResponse => Self::from_brp_response(&src),
            DocumentFormat::Manifest => Ok(Manifest::parse(&src)?.presets.unwrap_or_default()),
        }
    }

    pub fn get(&self, type_path: &str, preset: &str) -> Option<&Value> {
        self.by_type.get(type_path)?.get(preset)
    }

    pub fn default_value(&self, type_path: &str) -> Option<&Value> {
        self.get(type_path, DEFAULT_PRESET)
    }

    /// Preset names of one type, in document order.
    pub fn names(&self, type_path: &str) -> impl Iterator<Item = &str> {
        self.by_type.get(type_path).into_iter().flat_map(|presets| presets.keys().map(String::as_str))
    }

    pub fn insert(&mut self, type_path: impl Into<String>, preset: impl Into<String>, value: Value) {
        self.by_type.entry(type_path.into()).or_default().insert(preset.into(), value);
    }

    /// Number of types with at least one preset.
    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}
