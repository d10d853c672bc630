//! The reflected type registry as the remote application publishes it.
//!
//! One [`SchemaEntry`] per declared type, keyed by its full type path. The
//! shape is a tagged JSON-Schema dialect (`kind`, `$ref` into `#/$defs/`,
//! `oneOf`, `prefixItems`). Decoding is lenient about keys we do not use and
//! about kinds we do not know; the compiler decides what to do with those.
//!
//! Entries are decoded one at a time. An entry that does not decode is kept
//! aside with its error and the rest of the document loads normally.
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::path_de::{self, PathDeError};
use crate::presets::Presets;

/// Prefix the registry uses for intra-document references.
pub const DEFS_PREFIX: &str = "#/$defs/";

/// Only manifest version this crate reads.
pub const MANIFEST_VERSION: usize = 1;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Kind {
    Struct,
    Enum,
    Tuple,
    TupleStruct,
    List,
    Map,
    Set,
    Array,
    Value,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaEntry {
    #[serde(default)]
    pub kind: Option<Kind>,
    #[serde(default)]
    pub type_path: Option<String>,
    #[serde(default)]
    pub short_path: Option<String>,
    /// `uint`/`int`/`float`/`string`/`boolean`/`object`/`array`.
    #[serde(default, rename = "type")]
    pub type_tag: Option<String>,
    /// Absent on marker structs.
    #[serde(default)]
    pub properties: Option<IndexMap<String, PropertySchema>>,
    #[serde(default)]
    pub one_of: Vec<VariantDescriptor>,
    #[serde(default)]
    pub prefix_items: Vec<PropertySchema>,
    #[serde(default)]
    pub reflect_types: Vec<String>,
}

/// `{ "type": { "$ref": "#/$defs/f32" } }`
#[derive(Debug, Clone, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub ty: TypeRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypeRef {
    #[serde(rename = "$ref")]
    pub reference: String,
}

/// Entry of an Enum's `oneOf`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VariantDescriptor {
    Name(String),
    Entry(Box<SchemaEntry>),
}

/// Full registry document: type path → entry, in document order.
#[derive(Debug, Clone, Default)]
pub struct SchemaDocument {
    pub entries: IndexMap<String, SchemaEntry>,
    /// Type paths whose entry failed to decode, with the decoding error.
    pub malformed: IndexMap<String, String>,
}

/// `{"jsonrpc": "2.0", "result": …}` or `{"jsonrpc": "2.0", "error": …}`.
#[derive(Debug, Clone, Deserialize)]
struct BrpResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<BrpError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrpError {
    #[serde(default)]
    pub code: Option<i64>,
    pub message: String,
}

/// Registry written to disk by the host application for offline use.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub version: usize,
    /// Crates whose components should be offered; empty means all.
    #[serde(default)]
    pub crate_safelist: Vec<String>,
    #[serde(default)]
    pub created_using_bevy_skein_version: Option<String>,
    /// Named component values, including each `Default` as `"default"`.
    #[serde(default)]
    pub presets: Option<Presets>,
    pub registry: Value,
}

/// How a schema file on disk is wrapped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DocumentFormat {
    /// The bare type path → entry object.
    #[default]
    Registry,
    /// A JSON-RPC response to a registry schema request.
    BrpResponse,
    Manifest,
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("malformed schema document {0}")]
    Parse(#[from] PathDeError),
    #[error("remote registry request failed: {0}")]
    Remote(BrpError),
    #[error("registry response carried neither `result` nor `error`")]
    EmptyResponse,
    #[error("manifest version {0} is not supported (expected {expected})", expected = MANIFEST_VERSION)]
    UnsupportedManifestVersion(usize),
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

/// `#/$defs/glam::Vec3` → `glam::Vec3`; plain names are returned untouched.
pub fn strip_defs_prefix(reference: &str) -> &str {
    reference.strip_prefix(DEFS_PREFIX).unwrap_or(reference)
}

impl PropertySchema {
    pub fn type_name(&self) -> &str {
        strip_defs_prefix(&self.ty.reference)
    }
}

impl std::fmt::Display for BrpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl SchemaEntry {
    pub fn is_component(&self) -> bool {
        self.reflect_types.iter().any(|t| t == "Component")
    }
}

impl VariantDescriptor {
    /// Display name of the variant (`shortPath` for nested entries).
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Entry(entry) => entry.short_path.as_deref(),
        }
    }
}

impl SchemaDocument {
    /// Only a document that is not a JSON object fails as a whole.
    pub fn parse(src: &str) -> Result<Self, SchemaError> {
        Ok(Self::from_raw(path_de::from_str_with_path(src)?))
    }

    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        Ok(Self::from_raw(path_de::from_value_with_path(value)?))
    }

    /// Unwrap a `bevy/registry/schema` JSON-RPC response. An `error` member
    /// is terminal: nothing from the response is kept.
    pub fn from_brp_response(src: &str) -> Result<Self, SchemaError> {
        Self::from_value(brp_result(src)?)
    }

    fn from_raw(raw: IndexMap<String, Value>) -> Self {
        let mut doc = Self::default();
        for (type_path, value) in raw {
            match path_de::from_value_with_path::<SchemaEntry>(value) {
                Ok(entry) => {
                    doc.entries.insert(type_path, entry);
                }
                Err(err) => {
                    debug!(%type_path, %err, "entry did not decode");
                    doc.malformed.insert(type_path, err.to_string());
                }
            }
        }
        doc
    }

    pub fn load(path: &Path, format: DocumentFormat) -> Result<Self, SchemaError> {
        let src = read(path)?;
        match format {
            DocumentFormat::Registry => Self::parse(&src),
            DocumentFormat::BrpResponse => Self::from_brp_response(&src),
            DocumentFormat::Manifest => Manifest::parse(&src)?.document(),
        }
    }

    pub fn get(&self, type_path: &str) -> Option<&SchemaEntry> {
        self.entries.get(strip_defs_prefix(type_path))
    }

    /// Declared types, malformed ones included.
    pub fn len(&self) -> usize {
        self.entries.len() + self.malformed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.malformed.is_empty()
    }
}

impl Manifest {
    pub fn parse(src: &str) -> Result<Self, SchemaError> {
        let manifest: Self = path_de::from_str_with_path(src)?;
        if manifest.version != MANIFEST_VERSION {
            return Err(SchemaError::UnsupportedManifestVersion(manifest.version));
        }
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        Self::parse(&read(path)?)
    }

    pub fn document(&self) -> Result<SchemaDocument, SchemaError> {
        SchemaDocument::from_value(self.registry.clone())
    }
}

/// The `result` member of a JSON-RPC response.
pub(crate) fn brp_result(src: &str) -> Result<Value, SchemaError> {
    let response: BrpResponse = path_de::from_str_with_path(src)?;
    if let Some(error) = response.error {
        return Err(SchemaError::Remote(error));
    }
    response.result.ok_or(SchemaError::EmptyResponse)
}

pub(crate) fn read(path: &Path) -> Result<String, SchemaError> {
    std::fs::read_to_string(path).map_err(|source| SchemaError::Io { path: path.to_path_buf(), source })
}

// ------------------------------- Tests ------------------------------------ //
