//! Schema → form compiler.
//!
//! Walk one registry entry, recursively compile everything it references, and
//! memoize the result by type path in a [`FormRegistry`]. The registry is the
//! cache: a type path maps to exactly one node for the lifetime of a load,
//! which is what lets recursive and shared type graphs terminate.
//!
//! Failure policy:
//! - A type that cannot be compiled is left out of the registry and diagnosed
//!   once. Whoever referenced it drops that field or variant and carries on.
//! - Nothing here aborts the pass.
pub mod overrides;
pub mod value;

use tracing::{debug, info, warn};

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::form::{Constraints, FormNode, FormNodeRef, FormRegistry, Primitive};
use crate::schema::{strip_defs_prefix, Kind, SchemaDocument, SchemaEntry, VariantDescriptor};

use value::ValueForm;

const OPTION_PREFIX: &str = "core::option::Option<";

/// Why a reference could not be turned into a node. The referencing side
/// decides how to attribute it.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Unavailable {
    /// The document has no entry of that name.
    Missing,
    /// The entry exists but failed; its own diagnostic is already recorded.
    Failed,
}

/// Which entries of a document are compiled as roots. Anything a root
/// references is compiled regardless.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Only start from entries reflecting `Component`.
    pub components_only: bool,
}

// ------------------------------- Front API -------------------------------- //

impl FormRegistry {
    /// Compile every entry of `doc` into a fresh registry.
    pub fn build(doc: &SchemaDocument) -> Self {
        Self::build_with(doc, CompileOptions::default())
    }

    pub fn build_with(doc: &SchemaDocument, options: CompileOptions) -> Self {
        let mut registry = Self::new();
        for (type_path, entry) in &doc.entries {
            if options.components_only && !entry.is_component() {
                continue;
            }
            if registry.contains(type_path) || registry.failed.contains(type_path) {
                continue;
            }
            // top-level keys always resolve, so any failure is already diagnosed
            let _ = compile_ref(&mut registry, doc, type_path, None);
        }
        if !options.components_only {
            for type_path in doc.malformed.keys() {
                if !registry.failed.contains(type_path) {
                    let _ = compile_ref(&mut registry, doc, type_path, None);
                }
            }
        }
        info!(
            types = registry.len(),
            diagnostics = registry.diagnostics.len(),
            "compiled schema document"
        );
        registry
    }

    /// Replace this registry wholesale with one built from `doc`. Handles
    /// from the previous load must not be reused afterwards.
    pub fn rebuild(&mut self, doc: &SchemaDocument) {
        *self = Self::build(doc);
    }

    fn diagnose(&mut self, diagnostic: Diagnostic) {
        warn!(%diagnostic, "schema diagnostic");
        self.diagnostics.push(diagnostic);
    }

    fn fail(&mut self, type_path: &str, kind: DiagnosticKind) -> Unavailable {
        self.failed.insert(type_path.to_string());
        self.diagnose(Diagnostic::new(type_path, kind));
        Unavailable::Failed
    }
}

/// Compile `type_name` (and everything it references) into `registry`.
///
/// `override_entry` is used when the caller already holds the entry and it is
/// not a top-level key of `doc`, as with variant descriptors nested inside an
/// enum's `oneOf`.
pub fn compile(
    registry: &mut FormRegistry,
    doc: &SchemaDocument,
    type_name: &str,
    override_entry: Option<&SchemaEntry>,
) -> Option<FormNodeRef> {
    match compile_ref(registry, doc, type_name, override_entry) {
        Ok(node) => Some(node),
        Err(Unavailable::Missing) => {
            let type_path = strip_defs_prefix(type_name);
            registry.diagnose(Diagnostic::new(type_path, DiagnosticKind::UnknownReference(type_path.to_string())));
            None
        }
        Err(Unavailable::Failed) => None,
    }
}

// ------------------------------- Dispatch --------------------------------- //

fn compile_ref(
    registry: &mut FormRegistry,
    doc: &SchemaDocument,
    type_name: &str,
    override_entry: Option<&SchemaEntry>,
) -> Result<FormNodeRef, Unavailable> {
    let type_path = strip_defs_prefix(type_name);
    if let Some(hit) = registry.lookup(type_path) {
        return Ok(hit);
    }
    if registry.failed.contains(type_path) {
        return Err(Unavailable::Failed);
    }
    let Some(entry) = override_entry.or_else(|| doc.get(type_path)) else {
        return match doc.malformed.get(type_path) {
            Some(reason) => Err(registry.fail(type_path, DiagnosticKind::MalformedEntry(reason.clone()))),
            None => Err(Unavailable::Missing),
        };
    };
    debug!(type_path, kind = ?entry.kind, "compiling");

    if let Some(node) = overrides::vector_override(type_path) {
        return Ok(registry.register(type_path, node));
    }

    match entry.kind {
        Some(Kind::Value) => compile_value(registry, type_path, entry),
        Some(Kind::Struct) => Ok(compile_struct(registry, doc, type_path, entry)),
        Some(Kind::Enum) => compile_enum(registry, doc, type_path, entry),
        Some(kind @ (Kind::Tuple | Kind::TupleStruct)) => compile_wrapper(registry, doc, type_path, entry, kind),
        Some(kind @ (Kind::List | Kind::Map | Kind::Set | Kind::Array)) => {
            Err(registry.fail(type_path, DiagnosticKind::UnsupportedKind(format!("{kind:?}"))))
        }
        Some(Kind::Unknown) => Err(registry.fail(type_path, DiagnosticKind::MalformedEntry("unknown `kind`".into()))),
        None => Err(registry.fail(type_path, DiagnosticKind::MalformedEntry("missing `kind`".into()))),
    }
}

// -------------------------------- Kinds ----------------------------------- //

fn compile_value(registry: &mut FormRegistry, type_path: &str, entry: &SchemaEntry) -> Result<FormNodeRef, Unavailable> {
    match value::classify(type_path, entry.type_tag.as_deref()) {
        Ok(ValueForm::Leaf(leaf)) => Ok(registry.register(type_path, leaf)),
        Ok(ValueForm::Fallback(leaf, kind)) => {
            registry.diagnose(Diagnostic::new(type_path, kind));
            Ok(registry.register(type_path, leaf))
        }
        Ok(ValueForm::Duration) => {
            let secs = registry.push(FormNode::Leaf { primitive: Primitive::UInt, constraints: Constraints::at_least(0) });
            let nanos = registry.push(FormNode::Leaf {
                primitive: Primitive::UInt,
                constraints: Constraints::range(0, value::NANOS_PER_SEC),
            });
            let fields = vec![("secs".to_string(), secs), ("nanos".to_string(), nanos)];
            Ok(registry.register(type_path, FormNode::Struct { fields }))
        }
        Err(kind) => Err(registry.fail(type_path, kind)),
    }
}

/// Structs are registered before their fields compile, so a field that
/// refers back to the struct resolves to the same node.
fn compile_struct(registry: &mut FormRegistry, doc: &SchemaDocument, type_path: &str, entry: &SchemaEntry) -> FormNodeRef {
    let handle = registry.reserve(type_path);
    let mut fields = Vec::new();
    for (name, property) in entry.properties.iter().flatten() {
        match compile_ref(registry, doc, property.type_name(), None) {
            Ok(node) => fields.push((name.clone(), node)),
            Err(why) => drop_member(registry, type_path, name, property.type_name(), why),
        }
    }
    registry.fill(handle, FormNode::Struct { fields });
    handle
}

fn compile_enum(registry: &mut FormRegistry, doc: &SchemaDocument, type_path: &str, entry: &SchemaEntry) -> Result<FormNodeRef, Unavailable> {
    match entry.type_tag.as_deref() {
        Some("string") => {
            let mut variants = Vec::new();
            for descriptor in &entry.one_of {
                match descriptor.name() {
                    Some(name) => variants.push((name.to_string(), None)),
                    None => registry.diagnose(Diagnostic::for_member(
                        type_path,
                        "?",
                        DiagnosticKind::MalformedEntry("variant without a name".into()),
                    )),
                }
            }
            Ok(registry.register(type_path, FormNode::Enum { variants, is_option: false }))
        }
        Some("object") => Ok(compile_object_enum(registry, doc, type_path, entry)),
        other => Err(registry.fail(
            type_path,
            DiagnosticKind::MalformedEntry(format!("enum `type` must be `string` or `object`, found {other:?}")),
        )),
    }
}

fn compile_object_enum(registry: &mut FormRegistry, doc: &SchemaDocument, type_path: &str, entry: &SchemaEntry) -> FormNodeRef {
    let handle = registry.reserve(type_path);
    let option_like = type_path.starts_with(OPTION_PREFIX);
    let mut variants = Vec::new();
    for descriptor in &entry.one_of {
        let Some(name) = descriptor.name() else {
            registry.diagnose(Diagnostic::for_member(
                type_path,
                "?",
                DiagnosticKind::MalformedEntry("variant without a `shortPath`".into()),
            ));
            continue;
        };
        let variant_entry = match descriptor {
            VariantDescriptor::Entry(variant) if variant.kind.is_some() && !(option_like && name == "None") => {
                variant.as_ref()
            }
            _ => {
                variants.push((name.to_string(), None));
                continue;
            }
        };
        let variant_path = variant_entry
            .type_path
            .clone()
            .unwrap_or_else(|| format!("{type_path}::{name}"));
        match compile_ref(registry, doc, &variant_path, Some(variant_entry)) {
            Ok(node) => variants.push((name.to_string(), Some(node))),
            Err(why) => drop_member(registry, type_path, name, &variant_path, why),
        }
    }
    let is_option = variants.len() == 2
        && variants.iter().any(|(n, payload)| n == "None" && payload.is_none())
        && variants.iter().any(|(n, payload)| n == "Some" && payload.is_some());
    registry.fill(handle, FormNode::Enum { variants, is_option });
    handle
}

/// Single-element tuples and tuple structs serialize as the bare element.
fn compile_wrapper(
    registry: &mut FormRegistry,
    doc: &SchemaDocument,
    type_path: &str,
    entry: &SchemaEntry,
    kind: Kind,
) -> Result<FormNodeRef, Unavailable> {
    let [only] = entry.prefix_items.as_slice() else {
        return Err(registry.fail(
            type_path,
            DiagnosticKind::UnsupportedTupleArity { kind: format!("{kind:?}"), arity: entry.prefix_items.len() },
        ));
    };
    let handle = registry.reserve(type_path);
    match compile_ref(registry, doc, only.type_name(), None) {
        Ok(inner) => {
            registry.fill(handle, FormNode::Alias { inner });
            Ok(handle)
        }
        Err(why) => {
            registry.abandon(type_path, handle);
            let inner = only.type_name().to_string();
            let kind = match why {
                Unavailable::Missing => DiagnosticKind::UnknownReference(inner),
                Unavailable::Failed => DiagnosticKind::UnavailableReference(inner),
            };
            Err(registry.fail(type_path, kind))
        }
    }
}

fn drop_member(registry: &mut FormRegistry, type_path: &str, member: &str, target: &str, why: Unavailable) {
    let target = strip_defs_prefix(target).to_string();
    let kind = match why {
        Unavailable::Missing => DiagnosticKind::UnknownReference(target),
        Unavailable::Failed => DiagnosticKind::UnavailableReference(target),
    };
    registry.diagnose(Diagnostic::for_member(type_path, member, kind));
}

// ------------------------------- Tests ------------------------------------ //
