//! Compile a reflected type registry into editable forms, and move component
//! data between those forms and its JSON wire format.
//!
//! ```text
//! SchemaDocument ─► FormRegistry::build ─► Instance::default_for ─► extract / inject
//! ```
pub mod codec;
pub mod compile;
pub mod components;
pub mod diagnostics;
pub mod form;
pub mod identity;
pub mod instance;
pub mod logging;
pub mod path_de;
pub mod presets;
pub mod schema;

pub use codec::{extract, inject, inject_strict, ExtractError, InjectIssue, InjectIssueKind, InjectReport};
pub use compile::{compile, CompileOptions};
pub use components::{ComponentCatalogue, ComponentError, ComponentSet};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use form::{Constraints, FormNode, FormNodeRef, FormRegistry, Primitive};
pub use identity::stable_key;
pub use instance::{Instance, InstanceError, Scalar};
pub use presets::Presets;
pub use schema::{DocumentFormat, SchemaDocument, SchemaEntry, SchemaError};
