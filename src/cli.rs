//! `skein-forms`: compile a reflected type registry and exercise the codec
//! against it from the command line.
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use skein_forms::codec::{extract, inject, InjectIssueKind};
use skein_forms::components::{ComponentCatalogue, ComponentSet};
use skein_forms::compile::CompileOptions;
use skein_forms::form::FormRegistry;
use skein_forms::identity::stable_key;
use skein_forms::instance::Instance;
use skein_forms::presets::{Presets, DEFAULT_PRESET};
use skein_forms::schema::{DocumentFormat, Manifest, SchemaDocument};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile reflected type registries into editable forms and check component data against them
#[derive(Parser, Debug)]
#[command(name = "skein-forms", version)]
pub struct CommandLineInterface {
    /// debug-level logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// compile a registry and print the type summary, component catalogue and diagnostics
    Compile(CompileOut),
    /// print the storage key for each type path
    Key(KeyOut),
    /// print the default wire value of a type, seeded from its preset when one is known
    Default(DefaultOut),
    /// load component data documents and verify they survive inject → extract unchanged
    Check(CheckOut),
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
enum SchemaFormat {
    /// bare `type path → entry` object
    #[default]
    Registry,
    /// JSON-RPC response envelope from the running application
    Brp,
    /// offline manifest written by the application
    Manifest,
}

#[derive(Args, Debug, Clone)]
struct SchemaSettings {
    /// registry schema file
    #[arg(long, short)]
    schema: PathBuf,

    #[arg(long, value_enum, default_value_t)]
    format: SchemaFormat,

    /// only compile types reachable from components
    #[arg(long, default_value_t = false)]
    components_only: bool,

    /// presets file: a bare `type path → name → value` map, or a `skein/presets` response with `--format brp`.
    /// Manifests carry their own presets.
    #[arg(long)]
    presets: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /nodes/0/extras)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document.
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct CompileOut {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct KeyOut {
    /// full type paths, e.g. `my_game::components::Player`
    #[arg(required = true)]
    type_paths: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct DefaultOut {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    /// full type path of the type to default-construct
    type_path: String,

    /// preset to start from instead of `default`
    #[arg(long)]
    preset: Option<String>,
}

#[derive(clap::Parser, Debug)]
struct CheckOut {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    #[command(flatten)]
    input_settings: InputSettings,
}

struct LoadedSchema {
    doc: SchemaDocument,
    registry: FormRegistry,
    /// Crates to list in the catalogue; empty for all.
    safelist: Vec<String>,
    presets: Presets,
}

/// One JSON document after pointer/jq selection.
#[derive(Debug)]
struct Document {
    label: String,
    value: Value,
}

enum Verdict {
    Clean,
    /// Values were accepted but the document is not in canonical form.
    Drift(Vec<String>),
    Rejected(Vec<String>),
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl From<SchemaFormat> for DocumentFormat {
    fn from(format: SchemaFormat) -> Self {
        match format {
            SchemaFormat::Registry => Self::Registry,
            SchemaFormat::Brp => Self::BrpResponse,
            SchemaFormat::Manifest => Self::Manifest,
        }
    }
}

impl SchemaSettings {
    /// Load and compile, along with whatever presets and crate safelist
    /// came with the schema.
    fn load(&self) -> Result<LoadedSchema> {
        let (doc, safelist, embedded) = match self.format {
            SchemaFormat::Manifest => {
                let manifest = Manifest::load(&self.schema)?;
                (manifest.document()?, manifest.crate_safelist, manifest.presets.unwrap_or_default())
            }
            format => (SchemaDocument::load(&self.schema, format.into())?, Vec::new(), Presets::default()),
        };
        let presets = match (&self.presets, self.format) {
            (Some(path), SchemaFormat::Brp) => Presets::load(path, DocumentFormat::BrpResponse)?,
            (Some(path), _) => Presets::load(path, DocumentFormat::Registry)?,
            (None, _) => embedded,
        };
        let options = CompileOptions { components_only: self.components_only };
        let registry = FormRegistry::build_with(&doc, options);
        Ok(LoadedSchema { doc, registry, safelist, presets })
    }
}

impl InputSettings {
    fn load_documents(&self) -> Result<Vec<Document>> {
        let source_paths = resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")?;
        let mut documents = Vec::new();
        for source_path in source_paths {
            let label = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path).with_context(|| format!("failed to read {label}"))?;
            let values = if self.ndjson {
                source
                    .lines()
                    .enumerate()
                    .filter(|(_, line)| !line.trim().is_empty())
                    .map(|(i, line)| {
                        serde_json::from_str::<Value>(line)
                            .with_context(|| format!("failed to parse {label}:{}", i + 1))
                            .map(|value| (format!("{label}:{}", i + 1), value))
                    })
                    .collect::<Result<Vec<_>>>()?
            } else {
                let value = serde_json::from_str::<Value>(&source).with_context(|| format!("failed to parse {label}"))?;
                vec![(label, value)]
            };
            for (label, value) in values {
                self.select(label, value, &mut documents)?;
            }
        }
        Ok(documents)
    }

    fn select(&self, label: String, value: Value, documents: &mut Vec<Document>) -> Result<()> {
        let value = match self.json_pointer.as_deref() {
            None => value,
            Some(pointer) => value
                .pointer(pointer)
                .cloned()
                .with_context(|| format!("{label}: JSON pointer {pointer} selects nothing"))?,
        };
        match self.jq_expr.as_deref() {
            None => documents.push(Document { label, value }),
            Some(jq_expr) => {
                let outputs = crate::jq_exec::run_jaq(jq_expr, &value)
                    .with_context(|| format!("failed to apply jq expression to {label}"))?;
                let many = outputs.len() > 1;
                for (i, value) in outputs.into_iter().enumerate() {
                    let label = if many { format!("{label}#{i}") } else { label.clone() };
                    documents.push(Document { label, value });
                }
            }
        }
        Ok(())
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Compile(target) => {
                let LoadedSchema { doc, registry, safelist, presets } = target.schema_settings.load()?;
                let mut catalogue = ComponentCatalogue::from_document(&doc, &registry);
                catalogue.retain_crates(&safelist);
                let summary = json!({
                    "entries": doc.len(),
                    "types": registry.len(),
                    "presets": presets.len(),
                    "components": catalogue,
                    "diagnostics": registry.diagnostics().iter().map(ToString::to_string).collect::<Vec<_>>(),
                });
                write_output(target.out.as_deref(), &serde_json::to_string_pretty(&summary)?)
            }
            Command::Key(target) => {
                for type_path in &target.type_paths {
                    println!("{type_path}\t{}", stable_key(type_path));
                }
                Ok(())
            }
            Command::Default(target) => {
                let LoadedSchema { registry, presets, .. } = target.schema_settings.load()?;
                let Some(node) = registry.lookup(&target.type_path) else {
                    bail!("`{}` is not a compiled type", target.type_path);
                };
                let mut instance = Instance::default_for(&registry, node)?;
                let preset = target.preset.as_deref().unwrap_or(DEFAULT_PRESET);
                match presets.get(&target.type_path, preset) {
                    Some(seed) => {
                        for issue in inject(&registry, &mut instance, node, seed).issues {
                            warn!(%issue, preset, "preset value not applied");
                        }
                    }
                    None if target.preset.is_some() => bail!("`{}` has no preset named `{preset}`", target.type_path),
                    None => {}
                }
                let value = extract(&registry, &instance, node)?;
                println!("{}", serde_json::to_string_pretty(&value)?);
                Ok(())
            }
            Command::Check(target) => {
                let LoadedSchema { registry, .. } = target.schema_settings.load()?;
                let documents = target.input_settings.load_documents()?;
                info!(documents = documents.len(), "checking component data");
                let verdicts: Vec<(&Document, Verdict)> =
                    documents.par_iter().map(|document| (document, check_document(&registry, &document.value))).collect();
                report(&verdicts)
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn check_document(registry: &FormRegistry, value: &Value) -> Verdict {
    let (set, reports) = match ComponentSet::from_extras(registry, value) {
        Ok(loaded) => loaded,
        Err(error) => return Verdict::Rejected(vec![error.to_string()]),
    };
    let mut rejected = Vec::new();
    let mut drift = Vec::new();
    for component in &reports {
        for issue in &component.report.issues {
            let line = format!("{}: {issue}", component.type_path);
            if matches!(issue.kind, InjectIssueKind::MissingField(_)) {
                drift.push(line);
            } else {
                rejected.push(line);
            }
        }
    }
    for type_path in set.unrecognized_components.keys() {
        drift.push(format!("{type_path}: not in the registry; kept verbatim"));
    }
    if !rejected.is_empty() {
        return Verdict::Rejected(rejected);
    }
    let original = match value {
        Value::Object(object) => object.get(skein_forms::components::EXTRAS_KEY).cloned().unwrap_or(Value::Array(Vec::new())),
        other => other.clone(),
    };
    match set.to_extras(registry) {
        Ok(written) if same_json(&written, &original) => {}
        Ok(_) => drift.push("re-extracted data differs from the input".to_string()),
        Err(error) => return Verdict::Rejected(vec![error.to_string()]),
    }
    if drift.is_empty() { Verdict::Clean } else { Verdict::Drift(drift) }
}

/// Structural equality where `1` and `1.0` are the same number.
fn same_json(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(xs), Value::Array(ys)) => xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| same_json(x, y)),
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len() && xs.iter().all(|(k, x)| ys.get(k).is_some_and(|y| same_json(x, y)))
        }
        _ => a == b,
    }
}

fn report(verdicts: &[(&Document, Verdict)]) -> Result<()> {
    let mut failed = 0;
    for (document, verdict) in verdicts {
        match verdict {
            Verdict::Clean => println!("{} {}", "ok".green().bold(), document.label),
            Verdict::Drift(notes) => {
                println!("{} {}", "drift".yellow().bold(), document.label);
                for note in notes {
                    println!("    {note}");
                }
            }
            Verdict::Rejected(errors) => {
                failed += 1;
                println!("{} {}", "fail".red().bold(), document.label);
                for error in errors {
                    println!("    {}", error.red());
                }
            }
        }
    }
    debug!(failed, total = verdicts.len(), "check finished");
    if failed > 0 {
        bail!("{failed} of {} documents were rejected", verdicts.len());
    }
    Ok(())
}

fn write_output(out: Option<&Path>, contents: &str) -> Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(out, contents).with_context(|| format!("failed to write {}", out.display()))?;
            eprintln!("{} {}", "wrote".green().bold(), out.display());
        }
        None => println!("{contents}"),
    }
    Ok(())
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();
    for raw in patterns {
        let pattern = raw.as_ref();
        if !has_glob_chars(pattern) {
            out.push(PathBuf::from(pattern));
            continue;
        }
        let before = out.len();
        for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))? {
            out.push(entry?);
        }
        if out.len() == before {
            bail!("glob pattern matched no files: {pattern}");
        }
    }
    Ok(out)
}

// ------------------------------- Tests ------------------------------------ //
