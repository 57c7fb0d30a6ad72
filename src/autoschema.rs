//! Schema documentation autogeneration.
//!
//! Documents list schema files with the `asdf-schemas` directive. When the
//! builder is initialized, every source document is re-parsed in collect
//! mode, where the directive emits marker nodes instead of output. The
//! referenced schemas get placeholder pages under the generated directory,
//! created once and never overwritten. During the normal render the same
//! directive produces a toctree linking those pages.

pub mod collector;
pub mod directive;
pub mod stubs;

use anyhow::Result;
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use crate::environment::BuildEnvironment;
use crate::extensions::{Event, ExtensionMetadata, SphinxApp, SphinxExtension};

pub use collector::{find_schema_directives, find_schema_references};
pub use directive::SchemaDirective;
pub use stubs::{stub_contents, GenerationReport, StubGenerator};

pub const DIRECTIVE_NAME: &str = "asdf-schemas";
/// Schema root, relative to the source directory.
pub const SCHEMA_PATH_OPTION: &str = "asdf_schema_path";
pub const DEFAULT_SCHEMA_PATH: &str = "schemas";

pub struct AutoSchemaExtension;

impl SphinxExtension for AutoSchemaExtension {
    fn name(&self) -> &str {
        "autoschema"
    }

    fn setup(&self, app: &mut SphinxApp) -> Result<ExtensionMetadata> {
        app.add_config_value(SCHEMA_PATH_OPTION, Value::from(DEFAULT_SCHEMA_PATH));
        let generated_dir = app.config.generated_dir.clone();
        app.add_directive(Arc::new(SchemaDirective::new(generated_dir)));
        app.connect(Event::BuilderInited, Arc::new(autogenerate_schema_docs));
        Ok(ExtensionMetadata::new(env!("CARGO_PKG_VERSION")))
    }
}

/// Source files of known documents that exist on disk, relative to the
/// source root and carrying a recognized suffix.
pub fn candidate_sources(env: &BuildEnvironment) -> Vec<String> {
    env.found_docs
        .iter()
        .map(|docname| env.doc2relpath(docname))
        .filter(|relpath| env.srcdir.join(relpath).is_file())
        .map(|relpath| env.ensure_source_suffix(&relpath))
        .collect()
}

/// Schema references across every candidate source of `app`.
pub fn collect_schema_references(app: &SphinxApp) -> Result<BTreeSet<String>> {
    let genfiles = candidate_sources(&app.env);
    if genfiles.is_empty() {
        return Ok(BTreeSet::new());
    }
    let parser = app.parser()?;
    find_schema_references(&parser, &app.env, &genfiles)
}

/// Warn about references with no file under the schema root.
fn check_schema_root(schema_root: &Path, schemas: &BTreeSet<String>) {
    if !schema_root.is_dir() {
        warn!("Schema root {} does not exist", schema_root.display());
        return;
    }
    for schema in schemas {
        if !schema_root.join(schema).is_file() {
            warn!(
                "Schema '{}' not found under {}",
                schema,
                schema_root.display()
            );
        }
    }
}

/// `builder-inited` handler: collect references, then write missing stubs.
pub fn autogenerate_schema_docs(app: &mut SphinxApp) -> Result<()> {
    let schema_path = app
        .config
        .config_str(SCHEMA_PATH_OPTION)
        .unwrap_or_else(|| DEFAULT_SCHEMA_PATH.to_string());
    let schema_root = app.env.srcdir.join(schema_path);

    let genfiles = candidate_sources(&app.env);
    if genfiles.is_empty() {
        debug!("No source documents; skipping schema stub generation");
        return Ok(());
    }

    let parser = app.parser()?;
    let schemas = find_schema_references(&parser, &app.env, &genfiles)?;
    info!(
        "Found {} schema reference(s) in {} document(s)",
        schemas.len(),
        genfiles.len()
    );
    if !schemas.is_empty() {
        check_schema_root(&schema_root, &schemas);
    }

    let generator = StubGenerator::from_config(&app.env.srcdir, &app.config);
    let report = generator.generate(&schemas)?;
    app.generation.merge(report);
    Ok(())
}
