//! Reference collection: re-parse sources in collect mode and gather markers.

use anyhow::{Context, Result};
use log::debug;
use std::collections::BTreeSet;

use crate::directives::{DirectiveMode, ParseContext};
use crate::environment::BuildEnvironment;
use crate::error::BuildError;
use crate::parser::Parser;

/// Schema references named by `asdf-schemas` directives in one source file.
///
/// `filename` is relative to the source root.
pub fn find_schema_directives(
    parser: &Parser,
    env: &BuildEnvironment,
    filename: &str,
) -> Result<Vec<String>> {
    let path = env.srcdir.join(filename);
    let content = std::fs::read_to_string(&path).map_err(|e| BuildError::io(&path, e))?;

    let ctx = ParseContext::new(env.path2doc(filename), DirectiveMode::Collect)
        .with_source_file(filename);
    let document = parser
        .parse(&path, &content, &ctx)
        .with_context(|| format!("Failed to collect schema references from {}", filename))?;

    let references = document.schema_references();
    debug!("{}: {} schema reference(s)", filename, references.len());
    Ok(references)
}

/// Union of the schema references across `filenames`. Any unreadable or
/// unparsable file aborts collection.
pub fn find_schema_references(
    parser: &Parser,
    env: &BuildEnvironment,
    filenames: &[String],
) -> Result<BTreeSet<String>> {
    let mut schemas = BTreeSet::new();
    for filename in filenames {
        schemas.extend(find_schema_directives(parser, env, filename)?);
    }
    Ok(schemas)
}
