//! Placeholder documents for referenced schemas.

use anyhow::Result;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::config::BuildConfig;
use crate::environment::{escapes_root, path_to_docname};
use crate::error::BuildError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub created: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    /// References that would resolve outside the output directory.
    pub rejected: Vec<String>,
}

impl GenerationReport {
    pub fn merge(&mut self, other: GenerationReport) {
        self.created.extend(other.created);
        self.skipped.extend(other.skipped);
        self.rejected.extend(other.rejected);
    }
}

/// Title, `=` underline of matching length, body line.
pub fn stub_contents(docname: &str, body: &str) -> String {
    format!(
        "{}\n{}\n{}\n",
        docname,
        "=".repeat(docname.chars().count()),
        body
    )
}

pub struct StubGenerator {
    output_dir: PathBuf,
    suffix: String,
    body: String,
}

impl StubGenerator {
    pub fn new(output_dir: PathBuf, suffix: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            output_dir,
            suffix: suffix.into(),
            body: body.into(),
        }
    }

    pub fn from_config(srcdir: &Path, config: &BuildConfig) -> Self {
        Self::new(
            srcdir.join(&config.generated_dir),
            config.default_suffix(),
            config.stub_body.clone(),
        )
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn stub_path(&self, schema: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}{}", path_to_docname(schema), self.suffix))
    }

    /// Write a stub for each schema that has none yet. Existing files are
    /// left untouched, so repeated runs only fill in what is missing.
    pub fn generate<'a, I>(&self, schemas: I) -> Result<GenerationReport>
    where
        I: IntoIterator<Item = &'a String>,
    {
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| BuildError::io(&self.output_dir, e))?;

        let mut report = GenerationReport::default();
        for schema in schemas {
            let docname = path_to_docname(schema);
            let path = self.stub_path(schema);

            if escapes_root(&docname) {
                let err = BuildError::PathOutsideSource {
                    path,
                    root: self.output_dir.clone(),
                };
                warn!("Skipping schema reference '{}': {}", schema, err);
                report.rejected.push(schema.clone());
                continue;
            }

            if path.exists() {
                debug!("Keeping existing stub {}", path.display());
                report.skipped.push(path);
                continue;
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
            }
            std::fs::write(&path, stub_contents(&docname, &self.body))
                .map_err(|e| BuildError::io(&path, e))?;
            debug!("Created stub {}", path.display());
            report.created.push(path);
        }

        info!(
            "Schema stubs: {} created, {} already present",
            report.created.len(),
            report.skipped.len()
        );
        Ok(report)
    }
}
