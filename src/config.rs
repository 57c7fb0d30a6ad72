//! Build configuration.
//!
//! Values are layered with the `config` crate: built-in defaults, then an
//! optional configuration file, then `AUTOSCHEMA_*` environment variables.
//! Extensions register extra values with [`BuildConfig::add_default`]; those
//! live in [`BuildConfig::extra`] alongside anything the user set.

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::BuildError;

/// File names probed in the source directory when no config file is given.
pub const CONFIG_FILE_NAMES: &[&str] = &["conf.toml", "conf.yaml", "conf.yml", "conf.json"];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub project: String,
    pub language: Option<String>,
    pub master_doc: String,
    /// Recognized source suffixes. The first entry is the default suffix.
    pub source_suffix: Vec<String>,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub extensions: Vec<String>,
    /// Sub-directory of the source root receiving generated stubs.
    pub generated_dir: String,
    /// Body line written into every generated stub.
    pub stub_body: String,
    pub parallel_jobs: Option<usize>,
    /// Extension-specific values, keyed by option name.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            project: "Documentation".to_string(),
            language: None,
            master_doc: "index".to_string(),
            source_suffix: vec![".rst".to_string(), ".md".to_string()],
            include_patterns: vec!["**".to_string()],
            exclude_patterns: Vec::new(),
            extensions: vec!["autoschema".to_string()],
            generated_dir: "generated".to_string(),
            stub_body: "Your message here".to_string(),
            parallel_jobs: None,
            extra: HashMap::new(),
        }
    }
}

impl BuildConfig {
    /// Load configuration for a source directory.
    ///
    /// An explicit `config_file` must exist. Otherwise the first of
    /// [`CONFIG_FILE_NAMES`] found in `source_dir` is used, if any.
    pub fn load(source_dir: &Path, config_file: Option<&Path>) -> Result<Self> {
        let file = match config_file {
            Some(path) => {
                if !path.is_file() {
                    return Err(BuildError::Config(format!(
                        "configuration file '{}' does not exist",
                        path.display()
                    ))
                    .into());
                }
                Some(path.to_path_buf())
            }
            None => Self::find_config_file(source_dir),
        };

        let mut builder = config::Config::builder();
        if let Some(ref path) = file {
            debug!("Loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path.as_path()).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("AUTOSCHEMA")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("source_suffix")
                .with_list_parse_key("extensions")
                .with_list_parse_key("include_patterns")
                .with_list_parse_key("exclude_patterns"),
        );

        let loaded = builder
            .build()
            .context("Failed to assemble build configuration")?;
        let config: BuildConfig = loaded
            .try_deserialize()
            .map_err(|e| BuildError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn find_config_file(source_dir: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| source_dir.join(name))
            .find(|path| path.is_file())
    }

    fn validate(&self) -> Result<(), BuildError> {
        if self.source_suffix.is_empty() {
            return Err(BuildError::Config(
                "source_suffix must name at least one suffix".to_string(),
            ));
        }
        if let Some(bad) = self.source_suffix.iter().find(|s| !s.starts_with('.')) {
            return Err(BuildError::Config(format!(
                "source suffix '{}' must start with '.'",
                bad
            )));
        }
        if self.generated_dir.trim().is_empty() {
            return Err(BuildError::Config(
                "generated_dir must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The suffix appended to names that carry no recognized suffix.
    pub fn default_suffix(&self) -> &str {
        self.source_suffix.first().map(String::as_str).unwrap_or(".rst")
    }

    /// Register a default for an extension option. User-provided values win.
    pub fn add_default(&mut self, name: &str, default: Value) {
        self.extra.entry(name.to_string()).or_insert(default);
    }

    pub fn config_value(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// String-valued extension option; non-string values are rendered as text.
    pub fn config_str(&self, name: &str) -> Option<String> {
        self.extra.get(name).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}
