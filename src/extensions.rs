//! Extension host: the application object extensions configure, plus the
//! lifecycle event bus they subscribe to.

use anyhow::{Context, Result};
use log::{debug, info};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::autoschema::{AutoSchemaExtension, GenerationReport};
use crate::config::BuildConfig;
use crate::directives::{Directive, DirectiveRegistry};
use crate::environment::BuildEnvironment;
use crate::error::BuildError;
use crate::parser::Parser;

/// Build lifecycle points extensions can hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Environment initialized, documents discovered, nothing rendered yet.
    BuilderInited,
    /// Document list refreshed after `BuilderInited` listeners ran.
    EnvUpdated,
    BuildFinished,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::BuilderInited => write!(f, "builder-inited"),
            Event::EnvUpdated => write!(f, "env-updated"),
            Event::BuildFinished => write!(f, "build-finished"),
        }
    }
}

pub type Listener = Arc<dyn Fn(&mut SphinxApp) -> Result<()> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionMetadata {
    pub version: String,
    pub parallel_read_safe: bool,
}

impl ExtensionMetadata {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            parallel_read_safe: true,
        }
    }
}

pub trait SphinxExtension: Send + Sync {
    fn name(&self) -> &str;

    /// Register directives, config values and event listeners.
    fn setup(&self, app: &mut SphinxApp) -> Result<ExtensionMetadata>;
}

pub struct SphinxApp {
    pub config: BuildConfig,
    pub env: BuildEnvironment,
    /// Stubs written or skipped by generation listeners during this build.
    pub generation: GenerationReport,
    directives: DirectiveRegistry,
    listeners: HashMap<Event, Vec<Listener>>,
    extensions: Vec<(String, ExtensionMetadata)>,
}

impl SphinxApp {
    pub fn new(config: BuildConfig, env: BuildEnvironment) -> Self {
        Self {
            config,
            env,
            generation: GenerationReport::default(),
            directives: DirectiveRegistry::new(),
            listeners: HashMap::new(),
            extensions: Vec::new(),
        }
    }

    pub fn add_extension(&mut self, extension: Arc<dyn SphinxExtension>) -> Result<()> {
        let name = extension.name().to_string();
        if self.extensions.iter().any(|(loaded, _)| *loaded == name) {
            debug!("Extension '{}' already loaded", name);
            return Ok(());
        }
        let metadata = extension
            .setup(self)
            .with_context(|| format!("Failed to set up extension '{}'", name))?;
        info!("Loaded extension '{}' (version {})", name, metadata.version);
        self.extensions.push((name, metadata));
        Ok(())
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(|(name, _)| name.as_str())
    }

    pub fn add_directive(&mut self, directive: Arc<dyn Directive>) {
        debug!("Registering directive '{}'", directive.name());
        self.directives.register(directive);
    }

    pub fn add_config_value(&mut self, name: &str, default: Value) {
        self.config.add_default(name, default);
    }

    pub fn connect(&mut self, event: Event, listener: Listener) {
        self.listeners.entry(event).or_default().push(listener);
    }

    /// Run every listener for `event` in registration order; the first error aborts.
    pub fn emit(&mut self, event: Event) -> Result<()> {
        let listeners = self.listeners.get(&event).cloned().unwrap_or_default();
        debug!("Emitting {} to {} listener(s)", event, listeners.len());
        for listener in listeners {
            listener(self).with_context(|| format!("Handler for '{}' failed", event))?;
        }
        Ok(())
    }

    pub fn directive_registry(&self) -> &DirectiveRegistry {
        &self.directives
    }

    /// A parser dispatching to the directives registered so far.
    pub fn parser(&self) -> Result<Parser> {
        Parser::new(self.directives.clone())
    }
}

/// Resolves configured extension names to built-in extensions.
pub struct ExtensionLoader {
    builtin: HashMap<&'static str, Arc<dyn SphinxExtension>>,
}

impl Default for ExtensionLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionLoader {
    pub fn new() -> Self {
        let autoschema: Arc<dyn SphinxExtension> = Arc::new(AutoSchemaExtension);
        let mut builtin = HashMap::new();
        builtin.insert("autoschema", autoschema.clone());
        builtin.insert("asdf_schemas", autoschema);
        Self { builtin }
    }

    pub fn load_extension(&self, name: &str) -> Result<Arc<dyn SphinxExtension>, BuildError> {
        self.builtin
            .get(name)
            .cloned()
            .ok_or_else(|| BuildError::UnknownExtension(name.to_string()))
    }
}
