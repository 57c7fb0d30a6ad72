//! Sphinx AutoSchema
//!
//! Generates placeholder pages for the schema files listed by `asdf-schemas`
//! directives and links them into the documentation through a toctree.

pub mod autoschema;
pub mod builder;
pub mod config;
pub mod directives;
pub mod document;
pub mod environment;
pub mod error;
pub mod extensions;
pub mod matching;
pub mod parser;
pub mod renderer;

pub use autoschema::{AutoSchemaExtension, GenerationReport, SchemaDirective, StubGenerator};
pub use builder::{BuildStats, SphinxBuilder};
pub use config::BuildConfig;
pub use directives::{Directive, DirectiveMode, DirectiveRegistry, ParseContext};
pub use document::{Document, Node, NodeVisitor, TocEntry, TocTree};
pub use environment::BuildEnvironment;
pub use error::BuildError;
pub use extensions::{Event, ExtensionLoader, SphinxApp, SphinxExtension};
pub use parser::Parser;
pub use renderer::HtmlRenderer;
