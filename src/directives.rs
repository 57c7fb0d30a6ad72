//! Directive handlers and the registry the parser dispatches through.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

use crate::document::{Node, TocEntry, TocTree};
use crate::error::BuildError;

/// Selects what directives produce during a parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectiveMode {
    /// Normal parse feeding the renderer.
    #[default]
    Render,
    /// Reference collection: directives may emit lightweight marker nodes.
    Collect,
}

/// Per-parse context handed to every directive invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseContext {
    /// Name of the document being parsed.
    pub docname: String,
    /// File name used in diagnostics.
    pub source_file: String,
    pub mode: DirectiveMode,
}

impl ParseContext {
    pub fn new(docname: impl Into<String>, mode: DirectiveMode) -> Self {
        let docname = docname.into();
        Self {
            source_file: docname.clone(),
            docname,
            mode,
        }
    }

    pub fn with_source_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = source_file.into();
        self
    }

    /// Directory part of the docname, `""` for top-level documents.
    pub fn docdir(&self) -> &str {
        match self.docname.rfind('/') {
            Some(pos) => &self.docname[..pos],
            None => "",
        }
    }
}

/// A directive occurrence as seen by its handler.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DirectiveBlock {
    pub name: String,
    pub arguments: Vec<String>,
    pub options: HashMap<String, String>,
    pub content: Vec<String>,
    pub line: usize,
}

pub trait Directive: Send + Sync {
    fn name(&self) -> &str;

    /// Produce the nodes standing in for this directive in the parse tree.
    fn run(&self, block: &DirectiveBlock, ctx: &ParseContext) -> Result<Vec<Node>>;
}

#[derive(Clone)]
pub struct DirectiveRegistry {
    directives: HashMap<String, Arc<dyn Directive>>,
}

impl Default for DirectiveRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.directives.keys().collect();
        names.sort();
        f.debug_struct("DirectiveRegistry")
            .field("directives", &names)
            .finish()
    }
}

impl DirectiveRegistry {
    /// Registry with the built-in directives.
    pub fn new() -> Self {
        let mut registry = Self {
            directives: HashMap::new(),
        };
        registry.register(Arc::new(TocTreeDirective));
        registry
    }

    pub fn register(&mut self, directive: Arc<dyn Directive>) {
        self.directives
            .insert(directive.name().to_string(), directive);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Directive>> {
        self.directives.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.directives.contains_key(name)
    }

    pub fn get_registered_directives(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.directives.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Join a toctree entry onto the directory of the referencing document.
pub fn resolve_docname(docdir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = if docdir.is_empty() {
        Vec::new()
    } else {
        docdir.split('/').collect()
    };
    for part in target.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// The standard `toctree` directive.
pub struct TocTreeDirective;

impl TocTreeDirective {
    /// Split `Title <target>` entries; plain entries carry no title.
    fn parse_entry(entry: &str) -> (Option<String>, &str) {
        if let (Some(open), true) = (entry.rfind('<'), entry.ends_with('>')) {
            let title = entry[..open].trim();
            let target = entry[open + 1..entry.len() - 1].trim();
            if !title.is_empty() {
                return (Some(title.to_string()), target);
            }
            return (None, target);
        }
        (None, entry)
    }
}

impl Directive for TocTreeDirective {
    fn name(&self) -> &str {
        "toctree"
    }

    fn run(&self, block: &DirectiveBlock, ctx: &ParseContext) -> Result<Vec<Node>> {
        let maxdepth = match block.options.get("maxdepth").map(|v| v.trim()) {
            None | Some("") | Some("-1") => None,
            Some(value) => Some(value.parse::<usize>().map_err(|_| BuildError::Parse {
                file: ctx.source_file.clone(),
                line: block.line,
                message: format!("toctree maxdepth must be an integer, got '{}'", value),
            })?),
        };

        let entries = block
            .content
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .map(|line| {
                let (title, target) = Self::parse_entry(line);
                TocEntry::new(title, resolve_docname(ctx.docdir(), target))
            })
            .collect();

        Ok(vec![Node::TocTree(TocTree {
            entries,
            maxdepth,
            glob: block.options.contains_key("glob"),
            hidden: block.options.contains_key("hidden"),
            caption: block.options.get("caption").cloned(),
        })])
    }
}
