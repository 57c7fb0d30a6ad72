//! Build environment: source root, known documents and path/docname mapping.

use anyhow::Result;
use log::debug;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::config::BuildConfig;
use crate::matching;

/// Derive a logical document name from a relative path.
///
/// Backslashes become `/`, leading `./` and `/` are dropped and the final
/// extension of the last segment is removed. A file name that starts with a
/// dot and has no other dot keeps its name.
pub fn path_to_docname(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let mut trimmed = normalized.as_str();
    loop {
        if let Some(rest) = trimmed.strip_prefix("./") {
            trimmed = rest;
        } else if let Some(rest) = trimmed.strip_prefix('/') {
            trimmed = rest;
        } else {
            break;
        }
    }

    let (dir, file) = match trimmed.rfind('/') {
        Some(pos) => (&trimmed[..=pos], &trimmed[pos + 1..]),
        None => ("", trimmed),
    };
    let stem = match file.rfind('.') {
        Some(pos) if pos > 0 => &file[..pos],
        _ => file,
    };
    format!("{}{}", dir, stem)
}

/// Whether a docname climbs above its root through a `..` segment.
pub fn escapes_root(docname: &str) -> bool {
    docname.split('/').any(|segment| segment == "..")
}

#[derive(Debug, Clone)]
pub struct BuildEnvironment {
    pub srcdir: PathBuf,
    pub source_suffix: Vec<String>,
    pub found_docs: BTreeSet<String>,
    /// Document titles keyed by docname, filled in before rendering.
    pub titles: HashMap<String, String>,
}

impl BuildEnvironment {
    pub fn new(srcdir: impl Into<PathBuf>, config: &BuildConfig) -> Self {
        Self {
            srcdir: srcdir.into(),
            source_suffix: config.source_suffix.clone(),
            found_docs: BTreeSet::new(),
            titles: HashMap::new(),
        }
    }

    pub fn default_suffix(&self) -> &str {
        self.source_suffix.first().map(String::as_str).unwrap_or(".rst")
    }

    pub fn has_source_suffix(&self, name: &str) -> bool {
        self.source_suffix.iter().any(|suffix| name.ends_with(suffix.as_str()))
    }

    /// Append the default suffix to a file name lacking a recognized one.
    pub fn ensure_source_suffix(&self, name: &str) -> String {
        if self.has_source_suffix(name) {
            name.to_string()
        } else {
            format!("{}{}", name, self.default_suffix())
        }
    }

    /// Map a path (relative to the source root, or absolute inside it) to a docname.
    pub fn path2doc(&self, path: &str) -> String {
        let path = Path::new(path);
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.srcdir).unwrap_or(path)
        } else {
            path
        };
        let relative = matching::normalize_path(relative);

        match self
            .source_suffix
            .iter()
            .find(|suffix| relative.ends_with(suffix.as_str()))
        {
            Some(suffix) => path_to_docname(&relative[..relative.len() - suffix.len()]),
            None => path_to_docname(&relative),
        }
    }

    /// Source file name of a document relative to the source root.
    ///
    /// Prefers a suffix whose file exists on disk, falling back to the default.
    pub fn doc2relpath(&self, docname: &str) -> String {
        self.source_suffix
            .iter()
            .map(|suffix| format!("{}{}", docname, suffix))
            .find(|name| self.srcdir.join(name).is_file())
            .unwrap_or_else(|| format!("{}{}", docname, self.default_suffix()))
    }

    /// Scan the source root and replace `found_docs`.
    pub fn discover_docs(
        &mut self,
        include_patterns: &[String],
        exclude_patterns: &[String],
    ) -> Result<usize> {
        let files = matching::get_matching_files(&self.srcdir, include_patterns, exclude_patterns)?;
        let srcdir = self.srcdir.canonicalize().unwrap_or_else(|_| self.srcdir.clone());

        let mut docs = BTreeSet::new();
        for file in files {
            let name = matching::normalize_path(file.strip_prefix(&srcdir).unwrap_or(&file));
            if self.has_source_suffix(&name) {
                docs.insert(self.path2doc(&name));
            }
        }

        debug!("Found {} documents in {}", docs.len(), self.srcdir.display());
        self.found_docs = docs;
        Ok(self.found_docs.len())
    }
}
