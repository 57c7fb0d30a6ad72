use anyhow::{Context, Result};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::autoschema::{self, GenerationReport};
use crate::config::BuildConfig;
use crate::directives::{DirectiveMode, ParseContext};
use crate::document::Document;
use crate::environment::BuildEnvironment;
use crate::extensions::{Event, ExtensionLoader, SphinxApp};
use crate::matching;
use crate::parser::Parser;
use crate::renderer::HtmlRenderer;

#[derive(Debug, Clone)]
pub struct BuildStats {
    pub documents: usize,
    pub stubs_created: usize,
    pub stubs_skipped: usize,
    pub build_time: Duration,
    pub warnings: Vec<String>,
}

pub struct SphinxBuilder {
    app: SphinxApp,
    output_dir: PathBuf,
    parallel_jobs: usize,
}

impl SphinxBuilder {
    pub fn new(config: BuildConfig, source_dir: PathBuf, output_dir: PathBuf) -> Result<Self> {
        let parallel_jobs = config.parallel_jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        });

        let app = Self::init_app(config, source_dir)?;
        Ok(Self {
            app,
            output_dir,
            parallel_jobs,
        })
    }

    /// Application with every configured extension set up. Unknown
    /// extensions are skipped with a warning.
    pub fn init_app(config: BuildConfig, source_dir: PathBuf) -> Result<SphinxApp> {
        let env = BuildEnvironment::new(source_dir, &config);
        let extensions = config.extensions.clone();
        let mut app = SphinxApp::new(config, env);

        let loader = ExtensionLoader::new();
        for extension_name in &extensions {
            match loader.load_extension(extension_name) {
                Ok(extension) => app.add_extension(extension)?,
                Err(e) => warn!("Failed to load extension '{}': {}", extension_name, e),
            }
        }
        Ok(app)
    }

    pub fn set_parallel_jobs(&mut self, jobs: usize) {
        self.parallel_jobs = jobs.max(1);
    }

    pub fn clean(&self) -> Result<()> {
        if self.output_dir.exists() {
            std::fs::remove_dir_all(&self.output_dir).with_context(|| {
                format!("Failed to remove output directory: {}", self.output_dir.display())
            })?;
        }
        Ok(())
    }

    /// Exclude patterns from the configuration plus build artifacts and the
    /// output directory when it sits inside the source tree.
    fn exclude_patterns(&self) -> Vec<String> {
        let mut patterns = self.app.config.exclude_patterns.clone();
        patterns.extend(
            ["_build/**", ".*/**", "__pycache__/**"]
                .iter()
                .map(|s| s.to_string()),
        );

        let source = &self.app.env.srcdir;
        let canonical_source = source.canonicalize().unwrap_or_else(|_| source.clone());
        let canonical_output = self.output_dir.canonicalize().unwrap_or_else(|_| {
            if self.output_dir.is_relative() {
                canonical_source.join(&self.output_dir)
            } else {
                self.output_dir.clone()
            }
        });
        if let Ok(relative) = canonical_output.strip_prefix(&canonical_source) {
            let relative = matching::normalize_path(relative);
            if !relative.is_empty() {
                debug!("Excluding output directory {}", relative);
                patterns.push(format!("{}/**", relative));
            }
        }
        patterns
    }

    fn discover(&mut self) -> Result<usize> {
        let include = self.app.config.include_patterns.clone();
        let exclude = self.exclude_patterns();
        self.app.env.discover_docs(&include, &exclude)
    }

    /// Discover sources and run the `builder-inited` listeners only.
    pub fn generate_stubs(&mut self) -> Result<GenerationReport> {
        let found = self.discover()?;
        info!("Discovered {} source documents", found);
        self.app.generation = GenerationReport::default();
        self.app.emit(Event::BuilderInited)?;
        Ok(self.app.generation.clone())
    }

    /// Discover sources and collect their schema references without writing anything.
    pub fn schema_references(&mut self) -> Result<BTreeSet<String>> {
        self.discover()?;
        autoschema::collect_schema_references(&self.app)
    }

    pub fn build(&mut self) -> Result<BuildStats> {
        let start_time = Instant::now();
        info!("Starting build process...");

        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output directory: {}", self.output_dir.display())
        })?;

        let found = self.discover()?;
        info!("Discovered {} source documents", found);

        // Stub generation runs here, before any document is rendered
        self.app.generation = GenerationReport::default();
        self.app.emit(Event::BuilderInited)?;

        let found = self.discover()?;
        debug!("{} source documents after initialization", found);
        self.app.emit(Event::EnvUpdated)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.parallel_jobs)
            .build()?;
        let parser = self.app.parser()?;
        let env = &self.app.env;
        let docnames: Vec<&String> = env.found_docs.iter().collect();

        // First pass: parse everything and record titles for toctree links
        let documents: Vec<Document> = pool.install(|| {
            docnames
                .par_iter()
                .map(|docname| Self::read_document(&parser, env, docname))
                .collect::<Result<Vec<_>>>()
        })?;
        let titles: HashMap<String, String> = documents
            .iter()
            .filter_map(|doc| doc.title().map(|t| (doc.docname.clone(), t.to_string())))
            .collect();

        // Second pass: render and write
        let renderer = HtmlRenderer::with_titles(titles.clone());
        pool.install(|| {
            documents
                .par_iter()
                .map(|doc| self.write_document(&renderer, doc))
                .collect::<Result<Vec<_>>>()
        })?;
        self.app.env.titles = titles;

        let mut warnings: Vec<String> = self
            .app
            .generation
            .rejected
            .iter()
            .map(|schema| format!("schema reference '{}' points outside the source tree", schema))
            .collect();
        warnings.extend(self.check_toctree_references(&documents));
        for warning in &warnings {
            warn!("{}", warning);
        }

        self.app.emit(Event::BuildFinished)?;

        let stats = BuildStats {
            documents: documents.len(),
            stubs_created: self.app.generation.created.len(),
            stubs_skipped: self.app.generation.skipped.len(),
            build_time: start_time.elapsed(),
            warnings,
        };
        info!("Build completed in {:?}", stats.build_time);
        Ok(stats)
    }

    fn read_document(parser: &Parser, env: &BuildEnvironment, docname: &str) -> Result<Document> {
        let relpath = env.doc2relpath(docname);
        let path = env.srcdir.join(&relpath);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read source file: {}", path.display()))?;
        let ctx = ParseContext::new(docname, DirectiveMode::Render).with_source_file(relpath);
        parser.parse(&path, &content, &ctx)
    }

    fn output_path(&self, docname: &str) -> PathBuf {
        self.output_dir.join(format!("{}.html", docname))
    }

    fn write_document(&self, renderer: &HtmlRenderer, document: &Document) -> Result<()> {
        let body = renderer.render_document(document);
        let html = self.render_full_html(document, &body);

        let output_path = self.output_path(&document.docname);
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }
        std::fs::write(&output_path, html)
            .with_context(|| format!("Failed to write output file: {}", output_path.display()))?;
        debug!("Wrote {}", output_path.display());
        Ok(())
    }

    fn render_full_html(&self, document: &Document, body_html: &str) -> String {
        let config = &self.app.config;
        let page_title = match document.title() {
            Some(title) => format!("{} — {}", title, config.project),
            None => config.project.clone(),
        };

        format!(
            r#"<!DOCTYPE html>
<html lang="{}">
<head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>{}</title>
</head>
<body>
{}
</body>
</html>
"#,
            config.language.as_deref().unwrap_or("en"),
            html_escape::encode_text(&page_title),
            body_html
        )
    }

    /// Toctree entries pointing at documents that do not exist.
    fn check_toctree_references(&self, documents: &[Document]) -> Vec<String> {
        let mut warnings = Vec::new();
        for doc in documents {
            for tree in doc.toctrees() {
                for target in tree.includefiles() {
                    if !self.app.env.found_docs.contains(target) {
                        warnings.push(format!(
                            "{}: toctree contains reference to nonexisting document '{}'",
                            doc.source_path.display(),
                            target
                        ));
                    }
                }
            }
        }
        warnings
    }
}
