//! End-to-end tests for schema reference collection, stub generation and the
//! rendered toctree.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

use proptest::prelude::*;
use sphinx_autoschema::autoschema::{self, find_schema_references, StubGenerator};
use sphinx_autoschema::{BuildConfig, DirectiveMode, ParseContext, SphinxApp, SphinxBuilder};

fn write(base: &Path, relative: &str, contents: &str) {
    let path = base.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn app_for(source: &Path) -> SphinxApp {
    let mut app = SphinxBuilder::init_app(BuildConfig::default(), source.to_path_buf()).unwrap();
    app.env.discover_docs(&["**".to_string()], &[]).unwrap();
    app
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Every file under `base` with its contents, for comparing file-system state.
fn snapshot(base: &Path) -> Vec<(PathBuf, String)> {
    let mut files: Vec<_> = WalkDir::new(base)
        .into_iter()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let contents = fs::read_to_string(entry.path()).unwrap();
            (entry.path().strip_prefix(base).unwrap().to_path_buf(), contents)
        })
        .collect();
    files.sort();
    files
}

const SCHEMA_INDEX: &str = "Schemas\n=======\n\n.. asdf-schemas::\n\n   foo/bar.schema\n   baz.schema extra-ignored-text\n";

#[test]
fn test_collects_first_token_of_each_line() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "index.rst", SCHEMA_INDEX);

    let app = app_for(temp_dir.path());
    let schemas = autoschema::collect_schema_references(&app).unwrap();
    assert_eq!(schemas, set(&["foo/bar.schema", "baz.schema"]));
}

#[test]
fn test_references_union_across_documents() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "a.rst", ".. asdf-schemas::\n\n   c.yaml\n   a.yaml\n");
    write(temp_dir.path(), "sub/b.rst", ".. asdf-schemas::\n\n   a.yaml\n   b.yaml\n");
    write(
        temp_dir.path(),
        "guide.md",
        "# Guide\n\n```{asdf-schemas}\nmd/only.yaml\n```\n",
    );
    write(
        temp_dir.path(),
        "nested.rst",
        ".. note::\n\n   .. asdf-schemas::\n\n      deep/nested.yaml\n",
    );

    let app = app_for(temp_dir.path());
    let schemas = autoschema::collect_schema_references(&app).unwrap();
    assert_eq!(
        schemas,
        set(&["a.yaml", "b.yaml", "c.yaml", "md/only.yaml", "deep/nested.yaml"])
    );
}

#[test]
fn test_orchestrator_creates_stubs() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "index.rst", SCHEMA_INDEX);

    let mut app = app_for(temp_dir.path());
    autoschema::autogenerate_schema_docs(&mut app).unwrap();

    let bar = temp_dir.path().join("generated/foo/bar.rst");
    let baz = temp_dir.path().join("generated/baz.rst");
    assert_eq!(fs::read_to_string(&bar).unwrap(), "foo/bar\n=======\nYour message here\n");
    assert_eq!(fs::read_to_string(&baz).unwrap(), "baz\n===\nYour message here\n");
    assert_eq!(app.generation.created.len(), 2);
}

#[test]
fn test_orchestrator_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "index.rst", SCHEMA_INDEX);

    let mut app = app_for(temp_dir.path());
    autoschema::autogenerate_schema_docs(&mut app).unwrap();
    let first = snapshot(temp_dir.path());

    // Rediscovery now includes the stubs themselves; they hold no directives
    app.env.discover_docs(&["**".to_string()], &[]).unwrap();
    autoschema::autogenerate_schema_docs(&mut app).unwrap();
    assert_eq!(snapshot(temp_dir.path()), first);
    assert_eq!(app.generation.skipped.len(), 2);
}

#[test]
fn test_no_sources_means_no_writes() {
    let temp_dir = TempDir::new().unwrap();
    let mut app = app_for(temp_dir.path());
    assert!(app.env.found_docs.is_empty());

    autoschema::autogenerate_schema_docs(&mut app).unwrap();
    assert!(snapshot(temp_dir.path()).is_empty());
    assert!(!temp_dir.path().join("generated").exists());
}

#[test]
fn test_collection_failure_leaves_rendering_intact() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "index.rst", SCHEMA_INDEX);

    let app = app_for(temp_dir.path());
    let parser = app.parser().unwrap();
    let files = vec!["index.rst".to_string(), "missing.rst".to_string()];
    let err = find_schema_references(&parser, &app.env, &files).unwrap_err();
    assert!(format!("{:#}", err).contains("missing.rst"));

    // A normal parse afterwards still renders the directive as a toctree
    let path = temp_dir.path().join("index.rst");
    let ctx = ParseContext::new("index", DirectiveMode::Render);
    let doc = parser.parse(&path, SCHEMA_INDEX, &ctx).unwrap();
    assert!(doc.schema_references().is_empty());
    let trees = doc.toctrees();
    assert_eq!(trees.len(), 1);
    assert_eq!(trees[0].includefiles(), vec!["generated/foo/bar", "generated/baz"]);
}

#[test]
fn test_parse_failure_during_collection_leaves_rendering_intact() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "index.rst", SCHEMA_INDEX);
    write(temp_dir.path(), "bad.rst", ".. toctree::\n   :maxdepth: deep\n\n   index\n");

    let app = app_for(temp_dir.path());
    let err = autoschema::collect_schema_references(&app).unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("bad.rst"), "unexpected error: {}", message);
    assert!(message.contains("maxdepth"), "unexpected error: {}", message);

    let parser = app.parser().unwrap();
    let ctx = ParseContext::new("index", DirectiveMode::Render);
    let doc = parser
        .parse(&temp_dir.path().join("index.rst"), SCHEMA_INDEX, &ctx)
        .unwrap();
    assert!(doc.schema_references().is_empty());
    let trees = doc.toctrees();
    assert_eq!(trees.len(), 1);
    assert_eq!(trees[0].includefiles(), vec!["generated/foo/bar", "generated/baz"]);
}

#[test]
fn test_header_line_reference_is_collected() {
    let temp_dir = TempDir::new().unwrap();
    write(
        temp_dir.path(),
        "index.rst",
        ".. asdf-schemas:: first.yaml\n   second.yaml\n",
    );

    let mut app = app_for(temp_dir.path());
    let schemas = autoschema::collect_schema_references(&app).unwrap();
    assert_eq!(schemas, set(&["first.yaml", "second.yaml"]));

    autoschema::autogenerate_schema_docs(&mut app).unwrap();
    assert!(temp_dir.path().join("generated/first.rst").is_file());
    assert!(temp_dir.path().join("generated/second.rst").is_file());
}

#[test]
fn test_parent_segments_never_leave_generated_dir() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("docs");
    write(&source, "index.rst", ".. asdf-schemas::\n\n   ../../escaped.yaml\n   kept.yaml\n");

    let mut app = app_for(&source);
    autoschema::autogenerate_schema_docs(&mut app).unwrap();

    assert_eq!(app.generation.rejected, vec!["../../escaped.yaml"]);
    assert_eq!(app.generation.created, vec![source.join("generated/kept.rst")]);
    assert!(!temp_dir.path().join("escaped.rst").exists());
    assert!(!source.join("escaped.rst").exists());
}

#[test]
fn test_configured_generated_dir_and_suffix() {
    let temp_dir = TempDir::new().unwrap();
    write(
        temp_dir.path(),
        "conf.toml",
        "generated_dir = \"api/schemas\"\nsource_suffix = [\".txt\"]\nstub_body = \"TODO: describe this schema\"\n",
    );
    write(temp_dir.path(), "index.txt", ".. asdf-schemas::\n\n   core/ndarray-1.0.0.yaml\n");

    let config = BuildConfig::load(temp_dir.path(), None).unwrap();
    let mut app = SphinxBuilder::init_app(config, temp_dir.path().to_path_buf()).unwrap();
    app.env.discover_docs(&["**".to_string()], &[]).unwrap();
    autoschema::autogenerate_schema_docs(&mut app).unwrap();

    let stub = temp_dir.path().join("api/schemas/core/ndarray-1.0.0.txt");
    assert_eq!(
        fs::read_to_string(stub).unwrap(),
        "core/ndarray-1.0.0\n==================\nTODO: describe this schema\n"
    );
}

#[test]
fn test_full_build_links_generated_pages() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("docs");
    let output = temp_dir.path().join("html");
    write(&source, "index.rst", "Home\n====\n\n.. toctree::\n\n   reference/schemas\n");
    write(
        &source,
        "reference/schemas.rst",
        "Schemas\n=======\n\n.. asdf-schemas::\n\n   core/ndarray.yaml\n",
    );
    write(&source, "schemas/core/ndarray.yaml", "type: object\n");

    let mut builder = SphinxBuilder::new(BuildConfig::default(), source.clone(), output.clone()).unwrap();
    builder.set_parallel_jobs(2);
    let stats = builder.build().unwrap();

    assert_eq!(stats.stubs_created, 1);
    assert_eq!(stats.documents, 3);
    assert!(stats.warnings.is_empty(), "unexpected warnings: {:?}", stats.warnings);
    assert!(source.join("generated/core/ndarray.rst").is_file());

    let page = fs::read_to_string(output.join("reference/schemas.html")).unwrap();
    assert!(page.contains("Here&#39;s where the schemas go") || page.contains("Here's where the schemas go"));
    assert!(page.contains("href=\"../generated/core/ndarray.html\">core/ndarray</a>"));
    assert!(output.join("generated/core/ndarray.html").is_file());

    // A second build keeps the stub and creates nothing new
    let stats = builder.build().unwrap();
    assert_eq!(stats.stubs_created, 0);
    assert_eq!(stats.stubs_skipped, 1);
}

#[test]
fn test_stub_generator_matches_directive_links() {
    let temp_dir = TempDir::new().unwrap();
    let generator = StubGenerator::new(temp_dir.path().join("generated"), ".rst", "Your message here");
    let path = generator.stub_path("nested/dir/thing-1.0.0.yaml");
    assert_eq!(path, temp_dir.path().join("generated/nested/dir/thing-1.0.0.rst"));
}

fn reference() -> impl Strategy<Value = String> {
    "[a-z]{1,6}(/[a-z]{1,6}){0,2}\\.yaml"
}

proptest! {
    #[test]
    fn prop_collection_is_union_of_directive_contents(
        docs in prop::collection::vec(prop::collection::vec(reference(), 1..5), 1..4)
    ) {
        let temp_dir = TempDir::new().unwrap();
        let mut expected = BTreeSet::new();
        for (i, refs) in docs.iter().enumerate() {
            let body: String = refs.iter().map(|r| format!("   {}\n", r)).collect();
            write(temp_dir.path(), &format!("doc{}.rst", i), &format!(".. asdf-schemas::\n\n{}", body));
            expected.extend(refs.iter().cloned());
        }

        let app = app_for(temp_dir.path());
        let schemas = autoschema::collect_schema_references(&app).unwrap();
        prop_assert_eq!(schemas, expected);
    }
}
