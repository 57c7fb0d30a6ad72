//! The `asdf-schemas` directive.

use anyhow::Result;
use log::warn;

use crate::directives::{Directive, DirectiveBlock, DirectiveMode, ParseContext};
use crate::document::{Node, TocEntry, TocTree};
use crate::environment::path_to_docname;

use super::DIRECTIVE_NAME;

pub const INTRO_TEXT: &str = "Here's where the schemas go";

/// First whitespace-delimited token of every non-blank content line.
pub fn schema_references(content: &[String]) -> Vec<&str> {
    content
        .iter()
        .filter_map(|line| line.split_whitespace().next())
        .collect()
}

/// Lists schema files. While collecting it emits one marker per reference;
/// otherwise it renders a toctree of the generated stub documents.
pub struct SchemaDirective {
    generated_dir: String,
}

impl SchemaDirective {
    pub fn new(generated_dir: impl Into<String>) -> Self {
        Self {
            generated_dir: generated_dir.into(),
        }
    }

    fn toctree(&self, references: &[&str]) -> Vec<Node> {
        let entries = references
            .iter()
            .map(|reference| {
                let schema = path_to_docname(reference);
                let link = format!("{}/{}", self.generated_dir, schema);
                TocEntry::new(Some(schema), link)
            })
            .collect();

        vec![
            Node::paragraph(INTRO_TEXT),
            Node::TocTree(TocTree {
                entries,
                maxdepth: None,
                glob: false,
                hidden: false,
                caption: None,
            }),
        ]
    }
}

impl Directive for SchemaDirective {
    fn name(&self) -> &str {
        DIRECTIVE_NAME
    }

    fn run(&self, block: &DirectiveBlock, ctx: &ParseContext) -> Result<Vec<Node>> {
        if !block.options.is_empty() {
            warn!(
                "{}:{}: {} takes no options; ignoring them",
                ctx.source_file, block.line, DIRECTIVE_NAME
            );
        }

        // Text after the directive marker is the first content line
        let mut content = Vec::with_capacity(block.content.len() + 1);
        if !block.arguments.is_empty() {
            content.push(block.arguments.join(" "));
        }
        content.extend(block.content.iter().cloned());

        let references = schema_references(&content);
        Ok(match ctx.mode {
            DirectiveMode::Collect => references
                .into_iter()
                .map(|reference| Node::SchemaMarker(reference.to_string()))
                .collect(),
            DirectiveMode::Render => self.toctree(&references),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(content: &str) -> DirectiveBlock {
        DirectiveBlock {
            name: DIRECTIVE_NAME.to_string(),
            content: content.lines().map(String::from).collect(),
            line: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_collect_mode_emits_markers() {
        let ctx = ParseContext::new("index", DirectiveMode::Collect);
        let nodes = SchemaDirective::new("generated")
            .run(&block("foo/bar.schema\n\n  baz.schema extra-ignored-text\n"), &ctx)
            .unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::SchemaMarker("foo/bar.schema".to_string()),
                Node::SchemaMarker("baz.schema".to_string()),
            ]
        );
    }

    #[test]
    fn test_render_mode_builds_toctree() {
        let ctx = ParseContext::new("reference/schemas", DirectiveMode::Render);
        let nodes = SchemaDirective::new("generated")
            .run(&block("core/ndarray-1.0.0.yaml\nasdf-1.1.0.yaml\n"), &ctx)
            .unwrap();

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0], Node::paragraph(INTRO_TEXT));
        let Node::TocTree(tree) = &nodes[1] else {
            panic!("expected a toctree, got {:?}", nodes[1]);
        };
        assert_eq!(tree.maxdepth, None);
        assert!(!tree.glob);
        // Links point into the generated namespace, not relative to the document
        assert_eq!(
            tree.entries,
            vec![
                TocEntry::new(Some("core/ndarray-1.0.0".to_string()), "generated/core/ndarray-1.0.0"),
                TocEntry::new(Some("asdf-1.1.0".to_string()), "generated/asdf-1.1.0"),
            ]
        );
    }

    #[test]
    fn test_header_text_is_first_reference() {
        let ctx = ParseContext::new("index", DirectiveMode::Collect);
        let mut header = block("second.yaml\n");
        header.arguments = vec!["first.yaml".to_string()];
        let nodes = SchemaDirective::new("generated").run(&header, &ctx).unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::SchemaMarker("first.yaml".to_string()),
                Node::SchemaMarker("second.yaml".to_string()),
            ]
        );
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let content: Vec<String> = vec!["".into(), "   ".into(), "a.yaml b".into()];
        assert_eq!(schema_references(&content), vec!["a.yaml"]);
    }
}
