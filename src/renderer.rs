//! Tree-to-HTML renderer for parsed documents.

use std::collections::HashMap;
use std::path::Path;

use crate::document::{Document, Node, TocTree};

pub struct HtmlRenderer {
    /// Map of docnames to their titles (e.g., "intro" -> "Introduction")
    document_titles: HashMap<String, String>,
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Link from the directory of `from_docname` to the page of `to_docname`.
pub fn relative_href(from_docname: &str, to_docname: &str) -> String {
    let target = format!("{}.html", to_docname);
    let from_dir = Path::new(from_docname).parent().unwrap_or(Path::new(""));
    pathdiff::diff_paths(Path::new(&target), from_dir)
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or(target)
}

impl HtmlRenderer {
    pub fn new() -> Self {
        Self {
            document_titles: HashMap::new(),
        }
    }

    pub fn with_titles(document_titles: HashMap<String, String>) -> Self {
        Self { document_titles }
    }

    /// Render a document body, wrapping content in nested sections by title level.
    pub fn render_document(&self, document: &Document) -> String {
        let mut html = String::new();
        let mut open_sections: Vec<usize> = Vec::new();

        for node in &document.nodes {
            if let Node::Title { level, text, .. } = node {
                let level = (*level).clamp(1, 6);
                while open_sections.last().is_some_and(|open| *open >= level) {
                    html.push_str("</section>\n");
                    open_sections.pop();
                }
                let anchor = text.to_lowercase().replace(|c: char| !c.is_alphanumeric(), "-");
                html.push_str(&format!(
                    "<section id=\"{}\">\n<h{}>{}</h{}>\n",
                    html_escape::encode_double_quoted_attribute(&anchor),
                    level,
                    html_escape::encode_text(text),
                    level
                ));
                open_sections.push(level);
                continue;
            }
            html.push_str(&self.render_node(node, &document.docname));
            html.push('\n');
        }

        for _ in open_sections {
            html.push_str("</section>\n");
        }
        html
    }

    fn render_node(&self, node: &Node, docname: &str) -> String {
        match node {
            Node::Title { text, level, .. } => {
                let level = (*level).clamp(1, 6);
                format!("<h{}>{}</h{}>", level, html_escape::encode_text(text), level)
            }
            Node::Paragraph { content, .. } => {
                format!("<p>{}</p>", html_escape::encode_text(content))
            }
            Node::CodeBlock {
                language, content, ..
            } => {
                let class = language.as_deref().unwrap_or("default");
                format!(
                    "<div class=\"highlight-{}\"><pre>{}</pre></div>",
                    html_escape::encode_double_quoted_attribute(class),
                    html_escape::encode_text(content)
                )
            }
            Node::LinkTarget { name, .. } => {
                format!(
                    "<span id=\"{}\"></span>",
                    html_escape::encode_double_quoted_attribute(name)
                )
            }
            Node::Directive {
                name,
                args,
                content,
                children,
                ..
            } => {
                if children.is_empty() {
                    if content.is_empty() {
                        return String::new();
                    }
                    // Literal bodies (code-block and friends)
                    let class = args.first().map(String::as_str).unwrap_or(name);
                    return format!(
                        "<div class=\"highlight-{}\"><pre>{}</pre></div>",
                        html_escape::encode_double_quoted_attribute(class),
                        html_escape::encode_text(content)
                    );
                }
                let inner: Vec<String> = children
                    .iter()
                    .map(|child| self.render_node(child, docname))
                    .filter(|html| !html.is_empty())
                    .collect();
                format!(
                    "<div class=\"{}\">\n{}\n</div>",
                    html_escape::encode_double_quoted_attribute(name),
                    inner.join("\n")
                )
            }
            Node::TocTree(tree) => self.render_toctree(tree, docname),
            // Collect-mode only; never rendered
            Node::SchemaMarker(_) => String::new(),
        }
    }

    fn render_toctree(&self, tree: &TocTree, docname: &str) -> String {
        let mut html = String::new();

        if tree.hidden {
            html.push_str("<div class=\"toctree-wrapper\" style=\"display: none;\">\n");
        } else {
            html.push_str("<div class=\"toctree-wrapper\">\n");
        }

        if let Some(caption) = &tree.caption {
            html.push_str(&format!(
                "<p class=\"caption\"><span class=\"caption-text\">{}</span></p>\n",
                html_escape::encode_text(caption)
            ));
        }

        if !tree.entries.is_empty() {
            html.push_str("<ul>\n");
            for entry in &tree.entries {
                // Explicit title, then the registered document title, then the docname
                let title = entry
                    .title
                    .as_deref()
                    .or_else(|| self.document_titles.get(&entry.docname).map(String::as_str))
                    .unwrap_or(&entry.docname);
                let href = relative_href(docname, &entry.docname);

                html.push_str(&format!(
                    "<li class=\"toctree-l1\"><a class=\"reference internal\" href=\"{}\">{}</a></li>\n",
                    html_escape::encode_double_quoted_attribute(&href),
                    html_escape::encode_text(title)
                ));
            }
            html.push_str("</ul>\n");
        }

        html.push_str("</div>");
        html
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::TocEntry;
    use std::path::PathBuf;

    fn doc(docname: &str, nodes: Vec<Node>) -> Document {
        Document::new(docname, PathBuf::from(format!("{}.rst", docname)), nodes)
    }

    #[test]
    fn test_relative_href() {
        assert_eq!(relative_href("index", "generated/a"), "generated/a.html");
        assert_eq!(relative_href("guide/schemas", "generated/a"), "../generated/a.html");
        assert_eq!(relative_href("generated/core/x", "generated/core/y"), "y.html");
    }

    #[test]
    fn test_toctree_titles_and_links() {
        let renderer = HtmlRenderer::with_titles(HashMap::from([(
            "intro".to_string(),
            "Introduction".to_string(),
        )]));

        let tree = TocTree {
            entries: vec![
                TocEntry::new(None, "intro"),
                TocEntry::new(Some("ndarray".to_string()), "generated/ndarray"),
                TocEntry::new(None, "unknown"),
            ],
            caption: Some("Contents".to_string()),
            ..Default::default()
        };
        let html = renderer.render_document(&doc("index", vec![Node::TocTree(tree)]));

        assert!(html.contains("toctree-wrapper"));
        assert!(html.contains("<span class=\"caption-text\">Contents</span>"));
        assert!(html.contains("href=\"intro.html\">Introduction</a>"));
        assert!(html.contains("href=\"generated/ndarray.html\">ndarray</a>"));
        assert!(html.contains("href=\"unknown.html\">unknown</a>"));
    }

    #[test]
    fn test_hidden_toctree() {
        let tree = TocTree {
            entries: vec![TocEntry::new(None, "intro")],
            hidden: true,
            ..Default::default()
        };
        let html = HtmlRenderer::new().render_document(&doc("index", vec![Node::TocTree(tree)]));
        assert!(html.contains("display: none;"));
    }

    #[test]
    fn test_sections_nest_by_level() {
        let nodes = vec![
            Node::Title {
                text: "Top".to_string(),
                level: 1,
                line: 1,
            },
            Node::paragraph("a < b"),
            Node::Title {
                text: "Child".to_string(),
                level: 2,
                line: 5,
            },
            Node::Title {
                text: "Sibling".to_string(),
                level: 1,
                line: 9,
            },
            Node::SchemaMarker("ignored.yaml".to_string()),
        ];
        let html = HtmlRenderer::new().render_document(&doc("index", nodes));

        assert!(html.contains("<p>a &lt; b</p>"));
        assert_eq!(html.matches("<section").count(), 3);
        assert_eq!(html.matches("</section>").count(), 3);
        assert!(!html.contains("ignored.yaml"));
    }
}
