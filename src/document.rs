//! Parsed document tree.

use std::collections::HashMap;
use std::path::PathBuf;

/// A node in a parsed document.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Title {
        text: String,
        level: usize,
        line: usize,
    },
    Paragraph {
        content: String,
        line: usize,
    },
    CodeBlock {
        language: Option<String>,
        content: String,
        line: usize,
    },
    LinkTarget {
        name: String,
        line: usize,
    },
    /// A directive occurrence. `children` holds what the directive produced
    /// (or, for unregistered containers, its parsed body).
    Directive {
        name: String,
        args: Vec<String>,
        options: HashMap<String, String>,
        content: String,
        line: usize,
        children: Vec<Node>,
    },
    TocTree(TocTree),
    /// Schema reference emitted by `asdf-schemas` while collecting.
    SchemaMarker(String),
}

impl Node {
    pub fn paragraph(content: impl Into<String>) -> Self {
        Node::Paragraph {
            content: content.into(),
            line: 0,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Directive { children, .. } => children,
            _ => &[],
        }
    }

    /// Depth-first, pre-order walk over this node and its descendants.
    pub fn walk<V: NodeVisitor + ?Sized>(&self, visitor: &mut V) {
        visitor.visit(self);
        for child in self.children() {
            child.walk(visitor);
        }
    }
}

/// Visitor applied by [`Node::walk`] and [`Document::walk`].
pub trait NodeVisitor {
    fn visit(&mut self, node: &Node);
}

/// Collects the text of every [`Node::SchemaMarker`] in a tree.
#[derive(Debug, Default)]
pub struct MarkerCollector {
    pub references: Vec<String>,
}

impl NodeVisitor for MarkerCollector {
    fn visit(&mut self, node: &Node) {
        if let Node::SchemaMarker(reference) = node {
            self.references.push(reference.clone());
        }
    }
}

/// A table-of-contents entry: optional display title and the target docname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub title: Option<String>,
    pub docname: String,
}

impl TocEntry {
    pub fn new(title: Option<String>, docname: impl Into<String>) -> Self {
        Self {
            title,
            docname: docname.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TocTree {
    pub entries: Vec<TocEntry>,
    /// `None` means unlimited depth.
    pub maxdepth: Option<usize>,
    pub glob: bool,
    pub hidden: bool,
    pub caption: Option<String>,
}

impl TocTree {
    pub fn includefiles(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.docname.as_str()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub docname: String,
    pub source_path: PathBuf,
    pub nodes: Vec<Node>,
}

impl Document {
    pub fn new(docname: impl Into<String>, source_path: PathBuf, nodes: Vec<Node>) -> Self {
        Self {
            docname: docname.into(),
            source_path,
            nodes,
        }
    }

    pub fn walk<V: NodeVisitor + ?Sized>(&self, visitor: &mut V) {
        for node in &self.nodes {
            node.walk(visitor);
        }
    }

    /// The first title in the document, at any level.
    pub fn title(&self) -> Option<&str> {
        self.nodes.iter().find_map(|node| match node {
            Node::Title { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn schema_references(&self) -> Vec<String> {
        let mut collector = MarkerCollector::default();
        self.walk(&mut collector);
        collector.references
    }

    pub fn toctrees(&self) -> Vec<&TocTree> {
        fn find<'a>(nodes: &'a [Node], out: &mut Vec<&'a TocTree>) {
            for node in nodes {
                if let Node::TocTree(tree) = node {
                    out.push(tree);
                }
                find(node.children(), out);
            }
        }
        let mut trees = Vec::new();
        find(&self.nodes, &mut trees);
        trees
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directive(name: &str, children: Vec<Node>) -> Node {
        Node::Directive {
            name: name.to_string(),
            args: Vec::new(),
            options: HashMap::new(),
            content: String::new(),
            line: 1,
            children,
        }
    }

    #[test]
    fn test_marker_collection_reaches_nested_nodes() {
        let doc = Document::new(
            "index",
            PathBuf::from("index.rst"),
            vec![
                Node::SchemaMarker("a.yaml".to_string()),
                directive(
                    "note",
                    vec![directive(
                        "asdf-schemas",
                        vec![Node::SchemaMarker("b/c.yaml".to_string())],
                    )],
                ),
                Node::paragraph("text"),
            ],
        );

        assert_eq!(doc.schema_references(), vec!["a.yaml", "b/c.yaml"]);
    }

    #[test]
    fn test_document_title_and_toctrees() {
        let tree = TocTree {
            entries: vec![TocEntry::new(None, "generated/a")],
            ..Default::default()
        };
        let doc = Document::new(
            "index",
            PathBuf::from("index.rst"),
            vec![
                Node::paragraph("preamble"),
                Node::Title {
                    text: "Schemas".to_string(),
                    level: 1,
                    line: 3,
                },
                directive("asdf-schemas", vec![Node::TocTree(tree.clone())]),
            ],
        );

        assert_eq!(doc.title(), Some("Schemas"));
        assert_eq!(doc.toctrees(), vec![&tree]);
        assert_eq!(tree.includefiles(), vec!["generated/a"]);
    }
}
