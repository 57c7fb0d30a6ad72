use anyhow::{Context, Result};
use log::debug;
use pulldown_cmark::{CodeBlockKind, Event, Parser as MarkdownParser, Tag, TagEnd};
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

use crate::directives::{DirectiveBlock, DirectiveRegistry, ParseContext};
use crate::document::{Document, Node};

/// Directives whose body is literal text rather than nested markup.
const LITERAL_DIRECTIVES: &[&str] = &[
    "code-block",
    "code",
    "sourcecode",
    "literalinclude",
    "raw",
    "math",
    "highlight",
];

const ADORNMENT_CHARS: &str = "=-~^\"'*+#<>_";

pub struct Parser {
    rst_directive_regex: Regex,
    option_regex: Regex,
    myst_directive_regex: Regex,
    directive_registry: DirectiveRegistry,
}

/// Mutable state for one reStructuredText parse.
#[derive(Default)]
struct RstState {
    /// Adornment styles in order of first appearance: (char, has overline).
    title_styles: Vec<(char, bool)>,
}

impl RstState {
    fn level_for(&mut self, style: (char, bool)) -> usize {
        match self.title_styles.iter().position(|s| *s == style) {
            Some(pos) => pos + 1,
            None => {
                self.title_styles.push(style);
                self.title_styles.len()
            }
        }
    }
}

fn is_adornment(line: &str) -> bool {
    let trimmed = line.trim_end();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) if ADORNMENT_CHARS.contains(first) => chars.all(|c| c == first),
        _ => false,
    }
}

fn is_indented(line: &str) -> bool {
    line.starts_with(' ') || line.starts_with('\t')
}

fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 8 } else { 1 })
        .sum()
}

/// Remove the common indentation from a block of lines.
fn dedent(lines: &[&str]) -> Vec<String> {
    let common = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| indent_width(l))
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                return String::new();
            }
            let mut width = 0;
            let mut start = 0;
            for (idx, c) in line.char_indices() {
                if width >= common || !(c == ' ' || c == '\t') {
                    start = idx;
                    break;
                }
                width += if c == '\t' { 8 } else { 1 };
                start = idx + c.len_utf8();
            }
            line[start..].to_string()
        })
        .collect()
}

fn line_of_offset(content: &str, offset: usize) -> usize {
    content[..offset.min(content.len())].matches('\n').count() + 1
}

impl Parser {
    pub fn new(directive_registry: DirectiveRegistry) -> Result<Self> {
        let rst_directive_regex = Regex::new(r"^\.\.\s+([A-Za-z0-9_][\w:.-]*?)::(?:\s+(.*?))?\s*$")?;
        let option_regex = Regex::new(r"^:([A-Za-z][\w-]*):(?:\s+(.*?))?\s*$")?;
        let myst_directive_regex = Regex::new(r"^\{([A-Za-z0-9_][\w:.-]*)\}\s*(.*?)\s*$")?;

        Ok(Self {
            rst_directive_regex,
            option_regex,
            myst_directive_regex,
            directive_registry,
        })
    }

    /// Parse a source file's contents. Markdown is chosen by the `.md`
    /// extension, everything else is read as reStructuredText.
    pub fn parse(&self, source_path: &Path, content: &str, ctx: &ParseContext) -> Result<Document> {
        let is_markdown = source_path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("md"));

        let parsed = if is_markdown {
            self.parse_markdown(content, ctx)
        } else {
            self.parse_rst(content, ctx)
        };
        let nodes =
            parsed.with_context(|| format!("Failed to parse {}", source_path.display()))?;

        debug!(
            "Parsed {} ({:?} mode, {} top-level nodes)",
            ctx.docname,
            ctx.mode,
            nodes.len()
        );

        Ok(Document::new(ctx.docname.clone(), source_path.to_path_buf(), nodes))
    }

    /// Parse reStructuredText text with no associated file.
    pub fn parse_rst(&self, content: &str, ctx: &ParseContext) -> Result<Vec<Node>> {
        let lines: Vec<&str> = content.lines().collect();
        self.parse_rst_lines(&lines, 1, ctx, &mut RstState::default())
    }

    fn parse_rst_lines(
        &self,
        lines: &[&str],
        first_line: usize,
        ctx: &ParseContext,
        state: &mut RstState,
    ) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];
            let trimmed = line.trim();
            let line_no = first_line + i;

            if trimmed.is_empty() {
                i += 1;
                continue;
            }

            if let Some(captures) = self.rst_directive_regex.captures(line) {
                let name = captures.get(1).map_or("", |m| m.as_str());
                let args = captures.get(2).map_or("", |m| m.as_str());
                let (node, consumed) =
                    self.parse_rst_directive(&lines[i..], name, args, line_no, ctx, state)?;
                nodes.push(node);
                i += consumed;
                continue;
            }

            // Title with overline and underline
            if is_adornment(line) && i + 2 < lines.len() {
                let title = lines[i + 1].trim();
                let under = lines[i + 2].trim_end();
                if !title.is_empty()
                    && is_adornment(under)
                    && under.trim() == line.trim_end()
                    && under.chars().count() >= title.chars().count()
                {
                    let style = (under.chars().next().unwrap_or('='), true);
                    nodes.push(Node::Title {
                        text: title.to_string(),
                        level: state.level_for(style),
                        line: line_no + 1,
                    });
                    i += 3;
                    continue;
                }
            }

            // Title with underline only
            if !is_indented(line) && i + 1 < lines.len() && is_adornment(lines[i + 1]) {
                let underline = lines[i + 1].trim_end();
                if underline.chars().count() >= trimmed.chars().count() {
                    let style = (underline.chars().next().unwrap_or('='), false);
                    nodes.push(Node::Title {
                        text: trimmed.to_string(),
                        level: state.level_for(style),
                        line: line_no,
                    });
                    i += 2;
                    continue;
                }
            }

            // Internal hyperlink target: .. _name:
            if let Some(name) = trimmed
                .strip_prefix(".. _")
                .and_then(|rest| rest.strip_suffix(':'))
                .filter(|name| !name.is_empty() && !name.contains(' '))
            {
                nodes.push(Node::LinkTarget {
                    name: name.to_string(),
                    line: line_no,
                });
                i += 1;
                continue;
            }

            // Comment, with any indented continuation
            if trimmed == ".." || line.starts_with(".. ") {
                i += 1;
                while i < lines.len() && (lines[i].trim().is_empty() || is_indented(lines[i])) {
                    i += 1;
                }
                continue;
            }

            // Block quote
            if is_indented(line) {
                let consumed = Self::indented_block_len(&lines[i..]);
                let content = dedent(&lines[i..i + consumed]).join("\n");
                nodes.push(Node::Paragraph {
                    content: content.trim().to_string(),
                    line: line_no,
                });
                i += consumed;
                continue;
            }

            // Paragraph, possibly introducing a literal block with "::"
            let mut paragraph = Vec::new();
            while i < lines.len() && !lines[i].trim().is_empty() {
                paragraph.push(lines[i].trim());
                i += 1;
            }
            let text = paragraph.join(" ");
            if let Some(stripped) = text.strip_suffix("::") {
                // "Text::" keeps one colon, "Text ::" and a bare "::" keep none
                let intro = if stripped.ends_with(char::is_whitespace) || stripped.is_empty() {
                    stripped.trim_end().to_string()
                } else {
                    format!("{}:", stripped)
                };
                if !intro.is_empty() {
                    nodes.push(Node::Paragraph {
                        content: intro,
                        line: line_no,
                    });
                }
                while i < lines.len() && lines[i].trim().is_empty() {
                    i += 1;
                }
                let consumed = Self::indented_block_len(&lines[i..]);
                if consumed > 0 {
                    nodes.push(Node::CodeBlock {
                        language: None,
                        content: dedent(&lines[i..i + consumed]).join("\n").trim_end().to_string(),
                        line: first_line + i,
                    });
                }
                i += consumed;
            } else {
                nodes.push(Node::Paragraph {
                    content: text,
                    line: line_no,
                });
            }
        }

        Ok(nodes)
    }

    /// Number of leading lines that are indented or blank, without trailing blanks.
    fn indented_block_len(lines: &[&str]) -> usize {
        let mut end = 0;
        for (idx, line) in lines.iter().enumerate() {
            if is_indented(line) && !line.trim().is_empty() {
                end = idx + 1;
            } else if !line.trim().is_empty() {
                break;
            }
        }
        end
    }

    fn parse_rst_directive(
        &self,
        lines: &[&str],
        name: &str,
        args: &str,
        line_no: usize,
        ctx: &ParseContext,
        state: &mut RstState,
    ) -> Result<(Node, usize)> {
        let body_len = Self::indented_block_len(&lines[1..]);
        let body = dedent(&lines[1..1 + body_len]);

        let mut options = HashMap::new();
        let mut idx = 0;
        while idx < body.len() {
            match self.option_regex.captures(&body[idx]) {
                Some(captures) => {
                    let key = captures.get(1).map_or("", |m| m.as_str());
                    let value = captures.get(2).map_or("", |m| m.as_str());
                    options.insert(key.to_string(), value.to_string());
                    idx += 1;
                }
                None => break,
            }
        }
        while idx < body.len() && body[idx].is_empty() {
            idx += 1;
        }
        let content: Vec<String> = body[idx..].to_vec();
        // Line of the first content line in the source
        let content_line = line_no + 1 + idx;

        let block = DirectiveBlock {
            name: name.to_string(),
            arguments: args.split_whitespace().map(String::from).collect(),
            options,
            content,
            line: line_no,
        };

        let children = self.run_directive(&block, content_line, ctx, state)?;
        let node = Node::Directive {
            name: block.name,
            args: block.arguments,
            options: block.options,
            content: block.content.join("\n"),
            line: line_no,
            children,
        };
        Ok((node, 1 + body_len))
    }

    fn run_directive(
        &self,
        block: &DirectiveBlock,
        content_line: usize,
        ctx: &ParseContext,
        state: &mut RstState,
    ) -> Result<Vec<Node>> {
        if let Some(handler) = self.directive_registry.get(&block.name) {
            return handler.run(block, ctx);
        }
        if LITERAL_DIRECTIVES.contains(&block.name.as_str()) {
            return Ok(Vec::new());
        }
        let lines: Vec<&str> = block.content.iter().map(String::as_str).collect();
        self.parse_rst_lines(&lines, content_line, ctx, state)
    }

    fn parse_markdown(&self, content: &str, ctx: &ParseContext) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        let mut text = String::new();
        let mut start_line = 1;
        let mut fence_info: Option<String> = None;

        for (event, range) in MarkdownParser::new(content).into_offset_iter() {
            match event {
                Event::Start(Tag::Heading { .. })
                | Event::Start(Tag::Paragraph)
                | Event::Start(Tag::CodeBlock(CodeBlockKind::Indented)) => {
                    text.clear();
                    start_line = line_of_offset(content, range.start);
                }
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                    text.clear();
                    start_line = line_of_offset(content, range.start);
                    fence_info = Some(info.to_string());
                }
                Event::Text(t) | Event::Code(t) => text.push_str(&t),
                Event::SoftBreak | Event::HardBreak => text.push(' '),
                Event::End(TagEnd::Heading(level)) => {
                    nodes.push(Node::Title {
                        text: text.trim().to_string(),
                        level: level as usize,
                        line: start_line,
                    });
                }
                Event::End(TagEnd::Paragraph) => {
                    nodes.push(Node::Paragraph {
                        content: text.trim().to_string(),
                        line: start_line,
                    });
                }
                Event::End(TagEnd::CodeBlock) => {
                    let info = fence_info.take().unwrap_or_default();
                    match self.myst_directive_regex.captures(info.trim()) {
                        Some(captures) => {
                            let name = captures.get(1).map_or("", |m| m.as_str());
                            let args = captures.get(2).map_or("", |m| m.as_str());
                            let node = self.myst_directive(name, args, &text, start_line, ctx)?;
                            nodes.push(node);
                        }
                        None => {
                            let language = info.split_whitespace().next().map(String::from);
                            nodes.push(Node::CodeBlock {
                                language,
                                content: text.trim_end().to_string(),
                                line: start_line,
                            });
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(nodes)
    }

    /// A MyST fenced directive: leading `:key: value` lines are options.
    fn myst_directive(
        &self,
        name: &str,
        args: &str,
        body: &str,
        line_no: usize,
        ctx: &ParseContext,
    ) -> Result<Node> {
        let lines: Vec<&str> = body.lines().collect();
        let mut options = HashMap::new();
        let mut idx = 0;
        while let Some(captures) = lines.get(idx).and_then(|l| self.option_regex.captures(l)) {
            let key = captures.get(1).map_or("", |m| m.as_str());
            let value = captures.get(2).map_or("", |m| m.as_str());
            options.insert(key.to_string(), value.to_string());
            idx += 1;
        }
        while idx < lines.len() && lines[idx].trim().is_empty() {
            idx += 1;
        }

        let block = DirectiveBlock {
            name: name.to_string(),
            arguments: args.split_whitespace().map(String::from).collect(),
            options,
            content: lines[idx..].iter().map(|s| s.to_string()).collect(),
            line: line_no,
        };

        let children = if let Some(handler) = self.directive_registry.get(name) {
            handler.run(&block, ctx)?
        } else if LITERAL_DIRECTIVES.contains(&name) {
            Vec::new()
        } else {
            self.parse_markdown(&block.content.join("\n"), ctx)?
        };

        Ok(Node::Directive {
            name: block.name,
            args: block.arguments,
            options: block.options,
            content: block.content.join("\n"),
            line: line_no,
            children,
        })
    }
}
