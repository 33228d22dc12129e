use std::collections::HashMap;

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};

pub const META_COPYABLE: &str = "copyable";
pub const META_TITLE: &str = "title";

/// Fallback title for sections whose chunk carries no heading.
pub const UNTITLED_SECTION: &str = "Untitled Section";

/// A fenced code region within a section.
///
/// `meta` comes from the fence info string, e.g. `bash {copyable}` or
/// `bash {title="Run it"}`. Bare keys map to `"true"`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeBlock {
    pub content: String,
    pub language: String,
    pub meta: HashMap<String, String>,
}

impl CodeBlock {
    pub fn is_copyable(&self) -> bool {
        self.meta.contains_key(META_COPYABLE)
    }
}

/// One delimiter-separated chunk of a snippet body.
///
/// Sections are transient: they are re-parsed every time a snippet is
/// opened or edited, never persisted.
#[derive(Debug, Clone, Default)]
pub struct Section {
    pub folder: String,
    pub file: String,
    pub title: String,
    pub raw: String,
    pub code_blocks: Vec<CodeBlock>,
}

impl Section {
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            UNTITLED_SECTION
        } else {
            &self.title
        }
    }
}

/// Splits a snippet body into sections on `---` delimiter lines and scans
/// each chunk for its first heading and fenced code blocks.
///
/// Every chunk becomes a section, so a blank body still yields one
/// navigable section.
pub fn parse_sections(folder: &str, file: &str, body: &str) -> Vec<Section> {
    split_chunks(body.trim())
        .into_iter()
        .map(|chunk| {
            let (title, code_blocks) = scan_chunk(&chunk);
            Section {
                folder: folder.to_string(),
                file: file.to_string(),
                title,
                raw: chunk,
                code_blocks,
            }
        })
        .collect()
}

/// A delimiter is a line holding only `---` with blank lines (or the body
/// boundary) on both sides. Anything else, e.g. `---` directly under text,
/// is left alone so setext headings survive.
fn split_chunks(body: &str) -> Vec<String> {
    let lines: Vec<&str> = body.lines().collect();
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let blank_before = i == 0 || lines[i - 1].trim().is_empty();
        let blank_after = i + 1 == lines.len() || lines[i + 1].trim().is_empty();
        if line.trim() == "---" && blank_before && blank_after {
            chunks.push(current.join("\n"));
            current.clear();
        } else {
            current.push(line);
        }
    }
    chunks.push(current.join("\n"));

    chunks.into_iter().map(|c| c.trim().to_string()).collect()
}

/// Single walk over the chunk's markdown events: the first heading at any
/// level becomes the title, every fenced block becomes a `CodeBlock`.
fn scan_chunk(chunk: &str) -> (String, Vec<CodeBlock>) {
    let mut title = String::new();
    let mut title_found = false;
    let mut in_heading = false;
    let mut heading_buf = String::new();
    let mut fence: Option<(String, String)> = None;
    let mut blocks = Vec::new();

    for event in Parser::new(chunk) {
        match event {
            Event::Start(Tag::Heading { .. }) if !title_found => {
                in_heading = true;
                heading_buf.clear();
            }
            Event::End(TagEnd::Heading(_)) if in_heading => {
                in_heading = false;
                title_found = true;
                title = heading_buf.trim().to_string();
            }
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                fence = Some((info.to_string(), String::new()));
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((info, content)) = fence.take() {
                    let (language, meta) = parse_fence_info(&info);
                    let content = content.strip_suffix('\n').unwrap_or(&content).to_string();
                    blocks.push(CodeBlock {
                        content,
                        language,
                        meta,
                    });
                }
            }
            Event::Text(text) => {
                if in_heading {
                    heading_buf.push_str(&text);
                } else if let Some((_, buf)) = fence.as_mut() {
                    buf.push_str(&text);
                }
            }
            Event::Code(text) if in_heading => heading_buf.push_str(&text),
            _ => {}
        }
    }

    (title, blocks)
}

/// Decodes a fence info string into `(language, metadata)`.
///
/// Grammar: `<language>[ {<attr>[ <attr>]*}]` where an attr is `key`,
/// `key=value`, or `key="value with spaces"` (single or double quotes).
/// Malformed input degrades to whatever parsed cleanly; this never fails.
pub fn parse_fence_info(info: &str) -> (String, HashMap<String, String>) {
    let mut meta = HashMap::new();
    let info = info.trim();
    if info.is_empty() {
        return (String::new(), meta);
    }

    let (language, rest) = match info.split_once(' ') {
        Some((language, rest)) => (language.to_string(), rest),
        None => return (info.to_string(), meta),
    };

    let attrs = rest.trim().trim_matches(|c| c == '{' || c == '}');

    let mut key = String::new();
    let mut buf = String::new();
    let mut in_quote = false;
    let mut quote_char = ' ';
    let mut is_key = true;

    // Trailing space flushes the final token.
    for ch in attrs.chars().chain(std::iter::once(' ')) {
        match ch {
            '"' | '\'' => {
                if !in_quote {
                    in_quote = true;
                    quote_char = ch;
                } else if ch == quote_char {
                    in_quote = false;
                } else {
                    buf.push(ch);
                }
            }
            '=' if is_key && !in_quote => {
                key = buf.trim().to_string();
                buf.clear();
                is_key = false;
            }
            ' ' if !in_quote => {
                if !is_key {
                    let value = buf.trim().to_string();
                    if !key.is_empty() {
                        meta.insert(std::mem::take(&mut key), value);
                    }
                } else if !buf.trim().is_empty() {
                    meta.insert(buf.trim().to_string(), "true".to_string());
                }
                buf.clear();
                is_key = true;
            }
            _ => buf.push(ch),
        }
    }

    (language, meta)
}
