use std::sync::LazyLock;

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use regex::Regex;
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Theme as SyntectTheme, ThemeSet};
use syntect::parsing::SyntaxSet;

use crate::model::config::AppConfig;
use crate::model::section::{CodeBlock, META_TITLE, Section};

/// Stand-in lines emitted for fence rows during the markdown pass; the
/// border rewrite pass replaces them one-to-one with computed borders.
pub const PREFIX_TOKEN: &str = "------------------BEG------------------";
pub const SUFFIX_TOKEN: &str = "------------------END------------------";

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]+\]\([^\)]+\)").expect("valid markdown link regex"));
static INLINE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`[^`]+`").expect("valid inline code regex"));
static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*[^*]+\*\*").expect("valid bold regex"));
static ITALIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*[^*\s][^*]*\*").expect("valid italic regex"));
static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static SYNTECT_THEME: LazyLock<SyntectTheme> = LazyLock::new(|| {
    let themes = ThemeSet::load_defaults();
    themes
        .themes
        .get("base16-ocean.dark")
        .cloned()
        .or_else(|| themes.themes.values().next().cloned())
        .expect("at least one syntect theme")
});

/// Renders a section's raw markdown to styled terminal text.
///
/// Three ordered steps: markdown → styled lines with placeholder borders,
/// tab normalization, then border rewriting (copy hints, custom titles,
/// plain borders). Only the placeholder lines are touched by the last step.
pub fn render_section(section: &Section, config: &AppConfig) -> Text<'static> {
    let mut lines = render_markdown(&section.raw);
    normalize_tabs(&mut lines, config.render.tab_width);
    rewrite_borders(&mut lines, &section.code_blocks, config);
    Text::from(lines)
}

/// An open fence being tracked through the line scan. The closer must use
/// the same character and at least the opening run length, so a ``` line
/// inside a ~~~ block stays code, matching how pulldown-cmark tokenizes the
/// same body in the section parser.
struct Fence {
    ch: char,
    len: usize,
    language: String,
}

fn render_markdown(raw: &str) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut open: Option<Fence> = None;

    for text in raw.lines() {
        if let Some(fence) = open.as_ref() {
            if closes_fence(text, fence) {
                open = None;
                lines.push(placeholder_line(SUFFIX_TOKEN));
            } else {
                lines.push(render_code_line(text, &fence.language));
            }
            continue;
        }

        if let Some(fence) = parse_fence_opening(text) {
            open = Some(fence);
            lines.push(placeholder_line(PREFIX_TOKEN));
            continue;
        }

        let base_style = base_markdown_style(text);
        lines.push(render_inline_markdown(text, base_style));
    }

    lines
}

fn parse_fence_opening(line: &str) -> Option<Fence> {
    let trimmed = line.trim_start();
    let ch = trimmed.chars().next()?;
    if ch != '`' && ch != '~' {
        return None;
    }
    let len = trimmed.chars().take_while(|c| *c == ch).count();
    if len < 3 {
        return None;
    }

    // Info strings may carry metadata ("bash {copyable}"); the language is
    // the first token. Backtick info strings cannot contain backticks.
    let info = trimmed[len..].trim();
    if ch == '`' && info.contains('`') {
        return None;
    }
    let language = info
        .split_whitespace()
        .next()
        .unwrap_or("text")
        .to_string();

    Some(Fence { ch, len, language })
}

fn closes_fence(line: &str, fence: &Fence) -> bool {
    let trimmed = line.trim();
    trimmed.chars().count() >= fence.len && trimmed.chars().all(|c| c == fence.ch)
}

fn placeholder_line(token: &'static str) -> Line<'static> {
    Line::from(Span::styled(
        token.to_string(),
        Style::default().fg(Color::DarkGray),
    ))
}

fn render_code_line(text: &str, language: &str) -> Line<'static> {
    let syntax = SYNTAX_SET
        .find_syntax_by_token(language)
        .unwrap_or_else(|| SYNTAX_SET.find_syntax_plain_text());
    let mut highlighter = HighlightLines::new(syntax, &SYNTECT_THEME);

    let fallback = || {
        Line::from(Span::styled(
            text.to_string(),
            Style::default().fg(Color::Rgb(200, 200, 200)),
        ))
    };

    let Ok(tokens) = highlighter.highlight_line(text, &SYNTAX_SET) else {
        return fallback();
    };

    let spans: Vec<Span<'static>> = tokens
        .into_iter()
        .map(|(style, segment)| Span::styled(segment.to_string(), syntect_to_ratatui(style)))
        .collect();

    if spans.is_empty() { fallback() } else { Line::from(spans) }
}

fn base_markdown_style(text: &str) -> Style {
    let trimmed = text.trim_start();

    if trimmed.starts_with("# ") {
        return Style::default()
            .fg(Color::Magenta)
            .add_modifier(Modifier::BOLD);
    }
    if trimmed.starts_with("## ") {
        return Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    }
    if trimmed.starts_with("### ") {
        return Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD);
    }
    if trimmed.starts_with(">") {
        return Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC);
    }
    if trimmed.starts_with("- ") || trimmed.starts_with("* ") || trimmed.starts_with("+ ") {
        return Style::default().fg(Color::LightCyan);
    }

    Style::default().fg(Color::Gray)
}

#[derive(Debug, Clone, Copy)]
enum TokenKind {
    Link,
    InlineCode,
    Bold,
    Italic,
}

fn render_inline_markdown(text: &str, base_style: Style) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut cursor = 0;

    while cursor < text.len() {
        let Some((start, end, kind)) = next_markdown_token(text, cursor) else {
            spans.push(Span::styled(text[cursor..].to_string(), base_style));
            break;
        };

        if start > cursor {
            spans.push(Span::styled(text[cursor..start].to_string(), base_style));
        }

        let token_style = match kind {
            TokenKind::Link => base_style
                .fg(Color::Rgb(255, 102, 0))
                .add_modifier(Modifier::UNDERLINED),
            TokenKind::InlineCode => base_style
                .fg(Color::Rgb(220, 220, 220))
                .bg(Color::Rgb(32, 32, 48)),
            TokenKind::Bold => base_style.add_modifier(Modifier::BOLD),
            TokenKind::Italic => base_style.add_modifier(Modifier::ITALIC),
        };

        spans.push(Span::styled(text[start..end].to_string(), token_style));
        cursor = end;
    }

    if spans.is_empty() {
        Line::from(Span::styled(text.to_string(), base_style))
    } else {
        Line::from(spans)
    }
}

fn next_markdown_token(text: &str, start_at: usize) -> Option<(usize, usize, TokenKind)> {
    let candidates = [
        (
            INLINE_CODE_RE
                .find_at(text, start_at)
                .map(|m| (m.start(), m.end(), TokenKind::InlineCode)),
            0,
        ),
        (
            LINK_RE
                .find_at(text, start_at)
                .map(|m| (m.start(), m.end(), TokenKind::Link)),
            1,
        ),
        (
            BOLD_RE
                .find_at(text, start_at)
                .map(|m| (m.start(), m.end(), TokenKind::Bold)),
            2,
        ),
        (
            ITALIC_RE
                .find_at(text, start_at)
                .map(|m| (m.start(), m.end(), TokenKind::Italic)),
            3,
        ),
    ];

    candidates
        .into_iter()
        .filter_map(|(hit, priority)| hit.map(|h| (h, priority)))
        .min_by(|((sa, _, _), pa), ((sb, _, _), pb)| sa.cmp(sb).then(pa.cmp(pb)))
        .map(|(h, _)| h)
}

fn normalize_tabs(lines: &mut [Line<'static>], tab_width: usize) {
    let spaces = " ".repeat(tab_width);
    for line in lines.iter_mut() {
        for span in line.spans.iter_mut() {
            if span.content.contains('\t') {
                span.content = span.content.replace('\t', &spaces).into();
            }
        }
    }
}

/// Rewrites placeholder border lines in source order: one computed prefix
/// per code block, and the plain default border for every suffix.
fn rewrite_borders(lines: &mut [Line<'static>], blocks: &[CodeBlock], config: &AppConfig) {
    let default_border = config.default_border();
    let mut copy_keys = config.keys.copy.iter();
    let mut cursor = 0;

    for block in blocks {
        let border = prefix_border(block, &mut copy_keys, config, &default_border);
        while cursor < lines.len() {
            let is_prefix = line_text(&lines[cursor]) == PREFIX_TOKEN;
            if is_prefix {
                lines[cursor] = border_line(border.clone());
                cursor += 1;
                break;
            }
            cursor += 1;
        }
    }

    for line in lines.iter_mut() {
        if line_text(line) == SUFFIX_TOKEN {
            *line = border_line(default_border.clone());
        }
    }
}

fn prefix_border(
    block: &CodeBlock,
    copy_keys: &mut std::slice::Iter<String>,
    config: &AppConfig,
    default_border: &str,
) -> String {
    if block.is_copyable() {
        return match copy_keys.next() {
            Some(key) => {
                let hint = config
                    .render
                    .copy_hint
                    .replace("{key}", &key.to_uppercase());
                centered_border(&hint, config)
            }
            None => default_border.to_string(),
        };
    }

    if let Some(title) = block.meta.get(META_TITLE) {
        let title = title.trim();
        if !title.is_empty() {
            return centered_border(title, config);
        }
    }

    default_border.to_string()
}

/// Centers `title` between padding runs to the configured border length,
/// truncating titles that do not fit.
fn centered_border(title: &str, config: &AppConfig) -> String {
    let length = config.render.border_length;
    let padding = &config.render.border_padding;

    let max_title = length.saturating_sub(4);
    if max_title == 0 {
        return config.default_border();
    }

    let title: String = title.chars().take(max_title).collect();
    let pad_total = length.saturating_sub(title.chars().count() + 2);
    let left = pad_total / 2;
    let right = pad_total - left;

    format!(
        "{} {} {}",
        padding.repeat(left),
        title,
        padding.repeat(right)
    )
}

fn border_line(border: String) -> Line<'static> {
    Line::from(Span::styled(border, Style::default().fg(Color::DarkGray)))
}

fn line_text(line: &Line<'_>) -> String {
    line.spans.iter().map(|s| s.content.as_ref()).collect()
}

fn syntect_to_ratatui(style: syntect::highlighting::Style) -> Style {
    let mut rat_style = Style::default().fg(Color::Rgb(
        style.foreground.r,
        style.foreground.g,
        style.foreground.b,
    ));

    if style.font_style.contains(FontStyle::BOLD) {
        rat_style = rat_style.add_modifier(Modifier::BOLD);
    }
    if style.font_style.contains(FontStyle::ITALIC) {
        rat_style = rat_style.add_modifier(Modifier::ITALIC);
    }
    if style.font_style.contains(FontStyle::UNDERLINE) {
        rat_style = rat_style.add_modifier(Modifier::UNDERLINED);
    }

    rat_style
}
