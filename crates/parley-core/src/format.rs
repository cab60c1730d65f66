//! Light markdown-like formatting for assistant replies
//!
//! Only a handful of constructs are recognised:
//! - `1. **Heading**` numbered headings
//! - fenced code blocks (```` ``` ````, optionally with a language tag)
//! - `***title***`, `**bold**` and `*italic*` runs inside a line
//!
//! Anything else is plain text. UIs turn the resulting [`Block`]s into their
//! own styled output.

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// `1. **Text**` at the start of a line; anything after the closing `**` is dropped
    Heading { number: String, text: String },
    /// Body of a fenced block, each line followed by `\n`
    Code {
        language: Option<String>,
        content: String,
    },
    /// A regular line split into styled runs (empty for blank lines)
    Line(Vec<Inline>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Title(String),
    Bold(String),
    Italic(String),
    Plain(String),
}

impl Inline {
    pub fn text(&self) -> &str {
        match self {
            Inline::Title(s) | Inline::Bold(s) | Inline::Italic(s) | Inline::Plain(s) => s,
        }
    }
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+\.) \*\*(.*?)\*\*").expect("valid heading regex"))
}

fn emphasis_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\*\*\*.*?\*\*\*|\*\*.*?\*\*|\*.*?\*").expect("valid emphasis regex")
    })
}

/// Opening fence: three backticks and an optional language tag
fn parse_fence(line: &str) -> Option<Option<String>> {
    let rest = line.trim().strip_prefix("```")?;
    if rest.is_empty() {
        Some(None)
    } else if rest
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '+' | '#' | '.'))
    {
        Some(Some(rest.to_string()))
    } else {
        None
    }
}

pub fn parse_reply(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut code: Option<(Option<String>, String)> = None;

    for line in text.split('\n') {
        if let Some((language, content)) = code.as_mut() {
            if line.trim() == "```" {
                blocks.push(Block::Code {
                    language: language.take(),
                    content: std::mem::take(content),
                });
                code = None;
            } else {
                content.push_str(line);
                content.push('\n');
            }
            continue;
        }

        if let Some(caps) = heading_re().captures(line) {
            blocks.push(Block::Heading {
                number: caps[1].to_string(),
                text: caps[2].to_string(),
            });
            continue;
        }

        if let Some(language) = parse_fence(line) {
            code = Some((language, String::new()));
            continue;
        }

        blocks.push(Block::Line(parse_inline(line)));
    }

    // An unterminated fence still shows what was received
    if let Some((language, content)) = code {
        blocks.push(Block::Code { language, content });
    }

    blocks
}

/// Split one line into emphasis runs and plain text.
///
/// Whitespace-only pieces are dropped and the rest trimmed.
pub fn parse_inline(line: &str) -> Vec<Inline> {
    let mut pieces = Vec::new();
    let mut last = 0;
    for m in emphasis_re().find_iter(line) {
        pieces.push(&line[last..m.start()]);
        pieces.push(m.as_str());
        last = m.end();
    }
    pieces.push(&line[last..]);

    pieces
        .into_iter()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(classify)
        .collect()
}

fn classify(piece: &str) -> Inline {
    let strip = |marker: &str| {
        if piece.len() >= marker.len() * 2 {
            piece
                .strip_prefix(marker)
                .and_then(|p| p.strip_suffix(marker))
                .map(|inner| inner.trim().to_string())
        } else {
            None
        }
    };

    if let Some(inner) = strip("***") {
        Inline::Title(inner)
    } else if let Some(inner) = strip("**") {
        Inline::Bold(inner)
    } else if let Some(inner) = strip("*") {
        Inline::Italic(inner)
    } else {
        Inline::Plain(piece.to_string())
    }
}

/// Contents of every code block in `text`, in order
pub fn code_blocks(text: &str) -> Vec<String> {
    parse_reply(text)
        .into_iter()
        .filter_map(|block| match block {
            Block::Code { content, .. } => Some(content),
            _ => None,
        })
        .collect()
}
