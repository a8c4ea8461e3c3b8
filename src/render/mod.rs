//! Line-oriented formatting of message text.
//!
//! Each line maps to one [`Block`]: `#`/`##`/`###` headings, `-`/`*` bullets,
//! `1.` numbered items, paragraphs with `**bold**` spans, or a line break.

use chrono::Local;

use crate::models::chat::{ Message, Role };

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";
const THINKING: &str = "Pensando...";
const CURSOR: &str = "▌";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    Text(String),
    Bold(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, text: String },
    Bullet(String),
    Numbered(String),
    Paragraph(Vec<Span>),
    Break,
}

fn strip_numbered_prefix(line: &str) -> Option<&str> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    line[digits..].strip_prefix(". ")
}

pub fn format_line(line: &str) -> Block {
    for (prefix, level) in [("# ", 1), ("## ", 2), ("### ", 3)] {
        if let Some(text) = line.strip_prefix(prefix) {
            return Block::Heading { level, text: text.to_string() };
        }
    }

    if let Some(text) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return Block::Bullet(text.to_string());
    }

    if let Some(text) = strip_numbered_prefix(line) {
        return Block::Numbered(text.to_string());
    }

    if line.contains("**") {
        let spans = line
            .split("**")
            .enumerate()
            .filter(|(_, part)| !part.is_empty())
            .map(|(i, part)| {
                if i % 2 == 0 { Span::Text(part.to_string()) } else { Span::Bold(part.to_string()) }
            })
            .collect();
        return Block::Paragraph(spans);
    }

    if line.trim().is_empty() {
        Block::Break
    } else {
        Block::Paragraph(vec![Span::Text(line.to_string())])
    }
}

pub fn format_content(content: &str) -> Vec<Block> {
    content.split('\n').map(format_line).collect()
}

/// Renders blocks as ANSI terminal text, renumbering consecutive numbered items.
pub fn render_blocks(blocks: &[Block]) -> String {
    let mut out = Vec::with_capacity(blocks.len());
    let mut number = 0;

    for block in blocks {
        if !matches!(block, Block::Numbered(_)) {
            number = 0;
        }
        let line = match block {
            Block::Heading { level, text } => {
                format!("{}{} {}{}", BOLD, "#".repeat(*level as usize), text, RESET)
            }
            Block::Bullet(text) => format!("  • {}", text),
            Block::Numbered(text) => {
                number += 1;
                format!("  {}. {}", number, text)
            }
            Block::Paragraph(spans) => spans
                .iter()
                .map(|span| match span {
                    Span::Text(t) => t.clone(),
                    Span::Bold(t) => format!("{}{}{}", BOLD, t, RESET),
                })
                .collect::<String>(),
            Block::Break => String::new(),
        };
        out.push(line);
    }
    out.join("\n")
}

pub fn render_message(message: &Message) -> String {
    let speaker = match message.role {
        Role::User => "Você",
        Role::Assistant => "LedChat",
    };

    if message.is_streaming && message.content.is_empty() {
        return format!("{}{}{}: {}", BOLD, speaker, RESET, THINKING);
    }

    let body = render_blocks(&format_content(&message.content));
    if message.is_streaming {
        format!("{}{}{}:\n{}{}", BOLD, speaker, RESET, body, CURSOR)
    } else {
        let time = message.timestamp.with_timezone(&Local).format("%H:%M");
        format!("{}{}{} ({}):\n{}", BOLD, speaker, RESET, time, body)
    }
}
