//! Lightweight markdown renderer for assistant chat bubbles.
//!
//! Handles the subset that chat models actually produce:
//! - `# Heading` through `#### Heading`
//! - `- bullet` and `* bullet` list items
//! - `**bold**`, `` `inline code` `` and `[text](url)` links
//! - Paragraphs separated by blank lines
//!
//! Parsing is split from painting so the grammar can be tested without a UI.

use eframe::egui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block<'a> {
    Heading { level: u8, text: &'a str },
    Bullet(&'a str),
    Paragraph(&'a str),
    Blank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inline<'a> {
    Text(&'a str),
    Bold(&'a str),
    Code(&'a str),
    Link { text: &'a str, url: &'a str },
}

/// Split text into line-level blocks.
pub fn parse_blocks(text: &str) -> Vec<Block<'_>> {
    text.lines().map(parse_line).collect()
}

fn parse_line(line: &str) -> Block<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Block::Blank;
    }

    for (prefix, level) in [("#### ", 4), ("### ", 3), ("## ", 2), ("# ", 1)] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            return Block::Heading { level, text: rest };
        }
    }

    if let Some(rest) = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
    {
        return Block::Bullet(rest);
    }

    Block::Paragraph(trimmed)
}

#[derive(Debug, Clone, Copy)]
enum Marker {
    Bold,
    Code,
    Link,
}

/// Next inline marker in `text`. `[` only counts when a `](` follows it.
fn find_next_marker(text: &str) -> Option<(usize, Marker)> {
    let candidates = [
        text.find("**").map(|pos| (pos, Marker::Bold)),
        text.find('`').map(|pos| (pos, Marker::Code)),
        text.find('[')
            .filter(|&pos| text[pos..].contains("]("))
            .map(|pos| (pos, Marker::Link)),
    ];
    candidates.into_iter().flatten().min_by_key(|(pos, _)| *pos)
}

/// Split one line into styled spans. Unclosed markers are kept as text.
pub fn parse_inline(line: &str) -> Vec<Inline<'_>> {
    let mut spans = Vec::new();
    let mut remaining = line;

    while !remaining.is_empty() {
        let Some((pos, marker)) = find_next_marker(remaining) else {
            spans.push(Inline::Text(remaining));
            break;
        };
        if pos > 0 {
            spans.push(Inline::Text(&remaining[..pos]));
        }
        let from_marker = &remaining[pos..];

        match marker {
            Marker::Bold => {
                let body = &from_marker[2..];
                match body.find("**") {
                    Some(end) => {
                        spans.push(Inline::Bold(&body[..end]));
                        remaining = &body[end + 2..];
                    }
                    None => {
                        spans.push(Inline::Text(from_marker));
                        break;
                    }
                }
            }
            Marker::Code => {
                let body = &from_marker[1..];
                match body.find('`') {
                    Some(end) => {
                        spans.push(Inline::Code(&body[..end]));
                        remaining = &body[end + 1..];
                    }
                    None => {
                        spans.push(Inline::Text(from_marker));
                        break;
                    }
                }
            }
            Marker::Link => {
                let body = &from_marker[1..];
                let parsed = body.find("](").and_then(|close| {
                    let after = &body[close + 2..];
                    after
                        .find(')')
                        .map(|paren| (&body[..close], &after[..paren], &after[paren + 1..]))
                });
                match parsed {
                    Some((text, url, rest)) => {
                        spans.push(Inline::Link { text, url });
                        remaining = rest;
                    }
                    None => {
                        spans.push(Inline::Text(from_marker));
                        break;
                    }
                }
            }
        }
    }

    spans
}

/// Render markdown text into an egui UI region.
///
/// `base_color` is the default text color.
pub fn render_markdown(ui: &mut egui::Ui, text: &str, base_color: egui::Color32) {
    let link_color = egui::Color32::from_rgb(100, 170, 240);
    let code_bg = if base_color.r() > 128 {
        // dark mode
        egui::Color32::from_rgb(60, 60, 70)
    } else {
        egui::Color32::from_rgb(230, 232, 236)
    };

    for block in parse_blocks(text) {
        match block {
            Block::Blank => ui.add_space(6.0),
            Block::Heading { level, text } => {
                let (size, space) = match level {
                    1 => (18.0, 8.0),
                    2 => (16.0, 6.0),
                    3 => (15.0, 5.0),
                    _ => (14.0, 4.0),
                };
                ui.add_space(space);
                ui.label(
                    egui::RichText::new(text)
                        .strong()
                        .size(size)
                        .color(base_color),
                );
                ui.add_space(space / 2.0);
            }
            Block::Bullet(text) => {
                ui.horizontal_wrapped(|ui| {
                    ui.label(egui::RichText::new("  •  ").size(14.0).color(base_color));
                    render_spans(ui, text, base_color, link_color, code_bg);
                });
            }
            Block::Paragraph(text) => {
                ui.horizontal_wrapped(|ui| {
                    render_spans(ui, text, base_color, link_color, code_bg);
                });
            }
        }
    }
}

fn render_spans(
    ui: &mut egui::Ui,
    line: &str,
    base_color: egui::Color32,
    link_color: egui::Color32,
    code_bg: egui::Color32,
) {
    let base_size = 14.0;
    for span in parse_inline(line) {
        match span {
            Inline::Text(text) => {
                ui.label(egui::RichText::new(text).size(base_size).color(base_color));
            }
            Inline::Bold(text) => {
                ui.label(
                    egui::RichText::new(text)
                        .size(base_size)
                        .strong()
                        .color(base_color),
                );
            }
            Inline::Code(text) => {
                egui::Frame::none()
                    .fill(code_bg)
                    .rounding(egui::Rounding::same(3.0))
                    .inner_margin(egui::Margin::symmetric(4.0, 1.0))
                    .show(ui, |ui| {
                        ui.label(
                            egui::RichText::new(text)
                                .size(base_size)
                                .monospace()
                                .color(base_color),
                        );
                    });
            }
            Inline::Link { text, url } => {
                ui.add(egui::Hyperlink::from_label_and_url(
                    egui::RichText::new(text)
                        .size(base_size)
                        .color(link_color)
                        .underline(),
                    url,
                ))
                .on_hover_text(url);
            }
        }
    }
}
