use std::fmt;

use crate::document::{Attr, Block, ColumnAlignment, Document, Inline, MetaValue};

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.meta.is_empty() {
            let table: toml::Table = self
                .meta
                .iter()
                .map(|(key, value)| (key.clone(), meta_to_toml(value)))
                .collect();
            let front = toml::to_string(&table).map_err(|_| fmt::Error)?;
            writeln!(f, "+++")?;
            write!(f, "{}", front)?;
            writeln!(f, "+++")?;
            writeln!(f)?;
        }
        let body = render_blocks(&self.blocks);
        if !body.is_empty() {
            writeln!(f, "{}", body)?;
        }
        Ok(())
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", render_block(self))
    }
}

impl fmt::Display for Inline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inline::Text(s) | Inline::Html(s) => write!(f, "{}", s),
            Inline::Code { attr, text } => {
                let fence = "`".repeat(longest_run(text, '`') + 1);
                let pad = if text.starts_with('`') || text.ends_with('`') {
                    " "
                } else {
                    ""
                };
                write!(f, "{fence}{pad}{text}{pad}{fence}")?;
                write_attr(f, attr)
            }
            Inline::Emphasis(children) => {
                write!(f, "*{}*", render_inlines(children))
            }
            Inline::Strong(children) => {
                write!(f, "**{}**", render_inlines(children))
            }
            Inline::Strikethrough(children) => {
                write!(f, "~~{}~~", render_inlines(children))
            }
            Inline::Link {
                dest,
                title,
                content,
            } => {
                write!(f, "[{}]({}", render_inlines(content), dest)?;
                if !title.is_empty() {
                    write!(f, " \"{}\"", title)?;
                }
                write!(f, ")")
            }
            Inline::Image { dest, title, alt } => {
                write!(f, "![{}]({}", render_inlines(alt), dest)?;
                if !title.is_empty() {
                    write!(f, " \"{}\"", title)?;
                }
                write!(f, ")")
            }
            Inline::Math { display, text } => {
                let delim = if *display { "$$" } else { "$" };
                write!(f, "{delim}{text}{delim}")
            }
            Inline::Span { attr, content } => {
                write!(f, "[{}]", render_inlines(content))?;
                // A bracketed run without attributes would read back as text.
                write!(f, "{}", attr)
            }
            Inline::SoftBreak => writeln!(f),
            Inline::HardBreak => writeln!(f, "\\"),
        }
    }
}

fn write_attr(f: &mut fmt::Formatter<'_>, attr: &Attr) -> fmt::Result {
    if attr.is_empty() {
        Ok(())
    } else {
        write!(f, "{}", attr)
    }
}

pub(crate) fn render_inlines(inlines: &[Inline]) -> String {
    inlines.iter().map(|inline| inline.to_string()).collect()
}

pub(crate) fn render_blocks(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(render_block)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_block(block: &Block) -> String {
    match block {
        Block::Plain(inlines) | Block::Paragraph(inlines) | Block::TableCell(inlines) => {
            render_inlines(inlines)
        }
        Block::Heading {
            level,
            attr,
            content,
        } => {
            let mut out = format!("{} {}", "#".repeat(*level as usize), render_inlines(content));
            if !attr.is_empty() {
                out.push(' ');
                out.push_str(&attr.to_string());
            }
            out
        }
        Block::CodeBlock { attr, text } => {
            let fence = "`".repeat((longest_run(text, '`') + 1).max(3));
            let info = if attr.is_empty() {
                String::new()
            } else {
                attr.to_string()
            };
            let body = text.strip_suffix('\n').unwrap_or(text);
            format!("{fence}{info}\n{body}\n{fence}")
        }
        Block::BlockQuote(content) => prefix_lines(&render_blocks(content), "> ", ">"),
        Block::OrderedList { start, items } => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let marker = format!("{}. ", *start as usize + i);
                render_item(&marker, item)
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Block::BulletList { items } => items
            .iter()
            .map(|item| render_item("- ", item))
            .collect::<Vec<_>>()
            .join("\n"),
        Block::ListItem(content) => render_blocks(content),
        Block::Table {
            alignments,
            head,
            rows,
        } => {
            let mut lines = vec![render_row(head)];
            let rule: Vec<&str> = alignments
                .iter()
                .map(|a| match a {
                    ColumnAlignment::None => "---",
                    ColumnAlignment::Left => ":--",
                    ColumnAlignment::Center => ":-:",
                    ColumnAlignment::Right => "--:",
                })
                .collect();
            lines.push(format!("|{}|", rule.join("|")));
            lines.extend(rows.iter().map(render_row));
            lines.join("\n")
        }
        Block::TableRow(_) => render_row(block),
        Block::Div { attr, content } => {
            format!("::: {}\n{}\n:::", attr, render_blocks(content))
        }
        Block::Html(html) => html.trim_end_matches('\n').to_string(),
        Block::HorizontalRule => "---".to_string(),
    }
}

fn render_item(marker: &str, item: &Block) -> String {
    let body = render_block(item);
    let indent = " ".repeat(marker.len());
    let mut out = String::new();
    for (i, line) in body.lines().enumerate() {
        if i == 0 {
            out.push_str(marker);
        } else {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(&indent);
            }
        }
        out.push_str(line);
    }
    if out.is_empty() {
        out.push_str(marker.trim_end());
    }
    out
}

fn render_row(row: &Block) -> String {
    let cells: Vec<String> = match row {
        Block::TableRow(cells) => cells.iter().map(render_block).collect(),
        other => vec![render_block(other)],
    };
    format!("| {} |", cells.join(" | "))
}

fn prefix_lines(text: &str, prefix: &str, blank: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                blank.to_string()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn longest_run(text: &str, c: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for ch in text.chars() {
        if ch == c {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

fn meta_to_toml(value: &MetaValue) -> toml::Value {
    match value {
        MetaValue::Bool(b) => toml::Value::Boolean(*b),
        MetaValue::Str(s) => toml::Value::String(s.clone()),
        MetaValue::Inlines(inlines) => toml::Value::String(render_inlines(inlines)),
        MetaValue::Blocks(blocks) => toml::Value::String(render_blocks(blocks)),
        MetaValue::List(items) => toml::Value::Array(items.iter().map(meta_to_toml).collect()),
        MetaValue::Map(entries) => toml::Value::Table(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), meta_to_toml(value)))
                .collect(),
        ),
    }
}
