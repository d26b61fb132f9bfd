use std::collections::BTreeMap;
use std::ops::Range;

use pulldown_cmark::{
    Alignment, CodeBlockKind, Event, HeadingLevel, MetadataBlockKind, Options,
    Parser as CmarkParser, Tag, TagEnd,
};

use crate::document::attr::split_attr_prefix;
use crate::document::{Attr, Block, ColumnAlignment, Document, Inline};
use crate::parser::error::ParseError;
use crate::parser::front_matter::parse_front_matter;

type Events<'a> = [(Event<'a>, Range<usize>)];

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse a full document, including `+++` front matter.
pub fn parse_document(source: &str, file_id: usize) -> Result<Document, Vec<ParseError>> {
    let options = fragment_options() | Options::ENABLE_PLUSES_DELIMITED_METADATA_BLOCKS;
    let events: Vec<(Event<'_>, Range<usize>)> =
        CmarkParser::new_ext(source, options).into_offset_iter().collect();

    let mut meta = BTreeMap::new();
    let mut errors = Vec::new();
    let mut i = 0;

    // Front matter can only open the document.
    if let Some((Event::Start(Tag::MetadataBlock(MetadataBlockKind::PlusesStyle)), _)) =
        events.first()
    {
        i += 1;
        let (text, offset) = collect_metadata(&events, &mut i);
        match parse_front_matter(&text, offset, file_id) {
            Ok(parsed) => meta = parsed,
            Err(err) => errors.push(err),
        }
    }

    let blocks = collect_blocks(&events, &mut i, &|_| false);

    if errors.is_empty() {
        Ok(Document { meta, blocks })
    } else {
        Err(errors)
    }
}

/// Parse a Markdown fragment into blocks. Metadata blocks are not recognized.
pub fn parse_blocks(text: &str) -> Vec<Block> {
    let events: Vec<(Event<'_>, Range<usize>)> = CmarkParser::new_ext(text, fragment_options())
        .into_offset_iter()
        .collect();
    let mut i = 0;
    collect_blocks(&events, &mut i, &|_| false)
}

fn fragment_options() -> Options {
    Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TABLES
        | Options::ENABLE_MATH
        | Options::ENABLE_HEADING_ATTRIBUTES
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// Collect blocks until an End tag accepted by `is_end` (consumed) or the
/// end of the event stream.
fn collect_blocks(events: &Events<'_>, i: &mut usize, is_end: &dyn Fn(&TagEnd) -> bool) -> Vec<Block> {
    let mut blocks = Vec::new();

    while *i < events.len() {
        let (ref ev, _) = events[*i];
        match ev {
            Event::End(tag_end) if is_end(tag_end) => {
                *i += 1;
                break;
            }

            Event::Start(Tag::Paragraph) => {
                *i += 1;
                let inlines = collect_inlines(events, i, &|e| matches!(e, TagEnd::Paragraph));
                blocks.push(Block::Paragraph(inlines));
            }

            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => {
                let attr = Attr {
                    id: id.as_ref().map(|s| s.to_string()).unwrap_or_default(),
                    classes: classes.iter().map(|c| c.to_string()).collect(),
                    pairs: attrs
                        .iter()
                        .map(|(k, v)| {
                            (
                                k.to_string(),
                                v.as_ref().map(|v| v.to_string()).unwrap_or_default(),
                            )
                        })
                        .collect(),
                };
                let level = heading_level_to_u8(level);
                *i += 1;
                let content = collect_inlines(events, i, &|e| matches!(e, TagEnd::Heading(_)));
                blocks.push(Block::Heading {
                    level,
                    attr,
                    content,
                });
            }

            Event::Start(Tag::CodeBlock(kind)) => {
                let attr = match kind {
                    CodeBlockKind::Fenced(info) => Attr::from_info_string(info),
                    CodeBlockKind::Indented => Attr::default(),
                };
                *i += 1;
                let text = collect_text_until(events, i, |e| matches!(e, TagEnd::CodeBlock));
                blocks.push(Block::CodeBlock { attr, text });
            }

            Event::Start(Tag::BlockQuote(_)) => {
                *i += 1;
                let inner = collect_blocks(events, i, &|e| matches!(e, TagEnd::BlockQuote(_)));
                blocks.push(Block::BlockQuote(inner));
            }

            Event::Start(Tag::List(start)) => {
                let start = *start;
                *i += 1;
                let items = collect_blocks(events, i, &|e| matches!(e, TagEnd::List(_)));
                blocks.push(match start {
                    Some(start) => Block::OrderedList { start, items },
                    None => Block::BulletList { items },
                });
            }

            Event::Start(Tag::Item) => {
                *i += 1;
                let content = collect_blocks(events, i, &|e| matches!(e, TagEnd::Item));
                blocks.push(Block::ListItem(content));
            }

            Event::Start(Tag::Table(alignments)) => {
                let alignments = alignments.iter().map(convert_alignment).collect();
                *i += 1;
                let (head, rows) = collect_table(events, i);
                blocks.push(Block::Table {
                    alignments,
                    head: Box::new(head),
                    rows,
                });
            }

            Event::Start(Tag::HtmlBlock) => {
                *i += 1;
                let html = collect_text_until(events, i, |e| matches!(e, TagEnd::HtmlBlock));
                blocks.push(Block::Html(html));
            }

            Event::Rule => {
                blocks.push(Block::HorizontalRule);
                *i += 1;
            }

            // Tight list items carry their inline content directly.
            ev if starts_inline(ev) => {
                let inlines = collect_loose_inlines(events, i);
                blocks.push(Block::Plain(inlines));
            }

            _ => {
                *i += 1;
            }
        }
    }

    blocks
}

/// Collect the header row and body rows of a table.
fn collect_table(events: &Events<'_>, i: &mut usize) -> (Block, Vec<Block>) {
    let mut head = Vec::new();
    let mut rows = Vec::new();
    let mut current = Vec::new();

    while *i < events.len() {
        let (ref ev, _) = events[*i];
        match ev {
            Event::End(TagEnd::Table) => {
                *i += 1;
                break;
            }
            Event::End(TagEnd::TableHead) => {
                head = std::mem::take(&mut current);
                *i += 1;
            }
            Event::End(TagEnd::TableRow) => {
                rows.push(Block::TableRow(std::mem::take(&mut current)));
                *i += 1;
            }
            Event::Start(Tag::TableCell) => {
                *i += 1;
                let cell = collect_inlines(events, i, &|e| matches!(e, TagEnd::TableCell));
                current.push(Block::TableCell(cell));
            }
            _ => {
                *i += 1;
            }
        }
    }

    (Block::TableRow(head), rows)
}

// ---------------------------------------------------------------------------
// Inlines
// ---------------------------------------------------------------------------

fn starts_inline(ev: &Event<'_>) -> bool {
    matches!(
        ev,
        Event::Text(_)
            | Event::Code(_)
            | Event::InlineMath(_)
            | Event::DisplayMath(_)
            | Event::InlineHtml(_)
            | Event::SoftBreak
            | Event::HardBreak
            | Event::Start(
                Tag::Emphasis
                    | Tag::Strong
                    | Tag::Strikethrough
                    | Tag::Link { .. }
                    | Tag::Image { .. }
            )
    )
}

/// Parse the inline element starting at `events[*i]`, or return `None`
/// without advancing when the event does not open an inline.
fn parse_inline(events: &Events<'_>, i: &mut usize) -> Option<Inline> {
    let (ref ev, _) = events[*i];
    let inline = match ev {
        Event::Text(s) => {
            *i += 1;
            Inline::Text(s.to_string())
        }
        Event::Code(s) => {
            *i += 1;
            Inline::Code {
                attr: Attr::default(),
                text: s.to_string(),
            }
        }
        Event::InlineMath(s) => {
            *i += 1;
            Inline::Math {
                display: false,
                text: s.to_string(),
            }
        }
        Event::DisplayMath(s) => {
            *i += 1;
            Inline::Math {
                display: true,
                text: s.to_string(),
            }
        }
        Event::InlineHtml(s) => {
            *i += 1;
            Inline::Html(s.to_string())
        }
        Event::SoftBreak => {
            *i += 1;
            Inline::SoftBreak
        }
        Event::HardBreak => {
            *i += 1;
            Inline::HardBreak
        }
        Event::Start(Tag::Emphasis) => {
            *i += 1;
            Inline::Emphasis(collect_inlines(events, i, &|e| matches!(e, TagEnd::Emphasis)))
        }
        Event::Start(Tag::Strong) => {
            *i += 1;
            Inline::Strong(collect_inlines(events, i, &|e| matches!(e, TagEnd::Strong)))
        }
        Event::Start(Tag::Strikethrough) => {
            *i += 1;
            Inline::Strikethrough(collect_inlines(events, i, &|e| {
                matches!(e, TagEnd::Strikethrough)
            }))
        }
        Event::Start(Tag::Link {
            dest_url, title, ..
        }) => {
            let dest = dest_url.to_string();
            let title = title.to_string();
            *i += 1;
            let content = collect_inlines(events, i, &|e| matches!(e, TagEnd::Link));
            Inline::Link {
                dest,
                title,
                content,
            }
        }
        Event::Start(Tag::Image {
            dest_url, title, ..
        }) => {
            let dest = dest_url.to_string();
            let title = title.to_string();
            *i += 1;
            let alt = collect_inlines(events, i, &|e| matches!(e, TagEnd::Image));
            Inline::Image { dest, title, alt }
        }
        _ => return None,
    };
    Some(inline)
}

/// Collect inline nodes until a matching End tag.
fn collect_inlines(
    events: &Events<'_>,
    i: &mut usize,
    is_end: &dyn Fn(&TagEnd) -> bool,
) -> Vec<Inline> {
    let mut inlines = Vec::new();

    while *i < events.len() {
        if let (Event::End(tag_end), _) = &events[*i] {
            if is_end(tag_end) {
                *i += 1;
                break;
            }
        }
        match parse_inline(events, i) {
            Some(inline) => inlines.push(inline),
            None => *i += 1,
        }
    }

    attach_code_attributes(inlines)
}

/// Collect a run of inline events that is not wrapped in a paragraph.
fn collect_loose_inlines(events: &Events<'_>, i: &mut usize) -> Vec<Inline> {
    let mut inlines = Vec::new();
    while *i < events.len() {
        match parse_inline(events, i) {
            Some(inline) => inlines.push(inline),
            None => break,
        }
    }
    attach_code_attributes(inlines)
}

/// Merge adjacent text and move a `{...}` group that directly follows a
/// code span onto that span.
fn attach_code_attributes(inlines: Vec<Inline>) -> Vec<Inline> {
    let mut merged: Vec<Inline> = Vec::with_capacity(inlines.len());
    for inline in inlines {
        match inline {
            Inline::Text(text) => {
                if let Some(Inline::Text(prev)) = merged.last_mut() {
                    prev.push_str(&text);
                } else {
                    merged.push(Inline::Text(text));
                }
            }
            other => merged.push(other),
        }
    }

    let mut out = Vec::with_capacity(merged.len());
    let mut iter = merged.into_iter().peekable();
    while let Some(inline) = iter.next() {
        let Inline::Code { attr, text } = inline else {
            out.push(inline);
            continue;
        };
        let split = match iter.peek() {
            Some(Inline::Text(next)) => {
                split_attr_prefix(next).map(|(attr, rest)| (attr, rest.to_string()))
            }
            _ => None,
        };
        match split {
            Some((attr, rest)) => {
                iter.next();
                out.push(Inline::Code { attr, text });
                if !rest.is_empty() {
                    out.push(Inline::Text(rest));
                }
            }
            None => out.push(Inline::Code { attr, text }),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn heading_level_to_u8(level: &HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn convert_alignment(alignment: &Alignment) -> ColumnAlignment {
    match alignment {
        Alignment::None => ColumnAlignment::None,
        Alignment::Left => ColumnAlignment::Left,
        Alignment::Center => ColumnAlignment::Center,
        Alignment::Right => ColumnAlignment::Right,
    }
}

/// Collect all literal content until a matching End tag.
fn collect_text_until(
    events: &Events<'_>,
    i: &mut usize,
    is_end: impl Fn(&TagEnd) -> bool,
) -> String {
    let mut text = String::new();
    while *i < events.len() {
        let (ref ev, _) = events[*i];
        match ev {
            Event::End(tag_end) if is_end(tag_end) => {
                *i += 1;
                break;
            }
            Event::Text(s) | Event::Html(s) => {
                text.push_str(s);
                *i += 1;
            }
            _ => {
                *i += 1;
            }
        }
    }
    text
}

/// Collect front-matter text and the byte offset where it starts.
fn collect_metadata(events: &Events<'_>, i: &mut usize) -> (String, usize) {
    let mut text = String::new();
    let mut offset = None;
    while *i < events.len() {
        let (ref ev, ref range) = events[*i];
        match ev {
            Event::End(TagEnd::MetadataBlock(_)) => {
                *i += 1;
                break;
            }
            Event::Text(s) => {
                offset.get_or_insert(range.start);
                text.push_str(s);
                *i += 1;
            }
            _ => {
                *i += 1;
            }
        }
    }
    (text, offset.unwrap_or(0))
}
