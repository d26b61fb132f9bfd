pub mod attr;
pub mod node;
mod render;

use std::collections::BTreeMap;

pub use attr::Attr;
pub use node::{Children, Family, Node, ShapeError};

/// A parsed document: front-matter metadata plus the top-level blocks.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub meta: BTreeMap<String, MetaValue>,
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn empty() -> Self {
        Document::default()
    }

    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Document {
            meta: BTreeMap::new(),
            blocks,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.meta.is_empty() && self.blocks.is_empty()
    }

    /// Split the document into its two root containers: the metadata map
    /// followed by the block sequence.
    pub fn into_children(self) -> Vec<Children> {
        vec![
            Children::Map(
                self.meta
                    .into_iter()
                    .map(|(key, value)| (key, Node::Meta(value)))
                    .collect(),
            ),
            Children::Sequence(self.blocks.into_iter().map(Node::Block).collect()),
        ]
    }

    /// Inverse of [`Document::into_children`].
    pub fn from_children(children: Vec<Children>) -> Result<Self, ShapeError> {
        let mut slots = children.into_iter();
        let meta = node::next_map(&mut slots)?
            .into_iter()
            .map(|(key, value)| node::meta_value(value).map(|value| (key, value)))
            .collect::<Result<_, _>>()?;
        let blocks = node::blocks(node::next_sequence(&mut slots)?)?;
        Ok(Document { meta, blocks })
    }
}

/// Block-level nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Inline content without paragraph semantics (tight list items, lifted inlines).
    Plain(Vec<Inline>),
    Paragraph(Vec<Inline>),
    Heading {
        level: u8,
        attr: Attr,
        content: Vec<Inline>,
    },
    CodeBlock {
        attr: Attr,
        text: String,
    },
    BlockQuote(Vec<Block>),
    OrderedList {
        start: u64,
        items: Vec<Block>,
    },
    BulletList {
        items: Vec<Block>,
    },
    /// One entry of an ordered or bullet list.
    ListItem(Vec<Block>),
    Table {
        alignments: Vec<ColumnAlignment>,
        head: Box<Block>,
        rows: Vec<Block>,
    },
    TableRow(Vec<Block>),
    TableCell(Vec<Inline>),
    /// Generic block container.
    Div {
        attr: Attr,
        content: Vec<Block>,
    },
    /// Raw HTML passed through untouched.
    Html(String),
    HorizontalRule,
}

/// Inline nodes. These nest freely within one another.
#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Text(String),
    Code {
        attr: Attr,
        text: String,
    },
    Emphasis(Vec<Inline>),
    Strong(Vec<Inline>),
    Strikethrough(Vec<Inline>),
    Link {
        dest: String,
        title: String,
        content: Vec<Inline>,
    },
    Image {
        dest: String,
        title: String,
        alt: Vec<Inline>,
    },
    Math {
        display: bool,
        text: String,
    },
    /// Generic inline container.
    Span {
        attr: Attr,
        content: Vec<Inline>,
    },
    Html(String),
    SoftBreak,
    HardBreak,
}

/// Front-matter values.
///
/// String values are parsed as Markdown so that they can carry executable
/// code like any other part of the document. Numbers and dates are kept as
/// their literal text in `Str`.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Bool(bool),
    Str(String),
    Inlines(Vec<Inline>),
    Blocks(Vec<Block>),
    List(Vec<MetaValue>),
    Map(BTreeMap<String, MetaValue>),
}

impl Default for MetaValue {
    fn default() -> Self {
        MetaValue::Str(String::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnAlignment {
    None,
    Left,
    Center,
    Right,
}

/// Collapse blocks into a single inline run.
///
/// Inline content of consecutive blocks is separated by a soft break; code
/// blocks become code spans and rules vanish.
pub fn flatten_inlines(blocks: Vec<Block>) -> Vec<Inline> {
    let mut out = Vec::new();
    for block in blocks {
        let inlines = match block {
            Block::Plain(content)
            | Block::Paragraph(content)
            | Block::TableCell(content)
            | Block::Heading { content, .. } => content,
            Block::CodeBlock { attr, text } => vec![Inline::Code {
                attr,
                text: text.trim_end_matches('\n').to_string(),
            }],
            Block::BlockQuote(content)
            | Block::ListItem(content)
            | Block::TableRow(content)
            | Block::Div { content, .. }
            | Block::OrderedList { items: content, .. }
            | Block::BulletList { items: content } => flatten_inlines(content),
            Block::Table { head, rows, .. } => {
                let mut all = vec![*head];
                all.extend(rows);
                flatten_inlines(all)
            }
            Block::Html(html) => vec![Inline::Html(html)],
            Block::HorizontalRule => Vec::new(),
        };
        if inlines.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(Inline::SoftBreak);
        }
        out.extend(inlines);
    }
    out
}
