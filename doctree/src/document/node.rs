use std::collections::BTreeMap;
use std::fmt;
use std::mem;

use crate::document::{Attr, Block, Inline, MetaValue};

/// The structural category of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Block,
    Inline,
    Meta,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::Block => write!(f, "block"),
            Family::Inline => write!(f, "inline"),
            Family::Meta => write!(f, "metadata"),
        }
    }
}

/// Any node of the document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Block(Block),
    Inline(Inline),
    Meta(MetaValue),
}

/// A child container detached from its owner.
///
/// Every node stores its children in zero or more of these shapes, in a
/// fixed order per node kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Children {
    Single(Node),
    Sequence(Vec<Node>),
    Map(BTreeMap<String, Node>),
}

/// A child container did not have the shape or family its owner requires.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeError {
    Family { expected: Family, found: Family },
    Slot { expected: &'static str },
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeError::Family { expected, found } => {
                write!(f, "expected a {} node, found a {} node", expected, found)
            }
            ShapeError::Slot { expected } => {
                write!(f, "expected a {} child container", expected)
            }
        }
    }
}

impl std::error::Error for ShapeError {}

impl Node {
    pub fn family(&self) -> Family {
        match self {
            Node::Block(_) => Family::Block,
            Node::Inline(_) => Family::Inline,
            Node::Meta(_) => Family::Meta,
        }
    }

    /// An empty generic container of the given family: `Div`, `Span` or a
    /// metadata list.
    pub fn container(family: Family) -> Node {
        match family {
            Family::Block => Node::Block(Block::Div {
                attr: Attr::default(),
                content: Vec::new(),
            }),
            Family::Inline => Node::Inline(Inline::Span {
                attr: Attr::default(),
                content: Vec::new(),
            }),
            Family::Meta => Node::Meta(MetaValue::List(Vec::new())),
        }
    }

    /// Move every child container out of this node, leaving the node itself
    /// as an empty shell.
    pub fn detach_children(&mut self) -> Vec<Children> {
        match self {
            Node::Block(block) => match block {
                Block::Plain(content)
                | Block::Paragraph(content)
                | Block::TableCell(content)
                | Block::Heading { content, .. } => vec![inline_sequence(content)],
                Block::BlockQuote(content)
                | Block::ListItem(content)
                | Block::TableRow(content)
                | Block::Div { content, .. }
                | Block::OrderedList { items: content, .. }
                | Block::BulletList { items: content } => vec![block_sequence(content)],
                Block::Table { head, rows, .. } => {
                    let head = mem::replace(head.as_mut(), Block::TableRow(Vec::new()));
                    vec![
                        Children::Single(Node::Block(head)),
                        block_sequence(rows),
                    ]
                }
                Block::CodeBlock { .. } | Block::Html(_) | Block::HorizontalRule => Vec::new(),
            },
            Node::Inline(inline) => match inline {
                Inline::Emphasis(content)
                | Inline::Strong(content)
                | Inline::Strikethrough(content)
                | Inline::Link { content, .. }
                | Inline::Image { alt: content, .. }
                | Inline::Span { content, .. } => vec![inline_sequence(content)],
                Inline::Text(_)
                | Inline::Code { .. }
                | Inline::Math { .. }
                | Inline::Html(_)
                | Inline::SoftBreak
                | Inline::HardBreak => Vec::new(),
            },
            Node::Meta(meta) => match meta {
                MetaValue::Inlines(content) => vec![inline_sequence(content)],
                MetaValue::Blocks(content) => vec![block_sequence(content)],
                MetaValue::List(items) => vec![Children::Sequence(
                    mem::take(items).into_iter().map(Node::Meta).collect(),
                )],
                MetaValue::Map(entries) => vec![Children::Map(
                    mem::take(entries)
                        .into_iter()
                        .map(|(key, value)| (key, Node::Meta(value)))
                        .collect(),
                )],
                MetaValue::Bool(_) | MetaValue::Str(_) => Vec::new(),
            },
        }
    }

    /// Put child containers back, in the order [`Node::detach_children`]
    /// produced them.
    pub fn attach_children(&mut self, children: Vec<Children>) -> Result<(), ShapeError> {
        let mut slots = children.into_iter();
        match self {
            Node::Block(shell) => match shell {
                Block::Plain(content)
                | Block::Paragraph(content)
                | Block::TableCell(content)
                | Block::Heading { content, .. } => *content = inlines(next_sequence(&mut slots)?)?,
                Block::BlockQuote(content)
                | Block::ListItem(content)
                | Block::TableRow(content)
                | Block::Div { content, .. }
                | Block::OrderedList { items: content, .. }
                | Block::BulletList { items: content } => {
                    *content = blocks(next_sequence(&mut slots)?)?
                }
                Block::Table { head, rows, .. } => {
                    **head = block(next_single(&mut slots)?)?;
                    *rows = blocks(next_sequence(&mut slots)?)?;
                }
                Block::CodeBlock { .. } | Block::Html(_) | Block::HorizontalRule => {}
            },
            Node::Inline(inline) => match inline {
                Inline::Emphasis(content)
                | Inline::Strong(content)
                | Inline::Strikethrough(content)
                | Inline::Link { content, .. }
                | Inline::Image { alt: content, .. }
                | Inline::Span { content, .. } => *content = inlines(next_sequence(&mut slots)?)?,
                Inline::Text(_)
                | Inline::Code { .. }
                | Inline::Math { .. }
                | Inline::Html(_)
                | Inline::SoftBreak
                | Inline::HardBreak => {}
            },
            Node::Meta(meta) => match meta {
                MetaValue::Inlines(content) => *content = inlines(next_sequence(&mut slots)?)?,
                MetaValue::Blocks(content) => *content = blocks(next_sequence(&mut slots)?)?,
                MetaValue::List(items) => {
                    *items = next_sequence(&mut slots)?
                        .into_iter()
                        .map(meta_value)
                        .collect::<Result<_, _>>()?
                }
                MetaValue::Map(entries) => {
                    *entries = next_map(&mut slots)?
                        .into_iter()
                        .map(|(key, value)| meta_value(value).map(|value| (key, value)))
                        .collect::<Result<_, _>>()?
                }
                MetaValue::Bool(_) | MetaValue::Str(_) => {}
            },
        }
        Ok(())
    }
}

fn inline_sequence(content: &mut Vec<Inline>) -> Children {
    Children::Sequence(mem::take(content).into_iter().map(Node::Inline).collect())
}

fn block_sequence(content: &mut Vec<Block>) -> Children {
    Children::Sequence(mem::take(content).into_iter().map(Node::Block).collect())
}

pub(crate) fn next_sequence(
    slots: &mut impl Iterator<Item = Children>,
) -> Result<Vec<Node>, ShapeError> {
    match slots.next() {
        Some(Children::Sequence(nodes)) => Ok(nodes),
        _ => Err(ShapeError::Slot {
            expected: "sequence",
        }),
    }
}

pub(crate) fn next_single(slots: &mut impl Iterator<Item = Children>) -> Result<Node, ShapeError> {
    match slots.next() {
        Some(Children::Single(node)) => Ok(node),
        _ => Err(ShapeError::Slot { expected: "single" }),
    }
}

pub(crate) fn next_map(
    slots: &mut impl Iterator<Item = Children>,
) -> Result<BTreeMap<String, Node>, ShapeError> {
    match slots.next() {
        Some(Children::Map(entries)) => Ok(entries),
        _ => Err(ShapeError::Slot { expected: "map" }),
    }
}

pub(crate) fn block(node: Node) -> Result<Block, ShapeError> {
    match node {
        Node::Block(block) => Ok(block),
        other => Err(ShapeError::Family {
            expected: Family::Block,
            found: other.family(),
        }),
    }
}

pub(crate) fn blocks(nodes: Vec<Node>) -> Result<Vec<Block>, ShapeError> {
    nodes.into_iter().map(block).collect()
}

pub(crate) fn inlines(nodes: Vec<Node>) -> Result<Vec<Inline>, ShapeError> {
    nodes
        .into_iter()
        .map(|node| match node {
            Node::Inline(inline) => Ok(inline),
            other => Err(ShapeError::Family {
                expected: Family::Inline,
                found: other.family(),
            }),
        })
        .collect()
}

pub(crate) fn meta_value(node: Node) -> Result<MetaValue, ShapeError> {
    match node {
        Node::Meta(value) => Ok(value),
        other => Err(ShapeError::Family {
            expected: Family::Meta,
            found: other.family(),
        }),
    }
}
