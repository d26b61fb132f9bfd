//! Document tree for live Markdown documents: the node model, a
//! pulldown-cmark based front end and a Markdown back end (`Display`).

pub mod document;
pub mod parser;

pub use document::{
    Attr, Block, Children, ColumnAlignment, Document, Family, Inline, MetaValue, Node,
    ShapeError, flatten_inlines,
};
pub use parser::{ParseError, Parser, parse_fragment};
