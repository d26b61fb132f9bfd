pub mod error;
mod front_matter;
mod structural;

pub use error::ParseError;

use crate::document::{Block, Document};

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Parse the source Markdown into a complete Document, including any
    /// `+++` TOML front matter.
    pub fn parse(&self) -> Result<Document, Vec<ParseError>> {
        structural::parse_document(&self.source, self.file_id)
    }
}

/// Parse a Markdown fragment, such as interpreter output, into blocks.
///
/// Fragments never carry front matter, so this cannot fail.
pub fn parse_fragment(text: &str) -> Vec<Block> {
    structural::parse_blocks(text)
}
