use std::collections::BTreeMap;

use crate::document::{Block, MetaValue};
use crate::parser::error::ParseError;
use crate::parser::structural;

/// Parse `+++` front matter as TOML. `offset` is the byte position of the
/// TOML text within the document, used to place error spans.
pub(crate) fn parse_front_matter(
    text: &str,
    offset: usize,
    file_id: usize,
) -> Result<BTreeMap<String, MetaValue>, ParseError> {
    let table: toml::Table =
        toml::from_str(text).map_err(|e| ParseError::from_toml(&e, offset, file_id))?;
    Ok(table
        .into_iter()
        .map(|(key, value)| (key, meta_from_toml(value)))
        .collect())
}

fn meta_from_toml(value: toml::Value) -> MetaValue {
    match value {
        toml::Value::String(s) => markup_meta(&s),
        toml::Value::Boolean(b) => MetaValue::Bool(b),
        toml::Value::Array(items) => {
            MetaValue::List(items.into_iter().map(meta_from_toml).collect())
        }
        toml::Value::Table(entries) => MetaValue::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key, meta_from_toml(value)))
                .collect(),
        ),
        other => MetaValue::Str(other.to_string()),
    }
}

/// A single paragraph becomes inline metadata; anything else stays as blocks.
fn markup_meta(text: &str) -> MetaValue {
    let mut blocks = structural::parse_blocks(text);
    match blocks.len() {
        0 => MetaValue::Inlines(Vec::new()),
        1 => match blocks.remove(0) {
            Block::Paragraph(inlines) => MetaValue::Inlines(inlines),
            other => MetaValue::Blocks(vec![other]),
        },
        _ => MetaValue::Blocks(blocks),
    }
}
