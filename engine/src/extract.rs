use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

/// `` `CODE`{.tag1 .tag2} ``: backtick-delimited code directly followed by
/// a brace group of dot-prefixed tags.
static EMBEDDED_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"`([^`]+)`\{((?:\s*\.[^\s.{}]+)+)\s*\}").expect("embedded code pattern is valid")
});

/// Code found inside a plain text field such as a math expression or URL.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedCode {
    pub code: String,
    /// Tags with their leading dots removed.
    pub tags: Vec<String>,
    /// Byte range of the whole match, backticks and braces included.
    pub span: Range<usize>,
}

impl EmbeddedCode {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Find the first embedded code fragment in `text`.
///
/// Only the first match is reported; later fragments in the same field are
/// left for the caller.
pub fn find_embedded_code(text: &str) -> Option<EmbeddedCode> {
    let caps = EMBEDDED_CODE.captures(text)?;
    let whole = caps.get(0)?;
    let tags = caps[2]
        .split_whitespace()
        .map(|tag| tag.trim_start_matches('.').to_string())
        .collect();
    Some(EmbeddedCode {
        code: caps[1].to_string(),
        tags,
        span: whole.range(),
    })
}
