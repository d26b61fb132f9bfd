use std::fmt;

/// Identifier, classes and key/value pairs attached to a node, written
/// `{#id .class key="value"}` in the source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attr {
    pub id: String,
    pub classes: Vec<String>,
    pub pairs: Vec<(String, String)>,
}

impl Attr {
    pub fn with_classes<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Attr {
            classes: classes.into_iter().map(Into::into).collect(),
            ..Attr::default()
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty() && self.classes.is_empty() && self.pairs.is_empty()
    }

    /// Parse a complete attribute group such as `{.python .echo}`.
    pub fn parse(text: &str) -> Option<Attr> {
        match split_attr_prefix(text.trim()) {
            Some((attr, rest)) if rest.is_empty() => Some(attr),
            _ => None,
        }
    }

    /// Parse a fenced code block info string.
    ///
    /// Accepts `python`, `python {.echo}` and `{.python .echo}`. A leading
    /// bare word becomes the first class.
    pub fn from_info_string(info: &str) -> Attr {
        let info = info.trim();
        if info.is_empty() {
            return Attr::default();
        }
        if let Some(attr) = Attr::parse(info) {
            return attr;
        }
        let (word, rest) = match info.find(char::is_whitespace) {
            Some(pos) => (&info[..pos], info[pos..].trim()),
            None => (info, ""),
        };
        let mut attr = if rest.is_empty() {
            Attr::default()
        } else {
            Attr::parse(rest).unwrap_or_default()
        };
        attr.classes.insert(0, word.to_string());
        attr
    }
}

/// Parse an attribute group at the very start of `text`, returning the
/// attributes and the text following the closing brace.
pub fn split_attr_prefix(text: &str) -> Option<(Attr, &str)> {
    let body = text.strip_prefix('{')?;
    let mut attr = Attr::default();
    let mut pos = 0;
    let bytes = body.as_bytes();

    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        match *bytes.get(pos)? {
            b'}' => return Some((attr, &body[pos + 1..])),
            b'.' => {
                let word = read_word(body, pos + 1);
                if word.is_empty() {
                    return None;
                }
                attr.classes.push(word.to_string());
                pos += 1 + word.len();
            }
            b'#' => {
                let word = read_word(body, pos + 1);
                if word.is_empty() {
                    return None;
                }
                attr.id = word.to_string();
                pos += 1 + word.len();
            }
            _ => {
                let key_end = body[pos..].find('=')? + pos;
                let key = &body[pos..key_end];
                if key.is_empty() || key.contains(|c: char| c.is_whitespace() || c == '}') {
                    return None;
                }
                pos = key_end + 1;
                let value = if bytes.get(pos) == Some(&b'"') {
                    let close = body[pos + 1..].find('"')? + pos + 1;
                    let value = &body[pos + 1..close];
                    pos = close + 1;
                    value
                } else {
                    let value = read_word(body, pos);
                    pos += value.len();
                    value
                };
                attr.pairs.push((key.to_string(), value.to_string()));
            }
        }
    }
}

fn read_word(text: &str, start: usize) -> &str {
    let rest = &text[start..];
    let end = rest
        .find(|c: char| c.is_whitespace() || c == '}')
        .unwrap_or(rest.len());
    &rest[..end]
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.id.is_empty() {
            parts.push(format!("#{}", self.id));
        }
        for class in &self.classes {
            parts.push(format!(".{}", class));
        }
        for (key, value) in &self.pairs {
            parts.push(format!("{}=\"{}\"", key, value));
        }
        write!(f, "{{{}}}", parts.join(" "))
    }
}
