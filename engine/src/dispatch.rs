use doctree::{Attr, Block, Inline, Node, flatten_inlines, parse_fragment};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use regex::Regex;
use tracing::debug;

use crate::error::ExecError;
use crate::extract::find_embedded_code;
use crate::indent::indent_level;
use crate::session::Executor;

pub const PYTHON: &str = "python";
pub const NOEXEC: &str = "noexec";
pub const ECHO: &str = "echo";
pub const AS_CODE: &str = "asCode";
pub const REPL: &str = "repl";
pub const MD: &str = "md";

/// Characters escaped when a rewritten image URL is encoded again.
const URL_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'%')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// What the walker does with a node after dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// The node stays where it is, possibly edited in place.
    Keep,
    /// The node is replaced by zero or more nodes.
    Replace(Vec<Node>),
}

/// Decides whether and how a node executes, and what it turns into.
pub struct Dispatcher {
    shorthand: Option<Regex>,
}

impl Dispatcher {
    pub fn new(shorthands: &[String]) -> Result<Self, ExecError> {
        if shorthands.is_empty() {
            return Ok(Dispatcher { shorthand: None });
        }
        let names: Vec<String> = shorthands.iter().map(|name| regex::escape(name)).collect();
        let pattern = format!(r"^(?:{})\(.*\)$", names.join("|"));
        let shorthand = Regex::new(&pattern)
            .map_err(|e| ExecError::Config(format!("invalid shorthand names: {}", e)))?;
        Ok(Dispatcher {
            shorthand: Some(shorthand),
        })
    }

    pub fn is_shorthand(&self, text: &str) -> bool {
        self.shorthand.as_ref().is_some_and(|re| re.is_match(text))
    }

    pub fn dispatch(&self, node: &mut Node, executor: &mut Executor) -> Result<Action, ExecError> {
        match node {
            Node::Inline(Inline::Image { dest, .. }) => {
                let decoded = percent_decode_str(dest).decode_utf8_lossy().into_owned();
                if let Some(spliced) = splice_embedded(&decoded, executor, true)? {
                    *dest = utf8_percent_encode(&spliced, URL_ESCAPE).to_string();
                }
                Ok(Action::Keep)
            }
            Node::Inline(Inline::Math { text, .. }) => {
                if let Some(spliced) = splice_embedded(text, executor, false)? {
                    *text = spliced;
                }
                Ok(Action::Keep)
            }
            Node::Block(Block::CodeBlock { attr, text }) => {
                if attr.has_class(NOEXEC) || !attr.has_class(PYTHON) {
                    return Ok(Action::Keep);
                }
                let lines = block_lines(text);
                let echo = attr.has_class(ECHO);
                let transcript = executor.run_lines(&lines, echo, attr.has_class(REPL))?;
                debug!(lines = lines.len(), echo, "executed code block");
                if echo {
                    *text = transcript;
                    Ok(Action::Keep)
                } else {
                    Ok(Action::Replace(Vec::new()))
                }
            }
            Node::Inline(Inline::Code { attr, text }) => {
                if attr.has_class(NOEXEC) {
                    return Ok(Action::Keep);
                }
                if self.is_shorthand(text) {
                    let output = executor.evaluate(text)?;
                    debug!(call = %text, "executed shorthand");
                    let content = flatten_inlines(parse_fragment(output.trim()));
                    return Ok(Action::Replace(vec![Node::Inline(Inline::Span {
                        attr: Attr::default(),
                        content,
                    })]));
                }
                if !attr.has_class(PYTHON) {
                    return Ok(Action::Keep);
                }
                let result = executor.evaluate(text)?.trim().to_string();
                debug!(code = %text, "executed inline code");
                if attr.has_class(AS_CODE) {
                    *text = result;
                    Ok(Action::Keep)
                } else if attr.has_class(MD) {
                    Ok(Action::Replace(
                        parse_fragment(&result).into_iter().map(Node::Block).collect(),
                    ))
                } else {
                    Ok(Action::Replace(vec![Node::Inline(Inline::Text(result))]))
                }
            }
            _ => Ok(Action::Keep),
        }
    }
}

/// Source lines of a code block. A block whose last line is indented gets
/// an empty line appended so the interpreter closes the open suite.
fn block_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    let open_suite = lines
        .iter()
        .rev()
        .find(|line| !line.trim().is_empty())
        .is_some_and(|line| indent_level(line) > 0);
    if open_suite {
        lines.push(String::new());
    }
    lines
}

/// Execute the first embedded `python` fragment of `text` and return the
/// text with that fragment replaced by the result.
fn splice_embedded(
    text: &str,
    executor: &mut Executor,
    strip_quotes: bool,
) -> Result<Option<String>, ExecError> {
    let Some(found) = find_embedded_code(text) else {
        return Ok(None);
    };
    if !found.has_tag(PYTHON) || found.has_tag(NOEXEC) {
        return Ok(None);
    }
    let output = executor.evaluate(&found.code)?;
    let mut value = output.trim().to_string();
    if strip_quotes {
        value.retain(|c| c != '\'' && c != '"');
    }
    debug!(code = %found.code, "executed embedded code");

    let mut spliced = String::with_capacity(text.len() + value.len());
    spliced.push_str(&text[..found.span.start]);
    spliced.push_str(&value);
    spliced.push_str(&text[found.span.end..]);
    Ok(Some(spliced))
}
