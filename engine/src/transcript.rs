//! Turn boundaries in raw interpreter output.
//!
//! An interactive interpreter prints a prompt when it is ready for a new
//! statement and a continuation marker when it needs more lines of the
//! current one. Everything up to and including either marker is one turn.

use std::io::{ErrorKind, Read};

use tracing::trace;

use crate::error::ExecError;

/// Bytes requested from the interpreter per read.
pub const CHUNK_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Prompt,
    Continuation,
}

/// One turn of interpreter output, including its terminating marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub text: String,
    pub marker: Marker,
}

/// Reads turns from an interpreter's merged stdout/stderr stream.
pub struct TranscriptReader<R> {
    inner: R,
    prompt: Vec<u8>,
    continuation: Vec<u8>,
}

impl<R: Read> TranscriptReader<R> {
    pub fn new(inner: R, prompt: &str, continuation: &str) -> Self {
        TranscriptReader {
            inner,
            prompt: prompt.as_bytes().to_vec(),
            continuation: continuation.as_bytes().to_vec(),
        }
    }

    /// Block until the accumulated output ends with the prompt or the
    /// continuation marker.
    ///
    /// The interpreter is idle once it has printed a marker, so a read never
    /// runs past the end of the current turn.
    pub fn read_turn(&mut self) -> Result<Turn, ExecError> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            if let Some(marker) = self.terminator(&buf) {
                let text = String::from_utf8_lossy(&buf).into_owned();
                trace!(?marker, len = buf.len(), "read interpreter turn");
                return Ok(Turn { text, marker });
            }
            let n = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                return Err(ExecError::SessionTerminated {
                    output: String::from_utf8_lossy(&buf).into_owned(),
                });
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn terminator(&self, buf: &[u8]) -> Option<Marker> {
        if !self.prompt.is_empty() && buf.ends_with(&self.prompt) {
            Some(Marker::Prompt)
        } else if !self.continuation.is_empty() && buf.ends_with(&self.continuation) {
            Some(Marker::Continuation)
        } else {
            None
        }
    }
}

/// Turn a raw transcript into the text spliced into the document.
///
/// The final line (the trailing prompt) is dropped. With `echo_input`, the
/// source lines stay in the output: `repl_mode` keeps their prompts, otherwise
/// a leading marker is stripped from every line. Without `echo_input`, every
/// line that starts with a marker is dropped, leaving only computed output.
pub fn shape_transcript(
    transcript: &str,
    prompt: &str,
    continuation: &str,
    echo_input: bool,
    repl_mode: bool,
) -> String {
    let mut lines: Vec<&str> = transcript
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();
    lines.pop();

    let marker_len = |line: &str| {
        if line.starts_with(prompt) {
            Some(prompt.len())
        } else if line.starts_with(continuation) {
            Some(continuation.len())
        } else {
            None
        }
    };

    let shaped: Vec<&str> = if echo_input {
        if repl_mode {
            lines
        } else {
            lines
                .into_iter()
                .map(|line| match marker_len(line) {
                    Some(len) => &line[len..],
                    None => line,
                })
                .collect()
        }
    } else {
        lines
            .into_iter()
            .filter(|line| marker_len(line).is_none())
            .collect()
    };

    shaped.join("\n")
}

/// Drop one leading line break from a turn's output.
pub fn strip_leading_newline(text: &str) -> &str {
    text.strip_prefix("\r\n")
        .or_else(|| text.strip_prefix('\n'))
        .unwrap_or(text)
}
