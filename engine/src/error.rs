use std::io;

use doctree::ShapeError;
use thiserror::Error;

/// Errors that abort a document run.
///
/// Exceptions raised by the executed code are not errors here: the
/// interpreter prints them and they are spliced into the document like any
/// other output.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The interpreter process could not be started.
    #[error("failed to start interpreter '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Reading from or writing to the interpreter failed.
    #[error("interpreter I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The interpreter exited before printing a prompt.
    #[error("interpreter session terminated unexpectedly (last output: {output:?})")]
    SessionTerminated { output: String },

    /// The platform needs an explicit UTF-8 I/O encoding for the interpreter.
    #[error("{variable} must name a UTF-8 encoding on this platform (found {found})")]
    Encoding {
        variable: &'static str,
        found: String,
    },

    /// Code was submitted after the session was closed.
    #[error("interpreter session already closed")]
    SessionClosed,

    #[error("invalid configuration: {0}")]
    Config(String),

    /// A rewritten node did not fit the slot it was placed in.
    #[error("document shape error: {0}")]
    Shape(#[from] ShapeError),
}
