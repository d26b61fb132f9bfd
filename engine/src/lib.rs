//! Execution engine for live documents.
//!
//! Code fragments in a [`doctree::Document`] are sent, in reading order, to
//! one interactive interpreter session and their output is spliced back into
//! the tree.

pub mod arena;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod indent;
pub mod platform;
pub mod resolve;
pub mod session;
pub mod transcript;
pub mod walker;

pub use config::SessionConfig;
pub use error::ExecError;
pub use session::{Executor, Launcher, Runner, Session};
pub use walker::{execute_document, execute_document_with};
