use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::ExecError;
use crate::platform;
use crate::session::{Launcher, Runner, Session};

/// How to start and talk to the interpreter.
///
/// Every field has a default, so a TOML file only needs the keys it
/// changes:
///
/// ```toml
/// program = "/opt/py/bin/python3"
/// prelude = ["from sciengdox.units import pq"]
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub prompt: String,
    pub continuation: String,
    pub exit_command: String,
    /// Lines run silently right after the interpreter starts.
    pub prelude: Vec<String>,
    /// Function names whose whole-span calls run without a `python` tag.
    pub shorthands: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            program: "python3".to_string(),
            args: vec!["-i".to_string(), "-q".to_string(), "-u".to_string()],
            env: BTreeMap::from([("PYTHON_BASIC_REPL".to_string(), "1".to_string())]),
            prompt: ">>> ".to_string(),
            continuation: "... ".to_string(),
            exit_command: "exit()".to_string(),
            prelude: Vec::new(),
            shorthands: ["pq", "pmd", "pf", "pi"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl SessionConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ExecError> {
        let config: SessionConfig =
            toml::from_str(text).map_err(|e| ExecError::Config(e.message().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ExecError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text).map_err(|e| match e {
            ExecError::Config(message) => {
                ExecError::Config(format!("{}: {}", path.display(), message))
            }
            other => other,
        })
    }

    pub fn validate(&self) -> Result<(), ExecError> {
        if self.program.is_empty() {
            return Err(ExecError::Config("program must not be empty".to_string()));
        }
        if self.prompt.is_empty() || self.continuation.is_empty() {
            return Err(ExecError::Config(
                "prompt and continuation markers must not be empty".to_string(),
            ));
        }
        if self.prompt == self.continuation {
            return Err(ExecError::Config(
                "prompt and continuation markers must differ".to_string(),
            ));
        }
        Ok(())
    }
}

impl Launcher for SessionConfig {
    fn preflight(&self) -> Result<(), ExecError> {
        self.validate()?;
        platform::check_io_encoding(&self.env)
    }

    fn launch(&self) -> Result<Box<dyn Runner>, ExecError> {
        let mut session = Session::start(self)?;
        if !self.prelude.is_empty() {
            let output = session.run_lines(&self.prelude, false, false)?;
            debug!(lines = self.prelude.len(), %output, "ran prelude");
        }
        Ok(Box::new(session))
    }
}
