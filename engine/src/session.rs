use std::io::{ErrorKind, PipeReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};

use tracing::{debug, trace};

use crate::config::SessionConfig;
use crate::error::ExecError;
use crate::indent::normalize_indentation;
use crate::transcript::{TranscriptReader, shape_transcript, strip_leading_newline};

/// Something that executes batches of source lines with shared state.
pub trait Runner {
    /// Send `lines` one at a time and return the shaped transcript.
    fn run_lines(
        &mut self,
        lines: &[String],
        echo_input: bool,
        repl_mode: bool,
    ) -> Result<String, ExecError>;

    /// Shut the interpreter down. Consumes the runner so it cannot be reused.
    fn close(self: Box<Self>) -> Result<(), ExecError>;
}

/// Creates runners on demand.
pub trait Launcher {
    /// Checks that must pass before any document node is touched.
    fn preflight(&self) -> Result<(), ExecError> {
        Ok(())
    }

    fn launch(&self) -> Result<Box<dyn Runner>, ExecError>;
}

// ---------------------------------------------------------------------------
// Interpreter subprocess
// ---------------------------------------------------------------------------

/// One interactive interpreter subprocess.
///
/// stdout and stderr share a single pipe so that prompts, results and
/// tracebacks arrive in the order the interpreter wrote them.
pub struct Session {
    child: Child,
    stdin: Option<ChildStdin>,
    reader: TranscriptReader<PipeReader>,
    prompt: String,
    continuation: String,
    exit_command: String,
    closed: bool,
}

impl Session {
    /// Spawn the interpreter and consume everything up to its first prompt.
    pub fn start(config: &SessionConfig) -> Result<Self, ExecError> {
        let (pipe_reader, pipe_writer) = std::io::pipe()?;

        // The command holds the parent's copies of the pipe's write end; it
        // has to be dropped before reading or EOF never arrives.
        let mut child = {
            let mut command = Command::new(&config.program);
            command
                .args(&config.args)
                .envs(&config.env)
                .stdin(Stdio::piped())
                .stdout(pipe_writer.try_clone()?)
                .stderr(pipe_writer);
            command.spawn().map_err(|source| ExecError::Spawn {
                program: config.program.clone(),
                source,
            })?
        };
        debug!(program = %config.program, pid = child.id(), "started interpreter");

        let stdin = child.stdin.take();
        let mut session = Session {
            child,
            stdin,
            reader: TranscriptReader::new(pipe_reader, &config.prompt, &config.continuation),
            prompt: config.prompt.clone(),
            continuation: config.continuation.clone(),
            exit_command: config.exit_command.clone(),
            closed: false,
        };
        let banner = session.reader.read_turn()?;
        trace!(banner = %banner.text, "interpreter ready");
        Ok(session)
    }

    fn send(&mut self, line: &str) -> Result<(), ExecError> {
        let stdin = self.stdin.as_mut().ok_or(ExecError::SessionClosed)?;
        let result = stdin
            .write_all(line.as_bytes())
            .and_then(|()| stdin.write_all(b"\n"))
            .and_then(|()| stdin.flush());
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::BrokenPipe => Err(ExecError::SessionTerminated {
                output: String::new(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

impl Runner for Session {
    fn run_lines(
        &mut self,
        lines: &[String],
        echo_input: bool,
        repl_mode: bool,
    ) -> Result<String, ExecError> {
        let lines = normalize_indentation(lines);
        let mut transcript = self.prompt.clone();

        for line in &lines {
            self.send(line)?;
            let turn = self.reader.read_turn()?;
            debug!(line = %line, marker = ?turn.marker, "interpreter turn");
            transcript.push_str(line);
            transcript.push('\n');
            transcript.push_str(strip_leading_newline(&turn.text));
        }

        Ok(shape_transcript(
            &transcript,
            &self.prompt,
            &self.continuation,
            echo_input,
            repl_mode,
        ))
    }

    fn close(mut self: Box<Self>) -> Result<(), ExecError> {
        let exit_command = std::mem::take(&mut self.exit_command);
        // A session that already died has nothing left to shut down.
        match self.send(&exit_command) {
            Ok(()) | Err(ExecError::SessionTerminated { .. }) => {}
            Err(e) => return Err(e),
        }
        self.stdin = None;
        let status = self.child.wait()?;
        self.closed = true;
        debug!(%status, "interpreter exited");
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

// ---------------------------------------------------------------------------
// Lazily started, single-use runner
// ---------------------------------------------------------------------------

/// The one runner of a document run.
///
/// Nothing is launched until the first executable node asks for it, and
/// once closed the executor refuses further work.
pub struct Executor<'a> {
    launcher: &'a dyn Launcher,
    runner: Option<Box<dyn Runner>>,
    closed: bool,
}

impl<'a> Executor<'a> {
    pub fn new(launcher: &'a dyn Launcher) -> Self {
        Executor {
            launcher,
            runner: None,
            closed: false,
        }
    }

    pub fn is_started(&self) -> bool {
        self.runner.is_some()
    }

    pub fn run_lines(
        &mut self,
        lines: &[String],
        echo_input: bool,
        repl_mode: bool,
    ) -> Result<String, ExecError> {
        if self.closed {
            return Err(ExecError::SessionClosed);
        }
        if self.runner.is_none() {
            debug!("launching interpreter for first executable node");
            self.runner = Some(self.launcher.launch()?);
        }
        match self.runner.as_mut() {
            Some(runner) => runner.run_lines(lines, echo_input, repl_mode),
            None => Err(ExecError::SessionClosed),
        }
    }

    /// Evaluate one expression and return only what it printed.
    pub fn evaluate(&mut self, code: &str) -> Result<String, ExecError> {
        self.run_lines(&[code.to_string()], false, false)
    }

    /// Close the runner if one was started. Later calls are no-ops.
    pub fn close(&mut self) -> Result<(), ExecError> {
        self.closed = true;
        match self.runner.take() {
            Some(runner) => runner.close(),
            None => Ok(()),
        }
    }
}
