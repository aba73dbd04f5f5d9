use crate::builtin::Builtins;
use crate::command::ExitCode;
use crate::env::Environment;
use crate::error::ParseError;
use crate::job::JobRunner;
use crate::parser::{self, ParsedLine};
use crate::terminal::Terminal;
use crate::tracker::RunningProcesses;

/// Parses input lines and runs their jobs one after another.
///
/// Example
/// ```
/// use pipesh::{Environment, Interpreter, RunningProcesses};
/// let mut sh = Interpreter::new(Environment::new(), RunningProcesses::new());
/// let code = sh.execute_line("true && false").unwrap();
/// assert_eq!(code, Some(1));
/// ```
pub struct Interpreter {
    env: Environment,
    builtins: Builtins,
    running: RunningProcesses,
    terminal: Option<Terminal>,
}

impl Interpreter {
    /// Create an interpreter whose spawned processes are published to `running`.
    pub fn new(env: Environment, running: RunningProcesses) -> Self {
        Self {
            env,
            builtins: Builtins::default(),
            running,
            terminal: None,
        }
    }

    /// Run every pipeline in the foreground of `terminal`.
    pub fn with_terminal(mut self, terminal: Terminal) -> Self {
        self.terminal = Some(terminal);
        self
    }

    /// Parses and runs one line.
    ///
    /// Returns the status of the last job that actually ran, `None` if the line had no
    /// jobs. A parse error runs nothing.
    pub fn execute_line(&mut self, line: &str) -> Result<Option<ExitCode>, ParseError> {
        let parsed = parser::parse_line(line, &self.env)?;
        tracing::debug!(?parsed, "parsed line");
        Ok(self.execute(&parsed))
    }

    /// Runs the jobs of `parsed`, skipping those whose connector rejects the status of
    /// the last job that ran.
    pub fn execute(&mut self, parsed: &ParsedLine) -> Option<ExitCode> {
        let runner = JobRunner::new(&self.env, &self.builtins, &self.running)
            .with_terminal(self.terminal.as_ref());
        let mut last_status = None;
        for job in &parsed.jobs {
            if !job.connector.should_run(last_status.unwrap_or(0)) {
                tracing::debug!(connector = ?job.connector, "skipping job");
                continue;
            }
            let status = runner.run(job);
            tracing::debug!(status, "job finished");
            last_status = Some(status);
        }
        last_status
    }
}
