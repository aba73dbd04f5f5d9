//! Execution of a single job.
//!
//! A job goes through `Planning → Spawning → Running → Collecting → Done`. Planning
//! routes a lone builtin to the in-process dispatcher and otherwise prepares every
//! stage's stdin and stdout before anything starts, so a bad redirect aborts the job
//! without leaving half a pipeline behind.

use crate::builtin::Builtins;
use crate::command::{ExecutableCommand, ExitCode, InheritedStdin, Stdin, Stdout};
use crate::env::Environment;
use crate::error::ExecError;
use crate::external::{ExternalCommand, Placement, exit_code};
use crate::parser::{Command, Job};
use crate::terminal::Terminal;
use crate::tracker::RunningProcesses;
use nix::unistd::Pid;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::process::Child;

type Endpoints = (Box<dyn Stdin>, Box<dyn Stdout>);

/// Runs jobs against a fixed environment and builtin set, publishing spawned
/// processes to a [`RunningProcesses`] set.
pub struct JobRunner<'a> {
    env: &'a Environment,
    builtins: &'a Builtins,
    running: &'a RunningProcesses,
    terminal: Option<&'a Terminal>,
}

impl<'a> JobRunner<'a> {
    pub fn new(env: &'a Environment, builtins: &'a Builtins, running: &'a RunningProcesses) -> Self {
        Self {
            env,
            builtins,
            running,
            terminal: None,
        }
    }

    /// Puts each pipeline in the foreground of `terminal` while it runs.
    pub fn with_terminal(mut self, terminal: Option<&'a Terminal>) -> Self {
        self.terminal = terminal;
        self
    }

    /// Runs `job` to completion and returns its exit status.
    ///
    /// Errors are reported on stderr and turn into status 1.
    pub fn run(&self, job: &Job) -> ExitCode {
        if let [command] = job.commands.as_slice() {
            if let Some(builtin) = self.builtins.create(&command.args) {
                return report(self.run_builtin(command, builtin));
            }
        }
        report(self.run_pipeline(&job.commands))
    }

    fn run_builtin(
        &self,
        command: &Command,
        builtin: Box<dyn ExecutableCommand>,
    ) -> Result<ExitCode, ExecError> {
        if let Some(path) = &command.input {
            open_input(path)?;
        }
        let mut stdout: Box<dyn Write> = match &command.output {
            Some(path) => Box::new(open_output(path, command.append)?),
            None => Box::new(io::stdout()),
        };
        tracing::debug!(builtin = command.name(), "running builtin");
        let code = builtin.execute(stdout.as_mut(), self.env);
        if let Err(e) = stdout.flush() {
            eprintln!("{}: {e}", command.name());
            return Ok(1);
        }
        Ok(code)
    }

    fn run_pipeline(&self, commands: &[Command]) -> Result<ExitCode, ExecError> {
        let endpoints = plan_endpoints(commands)?;

        let mut children = Vec::with_capacity(commands.len());
        let mut spawn_error = None;
        // The first stage leads the pipeline's process group; the others join it.
        let mut group = None;
        let mut _foreground = None;
        // Endpoints of stages that never start are dropped with the iterator, closing
        // their pipe ends.
        for (command, (stdin, stdout)) in commands.iter().zip(endpoints) {
            let placement = Placement {
                group,
                terminal: self.terminal.map(Terminal::raw_fd),
            };
            let started = ExternalCommand::resolve(&command.args, self.env)
                .and_then(|external| external.spawn(stdin, stdout, self.env, placement));
            match started {
                Ok(child) => {
                    let pid = Pid::from_raw(child.id() as i32);
                    self.running.track(pid);
                    tracing::debug!(pid = pid.as_raw(), command = command.name(), "spawned");
                    if group.is_none() {
                        group = Some(pid);
                        _foreground = self.terminal.map(|t| t.foreground(pid));
                    }
                    children.push((command.name(), child));
                }
                Err(e) => {
                    spawn_error = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = spawn_error {
            // Stages that did start keep running unattended; they are not killed.
            tracing::debug!(started = children.len(), "abandoning partially started pipeline");
            self.running.clear();
            reap_detached(children.into_iter().map(|(_, child)| child).collect());
            return Err(e);
        }

        let status = self.collect(children);
        self.running.clear();
        Ok(status)
    }

    /// Waits for every stage in order. The last stage's status is the job's status.
    fn collect(&self, children: Vec<(&str, Child)>) -> ExitCode {
        let mut status = 0;
        for (name, mut child) in children {
            let pid = Pid::from_raw(child.id() as i32);
            status = match child.wait() {
                Ok(exit_status) => exit_code(exit_status),
                Err(source) => {
                    let e = ExecError::Wait {
                        name: name.to_string(),
                        source,
                    };
                    eprintln!("pipesh: {e}");
                    1
                }
            };
            self.running.untrack(pid);
            tracing::debug!(pid = pid.as_raw(), command = name, status, "reaped");
        }
        status
    }
}

/// Waits for abandoned children off the main thread so they do not linger as zombies.
fn reap_detached(children: Vec<Child>) {
    if children.is_empty() {
        return;
    }
    let spawned = std::thread::Builder::new()
        .name("pipesh-reaper".into())
        .spawn(move || {
            for mut child in children {
                match child.wait() {
                    Ok(status) => tracing::debug!(pid = child.id(), %status, "reaped abandoned stage"),
                    Err(e) => tracing::warn!(pid = child.id(), %e, "failed to reap abandoned stage"),
                }
            }
        });
    if let Err(e) = spawned {
        tracing::warn!(%e, "failed to start reaper thread");
    }
}

fn report(result: Result<ExitCode, ExecError>) -> ExitCode {
    result.unwrap_or_else(|e| {
        eprintln!("pipesh: {e}");
        1
    })
}

/// Decides where every stage reads from and writes to.
///
/// A redirect file takes precedence over the pipe on the same side; the unused pipe end
/// is dropped, so the neighbouring stage sees EOF or a broken pipe.
fn plan_endpoints(commands: &[Command]) -> Result<Vec<Endpoints>, ExecError> {
    let pipes = (1..commands.len())
        .map(|_| io::pipe())
        .collect::<io::Result<Vec<_>>>()
        .map_err(ExecError::Pipe)?;
    let (readers, writers): (Vec<_>, Vec<_>) = pipes.into_iter().unzip();
    let mut readers = readers.into_iter();
    let mut writers = writers.into_iter();

    let mut endpoints = Vec::with_capacity(commands.len());
    for (i, command) in commands.iter().enumerate() {
        let pipe_in = if i > 0 { readers.next() } else { None };
        let pipe_out = writers.next();

        let stdin: Box<dyn Stdin> = match (&command.input, pipe_in) {
            (Some(path), _) => Box::new(open_input(path)?),
            (None, Some(reader)) => Box::new(reader),
            (None, None) => Box::new(InheritedStdin),
        };
        let stdout: Box<dyn Stdout> = match (&command.output, pipe_out) {
            (Some(path), _) => Box::new(open_output(path, command.append)?),
            (None, Some(writer)) => Box::new(writer),
            (None, None) => Box::new(io::stdout()),
        };
        endpoints.push((stdin, stdout));
    }
    Ok(endpoints)
}

fn open_input(path: &Path) -> Result<File, ExecError> {
    File::open(path).map_err(|source| ExecError::OpenInput {
        path: path.to_path_buf(),
        source,
    })
}

fn open_output(path: &Path, append: bool) -> Result<File, ExecError> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).mode(0o644);
    if append {
        options.append(true);
    } else {
        options.truncate(true);
    }
    options.open(path).map_err(|source| ExecError::OpenOutput {
        path: path.to_path_buf(),
        source,
    })
}
