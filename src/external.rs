use crate::command::{ExitCode, Stdin, Stdout};
use crate::env::Environment;
use crate::error::ExecError;
use nix::sys::signal::{self, SigHandler, SigSet, Signal};
use nix::unistd::{self, Pid};
use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::io;
use std::os::fd::{BorrowedFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus, Stdio};

/// A program resolved on disk, ready to be started as one stage of a pipeline.
#[derive(Debug)]
pub struct ExternalCommand {
    name: String,
    program: PathBuf,
    args: Vec<OsString>,
}

impl ExternalCommand {
    /// Looks up `args[0]` the way [`find_command_path`] does, using `PATH` from `env`.
    pub fn resolve(args: &[String], env: &Environment) -> Result<Self, ExecError> {
        let Some((name, rest)) = args.split_first() else {
            return Err(ExecError::NotFound {
                name: String::new(),
            });
        };
        let search_paths = env.get_var("PATH").unwrap_or_default();
        let program = find_command_path(OsStr::new(&search_paths), Path::new(name))
            .ok_or_else(|| ExecError::NotFound { name: name.clone() })?
            .into_owned();
        Ok(Self {
            name: name.clone(),
            program,
            args: rest.iter().map(OsString::from).collect(),
        })
    }

    /// Starts the program in the process group given by `placement`.
    ///
    /// Stderr is inherited from the shell. The `Stdio` handles are moved into the
    /// `std::process::Command`, which is dropped before returning, so the shell keeps
    /// no copy of the descriptors handed to the child.
    pub fn spawn(
        self,
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
        env: &Environment,
        placement: Placement,
    ) -> Result<Child, ExecError> {
        let mut command = std::process::Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(stdin.stdio())
            .stdout(stdout.stdio())
            .stderr(Stdio::inherit())
            .envs(env.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .process_group(placement.group.map_or(0, Pid::as_raw));

        let terminal = placement.terminal.filter(|_| placement.group.is_none());
        // SAFETY: the hook runs between fork and exec and only makes async-signal-safe
        // calls (setpgid, tcsetpgrp, sigaction, pthread_sigmask).
        unsafe {
            command.pre_exec(move || prepare_child(terminal));
        }

        command.spawn().map_err(|source| ExecError::Spawn {
            name: self.name,
            source,
        })
    }
}

/// Where a pipeline stage is started.
#[derive(Debug, Clone, Copy, Default)]
pub struct Placement {
    /// Process group to join. `None` makes the stage the leader of a new group.
    pub group: Option<Pid>,
    /// Terminal whose foreground group the new group becomes. Ignored unless the
    /// stage leads its group.
    pub terminal: Option<RawFd>,
}

/// Undoes in the child what the shell set up for itself.
///
/// The shell blocks SIGINT and ignores SIGTTOU; both the mask and an ignored
/// disposition survive `exec`. A group leader also takes the terminal here so that it
/// can't read from it before the shell hands it over.
fn prepare_child(terminal: Option<RawFd>) -> io::Result<()> {
    if let Some(fd) = terminal {
        // SAFETY: the descriptor is owned by the shell's `Terminal`, which outlives
        // every job; the child only borrows it until exec.
        let fd = unsafe { BorrowedFd::borrow_raw(fd) };
        // Failures are left to the shell, which repeats the handover after spawning.
        let _ = unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0));
        let _ = unistd::tcsetpgrp(fd, unistd::getpid());
    }
    // SAFETY: restoring the default disposition installs no handler.
    unsafe { signal::signal(Signal::SIGTTOU, SigHandler::SigDfl) }?;
    let mut unblock = SigSet::empty();
    unblock.add(Signal::SIGINT);
    unblock.thread_unblock()?;
    Ok(())
}

/// Shell-style exit code of a finished process: its exit status, or `128 + signal`
/// when it was killed by a signal.
pub fn exit_code(exit_status: ExitStatus) -> ExitCode {
    match exit_status.code() {
        Some(x) => x,
        None => terminated_by_signal(exit_status),
    }
}

fn terminated_by_signal(exit_status: ExitStatus) -> ExitCode {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        1
    }
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it is an existing file.
/// - `./foo`, or a relative path with multiple components (e.g., `bin/sh`): resolved
///   against the current directory.
/// - Single path component (no separators): search each directory in `search_paths` (PATH)
///   and return the first existing file.
/// - Empty path: returns `None`.
///
/// Returns either a borrowed reference to the provided `path` or an owned `PathBuf`
/// when the result is discovered via PATH lookup.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    if path.is_absolute() || path.starts_with("./") {
        return find_by_path(path).map(Cow::Borrowed);
    }

    let mut components = path.components();
    match (components.next(), components.next()) {
        (None, _) => None,
        (Some(x), None) => find_in_path(search_paths, x.as_os_str()).map(Cow::Owned),
        _ => find_by_path(path).map(Cow::Borrowed),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .map(|dir| dir.join(cmd))
        .find(|path| find_by_path(path).is_some())
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if path.is_file() { Some(path) } else { None }
}
