use crate::env::Environment;
use std::io::Write;
use std::process::Stdio;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// Where a pipeline stage reads from: an input file, the read end of a pipe, or the
/// shell's own stdin.
///
/// Stages never read through this in the shell process; it only hands a descriptor
/// over to the child. Implemented for anything convertible into [`Stdio`] (e.g. `File`
/// or `PipeReader`).
pub trait Stdin {
    /// Convert this input into a [`Stdio`] handle suitable for `std::process::Command`.
    fn stdio(self: Box<Self>) -> Stdio;
}

impl<T: Into<Stdio>> Stdin for T {
    fn stdio(self: Box<Self>) -> Stdio {
        (*self).into()
    }
}

/// Where a pipeline stage writes to.
///
/// Like [`Stdin`], only converted into a [`Stdio`] for the child. Implemented for
/// writable handles (e.g. `File`, `PipeWriter` or `io::Stdout`).
pub trait Stdout {
    /// Convert this output into a [`Stdio`] handle suitable for `std::process::Command`.
    fn stdio(self: Box<Self>) -> Stdio;
}

impl<T: Write + Into<Stdio>> Stdout for T {
    fn stdio(self: Box<Self>) -> Stdio {
        (*self).into()
    }
}

/// A command that runs inside the shell process.
pub trait ExecutableCommand {
    /// Runs the command, reporting failures on stderr and as a non-zero exit code.
    fn execute(self: Box<Self>, stdout: &mut dyn Write, env: &Environment) -> ExitCode;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`.
pub trait CommandFactory {
    /// Name this factory answers to.
    fn name(&self) -> &'static str;

    /// Attempt to create a command instance for the provided name and arguments.
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>>;
}

/// The shell's own stdin, handed to a child as an inherited descriptor.
pub struct InheritedStdin;

impl From<InheritedStdin> for Stdio {
    fn from(_: InheritedStdin) -> Stdio {
        Stdio::inherit()
    }
}
