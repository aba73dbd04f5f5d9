use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use anyhow::{Context, Result, anyhow};
use argh::{EarlyExit, FromArgs};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::env;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::PathBuf;
use std::process::Stdio;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Executes the command, writing its regular output to `stdout`.
    ///
    /// An `Err` is printed to stderr by the caller and becomes exit code 1.
    fn execute(self, stdout: &mut dyn Write, env: &Environment) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, env: &Environment) -> ExitCode {
        match <T as BuiltinCommand>::execute(*self, stdout, env) {
            Ok(code) => code,
            Err(e) => {
                eprintln!("{e:#}");
                1
            }
        }
    }
}

/// Output of argh when the arguments don't parse, or when `--help` was asked for.
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, _env: &Environment) -> ExitCode {
        if self.is_error {
            eprintln!("{}", self.output.trim_end());
            return 1;
        }
        match writeln!(stdout, "{}", self.output.trim_end()) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("{e}");
                1
            }
        }
    }
}

/// Creates instances of a single builtin type.
pub(crate) struct Factory<T> {
    _phantom: PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn name(&self) -> &'static str {
        T::name()
    }

    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            Some(match T::from_args(&[name], args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

/// The set of commands the shell runs in-process.
pub struct Builtins {
    factories: Vec<Box<dyn CommandFactory>>,
}

impl Builtins {
    /// Builds the builtin named by `args[0]`, or `None` if there is no such builtin.
    pub fn create(&self, args: &[String]) -> Option<Box<dyn ExecutableCommand>> {
        let (name, rest) = args.split_first()?;
        let rest: Vec<&str> = rest.iter().map(String::as_str).collect();
        self.factories
            .iter()
            .find(|f| f.name() == name.as_str())
            .and_then(|f| f.try_create(name, &rest))
    }
}

impl Default for Builtins {
    /// `cd`, `pwd`, `echo`, `kill` and `ps`.
    fn default() -> Self {
        Self {
            factories: vec![
                Box::new(Factory::<Cd>::default()),
                Box::new(Factory::<Pwd>::default()),
                Box::new(Factory::<Echo>::default()),
                Box::new(Factory::<Kill>::default()),
                Box::new(Factory::<Ps>::default()),
            ],
        }
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(self, stdout: &mut dyn Write, _env: &Environment) -> Result<ExitCode> {
        let cwd = env::current_dir().context("pwd")?;
        writeln!(stdout, "{}", cwd.display())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to $HOME, or to / when HOME is unset.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &Environment) -> Result<ExitCode> {
        let target = match self.target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => env
                .get_var("HOME")
                .filter(|home| !home.is_empty())
                .map_or_else(|| PathBuf::from("/"), PathBuf::from),
        };

        env::set_current_dir(&target).with_context(|| format!("cd: {}", target.display()))?;
        tracing::debug!(dir = %target.display(), "changed directory");
        Ok(0)
    }
}

/// Write the arguments to standard output, separated by spaces, followed by a newline.
///
/// Arguments are taken verbatim: `echo -n x` prints `-n x`.
pub struct Echo {
    pub args: Vec<String>,
}

impl FromArgs for Echo {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        Ok(Echo {
            args: args.iter().map(|s| s.to_string()).collect(),
        })
    }
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(self, stdout: &mut dyn Write, _env: &Environment) -> Result<ExitCode> {
        writeln!(stdout, "{}", self.args.join(" "))?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Send SIGTERM to a process.
pub struct Kill {
    #[argh(positional)]
    /// numeric id of the process to terminate.
    pub pid: String,
}

impl BuiltinCommand for Kill {
    fn name() -> &'static str {
        "kill"
    }

    fn execute(self, _stdout: &mut dyn Write, _env: &Environment) -> Result<ExitCode> {
        let pid = self
            .pid
            .parse::<i32>()
            .ok()
            .filter(|pid| *pid > 0)
            .ok_or_else(|| anyhow!("kill: bad pid: {}", self.pid))?;
        signal::kill(Pid::from_raw(pid), Signal::SIGTERM).with_context(|| format!("kill: {pid}"))?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List processes using the system `ps aux`.
pub struct Ps {}

impl BuiltinCommand for Ps {
    fn name() -> &'static str {
        "ps"
    }

    fn execute(self, stdout: &mut dyn Write, _env: &Environment) -> Result<ExitCode> {
        let mut child = std::process::Command::new("ps")
            .arg("aux")
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .context("ps")?;
        if let Some(mut out) = child.stdout.take() {
            io::copy(&mut out, stdout).context("ps")?;
        }
        let status = child.wait().context("ps")?;
        Ok(status.code().unwrap_or(1))
    }
}
