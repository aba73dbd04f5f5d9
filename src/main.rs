use anyhow::Context;
use pipesh::{
    EditorReader, Environment, Interpreter, PlainReader, Repl, RunningProcesses, Terminal, signals,
};
use std::fs::File;
use std::io::{self, IsTerminal};
use std::os::fd::AsFd;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

fn main() -> anyhow::Result<()> {
    // Must happen before any other thread exists so that every thread inherits the mask.
    signals::block_interrupt().context("blocking SIGINT")?;
    init_logging();

    let running = RunningProcesses::new();
    signals::spawn_forwarder(running.clone()).context("starting the SIGINT forwarder")?;
    let interpreter = Interpreter::new(Environment::new(), running);

    let stdin = io::stdin();
    if stdin.is_terminal() {
        let terminal = Terminal::new(stdin.as_fd().try_clone_to_owned()?)
            .context("taking control of the terminal")?;
        Repl::new(interpreter.with_terminal(terminal), EditorReader::new()?).run()
    } else {
        // An unbuffered handle on fd 0; std's Stdin would read ahead.
        let raw = File::from(stdin.as_fd().try_clone_to_owned()?);
        Repl::new(interpreter, PlainReader::new(raw, io::stdout())).run()
    }
}

/// Logs go to stderr, filtered by `PIPESH_LOG`.
fn init_logging() {
    let filter = log_filter(std::env::var("PIPESH_LOG").ok().as_deref());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_target(false)
        .init();
}

/// A bare level (`PIPESH_LOG=debug`) applies to the shell's own events only; anything
/// else is taken as `EnvFilter` directives (e.g. `debug,rustyline=trace`).
fn log_filter(value: Option<&str>) -> EnvFilter {
    match value.map(str::trim) {
        None | Some("") => EnvFilter::new("warn"),
        Some(level) if level.parse::<LevelFilter>().is_ok() => {
            EnvFilter::new(format!("warn,pipesh={level}"))
        }
        Some(directives) => EnvFilter::new(directives),
    }
}
