//! A minimal interactive shell.
//!
//! A line is tokenized ([`lexer`]), split into jobs joined by `&&`/`||` and pipelines
//! joined by `|` ([`parser`]), with `$NAME` references expanded along the way
//! ([`expand`]). Each job runs either as an in-process builtin (`cd`, `pwd`, `echo`,
//! `kill`, `ps`) or as a pipeline of external processes sharing one new process group.
//! While a job runs, its processes are listed in a [`RunningProcesses`] set that the
//! [`signals`] forwarder uses to pass interrupts on to them, and on a terminal the
//! job's group is put in the foreground.
//!
//! The main entry point is [`Repl`], which drives an [`Interpreter`] with lines read
//! from a terminal or a pipe.

mod builtin;
pub mod command;
pub mod env;
pub mod error;
pub mod expand;
mod external;
mod interpreter;
mod job;
pub mod lexer;
pub mod parser;
mod repl;
pub mod signals;
mod terminal;
mod tracker;

pub use env::Environment;
pub use interpreter::Interpreter;
pub use repl::{EditorReader, LineReader, PlainReader, ReadOutcome, Repl};
pub use terminal::Terminal;
pub use tracker::RunningProcesses;
