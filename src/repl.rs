//! The read-eval-print loop.

use crate::interpreter::Interpreter;
use anyhow::Result;
use nix::errno::Errno;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, Read, Write};

/// What a [`LineReader`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A line, without its trailing newline.
    Line(String),
    /// Ctrl+C at the prompt: the partial input is discarded.
    Interrupted,
    /// No more input.
    Eof,
}

/// Source of input lines. Implementations show `prompt` before reading.
pub trait LineReader {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome>;
}

/// Reads lines from a terminal with rustyline. No history is recorded.
pub struct EditorReader {
    editor: DefaultEditor,
}

impl EditorReader {
    pub fn new() -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl LineReader for EditorReader {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(ReadOutcome::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(ReadlineError::Io(err)) => Err(err.into()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Reads lines from a pipe or file, writing the prompt to `prompt_out`.
///
/// Input is read one byte at a time so that nothing past the current line is consumed;
/// commands started by the line inherit stdin and see the rest of it.
pub struct PlainReader<R, W> {
    input: R,
    prompt_out: W,
}

impl<R: Read, W: Write> PlainReader<R, W> {
    pub fn new(input: R, prompt_out: W) -> Self {
        Self { input, prompt_out }
    }
}

impl<R: Read, W: Write> LineReader for PlainReader<R, W> {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        write!(self.prompt_out, "{prompt}")?;
        self.prompt_out.flush()?;

        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.input.read(&mut byte) {
                Ok(0) if line.is_empty() => return Ok(ReadOutcome::Eof),
                Ok(0) => break,
                Ok(_) if byte[0] == b'\n' => break,
                Ok(_) => line.push(byte[0]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(ReadOutcome::Line(String::from_utf8_lossy(&line).into_owned()))
    }
}

/// `<cwd>$ `
pub fn prompt() -> String {
    let cwd = std::env::current_dir().unwrap_or_default();
    format!("{}$ ", cwd.display())
}

/// Consecutive read errors after which the loop gives up.
const MAX_READ_FAILURES: u32 = 5;

/// Whether a read error means no input can ever arrive again.
fn is_fatal(err: &anyhow::Error) -> bool {
    let Some(io_err) = err.downcast_ref::<io::Error>() else {
        return false;
    };
    matches!(
        Errno::from_raw(io_err.raw_os_error().unwrap_or(0)),
        Errno::EIO | Errno::EBADF | Errno::ENXIO | Errno::ENOTTY
    )
}

/// Drives an [`Interpreter`] with lines from a [`LineReader`] until end of input.
pub struct Repl<L> {
    interpreter: Interpreter,
    reader: L,
}

impl<L: LineReader> Repl<L> {
    pub fn new(interpreter: Interpreter, reader: L) -> Self {
        Self {
            interpreter,
            reader,
        }
    }

    /// Runs until the reader reports end of input, then prints a newline.
    ///
    /// Parse and execution errors are reported on stderr and never end the loop. A read
    /// error is reported and reading resumes, unless the input is gone for good (see
    /// [`is_fatal`]) or reads keep failing.
    pub fn run(&mut self) -> Result<()> {
        let mut failures = 0;
        loop {
            match self.reader.read_line(&prompt()) {
                Ok(ReadOutcome::Line(line)) => self.handle_line(&line),
                Ok(ReadOutcome::Interrupted) => {}
                Ok(ReadOutcome::Eof) => {
                    println!();
                    return Ok(());
                }
                Err(e) if is_fatal(&e) || failures + 1 >= MAX_READ_FAILURES => {
                    return Err(e.context("reading input"));
                }
                Err(e) => {
                    failures += 1;
                    eprintln!("read error: {e:#}");
                    continue;
                }
            }
            failures = 0;
        }
    }

    fn handle_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if let Err(e) = self.interpreter.execute_line(line) {
            eprintln!("parse error: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;
    use crate::test_support::lock_current_dir;
    use crate::tracker::RunningProcesses;
    use std::fs;
    use std::io::Cursor;

    fn reader(input: &str) -> PlainReader<Cursor<Vec<u8>>, Vec<u8>> {
        PlainReader::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn plain_reader_splits_lines() {
        let mut r = reader("echo a\r\n\nlast");
        assert_eq!(r.read_line("> ").unwrap(), ReadOutcome::Line("echo a".into()));
        assert_eq!(r.read_line("> ").unwrap(), ReadOutcome::Line(String::new()));
        assert_eq!(r.read_line("> ").unwrap(), ReadOutcome::Line("last".into()));
        assert_eq!(r.read_line("> ").unwrap(), ReadOutcome::Eof);
        assert_eq!(r.prompt_out, b"> > > > ");
    }

    #[test]
    fn plain_reader_leaves_rest_of_input_unread() {
        let mut r = reader("first\nsecond\n");
        r.read_line("").unwrap();
        let mut rest = String::new();
        r.input.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "second\n");
    }

    #[test]
    fn prompt_shows_working_directory() {
        let _lock = lock_current_dir();
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(prompt(), format!("{}$ ", cwd.display()));
    }

    /// Hands out canned results, then reports end of input.
    struct Scripted(std::collections::VecDeque<Result<ReadOutcome>>);

    impl LineReader for Scripted {
        fn read_line(&mut self, _prompt: &str) -> Result<ReadOutcome> {
            self.0.pop_front().unwrap_or(Ok(ReadOutcome::Eof))
        }
    }

    fn repl_over(results: Vec<Result<ReadOutcome>>, env: Environment) -> Repl<Scripted> {
        let interpreter = Interpreter::new(env, RunningProcesses::new());
        Repl::new(interpreter, Scripted(results.into()))
    }

    #[test]
    fn transient_read_errors_are_reported_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = Environment::new();
        env.set_var("T", dir.path().to_string_lossy().to_string());

        let mut repl = repl_over(
            vec![
                Err(io::Error::from(io::ErrorKind::WouldBlock).into()),
                Err(anyhow::anyhow!("garbled input")),
                Ok(ReadOutcome::Line("echo after > $T/out.txt".into())),
            ],
            env,
        );
        repl.run().unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("out.txt")).unwrap(), "after\n");
    }

    #[test]
    fn lost_input_ends_the_loop() {
        let mut repl = repl_over(
            vec![Err(io::Error::from_raw_os_error(Errno::EIO as i32).into())],
            Environment::new(),
        );
        assert!(repl.run().is_err());

        let mut repl = repl_over(
            vec![Err(io::Error::from_raw_os_error(Errno::EBADF as i32).into())],
            Environment::new(),
        );
        assert!(repl.run().is_err());
    }

    #[test]
    fn repeated_read_errors_give_up() {
        let errors = (0..MAX_READ_FAILURES)
            .map(|_| Err(anyhow::anyhow!("flaky")))
            .collect();
        assert!(repl_over(errors, Environment::new()).run().is_err());
    }

    #[test]
    fn repl_survives_errors_and_stops_at_eof() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = Environment::new();
        env.set_var("T", dir.path().to_string_lossy().to_string());
        let interpreter = Interpreter::new(env, RunningProcesses::new());

        let script = "\
echo 'unterminated
cat <
pipesh_no_such_program
echo hi > $T/out.txt

echo bye >> $T/out.txt
";
        let mut repl = Repl::new(interpreter, reader(script));
        repl.run().unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("out.txt")).unwrap(),
            "hi\nbye\n"
        );
    }
}
