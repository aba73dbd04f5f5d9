//! Error types shared by the parsing and execution stages.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Malformed quoting in an input line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    /// A `'` or `"` was opened and never closed.
    #[error("unterminated {quote} quote")]
    UnterminatedQuote {
        /// `"single"` or `"double"`.
        quote: &'static str,
    },
}

/// Errors that make a whole input line unusable. Nothing on the line runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    /// `<`, `>` or `>>` without a word after it.
    #[error("missing redirect target")]
    MissingRedirectTarget,

    /// A pipeline stage without a program name, e.g. `| wc` or `> out`.
    #[error("empty command")]
    EmptyCommand,

    /// An operator inside a single pipeline stage, e.g. `&&` handed to the pipeline parser.
    #[error("unexpected `{0}`")]
    UnexpectedOperator(&'static str),
}

/// Errors raised while setting up or running a single job.
///
/// Every variant aborts only the job it happened in; the job reports status 1.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("open input {}: {source}", .path.display())]
    OpenInput { path: PathBuf, source: io::Error },

    #[error("open output {}: {source}", .path.display())]
    OpenOutput { path: PathBuf, source: io::Error },

    #[error("pipe: {0}")]
    Pipe(#[source] io::Error),

    #[error("{name}: command not found")]
    NotFound { name: String },

    #[error("start {name}: {source}")]
    Spawn { name: String, source: io::Error },

    #[error("wait {name}: {source}")]
    Wait { name: String, source: io::Error },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_messages() {
        assert_eq!(
            ParseError::MissingRedirectTarget.to_string(),
            "missing redirect target"
        );
        assert_eq!(ParseError::EmptyCommand.to_string(), "empty command");
        let err: ParseError = SyntaxError::UnterminatedQuote { quote: "double" }.into();
        assert_eq!(err.to_string(), "syntax error: unterminated double quote");
    }

    #[test]
    fn exec_error_names_the_file() {
        let err = ExecError::OpenInput {
            path: PathBuf::from("missing.txt"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert!(err.to_string().starts_with("open input missing.txt:"));
    }
}
