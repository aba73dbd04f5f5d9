//! Turns an input line into jobs, pipelines and commands.

use crate::env::Environment;
use crate::error::ParseError;
use crate::expand::expand_word;
use crate::lexer::{self, Token};
use std::path::PathBuf;

/// One stage of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Program or builtin name followed by its arguments. Never empty.
    pub args: Vec<String>,
    /// File to read stdin from (`< file`).
    pub input: Option<PathBuf>,
    /// File to write stdout to (`> file` or `>> file`).
    pub output: Option<PathBuf>,
    /// Whether `output` is opened for appending rather than truncated.
    pub append: bool,
}

impl Command {
    /// The program or builtin name, `args[0]`.
    pub fn name(&self) -> &str {
        &self.args[0]
    }
}

/// How a job relates to the exit status of the job before it on the same line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connector {
    /// Always runs. Used for the first job of a line.
    #[default]
    None,
    /// `&&`: runs only if the previous job succeeded.
    And,
    /// `||`: runs only if the previous job failed.
    Or,
}

impl Connector {
    /// Whether a job with this connector runs after a job that exited with `last_status`.
    pub fn should_run(self, last_status: i32) -> bool {
        match self {
            Connector::None => true,
            Connector::And => last_status == 0,
            Connector::Or => last_status != 0,
        }
    }
}

/// A pipeline of commands plus the connector to the previous job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub commands: Vec<Command>,
    pub connector: Connector,
}

/// Every job of one input line, in order. The first job's connector is always
/// [`Connector::None`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedLine {
    pub jobs: Vec<Job>,
}

struct CommandBuilder<'a> {
    tokens: &'a [Token],
    pos: usize,
    env: &'a Environment,
}

impl<'a> CommandBuilder<'a> {
    fn new(tokens: &'a [Token], env: &'a Environment) -> Self {
        Self {
            tokens,
            pos: 0,
            env,
        }
    }

    fn consume(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Parse a command: (word | redirect word)*
    fn build(mut self) -> Result<Command, ParseError> {
        let mut args = Vec::new();
        let mut input = None;
        let mut output = None;
        let mut append = false;

        while let Some(token) = self.consume() {
            match token {
                Token::Word(parts) => args.push(expand_word(parts, self.env)),
                Token::RedirectIn => input = Some(self.parse_target()?),
                Token::RedirectOut | Token::RedirectAppend => {
                    output = Some(self.parse_target()?);
                    append = matches!(token, Token::RedirectAppend);
                }
                Token::Pipe => return Err(ParseError::UnexpectedOperator("|")),
                Token::And => return Err(ParseError::UnexpectedOperator("&&")),
                Token::Or => return Err(ParseError::UnexpectedOperator("||")),
            }
        }

        if args.is_empty() {
            return Err(ParseError::EmptyCommand);
        }

        Ok(Command {
            args,
            input,
            output,
            append,
        })
    }

    fn parse_target(&mut self) -> Result<PathBuf, ParseError> {
        match self.consume() {
            Some(Token::Word(parts)) => Ok(PathBuf::from(expand_word(parts, self.env))),
            _ => Err(ParseError::MissingRedirectTarget),
        }
    }
}

/// Parses the tokens of one `&&`/`||`-free segment into the commands of a pipeline.
///
/// Every `|`-separated stage must contain at least one argument word, so a leading,
/// trailing or doubled `|` fails with [`ParseError::EmptyCommand`]. `&&` and `||` are
/// [`ParseError::UnexpectedOperator`]; [`parse_line`] splits on them first.
pub fn parse_pipeline(tokens: &[Token], env: &Environment) -> Result<Vec<Command>, ParseError> {
    tokens
        .split(|t| *t == Token::Pipe)
        .map(|stage| CommandBuilder::new(stage, env).build())
        .collect()
}

/// Parses a full input line.
///
/// The line is tokenized, then split on top-level `&&` and `||`. Empty segments left by a
/// leading, trailing or doubled logical operator are dropped. Any error aborts the whole
/// line, so a bad segment late in the line prevents the earlier ones from running too.
pub fn parse_line(line: &str, env: &Environment) -> Result<ParsedLine, ParseError> {
    let tokens = lexer::split_into_tokens(line)?;

    let mut jobs = Vec::new();
    let mut connector = Connector::None;
    let mut start = 0;
    for i in 0..=tokens.len() {
        let next = match tokens.get(i) {
            Some(Token::And) => Connector::And,
            Some(Token::Or) => Connector::Or,
            Some(_) => continue,
            None => Connector::None,
        };
        let segment = &tokens[start..i];
        if !segment.is_empty() {
            jobs.push(Job {
                commands: parse_pipeline(segment, env)?,
                connector,
            });
        }
        connector = next;
        start = i + 1;
    }

    if let Some(first) = jobs.first_mut() {
        first.connector = Connector::None;
    }

    Ok(ParsedLine { jobs })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Environment {
        let mut env = Environment::default();
        env.set_var("NAME", "world");
        env.set_var("DIR", "/tmp/x");
        env
    }

    fn cmd(args: &[&str]) -> Command {
        Command {
            args: args.iter().map(|s| s.to_string()).collect(),
            input: None,
            output: None,
            append: false,
        }
    }

    fn parse(line: &str) -> ParsedLine {
        parse_line(line, &env()).unwrap()
    }

    #[test]
    fn simple_line_is_one_job_with_one_command() {
        let parsed = parse("echo  'a  b' \"$NAME c\" ${NAME}!");
        assert_eq!(
            parsed,
            ParsedLine {
                jobs: vec![Job {
                    commands: vec![cmd(&["echo", "a  b", "world c", "world!"])],
                    connector: Connector::None,
                }]
            }
        );
    }

    #[test]
    fn single_quotes_block_expansion() {
        let parsed = parse("echo '$NAME'");
        assert_eq!(parsed.jobs[0].commands[0].args, vec!["echo", "$NAME"]);
    }

    #[test]
    fn unset_variable_keeps_an_empty_argument() {
        let parsed = parse("echo hello $PIPESH_MISSING_VAR_42");
        assert_eq!(parsed.jobs[0].commands[0].args, vec!["echo", "hello", ""]);
    }

    #[test]
    fn pipeline_with_redirects() {
        let parsed = parse("sort < in.txt | uniq -c >> $DIR/out.txt");
        let commands = &parsed.jobs[0].commands;
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].args, vec!["sort"]);
        assert_eq!(commands[0].input, Some(PathBuf::from("in.txt")));
        assert_eq!(commands[0].output, None);
        assert_eq!(commands[1].args, vec!["uniq", "-c"]);
        assert_eq!(commands[1].output, Some(PathBuf::from("/tmp/x/out.txt")));
        assert!(commands[1].append);
    }

    #[test]
    fn later_output_redirect_wins() {
        let parsed = parse("echo hi >> a > b");
        let command = &parsed.jobs[0].commands[0];
        assert_eq!(command.output, Some(PathBuf::from("b")));
        assert!(!command.append);
        assert_eq!(command.args, vec!["echo", "hi"]);
    }

    #[test]
    fn redirect_may_precede_the_program() {
        let parsed = parse("< in.txt cat");
        let command = &parsed.jobs[0].commands[0];
        assert_eq!(command.args, vec!["cat"]);
        assert_eq!(command.input, Some(PathBuf::from("in.txt")));
    }

    #[test]
    fn connectors_between_jobs() {
        let parsed = parse("a && b | c || d");
        let connectors: Vec<_> = parsed.jobs.iter().map(|j| j.connector).collect();
        assert_eq!(
            connectors,
            vec![Connector::None, Connector::And, Connector::Or]
        );
        assert_eq!(parsed.jobs[1].commands.len(), 2);
    }

    #[test]
    fn leading_operator_is_ignored() {
        let parsed = parse("|| echo hi");
        assert_eq!(parsed.jobs.len(), 1);
        assert_eq!(parsed.jobs[0].connector, Connector::None);
    }

    #[test]
    fn trailing_and_doubled_operators_drop_empty_segments() {
        assert_eq!(parse("true &&").jobs.len(), 1);
        let parsed = parse("a && || b");
        assert_eq!(parsed.jobs.len(), 2);
        assert_eq!(parsed.jobs[1].connector, Connector::Or);
    }

    #[test]
    fn operators_in_quotes_do_not_split() {
        let parsed = parse("echo 'a && b' \"c | d\"");
        assert_eq!(parsed.jobs.len(), 1);
        assert_eq!(parsed.jobs[0].commands[0].args, vec!["echo", "a && b", "c | d"]);
    }

    #[test]
    fn empty_line_has_no_jobs() {
        assert_eq!(parse("   "), ParsedLine::default());
    }

    #[test]
    fn missing_redirect_target() {
        for line in ["cat <", "echo hi >", "echo hi >>", "echo > | wc"] {
            assert_eq!(
                parse_line(line, &env()),
                Err(ParseError::MissingRedirectTarget),
                "{line}"
            );
        }
    }

    #[test]
    fn empty_pipeline_stages() {
        for line in ["| wc", "ls |", "ls || wc |", "ls | | wc", "> out"] {
            assert_eq!(
                parse_line(line, &env()),
                Err(ParseError::EmptyCommand),
                "{line}"
            );
        }
    }

    #[test]
    fn later_error_aborts_whole_line() {
        assert_eq!(
            parse_line("echo ok && cat <", &env()),
            Err(ParseError::MissingRedirectTarget)
        );
    }

    #[test]
    fn syntax_errors_propagate() {
        assert!(matches!(
            parse_line("echo 'x && y", &env()),
            Err(ParseError::Syntax(_))
        ));
    }

    #[test]
    fn logical_operators_are_rejected_inside_a_pipeline() {
        let tokens = lexer::split_into_tokens("true && false | cat").unwrap();
        assert_eq!(
            parse_pipeline(&tokens, &env()),
            Err(ParseError::UnexpectedOperator("&&"))
        );
        let tokens = lexer::split_into_tokens("a || b").unwrap();
        assert_eq!(
            parse_pipeline(&tokens, &env()),
            Err(ParseError::UnexpectedOperator("||"))
        );
    }

    #[test]
    fn parsing_is_repeatable() {
        let line = "cat < in | sort -r > out && echo $NAME || echo '$NAME'";
        assert_eq!(parse(line), parse(line));
    }

    #[test]
    fn should_run_follows_last_status() {
        assert!(Connector::None.should_run(1));
        assert!(Connector::And.should_run(0));
        assert!(!Connector::And.should_run(2));
        assert!(Connector::Or.should_run(127));
        assert!(!Connector::Or.should_run(0));
    }
}
