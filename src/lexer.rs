//! Lexical analysis (tokenization) of a single input line.

use crate::error::SyntaxError;

/// A piece of a word. Quoting decides whether the piece is expanded later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordPart {
    /// Single-quoted text, taken as-is.
    Literal(String),
    /// Unquoted or double-quoted text, subject to `$NAME` expansion.
    Expandable(String),
}

/// Represents a token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A word, possibly glued together from differently quoted parts.
    Word(Vec<WordPart>),
    /// The pipe operator, `|`.
    Pipe,
    /// `&&`
    And,
    /// `||`
    Or,
    /// Input redirection symbol, `<`.
    RedirectIn,
    /// Output redirection symbol, `>`.
    RedirectOut,
    /// Appending output redirection, `>>`.
    RedirectAppend,
}

#[cfg(test)]
impl Token {
    /// A word made of one unquoted part.
    pub(crate) fn word(text: &str) -> Self {
        Token::Word(vec![WordPart::Expandable(text.to_string())])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Normal,
    InSingleQuote,
    InDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    current_word: Vec<WordPart>,
    buffer: String,
    // true once the current word has started, even if it is an empty quoted string
    in_word: bool,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Normal,
            current_word: Vec::new(),
            buffer: String::new(),
            in_word: false,
        }
    }

    /// Runs the machine over the whole input.
    ///
    /// Fails if the line ends while a quote is still open.
    fn make_tokens(mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Normal => self.handle_normal(ch, &mut out),
                LexingState::InSingleQuote => self.handle_single_quote(ch),
                LexingState::InDoubleQuote => self.handle_double_quote(ch),
            }
        }

        match self.state {
            LexingState::InSingleQuote => {
                return Err(SyntaxError::UnterminatedQuote { quote: "single" });
            }
            LexingState::InDoubleQuote => {
                return Err(SyntaxError::UnterminatedQuote { quote: "double" });
            }
            LexingState::Normal => {}
        }

        self.finish_word(&mut out);
        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    /// Consumes the next char if it equals `expected`.
    fn next_is(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn handle_normal(&mut self, ch: char, out: &mut Vec<Token>) {
        match ch {
            ' ' | '\t' | '\n' | '\r' => self.finish_word(out),
            '|' => {
                self.finish_word(out);
                out.push(if self.next_is('|') { Token::Or } else { Token::Pipe });
            }
            '&' if self.peek_char() == Some('&') => {
                self.read_char();
                self.finish_word(out);
                out.push(Token::And);
            }
            '<' => {
                self.finish_word(out);
                out.push(Token::RedirectIn);
            }
            '>' => {
                self.finish_word(out);
                out.push(if self.next_is('>') {
                    Token::RedirectAppend
                } else {
                    Token::RedirectOut
                });
            }
            '\'' => {
                self.flush_expandable();
                self.in_word = true;
                self.state = LexingState::InSingleQuote;
            }
            '"' => {
                self.flush_expandable();
                self.in_word = true;
                self.state = LexingState::InDoubleQuote;
            }
            c => {
                self.buffer.push(c);
                self.in_word = true;
            }
        }
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => {
                if !self.buffer.is_empty() {
                    self.current_word
                        .push(WordPart::Literal(std::mem::take(&mut self.buffer)));
                }
                self.state = LexingState::Normal;
            }
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) {
        match ch {
            '"' => {
                self.flush_expandable();
                self.state = LexingState::Normal;
            }
            c => self.buffer.push(c),
        }
    }

    // Quote boundaries split parts, so `$A"B"` looks up A rather than AB.
    fn flush_expandable(&mut self) {
        if !self.buffer.is_empty() {
            self.current_word
                .push(WordPart::Expandable(std::mem::take(&mut self.buffer)));
        }
    }

    fn finish_word(&mut self, out: &mut Vec<Token>) {
        self.flush_expandable();
        if self.in_word {
            out.push(Token::Word(std::mem::take(&mut self.current_word)));
            self.in_word = false;
        }
    }
}

/// Splits `line` into words and operator tokens.
///
/// Whitespace outside quotes separates words. `<`, `>`, `>>`, `|`, `&&` and `||` are
/// recognized outside quotes even without surrounding whitespace. Quotes are removed;
/// single-quoted parts are marked [`WordPart::Literal`] so expansion skips them.
/// Backslashes carry no special meaning.
pub fn split_into_tokens(line: &str) -> Result<Vec<Token>, SyntaxError> {
    LexingFSM::new(line).make_tokens()
}
