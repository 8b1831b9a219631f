//! Phase 1: Lexer
//!
//! The lexer pulls characters from a [`Source`] and emits a flat token
//! stream. Every token carries the indentation of the line it came from,
//! which is the only nesting signal the parser uses.
//!
//! Lexing is driven by an explicit [`LexState`]: a [`Mode`] plus two line
//! flags. The per-character decision lives in the pure function
//! [`LexState::action`]; the scan loop only carries out the chosen action.
//!
//! - Leading spaces count towards the line's indentation.
//! - `:` before any assignment on the line closes a key.
//! - `-` before any assignment on the line is a sequence-item marker.
//! - `|` and `>` open block scalars, `[` opens an inline collection and
//!   `'`/`"` open quoted strings, when they start a value.
//! - `#` starts a comment that runs to the end of the line.

use crate::error::{LexError, Result};
use crate::options::Options;
use crate::scanner::Source;
use std::mem;
use tracing::trace;

/// Token type in the lexer output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A key, emitted when its `:` is seen.
    Identifier,
    /// The `:` after a key.
    Assign,
    /// End of a line that produced tokens. Consecutive newlines collapse.
    NewLine,
    /// An opening or closing quote.
    StringQuote,
    /// `|` (literal) or `>` (folded).
    BlockScalarStart,
    /// `[`
    InlineSeqStart,
    /// `]`
    InlineSeqEnd,
    /// `-` at the start of a block sequence item.
    SeqItemMarker,
    /// Scalar text.
    Value,
}

/// A single token in the token stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub kind: TokenKind,
    /// Leading spaces of the source line, or the column just past a
    /// sequence-item marker and its trailing spaces.
    pub indent: usize,
    /// Zero-based line, for diagnostics.
    pub line: usize,
    /// Zero-based column, for diagnostics.
    pub column: usize,
}

/// What kind of text the lexer is inside of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Keys, plain values and structure.
    Plain,
    /// Inside a quoted string opened with the given quote.
    Quoted(char),
    /// Between `[` and `]`. Tracks an open quote so `]` and `,` inside
    /// quoted entries stay literal. `fresh` holds until the current entry
    /// has a non-blank character; only then may a quote open.
    Inline { quote: Option<char>, fresh: bool },
    /// After a block indicator, before the end of its line.
    BlockHeader { owner: usize },
    /// Inside block scalar content. `indent` is captured from the first
    /// content line; deeper lines keep the surplus as leading spaces.
    Block { owner: usize, indent: Option<usize> },
}

/// The lexer's decision for one character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Indent,
    Push,
    Skip,
    NewLine,
    Assign,
    SeqItem,
    BlockStart,
    OpenQuote,
    CloseQuote,
    EscapedQuote,
    InlineStart,
    InlineQuote,
    InlineEnd,
    Comment,
    EndBlock,
    Unexpected,
}

/// Explicit lexer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexState {
    pub mode: Mode,
    /// A `:` has been seen on the current line.
    pub assign_seen: bool,
    /// Only indentation has been seen on the current line.
    pub at_line_start: bool,
}

impl Default for LexState {
    fn default() -> Self {
        Self {
            mode: Mode::Plain,
            assign_seen: false,
            at_line_start: true,
        }
    }
}

impl LexState {
    /// Decide what to do with `c`.
    ///
    /// `next` is the following character, `indent` the current line's
    /// indentation and `value_start` whether the line buffer holds only
    /// blanks.
    pub fn action(&self, c: char, next: Option<char>, indent: usize, value_start: bool) -> Action {
        if c == '\n' || c == '\r' {
            return Action::NewLine;
        }
        match self.mode {
            Mode::Quoted(quote) if c == quote => {
                if next == Some(quote) {
                    Action::EscapedQuote
                } else {
                    Action::CloseQuote
                }
            }
            Mode::Quoted(_) => Action::Push,
            Mode::Inline { quote: Some(quote), .. } if c == quote => {
                if next == Some(quote) {
                    Action::EscapedQuote
                } else {
                    Action::InlineQuote
                }
            }
            Mode::Inline { quote: None, .. } if c == ']' => Action::InlineEnd,
            Mode::Inline { quote: None, fresh: true } if c == '\'' || c == '"' => {
                Action::InlineQuote
            }
            Mode::Inline { .. } => Action::Push,
            Mode::BlockHeader { .. } => match c {
                ' ' | '\t' => Action::Skip,
                '#' => Action::Comment,
                _ => Action::Unexpected,
            },
            Mode::Block { owner, indent: block } => {
                if !self.at_line_start {
                    Action::Push
                } else if c == ' ' {
                    Action::Indent
                } else {
                    let inside = match block {
                        None => indent > owner,
                        Some(block) => indent >= block,
                    };
                    if inside {
                        Action::Push
                    } else {
                        Action::EndBlock
                    }
                }
            }
            Mode::Plain => match c {
                ' ' if self.at_line_start => Action::Indent,
                ':' if !self.assign_seen => Action::Assign,
                '-' if !self.assign_seen => Action::SeqItem,
                '|' | '>' if value_start && !self.at_line_start => Action::BlockStart,
                '\'' | '"' if value_start => Action::OpenQuote,
                '[' if value_start && !self.at_line_start => Action::InlineStart,
                '#' => Action::Comment,
                _ => Action::Push,
            },
        }
    }
}

/// Tokenize a character source.
pub fn tokenize(source: Source<'_>, options: &Options) -> Result<Vec<Token>> {
    let mut lexer = Lexer::new(source, options);
    while let Some(c) = lexer.next_char()? {
        lexer.dispatch(c)?;
    }
    lexer.finish()?;
    Ok(lexer.tokens)
}

struct Lexer<'a, 'o> {
    source: Source<'a>,
    options: &'o Options,
    tokens: Vec<Token>,
    /// Pending characters of the current run.
    buffer: String,
    buffer_len: usize,
    buffer_blank: bool,
    /// Position of the first pending character.
    start: (usize, usize),
    indent: usize,
    state: LexState,
    /// Position of the character being dispatched.
    at: (usize, usize),
}

impl<'a, 'o> Lexer<'a, 'o> {
    fn new(source: Source<'a>, options: &'o Options) -> Self {
        Self {
            source,
            options,
            tokens: Vec::new(),
            buffer: String::new(),
            buffer_len: 0,
            buffer_blank: true,
            start: (0, 0),
            indent: 0,
            state: LexState::default(),
            at: (0, 0),
        }
    }

    fn next_char(&mut self) -> Result<Option<char>> {
        self.at = self.source.position();
        self.source.read()
    }

    fn dispatch(&mut self, c: char) -> Result<()> {
        let next = self.source.peek()?;
        let action = self.state.action(c, next, self.indent, self.buffer_blank);
        match action {
            Action::Indent => {
                self.indent += 1;
                return Ok(());
            }
            Action::NewLine => return self.newline(c),
            Action::EndBlock => {
                self.state.mode = Mode::Plain;
                return self.dispatch(c);
            }
            Action::Push => {
                self.push(c)?;
                self.track_entry(c);
            }
            Action::Skip => {}
            Action::Assign => self.assign(),
            Action::SeqItem => self.seq_item()?,
            Action::BlockStart => self.block_start(c)?,
            Action::OpenQuote => {
                self.clear();
                self.emit(TokenKind::StringQuote, c.to_string());
                self.state.mode = Mode::Quoted(c);
            }
            Action::CloseQuote => {
                let text = self.take();
                self.emit_value(text);
                self.emit(TokenKind::StringQuote, c.to_string());
                self.state.mode = Mode::Plain;
            }
            Action::EscapedQuote => {
                self.source.read()?;
                self.push(c)?;
                // Entries are unquoted after the closing `]`.
                if let Mode::Inline { .. } = self.state.mode {
                    self.push(c)?;
                }
            }
            Action::InlineStart => {
                self.clear();
                self.emit(TokenKind::InlineSeqStart, "[");
                self.state.mode = Mode::Inline {
                    quote: None,
                    fresh: true,
                };
            }
            Action::InlineQuote => {
                if let Mode::Inline { quote, .. } = self.state.mode {
                    self.state.mode = Mode::Inline {
                        quote: if quote.is_some() { None } else { Some(c) },
                        fresh: false,
                    };
                }
                self.push(c)?;
            }
            Action::InlineEnd => self.inline_end()?,
            Action::Comment => self.comment()?,
            Action::Unexpected => {
                return Err(self.error("Only a comment may follow a block scalar indicator"));
            }
        }
        self.state.at_line_start = false;
        Ok(())
    }

    fn error(&self, message: &str) -> crate::error::Error {
        let (line, column) = self.at;
        LexError::new(message, line, column, self.options.filename.as_deref()).into()
    }

    // ========================================================================
    // Buffer
    // ========================================================================

    fn push(&mut self, c: char) -> Result<()> {
        if self.buffer_len == 0 {
            self.start = self.at;
            if let Mode::Block { owner, indent } = self.state.mode {
                let block = indent.unwrap_or(self.indent);
                self.state.mode = Mode::Block {
                    owner,
                    indent: Some(block),
                };
                for _ in block..self.indent {
                    self.push_char(' ')?;
                }
            }
        }
        self.push_char(c)
    }

    fn push_char(&mut self, c: char) -> Result<()> {
        if self.buffer_len >= self.options.max_line {
            return Err(self.error(&format!(
                "The supported buffer length for one line is {} characters",
                self.options.max_line
            )));
        }
        self.buffer.push(c);
        self.buffer_len += 1;
        if c != ' ' && c != '\t' {
            self.buffer_blank = false;
        }
        Ok(())
    }

    /// Take the pending run, trimmed. Block content keeps its leading
    /// spaces.
    fn take(&mut self) -> String {
        let text = match self.state.mode {
            Mode::Block { .. } => self.buffer.trim_end().to_string(),
            _ => self.buffer.trim().to_string(),
        };
        self.clear();
        text
    }

    /// Inside `[...]`, a comma starts a new entry and anything else but a
    /// blank ends the chance to open a quote.
    fn track_entry(&mut self, c: char) {
        if let Mode::Inline { quote: None, fresh } = self.state.mode {
            let fresh = match c {
                ',' => true,
                ' ' | '\t' => fresh,
                _ => false,
            };
            self.state.mode = Mode::Inline { quote: None, fresh };
        }
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.buffer_len = 0;
        self.buffer_blank = true;
    }

    /// Emit the pending run as a value unless it is blank.
    fn flush(&mut self) {
        if !self.buffer_blank {
            let text = self.take();
            self.emit_value(text);
        } else {
            self.clear();
        }
    }

    // ========================================================================
    // Emission
    // ========================================================================

    fn emit(&mut self, kind: TokenKind, text: impl Into<String>) {
        let (line, column) = self.at;
        self.push_token(kind, text.into(), line, column);
    }

    fn emit_value(&mut self, text: String) {
        let (line, column) = self.start;
        self.push_token(TokenKind::Value, text, line, column);
    }

    fn push_token(&mut self, kind: TokenKind, text: String, line: usize, column: usize) {
        trace!(?kind, %text, indent = self.indent, line, column, "token");
        self.tokens.push(Token {
            text,
            kind,
            indent: self.indent,
            line,
            column,
        });
    }

    fn last_kind(&self) -> Option<TokenKind> {
        self.tokens.last().map(|t| t.kind)
    }

    // ========================================================================
    // Actions
    // ========================================================================

    fn assign(&mut self) {
        let key = self.take();
        let n = self.tokens.len();
        let quoted_key = key.is_empty()
            && n >= 3
            && self.tokens[n - 3].kind == TokenKind::StringQuote
            && self.tokens[n - 2].kind == TokenKind::Value
            && self.tokens[n - 1].kind == TokenKind::StringQuote;
        if quoted_key {
            self.tokens[n - 2].kind = TokenKind::Identifier;
        } else {
            let (line, column) = if key.is_empty() { self.at } else { self.start };
            self.push_token(TokenKind::Identifier, key, line, column);
        }
        self.emit(TokenKind::Assign, ":");
        self.state.assign_seen = true;
    }

    fn seq_item(&mut self) -> Result<()> {
        self.flush();
        let mut consumed = 0;
        while self.source.peek()? == Some(' ') {
            self.source.read()?;
            consumed += 1;
        }
        self.indent += 1 + consumed;
        self.emit(TokenKind::SeqItemMarker, "-");
        Ok(())
    }

    /// Content directly under `- |` is measured from the marker's column,
    /// anywhere else from the line's indentation.
    fn block_start(&mut self, c: char) -> Result<()> {
        self.clear();
        let owner = match self.tokens.last() {
            Some(marker) if marker.kind == TokenKind::SeqItemMarker => marker.column,
            _ => self.indent,
        };
        if matches!(self.source.peek()?, Some('-') | Some('+')) {
            self.source.read()?;
        }
        self.emit(TokenKind::BlockScalarStart, c.to_string());
        self.state.mode = Mode::BlockHeader { owner };
        Ok(())
    }

    fn inline_end(&mut self) -> Result<()> {
        let entries = split_entries(&self.buffer)
            .ok_or_else(|| self.error("A collection entry must be declared with a value or null"))?;
        self.clear();
        for entry in entries {
            self.start = self.at;
            self.emit_value(entry);
        }
        self.emit(TokenKind::InlineSeqEnd, "]");
        self.state.mode = Mode::Plain;
        Ok(())
    }

    fn comment(&mut self) -> Result<()> {
        if self.state.mode == Mode::Plain {
            if self.state.assign_seen
                && self.buffer_blank
                && self.last_kind() == Some(TokenKind::Assign)
            {
                self.start = self.at;
                self.emit_value("~".to_string());
            } else {
                self.flush();
            }
        }
        self.source.read_line()?;
        Ok(())
    }

    fn newline(&mut self, c: char) -> Result<()> {
        if c == '\r' && self.source.peek()? == Some('\n') {
            self.source.read()?;
        }
        self.state.mode = match self.state.mode {
            Mode::Quoted(_) => {
                return Err(self.error("The inline string value must have a closing quote"));
            }
            Mode::Inline { .. } => Mode::Plain,
            Mode::BlockHeader { owner } => Mode::Block {
                owner,
                indent: None,
            },
            mode => mode,
        };
        self.flush();
        if !matches!(self.last_kind(), None | Some(TokenKind::NewLine)) {
            self.emit(TokenKind::NewLine, "\n");
        }
        self.indent = 0;
        self.state.assign_seen = false;
        self.state.at_line_start = true;
        self.options.check_cancelled()
    }

    fn finish(&mut self) -> Result<()> {
        if let Mode::Quoted(_) = self.state.mode {
            self.at = self.source.position();
            return Err(self.error("The inline string value must have an enclosing quote"));
        }
        self.flush();
        Ok(())
    }
}

/// Split the body of an inline collection into entries.
///
/// A quote opens only as the first non-blank character of an entry, and
/// commas inside it are literal. Each entry is trimmed and loses one
/// matching pair of surrounding quotes. Returns `None` when an entry is
/// empty; an all-blank body has no entries.
fn split_entries(body: &str) -> Option<Vec<String>> {
    if body.trim().is_empty() {
        return Some(Vec::new());
    }
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut quote = None;
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => {
                current.push(c);
                if chars.peek() == Some(&q) {
                    chars.next();
                    current.push(q);
                } else {
                    quote = None;
                }
            }
            Some(_) => current.push(c),
            None if (c == '\'' || c == '"') && current.trim().is_empty() => {
                quote = Some(c);
                current.push(c);
            }
            None if c == ',' => entries.push(mem::take(&mut current)),
            None => current.push(c),
        }
    }
    entries.push(current);
    entries.iter().map(|entry| unquote(entry.trim())).collect()
}

fn unquote(entry: &str) -> Option<String> {
    if entry.is_empty() {
        return None;
    }
    for q in ['\'', '"'] {
        if entry.len() >= 2 && entry.starts_with(q) && entry.ends_with(q) {
            let inner = &entry[1..entry.len() - 1];
            let doubled: String = [q, q].iter().collect();
            return Some(inner.replace(&doubled, &q.to_string()));
        }
    }
    Some(entry.to_string())
}
