//! Character source
//!
//! The lexer pulls characters one at a time from a [`Source`]. A source is
//! either a borrowed string or a buffered stream; both expose the same four
//! operations (`read`, `peek`, `read_line`, `at_end`) and track the zero-based
//! line and column of the next character.

use crate::error::Result;
use std::io::BufRead;

/// A sequential character source over a string or a stream.
pub struct Source<'a> {
    input: Input<'a>,
    line: usize,
    column: usize,
}

enum Input<'a> {
    Text {
        text: &'a str,
        pos: usize,
    },
    Stream {
        reader: Box<dyn BufRead + 'a>,
        /// The current physical line, terminator included.
        buf: String,
        pos: usize,
        eof: bool,
    },
}

impl<'a> Source<'a> {
    /// A source over an in-memory string.
    pub fn from_text(text: &'a str) -> Self {
        Self {
            input: Input::Text { text, pos: 0 },
            line: 0,
            column: 0,
        }
    }

    /// A source over a buffered stream, refilled one line at a time.
    pub fn from_reader<R: BufRead + 'a>(reader: R) -> Self {
        Self {
            input: Input::Stream {
                reader: Box::new(reader),
                buf: String::new(),
                pos: 0,
                eof: false,
            },
            line: 0,
            column: 0,
        }
    }

    /// Zero-based (line, column) of the next character.
    pub fn position(&self) -> (usize, usize) {
        (self.line, self.column)
    }

    /// Look at the next character without consuming it.
    pub fn peek(&mut self) -> Result<Option<char>> {
        self.fill()?;
        Ok(match &self.input {
            Input::Text { text, pos } => text[*pos..].chars().next(),
            Input::Stream { buf, pos, .. } => buf[*pos..].chars().next(),
        })
    }

    /// Consume and return the next character.
    pub fn read(&mut self) -> Result<Option<char>> {
        let c = self.peek()?;
        if let Some(c) = c {
            match &mut self.input {
                Input::Text { pos, .. } | Input::Stream { pos, .. } => *pos += c.len_utf8(),
            }
            self.advance(c);
        }
        Ok(c)
    }

    /// Consume the rest of the current physical line and return it.
    ///
    /// The line terminator is left in place so the caller still sees it.
    pub fn read_line(&mut self) -> Result<String> {
        let mut rest = String::new();
        while let Some(c) = self.peek()? {
            if c == '\n' || c == '\r' {
                break;
            }
            self.read()?;
            rest.push(c);
        }
        Ok(rest)
    }

    /// True when no characters remain.
    pub fn at_end(&mut self) -> Result<bool> {
        Ok(self.peek()?.is_none())
    }

    fn advance(&mut self, c: char) {
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
    }

    /// Refill the stream buffer once the current line is exhausted.
    fn fill(&mut self) -> Result<()> {
        if let Input::Stream {
            reader,
            buf,
            pos,
            eof,
        } = &mut self.input
        {
            if *pos >= buf.len() && !*eof {
                buf.clear();
                *pos = 0;
                if reader.read_line(buf)? == 0 {
                    *eof = true;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn drain(source: &mut Source) -> String {
        let mut out = String::new();
        while let Some(c) = source.read().unwrap() {
            out.push(c);
        }
        out
    }

    #[test]
    fn test_text_and_stream_agree() {
        let text = "a: 1\nb: é\r\nc";
        let mut from_text = Source::from_text(text);
        let mut from_reader = Source::from_reader(Cursor::new(text.as_bytes()));
        assert_eq!(drain(&mut from_text), text);
        assert_eq!(drain(&mut from_reader), text);
        assert_eq!(from_text.position(), from_reader.position());
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut source = Source::from_text("xy");
        assert_eq!(source.peek().unwrap(), Some('x'));
        assert_eq!(source.read().unwrap(), Some('x'));
        assert_eq!(source.read().unwrap(), Some('y'));
        assert!(source.at_end().unwrap());
        assert_eq!(source.read().unwrap(), None);
    }

    #[test]
    fn test_read_line_stops_at_terminator() {
        for mut source in [
            Source::from_text("# note\nnext"),
            Source::from_reader(Cursor::new("# note\nnext")),
        ] {
            assert_eq!(source.read_line().unwrap(), "# note");
            assert_eq!(source.read().unwrap(), Some('\n'));
            assert_eq!(source.read_line().unwrap(), "next");
            assert!(source.at_end().unwrap());
        }
    }

    #[test]
    fn test_position_tracks_lines() {
        let mut source = Source::from_text("ab\ncd");
        for _ in 0..4 {
            source.read().unwrap();
        }
        assert_eq!(source.position(), (1, 1));
    }
}
