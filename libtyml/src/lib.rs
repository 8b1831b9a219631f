//! tyml: a restricted YAML dialect for structured configuration.
//!
//! tyml covers block mappings, block and inline sequences, quoted strings,
//! literal and folded block scalars, comments and explicit nulls. It leaves
//! out anchors, tags, flow mappings and multi-document streams.
//!
//! # Parsing Pipeline
//!
//! 1. **Lexer**: Pulls characters from a [`Source`] and emits tokens that
//!    carry their line's indentation.
//!
//! 2. **Tree Builder**: Recursively turns the token stream into an
//!    [`Entity`] tree, using indentation alone to find nesting.
//!
//! 3. **Serializer**: Writes a tree back to text that parses to an equal
//!    tree.

mod encode;
mod error;
mod lexer;
mod mapping;
mod options;
mod parser;
mod pool;
mod scalar;
mod scanner;
mod value;

pub use encode::{serialize, serialize_with};
pub use error::{Error, FormatError, LexError, ReadError, Result};
pub use lexer::{tokenize, Action, LexState, Mode, Token, TokenKind};
pub use mapping::{deserialize, serialize_as, FromEntity, ToEntity};
pub use options::{CancelToken, Options, DEFAULT_MAX_DEPTH, DEFAULT_MAX_LINE};
pub use parser::parse_tokens;
pub use scalar::{Locale, Scalar, ScalarFormat};
pub use scanner::Source;
pub use value::{
    CollectionEntity, Entity, EntityKind, ObjectEntity, ValueEntity, Written, KEYLESS, ROOT,
};

use std::io::BufRead;
use tracing::debug;

/// Parse a tyml document from a string.
///
/// # Example
///
/// ```
/// use libtyml::parse;
///
/// let root = parse("port: 8080").unwrap();
/// assert_eq!(root.resolve(&["port"]).unwrap().raw(), Some("8080"));
/// ```
pub fn parse(input: &str) -> Result<Entity> {
    parse_with_filename(input, None)
}

/// Parse a tyml document from a string with a filename for error messages.
pub fn parse_with_filename(input: &str, filename: Option<&str>) -> Result<Entity> {
    let mut options = Options::default();
    options.filename = filename.map(String::from);
    parse_with(input, &options)
}

/// Parse a tyml document from a string.
pub fn parse_with(input: &str, options: &Options) -> Result<Entity> {
    parse_source(Source::from_text(input), options)
}

/// Parse a tyml document from a buffered stream.
pub fn parse_reader<R: BufRead>(reader: R, options: &Options) -> Result<Entity> {
    parse_source(Source::from_reader(reader), options)
}

/// Parse a tyml document from a character source.
pub fn parse_source(source: Source<'_>, options: &Options) -> Result<Entity> {
    // Phase 1: Characters to tokens
    let tokens = lexer::tokenize(source, options)?;
    debug!(tokens = tokens.len(), "lexed");

    // Phase 2: Tokens to tree
    let root = parser::parse_tokens(&tokens, options)?;
    debug!(children = root.len(), "parsed");
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reader_matches_string() {
        let text = "a:\n  b: [1, 2]\n  c: |\n    x\n    y\nd: 'q'\n";
        let from_text = parse(text).unwrap();
        let from_reader = parse_reader(Cursor::new(text), &Options::default()).unwrap();
        assert_eq!(from_text, from_reader);
    }

    #[test]
    fn test_filename_in_lex_error() {
        let err = parse_with_filename("a: 'open", Some("conf.tyml")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The inline string value must have an enclosing quote at 1:9 of <conf.tyml>"
        );
    }

    #[test]
    fn test_entity_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Entity>();
    }
}
