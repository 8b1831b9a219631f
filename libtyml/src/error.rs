//! Error types for tyml parsing and tree access.

use crate::value::EntityKind;
use thiserror::Error;

/// Result type for tyml operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed character-level input.
    #[error(transparent)]
    Lex(#[from] LexError),

    /// Structural violation found while building the tree.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Wrong-shape access on a built tree.
    #[error(transparent)]
    Read(#[from] ReadError),

    /// The stream behind a character source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The caller cancelled the parse.
    #[error("Parse cancelled")]
    Cancelled,
}

/// Lexical error with its source location.
///
/// `line` and `column` are one-based.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at {line}:{column}{}", file_suffix(.filename))]
pub struct LexError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub filename: Option<String>,
}

impl LexError {
    /// Create a lex error from a zero-based position.
    pub fn new(message: impl Into<String>, line: usize, column: usize, filename: Option<&str>) -> Self {
        Self {
            message: message.into(),
            line: line + 1,
            column: column + 1,
            filename: filename.map(String::from),
        }
    }
}

/// Format a filename suffix for error messages.
fn file_suffix(filename: &Option<String>) -> String {
    match filename {
        Some(name) => format!(" of <{}>", name),
        None => String::new(),
    }
}

/// Structural errors raised by the tree builder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// `[` without a matching `]`, or a stray `]`.
    #[error("The inline collection must have a closing ']' on the same line")]
    UnmatchedBracket,

    /// An inline collection continued onto the next line.
    #[error("An inline collection may not span multiple lines")]
    NewlineInInlineCollection,

    /// An unquoted `-` outside a sequence marker position.
    #[error("Reserved character '-' in a key or value; quote it, e.g. 'bg-service-name': \"common-service\"")]
    ReservedCharacter,

    /// A sequence item with no content.
    #[error("A collection entry must specify at least one item, field or value (key: {key})")]
    EmptyEntry { key: String },

    /// Text left over after a complete sequence item.
    #[error("Unexpected content \"{text}\" after a collection entry")]
    UnexpectedContent { text: String },

    /// A `:` with nothing before it.
    #[error("A field must be declared with a non-empty key before ':'")]
    EmptyKey,

    /// Objects and collections nested past `Options::max_depth`.
    #[error("The document nests deeper than {limit} levels")]
    NestingTooDeep { limit: usize },
}

/// Errors raised when reading from or writing into a built tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("The key '{0}' does not exist in the object")]
    KeyNotFound(String),

    #[error("The collection index '{0}' is not numeric")]
    IndexNotNumeric(String),

    #[error("The collection index {index} is out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("The route is too long: '{0}' is a value, not a container")]
    RouteTooLong(String),

    #[error("'{0}' is a value, it cannot hold children")]
    NotAContainer(String),

    #[error("Expected {expected} at '{key}', found {found}")]
    TypeMismatch {
        key: String,
        expected: EntityKind,
        found: EntityKind,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_error_display() {
        let err = LexError::new("Unterminated string", 0, 4, None);
        assert_eq!(err.to_string(), "Unterminated string at 1:5");
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_lex_error_display_with_filename() {
        let err = LexError::new("Unterminated string", 2, 0, Some("app.tyml"));
        assert_eq!(err.to_string(), "Unterminated string at 3:1 of <app.tyml>");
    }

    #[test]
    fn test_errors_convert_into_error() {
        let err: Error = FormatError::UnmatchedBracket.into();
        assert!(matches!(err, Error::Format(FormatError::UnmatchedBracket)));
        let err: Error = ReadError::KeyNotFound("a".into()).into();
        assert_eq!(err.to_string(), "The key 'a' does not exist in the object");
    }

    #[test]
    fn test_structural_messages() {
        assert_eq!(
            FormatError::NestingTooDeep { limit: 4 }.to_string(),
            "The document nests deeper than 4 levels"
        );
        assert_eq!(
            FormatError::EmptyKey.to_string(),
            "A field must be declared with a non-empty key before ':'"
        );
    }
}
