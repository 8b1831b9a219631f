//! Parse and serialize options.

use crate::error::{Error, FormatError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default bound on a single logical line's character buffer.
pub const DEFAULT_MAX_LINE: usize = 1 << 12;

/// Default bound on how deeply objects and collections may nest.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// A cancellation flag shared between the caller and a running parse.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The parse stops at its next checkpoint.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Options for one parse or serialize call.
#[derive(Clone, Debug)]
pub struct Options {
    /// Maximum characters buffered for one logical line. Serialized values
    /// at or above this length are written as folded block scalars.
    pub max_line: usize,
    /// Maximum nesting of objects and collections.
    pub max_depth: usize,
    /// Checked at every newline in the lexer and every recursion in the parser.
    pub cancel: Option<CancelToken>,
    /// Filename shown in error messages.
    pub filename: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_line: DEFAULT_MAX_LINE,
            max_depth: DEFAULT_MAX_DEPTH,
            cancel: None,
            filename: None,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(mut self, max_line: usize) -> Self {
        self.max_line = max_line.max(1);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub(crate) fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }

    /// Fail when `depth` exceeds `max_depth`.
    pub(crate) fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(FormatError::NestingTooDeep {
                limit: self.max_depth,
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert_eq!(options.max_line, 4096);
        assert_eq!(options.max_depth, 128);
        assert!(options.cancel.is_none());
        assert!(options.check_cancelled().is_ok());
    }

    #[test]
    fn test_depth_limit() {
        let options = Options::new().with_max_depth(2);
        assert!(options.check_depth(2).is_ok());
        assert!(matches!(
            options.check_depth(3),
            Err(Error::Format(FormatError::NestingTooDeep { limit: 2 }))
        ));
        assert_eq!(Options::new().with_max_depth(0).max_depth, 1);
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let options = Options::new().with_cancel(token.clone());
        token.cancel();
        assert!(matches!(options.check_cancelled(), Err(Error::Cancelled)));
    }
}
