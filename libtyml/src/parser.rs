//! Phase 2: Tree Builder
//!
//! The tree builder turns the token stream into an entity tree. Every
//! builder call works on a contiguous token slice and decides its shape
//! from the first significant token: a sequence-item marker opens a
//! collection, anything else an object. Nesting is found purely from token
//! indentation: a nested span runs until the first token that is not
//! indented deeper than the line that opened it.

use crate::error::{FormatError, Result};
use crate::lexer::{Token, TokenKind};
use crate::options::Options;
use crate::pool::{BuilderPool, CollectionBuilder, ObjectBuilder};
use crate::value::{Entity, KEYLESS, ROOT};
use tracing::trace;

/// Build the tree for a whole document. The result is an object keyed
/// [`ROOT`].
pub fn parse_tokens(tokens: &[Token], options: &Options) -> Result<Entity> {
    let builder = TreeBuilder {
        pool: BuilderPool::default(),
        options,
    };
    builder.root(tokens)
}

struct TreeBuilder<'o> {
    pool: BuilderPool,
    options: &'o Options,
}

impl TreeBuilder<'_> {
    fn root(&self, tokens: &[Token]) -> Result<Entity> {
        let body = trim_newlines(tokens);
        if starts_with(body, TokenKind::SeqItemMarker) {
            let collection = self.collection(KEYLESS, body, 1)?;
            let mut root = self.pool.rent::<ObjectBuilder>();
            root.begin(ROOT);
            root.insert(collection);
            return Ok(root.finish());
        }
        self.object(ROOT, body, 1)
    }

    fn block(&self, key: &str, tokens: &[Token], depth: usize) -> Result<Entity> {
        if starts_with(tokens, TokenKind::SeqItemMarker) {
            self.collection(key, tokens, depth)
        } else {
            self.object(key, tokens, depth)
        }
    }

    // ========================================================================
    // Objects
    // ========================================================================

    fn object(&self, key: &str, tokens: &[Token], depth: usize) -> Result<Entity> {
        self.options.check_cancelled()?;
        self.options.check_depth(depth)?;
        trace!(key, depth, tokens = tokens.len(), "object");

        let mut builder = self.pool.rent::<ObjectBuilder>();
        builder.begin(key);
        let mut ident: Option<&str> = None;
        let mut pending: Option<&str> = None;
        let mut i = 0;

        while i < tokens.len() {
            let token = &tokens[i];
            match token.kind {
                TokenKind::Identifier => {
                    ident = Some(token.text.as_str());
                    i += 1;
                }
                TokenKind::Assign => {
                    let name = match ident.take() {
                        Some(name) if !name.is_empty() => name,
                        _ => return Err(FormatError::EmptyKey.into()),
                    };
                    let opens_block = matches!(
                        tokens.get(i + 1).map(|t| t.kind),
                        None | Some(TokenKind::NewLine)
                    );
                    if opens_block {
                        let start = (i + 2).min(tokens.len());
                        let end = dedent(tokens, start, token.indent);
                        builder.insert(self.nested(name, &tokens[start..end], depth + 1)?);
                        pending = None;
                        i = end;
                    } else {
                        pending = Some(name);
                        i += 1;
                    }
                }
                TokenKind::Value => {
                    let name = pending.take().unwrap_or(KEYLESS);
                    builder.insert(Entity::value(name, token.text.as_str()));
                    i += 1;
                }
                TokenKind::InlineSeqStart => {
                    let name = pending.take().unwrap_or(KEYLESS);
                    let (collection, next) = self.inline(name, tokens, i)?;
                    builder.insert(collection);
                    i = next;
                }
                TokenKind::BlockScalarStart => {
                    let name = pending.take().unwrap_or(KEYLESS);
                    let (value, next) = block_scalar(name, tokens, i, token.indent);
                    builder.insert(value);
                    i = next;
                }
                TokenKind::InlineSeqEnd => return Err(FormatError::UnmatchedBracket.into()),
                TokenKind::SeqItemMarker => return Err(FormatError::ReservedCharacter.into()),
                TokenKind::NewLine => {
                    pending = None;
                    i += 1;
                }
                TokenKind::StringQuote => i += 1,
            }
        }

        Ok(builder.finish())
    }

    /// The value of a key whose line ends right after its `:`.
    fn nested(&self, key: &str, tokens: &[Token], depth: usize) -> Result<Entity> {
        let body = trim_newlines(tokens);
        if body.is_empty() {
            return Ok(Entity::value(key, ""));
        }
        self.block(key, body, depth)
    }

    /// Parse `[a, b]` starting at the `[` at `i`. Returns the collection and
    /// the index after the `]`.
    fn inline(&self, key: &str, tokens: &[Token], i: usize) -> Result<(Entity, usize)> {
        let mut builder = self.pool.rent::<CollectionBuilder>();
        builder.begin(key);
        for (j, token) in tokens.iter().enumerate().skip(i + 1) {
            match token.kind {
                TokenKind::InlineSeqEnd => return Ok((builder.finish(), j + 1)),
                TokenKind::NewLine => return Err(FormatError::NewlineInInlineCollection.into()),
                TokenKind::Value => builder.push(Entity::value(KEYLESS, token.text.as_str())),
                _ => return Err(FormatError::UnmatchedBracket.into()),
            }
        }
        Err(FormatError::UnmatchedBracket.into())
    }

    // ========================================================================
    // Collections
    // ========================================================================

    fn collection(&self, key: &str, tokens: &[Token], depth: usize) -> Result<Entity> {
        self.options.check_cancelled()?;
        self.options.check_depth(depth)?;
        trace!(key, depth, tokens = tokens.len(), "collection");

        let level = tokens.first().map_or(0, |t| t.indent);
        let markers: Vec<usize> = tokens
            .iter()
            .enumerate()
            .filter(|(j, t)| {
                t.kind == TokenKind::SeqItemMarker
                    && t.indent == level
                    && (*j == 0 || tokens[j - 1].kind == TokenKind::NewLine)
            })
            .map(|(j, _)| j)
            .collect();

        let mut builder = self.pool.rent::<CollectionBuilder>();
        builder.begin(key);
        for (n, &marker) in markers.iter().enumerate() {
            let end = markers.get(n + 1).copied().unwrap_or(tokens.len());
            let item = trim_newlines(&tokens[marker + 1..end]);
            builder.push(self.item(key, item, depth + 1, tokens[marker].column)?);
        }
        Ok(builder.finish())
    }

    /// One sequence item. `marker` is the column of its `-`.
    fn item(&self, key: &str, tokens: &[Token], depth: usize, marker: usize) -> Result<Entity> {
        if tokens.is_empty() {
            return Err(FormatError::EmptyEntry {
                key: key.to_string(),
            }
            .into());
        }
        if starts_with(tokens, TokenKind::SeqItemMarker) {
            self.collection(KEYLESS, tokens, depth)
        } else if tokens.iter().any(|t| t.kind == TokenKind::Assign) {
            self.object(KEYLESS, tokens, depth)
        } else {
            self.scalar_item(key, tokens, marker)
        }
    }

    /// An item holding a single value, quoted string, inline collection or
    /// block scalar. A block right after the marker is owned by the marker's
    /// column.
    fn scalar_item(&self, key: &str, tokens: &[Token], marker: usize) -> Result<Entity> {
        let mut result = None;
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            match token.kind {
                TokenKind::StringQuote | TokenKind::NewLine => i += 1,
                TokenKind::Value if result.is_none() => {
                    result = Some(Entity::value(KEYLESS, token.text.as_str()));
                    i += 1;
                }
                TokenKind::InlineSeqStart if result.is_none() => {
                    let (collection, next) = self.inline(KEYLESS, tokens, i)?;
                    result = Some(collection);
                    i = next;
                }
                TokenKind::BlockScalarStart if result.is_none() => {
                    let owner = if i == 0 { marker } else { token.indent };
                    let (value, next) = block_scalar(KEYLESS, tokens, i, owner);
                    result = Some(value);
                    i = next;
                }
                TokenKind::SeqItemMarker => return Err(FormatError::ReservedCharacter.into()),
                TokenKind::InlineSeqEnd => return Err(FormatError::UnmatchedBracket.into()),
                _ => {
                    return Err(FormatError::UnexpectedContent {
                        text: token.text.clone(),
                    }
                    .into())
                }
            }
        }
        result.ok_or_else(|| {
            FormatError::EmptyEntry {
                key: key.to_string(),
            }
            .into()
        })
    }
}

// ============================================================================
// Token helpers
// ============================================================================

fn starts_with(tokens: &[Token], kind: TokenKind) -> bool {
    tokens.first().map(|t| t.kind) == Some(kind)
}

fn trim_newlines(tokens: &[Token]) -> &[Token] {
    let start = tokens
        .iter()
        .position(|t| t.kind != TokenKind::NewLine)
        .unwrap_or(tokens.len());
    let end = tokens
        .iter()
        .rposition(|t| t.kind != TokenKind::NewLine)
        .map_or(start, |j| j + 1);
    &tokens[start..end]
}

/// Index of the first token at or after `start` that is not indented deeper
/// than `indent`.
fn dedent(tokens: &[Token], start: usize, indent: usize) -> usize {
    tokens[start..]
        .iter()
        .position(|t| t.indent <= indent)
        .map_or(tokens.len(), |j| start + j)
}

/// Parse a block scalar whose `|` or `>` is at `i`. The content is the run
/// of lines after the header that are indented deeper than `owner` and at
/// least as deep as the first of them; the lexer has already kept the extra
/// indentation of deeper lines. Lines are joined with newlines (literal) or
/// spaces (folded).
fn block_scalar(key: &str, tokens: &[Token], i: usize, owner: usize) -> (Entity, usize) {
    let header = &tokens[i];
    let mut start = i + 1;
    if starts_with(&tokens[start..], TokenKind::NewLine) {
        start += 1;
    }
    let content = match tokens.get(start) {
        Some(first) if first.kind == TokenKind::Value && first.indent > owner => {
            let level = first.indent;
            tokens[start..]
                .iter()
                .take_while(|t| {
                    matches!(t.kind, TokenKind::Value | TokenKind::NewLine) && t.indent >= level
                })
                .count()
        }
        _ => 0,
    };
    let end = start + content;
    let lines: Vec<&str> = tokens[start..end]
        .iter()
        .filter(|t| t.kind == TokenKind::Value)
        .map(|t| t.text.as_str())
        .collect();
    let separator = if header.text == ">" { " " } else { "\n" };
    (Entity::value(key, lines.join(separator)), end)
}
