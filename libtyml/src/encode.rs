//! Phase 3: Serializer
//!
//! Writes an entity tree back to text that parses to an equal tree. Output
//! uses two-space indentation. Sequence items start with `- ` and their
//! content is aligned two columns right of the marker. Values that the
//! lexer would read as structure are single-quoted.

use crate::options::Options;
use crate::value::{is_null, Entity, KEYLESS, ROOT};

const INDENT: usize = 2;

/// Serialize an entity tree with default options.
pub fn serialize(entity: &Entity) -> String {
    serialize_with(entity, &Options::default())
}

/// Serialize an entity tree. Values of at least `options.max_line`
/// characters are written as folded block scalars.
pub fn serialize_with(entity: &Entity, options: &Options) -> String {
    let mut writer = Writer::new(options.max_line);
    if is_anonymous(entity.key()) {
        writer.content(entity, 0);
    } else {
        writer.child(entity, 0);
    }
    writer.out
}

fn is_anonymous(key: &str) -> bool {
    key == ROOT || key == KEYLESS
}

struct Writer {
    out: String,
    max_line: usize,
}

impl Writer {
    fn new(max_line: usize) -> Self {
        Self {
            out: String::new(),
            max_line: max_line.max(2),
        }
    }

    fn line(&mut self, col: usize, text: &str) {
        self.out.push_str(&" ".repeat(col));
        self.out.push_str(text);
        self.out.push('\n');
    }

    /// A child of an object, written under its own key.
    fn child(&mut self, entity: &Entity, col: usize) {
        let key = entity.key();
        if key == KEYLESS {
            self.content(entity, col);
            return;
        }
        let key = quote_key(key);
        match entity {
            Entity::Value(v) => self.value(col, Some(&key), &v.raw),
            Entity::Object(o) if o.children.is_empty() => self.line(col, &format!("{}: ~", key)),
            Entity::Collection(c) if c.items.is_empty() => {
                self.line(col, &format!("{}: []", key))
            }
            _ => {
                self.line(col, &format!("{}:", key));
                self.content(entity, col + INDENT);
            }
        }
    }

    /// An entity's body at `col`, without its key.
    fn content(&mut self, entity: &Entity, col: usize) {
        match entity {
            Entity::Value(v) => self.value(col, None, &v.raw),
            Entity::Object(o) if o.children.is_empty() => {
                if !is_anonymous(&o.key) || col > 0 {
                    self.line(col, "~");
                }
            }
            Entity::Object(o) => {
                for child in o.children.values() {
                    self.child(child, col);
                }
            }
            Entity::Collection(c) if c.items.is_empty() => self.line(col, "[]"),
            Entity::Collection(c) => {
                for item in &c.items {
                    self.item(item, col);
                }
            }
        }
    }

    /// A collection item. The content is written two columns in and its
    /// first line's indentation is replaced by the marker.
    fn item(&mut self, entity: &Entity, col: usize) {
        let mut inner = Writer::new(self.max_line);
        inner.content(entity, col + INDENT);
        self.out.push_str(&" ".repeat(col));
        self.out.push_str("- ");
        self.out.push_str(&inner.out[col + INDENT..]);
    }

    fn value(&mut self, col: usize, key: Option<&str>, raw: &str) {
        let head = match key {
            Some(key) => format!("{}: ", key),
            None => String::new(),
        };
        if is_null(raw) {
            self.line(col, &format!("{}~", head));
        } else if raw.contains('\n') {
            self.line(col, &format!("{}|", head));
            for text in literal_lines(raw) {
                self.line(col + 2 * INDENT, text);
            }
        } else if raw.chars().count() >= self.max_line && raw.trim() == raw {
            self.line(col, &format!("{}>", head));
            for text in wrap(raw, self.max_line - 1) {
                self.line(col + 2 * INDENT, &text);
            }
        } else if needs_quotes(raw, key.is_none()) {
            self.line(col, &format!("{}{}", head, quote(raw)));
        } else {
            self.line(col, &format!("{}{}", head, raw));
        }
    }
}

/// Whether a plain `raw` would be misread. Keyless values are read before
/// any `:` on their line, so `:` and `-` are structural there too.
fn needs_quotes(raw: &str, keyless: bool) -> bool {
    let opens_structure = matches!(raw.chars().next(), Some('\'' | '"' | '[' | '|' | '>'));
    opens_structure
        || raw.contains('#')
        || raw.trim() != raw
        || (keyless && (raw.contains('-') || raw.contains(':')))
}

fn quote_key(key: &str) -> String {
    let special = key.is_empty()
        || key.trim() != key
        || key.contains([':', '-', '#', '\'', '"'])
        || key.starts_with(['[', '|', '>']);
    if special {
        quote(key)
    } else {
        key.to_string()
    }
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Lines of a literal block, with the indentation they share removed. The
/// first line sets the block's indent, so it cannot keep any of its own.
fn literal_lines(raw: &str) -> Vec<&str> {
    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    let margin = lines
        .iter()
        .map(|l| l.len() - l.trim_start_matches(' ').len())
        .min()
        .unwrap_or(0);
    lines
        .into_iter()
        .enumerate()
        .map(|(n, l)| if n == 0 { l.trim_start_matches(' ') } else { &l[margin..] })
        .collect()
}

/// Break `text` into lines of at most `width` characters where possible.
/// Breaks only replace a single space between two non-spaces, because the
/// lexer trims block lines; joining the lines with single spaces restores
/// `text`.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let breakable = |i: usize| {
        chars[i] == ' '
            && i > 0
            && chars[i - 1] != ' '
            && chars.get(i + 1).map_or(false, |&c| c != ' ')
    };
    let mut lines = Vec::new();
    let mut start = 0;
    let mut last_break = None;
    for i in 0..chars.len() {
        if !breakable(i) {
            continue;
        }
        if i - start > width {
            if let Some(b) = last_break {
                lines.push(chars[start..b].iter().collect());
                start = b + 1;
            }
        }
        last_break = Some(i);
    }
    if chars.len() - start > width {
        if let Some(b) = last_break.filter(|&b| b >= start) {
            lines.push(chars[start..b].iter().collect());
            start = b + 1;
        }
    }
    lines.push(chars[start..].iter().collect());
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use crate::parse_with;

    fn round_trip(input: &str) -> String {
        let first = parse(input).unwrap();
        let text = serialize(&first);
        let second = parse(&text).unwrap();
        assert_eq!(first, second, "round trip changed the tree:\n{}", text);
        text
    }

    #[test]
    fn test_objects() {
        let text = round_trip("a: 1\nb:\n  c: two\n  d: ~\n");
        assert_eq!(text, "a: 1\nb:\n  c: two\n  d: ~\n");
    }

    #[test]
    fn test_collections() {
        let text = round_trip("list:\n- a\n- b\nempty: []\n");
        assert_eq!(text, "list:\n  - a\n  - b\nempty: []\n");
    }

    #[test]
    fn test_collection_of_objects() {
        let input = "svc:\n  - name: web\n    tags:\n      - x\n  - name: db\n";
        assert_eq!(round_trip(input), input);
    }

    #[test]
    fn test_nested_collections() {
        assert_eq!(round_trip("- - a\n  - b\n- c\n"), "- - a\n  - b\n- c\n");
    }

    #[test]
    fn test_inline_collection_becomes_block() {
        assert_eq!(round_trip("arr: [1, 2]"), "arr:\n  - 1\n  - 2\n");
    }

    #[test]
    fn test_quoting() {
        let text = round_trip("'a-b': 'x # y'\nlist:\n  - 'c-d'\n  - 'k: v'\n  - '''q'''\n");
        assert_eq!(
            text,
            "'a-b': 'x # y'\nlist:\n  - 'c-d'\n  - 'k: v'\n  - '''q'''\n"
        );
    }

    #[test]
    fn test_value_after_assign_keeps_colon_and_dash() {
        assert_eq!(round_trip("url: http://a-b:80\n"), "url: http://a-b:80\n");
    }

    #[test]
    fn test_literal_block() {
        let text = round_trip("text: |\n  one\n  two\n");
        assert_eq!(text, "text: |\n    one\n    two\n");
    }

    #[test]
    fn test_block_in_collection() {
        let text = round_trip("- |\n      one\n      two\n");
        assert_eq!(text, "- |\n      one\n      two\n");
    }

    #[test]
    fn test_folded_long_value() {
        let options = Options::default().with_max_line(16);
        let root = parse("text: alpha beta gamma delta epsilon\n").unwrap();
        let text = serialize_with(&root, &options);
        assert_eq!(text, "text: >\n    alpha beta\n    gamma delta\n    epsilon\n");
        assert_eq!(parse_with(&text, &options).unwrap(), root);
    }

    #[test]
    fn test_folded_value_with_space_runs() {
        let options = Options::default().with_max_line(16);
        let root = parse("text: 'alpha  beta gamma   delta epsilon zeta'\n").unwrap();
        let text = serialize_with(&root, &options);
        assert_eq!(
            text,
            "text: >\n    alpha  beta\n    gamma   delta\n    epsilon zeta\n"
        );
        assert_eq!(parse_with(&text, &options).unwrap(), root);
    }

    #[test]
    fn test_long_value_without_break_points() {
        let options = Options::default().with_max_line(8);
        let root = parse("a: 'x  y  zz'\n").unwrap();
        let text = serialize_with(&root, &options);
        assert_eq!(text, "a: >\n    x  y  zz\n");
        assert_eq!(parse_with(&text, &options).unwrap(), root);

        let input = format!("a:{}  y", "x".repeat(4093));
        round_trip(&input);
    }

    #[test]
    fn test_literal_block_keeps_relative_indent() {
        let text = round_trip("text: |\n  one\n    two\n  three\n");
        assert_eq!(text, "text: |\n    one\n      two\n    three\n");
        assert_eq!(literal_lines("  a\n    b\n"), vec!["a", "  b"]);
    }

    #[test]
    fn test_keyed_and_empty_entities() {
        assert_eq!(serialize(&Entity::value("k", "v")), "k: v\n");
        assert_eq!(serialize(&Entity::object("k")), "k: ~\n");
        assert_eq!(serialize(&Entity::object(ROOT)), "");
        assert_eq!(Entity::collection("k").to_string(), "k: []\n");
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("a b c", 3), vec!["a b", "c"]);
        assert_eq!(wrap("abcdef gh", 3), vec!["abcdef", "gh"]);
        assert_eq!(wrap("a  b", 10), vec!["a  b"]);
        assert_eq!(wrap("a  b c", 2), vec!["a  b", "c"]);
        assert_eq!(wrap("ab   cd ef", 3), vec!["ab   cd", "ef"]);
    }
}
