//! The entity tree.
//!
//! A parsed document is an [`Entity`]: a scalar [`ValueEntity`], an
//! insertion-ordered [`ObjectEntity`] or an ordered [`CollectionEntity`].
//! Children are shared through `Arc`, so subtrees can be moved between
//! trees without copying.

use crate::error::{ReadError, Result};
use crate::mapping::ToEntity;
use crate::scalar::{Locale, Scalar, ScalarFormat};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Key of the top-level object returned by a parse.
pub const ROOT: &str = "<root>";

/// Key of anonymous entities such as collection items.
pub const KEYLESS: &str = "<no key>";

/// The three entity shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Value,
    Object,
    Collection,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Value => "value",
            EntityKind::Object => "object",
            EntityKind::Collection => "collection",
        })
    }
}

/// A node of the entity tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Value(ValueEntity),
    Object(ObjectEntity),
    Collection(CollectionEntity),
}

/// A scalar. The raw text is kept as written; typed reads parse it on
/// demand.
#[derive(Debug, Clone, Eq)]
pub struct ValueEntity {
    pub key: String,
    pub raw: String,
}

impl ValueEntity {
    pub fn new(key: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            raw: raw.into(),
        }
    }

    /// `""`, `"~"` and `"null"` all mean null.
    pub fn is_null(&self) -> bool {
        is_null(&self.raw)
    }
}

pub(crate) fn is_null(raw: &str) -> bool {
    matches!(raw, "" | "~" | "null")
}

/// Null sentinels compare equal to each other.
impl PartialEq for ValueEntity {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && (self.raw == other.raw || (self.is_null() && other.is_null()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObjectEntity {
    pub key: String,
    pub children: IndexMap<String, Arc<Entity>>,
}

/// Objects are equal when they hold equal children in the same order.
impl PartialEq for ObjectEntity {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(other.children.iter())
                .all(|((ka, a), (kb, b))| ka == kb && a == b)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionEntity {
    pub key: String,
    pub items: Vec<Arc<Entity>>,
}

/// A value handed to [`Entity::write`].
pub enum Written<'a> {
    /// An existing subtree, stored without copying unless it must be re-keyed.
    Node(Arc<Entity>),
    /// A typed scalar, rendered with the write's format and locale.
    Scalar(&'a dyn Scalar),
    /// Raw text. Empty text is stored as `~`.
    Text(&'a str),
    Bool(bool),
    /// A mapped type that fills a fresh object.
    Mapped(&'a dyn ToEntity),
}

impl Written<'_> {
    fn into_entity(self, key: &str, format: &ScalarFormat, locale: &Locale) -> Result<Arc<Entity>> {
        let entity = match self {
            Written::Node(mut node) => {
                if node.key() != key {
                    Arc::make_mut(&mut node).set_key(key);
                }
                return Ok(node);
            }
            Written::Scalar(value) => Entity::value(key, value.render(format, locale)),
            Written::Text("") => Entity::value(key, "~"),
            Written::Text(text) => Entity::value(key, text),
            Written::Bool(flag) => Entity::value(key, flag.to_string()),
            Written::Mapped(mapped) => {
                let mut object = Entity::object(key);
                mapped.to_entity(&mut object)?;
                object
            }
        };
        Ok(Arc::new(entity))
    }
}

impl Entity {
    pub fn value(key: impl Into<String>, raw: impl Into<String>) -> Self {
        Entity::Value(ValueEntity::new(key, raw))
    }

    pub fn object(key: impl Into<String>) -> Self {
        Entity::Object(ObjectEntity {
            key: key.into(),
            children: IndexMap::new(),
        })
    }

    pub fn collection(key: impl Into<String>) -> Self {
        Entity::Collection(CollectionEntity {
            key: key.into(),
            items: Vec::new(),
        })
    }

    pub fn key(&self) -> &str {
        match self {
            Entity::Value(v) => &v.key,
            Entity::Object(o) => &o.key,
            Entity::Collection(c) => &c.key,
        }
    }

    fn set_key(&mut self, key: &str) {
        let slot = match self {
            Entity::Value(v) => &mut v.key,
            Entity::Object(o) => &mut o.key,
            Entity::Collection(c) => &mut c.key,
        };
        slot.clear();
        slot.push_str(key);
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Value(_) => EntityKind::Value,
            Entity::Object(_) => EntityKind::Object,
            Entity::Collection(_) => EntityKind::Collection,
        }
    }

    /// Null for values, childless for containers.
    pub fn is_empty(&self) -> bool {
        match self {
            Entity::Value(v) => v.is_null(),
            _ => self.len() == 0,
        }
    }

    /// Number of children. Always zero for values.
    pub fn len(&self) -> usize {
        match self {
            Entity::Value(_) => 0,
            Entity::Object(o) => o.children.len(),
            Entity::Collection(c) => c.items.len(),
        }
    }

    pub fn as_value(&self) -> Option<&ValueEntity> {
        match self {
            Entity::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectEntity> {
        match self {
            Entity::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&CollectionEntity> {
        match self {
            Entity::Collection(c) => Some(c),
            _ => None,
        }
    }

    /// The raw text of a value.
    pub fn raw(&self) -> Option<&str> {
        self.as_value().map(|v| v.raw.as_str())
    }

    /// Children in order. Values have none.
    pub fn children(&self) -> impl Iterator<Item = &Entity> + '_ {
        let (fields, items) = match self {
            Entity::Object(o) => (Some(o.children.values()), None),
            Entity::Collection(c) => (None, Some(c.items.iter())),
            Entity::Value(_) => (None, None),
        };
        fields
            .into_iter()
            .flatten()
            .chain(items.into_iter().flatten())
            .map(|child| child.as_ref())
    }

    /// Look up one path segment: a key for objects, an index for collections.
    pub fn get(&self, segment: &str) -> Option<&Entity> {
        self.step(segment).ok()
    }

    fn step(&self, segment: &str) -> std::result::Result<&Entity, ReadError> {
        match self {
            Entity::Object(o) => o
                .children
                .get(segment)
                .map(|child| child.as_ref())
                .ok_or_else(|| ReadError::KeyNotFound(segment.to_string())),
            Entity::Collection(c) => {
                let index = parse_index(segment)?;
                c.items
                    .get(index)
                    .map(|child| child.as_ref())
                    .ok_or(ReadError::IndexOutOfRange {
                        index,
                        len: c.items.len(),
                    })
            }
            Entity::Value(v) => Err(ReadError::RouteTooLong(v.key.clone())),
        }
    }

    fn step_mut(&mut self, segment: &str) -> std::result::Result<&mut Entity, ReadError> {
        match self {
            Entity::Object(o) => o
                .children
                .get_mut(segment)
                .map(Arc::make_mut)
                .ok_or_else(|| ReadError::KeyNotFound(segment.to_string())),
            Entity::Collection(c) => {
                let index = parse_index(segment)?;
                let len = c.items.len();
                c.items
                    .get_mut(index)
                    .map(Arc::make_mut)
                    .ok_or(ReadError::IndexOutOfRange { index, len })
            }
            Entity::Value(v) => Err(ReadError::RouteTooLong(v.key.clone())),
        }
    }

    /// Follow `path` from this entity. An empty path resolves to `self`.
    pub fn resolve(&self, path: &[&str]) -> std::result::Result<&Entity, ReadError> {
        path.iter().try_fold(self, |entity, segment| entity.step(segment))
    }

    /// Follow `path` for writing. Shared subtrees along the path are
    /// copied before they are handed out.
    pub fn resolve_mut(&mut self, path: &[&str]) -> std::result::Result<&mut Entity, ReadError> {
        path.iter()
            .try_fold(self, |entity, segment| entity.step_mut(segment))
    }

    pub fn resolve_value(&self, path: &[&str]) -> std::result::Result<&ValueEntity, ReadError> {
        let entity = self.resolve(path)?;
        entity.as_value().ok_or_else(|| mismatch(entity, EntityKind::Value))
    }

    pub fn resolve_object(&self, path: &[&str]) -> std::result::Result<&ObjectEntity, ReadError> {
        let entity = self.resolve(path)?;
        entity.as_object().ok_or_else(|| mismatch(entity, EntityKind::Object))
    }

    pub fn resolve_collection(
        &self,
        path: &[&str],
    ) -> std::result::Result<&CollectionEntity, ReadError> {
        let entity = self.resolve(path)?;
        entity
            .as_collection()
            .ok_or_else(|| mismatch(entity, EntityKind::Collection))
    }

    // ========================================================================
    // Typed reads
    // ========================================================================

    /// Read the value at `path` as `T`.
    ///
    /// Missing entries, non-values, nulls and unparsable text all yield
    /// `default`.
    pub fn read_scalar<T: Scalar>(&self, path: &[&str], default: T, locale: &Locale) -> T {
        self.try_read_scalar(path, locale)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    /// Read the value at `path` as `T`, reporting why a lookup failed.
    ///
    /// `Ok(None)` means the value was null or did not parse as `T`.
    pub fn try_read_scalar<T: Scalar>(
        &self,
        path: &[&str],
        locale: &Locale,
    ) -> std::result::Result<Option<T>, ReadError> {
        let value = self.resolve_value(path)?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(T::parse_raw(&value.raw, locale))
    }

    /// Children of the container at `path` that have the given kind.
    pub fn read_entities(
        &self,
        path: &[&str],
        kind: EntityKind,
    ) -> std::result::Result<Vec<&Entity>, ReadError> {
        let container = self.resolve(path)?;
        if let Entity::Value(v) = container {
            return Err(ReadError::NotAContainer(v.key.clone()));
        }
        Ok(container.children().filter(|c| c.kind() == kind).collect())
    }

    /// Child values of the container at `path`, parsed as `T`.
    ///
    /// Nulls and values that do not parse are skipped.
    pub fn read_range<T: Scalar>(
        &self,
        path: &[&str],
        locale: &Locale,
    ) -> std::result::Result<Vec<T>, ReadError> {
        Ok(self
            .read_entities(path, EntityKind::Value)?
            .into_iter()
            .filter_map(Entity::as_value)
            .filter(|v| !v.is_null())
            .filter_map(|v| T::parse_raw(&v.raw, locale))
            .collect())
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Store `value` under `key` in the container at `path`.
    ///
    /// An empty key stores an anonymous entity. Objects replace an existing
    /// child with the same key; collections replace an equal item or append.
    pub fn write(
        &mut self,
        path: &[&str],
        key: &str,
        value: Written<'_>,
        format: &ScalarFormat,
        locale: &Locale,
    ) -> Result<()> {
        let key = if key.is_empty() { KEYLESS } else { key };
        let child = value.into_entity(key, format, locale)?;
        self.resolve_mut(path)?.attach(child)?;
        Ok(())
    }

    pub fn write_text(&mut self, path: &[&str], key: &str, text: &str) -> Result<()> {
        self.write(
            path,
            key,
            Written::Text(text),
            &ScalarFormat::default(),
            &Locale::INVARIANT,
        )
    }

    pub fn write_scalar<T: Scalar>(
        &mut self,
        path: &[&str],
        key: &str,
        value: &T,
        locale: &Locale,
    ) -> Result<()> {
        self.write(
            path,
            key,
            Written::Scalar(value),
            &ScalarFormat::default(),
            locale,
        )
    }

    pub fn write_node(&mut self, path: &[&str], key: &str, node: Arc<Entity>) -> Result<()> {
        self.write(
            path,
            key,
            Written::Node(node),
            &ScalarFormat::default(),
            &Locale::INVARIANT,
        )
    }

    fn attach(&mut self, child: Arc<Entity>) -> std::result::Result<(), ReadError> {
        match self {
            Entity::Object(o) => {
                o.children.insert(child.key().to_string(), child);
            }
            Entity::Collection(c) => match c.items.iter().position(|item| *item == child) {
                Some(index) => c.items[index] = child,
                None => c.items.push(child),
            },
            Entity::Value(v) => return Err(ReadError::NotAContainer(v.key.clone())),
        }
        Ok(())
    }
}

/// Digits only; `usize::from_str` would also take a leading `+`.
fn parse_index(segment: &str) -> std::result::Result<usize, ReadError> {
    let not_numeric = || ReadError::IndexNotNumeric(segment.to_string());
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(not_numeric());
    }
    segment.parse().map_err(|_| not_numeric())
}

fn mismatch(entity: &Entity, expected: EntityKind) -> ReadError {
    ReadError::TypeMismatch {
        key: entity.key().to_string(),
        expected,
        found: entity.kind(),
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::encode::serialize(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::parse;

    const DOC: &str = "\
server:
  host: example.org
  port: 8080
  ratio: 0.75
  debug: ~
ports: [80, 443, x, null]
";

    #[test]
    fn test_null_sentinels() {
        for raw in ["", "~", "null"] {
            assert!(ValueEntity::new("a", raw).is_null());
        }
        assert!(!ValueEntity::new("a", "Null").is_null());
        assert_eq!(Entity::value("a", "~"), Entity::value("a", "null"));
        assert_ne!(Entity::value("a", "~"), Entity::value("b", "~"));
        assert_ne!(Entity::value("a", "1"), Entity::value("a", "2"));
    }

    #[test]
    fn test_object_equality_is_ordered() {
        let mut a = Entity::object("o");
        a.write_text(&[], "x", "1").unwrap();
        a.write_text(&[], "y", "2").unwrap();
        let mut b = Entity::object("o");
        b.write_text(&[], "y", "2").unwrap();
        b.write_text(&[], "x", "1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_resolve() {
        let root = parse(DOC).unwrap();
        assert_eq!(root.key(), ROOT);
        assert_eq!(root.resolve(&["server", "host"]).unwrap().raw(), Some("example.org"));
        assert_eq!(root.resolve(&["ports", "1"]).unwrap().raw(), Some("443"));
        assert_eq!(root.resolve(&[]).unwrap(), &root);
    }

    #[test]
    fn test_resolve_errors() {
        let root = parse(DOC).unwrap();
        assert_eq!(
            root.resolve(&["server", "missing"]).unwrap_err(),
            ReadError::KeyNotFound("missing".into())
        );
        assert_eq!(
            root.resolve(&["ports", "first"]).unwrap_err(),
            ReadError::IndexNotNumeric("first".into())
        );
        assert_eq!(
            root.resolve(&["ports", "-1"]).unwrap_err(),
            ReadError::IndexNotNumeric("-1".into())
        );
        assert_eq!(
            root.resolve(&["ports", "+1"]).unwrap_err(),
            ReadError::IndexNotNumeric("+1".into())
        );
        assert_eq!(
            root.resolve(&["ports", ""]).unwrap_err(),
            ReadError::IndexNotNumeric("".into())
        );
        assert_eq!(
            root.resolve(&["ports", "9"]).unwrap_err(),
            ReadError::IndexOutOfRange { index: 9, len: 4 }
        );
        assert_eq!(
            root.resolve(&["server", "port", "deeper"]).unwrap_err(),
            ReadError::RouteTooLong("port".into())
        );
        assert_eq!(
            root.resolve_collection(&["server"]).unwrap_err(),
            ReadError::TypeMismatch {
                key: "server".into(),
                expected: EntityKind::Collection,
                found: EntityKind::Object,
            }
        );
    }

    #[test]
    fn test_read_scalar() {
        let root = parse(DOC).unwrap();
        let l = Locale::INVARIANT;
        assert_eq!(root.read_scalar(&["server", "port"], 0u16, &l), 8080);
        assert_eq!(root.read_scalar(&["server", "ratio"], 0.0, &l), 0.75);
        assert_eq!(root.read_scalar(&["server", "host"], 7i32, &l), 7);
        assert_eq!(root.read_scalar(&["server", "debug"], 5i32, &l), 5);
        assert_eq!(root.read_scalar(&["server", "nope"], 5i32, &l), 5);
        assert_eq!(root.read_scalar(&["server"], 5i32, &l), 5);
        assert_eq!(
            root.read_scalar(&["server", "host"], String::new(), &l),
            "example.org"
        );
    }

    #[test]
    fn test_try_read_scalar() {
        let root = parse(DOC).unwrap();
        let l = Locale::INVARIANT;
        assert_eq!(root.try_read_scalar::<u16>(&["server", "port"], &l), Ok(Some(8080)));
        assert_eq!(root.try_read_scalar::<u16>(&["server", "debug"], &l), Ok(None));
        assert!(root.try_read_scalar::<u16>(&["nope"], &l).is_err());
    }

    #[test]
    fn test_read_range() {
        let root = parse(DOC).unwrap();
        let ports: Vec<u16> = root.read_range(&["ports"], &Locale::INVARIANT).unwrap();
        assert_eq!(ports, vec![80, 443]);
        let values = root.read_entities(&["server"], EntityKind::Value).unwrap();
        assert_eq!(values.len(), 4);
        assert!(root.read_entities(&["server"], EntityKind::Object).unwrap().is_empty());
        assert_eq!(
            root.read_entities(&["server", "host"], EntityKind::Value).unwrap_err(),
            ReadError::NotAContainer("host".into())
        );
    }

    #[test]
    fn test_write_into_object() {
        let mut root = parse(DOC).unwrap();
        let format = ScalarFormat::default().with_precision(1);
        root.write(&["server"], "port", Written::Scalar(&9090), &format, &Locale::INVARIANT)
            .unwrap();
        root.write_text(&["server"], "name", "").unwrap();
        root.write(
            &["server"],
            "on",
            Written::Bool(true),
            &ScalarFormat::default(),
            &Locale::INVARIANT,
        )
        .unwrap();
        let server = root.resolve_object(&["server"]).unwrap();
        let keys: Vec<&str> = server.children.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["host", "port", "ratio", "debug", "name", "on"]);
        assert_eq!(root.resolve(&["server", "port"]).unwrap().raw(), Some("9090.0"));
        assert_eq!(root.resolve(&["server", "name"]).unwrap().raw(), Some("~"));
        assert_eq!(root.resolve(&["server", "on"]).unwrap().raw(), Some("true"));
    }

    #[test]
    fn test_write_into_collection() {
        let mut root = parse(DOC).unwrap();
        root.write_text(&["ports"], "", "443").unwrap();
        root.write_text(&["ports"], "", "8443").unwrap();
        let ports = root.resolve_collection(&["ports"]).unwrap();
        assert_eq!(ports.items.len(), 5);
        assert_eq!(ports.items[4].key(), KEYLESS);
    }

    #[test]
    fn test_write_errors() {
        let mut root = parse(DOC).unwrap();
        assert!(matches!(
            root.write_text(&["server", "host"], "x", "1"),
            Err(Error::Read(ReadError::NotAContainer(_)))
        ));
        assert!(matches!(
            root.write_text(&["absent"], "x", "1"),
            Err(Error::Read(ReadError::KeyNotFound(_)))
        ));
    }

    #[test]
    fn test_write_node_shares_subtree() {
        let source = parse(DOC).unwrap();
        let server = source.as_object().unwrap().children["server"].clone();
        let mut root = Entity::object(ROOT);
        root.write_node(&[], "server", server.clone()).unwrap();
        let stored = &root.as_object().unwrap().children["server"];
        assert!(Arc::ptr_eq(stored, &server));

        root.write_node(&[], "backup", server.clone()).unwrap();
        assert_eq!(root.resolve(&["backup"]).unwrap().key(), "backup");
        assert_eq!(server.key(), "server");
    }

    #[test]
    fn test_write_through_shared_path_copies() {
        let source = parse(DOC).unwrap();
        let mut copy = source.clone();
        copy.write_text(&["server"], "host", "changed").unwrap();
        assert_eq!(source.resolve(&["server", "host"]).unwrap().raw(), Some("example.org"));
        assert_eq!(copy.resolve(&["server", "host"]).unwrap().raw(), Some("changed"));
    }

    #[test]
    fn test_children_and_accessors() {
        let root = parse(DOC).unwrap();
        let keys: Vec<&str> = root.children().map(Entity::key).collect();
        assert_eq!(keys, vec!["server", "ports"]);
        assert_eq!(root.get("ports").map(Entity::kind), Some(EntityKind::Collection));
        assert_eq!(root.get("ports").and_then(|p| p.get("0")).and_then(Entity::raw), Some("80"));
        assert!(root.get("server").unwrap().get("debug").unwrap().is_empty());
        assert_eq!(EntityKind::Object.to_string(), "object");
    }
}
