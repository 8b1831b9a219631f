//! Hooks for mapping Rust types to and from entity trees.

use crate::error::Result;
use crate::scalar::{Locale, ScalarFormat};
use crate::value::{Entity, Written, KEYLESS, ROOT};

/// A type that can write itself into an object.
pub trait ToEntity {
    /// Populate `writer`, a fresh object, with this value's fields.
    fn to_entity(&self, writer: &mut Entity) -> Result<()>;
}

/// A type that can read itself from a parsed tree.
pub trait FromEntity {
    fn from_entity(&mut self, reader: &Entity) -> Result<()>;
}

/// Parse `input` and map its root object onto a default `T`.
pub fn deserialize<T: FromEntity + Default>(input: &str) -> Result<T> {
    let root = crate::parse(input)?;
    let mut value = T::default();
    value.from_entity(&root)?;
    Ok(value)
}

/// Serialize `value` as the object under `key`.
///
/// An empty key, [`ROOT`] or [`KEYLESS`] writes the fields at the top level.
pub fn serialize_as<T: ToEntity>(value: &T, key: &str) -> Result<String> {
    let mut root = Entity::object(ROOT);
    if key.is_empty() || key == ROOT || key == KEYLESS {
        value.to_entity(&mut root)?;
    } else {
        root.write(
            &[],
            key,
            Written::Mapped(value),
            &ScalarFormat::default(),
            &Locale::INVARIANT,
        )?;
    }
    Ok(crate::encode::serialize(&root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Debug, Default, PartialEq)]
    struct Service {
        name: String,
        port: u16,
        weight: f64,
        enabled: bool,
        tags: Vec<String>,
    }

    impl ToEntity for Service {
        fn to_entity(&self, writer: &mut Entity) -> Result<()> {
            let l = Locale::INVARIANT;
            writer.write_text(&[], "name", &self.name)?;
            writer.write_scalar(&[], "port", &self.port, &l)?;
            writer.write_scalar(&[], "weight", &self.weight, &l)?;
            writer.write_scalar(&[], "enabled", &self.enabled, &l)?;
            writer.write_node(&[], "tags", Arc::new(Entity::collection("tags")))?;
            for tag in &self.tags {
                writer.write_text(&["tags"], "", tag)?;
            }
            Ok(())
        }
    }

    impl FromEntity for Service {
        fn from_entity(&mut self, reader: &Entity) -> Result<()> {
            let l = Locale::INVARIANT;
            self.name = reader.read_scalar(&["name"], String::new(), &l);
            self.port = reader.read_scalar(&["port"], 0, &l);
            self.weight = reader.read_scalar(&["weight"], 0.0, &l);
            self.enabled = reader.read_scalar(&["enabled"], false, &l);
            self.tags = reader.read_range(&["tags"], &l)?;
            Ok(())
        }
    }

    fn service() -> Service {
        Service {
            name: "billing".into(),
            port: 8443,
            weight: 0.5,
            enabled: true,
            tags: vec!["blue".into(), "eu-west".into()],
        }
    }

    #[test]
    fn test_round_trip_at_root() {
        let text = serialize_as(&service(), "").unwrap();
        assert_eq!(
            text,
            "name: billing\nport: 8443\nweight: 0.5\nenabled: true\ntags:\n  - blue\n  - 'eu-west'\n"
        );
        let back: Service = deserialize(&text).unwrap();
        assert_eq!(back, service());
    }

    #[test]
    fn test_serialize_under_key() {
        let text = serialize_as(&service(), "billing").unwrap();
        assert!(text.starts_with("billing:\n  name: billing\n"));
        let root = crate::parse(&text).unwrap();
        let mut back = Service::default();
        back.from_entity(root.resolve(&["billing"]).unwrap()).unwrap();
        assert_eq!(back, service());
    }

    #[test]
    fn test_missing_fields_fall_back() {
        let back: Service = deserialize("name: solo\ntags: []\n").unwrap();
        assert_eq!(back.name, "solo");
        assert_eq!(back.port, 0);
        assert!(back.tags.is_empty());
    }
}
