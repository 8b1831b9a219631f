//! YAML transcoding: convert between tyml entities and YAML text.
//!
//! Mapping from YAML to tyml:
//!   - YAML null          -> Value `~`
//!   - YAML bool/number   -> Value holding its YAML spelling
//!   - YAML string        -> Value
//!   - YAML sequence      -> Collection of keyless items
//!   - YAML mapping       -> Object
//!   - tagged node        -> its untagged content
//!
//! Mapping from tyml to YAML:
//!   - null Value         -> YAML null
//!   - Value              -> YAML string
//!   - Collection         -> YAML sequence
//!   - Object             -> YAML mapping
//!
//! A top-level sequence is held under the keyless child of the root and is
//! written back as a bare YAML sequence.

use std::sync::Arc;

use libtyml::{CollectionEntity, Entity, ObjectEntity, KEYLESS, ROOT};

/// Decode a YAML string into a tyml root entity.
pub fn decode(input: &str) -> Result<Entity, String> {
    let yaml_value: serde_yaml::Value =
        serde_yaml::from_str(input).map_err(|e| format!("YAML parse error: {}", e))?;
    match yaml_to_entity(ROOT, &yaml_value)? {
        Entity::Value(v) if v.is_null() => Ok(Entity::object(ROOT)),
        root @ Entity::Object(_) => Ok(root),
        Entity::Collection(mut c) => {
            c.key = KEYLESS.to_string();
            let mut root = Entity::object(ROOT);
            root.write_node(&[], KEYLESS, Arc::new(Entity::Collection(c)))
                .map_err(|e| e.to_string())?;
            Ok(root)
        }
        Entity::Value(_) => Err("A tyml document must be a mapping or a sequence".to_string()),
    }
}

/// Encode a tyml entity as a YAML string.
pub fn encode(entity: &Entity) -> Result<String, String> {
    let yaml_value = match entity.as_object() {
        Some(root) if root.key == ROOT && root.children.len() == 1 => {
            match root.children.get(KEYLESS) {
                Some(only) => entity_to_yaml(only),
                None => entity_to_yaml(entity),
            }
        }
        _ => entity_to_yaml(entity),
    };
    serde_yaml::to_string(&yaml_value).map_err(|e| format!("YAML encode error: {}", e))
}

fn yaml_to_entity(key: &str, yaml: &serde_yaml::Value) -> Result<Entity, String> {
    match yaml {
        serde_yaml::Value::Null => Ok(Entity::value(key, "~")),
        serde_yaml::Value::Bool(b) => Ok(Entity::value(key, b.to_string())),
        serde_yaml::Value::Number(n) => Ok(Entity::value(key, n.to_string())),
        serde_yaml::Value::String(s) => Ok(Entity::value(key, s.clone())),
        serde_yaml::Value::Sequence(seq) => {
            let items = seq
                .iter()
                .map(|item| yaml_to_entity(KEYLESS, item).map(Arc::new))
                .collect::<Result<Vec<_>, String>>()?;
            Ok(Entity::Collection(CollectionEntity {
                key: key.to_string(),
                items,
            }))
        }
        serde_yaml::Value::Mapping(map) => {
            let mut object = ObjectEntity {
                key: key.to_string(),
                children: Default::default(),
            };
            for (k, v) in map {
                let child_key = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    serde_yaml::Value::Null => "null".to_string(),
                    _ => return Err(format!("Unsupported YAML mapping key type: {:?}", k)),
                };
                if child_key.is_empty() {
                    return Err(format!("Empty YAML mapping key under '{}'", key));
                }
                let child = yaml_to_entity(&child_key, v)?;
                object.children.insert(child_key, Arc::new(child));
            }
            Ok(Entity::Object(object))
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_entity(key, &tagged.value),
    }
}

fn entity_to_yaml(entity: &Entity) -> serde_yaml::Value {
    match entity {
        Entity::Value(v) if v.is_null() => serde_yaml::Value::Null,
        Entity::Value(v) => serde_yaml::Value::String(v.raw.clone()),
        Entity::Collection(c) => {
            serde_yaml::Value::Sequence(c.items.iter().map(|item| entity_to_yaml(item)).collect())
        }
        Entity::Object(o) => {
            let mut map = serde_yaml::Mapping::new();
            for (key, child) in &o.children {
                map.insert(serde_yaml::Value::String(key.clone()), entity_to_yaml(child));
            }
            serde_yaml::Value::Mapping(map)
        }
    }
}
