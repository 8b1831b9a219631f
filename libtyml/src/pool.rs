//! Reusable scratch builders for the parser.
//!
//! A [`BuilderPool`] lives for one parse call. The parser rents a builder
//! for each object or collection it opens; the [`Pooled`] guard resets the
//! builder and hands it back when it goes out of scope, so early returns
//! through `?` return builders as reliably as the success path.

use crate::value::{CollectionEntity, Entity, ObjectEntity};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Builders that can be rented from a [`BuilderPool`].
pub(crate) trait Poolable: Default {
    /// Clear all state before the builder is returned.
    fn reset(&mut self);

    /// The pool's free list for this builder type.
    fn slot(pool: &BuilderPool) -> &RefCell<Vec<Self>>;
}

#[derive(Default)]
pub(crate) struct BuilderPool {
    objects: RefCell<Vec<ObjectBuilder>>,
    collections: RefCell<Vec<CollectionBuilder>>,
}

impl BuilderPool {
    pub(crate) fn rent<T: Poolable>(&self) -> Pooled<'_, T> {
        let item = T::slot(self).borrow_mut().pop().unwrap_or_default();
        Pooled { pool: self, item }
    }

    /// Number of builders waiting to be rented.
    #[cfg(test)]
    pub(crate) fn idle<T: Poolable>(&self) -> usize {
        T::slot(self).borrow().len()
    }
}

/// A rented builder. Returns itself to the pool on drop.
pub(crate) struct Pooled<'p, T: Poolable> {
    pool: &'p BuilderPool,
    item: T,
}

impl<T: Poolable> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

impl<T: Poolable> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.item
    }
}

impl<T: Poolable> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        let mut item = mem::take(&mut self.item);
        item.reset();
        T::slot(self.pool).borrow_mut().push(item);
    }
}

// ============================================================================
// Builders
// ============================================================================

#[derive(Default)]
pub(crate) struct ObjectBuilder {
    key: String,
    children: IndexMap<String, Arc<Entity>>,
}

impl ObjectBuilder {
    pub(crate) fn begin(&mut self, key: &str) {
        self.key.push_str(key);
    }

    /// Insert a child under its own key. A repeated key replaces the
    /// earlier child in place.
    pub(crate) fn insert(&mut self, entity: Entity) {
        self.children
            .insert(entity.key().to_string(), Arc::new(entity));
    }

    /// Move the collected children out into an immutable object.
    pub(crate) fn finish(&mut self) -> Entity {
        Entity::Object(ObjectEntity {
            key: mem::take(&mut self.key),
            children: mem::take(&mut self.children),
        })
    }
}

impl Poolable for ObjectBuilder {
    fn reset(&mut self) {
        self.key.clear();
        self.children.clear();
    }

    fn slot(pool: &BuilderPool) -> &RefCell<Vec<Self>> {
        &pool.objects
    }
}

#[derive(Default)]
pub(crate) struct CollectionBuilder {
    key: String,
    items: Vec<Arc<Entity>>,
}

impl CollectionBuilder {
    pub(crate) fn begin(&mut self, key: &str) {
        self.key.push_str(key);
    }

    pub(crate) fn push(&mut self, entity: Entity) {
        self.items.push(Arc::new(entity));
    }

    /// Move the collected items out into an immutable collection.
    pub(crate) fn finish(&mut self) -> Entity {
        Entity::Collection(CollectionEntity {
            key: mem::take(&mut self.key),
            items: mem::take(&mut self.items),
        })
    }
}

impl Poolable for CollectionBuilder {
    fn reset(&mut self) {
        self.key.clear();
        self.items.clear();
    }

    fn slot(pool: &BuilderPool) -> &RefCell<Vec<Self>> {
        &pool.collections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::KEYLESS;

    #[test]
    fn test_rent_and_return() {
        let pool = BuilderPool::default();
        {
            let _a = pool.rent::<ObjectBuilder>();
            let _b = pool.rent::<ObjectBuilder>();
            assert_eq!(pool.idle::<ObjectBuilder>(), 0);
        }
        assert_eq!(pool.idle::<ObjectBuilder>(), 2);
        let _c = pool.rent::<ObjectBuilder>();
        assert_eq!(pool.idle::<ObjectBuilder>(), 1);
        assert_eq!(pool.idle::<CollectionBuilder>(), 0);
    }

    #[test]
    fn test_returned_builder_is_clean() {
        let pool = BuilderPool::default();
        {
            let mut builder = pool.rent::<ObjectBuilder>();
            builder.begin("stale");
            builder.insert(Entity::value("a", "1"));
        }
        let mut builder = pool.rent::<ObjectBuilder>();
        builder.begin("fresh");
        match builder.finish() {
            Entity::Object(object) => {
                assert_eq!(object.key, "fresh");
                assert!(object.children.is_empty());
            }
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_finish_moves_items_out() {
        let pool = BuilderPool::default();
        let mut builder = pool.rent::<CollectionBuilder>();
        builder.begin(KEYLESS);
        builder.push(Entity::value(KEYLESS, "x"));
        let first = builder.finish();
        let second = builder.finish();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 0);
        assert_eq!(second.key(), "");
    }

    #[test]
    fn test_returned_on_error_path() {
        fn fails(pool: &BuilderPool) -> Result<(), &'static str> {
            let mut builder = pool.rent::<CollectionBuilder>();
            builder.push(Entity::value(KEYLESS, "x"));
            "x".parse::<u8>().map_err(|_| "boom")?;
            Ok(())
        }
        let pool = BuilderPool::default();
        assert!(fails(&pool).is_err());
        assert_eq!(pool.idle::<CollectionBuilder>(), 1);
    }

    #[test]
    fn test_duplicate_key_replaces() {
        let pool = BuilderPool::default();
        let mut builder = pool.rent::<ObjectBuilder>();
        builder.insert(Entity::value("a", "1"));
        builder.insert(Entity::value("b", "2"));
        builder.insert(Entity::value("a", "3"));
        let object = builder.finish();
        assert_eq!(object.len(), 2);
        assert_eq!(object.resolve(&["a"]).unwrap(), &Entity::value("a", "3"));
    }
}
