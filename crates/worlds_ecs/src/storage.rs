//! Per-type component storage.
//!
//! [`ComponentStorage<T>`] keeps instances densely packed with a sparse
//! entity → index map in front. Removal swaps the last instance into the
//! hole, so iteration order is not stable across removals.
//!
//! [`ErasedStorage`] is the object-safe view the registry uses when it only
//! knows a type by name: boxed access, membership and hotload encoding.

use std::any::Any;
use std::collections::HashMap;

use crate::codec::{CodecError, HotloadCodec};
use crate::component::Component;
use crate::entity::Entity;

/// Dense storage for one component type.
#[derive(Debug)]
pub struct ComponentStorage<T> {
    hotload: bool,
    sparse: HashMap<Entity, usize>,
    entities: Vec<Entity>,
    components: Vec<T>,
}

impl<T: Component> ComponentStorage<T> {
    /// Create an empty storage. `hotload` marks it for persistence across
    /// code reloads.
    #[must_use]
    pub fn new(hotload: bool) -> Self {
        Self {
            hotload,
            sparse: HashMap::new(),
            entities: Vec::new(),
            components: Vec::new(),
        }
    }

    /// Returns `true` if `entity` has an instance here.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.sparse.contains_key(&entity)
    }

    /// Insert or replace the instance for `entity`.
    pub fn set(&mut self, entity: Entity, component: T) -> &mut T {
        let index = match self.sparse.get(&entity) {
            Some(&index) => {
                self.components[index] = component;
                index
            }
            None => {
                let index = self.components.len();
                self.sparse.insert(entity, index);
                self.entities.push(entity);
                self.components.push(component);
                index
            }
        };
        &mut self.components[index]
    }

    /// Returns the instance for `entity`.
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.sparse.get(&entity).map(|&index| &self.components[index])
    }

    /// Returns the instance for `entity` mutably.
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.sparse
            .get(&entity)
            .map(|&index| &mut self.components[index])
    }

    /// Remove and return the instance for `entity`.
    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let index = self.sparse.remove(&entity)?;
        self.entities.swap_remove(index);
        let component = self.components.swap_remove(index);
        if let Some(&moved) = self.entities.get(index) {
            self.sparse.insert(moved, index);
        }
        Some(component)
    }

    /// Number of stored instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Entities with an instance, in storage order.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Iterate `(entity, component)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.entities.iter().copied().zip(self.components.iter())
    }

    /// Iterate `(entity, component)` pairs mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.entities.iter().copied().zip(self.components.iter_mut())
    }
}

impl<'a, T: Component> IntoIterator for &'a ComponentStorage<T> {
    type Item = (Entity, &'a T);
    type IntoIter = std::iter::Zip<
        std::iter::Copied<std::slice::Iter<'a, Entity>>,
        std::slice::Iter<'a, T>,
    >;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.iter().copied().zip(self.components.iter())
    }
}

/// Type-erased access to a [`ComponentStorage`].
pub trait ErasedStorage: Any {
    /// Fully-qualified name of the stored type.
    fn type_name(&self) -> &'static str;

    /// Whether the storage persists across code reloads.
    fn is_hotload(&self) -> bool;

    /// Returns `true` if `entity` has an instance here.
    fn contains(&self, entity: Entity) -> bool;

    /// Drop the instance for `entity`. Returns `true` if one existed.
    fn remove(&mut self, entity: Entity) -> bool;

    /// Number of stored instances.
    fn len(&self) -> usize;

    /// Returns `true` if nothing is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entities with an instance, in storage order.
    fn entities(&self) -> &[Entity];

    /// Borrow the instance for `entity` as `dyn Any`.
    fn get_boxed(&self, entity: Entity) -> Option<&dyn Any>;

    /// Mutably borrow the instance for `entity` as `dyn Any`.
    fn get_boxed_mut(&mut self, entity: Entity) -> Option<&mut dyn Any>;

    /// Insert or replace from a boxed value.
    ///
    /// # Errors
    ///
    /// Hands the value back if it is not of the stored type.
    fn set_boxed(&mut self, entity: Entity, value: Box<dyn Any>) -> Result<(), Box<dyn Any>>;

    /// Encode the instance for `entity`, or `None` if it has none.
    fn encode(&self, entity: Entity, codec: HotloadCodec) -> Option<Result<Vec<u8>, CodecError>>;

    /// Decode `bytes` and store the result for `entity`, replacing any
    /// existing instance.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if `bytes` is not a valid record for the type.
    fn decode_into(
        &mut self,
        entity: Entity,
        bytes: &[u8],
        codec: HotloadCodec,
    ) -> Result<(), CodecError>;

    /// Upcast for downcasting to the concrete storage.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete storage.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedStorage for ComponentStorage<T> {
    fn type_name(&self) -> &'static str {
        T::type_name()
    }

    fn is_hotload(&self) -> bool {
        self.hotload
    }

    fn contains(&self, entity: Entity) -> bool {
        ComponentStorage::contains(self, entity)
    }

    fn remove(&mut self, entity: Entity) -> bool {
        ComponentStorage::remove(self, entity).is_some()
    }

    fn len(&self) -> usize {
        ComponentStorage::len(self)
    }

    fn entities(&self) -> &[Entity] {
        ComponentStorage::entities(self)
    }

    fn get_boxed(&self, entity: Entity) -> Option<&dyn Any> {
        self.get(entity).map(|c| c as &dyn Any)
    }

    fn get_boxed_mut(&mut self, entity: Entity) -> Option<&mut dyn Any> {
        self.get_mut(entity).map(|c| c as &mut dyn Any)
    }

    fn set_boxed(&mut self, entity: Entity, value: Box<dyn Any>) -> Result<(), Box<dyn Any>> {
        let component = value.downcast::<T>()?;
        self.set(entity, *component);
        Ok(())
    }

    fn encode(&self, entity: Entity, codec: HotloadCodec) -> Option<Result<Vec<u8>, CodecError>> {
        self.get(entity).map(|c| codec.encode(c))
    }

    fn decode_into(
        &mut self,
        entity: Entity,
        bytes: &[u8],
        codec: HotloadCodec,
    ) -> Result<(), CodecError> {
        let component: T = codec.decode(bytes)?;
        self.set(entity, component);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
