//! Component type → pool index assignment.
//!
//! Each distinct component type name receives the next free pool index the
//! first time it is seen. Indices are never reused or reassigned, so storage
//! looked up by index stays valid across code reloads as long as the type
//! name is unchanged.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::component::ComponentTypeId;
use crate::error::RegistryError;

/// Assigns stable pool indices to component type names.
#[derive(Debug)]
pub struct TypeSlots {
    slots: DashMap<ComponentTypeId, usize>,
    names: DashMap<usize, String>,
    next: AtomicUsize,
    capacity: usize,
}

impl TypeSlots {
    /// Create an empty table with room for `capacity` types.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: DashMap::new(),
            names: DashMap::new(),
            next: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Returns the pool index for `name`, assigning the next free index on
    /// first use.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::OutOfPools`] if every pool is already taken.
    pub fn index_of(&self, name: &str) -> Result<usize, RegistryError> {
        match self.slots.entry(ComponentTypeId::from_name(name)) {
            Entry::Occupied(entry) => Ok(*entry.get()),
            Entry::Vacant(entry) => {
                let capacity = self.capacity;
                let index = self
                    .next
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                        (n < capacity).then_some(n + 1)
                    })
                    .map_err(|index| RegistryError::OutOfPools {
                        component: name.to_string(),
                        index,
                        capacity,
                    })?;
                entry.insert(index);
                self.names.insert(index, name.to_string());
                Ok(index)
            }
        }
    }

    /// Returns the pool index for `name` without assigning one.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<usize> {
        self.slots
            .get(&ComponentTypeId::from_name(name))
            .map(|index| *index)
    }

    /// Returns the type name that owns `index`.
    #[must_use]
    pub fn name_of(&self, index: usize) -> Option<String> {
        self.names.get(&index).map(|name| name.clone())
    }

    /// Number of assigned indices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.next.load(Ordering::SeqCst)
    }

    /// Returns `true` if no type has been assigned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of assignable indices.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
