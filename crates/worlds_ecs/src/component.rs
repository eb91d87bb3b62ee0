//! Core [`Component`] trait and associated metadata.
//!
//! A component is plain serde data with an optional set of lifecycle hooks.
//! Hooks receive the [`Registry`] so they can reach other components and the
//! engine. While a hook runs, its own instance is detached from storage, so
//! `has_component::<Self>(entity)` reports `false` for the duration.

use serde::Serialize;
use serde::de::DeserializeOwned;
use worlds_math::Vec3;

use crate::entity::Entity;
use crate::registry::Registry;
use crate::storage::{ComponentStorage, ErasedStorage};

/// A stable identifier for a component type, derived from its fully-qualified
/// name using FNV-1a 64-bit.
///
/// The id depends only on the name, so a type keeps its identity across code
/// reloads as long as its name is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    /// FNV-1a 64-bit offset basis.
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    /// FNV-1a 64-bit prime.
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Compute the id for a component name.
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// Compute the id for a Rust component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self::from_name(T::type_name())
    }
}

/// Contact reported by the physics engine to a collision handler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactInfo {
    /// The entity on the other side of the contact.
    pub other_entity: Entity,
    /// Contact normal pointing away from the other entity.
    pub normal: Vec3,
    /// Mean of all contact points, world space.
    pub average_contact_point: Vec3,
    /// Magnitude of the relative velocity at impact.
    pub relative_speed: f32,
}

/// A locally stored component.
///
/// # Examples
///
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use worlds_ecs::Component;
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// #[serde(default)]
/// struct Ammo {
///     count: u32,
/// }
///
/// impl Component for Ammo {
///     const HOTLOAD: bool = true;
///
///     fn type_name() -> &'static str {
///         "game::Ammo"
///     }
/// }
/// ```
pub trait Component: Default + Serialize + DeserializeOwned + 'static {
    /// Survives code reloads by being encoded and restored.
    const HOTLOAD: bool = false;

    /// [`Component::start`] is called when the component becomes live.
    const START_LISTENER: bool = false;

    /// [`Component::think`] is called once per simulation tick.
    const THINKING: bool = false;

    /// [`Component::on_collision`] is called for every physics contact.
    const COLLISION_HANDLER: bool = false;

    /// Fully-qualified type name. Keys pool assignment and persisted data.
    fn type_name() -> &'static str;

    /// Called after the component is added, or at scene start for components
    /// restored from persisted data.
    fn start(&mut self, _entity: Entity, _registry: &mut Registry) {}

    /// Per-tick update.
    fn think(&mut self, _entity: Entity, _registry: &mut Registry) {}

    /// Physics contact involving `entity`.
    fn on_collision(&mut self, _entity: Entity, _contact: &ContactInfo, _registry: &mut Registry) {}
}

/// Type-erased operations for one component type.
///
/// Built from a concrete type with [`ComponentVTable::of`]; lets the registry
/// create storage and dispatch hooks for a type it only knows by name.
#[derive(Clone, Copy)]
pub struct ComponentVTable {
    /// Fully-qualified type name.
    pub name: &'static str,
    /// Stable type id.
    pub type_id: ComponentTypeId,
    /// See [`Component::HOTLOAD`].
    pub hotload: bool,
    /// See [`Component::START_LISTENER`].
    pub start_listener: bool,
    /// See [`Component::THINKING`].
    pub thinking: bool,
    /// See [`Component::COLLISION_HANDLER`].
    pub collision_handler: bool,
    /// Create an empty storage for the type.
    pub new_storage: fn(hotload: bool) -> Box<dyn ErasedStorage>,
    /// Create a default instance.
    pub new_boxed: fn() -> Box<dyn std::any::Any>,
    /// Run the start hook for one entity.
    pub start: fn(&mut Registry, Entity),
    /// Run the think hook for one entity.
    pub think: fn(&mut Registry, Entity),
    /// Run the collision hook for one entity.
    pub collide: fn(&mut Registry, Entity, &ContactInfo),
}

impl ComponentVTable {
    /// Build the vtable for `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self {
            name: T::type_name(),
            type_id: ComponentTypeId::of::<T>(),
            hotload: T::HOTLOAD,
            start_listener: T::START_LISTENER,
            thinking: T::THINKING,
            collision_handler: T::COLLISION_HANDLER,
            new_storage: |hotload| Box::new(ComponentStorage::<T>::new(hotload)),
            new_boxed: || Box::new(T::default()),
            start: |registry, entity| {
                registry.run_detached::<T>(entity, |component, entity, registry| {
                    component.start(entity, registry);
                });
            },
            think: |registry, entity| {
                registry.run_detached::<T>(entity, |component, entity, registry| {
                    component.think(entity, registry);
                });
            },
            collide: |registry, entity, contact| {
                registry.run_detached::<T>(entity, |component, entity, registry| {
                    component.on_collision(entity, contact, registry);
                });
            },
        }
    }
}

impl std::fmt::Debug for ComponentVTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentVTable")
            .field("name", &self.name)
            .field("hotload", &self.hotload)
            .field("start_listener", &self.start_listener)
            .field("thinking", &self.thinking)
            .field("collision_handler", &self.collision_handler)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Health {
        current: f32,
    }

    impl Component for Health {
        fn type_name() -> &'static str {
            "test::Health"
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Brain;

    impl Component for Brain {
        const THINKING: bool = true;
        const HOTLOAD: bool = true;

        fn type_name() -> &'static str {
            "test::Brain"
        }
    }

    #[test]
    fn test_component_type_id_matches_from_name() {
        assert_eq!(
            ComponentTypeId::of::<Health>(),
            ComponentTypeId::from_name("test::Health")
        );
        assert_ne!(ComponentTypeId::of::<Health>(), ComponentTypeId::of::<Brain>());
    }

    #[test]
    fn test_fnv1a_known_vector() {
        assert_eq!(
            ComponentTypeId::from_name(""),
            ComponentTypeId(0xcbf2_9ce4_8422_2325)
        );
    }

    #[test]
    fn test_vtable_flags() {
        let plain = ComponentVTable::of::<Health>();
        assert_eq!(plain.name, "test::Health");
        assert!(!plain.thinking && !plain.hotload && !plain.start_listener);

        let brain = ComponentVTable::of::<Brain>();
        assert!(brain.thinking);
        assert!(brain.hotload);
        assert!(!brain.collision_handler);
    }

    #[test]
    fn test_vtable_builds_matching_storage() {
        let vtable = ComponentVTable::of::<Brain>();
        let storage = (vtable.new_storage)(true);
        assert_eq!(storage.type_name(), "test::Brain");
        assert!(storage.is_hotload());
        assert!((vtable.new_boxed)().is::<Brain>());
    }
}
