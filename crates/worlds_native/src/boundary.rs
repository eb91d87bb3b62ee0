//! Outbound calls into the native engine.
//!
//! Entity ids cross the boundary as raw `u32`s. The engine allocates them and
//! may invalidate them at any time; callers check [`NativeRegistry::valid`]
//! before trusting an id they have held across a tick.

use std::any::Any;

use serde::{Deserialize, Serialize};
use worlds_math::{Transform, Vec3};

use crate::persist::PersistedComponent;

/// Raw entity identifier as understood by the native engine.
pub type EntityId = u32;

/// The null entity id (all bits set).
pub const NULL_ENTITY_ID: EntityId = u32::MAX;

/// Returned by [`NativeRegistry::entity_name_length`] when the entity has no name.
pub const NO_NAME: u32 = u32::MAX;

/// Identifier of an asset known to the native asset database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AssetId(pub u32);

impl AssetId {
    /// FNV-1a 32-bit offset basis.
    const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;

    /// FNV-1a 32-bit prime.
    const FNV_PRIME: u32 = 0x0100_0193;

    /// Derive the asset id for a path. Ids are stable across runs.
    #[must_use]
    pub const fn from_path(path: &str) -> Self {
        let bytes = path.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u32;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }
}

/// Component kinds whose storage lives in the native engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinKind {
    /// Renderable mesh reference.
    WorldObject,
    /// Simulated rigid body.
    DynamicPhysicsActor,
}

/// How a force passed to [`NativeRegistry::add_force`] is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ForceMode {
    /// Continuous force, scaled by mass and integrated over the step.
    #[default]
    Force,
    /// Continuous acceleration, integrated over the step regardless of mass.
    Acceleration,
    /// Instant change of momentum.
    Impulse,
    /// Instant change of velocity regardless of mass.
    VelocityChange,
}

/// Snapshot of a dynamic physics actor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsActorState {
    /// World-space pose of the body.
    pub pose: Transform,
    /// Linear velocity in world units per second.
    pub velocity: Vec3,
    /// Angular velocity in radians per second.
    pub angular_velocity: Vec3,
    /// Mass in kilograms.
    pub mass: f32,
}

impl Default for PhysicsActorState {
    fn default() -> Self {
        Self {
            pose: Transform::IDENTITY,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            mass: 1.0,
        }
    }
}

/// Result of a successful [`NativeRegistry::raycast`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    /// Entity that was hit, or [`NULL_ENTITY_ID`] for static world geometry.
    pub entity: EntityId,
    /// World-space hit position.
    pub world_hit_pos: Vec3,
    /// Surface normal at the hit.
    pub normal: Vec3,
    /// Distance from the ray origin.
    pub distance: f32,
}

/// Every call the scripting layer makes into the native engine.
///
/// The trait is object safe; the registry holds it as
/// `Box<dyn NativeRegistry>` so the transport (FFI, in-process, recorded) is
/// interchangeable.
pub trait NativeRegistry {
    /// Allocate a new entity with a default transform.
    fn create(&mut self) -> EntityId;

    /// Destroy an entity. The engine queues a destroy notification that the
    /// scripting layer collects through [`NativeRegistry::take_destroyed`].
    fn destroy(&mut self, id: EntityId);

    /// Returns `true` if `id` refers to a live entity.
    fn valid(&self, id: EntityId) -> bool;

    /// Copy the entity's transform out of the engine.
    fn transform(&self, id: EntityId) -> Transform;

    /// Overwrite the entity's transform.
    fn set_transform(&mut self, id: EntityId, transform: &Transform);

    /// Invoke `callback` once for every live entity.
    fn each(&self, callback: &mut dyn FnMut(EntityId));

    /// Byte length of the entity's name, or [`NO_NAME`].
    fn entity_name_length(&self, id: EntityId) -> u32;

    /// Write the entity's name into `buffer`. Leaves it untouched if unnamed.
    fn entity_name(&self, id: EntityId, buffer: &mut String);

    /// Set or clear the entity's name.
    fn set_entity_name(&mut self, id: EntityId, name: Option<&str>);

    /// Instantiate a prefab asset. Returns [`NULL_ENTITY_ID`] if the asset is unknown.
    fn create_prefab(&mut self, asset: AssetId) -> EntityId;

    /// Resolve an asset path to its id.
    fn asset_id(&self, path: &str) -> AssetId;

    /// Store one encoded component for `id` in the engine's persistence context.
    fn set_serialized_entity_info(&mut self, id: EntityId, key: &str, value: &[u8]);

    /// Hand back everything stored with [`NativeRegistry::set_serialized_entity_info`]
    /// and clear the context.
    fn take_serialized_entity_info(&mut self) -> Vec<PersistedComponent>;

    /// Drain destroy notifications queued since the last call.
    fn take_destroyed(&mut self) -> Vec<EntityId>;

    /// Returns `true` if the entity carries the builtin component.
    fn has_builtin(&self, kind: BuiltinKind, id: EntityId) -> bool;

    /// Attach a default-initialised builtin component.
    fn emplace_builtin(&mut self, kind: BuiltinKind, id: EntityId);

    /// Detach a builtin component.
    fn remove_builtin(&mut self, kind: BuiltinKind, id: EntityId);

    /// Read the physics actor state of an entity.
    fn physics_actor(&self, id: EntityId) -> PhysicsActorState;

    /// Overwrite the physics actor state of an entity.
    fn set_physics_actor(&mut self, id: EntityId, state: &PhysicsActorState);

    /// Apply a linear force to a physics actor.
    fn add_force(&mut self, id: EntityId, force: Vec3, mode: ForceMode);

    /// Apply a torque to a physics actor.
    fn add_torque(&mut self, id: EntityId, torque: Vec3, mode: ForceMode);

    /// Mesh asset rendered by a world object.
    fn world_object_mesh(&self, id: EntityId) -> AssetId;

    /// Change the mesh asset rendered by a world object.
    fn set_world_object_mesh(&mut self, id: EntityId, mesh: AssetId);

    /// Cast a ray against the physics scene.
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RaycastHit>;

    /// Position of the main camera.
    fn camera_position(&self) -> Vec3;

    /// Upcast so hosts can reach their concrete engine type.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast so hosts can reach their concrete engine type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
