//! Native-backed components.
//!
//! A builtin component has no storage on this side. Every access builds a
//! fresh view over `(native engine, entity)`; nothing is cached, so a view
//! always reflects the engine's current state and cannot outlive the borrow
//! of the engine it was made from.

use worlds_math::{Transform, Vec3};
use worlds_native::{AssetId, BuiltinKind, ForceMode, NativeRegistry, PhysicsActorState};

use crate::entity::Entity;

/// A component whose data lives in the native engine.
pub trait BuiltinComponent: 'static {
    /// Engine-side kind.
    const KIND: BuiltinKind;

    /// Fully-qualified type name, shared with locally stored components.
    const NAME: &'static str;

    /// Transient view handed out on access.
    type View<'a>;

    /// Build a view for `entity`.
    fn view(native: &mut dyn NativeRegistry, entity: Entity) -> Self::View<'_>;
}

/// Marker for the renderable-mesh builtin.
#[derive(Debug, Clone, Copy)]
pub struct WorldObject;

impl BuiltinComponent for WorldObject {
    const KIND: BuiltinKind = BuiltinKind::WorldObject;
    const NAME: &'static str = "worlds::WorldObject";
    type View<'a> = WorldObjectView<'a>;

    fn view(native: &mut dyn NativeRegistry, entity: Entity) -> WorldObjectView<'_> {
        WorldObjectView { native, entity }
    }
}

/// View over an entity's [`WorldObject`].
pub struct WorldObjectView<'a> {
    native: &'a mut dyn NativeRegistry,
    entity: Entity,
}

impl WorldObjectView<'_> {
    /// The entity this view reads.
    #[must_use]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Mesh asset rendered for the entity.
    #[must_use]
    pub fn mesh(&self) -> AssetId {
        self.native.world_object_mesh(self.entity.id())
    }

    pub fn set_mesh(&mut self, mesh: AssetId) {
        self.native.set_world_object_mesh(self.entity.id(), mesh);
    }
}

/// Marker for the simulated rigid body builtin.
#[derive(Debug, Clone, Copy)]
pub struct DynamicPhysicsActor;

impl BuiltinComponent for DynamicPhysicsActor {
    const KIND: BuiltinKind = BuiltinKind::DynamicPhysicsActor;
    const NAME: &'static str = "worlds::DynamicPhysicsActor";
    type View<'a> = PhysicsActorView<'a>;

    fn view(native: &mut dyn NativeRegistry, entity: Entity) -> PhysicsActorView<'_> {
        PhysicsActorView { native, entity }
    }
}

/// View over an entity's [`DynamicPhysicsActor`].
///
/// Setters read the current state, change one field and write it back.
pub struct PhysicsActorView<'a> {
    native: &'a mut dyn NativeRegistry,
    entity: Entity,
}

impl PhysicsActorView<'_> {
    /// The entity this view reads.
    #[must_use]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Full snapshot of the body.
    #[must_use]
    pub fn state(&self) -> PhysicsActorState {
        self.native.physics_actor(self.entity.id())
    }

    #[must_use]
    pub fn pose(&self) -> Transform {
        self.state().pose
    }

    pub fn set_pose(&mut self, pose: &Transform) {
        self.update(|state| state.pose = *pose);
    }

    #[must_use]
    pub fn velocity(&self) -> Vec3 {
        self.state().velocity
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.update(|state| state.velocity = velocity);
    }

    #[must_use]
    pub fn angular_velocity(&self) -> Vec3 {
        self.state().angular_velocity
    }

    pub fn set_angular_velocity(&mut self, angular_velocity: Vec3) {
        self.update(|state| state.angular_velocity = angular_velocity);
    }

    #[must_use]
    pub fn mass(&self) -> f32 {
        self.state().mass
    }

    pub fn set_mass(&mut self, mass: f32) {
        self.update(|state| state.mass = mass);
    }

    /// Apply a force at the center of mass.
    pub fn add_force(&mut self, force: Vec3, mode: ForceMode) {
        self.native.add_force(self.entity.id(), force, mode);
    }

    /// Apply a torque.
    pub fn add_torque(&mut self, torque: Vec3, mode: ForceMode) {
        self.native.add_torque(self.entity.id(), torque, mode);
    }

    fn update(&mut self, change: impl FnOnce(&mut PhysicsActorState)) {
        let mut state = self.state();
        change(&mut state);
        self.native.set_physics_actor(self.entity.id(), &state);
    }
}
