//! In-process native engine.
//!
//! [`HeadlessEngine`] implements [`NativeRegistry`] without a renderer or a
//! physics solver. Entity ids use the same index/version packing as the
//! engine's registry so stale handles are detected after an index is reused.
//! Physics is a plain explicit-Euler integrator over accumulated forces and a
//! single ground plane, which is enough to drive gameplay code headlessly.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};
use worlds_math::{Transform, Vec3};

use crate::boundary::{
    AssetId, BuiltinKind, EntityId, ForceMode, NO_NAME, NULL_ENTITY_ID, NativeRegistry,
    PhysicsActorState, RaycastHit,
};
use crate::persist::PersistedComponent;

/// Bits of an [`EntityId`] used for the slot index.
const INDEX_BITS: u32 = 20;

/// Mask selecting the slot index.
const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;

/// Mask selecting the version after shifting.
const VERSION_MASK: u32 = u32::MAX >> INDEX_BITS;

fn pack(index: u32, version: u32) -> EntityId {
    (version << INDEX_BITS) | index
}

fn unpack(id: EntityId) -> (u32, u32) {
    (id & INDEX_MASK, (id >> INDEX_BITS) & VERSION_MASK)
}

/// Native-side state of one entity.
#[derive(Debug, Clone, Default)]
struct EntityRecord {
    transform: Transform,
    name: Option<String>,
    mesh: Option<AssetId>,
    physics: Option<PhysicsBody>,
}

#[derive(Debug, Clone, Copy)]
struct PhysicsBody {
    velocity: Vec3,
    angular_velocity: Vec3,
    mass: f32,
    force: Vec3,
    torque: Vec3,
}

impl Default for PhysicsBody {
    fn default() -> Self {
        Self {
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            mass: 1.0,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
        }
    }
}

#[derive(Debug)]
struct Slot {
    version: u32,
    record: Option<EntityRecord>,
}

/// A template instantiated by [`NativeRegistry::create_prefab`].
#[derive(Debug, Clone, Default)]
pub struct Prefab {
    /// Name given to each instance.
    pub name: Option<String>,
    /// Initial transform of each instance.
    pub transform: Transform,
    /// Mesh for a [`BuiltinKind::WorldObject`], if the prefab renders.
    pub mesh: Option<AssetId>,
    /// Mass for a [`BuiltinKind::DynamicPhysicsActor`], if the prefab simulates.
    pub mass: Option<f32>,
    /// Encoded managed components, delivered back as persisted info.
    pub managed: Vec<(String, Vec<u8>)>,
}

/// In-process [`NativeRegistry`].
#[derive(Debug)]
pub struct HeadlessEngine {
    slots: Vec<Slot>,
    free: Vec<u32>,
    destroyed: Vec<EntityId>,
    persisted: BTreeMap<(EntityId, String), Vec<u8>>,
    prefabs: HashMap<AssetId, Prefab>,
    ground_height: f32,
    camera_position: Vec3,
    gravity: Vec3,
}

impl HeadlessEngine {
    /// Create an empty engine with the ground plane at `y = 0`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            destroyed: Vec::new(),
            persisted: BTreeMap::new(),
            prefabs: HashMap::new(),
            ground_height: 0.0,
            camera_position: Vec3::ZERO,
            gravity: Vec3::ZERO,
        }
    }

    /// Move the ground plane used by [`NativeRegistry::raycast`].
    #[must_use]
    pub fn with_ground_height(mut self, height: f32) -> Self {
        self.ground_height = height;
        self
    }

    /// Enable gravity for physics actors.
    #[must_use]
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    /// Move the main camera.
    pub fn set_camera_position(&mut self, position: Vec3) {
        self.camera_position = position;
    }

    /// Register a prefab under `path` and return its asset id.
    pub fn register_prefab(&mut self, path: &str, prefab: Prefab) -> AssetId {
        let id = AssetId::from_path(path);
        self.prefabs.insert(id, prefab);
        id
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.slots.iter().filter(|s| s.record.is_some()).count()
    }

    /// Integrate every physics actor by `dt` seconds.
    pub fn step_physics(&mut self, dt: f32) {
        let gravity = self.gravity;
        for slot in &mut self.slots {
            let Some(record) = slot.record.as_mut() else {
                continue;
            };
            let Some(body) = record.physics.as_mut() else {
                continue;
            };

            let mass = body.mass.max(f32::EPSILON);
            body.velocity += (body.force / mass + gravity) * dt;
            body.angular_velocity += (body.torque / mass) * dt;
            body.force = Vec3::ZERO;
            body.torque = Vec3::ZERO;

            record.transform.position += body.velocity * dt;
            let spin = body.angular_velocity * dt;
            if spin.length_squared() > 0.0 {
                record.transform.rotation =
                    (worlds_math::Quat::from_scaled_axis(spin) * record.transform.rotation)
                        .normalize();
            }
        }
    }

    fn record(&self, id: EntityId) -> Option<&EntityRecord> {
        let (index, version) = unpack(id);
        let slot = self.slots.get(index as usize)?;
        if slot.version != version {
            return None;
        }
        slot.record.as_ref()
    }

    fn record_mut(&mut self, id: EntityId) -> Option<&mut EntityRecord> {
        let (index, version) = unpack(id);
        let slot = self.slots.get_mut(index as usize)?;
        if slot.version != version {
            return None;
        }
        slot.record.as_mut()
    }

    fn allocate(&mut self, record: EntityRecord) -> EntityId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.record = Some(record);
            return pack(index, slot.version);
        }

        let index = self.slots.len() as u32;
        assert!(index < INDEX_MASK, "headless engine out of entity indices");
        self.slots.push(Slot {
            version: 0,
            record: Some(record),
        });
        pack(index, 0)
    }
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeRegistry for HeadlessEngine {
    fn create(&mut self) -> EntityId {
        let id = self.allocate(EntityRecord::default());
        debug!(entity = id, "native entity created");
        id
    }

    fn destroy(&mut self, id: EntityId) {
        let (index, version) = unpack(id);
        let Some(slot) = self.slots.get_mut(index as usize) else {
            warn!(entity = id, "destroy of unknown entity ignored");
            return;
        };
        if slot.version != version || slot.record.is_none() {
            warn!(entity = id, "destroy of stale entity ignored");
            return;
        }

        slot.record = None;
        slot.version = (slot.version + 1) & VERSION_MASK;
        self.free.push(index);
        self.persisted.retain(|(entity, _), _| *entity != id);
        self.destroyed.push(id);
        debug!(entity = id, "native entity destroyed");
    }

    fn valid(&self, id: EntityId) -> bool {
        id != NULL_ENTITY_ID && self.record(id).is_some()
    }

    fn transform(&self, id: EntityId) -> Transform {
        self.record(id)
            .map(|r| r.transform)
            .unwrap_or(Transform::IDENTITY)
    }

    fn set_transform(&mut self, id: EntityId, transform: &Transform) {
        if let Some(record) = self.record_mut(id) {
            record.transform = *transform;
        }
    }

    fn each(&self, callback: &mut dyn FnMut(EntityId)) {
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.record.is_some() {
                callback(pack(index as u32, slot.version));
            }
        }
    }

    fn entity_name_length(&self, id: EntityId) -> u32 {
        self.record(id)
            .and_then(|r| r.name.as_ref())
            .map_or(NO_NAME, |n| n.len() as u32)
    }

    fn entity_name(&self, id: EntityId, buffer: &mut String) {
        if let Some(name) = self.record(id).and_then(|r| r.name.as_ref()) {
            buffer.clear();
            buffer.push_str(name);
        }
    }

    fn set_entity_name(&mut self, id: EntityId, name: Option<&str>) {
        if let Some(record) = self.record_mut(id) {
            record.name = name.map(str::to_string);
        }
    }

    fn create_prefab(&mut self, asset: AssetId) -> EntityId {
        let Some(prefab) = self.prefabs.get(&asset).cloned() else {
            warn!(asset = asset.0, "unknown prefab asset");
            return NULL_ENTITY_ID;
        };

        let record = EntityRecord {
            transform: prefab.transform,
            name: prefab.name,
            mesh: prefab.mesh,
            physics: prefab.mass.map(|mass| PhysicsBody {
                mass,
                ..PhysicsBody::default()
            }),
        };
        let id = self.allocate(record);
        for (key, value) in prefab.managed {
            self.persisted.insert((id, key), value);
        }
        debug!(entity = id, asset = asset.0, "prefab instantiated");
        id
    }

    fn asset_id(&self, path: &str) -> AssetId {
        AssetId::from_path(path)
    }

    fn set_serialized_entity_info(&mut self, id: EntityId, key: &str, value: &[u8]) {
        self.persisted.insert((id, key.to_string()), value.to_vec());
    }

    fn take_serialized_entity_info(&mut self) -> Vec<PersistedComponent> {
        std::mem::take(&mut self.persisted)
            .into_iter()
            .map(|((entity, key), value)| PersistedComponent { entity, key, value })
            .collect()
    }

    fn take_destroyed(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.destroyed)
    }

    fn has_builtin(&self, kind: BuiltinKind, id: EntityId) -> bool {
        self.record(id).is_some_and(|r| match kind {
            BuiltinKind::WorldObject => r.mesh.is_some(),
            BuiltinKind::DynamicPhysicsActor => r.physics.is_some(),
        })
    }

    fn emplace_builtin(&mut self, kind: BuiltinKind, id: EntityId) {
        if let Some(record) = self.record_mut(id) {
            match kind {
                BuiltinKind::WorldObject => record.mesh = Some(AssetId::default()),
                BuiltinKind::DynamicPhysicsActor => record.physics = Some(PhysicsBody::default()),
            }
        }
    }

    fn remove_builtin(&mut self, kind: BuiltinKind, id: EntityId) {
        if let Some(record) = self.record_mut(id) {
            match kind {
                BuiltinKind::WorldObject => record.mesh = None,
                BuiltinKind::DynamicPhysicsActor => record.physics = None,
            }
        }
    }

    fn physics_actor(&self, id: EntityId) -> PhysicsActorState {
        let Some(record) = self.record(id) else {
            return PhysicsActorState::default();
        };
        let body = record.physics.unwrap_or_default();
        PhysicsActorState {
            pose: record.transform,
            velocity: body.velocity,
            angular_velocity: body.angular_velocity,
            mass: body.mass,
        }
    }

    fn set_physics_actor(&mut self, id: EntityId, state: &PhysicsActorState) {
        if let Some(record) = self.record_mut(id) {
            record.transform = state.pose;
            if let Some(body) = record.physics.as_mut() {
                body.velocity = state.velocity;
                body.angular_velocity = state.angular_velocity;
                body.mass = state.mass;
            }
        }
    }

    fn add_force(&mut self, id: EntityId, force: Vec3, mode: ForceMode) {
        let Some(body) = self.record_mut(id).and_then(|r| r.physics.as_mut()) else {
            return;
        };
        match mode {
            ForceMode::Force => body.force += force,
            ForceMode::Acceleration => body.force += force * body.mass,
            ForceMode::Impulse => body.velocity += force / body.mass.max(f32::EPSILON),
            ForceMode::VelocityChange => body.velocity += force,
        }
    }

    fn add_torque(&mut self, id: EntityId, torque: Vec3, mode: ForceMode) {
        let Some(body) = self.record_mut(id).and_then(|r| r.physics.as_mut()) else {
            return;
        };
        match mode {
            ForceMode::Force => body.torque += torque,
            ForceMode::Acceleration => body.torque += torque * body.mass,
            ForceMode::Impulse => body.angular_velocity += torque / body.mass.max(f32::EPSILON),
            ForceMode::VelocityChange => body.angular_velocity += torque,
        }
    }

    fn world_object_mesh(&self, id: EntityId) -> AssetId {
        self.record(id).and_then(|r| r.mesh).unwrap_or_default()
    }

    fn set_world_object_mesh(&mut self, id: EntityId, mesh: AssetId) {
        if let Some(record) = self.record_mut(id) {
            record.mesh = Some(mesh);
        }
    }

    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RaycastHit> {
        let direction = direction.normalize_or_zero();
        if direction.y.abs() < f32::EPSILON {
            return None;
        }

        let distance = (self.ground_height - origin.y) / direction.y;
        if !(0.0..=max_distance).contains(&distance) {
            return None;
        }

        Some(RaycastHit {
            entity: NULL_ENTITY_ID,
            world_hit_pos: origin + direction * distance,
            normal: Vec3::Y,
            distance,
        })
    }

    fn camera_position(&self) -> Vec3 {
        self.camera_position
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
