//! Hovering drone that keeps its distance from the camera and fires bursts
//! at it.
//!
//! Each tick the drone raycasts for the ground, picks a target pose a few
//! meters short of the camera and at least [`MIN_HOVER_HEIGHT`] above the
//! ground, pushes away from nearby drones, then steers towards that pose with
//! a stable PD controller for position and a PID controller for rotation.
//! When it has faced the camera long enough it schedules a [`FireBurst`].

pub mod pd;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use worlds_ecs::{
    Component, DynamicPhysicsActor, Entity, Registry, StagedTask, TaskStep,
};
use worlds_math::{Quat, Transform, Vec3, angle_to_err, dir, safe_look_at};
use worlds_native::ForceMode;

use crate::combat::DamagingProjectile;
pub use pd::{StablePd, V3PidController};

/// Prefab instantiated for each shot.
pub const PROJECTILE_PREFAB: &str = "Prefabs/gun_projectile.wprefab";

/// Minimum height above the ground the drone aims for.
pub const MIN_HOVER_HEIGHT: f32 = 2.5;

const GROUND_RAY_DISTANCE: f32 = 50.0;
const STANDOFF_DISTANCE: f32 = 3.5;
const MAX_CLIMB: f32 = 2.0;
const REPULSION_DISTANCE: f32 = 3.0;
const BURST_PERIOD: f32 = 3.0;
const AIM_THRESHOLD: f32 = 0.95;
const BURST_CHARGE_TIME: f64 = 1.0;
const BURST_SHOTS: u32 = 4;
const SHOT_INTERVAL: f64 = 0.1;
const MUZZLE_SPEED: f32 = 100.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DroneAI {
    pub p: f32,
    pub d: f32,
    pub rotation_p: f32,
    pub rotation_d: f32,
    pub max_positional_forces: Vec3,
    pub min_positional_forces: Vec3,
    /// Muzzle position in the drone's local space.
    pub fire_point_position: Vec3,

    #[serde(skip)]
    target: Vec3,
    #[serde(skip)]
    time_since_last_burst: f32,
    #[serde(skip)]
    burst_in_progress: bool,
    #[serde(skip)]
    pd: StablePd,
    #[serde(skip)]
    rotation_pid: V3PidController,
}

impl Default for DroneAI {
    fn default() -> Self {
        Self {
            p: 20.0,
            d: 8.0,
            rotation_p: 5.0,
            rotation_d: 1.0,
            max_positional_forces: Vec3::splat(1000.0),
            min_positional_forces: Vec3::splat(-1000.0),
            fire_point_position: Vec3::ZERO,
            target: Vec3::ZERO,
            time_since_last_burst: 0.0,
            burst_in_progress: false,
            pd: StablePd::default(),
            rotation_pid: V3PidController::default(),
        }
    }
}

impl Component for DroneAI {
    const HOTLOAD: bool = true;
    const THINKING: bool = true;

    fn type_name() -> &'static str {
        "game::DroneAI"
    }

    fn think(&mut self, entity: Entity, registry: &mut Registry) {
        self.pd.p = self.p;
        self.pd.d = self.d;
        self.rotation_pid.p = self.rotation_p;
        self.rotation_pid.d = self.rotation_d;

        let Ok(pose) = registry
            .try_get_builtin::<DynamicPhysicsActor>(entity)
            .map(|actor| actor.pose())
        else {
            return;
        };
        let Some(ground) = registry.native().raycast(
            pose.position + dir::DOWN * 0.5,
            dir::DOWN,
            GROUND_RAY_DISTANCE,
        ) else {
            return;
        };

        if !self.burst_in_progress {
            self.target = registry.native().camera_position();
        }

        let mut target_pose = target_pose(&pose, self.target, ground.world_hit_pos.y);
        avoid_other_drones(entity, &pose, &mut target_pose.position, registry);
        self.apply_target_pose(entity, &target_pose, registry);
        self.update_firing(entity, &pose, registry);
    }
}

impl DroneAI {
    /// `true` while a burst is charging or firing.
    #[must_use]
    pub fn burst_in_progress(&self) -> bool {
        self.burst_in_progress
    }

    fn apply_target_pose(&mut self, entity: Entity, target: &Transform, registry: &mut Registry) {
        let dt = registry.time().delta;
        let Ok(mut actor) = registry.try_get_builtin::<DynamicPhysicsActor>(entity) else {
            return;
        };
        let pose = actor.pose();

        let force = self
            .pd
            .calculate_force(pose.position, target.position, actor.velocity(), dt);
        if force.is_nan() {
            warn!(%entity, "drone force had NaN component");
        } else {
            let force = force
                .max(self.min_positional_forces)
                .min(self.max_positional_forces);
            actor.add_force(force, ForceMode::Force);
        }

        let (axis, angle) = (target.rotation * pose.rotation.inverse()).to_axis_angle();
        let torque = self
            .rotation_pid
            .calculate_force(axis * angle_to_err(angle), dt);
        if torque.is_nan() {
            warn!(%entity, "drone torque had NaN component");
        } else {
            actor.add_torque(torque, ForceMode::Force);
        }
    }

    fn update_firing(&mut self, entity: Entity, pose: &Transform, registry: &mut Registry) {
        self.time_since_last_burst += registry.time().delta;

        let to_target = (self.target - pose.position).normalize_or_zero();
        let aim = to_target.dot(pose.rotation * dir::FORWARD);
        if aim > AIM_THRESHOLD
            && self.time_since_last_burst > BURST_PERIOD - 1.0
            && !self.burst_in_progress
        {
            self.burst_in_progress = true;
            registry.schedule(Box::new(FireBurst::new(entity, self.fire_point_position)));
        }
    }
}

/// Pose a few meters short of `target`, facing it, kept above the ground.
fn target_pose(pose: &Transform, target: Vec3, ground_height: f32) -> Transform {
    let mut to_target = target - pose.position;
    to_target.y = to_target.y.clamp(-MAX_CLIMB, MAX_CLIMB);
    let to_target = to_target.normalize_or_zero();

    let mut location = target - to_target * STANDOFF_DISTANCE;
    location.y = location.y.max(ground_height + MIN_HOVER_HEIGHT);
    Transform::new(location, safe_look_at(to_target))
}

/// Push `target` horizontally away from every other drone within
/// [`REPULSION_DISTANCE`].
fn avoid_other_drones(entity: Entity, pose: &Transform, target: &mut Vec3, registry: &mut Registry) {
    for other in registry.entities_with::<DroneAI>() {
        if other == entity {
            continue;
        }
        let Ok(other_pose) = registry
            .try_get_builtin::<DynamicPhysicsActor>(other)
            .map(|actor| actor.pose())
        else {
            continue;
        };

        let mut direction = other_pose.position - pose.position;
        let distance = direction.length();
        if distance > REPULSION_DISTANCE || distance <= f32::EPSILON {
            continue;
        }
        direction.y = 0.0;
        direction /= distance;
        *target -= direction * (distance + 1.0);
    }
}

/// Charge, then fire [`BURST_SHOTS`] projectiles from the drone's muzzle.
/// Cancelled if the drone is destroyed.
pub struct FireBurst {
    drone: Entity,
    fire_point: Vec3,
    charged: bool,
    shots_fired: u32,
}

impl FireBurst {
    #[must_use]
    pub fn new(drone: Entity, fire_point: Vec3) -> Self {
        Self {
            drone,
            fire_point,
            charged: false,
            shots_fired: 0,
        }
    }
}

impl StagedTask for FireBurst {
    fn name(&self) -> &'static str {
        "drone_fire_burst"
    }

    fn owner(&self) -> Option<Entity> {
        Some(self.drone)
    }

    fn step(&mut self, registry: &mut Registry) -> TaskStep {
        if !self.charged {
            self.charged = true;
            debug!(drone = %self.drone, "burst charging");
            return TaskStep::Wait(BURST_CHARGE_TIME);
        }

        if self.shots_fired < BURST_SHOTS {
            fire_projectile(registry, self.drone, self.fire_point);
            self.shots_fired += 1;
            return TaskStep::Wait(SHOT_INTERVAL);
        }

        if let Some(drone) = registry.try_get_component_mut::<DroneAI>(self.drone) {
            drone.burst_in_progress = false;
            drone.time_since_last_burst = 0.0;
        }
        TaskStep::Done
    }
}

fn fire_projectile(registry: &mut Registry, drone: Entity, fire_point: Vec3) {
    let Ok(pose) = registry
        .try_get_builtin::<DynamicPhysicsActor>(drone)
        .map(|actor| actor.pose())
    else {
        return;
    };

    let asset = registry.asset_id(PROJECTILE_PREFAB);
    let projectile = registry.create_prefab(asset);
    let Ok(mut transform) = registry.try_transform(projectile) else {
        return;
    };

    let muzzle = Transform::new(fire_point, Quat::IDENTITY).transform_by(&pose);
    let forward = muzzle.rotation * dir::FORWARD;
    transform.position = muzzle.position;
    transform.rotation = muzzle.rotation;
    registry.set_transform(projectile, &transform);

    if let Some(damaging) = registry.try_get_component_mut::<DamagingProjectile>(projectile) {
        damaging.attacker = drone;
    }

    let mass = match registry.try_get_builtin::<DynamicPhysicsActor>(projectile) {
        Ok(mut actor) => {
            actor.set_pose(&transform);
            actor.add_force(forward * MUZZLE_SPEED, ForceMode::VelocityChange);
            actor.mass()
        }
        Err(_) => return,
    };
    if let Ok(mut actor) = registry.try_get_builtin::<DynamicPhysicsActor>(drone) {
        actor.add_force(-forward * MUZZLE_SPEED * mass, ForceMode::Impulse);
    }
    debug!(%drone, %projectile, "drone fired");
}

#[cfg(test)]
mod tests {
    use worlds_ecs::{HotloadCodec, RegistryConfig};
    use worlds_native::{HeadlessEngine, Prefab};

    use super::*;

    const CAMERA: Vec3 = Vec3::new(0.0, 2.0, 10.0);

    fn registry() -> Registry {
        let mut engine = HeadlessEngine::new();
        engine.set_camera_position(CAMERA);
        let managed = HotloadCodec::default()
            .encode(&DamagingProjectile::default())
            .unwrap();
        engine.register_prefab(PROJECTILE_PREFAB, Prefab {
            mass: Some(0.5),
            mesh: Some(worlds_native::AssetId::from_path("Models/bullet.wmdl")),
            managed: vec![(DamagingProjectile::type_name().to_string(), managed)],
            ..Prefab::default()
        });
        let mut registry = Registry::new(Box::new(engine), RegistryConfig::default());
        crate::install(&mut registry);
        registry
    }

    fn spawn_drone(registry: &mut Registry, position: Vec3) -> Entity {
        let drone = registry.create();
        let facing = safe_look_at(CAMERA - position);
        registry.set_transform(drone, &Transform::new(position, facing));
        registry.add_builtin::<DynamicPhysicsActor>(drone);
        registry.add_component::<DroneAI>(drone);
        drone
    }

    fn step_physics(registry: &mut Registry, dt: f32) {
        registry
            .native_as_mut::<HeadlessEngine>()
            .unwrap()
            .step_physics(dt);
    }

    #[test]
    fn test_target_pose_stands_off_and_hovers() {
        let pose = Transform::from_position(Vec3::new(0.0, 3.0, 0.0));
        let target = target_pose(&pose, Vec3::new(0.0, 3.0, 10.0), 0.0);
        assert!((target.position - Vec3::new(0.0, 3.0, 6.5)).length() < 1e-4);

        let low = target_pose(&pose, Vec3::new(0.0, 0.0, 10.0), 0.0);
        assert_eq!(low.position.y, MIN_HOVER_HEIGHT);
    }

    #[test]
    fn test_drone_accelerates_towards_target() {
        let mut registry = registry();
        let drone = spawn_drone(&mut registry, Vec3::new(0.0, 3.0, 0.0));

        registry.tick(0.02);
        step_physics(&mut registry, 0.02);

        let velocity = registry.get_builtin::<DynamicPhysicsActor>(drone).velocity();
        assert!(velocity.z > 0.0);
    }

    #[test]
    fn test_no_ground_no_steering() {
        let mut registry = registry();
        let drone = spawn_drone(&mut registry, Vec3::new(0.0, -10.0, 0.0));

        registry.tick(0.02);
        step_physics(&mut registry, 0.02);

        let velocity = registry.get_builtin::<DynamicPhysicsActor>(drone).velocity();
        assert_eq!(velocity, Vec3::ZERO);
    }

    #[test]
    fn test_nan_force_is_skipped() {
        let mut registry = registry();
        let drone = spawn_drone(&mut registry, Vec3::new(0.0, 3.0, 0.0));
        registry.get_component_mut::<DroneAI>(drone).p = f32::NAN;

        registry.tick(0.02);
        step_physics(&mut registry, 0.02);

        let velocity = registry.get_builtin::<DynamicPhysicsActor>(drone).velocity();
        assert_eq!(velocity, Vec3::ZERO);
    }

    #[test]
    fn test_burst_fires_four_projectiles() {
        let mut registry = registry();
        let drone = spawn_drone(&mut registry, Vec3::new(0.0, 3.0, 0.0));

        for _ in 0..45 {
            registry.tick(0.1);
        }

        let projectiles = registry.entities_with::<DamagingProjectile>();
        assert_eq!(projectiles.len(), 4);
        for projectile in projectiles {
            assert_eq!(registry.get_component::<DamagingProjectile>(projectile).attacker, drone);
            let speed = registry
                .get_builtin::<DynamicPhysicsActor>(projectile)
                .velocity()
                .length();
            assert!((speed - MUZZLE_SPEED).abs() < 1e-3);
        }
        assert!(!registry.get_component::<DroneAI>(drone).burst_in_progress());
    }

    #[test]
    fn test_destroyed_drone_cancels_burst() {
        let mut registry = registry();
        let drone = spawn_drone(&mut registry, Vec3::new(0.0, 3.0, 0.0));
        registry.get_component_mut::<DroneAI>(drone).time_since_last_burst = 10.0;

        registry.tick(0.1);
        assert_eq!(registry.pending_tasks(), 1);

        registry.destroy(drone);
        for _ in 0..20 {
            registry.tick(0.1);
        }
        assert_eq!(registry.pending_tasks(), 0);
        assert!(registry.entities_with::<DamagingProjectile>().is_empty());
    }
}
