//! Demo scene: a ring of drones hovering around the camera.

use std::f32::consts::TAU;

use anyhow::Result;
use worlds_ecs::{Component, DynamicPhysicsActor, Entity, HotloadCodec, Registry, WorldObject};
use worlds_game::DroneAI;
use worlds_game::combat::DamagingProjectile;
use worlds_game::drone::PROJECTILE_PREFAB;
use worlds_math::{Transform, Vec3, safe_look_at};
use worlds_native::{AssetId, HeadlessEngine, Prefab};

pub const CAMERA_POSITION: Vec3 = Vec3::new(0.0, 1.7, 0.0);

const DRONE_MESH: &str = "Models/drone.wmdl";
const PROJECTILE_MESH: &str = "Models/bullet.wmdl";
const RING_RADIUS: f32 = 8.0;
const RING_HEIGHT: f32 = 4.0;

/// Engine with the camera placed and the projectile prefab registered.
/// Prefab components are encoded with `codec` so the registry can decode them.
pub fn build_engine(codec: HotloadCodec) -> Result<HeadlessEngine> {
    let mut engine = HeadlessEngine::new();
    engine.set_camera_position(CAMERA_POSITION);
    engine.register_prefab(PROJECTILE_PREFAB, Prefab {
        name: Some("projectile".to_string()),
        mesh: Some(AssetId::from_path(PROJECTILE_MESH)),
        mass: Some(0.1),
        managed: vec![(
            DamagingProjectile::type_name().to_string(),
            codec.encode(&DamagingProjectile::default())?,
        )],
        ..Prefab::default()
    });
    Ok(engine)
}

/// Spawn `count` drones evenly spaced on a ring around the camera, each
/// facing it.
pub fn spawn_drones(registry: &mut Registry, count: usize) -> Vec<Entity> {
    let mesh = registry.asset_id(DRONE_MESH);
    (0..count)
        .map(|i| {
            let angle = TAU * i as f32 / count as f32;
            let position = CAMERA_POSITION
                + Vec3::new(angle.cos() * RING_RADIUS, RING_HEIGHT, angle.sin() * RING_RADIUS);

            let drone = registry.create();
            registry.set_name(drone, Some(&format!("drone {i}")));
            registry.set_transform(
                drone,
                &Transform::new(position, safe_look_at(CAMERA_POSITION - position)),
            );
            registry.add_builtin::<WorldObject>(drone).set_mesh(mesh);
            registry.add_builtin::<DynamicPhysicsActor>(drone).set_mass(2.0);
            registry.add_component::<DroneAI>(drone).fire_point_position = Vec3::new(0.0, 0.0, 0.5);
            drone
        })
        .collect()
}
