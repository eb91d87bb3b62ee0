//! Replaces a dying entity with a spray of short-lived physics cubes.

use serde::{Deserialize, Serialize};
use tracing::warn;
use worlds_ecs::{
    Component, DynamicPhysicsActor, Entity, Registry, StagedTask, TaskStep, WorldObject,
};
use worlds_math::{Transform, Vec3};
use worlds_native::AssetId;

use crate::health::Health;

/// Mesh used for debris cubes.
pub const DEBRIS_MESH: &str = "Models/cube.wmdl";

/// Seconds before a debris cube is removed.
pub const DEBRIS_LIFETIME: f64 = 5.0;

const DEBRIS_MASS: f32 = 0.25;
const DEBRIS_SPACING: f32 = 0.1;

/// Requires a [`Health`] on the same entity. On death the entity is
/// destroyed and replaced by a 4×4 grid of debris cubes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExplodeOnDeath;

impl Component for ExplodeOnDeath {
    const HOTLOAD: bool = true;
    const START_LISTENER: bool = true;

    fn type_name() -> &'static str {
        "game::ExplodeOnDeath"
    }

    fn start(&mut self, entity: Entity, registry: &mut Registry) {
        match registry.try_get_component_mut::<Health>(entity) {
            Some(health) => health.on_death(explode),
            None => warn!(%entity, "ExplodeOnDeath without Health never fires"),
        }
    }
}

fn explode(entity: Entity, registry: &mut Registry) {
    let Ok(mut transform) = registry.try_transform(entity) else {
        return;
    };
    transform.scale = Vec3::splat(0.1);
    let mesh = registry.asset_id(DEBRIS_MESH);

    for x in -2..2 {
        for y in -2..2 {
            let mut spawn = transform;
            spawn.position += Vec3::new(x as f32 * DEBRIS_SPACING, y as f32 * DEBRIS_SPACING, 0.0);
            let cube = spawn_cube(registry, &spawn, mesh);
            registry.schedule_after(DEBRIS_LIFETIME, Box::new(DestroyAfter { entity: cube }));
        }
    }

    registry.destroy(entity);
}

fn spawn_cube(registry: &mut Registry, transform: &Transform, mesh: AssetId) -> Entity {
    let entity = registry.create();
    registry.set_transform(entity, transform);
    registry.add_builtin::<WorldObject>(entity).set_mesh(mesh);
    registry
        .add_builtin::<DynamicPhysicsActor>(entity)
        .set_mass(DEBRIS_MASS);
    entity
}

/// Destroys an entity when first run.
struct DestroyAfter {
    entity: Entity,
}

impl StagedTask for DestroyAfter {
    fn name(&self) -> &'static str {
        "destroy_after"
    }

    fn owner(&self) -> Option<Entity> {
        Some(self.entity)
    }

    fn step(&mut self, registry: &mut Registry) -> TaskStep {
        registry.destroy(self.entity);
        TaskStep::Done
    }
}

#[cfg(test)]
mod tests {
    use worlds_ecs::RegistryConfig;
    use worlds_native::HeadlessEngine;

    use super::*;
    use crate::health::apply_damage;

    fn live_entities(registry: &Registry) -> Vec<Entity> {
        let mut entities = Vec::new();
        registry.each(|e| entities.push(e));
        entities
    }

    #[test]
    fn test_death_spawns_debris_that_expires() {
        let mut registry = Registry::new(Box::new(HeadlessEngine::new()), RegistryConfig::default());
        let crate_entity = registry.create();
        registry.set_transform(crate_entity, &Transform::from_position(Vec3::new(0.0, 1.0, 0.0)));
        registry.add_component::<Health>(crate_entity);
        registry.add_component::<ExplodeOnDeath>(crate_entity);

        assert!(apply_damage(&mut registry, crate_entity, 200.0, Entity::NULL));

        assert!(!registry.valid(crate_entity));
        let debris = live_entities(&registry);
        assert_eq!(debris.len(), 16);
        let cube = debris[0];
        assert!(registry.has_builtin::<WorldObject>(cube));
        assert_eq!(registry.get_builtin::<DynamicPhysicsActor>(cube).mass(), DEBRIS_MASS);
        assert_eq!(registry.transform(cube).scale, Vec3::splat(0.1));
        assert_eq!(registry.pending_tasks(), 16);

        for _ in 0..60 {
            registry.tick(0.1);
        }
        assert!(live_entities(&registry).is_empty());
        assert_eq!(registry.pending_tasks(), 0);
    }

    #[test]
    fn test_scene_start_does_not_duplicate_handler() {
        let mut registry = Registry::new(Box::new(HeadlessEngine::new()), RegistryConfig::default());
        let entity = registry.create();
        registry.add_component::<Health>(entity);
        registry.add_component::<ExplodeOnDeath>(entity);
        registry.on_scene_start();
        assert_eq!(registry.get_component::<Health>(entity).death_handler_count(), 1);
    }
}
