//! Projectiles that damage what they hit and bounce a limited number of
//! times.

use serde::{Deserialize, Serialize};
use tracing::debug;
use worlds_ecs::{
    Component, ContactInfo, DynamicPhysicsActor, Entity, GameSystem, Registry,
};
use worlds_math::{Vec3, safe_look_at};

use crate::health::apply_damage;

/// Seconds a projectile lives before [`ProjectileCleanupSystem`] removes it.
pub const PROJECTILE_LIFETIME: f64 = 5.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DamagingProjectile {
    pub damage: f64,
    /// Simulation time at which the projectile started.
    pub creation_time: f64,
    /// Remaining bounces off non-projectile surfaces.
    pub bounce_count: i32,
    /// Entity credited with the damage.
    pub attacker: Entity,
}

impl Default for DamagingProjectile {
    fn default() -> Self {
        Self {
            damage: 5.0,
            creation_time: 0.0,
            bounce_count: 0,
            attacker: Entity::NULL,
        }
    }
}

impl Component for DamagingProjectile {
    const HOTLOAD: bool = true;
    const START_LISTENER: bool = true;
    const COLLISION_HANDLER: bool = true;

    fn type_name() -> &'static str {
        "game::combat::DamagingProjectile"
    }

    fn start(&mut self, _entity: Entity, registry: &mut Registry) {
        self.creation_time = registry.time().current;
    }

    fn on_collision(&mut self, entity: Entity, contact: &ContactInfo, registry: &mut Registry) {
        let other = contact.other_entity;
        let hit_projectile = registry.has_component::<DamagingProjectile>(other);

        if self.bounce_count > 0 || hit_projectile {
            if !hit_projectile {
                self.bounce_count -= 1;
            }
            if let Ok(mut actor) = registry.try_get_builtin::<DynamicPhysicsActor>(entity) {
                let velocity = reflect(actor.velocity(), contact.normal);
                actor.set_velocity(velocity);
                let mut pose = actor.pose();
                pose.rotation = safe_look_at(velocity);
                actor.set_pose(&pose);
            }
        } else {
            registry.destroy_next(entity);
        }

        apply_damage(registry, other, self.damage, self.attacker);
    }
}

fn reflect(velocity: Vec3, normal: Vec3) -> Vec3 {
    velocity - 2.0 * velocity.dot(normal) * normal
}

/// Destroys projectiles older than [`PROJECTILE_LIFETIME`].
#[derive(Debug, Default)]
pub struct ProjectileCleanupSystem;

impl GameSystem for ProjectileCleanupSystem {
    fn name(&self) -> &'static str {
        "projectile_cleanup"
    }

    fn on_simulate(&mut self, registry: &mut Registry) {
        let now = registry.time().current;
        let expired: Vec<Entity> = registry
            .view::<DamagingProjectile>()
            .iter()
            .filter(|(_, p)| now - p.creation_time > PROJECTILE_LIFETIME)
            .map(|(entity, _)| entity)
            .collect();
        for entity in expired {
            debug!(%entity, "projectile expired");
            registry.destroy_next(entity);
        }
    }
}
