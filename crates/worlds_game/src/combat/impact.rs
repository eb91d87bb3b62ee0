//! Damage from being struck by a fast-moving body.

use serde::{Deserialize, Serialize};
use worlds_ecs::{Component, ContactInfo, DynamicPhysicsActor, Entity, Registry};

use crate::health::{Health, apply_damage};

/// Damages whatever the owning physics body hits hard enough.
///
/// Speed is measured at the contact point, so a spinning body deals damage
/// with its edges even when its center barely moves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactDamageDealer {
    pub damage: f64,
    /// Contact-point speed below which no damage is dealt.
    pub minimum_velocity: f32,
    /// Entity credited with the damage. Never damaged by this dealer.
    pub attacker: Entity,
}

impl Default for ImpactDamageDealer {
    fn default() -> Self {
        Self {
            damage: 5.0,
            minimum_velocity: 2.0,
            attacker: Entity::NULL,
        }
    }
}

impl Component for ImpactDamageDealer {
    const HOTLOAD: bool = true;
    const COLLISION_HANDLER: bool = true;

    fn type_name() -> &'static str {
        "game::combat::ImpactDamageDealer"
    }

    fn on_collision(&mut self, entity: Entity, contact: &ContactInfo, registry: &mut Registry) {
        let other = contact.other_entity;
        if other == self.attacker || !registry.has_component::<Health>(other) {
            return;
        }
        let Ok(actor) = registry.try_get_builtin::<DynamicPhysicsActor>(entity) else {
            return;
        };

        let state = actor.state();
        let lever = contact.average_contact_point - state.pose.position;
        let point_velocity = state.velocity + state.angular_velocity.cross(lever);
        if point_velocity.length_squared() < self.minimum_velocity * self.minimum_velocity {
            return;
        }

        apply_damage(registry, other, self.damage, self.attacker);
    }
}
