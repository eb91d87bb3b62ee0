//! # worlds_game
//!
//! Gameplay components built on [`worlds_ecs`]. None of these own any
//! infrastructure; they implement component hooks and talk to the registry.
//!
//! - [`Health`] and [`apply_damage`]: hit points with death handlers.
//! - [`combat`]: damaging projectiles and impact damage.
//! - [`ExplodeOnDeath`]: turns a dying entity into physics debris.
//! - [`drone`]: hovering drone AI that tracks the camera and fires bursts.
//! - [`interaction`]: grip points for hand interaction.

pub mod combat;
pub mod drone;
pub mod explode_on_death;
pub mod health;
pub mod interaction;

pub use combat::{DamagingProjectile, ImpactDamageDealer, ProjectileCleanupSystem};
pub use drone::DroneAI;
pub use explode_on_death::ExplodeOnDeath;
pub use health::{DeathHandler, Health, apply_damage};
pub use interaction::{AttachedHands, Grip, GripError, GripHand, GripType};

use worlds_ecs::{ComponentModule, Registry};

/// Every component type the game provides.
#[must_use]
pub fn module() -> ComponentModule {
    ComponentModule::new()
        .with_component::<Health>()
        .with_component::<DamagingProjectile>()
        .with_component::<ImpactDamageDealer>()
        .with_component::<ExplodeOnDeath>()
        .with_component::<DroneAI>()
}

/// Load the game module into `registry` and register its systems.
///
/// Call again after every [`Registry::serialize_for_hotload`], which drops
/// systems along with the rest of the code-owned state.
pub fn install(registry: &mut Registry) {
    registry.load_module(module());
    registry.add_system(Box::new(ProjectileCleanupSystem));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_resolves_game_types() {
        let module = module();
        for name in [
            "game::Health",
            "game::combat::DamagingProjectile",
            "game::combat::ImpactDamageDealer",
            "game::ExplodeOnDeath",
            "game::DroneAI",
            "worlds::WorldObject",
        ] {
            assert!(module.resolve(name).is_some(), "{name} missing");
        }
    }
}
