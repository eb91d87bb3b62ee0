//! Hit points.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use worlds_ecs::{Component, Entity, Registry};

/// Called once when a [`Health`] component reaches zero.
pub type DeathHandler = fn(Entity, &mut Registry);

/// Hit points of a damageable entity.
///
/// Death handlers are code, not data: they are not persisted and must be
/// registered again from a start hook after a reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Health {
    pub max: f64,
    pub current: f64,
    pub dead: bool,
    /// Entity credited with the most recent damage.
    pub last_attacker: Entity,
    #[serde(skip)]
    death_handlers: Vec<DeathHandler>,
}

impl Health {
    #[must_use]
    pub fn new(max: f64) -> Self {
        Self {
            max,
            current: max,
            ..Self::default()
        }
    }

    /// Register `handler` to run on death. Registering the same function
    /// twice has no effect.
    pub fn on_death(&mut self, handler: DeathHandler) {
        if !self
            .death_handlers
            .iter()
            .any(|h| std::ptr::fn_addr_eq(*h, handler))
        {
            self.death_handlers.push(handler);
        }
    }

    #[must_use]
    pub fn death_handler_count(&self) -> usize {
        self.death_handlers.len()
    }
}

impl Default for Health {
    fn default() -> Self {
        Self {
            max: 100.0,
            current: 100.0,
            dead: false,
            last_attacker: Entity::NULL,
            death_handlers: Vec::new(),
        }
    }
}

impl Component for Health {
    const HOTLOAD: bool = true;

    fn type_name() -> &'static str {
        "game::Health"
    }
}

/// Deal `amount` damage to `target` on behalf of `attacker`.
///
/// Returns `true` if this hit killed the target. Targets without [`Health`]
/// and targets already dead are ignored.
pub fn apply_damage(registry: &mut Registry, target: Entity, amount: f64, attacker: Entity) -> bool {
    let Some(health) = registry.try_get_component_mut::<Health>(target) else {
        return false;
    };
    if health.dead {
        return false;
    }

    health.current -= amount;
    health.last_attacker = attacker;
    debug!(%target, %attacker, amount, remaining = health.current, "damage applied");
    if health.current > 0.0 {
        return false;
    }

    health.dead = true;
    let handlers = health.death_handlers.clone();
    info!(%target, %attacker, "entity died");
    for handler in handlers {
        handler(target, registry);
    }
    true
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use worlds_ecs::RegistryConfig;
    use worlds_native::HeadlessEngine;

    use super::*;

    thread_local! {
        static DEATHS: Cell<u32> = const { Cell::new(0) };
    }

    fn count_death(_entity: Entity, _registry: &mut Registry) {
        DEATHS.with(|d| d.set(d.get() + 1));
    }

    fn registry() -> Registry {
        Registry::new(Box::new(HeadlessEngine::new()), RegistryConfig::default())
    }

    #[test]
    fn test_default_health_is_full() {
        let health = Health::default();
        assert_eq!(health.current, 100.0);
        assert!(!health.dead);
    }

    #[test]
    fn test_damage_until_death() {
        DEATHS.with(|d| d.set(0));
        let mut registry = registry();
        let target = registry.create();
        let attacker = registry.create();
        let health = registry.add_component::<Health>(target);
        health.on_death(count_death);
        health.on_death(count_death);
        assert_eq!(health.death_handler_count(), 1);

        assert!(!apply_damage(&mut registry, target, 60.0, attacker));
        assert!(apply_damage(&mut registry, target, 60.0, attacker));
        assert!(!apply_damage(&mut registry, target, 60.0, attacker));

        let health = registry.get_component::<Health>(target);
        assert!(health.dead);
        assert_eq!(health.last_attacker, attacker);
        assert_eq!(DEATHS.with(Cell::get), 1);
    }

    #[test]
    fn test_damage_without_health_is_ignored() {
        let mut registry = registry();
        let target = registry.create();
        assert!(!apply_damage(&mut registry, target, 10.0, Entity::NULL));
    }
}
