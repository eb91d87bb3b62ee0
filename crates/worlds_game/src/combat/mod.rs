//! Damage dealt by physical contact.

pub mod impact;
pub mod projectile;

pub use impact::ImpactDamageDealer;
pub use projectile::{DamagingProjectile, ProjectileCleanupSystem};
