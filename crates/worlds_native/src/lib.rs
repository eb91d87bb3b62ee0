//! # worlds_native
//!
//! The native engine is the system of record for entities, transforms,
//! physics and assets. This crate describes the narrow set of calls the
//! scripting layer makes into it.
//!
//! - [`NativeRegistry`]: every outbound boundary call.
//! - [`PersistedEntityInfo`]: per-entity keyed store filled during saves.
//! - [`HeadlessEngine`]: in-process implementation used by tests and the
//!   headless runner.

pub mod boundary;
pub mod headless;
pub mod persist;

pub use boundary::{
    AssetId, BuiltinKind, EntityId, ForceMode, NO_NAME, NULL_ENTITY_ID, NativeRegistry,
    PhysicsActorState, RaycastHit,
};
pub use headless::{HeadlessEngine, Prefab};
pub use persist::{PersistedComponent, PersistedEntityInfo};
