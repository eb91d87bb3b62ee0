//! Registry error types.

use crate::codec::CodecError;
use crate::entity::Entity;

/// Errors reported by [`Registry`](crate::Registry) operations.
///
/// Most of these are contract violations by game code. The panicking facade
/// methods (`add_component`, `get_component`, `transform`, ...) surface them
/// as panics; the `try_*` forms return them.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// `add` on a component the entity already has.
    #[error("can't add component '{component}' to {entity}: it already exists")]
    AlreadyPresent {
        /// Component type name.
        component: String,
        /// Target entity.
        entity: Entity,
    },

    /// `get` on a component the entity doesn't have.
    #[error("component '{component}' not found on {entity}")]
    NotPresent {
        /// Component type name.
        component: String,
        /// Target entity.
        entity: Entity,
    },

    /// More distinct component types than configured pools.
    #[error("out of component pools: '{component}' needs slot {index} but only {capacity} exist")]
    OutOfPools {
        /// Component type name.
        component: String,
        /// The slot the type would have received.
        index: usize,
        /// Configured pool count.
        capacity: usize,
    },

    /// The entity handle is not live in the native engine.
    #[error("invalid entity handle {0}")]
    InvalidEntity(Entity),

    /// No component type with this name in the loaded module.
    #[error("unknown component type '{0}'")]
    UnknownType(String),

    /// Operation not supported on a native-backed component.
    #[error("'{0}' is a builtin component; its data lives in the engine")]
    Builtin(String),

    /// Value or storage of the wrong concrete type for the slot.
    #[error("type mismatch for component '{0}'")]
    TypeMismatch(String),

    /// The start hook destroyed its own entity.
    #[error("{entity} was destroyed while starting component '{component}'")]
    DestroyedDuringStart {
        /// Component type name.
        component: String,
        /// The entity that no longer exists.
        entity: Entity,
    },

    /// Component encoding failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
}
