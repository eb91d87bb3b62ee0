//! Entity handle.
//!
//! An [`Entity`] is a plain `u32` handed out by the native engine. The
//! scripting layer never allocates ids itself, and a handle can go stale the
//! moment the engine destroys its entity, so validity is always checked
//! against the engine (see [`Registry::valid`](crate::Registry::valid)).

use serde::{Deserialize, Serialize};
use worlds_native::{EntityId, NULL_ENTITY_ID};

/// A handle to an engine-owned entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(u32);

impl Entity {
    /// The null entity sentinel.
    pub const NULL: Entity = Entity(NULL_ENTITY_ID);

    /// Wrap a raw engine id.
    #[must_use]
    pub const fn from_raw(id: EntityId) -> Self {
        Self(id)
    }

    /// Returns the raw engine id.
    #[must_use]
    pub const fn id(self) -> EntityId {
        self.0
    }

    /// Returns `true` for [`Entity::NULL`].
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == NULL_ENTITY_ID
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::NULL
    }
}

impl From<EntityId> for Entity {
    fn from(id: EntityId) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "Entity(null)")
        } else {
            write!(f, "Entity({})", self.0)
        }
    }
}
