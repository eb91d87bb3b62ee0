//! Keyed storage for encoded component data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::boundary::EntityId;

/// One encoded component handed back by the engine during a reload or load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedComponent {
    /// The entity the component belongs to.
    pub entity: EntityId,
    /// Fully-qualified component type name.
    pub key: String,
    /// Encoded component record.
    pub value: Vec<u8>,
}

/// Per-entity save context: component type name → encoded record.
///
/// Writing the same key twice keeps the last value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedEntityInfo {
    components: BTreeMap<String, Vec<u8>>,
}

impl PersistedEntityInfo {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an encoded component under `key`.
    pub fn set(&mut self, key: &str, value: &[u8]) {
        self.components.insert(key.to_string(), value.to_vec());
    }

    /// Encoded record stored under `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.components.get(key).map(Vec::as_slice)
    }

    /// Iterate `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.components
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of stored components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Convert into engine-delivered triples for `entity`.
    #[must_use]
    pub fn into_components(self, entity: EntityId) -> Vec<PersistedComponent> {
        self.components
            .into_iter()
            .map(|(key, value)| PersistedComponent { entity, key, value })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_overwrites_key() {
        let mut info = PersistedEntityInfo::new();
        info.set("game::Ammo", &[1, 2]);
        info.set("game::Ammo", &[3]);
        assert_eq!(info.len(), 1);
        assert_eq!(info.get("game::Ammo"), Some(&[3u8][..]));
    }

    #[test]
    fn test_into_components_keeps_key_order() {
        let mut info = PersistedEntityInfo::new();
        info.set("b", &[2]);
        info.set("a", &[1]);
        let triples = info.into_components(7);
        assert_eq!(triples.len(), 2);
        assert_eq!(triples[0].key, "a");
        assert!(triples.iter().all(|t| t.entity == 7));
    }
}
