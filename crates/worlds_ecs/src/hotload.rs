//! Hotload and scene persistence of managed components.
//!
//! A code reload runs in three steps:
//!
//! 1. [`Registry::serialize_for_hotload`] encodes every instance of every
//!    hotload-tracked type into the engine's per-entity persisted info, keyed
//!    by type name, then discards all storages. Untracked types are dropped.
//! 2. [`Registry::load_module`] installs the component module of the newly
//!    loaded code and recreates storage for every tracked type it still
//!    provides.
//! 3. [`Registry::restore_persisted_components`] hands each persisted record
//!    back to [`Registry::deserialize_managed_component`], which resolves the
//!    name against the new module and decodes into fresh storage.
//!
//! Start hooks are not run during restore. Call
//! [`Registry::on_scene_start`] once the scene is ready.
//!
//! Pool indices survive the cycle because [`TypeSlots`](crate::TypeSlots)
//! is owned by the registry, not by the storages.

use tracing::{debug, error, info, warn};
use worlds_native::{PersistedComponent, PersistedEntityInfo};

use crate::entity::Entity;
use crate::error::RegistryError;
use crate::module::{Backing, ComponentModule};
use crate::registry::Registry;

impl Registry {
    /// Returns `true` if instances of `name` persist across code reloads.
    #[must_use]
    pub fn is_hotload_tracked(&self, name: &str) -> bool {
        self.tracked.contains(name) || self.module.resolve(name).is_some_and(|d| d.is_hotload())
    }

    /// Encode every tracked component into the engine's persisted info and
    /// discard all managed state tied to the current code: storages, staged
    /// tasks and systems.
    pub fn serialize_for_hotload(&mut self) {
        let codec = self.config.codec;
        let mut persisted = 0_usize;
        let mut dropped = 0_usize;

        for index in 0..self.storages.len() {
            let Some(slot) = self.storages[index].take() else {
                continue;
            };
            let name = slot.vtable.name;
            if !slot.storage.is_hotload() {
                dropped += slot.storage.len();
                debug!(component = name, slot = index, "untracked storage discarded");
                continue;
            }

            self.tracked.insert(name.to_string());
            for &entity in slot.storage.entities() {
                match slot.storage.encode(entity, codec) {
                    Some(Ok(bytes)) => {
                        self.native
                            .set_serialized_entity_info(entity.id(), name, &bytes);
                        persisted += 1;
                    }
                    Some(Err(err)) => {
                        error!(component = name, %entity, error = %err, "failed to encode component");
                    }
                    None => {}
                }
            }
        }

        let tasks = self.tasks.len();
        self.tasks.clear();
        self.clear_systems();
        info!(persisted, dropped, tasks, "managed state serialized for hotload");
    }

    /// Install the component module of freshly loaded code.
    ///
    /// Tracked type names accumulate over the life of the registry; every
    /// tracked type the new module still provides gets its storage back.
    pub fn load_module(&mut self, module: ComponentModule) {
        for name in module.hotload_names() {
            self.tracked.insert(name.to_string());
        }
        for name in &self.tracked {
            if module.resolve(name).is_none() {
                warn!(component = %name, "tracked component type missing from loaded module");
            }
        }

        self.module = module;
        let vtables: Vec<_> = self
            .tracked
            .iter()
            .filter_map(|name| match self.module.resolve(name)?.backing {
                Backing::Local(vtable) => Some(vtable),
                Backing::Native(_) => None,
            })
            .collect();
        for vtable in vtables {
            if let Err(err) = self.assure_slot(vtable) {
                error!(component = vtable.name, error = %err, "can't restore tracked storage");
            }
        }
        info!(types = self.module.len(), "component module loaded");
    }

    /// Restore every record the engine has persisted since the last call.
    /// Returns the number of components restored.
    pub fn restore_persisted_components(&mut self) -> usize {
        let persisted = self.native.take_serialized_entity_info();
        let total = persisted.len();
        let mut restored = 0_usize;
        for PersistedComponent { entity, key, value } in persisted {
            if self.deserialize_managed_component(&key, &value, Entity::from_raw(entity)) {
                restored += 1;
            }
        }
        if total > 0 {
            info!(restored, skipped = total - restored, "persisted components restored");
        }
        restored
    }

    /// Restore the persisted records of `entity` only. Records of other
    /// entities are handed back to the engine and stay pending. Returns the
    /// number of components restored.
    pub fn restore_entity_components(&mut self, entity: Entity) -> usize {
        let mut restored = 0_usize;
        for PersistedComponent { entity: id, key, value } in self.native.take_serialized_entity_info() {
            if id != entity.id() {
                self.native.set_serialized_entity_info(id, &key, &value);
                continue;
            }
            if self.deserialize_managed_component(&key, &value, entity) {
                restored += 1;
            }
        }
        restored
    }

    /// Decode one persisted component onto `entity`. Returns `false` if the
    /// record was skipped because its type no longer exists, is a builtin, or
    /// the entity is gone. Start hooks are not run.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` can't be decoded as the named type. Records reach
    /// this path only after being encoded by [`Registry::serialize_for_hotload`]
    /// in the same process, so a decode failure means the persisted state is
    /// corrupt.
    pub fn deserialize_managed_component(&mut self, name: &str, bytes: &[u8], entity: Entity) -> bool {
        match self.decode_component(name, bytes, entity) {
            Ok(restored) => restored,
            Err(RegistryError::Codec(err)) => {
                panic!("corrupted hotload state for '{name}' on {entity}: {err}")
            }
            Err(err) => {
                error!(component = name, %entity, error = %err, "can't restore component");
                false
            }
        }
    }

    /// Reload code in place: serialize, install `module`, restore.
    pub fn reload(&mut self, module: ComponentModule) {
        self.serialize_for_hotload();
        self.load_module(module);
        self.restore_persisted_components();
    }

    /// Encode every managed component of `entity` into a save context.
    /// Unlike a hotload, untracked types are included. Returns the number of
    /// components written.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Codec`] if a component fails to encode.
    pub fn serialize_managed_components(
        &self,
        entity: Entity,
        info: &mut PersistedEntityInfo,
    ) -> Result<usize, RegistryError> {
        let codec = self.config.codec;
        let mut written = 0_usize;
        for slot in self.storages.iter().flatten() {
            if let Some(encoded) = slot.storage.encode(entity, codec) {
                info.set(slot.vtable.name, &encoded?);
                written += 1;
            }
        }
        Ok(written)
    }

    /// Restore the managed components of `entity` from a save context.
    /// Records that fail to decode are logged and skipped. Returns the number
    /// of components restored.
    pub fn load_entity_components(&mut self, entity: Entity, info: &PersistedEntityInfo) -> usize {
        let mut restored = 0_usize;
        for (name, bytes) in info.iter() {
            match self.decode_component(name, bytes, entity) {
                Ok(true) => restored += 1,
                Ok(false) => {}
                Err(err) => warn!(component = name, %entity, error = %err, "skipping saved component"),
            }
        }
        restored
    }

    fn decode_component(
        &mut self,
        name: &str,
        bytes: &[u8],
        entity: Entity,
    ) -> Result<bool, RegistryError> {
        let Some(descriptor) = self.module.resolve(name).copied() else {
            warn!(component = name, %entity, "component type no longer exists, dropping");
            return Ok(false);
        };
        let Backing::Local(vtable) = descriptor.backing else {
            warn!(component = name, %entity, "persisted record for builtin component ignored");
            return Ok(false);
        };
        if !self.valid(entity) {
            warn!(component = name, %entity, "persisted record for dead entity ignored");
            return Ok(false);
        }

        let index = self.assure_slot(vtable)?;
        let codec = self.config.codec;
        let slot = self
            .storages
            .get_mut(index)
            .and_then(Option::as_mut)
            .ok_or_else(|| RegistryError::TypeMismatch(name.to_string()))?;
        slot.storage.decode_into(entity, bytes, codec)?;
        Ok(true)
    }
}
