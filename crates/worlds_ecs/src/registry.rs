//! The registry facade.
//!
//! [`Registry`] is the single entry point for game code and for the native
//! engine. It owns one storage per component type, indexed by the pool index
//! from [`TypeSlots`], and forwards everything entity-related to the
//! [`NativeRegistry`] it wraps.
//!
//! # Hooks and detached instances
//!
//! Start, think and collision hooks take `&mut Registry`. To make that
//! possible the instance being called is taken out of its storage for the
//! duration of the hook and put back afterwards, unless the hook removed the
//! component or destroyed the entity. While detached, `has_component` for
//! that `(entity, type)` pair returns `false`.
//!
//! # Start phases
//!
//! [`Registry::on_scene_start`] and [`Registry::create_prefab`] snapshot
//! every start-listener `(pool, entity)` pair before calling any hook. A pair
//! is started at most once per phase, so a component added by another start
//! hook is started by the add and then skipped.
//!
//! # Tick order
//!
//! [`Registry::tick`] advances [`Time`], collects native destroy
//! notifications, runs [`GameSystem`]s, resumes due [`StagedTask`]s, updates
//! thinking components and finally flushes [`Registry::destroy_next`]
//! requests.

use std::any::Any;
use std::collections::BTreeSet;

use tracing::{debug, warn};
use worlds_math::Transform;
use worlds_native::{AssetId, BuiltinKind, NO_NAME, NativeRegistry};

use crate::builtin::BuiltinComponent;
use crate::component::{Component, ComponentVTable, ContactInfo};
use crate::config::RegistryConfig;
use crate::entity::Entity;
use crate::error::RegistryError;
use crate::module::{Backing, ComponentDescriptor, ComponentModule};
use crate::slots::TypeSlots;
use crate::storage::{ComponentStorage, ErasedStorage};
use crate::tasks::{StagedTask, TaskQueue, TaskStep};

/// Simulation clock advanced by [`Registry::tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Time {
    /// Seconds of simulation time since the registry was created.
    pub current: f64,
    /// Length of the last tick in seconds.
    pub delta: f32,
    /// Number of ticks run.
    pub tick: u64,
}

/// Per-tick logic that is not tied to a single component instance.
pub trait GameSystem {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Called once per tick, before thinking components.
    fn on_simulate(&mut self, registry: &mut Registry);
}

/// A component reached through the by-name API.
pub enum ComponentRef<'a> {
    /// A locally stored instance.
    Local(&'a mut dyn Any),
    /// A native-backed component. Build a view with the matching
    /// [`BuiltinComponent`] to read it.
    Native {
        /// Engine-side kind.
        kind: BuiltinKind,
        /// Owning entity.
        entity: Entity,
    },
}

impl<'a> ComponentRef<'a> {
    /// Downcast a local instance to `T`.
    #[must_use]
    pub fn downcast_mut<T: Component>(self) -> Option<&'a mut T> {
        match self {
            Self::Local(any) => any.downcast_mut::<T>(),
            Self::Native { .. } => None,
        }
    }

    /// Returns `true` for native-backed components.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Native { .. })
    }
}

impl std::fmt::Debug for ComponentRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(_) => f.write_str("ComponentRef::Local(..)"),
            Self::Native { kind, entity } => f
                .debug_struct("ComponentRef::Native")
                .field("kind", kind)
                .field("entity", entity)
                .finish(),
        }
    }
}

/// One populated pool, as reported by [`Registry::debug_pools`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolInfo {
    /// Pool index.
    pub index: usize,
    /// Component type name.
    pub name: &'static str,
    /// Live instances.
    pub len: usize,
    /// Persists across reloads.
    pub hotload: bool,
    /// Updated every tick.
    pub thinking: bool,
}

pub(crate) struct StorageSlot {
    pub(crate) vtable: ComponentVTable,
    pub(crate) storage: Box<dyn ErasedStorage>,
}

/// An instance temporarily taken out of storage while its hook runs.
struct Detached {
    index: usize,
    entity: Entity,
    removed: bool,
}

/// The scripting-side component registry.
pub struct Registry {
    pub(crate) native: Box<dyn NativeRegistry>,
    pub(crate) config: RegistryConfig,
    pub(crate) type_slots: TypeSlots,
    pub(crate) storages: Vec<Option<StorageSlot>>,
    pub(crate) module: ComponentModule,
    pub(crate) tracked: BTreeSet<String>,
    pub(crate) tasks: TaskQueue,
    systems: Vec<Box<dyn GameSystem>>,
    pending_destroy: Vec<Entity>,
    detached: Vec<Detached>,
    start_phase: Option<BTreeSet<(usize, Entity)>>,
    time: Time,
}

impl Registry {
    /// Create a registry over `native` with only the builtin component types
    /// known. Call [`Registry::load_module`] to make game types resolvable
    /// by name.
    #[must_use]
    pub fn new(native: Box<dyn NativeRegistry>, config: RegistryConfig) -> Self {
        let mut storages = Vec::with_capacity(config.pool_count);
        storages.resize_with(config.pool_count, || None);
        Self {
            native,
            type_slots: TypeSlots::new(config.pool_count),
            storages,
            config,
            module: ComponentModule::new(),
            tracked: BTreeSet::new(),
            tasks: TaskQueue::default(),
            systems: Vec::new(),
            pending_destroy: Vec::new(),
            detached: Vec::new(),
            start_phase: None,
            time: Time::default(),
        }
    }

    /// The wrapped native engine.
    #[must_use]
    pub fn native(&self) -> &dyn NativeRegistry {
        self.native.as_ref()
    }

    /// The wrapped native engine, mutably.
    pub fn native_mut(&mut self) -> &mut dyn NativeRegistry {
        self.native.as_mut()
    }

    /// The wrapped native engine as its concrete type.
    pub fn native_as_mut<N: NativeRegistry + 'static>(&mut self) -> Option<&mut N> {
        self.native.as_any_mut().downcast_mut::<N>()
    }

    /// Pool count and codec this registry was created with.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Simulation clock.
    #[must_use]
    pub fn time(&self) -> Time {
        self.time
    }

    /// The currently loaded component module.
    #[must_use]
    pub fn module(&self) -> &ComponentModule {
        &self.module
    }

    // -- Entities --

    /// Create an entity with a default transform.
    pub fn create(&mut self) -> Entity {
        Entity::from_raw(self.native.create())
    }

    /// Instantiate a prefab. Managed components carried by the prefab are
    /// restored and their start hooks run. Persisted records of other
    /// entities stay pending. Returns [`Entity::NULL`] if the engine does not
    /// know the asset.
    pub fn create_prefab(&mut self, asset: AssetId) -> Entity {
        let entity = Entity::from_raw(self.native.create_prefab(asset));
        if entity.is_null() {
            warn!(asset = asset.0, "prefab instantiation failed");
            return entity;
        }

        self.restore_entity_components(entity);
        let pairs = self.start_listener_pairs(Some(entity));
        self.dispatch_start(pairs);
        entity
    }

    /// Resolve an asset path to an id.
    #[must_use]
    pub fn asset_id(&self, path: &str) -> AssetId {
        self.native.asset_id(path)
    }

    /// Destroy an entity now. Every managed component it had is dropped.
    pub fn destroy(&mut self, entity: Entity) {
        self.native.destroy(entity.id());
        self.pump_native_events();
    }

    /// Destroy an entity at the end of the current tick.
    pub fn destroy_next(&mut self, entity: Entity) {
        if !self.pending_destroy.contains(&entity) {
            self.pending_destroy.push(entity);
        }
    }

    /// Returns `true` if the engine still knows `entity`.
    #[must_use]
    pub fn valid(&self, entity: Entity) -> bool {
        !entity.is_null() && self.native.valid(entity.id())
    }

    /// Process destroy notifications queued by the engine.
    pub fn pump_native_events(&mut self) {
        loop {
            let destroyed = self.native.take_destroyed();
            if destroyed.is_empty() {
                break;
            }
            for id in destroyed {
                self.on_native_entity_destroy(Entity::from_raw(id));
            }
        }
    }

    /// Drop every managed component of an entity the engine destroyed.
    pub fn on_native_entity_destroy(&mut self, entity: Entity) {
        let mut purged = 0_usize;
        for slot in self.storages.iter_mut().flatten() {
            if slot.storage.contains(entity) {
                slot.storage.remove(entity);
                purged += 1;
            }
        }
        for detached in self.detached.iter_mut().filter(|d| d.entity == entity) {
            detached.removed = true;
        }
        self.pending_destroy.retain(|e| *e != entity);
        debug!(%entity, purged, "entity destroyed");
    }

    // -- Typed components --

    /// Returns `true` if `entity` has a `T`.
    ///
    /// Inside one of `T`'s own hooks this is `false` for the hooked entity,
    /// since the instance is detached while the hook runs.
    #[must_use]
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.storage::<T>().is_some_and(|s| s.contains(entity))
    }

    /// Add a default `T` to `entity`, run its start hook and return it.
    ///
    /// # Panics
    ///
    /// Panics if the component is already present or the entity is invalid.
    pub fn add_component<T: Component>(&mut self, entity: Entity) -> &mut T {
        match self.try_add_component::<T>(entity) {
            Ok(component) => component,
            Err(err) => panic!("{err}"),
        }
    }

    /// Add a default `T` to `entity`, run its start hook and return it.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::InvalidEntity`] if the engine doesn't know `entity`.
    /// - [`RegistryError::AlreadyPresent`] if `entity` already has a `T`.
    /// - [`RegistryError::OutOfPools`] if `T` needs a new pool and none is left.
    /// - [`RegistryError::DestroyedDuringStart`] if the start hook destroyed
    ///   the entity.
    pub fn try_add_component<T: Component>(
        &mut self,
        entity: Entity,
    ) -> Result<&mut T, RegistryError> {
        if !self.valid(entity) {
            return Err(RegistryError::InvalidEntity(entity));
        }
        if self.has_component::<T>(entity) {
            return Err(RegistryError::AlreadyPresent {
                component: T::type_name().to_string(),
                entity,
            });
        }

        self.assure_storage::<T>()?.set(entity, T::default());
        if T::START_LISTENER {
            if let Some(index) = self.type_slots.get(T::type_name()) {
                self.mark_started(index, entity);
            }
            self.run_detached::<T>(entity, |component, entity, registry| {
                component.start(entity, registry);
            });
        }

        if !self.valid(entity) {
            return Err(RegistryError::DestroyedDuringStart {
                component: T::type_name().to_string(),
                entity,
            });
        }
        self.try_get_component_mut::<T>(entity)
            .ok_or_else(|| RegistryError::NotPresent {
                component: T::type_name().to_string(),
                entity,
            })
    }

    /// Insert or replace `entity`'s `T` without running hooks.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidEntity`] or
    /// [`RegistryError::OutOfPools`].
    pub fn set_component<T: Component>(
        &mut self,
        entity: Entity,
        component: T,
    ) -> Result<&mut T, RegistryError> {
        if !self.valid(entity) {
            return Err(RegistryError::InvalidEntity(entity));
        }
        Ok(self.assure_storage::<T>()?.set(entity, component))
    }

    /// # Panics
    ///
    /// Panics if `entity` has no `T`. That includes calls from one of `T`'s
    /// own hooks for the hooked entity, whose instance is detached and passed
    /// to the hook as `self` instead.
    #[must_use]
    pub fn get_component<T: Component>(&self, entity: Entity) -> &T {
        match self.try_get_component::<T>(entity) {
            Some(component) => component,
            None => panic!("{}", not_present::<T>(entity)),
        }
    }

    /// # Panics
    ///
    /// Panics if `entity` has no `T`, including from `T`'s own hooks as for
    /// [`Registry::get_component`].
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> &mut T {
        match self.try_get_component_mut::<T>(entity) {
            Some(component) => component,
            None => panic!("{}", not_present::<T>(entity)),
        }
    }

    /// `entity`'s `T`, or `None` if it has none or the instance is detached
    /// for a running hook.
    #[must_use]
    pub fn try_get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.storage::<T>()?.get(entity)
    }

    /// Mutable form of [`Registry::try_get_component`].
    pub fn try_get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.storage_mut::<T>()?.get_mut(entity)
    }

    /// Remove `entity`'s `T`. Returns `true` if it had one.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> bool {
        let Some(index) = self.type_slots.get(T::type_name()) else {
            return false;
        };
        self.remove_at(index, entity)
    }

    // -- Builtin components --

    /// Returns `true` if the engine holds a `B` for `entity`.
    #[must_use]
    pub fn has_builtin<B: BuiltinComponent>(&self, entity: Entity) -> bool {
        self.native.has_builtin(B::KIND, entity.id())
    }

    /// # Panics
    ///
    /// Panics if the builtin is already present or the entity is invalid.
    pub fn add_builtin<B: BuiltinComponent>(&mut self, entity: Entity) -> B::View<'_> {
        match self.try_add_builtin::<B>(entity) {
            Ok(view) => view,
            Err(err) => panic!("{err}"),
        }
    }

    /// Attach a builtin to `entity` and return a view of it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidEntity`] or
    /// [`RegistryError::AlreadyPresent`].
    pub fn try_add_builtin<B: BuiltinComponent>(
        &mut self,
        entity: Entity,
    ) -> Result<B::View<'_>, RegistryError> {
        if !self.valid(entity) {
            return Err(RegistryError::InvalidEntity(entity));
        }
        if self.has_builtin::<B>(entity) {
            return Err(RegistryError::AlreadyPresent {
                component: B::NAME.to_string(),
                entity,
            });
        }
        self.native.emplace_builtin(B::KIND, entity.id());
        Ok(B::view(self.native.as_mut(), entity))
    }

    /// # Panics
    ///
    /// Panics if `entity` doesn't have the builtin.
    pub fn get_builtin<B: BuiltinComponent>(&mut self, entity: Entity) -> B::View<'_> {
        match self.try_get_builtin::<B>(entity) {
            Ok(view) => view,
            Err(err) => panic!("{err}"),
        }
    }

    /// Build a fresh view of `entity`'s builtin.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotPresent`] if the entity doesn't have it.
    pub fn try_get_builtin<B: BuiltinComponent>(
        &mut self,
        entity: Entity,
    ) -> Result<B::View<'_>, RegistryError> {
        if !self.has_builtin::<B>(entity) {
            return Err(RegistryError::NotPresent {
                component: B::NAME.to_string(),
                entity,
            });
        }
        Ok(B::view(self.native.as_mut(), entity))
    }

    /// Detach a builtin. The engine is not asked whether it was present.
    pub fn remove_builtin<B: BuiltinComponent>(&mut self, entity: Entity) {
        self.native.remove_builtin(B::KIND, entity.id());
    }

    // -- Components by name --

    /// Resolve a component type name against the loaded module.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownType`] if the module doesn't know it.
    pub fn resolve(&self, name: &str) -> Result<ComponentDescriptor, RegistryError> {
        self.module
            .resolve(name)
            .copied()
            .ok_or_else(|| RegistryError::UnknownType(name.to_string()))
    }

    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownType`] for unresolvable names.
    pub fn has_component_named(&self, entity: Entity, name: &str) -> Result<bool, RegistryError> {
        Ok(match self.resolve(name)?.backing {
            Backing::Local(_) => self
                .type_slots
                .get(name)
                .and_then(|index| self.storages.get(index)?.as_ref())
                .is_some_and(|slot| slot.storage.contains(entity)),
            Backing::Native(kind) => self.native.has_builtin(kind, entity.id()),
        })
    }

    /// Add a default instance of the named type, running its start hook.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::try_add_component`], plus
    /// [`RegistryError::UnknownType`].
    pub fn add_component_named(
        &mut self,
        entity: Entity,
        name: &str,
    ) -> Result<ComponentRef<'_>, RegistryError> {
        if !self.valid(entity) {
            return Err(RegistryError::InvalidEntity(entity));
        }
        if self.has_component_named(entity, name)? {
            return Err(RegistryError::AlreadyPresent {
                component: name.to_string(),
                entity,
            });
        }

        match self.resolve(name)?.backing {
            Backing::Local(vtable) => {
                let index = self.assure_slot(vtable)?;
                self.set_boxed_at(index, entity, (vtable.new_boxed)())?;
                if vtable.start_listener {
                    self.mark_started(index, entity);
                    (vtable.start)(self, entity);
                }
                if !self.valid(entity) {
                    return Err(RegistryError::DestroyedDuringStart {
                        component: name.to_string(),
                        entity,
                    });
                }
                self.get_component_named(entity, name)
            }
            Backing::Native(kind) => {
                self.native.emplace_builtin(kind, entity.id());
                Ok(ComponentRef::Native { kind, entity })
            }
        }
    }

    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownType`] or [`RegistryError::NotPresent`].
    pub fn get_component_named(
        &mut self,
        entity: Entity,
        name: &str,
    ) -> Result<ComponentRef<'_>, RegistryError> {
        let not_present = || RegistryError::NotPresent {
            component: name.to_string(),
            entity,
        };
        match self.resolve(name)?.backing {
            Backing::Local(_) => {
                let index = self.type_slots.get(name).ok_or_else(not_present)?;
                self.storages
                    .get_mut(index)
                    .and_then(Option::as_mut)
                    .and_then(|slot| slot.storage.get_boxed_mut(entity))
                    .map(ComponentRef::Local)
                    .ok_or_else(not_present)
            }
            Backing::Native(kind) => {
                if self.native.has_builtin(kind, entity.id()) {
                    Ok(ComponentRef::Native { kind, entity })
                } else {
                    Err(not_present())
                }
            }
        }
    }

    /// Remove the named component. Builtins are removed unconditionally.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownType`] for unresolvable names.
    pub fn remove_component_named(
        &mut self,
        entity: Entity,
        name: &str,
    ) -> Result<bool, RegistryError> {
        match self.resolve(name)?.backing {
            Backing::Local(_) => Ok(self
                .type_slots
                .get(name)
                .is_some_and(|index| self.remove_at(index, entity))),
            Backing::Native(kind) => {
                self.native.remove_builtin(kind, entity.id());
                Ok(true)
            }
        }
    }

    /// Insert or replace the named component from a boxed value, without
    /// running hooks.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Builtin`] for native-backed types.
    /// - [`RegistryError::TypeMismatch`] if `value` is not of the named type.
    pub fn set_component_boxed(
        &mut self,
        entity: Entity,
        name: &str,
        value: Box<dyn Any>,
    ) -> Result<(), RegistryError> {
        match self.resolve(name)?.backing {
            Backing::Local(vtable) => {
                let index = self.assure_slot(vtable)?;
                self.set_boxed_at(index, entity, value)
            }
            Backing::Native(_) => Err(RegistryError::Builtin(name.to_string())),
        }
    }

    // -- Transforms and names --

    /// # Panics
    ///
    /// Panics if `entity` is not valid.
    #[must_use]
    pub fn transform(&self, entity: Entity) -> Transform {
        match self.try_transform(entity) {
            Ok(transform) => transform,
            Err(err) => panic!("{err}"),
        }
    }

    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidEntity`] if `entity` is not valid.
    pub fn try_transform(&self, entity: Entity) -> Result<Transform, RegistryError> {
        if !self.valid(entity) {
            return Err(RegistryError::InvalidEntity(entity));
        }
        Ok(self.native.transform(entity.id()))
    }

    /// Move `entity`. Ignored by the engine if the entity is not valid.
    pub fn set_transform(&mut self, entity: Entity, transform: &Transform) {
        self.native.set_transform(entity.id(), transform);
    }

    /// Returns `true` if `entity` has a display name.
    #[must_use]
    pub fn has_name(&self, entity: Entity) -> bool {
        self.native.entity_name_length(entity.id()) != NO_NAME
    }

    /// The entity's display name, if it has one.
    #[must_use]
    pub fn name(&self, entity: Entity) -> Option<String> {
        let length = self.native.entity_name_length(entity.id());
        if length == NO_NAME {
            return None;
        }
        let mut name = String::with_capacity(length as usize);
        self.native.entity_name(entity.id(), &mut name);
        Some(name)
    }

    /// Set or clear (`None`) the display name.
    pub fn set_name(&mut self, entity: Entity, name: Option<&str>) {
        self.native.set_entity_name(entity.id(), name);
    }

    // -- Queries --

    /// Call `f` for every entity the engine knows.
    pub fn each(&self, mut f: impl FnMut(Entity)) {
        self.native.each(&mut |id| f(Entity::from_raw(id)));
    }

    /// First entity named `name`, or [`Entity::NULL`].
    ///
    /// Scans every entity; not for per-tick use.
    #[must_use]
    pub fn find(&self, name: &str) -> Entity {
        let native = self.native.as_ref();
        let mut found = Entity::NULL;
        let mut buffer = String::new();
        native.each(&mut |id| {
            if !found.is_null() || native.entity_name_length(id) == NO_NAME {
                return;
            }
            native.entity_name(id, &mut buffer);
            if buffer == name {
                found = Entity::from_raw(id);
            }
        });
        found
    }

    /// The storage for `T`, created if needed.
    ///
    /// # Panics
    ///
    /// Panics if `T` needs a new pool and none is left.
    pub fn view<T: Component>(&mut self) -> &ComponentStorage<T> {
        match self.assure_storage::<T>() {
            Ok(storage) => storage,
            Err(err) => panic!("{err}"),
        }
    }

    /// The storage for `T`, created if needed.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::OutOfPools`] or
    /// [`RegistryError::TypeMismatch`].
    pub fn try_view_mut<T: Component>(&mut self) -> Result<&mut ComponentStorage<T>, RegistryError> {
        self.assure_storage::<T>()
    }

    /// Entities that currently have a `T`.
    #[must_use]
    pub fn entities_with<T: Component>(&self) -> Vec<Entity> {
        self.storage::<T>()
            .map(|s| s.entities().to_vec())
            .unwrap_or_default()
    }

    /// Summary of every populated pool.
    #[must_use]
    pub fn debug_pools(&self) -> Vec<PoolInfo> {
        self.storages
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let slot = slot.as_ref()?;
                Some(PoolInfo {
                    index,
                    name: slot.vtable.name,
                    len: slot.storage.len(),
                    hotload: slot.storage.is_hotload(),
                    thinking: slot.vtable.thinking,
                })
            })
            .collect()
    }

    // -- Lifecycle --

    /// Run one simulation tick of `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        self.time.delta = dt;
        self.time.current += f64::from(dt);
        self.time.tick += 1;

        self.pump_native_events();
        self.run_systems();
        self.run_due_tasks();
        self.update_thinking_components();
        self.flush_pending_destroys();
        self.pump_native_events();
    }

    /// Call the think hook of every thinking component, pool by pool.
    ///
    /// Thinking components added during the pass first think on the next one.
    pub fn update_thinking_components(&mut self) {
        let pairs: Vec<_> = self
            .storages
            .iter()
            .flatten()
            .filter(|slot| slot.vtable.thinking)
            .flat_map(|slot| {
                let think = slot.vtable.think;
                slot.storage.entities().iter().map(move |&entity| (think, entity))
            })
            .collect();
        for (think, entity) in pairs {
            think(self, entity);
        }
    }

    /// Call the start hook of every start-listener component already live,
    /// typically after a scene load or a reload.
    pub fn on_scene_start(&mut self) {
        let pairs = self.start_listener_pairs(None);
        let started = self.dispatch_start(pairs);
        debug!(started, "scene start dispatched");
    }

    /// Deliver a physics contact to every collision handler on `entity`.
    pub fn dispatch_collision(&mut self, entity: Entity, contact: &ContactInfo) {
        for index in 0..self.storages.len() {
            let Some(slot) = &self.storages[index] else {
                continue;
            };
            if slot.vtable.collision_handler && slot.storage.contains(entity) {
                let collide = slot.vtable.collide;
                collide(self, entity, contact);
            }
        }
    }

    /// Register a system run every tick.
    pub fn add_system(&mut self, system: Box<dyn GameSystem>) {
        debug!(system = system.name(), "system added");
        self.systems.push(system);
    }

    /// Run `task` on the next tick.
    pub fn schedule(&mut self, task: Box<dyn StagedTask>) {
        self.schedule_after(0.0, task);
    }

    /// Run `task` once `delay` seconds of simulation time have passed.
    pub fn schedule_after(&mut self, delay: f64, task: Box<dyn StagedTask>) {
        self.tasks.push(task, self.time.current + delay);
    }

    /// Number of tasks waiting to run.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Live `(pool, entity)` pairs of every start-listener type, optionally
    /// limited to one entity.
    fn start_listener_pairs(&self, only: Option<Entity>) -> Vec<(usize, Entity)> {
        self.storages
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| Some((index, slot.as_ref()?)))
            .filter(|(_, slot)| slot.vtable.start_listener)
            .flat_map(|(index, slot)| {
                slot.storage
                    .entities()
                    .iter()
                    .filter(move |&&entity| only.is_none_or(|only| only == entity))
                    .map(move |&entity| (index, entity))
            })
            .collect()
    }

    /// Start every pair still live, skipping pairs already started in the
    /// current phase. Returns the number of hooks called.
    fn dispatch_start(&mut self, pairs: Vec<(usize, Entity)>) -> usize {
        let outermost = self.start_phase.is_none();
        if outermost {
            self.start_phase = Some(BTreeSet::new());
        }

        let mut started = 0_usize;
        for (index, entity) in pairs {
            let Some(slot) = self.storages.get(index).and_then(Option::as_ref) else {
                continue;
            };
            if !slot.storage.contains(entity) {
                continue;
            }
            let start = slot.vtable.start;
            if !self.mark_started(index, entity) {
                continue;
            }
            start(self, entity);
            started += 1;
        }

        if outermost {
            self.start_phase = None;
        }
        started
    }

    /// Record a start in the current phase. Returns `false` if the pair was
    /// already started in it.
    fn mark_started(&mut self, index: usize, entity: Entity) -> bool {
        self.start_phase
            .as_mut()
            .is_none_or(|phase| phase.insert((index, entity)))
    }

    pub(crate) fn clear_systems(&mut self) {
        self.systems.clear();
    }

    fn run_systems(&mut self) {
        let mut systems = std::mem::take(&mut self.systems);
        for system in &mut systems {
            system.on_simulate(self);
        }
        systems.append(&mut self.systems);
        self.systems = systems;
    }

    fn run_due_tasks(&mut self) {
        for mut scheduled in self.tasks.take_due(self.time.current) {
            if let Some(owner) = scheduled.task.owner()
                && !self.valid(owner)
            {
                debug!(task = scheduled.task.name(), %owner, "task cancelled, owner destroyed");
                continue;
            }
            match scheduled.task.step(self) {
                TaskStep::Wait(delay) => {
                    self.tasks
                        .push(scheduled.task, self.time.current + delay.max(0.0));
                }
                TaskStep::Done => {}
            }
        }
    }

    fn flush_pending_destroys(&mut self) {
        for entity in std::mem::take(&mut self.pending_destroy) {
            if self.valid(entity) {
                self.destroy(entity);
            }
        }
    }

    // -- Storage plumbing --

    pub(crate) fn storage<T: Component>(&self) -> Option<&ComponentStorage<T>> {
        let index = self.type_slots.get(T::type_name())?;
        self.storages
            .get(index)?
            .as_ref()?
            .storage
            .as_any()
            .downcast_ref()
    }

    pub(crate) fn storage_mut<T: Component>(&mut self) -> Option<&mut ComponentStorage<T>> {
        let index = self.type_slots.get(T::type_name())?;
        self.storages
            .get_mut(index)?
            .as_mut()?
            .storage
            .as_any_mut()
            .downcast_mut()
    }

    fn assure_storage<T: Component>(&mut self) -> Result<&mut ComponentStorage<T>, RegistryError> {
        let index = self.assure_slot(ComponentVTable::of::<T>())?;
        self.storages
            .get_mut(index)
            .and_then(Option::as_mut)
            .and_then(|slot| slot.storage.as_any_mut().downcast_mut())
            .ok_or_else(|| RegistryError::TypeMismatch(T::type_name().to_string()))
    }

    /// Pool index for `vtable`'s type, creating its storage if the pool is
    /// empty.
    pub(crate) fn assure_slot(&mut self, vtable: ComponentVTable) -> Result<usize, RegistryError> {
        let index = self.type_slots.index_of(vtable.name)?;
        let hotload = vtable.hotload || self.tracked.contains(vtable.name);
        let slot = self
            .storages
            .get_mut(index)
            .ok_or_else(|| RegistryError::OutOfPools {
                component: vtable.name.to_string(),
                index,
                capacity: self.config.pool_count,
            })?;
        if slot.is_none() {
            debug!(component = vtable.name, slot = index, hotload, "storage created");
            *slot = Some(StorageSlot {
                vtable,
                storage: (vtable.new_storage)(hotload),
            });
        }
        Ok(index)
    }

    fn set_boxed_at(
        &mut self,
        index: usize,
        entity: Entity,
        value: Box<dyn Any>,
    ) -> Result<(), RegistryError> {
        let slot = self
            .storages
            .get_mut(index)
            .and_then(Option::as_mut)
            .ok_or_else(|| RegistryError::TypeMismatch(format!("pool {index}")))?;
        slot.storage
            .set_boxed(entity, value)
            .map_err(|_| RegistryError::TypeMismatch(slot.vtable.name.to_string()))
    }

    fn remove_at(&mut self, index: usize, entity: Entity) -> bool {
        let stored = self
            .storages
            .get_mut(index)
            .and_then(Option::as_mut)
            .is_some_and(|slot| slot.storage.remove(entity));
        let mut detached = false;
        for d in self
            .detached
            .iter_mut()
            .filter(|d| d.index == index && d.entity == entity && !d.removed)
        {
            d.removed = true;
            detached = true;
        }
        stored || detached
    }

    /// Take `entity`'s `T` out of storage, call `f` with it and put it back
    /// unless `f` removed the component or destroyed the entity.
    pub(crate) fn run_detached<T: Component>(
        &mut self,
        entity: Entity,
        f: impl FnOnce(&mut T, Entity, &mut Registry),
    ) {
        let Some(index) = self.type_slots.get(T::type_name()) else {
            return;
        };
        let Some(mut component) = self.storage_mut::<T>().and_then(|s| s.remove(entity)) else {
            return;
        };

        self.detached.push(Detached {
            index,
            entity,
            removed: false,
        });
        f(&mut component, entity, self);

        let position = self
            .detached
            .iter()
            .rposition(|d| d.index == index && d.entity == entity);
        let removed = position.is_none_or(|position| self.detached.remove(position).removed);
        if removed || !self.valid(entity) {
            return;
        }
        if let Some(storage) = self.storage_mut::<T>()
            && !storage.contains(entity)
        {
            storage.set(entity, component);
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("pools", &self.debug_pools())
            .field("time", &self.time)
            .finish_non_exhaustive()
    }
}

fn not_present<T: Component>(entity: Entity) -> RegistryError {
    RegistryError::NotPresent {
        component: T::type_name().to_string(),
        entity,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use serde::{Deserialize, Serialize};
    use worlds_math::Vec3;
    use worlds_native::{HeadlessEngine, Prefab};

    use super::*;
    use crate::builtin::{DynamicPhysicsActor, WorldObject};
    use crate::codec::HotloadCodec;

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(default)]
    struct Health {
        value: f32,
    }

    impl Component for Health {
        fn type_name() -> &'static str {
            "test::Health"
        }
    }

    macro_rules! marker {
        ($name:ident) => {
            #[derive(Debug, Default, Serialize, Deserialize)]
            struct $name;

            impl Component for $name {
                fn type_name() -> &'static str {
                    concat!("test::", stringify!($name))
                }
            }
        };
    }

    marker!(A);
    marker!(B);
    marker!(C);

    thread_local! {
        static STARTS: Cell<u32> = const { Cell::new(0) };
        static THINKS: Cell<u32> = const { Cell::new(0) };
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Starter {
        started: u32,
    }

    impl Component for Starter {
        const START_LISTENER: bool = true;

        fn type_name() -> &'static str {
            "test::Starter"
        }

        fn start(&mut self, entity: Entity, registry: &mut Registry) {
            self.started += 1;
            STARTS.with(|s| s.set(s.get() + 1));
            assert!(!registry.has_component::<Starter>(entity));
            assert!(registry.try_get_component::<Starter>(entity).is_none());
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Counter {
        ticks: u32,
    }

    impl Component for Counter {
        const THINKING: bool = true;

        fn type_name() -> &'static str {
            "test::Counter"
        }

        fn think(&mut self, _entity: Entity, _registry: &mut Registry) {
            self.ticks += 1;
            THINKS.with(|t| t.set(t.get() + 1));
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct SelfDestruct;

    impl Component for SelfDestruct {
        const THINKING: bool = true;
        const COLLISION_HANDLER: bool = true;

        fn type_name() -> &'static str {
            "test::SelfDestruct"
        }

        fn think(&mut self, entity: Entity, registry: &mut Registry) {
            registry.destroy(entity);
        }

        fn on_collision(&mut self, entity: Entity, _contact: &ContactInfo, registry: &mut Registry) {
            registry.remove_component::<SelfDestruct>(entity);
        }
    }

    thread_local! {
        static ECHO_STARTS: Cell<u32> = const { Cell::new(0) };
    }

    /// Start listener counted in `ECHO_STARTS`.
    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Echo;

    impl Component for Echo {
        const START_LISTENER: bool = true;

        fn type_name() -> &'static str {
            "test::Echo"
        }

        fn start(&mut self, _entity: Entity, _registry: &mut Registry) {
            ECHO_STARTS.with(|s| s.set(s.get() + 1));
        }
    }

    /// Start listener that adds an `Echo` to its entity.
    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Rigger;

    impl Component for Rigger {
        const START_LISTENER: bool = true;

        fn type_name() -> &'static str {
            "test::Rigger"
        }

        fn start(&mut self, entity: Entity, registry: &mut Registry) {
            if !registry.has_component::<Echo>(entity) {
                registry.add_component::<Echo>(entity);
            }
        }
    }

    /// Thinking component that adds a `Counter` to its entity.
    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Sprouter;

    impl Component for Sprouter {
        const THINKING: bool = true;

        fn type_name() -> &'static str {
            "test::Sprouter"
        }

        fn think(&mut self, entity: Entity, registry: &mut Registry) {
            if !registry.has_component::<Counter>(entity) {
                registry.add_component::<Counter>(entity);
            }
        }
    }

    fn registry() -> Registry {
        Registry::new(Box::new(HeadlessEngine::new()), RegistryConfig::default())
    }

    fn contact(other: Entity) -> ContactInfo {
        ContactInfo {
            other_entity: other,
            normal: Vec3::Y,
            average_contact_point: Vec3::ZERO,
            relative_speed: 1.0,
        }
    }

    #[test]
    fn test_add_then_get() {
        let mut registry = registry();
        let e = registry.create();
        registry.add_component::<Health>(e).value = 100.0;
        assert!(registry.has_component::<Health>(e));
        assert_eq!(registry.get_component::<Health>(e).value, 100.0);
    }

    #[test]
    fn test_second_add_fails_and_keeps_value() {
        let mut registry = registry();
        let e1 = registry.create();
        registry.add_component::<Health>(e1).value = 100.0;

        let err = registry.try_add_component::<Health>(e1).unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyPresent { .. }));
        assert_eq!(registry.get_component::<Health>(e1).value, 100.0);
    }

    #[test]
    #[should_panic(expected = "already exists")]
    fn test_add_component_panics_when_present() {
        let mut registry = registry();
        let e = registry.create();
        registry.add_component::<Health>(e);
        registry.add_component::<Health>(e);
    }

    #[test]
    #[should_panic(expected = "not found")]
    fn test_get_component_panics_when_absent() {
        let mut registry = registry();
        let e = registry.create();
        let _ = registry.get_component::<Health>(e);
    }

    #[test]
    fn test_remove_component() {
        let mut registry = registry();
        let e = registry.create();
        registry.add_component::<Health>(e);
        assert!(registry.remove_component::<Health>(e));
        assert!(!registry.has_component::<Health>(e));
        assert!(registry.try_get_component::<Health>(e).is_none());
        assert!(!registry.remove_component::<Health>(e));
    }

    #[test]
    fn test_add_to_invalid_entity() {
        let mut registry = registry();
        let e = registry.create();
        registry.destroy(e);
        assert!(matches!(
            registry.try_add_component::<Health>(e),
            Err(RegistryError::InvalidEntity(_))
        ));
    }

    #[test]
    fn test_out_of_pools() {
        let mut registry = Registry::new(
            Box::new(HeadlessEngine::new()),
            RegistryConfig::new().with_pool_count(2),
        );
        let e = registry.create();
        registry.add_component::<A>(e);
        registry.add_component::<B>(e);
        assert!(matches!(
            registry.try_add_component::<C>(e),
            Err(RegistryError::OutOfPools { capacity: 2, .. })
        ));
    }

    #[test]
    fn test_destroy_purges_only_owning_pools() {
        let mut registry = registry();
        let e4 = registry.create();
        let other = registry.create();
        registry.add_component::<A>(e4);
        registry.add_component::<B>(e4);
        registry.add_component::<C>(other);

        registry.destroy(e4);

        assert!(registry.view::<A>().is_empty());
        assert!(registry.view::<B>().is_empty());
        assert_eq!(registry.view::<C>().entities(), &[other]);
    }

    #[test]
    fn test_start_runs_once_on_add_and_once_on_scene_start() {
        STARTS.with(|s| s.set(0));
        let mut registry = registry();
        let e = registry.create();
        assert_eq!(registry.add_component::<Starter>(e).started, 1);
        assert_eq!(STARTS.with(Cell::get), 1);

        registry.on_scene_start();
        assert_eq!(STARTS.with(Cell::get), 2);
        assert_eq!(registry.get_component::<Starter>(e).started, 2);
    }

    #[test]
    fn test_thinking_components_update_every_tick() {
        THINKS.with(|t| t.set(0));
        let mut registry = registry();
        let a = registry.create();
        let b = registry.create();
        registry.add_component::<Counter>(a);
        registry.add_component::<Counter>(b);

        registry.tick(0.1);
        registry.tick(0.1);
        assert_eq!(THINKS.with(Cell::get), 4);
        assert_eq!(registry.get_component::<Counter>(a).ticks, 2);
        assert_eq!(registry.time().tick, 2);
    }

    #[test]
    fn test_hook_destroying_own_entity() {
        let mut registry = registry();
        let e = registry.create();
        registry.add_component::<SelfDestruct>(e);
        registry.add_component::<Health>(e);

        registry.update_thinking_components();

        assert!(!registry.valid(e));
        assert!(registry.view::<SelfDestruct>().is_empty());
        assert!(registry.view::<Health>().is_empty());
    }

    #[test]
    fn test_collision_hook_removing_itself() {
        let mut registry = registry();
        let e = registry.create();
        let other = registry.create();
        registry.add_component::<SelfDestruct>(e);

        registry.dispatch_collision(e, &contact(other));

        assert!(registry.valid(e));
        assert!(!registry.has_component::<SelfDestruct>(e));
    }

    #[test]
    fn test_scene_start_does_not_restart_component_added_by_start() {
        ECHO_STARTS.with(|s| s.set(0));
        let mut registry = registry();
        let a = registry.create();
        let b = registry.create();

        // Rigger takes the lower pool, Echo the higher one.
        registry.add_component::<Rigger>(a);
        assert!(registry.remove_component::<Echo>(a));
        registry.add_component::<Echo>(b);
        ECHO_STARTS.with(|s| s.set(0));

        registry.on_scene_start();

        assert!(registry.has_component::<Echo>(a));
        assert_eq!(ECHO_STARTS.with(Cell::get), 2);
    }

    #[test]
    fn test_prefab_start_does_not_restart_component_added_by_start() {
        ECHO_STARTS.with(|s| s.set(0));
        let mut engine = HeadlessEngine::new();
        let codec = HotloadCodec::default();
        let asset = engine.register_prefab("Prefabs/rig.wprefab", Prefab {
            managed: vec![("test::Rigger".into(), codec.encode(&Rigger).unwrap())],
            ..Prefab::default()
        });
        let mut registry = Registry::new(Box::new(engine), RegistryConfig::default());
        registry.load_module(
            ComponentModule::new()
                .with_component::<Rigger>()
                .with_component::<Echo>(),
        );

        let e = registry.create_prefab(asset);

        assert!(registry.has_component::<Rigger>(e));
        assert!(registry.has_component::<Echo>(e));
        assert_eq!(ECHO_STARTS.with(Cell::get), 1);
    }

    #[test]
    fn test_component_added_by_think_waits_for_next_pass() {
        let mut registry = registry();
        let e = registry.create();
        registry.add_component::<Sprouter>(e);

        registry.update_thinking_components();
        assert_eq!(registry.get_component::<Counter>(e).ticks, 0);

        registry.update_thinking_components();
        assert_eq!(registry.get_component::<Counter>(e).ticks, 1);
    }

    #[test]
    fn test_unnamed_entity() {
        let mut registry = registry();
        let e3 = registry.create();
        assert!(!registry.has_name(e3));
        assert_eq!(registry.name(e3), None);

        registry.set_name(e3, Some("Drone"));
        assert!(registry.has_name(e3));
        assert_eq!(registry.name(e3).as_deref(), Some("Drone"));
    }

    #[test]
    fn test_find_by_name() {
        let mut registry = registry();
        let first = registry.create();
        let second = registry.create();
        registry.set_name(first, Some("Target"));
        registry.set_name(second, Some("Target"));

        assert_eq!(registry.find("Target"), first);
        assert!(registry.find("Missing").is_null());
    }

    #[test]
    fn test_transform_round_trip() {
        let mut registry = registry();
        let e = registry.create();
        let transform = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));
        registry.set_transform(e, &transform);
        assert_eq!(registry.transform(e), transform);
    }

    #[test]
    #[should_panic(expected = "invalid entity")]
    fn test_transform_of_invalid_entity_panics() {
        let registry = registry();
        let _ = registry.transform(Entity::NULL);
    }

    #[test]
    fn test_builtin_views() {
        let mut registry = registry();
        let e = registry.create();
        assert!(!registry.has_builtin::<DynamicPhysicsActor>(e));

        registry
            .add_builtin::<DynamicPhysicsActor>(e)
            .set_velocity(Vec3::Z);
        assert!(registry.has_builtin::<DynamicPhysicsActor>(e));
        assert_eq!(registry.get_builtin::<DynamicPhysicsActor>(e).velocity(), Vec3::Z);
        assert!(registry.try_add_builtin::<DynamicPhysicsActor>(e).is_err());

        registry.remove_builtin::<DynamicPhysicsActor>(e);
        assert!(registry.try_get_builtin::<DynamicPhysicsActor>(e).is_err());
        assert!(registry.debug_pools().is_empty());
    }

    #[test]
    fn test_named_api_dispatches_on_backing() {
        let mut registry = registry();
        registry.load_module(ComponentModule::new().with_component::<Health>());
        let e = registry.create();

        registry.add_component_named(e, "test::Health").unwrap();
        assert!(registry.has_component::<Health>(e));

        let component = registry.get_component_named(e, "test::Health").unwrap();
        component.downcast_mut::<Health>().unwrap().value = 5.0;
        assert_eq!(registry.get_component::<Health>(e).value, 5.0);

        let builtin = registry.add_component_named(e, "worlds::WorldObject").unwrap();
        assert!(builtin.is_builtin());
        assert!(registry.has_builtin::<WorldObject>(e));
        assert!(registry.has_component_named(e, "worlds::WorldObject").unwrap());

        assert!(registry.remove_component_named(e, "test::Health").unwrap());
        assert!(!registry.has_component_named(e, "test::Health").unwrap());
        assert!(matches!(
            registry.has_component_named(e, "test::Missing"),
            Err(RegistryError::UnknownType(_))
        ));
    }

    #[test]
    fn test_set_component_boxed() {
        let mut registry = registry();
        registry.load_module(ComponentModule::new().with_component::<Health>());
        let e = registry.create();

        registry
            .set_component_boxed(e, "test::Health", Box::new(Health { value: 42.0 }))
            .unwrap();
        assert_eq!(registry.get_component::<Health>(e).value, 42.0);

        assert!(matches!(
            registry.set_component_boxed(e, "test::Health", Box::new(1_u8)),
            Err(RegistryError::TypeMismatch(_))
        ));
        assert!(matches!(
            registry.set_component_boxed(e, "worlds::WorldObject", Box::new(())),
            Err(RegistryError::Builtin(_))
        ));
    }

    #[test]
    fn test_destroy_next_waits_for_end_of_tick() {
        let mut registry = registry();
        let e = registry.create();
        registry.add_component::<Health>(e);
        registry.destroy_next(e);
        assert!(registry.valid(e));

        registry.tick(0.1);
        assert!(!registry.valid(e));
        assert!(!registry.has_component::<Health>(e));
    }

    #[test]
    fn test_systems_run_each_tick() {
        struct Spawner {
            runs: Rc<Cell<u32>>,
        }

        impl GameSystem for Spawner {
            fn name(&self) -> &'static str {
                "spawner"
            }

            fn on_simulate(&mut self, registry: &mut Registry) {
                self.runs.set(self.runs.get() + 1);
                registry.create();
            }
        }

        let runs = Rc::new(Cell::new(0));
        let mut registry = registry();
        registry.add_system(Box::new(Spawner { runs: runs.clone() }));
        registry.tick(0.1);
        registry.tick(0.1);

        assert_eq!(runs.get(), 2);
        let mut count = 0;
        registry.each(|_| count += 1);
        assert_eq!(count, 2);
    }

    #[test]
    fn test_debug_pools() {
        let mut registry = registry();
        let e = registry.create();
        registry.add_component::<Health>(e);
        registry.add_component::<Counter>(e);

        let pools = registry.debug_pools();
        assert_eq!(pools.len(), 2);
        assert_eq!(pools[0].name, "test::Health");
        assert_eq!(pools[0].len, 1);
        assert!(pools[1].thinking);
    }
}
