//! # worlds_ecs
//!
//! The scripting-side half of the Worlds entity-component system. The native
//! engine owns entities; this crate owns the component instances that game
//! code attaches to them.
//!
//! This crate provides:
//!
//! - [`Entity`]: a `u32` handle allocated by the native engine.
//! - [`Component`]: the contract for locally stored components, with
//!   optional start, think and collision hooks.
//! - [`BuiltinComponent`]: components whose data lives natively and is only
//!   ever seen through a transient view.
//! - [`TypeSlots`]: stable type-name → pool index assignment.
//! - [`ComponentStorage`]: sparse-to-dense storage for one component type.
//! - [`Registry`]: the facade game code and the engine talk to.
//! - [`ComponentModule`]: the set of component types provided by the
//!   currently loaded game code, used to resolve names during hotload.
//! - [`StagedTask`]: multi-step work resumed on later ticks.

pub mod builtin;
pub mod codec;
pub mod component;
pub mod config;
pub mod entity;
pub mod error;
pub mod hotload;
pub mod module;
pub mod registry;
pub mod slots;
pub mod storage;
pub mod tasks;

pub use builtin::{
    BuiltinComponent, DynamicPhysicsActor, PhysicsActorView, WorldObject, WorldObjectView,
};
pub use codec::{CodecError, HotloadCodec};
pub use component::{Component, ComponentTypeId, ComponentVTable, ContactInfo};
pub use config::RegistryConfig;
pub use entity::Entity;
pub use error::RegistryError;
pub use module::{Backing, ComponentDescriptor, ComponentModule};
pub use registry::{ComponentRef, GameSystem, PoolInfo, Registry, Time};
pub use slots::TypeSlots;
pub use storage::{ComponentStorage, ErasedStorage};
pub use tasks::{StagedTask, TaskStep};
