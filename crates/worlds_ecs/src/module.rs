//! The set of component types provided by the loaded game code.
//!
//! Hotload restores components by name, so the registry needs to turn a
//! fully-qualified type name back into something that can build storage and
//! decode instances. A [`ComponentModule`] is that lookup table. Loading a new
//! module replaces it wholesale; names missing from the new module have been
//! deleted from the game code.

use std::collections::BTreeMap;

use worlds_native::BuiltinKind;

use crate::builtin::{BuiltinComponent, DynamicPhysicsActor, WorldObject};
use crate::component::{Component, ComponentVTable};

/// How a component type is stored.
#[derive(Debug, Clone, Copy)]
pub enum Backing {
    /// Instances live in a local [`ComponentStorage`](crate::ComponentStorage).
    Local(ComponentVTable),
    /// Instances live in the native engine and are accessed through views.
    Native(BuiltinKind),
}

/// A named component type known to a module.
#[derive(Debug, Clone, Copy)]
pub struct ComponentDescriptor {
    /// Fully-qualified type name.
    pub name: &'static str,
    /// Storage strategy.
    pub backing: Backing,
}

impl ComponentDescriptor {
    /// Returns `true` for native-backed types.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        matches!(self.backing, Backing::Native(_))
    }

    /// Returns `true` if instances persist across code reloads.
    #[must_use]
    pub fn is_hotload(&self) -> bool {
        match self.backing {
            Backing::Local(vtable) => vtable.hotload,
            Backing::Native(_) => false,
        }
    }
}

/// Name → descriptor table for one loaded version of the game code.
#[derive(Debug, Clone)]
pub struct ComponentModule {
    components: BTreeMap<&'static str, ComponentDescriptor>,
}

impl ComponentModule {
    /// Create a module that knows the engine builtins and nothing else.
    #[must_use]
    pub fn new() -> Self {
        Self {
            components: BTreeMap::new(),
        }
        .with_builtin::<WorldObject>()
        .with_builtin::<DynamicPhysicsActor>()
    }

    /// Add a locally stored component type.
    #[must_use]
    pub fn with_component<T: Component>(mut self) -> Self {
        self.register(ComponentDescriptor {
            name: T::type_name(),
            backing: Backing::Local(ComponentVTable::of::<T>()),
        });
        self
    }

    /// Add a native-backed component type.
    #[must_use]
    pub fn with_builtin<B: BuiltinComponent>(mut self) -> Self {
        self.register(ComponentDescriptor {
            name: B::NAME,
            backing: Backing::Native(B::KIND),
        });
        self
    }

    /// Add or replace a descriptor.
    pub fn register(&mut self, descriptor: ComponentDescriptor) {
        self.components.insert(descriptor.name, descriptor);
    }

    /// Look up a type by fully-qualified name.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&ComponentDescriptor> {
        self.components.get(name)
    }

    /// Names of every hotload-tracked type in the module.
    pub fn hotload_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.components
            .values()
            .filter(|d| d.is_hotload())
            .map(|d| d.name)
    }

    /// Iterate every descriptor in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentDescriptor> {
        self.components.values()
    }

    /// Number of known types, builtins included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if the module knows no types at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl Default for ComponentModule {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Ammo {
        count: u32,
    }

    impl Component for Ammo {
        const HOTLOAD: bool = true;

        fn type_name() -> &'static str {
            "test::Ammo"
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Scratch;

    impl Component for Scratch {
        fn type_name() -> &'static str {
            "test::Scratch"
        }
    }

    #[test]
    fn test_builtins_are_seeded() {
        let module = ComponentModule::new();
        assert_eq!(module.len(), 2);
        let descriptor = module.resolve("worlds::DynamicPhysicsActor").unwrap();
        assert!(descriptor.is_builtin());
        assert!(matches!(
            descriptor.backing,
            Backing::Native(BuiltinKind::DynamicPhysicsActor)
        ));
    }

    #[test]
    fn test_resolve_local_component() {
        let module = ComponentModule::new().with_component::<Ammo>();
        let descriptor = module.resolve("test::Ammo").unwrap();
        assert!(!descriptor.is_builtin());
        assert!(descriptor.is_hotload());
        assert!(module.resolve("test::Missing").is_none());
    }

    #[test]
    fn test_hotload_names_skip_untracked_and_builtins() {
        let module = ComponentModule::new()
            .with_component::<Ammo>()
            .with_component::<Scratch>();
        let names: Vec<_> = module.hotload_names().collect();
        assert_eq!(names, vec!["test::Ammo"]);
    }
}
