//! Named controller factories and plugin registrars.
//!
//! Controller types are registered explicitly at startup. A plugin is a
//! named registration function; loading it runs the function once and later
//! loads of the same name are no-ops.

use bevy_ecs::prelude::Resource;
use log::{info, warn};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::components::controller::Controller;

/// Builds a fresh, unloaded controller behaviour.
pub type ControllerFactory = fn() -> Box<dyn Controller>;

/// Registers the controller types a plugin provides.
pub type PluginRegistrar = fn(&mut ControllerRegistry);

#[derive(Resource, Default)]
pub struct ControllerRegistry {
    factories: FxHashMap<String, ControllerFactory>,
    plugins: FxHashMap<String, PluginRegistrar>,
    loaded_plugins: FxHashSet<String>,
}

impl ControllerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in controller types.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::controllers::register_builtins(&mut registry);
        registry
    }

    /// Register (or replace) a controller type.
    pub fn register(&mut self, type_name: impl Into<String>, factory: ControllerFactory) {
        self.factories.insert(type_name.into(), factory);
    }

    /// Make a plugin available under `name` without running it.
    pub fn register_plugin(&mut self, name: impl Into<String>, registrar: PluginRegistrar) {
        self.plugins.insert(name.into(), registrar);
    }

    /// Run a plugin's registrar once. Returns `false` for unknown plugins.
    pub fn load_plugin(&mut self, name: &str) -> bool {
        if self.loaded_plugins.contains(name) {
            return true;
        }
        let Some(registrar) = self.plugins.get(name).copied() else {
            warn!("Unknown controller plugin [{}]", name);
            return false;
        };
        registrar(self);
        self.loaded_plugins.insert(name.to_string());
        info!("Loaded controller plugin [{}]", name);
        true
    }

    /// Instantiate a controller of the given type.
    pub fn create(&self, type_name: &str) -> Option<Box<dyn Controller>> {
        self.factories.get(type_name).map(|factory| factory())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }
}
