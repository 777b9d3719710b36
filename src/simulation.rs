//! Simulation context.
//!
//! [`Simulation`] owns the ECS world that holds every model, body, joint and
//! controller, plus the shared resources: physics handle, model and
//! controller registries, clock, restore record, interface outbox and update
//! executor. There is no global instance; create one per simulated world.
//!
//! ```no_run
//! use std::sync::Arc;
//! use robosim::physics::iterative::IterativeEngine;
//! use robosim::simulation::Simulation;
//!
//! let mut sim = Simulation::new(Arc::new(IterativeEngine::new()));
//! sim.load_world(r#"<world><model:physical name="box"/></world>"#).unwrap();
//! sim.init();
//! for _ in 0..100 {
//!     sim.step();
//! }
//! print!("{}", sim.save());
//! sim.fini();
//! ```

use std::path::Path;
use std::sync::Arc;

use bevy_ecs::message::Messages;
use bevy_ecs::prelude::*;
use log::{info, warn};

use crate::components::entitynode::EntityNode;
use crate::components::model::Model;
use crate::components::pose::Pose;
use crate::configtree::ConfigNode;
use crate::error::{Result, SimError};
use crate::events::interface::{InterfaceOutbox, InterfaceSample};
use crate::events::lifecycle::ModelEvent;
use crate::physics::PhysicsEngine;
use crate::resources::controllerregistry::{ControllerFactory, ControllerRegistry, PluginRegistrar};
use crate::resources::executor::UpdateExecutor;
use crate::resources::modelregistry::ModelRegistry;
use crate::resources::physics::PhysicsHandle;
use crate::resources::restorerecord::RestoreRecord;
use crate::resources::simconfig::SimConfig;
use crate::resources::simtime::SimTime;
use crate::systems::{delete, lifecycle, load, modelops, save, update};

pub struct Simulation {
    world: World,
    initialized: bool,
}

impl Simulation {
    /// Context with default configuration.
    pub fn new(engine: Arc<dyn PhysicsEngine>) -> Self {
        Self::with_config(engine, SimConfig::new())
    }

    pub fn with_config(engine: Arc<dyn PhysicsEngine>, config: SimConfig) -> Self {
        engine.set_gravity(config.gravity);
        info!(
            "Simulation using [{}] backend, step {}s, {}",
            engine.name(),
            config.step_time,
            if config.parallel { "parallel updates" } else { "sequential updates" }
        );

        let mut world = World::new();
        world.insert_resource(PhysicsHandle::new(engine));
        world.insert_resource(UpdateExecutor::from_config(&config));
        world.insert_resource(InterfaceOutbox::with_capacity(config.interface_capacity));
        world.insert_resource(config);
        world.insert_resource(ModelRegistry::new());
        world.insert_resource(ControllerRegistry::with_builtins());
        world.insert_resource(SimTime::default());
        world.insert_resource(RestoreRecord::default());
        world.insert_resource(Messages::<ModelEvent>::default());
        Self {
            world,
            initialized: false,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn config(&self) -> &SimConfig {
        self.world.resource::<SimConfig>()
    }

    /// Register an extra controller type.
    pub fn register_controller(&mut self, type_name: &str, factory: ControllerFactory) {
        self.world
            .resource_mut::<ControllerRegistry>()
            .register(type_name, factory);
    }

    /// Make a controller plugin available to `plugin="..."` attributes.
    pub fn register_plugin(&mut self, name: &str, registrar: PluginRegistrar) {
        self.world
            .resource_mut::<ControllerRegistry>()
            .register_plugin(name, registrar);
    }

    // ==================== LOADING ====================

    /// Load every `model:*` child of a scene document. A document whose root
    /// is itself a model loads that model.
    pub fn load_world(&mut self, xml: &str) -> Result<Vec<Entity>> {
        let root = ConfigNode::parse(xml)?;
        if root.prefix() == Some("model") {
            return Ok(vec![load::load_model(&mut self.world, &root, None, false)?]);
        }
        let mut loaded = Vec::new();
        for node in root.children_by_prefix("model") {
            loaded.push(load::load_model(&mut self.world, node, None, false)?);
        }
        Ok(loaded)
    }

    pub fn load_world_file(&mut self, path: impl AsRef<Path>) -> Result<Vec<Entity>> {
        let text = std::fs::read_to_string(path.as_ref())?;
        info!("Loading world from {:?}", path.as_ref());
        self.load_world(&text)
    }

    /// Load one root model from a `<model:*>` document.
    pub fn load_model(&mut self, xml: &str, remove_duplicate: bool) -> Result<Entity> {
        let node = ConfigNode::parse(xml)?;
        if node.prefix() != Some("model") {
            return Err(SimError::NullConfigNode("model:*"));
        }
        load::load_model(&mut self.world, &node, None, remove_duplicate)
    }

    /// Load a model at runtime, replacing any model of the same name. The
    /// model is initialized right away when the world already is.
    pub fn spawn_model(&mut self, xml: &str) -> Result<Entity> {
        let entity = self.load_model(xml, true)?;
        if self.initialized {
            lifecycle::init_model(&mut self.world, entity);
        }
        Ok(entity)
    }

    pub fn delete_model(&mut self, scoped_name: &str) -> Result<()> {
        delete::delete_model(&mut self.world, scoped_name)
    }

    // ==================== LOOKUP ====================

    pub fn model_by_name(&self, scoped_name: &str) -> Option<Entity> {
        self.world.resource::<ModelRegistry>().get(scoped_name)
    }

    fn require_model(&self, scoped_name: &str) -> Result<Entity> {
        self.model_by_name(scoped_name)
            .ok_or_else(|| SimError::UnknownModel(scoped_name.to_string()))
    }

    pub fn model(&self, entity: Entity) -> Option<&Model> {
        self.world.get::<Model>(entity)
    }

    pub fn node(&self, entity: Entity) -> Option<&EntityNode> {
        self.world.get::<EntityNode>(entity)
    }

    /// Scoped names of the root models, in load order.
    pub fn root_models(&self) -> Vec<String> {
        self.world
            .resource::<ModelRegistry>()
            .roots()
            .iter()
            .filter_map(|e| self.node(*e).map(|n| n.scoped_name.clone()))
            .collect()
    }

    /// Scoped names of every loaded model, sorted.
    pub fn model_names(&self) -> Vec<String> {
        self.world.resource::<ModelRegistry>().names()
    }

    /// Absolute pose of a model.
    pub fn model_pose(&self, scoped_name: &str) -> Option<Pose> {
        self.model_by_name(scoped_name)
            .and_then(|e| self.node(e))
            .map(|n| n.abs_pose)
    }

    pub fn sim_time(&self) -> SimTime {
        *self.world.resource::<SimTime>()
    }

    // ==================== LIFECYCLE ====================

    pub fn init(&mut self) {
        for root in self.roots() {
            lifecycle::init_model(&mut self.world, root);
        }
        self.initialized = true;
    }

    /// Advance one tick of the configured step time.
    pub fn step(&mut self) {
        let dt = self.config().step_time;
        self.step_by(dt);
    }

    pub fn step_by(&mut self, dt: f64) {
        update::tick(&mut self.world, dt);
    }

    /// Reset every model in the tree.
    pub fn reset(&mut self) {
        for root in self.roots() {
            self.reset_tree(root);
        }
        let mut time = self.world.resource_mut::<SimTime>();
        time.elapsed = 0.0;
        time.iterations = 0;
    }

    fn reset_tree(&mut self, entity: Entity) {
        lifecycle::reset_model(&mut self.world, entity);
        let children = self.node(entity).map(|n| n.children.clone()).unwrap_or_default();
        for child in children {
            self.reset_tree(child);
        }
    }

    pub fn fini(&mut self) {
        for root in self.roots() {
            lifecycle::fini_model(&mut self.world, root);
        }
        self.initialized = false;
    }

    /// Signal a pose change of every robot with a `selfID`.
    pub fn restore(&mut self) -> Result<()> {
        for name in self.model_names() {
            let entity = self.require_model(&name)?;
            lifecycle::restore_model(&mut self.world, entity)?;
        }
        Ok(())
    }

    /// Signal a pose change of one robot.
    #[track_caller]
    pub fn restore_model(&mut self, scoped_name: &str) -> Result<Option<u32>> {
        let entity = self.require_model(scoped_name)?;
        lifecycle::restore_model(&mut self.world, entity)
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.world.resource_mut::<SimTime>().paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.world.resource::<SimTime>().paused
    }

    fn roots(&self) -> Vec<Entity> {
        self.world.resource::<ModelRegistry>().roots().to_vec()
    }

    // ==================== PARAMETERS ====================

    pub fn set_model_param(&mut self, model: &str, name: &str, value: &str) -> Result<()> {
        let entity = self.require_model(model)?;
        modelops::set_model_param(&mut self.world, entity, name, value)
    }

    pub fn set_body_param(&mut self, model: &str, body: &str, name: &str, value: &str) -> Result<()> {
        let entity = self.require_model(model)?;
        modelops::set_body_param(&mut self.world, entity, body, name, value)
    }

    pub fn set_joint_param(&mut self, model: &str, joint: &str, name: &str, value: &str) -> Result<()> {
        let entity = self.require_model(model)?;
        modelops::set_joint_param(&mut self.world, entity, joint, name, value)
    }

    pub fn set_controller_param(&mut self, model: &str, controller: &str, name: &str, value: &str) -> Result<()> {
        let entity = self.require_model(model)?;
        modelops::set_controller_param(&mut self.world, entity, controller, name, value)
    }

    // ==================== OUTPUT ====================

    /// The whole scene in the load format.
    pub fn save(&self) -> String {
        save::save_world(&self.world)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.save())?;
        info!("Saved world to {:?}", path.as_ref());
        Ok(())
    }

    /// Scoped names of every controller and sensor interface in the world.
    pub fn interface_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for root in self.roots() {
            modelops::interface_names(&self.world, root, &mut names);
        }
        names
    }

    /// Samples published by controllers since the last call.
    pub fn drain_interfaces(&self) -> Vec<InterfaceSample> {
        self.world.resource::<InterfaceOutbox>().drain()
    }

    /// Model registry events since the last call.
    pub fn drain_events(&mut self) -> Vec<ModelEvent> {
        self.world
            .resource_mut::<Messages<ModelEvent>>()
            .drain()
            .collect()
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        if self.initialized {
            warn!("Simulation dropped without fini; finalizing now");
            self.fini();
        }
    }
}
