//! Controllers: named behaviour modules attached to a model.
//!
//! A [`ControllerSlot`] is the ECS side of a controller: its name, type,
//! declared interfaces, common parameters and update-rate bookkeeping. The
//! behaviour itself is a boxed [`Controller`] created by the
//! [`ControllerRegistry`](crate::resources::controllerregistry::ControllerRegistry).
//!
//! Behaviours never see the ECS world. At load time they receive a
//! [`ControllerBinding`] with the backend handles of the owning model's
//! bodies and joints and a sender into the interface outbox, and keep
//! whatever they need. That keeps each update self-contained so slots can
//! be updated from worker threads.

use std::sync::Arc;

use bevy_ecs::prelude::{Component, Entity};

use super::entitynode::scoped;
use crate::configtree::ConfigNode;
use crate::error::{Result, SimError};
use crate::events::interface::{InterfaceDecl, InterfaceSample, InterfaceSender};
use crate::params::{ParamKey, ParamTable};
use crate::physics::{PhysicsBody, PhysicsJoint};

/// Timing passed to every controller update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateContext {
    pub sim_time: f64,
    pub dt: f64,
    /// Physics is paused; only `alwaysOn` controllers run.
    pub paused: bool,
}

/// Everything a behaviour may bind to while loading.
pub struct ControllerBinding {
    pub model: Entity,
    pub model_scope: String,
    pub controller_name: String,
    pub interfaces: Vec<InterfaceDecl>,
    pub bodies: Vec<(String, Arc<dyn PhysicsBody>)>,
    pub canonical_body: Option<Arc<dyn PhysicsBody>>,
    pub joints: Vec<(String, Arc<dyn PhysicsJoint>)>,
    pub outbox: InterfaceSender,
}

impl ControllerBinding {
    pub fn body(&self, name: &str) -> Option<Arc<dyn PhysicsBody>> {
        self.bodies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| Arc::clone(b))
    }

    pub fn canonical_body(&self) -> Option<Arc<dyn PhysicsBody>> {
        self.canonical_body.clone()
    }

    pub fn joint(&self, name: &str) -> Option<Arc<dyn PhysicsJoint>> {
        self.joints
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, j)| Arc::clone(j))
    }

    /// Scoped names of every declared interface of the given kind.
    pub fn interface_names(&self, kind: &str) -> Vec<String> {
        let scope = scoped(&self.model_scope, &self.controller_name);
        self.interfaces
            .iter()
            .filter(|i| i.kind == kind)
            .map(|i| scoped(&scope, &i.name))
            .collect()
    }

    pub fn sender(&self) -> InterfaceSender {
        self.outbox.clone()
    }
}

/// A controller behaviour.
pub trait Controller: Send + Sync {
    /// Read behaviour-specific parameters and bind to bodies and joints.
    fn load(&mut self, node: &ConfigNode, binding: &ControllerBinding) -> Result<()>;

    fn init(&mut self) {}

    fn update(&mut self, ctx: &UpdateContext);

    fn reset(&mut self) {}

    fn fini(&mut self) {}

    /// Append behaviour-specific `name="value"` lines.
    fn save(&self, _prefix: &str, _out: &mut String) {}

    /// Runtime update of a behaviour-specific parameter.
    fn set_param(&mut self, name: &str, _value: &str) -> Result<()> {
        Err(SimError::UnknownParameter(name.to_string()))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ControllerKeys {
    pub name: ParamKey<String>,
    pub plugin: ParamKey<String>,
    pub update_rate: ParamKey<f64>,
    pub always_on: ParamKey<bool>,
}

#[derive(Component)]
pub struct ControllerSlot {
    pub name: String,
    /// Local name of the config tag, `pose_sensor` for `<controller:pose_sensor>`.
    pub type_name: String,
    pub model: Entity,
    /// Scoped name of the owning model.
    pub scope: String,
    pub params: ParamTable,
    pub keys: ControllerKeys,
    pub interfaces: Vec<InterfaceDecl>,
    pub behavior: Box<dyn Controller>,
    last_update: Option<f64>,
    pub update_count: u64,
}

impl ControllerSlot {
    pub fn new(
        type_name: impl Into<String>,
        model: Entity,
        scope: impl Into<String>,
        behavior: Box<dyn Controller>,
    ) -> Self {
        let mut params = ParamTable::<()>::new();
        let name = params.declare_required("name", String::new());
        let plugin = params.declare_optional("plugin", String::new());
        let update_rate = params.declare("updateRate", 0.0);
        let always_on = params.declare("alwaysOn", false);
        Self {
            name: String::new(),
            type_name: type_name.into(),
            model,
            scope: scope.into(),
            params,
            keys: ControllerKeys {
                name,
                plugin,
                update_rate,
                always_on,
            },
            interfaces: Vec::new(),
            behavior,
            last_update: None,
            update_count: 0,
        }
    }

    /// Load the common parameters and the `interface:*` children.
    pub fn load_common(&mut self, node: &ConfigNode) -> Result<()> {
        self.params.load_all(node, |_, _| {})?;
        self.name = self.params.get(self.keys.name);
        for iface in node.children_by_prefix("interface") {
            self.interfaces.push(InterfaceDecl {
                kind: iface.name().to_string(),
                name: iface.get_string("name", "", true)?,
            });
        }
        Ok(())
    }

    pub fn update_rate(&self) -> f64 {
        self.params.get(self.keys.update_rate)
    }

    pub fn always_on(&self) -> bool {
        self.params.get(self.keys.always_on)
    }

    fn due(&self, ctx: &UpdateContext) -> bool {
        if ctx.paused && !self.always_on() {
            return false;
        }
        let rate = self.update_rate();
        match self.last_update {
            Some(last) if rate > 0.0 => ctx.sim_time - last + 1e-9 >= 1.0 / rate,
            _ => true,
        }
    }

    pub fn init(&mut self) {
        self.behavior.init();
    }

    /// Run the behaviour if the update rate allows it this tick.
    pub fn update(&mut self, ctx: &UpdateContext) {
        if !self.due(ctx) {
            return;
        }
        self.behavior.update(ctx);
        self.last_update = Some(ctx.sim_time);
        self.update_count += 1;
    }

    pub fn reset(&mut self) {
        self.last_update = None;
        self.behavior.reset();
    }

    pub fn fini(&mut self) {
        self.behavior.fini();
    }

    /// Append `<model>::<controller>::<interface>` for every declared interface.
    pub fn interface_names(&self, out: &mut Vec<String>) {
        let scope = scoped(&self.scope, &self.name);
        for iface in &self.interfaces {
            out.push(scoped(&scope, &iface.name));
        }
    }

    /// Update a common or behaviour parameter by name.
    pub fn set_param(&mut self, name: &str, value: &str) -> Result<()> {
        if name == "name" {
            return Err(SimError::UnknownParameter(name.to_string()));
        }
        match self.params.set_by_name(name, value, |_, _| {}) {
            Err(SimError::UnknownParameter(_)) => self.behavior.set_param(name, value),
            other => other,
        }
    }

    pub fn save(&self, prefix: &str, out: &mut String) {
        let inner = format!("{prefix}  ");
        out.push_str(&format!("{prefix}<controller:{}\n", self.type_name));
        self.params.save(&inner, out);
        self.behavior.save(&inner, out);
        out.push_str(&format!("{prefix}>\n"));
        for iface in &self.interfaces {
            iface.save(&inner, out);
        }
        out.push_str(&format!("{prefix}</controller:{}>\n", self.type_name));
    }
}

/// Publish helper shared by behaviours.
pub fn publish(sender: &InterfaceSender, sample: InterfaceSample) {
    let dropped = sender.send(sample);
    if dropped > 0 {
        log::debug!("interface outbox full; {} old samples dropped", dropped);
    }
}
