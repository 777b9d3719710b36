//! Holonomic base: the canonical body follows velocity commands.
//!
//! ```xml
//! <controller:holonome name="base" linearVel="0.5 0 0" angularVel="0 0 0.1"/>
//! ```
//!
//! Commands can be changed at runtime through `set_param`; a reset brings
//! them back to the loaded values.

use std::sync::Arc;

use glam::DVec3;

use crate::components::controller::{Controller, ControllerBinding, UpdateContext};
use crate::configtree::ConfigNode;
use crate::error::{Result, SimError};
use crate::params::{ParamKey, ParamTable};
use crate::physics::PhysicsBody;

pub struct Holonome {
    params: ParamTable,
    linear_key: ParamKey<DVec3>,
    angular_key: ParamKey<DVec3>,
    linear: DVec3,
    angular: DVec3,
    body: Option<Arc<dyn PhysicsBody>>,
}

impl Default for Holonome {
    fn default() -> Self {
        Self::new()
    }
}

impl Holonome {
    pub fn new() -> Self {
        let mut params = ParamTable::<()>::new();
        let linear_key = params.declare("linearVel", DVec3::ZERO);
        let angular_key = params.declare("angularVel", DVec3::ZERO);
        Self {
            params,
            linear_key,
            angular_key,
            linear: DVec3::ZERO,
            angular: DVec3::ZERO,
            body: None,
        }
    }

    fn reload_commands(&mut self) {
        self.linear = self.params.get(self.linear_key);
        self.angular = self.params.get(self.angular_key);
    }

    /// Current (linear, angular) command.
    pub fn command(&self) -> (DVec3, DVec3) {
        (self.linear, self.angular)
    }
}

impl Controller for Holonome {
    fn load(&mut self, node: &ConfigNode, binding: &ControllerBinding) -> Result<()> {
        self.params.load_all(node, |_, _| {})?;
        self.body = Some(binding.canonical_body().ok_or_else(|| {
            SimError::MalformedControllerConfig(format!("[{}] needs a canonical body", binding.controller_name))
        })?);
        self.reload_commands();
        Ok(())
    }

    fn update(&mut self, _ctx: &UpdateContext) {
        if let Some(body) = &self.body {
            body.set_linear_vel(self.linear);
            body.set_angular_vel(self.angular);
        }
    }

    fn reset(&mut self) {
        self.reload_commands();
    }

    fn fini(&mut self) {
        if let Some(body) = &self.body {
            body.set_linear_vel(DVec3::ZERO);
            body.set_angular_vel(DVec3::ZERO);
        }
    }

    fn save(&self, prefix: &str, out: &mut String) {
        self.params.save(prefix, out);
    }

    fn set_param(&mut self, name: &str, value: &str) -> Result<()> {
        let mut scratch = self.params.clone();
        scratch.set_by_name(name, value, |_, _| {})?;
        match name {
            "linearVel" => self.linear = scratch.get(self.linear_key),
            "angularVel" => self.angular = scratch.get(self.angular_key),
            _ => {}
        }
        Ok(())
    }
}
