//! Velocity motor on one joint.
//!
//! ```xml
//! <controller:joint_velocity name="wheel_motor" joint="axle" velocity="2" maxForce="10">
//!   <interface:joint name="axle_state"/>
//! </controller:joint_velocity>
//! ```
//!
//! Every update re-applies the target velocity and force limit to axis 0 and
//! publishes the joint angle and rate on each `interface:joint`.

use std::sync::Arc;

use crate::components::controller::{Controller, ControllerBinding, UpdateContext, publish};
use crate::configtree::ConfigNode;
use crate::error::{Result, SimError};
use crate::events::interface::{InterfacePayload, InterfaceSample, InterfaceSender};
use crate::params::{ParamKey, ParamTable};
use crate::physics::PhysicsJoint;

pub struct JointVelocity {
    params: ParamTable,
    joint_key: ParamKey<String>,
    velocity_key: ParamKey<f64>,
    max_force_key: ParamKey<f64>,
    velocity: f64,
    max_force: f64,
    joint: Option<Arc<dyn PhysicsJoint>>,
    interfaces: Vec<String>,
    outbox: Option<InterfaceSender>,
}

impl Default for JointVelocity {
    fn default() -> Self {
        Self::new()
    }
}

impl JointVelocity {
    pub fn new() -> Self {
        let mut params = ParamTable::<()>::new();
        let joint_key = params.declare_required("joint", String::new());
        let velocity_key = params.declare("velocity", 0.0);
        let max_force_key = params.declare("maxForce", 0.0);
        Self {
            params,
            joint_key,
            velocity_key,
            max_force_key,
            velocity: 0.0,
            max_force: 0.0,
            joint: None,
            interfaces: Vec::new(),
            outbox: None,
        }
    }

    pub fn target(&self) -> (f64, f64) {
        (self.velocity, self.max_force)
    }

    fn reload_targets(&mut self) {
        self.velocity = self.params.get(self.velocity_key);
        self.max_force = self.params.get(self.max_force_key);
    }
}

impl Controller for JointVelocity {
    fn load(&mut self, node: &ConfigNode, binding: &ControllerBinding) -> Result<()> {
        self.params.load_all(node, |_, _| {})?;
        let joint_name = self.params.get(self.joint_key);
        self.joint = Some(binding.joint(&joint_name).ok_or_else(|| {
            SimError::MalformedControllerConfig(format!(
                "[{}] drives unknown joint [{}]",
                binding.controller_name, joint_name
            ))
        })?);
        self.interfaces = binding.interface_names("joint");
        self.outbox = Some(binding.sender());
        self.reload_targets();
        Ok(())
    }

    fn init(&mut self) {
        if let Some(joint) = &self.joint {
            joint.set_velocity(0, self.velocity);
            joint.set_max_force(0, self.max_force);
        }
    }

    fn update(&mut self, ctx: &UpdateContext) {
        let Some(joint) = &self.joint else {
            return;
        };
        joint.set_velocity(0, self.velocity);
        joint.set_max_force(0, self.max_force);

        let Some(outbox) = &self.outbox else {
            return;
        };
        let payload = InterfacePayload::JointState {
            angle: joint.angle(0),
            velocity: joint.angle_rate(0),
        };
        for interface in &self.interfaces {
            publish(
                outbox,
                InterfaceSample {
                    interface: interface.clone(),
                    sim_time: ctx.sim_time,
                    payload: payload.clone(),
                },
            );
        }
    }

    fn reset(&mut self) {
        self.reload_targets();
    }

    fn fini(&mut self) {
        if let Some(joint) = &self.joint {
            joint.set_velocity(0, 0.0);
            joint.set_max_force(0, 0.0);
        }
    }

    fn save(&self, prefix: &str, out: &mut String) {
        self.params.save(prefix, out);
    }

    fn set_param(&mut self, name: &str, value: &str) -> Result<()> {
        if name == "joint" {
            return Err(SimError::UnknownParameter(name.to_string()));
        }
        let mut scratch = self.params.clone();
        scratch.set_by_name(name, value, |_, _| {})?;
        match name {
            "velocity" => self.velocity = scratch.get(self.velocity_key),
            "maxForce" => self.max_force = scratch.get(self.max_force_key),
            _ => {}
        }
        Ok(())
    }
}
