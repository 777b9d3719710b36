//! Publishes the model pose on every `interface:position`.

use std::sync::Arc;

use crate::components::controller::{Controller, ControllerBinding, UpdateContext, publish};
use crate::configtree::ConfigNode;
use crate::error::{Result, SimError};
use crate::events::interface::{InterfacePayload, InterfaceSample, InterfaceSender};
use crate::physics::PhysicsBody;

#[derive(Default)]
pub struct PoseSensor {
    body: Option<Arc<dyn PhysicsBody>>,
    interfaces: Vec<String>,
    outbox: Option<InterfaceSender>,
    pub samples: u64,
}

impl PoseSensor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Controller for PoseSensor {
    fn load(&mut self, _node: &ConfigNode, binding: &ControllerBinding) -> Result<()> {
        self.body = Some(binding.canonical_body().ok_or_else(|| {
            SimError::MalformedControllerConfig(format!("[{}] needs a canonical body", binding.controller_name))
        })?);
        self.interfaces = binding.interface_names("position");
        self.outbox = Some(binding.sender());
        Ok(())
    }

    fn update(&mut self, ctx: &UpdateContext) {
        let (Some(body), Some(outbox)) = (&self.body, &self.outbox) else {
            return;
        };
        let payload = InterfacePayload::from_pose(&body.abs_pose());
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
        self.samples += 1;
    }

    fn reset(&mut self) {
        self.samples = 0;
    }
}
