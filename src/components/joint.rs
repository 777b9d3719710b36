//! Joint component: a backend constraint between two bodies.
//!
//! The two bodies may belong to different models. Their handles are plain
//! entities; when either body is despawned the joint is detached and
//! `bodies` is cleared by [`crate::systems::delete`].
//!
//! Axis, stop and solver parameters are pushed into the backend through
//! hooks, but only after the joint has been attached: [`Joint::load`]
//! returns the hooks it collected and the loader applies them once both
//! bodies are bound.

use std::sync::Arc;

use bevy_ecs::prelude::{Component, Entity};
use glam::DVec3;

use crate::configtree::ConfigNode;
use crate::error::Result;
use crate::params::value::Value;
use crate::params::{ParamKey, ParamTable};
use crate::physics::{JointParam, JointType, PhysicsJoint};

pub type JointHook = fn(&dyn PhysicsJoint, &Value);

/// Hooks collected during load, applied after attach.
pub type DeferredHooks = Vec<(JointHook, Value)>;

#[derive(Debug, Clone, Copy)]
pub struct JointKeys {
    pub name: ParamKey<String>,
    pub body1: ParamKey<String>,
    pub body2: ParamKey<String>,
    pub anchor: ParamKey<String>,
    pub anchor_offset: ParamKey<DVec3>,
    pub axis: ParamKey<DVec3>,
    pub axis2: ParamKey<DVec3>,
    pub low_stop: ParamKey<f64>,
    pub high_stop: ParamKey<f64>,
    pub erp: ParamKey<f64>,
    pub cfm: ParamKey<f64>,
}

#[derive(Component)]
pub struct Joint {
    pub kind: JointType,
    /// Model that declared the joint.
    pub model: Entity,
    pub bodies: Option<(Entity, Entity)>,
    pub backend: Arc<dyn PhysicsJoint>,
    pub params: ParamTable<JointHook>,
    pub keys: JointKeys,
}

/// Stops are authored in degrees, except for sliders which use metres.
fn stop_value(joint: &dyn PhysicsJoint, authored: f64) -> f64 {
    match joint.kind() {
        JointType::Slider => authored,
        _ => authored.to_radians(),
    }
}

fn on_axis(joint: &dyn PhysicsJoint, v: &Value) {
    if let Value::Vec3(axis) = v {
        joint.set_axis(0, *axis);
    }
}

fn on_axis2(joint: &dyn PhysicsJoint, v: &Value) {
    if let Value::Vec3(axis) = v {
        joint.set_axis(1, *axis);
    }
}

fn on_low_stop(joint: &dyn PhysicsJoint, v: &Value) {
    if let Value::Float(stop) = v {
        joint.set_low_stop(0, stop_value(joint, *stop));
    }
}

fn on_high_stop(joint: &dyn PhysicsJoint, v: &Value) {
    if let Value::Float(stop) = v {
        joint.set_high_stop(0, stop_value(joint, *stop));
    }
}

fn on_erp(joint: &dyn PhysicsJoint, v: &Value) {
    if let Value::Float(erp) = v {
        joint.set_param(JointParam::StopErp, *erp);
    }
}

fn on_cfm(joint: &dyn PhysicsJoint, v: &Value) {
    if let Value::Float(cfm) = v {
        joint.set_param(JointParam::Cfm, *cfm);
    }
}

impl Joint {
    pub fn new(kind: JointType, model: Entity, backend: Arc<dyn PhysicsJoint>) -> Self {
        let mut params = ParamTable::<JointHook>::new();
        let name = params.declare_required("name", String::new());
        let body1 = params.declare_required("body1", String::new());
        let body2 = params.declare_required("body2", String::new());
        let anchor = params.declare("anchor", String::new());
        let anchor_offset = params.declare("anchorOffset", DVec3::ZERO);
        let axis = params.declare("axis", DVec3::Z);
        let axis = params.with_hook(axis, on_axis);
        let axis2 = params.declare("axis2", DVec3::Y);
        let axis2 = params.with_hook(axis2, on_axis2);
        let low_stop = params.declare_optional("lowStop", f64::NEG_INFINITY);
        let low_stop = params.with_hook(low_stop, on_low_stop);
        let high_stop = params.declare_optional("highStop", f64::INFINITY);
        let high_stop = params.with_hook(high_stop, on_high_stop);
        let erp = params.declare_optional("erp", 0.2);
        let erp = params.with_hook(erp, on_erp);
        let cfm = params.declare_optional("cfm", 1e-5);
        let cfm = params.with_hook(cfm, on_cfm);

        Self {
            kind,
            model,
            bodies: None,
            backend,
            params,
            keys: JointKeys {
                name,
                body1,
                body2,
                anchor,
                anchor_offset,
                axis,
                axis2,
                low_stop,
                high_stop,
                erp,
                cfm,
            },
        }
    }

    pub fn name(&self) -> String {
        self.params.get(self.keys.name)
    }

    /// Load parameters; the returned hooks must be applied after attach.
    pub fn load(&mut self, node: &ConfigNode) -> Result<DeferredHooks> {
        let mut deferred = DeferredHooks::new();
        self.params
            .load_all(node, |hook, v| deferred.push((hook, v.clone())))?;
        Ok(deferred)
    }

    /// Run hooks collected by [`Joint::load`].
    pub fn apply(&self, deferred: DeferredHooks) {
        for (hook, value) in deferred {
            hook(self.backend.as_ref(), &value);
        }
    }

    /// Body name used as the anchor; defaults to `body2`.
    pub fn anchor_body(&self) -> String {
        let anchor = self.params.get(self.keys.anchor);
        if anchor.is_empty() {
            self.params.get(self.keys.body2)
        } else {
            anchor
        }
    }

    /// Coordinate of axis `index`.
    pub fn angle(&self, index: usize) -> f64 {
        self.backend.angle(index)
    }

    pub fn reset(&self) {
        self.backend.reset();
    }

    pub fn save(&self, prefix: &str, out: &mut String) {
        out.push_str(&format!("{prefix}<joint:{}\n", self.kind.as_str()));
        self.params.save(&format!("{prefix}  "), out);
        out.push_str(&format!("{prefix}>\n"));
        out.push_str(&format!("{prefix}</joint:{}>\n", self.kind.as_str()));
    }
}
