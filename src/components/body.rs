//! Body component: one backend rigid body owned by exactly one model.
//!
//! The backend body is the source of truth for the body's pose and motion.
//! The component keeps the body's parameters, its pose relative to the
//! owning model and the sensors declared on it.
//!
//! Physical flags (gravity, friction, collide mode, fiducial id, retro) are
//! normally pushed down from the owning model. A body that sets one of them
//! itself keeps its own value; see [`Body::overrides`].

use std::sync::Arc;

use bevy_ecs::prelude::{Component, Entity};
use glam::{DQuat, DVec3};
use quick_xml::escape::escape;

use super::entitynode::scoped;
use super::pose::Pose;
use crate::configtree::ConfigNode;
use crate::error::Result;
use crate::events::interface::InterfaceDecl;
use crate::params::value::Value;
use crate::params::{ParamKey, ParamTable};
use crate::physics::PhysicsBody;

/// State reachable from a body parameter hook.
pub struct BodyCore {
    pub backend: Arc<dyn PhysicsBody>,
    /// Pose relative to the owning model.
    pub relative_pose: Pose,
}

pub type BodyHook = fn(&mut BodyCore, &Value);

#[derive(Debug, Clone, Copy)]
pub struct BodyKeys {
    pub name: ParamKey<String>,
    pub xyz: ParamKey<DVec3>,
    pub rpy: ParamKey<DQuat>,
    pub mass: ParamKey<f64>,
    pub size: ParamKey<DVec3>,
    pub enable_gravity: ParamKey<bool>,
    pub enable_friction: ParamKey<bool>,
    pub collide: ParamKey<String>,
    pub laser_fiducial_id: ParamKey<i32>,
    pub laser_retro: ParamKey<f64>,
}

/// Which model-level flags this body has set for itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BodyOverrides {
    pub gravity: bool,
    pub friction: bool,
    pub collide: bool,
    pub fiducial: bool,
    pub retro: bool,
}

/// A `sensor:<kind>` child of a body.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorDecl {
    pub kind: String,
    pub name: String,
    pub interfaces: Vec<InterfaceDecl>,
}

#[derive(Component)]
pub struct Body {
    /// Local name of the config tag, `box` for `<body:box>`.
    pub kind: String,
    pub model: Entity,
    pub params: ParamTable<BodyHook>,
    pub keys: BodyKeys,
    pub core: BodyCore,
    pub sensors: Vec<SensorDecl>,
}

fn on_xyz(core: &mut BodyCore, v: &Value) {
    if let Value::Vec3(p) = v {
        core.relative_pose.pos = *p;
    }
}

fn on_rpy(core: &mut BodyCore, v: &Value) {
    if let Value::Quat(q) = v {
        core.relative_pose.rot = *q;
    }
}

fn on_mass(core: &mut BodyCore, v: &Value) {
    if let Value::Float(m) = v {
        core.backend.set_mass(*m);
    }
}

fn on_size(core: &mut BodyCore, v: &Value) {
    if let Value::Vec3(s) = v {
        core.backend.set_size(*s);
    }
}

fn on_gravity(core: &mut BodyCore, v: &Value) {
    if let Value::Bool(b) = v {
        core.backend.set_gravity_mode(*b);
    }
}

fn on_friction(core: &mut BodyCore, v: &Value) {
    if let Value::Bool(b) = v {
        core.backend.set_friction_mode(*b);
    }
}

fn on_collide(core: &mut BodyCore, v: &Value) {
    if let Value::Str(mode) = v {
        core.backend.set_collide_mode(mode);
    }
}

fn on_fiducial(core: &mut BodyCore, v: &Value) {
    if let Value::Int(id) = v {
        core.backend.set_laser_fiducial_id(*id);
    }
}

fn on_retro(core: &mut BodyCore, v: &Value) {
    if let Value::Float(r) = v {
        core.backend.set_laser_retro(*r);
    }
}

impl Body {
    pub fn new(kind: impl Into<String>, model: Entity, backend: Arc<dyn PhysicsBody>) -> Self {
        let mut params = ParamTable::<BodyHook>::new();
        let name = params.declare_required("name", String::new());
        let xyz = params.declare("xyz", DVec3::ZERO);
        let xyz = params.with_hook(xyz, on_xyz);
        let rpy = params.declare("rpy", DQuat::IDENTITY);
        let rpy = params.with_hook(rpy, on_rpy);
        let mass = params.declare("mass", 1.0);
        let mass = params.with_hook(mass, on_mass);
        let size = params.declare("size", DVec3::splat(0.1));
        let size = params.with_hook(size, on_size);
        let enable_gravity = params.declare_optional("enableGravity", true);
        let enable_gravity = params.with_hook(enable_gravity, on_gravity);
        let enable_friction = params.declare_optional("enableFriction", true);
        let enable_friction = params.with_hook(enable_friction, on_friction);
        let collide = params.declare_optional("collide", "all".to_string());
        let collide = params.with_hook(collide, on_collide);
        let laser_fiducial_id = params.declare_optional("laserFiducialId", -1);
        let laser_fiducial_id = params.with_hook(laser_fiducial_id, on_fiducial);
        let laser_retro = params.declare_optional("laserRetro", -1.0);
        let laser_retro = params.with_hook(laser_retro, on_retro);

        Self {
            kind: kind.into(),
            model,
            params,
            keys: BodyKeys {
                name,
                xyz,
                rpy,
                mass,
                size,
                enable_gravity,
                enable_friction,
                collide,
                laser_fiducial_id,
                laser_retro,
            },
            core: BodyCore {
                backend,
                relative_pose: Pose::IDENTITY,
            },
            sensors: Vec::new(),
        }
    }

    /// Unconfigured body with the given name, used for a model's default body.
    pub fn named(name: impl Into<String>, model: Entity, backend: Arc<dyn PhysicsBody>) -> Self {
        let mut body = Self::new("box", model, backend);
        body.params.store(body.keys.name, name.into());
        body
    }

    pub fn name(&self) -> String {
        self.params.get(self.keys.name)
    }

    pub fn backend(&self) -> &Arc<dyn PhysicsBody> {
        &self.core.backend
    }

    /// Load parameters and sensors from a `<body:*>` node.
    pub fn load(&mut self, node: &ConfigNode) -> Result<()> {
        let core = &mut self.core;
        self.params.load_all(node, |hook, v| hook(core, v))?;

        for sensor in node.children_by_prefix("sensor") {
            let name = sensor.get_string("name", "", true)?;
            let mut interfaces = Vec::new();
            for iface in sensor.children_by_prefix("interface") {
                interfaces.push(InterfaceDecl {
                    kind: iface.name().to_string(),
                    name: iface.get_string("name", "", true)?,
                });
            }
            self.sensors.push(SensorDecl {
                kind: sensor.name().to_string(),
                name,
                interfaces,
            });
        }
        Ok(())
    }

    pub fn overrides(&self) -> BodyOverrides {
        BodyOverrides {
            gravity: self.params.is_explicit(self.keys.enable_gravity),
            friction: self.params.is_explicit(self.keys.enable_friction),
            collide: self.params.is_explicit(self.keys.collide),
            fiducial: self.params.is_explicit(self.keys.laser_fiducial_id),
            retro: self.params.is_explicit(self.keys.laser_retro),
        }
    }

    /// Place the backend body relative to its model's absolute pose.
    pub fn place(&self, model_abs: &Pose) {
        self.core.backend.set_abs_pose(model_abs.compose(&self.core.relative_pose));
    }

    pub fn update(&mut self) {
        self.core.backend.update();
    }

    /// Zero linear/angular velocity, acceleration commands, force and torque.
    pub fn reset(&self) {
        let backend = &self.core.backend;
        backend.set_linear_vel(DVec3::ZERO);
        backend.set_angular_vel(DVec3::ZERO);
        backend.set_linear_accel(DVec3::ZERO);
        backend.set_angular_accel(DVec3::ZERO);
        backend.set_force(DVec3::ZERO);
        backend.set_torque(DVec3::ZERO);
    }

    /// Append `<scope>::<sensor>::<interface>` for every sensor interface.
    pub fn interface_names(&self, scope: &str, out: &mut Vec<String>) {
        for sensor in &self.sensors {
            let sensor_scope = scoped(scope, &sensor.name);
            for iface in &sensor.interfaces {
                out.push(scoped(&sensor_scope, &iface.name));
            }
        }
    }

    /// Write the body as `<body:kind ...>` with its current pose relative to the model.
    pub fn save(&self, model_abs: &Pose, prefix: &str, out: &mut String) {
        let relative = self.core.backend.abs_pose().relative_to(model_abs);
        let mut params = self.params.clone();
        params.store(self.keys.xyz, relative.pos);
        params.store(self.keys.rpy, relative.rot);

        let inner = format!("{prefix}  ");
        out.push_str(&format!("{prefix}<body:{}\n", self.kind));
        params.save(&inner, out);
        out.push_str(&format!("{prefix}>\n"));
        for sensor in &self.sensors {
            out.push_str(&format!(
                "{inner}<sensor:{} name=\"{}\">\n",
                sensor.kind,
                escape(sensor.name.as_str())
            ));
            for iface in &sensor.interfaces {
                iface.save(&format!("{inner}  "), out);
            }
            out.push_str(&format!("{inner}</sensor:{}>\n", sensor.kind));
        }
        out.push_str(&format!("{prefix}</body:{}>\n", self.kind));
    }
}
