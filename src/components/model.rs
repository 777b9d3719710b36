//! Model component: a named node owning bodies, joints and controllers.
//!
//! The component only stores handles. Bodies, joints and controllers are
//! their own entities, so a joint can reference bodies of another model and
//! deleting a model can find and detach such joints. Child models are listed
//! on the model's [`EntityNode`](super::entitynode::EntityNode).
//!
//! Model parameters fire hooks against a [`ModelScope`]: the model's relative
//! pose plus the backend handles of its bodies. Flag hooks push their value
//! into every body that has not set the flag itself.

use std::sync::Arc;

use bevy_ecs::prelude::{Component, Entity};
use glam::{DQuat, DVec3};

use super::body::BodyOverrides;
use super::pose::Pose;
use crate::error::{Result, SimError};
use crate::params::value::Value;
use crate::params::{ParamKey, ParamTable};
use crate::physics::PhysicsBody;

/// Reserved body name resolving to the canonical body.
pub const CANONICAL_ALIAS: &str = "canonical";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    Physical,
    Empty,
}

impl ModelType {
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "physical" => Ok(ModelType::Physical),
            "empty" => Ok(ModelType::Empty),
            other => Err(SimError::InvalidModelType(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelType::Physical => "physical",
            ModelType::Empty => "empty",
        }
    }
}

/// A body as seen by model flag hooks.
pub struct BodyTarget {
    pub backend: Arc<dyn PhysicsBody>,
    pub overrides: BodyOverrides,
}

/// State reachable from a model parameter hook.
pub struct ModelScope<'a> {
    pub relative_pose: &'a mut Pose,
    pub bodies: &'a [BodyTarget],
    /// Set by pose hooks; the caller re-places the bodies.
    pub pose_dirty: bool,
}

pub type ModelHook = fn(&mut ModelScope<'_>, &Value);

#[derive(Debug, Clone, Copy)]
pub struct ModelKeys {
    pub name: ParamKey<String>,
    pub is_static: ParamKey<bool>,
    pub canonical_body: ParamKey<String>,
    pub xyz: ParamKey<DVec3>,
    pub rpy: ParamKey<DQuat>,
    pub enable_gravity: ParamKey<bool>,
    pub enable_friction: ParamKey<bool>,
    pub collide: ParamKey<String>,
    pub laser_fiducial_id: ParamKey<i32>,
    pub laser_retro: ParamKey<f64>,
    pub self_id: ParamKey<i32>,
    pub team: ParamKey<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyEntry {
    pub name: String,
    pub entity: Entity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerEntry {
    pub name: String,
    pub entity: Entity,
}

/// Record of the joint welding this model to its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub parent_body: String,
    pub my_body: String,
    pub joint: Entity,
}

#[derive(Component)]
pub struct Model {
    pub model_type: ModelType,
    pub params: ParamTable<ModelHook>,
    pub keys: ModelKeys,
    /// Unique by name; document order.
    pub bodies: Vec<BodyEntry>,
    pub joints: Vec<Entity>,
    /// Unique by name; a reload under the same name replaces the entry.
    pub controllers: Vec<ControllerEntry>,
    pub canonical_body: Option<String>,
    pub init_pose: Pose,
    pub attachment: Option<Attachment>,
}

fn on_xyz(scope: &mut ModelScope<'_>, v: &Value) {
    if let Value::Vec3(p) = v {
        scope.relative_pose.pos = *p;
        scope.pose_dirty = true;
    }
}

fn on_rpy(scope: &mut ModelScope<'_>, v: &Value) {
    if let Value::Quat(q) = v {
        scope.relative_pose.rot = *q;
        scope.pose_dirty = true;
    }
}

fn on_gravity(scope: &mut ModelScope<'_>, v: &Value) {
    if let Value::Bool(enabled) = v {
        for body in scope.bodies.iter().filter(|b| !b.overrides.gravity) {
            body.backend.set_gravity_mode(*enabled);
        }
    }
}

fn on_friction(scope: &mut ModelScope<'_>, v: &Value) {
    if let Value::Bool(enabled) = v {
        for body in scope.bodies.iter().filter(|b| !b.overrides.friction) {
            body.backend.set_friction_mode(*enabled);
        }
    }
}

fn on_collide(scope: &mut ModelScope<'_>, v: &Value) {
    if let Value::Str(mode) = v {
        for body in scope.bodies.iter().filter(|b| !b.overrides.collide) {
            body.backend.set_collide_mode(mode);
        }
    }
}

fn on_fiducial(scope: &mut ModelScope<'_>, v: &Value) {
    if let Value::Int(id) = v {
        for body in scope.bodies.iter().filter(|b| !b.overrides.fiducial) {
            body.backend.set_laser_fiducial_id(*id);
        }
    }
}

fn on_retro(scope: &mut ModelScope<'_>, v: &Value) {
    if let Value::Float(retro) = v {
        for body in scope.bodies.iter().filter(|b| !b.overrides.retro) {
            body.backend.set_laser_retro(*retro);
        }
    }
}

impl Model {
    pub fn new(model_type: ModelType) -> Self {
        let mut params = ParamTable::<ModelHook>::new();
        let name = params.declare_required("name", String::new());
        let is_static = params.declare("static", false);
        let canonical_body = params.declare("canonicalBody", String::new());
        let xyz = params.declare("xyz", DVec3::ZERO);
        let xyz = params.with_hook(xyz, on_xyz);
        let rpy = params.declare("rpy", DQuat::IDENTITY);
        let rpy = params.with_hook(rpy, on_rpy);
        let enable_gravity = params.declare("enableGravity", true);
        let enable_gravity = params.with_hook(enable_gravity, on_gravity);
        let enable_friction = params.declare("enableFriction", true);
        let enable_friction = params.with_hook(enable_friction, on_friction);
        let collide = params.declare("collide", "all".to_string());
        let collide = params.with_hook(collide, on_collide);
        let laser_fiducial_id = params.declare("laserFiducialId", -1);
        let laser_fiducial_id = params.with_hook(laser_fiducial_id, on_fiducial);
        let laser_retro = params.declare("laserRetro", -1.0);
        let laser_retro = params.with_hook(laser_retro, on_retro);
        let self_id = params.declare("selfID", -1);
        let team = params.declare("team", String::new());

        Self {
            model_type,
            params,
            keys: ModelKeys {
                name,
                is_static,
                canonical_body,
                xyz,
                rpy,
                enable_gravity,
                enable_friction,
                collide,
                laser_fiducial_id,
                laser_retro,
                self_id,
                team,
            },
            bodies: Vec::new(),
            joints: Vec::new(),
            controllers: Vec::new(),
            canonical_body: None,
            init_pose: Pose::IDENTITY,
            attachment: None,
        }
    }

    pub fn name(&self) -> String {
        self.params.get(self.keys.name)
    }

    pub fn is_static(&self) -> bool {
        self.params.get(self.keys.is_static)
    }

    pub fn self_id(&self) -> i32 {
        self.params.get(self.keys.self_id)
    }

    pub fn team(&self) -> String {
        self.params.get(self.keys.team)
    }

    /// Model-level fiducial id; bodies that set their own are not reflected.
    pub fn laser_fiducial_id(&self) -> i32 {
        self.params.get(self.keys.laser_fiducial_id)
    }

    pub fn laser_retro(&self) -> f64 {
        self.params.get(self.keys.laser_retro)
    }

    pub fn gravity_enabled(&self) -> bool {
        self.params.get(self.keys.enable_gravity)
    }

    pub fn friction_enabled(&self) -> bool {
        self.params.get(self.keys.enable_friction)
    }

    pub fn collide(&self) -> String {
        self.params.get(self.keys.collide)
    }

    /// Pick the canonical body: the declared name if it exists, else the first body.
    pub fn resolve_canonical(&self) -> Option<String> {
        let declared = self.params.get(self.keys.canonical_body);
        if !declared.is_empty() && self.bodies.iter().any(|b| b.name == declared) {
            return Some(declared);
        }
        self.bodies.first().map(|b| b.name.clone())
    }

    /// Body by name; `canonical` resolves to the canonical body.
    pub fn body_entity(&self, name: &str) -> Option<Entity> {
        if let Some(entry) = self.bodies.iter().find(|b| b.name == name) {
            return Some(entry.entity);
        }
        if name == CANONICAL_ALIAS {
            return self.canonical_entity();
        }
        None
    }

    pub fn canonical_entity(&self) -> Option<Entity> {
        let canonical = self.canonical_body.clone().or_else(|| self.resolve_canonical())?;
        self.bodies
            .iter()
            .find(|b| b.name == canonical)
            .map(|b| b.entity)
    }

    /// Register a body; returns the entity it displaced, if any.
    pub fn insert_body(&mut self, name: String, entity: Entity) -> Option<Entity> {
        match self.bodies.iter_mut().find(|b| b.name == name) {
            Some(entry) => Some(std::mem::replace(&mut entry.entity, entity)),
            None => {
                self.bodies.push(BodyEntry { name, entity });
                None
            }
        }
    }

    pub fn controller_entity(&self, name: &str) -> Option<Entity> {
        self.controllers
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.entity)
    }

    /// Register a controller; returns the entity it displaced, if any.
    pub fn insert_controller(&mut self, name: String, entity: Entity) -> Option<Entity> {
        match self.controllers.iter_mut().find(|c| c.name == name) {
            Some(entry) => Some(std::mem::replace(&mut entry.entity, entity)),
            None => {
                self.controllers.push(ControllerEntry { name, entity });
                None
            }
        }
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Joint handle by index, failing with the caller's location.
    #[track_caller]
    pub fn joint_at(&self, index: usize) -> Result<Entity> {
        match self.joints.get(index) {
            Some(entity) => Ok(*entity),
            None => Err(SimError::invalid_index("joint", index as i64)),
        }
    }

    /// Push the model's physical flags into every body that has not set them.
    ///
    /// Static models are made kinematic and never receive the gravity flag.
    /// Fiducial id and retro are only pushed when set away from `-1`.
    pub fn push_body_flags(&self, bodies: &[BodyTarget]) {
        let mut relative = Pose::IDENTITY;
        let mut scope = ModelScope {
            relative_pose: &mut relative,
            bodies,
            pose_dirty: false,
        };
        if self.is_static() {
            for body in bodies {
                body.backend.set_kinematic(true);
            }
        } else {
            on_gravity(&mut scope, &Value::Bool(self.gravity_enabled()));
        }
        on_friction(&mut scope, &Value::Bool(self.friction_enabled()));
        on_collide(&mut scope, &Value::Str(self.collide()));
        if self.laser_fiducial_id() != -1 {
            on_fiducial(&mut scope, &Value::Int(self.laser_fiducial_id()));
        }
        if self.laser_retro() != -1.0 {
            on_retro(&mut scope, &Value::Float(self.laser_retro()));
        }
    }

    /// Write `<model:type` and the parameter lines, with xyz/rpy taken from `relative`.
    pub fn save_header(&self, relative: &Pose, prefix: &str, out: &mut String) {
        let mut params = self.params.clone();
        params.store(self.keys.xyz, relative.pos);
        params.store(self.keys.rpy, relative.rot);
        out.push_str(&format!("{prefix}<model:{}\n", self.model_type.as_str()));
        params.save(&format!("{prefix}  "), out);
        out.push_str(&format!("{prefix}>\n"));
    }
}
