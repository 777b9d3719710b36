//! Whole-model operations and runtime parameter updates.
//!
//! Velocity and acceleration setters apply to every body of a model; the
//! getters read the first body. Parameter updates go through the owner's
//! [`ParamTable`](crate::params::ParamTable) so hooks fire exactly as they do
//! at load time.

use std::sync::Arc;

use bevy_ecs::prelude::*;
use glam::DVec3;

use super::{model_mut, model_ref};
use crate::components::body::{Body, BodyCore};
use crate::components::controller::ControllerSlot;
use crate::components::entitynode::EntityNode;
use crate::components::joint::Joint;
use crate::components::model::{BodyTarget, Model, ModelScope, ModelType};
use crate::components::pose::Pose;
use crate::error::{Result, SimError};
use crate::physics::{Aabb, PhysicsBody};

/// Parameters that identify or wire an object and cannot change after load.
const FIXED_PARAMS: [&str; 3] = ["name", "body1", "body2"];

fn body_backends(world: &World, entity: Entity) -> Result<Vec<Arc<dyn PhysicsBody>>> {
    Ok(model_ref(world, entity)?
        .bodies
        .iter()
        .filter_map(|entry| world.get::<Body>(entry.entity))
        .map(|body| Arc::clone(body.backend()))
        .collect())
}

fn for_each_body(world: &World, entity: Entity, f: impl Fn(&dyn PhysicsBody)) -> Result<()> {
    for backend in body_backends(world, entity)? {
        f(backend.as_ref());
    }
    Ok(())
}

fn first_body<T: Default>(world: &World, entity: Entity, f: impl Fn(&dyn PhysicsBody) -> T) -> Result<T> {
    Ok(body_backends(world, entity)?
        .first()
        .map(|b| f(b.as_ref()))
        .unwrap_or_default())
}

pub fn set_linear_vel(world: &World, entity: Entity, vel: DVec3) -> Result<()> {
    for_each_body(world, entity, |b| b.set_linear_vel(vel))
}

pub fn set_angular_vel(world: &World, entity: Entity, vel: DVec3) -> Result<()> {
    for_each_body(world, entity, |b| b.set_angular_vel(vel))
}

pub fn set_linear_accel(world: &World, entity: Entity, accel: DVec3) -> Result<()> {
    for_each_body(world, entity, |b| b.set_linear_accel(accel))
}

pub fn set_angular_accel(world: &World, entity: Entity, accel: DVec3) -> Result<()> {
    for_each_body(world, entity, |b| b.set_angular_accel(accel))
}

pub fn linear_vel(world: &World, entity: Entity) -> Result<DVec3> {
    first_body(world, entity, |b| b.linear_vel())
}

pub fn angular_vel(world: &World, entity: Entity) -> Result<DVec3> {
    first_body(world, entity, |b| b.angular_vel())
}

pub fn linear_accel(world: &World, entity: Entity) -> Result<DVec3> {
    first_body(world, entity, |b| b.linear_accel())
}

pub fn angular_accel(world: &World, entity: Entity) -> Result<DVec3> {
    first_body(world, entity, |b| b.angular_accel())
}

/// Union of the model's body boxes. Empty models report a zero box.
pub fn bounding_box(world: &World, entity: Entity) -> Result<Aabb> {
    if model_ref(world, entity)?.model_type == ModelType::Empty {
        return Ok(Aabb::ZERO);
    }
    Ok(body_backends(world, entity)?
        .iter()
        .map(|b| b.bounding_box())
        .reduce(|a, b| a.union(&b))
        .unwrap_or(Aabb::ZERO))
}

/// Joint of `entity` by name.
pub fn joint_by_name(world: &World, entity: Entity, name: &str) -> Result<Option<Entity>> {
    Ok(model_ref(world, entity)?
        .joints
        .iter()
        .copied()
        .find(|e| world.get::<Joint>(*e).is_some_and(|j| j.name() == name)))
}

/// Update a model parameter by name and fire its hook.
///
/// Pose parameters move the model's bodies and child models; `static` and
/// `canonicalBody` take effect immediately.
pub fn set_model_param(world: &mut World, entity: Entity, name: &str, value: &str) -> Result<()> {
    if FIXED_PARAMS.contains(&name) {
        return Err(SimError::UnknownParameter(name.to_string()));
    }
    let targets: Vec<BodyTarget> = model_ref(world, entity)?
        .bodies
        .iter()
        .filter_map(|entry| world.get::<Body>(entry.entity))
        .map(|body| BodyTarget {
            backend: Arc::clone(body.backend()),
            overrides: body.overrides(),
        })
        .collect();
    let mut relative = world
        .get::<EntityNode>(entity)
        .map(|n| n.relative_pose)
        .unwrap_or_default();

    let model = model_mut(world, entity)?.into_inner();
    let mut scope = ModelScope {
        relative_pose: &mut relative,
        bodies: &targets,
        pose_dirty: false,
    };
    model.params.set_by_name(name, value, |hook, v| hook(&mut scope, v))?;
    let pose_dirty = scope.pose_dirty;
    let is_static = model.is_static();
    if name == "canonicalBody" {
        model.canonical_body = model.resolve_canonical();
    }

    if let Some(mut node) = world.get_mut::<EntityNode>(entity) {
        node.is_static = is_static;
        if pose_dirty {
            node.relative_pose = relative;
        }
    }
    if pose_dirty {
        super::transforms::apply_model_pose(world, entity);
    }
    Ok(())
}

/// Update a parameter of one of the model's bodies.
pub fn set_body_param(world: &mut World, entity: Entity, body: &str, name: &str, value: &str) -> Result<()> {
    if FIXED_PARAMS.contains(&name) {
        return Err(SimError::UnknownParameter(name.to_string()));
    }
    let body_entity = model_ref(world, entity)?
        .body_entity(body)
        .ok_or_else(|| SimError::UnknownBody(body.to_string()))?;
    let model_abs = world
        .get::<EntityNode>(entity)
        .map(|n| n.abs_pose)
        .unwrap_or_default();
    let body = world
        .get_mut::<Body>(body_entity)
        .ok_or_else(|| SimError::UnknownBody(body.to_string()))?
        .into_inner();
    let before: Pose = body.core.relative_pose;
    let core: &mut BodyCore = &mut body.core;
    body.params.set_by_name(name, value, |hook, v| hook(core, v))?;
    if body.core.relative_pose != before {
        body.place(&model_abs);
    }
    Ok(())
}

/// Update a parameter of one of the model's joints.
pub fn set_joint_param(world: &mut World, entity: Entity, joint: &str, name: &str, value: &str) -> Result<()> {
    if FIXED_PARAMS.contains(&name) {
        return Err(SimError::UnknownParameter(name.to_string()));
    }
    let joint_entity = joint_by_name(world, entity, joint)?
        .ok_or_else(|| SimError::UnknownParameter(format!("{joint}.{name}")))?;
    let Some(joint) = world.get_mut::<Joint>(joint_entity) else {
        return Ok(());
    };
    let joint = joint.into_inner();
    let backend = Arc::clone(&joint.backend);
    joint
        .params
        .set_by_name(name, value, |hook, v| hook(backend.as_ref(), v))
}

/// Update a parameter of one of the model's controllers.
pub fn set_controller_param(
    world: &mut World,
    entity: Entity,
    controller: &str,
    name: &str,
    value: &str,
) -> Result<()> {
    let slot_entity = model_ref(world, entity)?
        .controller_entity(controller)
        .ok_or_else(|| SimError::MalformedControllerConfig(format!("no controller [{controller}]")))?;
    match world.get_mut::<ControllerSlot>(slot_entity) {
        Some(mut slot) => slot.set_param(name, value),
        None => Ok(()),
    }
}

/// Override the pose a model was loaded with.
pub fn set_init_pose(world: &mut World, entity: Entity, pose: Pose) -> Result<()> {
    model_mut(world, entity)?.init_pose = pose;
    Ok(())
}

/// Names of the bodies of `entity`, in load order.
pub fn body_names(world: &World, entity: Entity) -> Result<Vec<String>> {
    Ok(model_ref(world, entity)?
        .bodies
        .iter()
        .map(|b| b.name.clone())
        .collect())
}

/// Entity of the model's canonical body.
pub fn canonical_body(world: &World, entity: Entity) -> Result<Option<Entity>> {
    Ok(model_ref(world, entity)?.canonical_entity())
}

/// Scoped names of every interface of `entity` and its descendants.
pub fn interface_names(world: &World, entity: Entity, out: &mut Vec<String>) {
    let Some(model) = world.get::<Model>(entity) else {
        return;
    };
    let scope = world
        .get::<EntityNode>(entity)
        .map(|n| n.scoped_name.clone())
        .unwrap_or_default();
    for entry in &model.controllers {
        if let Some(slot) = world.get::<ControllerSlot>(entry.entity) {
            slot.interface_names(out);
        }
    }
    for entry in &model.bodies {
        if let Some(body) = world.get::<Body>(entry.entity) {
            body.interface_names(&scope, out);
        }
    }
    for child in super::child_models(world, entity) {
        interface_names(world, child, out);
    }
}
