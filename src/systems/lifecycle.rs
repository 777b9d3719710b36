//! Init, fini, reset and restore passes over a model subtree.
//!
//! Ordering per model:
//! - init: bodies, controllers, then child models;
//! - fini: controllers, bodies, then child models;
//! - reset: controllers, joints, then body motion is zeroed.
//!
//! Reset leaves the model where it is; `init_pose` is recorded at load time
//! but not restored here.

use bevy_ecs::prelude::*;
use log::{debug, info};

use super::{child_models, model_ref};
use crate::components::body::Body;
use crate::components::controller::ControllerSlot;
use crate::components::entitynode::EntityNode;
use crate::components::joint::Joint;
use crate::components::model::Model;
use crate::error::Result;
use crate::resources::restorerecord::RestoreRecord;

fn controllers_of(world: &World, entity: Entity) -> Vec<Entity> {
    world
        .get::<Model>(entity)
        .map(|m| m.controllers.iter().map(|c| c.entity).collect())
        .unwrap_or_default()
}

fn bodies_of(world: &World, entity: Entity) -> Vec<Entity> {
    world
        .get::<Model>(entity)
        .map(|m| m.bodies.iter().map(|b| b.entity).collect())
        .unwrap_or_default()
}

/// Initialize `entity` and its descendants.
pub fn init_model(world: &mut World, entity: Entity) {
    let Some(node) = world.get::<EntityNode>(entity) else {
        return;
    };
    info!("Initializing model [{}]", node.scoped_name);
    let model_abs = node.abs_pose;

    for body in bodies_of(world, entity) {
        if let Some(body) = world.get::<Body>(body) {
            body.place(&model_abs);
        }
    }
    for controller in controllers_of(world, entity) {
        if let Some(mut slot) = world.get_mut::<ControllerSlot>(controller) {
            slot.init();
        }
    }
    if let Some(mut node) = world.get_mut::<EntityNode>(entity) {
        node.initialized = true;
    }
    for child in child_models(world, entity) {
        init_model(world, child);
    }
}

/// Finalize `entity` and its descendants.
pub fn fini_model(world: &mut World, entity: Entity) {
    for controller in controllers_of(world, entity) {
        if let Some(mut slot) = world.get_mut::<ControllerSlot>(controller) {
            slot.fini();
        }
    }
    for body in bodies_of(world, entity) {
        if let Some(body) = world.get::<Body>(body) {
            body.reset();
        }
    }
    if let Some(mut node) = world.get_mut::<EntityNode>(entity) {
        node.initialized = false;
    }
    for child in child_models(world, entity) {
        fini_model(world, child);
    }
}

/// Reset controllers and joints and zero the motion of every body.
pub fn reset_model(world: &mut World, entity: Entity) {
    for controller in controllers_of(world, entity) {
        if let Some(mut slot) = world.get_mut::<ControllerSlot>(controller) {
            slot.reset();
        }
    }
    let joints = world
        .get::<Model>(entity)
        .map(|m| m.joints.clone())
        .unwrap_or_default();
    for joint in joints {
        if let Some(joint) = world.get::<Joint>(joint) {
            joint.reset();
        }
    }
    for body in bodies_of(world, entity) {
        if let Some(body) = world.get::<Body>(body) {
            body.reset();
        }
    }
    debug!("Reset model {:?}", entity);
}

/// Bump the restore serial of a model with a `selfID`.
///
/// Returns the new serial, or `None` for models without one.
#[track_caller]
pub fn restore_model(world: &mut World, entity: Entity) -> Result<Option<u32>> {
    let self_id = model_ref(world, entity)?.self_id();
    if self_id == -1 {
        return Ok(None);
    }
    let serial = world.resource_mut::<RestoreRecord>().bump(self_id)?;
    Ok(Some(serial))
}
