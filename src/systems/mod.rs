//! Simulation systems.
//!
//! Every system is a plain function over `&mut World` (or `&World` for
//! read-only passes). The [`crate::simulation::Simulation`] facade calls them
//! in the right order; tests may call them directly.
//!
//! Submodules overview
//! - [`attach`] – weld a child model to a body of its parent
//! - [`delete`] – despawn model trees and detach joints left dangling
//! - [`lifecycle`] – init, fini, reset and restore passes over the model tree
//! - [`load`] – build models, bodies, joints and controllers from config nodes
//! - [`modelops`] – whole-model velocity, bounding box and runtime parameter access
//! - [`save`] – write the model tree back in the load format
//! - [`time`] – advance the simulation clock
//! - [`transforms`] – absolute pose propagation and canonical-body pose sync
//! - [`update`] – the per-tick body and controller work lists

use bevy_ecs::prelude::*;

use crate::components::entitynode::EntityNode;
use crate::components::model::Model;
use crate::error::{Result, SimError};

pub mod attach;
pub mod delete;
pub mod lifecycle;
pub mod load;
pub mod modelops;
pub mod save;
pub mod time;
pub mod transforms;
pub mod update;

/// Model component of `entity`, or `UnknownModel`.
pub(crate) fn model_ref(world: &World, entity: Entity) -> Result<&Model> {
    world
        .get::<Model>(entity)
        .ok_or_else(|| SimError::UnknownModel(format!("{entity:?}")))
}

pub(crate) fn model_mut(world: &mut World, entity: Entity) -> Result<Mut<'_, Model>> {
    world
        .get_mut::<Model>(entity)
        .ok_or_else(|| SimError::UnknownModel(format!("{entity:?}")))
}

/// Tree node of `entity`, or `UnknownModel`.
pub(crate) fn node_ref(world: &World, entity: Entity) -> Result<&EntityNode> {
    world
        .get::<EntityNode>(entity)
        .ok_or_else(|| SimError::UnknownModel(format!("{entity:?}")))
}

/// Child models of `entity`, in load order.
pub(crate) fn child_models(world: &World, entity: Entity) -> Vec<Entity> {
    world
        .get::<EntityNode>(entity)
        .map(|node| node.children.clone())
        .unwrap_or_default()
}
