//! Pose propagation down the model tree.
//!
//! Two directions exist:
//!
//! - [`apply_model_pose`] pushes a model's relative pose down: it recomputes
//!   the absolute pose from the parent's and places every body of the model
//!   and of its descendants. Used while loading and when a pose parameter
//!   changes.
//! - [`sync_from_canonical`] pulls a model's pose up from physics: once the
//!   backend owns body motion, the canonical body is the source of truth and
//!   the model's absolute and relative poses follow it.
//!
//! Frozen (static and initialized) models are never moved.

use bevy_ecs::prelude::*;

use crate::components::body::Body;
use crate::components::entitynode::EntityNode;
use crate::components::model::Model;
use crate::components::pose::Pose;

/// Absolute pose of the parent of `entity`, identity for roots.
pub fn parent_abs_pose(world: &World, entity: Entity) -> Pose {
    world
        .get::<EntityNode>(entity)
        .and_then(|node| node.parent)
        .and_then(|parent| world.get::<EntityNode>(parent))
        .map(|parent| parent.abs_pose)
        .unwrap_or_default()
}

/// Recompute the absolute pose of `entity` and its descendants and place their bodies.
pub fn apply_model_pose(world: &mut World, entity: Entity) {
    let parent_abs = parent_abs_pose(world, entity);
    let Some(mut node) = world.get_mut::<EntityNode>(entity) else {
        return;
    };
    let abs = parent_abs.compose(&node.relative_pose);
    let moved = node.set_abs_pose(abs);
    let children = node.children.clone();

    if moved {
        place_bodies(world, entity, &abs);
    }
    for child in children {
        apply_model_pose(world, child);
    }
}

/// Place every body of `entity` relative to `model_abs`.
pub fn place_bodies(world: &World, entity: Entity, model_abs: &Pose) {
    let Some(model) = world.get::<Model>(entity) else {
        return;
    };
    for entry in &model.bodies {
        if let Some(body) = world.get::<Body>(entry.entity) {
            body.place(model_abs);
        }
    }
}

/// Follow the canonical body: `abs = canonical_abs * canonical_rel^-1`.
pub fn sync_from_canonical(world: &mut World, entity: Entity) {
    let Some(canonical) = world.get::<Model>(entity).and_then(Model::canonical_entity) else {
        return;
    };
    let Some(body) = world.get::<Body>(canonical) else {
        return;
    };
    let abs = body
        .backend()
        .abs_pose()
        .compose(&body.core.relative_pose.inverse());
    let parent_abs = parent_abs_pose(world, entity);

    let Some(mut node) = world.get_mut::<EntityNode>(entity) else {
        return;
    };
    if node.set_abs_pose(abs) {
        node.relative_pose = abs.relative_to(&parent_abs);
    }
}
