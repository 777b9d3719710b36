//! Model deletion.
//!
//! Deleting a model despawns its bodies, joints, controllers and attachment
//! joint, then its child models. Joints of surviving models may reference
//! the despawned bodies; those are detached in the backend and their body
//! handles cleared so nothing dereferences a dead slot.

use bevy_ecs::message::Messages;
use bevy_ecs::prelude::*;
use log::{info, warn};
use rustc_hash::FxHashSet;

use crate::components::entitynode::EntityNode;
use crate::components::joint::Joint;
use crate::components::model::Model;
use crate::error::{Result, SimError};
use crate::events::lifecycle::ModelEvent;
use crate::resources::modelregistry::ModelRegistry;

/// Delete the model registered under `scoped_name` and everything below it.
pub fn delete_model(world: &mut World, scoped_name: &str) -> Result<()> {
    let entity = world
        .resource::<ModelRegistry>()
        .get(scoped_name)
        .ok_or_else(|| SimError::UnknownModel(scoped_name.to_string()))?;
    despawn_model(world, entity);
    if let Some(mut messages) = world.get_resource_mut::<Messages<ModelEvent>>() {
        messages.write(ModelEvent::Deleted {
            name: scoped_name.to_string(),
        });
    }
    info!("Deleted model [{}]", scoped_name);
    Ok(())
}

/// Despawn a model tree by entity. Also used to clean up a failed load.
pub fn despawn_model(world: &mut World, entity: Entity) {
    let parent = world.get::<EntityNode>(entity).and_then(|node| node.parent);
    let mut removed_bodies = FxHashSet::default();
    despawn_tree(world, entity, &mut removed_bodies);

    if let Some(mut parent) = parent.and_then(|p| world.get_mut::<EntityNode>(p)) {
        parent.children.retain(|child| *child != entity);
    }
    detach_dangling_joints(world, &removed_bodies);
}

fn despawn_tree(world: &mut World, entity: Entity, removed_bodies: &mut FxHashSet<Entity>) {
    for child in super::child_models(world, entity) {
        despawn_tree(world, child, removed_bodies);
    }

    if let Some(model) = world.get::<Model>(entity) {
        let mut owned: Vec<Entity> = Vec::new();
        owned.extend(model.controllers.iter().map(|c| c.entity));
        owned.extend(model.joints.iter().copied());
        owned.extend(model.attachment.as_ref().map(|a| a.joint));
        let bodies: Vec<Entity> = model.bodies.iter().map(|b| b.entity).collect();
        removed_bodies.extend(bodies.iter().copied());
        owned.extend(bodies);
        for e in owned {
            world.despawn(e);
        }
    }

    if let Some(scoped_name) = world.get::<EntityNode>(entity).map(|n| n.scoped_name.clone()) {
        let mut registry = world.resource_mut::<ModelRegistry>();
        if registry.get(&scoped_name) == Some(entity) {
            registry.remove(&scoped_name);
        }
    }
    world.despawn(entity);
}

fn detach_dangling_joints(world: &mut World, removed_bodies: &FxHashSet<Entity>) {
    if removed_bodies.is_empty() {
        return;
    }
    let mut joints = world.query::<&mut Joint>();
    for mut joint in joints.iter_mut(world) {
        let dangling = matches!(
            joint.bodies,
            Some((a, b)) if removed_bodies.contains(&a) || removed_bodies.contains(&b)
        );
        if dangling {
            warn!("Joint [{}] lost a body and was detached", joint.name());
            joint.backend.detach();
            joint.bodies = None;
        }
    }
}
