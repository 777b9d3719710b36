//! Per-tick model update.
//!
//! A tick runs these phases over every model reachable from the registry's
//! roots:
//!
//! 1. bodies: one work-list with every body of every active model;
//! 2. controllers: one work-list with every controller of every active model;
//! 3. the physics step (skipped while paused);
//! 4. pose sync: each active model follows its canonical body, parents
//!    before children.
//!
//! A model is active unless it is static and has no controllers. An inactive
//! model is skipped but its children are still visited.
//!
//! The body and controller work-lists are ordered by model (depth-first) and
//! then by position inside the model, and run on the
//! [`UpdateExecutor`]. Sequential and pooled runs execute the same closure
//! over the same list, and each unit touches only its own component plus
//! internally locked backend calls, so both modes end the tick in the same
//! state.

use bevy_ecs::prelude::*;
use log::debug;
use rustc_hash::FxHashMap;

use crate::components::body::Body;
use crate::components::controller::{ControllerSlot, UpdateContext};
use crate::components::entitynode::EntityNode;
use crate::components::model::Model;
use crate::resources::executor::UpdateExecutor;
use crate::resources::modelregistry::ModelRegistry;
use crate::resources::physics::PhysicsHandle;
use crate::resources::simtime::SimTime;

/// Rank of a unit in a work-list: (model order, position in model).
type Rank = (usize, usize);

fn collect_active(world: &World, entity: Entity, out: &mut Vec<Entity>) {
    let Some(model) = world.get::<Model>(entity) else {
        return;
    };
    let is_static = world.get::<EntityNode>(entity).is_some_and(|n| n.is_static);
    if !(is_static && model.controllers.is_empty()) {
        out.push(entity);
    }
    for child in super::child_models(world, entity) {
        collect_active(world, child, out);
    }
}

/// Active models in update order.
pub fn active_models(world: &World) -> Vec<Entity> {
    let mut active = Vec::new();
    for root in world.resource::<ModelRegistry>().roots() {
        collect_active(world, *root, &mut active);
    }
    active
}

fn ranks(world: &World, models: &[Entity], units: impl Fn(&Model) -> Vec<Entity>) -> FxHashMap<Entity, Rank> {
    let mut ranks = FxHashMap::default();
    for (model_index, entity) in models.iter().enumerate() {
        if let Some(model) = world.get::<Model>(*entity) {
            for (unit_index, unit) in units(model).into_iter().enumerate() {
                ranks.insert(unit, (model_index, unit_index));
            }
        }
    }
    ranks
}

/// Update every body of the given models.
pub fn update_bodies(world: &mut World, models: &[Entity]) {
    let ranks = ranks(world, models, |m| m.bodies.iter().map(|b| b.entity).collect());
    world.resource_scope(|world, executor: Mut<UpdateExecutor>| {
        let mut query = world.query::<(Entity, &mut Body)>();
        let mut units: Vec<(Rank, &mut Body)> = query
            .iter_mut(world)
            .filter_map(|(entity, body)| ranks.get(&entity).map(|rank| (*rank, body.into_inner())))
            .collect();
        units.sort_by_key(|(rank, _)| *rank);
        executor.run(&mut units, |(_, body)| body.update());
    });
}

/// Update every controller of the given models.
pub fn update_controllers(world: &mut World, models: &[Entity], ctx: &UpdateContext) {
    let ranks = ranks(world, models, |m| m.controllers.iter().map(|c| c.entity).collect());
    world.resource_scope(|world, executor: Mut<UpdateExecutor>| {
        let mut query = world.query::<(Entity, &mut ControllerSlot)>();
        let mut units: Vec<(Rank, &mut ControllerSlot)> = query
            .iter_mut(world)
            .filter_map(|(entity, slot)| ranks.get(&entity).map(|rank| (*rank, slot.into_inner())))
            .collect();
        units.sort_by_key(|(rank, _)| *rank);
        executor.run(&mut units, |(_, slot)| slot.update(ctx));
    });
}

/// Run one tick of `dt` seconds.
pub fn tick(world: &mut World, dt: f64) {
    super::time::advance_sim_time(world, dt);
    let time = *world.resource::<SimTime>();
    let ctx = UpdateContext {
        sim_time: time.elapsed,
        dt: time.delta,
        paused: time.paused,
    };

    let models = active_models(world);
    if !time.paused {
        update_bodies(world, &models);
    }
    update_controllers(world, &models, &ctx);

    if !time.paused {
        let engine = world.resource::<PhysicsHandle>().engine.clone();
        engine.step(dt);
    }

    for model in &models {
        super::transforms::sync_from_canonical(world, *model);
    }
    debug!("tick {} done ({} active models)", time.iterations, models.len());
}
