//! Simulation clock system.
//!
//! Updates the shared [`SimTime`](crate::resources::simtime::SimTime)
//! resource once per tick.
use bevy_ecs::prelude::*;

use crate::resources::simtime::SimTime;

/// Advance elapsed time by `dt` unless paused.
///
/// A paused tick leaves `elapsed` and `iterations` untouched and reports a
/// zero `delta`.
pub fn advance_sim_time(world: &mut World, dt: f64) {
    let mut time = world.resource_mut::<SimTime>();
    if time.paused {
        time.delta = 0.0;
        return;
    }
    time.elapsed += dt;
    time.delta = dt;
    time.iterations += 1;
}
