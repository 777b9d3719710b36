use bevy_ecs::prelude::Resource;

/// Simulation clock, advanced by [`crate::systems::time::advance_sim_time`].
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct SimTime {
    /// Simulated seconds since load.
    pub elapsed: f64,
    /// Step of the last tick.
    pub delta: f64,
    pub iterations: u64,
    /// Physics does not advance while paused.
    pub paused: bool,
}

impl Default for SimTime {
    fn default() -> Self {
        SimTime {
            elapsed: 0.0,
            delta: 0.0,
            iterations: 0,
            paused: false,
        }
    }
}
