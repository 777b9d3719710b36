//! Shared handle to the physics backend.
//!
//! Bodies and joints are always created through this resource so every
//! backend object of a simulation lives in the same engine.

use std::sync::Arc;

use bevy_ecs::prelude::Resource;

use crate::physics::PhysicsEngine;

#[derive(Resource, Clone)]
pub struct PhysicsHandle {
    pub engine: Arc<dyn PhysicsEngine>,
}

impl PhysicsHandle {
    pub fn new(engine: Arc<dyn PhysicsEngine>) -> Self {
        Self { engine }
    }
}
