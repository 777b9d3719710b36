//! Built-in controller behaviours.
//!
//! - [`holonome`] – drives the canonical body with linear/angular velocity commands
//! - [`joint_velocity`] – velocity motor on one named joint
//! - [`pose_sensor`] – publishes the canonical body pose
//!
//! All of them are registered by [`register_builtins`]. Extra controller
//! types come in through plugin registrars on the
//! [`ControllerRegistry`](crate::resources::controllerregistry::ControllerRegistry).

pub mod holonome;
pub mod joint_velocity;
pub mod pose_sensor;

use crate::components::controller::Controller;
use crate::resources::controllerregistry::ControllerRegistry;

fn new_holonome() -> Box<dyn Controller> {
    Box::new(holonome::Holonome::new())
}

fn new_joint_velocity() -> Box<dyn Controller> {
    Box::new(joint_velocity::JointVelocity::new())
}

fn new_pose_sensor() -> Box<dyn Controller> {
    Box::new(pose_sensor::PoseSensor::new())
}

/// Register every built-in controller type.
pub fn register_builtins(registry: &mut ControllerRegistry) {
    registry.register("holonome", new_holonome);
    registry.register("joint_velocity", new_joint_velocity);
    registry.register("pose_sensor", new_pose_sensor);
}
