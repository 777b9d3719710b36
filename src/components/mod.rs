//! ECS components making up the simulated object graph.
//!
//! Every model, body, joint and controller is its own entity; the
//! components below hold their data and the handles linking them.
//!
//! Submodules overview:
//! - [`pose`] – position + orientation value type and its composition rules
//! - [`entitynode`] – name, scope, parent/children and poses of a model
//! - [`model`] – model parameters and handles to its bodies, joints and controllers
//! - [`body`] – one backend rigid body with parameters and sensors
//! - [`joint`] – one backend joint between two bodies
//! - [`controller`] – controller slot, behaviour trait and load-time binding

pub mod body;
pub mod controller;
pub mod entitynode;
pub mod joint;
pub mod model;
pub mod pose;
