//! robosim library.
//!
//! Simulation core of a multi-robot simulator: models, bodies, joints and
//! controllers loaded from XML scenes and advanced through a pluggable
//! physics backend. Exposed as a library for the CLI and integration tests.

pub mod components;
pub mod configtree;
pub mod controllers;
pub mod error;
pub mod events;
pub mod params;
pub mod physics;
pub mod resources;
pub mod simulation;
pub mod systems;
