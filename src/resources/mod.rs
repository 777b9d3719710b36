//! ECS resources shared by the simulation systems.
//!
//! Overview
//! - `controllerregistry` – controller type factories and plugin registrars
//! - `executor` – sequential or pooled dispatch of per-tick work lists
//! - `modelregistry` – loaded models by scoped name, and the root order
//! - `physics` – handle to the physics backend
//! - `restorerecord` – per-robot serials shared with the coaching side
//! - `simconfig` – INI-backed runtime configuration
//! - `simtime` – simulation clock
pub mod controllerregistry;
pub mod executor;
pub mod modelregistry;
pub mod physics;
pub mod restorerecord;
pub mod simconfig;
pub mod simtime;
