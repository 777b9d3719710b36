//! Messages and channels leaving the simulation core.
//!
//! Submodules:
//! - [`interface`] – interface declarations and the sample outbox fed by controllers
//! - [`lifecycle`] – model load/attach/delete notifications
pub mod interface;
pub mod lifecycle;
