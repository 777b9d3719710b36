//! Notifications about models entering and leaving the registry.

use bevy_ecs::message::Message;

/// Model registry changes, written to `Messages<ModelEvent>`.
#[derive(Message, Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    Loaded { name: String },
    Attached { name: String, parent: String },
    Deleted { name: String },
}
