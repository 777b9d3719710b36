//! Tree node shared by every model entity.
//!
//! Holds identity (name and scoped name), the non-owning parent link, the
//! ordered child list and both the relative and cached absolute pose.
//! Absolute poses are written by [`crate::systems::transforms`].

use bevy_ecs::prelude::{Component, Entity};

use super::pose::Pose;

/// Separator between the segments of a scoped name.
pub const SCOPE_SEPARATOR: &str = "::";

#[derive(Component, Debug, Clone)]
pub struct EntityNode {
    pub name: String,
    /// Path from the root, e.g. `robot::gripper`.
    pub scoped_name: String,
    pub parent: Option<Entity>,
    pub children: Vec<Entity>,
    pub relative_pose: Pose,
    pub abs_pose: Pose,
    pub is_static: bool,
    pub initialized: bool,
}

impl EntityNode {
    /// Node named `name` under a parent whose scoped name is `parent_scope`.
    pub fn new(name: impl Into<String>, parent: Option<(Entity, &str)>) -> Self {
        let name = name.into();
        let (parent, scoped_name) = match parent {
            Some((entity, scope)) => (Some(entity), scoped(scope, &name)),
            None => (None, name.clone()),
        };
        Self {
            name,
            scoped_name,
            parent,
            children: Vec::new(),
            relative_pose: Pose::IDENTITY,
            abs_pose: Pose::IDENTITY,
            is_static: false,
            initialized: false,
        }
    }

    /// Static nodes are frozen once initialized.
    pub fn is_frozen(&self) -> bool {
        self.is_static && self.initialized
    }

    /// Overwrite the cached absolute pose. Returns `false` for frozen nodes.
    pub fn set_abs_pose(&mut self, pose: Pose) -> bool {
        if self.is_frozen() {
            return false;
        }
        self.abs_pose = pose;
        true
    }
}

/// Join a scope and a name.
pub fn scoped(scope: &str, name: &str) -> String {
    format!("{scope}{SCOPE_SEPARATOR}{name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::world::World;
    use glam::DVec3;

    #[test]
    fn scoped_name_includes_parent_path() {
        let parent = World::new().spawn_empty().id();
        let node = EntityNode::new("gripper", Some((parent, "robot::arm")));
        assert_eq!(node.scoped_name, "robot::arm::gripper");
        assert_eq!(EntityNode::new("robot", None).scoped_name, "robot");
    }

    #[test]
    fn static_node_pose_is_frozen_after_init() {
        let mut node = EntityNode::new("wall", None);
        node.is_static = true;
        assert!(node.set_abs_pose(Pose::from_pos(DVec3::X)));
        node.initialized = true;
        assert!(!node.set_abs_pose(Pose::from_pos(DVec3::Y)));
        assert_eq!(node.abs_pose.pos, DVec3::X);
    }
}
