//! Cross-model attachment.
//!
//! A nested model is welded to a body of its parent with a zero-range hinge:
//! anchored at the child body's current position, axis `(0, 1, 0)`, both
//! stops at zero. The `<attach>` node is optional; `myBody` defaults to the
//! child's canonical body and `parentBody` to the parent's.

use bevy_ecs::message::Messages;
use bevy_ecs::prelude::*;
use glam::DVec3;
use log::debug;

use super::{model_mut, model_ref, node_ref};
use crate::components::body::Body;
use crate::components::joint::Joint;
use crate::components::model::{Attachment, CANONICAL_ALIAS};
use crate::configtree::ConfigNode;
use crate::error::{Result, SimError};
use crate::events::lifecycle::ModelEvent;
use crate::physics::JointType;
use crate::resources::physics::PhysicsHandle;

/// Weld `child` to its parent model. Returns the joint entity.
///
/// Both bodies are resolved before anything is created, so a failure leaves
/// no joint behind.
pub fn attach_model(world: &mut World, child: Entity, node: Option<&ConfigNode>) -> Result<Entity> {
    let child_node = node_ref(world, child)?;
    let child_name = child_node.scoped_name.clone();
    let parent = child_node.parent.ok_or_else(|| {
        SimError::MissingCanonicalBody(format!("model [{child_name}] has no parent to attach to"))
    })?;

    let (my_body_name, parent_body_name) = match node {
        Some(node) => (
            node.get_string("myBody", "", false)?,
            node.get_string("parentBody", CANONICAL_ALIAS, false)?,
        ),
        None => (String::new(), CANONICAL_ALIAS.to_string()),
    };

    let child_model = model_ref(world, child)?;
    let my_body_name = if my_body_name.is_empty() {
        child_model.canonical_body.clone().unwrap_or_default()
    } else {
        my_body_name
    };
    let my_body = child_model
        .body_entity(&my_body_name)
        .ok_or_else(|| SimError::MissingCanonicalBody(format!("model [{child_name}] has no body [{my_body_name}]")))?;
    let parent_body = model_ref(world, parent)?.body_entity(&parent_body_name).ok_or_else(|| {
        SimError::MissingCanonicalBody(format!(
            "parent of [{child_name}] has no body [{parent_body_name}]"
        ))
    })?;

    let (Some(mine), Some(theirs)) = (world.get::<Body>(my_body), world.get::<Body>(parent_body)) else {
        return Err(SimError::UnknownBody(my_body_name));
    };
    let (my_id, parent_id) = (mine.backend().id(), theirs.backend().id());
    let anchor = mine.backend().abs_pose().pos;

    let engine = world.resource::<PhysicsHandle>().engine.clone();
    let mut joint = Joint::new(JointType::Hinge, child, engine.create_joint(JointType::Hinge));
    joint.backend.attach(my_id, parent_id);
    joint.backend.set_anchor(0, anchor);
    joint.backend.set_axis(0, DVec3::Y);
    joint.backend.set_high_stop(0, 0.0);
    joint.backend.set_low_stop(0, 0.0);
    joint.bodies = Some((my_body, parent_body));
    let child_local = node_ref(world, child)?.name.clone();
    joint.params.store(joint.keys.name, format!("{child_local}_attach"));
    joint.params.store(joint.keys.body1, my_body_name.clone());
    joint.params.store(joint.keys.body2, parent_body_name.clone());

    let joint_entity = world.spawn(joint).id();
    model_mut(world, child)?.attachment = Some(Attachment {
        parent_body: parent_body_name,
        my_body: my_body_name,
        joint: joint_entity,
    });

    let parent_name = node_ref(world, parent)?.scoped_name.clone();
    if let Some(mut messages) = world.get_resource_mut::<Messages<ModelEvent>>() {
        messages.write(ModelEvent::Attached {
            name: child_name.clone(),
            parent: parent_name.clone(),
        });
    }
    debug!("Attached [{}] to [{}]", child_name, parent_name);
    Ok(joint_entity)
}
