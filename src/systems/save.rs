//! Scene serialization.
//!
//! Writes the model tree in exactly the format [`super::load`] reads:
//! parameters as attribute lines of the opening tag, then bodies and joints
//! (physical models only), controllers, the `<attach>` record and the child
//! models. Poses are written from the current state, so a saved scene
//! reloads where the simulation left off.

use bevy_ecs::prelude::*;
use quick_xml::escape::escape;

use crate::components::body::Body;
use crate::components::controller::ControllerSlot;
use crate::components::entitynode::EntityNode;
use crate::components::joint::Joint;
use crate::components::model::{Model, ModelType};
use crate::resources::modelregistry::ModelRegistry;

/// Append `entity` and its subtree.
pub fn save_model(world: &World, entity: Entity, prefix: &str, out: &mut String) {
    let (Some(model), Some(node)) = (world.get::<Model>(entity), world.get::<EntityNode>(entity)) else {
        return;
    };
    let inner = format!("{prefix}  ");
    model.save_header(&node.relative_pose, prefix, out);

    if model.model_type == ModelType::Physical {
        for entry in &model.bodies {
            if let Some(body) = world.get::<Body>(entry.entity) {
                body.save(&node.abs_pose, &inner, out);
            }
        }
        for joint in &model.joints {
            if let Some(joint) = world.get::<Joint>(*joint) {
                joint.save(&inner, out);
            }
        }
    }
    for entry in &model.controllers {
        if let Some(slot) = world.get::<ControllerSlot>(entry.entity) {
            slot.save(&inner, out);
        }
    }
    if let Some(attachment) = &model.attachment {
        out.push_str(&format!(
            "{inner}<attach parentBody=\"{}\" myBody=\"{}\"/>\n",
            escape(attachment.parent_body.as_str()),
            escape(attachment.my_body.as_str())
        ));
    }
    for child in &node.children {
        save_model(world, *child, &inner, out);
    }
    out.push_str(&format!("{prefix}</model:{}>\n", model.model_type.as_str()));
}

/// Every root model wrapped in `<world>`.
pub fn save_world(world: &World) -> String {
    let mut out = String::from("<world>\n");
    for root in world.resource::<ModelRegistry>().roots() {
        save_model(world, *root, "  ", &mut out);
    }
    out.push_str("</world>\n");
    out
}
