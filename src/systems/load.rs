//! Model loading.
//!
//! [`load_model`] turns a `<model:*>` config node into a model entity with
//! its bodies, joints, controllers and nested child models. The order is:
//!
//! 1. resolve the scoped name and handle duplicates;
//! 2. load the model parameters and the type tag;
//! 3. spawn and register the model (static models get their pose now);
//! 4. physical models load bodies, then joints;
//! 5. non-static models get their deferred pose applied;
//! 6. synthesize `<name>_body` when no body was declared;
//! 7. resolve the canonical body and push the physical flags into bodies;
//! 8. load controllers, bound to the finished body and joint set;
//! 9. load and attach nested models.
//!
//! Body errors and nested model errors are fatal: the partial model is
//! despawned and the error returned. A bad joint or controller is logged and
//! skipped; its siblings still load.

use std::sync::Arc;

use bevy_ecs::message::Messages;
use bevy_ecs::prelude::*;
use log::{error, info, warn};

use super::delete::{delete_model, despawn_model};
use super::{model_mut, model_ref, node_ref};
use crate::components::body::Body;
use crate::components::controller::{ControllerBinding, ControllerSlot};
use crate::components::entitynode::{EntityNode, SCOPE_SEPARATOR};
use crate::components::joint::Joint;
use crate::components::model::{BodyTarget, Model, ModelScope, ModelType};
use crate::components::pose::Pose;
use crate::configtree::ConfigNode;
use crate::error::{Result, SimError};
use crate::events::interface::InterfaceOutbox;
use crate::events::lifecycle::ModelEvent;
use crate::physics::{JointType, PhysicsEngine};
use crate::resources::controllerregistry::ControllerRegistry;
use crate::resources::modelregistry::ModelRegistry;
use crate::resources::physics::PhysicsHandle;

fn physics_engine(world: &World) -> Arc<dyn PhysicsEngine> {
    Arc::clone(&world.resource::<PhysicsHandle>().engine)
}

/// Load a model (and its subtree) under `parent`, or as a root model.
///
/// With `remove_duplicate`, an existing model of the same scoped name is
/// deleted first; otherwise the load fails with `DuplicateName`.
pub fn load_model(
    world: &mut World,
    node: &ConfigNode,
    parent: Option<Entity>,
    remove_duplicate: bool,
) -> Result<Entity> {
    let name = node.get_string("name", "", true)?;
    let parent_scope = match parent {
        Some(p) => Some(node_ref(world, p)?.scoped_name.clone()),
        None => None,
    };
    let mut entity_node = EntityNode::new(name, parent.zip(parent_scope.as_deref()));
    let scoped_name = entity_node.scoped_name.clone();

    if world.resource::<ModelRegistry>().contains(&scoped_name) {
        if !remove_duplicate {
            return Err(SimError::DuplicateName(scoped_name));
        }
        warn!("Model [{}] already exists; replacing it", scoped_name);
        delete_model(world, &scoped_name)?;
    }

    let mut model = Model::new(ModelType::Physical);
    let mut relative = Pose::IDENTITY;
    {
        let mut scope = ModelScope {
            relative_pose: &mut relative,
            bodies: &[],
            pose_dirty: false,
        };
        model.params.load_all(node, |hook, v| hook(&mut scope, v))?;
    }
    model.model_type = ModelType::from_tag(node.name())?;

    entity_node.relative_pose = relative;
    entity_node.is_static = model.is_static();
    let parent_abs = parent
        .and_then(|p| world.get::<EntityNode>(p))
        .map(|n| n.abs_pose)
        .unwrap_or_default();
    let model_abs = parent_abs.compose(&relative);
    if entity_node.is_static {
        entity_node.abs_pose = model_abs;
    }

    let entity = world.spawn((entity_node, model)).id();
    let registered = world
        .resource_mut::<ModelRegistry>()
        .insert(scoped_name.clone(), entity, parent.is_none());
    if let Err(e) = registered {
        world.despawn(entity);
        return Err(e);
    }
    if let Some(mut parent_node) = parent.and_then(|p| world.get_mut::<EntityNode>(p)) {
        parent_node.children.push(entity);
    }

    if let Err(e) = populate(world, entity, node, &model_abs, remove_duplicate) {
        despawn_model(world, entity);
        return Err(e);
    }

    if let Some(mut messages) = world.get_resource_mut::<Messages<ModelEvent>>() {
        messages.write(ModelEvent::Loaded {
            name: scoped_name.clone(),
        });
    }
    info!("Loaded model [{}]", scoped_name);
    Ok(entity)
}

fn populate(
    world: &mut World,
    entity: Entity,
    node: &ConfigNode,
    model_abs: &Pose,
    remove_duplicate: bool,
) -> Result<()> {
    let scoped_name = node_ref(world, entity)?.scoped_name.clone();
    let model_type = model_ref(world, entity)?.model_type;

    if model_type == ModelType::Physical {
        for body_node in node.children_by_prefix("body") {
            load_body(world, entity, body_node, model_abs)?;
        }
        for joint_node in node.children_by_prefix("joint") {
            if let Err(e) = load_joint(world, entity, joint_node) {
                warn!("Skipping <{}> in model [{}]: {}", joint_node.tag(), scoped_name, e);
            }
        }
    }

    let is_static = model_ref(world, entity)?.is_static();
    if !is_static {
        super::transforms::apply_model_pose(world, entity);
    }
    let relative = node_ref(world, entity)?.relative_pose;
    model_mut(world, entity)?.init_pose = relative;

    if model_ref(world, entity)?.bodies.is_empty() {
        add_default_body(world, entity, model_abs)?;
    }

    resolve_canonical(world, entity)?;
    push_body_flags(world, entity)?;

    for controller_node in node.children_by_prefix("controller") {
        if let Err(e) = load_controller(world, entity, controller_node) {
            error!(
                "Discarding <{}> in model [{}]: {}",
                controller_node.tag(),
                scoped_name,
                e
            );
        }
    }

    for child_node in node.children_by_prefix("model") {
        let child = load_model(world, child_node, Some(entity), remove_duplicate)?;
        super::attach::attach_model(world, child, child_node.child("attach"))?;
    }
    Ok(())
}

fn load_body(world: &mut World, model_entity: Entity, node: &ConfigNode, model_abs: &Pose) -> Result<()> {
    let engine = physics_engine(world);
    let mut body = Body::new(node.name(), model_entity, engine.create_body(model_entity));
    body.load(node)?;
    body.place(model_abs);
    let name = body.name();

    let body_entity = world.spawn(body).id();
    let displaced = model_mut(world, model_entity)?.insert_body(name.clone(), body_entity);
    if let Some(old) = displaced {
        warn!("Body [{}] declared twice; the later one replaces it", name);
        world.despawn(old);
    }
    Ok(())
}

fn add_default_body(world: &mut World, entity: Entity, model_abs: &Pose) -> Result<()> {
    let body_name = format!("{}_body", node_ref(world, entity)?.name);
    let engine = physics_engine(world);
    let body = Body::named(body_name.clone(), entity, engine.create_body(entity));
    body.place(model_abs);
    let body_entity = world.spawn(body).id();

    let model = model_mut(world, entity)?.into_inner();
    model.insert_body(body_name.clone(), body_entity);
    model.params.store(model.keys.canonical_body, body_name);
    Ok(())
}

fn resolve_canonical(world: &mut World, entity: Entity) -> Result<()> {
    let model = model_mut(world, entity)?.into_inner();
    let declared = model.params.get(model.keys.canonical_body);
    let resolved = model.resolve_canonical();
    if !declared.is_empty() && resolved.as_deref() != Some(declared.as_str()) {
        warn!("Canonical body [{}] not found; using the first body", declared);
    }
    if let Some(canonical) = &resolved {
        model.params.store(model.keys.canonical_body, canonical.clone());
    }
    model.canonical_body = resolved;
    Ok(())
}

fn push_body_flags(world: &World, entity: Entity) -> Result<()> {
    let model = model_ref(world, entity)?;
    let targets: Vec<BodyTarget> = model
        .bodies
        .iter()
        .filter_map(|entry| world.get::<Body>(entry.entity))
        .map(|body| BodyTarget {
            backend: Arc::clone(body.backend()),
            overrides: body.overrides(),
        })
        .collect();
    model.push_body_flags(&targets);
    Ok(())
}

/// Resolve a joint body reference: a body of `model`, the `canonical` alias,
/// or a scoped `model::body` name of any registered model.
pub fn resolve_body(world: &World, model: Entity, reference: &str) -> Result<Entity> {
    let found = match reference.rsplit_once(SCOPE_SEPARATOR) {
        Some((scope, body)) => world
            .resource::<ModelRegistry>()
            .get(scope)
            .and_then(|m| world.get::<Model>(m))
            .and_then(|m| m.body_entity(body)),
        None => model_ref(world, model)?.body_entity(reference),
    };
    found.ok_or_else(|| SimError::UnknownBody(reference.to_string()))
}

fn load_joint(world: &mut World, model_entity: Entity, node: &ConfigNode) -> Result<()> {
    let kind = JointType::from_tag(node.name())?;
    let engine = physics_engine(world);
    let mut joint = Joint::new(kind, model_entity, engine.create_joint(kind));
    let deferred = joint.load(node)?;
    let name = joint.name();

    let taken = model_ref(world, model_entity)?
        .joints
        .iter()
        .filter_map(|e| world.get::<Joint>(*e))
        .any(|j| j.name() == name);
    if taken {
        return Err(SimError::DuplicateJointName(name));
    }

    let body1 = resolve_body(world, model_entity, &joint.params.get(joint.keys.body1))?;
    let body2 = resolve_body(world, model_entity, &joint.params.get(joint.keys.body2))?;
    let anchor_body = resolve_body(world, model_entity, &joint.anchor_body())?;
    let backend_of = |e: Entity| world.get::<Body>(e).map(|b| Arc::clone(b.backend()));
    let (Some(first), Some(second), Some(anchor)) = (backend_of(body1), backend_of(body2), backend_of(anchor_body))
    else {
        return Err(SimError::UnknownBody(name));
    };

    joint.backend.attach(first.id(), second.id());
    joint.bodies = Some((body1, body2));
    let anchor_point = anchor.abs_pose().pos + joint.params.get(joint.keys.anchor_offset);
    joint.backend.set_anchor(0, anchor_point);
    joint.apply(deferred);
    if kind == JointType::Hinge {
        joint.backend.set_max_force(0, 0.0);
        joint.backend.set_force(0, 0.0);
    }

    let joint_entity = world.spawn(joint).id();
    model_mut(world, model_entity)?.joints.push(joint_entity);
    Ok(())
}

fn controller_binding(world: &World, model_entity: Entity, slot: &ControllerSlot) -> Result<ControllerBinding> {
    let model = model_ref(world, model_entity)?;
    let bodies = model
        .bodies
        .iter()
        .filter_map(|entry| {
            world
                .get::<Body>(entry.entity)
                .map(|b| (entry.name.clone(), Arc::clone(b.backend())))
        })
        .collect();
    let canonical_body = model
        .canonical_entity()
        .and_then(|e| world.get::<Body>(e))
        .map(|b| Arc::clone(b.backend()));
    let joints = model
        .joints
        .iter()
        .filter_map(|e| world.get::<Joint>(*e))
        .map(|j| (j.name(), Arc::clone(&j.backend)))
        .collect();

    Ok(ControllerBinding {
        model: model_entity,
        model_scope: slot.scope.clone(),
        controller_name: slot.name.clone(),
        interfaces: slot.interfaces.clone(),
        bodies,
        canonical_body,
        joints,
        outbox: world.resource::<InterfaceOutbox>().sender(),
    })
}

fn load_controller(world: &mut World, model_entity: Entity, node: &ConfigNode) -> Result<()> {
    let type_name = node.name().to_string();
    node.get_string("name", "", true)?;
    let plugin = node.get_string("plugin", "", false)?;

    let mut registry = world.resource_mut::<ControllerRegistry>();
    if !plugin.is_empty() {
        registry.load_plugin(&plugin);
    }
    let behavior = registry.create(&type_name).ok_or_else(|| {
        SimError::MalformedControllerConfig(format!("unknown controller type [{type_name}]"))
    })?;

    let scope = node_ref(world, model_entity)?.scoped_name.clone();
    let mut slot = ControllerSlot::new(type_name, model_entity, scope, behavior);
    slot.load_common(node)?;
    let binding = controller_binding(world, model_entity, &slot)?;
    slot.behavior.load(node, &binding)?;

    let name = slot.name.clone();
    let slot_entity = world.spawn(slot).id();
    if let Some(old) = model_mut(world, model_entity)?.insert_controller(name, slot_entity) {
        world.despawn(old);
    }
    Ok(())
}
