//! Integration tests for joint loading, stops and runtime joint parameters.

#![allow(dead_code, unused_imports)]

use std::sync::Arc;

use bevy_ecs::prelude::*;
use glam::DVec3;

use robosim::components::body::Body;
use robosim::components::joint::Joint;
use robosim::error::SimError;
use robosim::physics::iterative::IterativeEngine;
use robosim::physics::{JointType, PhysicsBody, PhysicsJoint};
use robosim::simulation::Simulation;
use robosim::systems::modelops;

const EPSILON: f64 = 1e-9;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn make_sim() -> (Simulation, Arc<IterativeEngine>) {
    let engine = Arc::new(IterativeEngine::new());
    (Simulation::new(engine.clone()), engine)
}

fn joint_backend(sim: &Simulation, model: &str, joint: &str) -> Arc<dyn PhysicsJoint> {
    let entity = sim.model_by_name(model).unwrap();
    let joint_entity = modelops::joint_by_name(sim.world(), entity, joint).unwrap().unwrap();
    Arc::clone(&sim.world().get::<Joint>(joint_entity).unwrap().backend)
}

const PENDULUM: &str = r#"
<model:physical name="pendulum" xyz="0 0 2">
  <body:box name="base" enableGravity="false"/>
  <body:box name="bob" xyz="0 0 -1" enableGravity="false"/>
  <joint:hinge name="pivot" body1="bob" body2="base" axis="0 1 0" lowStop="-30" highStop="30"/>
</model:physical>
"#;

// ==================== LOADING ====================

#[test]
fn hinge_binds_both_bodies_and_starts_passive() {
    let (mut sim, _engine) = make_sim();
    let model = sim.load_model(PENDULUM, false).unwrap();

    let m = sim.model(model).unwrap();
    assert_eq!(m.joint_count(), 1);
    let joint_entity = m.joint_at(0).unwrap();
    let joint = sim.world().get::<Joint>(joint_entity).unwrap();
    assert_eq!(joint.kind, JointType::Hinge);
    let (first, second) = joint.bodies.unwrap();
    assert_eq!(Some(first), m.body_entity("bob"));
    assert_eq!(Some(second), m.body_entity("base"));

    let backend = &joint.backend;
    assert!(approx_eq(backend.max_force(0), 0.0));
    assert!(approx_eq(backend.low_stop(0), (-30.0f64).to_radians()));
    assert!(approx_eq(backend.high_stop(0), 30.0f64.to_radians()));
    assert!(approx_eq(backend.axis(0).y, 1.0));
}

#[test]
fn anchor_defaults_to_second_body_plus_offset() {
    let (mut sim, _engine) = make_sim();
    sim.load_model(
        r#"<model:physical name="door" xyz="1 0 0">
             <body:box name="frame"/>
             <body:box name="leaf" xyz="0 0.5 0"/>
             <joint:hinge name="hinge" body1="frame" body2="leaf" anchorOffset="0 0 0.25"/>
             <joint:hinge name="latch" body1="leaf" body2="frame" anchor="leaf"/>
           </model:physical>"#,
        false,
    )
    .unwrap();

    let hinge = joint_backend(&sim, "door", "hinge").anchor(0);
    assert!((hinge - DVec3::new(1.0, 0.5, 0.25)).length() < EPSILON);
    let latch = joint_backend(&sim, "door", "latch").anchor(0);
    assert!((latch - DVec3::new(1.0, 0.5, 0.0)).length() < EPSILON);
}

#[test]
fn canonical_alias_resolves_in_joint_references() {
    let (mut sim, _engine) = make_sim();
    let model = sim
        .load_model(
            r#"<model:physical name="arm" canonicalBody="shoulder">
                 <body:box name="upper"/>
                 <body:box name="shoulder"/>
                 <joint:ball name="socket" body1="upper" body2="canonical"/>
               </model:physical>"#,
            false,
        )
        .unwrap();
    let m = sim.model(model).unwrap();
    let joint = sim.world().get::<Joint>(m.joint_at(0).unwrap()).unwrap();
    assert_eq!(joint.bodies.unwrap().1, m.body_entity("shoulder").unwrap());
}

#[test]
fn unknown_joint_type_is_skipped() {
    let (mut sim, engine) = make_sim();
    let model = sim
        .load_model(
            r#"<model:physical name="rig">
                 <body:box name="a"/>
                 <body:box name="b"/>
                 <joint:piston name="ram" body1="a" body2="b"/>
                 <joint:slider name="rail" body1="a" body2="b"/>
               </model:physical>"#,
            false,
        )
        .unwrap();

    let m = sim.model(model).unwrap();
    assert_eq!(m.joint_count(), 1);
    assert_eq!(engine.joint_count(), 1);
    assert!(modelops::joint_by_name(sim.world(), model, "ram").unwrap().is_none());
    assert!(modelops::joint_by_name(sim.world(), model, "rail").unwrap().is_some());
}

#[test]
fn duplicate_joint_name_keeps_the_first() {
    let (mut sim, _engine) = make_sim();
    let model = sim
        .load_model(
            r#"<model:physical name="rig">
                 <body:box name="a"/>
                 <body:box name="b"/>
                 <body:box name="c"/>
                 <joint:hinge name="j" body1="a" body2="b"/>
                 <joint:hinge name="j" body1="b" body2="c"/>
               </model:physical>"#,
            false,
        )
        .unwrap();

    let m = sim.model(model).unwrap();
    assert_eq!(m.joint_count(), 1);
    let joint = sim.world().get::<Joint>(m.joint_at(0).unwrap()).unwrap();
    assert_eq!(
        joint.bodies,
        Some((m.body_entity("a").unwrap(), m.body_entity("b").unwrap()))
    );
}

#[test]
fn joint_with_unknown_body_is_skipped() {
    let (mut sim, engine) = make_sim();
    let model = sim
        .load_model(
            r#"<model:physical name="rig">
                 <body:box name="a"/>
                 <joint:hinge name="j" body1="a" body2="nowhere::b"/>
               </model:physical>"#,
            false,
        )
        .unwrap();
    assert_eq!(sim.model(model).unwrap().joint_count(), 0);
    assert_eq!(engine.joint_count(), 0);
}

#[test]
fn joint_index_out_of_range_is_an_error() {
    let (mut sim, _engine) = make_sim();
    let model = sim.load_model(PENDULUM, false).unwrap();
    let result = sim.model(model).unwrap().joint_at(3);
    match result {
        Err(SimError::InvalidIndex { what, index, file, line }) => {
            assert_eq!(what, "joint");
            assert_eq!(index, 3);
            assert!(file.ends_with("joints_integration.rs"), "reported {file}:{line}");
        }
        other => panic!("unexpected result {other:?}"),
    }
}

// ==================== SIMULATION ====================

#[test]
fn driven_hinge_is_clamped_at_its_stops() {
    let (mut sim, _engine) = make_sim();
    sim.load_model(PENDULUM, false).unwrap();
    sim.init();
    let pivot = joint_backend(&sim, "pendulum", "pivot");
    let (low, high) = ((-30.0f64).to_radians(), 30.0f64.to_radians());

    for _ in 0..100 {
        pivot.set_force(0, 5.0);
        sim.step();
        let angle = pivot.angle(0);
        assert!(angle >= low - EPSILON && angle <= high + EPSILON, "angle {angle} left the stops");
    }
    assert!(approx_eq(pivot.angle(0), high));

    for _ in 0..200 {
        pivot.set_force(0, -5.0);
        sim.step();
        let angle = pivot.angle(0);
        assert!(angle >= low - EPSILON && angle <= high + EPSILON, "angle {angle} left the stops");
    }
    assert!(approx_eq(pivot.angle(0), low));
}

#[test]
fn slider_stops_are_in_metres() {
    let (mut sim, _engine) = make_sim();
    sim.load_model(
        r#"<model:physical name="drawer">
             <body:box name="cabinet" enableGravity="false"/>
             <body:box name="tray" enableGravity="false"/>
             <joint:slider name="rail" body1="tray" body2="cabinet" lowStop="0" highStop="0.4"/>
           </model:physical>"#,
        false,
    )
    .unwrap();
    let rail = joint_backend(&sim, "drawer", "rail");
    assert!(approx_eq(rail.high_stop(0), 0.4));
    assert!(approx_eq(rail.low_stop(0), 0.0));
}

// ==================== RUNTIME PARAMETERS ====================

#[test]
fn stops_can_be_changed_at_runtime() {
    let (mut sim, _engine) = make_sim();
    sim.load_model(PENDULUM, false).unwrap();
    sim.set_joint_param("pendulum", "pivot", "highStop", "10").unwrap();
    let pivot = joint_backend(&sim, "pendulum", "pivot");
    assert!(approx_eq(pivot.high_stop(0), 10.0f64.to_radians()));

    let model = sim.model_by_name("pendulum").unwrap();
    let joint_entity = modelops::joint_by_name(sim.world(), model, "pivot").unwrap().unwrap();
    let joint = sim.world().get::<Joint>(joint_entity).unwrap();
    assert!(approx_eq(joint.params.get(joint.keys.high_stop), 10.0));
}

#[test]
fn wiring_parameters_are_fixed_after_load() {
    let (mut sim, _engine) = make_sim();
    sim.load_model(PENDULUM, false).unwrap();
    for name in ["name", "body1", "body2"] {
        let result = sim.set_joint_param("pendulum", "pivot", name, "base");
        assert!(matches!(result, Err(SimError::UnknownParameter(_))), "{name} should be fixed");
    }
    assert!(matches!(
        sim.set_joint_param("pendulum", "pivot", "highStop", "wide"),
        Err(SimError::InvalidParameter { .. })
    ));
    assert!(matches!(
        sim.set_joint_param("pendulum", "nope", "highStop", "1"),
        Err(SimError::UnknownParameter(_))
    ));
}

#[test]
fn reset_clears_joint_motors() {
    let (mut sim, _engine) = make_sim();
    sim.load_model(PENDULUM, false).unwrap();
    sim.init();
    let pivot = joint_backend(&sim, "pendulum", "pivot");
    pivot.set_velocity(0, 1.0);
    pivot.set_max_force(0, 3.0);
    sim.step();

    sim.reset();
    assert!(approx_eq(pivot.velocity(0), 0.0));
    assert!(approx_eq(pivot.max_force(0), 0.0));
}
