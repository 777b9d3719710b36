//! Integration tests for parameter loading, runtime updates and scene save/reload.

#![allow(dead_code, unused_imports)]

use std::sync::Arc;

use glam::DVec3;

use robosim::components::body::Body;
use robosim::components::pose::Pose;
use robosim::error::SimError;
use robosim::physics::PhysicsBody;
use robosim::physics::iterative::IterativeEngine;
use robosim::simulation::Simulation;
use robosim::systems::{modelops, update};

const EPSILON: f64 = 1e-9;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn vec_approx_eq(a: DVec3, b: DVec3) -> bool {
    (a - b).length() < EPSILON
}

fn make_sim() -> Simulation {
    Simulation::new(Arc::new(IterativeEngine::new()))
}

fn body_backend(sim: &Simulation, model: &str, body: &str) -> Arc<dyn PhysicsBody> {
    let entity = sim.model_by_name(model).unwrap();
    let body_entity = sim.model(entity).unwrap().body_entity(body).unwrap();
    Arc::clone(sim.world().get::<Body>(body_entity).unwrap().backend())
}

const SCENE: &str = r#"
<world>
  <model:physical name="anchor" static="true" xyz="0 0 2" laserFiducialId="4">
    <body:box name="post" size="0.2 0.2 2"/>
  </model:physical>
  <model:physical name="robot" xyz="1 0 0" selfID="2" team="blue" enableFriction="false">
    <body:box name="chassis" mass="5" size="1 0.5 0.25"/>
    <body:cylinder name="wheel" xyz="0.5 0 0" enableFriction="true" collide="none">
      <sensor:encoder name="tick">
        <interface:counter name="count"/>
      </sensor:encoder>
    </body:cylinder>
    <joint:hinge name="axle" body1="wheel" body2="chassis" axis="0 1 0" lowStop="-45" highStop="45"/>
    <joint:hinge name="tether" body1="chassis" body2="anchor::post"/>
    <controller:holonome name="drive" linearVel="0.5 0 0" updateRate="20">
      <interface:position name="odom"/>
    </controller:holonome>
    <controller:pose_sensor name="gps" alwaysOn="true"/>
    <model:physical name="arm" xyz="0 0 0.5">
      <body:box name="link"/>
      <attach parentBody="chassis" myBody="link"/>
    </model:physical>
  </model:physical>
  <model:empty name="waypoint" xyz="3 3 0"/>
</world>
"#;

// ==================== LOADING ====================

#[test]
fn model_flags_reach_bodies_without_their_own_setting() {
    let mut sim = make_sim();
    sim.load_world(SCENE).unwrap();

    let chassis = body_backend(&sim, "robot", "chassis");
    let wheel = body_backend(&sim, "robot", "wheel");
    assert!(!chassis.friction_mode());
    assert!(wheel.friction_mode());
    assert_eq!(chassis.collide_mode(), "all");
    assert_eq!(wheel.collide_mode(), "none");
    assert!(approx_eq(chassis.mass(), 5.0));

    let post = body_backend(&sim, "anchor", "post");
    assert_eq!(post.laser_fiducial_id(), 4);
    assert_eq!(chassis.laser_fiducial_id(), -1);
}

#[test]
fn model_parameters_are_readable_after_load() {
    let mut sim = make_sim();
    sim.load_world(SCENE).unwrap();
    let robot = sim.model(sim.model_by_name("robot").unwrap()).unwrap();
    assert_eq!(robot.self_id(), 2);
    assert_eq!(robot.team(), "blue");
    assert!(!robot.friction_enabled());
    assert!(robot.gravity_enabled());
    assert!(!robot.is_static());
}

#[test]
fn parameters_may_be_given_as_child_elements() {
    let mut sim = make_sim();
    sim.load_model(
        r#"<model:physical name="turret">
             <xyz>0 0 1</xyz>
             <rpy>0 0 90</rpy>
             <body:box name="barrel" xyz="1 0 0"/>
           </model:physical>"#,
        false,
    )
    .unwrap();

    let barrel = body_backend(&sim, "turret", "barrel").abs_pose();
    assert!((barrel.pos - DVec3::new(0.0, 1.0, 1.0)).length() < 1e-9);
}

#[test]
fn unparsable_values_fail_the_load() {
    let mut sim = make_sim();
    let result = sim.load_model(r#"<model:physical name="bad" xyz="a b c"/>"#, false);
    assert!(matches!(result, Err(SimError::InvalidParameter { .. })));

    let result = sim.load_model(
        r#"<model:physical name="heavy"><body:box name="b" mass="lots"/></model:physical>"#,
        false,
    );
    assert!(matches!(result, Err(SimError::InvalidParameter { .. })));
    assert!(sim.model_names().is_empty());
}

// ==================== RUNTIME UPDATES ====================

#[test]
fn moving_a_model_moves_its_bodies_and_children() {
    let mut sim = make_sim();
    sim.load_world(SCENE).unwrap();
    sim.set_model_param("robot", "xyz", "2 0 0").unwrap();

    assert!(vec_approx_eq(sim.model_pose("robot").unwrap().pos, DVec3::new(2.0, 0.0, 0.0)));
    assert!(vec_approx_eq(
        body_backend(&sim, "robot", "wheel").abs_pose().pos,
        DVec3::new(2.5, 0.0, 0.0)
    ));
    assert!(vec_approx_eq(sim.model_pose("robot::arm").unwrap().pos, DVec3::new(2.0, 0.0, 0.5)));
    assert!(vec_approx_eq(
        body_backend(&sim, "robot::arm", "link").abs_pose().pos,
        DVec3::new(2.0, 0.0, 0.5)
    ));
}

#[test]
fn moving_a_body_places_it_relative_to_its_model() {
    let mut sim = make_sim();
    sim.load_world(SCENE).unwrap();
    sim.set_body_param("robot", "wheel", "xyz", "0 0.5 0").unwrap();
    assert!(vec_approx_eq(
        body_backend(&sim, "robot", "wheel").abs_pose().pos,
        DVec3::new(1.0, 0.5, 0.0)
    ));

    sim.set_body_param("robot", "chassis", "mass", "2.5").unwrap();
    assert!(approx_eq(body_backend(&sim, "robot", "chassis").mass(), 2.5));
    assert!(matches!(
        sim.set_body_param("robot", "hull", "mass", "1"),
        Err(SimError::UnknownBody(_))
    ));
}

#[test]
fn static_and_canonical_changes_take_effect_immediately() {
    let mut sim = make_sim();
    sim.load_world(SCENE).unwrap();
    let waypoint = sim.model_by_name("waypoint").unwrap();
    assert!(update::active_models(sim.world()).contains(&waypoint));

    sim.set_model_param("waypoint", "static", "true").unwrap();
    assert!(sim.node(waypoint).unwrap().is_static);
    assert!(!update::active_models(sim.world()).contains(&waypoint));

    let robot = sim.model_by_name("robot").unwrap();
    sim.set_model_param("robot", "canonicalBody", "wheel").unwrap();
    let canonical = modelops::canonical_body(sim.world(), robot).unwrap();
    assert_eq!(canonical, sim.model(robot).unwrap().body_entity("wheel"));
}

#[test]
fn identifying_parameters_cannot_change() {
    let mut sim = make_sim();
    sim.load_world(SCENE).unwrap();
    assert!(matches!(
        sim.set_model_param("robot", "name", "other"),
        Err(SimError::UnknownParameter(_))
    ));
    assert!(matches!(
        sim.set_body_param("robot", "wheel", "name", "tyre"),
        Err(SimError::UnknownParameter(_))
    ));
    assert!(matches!(
        sim.set_model_param("robot", "colour", "red"),
        Err(SimError::UnknownParameter(_))
    ));
    assert!(matches!(
        sim.set_model_param("ghost", "xyz", "0 0 0"),
        Err(SimError::UnknownModel(_))
    ));
}

// ==================== SAVE / RELOAD ====================

#[test]
fn saved_scene_reloads_to_the_same_scene() {
    let mut first = make_sim();
    first.load_world(SCENE).unwrap();
    let saved = first.save();

    let mut second = make_sim();
    second.load_world(&saved).unwrap();
    assert_eq!(second.model_names(), first.model_names());
    assert_eq!(second.root_models(), first.root_models());
    assert_eq!(second.interface_names(), first.interface_names());
    assert_eq!(second.save(), saved);
}

#[test]
fn saved_scene_keeps_parameters() {
    let mut sim = make_sim();
    sim.load_world(SCENE).unwrap();
    let saved = sim.save();

    assert!(saved.starts_with("<world>\n"));
    assert!(saved.contains("<model:physical\n"));
    assert!(saved.contains("<model:empty\n"));
    assert!(saved.contains("team=\"blue\""));
    assert!(saved.contains("selfID=\"2\""));
    assert!(saved.contains("body2=\"anchor::post\""));
    assert!(saved.contains("<attach parentBody=\"chassis\" myBody=\"link\"/>"));
    assert!(saved.contains("linearVel=\"0.5 0 0\""));
    assert!(saved.contains("<interface:position name=\"odom\"/>"));
    assert!(saved.contains("<sensor:encoder name=\"tick\">"));
    // optional joint parameters are only written when set
    assert!(saved.contains("lowStop=\"-45\""));
    assert_eq!(saved.matches("lowStop=").count(), 1);
}

#[test]
fn padded_strings_survive_save_and_reload() {
    let mut sim = make_sim();
    sim.load_model(r#"<model:empty name="flag" team="  red team "/>"#, false)
        .unwrap();
    let saved = sim.save();
    assert!(saved.contains("team=\"  red team \""));

    let mut reloaded = make_sim();
    reloaded.load_world(&saved).unwrap();
    let flag = reloaded.model(reloaded.model_by_name("flag").unwrap()).unwrap();
    assert_eq!(flag.team(), "  red team ");
}

#[test]
fn save_writes_the_current_poses() {
    let mut sim = make_sim();
    sim.load_model(
        r#"<model:physical name="puck" enableGravity="false">
             <controller:holonome name="drive" linearVel="1 0 0"/>
           </model:physical>"#,
        false,
    )
    .unwrap();
    sim.init();
    for _ in 0..50 {
        sim.step_by(0.01);
    }
    let saved = sim.save();
    sim.fini();

    let mut reloaded = make_sim();
    reloaded.load_world(&saved).unwrap();
    let pose = reloaded.model_pose("puck").unwrap();
    assert!((pose.pos.x - 0.5).abs() < 1e-6);
    let body = body_backend(&reloaded, "puck", "puck_body").abs_pose();
    assert!((body.pos - pose.pos).length() < 1e-6);
}
