//! Integration tests for controller loading, scheduling, interfaces and plugins.

#![allow(dead_code, unused_imports)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use glam::DVec3;

use robosim::components::controller::{Controller, ControllerBinding, ControllerSlot, UpdateContext};
use robosim::configtree::ConfigNode;
use robosim::error::{Result, SimError};
use robosim::events::interface::InterfacePayload;
use robosim::physics::PhysicsBody;
use robosim::physics::iterative::IterativeEngine;
use robosim::resources::controllerregistry::ControllerRegistry;
use robosim::simulation::Simulation;
use robosim::systems::modelops;

const EPSILON: f64 = 1e-6;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn make_sim() -> Simulation {
    Simulation::new(Arc::new(IterativeEngine::new()))
}

fn slot<'a>(sim: &'a Simulation, model: &str, controller: &str) -> &'a ControllerSlot {
    let entity = sim.model_by_name(model).unwrap();
    let slot_entity = sim.model(entity).unwrap().controller_entity(controller).unwrap();
    sim.world().get::<ControllerSlot>(slot_entity).unwrap()
}

// ==================== LOADING ====================

#[test]
fn malformed_controllers_are_skipped_and_siblings_load() {
    let mut sim = make_sim();
    let model = sim
        .load_model(
            r#"<model:physical name="robot">
                 <controller:pose_sensor/>
                 <controller:teleporter name="beam"/>
                 <controller:joint_velocity name="motor" joint="missing"/>
                 <controller:pose_sensor name="gps"/>
               </model:physical>"#,
            false,
        )
        .unwrap();

    let names: Vec<String> = sim
        .model(model)
        .unwrap()
        .controllers
        .iter()
        .map(|c| c.name.clone())
        .collect();
    assert_eq!(names, vec!["gps"]);
}

#[test]
fn later_controller_with_same_name_replaces_the_first() {
    let mut sim = make_sim();
    let model = sim
        .load_model(
            r#"<model:physical name="robot">
                 <controller:pose_sensor name="ctrl"/>
                 <controller:holonome name="ctrl"/>
               </model:physical>"#,
            false,
        )
        .unwrap();

    assert_eq!(sim.model(model).unwrap().controllers.len(), 1);
    assert_eq!(slot(&sim, "robot", "ctrl").type_name, "holonome");
}

// ==================== INTERFACES ====================

#[test]
fn interface_names_are_scoped_by_model_and_owner() {
    let mut sim = make_sim();
    sim.load_model(
        r#"<model:physical name="robot">
             <body:box name="chassis">
               <sensor:camera name="cam">
                 <interface:image name="left"/>
               </sensor:camera>
             </body:box>
             <controller:pose_sensor name="gps">
               <interface:position name="pose"/>
             </controller:pose_sensor>
             <model:physical name="arm">
               <controller:pose_sensor name="tip">
                 <interface:position name="pose"/>
               </controller:pose_sensor>
             </model:physical>
           </model:physical>"#,
        false,
    )
    .unwrap();

    assert_eq!(
        sim.interface_names(),
        vec!["robot::gps::pose", "robot::cam::left", "robot::arm::tip::pose"]
    );
}

#[test]
fn pose_sensor_publishes_every_tick() {
    let mut sim = make_sim();
    sim.load_model(
        r#"<model:physical name="robot" xyz="1 2 3" enableGravity="false">
             <controller:pose_sensor name="gps">
               <interface:position name="pose"/>
             </controller:pose_sensor>
           </model:physical>"#,
        false,
    )
    .unwrap();
    sim.init();
    for _ in 0..5 {
        sim.step();
    }

    let samples = sim.drain_interfaces();
    assert_eq!(samples.len(), 5);
    assert!(samples.iter().all(|s| s.interface == "robot::gps::pose"));
    assert!(samples.windows(2).all(|w| w[0].sim_time < w[1].sim_time));
    match &samples[4].payload {
        InterfacePayload::Pose { position, .. } => {
            assert!(approx_eq(position[0], 1.0));
            assert!(approx_eq(position[1], 2.0));
            assert!(approx_eq(position[2], 3.0));
        }
        other => panic!("unexpected payload {other:?}"),
    }
    assert!(sim.drain_interfaces().is_empty());
}

// ==================== SCHEDULING ====================

#[test]
fn update_rate_throttles_controller_updates() {
    let mut sim = make_sim();
    sim.load_model(
        r#"<model:physical name="robot">
             <controller:pose_sensor name="fast"/>
             <controller:pose_sensor name="slow" updateRate="10"/>
           </model:physical>"#,
        false,
    )
    .unwrap();
    sim.init();
    for _ in 0..100 {
        sim.step_by(0.01);
    }

    assert_eq!(slot(&sim, "robot", "fast").update_count, 100);
    assert_eq!(slot(&sim, "robot", "slow").update_count, 10);
}

#[test]
fn only_always_on_controllers_run_while_paused() {
    let mut sim = make_sim();
    sim.load_model(
        r#"<model:physical name="robot">
             <controller:pose_sensor name="normal"/>
             <controller:pose_sensor name="watchdog" alwaysOn="true"/>
           </model:physical>"#,
        false,
    )
    .unwrap();
    sim.init();
    sim.set_paused(true);
    for _ in 0..3 {
        sim.step();
    }

    assert_eq!(slot(&sim, "robot", "normal").update_count, 0);
    assert_eq!(slot(&sim, "robot", "watchdog").update_count, 3);
}

// ==================== BUILT-IN BEHAVIOURS ====================

#[test]
fn holonome_drives_the_model() {
    let mut sim = make_sim();
    let model = sim
        .load_model(
            r#"<model:physical name="puck" enableGravity="false">
                 <controller:holonome name="drive" linearVel="1 0 0"/>
               </model:physical>"#,
            false,
        )
        .unwrap();
    sim.init();
    for _ in 0..100 {
        sim.step_by(0.01);
    }
    assert!(approx_eq(sim.model_pose("puck").unwrap().pos.x, 1.0));

    sim.set_controller_param("puck", "drive", "linearVel", "0 2 0").unwrap();
    sim.step_by(0.01);
    let vel = modelops::linear_vel(sim.world(), model).unwrap();
    assert!(approx_eq(vel.x, 0.0));
    assert!(approx_eq(vel.y, 2.0));
}

#[test]
fn controller_parameter_errors() {
    let mut sim = make_sim();
    sim.load_model(
        r#"<model:physical name="puck">
             <controller:holonome name="drive"/>
           </model:physical>"#,
        false,
    )
    .unwrap();

    assert!(matches!(
        sim.set_controller_param("puck", "steer", "linearVel", "1 0 0"),
        Err(SimError::MalformedControllerConfig(_))
    ));
    assert!(matches!(
        sim.set_controller_param("puck", "drive", "name", "other"),
        Err(SimError::UnknownParameter(_))
    ));
    assert!(matches!(
        sim.set_controller_param("puck", "drive", "warp", "9"),
        Err(SimError::UnknownParameter(_))
    ));
    sim.set_controller_param("puck", "drive", "updateRate", "5").unwrap();
    assert!(approx_eq(slot(&sim, "puck", "drive").update_rate(), 5.0));
}

#[test]
fn joint_velocity_drives_its_joint_and_reports_state() {
    let mut sim = make_sim();
    sim.load_model(
        r#"<model:physical name="wheelie" enableGravity="false">
             <body:box name="frame"/>
             <body:cylinder name="wheel"/>
             <joint:hinge name="axle" body1="wheel" body2="frame"/>
             <controller:joint_velocity name="motor" joint="axle" velocity="1" maxForce="100">
               <interface:joint name="state"/>
             </controller:joint_velocity>
           </model:physical>"#,
        false,
    )
    .unwrap();
    sim.init();
    for _ in 0..10 {
        sim.step_by(0.01);
    }

    let samples = sim.drain_interfaces();
    assert_eq!(samples.len(), 10);
    assert!(samples.iter().all(|s| s.interface == "wheelie::motor::state"));
    match &samples[9].payload {
        InterfacePayload::JointState { angle, velocity } => {
            assert!(approx_eq(*velocity, 1.0));
            assert!(*angle > 0.0);
        }
        other => panic!("unexpected payload {other:?}"),
    }
    assert!(matches!(
        sim.set_controller_param("wheelie", "motor", "joint", "other"),
        Err(SimError::UnknownParameter(_))
    ));
}

// ==================== PLUGINS ====================

static LIFT_REGISTRATIONS: AtomicUsize = AtomicUsize::new(0);

/// Pushes the canonical body straight up.
struct Lift {
    body: Option<Arc<dyn PhysicsBody>>,
}

impl Controller for Lift {
    fn load(&mut self, _node: &ConfigNode, binding: &ControllerBinding) -> Result<()> {
        self.body = binding.canonical_body();
        Ok(())
    }

    fn update(&mut self, _ctx: &UpdateContext) {
        if let Some(body) = &self.body {
            body.set_linear_vel(DVec3::new(0.0, 0.0, 1.0));
        }
    }
}

fn new_lift() -> Box<dyn Controller> {
    Box::new(Lift { body: None })
}

fn register_lift(registry: &mut ControllerRegistry) {
    LIFT_REGISTRATIONS.fetch_add(1, Ordering::SeqCst);
    registry.register("lift", new_lift);
}

#[test]
fn plugin_controllers_load_on_demand() {
    let mut sim = make_sim();
    sim.register_plugin("elevators", register_lift);
    sim.load_world(
        r#"<world>
             <model:physical name="a" enableGravity="false">
               <controller:lift name="up" plugin="elevators"/>
             </model:physical>
             <model:physical name="b" enableGravity="false">
               <controller:lift name="up" plugin="elevators"/>
             </model:physical>
           </world>"#,
    )
    .unwrap();
    assert_eq!(LIFT_REGISTRATIONS.load(Ordering::SeqCst), 1);

    sim.init();
    for _ in 0..50 {
        sim.step_by(0.01);
    }
    assert!(approx_eq(sim.model_pose("a").unwrap().pos.z, 0.5));
    assert!(approx_eq(sim.model_pose("b").unwrap().pos.z, 0.5));
}

#[test]
fn unknown_plugin_falls_through_to_registered_types() {
    let mut sim = make_sim();
    let model = sim
        .load_model(
            r#"<model:physical name="robot">
                 <controller:pose_sensor name="gps" plugin="missing"/>
                 <controller:lift name="up" plugin="missing"/>
               </model:physical>"#,
            false,
        )
        .unwrap();
    let names: Vec<String> = sim
        .model(model)
        .unwrap()
        .controllers
        .iter()
        .map(|c| c.name.clone())
        .collect();
    assert_eq!(names, vec!["gps"]);
}

#[test]
fn extra_controller_types_can_be_registered_directly() {
    let mut sim = make_sim();
    sim.register_controller("lift", new_lift);
    sim.load_model(
        r#"<model:physical name="a" enableGravity="false">
             <controller:lift name="up"/>
           </model:physical>"#,
        false,
    )
    .unwrap();
    assert_eq!(slot(&sim, "a", "up").type_name, "lift");
}
