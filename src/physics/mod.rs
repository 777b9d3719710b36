//! Contract between the simulation core and a physics backend.
//!
//! A backend hands out bodies and joints as shared trait objects. Every
//! method takes `&self`: backends keep their solver state behind their own
//! lock and acquire it once per call, so bodies owned by different models can
//! be driven from several worker threads at the same time. Implementations
//! must never call back into simulation code while holding that lock.
//!
//! [`iterative::IterativeEngine`] is the reference backend.

pub mod iterative;

use std::sync::Arc;

use bevy_ecs::entity::Entity;
use glam::DVec3;

use crate::components::pose::Pose;
use crate::error::{Result, SimError};

/// Backend-side identifier of a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyId(pub u32);

/// Closed set of joint kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointType {
    Hinge,
    Ball,
    Slider,
    Hinge2,
    Universal,
}

impl JointType {
    /// Resolve a joint kind from a config tag's local name.
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "hinge" => Ok(JointType::Hinge),
            "ball" => Ok(JointType::Ball),
            "slider" => Ok(JointType::Slider),
            "hinge2" => Ok(JointType::Hinge2),
            "universal" => Ok(JointType::Universal),
            other => Err(SimError::UnknownJointType(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JointType::Hinge => "hinge",
            JointType::Ball => "ball",
            JointType::Slider => "slider",
            JointType::Hinge2 => "hinge2",
            JointType::Universal => "universal",
        }
    }

    /// Number of driven axes.
    pub fn axis_count(self) -> usize {
        match self {
            JointType::Ball => 0,
            JointType::Hinge | JointType::Slider => 1,
            JointType::Hinge2 | JointType::Universal => 2,
        }
    }
}

/// Per-axis joint parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointParam {
    LoStop,
    HiStop,
    Vel,
    FMax,
    FudgeFactor,
    Bounce,
    Cfm,
    StopErp,
    StopCfm,
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub const ZERO: Aabb = Aabb {
        min: DVec3::ZERO,
        max: DVec3::ZERO,
    };

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }
}

/// Factory and stepper for bodies and joints.
pub trait PhysicsEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Create a body owned by the given model.
    fn create_body(&self, owner: Entity) -> Arc<dyn PhysicsBody>;

    fn create_joint(&self, kind: JointType) -> Arc<dyn PhysicsJoint>;

    /// Advance the whole world by `dt` seconds. Called once per tick.
    fn step(&self, dt: f64);

    fn set_gravity(&self, gravity: DVec3);

    fn gravity(&self) -> DVec3;
}

/// A rigid body living in a backend.
pub trait PhysicsBody: Send + Sync {
    fn id(&self) -> BodyId;

    /// Model entity this body was created for.
    fn owner(&self) -> Entity;

    /// Kinematic bodies ignore forces and gravity.
    fn set_kinematic(&self, kinematic: bool);

    fn abs_pose(&self) -> Pose;
    fn set_abs_pose(&self, pose: Pose);

    fn linear_vel(&self) -> DVec3;
    fn set_linear_vel(&self, vel: DVec3);
    fn angular_vel(&self) -> DVec3;
    fn set_angular_vel(&self, vel: DVec3);

    /// Commanded accelerations, applied as forces by [`PhysicsBody::update`].
    fn linear_accel(&self) -> DVec3;
    fn set_linear_accel(&self, accel: DVec3);
    fn angular_accel(&self) -> DVec3;
    fn set_angular_accel(&self, accel: DVec3);

    fn force(&self) -> DVec3;
    fn set_force(&self, force: DVec3);
    fn torque(&self) -> DVec3;
    fn set_torque(&self, torque: DVec3);

    fn mass(&self) -> f64;
    fn set_mass(&self, mass: f64);
    /// Box extents used for inertia and the bounding box.
    fn set_size(&self, size: DVec3);

    fn bounding_box(&self) -> Aabb;

    fn gravity_mode(&self) -> bool;
    fn set_gravity_mode(&self, enabled: bool);
    fn friction_mode(&self) -> bool;
    fn set_friction_mode(&self, enabled: bool);
    fn collide_mode(&self) -> String;
    fn set_collide_mode(&self, mode: &str);
    fn laser_fiducial_id(&self) -> i32;
    fn set_laser_fiducial_id(&self, id: i32);
    fn laser_retro(&self) -> f64;
    fn set_laser_retro(&self, retro: f64);

    /// Per-tick bookkeeping for this body only.
    fn update(&self);
}

/// A joint constraint living in a backend.
pub trait PhysicsJoint: Send + Sync {
    fn kind(&self) -> JointType;

    fn attach(&self, a: BodyId, b: BodyId);
    fn detach(&self);
    fn attached_bodies(&self) -> Option<(BodyId, BodyId)>;

    fn anchor(&self, index: usize) -> DVec3;
    fn set_anchor(&self, index: usize, point: DVec3);
    fn axis(&self, index: usize) -> DVec3;
    fn set_axis(&self, index: usize, axis: DVec3);

    fn axis_param(&self, index: usize, param: JointParam) -> f64;
    fn set_axis_param(&self, index: usize, param: JointParam, value: f64);

    /// Joint coordinate of an axis (radians, or metres for sliders).
    fn angle(&self, index: usize) -> f64;
    /// Time derivative of [`PhysicsJoint::angle`].
    fn angle_rate(&self, index: usize) -> f64;

    /// Add a force or torque along an axis for the next step.
    fn set_force(&self, index: usize, force: f64);

    /// Zero motor targets, max force and applied force.
    fn reset(&self);

    fn param(&self, param: JointParam) -> f64 {
        self.axis_param(0, param)
    }

    fn set_param(&self, param: JointParam, value: f64) {
        self.set_axis_param(0, param, value)
    }

    fn high_stop(&self, index: usize) -> f64 {
        self.axis_param(index, JointParam::HiStop)
    }

    fn set_high_stop(&self, index: usize, angle: f64) {
        self.set_axis_param(index, JointParam::HiStop, angle)
    }

    fn low_stop(&self, index: usize) -> f64 {
        self.axis_param(index, JointParam::LoStop)
    }

    fn set_low_stop(&self, index: usize, angle: f64) {
        self.set_axis_param(index, JointParam::LoStop, angle)
    }

    fn velocity(&self, index: usize) -> f64 {
        self.axis_param(index, JointParam::Vel)
    }

    fn set_velocity(&self, index: usize, vel: f64) {
        self.set_axis_param(index, JointParam::Vel, vel)
    }

    fn max_force(&self, index: usize) -> f64 {
        self.axis_param(index, JointParam::FMax)
    }

    fn set_max_force(&self, index: usize, force: f64) {
        self.set_axis_param(index, JointParam::FMax, force)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joint_tags_resolve_to_the_closed_set() {
        for tag in ["hinge", "ball", "slider", "hinge2", "universal"] {
            assert_eq!(JointType::from_tag(tag).unwrap().as_str(), tag);
        }
        assert!(matches!(
            JointType::from_tag("piston"),
            Err(SimError::UnknownJointType(_))
        ));
    }

    #[test]
    fn aabb_union_covers_both() {
        let a = Aabb {
            min: DVec3::splat(-1.0),
            max: DVec3::splat(0.5),
        };
        let b = Aabb {
            min: DVec3::new(0.0, -3.0, 0.0),
            max: DVec3::new(2.0, 0.0, 0.0),
        };
        let u = a.union(&b);
        assert_eq!(u.min, DVec3::new(-1.0, -3.0, -1.0));
        assert_eq!(u.max, DVec3::new(2.0, 0.5, 0.5));
    }
}
