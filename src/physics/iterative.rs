//! Reference physics backend.
//!
//! A small deterministic integrator: bodies move with semi-implicit Euler,
//! joints keep one coordinate per axis driven by applied force and a velocity
//! motor and clamped to their stops. It does not couple joint coordinates
//! back into body motion; it exists so the simulation core can be run and
//! tested without an external constraint solver.
//!
//! All state lives in one solver struct behind a single `parking_lot::Mutex`.
//! Each trait method locks it exactly once.

use std::sync::Arc;

use bevy_ecs::entity::Entity;
use glam::{DMat3, DQuat, DVec3};
use log::debug;
use parking_lot::Mutex;
use smallvec::{SmallVec, smallvec};

use super::{Aabb, BodyId, JointParam, JointType, PhysicsBody, PhysicsEngine, PhysicsJoint};
use crate::components::pose::Pose;

const DEFAULT_GRAVITY: DVec3 = DVec3::new(0.0, 0.0, -9.8);
const MIN_INERTIA: f64 = 1e-9;

impl Default for Aabb {
    fn default() -> Self {
        Aabb::ZERO
    }
}

#[derive(Debug, Clone)]
struct BodyState {
    pose: Pose,
    lin_vel: DVec3,
    ang_vel: DVec3,
    lin_accel: DVec3,
    ang_accel: DVec3,
    force: DVec3,
    torque: DVec3,
    mass: f64,
    size: DVec3,
    kinematic: bool,
    gravity: bool,
    friction: bool,
    collide: String,
    fiducial: i32,
    retro: f64,
}

impl BodyState {
    fn new() -> Self {
        Self {
            pose: Pose::IDENTITY,
            lin_vel: DVec3::ZERO,
            ang_vel: DVec3::ZERO,
            lin_accel: DVec3::ZERO,
            ang_accel: DVec3::ZERO,
            force: DVec3::ZERO,
            torque: DVec3::ZERO,
            mass: 1.0,
            size: DVec3::splat(0.1),
            kinematic: false,
            gravity: true,
            friction: true,
            collide: "all".to_string(),
            fiducial: -1,
            retro: -1.0,
        }
    }

    /// Principal moments of a solid box.
    fn inertia(&self) -> DVec3 {
        let s = self.size * self.size;
        let k = self.mass / 12.0;
        DVec3::new(k * (s.y + s.z), k * (s.x + s.z), k * (s.x + s.y)).max(DVec3::splat(MIN_INERTIA))
    }

    fn bounding_box(&self) -> Aabb {
        let half = self.size * 0.5;
        let m = DMat3::from_quat(self.pose.rot);
        let ext = m.x_axis.abs() * half.x + m.y_axis.abs() * half.y + m.z_axis.abs() * half.z;
        Aabb {
            min: self.pose.pos - ext,
            max: self.pose.pos + ext,
        }
    }

    fn integrate(&mut self, gravity: DVec3, dt: f64) {
        if !self.kinematic {
            let mut acc = self.force / self.mass.max(MIN_INERTIA);
            if self.gravity {
                acc += gravity;
            }
            self.lin_vel += acc * dt;
            self.ang_vel += self.torque / self.inertia() * dt;
        }
        self.pose.pos += self.lin_vel * dt;
        let spin = DQuat::from_scaled_axis(self.ang_vel * dt);
        self.pose.rot = (spin * self.pose.rot).normalize();
        self.force = DVec3::ZERO;
        self.torque = DVec3::ZERO;
    }
}

#[derive(Debug, Clone)]
struct AxisState {
    axis: DVec3,
    angle: f64,
    rate: f64,
    force: f64,
    lo: f64,
    hi: f64,
    vel: f64,
    fmax: f64,
    fudge: f64,
    bounce: f64,
    cfm: f64,
    stop_erp: f64,
    stop_cfm: f64,
}

impl AxisState {
    fn new(axis: DVec3) -> Self {
        Self {
            axis,
            angle: 0.0,
            rate: 0.0,
            force: 0.0,
            lo: f64::NEG_INFINITY,
            hi: f64::INFINITY,
            vel: 0.0,
            fmax: 0.0,
            fudge: 1.0,
            bounce: 0.0,
            cfm: 1e-5,
            stop_erp: 0.2,
            stop_cfm: 1e-5,
        }
    }

    fn param(&self, param: JointParam) -> f64 {
        match param {
            JointParam::LoStop => self.lo,
            JointParam::HiStop => self.hi,
            JointParam::Vel => self.vel,
            JointParam::FMax => self.fmax,
            JointParam::FudgeFactor => self.fudge,
            JointParam::Bounce => self.bounce,
            JointParam::Cfm => self.cfm,
            JointParam::StopErp => self.stop_erp,
            JointParam::StopCfm => self.stop_cfm,
        }
    }

    fn set_param(&mut self, param: JointParam, value: f64) {
        match param {
            JointParam::LoStop => self.lo = value,
            JointParam::HiStop => self.hi = value,
            JointParam::Vel => self.vel = value,
            JointParam::FMax => self.fmax = value.max(0.0),
            JointParam::FudgeFactor => self.fudge = value,
            JointParam::Bounce => self.bounce = value,
            JointParam::Cfm => self.cfm = value,
            JointParam::StopErp => self.stop_erp = value,
            JointParam::StopCfm => self.stop_cfm = value,
        }
    }

    /// Unit-inertia coordinate update with a bounded velocity motor.
    fn integrate(&mut self, dt: f64) {
        let mut rate = self.rate + self.force * dt;
        if self.fmax > 0.0 {
            let limit = self.fmax * dt;
            rate += (self.vel - rate).clamp(-limit, limit);
        }
        let angle = self.angle + rate * dt;
        if angle < self.lo || angle > self.hi {
            self.angle = angle.clamp(self.lo.min(self.hi), self.hi.max(self.lo));
            self.rate = 0.0;
        } else {
            self.angle = angle;
            self.rate = rate;
        }
        self.force = 0.0;
    }
}

#[derive(Debug, Clone)]
struct JointState {
    bodies: Option<(BodyId, BodyId)>,
    anchors: [DVec3; 2],
    axes: SmallVec<[AxisState; 2]>,
}

impl JointState {
    fn new(kind: JointType) -> Self {
        let axes = match kind.axis_count() {
            0 => SmallVec::new(),
            1 => smallvec![AxisState::new(DVec3::Z)],
            _ => smallvec![AxisState::new(DVec3::Z), AxisState::new(DVec3::Y)],
        };
        Self {
            bodies: None,
            anchors: [DVec3::ZERO; 2],
            axes,
        }
    }
}

/// Everything the backend knows, guarded by one mutex.
#[derive(Debug)]
struct Solver {
    bodies: Vec<Option<BodyState>>,
    joints: Vec<Option<JointState>>,
    /// Slots of dropped bodies and joints, reused before growing.
    free_bodies: Vec<usize>,
    free_joints: Vec<usize>,
    gravity: DVec3,
}

/// Store `value` in a freed slot if there is one, else append it.
fn claim_slot<T>(slots: &mut Vec<Option<T>>, free: &mut Vec<usize>, value: T) -> usize {
    match free.pop() {
        Some(index) => {
            slots[index] = Some(value);
            index
        }
        None => {
            slots.push(Some(value));
            slots.len() - 1
        }
    }
}

impl Solver {
    fn new(gravity: DVec3) -> Self {
        Self {
            bodies: Vec::new(),
            joints: Vec::new(),
            free_bodies: Vec::new(),
            free_joints: Vec::new(),
            gravity,
        }
    }

    fn insert_body(&mut self, state: BodyState) -> BodyId {
        let Solver { bodies, free_bodies, .. } = self;
        BodyId(claim_slot(bodies, free_bodies, state) as u32)
    }

    fn insert_joint(&mut self, state: JointState) -> usize {
        let Solver { joints, free_joints, .. } = self;
        claim_slot(joints, free_joints, state)
    }

    fn step(&mut self, dt: f64) {
        let gravity = self.gravity;
        for body in self.bodies.iter_mut().flatten() {
            body.integrate(gravity, dt);
        }
        for joint in self.joints.iter_mut().flatten() {
            if joint.bodies.is_none() {
                continue;
            }
            for axis in joint.axes.iter_mut() {
                axis.integrate(dt);
            }
        }
    }
}

/// Deterministic single-lock backend.
pub struct IterativeEngine {
    solver: Arc<Mutex<Solver>>,
}

impl Default for IterativeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IterativeEngine {
    pub fn new() -> Self {
        Self::with_gravity(DEFAULT_GRAVITY)
    }

    pub fn with_gravity(gravity: DVec3) -> Self {
        Self {
            solver: Arc::new(Mutex::new(Solver::new(gravity))),
        }
    }

    /// Live bodies.
    pub fn body_count(&self) -> usize {
        self.solver.lock().bodies.iter().flatten().count()
    }

    /// Live joints.
    pub fn joint_count(&self) -> usize {
        self.solver.lock().joints.iter().flatten().count()
    }

    /// Allocated body and joint slots, live or free.
    pub fn slot_counts(&self) -> (usize, usize) {
        let solver = self.solver.lock();
        (solver.bodies.len(), solver.joints.len())
    }
}

impl PhysicsEngine for IterativeEngine {
    fn name(&self) -> &'static str {
        "iterative"
    }

    fn create_body(&self, owner: Entity) -> Arc<dyn PhysicsBody> {
        let id = self.solver.lock().insert_body(BodyState::new());
        Arc::new(IterativeBody {
            id,
            owner,
            solver: Arc::clone(&self.solver),
        })
    }

    fn create_joint(&self, kind: JointType) -> Arc<dyn PhysicsJoint> {
        let index = self.solver.lock().insert_joint(JointState::new(kind));
        Arc::new(IterativeJoint {
            index,
            kind,
            solver: Arc::clone(&self.solver),
        })
    }

    fn step(&self, dt: f64) {
        self.solver.lock().step(dt);
        debug!("iterative engine stepped {dt}s");
    }

    fn set_gravity(&self, gravity: DVec3) {
        self.solver.lock().gravity = gravity;
    }

    fn gravity(&self) -> DVec3 {
        self.solver.lock().gravity
    }
}

struct IterativeBody {
    id: BodyId,
    owner: Entity,
    solver: Arc<Mutex<Solver>>,
}

impl IterativeBody {
    fn with<R: Default>(&self, f: impl FnOnce(&mut BodyState) -> R) -> R {
        let mut solver = self.solver.lock();
        solver.bodies[self.id.0 as usize]
            .as_mut()
            .map(f)
            .unwrap_or_default()
    }
}

impl Drop for IterativeBody {
    fn drop(&mut self) {
        let mut solver = self.solver.lock();
        solver.bodies[self.id.0 as usize] = None;
        solver.free_bodies.push(self.id.0 as usize);
        for joint in solver.joints.iter_mut().flatten() {
            if matches!(joint.bodies, Some((a, b)) if a == self.id || b == self.id) {
                joint.bodies = None;
            }
        }
    }
}

impl PhysicsBody for IterativeBody {
    fn id(&self) -> BodyId {
        self.id
    }

    fn owner(&self) -> Entity {
        self.owner
    }

    fn set_kinematic(&self, kinematic: bool) {
        self.with(|b| b.kinematic = kinematic)
    }

    fn abs_pose(&self) -> Pose {
        self.with(|b| b.pose)
    }

    fn set_abs_pose(&self, pose: Pose) {
        self.with(|b| b.pose = pose)
    }

    fn linear_vel(&self) -> DVec3 {
        self.with(|b| b.lin_vel)
    }

    fn set_linear_vel(&self, vel: DVec3) {
        self.with(|b| b.lin_vel = vel)
    }

    fn angular_vel(&self) -> DVec3 {
        self.with(|b| b.ang_vel)
    }

    fn set_angular_vel(&self, vel: DVec3) {
        self.with(|b| b.ang_vel = vel)
    }

    fn linear_accel(&self) -> DVec3 {
        self.with(|b| b.lin_accel)
    }

    fn set_linear_accel(&self, accel: DVec3) {
        self.with(|b| b.lin_accel = accel)
    }

    fn angular_accel(&self) -> DVec3 {
        self.with(|b| b.ang_accel)
    }

    fn set_angular_accel(&self, accel: DVec3) {
        self.with(|b| b.ang_accel = accel)
    }

    fn force(&self) -> DVec3 {
        self.with(|b| b.force)
    }

    fn set_force(&self, force: DVec3) {
        self.with(|b| b.force = force)
    }

    fn torque(&self) -> DVec3 {
        self.with(|b| b.torque)
    }

    fn set_torque(&self, torque: DVec3) {
        self.with(|b| b.torque = torque)
    }

    fn mass(&self) -> f64 {
        self.with(|b| b.mass)
    }

    fn set_mass(&self, mass: f64) {
        self.with(|b| b.mass = mass)
    }

    fn set_size(&self, size: DVec3) {
        self.with(|b| b.size = size.abs())
    }

    fn bounding_box(&self) -> Aabb {
        self.with(|b| b.bounding_box())
    }

    fn gravity_mode(&self) -> bool {
        self.with(|b| b.gravity)
    }

    fn set_gravity_mode(&self, enabled: bool) {
        self.with(|b| b.gravity = enabled)
    }

    fn friction_mode(&self) -> bool {
        self.with(|b| b.friction)
    }

    fn set_friction_mode(&self, enabled: bool) {
        self.with(|b| b.friction = enabled)
    }

    fn collide_mode(&self) -> String {
        self.with(|b| b.collide.clone())
    }

    fn set_collide_mode(&self, mode: &str) {
        self.with(|b| b.collide = mode.to_string())
    }

    fn laser_fiducial_id(&self) -> i32 {
        self.with(|b| b.fiducial)
    }

    fn set_laser_fiducial_id(&self, id: i32) {
        self.with(|b| b.fiducial = id)
    }

    fn laser_retro(&self) -> f64 {
        self.with(|b| b.retro)
    }

    fn set_laser_retro(&self, retro: f64) {
        self.with(|b| b.retro = retro)
    }

    fn update(&self) {
        self.with(|b| {
            if !b.kinematic {
                b.force += b.lin_accel * b.mass;
                b.torque += b.ang_accel * b.inertia();
            }
        })
    }
}

struct IterativeJoint {
    index: usize,
    kind: JointType,
    solver: Arc<Mutex<Solver>>,
}

impl IterativeJoint {
    fn with<R: Default>(&self, f: impl FnOnce(&mut JointState) -> R) -> R {
        let mut solver = self.solver.lock();
        solver.joints[self.index].as_mut().map(f).unwrap_or_default()
    }

    fn with_axis<R: Default>(&self, index: usize, f: impl FnOnce(&mut AxisState) -> R) -> R {
        self.with(|j| j.axes.get_mut(index).map(f).unwrap_or_default())
    }
}

impl Drop for IterativeJoint {
    fn drop(&mut self) {
        let mut solver = self.solver.lock();
        solver.joints[self.index] = None;
        solver.free_joints.push(self.index);
    }
}

impl PhysicsJoint for IterativeJoint {
    fn kind(&self) -> JointType {
        self.kind
    }

    fn attach(&self, a: BodyId, b: BodyId) {
        self.with(|j| j.bodies = Some((a, b)))
    }

    fn detach(&self) {
        self.with(|j| j.bodies = None)
    }

    fn attached_bodies(&self) -> Option<(BodyId, BodyId)> {
        self.with(|j| j.bodies)
    }

    fn anchor(&self, index: usize) -> DVec3 {
        self.with(|j| j.anchors.get(index).copied().unwrap_or_default())
    }

    fn set_anchor(&self, index: usize, point: DVec3) {
        self.with(|j| {
            if let Some(anchor) = j.anchors.get_mut(index) {
                *anchor = point;
            }
        })
    }

    fn axis(&self, index: usize) -> DVec3 {
        self.with_axis(index, |a| a.axis)
    }

    fn set_axis(&self, index: usize, axis: DVec3) {
        self.with_axis(index, |a| a.axis = axis.normalize_or_zero())
    }

    fn axis_param(&self, index: usize, param: JointParam) -> f64 {
        self.with_axis(index, |a| a.param(param))
    }

    fn set_axis_param(&self, index: usize, param: JointParam, value: f64) {
        self.with_axis(index, |a| a.set_param(param, value))
    }

    fn angle(&self, index: usize) -> f64 {
        self.with_axis(index, |a| a.angle)
    }

    fn angle_rate(&self, index: usize) -> f64 {
        self.with_axis(index, |a| a.rate)
    }

    fn set_force(&self, index: usize, force: f64) {
        self.with_axis(index, |a| a.force += force)
    }

    fn reset(&self) {
        self.with(|j| {
            for axis in j.axes.iter_mut() {
                axis.force = 0.0;
                axis.fmax = 0.0;
                axis.vel = 0.0;
                axis.rate = 0.0;
            }
        })
    }
}
