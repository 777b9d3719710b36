//! Rigid 3D pose: a position plus an orientation.
//!
//! `a.compose(b)` reads "b expressed in a's frame, moved to the frame a lives
//! in", so an entity's absolute pose is `parent_abs.compose(relative)`.

use glam::{DQuat, DVec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub pos: DVec3,
    pub rot: DQuat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        pos: DVec3::ZERO,
        rot: DQuat::IDENTITY,
    };

    pub fn new(pos: DVec3, rot: DQuat) -> Self {
        Self { pos, rot }
    }

    pub fn from_pos(pos: DVec3) -> Self {
        Self {
            pos,
            rot: DQuat::IDENTITY,
        }
    }

    /// Express `local` (given in this frame) in the enclosing frame.
    pub fn compose(&self, local: &Pose) -> Pose {
        Pose {
            pos: self.pos + self.rot * local.pos,
            rot: self.rot * local.rot,
        }
    }

    pub fn inverse(&self) -> Pose {
        let rot = self.rot.inverse();
        Pose {
            pos: rot * -self.pos,
            rot,
        }
    }

    /// This pose expressed in `base`'s frame.
    pub fn relative_to(&self, base: &Pose) -> Pose {
        base.inverse().compose(self)
    }

    pub fn approx_eq(&self, other: &Pose, eps: f64) -> bool {
        self.pos.abs_diff_eq(other.pos, eps)
            && (self.rot.abs_diff_eq(other.rot, eps) || self.rot.abs_diff_eq(-other.rot, eps))
    }
}
