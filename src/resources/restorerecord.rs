//! Record shared with an external coaching process.
//!
//! Each robot with a `selfID` owns one slot of `position_serials`. Restoring
//! a model bumps its serial so the external side knows the robot's pose was
//! changed by the simulator.

use bevy_ecs::prelude::Resource;

use crate::error::{Result, SimError};

/// Number of robot slots in the record.
pub const MAX_ROBOTS: usize = 32;

#[derive(Resource, Debug, Clone, PartialEq, Eq)]
pub struct RestoreRecord {
    pub position_serials: [u32; MAX_ROBOTS],
}

impl Default for RestoreRecord {
    fn default() -> Self {
        Self {
            position_serials: [0; MAX_ROBOTS],
        }
    }
}

impl RestoreRecord {
    /// Increment the serial of robot `self_id` (1-based).
    #[track_caller]
    pub fn bump(&mut self, self_id: i32) -> Result<u32> {
        match slot_index(self_id).and_then(|index| self.position_serials.get_mut(index)) {
            Some(slot) => {
                *slot = slot.wrapping_add(1);
                Ok(*slot)
            }
            None => Err(SimError::invalid_index("selfID", i64::from(self_id))),
        }
    }

    pub fn serial(&self, self_id: i32) -> Option<u32> {
        slot_index(self_id).and_then(|index| self.position_serials.get(index).copied())
    }
}

fn slot_index(self_id: i32) -> Option<usize> {
    self_id
        .checked_sub(1)
        .and_then(|index| usize::try_from(index).ok())
}
