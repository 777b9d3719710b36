//! Externally addressable controller and sensor I/O.
//!
//! Controllers publish [`InterfaceSample`]s through a crossbeam channel held
//! by the [`InterfaceOutbox`] resource. Senders are cloned into controllers
//! at load time so publishing works from worker threads during the parallel
//! update phase; the transport layer drains the receiving end between ticks.
//!
//! The channel is bounded. When nobody drains it, the oldest samples are
//! dropped to make room for new ones.

use bevy_ecs::prelude::Resource;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use quick_xml::escape::escape;
use serde::Serialize;

use crate::components::pose::Pose;

/// An `interface:<kind>` declaration on a controller or sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDecl {
    /// Local name of the tag, `position` for `<interface:position>`.
    pub kind: String,
    pub name: String,
}

impl InterfaceDecl {
    pub fn save(&self, prefix: &str, out: &mut String) {
        out.push_str(&format!(
            "{prefix}<interface:{} name=\"{}\"/>\n",
            self.kind,
            escape(self.name.as_str())
        ));
    }
}

/// Data carried by one published sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterfacePayload {
    Pose {
        position: [f64; 3],
        orientation: [f64; 4],
    },
    JointState {
        angle: f64,
        velocity: f64,
    },
}

impl InterfacePayload {
    pub fn from_pose(pose: &Pose) -> Self {
        InterfacePayload::Pose {
            position: pose.pos.to_array(),
            orientation: [pose.rot.w, pose.rot.x, pose.rot.y, pose.rot.z],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceSample {
    /// Fully scoped interface name.
    pub interface: String,
    pub sim_time: f64,
    pub payload: InterfacePayload,
}

/// Samples kept when the outbox is not drained.
pub const DEFAULT_CAPACITY: usize = 65_536;

/// Sending half handed to controllers.
#[derive(Clone)]
pub struct InterfaceSender {
    tx: Sender<InterfaceSample>,
    rx: Receiver<InterfaceSample>,
}

impl InterfaceSender {
    /// Queue a sample. Returns how many old samples were dropped for it.
    pub fn send(&self, mut sample: InterfaceSample) -> usize {
        let mut dropped = 0;
        loop {
            match self.tx.try_send(sample) {
                Ok(()) => return dropped,
                Err(TrySendError::Full(back)) => {
                    if self.rx.try_recv().is_ok() {
                        dropped += 1;
                    }
                    sample = back;
                }
                // the sender owns a receiver, so the channel never closes
                Err(TrySendError::Disconnected(_)) => return dropped,
            }
        }
    }
}

/// Channel between controllers and the external transport.
#[derive(Resource)]
pub struct InterfaceOutbox {
    tx: Sender<InterfaceSample>,
    rx: Receiver<InterfaceSample>,
}

impl Default for InterfaceOutbox {
    fn default() -> Self {
        Self::new()
    }
}

impl InterfaceOutbox {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = bounded::<InterfaceSample>(capacity.max(1));
        Self { tx, rx }
    }

    pub fn sender(&self) -> InterfaceSender {
        InterfaceSender {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }

    /// Take every sample published so far.
    pub fn drain(&self) -> Vec<InterfaceSample> {
        self.rx.try_iter().collect()
    }
}
