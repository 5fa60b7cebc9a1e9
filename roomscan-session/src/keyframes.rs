//! Bounded, temporally ordered keyframe storage.

use ordered_float::OrderedFloat;
use roomscan_data::{Pose, SensorFrame};
use std::collections::BTreeMap;

/// A retained frame+pose pair used later for mesh colorization.
#[derive(Debug, Clone)]
pub struct Keyframe {
    pub frame: SensorFrame,
    pub pose: Pose,
    pub admitted_at: f64,
}

/// Keyframes indexed by admission time, bounded by admission control.
///
/// When the set is full new admissions are rejected; existing keyframes are
/// never evicted implicitly.
#[derive(Debug)]
pub struct KeyframeSet {
    capacity: usize,
    frames: BTreeMap<OrderedFloat<f64>, Keyframe>,
}

impl KeyframeSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            frames: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.frames.len() >= self.capacity
    }

    /// Admit a keyframe, handing it back when the set is at capacity.
    pub fn try_admit(&mut self, keyframe: Keyframe) -> Result<(), Keyframe> {
        if self.is_full() {
            return Err(keyframe);
        }
        self.frames
            .insert(OrderedFloat(keyframe.admitted_at), keyframe);
        Ok(())
    }

    /// The most recently admitted keyframe.
    pub fn latest(&self) -> Option<&Keyframe> {
        self.frames.values().next_back()
    }

    /// Keyframes in admission order.
    pub fn iter(&self) -> impl Iterator<Item = &Keyframe> {
        self.frames.values()
    }

    /// Snapshot for handing to a finalization job.
    pub fn to_vec(&self) -> Vec<Keyframe> {
        self.frames.values().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
