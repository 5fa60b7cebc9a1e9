//! IMU sample delivery with last-value semantics.

use glam::Vec3;
use std::sync::{Arc, Mutex};

/// One inertial sample: gravity direction and rotation rate.
#[derive(Debug, Clone, Copy)]
pub struct ImuSample {
    /// Gravity direction in sensor coordinates, unit length.
    pub gravity: Vec3,
    /// Angular velocity in radians per second.
    pub rotation_rate: Vec3,
    pub timestamp: f64,
}

impl Default for ImuSample {
    fn default() -> Self {
        Self {
            gravity: Vec3::NEG_Y,
            rotation_rate: Vec3::ZERO,
            timestamp: 0.0,
        }
    }
}

/// Shared cell holding the most recent IMU sample.
///
/// Samples arrive at ~100 Hz on the IMU delivery context; the frame loop
/// reads the latest value once per frame. Stale samples are overwritten, not
/// queued. The lock is held only for the copy.
#[derive(Debug, Clone, Default)]
pub struct ImuCell {
    inner: Arc<Mutex<ImuSample>>,
}

impl ImuCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a sample, replacing whatever was there before.
    pub fn publish(&self, sample: ImuSample) {
        if let Ok(mut slot) = self.inner.lock() {
            *slot = sample;
        }
    }

    /// Copy out the most recent sample.
    pub fn latest(&self) -> ImuSample {
        self.inner.lock().map(|slot| *slot).unwrap_or_default()
    }

    /// Magnitude of the current rotation rate in degrees per second, the
    /// motion-blur signal for keyframe admission.
    pub fn rotation_speed_degrees(&self) -> f32 {
        self.latest().rotation_rate.length().to_degrees()
    }
}
