//! Keyframe admission policy.

use crate::collaborators::TrackingQuality;
use crate::keyframes::{Keyframe, KeyframeSet};
use crate::options::ScanOptions;
use roomscan_data::{Pose, SensorFrame};
use tracing::debug;

/// Why a frame was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    UnreliableTracking,
    MotionBlur,
    SetFull,
    TooSimilar,
}

/// Outcome of evaluating one tracked frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Admitted,
    Rejected(RejectReason),
}

impl GateDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, GateDecision::Admitted)
    }
}

/// Dual-threshold admission gate for the keyframe set.
///
/// Small motions produce no keyframes; either a large enough rotation OR a
/// large enough translation since the last admitted keyframe does,
/// independent of each other. Frames tracked unreliably or captured during
/// fast rotation (motion blur) never qualify.
#[derive(Debug, Clone, Copy)]
pub struct KeyframeGate {
    max_rotation_radians: f32,
    max_translation_meters: f32,
    max_rotation_speed_degrees: f32,
}

impl KeyframeGate {
    pub fn new(
        max_rotation_degrees: f32,
        max_translation_meters: f32,
        max_rotation_speed_degrees: f32,
    ) -> Self {
        Self {
            max_rotation_radians: max_rotation_degrees.to_radians(),
            max_translation_meters,
            max_rotation_speed_degrees,
        }
    }

    pub fn from_options(options: &ScanOptions) -> Self {
        Self::new(
            options.max_keyframe_rotation_degrees,
            options.max_keyframe_translation_meters,
            options.max_keyframe_rotation_speed_degrees_per_second,
        )
    }

    /// Evaluate one tracked frame and admit it into the set if it qualifies.
    /// Rejection has no side effect.
    pub fn process(
        &self,
        frame: &SensorFrame,
        pose: Pose,
        quality: TrackingQuality,
        rotation_speed_degrees: f32,
        set: &mut KeyframeSet,
    ) -> GateDecision {
        let decision = self.evaluate(&pose, quality, rotation_speed_degrees, set);
        if decision.is_admitted() {
            let keyframe = Keyframe {
                frame: frame.clone(),
                pose,
                admitted_at: frame.timestamp,
            };
            if set.try_admit(keyframe).is_err() {
                return GateDecision::Rejected(RejectReason::SetFull);
            }
            debug!(
                "Admitted keyframe at {:.3}s ({}/{})",
                frame.timestamp,
                set.len(),
                set.capacity()
            );
        }
        decision
    }

    fn evaluate(
        &self,
        pose: &Pose,
        quality: TrackingQuality,
        rotation_speed_degrees: f32,
        set: &KeyframeSet,
    ) -> GateDecision {
        if !quality.is_reliable() {
            return GateDecision::Rejected(RejectReason::UnreliableTracking);
        }
        if rotation_speed_degrees > self.max_rotation_speed_degrees {
            return GateDecision::Rejected(RejectReason::MotionBlur);
        }
        if set.is_full() {
            return GateDecision::Rejected(RejectReason::SetFull);
        }
        let Some(last) = set.latest() else {
            // Nothing to compare against yet; the first tracked frame seeds
            // the set.
            return GateDecision::Admitted;
        };
        let angular = pose.angular_distance_to(&last.pose);
        let translational = pose.translational_distance_to(&last.pose);
        if angular >= self.max_rotation_radians || translational >= self.max_translation_meters {
            GateDecision::Admitted
        } else {
            GateDecision::Rejected(RejectReason::TooSimilar)
        }
    }
}
