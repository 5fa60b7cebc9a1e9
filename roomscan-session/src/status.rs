//! Single-message status arbitration.

use std::collections::BTreeSet;
use tracing::debug;

/// Candidate status conditions. Declaration order is display priority:
/// earlier variants win when several conditions are raised at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StatusCondition {
    SensorDisconnected,
    SensorNeedsCharging,
    NeedCalibratedCamera,
    NeedCameraPermission,
    TrackingLost,
    ExploringTooFar,
    Finalizing,
}

impl StatusCondition {
    /// Sticky conditions persist until the originating subsystem signals
    /// recovery; non-sticky ones are dropped on session reset.
    pub fn is_sticky(self) -> bool {
        matches!(
            self,
            StatusCondition::SensorDisconnected
                | StatusCondition::SensorNeedsCharging
                | StatusCondition::NeedCalibratedCamera
                | StatusCondition::NeedCameraPermission
        )
    }

    pub fn message(self) -> &'static str {
        match self {
            StatusCondition::SensorDisconnected => "Please connect the depth sensor.",
            StatusCondition::SensorNeedsCharging => "Please charge the depth sensor.",
            StatusCondition::NeedCalibratedCamera => {
                "A calibrated color camera is required for scanning."
            }
            StatusCondition::NeedCameraPermission => "Camera access is required to capture rooms.",
            StatusCondition::TrackingLost => "Tracking lost. Move back to the last scanned area.",
            StatusCondition::ExploringTooFar => "Please stay closer to where the scan started.",
            StatusCondition::Finalizing => "Finalizing model...",
        }
    }
}

/// Resolves competing status requests into the single displayed message.
#[derive(Debug, Default)]
pub struct StatusArbiter {
    raised: BTreeSet<StatusCondition>,
}

impl StatusArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise a condition. Idempotent.
    pub fn raise(&mut self, condition: StatusCondition) {
        if self.raised.insert(condition) {
            debug!("Status raised: {:?}", condition);
        }
    }

    /// Clear a condition. Idempotent.
    pub fn clear(&mut self, condition: StatusCondition) {
        if self.raised.remove(&condition) {
            debug!("Status cleared: {:?}", condition);
        }
    }

    pub fn is_raised(&self, condition: StatusCondition) -> bool {
        self.raised.contains(&condition)
    }

    /// The highest-priority condition still raised.
    pub fn current(&self) -> Option<StatusCondition> {
        self.raised.first().copied()
    }

    pub fn current_message(&self) -> Option<&'static str> {
        self.current().map(StatusCondition::message)
    }

    /// Drop everything that does not persist across a session reset.
    pub fn clear_non_sticky(&mut self) {
        self.raised.retain(|condition| condition.is_sticky());
    }
}
