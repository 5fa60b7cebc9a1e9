//! Interfaces to the external SLAM, reconstruction, and viewing collaborators.

use crate::finalize::CancelToken;
use crate::keyframes::Keyframe;
use roomscan_data::{Mesh, Pose, ScanVolume, SensorFrame};
use thiserror::Error;

/// Confidence signal from the external tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingQuality {
    Good,
    Limited,
    Lost,
}

impl TrackingQuality {
    /// Whether the pose estimate is trustworthy enough for keyframe admission.
    pub fn is_reliable(self) -> bool {
        matches!(self, TrackingQuality::Good)
    }
}

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("pose initialization failed: {0}")]
    InitializationFailed(String),

    #[error("tracker error: {0}")]
    Internal(String),
}

/// The external SLAM tracker. Given the previous pose and a new frame it
/// returns an updated pose and a tracking quality; internals are opaque.
pub trait TrackingAdapter {
    fn track(
        &mut self,
        frame: &SensorFrame,
        prior: &Pose,
    ) -> Result<(Pose, TrackingQuality), TrackingError>;

    /// Estimate the initial pose from a frame and the scanning volume.
    fn initialize_pose(
        &mut self,
        frame: &SensorFrame,
        volume: &ScanVolume,
    ) -> Result<Pose, TrackingError>;
}

/// The external mesh reconstructor; queried once when scanning ends.
pub trait MeshReconstructor {
    fn extract_mesh(&mut self) -> Result<Mesh, TrackingError>;
}

/// Errors from a refinement pass.
#[derive(Debug, Error)]
pub enum RefineError {
    #[error("refinement interrupted")]
    Interrupted,

    #[error("refinement failed: {0}")]
    Failed(String),
}

/// A mesh post-processing pass (hole filling, colorization) run off the
/// frame path. Implementations must poll the cancel token and bail out
/// early once it is set.
pub trait MeshRefiner {
    fn run(
        &self,
        mesh: &Mesh,
        keyframes: &[Keyframe],
        cancel: &CancelToken,
    ) -> Result<Mesh, RefineError>;
}

/// The meshes handed to the viewer when finalization settles.
#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
    pub raw: Mesh,
    pub hole_filled: Option<Mesh>,
    pub colorized: Option<Mesh>,
}

impl FinalizeOutcome {
    /// The most refined mesh available. Failed passes fall back to the next
    /// best result; viewing never blocks on a failure.
    pub fn best(&self) -> &Mesh {
        self.colorized
            .as_ref()
            .or(self.hole_filled.as_ref())
            .unwrap_or(&self.raw)
    }
}

/// Receives the finished meshes when the session enters Viewing.
pub trait Viewer {
    fn present(&mut self, outcome: FinalizeOutcome);
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn mesh_with(vertices: usize) -> Mesh {
        Mesh::new(
            vec![Vec3::ZERO; vertices],
            vec![Vec3::Y; vertices],
            vec![],
        )
    }

    #[test]
    fn test_best_prefers_colorized() {
        let outcome = FinalizeOutcome {
            raw: mesh_with(1),
            hole_filled: Some(mesh_with(2)),
            colorized: Some(mesh_with(3).with_colors(vec![Vec3::ONE; 3])),
        };
        assert_eq!(outcome.best().vertex_count(), 3);
        assert!(outcome.best().has_colors());
    }

    #[test]
    fn test_best_falls_back_to_hole_filled() {
        let outcome = FinalizeOutcome {
            raw: mesh_with(1),
            hole_filled: Some(mesh_with(2)),
            colorized: None,
        };
        assert_eq!(outcome.best().vertex_count(), 2);
    }

    #[test]
    fn test_best_falls_back_to_raw() {
        let outcome = FinalizeOutcome {
            raw: mesh_with(1),
            hole_filled: None,
            colorized: None,
        };
        assert_eq!(outcome.best().vertex_count(), 1);
    }
}
