//! Rigid camera poses and pose deltas.

use glam::{Mat4, Quat, Vec3};

/// A rigid camera-to-world transform.
///
/// Produced once per frame by the tracker; the session holds exactly one
/// current pose and one initial pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose(Mat4);

impl Pose {
    pub const IDENTITY: Self = Self(Mat4::IDENTITY);

    pub fn new(matrix: Mat4) -> Self {
        Self(matrix)
    }

    pub fn from_rotation_translation(rotation: Quat, translation: Vec3) -> Self {
        Self(Mat4::from_rotation_translation(rotation, translation))
    }

    pub fn matrix(&self) -> Mat4 {
        self.0
    }

    /// Camera position in world coordinates.
    pub fn position(&self) -> Vec3 {
        self.0.w_axis.truncate()
    }

    /// Camera orientation in world coordinates.
    pub fn rotation(&self) -> Quat {
        let (_, rotation, _) = self.0.to_scale_rotation_translation();
        rotation
    }

    /// Angle of the relative rotation between two poses, in radians.
    pub fn angular_distance_to(&self, other: &Pose) -> f32 {
        self.rotation().angle_between(other.rotation())
    }

    /// Euclidean distance between the two camera positions, in meters.
    pub fn translational_distance_to(&self, other: &Pose) -> f32 {
        self.position().distance(other.position())
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}
