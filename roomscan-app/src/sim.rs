//! Simulated stand-ins for the external SLAM and mesh collaborators.
//!
//! These keep the binary runnable end to end without sensor hardware or the
//! proprietary reconstruction stack. Each one honors the same contract the
//! real collaborator would.

use glam::{Quat, Vec3};
use roomscan_data::{Mesh, Pose, ScanVolume, SensorFrame};
use roomscan_session::{
    CancelToken, Keyframe, MeshReconstructor, MeshRefiner, RefineError, TrackingAdapter,
    TrackingError, TrackingQuality,
};
use tracing::debug;

/// Tracks a camera orbiting the volume center at a steady rate, derived
/// purely from frame timestamps.
pub struct OrbitTracker {
    radius_meters: f32,
    yaw_rate_radians: f32,
}

impl OrbitTracker {
    pub fn new(radius_meters: f32, yaw_rate_degrees: f32) -> Self {
        Self {
            radius_meters,
            yaw_rate_radians: yaw_rate_degrees.to_radians(),
        }
    }

    fn pose_at(&self, timestamp: f64) -> Pose {
        let yaw = self.yaw_rate_radians * timestamp as f32;
        let rotation = Quat::from_rotation_y(yaw);
        let position = rotation * Vec3::new(0.0, 0.0, self.radius_meters);
        Pose::from_rotation_translation(rotation, position)
    }
}

impl TrackingAdapter for OrbitTracker {
    fn track(
        &mut self,
        frame: &SensorFrame,
        _prior: &Pose,
    ) -> Result<(Pose, TrackingQuality), TrackingError> {
        Ok((self.pose_at(frame.timestamp), TrackingQuality::Good))
    }

    fn initialize_pose(
        &mut self,
        frame: &SensorFrame,
        _volume: &ScanVolume,
    ) -> Result<Pose, TrackingError> {
        if frame.gravity.length_squared() < 1e-6 {
            return Err(TrackingError::InitializationFailed(
                "no gravity estimate".into(),
            ));
        }
        Ok(self.pose_at(frame.timestamp))
    }
}

/// Produces the scanning volume's box shell as the "reconstructed" mesh.
pub struct VolumeReconstructor {
    volume: ScanVolume,
}

impl VolumeReconstructor {
    pub fn new(volume: ScanVolume) -> Self {
        Self { volume }
    }
}

impl MeshReconstructor for VolumeReconstructor {
    fn extract_mesh(&mut self) -> Result<Mesh, TrackingError> {
        let half = self.volume.size_meters() / 2.0;
        let mut positions = Vec::with_capacity(8);
        let mut normals = Vec::with_capacity(8);
        for z in [-1.0f32, 1.0] {
            for y in [-1.0f32, 1.0] {
                for x in [-1.0f32, 1.0] {
                    let corner = Vec3::new(x, y, z);
                    positions.push(corner * half);
                    normals.push(corner.normalize());
                }
            }
        }
        let faces = vec![
            [0, 2, 1],
            [1, 2, 3],
            [4, 5, 6],
            [5, 7, 6],
            [0, 1, 4],
            [1, 5, 4],
            [2, 6, 3],
            [3, 6, 7],
            [0, 4, 2],
            [2, 4, 6],
            [1, 3, 5],
            [3, 7, 5],
        ];
        Ok(Mesh::new(positions, normals, faces))
    }
}

// Check the token every so many vertices; refiners must stay cancellable
// even on large meshes.
const CANCEL_CHECK_STRIDE: usize = 1024;

/// Smooths vertex normals against the mesh centroid, a cheap stand-in for
/// real hole filling.
pub struct SmoothingHoleFiller;

impl MeshRefiner for SmoothingHoleFiller {
    fn run(
        &self,
        mesh: &Mesh,
        _keyframes: &[Keyframe],
        cancel: &CancelToken,
    ) -> Result<Mesh, RefineError> {
        let centroid = mesh.centroid();
        let mut refined = mesh.clone();
        for (index, (position, normal)) in refined
            .positions
            .iter()
            .zip(refined.normals.iter_mut())
            .enumerate()
        {
            if index % CANCEL_CHECK_STRIDE == 0 && cancel.is_cancelled() {
                return Err(RefineError::Interrupted);
            }
            let outward = (*position - centroid).normalize_or_zero();
            *normal = (*normal + outward).normalize_or_zero();
        }
        debug!("Smoothed {} normals", refined.vertex_count());
        Ok(refined)
    }
}

/// Paints each vertex from the keyframe whose camera sat closest to it,
/// using the keyframe's mean luma as a gray level.
pub struct KeyframeColorizer;

impl MeshRefiner for KeyframeColorizer {
    fn run(
        &self,
        mesh: &Mesh,
        keyframes: &[Keyframe],
        cancel: &CancelToken,
    ) -> Result<Mesh, RefineError> {
        if keyframes.is_empty() {
            return Err(RefineError::Failed("no keyframes to colorize from".into()));
        }

        let shades: Vec<(Vec3, f32)> = keyframes
            .iter()
            .map(|keyframe| {
                let plane = keyframe.frame.color.luma_plane();
                let mean = plane.iter().map(|&y| y as f32).sum::<f32>()
                    / plane.len().max(1) as f32
                    / 255.0;
                (keyframe.pose.position(), mean)
            })
            .collect();

        let mut colors = Vec::with_capacity(mesh.vertex_count());
        for (index, position) in mesh.positions.iter().enumerate() {
            if index % CANCEL_CHECK_STRIDE == 0 && cancel.is_cancelled() {
                return Err(RefineError::Interrupted);
            }
            let shade = shades
                .iter()
                .min_by(|(a, _), (b, _)| {
                    a.distance_squared(*position)
                        .total_cmp(&b.distance_squared(*position))
                })
                .map(|(_, shade)| *shade)
                .unwrap_or(0.5);
            colors.push(Vec3::splat(shade));
        }

        debug!(
            "Colorized {} vertices from {} keyframes",
            mesh.vertex_count(),
            keyframes.len()
        );
        Ok(mesh.clone().with_colors(colors))
    }
}
