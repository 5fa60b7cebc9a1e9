//! Undistortion-aware projection math for the color camera.

use glam::{Mat4, Vec4};
use roomscan_data::Intrinsics;

/// GL-style perspective projection derived from pinhole intrinsics, so the
/// rendered overlay lines up with the camera image.
pub fn projection_from_intrinsics(intrinsics: &Intrinsics, near: f32, far: f32) -> Mat4 {
    let width = intrinsics.width as f32;
    let height = intrinsics.height as f32;
    Mat4::from_cols(
        Vec4::new(2.0 * intrinsics.fx / width, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 * intrinsics.fy / height, 0.0, 0.0),
        Vec4::new(
            (width - 2.0 * intrinsics.cx) / width,
            -(height - 2.0 * intrinsics.cy) / height,
            -(far + near) / (far - near),
            -1.0,
        ),
        Vec4::new(0.0, 0.0, -2.0 * far * near / (far - near), 0.0),
    )
}

/// Shared uniform layout between host and the video quad shaders.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VideoUniforms {
    pub projection: [[f32; 4]; 4],
    /// k1, k2 radial distortion, then the normalized principal point.
    pub distortion: [f32; 4],
}

impl VideoUniforms {
    pub fn new(intrinsics: &Intrinsics, near: f32, far: f32) -> Self {
        Self {
            projection: projection_from_intrinsics(intrinsics, near, far).to_cols_array_2d(),
            distortion: [
                intrinsics.k1,
                intrinsics.k2,
                intrinsics.cx / intrinsics.width as f32,
                intrinsics.cy / intrinsics.height as f32,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intrinsics() -> Intrinsics {
        Intrinsics {
            width: 640,
            height: 480,
            fx: 500.0,
            fy: 500.0,
            cx: 320.0,
            cy: 240.0,
            k1: 0.01,
            k2: 0.001,
        }
    }

    #[test]
    fn test_centered_principal_point_has_no_shear() {
        let proj = projection_from_intrinsics(&intrinsics(), 0.1, 100.0);
        assert!(proj.z_axis.x.abs() < 1e-6);
        assert!(proj.z_axis.y.abs() < 1e-6);
        assert_eq!(proj.z_axis.w, -1.0);
    }

    #[test]
    fn test_near_plane_maps_to_minus_one() {
        let proj = projection_from_intrinsics(&intrinsics(), 0.1, 100.0);
        let clip = proj * Vec4::new(0.0, 0.0, -0.1, 1.0);
        let ndc_z = clip.z / clip.w;
        assert!((ndc_z + 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_far_plane_maps_to_plus_one() {
        let proj = projection_from_intrinsics(&intrinsics(), 0.1, 100.0);
        let clip = proj * Vec4::new(0.0, 0.0, -100.0, 1.0);
        let ndc_z = clip.z / clip.w;
        assert!((ndc_z - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_uniforms_pack_normalized_principal_point() {
        let uniforms = VideoUniforms::new(&intrinsics(), 0.1, 100.0);
        assert_eq!(uniforms.distortion[0], 0.01);
        assert!((uniforms.distortion[2] - 0.5).abs() < 1e-6);
        assert!((uniforms.distortion[3] - 0.5).abs() < 1e-6);
    }
}
