//! Synchronized sensor frames: color, depth, intrinsics, gravity.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when assembling frame images from raw planes.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("image dimensions {width}x{height} must be even for 4:2:0 chroma")]
    OddDimensions { width: u32, height: u32 },

    #[error("{plane} plane holds {actual} bytes, expected {expected}")]
    PlaneSizeMismatch {
        plane: &'static str,
        actual: usize,
        expected: usize,
    },

    #[error("depth plane holds {actual} samples, expected {expected}")]
    DepthSizeMismatch { actual: usize, expected: usize },
}

/// Pinhole intrinsics of the color camera, with radial distortion terms for
/// the undistortion shader.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub width: u32,
    pub height: u32,
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    #[serde(default)]
    pub k1: f32,
    #[serde(default)]
    pub k2: f32,
}

impl Intrinsics {
    /// Horizontal field of view in radians.
    pub fn fov_x(&self) -> f32 {
        2.0 * (self.width as f32 / (2.0 * self.fx)).atan()
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// Bi-planar YCbCr 4:2:0 color image: a full-resolution luma plane and a
/// half-resolution interleaved CbCr plane, matching what the texture
/// pipeline uploads.
#[derive(Debug, Clone)]
pub struct ColorImage {
    width: u32,
    height: u32,
    luma: Vec<u8>,
    chroma: Vec<u8>,
}

impl ColorImage {
    pub fn new(width: u32, height: u32, luma: Vec<u8>, chroma: Vec<u8>) -> Result<Self, FrameError> {
        if width % 2 != 0 || height % 2 != 0 {
            return Err(FrameError::OddDimensions { width, height });
        }
        let luma_len = (width * height) as usize;
        if luma.len() != luma_len {
            return Err(FrameError::PlaneSizeMismatch {
                plane: "luma",
                actual: luma.len(),
                expected: luma_len,
            });
        }
        let chroma_len = (width / 2 * (height / 2) * 2) as usize;
        if chroma.len() != chroma_len {
            return Err(FrameError::PlaneSizeMismatch {
                plane: "chroma",
                actual: chroma.len(),
                expected: chroma_len,
            });
        }
        Ok(Self {
            width,
            height,
            luma,
            chroma,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn luma_plane(&self) -> &[u8] {
        &self.luma
    }

    /// Interleaved CbCr samples at half resolution.
    pub fn chroma_plane(&self) -> &[u8] {
        &self.chroma
    }

    pub fn chroma_dimensions(&self) -> (u32, u32) {
        (self.width / 2, self.height / 2)
    }
}

/// Depth image in meters, registered to the color viewpoint.
#[derive(Debug, Clone)]
pub struct DepthImage {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl DepthImage {
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self, FrameError> {
        let expected = (width * height) as usize;
        if data.len() != expected {
            return Err(FrameError::DepthSizeMismatch {
                actual: data.len(),
                expected,
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn samples(&self) -> &[f32] {
        &self.data
    }

    /// Depth at a pixel, or None outside the image or where the sensor
    /// reported no return.
    pub fn depth_at(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let value = self.data[(y * self.width + x) as usize];
        value.is_finite().then_some(value)
    }
}

/// One synchronized depth+color frame with the IMU gravity estimate that was
/// current at capture time.
///
/// Immutable once produced; owned by the pipeline stage currently processing
/// it and only retained further when promoted to a keyframe.
#[derive(Debug, Clone)]
pub struct SensorFrame {
    pub timestamp: f64,
    pub color: ColorImage,
    pub depth: DepthImage,
    pub intrinsics: Intrinsics,
    pub gravity: Vec3,
}

impl SensorFrame {
    pub fn dimensions(&self) -> (u32, u32) {
        self.color.dimensions()
    }
}
