//! Deterministic synthetic frames for demos and tests.

use crate::imu::{ImuCell, ImuSample};
use crate::source::{CaptureError, FrameSource};
use glam::Vec3;
use roomscan_data::{ColorImage, DepthImage, Intrinsics, SensorFrame};
use tracing::info;

/// Generates a deterministic stream of frames: a gradient color pattern, a
/// flat wall at constant depth, and an IMU feed describing a steady yaw
/// rotation. Useful for exercising a full session without hardware.
pub struct SyntheticCapture {
    intrinsics: Intrinsics,
    frame_rate: f32,
    yaw_rate_deg: f32,
    wall_depth: f32,
    frame_count: u64,
    max_frames: Option<u64>,
    active: bool,
    imu: ImuCell,
}

impl SyntheticCapture {
    pub fn new(width: u32, height: u32) -> Self {
        let intrinsics = Intrinsics {
            width,
            height,
            fx: 0.8 * width as f32,
            fy: 0.8 * width as f32,
            cx: width as f32 / 2.0,
            cy: height as f32 / 2.0,
            k1: 0.0,
            k2: 0.0,
        };
        Self {
            intrinsics,
            frame_rate: 30.0,
            // Slow enough to pass the default motion-blur guard.
            yaw_rate_deg: 0.8,
            wall_depth: 2.5,
            frame_count: 0,
            max_frames: None,
            active: true,
            imu: ImuCell::new(),
        }
    }

    /// Stop delivering frames after `count` frames.
    pub fn with_frame_limit(mut self, count: u64) -> Self {
        self.max_frames = Some(count);
        self
    }

    /// Simulated yaw rotation speed in degrees per second.
    pub fn with_yaw_rate(mut self, degrees_per_second: f32) -> Self {
        self.yaw_rate_deg = degrees_per_second;
        self
    }

    /// Publish inertial data to this cell instead of the internal one.
    pub fn with_imu(mut self, imu: ImuCell) -> Self {
        self.imu = imu;
        self
    }

    /// The cell receiving this source's inertial samples.
    pub fn imu(&self) -> ImuCell {
        self.imu.clone()
    }

    /// Current simulated yaw in radians at a given timestamp.
    pub fn yaw_at(&self, timestamp: f64) -> f32 {
        self.yaw_rate_deg.to_radians() * timestamp as f32
    }
}

impl FrameSource for SyntheticCapture {
    fn next_frame(&mut self) -> Result<Option<SensorFrame>, CaptureError> {
        if !self.active {
            return Ok(None);
        }
        if let Some(max) = self.max_frames {
            if self.frame_count >= max {
                self.stop();
                return Ok(None);
            }
        }

        let (width, height) = (self.intrinsics.width, self.intrinsics.height);
        let timestamp = self.frame_count as f64 / self.frame_rate as f64;

        let mut luma = Vec::with_capacity((width * height) as usize);
        let shift = (self.frame_count * 3) as u32;
        for _y in 0..height {
            for x in 0..width {
                luma.push(((x * 255 / width + shift) % 256) as u8);
            }
        }
        let chroma = vec![128; (width / 2 * (height / 2) * 2) as usize];
        let color = ColorImage::new(width, height, luma, chroma)
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;

        let depth = DepthImage::new(
            width,
            height,
            vec![self.wall_depth; (width * height) as usize],
        )
        .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;

        let gravity = Vec3::NEG_Y;
        self.imu.publish(ImuSample {
            gravity,
            rotation_rate: Vec3::new(0.0, self.yaw_rate_deg.to_radians(), 0.0),
            timestamp,
        });

        self.frame_count += 1;

        Ok(Some(SensorFrame {
            timestamp,
            color,
            depth,
            intrinsics: self.intrinsics,
            gravity,
        }))
    }

    fn frame_rate(&self) -> Option<f32> {
        Some(self.frame_rate)
    }

    fn resolution(&self) -> (u32, u32) {
        (self.intrinsics.width, self.intrinsics.height)
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn stop(&mut self) {
        if self.active {
            self.active = false;
            info!("Synthetic capture stopped after {} frames", self.frame_count);
        }
    }

    fn set_registered_depth(&mut self, _enabled: bool) {}
}
