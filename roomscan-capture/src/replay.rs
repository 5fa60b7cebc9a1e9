//! Recorded session replay from disk.

use crate::color::color_image_from_rgb;
use crate::imu::{ImuCell, ImuSample};
use crate::source::{CaptureError, FrameSource};
use glam::Vec3;
use roomscan_data::{DepthImage, Intrinsics, SensorFrame};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One frame entry in the session manifest.
#[derive(Deserialize, Debug)]
struct FrameRecord {
    timestamp: f64,
    color: String,
    depth: String,
    gravity: [f32; 3],
    #[serde(default)]
    rotation_rate: [f32; 3],
}

/// Session manifest (`session.json`) describing a recorded capture.
#[derive(Deserialize, Debug)]
struct SessionManifest {
    intrinsics: Intrinsics,
    frames: Vec<FrameRecord>,
}

/// Replays a recorded session directory: a `session.json` manifest, PNG
/// color frames, and raw little-endian `f32` depth planes registered to the
/// color viewpoint.
pub struct ReplayCapture {
    dir: PathBuf,
    intrinsics: Intrinsics,
    frames: Vec<FrameRecord>,
    index: usize,
    last_timestamp: f64,
    active: bool,
    imu: Option<ImuCell>,
}

impl ReplayCapture {
    /// Open a recorded session directory.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, CaptureError> {
        let dir = dir.as_ref().to_path_buf();
        let manifest_path = dir.join("session.json");
        info!("Opening recorded session at {:?}", manifest_path);

        let file = File::open(&manifest_path)?;
        let manifest: SessionManifest = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| CaptureError::CaptureFailed(format!("manifest parse error: {e}")))?;

        info!(
            "Recorded session: {} frames at {}x{}",
            manifest.frames.len(),
            manifest.intrinsics.width,
            manifest.intrinsics.height
        );

        Ok(Self {
            dir,
            intrinsics: manifest.intrinsics,
            frames: manifest.frames,
            index: 0,
            last_timestamp: -1.0,
            active: true,
            imu: None,
        })
    }

    /// Publish each frame's inertial data to the given cell during replay.
    pub fn with_imu(mut self, imu: ImuCell) -> Self {
        self.imu = Some(imu);
        self
    }

    fn load_depth(&self, name: &str) -> Result<DepthImage, CaptureError> {
        let bytes = std::fs::read(self.dir.join(name))?;
        let samples: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        DepthImage::new(self.intrinsics.width, self.intrinsics.height, samples)
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))
    }
}

impl FrameSource for ReplayCapture {
    fn next_frame(&mut self) -> Result<Option<SensorFrame>, CaptureError> {
        loop {
            if !self.active || self.index >= self.frames.len() {
                self.active = false;
                return Ok(None);
            }

            let record = &self.frames[self.index];
            self.index += 1;

            // Recorded clocks can glitch; never emit a regressing timestamp.
            if record.timestamp <= self.last_timestamp {
                warn!(
                    "Skipping frame {} with non-monotonic timestamp {:.4}",
                    self.index - 1,
                    record.timestamp
                );
                continue;
            }

            let rgb = image::open(self.dir.join(&record.color))
                .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?
                .to_rgb8();
            let color = color_image_from_rgb(&rgb)
                .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;
            let depth = self.load_depth(&record.depth)?;

            let gravity = Vec3::from_array(record.gravity);
            if let Some(imu) = &self.imu {
                imu.publish(ImuSample {
                    gravity,
                    rotation_rate: Vec3::from_array(record.rotation_rate),
                    timestamp: record.timestamp,
                });
            }

            self.last_timestamp = record.timestamp;
            debug!("Replayed frame {} at {:.3}s", self.index - 1, record.timestamp);

            return Ok(Some(SensorFrame {
                timestamp: record.timestamp,
                color,
                depth,
                intrinsics: self.intrinsics,
                gravity,
            }));
        }
    }

    fn frame_rate(&self) -> Option<f32> {
        let first = self.frames.first()?.timestamp;
        let last = self.frames.last()?.timestamp;
        if last > first {
            Some((self.frames.len() as f64 / (last - first)) as f32)
        } else {
            None
        }
    }

    fn resolution(&self) -> (u32, u32) {
        (self.intrinsics.width, self.intrinsics.height)
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn stop(&mut self) {
        self.active = false;
        info!("Replay stopped after {} frames", self.index);
    }

    fn set_registered_depth(&mut self, enabled: bool) {
        // Recorded depth is already registered at capture time; nothing to
        // reconfigure on replay.
        debug!("Registered-depth toggle ignored on replay (enabled={enabled})");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn write_session(dir: &Path, timestamps: &[f64]) {
        std::fs::create_dir_all(dir).unwrap();
        let mut frames = Vec::new();
        for (i, ts) in timestamps.iter().enumerate() {
            let color = format!("{i:04}_color.png");
            let depth = format!("{i:04}_depth.f32");
            RgbImage::from_pixel(4, 4, image::Rgb([64, 64, 64]))
                .save(dir.join(&color))
                .unwrap();
            let samples: Vec<u8> = std::iter::repeat(2.0f32)
                .take(16)
                .flat_map(|v| v.to_le_bytes())
                .collect();
            std::fs::write(dir.join(&depth), samples).unwrap();
            frames.push(format!(
                r#"{{"timestamp": {ts}, "color": "{color}", "depth": "{depth}", "gravity": [0.0, -1.0, 0.0]}}"#
            ));
        }
        let manifest = format!(
            r#"{{"intrinsics": {{"width": 4, "height": 4, "fx": 3.2, "fy": 3.2, "cx": 2.0, "cy": 2.0}}, "frames": [{}]}}"#,
            frames.join(",")
        );
        std::fs::write(dir.join("session.json"), manifest).unwrap();
    }

    fn temp_session(name: &str, timestamps: &[f64]) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("roomscan-replay-tests")
            .join(format!("{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        write_session(&dir, timestamps);
        dir
    }

    #[test]
    fn test_replay_round_trip() {
        let dir = temp_session("round-trip", &[0.0, 0.033, 0.066]);
        let mut source = ReplayCapture::open(&dir).unwrap();

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.dimensions(), (4, 4));
        assert_eq!(first.depth.depth_at(1, 1), Some(2.0));

        let second = source.next_frame().unwrap().unwrap();
        assert!(second.timestamp > first.timestamp);
    }

    #[test]
    fn test_non_monotonic_frames_skipped() {
        let dir = temp_session("non-monotonic", &[0.0, 0.033, 0.01, 0.066]);
        let mut source = ReplayCapture::open(&dir).unwrap();

        let mut timestamps = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            timestamps.push(frame.timestamp);
        }
        assert_eq!(timestamps, vec![0.0, 0.033, 0.066]);
    }

    #[test]
    fn test_replay_ends_cleanly() {
        let dir = temp_session("ends", &[0.0]);
        let mut source = ReplayCapture::open(&dir).unwrap();
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
        assert!(!source.is_active());
    }

    #[test]
    fn test_missing_manifest() {
        let dir = std::env::temp_dir().join("roomscan-replay-tests/none");
        assert!(matches!(
            ReplayCapture::open(dir),
            Err(CaptureError::Io(_))
        ));
    }
}
