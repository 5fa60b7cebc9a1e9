//! Common frame source types and traits.

use roomscan_data::SensorFrame;
use thiserror::Error;

/// Errors that can occur during capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Sensor disconnected")]
    SensorDisconnected,

    #[error("No calibrated color camera is available")]
    SensorNotCalibrated,

    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("Failed to capture frame: {0}")]
    CaptureFailed(String),

    #[error("Stream ended")]
    StreamEnded,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for sources that deliver synchronized depth+color frames.
///
/// `next_frame` returns `Ok(None)` when no frame is ready yet and errors when
/// a synchronized pair cannot be produced at all. Frame timestamps are
/// guaranteed monotonically increasing; implementations skip or refuse
/// regressing frames.
pub trait FrameSource {
    /// Get the next synchronized frame from the sensor.
    fn next_frame(&mut self) -> Result<Option<SensorFrame>, CaptureError>;

    /// Get the frame rate, if known.
    fn frame_rate(&self) -> Option<f32>;

    /// Get the color resolution (width, height).
    fn resolution(&self) -> (u32, u32);

    /// Check if the source is still delivering frames.
    fn is_active(&self) -> bool;

    /// Stop capturing.
    fn stop(&mut self);

    /// Toggle depth registered to the color viewpoint in hardware. Callers
    /// switch this off when the source reports `SensorNotCalibrated`.
    fn set_registered_depth(&mut self, enabled: bool);

    /// Whether the sensor battery is low enough to warn about.
    fn needs_charging(&self) -> bool {
        false
    }
}
