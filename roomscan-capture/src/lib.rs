//! Roomscan Capture - Sensor frame delivery
//!
//! This crate provides implementations of the `FrameSource` trait for
//! feeding a scanning session with synchronized depth+color frames:
//!
//! - Recorded session replay from disk
//! - Deterministic synthetic frames for demos and tests
//!
//! IMU samples travel on their own delivery context; the shared [`ImuCell`]
//! keeps the most recent sample for last-value reads from the frame loop.
//!
//! ## Example
//!
//! ```ignore
//! use roomscan_capture::{FrameSource, SyntheticCapture};
//!
//! let mut sensor = SyntheticCapture::new(640, 480);
//! while let Some(frame) = sensor.next_frame()? {
//!     // Process frame...
//! }
//! ```

mod color;
mod imu;
mod replay;
mod source;
mod synthetic;

pub use color::color_image_from_rgb;
pub use imu::{ImuCell, ImuSample};
pub use replay::ReplayCapture;
pub use source::{CaptureError, FrameSource};
pub use synthetic::SyntheticCapture;
