//! Session configuration with load-time validation.

use roomscan_data::{ScanVolume, VolumeError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Errors raised when an option set cannot be accepted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f32 },

    #[error("max_num_keyframes must be at least 1")]
    ZeroKeyframeCapacity,

    #[error("color_camera_lens_position {0} is outside [0, 1]")]
    LensPositionOutOfRange(f32),

    #[error("initial volume is invalid: {0}")]
    Volume(#[from] VolumeError),

    #[error("hardware-registered depth cannot be combined with expensive depth correction")]
    IncompatibleDepthOptions,

    #[error("failed to read options: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse options: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Static session configuration, validated before a session starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Initial scanning volume size in meters.
    pub initial_volume_size_meters: [f32; 3],
    /// Cell resolution for the initial volume; rescaled if the size changes.
    pub initial_volume_resolution_meters: f32,
    /// The ceiling is not likely to be very low; vertical size is clamped.
    pub min_vertical_volume_size: f32,
    /// Keyframe capacity. More would not fit the colorization atlas.
    pub max_num_keyframes: usize,
    /// Take a new keyframe if the rotation difference is higher, in degrees.
    pub max_keyframe_rotation_degrees: f32,
    /// Take a new keyframe if the translation difference is higher, in meters.
    pub max_keyframe_translation_meters: f32,
    /// Rotation speed above which a frame would carry motion blur.
    pub max_keyframe_rotation_speed_degrees_per_second: f32,
    /// Warn when the user explores further than this from the initial pose.
    pub max_distance_from_initial_position_meters: f32,
    /// Fixed focus position of the color camera.
    pub color_camera_lens_position: f32,
    /// Use depth aligned to the color viewpoint when the sensor is calibrated.
    /// Overwritten to false when no calibrated color camera is available.
    pub use_hardware_registered_depth: bool,
    /// Per-frame depth accuracy refinement; requires unregistered depth.
    pub apply_expensive_depth_correction: bool,
    /// Run the hole-filling pass during finalization.
    pub hole_filling_enabled: bool,
    /// Run the colorize pass during finalization.
    pub colorize_enabled: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            initial_volume_size_meters: [6.0, 4.0, 6.0],
            initial_volume_resolution_meters: 0.05,
            min_vertical_volume_size: 3.0,
            max_num_keyframes: 48,
            max_keyframe_rotation_degrees: 20.0,
            max_keyframe_translation_meters: 0.3,
            max_keyframe_rotation_speed_degrees_per_second: 1.0,
            max_distance_from_initial_position_meters: 1.0,
            color_camera_lens_position: 0.75,
            use_hardware_registered_depth: false,
            apply_expensive_depth_correction: true,
            hole_filling_enabled: true,
            colorize_enabled: true,
        }
    }
}

impl ScanOptions {
    /// Load options from a JSON file and validate them. Invalid combinations
    /// are rejected here, never silently ignored later.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let options: Self = serde_json::from_str(&text)?;
        options.validate()?;
        info!("Loaded scan options from {:?}", path.as_ref());
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            (
                "initial_volume_resolution_meters",
                self.initial_volume_resolution_meters,
            ),
            (
                "max_keyframe_rotation_degrees",
                self.max_keyframe_rotation_degrees,
            ),
            (
                "max_keyframe_translation_meters",
                self.max_keyframe_translation_meters,
            ),
            (
                "max_keyframe_rotation_speed_degrees_per_second",
                self.max_keyframe_rotation_speed_degrees_per_second,
            ),
            (
                "max_distance_from_initial_position_meters",
                self.max_distance_from_initial_position_meters,
            ),
        ];
        for (field, value) in positive {
            if value <= 0.0 {
                return Err(ConfigError::NonPositive { field, value });
            }
        }
        if self.max_num_keyframes == 0 {
            return Err(ConfigError::ZeroKeyframeCapacity);
        }
        if !(0.0..=1.0).contains(&self.color_camera_lens_position) {
            return Err(ConfigError::LensPositionOutOfRange(
                self.color_camera_lens_position,
            ));
        }
        self.initial_volume()?;
        if self.use_hardware_registered_depth && self.apply_expensive_depth_correction {
            return Err(ConfigError::IncompatibleDepthOptions);
        }
        Ok(())
    }

    /// The configured initial volume.
    pub fn initial_volume(&self) -> Result<ScanVolume, VolumeError> {
        ScanVolume::new(
            self.initial_volume_size_meters.into(),
            self.initial_volume_resolution_meters,
            self.min_vertical_volume_size,
        )
    }

    pub fn max_keyframe_rotation_radians(&self) -> f32 {
        self.max_keyframe_rotation_degrees.to_radians()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(ScanOptions::default().validate().is_ok());
    }

    #[test]
    fn test_incompatible_depth_options_rejected() {
        let options = ScanOptions {
            use_hardware_registered_depth: true,
            apply_expensive_depth_correction: true,
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ConfigError::IncompatibleDepthOptions)
        ));
    }

    #[test]
    fn test_registered_depth_without_correction_accepted() {
        let options = ScanOptions {
            use_hardware_registered_depth: true,
            apply_expensive_depth_correction: false,
            ..Default::default()
        };
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_zero_keyframe_capacity_rejected() {
        let options = ScanOptions {
            max_num_keyframes: 0,
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ConfigError::ZeroKeyframeCapacity)
        ));
    }

    #[test]
    fn test_lens_position_range() {
        let options = ScanOptions {
            color_camera_lens_position: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ConfigError::LensPositionOutOfRange(_))
        ));
    }

    #[test]
    fn test_invalid_volume_rejected() {
        let options = ScanOptions {
            initial_volume_size_meters: [6.0, 2.0, 6.0],
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(ConfigError::Volume(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let options: ScanOptions =
            serde_json::from_str(r#"{"max_num_keyframes": 12}"#).unwrap();
        assert_eq!(options.max_num_keyframes, 12);
        assert_eq!(options.max_keyframe_rotation_degrees, 20.0);
        assert!(options.validate().is_ok());
    }
}
