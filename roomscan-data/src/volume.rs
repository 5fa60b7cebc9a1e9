//! Scanning volume definition and validation.

use glam::Vec3;
use thiserror::Error;
use tracing::debug;

/// Errors raised when a volume edit violates the volume invariants.
#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("volume size must be positive on every axis, got {0}")]
    NonPositiveSize(Vec3),

    #[error("vertical volume size {actual} m is below the minimum {minimum} m")]
    BelowMinimumHeight { actual: f32, minimum: f32 },
}

/// Oriented scanning volume, gravity-aligned at pose initialization.
///
/// Mutable only while the session is still defining the scan; frozen for the
/// remainder of the session once scanning begins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanVolume {
    size_meters: Vec3,
    resolution_meters: f32,
    min_vertical_size: f32,
}

impl ScanVolume {
    pub fn new(
        size_meters: Vec3,
        resolution_meters: f32,
        min_vertical_size: f32,
    ) -> Result<Self, VolumeError> {
        let volume = Self {
            size_meters,
            resolution_meters,
            min_vertical_size,
        };
        volume.validate()?;
        Ok(volume)
    }

    pub fn size_meters(&self) -> Vec3 {
        self.size_meters
    }

    pub fn resolution_meters(&self) -> f32 {
        self.resolution_meters
    }

    pub fn min_vertical_size(&self) -> f32 {
        self.min_vertical_size
    }

    /// Resize the volume, rescaling the cell resolution so the voxel count
    /// stays roughly constant. The current size is kept on rejection.
    pub fn set_size(&mut self, size_meters: Vec3) -> Result<(), VolumeError> {
        let candidate = Self {
            size_meters,
            ..*self
        };
        candidate.validate()?;

        let scale = size_meters.max_element() / self.size_meters.max_element();
        self.resolution_meters *= scale;
        self.size_meters = size_meters;
        debug!(
            "Volume resized to {} at {:.3} m resolution",
            self.size_meters, self.resolution_meters
        );
        Ok(())
    }

    fn validate(&self) -> Result<(), VolumeError> {
        if self.size_meters.min_element() <= 0.0 {
            return Err(VolumeError::NonPositiveSize(self.size_meters));
        }
        if self.size_meters.y < self.min_vertical_size {
            return Err(VolumeError::BelowMinimumHeight {
                actual: self.size_meters.y,
                minimum: self.min_vertical_size,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_room_volume() {
        let volume = ScanVolume::new(Vec3::new(6.0, 4.0, 6.0), 0.05, 3.0);
        assert!(volume.is_ok());
    }

    #[test]
    fn test_low_ceiling_rejected() {
        let volume = ScanVolume::new(Vec3::new(6.0, 2.0, 6.0), 0.05, 3.0);
        assert!(matches!(
            volume,
            Err(VolumeError::BelowMinimumHeight { .. })
        ));
    }

    #[test]
    fn test_non_positive_size_rejected() {
        let volume = ScanVolume::new(Vec3::new(6.0, 4.0, 0.0), 0.05, 3.0);
        assert!(matches!(volume, Err(VolumeError::NonPositiveSize(_))));
    }

    #[test]
    fn test_resize_rescales_resolution() {
        let mut volume = ScanVolume::new(Vec3::new(6.0, 4.0, 6.0), 0.05, 3.0).unwrap();
        volume.set_size(Vec3::new(12.0, 4.0, 12.0)).unwrap();
        assert!((volume.resolution_meters() - 0.1).abs() < 1e-6);
        assert_eq!(volume.size_meters(), Vec3::new(12.0, 4.0, 12.0));
    }

    #[test]
    fn test_rejected_resize_keeps_previous_size() {
        let mut volume = ScanVolume::new(Vec3::new(6.0, 4.0, 6.0), 0.05, 3.0).unwrap();
        assert!(volume.set_size(Vec3::new(6.0, 1.0, 6.0)).is_err());
        assert_eq!(volume.size_meters(), Vec3::new(6.0, 4.0, 6.0));
        assert!((volume.resolution_meters() - 0.05).abs() < 1e-6);
    }
}
