//! Roomscan Data Crate
//!
//! GPU-agnostic data model for room-scanning sessions: camera poses,
//! scanning volumes, synchronized sensor frames, and reconstructed meshes.
//! This crate carries no sensor or GPU code and focuses on the types shared
//! by the capture, session, and rendering layers.

pub mod frame;
pub mod mesh;
pub mod pose;
pub mod volume;

pub use frame::{ColorImage, DepthImage, FrameError, Intrinsics, SensorFrame};
pub use mesh::Mesh;
pub use pose::Pose;
pub use volume::{ScanVolume, VolumeError};
