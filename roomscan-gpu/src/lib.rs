//! Roomscan GPU Crate
//!
//! GPU texture pipeline for the live camera preview: device setup, YCbCr
//! plane upload, and the undistortion-aware fullscreen quad pass. The
//! pipeline runs every frame regardless of capture state.

pub mod projection;
pub mod shaders;
pub mod video;

pub use projection::{VideoUniforms, projection_from_intrinsics};
pub use video::{QuadRenderer, VideoTextures};
pub use wgpu;

#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("Request Adapter Error: {0}")]
    RequestAdapterError(#[from] wgpu::RequestAdapterError),
    #[error("Request Device Error: {0}")]
    RequestDeviceError(#[from] wgpu::RequestDeviceError),
}

/// Device and queue shared by the texture pipeline.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    pub async fn new() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::from_env_or_default());

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Roomscan"),
                ..Default::default()
            })
            .await?;

        Ok(Self { device, queue })
    }

    /// Blocking initialization for callers without an async runtime.
    pub fn new_blocking() -> Result<Self, GpuError> {
        pollster::block_on(Self::new())
    }
}
