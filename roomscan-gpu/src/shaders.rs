//! Shader source code embedded at compile time.

/// Fullscreen video quad vertex shader - generates a covering triangle.
pub const VIDEO_VERTEX: &str = include_str!("../shaders/video_vertex.wgsl");

/// Fullscreen video quad fragment shader - undistortion-aware YCbCr to RGB.
pub const VIDEO_FRAGMENT: &str = include_str!("../shaders/video_fragment.wgsl");
