//! GPU-resident video planes and the fullscreen preview pass.

use crate::projection::VideoUniforms;
use crate::shaders;
use roomscan_data::{ColorImage, Intrinsics};
use tracing::debug;

struct PlanePair {
    luma: wgpu::Texture,
    luma_view: wgpu::TextureView,
    chroma: wgpu::Texture,
    chroma_view: wgpu::TextureView,
    size: (u32, u32),
}

/// The single live luma/chroma texture pair for the camera preview.
///
/// Uploads reuse the existing allocation frame after frame; a resolution
/// change destroys the previous textures before creating the replacement, so
/// exactly one set of GPU planes exists at any time.
#[derive(Default)]
pub struct VideoTextures {
    planes: Option<PlanePair>,
}

impl VideoTextures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upload a frame's planes. Returns true when the textures were
    /// (re)created and the renderer must rebind.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        color: &ColorImage,
    ) -> bool {
        let size = color.dimensions();
        let recreated = match &self.planes {
            Some(pair) if pair.size == size => false,
            _ => {
                if let Some(previous) = self.planes.take() {
                    previous.luma.destroy();
                    previous.chroma.destroy();
                    debug!(
                        "Released {}x{} video planes",
                        previous.size.0, previous.size.1
                    );
                }
                self.planes = Some(create_planes(device, size));
                true
            }
        };

        if let Some(pair) = &self.planes {
            let (chroma_width, chroma_height) = color.chroma_dimensions();
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &pair.luma,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                color.luma_plane(),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(size.0),
                    rows_per_image: Some(size.1),
                },
                wgpu::Extent3d {
                    width: size.0,
                    height: size.1,
                    depth_or_array_layers: 1,
                },
            );
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &pair.chroma,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                color.chroma_plane(),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(chroma_width * 2),
                    rows_per_image: Some(chroma_height),
                },
                wgpu::Extent3d {
                    width: chroma_width,
                    height: chroma_height,
                    depth_or_array_layers: 1,
                },
            );
        }

        recreated
    }

    /// Views over the live planes, once the first frame was uploaded.
    pub fn views(&self) -> Option<(&wgpu::TextureView, &wgpu::TextureView)> {
        self.planes
            .as_ref()
            .map(|pair| (&pair.luma_view, &pair.chroma_view))
    }

    pub fn size(&self) -> Option<(u32, u32)> {
        self.planes.as_ref().map(|pair| pair.size)
    }
}

fn create_planes(device: &wgpu::Device, size: (u32, u32)) -> PlanePair {
    debug!("Creating {}x{} video planes", size.0, size.1);

    let luma = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Video Luma"),
        size: wgpu::Extent3d {
            width: size.0,
            height: size.1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::R8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let chroma = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Video Chroma"),
        size: wgpu::Extent3d {
            width: size.0 / 2,
            height: size.1 / 2,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rg8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    let luma_view = luma.create_view(&wgpu::TextureViewDescriptor::default());
    let chroma_view = chroma.create_view(&wgpu::TextureViewDescriptor::default());

    PlanePair {
        luma,
        luma_view,
        chroma,
        chroma_view,
        size,
    }
}

/// Renders the live video planes as a fullscreen quad with lens
/// undistortion applied in the shader.
pub struct QuadRenderer {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    bind_group: Option<wgpu::BindGroup>,
}

impl QuadRenderer {
    pub fn new(device: &wgpu::Device, target_format: wgpu::TextureFormat) -> Self {
        let vertex_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Video Vertex Shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::VIDEO_VERTEX.into()),
        });
        let fragment_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Video Fragment Shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::VIDEO_FRAGMENT.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Video Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Video Uniforms"),
            size: std::mem::size_of::<VideoUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Video Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Video Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Video Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_shader,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_shader,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            bind_group_layout,
            uniform_buffer,
            sampler,
            bind_group: None,
        }
    }

    /// Refresh the uniform block from the current frame's intrinsics.
    pub fn update_intrinsics(
        &self,
        queue: &wgpu::Queue,
        intrinsics: &Intrinsics,
        near: f32,
        far: f32,
    ) {
        let uniforms = VideoUniforms::new(intrinsics, near, far);
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    /// Rebuild the bind group after the video planes were (re)created.
    pub fn rebind(&mut self, device: &wgpu::Device, textures: &VideoTextures) {
        let Some((luma_view, chroma_view)) = textures.views() else {
            self.bind_group = None;
            return;
        };
        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Video Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(luma_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(chroma_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        }));
    }

    /// Record the preview pass into `encoder`. A no-op until the first
    /// upload has been bound.
    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let Some(bind_group) = &self.bind_group else {
            return;
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Video Quad Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
