//! Session run loop and component wiring.

use crate::sim::{KeyframeColorizer, OrbitTracker, SmoothingHoleFiller, VolumeReconstructor};
use roomscan_capture::{CaptureError, FrameSource, ImuCell, ReplayCapture, SyntheticCapture};
use roomscan_data::{Pose, SensorFrame};
use roomscan_gpu::{GpuContext, QuadRenderer, VideoTextures, wgpu};
use roomscan_session::{
    CaptureSession, CaptureState, FinalizationScheduler, FinalizeOutcome, ScanOptions,
    StatusCondition, TrackingAdapter, Viewer,
};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Frames of stable pose estimates before scanning starts on its own.
const POSE_STABLE_FRAMES: u32 = 10;

pub struct RunConfig {
    pub options_path: Option<PathBuf>,
    pub replay_dir: Option<PathBuf>,
    pub frame_budget: u64,
    pub preview: bool,
}

/// Logs what the viewer collaborator receives.
struct LoggingViewer;

impl Viewer for LoggingViewer {
    fn present(&mut self, outcome: FinalizeOutcome) {
        let best = outcome.best();
        info!(
            "Viewer received {} vertices, {} faces ({}, hole filling {})",
            best.vertex_count(),
            best.face_count(),
            if best.has_colors() {
                "colorized"
            } else {
                "uncolorized"
            },
            if outcome.hole_filled.is_some() {
                "applied"
            } else {
                "unavailable"
            },
        );
    }
}

/// The preview texture pipeline: live planes, undistortion uniforms, and an
/// offscreen render target standing in for the screen.
struct Preview {
    context: GpuContext,
    textures: VideoTextures,
    renderer: QuadRenderer,
    target: Option<(wgpu::TextureView, (u32, u32))>,
}

impl Preview {
    const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    fn new() -> Result<Self, roomscan_gpu::GpuError> {
        let context = GpuContext::new_blocking()?;
        let renderer = QuadRenderer::new(&context.device, Self::TARGET_FORMAT);
        Ok(Self {
            context,
            textures: VideoTextures::new(),
            renderer,
            target: None,
        })
    }

    /// Upload the frame's planes and redraw. Runs every frame regardless of
    /// capture state.
    fn refresh(&mut self, frame: &SensorFrame) {
        let recreated =
            self.textures
                .upload(&self.context.device, &self.context.queue, &frame.color);
        if recreated {
            self.renderer.rebind(&self.context.device, &self.textures);
            self.ensure_target(frame.color.dimensions());
        }
        self.renderer
            .update_intrinsics(&self.context.queue, &frame.intrinsics, 0.1, 100.0);

        if let Some((view, _)) = &self.target {
            let mut encoder = self
                .context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
            self.renderer.render(&mut encoder, view);
            self.context.queue.submit(Some(encoder.finish()));
        }
    }

    fn ensure_target(&mut self, size: (u32, u32)) {
        if matches!(&self.target, Some((_, existing)) if *existing == size) {
            return;
        }
        let texture = self.context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Preview Target"),
            size: wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.target = Some((view, size));
    }
}

pub fn run(config: RunConfig) -> Result<(), Box<dyn Error>> {
    init_logging();

    let options = match &config.options_path {
        Some(path) => ScanOptions::from_path(path)?,
        None => ScanOptions::default(),
    };
    let mut session = CaptureSession::new(options)?;

    let imu = ImuCell::new();
    let mut source: Box<dyn FrameSource> = match &config.replay_dir {
        Some(dir) => Box::new(ReplayCapture::open(dir)?.with_imu(imu.clone())),
        None => Box::new(
            SyntheticCapture::new(640, 480)
                .with_frame_limit(config.frame_budget)
                .with_imu(imu.clone()),
        ),
    };
    info!(
        "Capture source ready: {:?} at {:?} fps",
        source.resolution(),
        source.frame_rate()
    );

    let mut tracker = OrbitTracker::new(0.4, 3.0);
    let mut scheduler = FinalizationScheduler::new();
    let mut viewer = LoggingViewer;
    let mut preview = if config.preview {
        match Preview::new() {
            Ok(preview) => Some(preview),
            Err(e) => {
                warn!("Preview disabled, no GPU available: {e}");
                None
            }
        }
    } else {
        None
    };

    let mut prior_pose = Pose::IDENTITY;
    let mut stable_frames = 0u32;
    let mut last_status: Option<&'static str> = None;

    loop {
        match source.next_frame() {
            Ok(Some(frame)) => {
                if let Some(preview) = &mut preview {
                    preview.refresh(&frame);
                }

                match session.state() {
                    CaptureState::PoseInitialization => {
                        match tracker.initialize_pose(&frame, session.volume()) {
                            Ok(pose) => {
                                prior_pose = pose;
                                stable_frames += 1;
                                if stable_frames >= POSE_STABLE_FRAMES {
                                    session.begin_scanning(pose)?;
                                }
                            }
                            Err(e) => {
                                debug!("Pose not ready: {e}");
                                stable_frames = 0;
                            }
                        }
                    }
                    CaptureState::Scanning => {
                        let (pose, quality) = tracker.track(&frame, &prior_pose)?;
                        prior_pose = pose;
                        let decision = session.handle_tracked_frame(
                            &frame,
                            pose,
                            quality,
                            imu.rotation_speed_degrees(),
                        );
                        if let Some(decision) = decision {
                            debug!("Frame {:.3}s: {:?}", frame.timestamp, decision);
                        }
                    }
                    CaptureState::Finalizing => {
                        session.poll_finalization(&mut scheduler, &mut viewer);
                    }
                    CaptureState::Viewing => break,
                }
            }
            Ok(None) => match session.state() {
                CaptureState::Scanning => {
                    info!(
                        "Capture drained with {} keyframes; finishing scan",
                        session.keyframes().len()
                    );
                    let mut reconstructor = VolumeReconstructor::new(*session.volume());
                    session.finish_scan(
                        &mut reconstructor,
                        &mut scheduler,
                        Box::new(SmoothingHoleFiller),
                        Box::new(KeyframeColorizer),
                    )?;
                }
                CaptureState::Finalizing => {
                    if session.poll_finalization(&mut scheduler, &mut viewer) {
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
                _ => break,
            },
            Err(CaptureError::SensorDisconnected) => {
                session.sensor_disconnected();
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(CaptureError::SensorNotCalibrated) => {
                // No calibrated color camera; fall back to unregistered depth.
                source.set_registered_depth(false);
                session.raise_status(StatusCondition::NeedCalibratedCamera);
            }
            Err(CaptureError::PermissionDenied) => {
                session.raise_status(StatusCondition::NeedCameraPermission);
                break;
            }
            Err(e) => return Err(e.into()),
        }

        if source.needs_charging() {
            session.raise_status(StatusCondition::SensorNeedsCharging);
        } else {
            session.clear_status(StatusCondition::SensorNeedsCharging);
        }

        let message = session.status().current_message();
        if message != last_status {
            if let Some(text) = message {
                info!("Status: {text}");
            }
            last_status = message;
        }
    }

    info!("Session ended in {:?}", session.state());
    Ok(())
}

fn init_logging() {
    #[cfg(feature = "tracy")]
    {
        use tracing_subscriber::Layer;
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;
        tracing_subscriber::registry()
            .with(tracing_tracy::TracyLayer::default())
            .with(
                tracing_subscriber::fmt::layer().with_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "info".into()),
                ),
            )
            .init();
    }

    #[cfg(not(feature = "tracy"))]
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}
