//! Headless scanning session example
//!
//! Drives a complete capture session against the synthetic sensor: pose
//! initialization, scanning with keyframe admission, background
//! finalization, and the viewer handoff.
//!
//! Usage:
//!   cargo run --example offline_scan

use glam::{Quat, Vec3};
use roomscan_capture::{FrameSource, ImuCell, SyntheticCapture};
use roomscan_data::{Mesh, Pose, ScanVolume, SensorFrame};
use roomscan_session::{
    CancelToken, CaptureSession, CaptureState, FinalizationScheduler, FinalizeOutcome, Keyframe,
    MeshReconstructor, MeshRefiner, RefineError, ScanOptions, TrackingAdapter, TrackingError,
    TrackingQuality, Viewer,
};
use std::error::Error;
use std::time::Duration;
use tracing::info;

/// Camera spinning in place at a steady rate, posed from frame timestamps.
struct SpinTracker {
    yaw_rate_radians: f32,
}

impl SpinTracker {
    fn pose_at(&self, timestamp: f64) -> Pose {
        Pose::from_rotation_translation(
            Quat::from_rotation_y(self.yaw_rate_radians * timestamp as f32),
            Vec3::ZERO,
        )
    }
}

impl TrackingAdapter for SpinTracker {
    fn track(
        &mut self,
        frame: &SensorFrame,
        _prior: &Pose,
    ) -> Result<(Pose, TrackingQuality), TrackingError> {
        Ok((self.pose_at(frame.timestamp), TrackingQuality::Good))
    }

    fn initialize_pose(
        &mut self,
        frame: &SensorFrame,
        _volume: &ScanVolume,
    ) -> Result<Pose, TrackingError> {
        Ok(self.pose_at(frame.timestamp))
    }
}

/// Hands back the volume's eight corners as the scanned shell.
struct ShellReconstructor {
    volume: ScanVolume,
}

impl MeshReconstructor for ShellReconstructor {
    fn extract_mesh(&mut self) -> Result<Mesh, TrackingError> {
        let half = self.volume.size_meters() / 2.0;
        let mut positions = Vec::new();
        let mut normals = Vec::new();
        for z in [-1.0f32, 1.0] {
            for y in [-1.0f32, 1.0] {
                for x in [-1.0f32, 1.0] {
                    let corner = Vec3::new(x, y, z);
                    positions.push(corner * half);
                    normals.push(corner.normalize());
                }
            }
        }
        let faces = vec![
            [0, 2, 1],
            [1, 2, 3],
            [4, 5, 6],
            [5, 7, 6],
            [0, 1, 4],
            [1, 5, 4],
            [2, 6, 3],
            [3, 6, 7],
            [0, 4, 2],
            [2, 4, 6],
            [1, 3, 5],
            [3, 7, 5],
        ];
        Ok(Mesh::new(positions, normals, faces))
    }
}

/// Hole-filling stand-in: passes the mesh through untouched.
struct PassThroughFiller;

impl MeshRefiner for PassThroughFiller {
    fn run(
        &self,
        mesh: &Mesh,
        _keyframes: &[Keyframe],
        _cancel: &CancelToken,
    ) -> Result<Mesh, RefineError> {
        Ok(mesh.clone())
    }
}

/// Colorize stand-in: shades every vertex from the keyframes' mean luma.
struct GrayColorizer;

impl MeshRefiner for GrayColorizer {
    fn run(
        &self,
        mesh: &Mesh,
        keyframes: &[Keyframe],
        _cancel: &CancelToken,
    ) -> Result<Mesh, RefineError> {
        if keyframes.is_empty() {
            return Err(RefineError::Failed("no keyframes to colorize from".into()));
        }
        let shade = keyframes
            .iter()
            .map(|keyframe| {
                let plane = keyframe.frame.color.luma_plane();
                plane.iter().map(|&y| y as f32).sum::<f32>() / plane.len().max(1) as f32 / 255.0
            })
            .sum::<f32>()
            / keyframes.len() as f32;
        Ok(mesh
            .clone()
            .with_colors(vec![Vec3::splat(shade); mesh.vertex_count()]))
    }
}

struct PrintViewer;

impl Viewer for PrintViewer {
    fn present(&mut self, outcome: FinalizeOutcome) {
        let best = outcome.best();
        info!(
            "Presented {} vertices, {} faces, colors: {}",
            best.vertex_count(),
            best.face_count(),
            best.has_colors()
        );
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut session = CaptureSession::new(ScanOptions::default())?;
    info!(
        "Session ready, volume {}",
        session.volume().size_meters()
    );

    let imu = ImuCell::new();
    let mut source = SyntheticCapture::new(320, 240)
        .with_frame_limit(150)
        .with_imu(imu.clone());
    let mut tracker = SpinTracker {
        yaw_rate_radians: 3.0_f32.to_radians(),
    };
    let mut scheduler = FinalizationScheduler::new();
    let mut viewer = PrintViewer;

    let mut prior_pose = Pose::IDENTITY;
    let mut admitted = 0usize;

    while let Some(frame) = source.next_frame()? {
        match session.state() {
            CaptureState::PoseInitialization => {
                let pose = tracker.initialize_pose(&frame, session.volume())?;
                // The synthetic pose is stable immediately; start scanning.
                session.begin_scanning(pose)?;
                prior_pose = pose;
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
                if decision.is_some_and(|d| d.is_admitted()) {
                    admitted += 1;
                }
            }
            _ => break,
        }
    }

    info!("Scanned with {} keyframes admitted", admitted);

    let mut reconstructor = ShellReconstructor {
        volume: *session.volume(),
    };
    session.finish_scan(
        &mut reconstructor,
        &mut scheduler,
        Box::new(PassThroughFiller),
        Box::new(GrayColorizer),
    )?;

    while !session.poll_finalization(&mut scheduler, &mut viewer) {
        std::thread::sleep(Duration::from_millis(5));
    }

    info!("Final state: {:?}", session.state());
    Ok(())
}
