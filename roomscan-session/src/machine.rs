//! The four-state capture session controller.

use crate::collaborators::{
    FinalizeOutcome, MeshReconstructor, MeshRefiner, TrackingError, TrackingQuality, Viewer,
};
use crate::finalize::{FinalizationScheduler, JobHandle, JobKind, JobStatus, SchedulerError};
use crate::gate::{GateDecision, KeyframeGate};
use crate::keyframes::KeyframeSet;
use crate::options::{ConfigError, ScanOptions};
use crate::status::{StatusArbiter, StatusCondition};
use glam::Vec3;
use roomscan_data::{Mesh, Pose, ScanVolume, SensorFrame, VolumeError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// The session states. Transitions are the only way to change the active
/// value; an explicit reset is the only way out of Viewing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    PoseInitialization,
    Scanning,
    Finalizing,
    Viewing,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("operation requires state {expected:?}, session is in {actual:?}")]
    InvalidState {
        expected: CaptureState,
        actual: CaptureState,
    },

    #[error("the volume is frozen once scanning has begun")]
    VolumeLocked,

    #[error(transparent)]
    Volume(#[from] VolumeError),

    #[error("mesh extraction failed: {0}")]
    Extraction(#[from] TrackingError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Drives one scanning session from volume definition through finalization.
///
/// All methods run on the primary frame thread; background work is reached
/// only through the [`FinalizationScheduler`] handles.
pub struct CaptureSession {
    options: ScanOptions,
    state: CaptureState,
    volume: ScanVolume,
    initial_volume: ScanVolume,
    gate: KeyframeGate,
    keyframes: KeyframeSet,
    initial_pose: Option<Pose>,
    current_pose: Option<Pose>,
    status: StatusArbiter,
    raw_mesh: Option<Mesh>,
    pending_jobs: Vec<JobHandle>,
    sensor_blocked: bool,
}

impl CaptureSession {
    /// Validate the options and set up a session in PoseInitialization.
    pub fn new(options: ScanOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        let volume = options.initial_volume()?;
        let gate = KeyframeGate::from_options(&options);
        let keyframes = KeyframeSet::new(options.max_num_keyframes);
        Ok(Self {
            options,
            state: CaptureState::PoseInitialization,
            volume,
            initial_volume: volume,
            gate,
            keyframes,
            initial_pose: None,
            current_pose: None,
            status: StatusArbiter::new(),
            raw_mesh: None,
            pending_jobs: Vec::new(),
            sensor_blocked: false,
        })
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    pub fn volume(&self) -> &ScanVolume {
        &self.volume
    }

    pub fn keyframes(&self) -> &KeyframeSet {
        &self.keyframes
    }

    pub fn current_pose(&self) -> Option<Pose> {
        self.current_pose
    }

    pub fn initial_pose(&self) -> Option<Pose> {
        self.initial_pose
    }

    pub fn status(&self) -> &StatusArbiter {
        &self.status
    }

    pub fn raise_status(&mut self, condition: StatusCondition) {
        self.status.raise(condition);
    }

    pub fn clear_status(&mut self, condition: StatusCondition) {
        self.status.clear(condition);
    }

    /// Whether frame processing is halted waiting for the sensor to return.
    pub fn is_blocked(&self) -> bool {
        self.sensor_blocked
    }

    /// Edit the scanning volume. Only legal before scanning begins.
    pub fn set_volume_size(&mut self, size_meters: Vec3) -> Result<(), SessionError> {
        if self.state != CaptureState::PoseInitialization {
            return Err(SessionError::VolumeLocked);
        }
        self.volume.set_size(size_meters)?;
        Ok(())
    }

    /// PoseInitialization -> Scanning: freeze the volume, snapshot the
    /// initial pose, start with an empty keyframe set.
    pub fn begin_scanning(&mut self, initial_pose: Pose) -> Result<(), SessionError> {
        if self.state != CaptureState::PoseInitialization {
            return Err(SessionError::InvalidState {
                expected: CaptureState::PoseInitialization,
                actual: self.state,
            });
        }
        self.keyframes.clear();
        self.initial_pose = Some(initial_pose);
        self.current_pose = Some(initial_pose);
        self.state = CaptureState::Scanning;
        info!(
            "Scanning started, volume {} at {:.3} m",
            self.volume.size_meters(),
            self.volume.resolution_meters()
        );
        Ok(())
    }

    /// Consume one tracked frame while scanning: update the current pose,
    /// police the exploration distance, and evaluate the keyframe gate.
    /// Returns the gate decision, or None when the frame was not processed.
    pub fn handle_tracked_frame(
        &mut self,
        frame: &SensorFrame,
        pose: Pose,
        quality: TrackingQuality,
        rotation_speed_degrees: f32,
    ) -> Option<GateDecision> {
        if self.sensor_blocked {
            return None;
        }

        self.current_pose = Some(pose);

        if self.state != CaptureState::Scanning {
            return None;
        }

        if quality == TrackingQuality::Lost {
            self.status.raise(StatusCondition::TrackingLost);
        } else {
            self.status.clear(StatusCondition::TrackingLost);
        }

        if let Some(initial) = self.initial_pose {
            let distance = pose.translational_distance_to(&initial);
            if distance > self.options.max_distance_from_initial_position_meters {
                self.status.raise(StatusCondition::ExploringTooFar);
            } else {
                self.status.clear(StatusCondition::ExploringTooFar);
            }
        }

        Some(self.gate.process(
            frame,
            pose,
            quality,
            rotation_speed_degrees,
            &mut self.keyframes,
        ))
    }

    /// Scanning -> Finalizing: extract the raw mesh once and submit the
    /// configured refinement jobs.
    pub fn finish_scan(
        &mut self,
        reconstructor: &mut dyn MeshReconstructor,
        scheduler: &mut FinalizationScheduler,
        hole_filler: Box<dyn MeshRefiner + Send>,
        colorizer: Box<dyn MeshRefiner + Send>,
    ) -> Result<(), SessionError> {
        if self.state != CaptureState::Scanning {
            return Err(SessionError::InvalidState {
                expected: CaptureState::Scanning,
                actual: self.state,
            });
        }

        let mesh = reconstructor.extract_mesh()?;
        info!(
            "Extracted mesh with {} vertices, {} keyframes retained",
            mesh.vertex_count(),
            self.keyframes.len()
        );

        self.pending_jobs.clear();
        if self.options.hole_filling_enabled {
            let handle = scheduler.submit(
                JobKind::HoleFilling,
                hole_filler,
                mesh.clone(),
                self.keyframes.to_vec(),
            )?;
            self.pending_jobs.push(handle);
        }
        if self.options.colorize_enabled {
            let handle = scheduler.submit(
                JobKind::Colorize,
                colorizer,
                mesh.clone(),
                self.keyframes.to_vec(),
            )?;
            self.pending_jobs.push(handle);
        }

        self.raw_mesh = Some(mesh);
        self.state = CaptureState::Finalizing;
        self.status.raise(StatusCondition::Finalizing);
        Ok(())
    }

    /// Poll the scheduler while Finalizing; once every submitted job is
    /// terminal, hand the best available meshes to the viewer and enter
    /// Viewing. Returns true on the transition. A failed job never blocks
    /// viewing.
    pub fn poll_finalization(
        &mut self,
        scheduler: &mut FinalizationScheduler,
        viewer: &mut dyn Viewer,
    ) -> bool {
        if self.state != CaptureState::Finalizing {
            return false;
        }
        if self
            .pending_jobs
            .iter()
            .any(|handle| !scheduler.poll(*handle).is_terminal())
        {
            return false;
        }

        let mut hole_filled = None;
        let mut colorized = None;
        for handle in self.pending_jobs.drain(..) {
            match scheduler.poll(handle) {
                JobStatus::Done => match scheduler.take(handle) {
                    Ok(mesh) => match handle.kind() {
                        JobKind::HoleFilling => hole_filled = Some(mesh),
                        JobKind::Colorize => colorized = Some(mesh),
                    },
                    Err(e) => warn!("Lost {:?} result: {}", handle.kind(), e),
                },
                JobStatus::Failed => {
                    if let Err(e) = scheduler.take(handle) {
                        warn!("{e}");
                    }
                }
                status => debug!("{:?} job settled as {:?}", handle.kind(), status),
            }
        }

        let outcome = FinalizeOutcome {
            raw: self.raw_mesh.take().unwrap_or_default(),
            hole_filled,
            colorized,
        };

        self.status.clear(StatusCondition::Finalizing);
        self.state = CaptureState::Viewing;
        info!(
            "Viewing {} vertices ({})",
            outcome.best().vertex_count(),
            if outcome.best().has_colors() {
                "colorized"
            } else {
                "uncolorized"
            }
        );
        viewer.present(outcome);
        true
    }

    /// Return to PoseInitialization from any state: cancel whatever is
    /// running, discard poses, keyframes, and the working volume.
    pub fn reset(&mut self, scheduler: &mut FinalizationScheduler) {
        scheduler.cancel_all();
        self.pending_jobs.clear();
        self.keyframes.clear();
        self.initial_pose = None;
        self.current_pose = None;
        self.raw_mesh = None;
        self.volume = self.initial_volume;
        self.status.clear_non_sticky();
        self.state = CaptureState::PoseInitialization;
        info!("Session reset");
    }

    /// The sensor vanished. During an active session this halts frame
    /// processing until recovery; the condition itself is sticky.
    pub fn sensor_disconnected(&mut self) {
        self.status.raise(StatusCondition::SensorDisconnected);
        if matches!(self.state, CaptureState::Scanning | CaptureState::Finalizing) {
            if !self.sensor_blocked {
                warn!("Sensor disconnected while {:?}; processing halted", self.state);
            }
            self.sensor_blocked = true;
        }
    }

    /// The sensor is streaming again; resume processing.
    pub fn sensor_reconnected(&mut self) {
        self.status.clear(StatusCondition::SensorDisconnected);
        if self.sensor_blocked {
            info!("Sensor reconnected; processing resumed");
            self.sensor_blocked = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::RefineError;
    use crate::finalize::CancelToken;
    use crate::keyframes::Keyframe;
    use glam::Quat;
    use roomscan_data::{ColorImage, DepthImage, Intrinsics};
    use std::time::Duration;

    fn frame(timestamp: f64) -> SensorFrame {
        SensorFrame {
            timestamp,
            color: ColorImage::new(2, 2, vec![0; 4], vec![128; 2]).unwrap(),
            depth: DepthImage::new(2, 2, vec![1.0; 4]).unwrap(),
            intrinsics: Intrinsics {
                width: 2,
                height: 2,
                fx: 2.0,
                fy: 2.0,
                cx: 1.0,
                cy: 1.0,
                k1: 0.0,
                k2: 0.0,
            },
            gravity: Vec3::NEG_Y,
        }
    }

    fn pose(yaw_degrees: f32, translation: Vec3) -> Pose {
        Pose::from_rotation_translation(
            Quat::from_rotation_y(yaw_degrees.to_radians()),
            translation,
        )
    }

    fn session() -> CaptureSession {
        CaptureSession::new(ScanOptions::default()).unwrap()
    }

    struct BoxReconstructor;

    impl MeshReconstructor for BoxReconstructor {
        fn extract_mesh(&mut self) -> Result<Mesh, TrackingError> {
            Ok(Mesh::new(
                vec![Vec3::ZERO, Vec3::X, Vec3::Y],
                vec![Vec3::Z; 3],
                vec![[0, 1, 2]],
            ))
        }
    }

    struct GrowRefiner;

    impl MeshRefiner for GrowRefiner {
        fn run(
            &self,
            mesh: &Mesh,
            _keyframes: &[Keyframe],
            _cancel: &CancelToken,
        ) -> Result<Mesh, RefineError> {
            let mut refined = mesh.clone();
            refined.positions.push(Vec3::ONE);
            refined.normals.push(Vec3::Z);
            Ok(refined)
        }
    }

    struct PaintRefiner;

    impl MeshRefiner for PaintRefiner {
        fn run(
            &self,
            mesh: &Mesh,
            _keyframes: &[Keyframe],
            _cancel: &CancelToken,
        ) -> Result<Mesh, RefineError> {
            Ok(mesh
                .clone()
                .with_colors(vec![Vec3::splat(0.5); mesh.vertex_count()]))
        }
    }

    struct FailingRefiner;

    impl MeshRefiner for FailingRefiner {
        fn run(
            &self,
            _mesh: &Mesh,
            _keyframes: &[Keyframe],
            _cancel: &CancelToken,
        ) -> Result<Mesh, RefineError> {
            Err(RefineError::Failed("texture atlas overflow".into()))
        }
    }

    #[derive(Default)]
    struct RecordingViewer {
        presented: Option<FinalizeOutcome>,
    }

    impl Viewer for RecordingViewer {
        fn present(&mut self, outcome: FinalizeOutcome) {
            self.presented = Some(outcome);
        }
    }

    fn finish(
        session: &mut CaptureSession,
        scheduler: &mut FinalizationScheduler,
        colorizer_fails: bool,
    ) -> RecordingViewer {
        let colorizer: Box<dyn MeshRefiner + Send> = if colorizer_fails {
            Box::new(FailingRefiner)
        } else {
            Box::new(PaintRefiner)
        };
        session
            .finish_scan(
                &mut BoxReconstructor,
                scheduler,
                Box::new(GrowRefiner),
                colorizer,
            )
            .unwrap();
        assert_eq!(session.state(), CaptureState::Finalizing);

        let mut viewer = RecordingViewer::default();
        for _ in 0..500 {
            if session.poll_finalization(scheduler, &mut viewer) {
                return viewer;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("finalization never settled");
    }

    #[test]
    fn test_volume_edits_only_before_scanning() {
        let mut session = session();
        session.set_volume_size(Vec3::new(5.0, 4.0, 5.0)).unwrap();

        session.begin_scanning(Pose::IDENTITY).unwrap();
        assert!(matches!(
            session.set_volume_size(Vec3::new(4.0, 4.0, 4.0)),
            Err(SessionError::VolumeLocked)
        ));
    }

    #[test]
    fn test_invalid_volume_keeps_pose_initialization() {
        let mut session = session();
        let result = session.set_volume_size(Vec3::new(6.0, 2.0, 6.0));
        assert!(matches!(result, Err(SessionError::Volume(_))));
        assert_eq!(session.state(), CaptureState::PoseInitialization);
        assert_eq!(session.volume().size_meters(), Vec3::new(6.0, 4.0, 6.0));
    }

    #[test]
    fn test_exploring_too_far_warns_without_state_change() {
        let mut session = session();
        session.begin_scanning(Pose::IDENTITY).unwrap();

        session.handle_tracked_frame(
            &frame(0.1),
            pose(0.0, Vec3::new(1.5, 0.0, 0.0)),
            TrackingQuality::Good,
            0.0,
        );
        assert_eq!(session.state(), CaptureState::Scanning);
        assert!(session.status().is_raised(StatusCondition::ExploringTooFar));

        session.handle_tracked_frame(
            &frame(0.2),
            pose(0.0, Vec3::new(0.2, 0.0, 0.0)),
            TrackingQuality::Good,
            0.0,
        );
        assert!(!session.status().is_raised(StatusCondition::ExploringTooFar));
    }

    #[test]
    fn test_tracking_lost_is_status_only() {
        let mut session = session();
        session.begin_scanning(Pose::IDENTITY).unwrap();

        let decision = session.handle_tracked_frame(
            &frame(0.1),
            pose(0.0, Vec3::ZERO),
            TrackingQuality::Lost,
            0.0,
        );
        assert!(!decision.unwrap().is_admitted());
        assert_eq!(session.state(), CaptureState::Scanning);
        assert!(session.status().is_raised(StatusCondition::TrackingLost));
    }

    #[test]
    fn test_full_session_reaches_viewing_with_colors() {
        let mut session = session();
        let mut scheduler = FinalizationScheduler::new();
        session.begin_scanning(Pose::IDENTITY).unwrap();
        session.handle_tracked_frame(
            &frame(0.1),
            pose(0.0, Vec3::ZERO),
            TrackingQuality::Good,
            0.0,
        );

        let viewer = finish(&mut session, &mut scheduler, false);
        assert_eq!(session.state(), CaptureState::Viewing);
        assert!(!session.status().is_raised(StatusCondition::Finalizing));

        let outcome = viewer.presented.unwrap();
        assert!(outcome.best().has_colors());
        assert!(outcome.hole_filled.is_some());
    }

    #[test]
    fn test_colorize_failure_falls_back_to_hole_filled() {
        let mut session = session();
        let mut scheduler = FinalizationScheduler::new();
        session.begin_scanning(Pose::IDENTITY).unwrap();

        let viewer = finish(&mut session, &mut scheduler, true);
        assert_eq!(session.state(), CaptureState::Viewing);

        let outcome = viewer.presented.unwrap();
        assert!(outcome.colorized.is_none());
        // The hole-filled mesh grew by one vertex over the raw mesh.
        assert_eq!(outcome.best().vertex_count(), outcome.raw.vertex_count() + 1);
    }

    #[test]
    fn test_reset_from_every_state() {
        let mut scheduler = FinalizationScheduler::new();

        // From Scanning.
        let mut session = session();
        session.begin_scanning(Pose::IDENTITY).unwrap();
        session.handle_tracked_frame(
            &frame(0.1),
            pose(0.0, Vec3::ZERO),
            TrackingQuality::Good,
            0.0,
        );
        session.reset(&mut scheduler);
        assert_eq!(session.state(), CaptureState::PoseInitialization);
        assert!(session.keyframes().is_empty());
        assert!(session.initial_pose().is_none());

        // From Viewing.
        session.begin_scanning(Pose::IDENTITY).unwrap();
        finish(&mut session, &mut scheduler, false);
        session.reset(&mut scheduler);
        assert_eq!(session.state(), CaptureState::PoseInitialization);

        // A fresh scan still works after the resets.
        session.begin_scanning(Pose::IDENTITY).unwrap();
        assert_eq!(session.state(), CaptureState::Scanning);
    }

    #[test]
    fn test_sensor_disconnect_blocks_processing() {
        let mut session = session();
        session.begin_scanning(Pose::IDENTITY).unwrap();

        session.sensor_disconnected();
        assert!(session.is_blocked());
        assert_eq!(
            session.status().current(),
            Some(StatusCondition::SensorDisconnected)
        );

        let decision = session.handle_tracked_frame(
            &frame(0.1),
            pose(25.0, Vec3::ZERO),
            TrackingQuality::Good,
            0.0,
        );
        assert!(decision.is_none());
        assert!(session.keyframes().is_empty());

        session.sensor_reconnected();
        assert!(!session.is_blocked());
        let decision = session.handle_tracked_frame(
            &frame(0.2),
            pose(25.0, Vec3::ZERO),
            TrackingQuality::Good,
            0.0,
        );
        assert!(decision.unwrap().is_admitted());
    }

    #[test]
    fn test_begin_scanning_requires_pose_initialization() {
        let mut session = session();
        session.begin_scanning(Pose::IDENTITY).unwrap();
        assert!(matches!(
            session.begin_scanning(Pose::IDENTITY),
            Err(SessionError::InvalidState { .. })
        ));
    }
}
