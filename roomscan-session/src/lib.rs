//! Roomscan Session - capture orchestration
//!
//! The orchestration layer of a room-scanning session: the four-state
//! capture state machine, the keyframe admission policy, the single-message
//! status surface, and the background finalization scheduler. The SLAM
//! tracker, the mesh reconstructor, and the refinement passes remain
//! external collaborators behind traits.

pub mod collaborators;
pub mod finalize;
pub mod gate;
pub mod keyframes;
pub mod machine;
pub mod options;
pub mod status;

pub use collaborators::{
    FinalizeOutcome, MeshReconstructor, MeshRefiner, RefineError, TrackingAdapter, TrackingError,
    TrackingQuality, Viewer,
};
pub use finalize::{
    CancelToken, FinalizationScheduler, JobHandle, JobKind, JobStatus, SchedulerError,
};
pub use gate::{GateDecision, KeyframeGate, RejectReason};
pub use keyframes::{Keyframe, KeyframeSet};
pub use machine::{CaptureSession, CaptureState, SessionError};
pub use options::{ConfigError, ScanOptions};
pub use status::{StatusArbiter, StatusCondition};
