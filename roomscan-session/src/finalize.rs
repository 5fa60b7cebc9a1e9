//! Background finalization jobs: hole filling and colorization.
//!
//! Jobs run on their own worker threads, off the frame-processing path. The
//! per-kind slot behind a mutex is the only synchronization point between a
//! worker and the frame loop; results are consumed exactly once through
//! [`FinalizationScheduler::take`].

use crate::collaborators::MeshRefiner;
use crate::keyframes::Keyframe;
use roomscan_data::Mesh;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use thiserror::Error;
use tracing::{debug, info, warn};

/// The two finalization passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    HoleFilling,
    Colorize,
}

/// Lifecycle of a finalization job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Idle,
    Running,
    Done,
    Cancelled,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Cancelled | JobStatus::Failed)
    }
}

/// Handle to a submitted job. Stale handles (from before a newer submission
/// for the same kind) read as `Idle` and cannot consume results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobHandle {
    kind: JobKind,
    generation: u64,
}

impl JobHandle {
    pub fn kind(&self) -> JobKind {
        self.kind
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("a {0:?} job is already running")]
    AlreadyRunning(JobKind),

    #[error("the {0:?} result was already consumed")]
    AlreadyConsumed(JobKind),

    #[error("the {0:?} job has not finished")]
    NotFinished(JobKind),

    #[error("the {0:?} job failed: {1}")]
    JobFailed(JobKind, String),

    #[error("the {0:?} job was cancelled")]
    JobCancelled(JobKind),
}

/// Cooperative cancellation flag shared with a running refiner.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    status: JobStatus,
    result: Option<Mesh>,
    error: Option<String>,
    consumed: bool,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            generation: 0,
            status: JobStatus::Idle,
            result: None,
            error: None,
            consumed: false,
        }
    }
}

struct JobEntry {
    slot: Arc<Mutex<Slot>>,
    cancel: CancelToken,
}

impl Default for JobEntry {
    fn default() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::default())),
            cancel: CancelToken::new(),
        }
    }
}

// A worker can only panic inside the external refiner; recover the slot
// rather than poisoning every later poll.
fn lock_slot(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs mesh refinement passes as cancellable background jobs, at most one
/// Running job per kind.
#[derive(Default)]
pub struct FinalizationScheduler {
    hole_filling: JobEntry,
    colorize: JobEntry,
}

impl FinalizationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, kind: JobKind) -> &JobEntry {
        match kind {
            JobKind::HoleFilling => &self.hole_filling,
            JobKind::Colorize => &self.colorize,
        }
    }

    fn entry_mut(&mut self, kind: JobKind) -> &mut JobEntry {
        match kind {
            JobKind::HoleFilling => &mut self.hole_filling,
            JobKind::Colorize => &mut self.colorize,
        }
    }

    /// Start a refinement job on its own worker thread. Rejected when a job
    /// of the same kind is already running.
    pub fn submit(
        &mut self,
        kind: JobKind,
        refiner: Box<dyn MeshRefiner + Send>,
        mesh: Mesh,
        keyframes: Vec<Keyframe>,
    ) -> Result<JobHandle, SchedulerError> {
        let entry = self.entry_mut(kind);
        let generation = {
            let mut slot = lock_slot(&entry.slot);
            if slot.status == JobStatus::Running {
                return Err(SchedulerError::AlreadyRunning(kind));
            }
            slot.generation += 1;
            slot.status = JobStatus::Running;
            slot.result = None;
            slot.error = None;
            slot.consumed = false;
            slot.generation
        };

        entry.cancel = CancelToken::new();
        let cancel = entry.cancel.clone();
        let slot = Arc::clone(&entry.slot);

        info!(
            "Submitting {:?} job over {} keyframes ({} vertices)",
            kind,
            keyframes.len(),
            mesh.vertex_count()
        );

        thread::spawn(move || {
            let outcome = refiner.run(&mesh, &keyframes, &cancel);
            let mut slot = lock_slot(&slot);
            if slot.generation != generation {
                // Superseded while we were running; the result belongs to
                // nobody.
                return;
            }
            if cancel.is_cancelled() {
                slot.status = JobStatus::Cancelled;
                debug!("{:?} job acknowledged cancellation", kind);
                return;
            }
            match outcome {
                Ok(refined) => {
                    slot.result = Some(refined);
                    slot.status = JobStatus::Done;
                    debug!("{:?} job done", kind);
                }
                Err(e) => {
                    slot.error = Some(e.to_string());
                    slot.status = JobStatus::Failed;
                    warn!("{:?} job failed: {}", kind, e);
                }
            }
        });

        Ok(JobHandle { kind, generation })
    }

    /// Current status of a job. Stale handles read as `Idle`.
    pub fn poll(&self, handle: JobHandle) -> JobStatus {
        let slot = lock_slot(&self.entry(handle.kind).slot);
        if slot.generation != handle.generation {
            return JobStatus::Idle;
        }
        slot.status
    }

    /// Request cooperative cancellation. Safe to call at any time; a no-op
    /// when the job is not running.
    pub fn cancel(&self, handle: JobHandle) {
        let entry = self.entry(handle.kind);
        let slot = lock_slot(&entry.slot);
        if slot.generation == handle.generation && slot.status == JobStatus::Running {
            debug!("Cancelling {:?} job", handle.kind);
            entry.cancel.cancel();
        }
    }

    /// Cancel whatever is running, e.g. at session reset. No-op when idle.
    pub fn cancel_all(&self) {
        for kind in [JobKind::HoleFilling, JobKind::Colorize] {
            let entry = self.entry(kind);
            let slot = lock_slot(&entry.slot);
            if slot.status == JobStatus::Running {
                debug!("Cancelling {:?} job", kind);
                entry.cancel.cancel();
            }
        }
    }

    /// One-shot transfer of a finished job's mesh to the caller. The slot is
    /// cleared; a second take fails with `AlreadyConsumed`.
    pub fn take(&mut self, handle: JobHandle) -> Result<Mesh, SchedulerError> {
        let mut slot = lock_slot(&self.entry(handle.kind).slot);
        if slot.generation != handle.generation || slot.consumed {
            return Err(SchedulerError::AlreadyConsumed(handle.kind));
        }
        match slot.status {
            JobStatus::Done => {
                let mesh = slot.result.take();
                slot.consumed = true;
                slot.status = JobStatus::Idle;
                mesh.ok_or(SchedulerError::AlreadyConsumed(handle.kind))
            }
            JobStatus::Running | JobStatus::Idle => Err(SchedulerError::NotFinished(handle.kind)),
            JobStatus::Failed => Err(SchedulerError::JobFailed(
                handle.kind,
                slot.error.take().unwrap_or_default(),
            )),
            JobStatus::Cancelled => Err(SchedulerError::JobCancelled(handle.kind)),
        }
    }
}

impl Drop for FinalizationScheduler {
    fn drop(&mut self) {
        // Workers are detached; let them wind down on their own.
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::RefineError;
    use glam::Vec3;
    use std::time::Duration;

    fn mesh() -> Mesh {
        Mesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![Vec3::Z; 3], vec![[0, 1, 2]])
    }

    /// Returns a grown copy of the input after an optional delay.
    struct QuickRefiner;

    impl MeshRefiner for QuickRefiner {
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

    /// Spins until cancelled, then bails out cooperatively.
    struct CooperativeRefiner;

    impl MeshRefiner for CooperativeRefiner {
        fn run(
            &self,
            _mesh: &Mesh,
            _keyframes: &[Keyframe],
            cancel: &CancelToken,
        ) -> Result<Mesh, RefineError> {
            for _ in 0..10_000 {
                if cancel.is_cancelled() {
                    return Err(RefineError::Interrupted);
                }
                thread::sleep(Duration::from_millis(1));
            }
            Err(RefineError::Failed("never cancelled".into()))
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
            Err(RefineError::Failed("no keyframes cover the mesh".into()))
        }
    }

    fn wait_until_terminal(scheduler: &FinalizationScheduler, handle: JobHandle) -> JobStatus {
        for _ in 0..500 {
            let status = scheduler.poll(handle);
            if status.is_terminal() {
                return status;
            }
            thread::sleep(Duration::from_millis(2));
        }
        scheduler.poll(handle)
    }

    #[test]
    fn test_second_submit_rejected_while_running() {
        let mut scheduler = FinalizationScheduler::new();
        let handle = scheduler
            .submit(
                JobKind::HoleFilling,
                Box::new(CooperativeRefiner),
                mesh(),
                vec![],
            )
            .unwrap();

        let second = scheduler.submit(
            JobKind::HoleFilling,
            Box::new(QuickRefiner),
            mesh(),
            vec![],
        );
        assert!(matches!(
            second,
            Err(SchedulerError::AlreadyRunning(JobKind::HoleFilling))
        ));

        // The other kind is an independent slot.
        assert!(scheduler
            .submit(JobKind::Colorize, Box::new(QuickRefiner), mesh(), vec![])
            .is_ok());

        scheduler.cancel(handle);
        assert_eq!(wait_until_terminal(&scheduler, handle), JobStatus::Cancelled);
    }

    #[test]
    fn test_take_is_one_shot() {
        let mut scheduler = FinalizationScheduler::new();
        let handle = scheduler
            .submit(JobKind::Colorize, Box::new(QuickRefiner), mesh(), vec![])
            .unwrap();

        assert_eq!(wait_until_terminal(&scheduler, handle), JobStatus::Done);

        let refined = scheduler.take(handle).unwrap();
        assert_eq!(refined.vertex_count(), 4);

        assert!(matches!(
            scheduler.take(handle),
            Err(SchedulerError::AlreadyConsumed(JobKind::Colorize))
        ));
    }

    #[test]
    fn test_take_before_completion() {
        let mut scheduler = FinalizationScheduler::new();
        let handle = scheduler
            .submit(
                JobKind::HoleFilling,
                Box::new(CooperativeRefiner),
                mesh(),
                vec![],
            )
            .unwrap();

        assert!(matches!(
            scheduler.take(handle),
            Err(SchedulerError::NotFinished(JobKind::HoleFilling))
        ));

        scheduler.cancel(handle);
        wait_until_terminal(&scheduler, handle);
    }

    #[test]
    fn test_cancel_idle_is_noop() {
        let mut scheduler = FinalizationScheduler::new();
        let handle = scheduler
            .submit(JobKind::Colorize, Box::new(QuickRefiner), mesh(), vec![])
            .unwrap();
        wait_until_terminal(&scheduler, handle);
        scheduler.take(handle).unwrap();

        // The job settled long ago; cancelling must not disturb anything.
        scheduler.cancel(handle);
        scheduler.cancel_all();
        assert_eq!(scheduler.poll(handle), JobStatus::Idle);
    }

    #[test]
    fn test_cancelled_job_reports_cancelled() {
        let mut scheduler = FinalizationScheduler::new();
        let handle = scheduler
            .submit(
                JobKind::HoleFilling,
                Box::new(CooperativeRefiner),
                mesh(),
                vec![],
            )
            .unwrap();

        scheduler.cancel(handle);
        assert_eq!(wait_until_terminal(&scheduler, handle), JobStatus::Cancelled);
        assert!(matches!(
            scheduler.take(handle),
            Err(SchedulerError::JobCancelled(JobKind::HoleFilling))
        ));
    }

    #[test]
    fn test_failed_job_surfaces_error() {
        let mut scheduler = FinalizationScheduler::new();
        let handle = scheduler
            .submit(JobKind::Colorize, Box::new(FailingRefiner), mesh(), vec![])
            .unwrap();

        assert_eq!(wait_until_terminal(&scheduler, handle), JobStatus::Failed);
        match scheduler.take(handle) {
            Err(SchedulerError::JobFailed(JobKind::Colorize, message)) => {
                assert!(message.contains("no keyframes"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_slot_reusable_after_take() {
        let mut scheduler = FinalizationScheduler::new();
        let first = scheduler
            .submit(JobKind::Colorize, Box::new(QuickRefiner), mesh(), vec![])
            .unwrap();
        wait_until_terminal(&scheduler, first);
        scheduler.take(first).unwrap();

        let second = scheduler
            .submit(JobKind::Colorize, Box::new(QuickRefiner), mesh(), vec![])
            .unwrap();
        assert_eq!(wait_until_terminal(&scheduler, second), JobStatus::Done);
        // The superseded handle no longer observes the slot.
        assert_eq!(scheduler.poll(first), JobStatus::Idle);
        scheduler.take(second).unwrap();
    }
}
