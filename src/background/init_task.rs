use crate::controller::ControllerRef;
use crate::runtime::BackgroundExecutor;
use crate::{MapError, Result};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Unique identifier for init tasks, increasing per view
pub type TaskId = u64;

/// Where an [`InitTask`] is in its one-shot lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskPhase {
    /// Background steps have not finished yet
    Running = 0,
    /// Both steps succeeded and the ready event was posted
    Completed = 1,
    /// A step failed; the controller was disposed on the worker
    Failed = 2,
    /// Cancellation won; the controller is disposed by the cancelled branch
    Cancelled = 3,
}

impl TaskPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Completed,
            2 => Self::Failed,
            _ => Self::Cancelled,
        }
    }
}

/// Terminal result of the background steps, delivered to the UI context
pub(crate) enum InitOutcome {
    Ready(ControllerRef),
    Failed(MapError),
}

/// Message posted from the worker to the view's UI queue
pub(crate) struct InitEvent {
    pub task_id: TaskId,
    pub outcome: InitOutcome,
}

#[derive(Debug)]
struct TaskShared {
    phase: AtomicU8,
    finished: AtomicBool,
}

impl TaskShared {
    fn transition(&self, from: TaskPhase, to: TaskPhase) -> std::result::Result<(), TaskPhase> {
        self.phase
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(TaskPhase::from_u8)
    }

    fn phase(&self) -> TaskPhase {
        TaskPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }
}

/// One-shot background initialization of a controller.
///
/// The worker calls `init` then `load_scene_file` on the controller captured
/// at start, then settles the task phase. Cancellation is cooperative: it is
/// observed once the blocking steps return, never in the middle of one.
/// Whichever side loses the phase race leaves the controller alone, so the
/// captured controller is disposed exactly once and never on the UI thread.
pub struct InitTask {
    id: TaskId,
    scene_path: String,
    controller: ControllerRef,
    shared: Arc<TaskShared>,
    executor: Arc<dyn BackgroundExecutor>,
}

impl std::fmt::Debug for InitTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitTask")
            .field("id", &self.id)
            .field("scene_path", &self.scene_path)
            .field("phase", &self.phase())
            .field("executor", &self.executor.name())
            .finish()
    }
}

impl InitTask {
    /// Hand the init steps for `controller` to `executor`.
    pub(crate) fn start(
        id: TaskId,
        controller: ControllerRef,
        scene_path: String,
        executor: Arc<dyn BackgroundExecutor>,
        events: Sender<InitEvent>,
    ) -> Result<Self> {
        let shared = Arc::new(TaskShared {
            phase: AtomicU8::new(TaskPhase::Running as u8),
            finished: AtomicBool::new(false),
        });

        let job = InitJob {
            id,
            controller: controller.clone(),
            scene_path: scene_path.clone(),
            shared: shared.clone(),
            events,
            started: false,
        };
        if let Err(e) = executor.execute(Box::new(move || job.run())) {
            // A dropped job may already have settled the task
            if shared.transition(TaskPhase::Running, TaskPhase::Failed).is_ok() {
                Self::release_on_render_thread(id, &controller);
            }
            shared.finished.store(true, Ordering::SeqCst);
            return Err(e);
        }

        log::debug!(
            "init task {} started for '{}' on {} executor",
            id,
            scene_path,
            executor.name()
        );

        Ok(Self {
            id,
            scene_path,
            controller,
            shared,
            executor,
        })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Scene path captured when the task was created
    pub fn scene_path(&self) -> &str {
        &self.scene_path
    }

    pub fn controller(&self) -> &ControllerRef {
        &self.controller
    }

    pub fn phase(&self) -> TaskPhase {
        self.shared.phase()
    }

    pub fn is_cancelled(&self) -> bool {
        self.phase() == TaskPhase::Cancelled
    }

    /// Whether the worker has returned
    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::SeqCst)
    }

    /// Request cancellation. Returns `true` if this call cancelled the task.
    ///
    /// A running task disposes its controller on the worker after the current
    /// step returns. A task whose ready event is posted but not yet dispatched
    /// gets its cancelled branch scheduled on the executor instead.
    pub fn cancel(&self) -> bool {
        match self.shared.transition(TaskPhase::Running, TaskPhase::Cancelled) {
            Ok(()) => {
                log::debug!("init task {} cancelled while running", self.id);
                true
            }
            Err(TaskPhase::Completed) => {
                if self
                    .shared
                    .transition(TaskPhase::Completed, TaskPhase::Cancelled)
                    .is_err()
                {
                    return false;
                }
                log::debug!(
                    "init task {} cancelled after completion, disposing off the UI thread",
                    self.id
                );
                self.dispose_after_completion();
                true
            }
            Err(phase) => {
                log::debug!("init task {} already settled as {:?}", self.id, phase);
                false
            }
        }
    }

    fn dispose_after_completion(&self) {
        let id = self.id;
        let controller = self.controller.clone();
        let job = Box::new(move || Self::cancelled_branch(id, &controller));

        if let Err(e) = self.executor.execute(job) {
            // The controller is initialized but was never shown, the render
            // thread is the other place it may be released
            log::warn!("init task {id}: {e}, disposing on the render thread");
            Self::release_on_render_thread(id, &self.controller);
        }
    }

    fn release_on_render_thread(id: TaskId, controller: &ControllerRef) {
        let target = controller.clone();
        if let Err(e) = controller.queue_event(Box::new(move || target.dispose())) {
            log::error!("init task {id}: controller leaked: {e}");
        }
    }

    fn cancelled_branch(id: TaskId, controller: &ControllerRef) {
        log::debug!("init task {id}: cancelled branch disposing controller");
        controller.dispose();
    }

    fn run(
        id: TaskId,
        controller: &ControllerRef,
        scene_path: &str,
        shared: &TaskShared,
        events: &Sender<InitEvent>,
    ) {
        let result = controller
            .init()
            .and_then(|()| controller.load_scene_file(scene_path));

        match result {
            Ok(()) => match shared.transition(TaskPhase::Running, TaskPhase::Completed) {
                Ok(()) => {
                    log::debug!("init task {id}: controller ready for '{scene_path}'");
                    let ready = InitEvent {
                        task_id: id,
                        outcome: InitOutcome::Ready(controller.clone()),
                    };
                    if events.send(ready).is_err()
                        && shared
                            .transition(TaskPhase::Completed, TaskPhase::Cancelled)
                            .is_ok()
                    {
                        log::debug!("init task {id}: view is gone");
                        Self::cancelled_branch(id, controller);
                    }
                }
                Err(_) => Self::cancelled_branch(id, controller),
            },
            Err(error) => {
                log::warn!("init task {id}: failed for '{scene_path}': {error}");
                match shared.transition(TaskPhase::Running, TaskPhase::Failed) {
                    Ok(()) => {
                        controller.dispose();
                        let _ = events.send(InitEvent {
                            task_id: id,
                            outcome: InitOutcome::Failed(error),
                        });
                    }
                    Err(_) => Self::cancelled_branch(id, controller),
                }
            }
        }

        shared.finished.store(true, Ordering::SeqCst);
    }
}

/// The worker half of an [`InitTask`], owned by the executor.
///
/// An executor may drop a job without running it (a runtime that is shutting
/// down, a failed thread spawn). Dropping an unstarted job settles the task as
/// failed and releases the controller on the render thread.
struct InitJob {
    id: TaskId,
    controller: ControllerRef,
    scene_path: String,
    shared: Arc<TaskShared>,
    events: Sender<InitEvent>,
    started: bool,
}

impl InitJob {
    fn run(mut self) {
        self.started = true;
        InitTask::run(
            self.id,
            &self.controller,
            &self.scene_path,
            &self.shared,
            &self.events,
        );
    }
}

impl Drop for InitJob {
    fn drop(&mut self) {
        if self.started {
            return;
        }

        let id = self.id;
        log::warn!("init task {id}: dropped by the executor before running");
        match self.shared.transition(TaskPhase::Running, TaskPhase::Failed) {
            Ok(()) => {
                InitTask::release_on_render_thread(id, &self.controller);
                let _ = self.events.send(InitEvent {
                    task_id: id,
                    outcome: InitOutcome::Failed(MapError::Executor(
                        "init job dropped before it ran".to_string(),
                    )),
                });
            }
            // Cancelled while queued, disposal was left to this job
            Err(TaskPhase::Cancelled) => InitTask::release_on_render_thread(id, &self.controller),
            Err(_) => {}
        }
        self.shared.finished.store(true, Ordering::SeqCst);
    }
}
