use super::{AttributeSet, OnMapReadyCallback, SavedState, ViewContext};
use crate::background::init_task::{InitEvent, InitOutcome, InitTask, TaskId};
use crate::controller::ControllerRef;
use crate::core::config::MapViewConfig;
use crate::surface::Surface;
use crate::{MapError, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::marker::PhantomData;
use std::time::{Duration, Instant};

/// Which controller lifecycle stage the view is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapViewState {
    /// No controller.
    Idle,
    /// A controller exists and its init task is in flight.
    Initializing { task: TaskId },
    /// An initialized controller was delivered and no task is in flight.
    Ready,
}

struct PendingInit {
    task: InitTask,
    callback: Box<dyn OnMapReadyCallback>,
}

/// A container view that owns a render [`Surface`] and at most one map
/// controller.
///
/// The surface is created with the view but only inserted into it once a
/// controller has finished initializing, so the first visible frame belongs
/// to a loaded scene. Worker results come back through a queue the host
/// drains on its UI thread with [`MapView::process_events`] or
/// [`MapView::wait_for_event`].
///
/// A `MapView` lives on the UI thread that created it:
///
/// ```compile_fail
/// use mapview::{HeadlessControllerFactory, MapView, ViewContext};
///
/// fn assert_send<T: Send>(_: T) {}
///
/// let view = MapView::new(ViewContext::new(HeadlessControllerFactory::new())).unwrap();
/// assert_send(view);
/// ```
pub struct MapView {
    context: ViewContext,
    attributes: AttributeSet,
    surface: Surface,
    surface_attached: bool,
    controller: Option<ControllerRef>,
    scene_path: Option<String>,
    pending: Option<PendingInit>,
    events_tx: Sender<InitEvent>,
    events_rx: Receiver<InitEvent>,
    next_task_id: TaskId,
    _ui_thread: PhantomData<*const ()>,
}

impl MapView {
    /// Create a view and its configured surface.
    pub fn new(context: ViewContext) -> Result<Self> {
        Self::with_attributes(context, AttributeSet::default())
    }

    /// Create a view from layout attributes. The attributes are kept but do
    /// not change behavior.
    pub fn with_attributes(context: ViewContext, attributes: AttributeSet) -> Result<Self> {
        if !attributes.is_empty() {
            log::debug!("map view attributes: {:?}", attributes);
        }

        let surface = Surface::new(context.config().surface_config())?;
        let (events_tx, events_rx) = unbounded();

        Ok(Self {
            context,
            attributes,
            surface,
            surface_attached: false,
            controller: None,
            scene_path: None,
            pending: None,
            events_tx,
            events_rx,
            next_task_id: 1,
            _ui_thread: PhantomData,
        })
    }

    /// Build a controller for `scene_path` in the background and hand it to
    /// `callback` on the UI thread.
    ///
    /// Any previous map is disposed first. If a previous request is still
    /// initializing, its callback never runs.
    pub fn get_map_async<F>(&mut self, callback: F, scene_path: &str) -> Result<()>
    where
        F: FnOnce(&mut MapView, ControllerRef) + 'static,
    {
        self.start_map(Box::new(callback), scene_path)
    }

    /// Like [`MapView::get_map_async`] for callbacks that also want to hear
    /// about init failures.
    pub fn get_map_async_with<C>(&mut self, callback: C, scene_path: &str) -> Result<()>
    where
        C: OnMapReadyCallback + 'static,
    {
        self.start_map(Box::new(callback), scene_path)
    }

    fn start_map(&mut self, callback: Box<dyn OnMapReadyCallback>, scene_path: &str) -> Result<()> {
        if scene_path.is_empty() {
            return Err(MapError::InvalidScenePath);
        }

        self.dispose_map();

        let controller = self
            .context
            .factory()
            .create(self.surface.handle(), scene_path)?;

        let task_id = self.next_task_id;
        self.next_task_id += 1;

        let task = match InitTask::start(
            task_id,
            controller.clone(),
            scene_path.to_string(),
            self.context.executor(),
            self.events_tx.clone(),
        ) {
            Ok(task) => task,
            Err(e) => {
                // The task has already released the controller on the render
                // thread
                log::error!("could not start init task for '{}': {}", scene_path, e);
                return Err(e);
            }
        };

        log::info!("requested map for '{}' (task {})", scene_path, task_id);
        self.controller = Some(controller);
        self.scene_path = Some(scene_path.to_string());
        self.pending = Some(PendingInit { task, callback });
        Ok(())
    }

    /// Release the current controller, if any.
    ///
    /// An initializing controller is cancelled and disposed by its init task
    /// off the UI thread. A ready controller is disposed on the render thread
    /// and the surface is removed from the view. Calling this again without a
    /// new request does nothing.
    pub fn dispose_map(&mut self) {
        if let Some(pending) = self.pending.take() {
            log::debug!("cancelling init task {}", pending.task.id());
            pending.task.cancel();
        } else if let Some(controller) = self.controller.as_ref() {
            log::debug!("queueing controller dispose on the render thread");
            let target = controller.clone();
            if let Err(e) = controller.queue_event(Box::new(move || target.dispose())) {
                log::error!("could not queue controller dispose: {}", e);
            }
            self.detach_surface();
        }

        self.controller = None;
        self.pending = None;
        self.scene_path = None;
    }

    /// Dispatch every worker result that has arrived. Returns how many were
    /// delivered to callbacks.
    pub fn process_events(&mut self) -> usize {
        let mut dispatched = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            if self.dispatch(event) {
                dispatched += 1;
            }
        }
        dispatched
    }

    /// Block for up to `timeout` until a worker result is delivered to a
    /// callback. Stale results are dropped without ending the wait.
    pub fn wait_for_event(&mut self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events_rx.recv_timeout(remaining) {
                Ok(event) => {
                    if self.dispatch(event) {
                        return Ok(true);
                    }
                }
                Err(RecvTimeoutError::Timeout) => return Ok(false),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(MapError::Executor("init event queue closed".to_string()))
                }
            }
        }
    }

    fn dispatch(&mut self, event: InitEvent) -> bool {
        let current = self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.task.id() == event.task_id);
        if !current {
            log::debug!("dropping stale result of init task {}", event.task_id);
            return false;
        }

        let Some(pending) = self.pending.take() else {
            return false;
        };

        match event.outcome {
            InitOutcome::Ready(controller) => {
                self.attach_surface();
                log::info!("map ready for '{}'", pending.task.scene_path());
                pending.callback.on_map_ready(self, controller);
            }
            InitOutcome::Failed(error) => {
                self.controller = None;
                self.scene_path = None;
                pending.callback.on_map_error(self, error);
            }
        }
        true
    }

    fn attach_surface(&mut self) {
        if !self.surface_attached {
            self.surface_attached = true;
            log::debug!("surface attached to map view");
        }
    }

    fn detach_surface(&mut self) {
        if self.surface_attached {
            self.surface_attached = false;
            log::debug!("surface detached from map view");
        }
    }

    pub fn state(&self) -> MapViewState {
        match (&self.pending, &self.controller) {
            (Some(pending), _) => MapViewState::Initializing {
                task: pending.task.id(),
            },
            (None, Some(_)) => MapViewState::Ready,
            (None, None) => MapViewState::Idle,
        }
    }

    /// The current controller, initialized or not.
    pub fn controller(&self) -> Option<&ControllerRef> {
        self.controller.as_ref()
    }

    /// Scene path of the current controller.
    pub fn scene_path(&self) -> Option<&str> {
        self.scene_path.as_deref()
    }

    /// Whether the surface is currently a child of this view.
    pub fn is_surface_attached(&self) -> bool {
        self.surface_attached
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    pub fn config(&self) -> &MapViewConfig {
        self.context.config()
    }

    /// Forward from the host's corresponding lifecycle method.
    pub fn on_create(&mut self, saved_state: Option<&SavedState>) {
        log::debug!(
            "on_create ({} saved entries)",
            saved_state.map_or(0, |state| state.len())
        );
    }

    /// Forward from the host's corresponding lifecycle method.
    pub fn on_resume(&mut self) {
        log::debug!("on_resume");
    }

    /// Forward from the host's corresponding lifecycle method.
    pub fn on_pause(&mut self) {
        log::debug!("on_pause");
    }

    /// Forward from the host's corresponding lifecycle method. Disposes the
    /// map.
    pub fn on_destroy(&mut self) {
        log::debug!("on_destroy");
        self.dispose_map();
    }

    /// Forward from the host's corresponding lifecycle method.
    pub fn on_low_memory(&mut self) {
        log::debug!("on_low_memory");
    }
}

impl Drop for MapView {
    fn drop(&mut self) {
        self.dispose_map();
    }
}
