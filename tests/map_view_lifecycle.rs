use mapview::prelude::*;
use mapview::MapError;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread::ThreadId;

// End-to-end lifecycle tests for the map view.
// Controllers here record every call so ordering and dispose routing can be
// checked from the outside.

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Init(String),
    Load(String),
    Dispose {
        scene: String,
        on_render_thread: bool,
        thread: ThreadId,
    },
    Ready {
        scene: String,
        surface_attached: bool,
    },
}

type Journal = Arc<Mutex<Vec<Entry>>>;

struct RecordingController {
    surface: SurfaceHandle,
    scene: String,
    gate: Option<Receiver<()>>,
    journal: Journal,
    disposals: AtomicUsize,
}

impl MapController for RecordingController {
    fn init(&self) -> mapview::Result<()> {
        if let Some(gate) = &self.gate {
            let _ = gate.recv_timeout(TIMEOUT);
        }
        self.journal
            .lock()
            .unwrap()
            .push(Entry::Init(self.scene.clone()));
        Ok(())
    }

    fn load_scene_file(&self, path: &str) -> mapview::Result<()> {
        self.journal
            .lock()
            .unwrap()
            .push(Entry::Load(path.to_string()));
        Ok(())
    }

    fn dispose(&self) {
        self.disposals.fetch_add(1, Ordering::SeqCst);
        self.journal.lock().unwrap().push(Entry::Dispose {
            scene: self.scene.clone(),
            on_render_thread: self.surface.is_render_thread(),
            thread: std::thread::current().id(),
        });
    }

    fn surface(&self) -> &SurfaceHandle {
        &self.surface
    }
}

/// Factory that keeps every controller it builds and, when gated, holds
/// each controller's `init` until the test opens its gate.
#[derive(Clone)]
struct Recorder {
    gated: bool,
    journal: Journal,
    controllers: Arc<Mutex<Vec<Arc<RecordingController>>>>,
    gates: Arc<Mutex<Vec<Sender<()>>>>,
}

impl Recorder {
    fn new(gated: bool) -> Self {
        Self {
            gated,
            journal: Arc::new(Mutex::new(Vec::new())),
            controllers: Arc::new(Mutex::new(Vec::new())),
            gates: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn open(&self, index: usize) {
        let _ = self.gates.lock().unwrap()[index].send(());
    }

    fn controller(&self, index: usize) -> Arc<RecordingController> {
        self.controllers.lock().unwrap()[index].clone()
    }

    fn disposals(&self, index: usize) -> usize {
        self.controller(index).disposals.load(Ordering::SeqCst)
    }

    fn entries(&self) -> Vec<Entry> {
        self.journal.lock().unwrap().clone()
    }

    fn dispose_entry(&self, scene: &str) -> Option<(bool, ThreadId)> {
        self.entries().into_iter().find_map(|entry| match entry {
            Entry::Dispose {
                scene: s,
                on_render_thread,
                thread,
            } if s == scene => Some((on_render_thread, thread)),
            _ => None,
        })
    }
}

impl ControllerFactory for Recorder {
    fn create(&self, surface: SurfaceHandle, scene_path: &str) -> mapview::Result<ControllerRef> {
        let gate = if self.gated {
            let (tx, rx) = unbounded();
            self.gates.lock().unwrap().push(tx);
            Some(rx)
        } else {
            None
        };
        let controller = Arc::new(RecordingController {
            surface,
            scene: scene_path.to_string(),
            gate,
            journal: self.journal.clone(),
            disposals: AtomicUsize::new(0),
        });
        self.controllers.lock().unwrap().push(controller.clone());
        Ok(controller)
    }
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn view_with(recorder: &Recorder) -> MapView {
    init_logging();
    let context =
        ViewContext::new(recorder.clone()).with_executor(Arc::new(ThreadExecutor::default()));
    MapView::new(context).unwrap()
}

/// Callback that journals readiness together with the surface state
fn journaling_callback(
    journal: Journal,
    fired: Rc<RefCell<usize>>,
) -> impl FnOnce(&mut MapView, ControllerRef) + 'static {
    move |view: &mut MapView, _controller: ControllerRef| {
        *fired.borrow_mut() += 1;
        journal.lock().unwrap().push(Entry::Ready {
            scene: view.scene_path().unwrap_or_default().to_string(),
            surface_attached: view.is_surface_attached(),
        });
    }
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn test_happy_path_delivers_controller_after_init_and_scene_load() {
    let recorder = Recorder::new(false);
    let mut view = view_with(&recorder);
    let fired = Rc::new(RefCell::new(0));

    view.get_map_async(
        journaling_callback(recorder.journal.clone(), fired.clone()),
        "scene.yaml",
    )
    .unwrap();
    assert!(view.wait_for_event(TIMEOUT).unwrap());

    assert_eq!(*fired.borrow(), 1);
    assert_eq!(
        recorder.entries(),
        vec![
            Entry::Init("scene.yaml".to_string()),
            Entry::Load("scene.yaml".to_string()),
            Entry::Ready {
                scene: "scene.yaml".to_string(),
                surface_attached: true,
            },
        ]
    );
    assert_eq!(view.state(), MapViewState::Ready);
    assert!(view.is_surface_attached());
}

#[test]
fn test_teardown_during_init_never_attaches_or_calls_back() {
    let recorder = Recorder::new(true);
    let mut view = view_with(&recorder);
    let fired = Rc::new(RefCell::new(0));

    view.get_map_async(
        journaling_callback(recorder.journal.clone(), fired.clone()),
        "scene.yaml",
    )
    .unwrap();
    view.on_destroy();
    assert_eq!(view.state(), MapViewState::Idle);
    assert!(view.controller().is_none());

    recorder.open(0);
    assert!(wait_until(|| recorder.disposals(0) == 1));
    assert!(!view.wait_for_event(Duration::from_millis(50)).unwrap());

    assert_eq!(*fired.borrow(), 0);
    assert!(!view.is_surface_attached());
    assert_eq!(recorder.disposals(0), 1);

    // Disposed by the cancelled branch on the worker: not the UI thread, not
    // the render thread
    let (on_render_thread, thread) = recorder.dispose_entry("scene.yaml").unwrap();
    assert!(!on_render_thread);
    assert_ne!(thread, std::thread::current().id());
}

#[test]
fn test_second_request_replaces_first() {
    let recorder = Recorder::new(true);
    let mut view = view_with(&recorder);
    let first_fired = Rc::new(RefCell::new(0));
    let second_fired = Rc::new(RefCell::new(0));

    view.get_map_async(
        journaling_callback(recorder.journal.clone(), first_fired.clone()),
        "a.yaml",
    )
    .unwrap();
    view.get_map_async(
        journaling_callback(recorder.journal.clone(), second_fired.clone()),
        "b.yaml",
    )
    .unwrap();
    assert_eq!(view.state(), MapViewState::Initializing { task: 2 });

    recorder.open(0);
    recorder.open(1);
    assert!(view.wait_for_event(TIMEOUT).unwrap());

    assert_eq!(*first_fired.borrow(), 0);
    assert_eq!(*second_fired.borrow(), 1);
    assert!(wait_until(|| recorder.disposals(0) == 1));
    assert_eq!(recorder.disposals(1), 0);

    let entries = recorder.entries();
    assert!(entries.contains(&Entry::Load("b.yaml".to_string())));
    assert!(entries.contains(&Entry::Ready {
        scene: "b.yaml".to_string(),
        surface_attached: true,
    }));
    assert!(!entries
        .iter()
        .any(|e| matches!(e, Entry::Ready { scene, .. } if scene == "a.yaml")));
    assert_eq!(view.scene_path(), Some("b.yaml"));
}

#[test]
fn test_teardown_after_init_disposes_on_render_thread() {
    let recorder = Recorder::new(false);
    let mut view = view_with(&recorder);
    view.get_map_async(|_, _| {}, "scene.yaml").unwrap();
    assert!(view.wait_for_event(TIMEOUT).unwrap());

    // Hold the render thread so the field state can be checked before the
    // queued dispose runs
    let (release, hold) = unbounded::<()>();
    view.surface()
        .queue_event(Box::new(move || {
            let _ = hold.recv_timeout(TIMEOUT);
        }))
        .unwrap();

    view.on_destroy();
    assert!(view.controller().is_none());
    assert_eq!(view.state(), MapViewState::Idle);
    assert_eq!(recorder.disposals(0), 0);

    release.send(()).unwrap();
    assert!(view.surface().handle().flush(TIMEOUT).unwrap());
    assert_eq!(recorder.disposals(0), 1);

    let (on_render_thread, thread) = recorder.dispose_entry("scene.yaml").unwrap();
    assert!(on_render_thread);
    assert_eq!(Some(thread), view.surface().render_thread_id());
}

#[test]
fn test_double_teardown_disposes_once() {
    let recorder = Recorder::new(false);
    let mut view = view_with(&recorder);
    view.get_map_async(|_, _| {}, "scene.yaml").unwrap();
    assert!(view.wait_for_event(TIMEOUT).unwrap());

    view.on_destroy();
    view.on_destroy();
    view.dispose_map();
    assert!(view.surface().handle().flush(TIMEOUT).unwrap());

    assert_eq!(recorder.disposals(0), 1);
    assert_eq!(view.state(), MapViewState::Idle);
}

#[test]
fn test_surface_configuration() {
    let recorder = Recorder::new(false);
    let view = view_with(&recorder);
    let config = view.surface().config();

    assert_eq!(config.pixel_format.as_tuple(), (8, 8, 8, 0, 16, 0));
    assert_eq!(config.client_version, 2);
    assert!(config.preserve_context_on_pause);
    assert!(!view.is_surface_attached());
}

#[test]
fn test_every_controller_disposed_exactly_once_under_churn() {
    let recorder = Recorder::new(false);
    let mut view = view_with(&recorder);

    for i in 0..20 {
        view.get_map_async(|_, _| {}, &format!("scene-{i}.yaml"))
            .unwrap();
        if i % 3 == 0 {
            let _ = view.wait_for_event(TIMEOUT).unwrap();
        } else if i % 5 == 0 {
            std::thread::sleep(Duration::from_millis(5));
            view.process_events();
        }
    }
    view.on_destroy();
    drop(view);

    let count = recorder.controllers.lock().unwrap().len();
    assert_eq!(count, 20);
    assert!(wait_until(|| (0..count).all(|i| recorder.disposals(i) >= 1)));
    std::thread::sleep(Duration::from_millis(20));
    for i in 0..count {
        assert_eq!(recorder.disposals(i), 1, "controller {i}");
    }
}

#[test]
fn test_init_failure_is_reported_and_disposed() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let context = ViewContext::new(HeadlessControllerFactory::with_asset_root(dir.path()))
        .with_executor(Arc::new(ThreadExecutor::default()));
    let mut view = MapView::new(context).unwrap();

    struct ErrorProbe(Rc<RefCell<Option<bool>>>);

    impl OnMapReadyCallback for ErrorProbe {
        fn on_map_ready(self: Box<Self>, _: &mut MapView, _: ControllerRef) {
            *self.0.borrow_mut() = Some(true);
        }

        fn on_map_error(self: Box<Self>, _: &mut MapView, error: MapError) {
            assert!(matches!(error, MapError::SceneLoad { .. }));
            *self.0.borrow_mut() = Some(false);
        }
    }

    let outcome = Rc::new(RefCell::new(None));
    view.get_map_async_with(ErrorProbe(outcome.clone()), "absent.yaml")
        .unwrap();
    assert!(view.wait_for_event(TIMEOUT).unwrap());

    assert_eq!(*outcome.borrow(), Some(false));
    assert!(!view.is_surface_attached());
    assert_eq!(view.state(), MapViewState::Idle);

    // The view recovers with a scene that exists
    std::fs::write(dir.path().join("scene.yaml"), "layers: {}\n").unwrap();
    view.get_map_async(|_, _| {}, "scene.yaml").unwrap();
    assert!(view.wait_for_event(TIMEOUT).unwrap());
    assert!(view.is_surface_attached());
}

#[cfg(feature = "tokio-runtime")]
#[tokio::test(flavor = "multi_thread")]
async fn test_tokio_executor_drives_init() {
    init_logging();
    let recorder = Recorder::new(false);
    let context =
        ViewContext::new(recorder.clone()).with_executor(Arc::new(TokioExecutor::current().unwrap()));
    let mut view = MapView::new(context).unwrap();
    let fired = Rc::new(RefCell::new(0));

    view.get_map_async(
        journaling_callback(recorder.journal.clone(), fired.clone()),
        "scene.yaml",
    )
    .unwrap();
    assert!(view.wait_for_event(TIMEOUT).unwrap());

    assert_eq!(*fired.borrow(), 1);
    assert!(view.is_surface_attached());
}

#[cfg(feature = "tokio-runtime")]
#[test]
fn test_stopped_tokio_runtime_fails_init_and_disposes() {
    let recorder = Recorder::new(false);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .build()
        .unwrap();
    let handle = runtime.handle().clone();
    drop(runtime);

    init_logging();
    let context = ViewContext::new(recorder.clone())
        .with_executor(Arc::new(TokioExecutor::new(handle)));
    let mut view = MapView::new(context).unwrap();
    let fired = Rc::new(RefCell::new(0));

    view.get_map_async(
        journaling_callback(recorder.journal.clone(), fired.clone()),
        "scene.yaml",
    )
    .unwrap();
    assert!(view.wait_for_event(TIMEOUT).unwrap());

    assert_eq!(*fired.borrow(), 0);
    assert_eq!(view.state(), MapViewState::Idle);
    assert!(!view.is_surface_attached());

    view.on_destroy();
    assert!(view.surface().handle().flush(TIMEOUT).unwrap());
    assert_eq!(recorder.disposals(0), 1);
    let (on_render_thread, _) = recorder.dispose_entry("scene.yaml").unwrap();
    assert!(on_render_thread);
}
