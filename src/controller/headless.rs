use super::{ControllerFactory, ControllerRef, MapController};
use crate::surface::SurfaceHandle;
use crate::{MapError, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Lifecycle of a [`HeadlessController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Created,
    Initialized,
    SceneLoaded,
    Disposed,
}

#[derive(Debug)]
struct HeadlessInner {
    state: ControllerState,
    loaded_scene: Option<String>,
    scene_bytes: usize,
    disposed_on_render_thread: Option<bool>,
}

/// A GPU-less controller that tracks its lifecycle.
///
/// Useful for running a view without a graphics driver (servers, CI, the demo
/// binary). When an asset root is given, scene paths are resolved against it
/// and the scene file is read from disk during `load_scene_file`.
#[derive(Debug)]
pub struct HeadlessController {
    surface: SurfaceHandle,
    scene_path: String,
    asset_root: Option<PathBuf>,
    inner: Mutex<HeadlessInner>,
    dispose_count: AtomicUsize,
}

impl HeadlessController {
    pub fn new(surface: SurfaceHandle, scene_path: impl Into<String>) -> Self {
        Self {
            surface,
            scene_path: scene_path.into(),
            asset_root: None,
            inner: Mutex::new(HeadlessInner {
                state: ControllerState::Created,
                loaded_scene: None,
                scene_bytes: 0,
                disposed_on_render_thread: None,
            }),
            dispose_count: AtomicUsize::new(0),
        }
    }

    /// Resolve scene paths against `root` and read them from disk.
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = Some(root.into());
        self
    }

    /// Scene path this controller was created for.
    pub fn scene_path(&self) -> &str {
        &self.scene_path
    }

    pub fn state(&self) -> ControllerState {
        self.inner
            .lock()
            .map(|inner| inner.state)
            .unwrap_or(ControllerState::Disposed)
    }

    pub fn loaded_scene(&self) -> Option<String> {
        self.inner.lock().ok().and_then(|inner| inner.loaded_scene.clone())
    }

    /// Size of the scene file read from disk, 0 without an asset root.
    pub fn scene_bytes(&self) -> usize {
        self.inner.lock().map(|inner| inner.scene_bytes).unwrap_or(0)
    }

    pub fn dispose_count(&self) -> usize {
        self.dispose_count.load(Ordering::SeqCst)
    }

    /// `Some(true)` if disposal happened on the render thread.
    pub fn disposed_on_render_thread(&self) -> Option<bool> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.disposed_on_render_thread)
    }

    fn read_scene(&self, root: &Path, path: &str) -> Result<usize> {
        let full = root.join(path);
        std::fs::read(&full)
            .map(|bytes| bytes.len())
            .map_err(|e| MapError::SceneLoad {
                path: path.to_string(),
                reason: format!("{}: {e}", full.display()),
            })
    }
}

impl MapController for HeadlessController {
    fn init(&self) -> Result<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| MapError::ControllerInit("controller state poisoned".to_string()))?;

        match inner.state {
            ControllerState::Created => {
                inner.state = ControllerState::Initialized;
                log::debug!("headless controller initialized for '{}'", self.scene_path);
                Ok(())
            }
            other => Err(MapError::ControllerInit(format!(
                "cannot init controller in state {other:?}"
            ))),
        }
    }

    fn load_scene_file(&self, path: &str) -> Result<()> {
        if path.is_empty() {
            return Err(MapError::InvalidScenePath);
        }

        {
            let inner = self.inner.lock().map_err(|_| MapError::SceneLoad {
                path: path.to_string(),
                reason: "controller state poisoned".to_string(),
            })?;
            if !matches!(
                inner.state,
                ControllerState::Initialized | ControllerState::SceneLoaded
            ) {
                return Err(MapError::SceneLoad {
                    path: path.to_string(),
                    reason: format!("controller is {:?}", inner.state),
                });
            }
        }

        // File I/O happens without holding the state lock
        let bytes = match &self.asset_root {
            Some(root) => self.read_scene(root, path)?,
            None => 0,
        };

        if let Ok(mut inner) = self.inner.lock() {
            inner.state = ControllerState::SceneLoaded;
            inner.loaded_scene = Some(path.to_string());
            inner.scene_bytes = bytes;
        }
        log::info!("loaded scene '{}' ({} bytes)", path, bytes);
        Ok(())
    }

    fn dispose(&self) {
        let previous = self.dispose_count.fetch_add(1, Ordering::SeqCst);
        if previous > 0 {
            log::warn!(
                "headless controller for '{}' disposed {} times",
                self.scene_path,
                previous + 1
            );
        }

        let on_render_thread = self.surface.is_render_thread();
        if let Ok(mut inner) = self.inner.lock() {
            if inner.state == ControllerState::SceneLoaded && !on_render_thread {
                log::debug!("scene-loaded controller disposed by a background worker");
            }
            inner.state = ControllerState::Disposed;
            inner.disposed_on_render_thread = Some(on_render_thread);
        }
        log::debug!("headless controller for '{}' disposed", self.scene_path);
    }

    fn surface(&self) -> &SurfaceHandle {
        &self.surface
    }
}

/// Creates [`HeadlessController`]s, optionally reading scenes from disk.
#[derive(Debug, Clone, Default)]
pub struct HeadlessControllerFactory {
    asset_root: Option<PathBuf>,
}

impl HeadlessControllerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset_root(root: impl Into<PathBuf>) -> Self {
        Self {
            asset_root: Some(root.into()),
        }
    }
}

impl ControllerFactory for HeadlessControllerFactory {
    fn create(&self, surface: SurfaceHandle, scene_path: &str) -> Result<ControllerRef> {
        let mut controller = HeadlessController::new(surface, scene_path);
        if let Some(root) = &self.asset_root {
            controller = controller.with_asset_root(root.clone());
        }
        Ok(Arc::new(controller))
    }
}
