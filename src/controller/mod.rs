//! Map controller seam
//!
//! The controller is the map engine that renders into a [`Surface`]. The view
//! only needs four capabilities from it: a blocking `init`, a blocking scene
//! load, `dispose`, and a way to reach the render thread of the surface it is
//! bound to.
//!
//! [`Surface`]: crate::Surface

pub mod headless;

use crate::surface::{RenderTask, SurfaceHandle};
use crate::Result;
use std::sync::Arc;

/// Shared reference to a controller. The view, its init task and the render
/// thread each hold one while they need it.
pub type ControllerRef = Arc<dyn MapController>;

/// A map engine bound to a surface.
///
/// `init` and `load_scene_file` are called on a background worker, never on
/// the UI thread. `dispose` is called exactly once per controller: on the
/// background worker if the controller never became visible, otherwise on
/// the surface's render thread.
pub trait MapController: Send + Sync + 'static {
    /// Expensive engine setup. Blocking.
    fn init(&self) -> Result<()>;

    /// Read and parse the scene description at `path`. Blocking.
    fn load_scene_file(&self, path: &str) -> Result<()>;

    /// Release engine resources.
    fn dispose(&self);

    /// The surface this controller renders into.
    fn surface(&self) -> &SurfaceHandle;

    /// Enqueue `task` on the render thread of the bound surface.
    fn queue_event(&self, task: RenderTask) -> Result<()> {
        self.surface().queue_event(task)
    }
}

/// Builds a controller bound to a surface and a scene path.
///
/// Hosts and tests inject their engine through this trait.
pub trait ControllerFactory: Send + Sync + 'static {
    fn create(&self, surface: SurfaceHandle, scene_path: &str) -> Result<ControllerRef>;
}

impl<F> ControllerFactory for F
where
    F: Fn(SurfaceHandle, &str) -> Result<ControllerRef> + Send + Sync + 'static,
{
    fn create(&self, surface: SurfaceHandle, scene_path: &str) -> Result<ControllerRef> {
        self(surface, scene_path)
    }
}
