//! Host-facing view types
//!
//! [`MapView`] is the container widget. The rest of this module is what a
//! host hands to it: the [`ViewContext`] it is constructed in, the optional
//! [`AttributeSet`], the [`SavedState`] passed to `on_create`, and the
//! [`OnMapReadyCallback`] that receives the controller.

pub mod map_view;

pub use map_view::{MapView, MapViewState};

use crate::controller::{ControllerFactory, ControllerRef};
use crate::core::config::MapViewConfig;
use crate::prelude::HashMap;
use crate::runtime::{self, executors::ThreadExecutor, BackgroundExecutor};
use crate::MapError;
use std::sync::Arc;

/// Layout attributes given to the attribute constructor. Stored, otherwise
/// reserved.
pub type AttributeSet = HashMap<String, String>;

/// Opaque state a host restores a view from.
pub type SavedState = HashMap<String, String>;

/// Everything a [`MapView`] needs from its host.
#[derive(Clone)]
pub struct ViewContext {
    factory: Arc<dyn ControllerFactory>,
    executor: Option<Arc<dyn BackgroundExecutor>>,
    config: MapViewConfig,
}

impl ViewContext {
    /// Context building controllers with `factory`.
    pub fn new(factory: impl ControllerFactory) -> Self {
        Self {
            factory: Arc::new(factory),
            executor: None,
            config: MapViewConfig::default(),
        }
    }

    /// Run init tasks on `executor` instead of the process default.
    pub fn with_executor(mut self, executor: Arc<dyn BackgroundExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_config(mut self, config: MapViewConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &MapViewConfig {
        &self.config
    }

    pub fn factory(&self) -> &Arc<dyn ControllerFactory> {
        &self.factory
    }

    /// The executor init tasks run on: the one given to this context, else
    /// the process-wide one, else a thread executor named by the config.
    pub fn executor(&self) -> Arc<dyn BackgroundExecutor> {
        self.executor
            .clone()
            .or_else(runtime::installed_executor)
            .unwrap_or_else(|| Arc::new(ThreadExecutor::new(self.config.init_thread_name.clone())))
    }
}

impl std::fmt::Debug for ViewContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewContext")
            .field("executor", &self.executor.as_ref().map(|e| e.name()))
            .field("config", &self.config)
            .finish()
    }
}

/// Receives the controller once the map is ready.
///
/// Both methods run on the UI thread, with the view borrowed mutably so the
/// callback can immediately request another map. Closures of the form
/// `FnOnce(&mut MapView, ControllerRef)` implement this trait.
pub trait OnMapReadyCallback {
    /// Called once the controller is initialized, its scene loaded and the
    /// surface attached to the view.
    fn on_map_ready(self: Box<Self>, view: &mut MapView, controller: ControllerRef);

    /// Called instead of `on_map_ready` when init or scene loading failed.
    /// The controller has already been disposed.
    fn on_map_error(self: Box<Self>, view: &mut MapView, error: MapError) {
        let _ = view;
        log::warn!("map initialization failed: {error}");
    }
}

impl<F> OnMapReadyCallback for F
where
    F: FnOnce(&mut MapView, ControllerRef),
{
    fn on_map_ready(self: Box<Self>, view: &mut MapView, controller: ControllerRef) {
        (*self)(view, controller)
    }
}
