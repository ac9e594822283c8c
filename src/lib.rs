//! # mapview
//!
//! A host-embeddable map view.
//!
//! [`MapView`] owns an accelerated drawing [`Surface`] with its own render
//! thread, builds a [`MapController`] bound to that surface on a background
//! worker, and mediates the controller's lifecycle against the lifecycle of
//! the host application. Rendering, input and scene semantics live in the
//! controller implementation; this crate only sequences construction,
//! surface attachment, callback delivery and disposal.

pub mod background;
pub mod controller;
pub mod core;
pub mod prelude;
pub mod runtime;
pub mod surface;
pub mod view;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::config::{MapViewConfig, PixelFormat, SurfaceConfig};

pub use controller::{
    headless::{HeadlessController, HeadlessControllerFactory},
    ControllerFactory, ControllerRef, MapController,
};

pub use surface::{RenderTask, Surface, SurfaceHandle};

pub use background::init_task::{InitTask, TaskId, TaskPhase};

pub use runtime::{BackgroundExecutor, BlockingJob};

pub use view::{
    AttributeSet, MapView, MapViewState, OnMapReadyCallback, SavedState, ViewContext,
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Scene path must not be empty")]
    InvalidScenePath,

    #[error("Render surface is closed")]
    SurfaceClosed,

    #[error("Executor error: {0}")]
    Executor(String),

    #[error("Controller init failed: {0}")]
    ControllerInit(String),

    #[error("Failed to load scene '{path}': {reason}")]
    SceneLoad { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Error type alias for convenience
pub type Error = MapError;
