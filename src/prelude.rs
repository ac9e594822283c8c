//! Prelude module for common mapview types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use mapview::prelude::*;`

pub use crate::core::config::{MapViewConfig, PixelFormat, SurfaceConfig};

pub use crate::controller::{
    headless::{ControllerState, HeadlessController, HeadlessControllerFactory},
    ControllerFactory, ControllerRef, MapController,
};

pub use crate::surface::{RenderTask, Surface, SurfaceHandle};

pub use crate::background::init_task::{InitTask, TaskId, TaskPhase};

pub use crate::runtime::{
    executor, executors::ThreadExecutor, init_executor, BackgroundExecutor, BlockingJob,
};

#[cfg(feature = "tokio-runtime")]
pub use crate::runtime::executors::tokio_impl::TokioExecutor;

pub use crate::view::{
    AttributeSet, MapView, MapViewState, OnMapReadyCallback, SavedState, ViewContext,
};

pub use crate::{Error as MapError, Result};

pub use std::{
    sync::Arc,
    time::{Duration, Instant},
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
