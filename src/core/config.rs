//! Configuration for the map view and its render surface
//!
//! The surface pixel format is fixed by the renderer and always comes from
//! [`SurfaceConfig::default`]. The tunable part of the view lives in
//! [`MapViewConfig`], which can be built in code or deserialized from JSON.

use crate::core::constants::{
    ALPHA_BITS, BLUE_BITS, CLIENT_VERSION, DEPTH_BITS, GREEN_BITS, INIT_THREAD_NAME,
    PRESERVE_CONTEXT_ON_PAUSE, RED_BITS, RENDER_THREAD_NAME, STENCIL_BITS,
};
use crate::Result;
use serde::{Deserialize, Serialize};

/// Color, depth and stencil buffer sizes requested from the graphics driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelFormat {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
    pub depth: u8,
    pub stencil: u8,
}

impl PixelFormat {
    pub const fn new(red: u8, green: u8, blue: u8, alpha: u8, depth: u8, stencil: u8) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
            depth,
            stencil,
        }
    }

    /// Components in chooser order: (red, green, blue, alpha, depth, stencil).
    pub fn as_tuple(&self) -> (u8, u8, u8, u8, u8, u8) {
        (
            self.red,
            self.green,
            self.blue,
            self.alpha,
            self.depth,
            self.stencil,
        )
    }

    /// Total bits per color pixel.
    pub fn color_bits(&self) -> u32 {
        self.red as u32 + self.green as u32 + self.blue as u32 + self.alpha as u32
    }
}

impl Default for PixelFormat {
    fn default() -> Self {
        Self::new(
            RED_BITS,
            GREEN_BITS,
            BLUE_BITS,
            ALPHA_BITS,
            DEPTH_BITS,
            STENCIL_BITS,
        )
    }
}

/// Configuration applied to a [`crate::Surface`] when it is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceConfig {
    pub pixel_format: PixelFormat,
    pub client_version: u32,
    pub preserve_context_on_pause: bool,
    pub render_thread_name: String,
}

impl SurfaceConfig {
    pub fn with_render_thread_name(mut self, name: impl Into<String>) -> Self {
        self.render_thread_name = name.into();
        self
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            pixel_format: PixelFormat::default(),
            client_version: CLIENT_VERSION,
            preserve_context_on_pause: PRESERVE_CONTEXT_ON_PAUSE,
            render_thread_name: RENDER_THREAD_NAME.to_string(),
        }
    }
}

/// Host-tunable settings of a [`crate::MapView`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapViewConfig {
    /// Name of the surface render thread.
    pub render_thread_name: String,
    /// Name of plain-thread init workers.
    pub init_thread_name: String,
}

impl MapViewConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Surface configuration derived from this view config. The pixel format
    /// and context settings are never overridden.
    pub fn surface_config(&self) -> SurfaceConfig {
        SurfaceConfig::default().with_render_thread_name(self.render_thread_name.clone())
    }
}

impl Default for MapViewConfig {
    fn default() -> Self {
        Self {
            render_thread_name: RENDER_THREAD_NAME.to_string(),
            init_thread_name: INIT_THREAD_NAME.to_string(),
        }
    }
}
