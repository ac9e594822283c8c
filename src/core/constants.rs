//! Surface constants required by the map renderer.
//! Keeping them in a single place makes the fixed pixel format easy to audit.

/// Red channel size of the surface color buffer, in bits.
pub const RED_BITS: u8 = 8;

/// Green channel size, in bits.
pub const GREEN_BITS: u8 = 8;

/// Blue channel size, in bits.
pub const BLUE_BITS: u8 = 8;

/// The surface is opaque; no alpha channel.
pub const ALPHA_BITS: u8 = 0;

/// Depth buffer size, in bits.
pub const DEPTH_BITS: u8 = 16;

/// The renderer never uses a stencil buffer.
pub const STENCIL_BITS: u8 = 0;

/// Graphics API client version requested for the surface context.
pub const CLIENT_VERSION: u32 = 2;

/// Keep the graphics context alive across host pause/resume.
pub const PRESERVE_CONTEXT_ON_PAUSE: bool = true;

/// Name given to the surface render thread.
pub const RENDER_THREAD_NAME: &str = "mapview-render";

/// Name given to background init workers spawned on plain threads.
pub const INIT_THREAD_NAME: &str = "mapview-init";
