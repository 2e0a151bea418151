//! # Krypton Core
//!
//! Direct-to-display presentation of decoded video frames over DRM/KMS,
//! with no compositor or GPU driver stack in the path.
//!
//! ## Architecture
//!
//! ```text
//! FrameSource -> Pipeline -> Presenter -> DumbBuffer/Framebuffer -> CRTC
//! ```
//!
//! - **display**: device handle, output discovery, buffer lifecycle, and the
//!   presenter that swaps frames onto the screen
//! - **source**: the frame-source trait and a synthetic test pattern
//! - **pipeline**: the blocking present loop with session counters
//! - **config**: TOML configuration
//!
//! Presentation is deliberately single-threaded and blocking: each bind
//! waits for the display, which paces the whole pipeline without queues.

pub mod config;
pub mod display;
pub mod error;
pub mod pipeline;
pub mod source;
pub mod types;

pub use config::{ConfigFile, DisplayConfig, sample_config};
pub use display::{DisplayDevice, DisplayMode, OutputTarget, Presenter, live_buffer_count};
pub use error::{KryptonError, Result, ResultExt};
pub use pipeline::{Pipeline, PipelineState, PipelineStats};
pub use source::{FrameSource, TestPatternSource};
pub use types::{
    Handle, MAX_FRAME_DIM, Nv12Layout, PixelFormat, PlanarFrame, SCANOUT_ALIGN, align_up,
};
