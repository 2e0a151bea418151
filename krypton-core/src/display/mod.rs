//! Display output via direct DRM/KMS mode setting
//!
//! Layered bottom-up: raw ioctl bindings, the device handle, output
//! discovery, buffer/framebuffer lifecycle, and the presenter that swaps
//! decoded frames onto the screen.

mod ioctl;

pub mod buffer;
pub mod device;
pub mod discover;
pub mod presenter;

pub use buffer::{DumbBuffer, Framebuffer, FramebufferPlane, live_buffer_count};
pub use device::{CardResources, ConnectorInfo, DEFAULT_DEVICE, DisplayDevice, DisplayMode};
pub use discover::{OutputTarget, discover};
pub use presenter::Presenter;
