//! Core types for Krypton
//!
//! Pixel formats, plane layout arithmetic, and the decoded-frame view that
//! flows from a frame source into the presenter.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{KryptonError, Result};

/// Global handle counter for unique session IDs
static HANDLE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque handle for a presentation session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    /// Create a new unique handle
    pub fn new() -> Self {
        Self(HANDLE_COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw handle value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

/// Round `value` up to the next multiple of `align`.
///
/// `align` must be a power of two.
pub const fn align_up(value: u32, align: u32) -> u32 {
    (value + align - 1) & !(align - 1)
}

/// Scanout alignment required by the display hardware.
///
/// The overlay cannot scan out rows that are not 16-byte aligned; using the
/// raw frame width as the stride produces visibly corrupted output.
pub const SCANOUT_ALIGN: u32 = 16;

/// Upper bound on frame width and height.
///
/// No real scanout exceeds this, and keeping both dimensions under it keeps
/// every layout product (`pitch * aligned_height`) inside `u32`.
pub const MAX_FRAME_DIM: u32 = 16384;

/// Scanout pixel format, identified by DRM fourcc
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 2-plane 4:2:0 YUV (luma plane + interleaved chroma plane)
    #[default]
    Nv12,
    /// 32-bit RGB, byte order B-G-R-X
    Xrgb8888,
}

impl PixelFormat {
    /// DRM fourcc code
    pub fn fourcc(&self) -> u32 {
        match self {
            Self::Nv12 => 0x3231564E,     // NV12
            Self::Xrgb8888 => 0x34325258, // XR24
        }
    }

    /// Number of memory planes for this format
    pub fn plane_count(&self) -> usize {
        match self {
            Self::Nv12 => 2,
            Self::Xrgb8888 => 1,
        }
    }

    /// Render a fourcc as its four ASCII characters
    pub fn fourcc_string(fourcc: u32) -> String {
        fourcc
            .to_le_bytes()
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '?' })
            .collect()
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nv12 => write!(f, "NV12"),
            Self::Xrgb8888 => write!(f, "XRGB8888"),
        }
    }
}

impl std::str::FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nv12" => Ok(Self::Nv12),
            "xrgb8888" | "xrgb" | "xr24" => Ok(Self::Xrgb8888),
            _ => Err(format!("Unknown pixel format: {}", s)),
        }
    }
}

/// Plane layout for a 2-plane 4:2:0 frame under the scanout alignment rules.
///
/// The luma stride is the frame width rounded up to the alignment; the chroma
/// plane shares that stride and starts immediately after the (height-aligned)
/// luma region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nv12Layout {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Byte stride shared by the luma and chroma planes
    pub pitch: u32,
    /// Byte size of the luma plane region (also the chroma plane offset)
    pub luma_size: u32,
    /// Byte size of the chroma plane region
    pub chroma_size: u32,
}

impl Nv12Layout {
    /// Compute the minimum layout for a frame of the given dimensions
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_pitch(width, height, align_up(width, SCANOUT_ALIGN))
    }

    /// Compute the layout using a driver-reported pitch.
    ///
    /// The driver may round the pitch beyond the minimum alignment; whatever
    /// it reports is authoritative for all indexing.
    pub fn with_pitch(width: u32, height: u32, pitch: u32) -> Self {
        let luma_size = pitch * align_up(height, SCANOUT_ALIGN);
        let chroma_size = pitch * align_up(height / 2, SCANOUT_ALIGN);
        Self {
            width,
            height,
            pitch,
            luma_size,
            chroma_size,
        }
    }

    /// Chroma plane byte offset within the allocation
    pub fn chroma_offset(&self) -> u32 {
        self.luma_size
    }

    /// Total byte size of the allocation
    pub fn total_size(&self) -> u32 {
        self.luma_size + self.chroma_size
    }

    /// Allocation height in rows, as requested from the dumb-buffer API
    /// (8 bpp rows of `pitch` bytes each)
    pub fn buffer_rows(&self) -> u32 {
        align_up(self.height, SCANOUT_ALIGN) + align_up(self.height / 2, SCANOUT_ALIGN)
    }
}

/// Copy decoder-native NV12 pixels into a scanout buffer, re-striding rows.
///
/// The source is contiguous with stride = width (luma `w x h` bytes followed
/// by interleaved chroma `w x h/2` bytes); the destination uses the aligned
/// pitch, so each row must be placed individually. A flat copy would misplace
/// every row after the first.
pub(crate) fn restride_nv12(src: &[u8], layout: &Nv12Layout, dst: &mut [u8]) {
    let width = layout.width as usize;
    let height = layout.height as usize;
    let pitch = layout.pitch as usize;
    let chroma_offset = layout.chroma_offset() as usize;

    for row in 0..height {
        let s = row * width;
        let d = row * pitch;
        dst[d..d + width].copy_from_slice(&src[s..s + width]);
    }
    let chroma_src = width * height;
    for row in 0..height / 2 {
        let s = chroma_src + row * width;
        let d = chroma_offset + row * pitch;
        dst[d..d + width].copy_from_slice(&src[s..s + width]);
    }
}

/// A decoded planar 4:2:0 frame, borrowed from the decoder/source.
///
/// Layout contract: one contiguous luma plane (`width x height` bytes,
/// stride = width) immediately followed by one interleaved chroma plane
/// (`width x height/2` bytes, same stride).
#[derive(Debug)]
pub struct PlanarFrame<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    /// Presentation timestamp in nanoseconds
    pub pts: u64,
}

impl<'a> PlanarFrame<'a> {
    /// Wrap decoder output, validating the dimensions and that the buffer
    /// covers the declared size
    pub fn new(data: &'a [u8], width: u32, height: u32, pts: u64) -> Result<Self> {
        if width == 0 || height == 0 || width > MAX_FRAME_DIM || height > MAX_FRAME_DIM {
            return Err(KryptonError::config(format!(
                "invalid frame size {}x{} (max {})",
                width, height, MAX_FRAME_DIM
            )));
        }
        let needed = (width as usize) * (height as usize) * 3 / 2;
        if data.len() < needed {
            return Err(KryptonError::config(format!(
                "frame buffer too small: {} bytes for {}x{} NV12 ({} needed)",
                data.len(),
                width,
                height,
                needed
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            pts,
        })
    }

    /// Raw pixel bytes (luma then chroma)
    pub fn data(&self) -> &[u8] {
        self.data
    }

    /// Frame width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }
}
