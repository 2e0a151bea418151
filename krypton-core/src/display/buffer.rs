//! Dumb-buffer allocation, mapping, and framebuffer registration
//!
//! Each resource releases itself on drop: mappings munmap, buffers issue
//! DESTROY_DUMB, framebuffers issue RMFB. Every resource holds its own clone
//! of the device fd, so release always has a live descriptor even if the
//! `DisplayDevice` itself is gone.

use std::os::fd::OwnedFd;
use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{trace, warn};

use crate::display::ioctl::{
    self, DrmModeCreateDumb, DrmModeDestroyDumb, DrmModeFbCmd2, DrmModeMapDumb, drm_ioctl,
};
use crate::error::{KryptonError, Result};

/// Count of live dumb buffers across the process, for leak checks in tests
static LIVE_BUFFERS: AtomicUsize = AtomicUsize::new(0);

/// Number of dumb buffers currently alive
pub fn live_buffer_count() -> usize {
    LIVE_BUFFERS.load(Ordering::SeqCst)
}

/// A CPU mapping of a dumb buffer, unmapped on drop
struct Mapping {
    ptr: *mut libc::c_void,
    len: usize,
}

impl Mapping {
    fn as_slice_mut(&mut self) -> &mut [u8] {
        // Valid for the mapping's lifetime; the kernel backs [ptr, ptr+len).
        unsafe { std::slice::from_raw_parts_mut(self.ptr as *mut u8, self.len) }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        let ret = unsafe { libc::munmap(self.ptr, self.len) };
        if ret != 0 {
            warn!(
                "munmap of {} bytes failed: {}",
                self.len,
                std::io::Error::last_os_error()
            );
        }
    }
}

// The mapping is only ever touched from the presenting thread; the raw
// pointer itself is safe to move between threads.
unsafe impl Send for Mapping {}

/// A kernel-allocated CPU-accessible scanout buffer.
///
/// Created via CREATE_DUMB and destroyed via DESTROY_DUMB on drop. The driver
/// reports the actual pitch and size, which may exceed what was requested;
/// callers must use the reported values for all indexing.
pub struct DumbBuffer {
    fd: Arc<OwnedFd>,
    handle: u32,
    width: u32,
    height: u32,
    pitch: u32,
    size: u64,
    mapping: Option<Mapping>,
}

impl DumbBuffer {
    /// Allocate a dumb buffer of `width x height` at `bpp` bits per pixel.
    ///
    /// For NV12 the planes are carved out of a single 8 bpp allocation whose
    /// width is the aligned pitch and whose height covers both plane regions.
    pub fn create(fd: Arc<OwnedFd>, width: u32, height: u32, bpp: u32) -> Result<Self> {
        let mut req = DrmModeCreateDumb {
            width,
            height,
            bpp,
            ..Default::default()
        };
        drm_ioctl(fd.as_raw_fd(), ioctl::DRM_IOCTL_MODE_CREATE_DUMB, &mut req).map_err(|e| {
            KryptonError::allocation_failed(format!(
                "CREATE_DUMB {}x{}@{}bpp: {}",
                width, height, bpp, e
            ))
        })?;
        LIVE_BUFFERS.fetch_add(1, Ordering::SeqCst);
        trace!(
            "Created dumb buffer handle={} pitch={} size={}",
            req.handle, req.pitch, req.size
        );
        Ok(Self {
            fd,
            handle: req.handle,
            width,
            height,
            pitch: req.pitch,
            size: req.size,
            mapping: None,
        })
    }

    /// Kernel buffer handle, as passed to framebuffer registration
    pub fn handle(&self) -> u32 {
        self.handle
    }

    /// Driver-reported row pitch in bytes
    pub fn pitch(&self) -> u32 {
        self.pitch
    }

    /// Driver-reported total size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Map the buffer into this process and return the writable pixel bytes.
    ///
    /// The mapping stays established until `unmap` or drop, so repeated calls
    /// after the first are cheap.
    pub fn map(&mut self) -> Result<&mut [u8]> {
        if self.mapping.is_none() {
            let mut req = DrmModeMapDumb {
                handle: self.handle,
                ..Default::default()
            };
            drm_ioctl(self.fd.as_raw_fd(), ioctl::DRM_IOCTL_MODE_MAP_DUMB, &mut req).map_err(
                |e| KryptonError::map_failed(format!("MAP_DUMB handle={}: {}", self.handle, e)),
            )?;

            let ptr = unsafe {
                libc::mmap(
                    std::ptr::null_mut(),
                    self.size as usize,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_SHARED,
                    self.fd.as_raw_fd(),
                    req.offset as libc::off_t,
                )
            };
            if ptr == libc::MAP_FAILED {
                return Err(KryptonError::map_failed(format!(
                    "mmap handle={} size={}: {}",
                    self.handle,
                    self.size,
                    std::io::Error::last_os_error()
                )));
            }
            self.mapping = Some(Mapping {
                ptr,
                len: self.size as usize,
            });
        }
        match self.mapping.as_mut() {
            Some(m) => Ok(m.as_slice_mut()),
            None => Err(KryptonError::map_failed(format!(
                "no mapping for handle={}",
                self.handle
            ))),
        }
    }

    /// Drop the CPU mapping, keeping the buffer alive for scanout
    pub fn unmap(&mut self) {
        self.mapping = None;
    }
}

impl Drop for DumbBuffer {
    fn drop(&mut self) {
        self.mapping = None;
        let mut req = DrmModeDestroyDumb {
            handle: self.handle,
        };
        if let Err(e) = drm_ioctl(
            self.fd.as_raw_fd(),
            ioctl::DRM_IOCTL_MODE_DESTROY_DUMB,
            &mut req,
        ) {
            warn!("DESTROY_DUMB handle={} failed: {}", self.handle, e);
        }
        LIVE_BUFFERS.fetch_sub(1, Ordering::SeqCst);
        trace!("Destroyed dumb buffer handle={}", self.handle);
    }
}

impl std::fmt::Debug for DumbBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DumbBuffer")
            .field("handle", &self.handle)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pitch", &self.pitch)
            .field("size", &self.size)
            .field("mapped", &self.mapping.is_some())
            .finish()
    }
}

/// One plane of a framebuffer registration
#[derive(Debug, Clone, Copy)]
pub struct FramebufferPlane {
    pub handle: u32,
    pub pitch: u32,
    pub offset: u32,
}

/// A registered scanout framebuffer, removed (RMFB) on drop
pub struct Framebuffer {
    fd: Arc<OwnedFd>,
    id: u32,
}

impl Framebuffer {
    /// Register a framebuffer over buffer planes via ADDFB2.
    ///
    /// `planes` describes each memory plane of `fourcc`; for NV12 both planes
    /// name the same buffer handle with the chroma plane at its byte offset.
    pub fn register(
        fd: Arc<OwnedFd>,
        width: u32,
        height: u32,
        fourcc: u32,
        planes: &[FramebufferPlane],
    ) -> Result<Self> {
        let mut cmd = DrmModeFbCmd2 {
            width,
            height,
            pixel_format: fourcc,
            ..Default::default()
        };
        for (i, plane) in planes.iter().enumerate().take(4) {
            cmd.handles[i] = plane.handle;
            cmd.pitches[i] = plane.pitch;
            cmd.offsets[i] = plane.offset;
        }
        drm_ioctl(fd.as_raw_fd(), ioctl::DRM_IOCTL_MODE_ADDFB2, &mut cmd).map_err(|e| {
            KryptonError::registration_failed(format!(
                "ADDFB2 {}x{} fourcc={:#010x}: {}",
                width, height, fourcc, e
            ))
        })?;
        trace!("Registered framebuffer id={}", cmd.fb_id);
        Ok(Self { fd, id: cmd.fb_id })
    }

    /// Framebuffer id, as passed to the CRTC bind
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        let mut fb_id = self.id;
        if let Err(e) = drm_ioctl(self.fd.as_raw_fd(), ioctl::DRM_IOCTL_MODE_RMFB, &mut fb_id) {
            warn!("RMFB id={} failed: {}", self.id, e);
        }
        trace!("Removed framebuffer id={}", self.id);
    }
}

impl std::fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framebuffer").field("id", &self.id).finish()
    }
}
