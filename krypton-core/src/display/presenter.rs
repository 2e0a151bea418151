//! Frame presentation
//!
//! Owns the device, the discovered output target, and the currently bound
//! frame. Each `present` allocates a fresh buffer, registers it, binds it to
//! the CRTC, and only then retires the previous generation, so the display
//! never scans out freed memory.

use tracing::{debug, info};

use crate::config::DisplayConfig;
use crate::display::buffer::{DumbBuffer, Framebuffer, FramebufferPlane};
use crate::display::device::DisplayDevice;
use crate::display::discover::{self, OutputTarget};
use crate::error::{KryptonError, Result, ResultExt};
use crate::types::{Nv12Layout, PixelFormat, PlanarFrame, restride_nv12};

/// One bound generation: the registered framebuffer and its backing buffer.
///
/// Field order is load-bearing for drop: the framebuffer must RMFB before the
/// buffer issues DESTROY_DUMB, since removing a framebuffer whose buffer is
/// already gone is a kernel error.
struct BoundFrame {
    framebuffer: Framebuffer,
    buffer: DumbBuffer,
}

/// Presents decoded frames on the discovered output.
///
/// Single-threaded by design: `present` blocks until the frame is visible,
/// which paces the caller to the display without any queue or vsync thread.
pub struct Presenter {
    device: DisplayDevice,
    target: OutputTarget,
    format: PixelFormat,
    current: Option<BoundFrame>,
    generation: u64,
}

impl Presenter {
    /// Open the device, discover the output, verify format support, and show
    /// a blank bootstrap frame so the pipe is scanning out from the start.
    pub fn initialize(config: &DisplayConfig) -> Result<Self> {
        let device = DisplayDevice::open(&config.device)?;
        let target = discover::discover(&device)?;

        let fourcc = config.format.fourcc();
        if !device.supports_format(fourcc)? {
            return Err(KryptonError::unsupported_format(format!(
                "{} ({:#010x}) is not scanout-capable on {}",
                config.format,
                fourcc,
                device.path().display()
            )));
        }
        debug!("Format {} supported by scanout", config.format);

        let mut presenter = Self {
            device,
            target,
            format: config.format,
            current: None,
            generation: 0,
        };
        presenter.bind_bootstrap().context("binding bootstrap frame")?;
        info!("Presenter initialized on {}", presenter.device.path().display());
        Ok(presenter)
    }

    /// Bind a zeroed XRGB frame at the output's mode so the CRTC has a valid
    /// framebuffer before the first decoded frame arrives.
    ///
    /// Tracked as generation 0 and retired by the first `present` like any
    /// other frame. Skipped when the fallback CRTC has no mode.
    fn bind_bootstrap(&mut self) -> Result<()> {
        let Some(mode) = self.target.mode else {
            return Ok(());
        };
        let (width, height) = (mode.width(), mode.height());
        let buffer = DumbBuffer::create(self.device.fd_handle(), width, height, 32)?;
        let plane = FramebufferPlane {
            handle: buffer.handle(),
            pitch: buffer.pitch(),
            offset: 0,
        };
        let framebuffer = Framebuffer::register(
            self.device.fd_handle(),
            width,
            height,
            PixelFormat::Xrgb8888.fourcc(),
            &[plane],
        )?;
        self.device.set_crtc(
            self.target.crtc_id,
            framebuffer.id(),
            self.target.connector_id,
            &mode,
        )?;
        self.current = Some(BoundFrame {
            framebuffer,
            buffer,
        });
        debug!("Bootstrap frame bound at {}x{}", width, height);
        Ok(())
    }

    /// Present one decoded frame.
    ///
    /// On any failure the partially built resources are released and the
    /// previously bound frame stays on screen; the error is per-frame, not
    /// fatal to the session.
    pub fn present(&mut self, frame: &PlanarFrame<'_>) -> Result<()> {
        let mode = self.target.mode.ok_or_else(|| {
            KryptonError::bind_failed("output has no mode; nothing to bind against")
        })?;

        let layout = Nv12Layout::new(frame.width(), frame.height());

        // Request the allocation as 8 bpp rows of one pitch each, covering
        // both plane regions. The driver's reported pitch supersedes ours.
        let mut buffer = DumbBuffer::create(
            self.device.fd_handle(),
            layout.pitch,
            layout.buffer_rows(),
            8,
        )?;
        let layout = Nv12Layout::with_pitch(frame.width(), frame.height(), buffer.pitch());

        let pixels = buffer.map()?;
        restride_nv12(frame.data(), &layout, pixels);
        buffer.unmap();

        let planes = [
            FramebufferPlane {
                handle: buffer.handle(),
                pitch: layout.pitch,
                offset: 0,
            },
            FramebufferPlane {
                handle: buffer.handle(),
                pitch: layout.pitch,
                offset: layout.chroma_offset(),
            },
        ];
        let framebuffer = Framebuffer::register(
            self.device.fd_handle(),
            frame.width(),
            frame.height(),
            self.format.fourcc(),
            &planes,
        )?;

        self.device.set_crtc(
            self.target.crtc_id,
            framebuffer.id(),
            self.target.connector_id,
            &mode,
        )?;

        // The new frame is on screen; only now is the previous generation
        // safe to release.
        let previous = self.current.replace(BoundFrame {
            framebuffer,
            buffer,
        });
        drop(previous);
        self.generation += 1;
        Ok(())
    }

    /// The discovered output target
    pub fn target(&self) -> &OutputTarget {
        &self.target
    }

    /// Number of frames bound so far (the bootstrap frame is generation 0)
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Release the bound frame and its buffer. Idempotent; also runs on drop.
    pub fn teardown(&mut self) {
        if self.current.take().is_some() {
            debug!("Released bound frame at generation {}", self.generation);
        }
    }
}

impl Drop for Presenter {
    fn drop(&mut self) {
        self.teardown();
        if self.generation > 0 {
            info!("Presenter shut down after {} frames", self.generation);
        }
    }
}

impl std::fmt::Debug for Presenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Presenter")
            .field("device", &self.device.path())
            .field("connector", &self.target.connector_id)
            .field("crtc", &self.target.crtc_id)
            .field("format", &self.format)
            .field("generation", &self.generation)
            .finish()
    }
}
