//! DRM device handle
//!
//! Owns the open card fd and exposes typed wrappers over the mode-setting
//! ioctls. Every downstream resource (buffers, framebuffers) keeps a clone of
//! the fd, so release ioctls issued from destructors always have a live
//! descriptor regardless of drop order.

use std::fs::OpenOptions;
use std::os::fd::OwnedFd;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::display::ioctl::{
    self, DRM_MODE_CONNECTED, DrmModeCardRes, DrmModeCrtc, DrmModeGetConnector, DrmModeGetEncoder,
    DrmModeGetPlane, DrmModeGetPlaneRes, DrmModeModeInfo, drm_ioctl,
};
use crate::error::{KryptonError, Result};

/// Default DRM device node
pub const DEFAULT_DEVICE: &str = "/dev/dri/card0";

/// A display mode advertised by a connector
#[derive(Debug, Clone, Copy)]
pub struct DisplayMode {
    pub(crate) raw: DrmModeModeInfo,
}

impl DisplayMode {
    /// Horizontal resolution in pixels
    pub fn width(&self) -> u32 {
        self.raw.hdisplay as u32
    }

    /// Vertical resolution in pixels
    pub fn height(&self) -> u32 {
        self.raw.vdisplay as u32
    }

    /// Refresh rate in Hz
    pub fn refresh(&self) -> u32 {
        self.raw.vrefresh
    }

    /// Mode name as reported by the kernel (e.g. "1920x1080")
    pub fn name(&self) -> String {
        let end = self.raw.name.iter().position(|&b| b == 0).unwrap_or(32);
        String::from_utf8_lossy(&self.raw.name[..end]).into_owned()
    }
}

impl std::fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}@{}Hz", self.width(), self.height(), self.refresh())
    }
}

impl From<DrmModeModeInfo> for DisplayMode {
    fn from(raw: DrmModeModeInfo) -> Self {
        Self { raw }
    }
}

/// Top-level mode-setting resource ids for a card
#[derive(Debug, Clone, Default)]
pub struct CardResources {
    pub connectors: Vec<u32>,
    pub encoders: Vec<u32>,
    pub crtcs: Vec<u32>,
}

/// Probed state of one connector
#[derive(Debug, Clone)]
pub struct ConnectorInfo {
    pub id: u32,
    pub connector_type: u32,
    pub connection: u32,
    /// Currently bound encoder, 0 if none
    pub encoder_id: u32,
    pub modes: Vec<DisplayMode>,
}

impl ConnectorInfo {
    /// Whether a display is attached to this connector
    pub fn connected(&self) -> bool {
        self.connection == DRM_MODE_CONNECTED
    }

    /// Human-readable connector type (per DRM_MODE_CONNECTOR_*)
    pub fn type_name(&self) -> &'static str {
        match self.connector_type {
            1 => "VGA",
            2 => "DVI-I",
            3 => "DVI-D",
            4 => "DVI-A",
            5 => "Composite",
            6 => "S-Video",
            7 => "LVDS",
            8 => "Component",
            9 => "DIN",
            10 => "DisplayPort",
            11 => "HDMI-A",
            12 => "HDMI-B",
            13 => "TV",
            14 => "eDP",
            15 => "Virtual",
            16 => "DSI",
            17 => "DPI",
            18 => "Writeback",
            19 => "SPI",
            20 => "USB",
            _ => "Unknown",
        }
    }
}

/// The open connection to the display subsystem.
///
/// All other display components operate through this handle; dropping it
/// closes the fd and invalidates every downstream identifier, so the
/// presenter keeps it alive for the whole session.
#[derive(Debug, Clone)]
pub struct DisplayDevice {
    fd: Arc<OwnedFd>,
    path: PathBuf,
}

impl DisplayDevice {
    /// Open a DRM card node for exclusive read/write access
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| {
                KryptonError::device_unavailable(format!("{}: {}", path.display(), e))
            })?;
        debug!("Opened display device {}", path.display());
        Ok(Self {
            fd: Arc::new(file.into()),
            path: path.to_path_buf(),
        })
    }

    /// Raw fd for ioctl calls
    pub(crate) fn raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    /// Shared fd handle for resources that outlive a borrow of the device
    pub(crate) fn fd_handle(&self) -> Arc<OwnedFd> {
        Arc::clone(&self.fd)
    }

    /// Path this device was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Enumerate connector/encoder/CRTC ids.
    ///
    /// Uses the kernel's count-then-fill protocol; a hotplug event between
    /// the two calls changes the counts, in which case we start over.
    pub fn resources(&self) -> Result<CardResources> {
        loop {
            let mut res = DrmModeCardRes::default();
            drm_ioctl(self.raw_fd(), ioctl::DRM_IOCTL_MODE_GETRESOURCES, &mut res)
                .map_err(|e| KryptonError::no_display_target(format!("GETRESOURCES: {}", e)))?;

            let mut connectors = vec![0u32; res.count_connectors as usize];
            let mut encoders = vec![0u32; res.count_encoders as usize];
            let mut crtcs = vec![0u32; res.count_crtcs as usize];

            let mut fill = DrmModeCardRes {
                connector_id_ptr: connectors.as_mut_ptr() as u64,
                count_connectors: connectors.len() as u32,
                encoder_id_ptr: encoders.as_mut_ptr() as u64,
                count_encoders: encoders.len() as u32,
                crtc_id_ptr: crtcs.as_mut_ptr() as u64,
                count_crtcs: crtcs.len() as u32,
                ..Default::default()
            };
            drm_ioctl(self.raw_fd(), ioctl::DRM_IOCTL_MODE_GETRESOURCES, &mut fill)
                .map_err(|e| KryptonError::no_display_target(format!("GETRESOURCES: {}", e)))?;

            if fill.count_connectors as usize != connectors.len()
                || fill.count_encoders as usize != encoders.len()
                || fill.count_crtcs as usize != crtcs.len()
            {
                trace!("Resource counts changed mid-enumeration, retrying");
                continue;
            }

            return Ok(CardResources {
                connectors,
                encoders,
                crtcs,
            });
        }
    }

    /// Probe one connector's connection state and mode list
    pub fn connector(&self, connector_id: u32) -> Result<ConnectorInfo> {
        loop {
            let mut conn = DrmModeGetConnector {
                connector_id,
                ..Default::default()
            };
            drm_ioctl(self.raw_fd(), ioctl::DRM_IOCTL_MODE_GETCONNECTOR, &mut conn)
                .map_err(|e| KryptonError::no_display_target(format!("GETCONNECTOR: {}", e)))?;

            let mut modes = vec![DrmModeModeInfo::default(); conn.count_modes as usize];
            let mut fill = DrmModeGetConnector {
                connector_id,
                modes_ptr: modes.as_mut_ptr() as u64,
                count_modes: modes.len() as u32,
                ..Default::default()
            };
            drm_ioctl(self.raw_fd(), ioctl::DRM_IOCTL_MODE_GETCONNECTOR, &mut fill)
                .map_err(|e| KryptonError::no_display_target(format!("GETCONNECTOR: {}", e)))?;

            if fill.count_modes as usize != modes.len() {
                trace!("Connector {} mode list changed, retrying", connector_id);
                continue;
            }

            return Ok(ConnectorInfo {
                id: connector_id,
                connector_type: fill.connector_type,
                connection: fill.connection,
                encoder_id: fill.encoder_id,
                modes: modes.into_iter().map(DisplayMode::from).collect(),
            });
        }
    }

    /// Resolve the CRTC currently driven by an encoder, 0 if none
    pub fn encoder_crtc(&self, encoder_id: u32) -> Result<u32> {
        let mut enc = DrmModeGetEncoder {
            encoder_id,
            ..Default::default()
        };
        drm_ioctl(self.raw_fd(), ioctl::DRM_IOCTL_MODE_GETENCODER, &mut enc)
            .map_err(|e| KryptonError::no_display_target(format!("GETENCODER: {}", e)))?;
        Ok(enc.crtc_id)
    }

    /// Enumerate every scanout format advertised by any plane.
    ///
    /// The format-support probe runs once at init so an unsupported format is
    /// rejected up front instead of deep inside the per-frame path.
    pub fn plane_formats(&self) -> Result<Vec<u32>> {
        let plane_ids = loop {
            let mut res = DrmModeGetPlaneRes::default();
            drm_ioctl(
                self.raw_fd(),
                ioctl::DRM_IOCTL_MODE_GETPLANERESOURCES,
                &mut res,
            )
            .map_err(|e| KryptonError::no_display_target(format!("GETPLANERESOURCES: {}", e)))?;

            let mut ids = vec![0u32; res.count_planes as usize];
            let mut fill = DrmModeGetPlaneRes {
                plane_id_ptr: ids.as_mut_ptr() as u64,
                count_planes: ids.len() as u32,
            };
            drm_ioctl(
                self.raw_fd(),
                ioctl::DRM_IOCTL_MODE_GETPLANERESOURCES,
                &mut fill,
            )
            .map_err(|e| KryptonError::no_display_target(format!("GETPLANERESOURCES: {}", e)))?;

            if fill.count_planes as usize != ids.len() {
                continue;
            }
            break ids;
        };

        let mut formats = Vec::new();
        for plane_id in plane_ids {
            loop {
                let mut plane = DrmModeGetPlane {
                    plane_id,
                    ..Default::default()
                };
                drm_ioctl(self.raw_fd(), ioctl::DRM_IOCTL_MODE_GETPLANE, &mut plane)
                    .map_err(|e| KryptonError::no_display_target(format!("GETPLANE: {}", e)))?;

                let mut fmts = vec![0u32; plane.count_format_types as usize];
                let mut fill = DrmModeGetPlane {
                    plane_id,
                    format_type_ptr: fmts.as_mut_ptr() as u64,
                    count_format_types: fmts.len() as u32,
                    ..Default::default()
                };
                drm_ioctl(self.raw_fd(), ioctl::DRM_IOCTL_MODE_GETPLANE, &mut fill)
                    .map_err(|e| KryptonError::no_display_target(format!("GETPLANE: {}", e)))?;

                if fill.count_format_types as usize != fmts.len() {
                    continue;
                }
                formats.extend(fmts);
                break;
            }
        }
        formats.sort_unstable();
        formats.dedup();
        Ok(formats)
    }

    /// Whether any plane can scan out the given fourcc
    pub fn supports_format(&self, fourcc: u32) -> Result<bool> {
        Ok(self.plane_formats()?.contains(&fourcc))
    }

    /// Bind a framebuffer to a CRTC for one connector at the given mode.
    ///
    /// The new image becomes visible the instant this returns successfully;
    /// the call may block until the next vertical blank.
    pub(crate) fn set_crtc(
        &self,
        crtc_id: u32,
        fb_id: u32,
        connector_id: u32,
        mode: &DisplayMode,
    ) -> Result<()> {
        let conn_ids = [connector_id];
        let mut crtc = DrmModeCrtc {
            set_connectors_ptr: conn_ids.as_ptr() as u64,
            count_connectors: 1,
            crtc_id,
            fb_id,
            mode: mode.raw,
            mode_valid: 1,
            ..Default::default()
        };
        drm_ioctl(self.raw_fd(), ioctl::DRM_IOCTL_MODE_SETCRTC, &mut crtc).map_err(|e| {
            KryptonError::bind_failed(format!(
                "SETCRTC crtc={} fb={} mode={}: {}",
                crtc_id, fb_id, mode, e
            ))
        })?;
        trace!("Bound fb {} to crtc {}", fb_id, crtc_id);
        Ok(())
    }
}
