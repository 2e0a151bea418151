//! Raw DRM mode-setting ioctl bindings
//!
//! Request codes and `#[repr(C)]` argument structs mirroring the kernel's
//! `drm_mode.h`, built by hand the same way the kernel's `_IOWR` macro does.
//! Only the subset needed for dumb-buffer presentation is bound.

use std::io;
use std::os::unix::io::RawFd;

const IOC_NRBITS: u64 = 8;
const IOC_TYPEBITS: u64 = 8;
const IOC_SIZEBITS: u64 = 14;

const IOC_NRSHIFT: u64 = 0;
const IOC_TYPESHIFT: u64 = IOC_NRSHIFT + IOC_NRBITS;
const IOC_SIZESHIFT: u64 = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: u64 = IOC_SIZESHIFT + IOC_SIZEBITS;

const IOC_WRITE: u64 = 1;
const IOC_READ: u64 = 2;

/// DRM ioctl type byte ('d')
const DRM_IOCTL_BASE: u64 = b'd' as u64;

/// Build a read/write DRM ioctl request code for argument type `T`
const fn drm_iowr<T>(nr: u64) -> libc::c_ulong {
    let size = std::mem::size_of::<T>() as u64;
    (((IOC_READ | IOC_WRITE) << IOC_DIRSHIFT)
        | (DRM_IOCTL_BASE << IOC_TYPESHIFT)
        | (nr << IOC_NRSHIFT)
        | (size << IOC_SIZESHIFT)) as libc::c_ulong
}

pub const DRM_IOCTL_MODE_GETRESOURCES: libc::c_ulong = drm_iowr::<DrmModeCardRes>(0xa0);
pub const DRM_IOCTL_MODE_SETCRTC: libc::c_ulong = drm_iowr::<DrmModeCrtc>(0xa2);
pub const DRM_IOCTL_MODE_GETENCODER: libc::c_ulong = drm_iowr::<DrmModeGetEncoder>(0xa6);
pub const DRM_IOCTL_MODE_GETCONNECTOR: libc::c_ulong = drm_iowr::<DrmModeGetConnector>(0xa7);
pub const DRM_IOCTL_MODE_RMFB: libc::c_ulong = drm_iowr::<u32>(0xaf);
pub const DRM_IOCTL_MODE_CREATE_DUMB: libc::c_ulong = drm_iowr::<DrmModeCreateDumb>(0xb2);
pub const DRM_IOCTL_MODE_MAP_DUMB: libc::c_ulong = drm_iowr::<DrmModeMapDumb>(0xb3);
pub const DRM_IOCTL_MODE_DESTROY_DUMB: libc::c_ulong = drm_iowr::<DrmModeDestroyDumb>(0xb4);
pub const DRM_IOCTL_MODE_GETPLANERESOURCES: libc::c_ulong = drm_iowr::<DrmModeGetPlaneRes>(0xb5);
pub const DRM_IOCTL_MODE_GETPLANE: libc::c_ulong = drm_iowr::<DrmModeGetPlane>(0xb6);
pub const DRM_IOCTL_MODE_ADDFB2: libc::c_ulong = drm_iowr::<DrmModeFbCmd2>(0xb8);

/// Connector `connection` value meaning a display is attached
pub const DRM_MODE_CONNECTED: u32 = 1;

/// drm_mode_card_res
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmModeCardRes {
    pub fb_id_ptr: u64,
    pub crtc_id_ptr: u64,
    pub connector_id_ptr: u64,
    pub encoder_id_ptr: u64,
    pub count_fbs: u32,
    pub count_crtcs: u32,
    pub count_connectors: u32,
    pub count_encoders: u32,
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
}

/// drm_mode_modeinfo
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmModeModeInfo {
    pub clock: u32,
    pub hdisplay: u16,
    pub hsync_start: u16,
    pub hsync_end: u16,
    pub htotal: u16,
    pub hskew: u16,
    pub vdisplay: u16,
    pub vsync_start: u16,
    pub vsync_end: u16,
    pub vtotal: u16,
    pub vscan: u16,
    pub vrefresh: u32,
    pub flags: u32,
    pub mode_type: u32,
    pub name: [u8; 32],
}

/// drm_mode_get_connector
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmModeGetConnector {
    pub encoders_ptr: u64,
    pub modes_ptr: u64,
    pub props_ptr: u64,
    pub prop_values_ptr: u64,
    pub count_modes: u32,
    pub count_props: u32,
    pub count_encoders: u32,
    pub encoder_id: u32,
    pub connector_id: u32,
    pub connector_type: u32,
    pub connector_type_id: u32,
    pub connection: u32,
    pub mm_width: u32,
    pub mm_height: u32,
    pub subpixel: u32,
    pub pad: u32,
}

/// drm_mode_get_encoder
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmModeGetEncoder {
    pub encoder_id: u32,
    pub encoder_type: u32,
    pub crtc_id: u32,
    pub possible_crtcs: u32,
    pub possible_clones: u32,
}

/// drm_mode_crtc
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmModeCrtc {
    pub set_connectors_ptr: u64,
    pub count_connectors: u32,
    pub crtc_id: u32,
    pub fb_id: u32,
    pub x: u32,
    pub y: u32,
    pub gamma_size: u32,
    pub mode_valid: u32,
    pub mode: DrmModeModeInfo,
}

/// drm_mode_create_dumb
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmModeCreateDumb {
    pub height: u32,
    pub width: u32,
    pub bpp: u32,
    pub flags: u32,
    pub handle: u32,
    pub pitch: u32,
    pub size: u64,
}

/// drm_mode_map_dumb
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmModeMapDumb {
    pub handle: u32,
    pub pad: u32,
    pub offset: u64,
}

/// drm_mode_destroy_dumb
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmModeDestroyDumb {
    pub handle: u32,
}

/// drm_mode_fb_cmd2
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmModeFbCmd2 {
    pub fb_id: u32,
    pub width: u32,
    pub height: u32,
    pub pixel_format: u32,
    pub flags: u32,
    pub handles: [u32; 4],
    pub pitches: [u32; 4],
    pub offsets: [u32; 4],
    pub modifier: [u64; 4],
}

/// drm_mode_get_plane_res
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmModeGetPlaneRes {
    pub plane_id_ptr: u64,
    pub count_planes: u32,
}

/// drm_mode_get_plane
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmModeGetPlane {
    pub plane_id: u32,
    pub crtc_id: u32,
    pub fb_id: u32,
    pub possible_crtcs: u32,
    pub gamma_size: u32,
    pub count_format_types: u32,
    pub format_type_ptr: u64,
}

/// Issue a DRM ioctl, retrying if a signal interrupts the call.
pub fn drm_ioctl<T>(fd: RawFd, request: libc::c_ulong, arg: &mut T) -> io::Result<()> {
    loop {
        let ret = unsafe { libc::ioctl(fd, request, arg as *mut T) };
        if ret == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EINTR) {
            return Err(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_sizes_match_kernel_abi() {
        use std::mem::size_of;
        assert_eq!(size_of::<DrmModeCardRes>(), 64);
        assert_eq!(size_of::<DrmModeModeInfo>(), 68);
        assert_eq!(size_of::<DrmModeGetConnector>(), 80);
        assert_eq!(size_of::<DrmModeGetEncoder>(), 20);
        assert_eq!(size_of::<DrmModeCrtc>(), 104);
        assert_eq!(size_of::<DrmModeCreateDumb>(), 32);
        assert_eq!(size_of::<DrmModeMapDumb>(), 16);
        assert_eq!(size_of::<DrmModeFbCmd2>(), 104);
    }

    #[test]
    fn test_request_codes_match_kernel_headers() {
        // Spot-check against the values the _IOWR macro expands to.
        assert_eq!(DRM_IOCTL_MODE_GETRESOURCES, 0xC040_64A0);
        assert_eq!(DRM_IOCTL_MODE_CREATE_DUMB, 0xC020_64B2);
        assert_eq!(DRM_IOCTL_MODE_MAP_DUMB, 0xC010_64B3);
        assert_eq!(DRM_IOCTL_MODE_DESTROY_DUMB, 0xC004_64B4);
        assert_eq!(DRM_IOCTL_MODE_ADDFB2, 0xC068_64B8);
        assert_eq!(DRM_IOCTL_MODE_RMFB, 0xC004_64AF);
    }
}
