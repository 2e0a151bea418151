//! Output discovery
//!
//! Walks the card's connectors and picks the presentation target: the first
//! connected connector with a non-empty mode list, its preferred
//! (first-listed) mode, and a CRTC reached through its bound encoder.
//! Selection is deterministic for a fixed resource table, so repeated runs on
//! the same hardware land on the same output.

use tracing::{debug, info, warn};

use crate::display::device::{ConnectorInfo, DisplayDevice, DisplayMode};
use crate::error::{KryptonError, Result};

/// The selected presentation target.
///
/// `mode` is `None` when the fallback CRTC had no mode programmed; the
/// session still initializes, but frame binds fail until a mode exists.
#[derive(Debug, Clone)]
pub struct OutputTarget {
    pub connector_id: u32,
    pub crtc_id: u32,
    pub mode: Option<DisplayMode>,
}

/// Pick the output target from probed connector state.
///
/// The first connected connector with at least one mode wins; a connected
/// connector with an empty mode list is only chosen when nothing better
/// exists, so a dead output can never shadow a working one. Pure selection
/// logic over already-probed data, separated from the ioctl plumbing so the
/// policy can be exercised against synthetic resource tables. `encoder_crtc`
/// resolves a connector's bound encoder to its CRTC (0 when the encoder
/// drives nothing).
pub(crate) fn select_output<F>(
    connectors: &[ConnectorInfo],
    mut encoder_crtc: F,
    crtcs: &[u32],
) -> Result<OutputTarget>
where
    F: FnMut(u32) -> Result<u32>,
{
    let mut pick = |conn: &ConnectorInfo| -> Result<OutputTarget> {
        let mode = conn.modes.first().copied();

        // Prefer the CRTC already driving this connector's encoder.
        if conn.encoder_id != 0 {
            let crtc_id = encoder_crtc(conn.encoder_id)?;
            if crtc_id != 0 {
                return Ok(OutputTarget {
                    connector_id: conn.id,
                    crtc_id,
                    mode,
                });
            }
        }

        // No routed encoder; fall back to the first CRTC on the card.
        if let Some(&crtc_id) = crtcs.first() {
            return Ok(OutputTarget {
                connector_id: conn.id,
                crtc_id,
                mode,
            });
        }

        Err(KryptonError::no_display_target(format!(
            "connector {} is connected but the card exposes no CRTC",
            conn.id
        )))
    };

    let mut modeless: Option<&ConnectorInfo> = None;
    for conn in connectors {
        if !conn.connected() {
            continue;
        }
        if conn.modes.is_empty() {
            modeless.get_or_insert(conn);
            continue;
        }
        return pick(conn);
    }

    // No connector qualifies; a connected-but-modeless one still gets a CRTC
    // so the session can come up blank.
    if let Some(conn) = modeless {
        return pick(conn);
    }

    Err(KryptonError::no_display_target(
        "no connected connector found",
    ))
}

/// Discover the presentation target on an open device
pub fn discover(device: &DisplayDevice) -> Result<OutputTarget> {
    let res = device.resources()?;
    debug!(
        "Card resources: {} connectors, {} encoders, {} CRTCs",
        res.connectors.len(),
        res.encoders.len(),
        res.crtcs.len()
    );

    let mut probed = Vec::with_capacity(res.connectors.len());
    for &id in &res.connectors {
        match device.connector(id) {
            Ok(info) => {
                debug!(
                    "Connector {}: {} ({} modes)",
                    id,
                    if info.connected() {
                        "connected"
                    } else {
                        "disconnected"
                    },
                    info.modes.len()
                );
                probed.push(info);
            }
            Err(e) => {
                // A connector that fails to probe (e.g. unplugged mid-scan)
                // should not abort discovery of the others.
                warn!("Failed to probe connector {}: {}", id, e);
            }
        }
    }

    let target = select_output(&probed, |enc| device.encoder_crtc(enc), &res.crtcs)?;

    match &target.mode {
        Some(mode) => info!(
            "Selected connector {} on CRTC {} at {}",
            target.connector_id, target.crtc_id, mode
        ),
        None => warn!(
            "Selected connector {} on CRTC {} with no mode; binds will fail until one appears",
            target.connector_id, target.crtc_id
        ),
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::ioctl::{DRM_MODE_CONNECTED, DrmModeModeInfo};

    fn mode(w: u16, h: u16, hz: u32) -> DisplayMode {
        DisplayMode::from(DrmModeModeInfo {
            hdisplay: w,
            vdisplay: h,
            vrefresh: hz,
            ..Default::default()
        })
    }

    fn connector(id: u32, connected: bool, encoder_id: u32, modes: Vec<DisplayMode>) -> ConnectorInfo {
        ConnectorInfo {
            id,
            connector_type: 0,
            connection: if connected { DRM_MODE_CONNECTED } else { 2 },
            encoder_id,
            modes,
        }
    }

    #[test]
    fn test_picks_first_connected_connector() {
        let conns = vec![
            connector(30, false, 0, vec![]),
            connector(31, true, 40, vec![mode(1920, 1080, 60), mode(1280, 720, 60)]),
            connector(32, true, 41, vec![mode(3840, 2160, 30)]),
        ];
        let target = select_output(&conns, |enc| Ok(if enc == 40 { 20 } else { 21 }), &[20, 21])
            .unwrap();
        assert_eq!(target.connector_id, 31);
        assert_eq!(target.crtc_id, 20);
        let m = target.mode.unwrap();
        assert_eq!((m.width(), m.height()), (1920, 1080));
    }

    #[test]
    fn test_falls_back_to_first_crtc_without_encoder() {
        let conns = vec![connector(30, true, 0, vec![mode(1280, 720, 60)])];
        let target = select_output(&conns, |_| Ok(0), &[20, 21]).unwrap();
        assert_eq!(target.crtc_id, 20);
    }

    #[test]
    fn test_falls_back_when_encoder_drives_nothing() {
        let conns = vec![connector(30, true, 40, vec![mode(1280, 720, 60)])];
        let target = select_output(&conns, |_| Ok(0), &[22]).unwrap();
        assert_eq!(target.crtc_id, 22);
    }

    #[test]
    fn test_no_connected_connector_is_an_error() {
        let conns = vec![connector(30, false, 0, vec![])];
        let err = select_output(&conns, |_| Ok(0), &[20]).unwrap_err();
        assert!(matches!(err, KryptonError::NoDisplayTarget(_)));
    }

    #[test]
    fn test_connected_without_modes_selects_with_none() {
        // Only as a last resort: no connector with modes exists.
        let conns = vec![connector(30, true, 0, vec![])];
        let target = select_output(&conns, |_| Ok(0), &[20]).unwrap();
        assert_eq!(target.connector_id, 30);
        assert!(target.mode.is_none());
    }

    #[test]
    fn test_modeless_connector_defers_to_one_with_modes() {
        // A connected connector with no modes must not shadow a later
        // connector that can actually display something.
        let conns = vec![
            connector(30, true, 0, vec![]),
            connector(31, true, 40, vec![mode(1920, 1080, 60)]),
        ];
        let target = select_output(&conns, |_| Ok(20), &[20]).unwrap();
        assert_eq!(target.connector_id, 31);
        let m = target.mode.unwrap();
        assert_eq!((m.width(), m.height()), (1920, 1080));
    }

    #[test]
    fn test_selection_is_deterministic() {
        let conns = vec![
            connector(30, true, 40, vec![mode(1920, 1080, 60)]),
            connector(31, true, 41, vec![mode(1920, 1080, 60)]),
        ];
        let first = select_output(&conns, |_| Ok(20), &[20]).unwrap();
        for _ in 0..10 {
            let again = select_output(&conns, |_| Ok(20), &[20]).unwrap();
            assert_eq!(again.connector_id, first.connector_id);
            assert_eq!(again.crtc_id, first.crtc_id);
        }
    }
}
