//! Hardware-backed display tests
//!
//! These need a DRM card with a connected display and mode-setting rights
//! (run from a VT, not under a compositor), so they are ignored by default:
//!
//! ```sh
//! cargo test -- --ignored
//! ```

use krypton_core::{
    DisplayConfig, DisplayDevice, Presenter, TestPatternSource, live_buffer_count,
};
use krypton_core::source::FrameSource;

fn card_present() -> bool {
    std::path::Path::new("/dev/dri/card0").exists()
}

#[test]
#[ignore]
fn test_discovery_on_real_hardware() {
    assert!(card_present(), "no DRM card at /dev/dri/card0");
    let device = DisplayDevice::open("/dev/dri/card0").unwrap();
    let target = krypton_core::display::discover(&device).unwrap();
    assert_ne!(target.connector_id, 0);
    assert_ne!(target.crtc_id, 0);
    let mode = target.mode.expect("connected output should expose a mode");
    assert!(mode.width() > 0 && mode.height() > 0);
}

#[test]
#[ignore]
fn test_present_frames_and_release() {
    assert!(card_present(), "no DRM card at /dev/dri/card0");
    let config = DisplayConfig::new(1920, 1080);
    let before = live_buffer_count();

    {
        let mut presenter = Presenter::initialize(&config).unwrap();
        let mut source = TestPatternSource::new(1920, 1080, 30).with_frame_limit(30);
        while let Some(frame) = source.next_frame().unwrap() {
            presenter.present(&frame).unwrap();
            // At most the bound generation plus the one being swapped in.
            assert!(live_buffer_count() <= before + 2);
        }
        assert_eq!(presenter.generation(), 30);
    }

    // Everything released on drop.
    assert_eq!(live_buffer_count(), before);
}

#[test]
#[ignore]
fn test_failed_registration_releases_partial_generation() {
    assert!(card_present(), "no DRM card at /dev/dri/card0");
    let config = DisplayConfig::new(1920, 1080);
    let mut presenter = Presenter::initialize(&config).unwrap();

    let data = vec![0x80u8; 1920 * 1080 * 3 / 2];
    let frame = krypton_core::PlanarFrame::new(&data, 1920, 1080, 0).unwrap();
    presenter.present(&frame).unwrap();
    let bound = live_buffer_count();
    let generation = presenter.generation();

    // NV12 is 2x2 subsampled, so the kernel rejects registering a
    // framebuffer with odd dimensions; the freshly allocated buffer must be
    // released on the way out and the previous frame must stay bound.
    let odd = vec![0x80u8; 1919 * 1079 * 3 / 2];
    let frame = krypton_core::PlanarFrame::new(&odd, 1919, 1079, 0).unwrap();
    let err = presenter.present(&frame).unwrap_err();
    assert!(!err.is_fatal());
    assert_eq!(live_buffer_count(), bound);
    assert_eq!(presenter.generation(), generation);

    // The session still presents fine afterwards.
    let frame = krypton_core::PlanarFrame::new(&data, 1920, 1080, 0).unwrap();
    presenter.present(&frame).unwrap();
}

#[test]
#[ignore]
fn test_teardown_is_idempotent() {
    assert!(card_present(), "no DRM card at /dev/dri/card0");
    let config = DisplayConfig::new(1920, 1080);
    let mut presenter = Presenter::initialize(&config).unwrap();

    let data = vec![0x80u8; 1920 * 1080 * 3 / 2]; // mid-gray
    let frame = krypton_core::PlanarFrame::new(&data, 1920, 1080, 0).unwrap();
    presenter.present(&frame).unwrap();

    presenter.teardown();
    presenter.teardown();
    presenter.teardown();
    assert_eq!(live_buffer_count(), 0);
}
