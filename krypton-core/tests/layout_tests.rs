//! Layout and configuration behavior through the public API

use krypton_core::{
    DisplayConfig, Nv12Layout, PixelFormat, PlanarFrame, SCANOUT_ALIGN, align_up,
};

#[test]
fn test_1080p_layout_end_to_end() {
    // 1920x1080 NV12: pitch stays 1920, luma region covers 1088 rows,
    // chroma starts right after and covers 544 rows.
    let layout = Nv12Layout::new(1920, 1080);
    assert_eq!(layout.pitch, 1920);
    assert_eq!(layout.luma_size, 1920 * 1088);
    assert_eq!(layout.chroma_offset(), 1920 * 1088);
    assert_eq!(layout.chroma_size, 1920 * 544);
    assert_eq!(layout.total_size(), 1920 * (1088 + 544));
    assert_eq!(layout.buffer_rows(), 1088 + 544);
}

#[test]
fn test_pitch_is_smallest_aligned_stride() {
    for width in [2, 16, 718, 1278, 1280, 1918, 1920, 3838, 3840] {
        let layout = Nv12Layout::new(width, 720);
        assert_eq!(layout.pitch, align_up(width, SCANOUT_ALIGN));
        assert!(layout.pitch >= width);
        assert!(layout.pitch - width < SCANOUT_ALIGN);
        assert_eq!(layout.pitch % SCANOUT_ALIGN, 0);
    }
}

#[test]
fn test_driver_pitch_overrides_minimum() {
    // Driver rounded 1920 up to 2048; all offsets follow the reported pitch.
    let layout = Nv12Layout::with_pitch(1920, 1080, 2048);
    assert_eq!(layout.pitch, 2048);
    assert_eq!(layout.chroma_offset(), 2048 * 1088);
    assert_eq!(layout.total_size(), 2048 * (1088 + 544));
}

#[test]
fn test_frame_validation() {
    let good = vec![0u8; 1280 * 720 * 3 / 2];
    assert!(PlanarFrame::new(&good, 1280, 720, 0).is_ok());

    let short = vec![0u8; 1280 * 720]; // luma only, chroma missing
    assert!(PlanarFrame::new(&short, 1280, 720, 0).is_err());
}

#[test]
fn test_config_round_trips_through_toml() {
    let config = DisplayConfig::new(1280, 720).with_format(PixelFormat::Nv12);
    let serialized = toml::to_string(&config).unwrap();
    let parsed: DisplayConfig = toml::from_str(&serialized).unwrap();
    assert_eq!(parsed.width, 1280);
    assert_eq!(parsed.height, 720);
    assert_eq!(parsed.format, PixelFormat::Nv12);
}
