//! Configuration for Krypton
//!
//! Runtime settings come from a TOML file (`~/.config/krypton/config.toml`
//! by default) merged over built-in defaults; the CLI overrides individual
//! fields on top.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::display::DEFAULT_DEVICE;
use crate::error::{KryptonError, Result};
use crate::types::{MAX_FRAME_DIM, PixelFormat};

/// Display/session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// DRM device node to open
    #[serde(default = "default_device")]
    pub device: PathBuf,

    /// Expected frame width in pixels
    #[serde(default = "default_width")]
    pub width: u32,

    /// Expected frame height in pixels
    #[serde(default = "default_height")]
    pub height: u32,

    /// Scanout pixel format for decoded frames
    #[serde(default)]
    pub format: PixelFormat,
}

fn default_device() -> PathBuf {
    PathBuf::from(DEFAULT_DEVICE)
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            width: default_width(),
            height: default_height(),
            format: PixelFormat::default(),
        }
    }
}

impl DisplayConfig {
    /// Create a config with the given frame dimensions
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Set the device node
    pub fn with_device(mut self, device: impl Into<PathBuf>) -> Self {
        self.device = device.into();
        self
    }

    /// Set the pixel format
    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Validate field ranges
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(KryptonError::config(format!(
                "invalid frame size {}x{}",
                self.width, self.height
            )));
        }
        if self.width > MAX_FRAME_DIM || self.height > MAX_FRAME_DIM {
            return Err(KryptonError::config(format!(
                "frame size {}x{} exceeds scanout limits",
                self.width, self.height
            )));
        }
        if self.format == PixelFormat::Nv12 && (self.width % 2 != 0 || self.height % 2 != 0) {
            return Err(KryptonError::config(format!(
                "NV12 requires even dimensions, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// On-disk configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub display: DisplayConfig,
}

impl ConfigFile {
    /// Load from the default path, falling back to defaults if absent
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load and parse a specific config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            KryptonError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&contents).map_err(|e| {
            KryptonError::config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.display.validate()?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("krypton").join("config.toml"))
    }
}

/// Sample configuration file contents
pub fn sample_config() -> &'static str {
    r#"# Krypton configuration

[display]
# DRM device node
device = "/dev/dri/card0"

# Expected decoded frame size
width = 1920
height = 1080

# Scanout format for decoded frames: "nv12" or "xrgb8888"
format = "nv12"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = DisplayConfig::default();
        assert_eq!(config.device, PathBuf::from("/dev/dri/card0"));
        assert_eq!(config.width, 1920);
        assert_eq!(config.height, 1080);
        assert_eq!(config.format, PixelFormat::Nv12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_sizes() {
        assert!(DisplayConfig::new(0, 1080).validate().is_err());
        assert!(DisplayConfig::new(1920, 0).validate().is_err());
        assert!(DisplayConfig::new(32768, 1080).validate().is_err());
        assert!(DisplayConfig::new(1919, 1080).validate().is_err()); // odd width for NV12
        assert!(DisplayConfig::new(1920, 1080).validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[display]
device = "/dev/dri/card1"
width = 1280
height = 720
format = "nv12"
"#
        )
        .unwrap();

        let config = ConfigFile::load_from(file.path()).unwrap();
        assert_eq!(config.display.device, PathBuf::from("/dev/dri/card1"));
        assert_eq!(config.display.width, 1280);
        assert_eq!(config.display.height, 720);
    }

    #[test]
    fn test_load_from_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[display]\nwidth = 1280\nheight = 720\n").unwrap();

        let config = ConfigFile::load_from(file.path()).unwrap();
        assert_eq!(config.display.device, PathBuf::from("/dev/dri/card0"));
        assert_eq!(config.display.format, PixelFormat::Nv12);
    }

    #[test]
    fn test_sample_config_parses() {
        let config: ConfigFile = toml::from_str(sample_config()).unwrap();
        assert!(config.display.validate().is_ok());
    }

    #[test]
    fn test_invalid_toml_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not valid toml {{").unwrap();
        let err = ConfigFile::load_from(file.path()).unwrap_err();
        assert!(matches!(err, KryptonError::Config(_)));
    }
}
