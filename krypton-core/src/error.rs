//! Error types for Krypton

use thiserror::Error;

/// Result type alias using KryptonError
pub type Result<T> = std::result::Result<T, KryptonError>;

/// Main error type for Krypton operations
#[derive(Debug, Error)]
pub enum KryptonError {
    /// The DRM device node could not be opened
    #[error("Display device unavailable: {0}")]
    DeviceUnavailable(String),

    /// No connected connector / usable CRTC was found
    #[error("No display target: {0}")]
    NoDisplayTarget(String),

    /// The requested pixel format is not scanout-capable on this device
    #[error("Unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    /// Dumb buffer allocation was rejected by the driver
    #[error("Buffer allocation failed: {0}")]
    AllocationFailed(String),

    /// The kernel could not establish a CPU mapping for a buffer
    #[error("Buffer mapping failed: {0}")]
    MapFailed(String),

    /// Framebuffer registration (ADDFB2) was rejected
    #[error("Framebuffer registration failed: {0}")]
    RegistrationFailed(String),

    /// The mode-set binding the framebuffer to the CRTC was rejected
    #[error("Display bind failed: {0}")]
    BindFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<KryptonError>,
    },
}

impl KryptonError {
    /// Create a device-unavailable error
    pub fn device_unavailable(msg: impl Into<String>) -> Self {
        Self::DeviceUnavailable(msg.into())
    }

    /// Create a no-display-target error
    pub fn no_display_target(msg: impl Into<String>) -> Self {
        Self::NoDisplayTarget(msg.into())
    }

    /// Create an unsupported-format error
    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    /// Create an allocation error
    pub fn allocation_failed(msg: impl Into<String>) -> Self {
        Self::AllocationFailed(msg.into())
    }

    /// Create a mapping error
    pub fn map_failed(msg: impl Into<String>) -> Self {
        Self::MapFailed(msg.into())
    }

    /// Create a registration error
    pub fn registration_failed(msg: impl Into<String>) -> Self {
        Self::RegistrationFailed(msg.into())
    }

    /// Create a bind error
    pub fn bind_failed(msg: impl Into<String>) -> Self {
        Self::BindFailed(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error is fatal to the session.
    ///
    /// Discovery and format-support failures leave no meaningful degraded
    /// mode; per-frame allocation/registration/bind failures do not, since
    /// the previously bound frame keeps showing.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::DeviceUnavailable(_)
            | Self::NoDisplayTarget(_)
            | Self::UnsupportedFormat(_)
            | Self::Config(_) => true,
            Self::AllocationFailed(_)
            | Self::MapFailed(_)
            | Self::RegistrationFailed(_)
            | Self::BindFailed(_)
            | Self::Io(_) => false,
            Self::WithContext { source, .. } => source.is_fatal(),
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_wraps_source() {
        let err: Result<()> = Err(KryptonError::bind_failed("ENOSPC"));
        let err = err.context("presenting frame 42").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("presenting frame 42"));
        assert!(err.is_fatal() == false);
    }

    #[test]
    fn test_fatality_classification() {
        assert!(KryptonError::no_display_target("no connector").is_fatal());
        assert!(KryptonError::unsupported_format("NV12").is_fatal());
        assert!(!KryptonError::allocation_failed("ENOMEM").is_fatal());
        assert!(!KryptonError::map_failed("stale handle").is_fatal());
    }
}
