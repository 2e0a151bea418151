//! Presentation pipeline
//!
//! Ties a frame source to the presenter: pull a frame, present it, repeat.
//! Everything runs on the caller's thread; the blocking bind paces the loop
//! to the display.

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::DisplayConfig;
use crate::display::Presenter;
use crate::error::{Result, ResultExt};
use crate::source::FrameSource;
use crate::types::Handle;

/// Pipeline lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Created but not started
    Idle,
    /// Presenting frames
    Running,
    /// Stopped, resources released
    Stopped,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Counters for a presentation session
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineStats {
    pub frames_presented: u64,
    pub frames_dropped: u64,
    pub elapsed: Duration,
}

impl PipelineStats {
    /// Average presented frame rate over the session
    pub fn average_fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames_presented as f64 / secs
        } else {
            0.0
        }
    }
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} presented, {} dropped, {:.1} fps avg",
            self.frames_presented,
            self.frames_dropped,
            self.average_fps()
        )
    }
}

/// Drives frames from a source onto the display.
pub struct Pipeline {
    handle: Handle,
    config: DisplayConfig,
    presenter: Option<Presenter>,
    state: PipelineState,
    frames_presented: u64,
    frames_dropped: u64,
    start_time: Option<Instant>,
    interval_start: Instant,
    interval_frames: u64,
}

impl Pipeline {
    /// Create a pipeline for the given configuration
    pub fn new(config: DisplayConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            handle: Handle::new(),
            config,
            presenter: None,
            state: PipelineState::Idle,
            frames_presented: 0,
            frames_dropped: 0,
            start_time: None,
            interval_start: Instant::now(),
            interval_frames: 0,
        })
    }

    /// Session handle
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Current lifecycle state
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Open the display and bind the bootstrap frame
    pub fn start(&mut self) -> Result<()> {
        if self.state == PipelineState::Running {
            return Ok(());
        }
        info!("Starting pipeline {}", self.handle);
        let presenter = Presenter::initialize(&self.config).context("initializing display")?;
        self.presenter = Some(presenter);
        self.state = PipelineState::Running;
        self.start_time = Some(Instant::now());
        self.interval_start = Instant::now();
        self.interval_frames = 0;
        Ok(())
    }

    /// Pull one frame from the source and present it.
    ///
    /// Returns `Ok(false)` at end of stream. Per-frame presentation failures
    /// are counted as drops and logged, not propagated: the previous frame
    /// keeps showing. Fatal errors (device gone, no target) do propagate.
    pub fn process(&mut self, source: &mut dyn FrameSource) -> Result<bool> {
        let presenter = match self.presenter.as_mut() {
            Some(p) => p,
            None => {
                warn!("Pipeline {} processed before start", self.handle);
                return Ok(false);
            }
        };

        let Some(frame) = source.next_frame()? else {
            debug!("Frame source ended");
            return Ok(false);
        };

        match presenter.present(&frame) {
            Ok(()) => {
                self.frames_presented += 1;
                self.interval_frames += 1;
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                self.frames_dropped += 1;
                warn!("Dropped frame {}: {}", frame.pts, e);
            }
        }

        // Once-a-second throughput line, matching the frame counter cadence
        // the rest of the logging uses.
        let now = Instant::now();
        if now.duration_since(self.interval_start) >= Duration::from_secs(1) {
            info!("fps: {}", self.interval_frames);
            self.interval_start = now;
            self.interval_frames = 0;
        }
        Ok(true)
    }

    /// Run until the source ends or presentation fails fatally
    pub fn run(&mut self, source: &mut dyn FrameSource) -> Result<PipelineStats> {
        self.start()?;
        while self.process(source)? {}
        self.stop();
        Ok(self.stats())
    }

    /// Release the display. Idempotent.
    pub fn stop(&mut self) {
        if self.state != PipelineState::Running {
            return;
        }
        self.presenter = None;
        self.state = PipelineState::Stopped;
        info!("Pipeline {} stopped: {}", self.handle, self.stats());
    }

    /// Session counters so far
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            frames_presented: self.frames_presented,
            frames_dropped: self.frames_dropped,
            elapsed: self
                .start_time
                .map(|t| t.elapsed())
                .unwrap_or_default(),
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_starts_idle() {
        let pipeline = Pipeline::new(DisplayConfig::default()).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert_eq!(pipeline.stats().frames_presented, 0);
    }

    #[test]
    fn test_pipeline_rejects_invalid_config() {
        assert!(Pipeline::new(DisplayConfig::new(0, 0)).is_err());
    }

    #[test]
    fn test_handles_are_unique() {
        let a = Pipeline::new(DisplayConfig::default()).unwrap();
        let b = Pipeline::new(DisplayConfig::default()).unwrap();
        assert_ne!(a.handle(), b.handle());
        assert!(b.handle().as_u64() > a.handle().as_u64());
    }

    #[test]
    fn test_stats_display() {
        let stats = PipelineStats {
            frames_presented: 120,
            frames_dropped: 3,
            elapsed: Duration::from_secs(2),
        };
        let s = stats.to_string();
        assert!(s.contains("120 presented"));
        assert!(s.contains("3 dropped"));
        assert!((stats.average_fps() - 60.0).abs() < 0.01);
    }
}
