//! Frame sources
//!
//! A frame source hands the pipeline decoded planar frames one at a time.
//! The built-in test pattern source exists so the display path can be
//! exercised end to end without a decoder attached.

use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::Result;
use crate::types::PlanarFrame;

/// Supplies decoded frames to the pipeline.
///
/// `next_frame` blocks until a frame is available and returns `None` at end
/// of stream. The returned frame borrows the source's internal buffer, which
/// stays valid until the next call.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<PlanarFrame<'_>>>;
}

/// Synthetic NV12 source producing a moving gradient.
///
/// Paces itself to the requested frame rate with plain sleeps; good enough
/// for a diagnostic pattern, and the blocking present provides the real
/// pacing when the display is slower.
pub struct TestPatternSource {
    width: u32,
    height: u32,
    frame_interval: Duration,
    frame_limit: Option<u64>,
    frame_index: u64,
    started: Option<Instant>,
    buffer: Vec<u8>,
}

impl TestPatternSource {
    /// Create a pattern source at the given size and frame rate
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        let size = (width as usize) * (height as usize) * 3 / 2;
        Self {
            width,
            height,
            frame_interval: Duration::from_secs(1) / fps.max(1),
            frame_limit: None,
            frame_index: 0,
            started: None,
            buffer: vec![0u8; size],
        }
    }

    /// Stop after producing this many frames
    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    fn render(&mut self) {
        let w = self.width as usize;
        let h = self.height as usize;
        let shift = (self.frame_index * 2) as usize;

        // Diagonal luma gradient scrolling with the frame index.
        for y in 0..h {
            for x in 0..w {
                self.buffer[y * w + x] = ((x + y + shift) & 0xff) as u8;
            }
        }
        // Neutral chroma: grayscale output makes stride bugs obvious.
        let chroma = &mut self.buffer[w * h..];
        chroma.fill(0x80);
    }
}

impl FrameSource for TestPatternSource {
    fn next_frame(&mut self) -> Result<Option<PlanarFrame<'_>>> {
        if let Some(limit) = self.frame_limit {
            if self.frame_index >= limit {
                debug!("Test pattern finished after {} frames", self.frame_index);
                return Ok(None);
            }
        }

        let started = *self.started.get_or_insert_with(Instant::now);
        let due = started + self.frame_interval * self.frame_index as u32;
        let now = Instant::now();
        if due > now {
            std::thread::sleep(due - now);
        }

        self.render();
        let pts = (self.frame_index as u128 * self.frame_interval.as_nanos()) as u64;
        self.frame_index += 1;
        let frame = PlanarFrame::new(&self.buffer, self.width, self.height, pts)?;
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_produces_valid_frames() {
        let mut source = TestPatternSource::new(64, 64, 1000).with_frame_limit(3);
        let mut count = 0;
        while let Some(frame) = source.next_frame().unwrap() {
            assert_eq!(frame.width(), 64);
            assert_eq!(frame.height(), 64);
            assert_eq!(frame.data().len(), 64 * 64 * 3 / 2);
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn test_pattern_moves_between_frames() {
        let mut source = TestPatternSource::new(32, 32, 1000).with_frame_limit(2);
        let first: Vec<u8> = source.next_frame().unwrap().unwrap().data().to_vec();
        let second: Vec<u8> = source.next_frame().unwrap().unwrap().data().to_vec();
        assert_ne!(first, second);
    }

    #[test]
    fn test_pattern_chroma_is_neutral() {
        let mut source = TestPatternSource::new(32, 32, 1000).with_frame_limit(1);
        let frame = source.next_frame().unwrap().unwrap();
        let chroma = &frame.data()[32 * 32..];
        assert!(chroma.iter().all(|&b| b == 0x80));
    }

    #[test]
    fn test_pts_advances_by_frame_interval() {
        let mut source = TestPatternSource::new(16, 16, 50).with_frame_limit(3);
        let a = source.next_frame().unwrap().unwrap().pts;
        let b = source.next_frame().unwrap().unwrap().pts;
        assert_eq!(a, 0);
        assert_eq!(b, 20_000_000); // 1/50 s in ns
    }
}
