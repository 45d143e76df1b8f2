use std::time::{Duration, Instant};

/// Admission control for the camera frame stream.
///
/// Reproduces the capture pipeline's input discipline: the first few frames
/// are dropped while the user settles in, at most one frame is admitted per
/// `min_interval`, and frames arriving while a previous frame is still being
/// analyzed are dropped rather than queued.
#[derive(Debug)]
pub struct FrameThrottle {
    min_interval: Duration,
    settle_frames: usize,
    frames_seen: usize,
    last_admitted: Option<Instant>,
    processing: bool,
}

impl Default for FrameThrottle {
    fn default() -> Self {
        Self::new(Duration::from_millis(350), 5)
    }
}

impl FrameThrottle {
    /// Creates a throttle admitting one frame per `min_interval` after
    /// dropping the first `settle_frames` frames.
    #[must_use]
    pub const fn new(min_interval: Duration, settle_frames: usize) -> Self {
        Self {
            min_interval,
            settle_frames,
            frames_seen: 0,
            last_admitted: None,
            processing: false,
        }
    }

    /// Decides whether a frame arriving now should be analyzed.
    ///
    /// An admitted frame marks the throttle busy; call
    /// [`FrameThrottle::release`] once its analysis finishes.
    pub fn admit(&mut self) -> bool {
        self.admit_at(Instant::now())
    }

    /// [`FrameThrottle::admit`] with an explicit arrival time.
    pub fn admit_at(&mut self, now: Instant) -> bool {
        self.frames_seen += 1;
        if self.frames_seen <= self.settle_frames || self.processing {
            return false;
        }
        if let Some(last) = self.last_admitted {
            if now.duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last_admitted = Some(now);
        self.processing = true;
        true
    }

    /// Marks the previously admitted frame's analysis as finished.
    pub fn release(&mut self) {
        self.processing = false;
    }

    /// Returns the throttle to its initial settle-in state.
    pub fn reset(&mut self) {
        self.frames_seen = 0;
        self.last_admitted = None;
        self.processing = false;
    }
}
