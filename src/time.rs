//! Time sources and frame timing.
//!
//! The engine never reads the system clock directly. It asks a [`TimeSource`]
//! for "now" in milliseconds, which is a [`WallClock`] on the live path and a
//! [`ManualClock`] during replay, where the driver moves time forward in
//! fixed increments.
//!
//! # Example
//!
//! ```ignore
//! use swarmcast::time::{ManualClock, TimeSource};
//!
//! let clock = ManualClock::new();
//! let handle = clock.clone();
//! handle.set_ms(16.0);
//! assert_eq!(clock.now_ms(), 16.0);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Something that can say what time it is, in milliseconds.
pub trait TimeSource: Send {
    /// Current time in milliseconds since an arbitrary fixed origin.
    fn now_ms(&self) -> f64;
}

/// Monotonic wall clock measured from its creation.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    start: Instant,
}

impl WallClock {
    /// Create a clock whose origin is now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for WallClock {
    fn now_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

/// Externally driven clock.
///
/// Clones share the same underlying time, so a replay driver can keep one
/// handle while the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Jump to an absolute time.
    pub fn set_ms(&self, ms: f64) {
        self.bits.store(ms.to_bits(), Ordering::Release);
    }

    /// Move time forward by `ms`.
    pub fn advance_ms(&self, ms: f64) {
        self.set_ms(self.now_ms() + ms);
    }
}

impl TimeSource for ManualClock {
    fn now_ms(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

/// Sliding-window frame rate measurement for the live loop.
///
/// Call [`FrameTimer::tick`] once per presented frame with the current time.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    /// Timestamps of recent frames, oldest first.
    frames: VecDeque<f64>,
    /// Width of the measurement window.
    window_ms: f64,
    /// Total frames since creation.
    frame_count: u64,
    /// Time between the last two ticks.
    delta_ms: f64,
}

impl FrameTimer {
    /// Create a timer that averages over `window_ms`.
    pub fn new(window_ms: f64) -> Self {
        Self {
            frames: VecDeque::new(),
            window_ms: window_ms.max(1.0),
            frame_count: 0,
            delta_ms: 0.0,
        }
    }

    /// Record a frame presented at `now_ms`.
    pub fn tick(&mut self, now_ms: f64) {
        if let Some(&last) = self.frames.back() {
            self.delta_ms = (now_ms - last).max(0.0);
        }
        self.frames.push_back(now_ms);
        self.frame_count += 1;
        while let Some(&oldest) = self.frames.front() {
            if now_ms - oldest > self.window_ms {
                self.frames.pop_front();
            } else {
                break;
            }
        }
    }

    /// Frames per second over the window, or `None` until two frames are in it.
    pub fn fps(&self) -> Option<f32> {
        let first = *self.frames.front()?;
        let last = *self.frames.back()?;
        let span = last - first;
        if self.frames.len() < 2 || span <= 0.0 {
            return None;
        }
        Some(((self.frames.len() - 1) as f64 * 1000.0 / span) as f32)
    }

    /// Whether the window has been filled at least once.
    pub fn is_warm(&self) -> bool {
        match (self.frames.front(), self.frames.back()) {
            (Some(first), Some(last)) => last - first >= self.window_ms * 0.9,
            _ => false,
        }
    }

    /// Total frames since start.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Time between the two most recent frames.
    #[inline]
    pub fn delta_ms(&self) -> f64 {
        self.delta_ms
    }

    /// Forget every measurement.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.frame_count = 0;
        self.delta_ms = 0.0;
    }
}
