//! State-sample export.
//!
//! The lossy alternative to event replay: while the live animation runs,
//! [`StateRecorder`] copies the visual fields of every particle at a fixed
//! rate. [`StatePlayback`] later finds the two frames bracketing a time and
//! interpolates positions between them. Nothing is re-simulated, so the
//! export shows the animation exactly as it ran live.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::particle::{Particle, ParticleSnapshot};
use crate::render::FrameSource;
use crate::surface::{draw_particle, Surface};
use crate::visuals::VisualEffects;

/// One captured frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    /// Milliseconds since capture started.
    pub timestamp_ms: f64,
    /// Visual state of every particle.
    pub particles: Vec<ParticleSnapshot>,
}

struct Capture {
    started_at_ms: f64,
    interval_ms: f64,
    next_due_ms: f64,
}

/// Periodic snapshot collector for the live loop.
#[derive(Default)]
pub struct StateRecorder {
    capture: Option<Capture>,
    frames: Vec<RecordedFrame>,
}

impl StateRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start capturing at `fps` snapshots per second.
    pub fn start(&mut self, now_ms: f64, fps: f64) {
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 30.0 };
        self.frames.clear();
        self.capture = Some(Capture {
            started_at_ms: now_ms,
            interval_ms: 1000.0 / fps,
            next_due_ms: now_ms,
        });
        tracing::info!(fps, "state capture started");
    }

    pub fn is_recording(&self) -> bool {
        self.capture.is_some()
    }

    /// Snapshot `particles` if a capture is due. Returns whether one was taken.
    ///
    /// A late call captures once and schedules the next capture from now, so
    /// a stalled loop does not produce a burst of identical frames.
    pub fn capture(&mut self, now_ms: f64, particles: &[Particle]) -> bool {
        let Some(capture) = self.capture.as_mut() else {
            return false;
        };
        if now_ms < capture.next_due_ms {
            return false;
        }
        let timestamp_ms = now_ms - capture.started_at_ms;
        capture.next_due_ms += capture.interval_ms;
        if capture.next_due_ms <= now_ms {
            capture.next_due_ms = now_ms + capture.interval_ms;
        }
        self.frames.push(RecordedFrame {
            timestamp_ms,
            particles: particles.iter().map(Particle::snapshot).collect(),
        });
        true
    }

    /// Stop and hand over the frames. Empty when never started.
    pub fn stop(&mut self) -> Vec<RecordedFrame> {
        if self.capture.take().is_none() {
            return Vec::new();
        }
        tracing::info!(frames = self.frames.len(), "state capture stopped");
        std::mem::take(&mut self.frames)
    }
}

/// Interpolating player for captured frames.
#[derive(Debug, Clone)]
pub struct StatePlayback {
    frames: Vec<RecordedFrame>,
    canvas: Vec2,
    effects: VisualEffects,
    time_ms: f64,
}

impl StatePlayback {
    /// Frames are sorted by timestamp on the way in.
    pub fn new(mut frames: Vec<RecordedFrame>, canvas: Vec2, effects: VisualEffects) -> Self {
        frames.sort_by(|a, b| a.timestamp_ms.total_cmp(&b.timestamp_ms));
        Self {
            frames,
            canvas,
            effects,
            time_ms: 0.0,
        }
    }

    pub fn frames(&self) -> &[RecordedFrame] {
        &self.frames
    }

    /// Indices of the frames around `t_ms` and the blend between them.
    ///
    /// Times before the first frame or after the last clamp to that frame.
    pub fn bracket(&self, t_ms: f64) -> Option<(usize, usize, f32)> {
        let last = self.frames.len().checked_sub(1)?;
        let after = self.frames.partition_point(|f| f.timestamp_ms <= t_ms);
        if after == 0 {
            return Some((0, 0, 0.0));
        }
        if after > last {
            return Some((last, last, 0.0));
        }
        let a = &self.frames[after - 1];
        let b = &self.frames[after];
        let span = b.timestamp_ms - a.timestamp_ms;
        let alpha = if span > 0.0 {
            ((t_ms - a.timestamp_ms) / span) as f32
        } else {
            0.0
        };
        Some((after - 1, after, alpha.clamp(0.0, 1.0)))
    }

    /// Interpolated particles at `t_ms`.
    ///
    /// Particles are matched by index. If the two frames hold different
    /// particle counts (the store was rebuilt in between) the earlier frame is
    /// used as is.
    pub fn sample(&self, t_ms: f64) -> Vec<ParticleSnapshot> {
        let Some((i, j, alpha)) = self.bracket(t_ms) else {
            return Vec::new();
        };
        let a = &self.frames[i].particles;
        let b = &self.frames[j].particles;
        if i == j || a.len() != b.len() {
            return a.clone();
        }
        a.iter()
            .zip(b)
            .map(|(pa, pb)| {
                let pos = pa.position().lerp(pb.position(), alpha);
                ParticleSnapshot {
                    x: pos.x,
                    y: pos.y,
                    ..*pa
                }
            })
            .collect()
    }
}

impl FrameSource for StatePlayback {
    fn canvas(&self) -> Vec2 {
        self.canvas
    }

    fn duration_ms(&self) -> f64 {
        self.frames.last().map_or(0.0, |f| f.timestamp_ms)
    }

    fn advance_to(&mut self, t_ms: f64) {
        self.time_ms = t_ms;
    }

    fn draw(&self, surface: &mut dyn Surface) {
        surface.set_blend_mode(self.effects.blend_mode());
        for p in self.sample(self.time_ms) {
            if p.visible {
                draw_particle(surface, p.shape, p.position(), p.size, p.color, &self.effects);
            }
        }
    }

    fn effects(&self) -> VisualEffects {
        self.effects.clone()
    }
}
