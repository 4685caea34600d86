//! Deterministic replay of a recording.
//!
//! The driver owns a fresh [`Engine`] on a [`ManualClock`] and moves it
//! through time in fixed steps of `frame_duration / oversample`. How long
//! the host takes per frame never matters: identical recordings replayed
//! with the same step produce identical particle trajectories.
//!
//! Events are applied at the first step boundary at or after their
//! timestamp, in order, exactly once. Because events only ever land on the
//! fixed step grid, advancing in chunks (`advance_to(250)` then
//! `advance_to(750)`) ends in exactly the same state as one
//! `advance_to(750)`.
//!
//! # Example
//!
//! ```ignore
//! let mut driver = ReplayDriver::new(Arc::new(recording), ReplayConfig::for_fps(30.0))?;
//! for frame in 0..90 {
//!     driver.advance_to(frame as f64 * 1000.0 / 30.0);
//!     driver.draw_to(&mut surface);
//! }
//! ```

use glam::Vec2;
use std::sync::Arc;

use crate::engine::Engine;
use crate::error::SeedError;
use crate::particle::Particle;
use crate::recording::AnimationRecording;
use crate::render::FrameSource;
use crate::surface::Surface;
use crate::time::ManualClock;
use crate::visuals::VisualEffects;

/// Physics steps per output frame.
pub const DEFAULT_OVERSAMPLE: u32 = 2;

/// Slack when comparing step boundaries against a target time.
const TIME_EPSILON: f64 = 1e-6;

/// Replay timestep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayConfig {
    /// Length of one physics step.
    pub step_ms: f64,
}

impl ReplayConfig {
    /// Step for `fps` output with the default oversampling.
    pub fn for_fps(fps: f64) -> Self {
        Self::with_oversample(fps, DEFAULT_OVERSAMPLE)
    }

    /// Step for `fps` output with `oversample` physics steps per frame.
    pub fn with_oversample(fps: f64, oversample: u32) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 60.0 };
        Self {
            step_ms: 1000.0 / fps / oversample.max(1) as f64,
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self::for_fps(60.0)
    }
}

/// Re-simulates a recording on a fixed timestep.
pub struct ReplayDriver {
    recording: Arc<AnimationRecording>,
    engine: Engine,
    clock: ManualClock,
    step_ms: f64,
    steps: u64,
    next_event: usize,
}

impl ReplayDriver {
    /// Build a driver at time zero.
    ///
    /// Seeding happens synchronously here, so the first `advance_to` always
    /// sees a populated store.
    pub fn new(
        recording: Arc<AnimationRecording>,
        config: ReplayConfig,
    ) -> Result<Self, SeedError> {
        let clock = ManualClock::new();
        let mut engine = Engine::new(
            recording.settings.clone(),
            recording.canvas,
            Box::new(clock.clone()),
        );
        engine.seed(recording.image.clone())?;
        engine.sync_clock();

        tracing::debug!(
            step_ms = config.step_ms,
            events = recording.events().len(),
            duration_ms = recording.duration_ms,
            particles = engine.particles().len(),
            "replay driver ready"
        );

        Ok(Self {
            recording,
            engine,
            clock,
            step_ms: config.step_ms.max(TIME_EPSILON),
            steps: 0,
            next_event: 0,
        })
    }

    /// Simulated time reached so far.
    pub fn sim_time_ms(&self) -> f64 {
        self.steps as f64 * self.step_ms
    }

    /// Physics steps taken.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Events applied so far.
    pub fn events_applied(&self) -> usize {
        self.next_event
    }

    /// Whether every event has been applied.
    pub fn events_exhausted(&self) -> bool {
        self.next_event >= self.recording.events().len()
    }

    pub fn recording(&self) -> &AnimationRecording {
        &self.recording
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn particles(&self) -> &[Particle] {
        self.engine.particles()
    }

    /// Run forward until the next step would pass `target_ms`.
    ///
    /// Targets at or behind the current time do nothing.
    pub fn advance_to(&mut self, target_ms: f64) {
        if !target_ms.is_finite() {
            return;
        }
        loop {
            self.apply_due_events();
            let next = (self.steps + 1) as f64 * self.step_ms;
            if next > target_ms + TIME_EPSILON {
                break;
            }
            self.steps += 1;
            self.clock.set_ms(next);
            self.engine.step();
        }
    }

    fn apply_due_events(&mut self) {
        let now = self.sim_time_ms();
        let events = self.recording.events();
        while let Some(event) = events.get(self.next_event) {
            if event.timestamp_ms > now + TIME_EPSILON {
                break;
            }
            self.clock.set_ms(now);
            event.kind.apply_to(&mut self.engine);
            self.next_event += 1;
        }
    }

    /// Draw the current state. Does not clear the surface.
    pub fn draw_to(&self, surface: &mut dyn Surface) {
        self.engine.draw(surface);
    }
}

impl FrameSource for ReplayDriver {
    fn canvas(&self) -> Vec2 {
        self.engine.canvas()
    }

    fn duration_ms(&self) -> f64 {
        self.recording.duration_ms
    }

    fn advance_to(&mut self, t_ms: f64) {
        ReplayDriver::advance_to(self, t_ms);
    }

    fn draw(&self, surface: &mut dyn Surface) {
        self.draw_to(surface);
    }

    fn effects(&self) -> VisualEffects {
        self.engine.effective_effects()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pulse::{ForcePulse, PulseKind};
    use crate::recording::{EventKind, RecordedEvent};
    use crate::settings::Settings;
    use crate::source::SourceImage;
    use crate::visuals::Rgb;

    fn recording(events: Vec<RecordedEvent>) -> Arc<AnimationRecording> {
        let image =
            SourceImage::checkerboard(32, 32, 4, Rgb::WHITE, Rgb::new(200, 30, 30)).unwrap();
        Arc::new(AnimationRecording::new(
            Settings::default(),
            Vec2::new(64.0, 64.0),
            image,
            1000.0,
            events,
        ))
    }

    fn burst_at(t: f64) -> RecordedEvent {
        RecordedEvent {
            timestamp_ms: t,
            kind: EventKind::Pulse {
                pulse: ForcePulse::new(PulseKind::Burst {
                    origin: None,
                    radius_pct: None,
                }),
            },
        }
    }

    #[test]
    fn test_step_grid() {
        let mut driver = ReplayDriver::new(recording(vec![]), ReplayConfig::for_fps(50.0)).unwrap();
        driver.advance_to(100.0);
        // 10 ms steps at 50 fps with 2x oversampling
        assert_eq!(driver.steps(), 10);
        driver.advance_to(104.0);
        assert_eq!(driver.steps(), 10);
        driver.advance_to(50.0);
        assert_eq!(driver.steps(), 10);
    }

    #[test]
    fn test_events_applied_once_and_in_order() {
        let events = vec![
            RecordedEvent {
                timestamp_ms: 0.0,
                kind: EventKind::PointerMove { x: 5.0, y: 5.0 },
            },
            burst_at(20.0),
            burst_at(20.0),
            RecordedEvent {
                timestamp_ms: 300.0,
                kind: EventKind::ToggleForce { enabled: false },
            },
        ];
        let mut driver = ReplayDriver::new(recording(events), ReplayConfig::for_fps(50.0)).unwrap();
        driver.advance_to(10.0);
        assert_eq!(driver.events_applied(), 1);
        driver.advance_to(20.0);
        assert_eq!(driver.events_applied(), 3);
        assert_eq!(driver.engine().pulses().len(), 2);
        driver.advance_to(20.0);
        assert_eq!(driver.events_applied(), 3);
        driver.advance_to(1000.0);
        assert!(driver.events_exhausted());
        assert!(!driver.engine().force_enabled());
    }

    #[test]
    fn test_pulse_stamped_with_sim_time() {
        let mut driver = ReplayDriver::new(
            recording(vec![burst_at(25.0)]),
            ReplayConfig::for_fps(50.0),
        )
        .unwrap();
        driver.advance_to(30.0);
        // Applied at the 30 ms boundary, the first at or after 25 ms
        assert_eq!(driver.engine().pulses().active()[0].base.started_at_ms, 30.0);
    }

    #[test]
    fn test_chunked_matches_single_shot() {
        let events = vec![
            RecordedEvent {
                timestamp_ms: 0.0,
                kind: EventKind::PointerMove { x: 30.0, y: 30.0 },
            },
            burst_at(500.0),
        ];
        let rec = recording(events);
        let config = ReplayConfig::for_fps(30.0);

        let mut chunked = ReplayDriver::new(Arc::clone(&rec), config).unwrap();
        chunked.advance_to(250.0);
        chunked.advance_to(750.0);

        let mut single = ReplayDriver::new(rec, config).unwrap();
        single.advance_to(750.0);

        assert_eq!(chunked.steps(), single.steps());
        assert_eq!(chunked.particles(), single.particles());
    }
}
