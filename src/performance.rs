//! Adaptive performance control for the live loop.
//!
//! The controller watches the measured frame rate and sheds load when it
//! drops: first by simulating and drawing only an evenly spread fraction of the
//! particles,
//! then, if things are really bad, by turning off glow and additive
//! blending. It only ever touches a live engine. Replay and render always
//! run every particle.

use crate::engine::Engine;
use crate::settings::PerformanceSettings;

/// Dead band around the target frame rate.
pub const FPS_HYSTERESIS: f32 = 5.0;

/// What the last update changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Adjustment {
    /// Nothing changed.
    None,
    /// Visible fraction lowered to the given value.
    Reduced(f32),
    /// Visible fraction raised to the given value.
    Relaxed(f32),
    /// Expensive effects were switched off.
    EffectsSuppressed,
    /// Expensive effects were switched back on.
    EffectsRestored,
}

/// Frame-rate driven load shedding.
#[derive(Debug, Clone)]
pub struct AdaptivePerformance {
    visible_fraction: f32,
    effects_suppressed: bool,
    last_change_ms: Option<f64>,
}

impl Default for AdaptivePerformance {
    fn default() -> Self {
        Self::new()
    }
}

impl AdaptivePerformance {
    pub fn new() -> Self {
        Self {
            visible_fraction: 1.0,
            effects_suppressed: false,
            last_change_ms: None,
        }
    }

    pub fn visible_fraction(&self) -> f32 {
        self.visible_fraction
    }

    pub fn effects_suppressed(&self) -> bool {
        self.effects_suppressed
    }

    /// Feed the latest FPS measurement.
    ///
    /// Fraction changes are spaced at least one measurement window apart so
    /// each one is judged on frames rendered after it took effect.
    pub fn update(
        &mut self,
        fps: Option<f32>,
        now_ms: f64,
        settings: &PerformanceSettings,
    ) -> Adjustment {
        if !settings.enabled {
            let changed = self.visible_fraction < 1.0 || self.effects_suppressed;
            self.reset();
            return if changed {
                Adjustment::Relaxed(1.0)
            } else {
                Adjustment::None
            };
        }
        let Some(fps) = fps else {
            return Adjustment::None;
        };

        if !self.effects_suppressed && fps < settings.severe_fps {
            self.effects_suppressed = true;
            tracing::info!(fps, "frame rate collapsed, suppressing glow and additive blend");
            return Adjustment::EffectsSuppressed;
        }
        if self.effects_suppressed && fps >= settings.severe_fps + FPS_HYSTERESIS {
            self.effects_suppressed = false;
            tracing::info!(fps, "frame rate recovered, restoring effects");
            return Adjustment::EffectsRestored;
        }

        if let Some(last) = self.last_change_ms {
            if now_ms - last < settings.window_ms {
                return Adjustment::None;
            }
        }

        let floor = settings.min_fraction.clamp(0.01, 1.0);
        let step = settings.fraction_step.max(0.01);
        if fps < settings.target_fps - FPS_HYSTERESIS && self.visible_fraction > floor {
            self.visible_fraction = (self.visible_fraction - step).max(floor);
            self.last_change_ms = Some(now_ms);
            tracing::debug!(fps, fraction = self.visible_fraction, "reducing visible fraction");
            return Adjustment::Reduced(self.visible_fraction);
        }
        if fps > settings.target_fps + FPS_HYSTERESIS && self.visible_fraction < 1.0 {
            self.visible_fraction = (self.visible_fraction + step).min(1.0);
            self.last_change_ms = Some(now_ms);
            tracing::debug!(fps, fraction = self.visible_fraction, "relaxing visible fraction");
            return Adjustment::Relaxed(self.visible_fraction);
        }
        Adjustment::None
    }

    /// Push the current decisions into a live engine.
    pub fn apply(&self, engine: &mut Engine) {
        engine.set_visible_fraction(self.visible_fraction);
        engine.set_effects_suppressed(self.effects_suppressed);
    }

    /// Back to full fidelity.
    pub fn reset(&mut self) {
        self.visible_fraction = 1.0;
        self.effects_suppressed = false;
        self.last_change_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NOMINAL_FRAME_MS;
    use crate::settings::Settings;
    use crate::source::SourceImage;
    use crate::time::ManualClock;
    use crate::visuals::Rgb;
    use glam::Vec2;

    fn settings() -> PerformanceSettings {
        PerformanceSettings {
            window_ms: 100.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_reduces_to_floor() {
        let settings = settings();
        let mut perf = AdaptivePerformance::new();
        let mut now = 0.0;
        for _ in 0..50 {
            perf.update(Some(45.0), now, &settings);
            now += 200.0;
        }
        assert_eq!(perf.visible_fraction(), settings.min_fraction);
        assert!(!perf.effects_suppressed());
    }

    #[test]
    fn test_dead_band_holds_steady() {
        let settings = settings();
        let mut perf = AdaptivePerformance::new();
        perf.update(Some(40.0), 0.0, &settings);
        let fraction = perf.visible_fraction();
        assert!(fraction < 1.0);
        assert_eq!(perf.update(Some(58.0), 500.0, &settings), Adjustment::None);
        assert_eq!(perf.visible_fraction(), fraction);
    }

    #[test]
    fn test_relaxes_back_to_full() {
        let settings = settings();
        let mut perf = AdaptivePerformance::new();
        perf.update(Some(40.0), 0.0, &settings);
        perf.update(Some(40.0), 200.0, &settings);
        let mut now = 400.0;
        for _ in 0..20 {
            perf.update(Some(90.0), now, &settings);
            now += 200.0;
        }
        assert_eq!(perf.visible_fraction(), 1.0);
    }

    #[test]
    fn test_changes_are_spaced_by_window() {
        let settings = settings();
        let mut perf = AdaptivePerformance::new();
        assert!(matches!(perf.update(Some(40.0), 0.0, &settings), Adjustment::Reduced(_)));
        assert_eq!(perf.update(Some(40.0), 50.0, &settings), Adjustment::None);
        assert!(matches!(perf.update(Some(40.0), 150.0, &settings), Adjustment::Reduced(_)));
    }

    #[test]
    fn test_severe_drop_suppresses_effects_until_recovery() {
        let settings = settings();
        let mut perf = AdaptivePerformance::new();
        assert_eq!(perf.update(Some(12.0), 0.0, &settings), Adjustment::EffectsSuppressed);
        assert!(perf.effects_suppressed());
        // Just above the threshold is not enough
        perf.update(Some(32.0), 200.0, &settings);
        assert!(perf.effects_suppressed());
        assert_eq!(perf.update(Some(50.0), 400.0, &settings), Adjustment::EffectsRestored);
    }

    #[test]
    fn test_disabled_controller_restores_everything() {
        let mut settings = settings();
        let mut perf = AdaptivePerformance::new();
        perf.update(Some(10.0), 0.0, &settings);
        settings.enabled = false;
        perf.update(Some(10.0), 100.0, &settings);
        assert_eq!(perf.visible_fraction(), 1.0);
        assert!(!perf.effects_suppressed());
    }

    #[test]
    fn test_every_reduction_sheds_particles() {
        let settings = settings();
        let engine_settings = Settings {
            particle_gap: 1.0,
            ..Default::default()
        };
        let clock = ManualClock::new();
        let mut engine = Engine::new(engine_settings, Vec2::splat(10.0), Box::new(clock.clone()));
        engine.seed(SourceImage::solid(10, 10, Rgb::WHITE).unwrap()).unwrap();
        let total = engine.particles().len();
        assert_eq!(total, 100);

        let mut perf = AdaptivePerformance::new();
        let mut previous = total;
        let mut reductions = 0;
        let mut now = 0.0;
        while let Adjustment::Reduced(fraction) = perf.update(Some(40.0), now, &settings) {
            perf.apply(&mut engine);
            clock.advance_ms(NOMINAL_FRAME_MS);
            engine.step();
            let simulated = engine.live_count();
            assert!(simulated < previous, "{fraction}: {simulated} of {total}");
            assert!((simulated as f32 - fraction * total as f32).abs() <= 1.0);
            previous = simulated;
            reductions += 1;
            now += 200.0;
        }
        assert!(reductions >= 7);
        assert_eq!(perf.visible_fraction(), settings.min_fraction);
    }
}
