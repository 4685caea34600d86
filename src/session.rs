//! The live loop.
//!
//! [`LiveSession`] owns the engine together with everything that watches it:
//! the event recorder, the state-sample recorder, the frame timer and the
//! adaptive performance controller. Every external input goes through the
//! session so it is applied to the engine and recorded in one place.
//!
//! # Example
//!
//! ```ignore
//! let mut session = LiveSession::new(Settings::default(), Vec2::new(800.0, 600.0));
//! session.seed(SourceImage::from_file("logo.png")?)?;
//! session.start_recording()?;
//!
//! // per window event
//! session.pointer(PointerEvent::Move { x, y });
//! // per display refresh
//! session.frame(&mut surface);
//!
//! let recording = session.stop_recording();
//! ```

use glam::Vec2;
use serde_json::Value;
use winit::event::WindowEvent;

use crate::engine::{Engine, MAX_STEP_MS};
use crate::error::{RecordingError, SeedError, SettingsError};
use crate::input::{is_primary_press, PointerEvent};
use crate::particle::Particle;
use crate::performance::{Adjustment, AdaptivePerformance};
use crate::pulse::ForcePulse;
use crate::recording::{AnimationRecording, EventKind, EventRecorder};
use crate::settings::Settings;
use crate::source::SourceImage;
use crate::state_sample::{RecordedFrame, StateRecorder};
use crate::surface::{begin_frame, Surface};
use crate::time::{FrameTimer, TimeSource, WallClock};
use crate::visuals::Rgb;

/// Engine plus recorders for interactive use.
pub struct LiveSession {
    engine: Engine,
    recorder: EventRecorder,
    states: StateRecorder,
    timer: FrameTimer,
    performance: AdaptivePerformance,
    background: Rgb,
}

impl LiveSession {
    /// Session on the system clock.
    pub fn new(settings: Settings, canvas: Vec2) -> Self {
        Self::with_clock(settings, canvas, Box::new(WallClock::new()))
    }

    /// Session on a caller-supplied clock.
    pub fn with_clock(settings: Settings, canvas: Vec2, clock: Box<dyn TimeSource>) -> Self {
        let timer = FrameTimer::new(settings.performance.window_ms);
        Self {
            engine: Engine::new(settings, canvas, clock),
            recorder: EventRecorder::new(),
            states: StateRecorder::new(),
            timer,
            performance: AdaptivePerformance::new(),
            background: Rgb::BLACK,
        }
    }

    pub fn with_background(mut self, background: Rgb) -> Self {
        self.background = background;
        self
    }

    pub fn background(&self) -> Rgb {
        self.background
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn particles(&self) -> &[Particle] {
        self.engine.particles()
    }

    /// Seed the engine. Returns the particle count.
    ///
    /// A recording in progress keeps the image it started with.
    pub fn seed(&mut self, image: SourceImage) -> Result<usize, SeedError> {
        if self.recorder.is_recording() {
            tracing::warn!("reseeding while recording, the recording keeps its original image");
        }
        let count = self.engine.seed(image)?.len();
        self.engine.sync_clock();
        self.timer.reset();
        Ok(count)
    }

    /// Change the canvas size.
    pub fn resize(&mut self, canvas: Vec2) -> Result<(), SeedError> {
        self.timer.reset();
        self.engine.resize(canvas)
    }

    fn dispatch(&mut self, kind: EventKind) {
        let now = self.engine.now_ms();
        kind.apply_to(&mut self.engine);
        self.recorder.record(now, kind);
    }

    /// Feed a pointer event.
    pub fn pointer(&mut self, event: PointerEvent) {
        self.dispatch(event.into());
    }

    /// Handle a winit window event.
    ///
    /// Cursor events become pointer events and a left-button press toggles
    /// the pointer force. Returns whether the event was used.
    pub fn window_event(&mut self, event: &WindowEvent, scale: f32) -> bool {
        if is_primary_press(event) {
            self.toggle_force();
            return true;
        }
        let last = self.engine.pointer().position();
        match PointerEvent::from_window_event(event, scale, last) {
            Some(pointer) => {
                self.pointer(pointer);
                true
            }
            None => false,
        }
    }

    /// Start a pulse now.
    ///
    /// Continuous pulses are re-issued by the caller for as long as the
    /// trigger is held; each re-issue is a separate recorded pulse.
    pub fn trigger_pulse(&mut self, pulse: ForcePulse) {
        tracing::debug!(kind = pulse.kind.name(), "pulse triggered");
        self.dispatch(EventKind::Pulse { pulse });
    }

    /// Replace the settings.
    pub fn change_settings(&mut self, settings: Settings) {
        self.timer = FrameTimer::new(settings.performance.window_ms);
        self.dispatch(EventKind::SettingsChange {
            settings: Box::new(settings),
        });
    }

    /// Merge a partial JSON object into the current settings.
    pub fn patch_settings(&mut self, patch: &Value) -> Result<(), SettingsError> {
        let next = self.engine.settings().patched(patch)?;
        self.change_settings(next);
        Ok(())
    }

    /// Flip the pointer force. Returns the new state.
    pub fn toggle_force(&mut self) -> bool {
        let enabled = !self.engine.force_enabled();
        self.set_force_enabled(enabled);
        enabled
    }

    pub fn set_force_enabled(&mut self, enabled: bool) {
        self.dispatch(EventKind::ToggleForce { enabled });
    }

    /// Scatter the particles.
    pub fn randomize(&mut self) {
        self.dispatch(EventKind::Randomize);
    }

    /// Run one display frame: step, measure, adapt, draw, capture.
    pub fn frame(&mut self, surface: &mut dyn Surface) -> Adjustment {
        self.engine.step();
        let now = self.engine.now_ms();

        self.timer.tick(now);
        let delta_ms = self.timer.delta_ms();
        if delta_ms > MAX_STEP_MS {
            tracing::trace!(delta_ms, "frame longer than one integration step");
        }
        // A partly filled window overstates startup hitches
        let fps = if self.timer.is_warm() {
            self.timer.fps()
        } else {
            None
        };
        let adjustment = self
            .performance
            .update(fps, now, &self.engine.settings().performance);
        self.performance.apply(&mut self.engine);

        begin_frame(surface, self.background, &self.engine.effective_effects());
        self.engine.draw(surface);
        self.states.capture(now, self.engine.particles());
        adjustment
    }

    /// Measured frame rate, including a partly filled window.
    pub fn fps(&self) -> Option<f32> {
        self.timer.fps()
    }

    pub fn performance(&self) -> &AdaptivePerformance {
        &self.performance
    }

    /// Start recording inputs.
    ///
    /// The recording begins with the current force switch and, if the
    /// pointer is over the canvas, its position, so replay starts from the
    /// same interaction state.
    pub fn start_recording(&mut self) -> Result<(), RecordingError> {
        let image = self.engine.image().cloned().ok_or(RecordingError::NotSeeded)?;
        let now = self.engine.now_ms();
        self.recorder
            .start(now, self.engine.settings(), self.engine.canvas(), image);
        self.recorder.record(
            now,
            EventKind::ToggleForce {
                enabled: self.engine.force_enabled(),
            },
        );
        let pointer = self.engine.pointer();
        if let (true, Some(at)) = (pointer.is_inside(), pointer.position()) {
            self.recorder
                .record(now, EventKind::PointerEnter { x: at.x, y: at.y });
        }
        Ok(())
    }

    /// Stop recording. `None` when not recording.
    pub fn stop_recording(&mut self) -> Option<AnimationRecording> {
        let now = self.engine.now_ms();
        self.recorder.stop(now)
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    /// Start capturing particle snapshots at `fps`.
    pub fn start_state_recording(&mut self, fps: f64) {
        let now = self.engine.now_ms();
        self.states.start(now, fps);
    }

    /// Stop capturing and return the frames.
    pub fn stop_state_recording(&mut self) -> Vec<RecordedFrame> {
        self.states.stop()
    }

    pub fn is_state_recording(&self) -> bool {
        self.states.is_recording()
    }
}
