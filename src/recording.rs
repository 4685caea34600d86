//! Event recording.
//!
//! A recording is the initial state (settings, canvas size, seed image) plus
//! a log of discrete inputs, each stamped with milliseconds since recording
//! started. Nothing periodic is stored, so a recording stays small however
//! busy the animation gets. The replay driver rebuilds the animation from it.
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "settings": { ... },
//!   "canvas": [800.0, 600.0],
//!   "image": "<base64 PNG>",
//!   "width": 400,
//!   "height": 300,
//!   "duration_ms": 5123.0,
//!   "events": [
//!     { "timestamp_ms": 0.0, "kind": "pointerMove", "payload": { "x": 10.0, "y": 20.0 } },
//!     { "timestamp_ms": 480.5, "kind": "pulse", "payload": { "pulse": { "type": "burst" } } }
//!   ]
//! }
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::engine::Engine;
use crate::error::RecordingError;
use crate::input::PointerEvent;
use crate::pulse::ForcePulse;
use crate::settings::Settings;
use crate::source::SourceImage;

/// Current file format version.
pub const RECORDING_VERSION: u32 = 1;

/// A recorded input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "camelCase")]
pub enum EventKind {
    /// Pointer moved.
    PointerMove { x: f32, y: f32 },
    /// Pointer entered the canvas.
    PointerEnter { x: f32, y: f32 },
    /// Pointer left the canvas.
    PointerLeave,
    /// Settings snapshot replaced.
    SettingsChange { settings: Box<Settings> },
    /// Pulse triggered.
    Pulse { pulse: ForcePulse },
    /// Pointer force switched on or off.
    ToggleForce { enabled: bool },
    /// Particles scattered.
    Randomize,
}

impl From<PointerEvent> for EventKind {
    fn from(event: PointerEvent) -> Self {
        match event {
            PointerEvent::Move { x, y } => EventKind::PointerMove { x, y },
            PointerEvent::Enter { x, y } => EventKind::PointerEnter { x, y },
            PointerEvent::Leave => EventKind::PointerLeave,
        }
    }
}

impl EventKind {
    /// Name used in logs and in the file format.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::PointerMove { .. } => "pointerMove",
            EventKind::PointerEnter { .. } => "pointerEnter",
            EventKind::PointerLeave => "pointerLeave",
            EventKind::SettingsChange { .. } => "settingsChange",
            EventKind::Pulse { .. } => "pulse",
            EventKind::ToggleForce { .. } => "toggleForce",
            EventKind::Randomize => "randomize",
        }
    }

    /// Apply this input to an engine.
    ///
    /// The live session and the replay driver both go through here so an
    /// input has the same effect in both.
    pub fn apply_to(&self, engine: &mut Engine) {
        match self {
            EventKind::PointerMove { x, y } => {
                engine.pointer_event(PointerEvent::Move { x: *x, y: *y })
            }
            EventKind::PointerEnter { x, y } => {
                engine.pointer_event(PointerEvent::Enter { x: *x, y: *y })
            }
            EventKind::PointerLeave => engine.pointer_event(PointerEvent::Leave),
            EventKind::SettingsChange { settings } => {
                if let Err(e) = engine.set_settings(settings.as_ref().clone()) {
                    tracing::warn!(error = %e, "settings change could not reseed");
                }
            }
            EventKind::Pulse { pulse } => engine.add_pulse(pulse.clone()),
            EventKind::ToggleForce { enabled } => engine.set_force_enabled(*enabled),
            EventKind::Randomize => engine.randomize(),
        }
    }
}

/// An input and when it happened, relative to the start of recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub timestamp_ms: f64,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// A frozen recording.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationRecording {
    /// Settings at the moment recording started.
    pub settings: Settings,
    /// Canvas size in pixels.
    pub canvas: Vec2,
    /// Image the particles were seeded from.
    pub image: SourceImage,
    /// Length of the recording.
    pub duration_ms: f64,
    /// Inputs in non-decreasing timestamp order.
    events: Vec<RecordedEvent>,
}

#[derive(Serialize, Deserialize)]
struct RecordingFile {
    version: u32,
    settings: Settings,
    canvas: Vec2,
    image: String,
    width: u32,
    height: u32,
    duration_ms: f64,
    events: Vec<RecordedEvent>,
}

impl AnimationRecording {
    /// Build a recording. Events are stable-sorted by timestamp.
    pub fn new(
        settings: Settings,
        canvas: Vec2,
        image: SourceImage,
        duration_ms: f64,
        mut events: Vec<RecordedEvent>,
    ) -> Self {
        events.sort_by(|a, b| a.timestamp_ms.total_cmp(&b.timestamp_ms));
        let last = events.last().map_or(0.0, |e| e.timestamp_ms);
        Self {
            settings,
            canvas,
            image,
            duration_ms: duration_ms.max(last).max(0.0),
            events,
        }
    }

    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    /// Serialize to the versioned JSON format.
    pub fn to_json(&self) -> Result<String, RecordingError> {
        let file = RecordingFile {
            version: RECORDING_VERSION,
            settings: self.settings.clone(),
            canvas: self.canvas,
            image: STANDARD.encode(self.image.encode_png()?),
            width: self.image.width(),
            height: self.image.height(),
            duration_ms: self.duration_ms,
            events: self.events.clone(),
        };
        Ok(serde_json::to_string(&file)?)
    }

    /// Parse the versioned JSON format.
    pub fn from_json(json: &str) -> Result<Self, RecordingError> {
        let file: RecordingFile = serde_json::from_str(json)?;
        if file.version != RECORDING_VERSION {
            return Err(RecordingError::UnsupportedVersion(file.version));
        }
        let png = STANDARD.decode(file.image.as_bytes())?;
        let image = SourceImage::from_encoded(&png)?;
        if image.width() != file.width || image.height() != file.height {
            tracing::warn!(
                declared_width = file.width,
                declared_height = file.height,
                width = image.width(),
                height = image.height(),
                "recording image size disagrees with its header, using decoded size"
            );
        }
        Ok(Self::new(
            file.settings,
            file.canvas,
            image,
            file.duration_ms,
            file.events,
        ))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), RecordingError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RecordingError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

struct ActiveRecording {
    started_at_ms: f64,
    last_ms: f64,
    settings: Settings,
    canvas: Vec2,
    image: SourceImage,
    events: Vec<RecordedEvent>,
}

/// Collects inputs between `start` and `stop`.
///
/// Times passed in are on the caller's clock; stored timestamps are relative
/// to `start` and never decrease even if the caller's clock does.
#[derive(Default)]
pub struct EventRecorder {
    active: Option<ActiveRecording>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new recording, discarding any in progress.
    pub fn start(&mut self, now_ms: f64, settings: &Settings, canvas: Vec2, image: SourceImage) {
        if self.active.is_some() {
            tracing::warn!("recording restarted, previous events discarded");
        }
        tracing::info!(width = canvas.x, height = canvas.y, "recording started");
        self.active = Some(ActiveRecording {
            started_at_ms: now_ms,
            last_ms: 0.0,
            settings: settings.clone(),
            canvas,
            image,
            events: Vec::new(),
        });
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Time since recording started, if recording.
    pub fn elapsed_ms(&self, now_ms: f64) -> Option<f64> {
        self.active
            .as_ref()
            .map(|a| (now_ms - a.started_at_ms).max(a.last_ms))
    }

    /// Number of events so far.
    pub fn event_count(&self) -> usize {
        self.active.as_ref().map_or(0, |a| a.events.len())
    }

    /// Append an input. Does nothing when not recording.
    pub fn record(&mut self, now_ms: f64, kind: EventKind) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let timestamp_ms = (now_ms - active.started_at_ms).max(active.last_ms);
        active.last_ms = timestamp_ms;
        tracing::trace!(kind = kind.name(), timestamp_ms, "event recorded");
        active.events.push(RecordedEvent { timestamp_ms, kind });
    }

    /// Freeze and return the recording, or `None` if not recording.
    pub fn stop(&mut self, now_ms: f64) -> Option<AnimationRecording> {
        let active = self.active.take()?;
        let duration_ms = (now_ms - active.started_at_ms).max(active.last_ms);
        tracing::info!(
            duration_ms,
            events = active.events.len(),
            "recording stopped"
        );
        Some(AnimationRecording::new(
            active.settings,
            active.canvas,
            active.image,
            duration_ms,
            active.events,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pulse::PulseKind;
    use crate::visuals::Rgb;

    fn image() -> SourceImage {
        SourceImage::checkerboard(4, 4, 2, Rgb::WHITE, Rgb::BLACK).unwrap()
    }

    #[test]
    fn test_idle_recorder() {
        let mut recorder = EventRecorder::new();
        recorder.record(10.0, EventKind::Randomize);
        assert_eq!(recorder.event_count(), 0);
        assert!(recorder.stop(20.0).is_none());
    }

    #[test]
    fn test_timestamps_relative_and_monotonic() {
        let mut recorder = EventRecorder::new();
        recorder.start(1000.0, &Settings::default(), Vec2::new(4.0, 4.0), image());
        recorder.record(1010.0, EventKind::PointerMove { x: 1.0, y: 1.0 });
        // A clock hiccup backwards must not reorder events
        recorder.record(1005.0, EventKind::PointerLeave);
        recorder.record(1500.0, EventKind::Randomize);

        let recording = recorder.stop(2000.0).unwrap();
        let times: Vec<f64> = recording.events().iter().map(|e| e.timestamp_ms).collect();
        assert_eq!(times, vec![10.0, 10.0, 500.0]);
        assert_eq!(recording.duration_ms, 1000.0);
        assert!(!recorder.is_recording());
    }

    #[test]
    fn test_event_json_shape() {
        let event = RecordedEvent {
            timestamp_ms: 12.5,
            kind: EventKind::PointerMove { x: 3.0, y: 4.0 },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "pointerMove");
        assert_eq!(value["payload"]["x"], 3.0);
        assert_eq!(value["timestamp_ms"], 12.5);

        let leave: RecordedEvent =
            serde_json::from_str(r#"{ "timestamp_ms": 1.0, "kind": "pointerLeave" }"#).unwrap();
        assert_eq!(leave.kind, EventKind::PointerLeave);
    }

    #[test]
    fn test_recording_json_round_trip() {
        let events = vec![
            RecordedEvent {
                timestamp_ms: 0.0,
                kind: EventKind::PointerEnter { x: 1.0, y: 2.0 },
            },
            RecordedEvent {
                timestamp_ms: 40.0,
                kind: EventKind::Pulse {
                    pulse: ForcePulse::new(PulseKind::Burst {
                        origin: None,
                        radius_pct: Some(20.0),
                    }),
                },
            },
            RecordedEvent {
                timestamp_ms: 80.0,
                kind: EventKind::ToggleForce { enabled: false },
            },
        ];
        let recording = AnimationRecording::new(
            Settings::default(),
            Vec2::new(4.0, 4.0),
            image(),
            100.0,
            events,
        );
        let json = recording.to_json().unwrap();
        let back = AnimationRecording::from_json(&json).unwrap();
        assert_eq!(back, recording);
    }

    #[test]
    fn test_unsupported_version() {
        let recording =
            AnimationRecording::new(Settings::default(), Vec2::new(4.0, 4.0), image(), 0.0, vec![]);
        let json = recording.to_json().unwrap().replacen("\"version\":1", "\"version\":9", 1);
        assert!(matches!(
            AnimationRecording::from_json(&json),
            Err(RecordingError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_new_sorts_events() {
        let events = vec![
            RecordedEvent {
                timestamp_ms: 50.0,
                kind: EventKind::Randomize,
            },
            RecordedEvent {
                timestamp_ms: 10.0,
                kind: EventKind::PointerLeave,
            },
        ];
        let recording =
            AnimationRecording::new(Settings::default(), Vec2::ONE, image(), 20.0, events);
        assert_eq!(recording.events()[0].timestamp_ms, 10.0);
        // Duration covers the last event
        assert_eq!(recording.duration_ms, 50.0);
    }
}
