//! # Swarmcast - Image Particle Animation
//!
//! Turns an image into a field of particles that scatter under pointer forces
//! and timed pulses, then spring back to where they were sampled. Sessions can
//! be recorded as a compact input log and replayed deterministically into a
//! video.
//!
//! ## Quick Start
//!
//! ```ignore
//! use swarmcast::prelude::*;
//!
//! let mut session = LiveSession::new(Settings::default(), Vec2::new(800.0, 600.0));
//! session.seed(SourceImage::from_file("logo.png")?)?;
//! session.start_recording()?;
//!
//! session.pointer(PointerEvent::Enter { x: 400.0, y: 300.0 });
//! session.trigger_pulse(ForcePulse::new(PulseKind::Burst { origin: None, radius_pct: None }));
//! for _ in 0..120 {
//!     session.frame(&mut surface);
//! }
//!
//! let recording = session.stop_recording().unwrap();
//! let video = render_recording(
//!     Arc::new(recording),
//!     &RenderOptions::new(800, 600, 30.0),
//!     &CancellationToken::new(),
//!     |_| {},
//! )?;
//! ```
//!
//! ## Core Concepts
//!
//! ### Particles
//!
//! Seeding samples the image on a grid spaced by `particle_gap`. Every opaque
//! sample becomes a [`Particle`] with that pixel's colour, and its seeded
//! position becomes its rest position.
//!
//! ### Forces
//!
//! Pointer forces ([`ForceType`]) act around the cursor while it moves, or
//! continuously when `continuous_force` is set. Restoration pulls every
//! particle back to rest; viscosity bleeds off speed.
//!
//! ### Pulses
//!
//! A [`ForcePulse`] is a timed force field over the whole canvas: bursts,
//! waves, gravity, vortices and about twenty more. Each has a duration, an
//! easing curve and an optional inertia tail.
//!
//! ### Recording and Export
//!
//! | Path | Stores | Fidelity |
//! |------|--------|----------|
//! | [`ReplayExporter`] | settings, image, input events | exact, any resolution |
//! | [`StateSampleExporter`] | particle snapshots at a fixed rate | as seen live |

pub mod encoder;
pub mod engine;
pub mod error;
pub mod export;
pub mod forces;
pub mod input;
pub mod particle;
pub mod performance;
pub mod pulse;
pub mod recording;
pub mod render;
pub mod replay;
pub mod session;
pub mod settings;
pub mod source;
pub mod spatial;
pub mod state_sample;
pub mod surface;
pub mod time;
pub mod visuals;

pub use encoder::MediaEncoder;
pub use engine::Engine;
pub use error::{RecordingError, RenderError, SeedError, SettingsError};
pub use export::{Exporter, ReplayExporter, StateSampleExporter};
pub use glam::Vec2;
pub use input::PointerEvent;
pub use particle::{Particle, ParticleSnapshot};
pub use performance::AdaptivePerformance;
pub use pulse::{Easing, ForcePulse, PulseKind, PulseMode};
pub use recording::{AnimationRecording, EventKind, EventRecorder, RecordedEvent};
pub use render::{
    render, render_recording, CancellationToken, FrameSource, RenderOptions, RenderProgress,
    RenderedVideo,
};
pub use replay::{ReplayConfig, ReplayDriver};
pub use session::LiveSession;
pub use settings::{ForceType, Settings, WallMode};
pub use source::SourceImage;
pub use state_sample::{RecordedFrame, StatePlayback, StateRecorder};
pub use surface::{RasterSurface, Surface};
pub use time::{ManualClock, TimeSource, WallClock};
pub use visuals::{BlendMode, ParticleShape, Rgb, VisualEffects};

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use swarmcast::prelude::*;
/// ```
pub mod prelude {
    pub use crate::encoder::MediaEncoder;
    pub use crate::engine::Engine;
    pub use crate::export::{Exporter, ReplayExporter, StateSampleExporter};
    pub use crate::input::PointerEvent;
    pub use crate::pulse::{Easing, ForcePulse, PulseKind, PulseMode};
    pub use crate::recording::{AnimationRecording, EventRecorder};
    pub use crate::render::{render, render_recording, CancellationToken, RenderOptions};
    pub use crate::replay::{ReplayConfig, ReplayDriver};
    pub use crate::session::LiveSession;
    pub use crate::settings::{ForceType, Settings, WallMode};
    pub use crate::source::SourceImage;
    pub use crate::surface::{RasterSurface, Surface};
    pub use crate::time::{ManualClock, TimeSource};
    pub use crate::visuals::{ParticleShape, Rgb, VisualEffects};
    pub use crate::Vec2;
    pub use std::sync::Arc;
}
