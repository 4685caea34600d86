//! End-to-end scenarios.
//!
//! These drive the public API the way a host would: seed, interact, record,
//! replay and render.

use std::sync::Arc;

use swarmcast::encoder::{RawStreamHeader, MIME_GIF, MIME_RAW_RGBA};
use swarmcast::engine::NOMINAL_FRAME_MS;
use swarmcast::prelude::*;
use swarmcast::recording::{EventKind, RecordedEvent};
use swarmcast::{RenderError, StatePlayback};

// ============================================================================
// Helpers
// ============================================================================

fn checkerboard(size: u32) -> SourceImage {
    SourceImage::checkerboard(size, size, size / 10, Rgb::WHITE, Rgb::new(220, 40, 60)).unwrap()
}

fn seeded_engine(settings: Settings, size: u32) -> (Engine, ManualClock) {
    let clock = ManualClock::new();
    let mut engine = Engine::new(settings, Vec2::splat(size as f32), Box::new(clock.clone()));
    engine.seed(checkerboard(size)).unwrap();
    (engine, clock)
}

fn live_session(clock: &ManualClock) -> LiveSession {
    let canvas = Vec2::new(64.0, 64.0);
    let mut session = LiveSession::with_clock(Settings::default(), canvas, Box::new(clock.clone()));
    session.seed(checkerboard(40)).unwrap();
    session
}

fn run(engine: &mut Engine, clock: &ManualClock, steps: usize) {
    for _ in 0..steps {
        clock.advance_ms(NOMINAL_FRAME_MS);
        engine.step();
    }
}

fn burst() -> ForcePulse {
    ForcePulse::new(PulseKind::Burst {
        origin: None,
        radius_pct: None,
    })
}

fn scripted_recording() -> AnimationRecording {
    let events = vec![
        RecordedEvent {
            timestamp_ms: 0.0,
            kind: EventKind::PointerMove { x: 30.0, y: 30.0 },
        },
        RecordedEvent {
            timestamp_ms: 120.0,
            kind: EventKind::PointerMove { x: 34.0, y: 31.0 },
        },
        RecordedEvent {
            timestamp_ms: 500.0,
            kind: EventKind::Pulse { pulse: burst() },
        },
        RecordedEvent {
            timestamp_ms: 700.0,
            kind: EventKind::Pulse {
                pulse: ForcePulse::new(PulseKind::Tornado {
                    origin: None,
                    radius_pct: None,
                    rotation: Default::default(),
                    lift: 0.5,
                })
                .with_inertia(200.0),
            },
        },
    ];
    AnimationRecording::new(
        Settings::default(),
        Vec2::new(64.0, 64.0),
        checkerboard(40),
        1200.0,
        events,
    )
}

fn raw_options(fps: f64) -> RenderOptions {
    RenderOptions::new(32, 32, fps).with_mime_preferences([MIME_RAW_RGBA])
}

// ============================================================================
// Simulation
// ============================================================================

#[test]
fn test_checkerboard_without_forces_never_drifts() {
    let settings = Settings {
        particle_gap: 1.0,
        active_forces: Vec::new(),
        restoration: 0.0,
        ..Settings::default()
    };
    let (mut engine, clock) = seeded_engine(settings, 100);
    assert_eq!(engine.particles().len(), 100 * 100);

    run(&mut engine, &clock, 300);
    for p in engine.particles() {
        assert_eq!(p.position, p.rest_position());
        assert_eq!(p.velocity, Vec2::ZERO);
    }
}

#[test]
fn test_burst_pushes_outward_then_decays() {
    let settings = Settings {
        restoration: 0.0,
        walls: WallMode::None,
        ..Settings::default()
    };
    let (mut engine, clock) = seeded_engine(settings, 100);
    let center = engine.canvas() * 0.5;
    engine.add_pulse(burst().with_strength(50.0).with_duration(1000.0));

    run(&mut engine, &clock, 1);
    for p in engine.particles() {
        let radial = p.rest_position() - center;
        assert!(radial.dot(p.velocity) >= 0.0);
    }

    // Past duration plus inertia: the pulse is gone and speeds only decay
    clock.advance_ms(1000.0);
    engine.step();
    assert!(engine.pulses().is_empty());
    let mut speeds: Vec<f32> = engine.particles().iter().map(|p| p.velocity.length()).collect();
    for _ in 0..30 {
        run(&mut engine, &clock, 1);
        for (p, before) in engine.particles().iter().zip(&mut speeds) {
            let now = p.velocity.length();
            assert!(now <= *before + 1e-6);
            *before = now;
        }
    }
}

#[test]
fn test_stacked_pulses_respect_speed_limit() {
    let settings = Settings {
        viscosity: 0.0,
        restoration: 0.0,
        ..Settings::default()
    };
    let (mut engine, clock) = seeded_engine(settings, 60);
    for kind in [
        PulseKind::Gravity { direction: Vec2::X },
        PulseKind::Supernova {
            origin: None,
            radius_pct: None,
        },
        PulseKind::Quake { frequency: 8.0 },
    ] {
        engine.add_pulse(ForcePulse::new(kind).with_strength(100.0).with_duration(3000.0));
    }
    for _ in 0..90 {
        run(&mut engine, &clock, 1);
        let limit = engine.max_speed() + 1e-4;
        assert!(engine.particles().iter().all(|p| p.velocity.length() <= limit));
    }
}

#[test]
fn test_scattered_particles_return_home() {
    let (mut engine, clock) = seeded_engine(Settings::default(), 40);
    engine.randomize();
    run(&mut engine, &clock, 900);
    assert!(engine.particles().iter().all(|p| p.displacement() < 1.0));
}

// ============================================================================
// Replay
// ============================================================================

#[test]
fn test_replay_is_deterministic() {
    let recording = Arc::new(scripted_recording());
    let config = ReplayConfig::for_fps(30.0);

    let mut a = ReplayDriver::new(Arc::clone(&recording), config).unwrap();
    let mut b = ReplayDriver::new(recording, config).unwrap();
    for frame in 0..36 {
        let t = frame as f64 * 1000.0 / 30.0;
        a.advance_to(t);
        b.advance_to(t);
        assert_eq!(a.particles(), b.particles());
    }
}

#[test]
fn test_chunked_replay_matches_single_shot() {
    let recording = Arc::new(scripted_recording());
    let config = ReplayConfig::for_fps(30.0);

    let mut chunked = ReplayDriver::new(Arc::clone(&recording), config).unwrap();
    chunked.advance_to(250.0);
    chunked.advance_to(750.0);

    let mut single = ReplayDriver::new(recording, config).unwrap();
    single.advance_to(750.0);

    assert_eq!(chunked.events_applied(), single.events_applied());
    assert_eq!(chunked.particles(), single.particles());
}

#[test]
fn test_recording_survives_json() {
    let recording = scripted_recording();
    let json = recording.to_json().unwrap();
    let loaded = AnimationRecording::from_json(&json).unwrap();
    assert_eq!(loaded, recording);

    let config = ReplayConfig::for_fps(24.0);
    let mut original = ReplayDriver::new(Arc::new(recording), config).unwrap();
    let mut restored = ReplayDriver::new(Arc::new(loaded), config).unwrap();
    original.advance_to(1200.0);
    restored.advance_to(1200.0);
    assert_eq!(original.particles(), restored.particles());
}

#[test]
fn test_live_session_replays() {
    let clock = ManualClock::new();
    let mut session = live_session(&clock);
    let mut surface = RasterSurface::new(32, 32, Vec2::new(64.0, 64.0));

    session.start_recording().unwrap();
    for i in 0..40 {
        clock.advance_ms(NOMINAL_FRAME_MS);
        if i == 5 {
            session.pointer(PointerEvent::Move { x: 20.0, y: 32.0 });
        }
        if i == 10 {
            session.trigger_pulse(burst());
        }
        session.frame(&mut surface);
    }
    let recording = session.stop_recording().unwrap();
    assert!(recording.duration_ms > 600.0);

    let mut driver = ReplayDriver::new(Arc::new(recording), ReplayConfig::for_fps(30.0)).unwrap();
    let end = driver.recording().duration_ms;
    driver.advance_to(end);
    assert!(driver.events_exhausted());
    assert!(driver.particles().iter().any(|p| p.displacement() > 0.0));
}

// ============================================================================
// Rendering
// ============================================================================

#[test]
fn test_render_is_reproducible() {
    let recording = Arc::new(scripted_recording());
    let cancel = CancellationToken::new();
    let first =
        render_recording(Arc::clone(&recording), &raw_options(30.0), &cancel, |_| {}).unwrap();
    let second = render_recording(recording, &raw_options(30.0), &cancel, |_| {}).unwrap();

    assert_eq!(first.frame_count, 36);
    assert_eq!(first.bytes, second.bytes);
    let header = RawStreamHeader::parse(&first.bytes).unwrap();
    assert_eq!(header.frame_count, 36);
    assert_eq!(
        first.bytes.len(),
        RawStreamHeader::SIZE + 36 * 32 * 32 * 4
    );
}

#[test]
fn test_default_preferences_fall_back_to_gif() {
    let options = RenderOptions::new(32, 32, 10.0);
    let video = render_recording(
        Arc::new(scripted_recording()),
        &options,
        &CancellationToken::new(),
        |_| {},
    )
    .unwrap();
    assert_eq!(video.mime_type, MIME_GIF);
    assert_eq!(&video.bytes[..6], b"GIF89a");
}

#[test]
fn test_cancelled_render_produces_nothing() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut calls = 0;
    let result = render_recording(
        Arc::new(scripted_recording()),
        &raw_options(30.0),
        &cancel,
        |_| calls += 1,
    );
    assert!(matches!(result, Err(RenderError::Cancelled)));
    assert_eq!(calls, 0);
}

#[test]
fn test_state_sample_export() {
    let clock = ManualClock::new();
    let mut session = live_session(&clock);
    let mut surface = RasterSurface::new(32, 32, Vec2::new(64.0, 64.0));

    session.start_state_recording(30.0);
    session.trigger_pulse(burst());
    for _ in 0..60 {
        clock.advance_ms(NOMINAL_FRAME_MS);
        session.frame(&mut surface);
    }
    let frames = session.stop_state_recording();
    assert!(frames.len() >= 25);

    let canvas = Vec2::new(64.0, 64.0);
    let playback = StatePlayback::new(frames.clone(), canvas, VisualEffects::default());
    let mid = playback.sample(playback.frames()[3].timestamp_ms);
    assert_eq!(mid, frames[3].particles);

    let exporter = StateSampleExporter::new(frames, canvas, VisualEffects::default());
    let video = exporter
        .export(&raw_options(30.0), &CancellationToken::new(), &mut |_| {})
        .unwrap();
    assert!(video.frame_count > 0);
}

// ============================================================================
// Adaptive performance
// ============================================================================

#[test]
fn test_slow_frames_shed_load() {
    let clock = ManualClock::new();
    let mut session = live_session(&clock);
    let mut surface = RasterSurface::new(32, 32, Vec2::new(64.0, 64.0));

    // 20 fps for three seconds
    for _ in 0..60 {
        clock.advance_ms(50.0);
        session.frame(&mut surface);
    }
    assert!(session.engine().effects_suppressed());
    assert!(session.engine().visible_fraction() < 1.0);
    assert!(session.engine().visible_fraction() >= Settings::default().performance.min_fraction);
}
