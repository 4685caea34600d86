//! Headless demo.
//!
//! Seeds a session from an image (or a built-in checkerboard), scripts a
//! few seconds of pointer movement and pulses, records it, and renders the
//! recording to a GIF.
//!
//! ```text
//! swarmcast [IMAGE] [OUTPUT.gif]
//! RUST_LOG=swarmcast=debug swarmcast logo.png out.gif
//! ```

use std::error::Error;
use std::path::PathBuf;

use swarmcast::prelude::*;

const CANVAS: Vec2 = Vec2::new(480.0, 360.0);
const FRAME_MS: f64 = 1000.0 / 60.0;

fn setup_logging() -> Result<(), Box<dyn Error>> {
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive("swarmcast=info".parse()?)
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
    Ok(())
}

fn load_image(path: Option<&PathBuf>) -> Result<SourceImage, Box<dyn Error>> {
    match path {
        Some(path) => Ok(SourceImage::from_file(path)?),
        None => {
            tracing::info!("no image given, using a checkerboard");
            Ok(SourceImage::checkerboard(
                160,
                120,
                20,
                Rgb::from_hex("#f2a541").unwrap_or(Rgb::WHITE),
                Rgb::from_hex("#3b6ea5").unwrap_or(Rgb::WHITE),
            )?)
        }
    }
}

/// Run `frames` display frames on the manual clock.
fn run_frames(
    session: &mut LiveSession,
    clock: &ManualClock,
    surface: &mut RasterSurface,
    frames: usize,
) {
    for _ in 0..frames {
        clock.advance_ms(FRAME_MS);
        session.frame(surface);
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    setup_logging()?;

    let mut args = std::env::args_os().skip(1).map(PathBuf::from);
    let image_path = args.next();
    let output = args.next().unwrap_or_else(|| PathBuf::from("swarmcast.gif"));

    let settings = Settings {
        particle_gap: 4.0,
        particle_size: 3.0,
        ..Settings::default()
    };
    let clock = ManualClock::new();
    let mut session = LiveSession::with_clock(settings, CANVAS, Box::new(clock.clone()))
        .with_background(Rgb::new(12, 12, 18));
    let count = session.seed(load_image(image_path.as_ref())?)?;
    tracing::info!(particles = count, "session seeded");

    let mut surface = RasterSurface::new(CANVAS.x as u32, CANVAS.y as u32, CANVAS);
    session.start_recording()?;

    // Sweep the pointer across the middle of the canvas
    session.pointer(PointerEvent::Enter { x: 40.0, y: 180.0 });
    for i in 0..60 {
        let x = 40.0 + i as f32 * 6.5;
        let y = 180.0 + (i as f32 * 0.2).sin() * 60.0;
        session.pointer(PointerEvent::Move { x, y });
        run_frames(&mut session, &clock, &mut surface, 1);
    }
    session.pointer(PointerEvent::Leave);
    run_frames(&mut session, &clock, &mut surface, 30);

    session.trigger_pulse(
        ForcePulse::new(PulseKind::Burst {
            origin: None,
            radius_pct: None,
        })
        .with_duration(600.0)
        .with_inertia(400.0),
    );
    run_frames(&mut session, &clock, &mut surface, 90);

    session.trigger_pulse(
        ForcePulse::new(PulseKind::Gravity { direction: Vec2::Y }).with_duration(800.0),
    );
    run_frames(&mut session, &clock, &mut surface, 120);

    let Some(recording) = session.stop_recording() else {
        return Err("recording was not running".into());
    };
    tracing::info!(
        events = recording.events().len(),
        duration_ms = recording.duration_ms,
        "recorded"
    );

    let options = RenderOptions::new(CANVAS.x as u32, CANVAS.y as u32, 30.0)
        .with_background(session.background())
        .with_mime_preferences(["image/gif"]);
    let exporter = ReplayExporter::new(recording);
    let mut last_percent = 0;
    let video = exporter.export(&options, &CancellationToken::new(), &mut |progress| {
        let percent = (progress.fraction() * 100.0) as u32;
        if percent >= last_percent + 10 {
            last_percent = percent;
            tracing::info!(percent, "rendering");
        }
    })?;

    std::fs::write(&output, &video.bytes)?;
    tracing::info!(
        path = %output.display(),
        frames = video.frame_count,
        bytes = video.bytes.len(),
        "video written"
    );
    Ok(())
}
