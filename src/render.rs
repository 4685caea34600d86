//! Offline video rendering.
//!
//! [`render`] walks a [`FrameSource`] frame by frame at the output frame
//! rate, rasterizes each frame and feeds it to a
//! [`MediaEncoder`](crate::encoder::MediaEncoder). Output
//! timing comes from simulated time, so a slow machine takes longer but
//! produces the same video. Frames are never skipped.
//!
//! Rendering is blocking but cooperative: it yields the thread every few
//! frames and checks a [`CancellationToken`] before every frame. A cancelled
//! or failed render drops the encoder and returns an error; partial output
//! never escapes.
//!
//! # Example
//!
//! ```ignore
//! let cancel = CancellationToken::new();
//! let video = render_recording(
//!     Arc::new(recording),
//!     &RenderOptions::new(640, 480, 30.0),
//!     &cancel,
//!     |p| println!("{:.0}%", p.fraction() * 100.0),
//! )?;
//! std::fs::write("out.gif", &video.bytes)?;
//! ```

use glam::Vec2;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::encoder::{select_encoder, DEFAULT_MIME_PREFERENCES};
use crate::error::RenderError;
use crate::recording::AnimationRecording;
use crate::replay::{ReplayConfig, ReplayDriver, DEFAULT_OVERSAMPLE};
use crate::surface::{begin_frame, RasterSurface, Surface};
use crate::visuals::{Rgb, VisualEffects};

/// Frames rendered between cooperative yields.
pub const DEFAULT_YIELD_EVERY: u32 = 10;

/// Anything that can be positioned in time and drawn.
pub trait FrameSource {
    /// Canvas size the source draws in.
    fn canvas(&self) -> Vec2;

    /// Total length.
    fn duration_ms(&self) -> f64;

    /// Move to `t_ms`. Called with non-decreasing times.
    fn advance_to(&mut self, t_ms: f64);

    /// Draw the current state without clearing.
    fn draw(&self, surface: &mut dyn Surface);

    /// Visual effects to frame with (trails decide clear versus fade).
    fn effects(&self) -> VisualEffects {
        VisualEffects::default()
    }
}

/// Shared cancel flag.
///
/// Clones share the flag, so one clone can be handed to a UI thread while
/// the render holds another.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Output parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frames per second.
    pub fps: f64,
    /// Colour each frame is cleared to.
    pub background: Rgb,
    /// Mime types to try, best first.
    pub mime_preferences: Vec<String>,
    /// Physics steps per output frame when replaying.
    pub oversample: u32,
    /// Frames between cooperative yields.
    pub yield_every: u32,
}

impl RenderOptions {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            width,
            height,
            fps,
            background: Rgb::BLACK,
            mime_preferences: DEFAULT_MIME_PREFERENCES.iter().map(|m| m.to_string()).collect(),
            oversample: DEFAULT_OVERSAMPLE,
            yield_every: DEFAULT_YIELD_EVERY,
        }
    }

    pub fn with_background(mut self, background: Rgb) -> Self {
        self.background = background;
        self
    }

    pub fn with_mime_preferences<I, S>(mut self, preferences: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mime_preferences = preferences.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_oversample(mut self, oversample: u32) -> Self {
        self.oversample = oversample.max(1);
        self
    }

    /// Reject options no frame can be produced with.
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidOptions(format!(
                "output size {}x{} is empty",
                self.width, self.height
            )));
        }
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(RenderError::InvalidOptions(format!(
                "frame rate {} is not positive",
                self.fps
            )));
        }
        Ok(())
    }

    /// Length of one output frame.
    pub fn frame_duration_ms(&self) -> f64 {
        1000.0 / self.fps
    }

    /// Frames needed to cover `duration_ms`.
    pub fn total_frames(&self, duration_ms: f64) -> u64 {
        if !(duration_ms > 0.0) {
            return 0;
        }
        // Absorb rounding so 1000 ms at 30 fps is 30 frames, not 31
        ((duration_ms / self.frame_duration_ms()) - 1e-9).ceil().max(1.0) as u64
    }
}

/// Progress after each encoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderProgress {
    /// Frames encoded so far.
    pub frame: u64,
    /// Frames in the whole render.
    pub total_frames: u64,
}

impl RenderProgress {
    /// Completion in `[0, 1]`.
    pub fn fraction(&self) -> f32 {
        if self.total_frames == 0 {
            return 1.0;
        }
        self.frame as f32 / self.total_frames as f32
    }
}

/// An encoded video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedVideo {
    /// Mime type of `bytes`.
    pub mime_type: String,
    /// Complete encoded stream.
    pub bytes: Vec<u8>,
    /// Frames in the stream.
    pub frame_count: u64,
}

/// Render every frame of `source`.
pub fn render<S, F>(
    source: &mut S,
    options: &RenderOptions,
    cancel: &CancellationToken,
    mut progress: F,
) -> Result<RenderedVideo, RenderError>
where
    S: FrameSource + ?Sized,
    F: FnMut(RenderProgress),
{
    options.validate()?;
    let duration_ms = source.duration_ms();
    let total_frames = options.total_frames(duration_ms);
    if total_frames == 0 {
        return Err(RenderError::EmptyRecording);
    }

    let mut encoder = select_encoder(
        options.mime_preferences.as_slice(),
        options.width,
        options.height,
        options.fps,
    )?;
    let mime_type = encoder.mime_type().to_string();
    let mut surface = RasterSurface::new(options.width, options.height, source.canvas());
    let frame_ms = options.frame_duration_ms();
    let yield_every = options.yield_every.max(1) as u64;

    tracing::info!(
        total_frames,
        duration_ms,
        width = options.width,
        height = options.height,
        fps = options.fps,
        mime = %mime_type,
        "render started"
    );

    for frame in 0..total_frames {
        if cancel.is_cancelled() {
            tracing::info!(frame, total_frames, "render cancelled");
            return Err(RenderError::Cancelled);
        }

        source.advance_to(frame as f64 * frame_ms);
        begin_frame(&mut surface, options.background, &source.effects());
        source.draw(&mut surface);
        encoder.push_frame(surface.image())?;

        let done = frame + 1;
        progress(RenderProgress {
            frame: done,
            total_frames,
        });
        if done % yield_every == 0 {
            tracing::trace!(frame = done, total_frames, "render progress");
            std::thread::yield_now();
        }
    }

    if cancel.is_cancelled() {
        tracing::info!(total_frames, "render cancelled before finalizing");
        return Err(RenderError::Cancelled);
    }
    let bytes = encoder.finish()?;
    tracing::info!(total_frames, bytes = bytes.len(), "render finished");

    Ok(RenderedVideo {
        mime_type,
        bytes,
        frame_count: total_frames,
    })
}

/// Replay `recording` on a fixed timestep and render it.
pub fn render_recording<F>(
    recording: Arc<AnimationRecording>,
    options: &RenderOptions,
    cancel: &CancellationToken,
    progress: F,
) -> Result<RenderedVideo, RenderError>
where
    F: FnMut(RenderProgress),
{
    options.validate()?;
    let config = ReplayConfig::with_oversample(options.fps, options.oversample);
    let mut driver = ReplayDriver::new(recording, config)?;
    render(&mut driver, options, cancel, progress)
}
