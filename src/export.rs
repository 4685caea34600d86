//! Export strategies.
//!
//! Two ways to turn a finished session into a video, behind one trait:
//!
//! - [`ReplayExporter`] re-simulates an [`AnimationRecording`] on a fixed
//!   timestep. Full fidelity at any output size or frame rate.
//! - [`StateSampleExporter`] plays back captured particle snapshots. Cheap,
//!   but limited to what the live loop saw at its capture rate.

use glam::Vec2;
use std::sync::Arc;

use crate::error::RenderError;
use crate::recording::AnimationRecording;
use crate::render::{
    render, render_recording, CancellationToken, RenderOptions, RenderProgress, RenderedVideo,
};
use crate::state_sample::{RecordedFrame, StatePlayback};
use crate::visuals::VisualEffects;

/// Produces a video from some captured session.
pub trait Exporter {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Render the whole capture.
    fn export(
        &self,
        options: &RenderOptions,
        cancel: &CancellationToken,
        progress: &mut dyn FnMut(RenderProgress),
    ) -> Result<RenderedVideo, RenderError>;
}

/// Event replay.
#[derive(Debug, Clone)]
pub struct ReplayExporter {
    recording: Arc<AnimationRecording>,
}

impl ReplayExporter {
    pub fn new(recording: impl Into<Arc<AnimationRecording>>) -> Self {
        Self {
            recording: recording.into(),
        }
    }

    pub fn recording(&self) -> &AnimationRecording {
        &self.recording
    }
}

impl Exporter for ReplayExporter {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn export(
        &self,
        options: &RenderOptions,
        cancel: &CancellationToken,
        progress: &mut dyn FnMut(RenderProgress),
    ) -> Result<RenderedVideo, RenderError> {
        tracing::debug!(exporter = self.name(), "export requested");
        render_recording(Arc::clone(&self.recording), options, cancel, progress)
    }
}

/// State-sample playback.
#[derive(Debug, Clone)]
pub struct StateSampleExporter {
    frames: Vec<RecordedFrame>,
    canvas: Vec2,
    effects: VisualEffects,
}

impl StateSampleExporter {
    pub fn new(frames: Vec<RecordedFrame>, canvas: Vec2, effects: VisualEffects) -> Self {
        Self {
            frames,
            canvas,
            effects,
        }
    }
}

impl Exporter for StateSampleExporter {
    fn name(&self) -> &'static str {
        "state-sample"
    }

    fn export(
        &self,
        options: &RenderOptions,
        cancel: &CancellationToken,
        progress: &mut dyn FnMut(RenderProgress),
    ) -> Result<RenderedVideo, RenderError> {
        tracing::debug!(
            exporter = self.name(),
            frames = self.frames.len(),
            "export requested"
        );
        let mut playback =
            StatePlayback::new(self.frames.clone(), self.canvas, self.effects.clone());
        render(&mut playback, options, cancel, progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{RawStreamHeader, MIME_RAW_RGBA};
    use crate::particle::Particle;
    use crate::settings::Settings;
    use crate::source::SourceImage;
    use crate::visuals::{ParticleShape, Rgb};

    fn raw_options() -> RenderOptions {
        RenderOptions::new(16, 16, 10.0).with_mime_preferences([MIME_RAW_RGBA])
    }

    #[test]
    fn test_strategies_share_one_interface() {
        let image = SourceImage::solid(8, 8, Rgb::WHITE).unwrap();
        let recording = AnimationRecording::new(
            Settings::default(),
            Vec2::new(16.0, 16.0),
            image,
            500.0,
            Vec::new(),
        );
        let frames = (0..=5)
            .map(|i| RecordedFrame {
                timestamp_ms: i as f64 * 100.0,
                particles: vec![Particle::new(
                    Vec2::new(i as f32 * 2.0, 8.0),
                    Rgb::WHITE,
                    2.0,
                    ParticleShape::Square,
                )
                .snapshot()],
            })
            .collect();

        let exporters: Vec<Box<dyn Exporter>> = vec![
            Box::new(ReplayExporter::new(recording)),
            Box::new(StateSampleExporter::new(
                frames,
                Vec2::new(16.0, 16.0),
                VisualEffects::default(),
            )),
        ];
        for exporter in &exporters {
            let mut last = 0;
            let video = exporter
                .export(&raw_options(), &CancellationToken::new(), &mut |p| last = p.frame)
                .unwrap();
            assert_eq!(video.frame_count, 5, "{}", exporter.name());
            assert_eq!(last, 5);
            let header = RawStreamHeader::parse(&video.bytes).unwrap();
            assert_eq!(header.width, 16);
        }
    }

    #[test]
    fn test_empty_state_capture() {
        let exporter = StateSampleExporter::new(Vec::new(), Vec2::ONE, VisualEffects::default());
        let result = exporter.export(&raw_options(), &CancellationToken::new(), &mut |_| {});
        assert!(matches!(result, Err(RenderError::EmptyRecording)));
    }
}
