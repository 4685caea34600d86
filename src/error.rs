//! Error types for swarmcast.
//!
//! This module provides error types for image seeding, settings patches,
//! recording import/export and video rendering.

use std::fmt;

/// Errors that can occur while seeding particles from an image.
///
/// When seeding fails the engine is left with no particles rather than
/// a partially built store.
#[derive(Debug)]
pub enum SeedError {
    /// The encoded image bytes could not be decoded.
    Decode(image::ImageError),
    /// Raw RGBA data does not match the declared dimensions.
    InvalidDimensions {
        /// Declared width in pixels.
        width: u32,
        /// Declared height in pixels.
        height: u32,
        /// Actual number of bytes supplied.
        len: usize,
    },
    /// The image has a zero-sized dimension.
    EmptyImage,
}

impl fmt::Display for SeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedError::Decode(e) => write!(f, "Failed to decode seed image: {}", e),
            SeedError::InvalidDimensions { width, height, len } => write!(
                f,
                "RGBA data size mismatch: {}x{} needs {} bytes, got {}",
                width,
                height,
                *width as usize * *height as usize * 4,
                len
            ),
            SeedError::EmptyImage => write!(f, "Seed image has no pixels"),
        }
    }
}

impl std::error::Error for SeedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SeedError::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<image::ImageError> for SeedError {
    fn from(e: image::ImageError) -> Self {
        SeedError::Decode(e)
    }
}

/// Errors that can occur when merging a partial settings update.
#[derive(Debug)]
pub enum SettingsError {
    /// The patch could not be merged into a valid settings snapshot.
    Json(serde_json::Error),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Json(e) => write!(f, "Invalid settings patch: {}", e),
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsError::Json(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(e: serde_json::Error) -> Self {
        SettingsError::Json(e)
    }
}

/// Errors that can occur while importing or exporting a recording.
#[derive(Debug)]
pub enum RecordingError {
    /// The recording JSON is malformed.
    Json(serde_json::Error),
    /// The embedded image is not valid base64.
    Base64(base64::DecodeError),
    /// The embedded image could not be encoded or decoded.
    Image(SeedError),
    /// The recording was written by an incompatible format version.
    UnsupportedVersion(u32),
    /// Reading or writing the recording file failed.
    Io(std::io::Error),
    /// Recording was requested before any image was seeded.
    NotSeeded,
}

impl fmt::Display for RecordingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingError::Json(e) => write!(f, "Malformed recording: {}", e),
            RecordingError::Base64(e) => write!(f, "Recording image is not valid base64: {}", e),
            RecordingError::Image(e) => write!(f, "Recording image error: {}", e),
            RecordingError::UnsupportedVersion(v) => {
                write!(f, "Unsupported recording format version {}", v)
            }
            RecordingError::Io(e) => write!(f, "Recording I/O error: {}", e),
            RecordingError::NotSeeded => write!(f, "Nothing to record: no image has been seeded"),
        }
    }
}

impl std::error::Error for RecordingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecordingError::Json(e) => Some(e),
            RecordingError::Base64(e) => Some(e),
            RecordingError::Image(e) => Some(e),
            RecordingError::UnsupportedVersion(_) | RecordingError::NotSeeded => None,
            RecordingError::Io(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for RecordingError {
    fn from(e: serde_json::Error) -> Self {
        RecordingError::Json(e)
    }
}

impl From<std::io::Error> for RecordingError {
    fn from(e: std::io::Error) -> Self {
        RecordingError::Io(e)
    }
}

impl From<base64::DecodeError> for RecordingError {
    fn from(e: base64::DecodeError) -> Self {
        RecordingError::Base64(e)
    }
}

impl From<SeedError> for RecordingError {
    fn from(e: SeedError) -> Self {
        RecordingError::Image(e)
    }
}

impl From<image::ImageError> for RecordingError {
    fn from(e: image::ImageError) -> Self {
        RecordingError::Image(SeedError::Decode(e))
    }
}

/// Errors that can occur while rendering a video.
///
/// Cancellation is its own variant so callers can tell a user abort
/// apart from a genuine fault. In every error case the partially encoded
/// output is discarded.
#[derive(Debug)]
pub enum RenderError {
    /// None of the requested mime types has an available encoder.
    UnsupportedFormat {
        /// The mime types that were tried, in priority order.
        requested: Vec<String>,
    },
    /// The encoder failed while accepting a frame or finalizing output.
    Encoder(String),
    /// Render options are unusable (zero size or zero fps).
    InvalidOptions(String),
    /// There is nothing to render.
    EmptyRecording,
    /// The recording's seed image could not be turned into particles.
    Seed(SeedError),
    /// The render was cancelled through its cancellation token.
    Cancelled,
}

impl RenderError {
    /// Whether this error is a user-initiated cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RenderError::Cancelled)
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::UnsupportedFormat { requested } => write!(
                f,
                "No available encoder for any of: {}",
                requested.join(", ")
            ),
            RenderError::Encoder(msg) => write!(f, "Encoder failure: {}", msg),
            RenderError::InvalidOptions(msg) => write!(f, "Invalid render options: {}", msg),
            RenderError::EmptyRecording => write!(f, "Nothing to render"),
            RenderError::Seed(e) => write!(f, "Could not seed replay: {}", e),
            RenderError::Cancelled => write!(f, "Render cancelled"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Seed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SeedError> for RenderError {
    fn from(e: SeedError) -> Self {
        RenderError::Seed(e)
    }
}

impl From<image::ImageError> for RenderError {
    fn from(e: image::ImageError) -> Self {
        RenderError::Encoder(e.to_string())
    }
}

impl From<std::io::Error> for RenderError {
    fn from(e: std::io::Error) -> Self {
        RenderError::Encoder(e.to_string())
    }
}
