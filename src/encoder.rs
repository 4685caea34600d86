//! Media encoders.
//!
//! The render pipeline hands finished frames to a [`MediaEncoder`] and gets
//! encoded bytes back at the end. Which encoder is used is decided by walking
//! a mime-type priority list and taking the first one available here.
//!
//! # Available Formats
//!
//! | Mime type | Encoder |
//! |-----------|---------|
//! | `image/gif` | Animated GIF, looping forever |
//! | `video/x-raw-rgba` | Uncompressed RGBA frames behind a small header |
//!
//! Anything else (`video/webm`, `video/mp4`, ...) is skipped so a caller can
//! list its preferred container first and still get output.

use bytemuck::{Pod, Zeroable};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use crate::error::RenderError;

/// Animated GIF.
pub const MIME_GIF: &str = "image/gif";

/// Raw RGBA frame stream.
pub const MIME_RAW_RGBA: &str = "video/x-raw-rgba";

/// Formats this build can produce.
pub const SUPPORTED_MIME_TYPES: &[&str] = &[MIME_GIF, MIME_RAW_RGBA];

/// Priority list used when the caller gives none.
pub const DEFAULT_MIME_PREFERENCES: &[&str] =
    &["video/webm;codecs=vp9", "video/webm", "video/mp4", MIME_GIF, MIME_RAW_RGBA];

/// GIF quantizer speed (1 is best quality, 30 is fastest).
const GIF_SPEED: i32 = 10;

/// Accepts frames, produces an encoded byte stream.
pub trait MediaEncoder: Send {
    /// Mime type of the output.
    fn mime_type(&self) -> &'static str;

    /// Append one frame. Every frame has the size the encoder was created with.
    fn push_frame(&mut self, frame: &RgbaImage) -> Result<(), RenderError>;

    /// Finish the stream and return its bytes.
    fn finish(self: Box<Self>) -> Result<Vec<u8>, RenderError>;
}

/// Mime type without parameters, lowercased.
fn essence(mime: &str) -> String {
    mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase()
}

/// Whether an encoder exists for `mime`.
pub fn is_supported(mime: &str) -> bool {
    let essence = essence(mime);
    SUPPORTED_MIME_TYPES.iter().any(|m| *m == essence)
}

/// Create the encoder for `mime`, or `None` if there is none.
pub fn create_encoder(
    mime: &str,
    width: u32,
    height: u32,
    fps: f64,
) -> Option<Result<Box<dyn MediaEncoder>, RenderError>> {
    match essence(mime).as_str() {
        MIME_GIF => Some(GifStreamEncoder::new(width, height, fps).map(|e| Box::new(e) as _)),
        MIME_RAW_RGBA => Some(Ok(Box::new(RawRgbaEncoder::new(width, height, fps)))),
        _ => None,
    }
}

/// First available encoder in `preferences`.
pub fn select_encoder<S: AsRef<str>>(
    preferences: &[S],
    width: u32,
    height: u32,
    fps: f64,
) -> Result<Box<dyn MediaEncoder>, RenderError> {
    for mime in preferences {
        let mime = mime.as_ref();
        match create_encoder(mime, width, height, fps) {
            Some(Ok(encoder)) => {
                tracing::info!(mime, width, height, fps, "encoder selected");
                return Ok(encoder);
            }
            Some(Err(e)) => {
                tracing::warn!(mime, error = %e, "encoder failed to start, trying next");
            }
            None => tracing::debug!(mime, "no encoder for mime type"),
        }
    }
    Err(RenderError::UnsupportedFormat {
        requested: preferences.iter().map(|m| m.as_ref().to_string()).collect(),
    })
}

/// `Write` into a buffer that stays reachable after the writer is moved.
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn take(&self) -> Result<Vec<u8>, RenderError> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| RenderError::Encoder("output buffer poisoned".into()))?;
        Ok(std::mem::take(&mut *guard))
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "output buffer poisoned"))?;
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Looping animated GIF.
pub struct GifStreamEncoder {
    encoder: GifEncoder<SharedBuffer>,
    output: SharedBuffer,
    delay: Delay,
    width: u32,
    height: u32,
}

impl GifStreamEncoder {
    pub fn new(width: u32, height: u32, fps: f64) -> Result<Self, RenderError> {
        if width > u16::MAX as u32 || height > u16::MAX as u32 {
            return Err(RenderError::Encoder(format!(
                "GIF frames are limited to 65535 px, got {}x{}",
                width, height
            )));
        }
        let output = SharedBuffer::default();
        let mut encoder = GifEncoder::new_with_speed(output.clone(), GIF_SPEED);
        encoder.set_repeat(Repeat::Infinite)?;
        let fps = fps.round().clamp(1.0, 100.0) as u32;
        Ok(Self {
            encoder,
            output,
            delay: Delay::from_numer_denom_ms(1000, fps),
            width,
            height,
        })
    }
}

impl MediaEncoder for GifStreamEncoder {
    fn mime_type(&self) -> &'static str {
        MIME_GIF
    }

    fn push_frame(&mut self, frame: &RgbaImage) -> Result<(), RenderError> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(RenderError::Encoder(format!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }
        self.encoder
            .encode_frame(Frame::from_parts(frame.clone(), 0, 0, self.delay))?;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, RenderError> {
        let GifStreamEncoder {
            encoder, output, ..
        } = *self;
        // The trailer is written when the encoder is dropped
        drop(encoder);
        output.take()
    }
}

/// Header written in front of a raw RGBA stream.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct RawStreamHeader {
    /// Always `RAW_MAGIC`.
    pub magic: [u8; 4],
    pub version: u32,
    pub width: u32,
    pub height: u32,
    /// Frame rate times 1000.
    pub fps_milli: u32,
    pub frame_count: u32,
}

/// Magic bytes at the start of a raw stream.
pub const RAW_MAGIC: [u8; 4] = *b"SWRM";

impl RawStreamHeader {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<RawStreamHeader>();

    /// Read the header from the start of a raw stream.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let head = bytes.get(..Self::SIZE)?;
        let header: Self = bytemuck::pod_read_unaligned(head);
        (header.magic == RAW_MAGIC).then_some(header)
    }
}

/// Uncompressed frames, mostly for piping into an external encoder.
pub struct RawRgbaEncoder {
    header: RawStreamHeader,
    frames: Vec<u8>,
}

impl RawRgbaEncoder {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            header: RawStreamHeader {
                magic: RAW_MAGIC,
                version: 1,
                width,
                height,
                fps_milli: (fps * 1000.0).round().max(0.0) as u32,
                frame_count: 0,
            },
            frames: Vec::new(),
        }
    }
}

impl MediaEncoder for RawRgbaEncoder {
    fn mime_type(&self) -> &'static str {
        MIME_RAW_RGBA
    }

    fn push_frame(&mut self, frame: &RgbaImage) -> Result<(), RenderError> {
        if frame.dimensions() != (self.header.width, self.header.height) {
            return Err(RenderError::Encoder(format!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width(),
                frame.height(),
                self.header.width,
                self.header.height
            )));
        }
        self.frames.extend_from_slice(frame.as_raw());
        self.header.frame_count += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, RenderError> {
        let mut out = Vec::with_capacity(RawStreamHeader::SIZE + self.frames.len());
        out.extend_from_slice(bytemuck::bytes_of(&self.header));
        out.extend_from_slice(&self.frames);
        Ok(out)
    }
}
