//! Seed images and particle seeding.
//!
//! A [`SourceImage`] is a plain RGBA buffer. Seeding fits it to the canvas
//! (preserving aspect ratio, centred, then scaled by `image_scale`) and drops
//! one particle every `particle_gap` canvas pixels wherever the image is
//! opaque enough.
//!
//! # Quick Start
//!
//! ```ignore
//! use swarmcast::prelude::*;
//!
//! let image = SourceImage::from_file("assets/logo.png")?;
//! let particles = seed_particles(&image, Vec2::new(800.0, 600.0), &Settings::default())?;
//! ```

use glam::Vec2;
use image::{ImageEncoder, RgbaImage};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

use crate::error::SeedError;
use crate::particle::Particle;
use crate::settings::Settings;
use crate::visuals::Rgb;

/// Pixels with alpha below this are treated as empty.
pub const ALPHA_THRESHOLD: u8 = 128;

/// Raw RGBA image used to seed particles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl SourceImage {
    /// Create a source image from raw RGBA data.
    ///
    /// # Example
    ///
    /// ```ignore
    /// // 2x1 image: one red pixel, one transparent pixel
    /// let image = SourceImage::from_rgba(vec![255, 0, 0, 255, 0, 0, 0, 0], 2, 1)?;
    /// ```
    pub fn from_rgba(rgba: Vec<u8>, width: u32, height: u32) -> Result<Self, SeedError> {
        if width == 0 || height == 0 {
            return Err(SeedError::EmptyImage);
        }
        if rgba.len() != width as usize * height as usize * 4 {
            return Err(SeedError::InvalidDimensions {
                width,
                height,
                len: rgba.len(),
            });
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    /// Decode PNG or JPEG bytes.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, SeedError> {
        let img = image::load_from_memory(bytes)?.into_rgba8();
        Self::from_rgba_image(img)
    }

    /// Load an image file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SeedError> {
        let img = image::open(path.as_ref())?.into_rgba8();
        Self::from_rgba_image(img)
    }

    /// Wrap an already decoded image.
    pub fn from_rgba_image(img: RgbaImage) -> Result<Self, SeedError> {
        let (width, height) = img.dimensions();
        Self::from_rgba(img.into_raw(), width, height)
    }

    /// Solid colour image.
    pub fn solid(width: u32, height: u32, color: Rgb) -> Result<Self, SeedError> {
        let pixel = [color.r, color.g, color.b, 255];
        let rgba = pixel
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::from_rgba(rgba, width, height)
    }

    /// Two-colour checkerboard with square cells of `cell` pixels.
    pub fn checkerboard(
        width: u32,
        height: u32,
        cell: u32,
        a: Rgb,
        b: Rgb,
    ) -> Result<Self, SeedError> {
        let cell = cell.max(1);
        let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                let c = if (x / cell + y / cell) % 2 == 0 { a } else { b };
                rgba.extend_from_slice(&[c.r, c.g, c.b, 255]);
            }
        }
        Self::from_rgba(rgba, width, height)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes, row-major.
    #[inline]
    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// Pixel at `(x, y)`, or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.rgba.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Encode as PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>, SeedError> {
        let mut out = Vec::new();
        image::codecs::png::PngEncoder::new(&mut out).write_image(
            &self.rgba,
            self.width,
            self.height,
            image::ExtendedColorType::Rgba8,
        )?;
        Ok(out)
    }
}

/// Where the image lands on the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedLayout {
    /// Canvas pixels per image pixel.
    pub scale: f32,
    /// Canvas position of the image's top-left corner.
    pub offset: Vec2,
    /// Size of the drawn image in canvas pixels.
    pub size: Vec2,
}

impl SeedLayout {
    /// Fit `image` inside `canvas`, centred, then apply `image_scale`.
    pub fn fit(image: &SourceImage, canvas: Vec2, image_scale: f32) -> Self {
        let img = Vec2::new(image.width as f32, image.height as f32);
        let fit = (canvas.x / img.x).min(canvas.y / img.y);
        let scale = (fit * image_scale).max(f32::MIN_POSITIVE);
        let size = img * scale;
        Self {
            scale,
            offset: (canvas - size) * 0.5,
            size,
        }
    }

    /// Image pixel under a canvas position.
    #[inline]
    pub fn image_pixel(&self, canvas_pos: Vec2) -> (u32, u32) {
        let p = ((canvas_pos - self.offset) / self.scale).max(Vec2::ZERO);
        (p.x as u32, p.y as u32)
    }
}

/// Build the particle store for an image.
///
/// One particle per `particle_gap` canvas pixels on a regular grid over the
/// fitted image. Transparent pixels are skipped. Healing multipliers, when
/// enabled, come from a generator seeded with `settings.seed` so the same
/// inputs always produce the same store.
pub fn seed_particles(
    image: &SourceImage,
    canvas: Vec2,
    settings: &Settings,
) -> Result<Vec<Particle>, SeedError> {
    if canvas.x < 1.0 || canvas.y < 1.0 {
        return Err(SeedError::EmptyImage);
    }
    let layout = SeedLayout::fit(image, canvas, settings.image_scale);
    let gap = settings.particle_gap.max(1.0);
    let cols = (layout.size.x / gap).floor() as u32;
    let rows = (layout.size.y / gap).floor() as u32;

    let mut rng = SmallRng::seed_from_u64(settings.seed);
    let variance = settings.healing_variance.max(0.0);
    let mut particles = Vec::with_capacity(cols as usize * rows as usize);

    for row in 0..rows {
        for col in 0..cols {
            let pos = layout.offset + Vec2::new(col as f32 + 0.5, row as f32 + 0.5) * gap;
            let (px, py) = layout.image_pixel(pos);
            let Some([r, g, b, a]) = image.pixel(px, py) else {
                continue;
            };
            if a < ALPHA_THRESHOLD {
                continue;
            }
            let color = Rgb::new(r, g, b);
            let mut particle = Particle::new(pos, color, settings.particle_size, settings.shape);
            particle.visible = settings.color_filter.accepts(&color);
            if variance > 0.0 {
                let spread = rng.gen_range(-variance..variance);
                particle.healing_multiplier = Some((1.0 + spread).max(0.1));
            }
            particles.push(particle);
        }
    }

    tracing::debug!(
        count = particles.len(),
        cols,
        rows,
        scale = layout.scale,
        "seeded particles"
    );
    Ok(particles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgba_validates_size() {
        assert!(SourceImage::from_rgba(vec![0; 16], 2, 2).is_ok());
        assert!(matches!(
            SourceImage::from_rgba(vec![0; 15], 2, 2),
            Err(SeedError::InvalidDimensions { len: 15, .. })
        ));
        assert!(matches!(
            SourceImage::from_rgba(Vec::new(), 0, 4),
            Err(SeedError::EmptyImage)
        ));
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let result = SourceImage::from_encoded(b"definitely not an image");
        assert!(matches!(result, Err(SeedError::Decode(_))));
    }

    #[test]
    fn test_png_round_trip() {
        let image = SourceImage::checkerboard(8, 4, 2, Rgb::WHITE, Rgb::BLACK).unwrap();
        let png = image.encode_png().unwrap();
        let decoded = SourceImage::from_encoded(&png).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_seed_one_particle_per_pixel() {
        let image = SourceImage::checkerboard(10, 10, 1, Rgb::WHITE, Rgb::BLACK).unwrap();
        let settings = Settings {
            particle_gap: 1.0,
            ..Default::default()
        };
        let particles = seed_particles(&image, Vec2::new(10.0, 10.0), &settings).unwrap();
        assert_eq!(particles.len(), 100);
        assert_eq!(particles[0].position, Vec2::new(0.5, 0.5));
        assert_eq!(particles[0].color, Rgb::WHITE);
        assert_eq!(particles[1].color, Rgb::BLACK);
    }

    #[test]
    fn test_seed_fits_and_centres() {
        // 2:1 image on a square canvas is letterboxed vertically
        let image = SourceImage::solid(20, 10, Rgb::WHITE).unwrap();
        let layout = SeedLayout::fit(&image, Vec2::new(100.0, 100.0), 1.0);
        assert_eq!(layout.scale, 5.0);
        assert_eq!(layout.offset, Vec2::new(0.0, 25.0));
    }

    #[test]
    fn test_transparent_pixels_skipped() {
        let rgba = vec![255, 0, 0, 255, 0, 0, 0, 0];
        let image = SourceImage::from_rgba(rgba, 2, 1).unwrap();
        let settings = Settings {
            particle_gap: 1.0,
            ..Default::default()
        };
        let particles = seed_particles(&image, Vec2::new(2.0, 1.0), &settings).unwrap();
        assert_eq!(particles.len(), 1);
    }

    #[test]
    fn test_healing_variance_is_seeded() {
        let image = SourceImage::solid(8, 8, Rgb::WHITE).unwrap();
        let settings = Settings {
            particle_gap: 1.0,
            healing_variance: 0.5,
            ..Default::default()
        };
        let a = seed_particles(&image, Vec2::new(8.0, 8.0), &settings).unwrap();
        let b = seed_particles(&image, Vec2::new(8.0, 8.0), &settings).unwrap();
        assert_eq!(a, b);
        assert!(a.iter().all(|p| p.healing_multiplier.is_some()));
    }
}
