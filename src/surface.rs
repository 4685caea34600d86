//! Drawing surfaces.
//!
//! The engine draws through the [`Surface`] trait and only ever issues shape
//! fills. Coordinates are canvas pixels; a surface maps them onto whatever it
//! actually rasterizes to. [`RasterSurface`] is the in-memory implementation
//! used for video frames and headless rendering.

use glam::Vec2;
use image::{Rgba, RgbaImage};

use crate::visuals::{BlendMode, ParticleShape, Rgb, VisualEffects};

/// Something particles can be drawn on.
pub trait Surface {
    /// Canvas size in canvas pixels.
    fn size(&self) -> Vec2;

    /// Fill everything with an opaque colour.
    fn clear(&mut self, color: Rgb);

    /// Blend a colour over everything (used for trails).
    fn fade(&mut self, color: Rgb, alpha: f32);

    /// Blend mode for subsequent fills.
    fn set_blend_mode(&mut self, mode: BlendMode);

    /// Filled circle.
    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgb, alpha: f32);

    /// Axis-aligned filled square of side `2 * half`.
    fn fill_square(&mut self, center: Vec2, half: f32, color: Rgb, alpha: f32);

    /// Upward equilateral triangle with circumradius `radius`.
    fn fill_triangle(&mut self, center: Vec2, radius: f32, color: Rgb, alpha: f32);
}

/// Start a frame: clear, or fade when trails are on.
pub fn begin_frame(surface: &mut dyn Surface, background: Rgb, effects: &VisualEffects) {
    surface.set_blend_mode(BlendMode::Alpha);
    if effects.trails {
        let persistence = effects.trail_persistence.clamp(0.0, 1.0);
        surface.fade(background, 1.0 - persistence);
    } else {
        surface.clear(background);
    }
}

/// Draw one particle with optional glow.
pub fn draw_particle(
    surface: &mut dyn Surface,
    shape: ParticleShape,
    position: Vec2,
    size: f32,
    color: Rgb,
    effects: &VisualEffects,
) {
    let radius = (size * 0.5).max(0.5);
    if effects.glow {
        surface.fill_circle(
            position,
            radius * effects.glow_radius.max(1.0),
            color,
            effects.glow_intensity.clamp(0.0, 1.0),
        );
    }
    match shape {
        ParticleShape::Circle => surface.fill_circle(position, radius, color, 1.0),
        ParticleShape::Square => surface.fill_square(position, radius, color, 1.0),
        ParticleShape::Triangle => surface.fill_triangle(position, radius * 1.2, color, 1.0),
    }
}

/// CPU raster surface backed by an [`RgbaImage`].
///
/// The canvas is fitted into the output preserving aspect ratio and centred,
/// so a 800x600 canvas renders correctly into a 1920x1080 video.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    image: RgbaImage,
    canvas: Vec2,
    scale: f32,
    offset: Vec2,
    blend: BlendMode,
}

impl RasterSurface {
    /// Create a `width` x `height` output for a canvas of `canvas` pixels.
    pub fn new(width: u32, height: u32, canvas: Vec2) -> Self {
        let out = Vec2::new(width as f32, height as f32);
        let canvas = canvas.max(Vec2::ONE);
        let scale = (out.x / canvas.x).min(out.y / canvas.y);
        Self {
            image: RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255])),
            canvas,
            scale,
            offset: (out - canvas * scale) * 0.5,
            blend: BlendMode::Alpha,
        }
    }

    /// The rendered pixels.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    #[inline]
    fn to_output(&self, p: Vec2) -> Vec2 {
        self.offset + p * self.scale
    }

    fn blend_pixel(&mut self, x: u32, y: u32, color: Rgb, alpha: f32) {
        let blend = self.blend;
        let px = self.image.get_pixel_mut(x, y);
        let src = [color.r, color.g, color.b];
        for c in 0..3 {
            let dst = px.0[c] as f32;
            let s = src[c] as f32;
            let out = match blend {
                BlendMode::Alpha => dst + (s - dst) * alpha,
                BlendMode::Additive => dst + s * alpha,
            };
            px.0[c] = out.round().clamp(0.0, 255.0) as u8;
        }
        px.0[3] = 255;
    }

    /// Fill every output pixel whose centre passes `inside`, within a bounding box.
    ///
    /// Shapes smaller than a pixel still light the pixel under their centre.
    fn fill_where<F>(&mut self, center: Vec2, extent: f32, color: Rgb, alpha: f32, inside: F)
    where
        F: Fn(Vec2) -> bool,
    {
        let alpha = alpha.clamp(0.0, 1.0);
        if alpha <= 0.0 {
            return;
        }
        let (w, h) = self.image.dimensions();
        if w == 0 || h == 0 {
            return;
        }
        let c = self.to_output(center);
        let e = extent * self.scale;
        let x0 = (c.x - e).floor().max(0.0) as i64;
        let y0 = (c.y - e).floor().max(0.0) as i64;
        let x1 = ((c.x + e).ceil() as i64).min(w as i64 - 1);
        let y1 = ((c.y + e).ceil() as i64).min(h as i64 - 1);

        let mut covered = false;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let sample = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                if inside((sample - c) / self.scale) {
                    self.blend_pixel(x as u32, y as u32, color, alpha);
                    covered = true;
                }
            }
        }
        if !covered && c.x >= 0.0 && c.y >= 0.0 && c.x < w as f32 && c.y < h as f32 {
            self.blend_pixel(c.x as u32, c.y as u32, color, alpha);
        }
    }
}

impl Surface for RasterSurface {
    fn size(&self) -> Vec2 {
        self.canvas
    }

    fn clear(&mut self, color: Rgb) {
        for px in self.image.pixels_mut() {
            *px = Rgba([color.r, color.g, color.b, 255]);
        }
    }

    fn fade(&mut self, color: Rgb, alpha: f32) {
        let alpha = alpha.clamp(0.0, 1.0);
        let src = [color.r as f32, color.g as f32, color.b as f32];
        for px in self.image.pixels_mut() {
            for c in 0..3 {
                let dst = px.0[c] as f32;
                px.0[c] = (dst + (src[c] - dst) * alpha).round() as u8;
            }
        }
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend = mode;
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgb, alpha: f32) {
        let r2 = radius * radius;
        self.fill_where(center, radius, color, alpha, |d| d.length_squared() <= r2);
    }

    fn fill_square(&mut self, center: Vec2, half: f32, color: Rgb, alpha: f32) {
        self.fill_where(center, half, color, alpha, |d| {
            d.x.abs() <= half && d.y.abs() <= half
        });
    }

    fn fill_triangle(&mut self, center: Vec2, radius: f32, color: Rgb, alpha: f32) {
        let half_base = radius * 0.866_025_4;
        let a = Vec2::new(0.0, -radius);
        let b = Vec2::new(half_base, radius * 0.5);
        let c = Vec2::new(-half_base, radius * 0.5);
        let edge = |p: Vec2, q: Vec2, r: Vec2| (q - p).perp_dot(r - p);
        self.fill_where(center, radius, color, alpha, |d| {
            let e0 = edge(a, b, d);
            let e1 = edge(b, c, d);
            let e2 = edge(c, a, d);
            (e0 >= 0.0 && e1 >= 0.0 && e2 >= 0.0) || (e0 <= 0.0 && e1 <= 0.0 && e2 <= 0.0)
        });
    }
}
