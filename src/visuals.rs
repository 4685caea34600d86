//! Visual attributes for particle rendering.
//!
//! These types control how particles appear, separate from the forces that
//! control how they move. The engine only ever issues shape fills; blending,
//! glow and trails are interpreted by the [`Surface`](crate::surface::Surface).

use serde::{Deserialize, Serialize};

/// An 8-bit RGB colour sampled from the seed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Opaque black.
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    /// Opaque white.
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    /// Create a colour from its channels.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a `#rrggbb` or `rrggbb` hex string.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Euclidean distance in RGB space (0 to ~441.7).
    pub fn distance(&self, other: &Rgb) -> f32 {
        let dr = self.r as f32 - other.r as f32;
        let dg = self.g as f32 - other.g as f32;
        let db = self.b as f32 - other.b as f32;
        (dr * dr + dg * dg + db * db).sqrt()
    }

    /// Linear interpolation between two colours.
    pub fn lerp(&self, other: &Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgb::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }
}

/// Particle shape for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticleShape {
    /// Filled circle (default).
    #[default]
    Circle,

    /// Axis-aligned square.
    Square,

    /// Equilateral triangle pointing up.
    Triangle,
}

/// Blend mode for particle rendering.
///
/// Controls how particle colors combine with the background and each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    /// Standard alpha blending (default).
    #[default]
    Alpha,

    /// Additive blending.
    ///
    /// Particle colors are added together, so overlapping particles become
    /// brighter. Expensive on large canvases; the adaptive controller turns it
    /// off when the frame rate collapses.
    Additive,
}

/// Visual effect toggles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualEffects {
    /// Fade the previous frame instead of clearing it.
    pub trails: bool,
    /// How much of the previous frame is kept per frame when trails are on (0-1).
    pub trail_persistence: f32,
    /// Draw a soft halo behind each particle.
    pub glow: bool,
    /// Halo radius as a multiple of particle size.
    pub glow_radius: f32,
    /// Halo opacity (0-1).
    pub glow_intensity: f32,
    /// Use additive blending for particles.
    pub additive_blend: bool,
}

impl Default for VisualEffects {
    fn default() -> Self {
        Self {
            trails: false,
            trail_persistence: 0.8,
            glow: false,
            glow_radius: 2.5,
            glow_intensity: 0.25,
            additive_blend: false,
        }
    }
}

impl VisualEffects {
    /// Blend mode implied by these effects.
    pub fn blend_mode(&self) -> BlendMode {
        if self.additive_blend {
            BlendMode::Additive
        } else {
            BlendMode::Alpha
        }
    }

    /// Whether any effect that costs extra fill rate is on.
    pub fn is_expensive(&self) -> bool {
        self.glow || self.additive_blend
    }
}
