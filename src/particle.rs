//! The particle record and its visual-only snapshot.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::visuals::{ParticleShape, Rgb};

/// A single particle sampled from the seed image.
///
/// `rest_position` is fixed at creation and acts as the attractor for the
/// restoration force. `visible` is derived from the colour filter only; physics
/// never touches it.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Current position in canvas pixels.
    pub position: Vec2,
    /// Seeded position, never mutated after creation.
    rest_position: Vec2,
    /// Velocity in pixels per nominal frame.
    pub velocity: Vec2,
    /// Colour sampled from the source pixel.
    pub color: Rgb,
    /// Draw size in pixels.
    pub size: f32,
    /// Draw shape.
    pub shape: ParticleShape,
    /// Whether the colour filter lets this particle through.
    pub visible: bool,
    /// Optional per-particle scale on the restoration force.
    pub healing_multiplier: Option<f32>,
}

impl Particle {
    /// Create a particle at rest at `position`.
    pub fn new(position: Vec2, color: Rgb, size: f32, shape: ParticleShape) -> Self {
        Self {
            position,
            rest_position: position,
            velocity: Vec2::ZERO,
            color,
            size,
            shape,
            visible: true,
            healing_multiplier: None,
        }
    }

    /// The seeded position this particle returns to.
    #[inline]
    pub fn rest_position(&self) -> Vec2 {
        self.rest_position
    }

    /// Distance from the rest position.
    #[inline]
    pub fn displacement(&self) -> f32 {
        self.position.distance(self.rest_position)
    }

    /// Visual-only snapshot used by the state-sample export path.
    pub fn snapshot(&self) -> ParticleSnapshot {
        ParticleSnapshot {
            x: self.position.x,
            y: self.position.y,
            color: self.color,
            size: self.size,
            shape: self.shape,
            visible: self.visible,
        }
    }
}

/// Lossy visual snapshot of a particle.
///
/// Velocity and rest position are intentionally absent: a snapshot can be
/// drawn and interpolated but not re-simulated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleSnapshot {
    /// X position in canvas pixels.
    pub x: f32,
    /// Y position in canvas pixels.
    pub y: f32,
    /// Particle colour.
    pub color: Rgb,
    /// Draw size.
    pub size: f32,
    /// Draw shape.
    pub shape: ParticleShape,
    /// Colour-filter visibility.
    pub visible: bool,
}

impl ParticleSnapshot {
    /// Position as a vector.
    #[inline]
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}
