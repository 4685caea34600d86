//! Transient force pulses and their scheduler.
//!
//! A pulse is a time-bounded force effect. Every pulse shares a
//! [`PulseBase`] (timing, strength, easing) and carries a [`PulseKind`]
//! describing the field shape. Pulses compose additively: the scheduler sums
//! the acceleration of every active pulse before the engine adds it to a
//! particle's velocity.
//!
//! # Pulse Categories
//!
//! - **Uniform fields**: Gravity, GravityFlip, Wind, Crosswind, Shear, Waterfall, Quake
//! - **Radial**: Burst, Implosion, Shockwave, Ripple, RingBurst, EdgeBurst, MultiBurst, Supernova
//! - **Rotational**: Tornado, RingSpin, SwirlField, SpiralIn, SpiralOut
//! - **Waves**: WaveLeft, WaveUp
//! - **Noise**: Noise, RandomJitter, Randomize
//! - **Poles**: MagnetPair
//!
//! # Lifecycle
//!
//! A pulse is active the moment [`PulseScheduler::add`] stamps it and expires
//! once `now - started_at_ms >= duration_ms + inertia_ms`. Expired pulses are
//! dropped by [`PulseScheduler::purge`], which the engine calls every step.
//! The scheduler never loops a pulse: [`PulseMode::Continuous`] pulses are
//! kept alive by the caller issuing them again.
//!
//! # Example
//!
//! ```ignore
//! let pulse: ForcePulse = serde_json::from_str(
//!     r#"{ "type": "burst", "duration_ms": 1000, "strength": 50 }"#,
//! )?;
//! engine.add_pulse(pulse);
//! ```

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

use crate::forces::{falloff, hash01, hash_direction, tangent, unit_from, value_noise};
use crate::settings::Rotation;

/// Converts pulse strength (0-100) to px/frame².
pub const PULSE_SCALE: f32 = 0.02;

/// Influence left at the end of the main phase when an inertia tail follows.
pub const INERTIA_RESIDUAL: f32 = 0.35;

/// Easing curve over a pulse's main phase.
///
/// The curve maps progress in `[0, 1]` to how much of the pulse has been
/// "spent". Influence is `1 - ease(progress)`, so every curve yields a
/// non-increasing influence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    /// Influence decays linearly.
    Linear,
    /// Slow start, fast finish.
    EaseIn,
    /// Fast initial drop, long soft finish (default).
    #[default]
    EaseOut,
    /// Smoothstep.
    EaseInOut,
    /// Full influence until the main phase ends.
    Constant,
}

impl Easing {
    /// Apply the curve to progress `x`.
    pub fn apply(self, x: f32) -> f32 {
        let x = x.clamp(0.0, 1.0);
        match self {
            Easing::Linear => x,
            Easing::EaseIn => x * x,
            Easing::EaseOut => 1.0 - (1.0 - x) * (1.0 - x),
            Easing::EaseInOut => x * x * (3.0 - 2.0 * x),
            Easing::Constant => 0.0,
        }
    }
}

/// How a pulse's strength is shaped over its main phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PulseMode {
    /// Eased one-shot kick.
    #[default]
    Impulse,
    /// Flat full influence for the whole duration.
    ///
    /// Hosts holding a pulse button re-issue the pulse before it lapses;
    /// each re-issue is a new pulse.
    Continuous,
}

/// Timing and strength shared by every pulse kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseBase {
    /// Length of the main phase.
    pub duration_ms: f64,
    /// Magnitude (0-100 is the usual range).
    pub strength: f32,
    /// Creation time on the engine's clock. Overwritten when scheduled.
    pub started_at_ms: f64,
    /// Curve over the main phase.
    pub easing: Easing,
    /// Coast tail after the main phase (0 disables it).
    pub inertia_ms: f64,
    /// Impulse or continuous.
    pub mode: PulseMode,
    /// Sequence number assigned by the scheduler; seeds per-pulse randomness.
    pub id: u64,
}

impl Default for PulseBase {
    fn default() -> Self {
        Self {
            duration_ms: 1000.0,
            strength: 50.0,
            started_at_ms: 0.0,
            easing: Easing::EaseOut,
            inertia_ms: 0.0,
            mode: PulseMode::Impulse,
            id: 0,
        }
    }
}

impl PulseBase {
    /// Influence factor at `now_ms`, in `[0, 1]`.
    ///
    /// Depends on elapsed time only. Non-increasing, and zero from
    /// `duration_ms + inertia_ms` onward.
    pub fn influence(&self, now_ms: f64) -> f32 {
        let t = (now_ms - self.started_at_ms).max(0.0);
        let duration = self.duration_ms.max(0.0);
        let inertia = self.inertia_ms.max(0.0);
        let residual = match self.mode {
            PulseMode::Continuous => 1.0,
            PulseMode::Impulse if inertia > 0.0 => INERTIA_RESIDUAL,
            PulseMode::Impulse => 0.0,
        };

        if t < duration {
            match self.mode {
                PulseMode::Continuous => 1.0,
                PulseMode::Impulse => {
                    let progress = (t / duration) as f32;
                    residual + (1.0 - residual) * (1.0 - self.easing.apply(progress))
                }
            }
        } else if t < duration + inertia {
            let tail = 1.0 - ((t - duration) / inertia) as f32;
            residual * tail * tail
        } else {
            0.0
        }
    }

    /// Whether the pulse has run its course.
    #[inline]
    pub fn is_expired(&self, now_ms: f64) -> bool {
        now_ms - self.started_at_ms >= self.duration_ms.max(0.0) + self.inertia_ms.max(0.0)
    }

    /// Elapsed fraction of the main phase, clamped to `[0, 1]`.
    fn progress(&self, now_ms: f64) -> f32 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        (((now_ms - self.started_at_ms) / self.duration_ms) as f32).clamp(0.0, 1.0)
    }
}

fn down() -> Vec2 {
    Vec2::Y
}

fn right() -> Vec2 {
    Vec2::X
}

fn default_frequency() -> f32 {
    1.5
}

fn default_chaos() -> f32 {
    0.5
}

fn default_waves() -> u32 {
    3
}

fn default_turns() -> f32 {
    2.0
}

fn default_cells() -> u32 {
    4
}

fn default_ring_pct() -> f32 {
    25.0
}

fn default_band_px() -> f32 {
    40.0
}

fn default_burst_count() -> u32 {
    3
}

fn default_shock_speed() -> f32 {
    0.6
}

fn default_separation() -> f32 {
    0.5
}

fn default_lift() -> f32 {
    0.3
}

fn default_gust() -> f32 {
    0.3
}

/// Field shape of a pulse.
///
/// Origins are canvas pixels and default to the canvas centre. Radii are a
/// percentage of the smaller canvas side; an absent radius means the pulse
/// applies to the whole canvas at full strength.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PulseKind {
    /// Uniform acceleration along `direction`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// PulseKind::Gravity { direction: Vec2::Y }
    /// ```
    Gravity {
        /// Pull direction (normalised on use).
        #[serde(default = "down")]
        direction: Vec2,
    },

    /// Uniform push with slowly drifting gusts.
    Wind {
        /// Blow direction (normalised on use).
        #[serde(default = "right")]
        direction: Vec2,
        /// How much gusts modulate the push (0-1).
        #[serde(default = "default_gust")]
        gustiness: f32,
    },

    /// Swirl around an origin with an inward draw.
    Tornado {
        /// Eye of the tornado.
        #[serde(default)]
        origin: Option<Vec2>,
        /// Reach, or the whole canvas.
        #[serde(default)]
        radius_pct: Option<f32>,
        /// Spin direction.
        #[serde(default)]
        rotation: Rotation,
        /// Inward pull relative to the swirl.
        #[serde(default = "default_lift")]
        lift: f32,
    },

    /// Expanding ring that shoves particles outward as its front passes.
    Shockwave {
        /// Centre of the ring.
        #[serde(default)]
        origin: Option<Vec2>,
        /// Front speed in pixels per millisecond.
        #[serde(default = "default_shock_speed")]
        speed: f32,
        /// Thickness of the front in pixels.
        #[serde(default = "default_band_px")]
        width: f32,
    },

    /// Canvas-wide turbulence.
    Noise {
        /// Spatial frequency (cycles per 100 px).
        #[serde(default = "default_frequency")]
        frequency: f32,
        /// How fast the field wanders (0-1).
        #[serde(default = "default_chaos")]
        chaos: f32,
    },

    /// Concentric travelling waves.
    Ripple {
        /// Centre of the ripple.
        #[serde(default)]
        origin: Option<Vec2>,
        /// Number of crests across the smaller canvas side.
        #[serde(default = "default_waves")]
        wave_count: u32,
    },

    /// Outward radial push.
    Burst {
        /// Centre of the burst.
        #[serde(default)]
        origin: Option<Vec2>,
        /// Reach, or the whole canvas.
        #[serde(default)]
        radius_pct: Option<f32>,
    },

    /// Inward radial pull.
    Implosion {
        /// Collapse point.
        #[serde(default)]
        origin: Option<Vec2>,
        /// Reach, or the whole canvas.
        #[serde(default)]
        radius_pct: Option<f32>,
    },

    /// Two poles either side of the centre: the left attracts, the right repels.
    MagnetPair {
        /// Pole spacing as a fraction of canvas width.
        #[serde(default = "default_separation")]
        separation: f32,
    },

    /// Downward flow with a sideways sway.
    Waterfall {
        /// Sway frequency (cycles per 100 px).
        #[serde(default = "default_frequency")]
        frequency: f32,
    },

    /// Upward gravity.
    GravityFlip,

    /// Horizontal push proportional to vertical distance from the centre line.
    Shear,

    /// Horizontal push that alternates direction in bands.
    Crosswind {
        /// Number of bands down the canvas.
        #[serde(default = "default_waves")]
        wave_count: u32,
    },

    /// A grid of small vortices.
    SwirlField {
        /// Cells across the smaller canvas side.
        #[serde(default = "default_cells")]
        cells: u32,
        /// Spin direction.
        #[serde(default)]
        rotation: Rotation,
    },

    /// Tangential spin confined to a ring.
    RingSpin {
        /// Ring centre.
        #[serde(default)]
        origin: Option<Vec2>,
        /// Ring radius as a percentage of the smaller side.
        #[serde(default = "default_ring_pct")]
        ring_pct: f32,
        /// Ring thickness in pixels.
        #[serde(default = "default_band_px")]
        width: f32,
        /// Spin direction.
        #[serde(default)]
        rotation: Rotation,
    },

    /// Spiral toward an origin.
    SpiralIn {
        /// Spiral centre.
        #[serde(default)]
        origin: Option<Vec2>,
        /// Tangential weight relative to the radial pull.
        #[serde(default = "default_turns")]
        turns: f32,
    },

    /// Spiral away from an origin.
    SpiralOut {
        /// Spiral centre.
        #[serde(default)]
        origin: Option<Vec2>,
        /// Tangential weight relative to the radial push.
        #[serde(default = "default_turns")]
        turns: f32,
    },

    /// Leftward push with a travelling vertical ripple.
    WaveLeft {
        /// Crests across the canvas width.
        #[serde(default = "default_waves")]
        wave_count: u32,
    },

    /// Upward push with a travelling horizontal ripple.
    WaveUp {
        /// Crests across the canvas height.
        #[serde(default = "default_waves")]
        wave_count: u32,
    },

    /// Fresh random kick per particle every frame.
    RandomJitter,

    /// Brief collapse followed by a violent outward blast.
    Supernova {
        /// Core position.
        #[serde(default)]
        origin: Option<Vec2>,
        /// Reach, or the whole canvas.
        #[serde(default)]
        radius_pct: Option<f32>,
    },

    /// Outward push limited to a ring band.
    RingBurst {
        /// Ring centre.
        #[serde(default)]
        origin: Option<Vec2>,
        /// Ring radius as a percentage of the smaller side.
        #[serde(default = "default_ring_pct")]
        ring_pct: f32,
        /// Ring thickness in pixels.
        #[serde(default = "default_band_px")]
        width: f32,
    },

    /// Push particles near any edge toward the interior.
    EdgeBurst,

    /// Several bursts at pseudo-random origins.
    MultiBurst {
        /// Number of bursts.
        #[serde(default = "default_burst_count")]
        count: u32,
        /// Reach of each burst; defaults to 15% of the smaller side.
        #[serde(default)]
        radius_pct: Option<f32>,
    },

    /// Canvas-wide shaking.
    Quake {
        /// Shakes per second.
        #[serde(default = "default_frequency")]
        frequency: f32,
    },

    /// Each particle gets a fixed random direction for the pulse's lifetime.
    Randomize,
}

/// What a pulse needs to know about the world.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PulseContext {
    /// Canvas width and height in pixels.
    pub canvas: Vec2,
    /// Engine time.
    pub now_ms: f64,
}

impl PulseContext {
    /// Canvas centre.
    #[inline]
    pub fn center(&self) -> Vec2 {
        self.canvas * 0.5
    }

    /// Smaller canvas side.
    #[inline]
    pub fn min_side(&self) -> f32 {
        self.canvas.x.min(self.canvas.y)
    }

    fn reach(&self, radius_pct: Option<f32>, dist: f32) -> f32 {
        match radius_pct {
            Some(pct) => falloff(dist, pct / 100.0 * self.min_side()),
            None => 1.0,
        }
    }
}

impl PulseKind {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            PulseKind::Gravity { .. } => "gravity",
            PulseKind::Wind { .. } => "wind",
            PulseKind::Tornado { .. } => "tornado",
            PulseKind::Shockwave { .. } => "shockwave",
            PulseKind::Noise { .. } => "noise",
            PulseKind::Ripple { .. } => "ripple",
            PulseKind::Burst { .. } => "burst",
            PulseKind::Implosion { .. } => "implosion",
            PulseKind::MagnetPair { .. } => "magnetPair",
            PulseKind::Waterfall { .. } => "waterfall",
            PulseKind::GravityFlip => "gravityFlip",
            PulseKind::Shear => "shear",
            PulseKind::Crosswind { .. } => "crosswind",
            PulseKind::SwirlField { .. } => "swirlField",
            PulseKind::RingSpin { .. } => "ringSpin",
            PulseKind::SpiralIn { .. } => "spiralIn",
            PulseKind::SpiralOut { .. } => "spiralOut",
            PulseKind::WaveLeft { .. } => "waveLeft",
            PulseKind::WaveUp { .. } => "waveUp",
            PulseKind::RandomJitter => "randomJitter",
            PulseKind::Supernova { .. } => "supernova",
            PulseKind::RingBurst { .. } => "ringBurst",
            PulseKind::EdgeBurst => "edgeBurst",
            PulseKind::MultiBurst { .. } => "multiBurst",
            PulseKind::Quake { .. } => "quake",
            PulseKind::Randomize => "randomize",
        }
    }

    /// Unscaled field vector at `position`.
    ///
    /// Magnitudes are around 1 at full strength; the caller multiplies by
    /// strength and influence.
    fn field(&self, base: &PulseBase, index: usize, position: Vec2, ctx: &PulseContext) -> Vec2 {
        let elapsed = (ctx.now_ms - base.started_at_ms).max(0.0) as f32;
        let min_side = ctx.min_side().max(1.0);

        match self {
            PulseKind::Gravity { direction } => direction.normalize_or_zero(),

            PulseKind::GravityFlip => -Vec2::Y,

            PulseKind::Wind {
                direction,
                gustiness,
            } => {
                let gust = value_noise(position.y / 120.0, elapsed * 0.002);
                direction.normalize_or_zero() * (1.0 + gustiness * (gust * 2.0 - 1.0))
            }

            PulseKind::Tornado {
                origin,
                radius_pct,
                rotation,
                lift,
            } => {
                let center = origin.unwrap_or(ctx.center());
                match unit_from(center, position) {
                    Some((dir, dist)) => {
                        let k = ctx.reach(*radius_pct, dist);
                        (tangent(dir, rotation.sign()) - dir * *lift) * k
                    }
                    None => Vec2::ZERO,
                }
            }

            PulseKind::Shockwave {
                origin,
                speed,
                width,
            } => {
                let center = origin.unwrap_or(ctx.center());
                let front = elapsed * speed;
                let band = width.max(1.0);
                match unit_from(center, position) {
                    Some((dir, dist)) => {
                        let gap = (dist - front).abs();
                        if gap < band {
                            dir * (1.0 - gap / band) * 2.0
                        } else {
                            Vec2::ZERO
                        }
                    }
                    None => Vec2::ZERO,
                }
            }

            PulseKind::Noise { frequency, chaos } => {
                let scale = frequency / 100.0;
                let chaos = chaos.clamp(0.0, 1.0);
                let drift = elapsed * 0.0005 * (0.5 + chaos);
                let n = value_noise(position.x * scale + drift, position.y * scale);
                let angle = n * TAU * (1.0 + chaos * 2.0);
                Vec2::new(angle.cos(), angle.sin())
            }

            PulseKind::Ripple { origin, wave_count } => {
                let center = origin.unwrap_or(ctx.center());
                match unit_from(center, position) {
                    Some((dir, dist)) => {
                        let waves = (*wave_count).max(1) as f32;
                        let phase = dist / min_side * waves * TAU - elapsed * 0.01;
                        dir * phase.sin()
                    }
                    None => Vec2::ZERO,
                }
            }

            PulseKind::Burst { origin, radius_pct } => {
                let center = origin.unwrap_or(ctx.center());
                match unit_from(center, position) {
                    Some((dir, dist)) => dir * ctx.reach(*radius_pct, dist),
                    None => Vec2::ZERO,
                }
            }

            PulseKind::Implosion { origin, radius_pct } => {
                let center = origin.unwrap_or(ctx.center());
                match unit_from(center, position) {
                    Some((dir, dist)) => -dir * ctx.reach(*radius_pct, dist),
                    None => Vec2::ZERO,
                }
            }

            PulseKind::MagnetPair { separation } => {
                let offset = Vec2::new(ctx.canvas.x * separation * 0.5, 0.0);
                let attractor = ctx.center() - offset;
                let repeller = ctx.center() + offset;
                let reach = min_side * 0.25;
                let mut accel = Vec2::ZERO;
                if let Some((dir, dist)) = unit_from(attractor, position) {
                    accel -= dir * falloff(dist, reach);
                }
                if let Some((dir, dist)) = unit_from(repeller, position) {
                    accel += dir * falloff(dist, reach);
                }
                accel
            }

            PulseKind::Waterfall { frequency } => {
                let sway = (position.x * frequency / 100.0 * TAU + elapsed * 0.004).sin();
                Vec2::new(sway * 0.3, 1.0)
            }

            PulseKind::Shear => {
                let half = (ctx.canvas.y * 0.5).max(1.0);
                let offset = (position.y - ctx.center().y) / half;
                Vec2::new(offset.clamp(-1.0, 1.0), 0.0)
            }

            PulseKind::Crosswind { wave_count } => {
                let bands = (*wave_count).max(1) as f32;
                let phase = position.y / ctx.canvas.y.max(1.0) * bands * TAU;
                Vec2::new(if phase.sin() >= 0.0 { 1.0 } else { -1.0 }, 0.0)
            }

            PulseKind::SwirlField { cells, rotation } => {
                let cell = min_side / (*cells).max(1) as f32;
                let cell_center = ((position / cell).floor() + Vec2::splat(0.5)) * cell;
                match unit_from(cell_center, position) {
                    Some((dir, dist)) => {
                        let k = (1.0 - dist / (cell * 0.71)).max(0.0);
                        tangent(dir, rotation.sign()) * k
                    }
                    None => Vec2::ZERO,
                }
            }

            PulseKind::RingSpin {
                origin,
                ring_pct,
                width,
                rotation,
            } => {
                let center = origin.unwrap_or(ctx.center());
                let ring = ring_pct / 100.0 * min_side;
                match unit_from(center, position) {
                    Some((dir, dist)) => {
                        let k = band_weight(dist, ring, *width);
                        tangent(dir, rotation.sign()) * k
                    }
                    None => Vec2::ZERO,
                }
            }

            PulseKind::SpiralIn { origin, turns } => {
                let center = origin.unwrap_or(ctx.center());
                match unit_from(center, position) {
                    Some((dir, _)) => (tangent(dir, 1.0) * *turns - dir).normalize_or_zero(),
                    None => Vec2::ZERO,
                }
            }

            PulseKind::SpiralOut { origin, turns } => {
                let center = origin.unwrap_or(ctx.center());
                match unit_from(center, position) {
                    Some((dir, _)) => (tangent(dir, 1.0) * *turns + dir).normalize_or_zero(),
                    None => Vec2::ZERO,
                }
            }

            PulseKind::WaveLeft { wave_count } => {
                let waves = (*wave_count).max(1) as f32;
                let phase = position.x / ctx.canvas.x.max(1.0) * waves * TAU + elapsed * 0.006;
                Vec2::new(-1.0, phase.sin() * 0.5)
            }

            PulseKind::WaveUp { wave_count } => {
                let waves = (*wave_count).max(1) as f32;
                let phase = position.y / ctx.canvas.y.max(1.0) * waves * TAU + elapsed * 0.006;
                Vec2::new(phase.sin() * 0.5, -1.0)
            }

            PulseKind::RandomJitter => {
                let tick = (ctx.now_ms / 16.0).floor() as u32;
                let a = (index as u32) ^ (base.id as u32).wrapping_mul(0x27D4_EB2D);
                hash_direction(a, tick) * hash01(a ^ tick.rotate_left(7))
            }

            PulseKind::Supernova { origin, radius_pct } => {
                let center = origin.unwrap_or(ctx.center());
                match unit_from(center, position) {
                    Some((dir, dist)) => {
                        let k = ctx.reach(*radius_pct, dist);
                        if base.progress(ctx.now_ms) < 0.2 {
                            -dir * 0.5 * k
                        } else {
                            dir * 3.0 * k
                        }
                    }
                    None => Vec2::ZERO,
                }
            }

            PulseKind::RingBurst {
                origin,
                ring_pct,
                width,
            } => {
                let center = origin.unwrap_or(ctx.center());
                let ring = ring_pct / 100.0 * min_side;
                match unit_from(center, position) {
                    Some((dir, dist)) => dir * band_weight(dist, ring, *width) * 2.0,
                    None => Vec2::ZERO,
                }
            }

            PulseKind::EdgeBurst => {
                let margin = min_side * 0.15;
                let w = ctx.canvas.x;
                let h = ctx.canvas.y;
                let edge = |d: f32| (1.0 - d / margin).max(0.0);
                Vec2::new(
                    edge(position.x) - edge(w - position.x),
                    edge(position.y) - edge(h - position.y),
                )
            }

            PulseKind::MultiBurst { count, radius_pct } => {
                let count = (*count).max(1);
                let reach = radius_pct.unwrap_or(15.0) / 100.0 * min_side;
                let seed = (base.id as u32).wrapping_mul(0x9E37_79B9);
                let mut accel = Vec2::ZERO;
                for j in 0..count {
                    let origin = Vec2::new(
                        hash01(seed ^ (j * 2 + 1)) * ctx.canvas.x,
                        hash01(seed ^ (j * 2 + 2)) * ctx.canvas.y,
                    );
                    if let Some((dir, dist)) = unit_from(origin, position) {
                        accel += dir * falloff(dist, reach);
                    }
                }
                accel
            }

            PulseKind::Quake { frequency } => {
                let phase = elapsed / 1000.0 * frequency * TAU;
                Vec2::new((phase * 7.0).sin(), (phase * 5.3).cos() * 0.6)
            }

            PulseKind::Randomize => {
                let a = (index as u32).wrapping_mul(0x85EB_CA6B);
                hash_direction(a, base.id as u32)
            }
        }
    }
}

/// Triangular weight peaking at `ring`, zero beyond `width` either side.
fn band_weight(dist: f32, ring: f32, width: f32) -> f32 {
    let width = width.max(1.0);
    (1.0 - (dist - ring).abs() / width).max(0.0)
}

/// A scheduled transient force.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForcePulse {
    /// Timing and strength.
    #[serde(flatten)]
    pub base: PulseBase,
    /// Field shape.
    #[serde(flatten)]
    pub kind: PulseKind,
}

impl ForcePulse {
    /// Pulse with default timing.
    pub fn new(kind: PulseKind) -> Self {
        Self {
            base: PulseBase::default(),
            kind,
        }
    }

    /// Set the main-phase duration.
    pub fn with_duration(mut self, duration_ms: f64) -> Self {
        self.base.duration_ms = duration_ms;
        self
    }

    /// Set the strength.
    pub fn with_strength(mut self, strength: f32) -> Self {
        self.base.strength = strength;
        self
    }

    /// Set the easing curve.
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.base.easing = easing;
        self
    }

    /// Add a coast tail.
    pub fn with_inertia(mut self, inertia_ms: f64) -> Self {
        self.base.inertia_ms = inertia_ms;
        self
    }

    /// Set the mode.
    pub fn with_mode(mut self, mode: PulseMode) -> Self {
        self.base.mode = mode;
        self
    }

    /// Acceleration on particle `index` at `position`, in px/frame².
    pub fn acceleration(&self, index: usize, position: Vec2, ctx: &PulseContext) -> Vec2 {
        let k = self.base.influence(ctx.now_ms);
        if k <= 0.0 {
            return Vec2::ZERO;
        }
        self.kind.field(&self.base, index, position, ctx) * self.base.strength * PULSE_SCALE * k
    }
}

/// Owned list of active pulses.
///
/// Each engine has its own scheduler, so a live engine and a replay engine
/// never see each other's pulses.
#[derive(Clone, Debug, Default)]
pub struct PulseScheduler {
    pulses: Vec<ForcePulse>,
    next_id: u64,
}

impl PulseScheduler {
    /// Empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate `pulse` starting at `now_ms`.
    pub fn add(&mut self, mut pulse: ForcePulse, now_ms: f64) {
        pulse.base.started_at_ms = now_ms;
        pulse.base.id = self.next_id;
        self.next_id += 1;
        tracing::debug!(
            kind = pulse.kind.name(),
            duration_ms = pulse.base.duration_ms,
            strength = pulse.base.strength,
            "pulse started"
        );
        self.pulses.push(pulse);
    }

    /// Drop every pulse that has expired by `now_ms`.
    pub fn purge(&mut self, now_ms: f64) {
        self.pulses.retain(|p| !p.base.is_expired(now_ms));
    }

    /// Sum of every active pulse's acceleration.
    pub fn acceleration(&self, index: usize, position: Vec2, ctx: &PulseContext) -> Vec2 {
        self.pulses
            .iter()
            .map(|p| p.acceleration(index, position, ctx))
            .sum()
    }

    /// Active pulses.
    pub fn active(&self) -> &[ForcePulse] {
        &self.pulses
    }

    /// Number of active pulses.
    pub fn len(&self) -> usize {
        self.pulses.len()
    }

    /// Whether no pulse is active.
    pub fn is_empty(&self) -> bool {
        self.pulses.is_empty()
    }

    /// Drop every pulse and restart numbering.
    pub fn clear(&mut self) {
        self.pulses.clear();
        self.next_id = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(now_ms: f64) -> PulseContext {
        PulseContext {
            canvas: Vec2::new(200.0, 100.0),
            now_ms,
        }
    }

    fn all_kinds() -> Vec<PulseKind> {
        let json = [
            "gravity", "wind", "tornado", "shockwave", "noise", "ripple", "burst",
            "implosion", "magnetPair", "waterfall", "gravityFlip", "shear", "crosswind",
            "swirlField", "ringSpin", "spiralIn", "spiralOut", "waveLeft", "waveUp",
            "randomJitter", "supernova", "ringBurst", "edgeBurst", "multiBurst", "quake",
            "randomize",
        ];
        json.iter()
            .map(|name| {
                let text = format!(r#"{{ "type": "{}" }}"#, name);
                serde_json::from_str(&text).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_every_kind_parses_with_defaults() {
        let kinds = all_kinds();
        assert_eq!(kinds.len(), 26);
        for kind in &kinds {
            let name = kind.name();
            let value = serde_json::to_value(kind).unwrap();
            assert_eq!(value["type"], name);
        }
    }

    #[test]
    fn test_pulse_json_flattens_base() {
        let pulse: ForcePulse = serde_json::from_str(
            r#"{ "type": "burst", "duration_ms": 500, "strength": 20, "radius_pct": 10 }"#,
        )
        .unwrap();
        assert_eq!(pulse.base.duration_ms, 500.0);
        assert_eq!(pulse.base.strength, 20.0);
        assert_eq!(pulse.base.easing, Easing::EaseOut);
        assert_eq!(
            pulse.kind,
            PulseKind::Burst {
                origin: None,
                radius_pct: Some(10.0)
            }
        );
    }

    #[test]
    fn test_influence_non_increasing_and_expires() {
        for easing in [
            Easing::Linear,
            Easing::EaseIn,
            Easing::EaseOut,
            Easing::EaseInOut,
            Easing::Constant,
        ] {
            for inertia in [0.0, 300.0] {
                let base = PulseBase {
                    easing,
                    inertia_ms: inertia,
                    ..Default::default()
                };
                let mut previous = f32::MAX;
                let mut t = 0.0;
                while t <= 1400.0 {
                    let k = base.influence(t);
                    assert!((0.0..=1.0).contains(&k));
                    assert!(k <= previous + 1e-6, "{:?} rose at {}", easing, t);
                    previous = k;
                    t += 10.0;
                }
                assert_eq!(base.influence(1000.0 + inertia), 0.0);
                assert!(base.is_expired(1000.0 + inertia));
            }
        }
    }

    #[test]
    fn test_continuous_mode_is_flat() {
        let base = PulseBase {
            mode: PulseMode::Continuous,
            ..Default::default()
        };
        assert_eq!(base.influence(0.0), 1.0);
        assert_eq!(base.influence(999.0), 1.0);
        assert_eq!(base.influence(1000.0), 0.0);
    }

    #[test]
    fn test_expired_pulse_contributes_nothing() {
        let mut scheduler = PulseScheduler::new();
        let pulse = ForcePulse::new(PulseKind::Gravity { direction: Vec2::Y })
            .with_duration(100.0)
            .with_easing(Easing::Constant);
        scheduler.add(pulse, 0.0);

        let pos = Vec2::new(10.0, 10.0);
        assert!(scheduler.acceleration(0, pos, &ctx(50.0)).y > 0.0);
        assert_eq!(scheduler.acceleration(0, pos, &ctx(100.5)), Vec2::ZERO);

        scheduler.purge(100.5);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_pulses_sum() {
        let mut scheduler = PulseScheduler::new();
        let gravity = ForcePulse::new(PulseKind::Gravity { direction: Vec2::Y })
            .with_easing(Easing::Constant);
        scheduler.add(gravity.clone(), 0.0);
        let single = scheduler.acceleration(0, Vec2::ZERO, &ctx(10.0));
        scheduler.add(gravity, 0.0);
        let double = scheduler.acceleration(0, Vec2::ZERO, &ctx(10.0));
        assert!((double - single * 2.0).length() < 1e-6);
    }

    #[test]
    fn test_burst_points_away_from_center() {
        let pulse = ForcePulse::new(PulseKind::Burst {
            origin: None,
            radius_pct: None,
        });
        let c = ctx(0.0);
        for pos in [
            Vec2::new(10.0, 10.0),
            Vec2::new(190.0, 90.0),
            Vec2::new(100.0, 5.0),
        ] {
            let accel = pulse.acceleration(0, pos, &c);
            assert!(accel.dot(pos - c.center()) > 0.0);
        }
        // The centre itself gets nothing
        assert_eq!(pulse.acceleration(0, c.center(), &c), Vec2::ZERO);
    }

    #[test]
    fn test_every_kind_finite() {
        let c = ctx(250.0);
        for kind in all_kinds() {
            let pulse = ForcePulse::new(kind);
            for i in 0..20 {
                let pos = Vec2::new(i as f32 * 10.0, i as f32 * 5.0);
                let accel = pulse.acceleration(i, pos, &c);
                assert!(accel.is_finite(), "{} not finite", pulse.kind.name());
            }
        }
    }

    #[test]
    fn test_scheduler_restamps_pulse() {
        let mut scheduler = PulseScheduler::new();
        let mut pulse = ForcePulse::new(PulseKind::Randomize);
        pulse.base.started_at_ms = 99_999.0;
        scheduler.add(pulse.clone(), 40.0);
        scheduler.add(pulse, 40.0);
        assert_eq!(scheduler.active()[0].base.started_at_ms, 40.0);
        assert_eq!(scheduler.active()[1].base.id, 1);
    }
}
