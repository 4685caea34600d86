//! Steady force models.
//!
//! Pure functions mapping a particle and scalar parameters to an
//! acceleration in pixels per nominal frame squared. The engine sums their
//! output; none of them mutate anything.
//!
//! # Force Types
//!
//! | Type | Shape |
//! |------|-------|
//! | [`ForceType::Attraction`] | Toward the pointer |
//! | [`ForceType::Repulsion`] | Away from the pointer |
//! | [`ForceType::Vortex`] | Tangential swirl plus a little inward pull |
//! | [`ForceType::Turbulence`] | Direction taken from a drifting noise field |
//! | [`ForceType::Collider`] | Spring out of a solid disc, no reach beyond it |
//!
//! Everything except the collider is full strength inside its radius and
//! falls off with the inverse square of distance beyond it.

use glam::Vec2;
use std::f32::consts::TAU;

use crate::settings::{
    ColliderSettings, ForceSettings, ForceType, Settings, TurbulenceSettings, VortexSettings,
};

/// Converts user-facing strength (0-100) to px/frame².
pub const FORCE_SCALE: f32 = 0.02;

/// Distances shorter than this are treated as zero.
pub const MIN_DISTANCE: f32 = 1e-3;

/// Below this displacement from rest, weak forces are ignored.
pub const DEAD_ZONE_PX: f32 = 0.75;

/// Forces weaker than this are dropped inside the dead zone.
pub const DEAD_ZONE_ACCEL: f32 = 0.05;

/// Falloff factors below this are skipped entirely.
const NEGLIGIBLE_FALLOFF: f32 = 1e-3;

/// Full strength inside `radius`, inverse-square beyond it.
#[inline]
pub fn falloff(dist: f32, radius: f32) -> f32 {
    if radius <= 0.0 {
        return 0.0;
    }
    if dist <= radius {
        1.0
    } else {
        let r = radius / dist;
        r * r
    }
}

/// Radius in pixels for a percentage of the smaller canvas side.
#[inline]
pub fn radius_px(radius_pct: f32, min_side: f32) -> f32 {
    (radius_pct / 100.0 * min_side).max(0.0)
}

/// Spring toward the rest position.
///
/// Sub-pixel displacements return zero so the normalised direction never
/// divides by a vanishing length.
pub fn restoration(position: Vec2, rest: Vec2, stiffness: f32, healing: Option<f32>) -> Vec2 {
    let offset = rest - position;
    let dist = offset.length();
    if stiffness <= 0.0 || dist < 0.1 {
        return Vec2::ZERO;
    }
    offset * stiffness * healing.unwrap_or(1.0)
}

/// Pull toward `origin`.
pub fn attraction(position: Vec2, origin: Vec2, params: &ForceSettings, min_side: f32) -> Vec2 {
    let (dir, dist) = match unit_from(origin, position) {
        Some(v) => v,
        None => return Vec2::ZERO,
    };
    let k = falloff(dist, radius_px(params.radius_pct, min_side));
    if k < NEGLIGIBLE_FALLOFF {
        return Vec2::ZERO;
    }
    -dir * params.strength * FORCE_SCALE * k
}

/// Push away from `origin`.
pub fn repulsion(position: Vec2, origin: Vec2, params: &ForceSettings, min_side: f32) -> Vec2 {
    let (dir, dist) = match unit_from(origin, position) {
        Some(v) => v,
        None => return Vec2::ZERO,
    };
    let k = falloff(dist, radius_px(params.radius_pct, min_side));
    if k < NEGLIGIBLE_FALLOFF {
        return Vec2::ZERO;
    }
    dir * params.strength * FORCE_SCALE * k
}

/// Swirl around `origin`.
pub fn vortex(position: Vec2, origin: Vec2, params: &VortexSettings, min_side: f32) -> Vec2 {
    let (dir, dist) = match unit_from(origin, position) {
        Some(v) => v,
        None => return Vec2::ZERO,
    };
    let k = falloff(dist, radius_px(params.radius_pct, min_side));
    if k < NEGLIGIBLE_FALLOFF {
        return Vec2::ZERO;
    }
    let magnitude = params.strength * FORCE_SCALE * k;
    tangent(dir, params.rotation.sign()) * magnitude - dir * magnitude * params.inward_pull
}

/// Noise-directed push near `origin`.
pub fn turbulence(
    position: Vec2,
    origin: Vec2,
    params: &TurbulenceSettings,
    min_side: f32,
    time_ms: f64,
) -> Vec2 {
    let dist = position.distance(origin);
    let k = falloff(dist, radius_px(params.radius_pct, min_side));
    if k < NEGLIGIBLE_FALLOFF {
        return Vec2::ZERO;
    }
    let chaos = params.chaos.clamp(0.0, 1.0);
    let scale = params.frequency / 100.0;
    let drift = (time_ms * 0.0005 * (0.5 + chaos as f64)) as f32;
    let n = value_noise(position.x * scale, position.y * scale + drift);
    let angle = n * TAU * (1.0 + chaos * 2.0);
    Vec2::new(angle.cos(), angle.sin()) * params.strength * FORCE_SCALE * k
}

/// Solid disc at `origin` that particles are sprung out of.
pub fn collider(
    position: Vec2,
    velocity: Vec2,
    origin: Vec2,
    params: &ColliderSettings,
    min_side: f32,
) -> Vec2 {
    let radius = radius_px(params.radius_pct, min_side);
    let (dir, dist) = match unit_from(origin, position) {
        Some(v) => v,
        None => return Vec2::ZERO,
    };
    if dist >= radius {
        return Vec2::ZERO;
    }
    let mut accel = dir * (radius - dist) * params.hardness;
    let radial_speed = velocity.dot(dir);
    if radial_speed < 0.0 {
        accel -= dir * radial_speed * params.damping.clamp(0.0, 1.0);
    }
    accel
}

/// Sum of every force type in effect for one particle.
///
/// Applies the dead zone: a particle sitting within [`DEAD_ZONE_PX`] of its
/// rest position ignores a total force weaker than [`DEAD_ZONE_ACCEL`].
pub fn pointer_forces(
    settings: &Settings,
    position: Vec2,
    velocity: Vec2,
    rest: Vec2,
    origin: Vec2,
    min_side: f32,
    time_ms: f64,
) -> Vec2 {
    let mut total = Vec2::ZERO;
    for force in settings.forces_in_effect() {
        total += match force {
            ForceType::Attraction => attraction(position, origin, &settings.attraction, min_side),
            ForceType::Repulsion => repulsion(position, origin, &settings.repulsion, min_side),
            ForceType::Vortex => vortex(position, origin, &settings.vortex, min_side),
            ForceType::Turbulence => {
                turbulence(position, origin, &settings.turbulence, min_side, time_ms)
            }
            ForceType::Collider => {
                collider(position, velocity, origin, &settings.collider, min_side)
            }
        };
    }
    if position.distance(rest) < DEAD_ZONE_PX && total.length() < DEAD_ZONE_ACCEL {
        return Vec2::ZERO;
    }
    total
}

/// Unit vector from `from` to `to` and the distance, or `None` when they coincide.
#[inline]
pub fn unit_from(from: Vec2, to: Vec2) -> Option<(Vec2, f32)> {
    let delta = to - from;
    let dist = delta.length();
    if dist < MIN_DISTANCE || !dist.is_finite() {
        return None;
    }
    Some((delta / dist, dist))
}

/// Perpendicular of a unit vector; `sign` +1 is clockwise on a y-down canvas.
#[inline]
pub fn tangent(dir: Vec2, sign: f32) -> Vec2 {
    Vec2::new(-dir.y, dir.x) * sign
}

/// Integer hash to a float in [0, 1].
pub fn hash01(seed: u32) -> f32 {
    let mut x = seed.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    x ^= x >> 16;
    x = x.wrapping_mul(2_246_822_519);
    x ^= x >> 13;
    x = x.wrapping_mul(3_266_489_917);
    x ^= x >> 16;
    (x as f64 / u32::MAX as f64) as f32
}

/// Deterministic unit vector from two integer seeds.
pub fn hash_direction(a: u32, b: u32) -> Vec2 {
    let angle = hash01(a.wrapping_mul(0x9E37_79B9) ^ b.wrapping_mul(0x85EB_CA6B)) * TAU;
    Vec2::new(angle.cos(), angle.sin())
}

/// Smooth 2D value noise in [0, 1].
pub fn value_noise(x: f32, y: f32) -> f32 {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let ix = x0 as i32;
    let iy = y0 as i32;

    let corner = |cx: i32, cy: i32| {
        hash01((cx as u32).wrapping_mul(73_856_093) ^ (cy as u32).wrapping_mul(19_349_663))
    };
    let sx = fx * fx * (3.0 - 2.0 * fx);
    let sy = fy * fy * (3.0 - 2.0 * fy);

    let top = corner(ix, iy) + (corner(ix + 1, iy) - corner(ix, iy)) * sx;
    let bottom = corner(ix, iy + 1) + (corner(ix + 1, iy + 1) - corner(ix, iy + 1)) * sx;
    top + (bottom - top) * sy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Rotation;

    const SIDE: f32 = 100.0;

    #[test]
    fn test_falloff_shape() {
        assert_eq!(falloff(5.0, 10.0), 1.0);
        assert_eq!(falloff(10.0, 10.0), 1.0);
        assert!((falloff(20.0, 10.0) - 0.25).abs() < 1e-6);
        assert_eq!(falloff(5.0, 0.0), 0.0);
    }

    #[test]
    fn test_attraction_and_repulsion_oppose() {
        let params = ForceSettings::default();
        let pos = Vec2::new(60.0, 50.0);
        let origin = Vec2::new(50.0, 50.0);
        let pull = attraction(pos, origin, &params, SIDE);
        let push = repulsion(pos, origin, &params, SIDE);
        assert!(pull.x < 0.0);
        assert!(push.x > 0.0);
        assert!((pull + push).length() < 1e-6);
    }

    #[test]
    fn test_coincident_points_are_noop() {
        let origin = Vec2::new(5.0, 5.0);
        assert_eq!(attraction(origin, origin, &ForceSettings::default(), SIDE), Vec2::ZERO);
        assert_eq!(vortex(origin, origin, &VortexSettings::default(), SIDE), Vec2::ZERO);
        assert_eq!(
            collider(origin, Vec2::ZERO, origin, &ColliderSettings::default(), SIDE),
            Vec2::ZERO
        );
    }

    #[test]
    fn test_vortex_rotation_sense() {
        let mut params = VortexSettings {
            inward_pull: 0.0,
            ..Default::default()
        };
        let origin = Vec2::ZERO;
        let pos = Vec2::new(10.0, 0.0);
        let cw = vortex(pos, origin, &params, SIDE);
        // Right of the centre, clockwise on a y-down canvas moves down
        assert!(cw.y > 0.0);
        assert!(cw.x.abs() < 1e-6);

        params.rotation = Rotation::CounterClockwise;
        let ccw = vortex(pos, origin, &params, SIDE);
        assert!(ccw.y < 0.0);
    }

    #[test]
    fn test_collider_only_inside_disc() {
        let params = ColliderSettings::default();
        let origin = Vec2::ZERO;
        // radius is 8 px on a 100 px canvas
        assert_eq!(collider(Vec2::new(9.0, 0.0), Vec2::ZERO, origin, &params, SIDE), Vec2::ZERO);
        let push = collider(Vec2::new(4.0, 0.0), Vec2::ZERO, origin, &params, SIDE);
        assert!(push.x > 0.0);

        // Inward motion is damped as well
        let damped = collider(Vec2::new(4.0, 0.0), Vec2::new(-2.0, 0.0), origin, &params, SIDE);
        assert!(damped.x > push.x);
    }

    #[test]
    fn test_restoration_points_home() {
        let force = restoration(Vec2::new(10.0, 0.0), Vec2::ZERO, 0.1, None);
        assert!((force - Vec2::new(-1.0, 0.0)).length() < 1e-6);
        let healed = restoration(Vec2::new(10.0, 0.0), Vec2::ZERO, 0.1, Some(2.0));
        assert!((healed - Vec2::new(-2.0, 0.0)).length() < 1e-6);
        assert_eq!(restoration(Vec2::new(0.05, 0.0), Vec2::ZERO, 0.1, None), Vec2::ZERO);
    }

    #[test]
    fn test_dead_zone_suppresses_weak_force_at_rest() {
        let mut settings = Settings::default();
        settings.active_forces = vec![ForceType::Repulsion];
        let rest = Vec2::new(500.0, 500.0);
        // Far from the pointer the inverse-square tail is tiny
        let far = pointer_forces(&settings, rest, Vec2::ZERO, rest, Vec2::ZERO, SIDE, 0.0);
        assert_eq!(far, Vec2::ZERO);
        // Near the pointer the force is kept
        let near_pos = Vec2::new(5.0, 0.0);
        let near = pointer_forces(&settings, near_pos, Vec2::ZERO, near_pos, Vec2::ZERO, SIDE, 0.0);
        assert!(near.length() > 0.0);
    }

    #[test]
    fn test_noise_is_deterministic_and_bounded() {
        for i in 0..50 {
            let x = i as f32 * 0.37;
            let a = value_noise(x, x * 0.5);
            assert_eq!(a, value_noise(x, x * 0.5));
            assert!((0.0..=1.0).contains(&a));
        }
    }
}
