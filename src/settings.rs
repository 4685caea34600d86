//! Simulation settings.
//!
//! [`Settings`] is an immutable snapshot consumed by the engine each step.
//! Callers replace it wholesale; the engine never mutates it in place. Every
//! nested object defaults when absent so partially written JSON still loads.
//!
//! # Partial updates
//!
//! ```ignore
//! let patch = serde_json::json!({ "vortex": { "strength": 80.0 } });
//! let next = settings.patched(&patch)?;
//! ```
//!
//! Only keys already present on the snapshot are merged; unknown keys in the
//! patch are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SettingsError;
use crate::visuals::{ParticleShape, Rgb, VisualEffects};

/// Steady force types driven by the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceType {
    /// Pull particles toward the pointer.
    Attraction,
    /// Push particles away from the pointer.
    Repulsion,
    /// Swirl particles around the pointer.
    Vortex,
    /// Noise-driven chaotic push around the pointer.
    Turbulence,
    /// Treat the pointer as a solid disc particles bounce off.
    Collider,
}

/// Rotation sense for swirling forces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    /// Clockwise on screen (y grows downward).
    #[default]
    Clockwise,
    /// Counter-clockwise on screen.
    CounterClockwise,
}

impl Rotation {
    /// +1 for clockwise, -1 for counter-clockwise.
    #[inline]
    pub fn sign(self) -> f32 {
        match self {
            Rotation::Clockwise => 1.0,
            Rotation::CounterClockwise => -1.0,
        }
    }
}

/// What happens when a particle reaches the canvas edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WallMode {
    /// Particles may leave the canvas.
    None,
    /// Reflect velocity with energy loss (default).
    #[default]
    Bounce,
    /// Clamp to the canvas and stop motion along the wall normal.
    Confine,
}

/// Strength and reach shared by the simple pointer forces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceSettings {
    /// Force magnitude (0-100 is the usual range).
    pub strength: f32,
    /// Full-strength radius as a percentage of the smaller canvas side.
    pub radius_pct: f32,
}

impl Default for ForceSettings {
    fn default() -> Self {
        Self {
            strength: 50.0,
            radius_pct: 15.0,
        }
    }
}

/// Vortex tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VortexSettings {
    /// Tangential force magnitude.
    pub strength: f32,
    /// Full-strength radius as a percentage of the smaller canvas side.
    pub radius_pct: f32,
    /// Swirl direction.
    pub rotation: Rotation,
    /// Fraction of the tangential force added as inward pull.
    pub inward_pull: f32,
}

impl Default for VortexSettings {
    fn default() -> Self {
        Self {
            strength: 50.0,
            radius_pct: 20.0,
            rotation: Rotation::Clockwise,
            inward_pull: 0.2,
        }
    }
}

/// Turbulence tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurbulenceSettings {
    /// Force magnitude.
    pub strength: f32,
    /// Full-strength radius as a percentage of the smaller canvas side.
    pub radius_pct: f32,
    /// Spatial frequency of the noise field (cycles per 100 px).
    pub frequency: f32,
    /// How fast and how far the noise angle wanders (0-1).
    pub chaos: f32,
}

impl Default for TurbulenceSettings {
    fn default() -> Self {
        Self {
            strength: 40.0,
            radius_pct: 20.0,
            frequency: 1.5,
            chaos: 0.5,
        }
    }
}

/// Collider tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColliderSettings {
    /// Collider disc radius as a percentage of the smaller canvas side.
    pub radius_pct: f32,
    /// Spring constant pushing particles out of the disc.
    pub hardness: f32,
    /// Fraction of inward radial velocity removed on contact.
    pub damping: f32,
}

impl Default for ColliderSettings {
    fn default() -> Self {
        Self {
            radius_pct: 8.0,
            hardness: 0.5,
            damping: 0.3,
        }
    }
}

/// Particle-particle collision tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionSettings {
    /// Whether particle-particle separation runs at all.
    pub enabled: bool,
    /// Fraction of the overlap resolved per pass (clamped to 0-1).
    pub strength: f32,
    /// Contact distance as a multiple of the mean particle size.
    pub radius_multiplier: f32,
}

impl Default for CollisionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            strength: 0.5,
            radius_multiplier: 1.0,
        }
    }
}

/// How the colour filter treats matching particles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Hide particles whose colour matches a target.
    #[default]
    Hide,
    /// Show only particles whose colour matches a target.
    Keep,
}

/// Colour-based visibility filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorFilter {
    /// Whether the filter is applied.
    pub enabled: bool,
    /// Target colours.
    pub colors: Vec<Rgb>,
    /// Maximum RGB distance counted as a match.
    pub tolerance: f32,
    /// Hide matches or keep only matches.
    pub mode: FilterMode,
}

impl Default for ColorFilter {
    fn default() -> Self {
        Self {
            enabled: false,
            colors: Vec::new(),
            tolerance: 40.0,
            mode: FilterMode::Hide,
        }
    }
}

impl ColorFilter {
    /// Whether a particle of this colour should be visible.
    pub fn accepts(&self, color: &Rgb) -> bool {
        if !self.enabled || self.colors.is_empty() {
            return true;
        }
        let matches = self
            .colors
            .iter()
            .any(|target| target.distance(color) <= self.tolerance);
        match self.mode {
            FilterMode::Hide => !matches,
            FilterMode::Keep => matches,
        }
    }
}

/// Adaptive performance tunables (live path only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceSettings {
    /// Whether the controller adjusts anything.
    pub enabled: bool,
    /// Frame rate the controller aims for.
    pub target_fps: f32,
    /// Lowest fraction of particles kept.
    pub min_fraction: f32,
    /// Amount the fraction changes per adjustment.
    pub fraction_step: f32,
    /// Width of the FPS measurement window in milliseconds.
    pub window_ms: f64,
    /// FPS below which expensive effects are suppressed.
    pub severe_fps: f32,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            target_fps: 60.0,
            min_fraction: 0.25,
            fraction_step: 0.1,
            window_ms: 1000.0,
            severe_fps: 30.0,
        }
    }
}

/// Complete simulation settings snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Distance between sampled particles in canvas pixels (density).
    pub particle_gap: f32,
    /// Particle draw size in pixels.
    pub particle_size: f32,
    /// Particle draw shape.
    pub shape: ParticleShape,
    /// Extra scale applied after fitting the image to the canvas.
    pub image_scale: f32,
    /// Active steady force types, in priority order.
    pub active_forces: Vec<ForceType>,
    /// Apply every active force at once instead of only the first.
    pub combine_forces: bool,
    /// Apply forces every step while the pointer is inside, even if it is still.
    pub continuous_force: bool,
    /// Attraction tunables.
    pub attraction: ForceSettings,
    /// Repulsion tunables.
    pub repulsion: ForceSettings,
    /// Vortex tunables.
    pub vortex: VortexSettings,
    /// Turbulence tunables.
    pub turbulence: TurbulenceSettings,
    /// Collider tunables.
    pub collider: ColliderSettings,
    /// Spring stiffness toward the rest position (0 disables restoration).
    pub restoration: f32,
    /// Base velocity damping per nominal frame.
    pub viscosity: f32,
    /// Edge behaviour.
    pub walls: WallMode,
    /// Fraction of speed kept after a wall bounce.
    pub wall_restitution: f32,
    /// Particle-particle collisions.
    pub collisions: CollisionSettings,
    /// Colour-based visibility.
    pub color_filter: ColorFilter,
    /// Adaptive performance tunables.
    pub performance: PerformanceSettings,
    /// Trails, glow and blending.
    pub effects: VisualEffects,
    /// Random spread of per-particle healing multipliers (0 disables them).
    pub healing_variance: f32,
    /// Seed for every random choice the engine makes.
    pub seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            particle_gap: 4.0,
            particle_size: 2.0,
            shape: ParticleShape::Circle,
            image_scale: 1.0,
            active_forces: vec![ForceType::Repulsion],
            combine_forces: false,
            continuous_force: false,
            attraction: ForceSettings::default(),
            repulsion: ForceSettings::default(),
            vortex: VortexSettings::default(),
            turbulence: TurbulenceSettings::default(),
            collider: ColliderSettings::default(),
            restoration: 0.05,
            viscosity: 0.08,
            walls: WallMode::Bounce,
            wall_restitution: 0.6,
            collisions: CollisionSettings::default(),
            color_filter: ColorFilter::default(),
            performance: PerformanceSettings::default(),
            effects: VisualEffects::default(),
            healing_variance: 0.0,
            seed: 0x5EED,
        }
    }
}

impl Settings {
    /// Parse settings from JSON, defaulting every absent field.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build a new snapshot by merging a partial JSON object onto this one.
    ///
    /// Objects are merged key by key; any other value replaces the existing one.
    /// Keys this struct does not know about are dropped.
    pub fn patched(&self, patch: &Value) -> Result<Self, SettingsError> {
        let mut base = serde_json::to_value(self)?;
        merge_known(&mut base, patch);
        Ok(serde_json::from_value(base)?)
    }

    /// Force types that apply this step, honouring `combine_forces`.
    pub fn forces_in_effect(&self) -> &[ForceType] {
        if self.combine_forces {
            &self.active_forces
        } else {
            let n = self.active_forces.len().min(1);
            &self.active_forces[..n]
        }
    }

    /// Whether changing from `self` to `next` requires rebuilding the particle store.
    pub fn needs_reseed(&self, next: &Settings) -> bool {
        self.particle_gap != next.particle_gap
            || self.image_scale != next.image_scale
            || self.healing_variance != next.healing_variance
            || self.seed != next.seed
    }
}

fn merge_known(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                if let Some(slot) = base_map.get_mut(key) {
                    merge_known(slot, patch_value);
                }
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_nested_objects_default() {
        let settings = Settings::from_json(r#"{ "restoration": 0.2 }"#).unwrap();
        assert_eq!(settings.restoration, 0.2);
        assert_eq!(settings.vortex, VortexSettings::default());
        assert_eq!(settings.performance.target_fps, 60.0);
    }

    #[test]
    fn test_patch_merges_nested_fields() {
        let base = Settings::default();
        let next = base
            .patched(&json!({ "vortex": { "strength": 90.0 }, "walls": "confine" }))
            .unwrap();
        assert_eq!(next.vortex.strength, 90.0);
        assert_eq!(next.vortex.radius_pct, base.vortex.radius_pct);
        assert_eq!(next.walls, WallMode::Confine);
        // The original snapshot is untouched
        assert_eq!(base.walls, WallMode::Bounce);
    }

    #[test]
    fn test_patch_ignores_unknown_keys() {
        let base = Settings::default();
        let next = base.patched(&json!({ "no_such_field": 1, "viscosity": 0.5 })).unwrap();
        assert_eq!(next.viscosity, 0.5);
    }

    #[test]
    fn test_patch_type_mismatch_is_an_error() {
        let base = Settings::default();
        assert!(base.patched(&json!({ "viscosity": "thick" })).is_err());
    }

    #[test]
    fn test_forces_in_effect() {
        let mut settings = Settings::default();
        settings.active_forces = vec![ForceType::Vortex, ForceType::Attraction];
        assert_eq!(settings.forces_in_effect(), &[ForceType::Vortex]);
        settings.combine_forces = true;
        assert_eq!(settings.forces_in_effect().len(), 2);
        settings.active_forces.clear();
        settings.combine_forces = false;
        assert!(settings.forces_in_effect().is_empty());
    }

    #[test]
    fn test_color_filter() {
        let mut filter = ColorFilter {
            enabled: true,
            colors: vec![Rgb::new(255, 0, 0)],
            tolerance: 10.0,
            mode: FilterMode::Hide,
        };
        assert!(!filter.accepts(&Rgb::new(250, 0, 0)));
        assert!(filter.accepts(&Rgb::new(0, 0, 255)));

        filter.mode = FilterMode::Keep;
        assert!(filter.accepts(&Rgb::new(250, 0, 0)));
        assert!(!filter.accepts(&Rgb::new(0, 0, 255)));

        filter.enabled = false;
        assert!(filter.accepts(&Rgb::new(0, 0, 255)));
    }
}
