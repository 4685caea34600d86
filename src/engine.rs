//! The simulation engine.
//!
//! [`Engine`] owns the particle store, the pulse list and the pointer state,
//! and advances them one step per call to [`Engine::step`]. Time comes from a
//! [`TimeSource`] handed in at construction, so the same engine code runs
//! live against a wall clock and during replay against a manual one.
//!
//! # Step
//!
//! For every live particle:
//!
//! 1. Skip it if it is invisible or far outside the canvas.
//! 2. Spring it toward its rest position.
//! 3. Add the summed acceleration of all active pulses.
//! 4. Add the pointer forces if the pointer is active.
//! 5. Damp the velocity, then clamp its magnitude.
//! 6. Integrate the position (semi-implicit Euler).
//!
//! Then, across all live particles: separate overlapping pairs, snap
//! particles that have come to rest, and resolve walls.
//!
//! Forces are expressed per nominal 60 Hz frame. A step of `dt` milliseconds
//! scales them by `dt / NOMINAL_FRAME_MS`, so any fixed replay timestep
//! approximates live motion.

use glam::Vec2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use crate::error::SeedError;
use crate::forces::{pointer_forces, restoration};
use crate::input::{PointerEvent, PointerState};
use crate::particle::{Particle, ParticleSnapshot};
use crate::pulse::{ForcePulse, PulseContext, PulseScheduler};
use crate::settings::{Settings, WallMode};
use crate::source::{seed_particles, SourceImage};
use crate::spatial::{resolve_overlaps, CollisionGrid, SpatialConfig};
use crate::surface::{draw_particle, Surface};
use crate::time::{TimeSource, WallClock};
use crate::visuals::VisualEffects;

/// Length of the frame forces are expressed in.
pub const NOMINAL_FRAME_MS: f64 = 1000.0 / 60.0;

/// Longest step the engine will integrate in one go.
pub const MAX_STEP_MS: f64 = 50.0;

/// Speed ceiling as a fraction of the larger canvas side, per nominal frame.
pub const MAX_SPEED_FRACTION: f32 = 0.05;

/// Damping added per unit of restoration stiffness.
pub const STIFFNESS_DAMPING: f32 = 0.5;

/// Upper bound on total damping per nominal frame.
pub const DAMPING_CEILING: f32 = 0.5;

/// Distance from rest under which a slow particle is snapped home.
pub const SNAP_DISTANCE: f32 = 1.0;

/// Speed under which a particle near rest is snapped home.
pub const SNAP_SPEED: f32 = 0.05;

/// Particles further than this fraction of the canvas outside it are culled.
pub const CULL_MARGIN: f32 = 0.5;

/// Particle simulation.
pub struct Engine {
    settings: Arc<Settings>,
    canvas: Vec2,
    image: Option<SourceImage>,
    particles: Vec<Particle>,
    pointer: PointerState,
    force_enabled: bool,
    pulses: PulseScheduler,
    grid: CollisionGrid,
    clock: Box<dyn TimeSource>,
    last_step_ms: Option<f64>,
    step_count: u64,
    rng: SmallRng,
    visible_fraction: f32,
    effects_suppressed: bool,
    live: Vec<usize>,
}

impl Engine {
    /// Create an empty engine. Call [`Engine::seed`] to populate it.
    pub fn new(settings: Settings, canvas: Vec2, clock: Box<dyn TimeSource>) -> Self {
        let rng = SmallRng::seed_from_u64(settings.seed);
        Self {
            settings: Arc::new(settings),
            canvas: canvas.max(Vec2::ONE),
            image: None,
            particles: Vec::new(),
            pointer: PointerState::new(),
            force_enabled: true,
            pulses: PulseScheduler::new(),
            grid: CollisionGrid::new(SpatialConfig::default()),
            clock,
            last_step_ms: None,
            step_count: 0,
            rng,
            visible_fraction: 1.0,
            effects_suppressed: false,
            live: Vec::new(),
        }
    }

    /// Engine driven by the system clock.
    pub fn with_wall_clock(settings: Settings, canvas: Vec2) -> Self {
        Self::new(settings, canvas, Box::new(WallClock::new()))
    }

    /// Replace the particle store with one seeded from `image`.
    ///
    /// On failure the store is left empty.
    pub fn seed(&mut self, image: SourceImage) -> Result<&[Particle], SeedError> {
        self.image = Some(image);
        self.reseed()?;
        Ok(&self.particles)
    }

    /// Decode `bytes` and seed from the result.
    ///
    /// An undecodable image empties the store and is reported to the caller.
    pub fn seed_encoded(&mut self, bytes: &[u8]) -> Result<&[Particle], SeedError> {
        match SourceImage::from_encoded(bytes) {
            Ok(image) => self.seed(image),
            Err(e) => {
                tracing::warn!(error = %e, "seed image rejected");
                self.image = None;
                self.particles.clear();
                Err(e)
            }
        }
    }

    /// The image the store was seeded from.
    pub fn image(&self) -> Option<&SourceImage> {
        self.image.as_ref()
    }

    fn reseed(&mut self) -> Result<(), SeedError> {
        self.particles.clear();
        self.rng = SmallRng::seed_from_u64(self.settings.seed);
        let Some(image) = self.image.as_ref() else {
            return Ok(());
        };
        match seed_particles(image, self.canvas, &self.settings) {
            Ok(particles) => {
                tracing::info!(
                    count = particles.len(),
                    width = self.canvas.x,
                    height = self.canvas.y,
                    "particle store rebuilt"
                );
                self.particles = particles;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "seeding failed, store left empty");
                self.image = None;
                Err(e)
            }
        }
    }

    /// Change the canvas size. Rebuilds the particle store.
    pub fn resize(&mut self, canvas: Vec2) -> Result<(), SeedError> {
        self.canvas = canvas.max(Vec2::ONE);
        self.reseed()
    }

    /// Replace the settings snapshot.
    ///
    /// Density, image scale and seed changes rebuild the store; anything else
    /// is applied to the existing particles.
    pub fn set_settings(&mut self, settings: Settings) -> Result<(), SeedError> {
        let reseed = self.settings.needs_reseed(&settings);
        self.settings = Arc::new(settings);
        tracing::debug!(reseed, "settings replaced");
        if reseed {
            return self.reseed();
        }
        let settings = Arc::clone(&self.settings);
        for p in &mut self.particles {
            p.size = settings.particle_size;
            p.shape = settings.shape;
            p.visible = settings.color_filter.accepts(&p.color);
        }
        Ok(())
    }

    /// Current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Feed a pointer event. Sampled at the next step.
    pub fn pointer_event(&mut self, event: PointerEvent) {
        self.pointer.apply(event);
    }

    pub fn pointer(&self) -> &PointerState {
        &self.pointer
    }

    /// Enable or disable the pointer forces.
    pub fn set_force_enabled(&mut self, enabled: bool) {
        self.force_enabled = enabled;
    }

    pub fn force_enabled(&self) -> bool {
        self.force_enabled
    }

    /// Start a pulse now.
    pub fn add_pulse(&mut self, pulse: ForcePulse) {
        let now = self.clock.now_ms();
        self.pulses.add(pulse, now);
    }

    pub fn pulses(&self) -> &PulseScheduler {
        &self.pulses
    }

    /// Scatter every particle to a random canvas position.
    ///
    /// Rest positions are untouched, so restoration pulls the image back
    /// together.
    pub fn randomize(&mut self) {
        let (w, h) = (self.canvas.x, self.canvas.y);
        for p in &mut self.particles {
            p.position = Vec2::new(self.rng.gen_range(0.0..w), self.rng.gen_range(0.0..h));
            p.velocity = Vec2::ZERO;
        }
        tracing::debug!(count = self.particles.len(), "particles scattered");
    }

    /// Fraction of particles updated and drawn, in `(0, 1]`.
    pub fn set_visible_fraction(&mut self, fraction: f32) {
        self.visible_fraction = fraction.clamp(0.01, 1.0);
    }

    pub fn visible_fraction(&self) -> f32 {
        self.visible_fraction
    }

    /// Turn glow and additive blending off regardless of settings.
    pub fn set_effects_suppressed(&mut self, suppressed: bool) {
        self.effects_suppressed = suppressed;
    }

    pub fn effects_suppressed(&self) -> bool {
        self.effects_suppressed
    }

    /// Visual effects after suppression is applied.
    pub fn effective_effects(&self) -> VisualEffects {
        let mut effects = self.settings.effects.clone();
        if self.effects_suppressed {
            effects.glow = false;
            effects.additive_blend = false;
        }
        effects
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Visual snapshot of every particle.
    pub fn snapshots(&self) -> Vec<ParticleSnapshot> {
        self.particles.iter().map(Particle::snapshot).collect()
    }

    pub fn canvas(&self) -> Vec2 {
        self.canvas
    }

    /// Time on the engine's clock.
    pub fn now_ms(&self) -> f64 {
        self.clock.now_ms()
    }

    /// Make the next step measure time from now.
    ///
    /// Used after a pause, and by replay so its first step is one fixed
    /// timestep long rather than a nominal frame.
    pub fn sync_clock(&mut self) {
        self.last_step_ms = Some(self.clock.now_ms());
    }

    /// Steps taken since creation.
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Speed ceiling in pixels per nominal frame.
    pub fn max_speed(&self) -> f32 {
        self.canvas.max_element() * MAX_SPEED_FRACTION
    }

    /// Particles updated by the last step.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    fn in_bounds(&self, pos: Vec2) -> bool {
        let margin = self.canvas * CULL_MARGIN;
        pos.cmpge(-margin).all() && pos.cmple(self.canvas + margin).all()
    }

    /// Advance the simulation by the time elapsed since the previous step.
    pub fn step(&mut self) {
        let now = self.clock.now_ms();
        let dt_ms = match self.last_step_ms {
            Some(last) => (now - last).clamp(0.0, MAX_STEP_MS),
            None => NOMINAL_FRAME_MS,
        };
        self.last_step_ms = Some(now);
        self.step_count += 1;
        self.pulses.purge(now);

        let frame = (dt_ms / NOMINAL_FRAME_MS) as f32;
        if frame <= 0.0 || self.particles.is_empty() {
            self.pointer.end_step();
            return;
        }

        let settings = Arc::clone(&self.settings);
        let origin = if self.force_enabled {
            self.pointer.force_origin(settings.continuous_force)
        } else {
            None
        };

        let mut live = std::mem::take(&mut self.live);
        live.clear();
        live.extend(
            decimated(self.particles.len(), self.visible_fraction).filter(|&i| {
                let p = &self.particles[i];
                p.visible && self.in_bounds(p.position)
            }),
        );

        let damping = (settings.viscosity + settings.restoration * STIFFNESS_DAMPING)
            .clamp(0.0, DAMPING_CEILING);
        let keep = (1.0 - damping).powf(frame);
        let max_speed = self.max_speed();
        let min_side = self.canvas.min_element();
        let ctx = PulseContext {
            canvas: self.canvas,
            now_ms: now,
        };

        for &i in &live {
            let p = &mut self.particles[i];
            let rest = p.rest_position();

            let mut accel =
                restoration(p.position, rest, settings.restoration, p.healing_multiplier);
            if !self.pulses.is_empty() {
                accel += self.pulses.acceleration(i, p.position, &ctx);
            }
            if let Some(origin) = origin {
                accel += pointer_forces(
                    &settings,
                    p.position,
                    p.velocity,
                    rest,
                    origin,
                    min_side,
                    now,
                );
            }

            let mut velocity = (p.velocity + accel * frame) * keep;
            if !velocity.is_finite() {
                velocity = Vec2::ZERO;
            }
            let speed = velocity.length();
            if speed > max_speed {
                velocity *= max_speed / speed;
            }
            p.velocity = velocity;
            p.position += velocity * frame;
            if !p.position.is_finite() {
                p.position = rest;
                p.velocity = Vec2::ZERO;
            }
        }

        if settings.collisions.enabled {
            self.grid.rebuild(&self.particles, &live);
            resolve_overlaps(&mut self.particles, &live, &self.grid, &settings.collisions);
        }

        for &i in &live {
            let p = &mut self.particles[i];
            if p.displacement() < SNAP_DISTANCE && p.velocity.length() < SNAP_SPEED {
                p.position = p.rest_position();
                p.velocity = Vec2::ZERO;
            }
            resolve_walls(p, self.canvas, settings.walls, settings.wall_restitution);
        }

        self.live = live;
        self.pointer.end_step();
    }

    /// Draw the live particles.
    ///
    /// Does not clear the surface; callers decide between clearing and
    /// fading for trails.
    pub fn draw(&self, surface: &mut dyn Surface) {
        let effects = self.effective_effects();
        surface.set_blend_mode(effects.blend_mode());
        for i in decimated(self.particles.len(), self.visible_fraction) {
            let p = &self.particles[i];
            if p.visible {
                draw_particle(surface, p.shape, p.position, p.size, p.color, &effects);
            }
        }
    }
}

/// Indices kept when only `fraction` of `len` particles are updated.
///
/// Index `i` is kept when `floor(i * fraction)` steps up, so the kept set is
/// spread evenly and holds `floor((len - 1) * fraction) + 1` indices.
pub fn decimated(len: usize, fraction: f32) -> impl Iterator<Item = usize> {
    let f = f64::from(fraction.clamp(0.0, 1.0));
    (0..len).filter(move |&i| i == 0 || (i as f64 * f).floor() > ((i - 1) as f64 * f).floor())
}

fn resolve_walls(p: &mut Particle, canvas: Vec2, mode: WallMode, restitution: f32) {
    match mode {
        WallMode::None => {}
        WallMode::Bounce => {
            let keep = restitution.clamp(0.0, 1.0);
            if p.position.x < 0.0 {
                p.position.x = 0.0;
                p.velocity.x = p.velocity.x.abs() * keep;
            } else if p.position.x > canvas.x {
                p.position.x = canvas.x;
                p.velocity.x = -p.velocity.x.abs() * keep;
            }
            if p.position.y < 0.0 {
                p.position.y = 0.0;
                p.velocity.y = p.velocity.y.abs() * keep;
            } else if p.position.y > canvas.y {
                p.position.y = canvas.y;
                p.velocity.y = -p.velocity.y.abs() * keep;
            }
        }
        WallMode::Confine => {
            if p.position.x < 0.0 || p.position.x > canvas.x {
                p.position.x = p.position.x.clamp(0.0, canvas.x);
                p.velocity.x = 0.0;
            }
            if p.position.y < 0.0 || p.position.y > canvas.y {
                p.position.y = p.position.y.clamp(0.0, canvas.y);
                p.velocity.y = 0.0;
            }
        }
    }
}
