//! Spatial hashing for particle-particle collisions.
//!
//! The grid is rebuilt from scratch every step. Particles are bucketed by the
//! integer cell their position falls in, and a query scans the particle's own
//! cell plus its 8 neighbours. Cell size is constant and independent of
//! particle size, so the search is approximate: with a large radius
//! multiplier two particles closer than their contact distance can land two
//! cells apart and miss each other. Collisions are a soft separation, so the
//! occasional miss is harmless.

use glam::Vec2;
use std::collections::HashMap;

use crate::forces::MIN_DISTANCE;
use crate::particle::Particle;
use crate::settings::CollisionSettings;

/// Cell size used when none is configured, in canvas pixels.
pub const DEFAULT_CELL_SIZE: f32 = 16.0;

/// Configuration for the spatial hash.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpatialConfig {
    /// Size of each square cell in canvas pixels
    pub cell_size: f32,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
        }
    }
}

impl SpatialConfig {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(1.0),
        }
    }

    /// Integer cell containing `pos`.
    #[inline]
    pub fn cell_of(&self, pos: Vec2) -> (i32, i32) {
        (
            (pos.x / self.cell_size).floor() as i32,
            (pos.y / self.cell_size).floor() as i32,
        )
    }
}

/// Per-step bucket index of particle positions.
#[derive(Debug, Default)]
pub struct CollisionGrid {
    config: SpatialConfig,
    cells: HashMap<(i32, i32), Vec<usize>>,
}

impl CollisionGrid {
    pub fn new(config: SpatialConfig) -> Self {
        Self {
            config,
            cells: HashMap::new(),
        }
    }

    pub fn config(&self) -> SpatialConfig {
        self.config
    }

    /// Replace the contents with the given particles.
    ///
    /// Buckets still occupied are reused; cells left empty are dropped.
    pub fn rebuild(&mut self, particles: &[Particle], indices: &[usize]) {
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
        for &i in indices {
            let cell = self.config.cell_of(particles[i].position);
            self.cells.entry(cell).or_default().push(i);
        }
        self.cells.retain(|_, bucket| !bucket.is_empty());
    }

    /// Indices in the 3x3 block of cells around `pos`.
    pub fn neighbors(&self, pos: Vec2) -> impl Iterator<Item = usize> + '_ {
        let (cx, cy) = self.config.cell_of(pos);
        (-1..=1)
            .flat_map(move |dy| (-1..=1).map(move |dx| (cx + dx, cy + dy)))
            .filter_map(move |cell| self.cells.get(&cell))
            .flat_map(|bucket| bucket.iter().copied())
    }

    /// Number of non-empty cells.
    pub fn occupied_cells(&self) -> usize {
        self.cells.values().filter(|b| !b.is_empty()).count()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }
}

/// Push overlapping particles apart.
///
/// Each overlapping pair `(i, j)` with `i < j` is visited once. Both move
/// along the separation normal by half the overlap times `strength`, so one
/// pass never separates a pair beyond its contact distance. Pairs sitting on
/// top of each other have no normal and are left alone.
///
/// Returns the number of pairs that were separated.
pub fn resolve_overlaps(
    particles: &mut [Particle],
    indices: &[usize],
    grid: &CollisionGrid,
    settings: &CollisionSettings,
) -> usize {
    let strength = settings.strength.clamp(0.0, 1.0);
    if strength == 0.0 {
        return 0;
    }
    let mut resolved = 0;
    let mut neighbors = Vec::new();

    for &i in indices {
        neighbors.clear();
        neighbors.extend(grid.neighbors(particles[i].position).filter(|&j| j > i));

        for &j in &neighbors {
            let a = &particles[i];
            let b = &particles[j];
            let min_dist = (a.size + b.size) * 0.5 * settings.radius_multiplier;
            let delta = b.position - a.position;
            let dist = delta.length();
            if dist >= min_dist || dist < MIN_DISTANCE {
                continue;
            }
            let push = delta / dist * (min_dist - dist) * 0.5 * strength;
            particles[i].position -= push;
            particles[j].position += push;
            resolved += 1;
        }
    }
    resolved
}
