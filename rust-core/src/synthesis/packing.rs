use log::{debug, info};
use nalgebra::Vector3;
use rand::Rng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::grain::GrainArena;
use super::population::{generate_grain, pick_phase};
use super::raster::GridGeometry;
use crate::config::{
    SynthesisConfig, NEIGHBOR_SHELLS, PACKING_RESOLUTION_FACTOR, SMALL_ERROR_THRESHOLD,
};
use crate::interfaces::{Boundary, GrainId, PhaseId, PhaseType};
use crate::stats::{
    target_neighbor_distribution, target_size_distribution, PhaseStats, SizeHistogram, StatsInput,
};

/// Coarse occupancy grid scored by the filling error `sum (owners - 1)^2 / N`.
///
/// The error is maintained incrementally: adding a cell with `o` owners changes the sum by
/// `2o - 1`, removing one by `3 - 2o`.
#[derive(Debug, Clone)]
pub struct PackingGrid {
    geometry: GridGeometry,
    owners: Vec<i32>,
    filling_error: f64,
}

impl PackingGrid {
    /// Packing grid four times coarser than the voxel grid of the same sample
    pub fn new(size: [f64; 3], voxel_resolution: [f64; 3], boundary: Boundary) -> Self {
        let resolution = voxel_resolution.map(|r| r * PACKING_RESOLUTION_FACTOR);
        Self::with_geometry(GridGeometry::covering(size, resolution, boundary))
    }

    pub fn with_geometry(geometry: GridGeometry) -> Self {
        let total = geometry.total();
        Self {
            geometry,
            owners: vec![0; total],
            filling_error: 1.0,
        }
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn owners(&self) -> &[i32] {
        &self.owners
    }

    pub fn filling_error(&self) -> f64 {
        self.filling_error
    }

    fn cell_count(&self) -> f64 {
        self.owners.len() as f64
    }

    /// Filling error if `cells` (unique) were added, without touching the grid
    pub fn error_after_adding(&self, cells: &[usize]) -> f64 {
        let delta: i64 = cells
            .iter()
            .map(|&c| 2 * self.owners[c] as i64 - 1)
            .sum();
        self.filling_error + delta as f64 / self.cell_count()
    }

    pub fn add(&mut self, cells: &[usize]) {
        let n = self.cell_count();
        for &c in cells {
            self.filling_error += (2 * self.owners[c] - 1) as f64 / n;
            self.owners[c] += 1;
        }
    }

    pub fn remove(&mut self, cells: &[usize]) {
        let n = self.cell_count();
        for &c in cells {
            self.filling_error += (3 - 2 * self.owners[c]) as f64 / n;
            self.owners[c] -= 1;
        }
    }

    /// Filling error after adding `add` and removing `remove`; the grid is left unchanged.
    pub fn trial_filling_error(&mut self, add: &[usize], remove: &[usize]) -> f64 {
        let before = self.filling_error;
        self.add(add);
        self.remove(remove);
        let after = self.filling_error;
        self.add(remove);
        self.remove(add);
        self.filling_error = before;
        after
    }

    /// Filling error recomputed from scratch
    pub fn recompute_filling_error(&self) -> f64 {
        let sum: f64 = self
            .owners
            .iter()
            .map(|&o| ((o - 1) * (o - 1)) as f64)
            .sum();
        sum / self.cell_count()
    }
}

/// The three packing error terms
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PackingErrors {
    pub filling: f64,
    pub size: f64,
    pub neighborhood: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackingMove {
    Add = 0,
    Remove = 1,
    Swap = 2,
    Replace = 3,
    /// Nudge of one grain's centroid by up to two packing cells per axis
    Move = 4,
}

impl PackingMove {
    pub const COUNT: usize = 5;

    fn for_iteration(iteration: usize) -> Self {
        match iteration % Self::COUNT {
            0 => PackingMove::Add,
            1 => PackingMove::Remove,
            2 => PackingMove::Swap,
            3 => PackingMove::Replace,
            _ => PackingMove::Move,
        }
    }
}

/// Outcome of a packing run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackingReport {
    pub iterations: usize,
    /// Accepted moves indexed by [`PackingMove`]
    pub accepted: [usize; PackingMove::COUNT],
    pub errors: PackingErrors,
    pub active_grains: usize,
    /// Filling error after the initial placement and after every accepted move
    pub filling_history: Vec<f64>,
}

/// Target size histograms of the primary phases, scored against the interior grains
#[derive(Debug, Clone)]
pub struct SizeTargets {
    targets: Vec<(PhaseId, SizeHistogram)>,
}

impl SizeTargets {
    pub fn new(stats: &StatsInput) -> Self {
        let targets = stats
            .phases_of_type(PhaseType::Primary)
            .map(|(phase, p)| (phase, target_size_distribution(&p.size_distribution)))
            .collect();
        Self { targets }
    }

    /// Normalised SSD between the equivalent-diameter histograms of the active non-surface
    /// grains and their targets, over all primary phases
    pub fn error(&self, arena: &GrainArena) -> f64 {
        let mut simulated = Vec::new();
        let mut target = Vec::new();
        for (phase, wanted) in &self.targets {
            let mut hist = wanted.clone();
            hist.values.iter_mut().for_each(|v| *v = 0.0);
            let mut count = 0usize;
            for (_, g) in arena.iter() {
                if g.active && !g.surface && g.phase == *phase {
                    let bin = hist.bin_of(g.equivalent_diameter);
                    hist.values[bin] += 1.0;
                    count += 1;
                }
            }
            if count > 0 {
                hist.values.iter_mut().for_each(|v| *v /= count as f64);
            }
            simulated.extend(hist.values);
            target.extend_from_slice(&wanted.values);
        }
        crate::stats::normalized_ssd(&simulated, &target)
    }
}

// Neighbourhood targets of one primary phase
struct PhaseTargets {
    phase: PhaseId,
    neighbors: Vec<[f64; NEIGHBOR_SHELLS]>,
}

/// Simulated-annealing-free packing: greedy add/remove/swap/replace/move steps. A step is kept
/// when it lowers the weighted relative change of the filling, size and neighbourhood errors
/// and does not raise the filling error.
pub struct PackingOptimizer<'a> {
    stats: &'a StatsInput,
    config: &'a SynthesisConfig,
    grid: PackingGrid,
    sizes: SizeTargets,
    targets: Vec<PhaseTargets>,
    errors: PackingErrors,
}

impl<'a> PackingOptimizer<'a> {
    pub fn new(stats: &'a StatsInput, config: &'a SynthesisConfig) -> Self {
        let grid = PackingGrid::new(config.sample_size(), config.resolution, config.boundary);
        let targets = stats
            .phases_of_type(PhaseType::Primary)
            .map(|(phase, p)| PhaseTargets {
                phase,
                neighbors: target_neighbor_distribution(&p.neighbor_params),
            })
            .collect();
        Self {
            stats,
            config,
            grid,
            sizes: SizeTargets::new(stats),
            targets,
            errors: PackingErrors {
                filling: 1.0,
                size: 0.0,
                neighborhood: 0.0,
            },
        }
    }

    pub fn grid(&self) -> &PackingGrid {
        &self.grid
    }

    pub fn errors(&self) -> PackingErrors {
        self.errors
    }

    fn random_centroid<R: Rng + ?Sized>(&self, rng: &mut R) -> Vector3<f64> {
        let size = self.config.sample_size();
        Vector3::new(
            rng.gen::<f64>() * size[0],
            rng.gen::<f64>() * size[1],
            rng.gen::<f64>() * size[2],
        )
    }

    // Bounded samples flag grains whose bounding sphere crosses the sample faces
    fn touches_boundary(&self, centroid: &Vector3<f64>, reach: f64) -> bool {
        if self.config.boundary.is_periodic() {
            return false;
        }
        let size = self.config.sample_size();
        (0..3).any(|a| centroid[a] - reach < 0.0 || centroid[a] + reach > size[a])
    }

    fn realize(&self, arena: &mut GrainArena, id: GrainId, centroid: Vector3<f64>, cells: Vec<usize>) {
        let surface = arena
            .get(id)
            .map_or(false, |g| self.touches_boundary(&centroid, g.shape().bounding_radius()));
        if let Some(grain) = arena.get_mut(id) {
            grain.centroid = centroid;
            grain.packing_cells = cells;
            grain.surface = surface;
        }
    }

    /// Places every grain of `arena` at the best of several random centroids, judged by the
    /// filling error alone, and activates it.
    pub fn place_initial<R: Rng + ?Sized>(&mut self, arena: &mut GrainArena, rng: &mut R) {
        let trials = self.config.placement_trials.max(1);
        for id in arena.ids() {
            let Some(shape) = arena.get(id).map(|g| g.shape()) else {
                continue;
            };
            let centroids: Vec<Vector3<f64>> =
                (0..trials).map(|_| self.random_centroid(rng)).collect();
            let grid = &self.grid;
            let score = |c: &Vector3<f64>| {
                let cells = grid.geometry().rasterize(&shape, c);
                (grid.error_after_adding(&cells), cells)
            };
            #[cfg(feature = "parallel")]
            let scored: Vec<(f64, Vec<usize>)> = centroids.par_iter().map(score).collect();
            #[cfg(not(feature = "parallel"))]
            let scored: Vec<(f64, Vec<usize>)> = centroids.iter().map(score).collect();

            let mut best = 0;
            for (i, (error, _)) in scored.iter().enumerate() {
                if *error < scored[best].0 {
                    best = i;
                }
            }
            let (_, cells) = scored.into_iter().nth(best).unwrap_or_default();
            self.realize(arena, id, centroids[best], cells);
            self.commit(arena, Some(id), None);
        }
        self.errors = self.current_errors(arena);
        info!(
            "initial placement of {} grains: filling {:.4}, size {:.4}, neighbourhood {:.4}",
            arena.len(),
            self.errors.filling,
            self.errors.size,
            self.errors.neighborhood
        );
    }

    /// Runs the configured number of move iterations.
    pub fn optimize<R: Rng + ?Sized>(&mut self, arena: &mut GrainArena, rng: &mut R) -> PackingReport {
        let mut report = PackingReport {
            iterations: 0,
            accepted: [0; PackingMove::COUNT],
            errors: self.errors,
            active_grains: 0,
            filling_history: vec![self.errors.filling],
        };

        for iteration in 0..self.config.packing_iterations {
            report.iterations += 1;
            let mv = PackingMove::for_iteration(iteration);
            let active = arena.active_ids();
            let victim = if active.is_empty() {
                None
            } else {
                Some(active[rng.gen_range(0..active.len())])
            };

            if mv == PackingMove::Move {
                if let Some(id) = self.crowded_grain(arena, &active, rng) {
                    if self.nudge(arena, id, rng) {
                        report.accepted[mv as usize] += 1;
                        report.filling_history.push(self.grid.filling_error());
                    }
                }
                continue;
            }

            let (add, remove) = match mv {
                PackingMove::Add => (self.spawn_candidate(arena, None, rng), None),
                PackingMove::Remove => (None, victim),
                PackingMove::Swap => match victim {
                    Some(v) => (self.spawn_candidate(arena, None, rng), Some(v)),
                    None => continue,
                },
                PackingMove::Replace => match victim {
                    Some(v) => {
                        let at = arena.get(v).map(|g| g.centroid);
                        (self.spawn_candidate(arena, at, rng), Some(v))
                    }
                    None => continue,
                },
                PackingMove::Move => continue,
            };
            if add.is_none() && remove.is_none() {
                continue;
            }
            if mv != PackingMove::Remove && add.is_none() {
                continue;
            }

            let candidate = self.evaluate(arena, add, remove);
            if self.accepts(&candidate) {
                self.commit(arena, add, remove);
                self.errors = candidate;
                report.accepted[mv as usize] += 1;
                report.filling_history.push(self.grid.filling_error());
            } else if add.is_some() {
                arena.pop();
            }

            if iteration % 1000 == 0 {
                debug!(
                    "packing iteration {}: filling {:.4}, size {:.4}, neighbourhood {:.4}",
                    iteration, self.errors.filling, self.errors.size, self.errors.neighborhood
                );
            }
        }

        report.errors = self.errors;
        report.active_grains = arena.active_ids().len();
        info!(
            "packing finished after {} iterations with {} grains (accepted {:?})",
            report.iterations, report.active_grains, report.accepted
        );
        report
    }

    // New inactive grain pushed onto the arena, rasterized at `at` or a random point
    fn spawn_candidate<R: Rng + ?Sized>(
        &self,
        arena: &mut GrainArena,
        at: Option<Vector3<f64>>,
        rng: &mut R,
    ) -> Option<GrainId> {
        let phase = pick_phase(self.stats, PhaseType::Primary, rng)?;
        let stats = self.stats.phase(phase)?;
        let grain = generate_grain(phase, stats, self.config.shape_class, rng);
        let centroid = at.unwrap_or_else(|| self.random_centroid(rng));
        let cells = self.grid.geometry().rasterize(&grain.shape(), &centroid);
        let id = arena.push(grain);
        self.realize(arena, id, centroid, cells);
        Some(id)
    }

    /// Weighted relative change below zero, with the filling error held or lowered
    fn accepts(&self, candidate: &PackingErrors) -> bool {
        let w = self.config.weights;
        let change = |new: f64, old: f64| {
            if new < SMALL_ERROR_THRESHOLD || old <= 0.0 {
                0.0
            } else {
                (new - old) / old
            }
        };
        let total = w.filling * change(candidate.filling, self.errors.filling)
            + w.size * change(candidate.size, self.errors.size)
            + w.neighborhood * change(candidate.neighborhood, self.errors.neighborhood);
        total < 0.0 && candidate.filling <= self.errors.filling
    }

    /// Errors the structure would have after the move; all state is restored afterwards.
    fn evaluate(&mut self, arena: &mut GrainArena, add: Option<GrainId>, remove: Option<GrainId>) -> PackingErrors {
        let w = self.config.weights;
        let added = add
            .and_then(|id| arena.get(id))
            .map_or(&[][..], |g| g.packing_cells.as_slice());
        let removed = remove
            .and_then(|id| arena.get(id))
            .map_or(&[][..], |g| g.packing_cells.as_slice());
        let filling = self.grid.trial_filling_error(added, removed);

        self.apply_membership(arena, add, remove);
        let size = if w.size > 0.0 {
            self.size_error(arena)
        } else {
            self.errors.size
        };
        let neighborhood = if w.neighborhood > 0.0 {
            self.neighborhood_error(arena)
        } else {
            self.errors.neighborhood
        };
        self.revert_membership(arena, add, remove);

        PackingErrors {
            filling,
            size,
            neighborhood,
        }
    }

    fn commit(&mut self, arena: &mut GrainArena, add: Option<GrainId>, remove: Option<GrainId>) {
        if let Some(g) = add.and_then(|id| arena.get(id)) {
            self.grid.add(&g.packing_cells);
        }
        if let Some(g) = remove.and_then(|id| arena.get(id)) {
            self.grid.remove(&g.packing_cells);
        }
        self.apply_membership(arena, add, remove);
    }

    // Active grain whose centroid cell is shared, scanning on from a random start; falls back
    // to the start grain when no centroid sits in an overlap
    fn crowded_grain<R: Rng + ?Sized>(&self, arena: &GrainArena, active: &[GrainId], rng: &mut R) -> Option<GrainId> {
        if active.is_empty() {
            return None;
        }
        let start = rng.gen_range(0..active.len());
        let geometry = self.grid.geometry();
        let crowded = (0..active.len()).map(|k| active[(start + k) % active.len()]).find(|&id| {
            arena.get(id).map_or(false, |g| {
                let [x, y, z] = geometry.cell_of_point(&g.centroid);
                let inside = [x, y, z]
                    .iter()
                    .zip(geometry.dims)
                    .all(|(&c, n)| c >= 0 && (c as usize) < n);
                inside && self.grid.owners()[geometry.index([x as usize, y as usize, z as usize])] > 1
            })
        });
        Some(crowded.unwrap_or(active[start]))
    }

    /// Shifts grain `id` by up to two packing cells per axis and keeps the shift when it passes
    /// [`Self::accepts`]. An axis whose shifted coordinate leaves the sample keeps its old value.
    pub fn nudge<R: Rng + ?Sized>(&mut self, arena: &mut GrainArena, id: GrainId, rng: &mut R) -> bool {
        let Some((old_centroid, old_cells, shape)) =
            arena.get(id).map(|g| (g.centroid, g.packing_cells.clone(), g.shape()))
        else {
            return false;
        };
        let step = self.grid.geometry().resolution;
        let size = self.config.sample_size();
        let mut centroid = old_centroid;
        for axis in 0..3 {
            let shifted = old_centroid[axis] + (2.0 * rng.gen::<f64>() - 1.0) * 2.0 * step[axis];
            if shifted > 0.0 && shifted < size[axis] {
                centroid[axis] = shifted;
            }
        }
        let cells = self.grid.geometry().rasterize(&shape, &centroid);

        let w = self.config.weights;
        let filling = self.grid.trial_filling_error(&cells, &old_cells);
        self.relocate(arena, id, centroid, cells.clone());
        let candidate = PackingErrors {
            filling,
            size: if w.size > 0.0 {
                self.size_error(arena)
            } else {
                self.errors.size
            },
            neighborhood: if w.neighborhood > 0.0 {
                self.neighborhood_error(arena)
            } else {
                self.errors.neighborhood
            },
        };

        if self.accepts(&candidate) {
            self.grid.add(&cells);
            self.grid.remove(&old_cells);
            self.errors = candidate;
            true
        } else {
            self.relocate(arena, id, old_centroid, old_cells);
            false
        }
    }

    // Moves an active grain, keeping every shell count in step
    fn relocate(&self, arena: &mut GrainArena, id: GrainId, centroid: Vector3<f64>, cells: Vec<usize>) {
        update_neighbor_histograms(arena, id, -1);
        self.realize(arena, id, centroid, cells);
        update_neighbor_histograms(arena, id, 1);
    }

    fn apply_membership(&self, arena: &mut GrainArena, add: Option<GrainId>, remove: Option<GrainId>) {
        if let Some(r) = remove {
            update_neighbor_histograms(arena, r, -1);
            set_active(arena, r, false);
        }
        if let Some(a) = add {
            set_active(arena, a, true);
            update_neighbor_histograms(arena, a, 1);
        }
    }

    fn revert_membership(&self, arena: &mut GrainArena, add: Option<GrainId>, remove: Option<GrainId>) {
        if let Some(a) = add {
            update_neighbor_histograms(arena, a, -1);
            set_active(arena, a, false);
        }
        if let Some(r) = remove {
            set_active(arena, r, true);
            update_neighbor_histograms(arena, r, 1);
        }
    }

    pub fn current_errors(&self, arena: &GrainArena) -> PackingErrors {
        PackingErrors {
            filling: self.grid.filling_error(),
            size: self.size_error(arena),
            neighborhood: self.neighborhood_error(arena),
        }
    }

    pub fn size_error(&self, arena: &GrainArena) -> f64 {
        self.sizes.error(arena)
    }

    /// Normalised SSD between the mean neighbour histogram per diameter bin and its target
    pub fn neighborhood_error(&self, arena: &GrainArena) -> f64 {
        let mut simulated = Vec::new();
        let mut target = Vec::new();
        for t in &self.targets {
            let Some(stats) = self.stats.phase(t.phase) else {
                continue;
            };
            let bins = t.neighbors.len();
            let mut sums = vec![[0.0; NEIGHBOR_SHELLS]; bins];
            let mut counts = vec![0usize; bins];
            for (_, g) in arena.iter() {
                if g.active && !g.surface && g.phase == t.phase {
                    let bin = neighbor_bin(stats, g.equivalent_diameter);
                    for s in 0..NEIGHBOR_SHELLS {
                        sums[bin][s] += g.neighbor_histogram[s] as f64;
                    }
                    counts[bin] += 1;
                }
            }
            for (bin, shells) in sums.iter().enumerate() {
                for s in 0..NEIGHBOR_SHELLS {
                    let mean = if counts[bin] > 0 {
                        shells[s] / counts[bin] as f64
                    } else {
                        0.0
                    };
                    simulated.push(mean);
                    target.push(t.neighbors[bin][s]);
                }
            }
        }
        crate::stats::normalized_ssd(&simulated, &target)
    }
}

fn neighbor_bin(stats: &PhaseStats, diameter: f64) -> usize {
    let size = &stats.size_distribution;
    stats.diameter_bin(diameter.clamp(size.min_diameter, size.max_diameter))
}

fn set_active(arena: &mut GrainArena, id: GrainId, active: bool) {
    if let Some(g) = arena.get_mut(id) {
        g.active = active;
    }
}

/// Adds `sign` to the shell counts between grain `id` and every other active grain.
///
/// Each grain counts the centroids lying within 1, 2 and 3 of its own radii.
pub fn update_neighbor_histograms(arena: &mut GrainArena, id: GrainId, sign: i64) {
    let Some((centroid, radius)) = arena.get(id).map(|g| (g.centroid, g.equivalent_diameter * 0.5)) else {
        return;
    };
    let mut own = [0i64; NEIGHBOR_SHELLS];
    let mut others = Vec::new();
    for (other, g) in arena.iter() {
        if other == id || !g.active {
            continue;
        }
        let dist = (g.centroid - centroid).norm();
        if let Some(k) = first_shell(dist, radius) {
            own.iter_mut().skip(k).for_each(|c| *c += sign);
        }
        if let Some(k) = first_shell(dist, g.equivalent_diameter * 0.5) {
            others.push((other, k));
        }
    }
    for (other, k) in others {
        if let Some(g) = arena.get_mut(other) {
            g.neighbor_histogram.iter_mut().skip(k).for_each(|c| *c += sign);
        }
    }
    if let Some(g) = arena.get_mut(id) {
        for (c, d) in g.neighbor_histogram.iter_mut().zip(own) {
            *c += d;
        }
    }
}

// Innermost shell (in units of `radius`) that holds a centroid at `dist`
fn first_shell(dist: f64, radius: f64) -> Option<usize> {
    if radius <= 0.0 || dist >= NEIGHBOR_SHELLS as f64 * radius {
        return None;
    }
    Some(((dist / radius) as usize).min(NEIGHBOR_SHELLS - 1))
}
