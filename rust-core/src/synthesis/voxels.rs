use std::collections::BTreeMap;
use std::f64::consts::PI;

use log::{debug, info, warn};
use nalgebra::Vector3;
use rand::Rng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::grain::GrainArena;
use super::packing::SizeTargets;
use super::population::{generate_grain, pick_phase};
use super::raster::GridGeometry;
use crate::config::{MAX_REJECTION_DRAWS, PRECIPITATE_ACCEPTANCE_FRACTION};
use crate::interfaces::{GrainId, PhaseId, PhaseType};
use crate::shapes::{GrainShape, ShapeClass};
use crate::stats::StatsInput;

/// Owner marker of a voxel claimed by more than one grain
pub const CONTESTED: i32 = -1;

/// Full-resolution voxel field of the synthesized microstructure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoxelGrid {
    pub geometry: GridGeometry,
    /// Owning grain per voxel; 0 is unassigned, negative is contested
    pub grain_ids: Vec<i32>,
    /// Phase per voxel; 0 while unassigned
    pub phases: Vec<PhaseId>,
    /// Number of face neighbours owned by a different grain
    pub surface: Vec<u8>,
}

impl VoxelGrid {
    pub fn new(geometry: GridGeometry) -> Self {
        let total = geometry.total();
        Self {
            geometry,
            grain_ids: vec![0; total],
            phases: vec![0; total],
            surface: vec![0; total],
        }
    }

    pub fn len(&self) -> usize {
        self.grain_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grain_ids.is_empty()
    }

    pub fn unassigned_count(&self) -> usize {
        self.grain_ids.iter().filter(|&&g| g <= 0).count()
    }

    /// Owner of voxel `index` if it is assigned
    pub fn owner(&self, index: usize) -> Option<GrainId> {
        let g = self.grain_ids[index];
        (g > 0).then_some(g as GrainId)
    }

    fn claim(&mut self, index: usize, id: GrainId, phase: PhaseId) {
        self.grain_ids[index] = id as i32;
        self.phases[index] = phase;
    }

    fn release(&mut self, index: usize) {
        self.grain_ids[index] = CONTESTED;
        self.phases[index] = 0;
    }
}

/// Rasterizes every active grain onto a fresh voxel grid.
///
/// A voxel claimed twice becomes [`CONTESTED`] for good and is left to [`fill_gaps`]. Voxel
/// counts of the grains are updated to what they finally hold.
pub fn assign_voxels(arena: &mut GrainArena, geometry: GridGeometry) -> VoxelGrid {
    let jobs: Vec<(GrainId, GrainShape, Vector3<f64>)> = arena
        .iter()
        .filter(|(_, g)| g.active)
        .map(|(id, g)| (id, g.shape(), g.centroid))
        .collect();

    let raster = |(id, shape, centroid): &(GrainId, GrainShape, Vector3<f64>)| {
        (*id, geometry.rasterize(shape, centroid))
    };
    #[cfg(feature = "parallel")]
    let claims: Vec<(GrainId, Vec<usize>)> = jobs.par_iter().map(raster).collect();
    #[cfg(not(feature = "parallel"))]
    let claims: Vec<(GrainId, Vec<usize>)> = jobs.iter().map(raster).collect();

    let mut grid = VoxelGrid::new(geometry);
    let mut counts = vec![0usize; arena.len() + 1];
    let mut contested = 0usize;
    for (id, cells) in claims {
        let phase = arena.get(id).map_or(0, |g| g.phase);
        for cell in cells {
            match grid.grain_ids[cell] {
                0 => {
                    grid.claim(cell, id, phase);
                    counts[id] += 1;
                }
                owner if owner > 0 => {
                    counts[owner as usize] -= 1;
                    grid.release(cell);
                    contested += 1;
                }
                _ => {}
            }
        }
    }
    for (id, grain) in arena.iter_mut() {
        grain.num_voxels = counts[id];
    }
    info!(
        "assigned {} of {} voxels ({} contested)",
        grid.len() - grid.unassigned_count(),
        grid.len(),
        contested
    );
    grid
}

/// Drops inactive grains and grains without voxels, renumbering the rest and the grid.
/// Returns the number of grains dropped.
pub fn drop_empty_grains(grid: &mut VoxelGrid, arena: &mut GrainArena) -> usize {
    let before = arena.len();
    let remap = arena.compact(|g| g.active && g.num_voxels > 0);
    for owner in grid.grain_ids.iter_mut().filter(|g| **g > 0) {
        *owner = remap[*owner as usize] as i32;
    }
    for (owner, phase) in grid.grain_ids.iter().zip(grid.phases.iter_mut()) {
        if *owner <= 0 {
            *phase = 0;
        }
    }
    let dropped = before - arena.len();
    debug!("dropped {} empty grains, {} remain", dropped, arena.len());
    dropped
}

/// Grows assigned grains into unassigned voxels by face-neighbour majority vote until no
/// unassigned voxel is left, then refreshes voxel counts and equivalent diameters.
///
/// Each sweep votes on the state of the previous sweep. Ties go to the neighbour met first in
/// the order -z, -y, -x, +x, +y, +z. Returns the number of sweeps.
pub fn fill_gaps(grid: &mut VoxelGrid, arena: &mut GrainArena) -> usize {
    let mut sweeps = 0;
    loop {
        let unassigned: Vec<usize> = (0..grid.len()).filter(|&i| grid.grain_ids[i] <= 0).collect();
        if unassigned.is_empty() {
            break;
        }
        let snapshot = &*grid;
        let vote = |&i: &usize| majority_neighbor(snapshot, i).map(|id| (i, id));
        #[cfg(feature = "parallel")]
        let updates: Vec<(usize, GrainId)> = unassigned.par_iter().filter_map(vote).collect();
        #[cfg(not(feature = "parallel"))]
        let updates: Vec<(usize, GrainId)> = unassigned.iter().filter_map(vote).collect();

        if updates.is_empty() {
            warn!(
                "gap filling stalled with {} unassigned voxels and no assigned neighbours",
                unassigned.len()
            );
            break;
        }
        for (i, id) in updates {
            let phase = arena.get(id).map_or(0, |g| g.phase);
            grid.claim(i, id, phase);
        }
        sweeps += 1;
    }

    let voxel_volume: f64 = grid.geometry.resolution.iter().product();
    let mut counts = vec![0usize; arena.len() + 1];
    for id in grid.grain_ids.iter().filter(|&&g| g > 0) {
        counts[*id as usize] += 1;
    }
    for (id, grain) in arena.iter_mut() {
        grain.num_voxels = counts[id];
        grain.equivalent_diameter = equivalent_diameter(counts[id] as f64 * voxel_volume);
    }
    debug!("gap filling converged after {} sweeps", sweeps);
    sweeps
}

// Most frequent assigned owner among the face neighbours
fn majority_neighbor(grid: &VoxelGrid, index: usize) -> Option<GrainId> {
    let owners: Vec<GrainId> = grid
        .geometry
        .face_neighbors(index)
        .filter_map(|n| grid.owner(n))
        .collect();
    let mut best: Option<(GrainId, usize)> = None;
    for &candidate in &owners {
        let count = owners.iter().filter(|&&o| o == candidate).count();
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((candidate, count));
        }
    }
    best.map(|(id, _)| id)
}

/// Releases disconnected pieces of grains and refills the holes.
///
/// Pieces are face-connected, wrapping across the sample faces on periodic grids. A grain keeps
/// its largest piece. Its first piece is released as well when it holds fewer voxels than a
/// sphere of the phase's minimum diameter and does not touch the faces of a bounded sample.
/// Released voxels are gap-filled and grains left without voxels are dropped. Returns the number
/// of pieces released.
pub fn cleanup_features(grid: &mut VoxelGrid, arena: &mut GrainArena, stats: &StatsInput) -> usize {
    let geometry = grid.geometry;
    let voxel_volume: f64 = geometry.resolution.iter().product();
    let bounded = !geometry.boundary.is_periodic();
    let min_voxels: Vec<f64> = std::iter::once(0.0)
        .chain(arena.iter().map(|(_, g)| {
            stats.phase(g.phase).map_or(0.0, |p| {
                PI / 6.0 * p.size_distribution.min_diameter.powi(3) / voxel_volume
            })
        }))
        .collect();

    let mut visited = vec![false; grid.len()];
    let mut kept: Vec<Vec<usize>> = vec![Vec::new(); arena.len() + 1];
    let mut stack = Vec::new();
    let mut released = 0;
    for start in 0..grid.len() {
        let Some(owner) = grid.owner(start) else {
            continue;
        };
        if visited[start] || owner >= kept.len() {
            continue;
        }
        visited[start] = true;
        stack.push(start);
        let mut piece = Vec::new();
        let mut touches = false;
        while let Some(i) = stack.pop() {
            piece.push(i);
            touches |= bounded && geometry.is_boundary_cell(i);
            for n in geometry.linked_neighbors(i) {
                if !visited[n] && grid.grain_ids[n] == owner as i32 {
                    visited[n] = true;
                    stack.push(n);
                }
            }
        }

        let dropped = if kept[owner].is_empty() {
            if (piece.len() as f64) < min_voxels[owner] && !touches {
                piece
            } else {
                kept[owner] = piece;
                continue;
            }
        } else if piece.len() > kept[owner].len() {
            std::mem::replace(&mut kept[owner], piece)
        } else {
            piece
        };
        for i in dropped {
            grid.grain_ids[i] = 0;
            grid.phases[i] = 0;
        }
        released += 1;
    }

    if released > 0 {
        for (id, grain) in arena.iter_mut() {
            grain.num_voxels = kept[id].len();
        }
        drop_empty_grains(grid, arena);
        fill_gaps(grid, arena);
    }
    debug!("released {} disconnected grain pieces", released);
    released
}

/// Grows or shrinks interior grains by one voxel layer while that brings the equivalent-diameter
/// histogram closer to its target.
///
/// Each iteration picks a random non-surface grain and, with even odds, either claims every
/// foreign face neighbour of its voxels or hands each of its boundary voxels to the first
/// foreign neighbour met. The change is kept when the size error does not rise and no grain is
/// emptied, and undone otherwise. Returns the number of changes kept.
pub fn adjust_boundaries<R: Rng + ?Sized>(
    grid: &mut VoxelGrid,
    arena: &mut GrainArena,
    sizes: &SizeTargets,
    iterations: usize,
    rng: &mut R,
) -> usize {
    let candidates: Vec<GrainId> = arena
        .iter()
        .filter(|(_, g)| g.active && !g.surface && g.num_voxels > 0)
        .map(|(id, _)| id)
        .collect();
    if candidates.is_empty() || iterations == 0 {
        return 0;
    }
    let geometry = grid.geometry;
    let voxel_volume: f64 = geometry.resolution.iter().product();
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); arena.len() + 1];
    for (i, &owner) in grid.grain_ids.iter().enumerate() {
        if owner > 0 && (owner as usize) < members.len() {
            members[owner as usize].push(i);
        }
    }

    let initial = sizes.error(arena);
    let mut error = initial;
    let mut kept = 0;
    for _ in 0..iterations {
        let id = candidates[rng.gen_range(0..candidates.len())];
        let grow = rng.gen::<f64>() >= 0.5;

        // (voxel, from, to), decided on the grid as it stands
        let mut changes: Vec<(usize, GrainId, GrainId)> = Vec::new();
        for &v in &members[id] {
            for n in geometry.face_neighbors(v) {
                let Some(other) = grid.owner(n) else {
                    continue;
                };
                if other == id {
                    continue;
                }
                if grow {
                    changes.push((n, other, id));
                } else {
                    changes.push((v, id, other));
                    break;
                }
            }
        }
        if changes.is_empty() {
            continue;
        }
        changes.sort_unstable();
        changes.dedup_by_key(|c| c.0);

        reassign(grid, arena, &changes, false, voxel_volume);
        let emptied = changes
            .iter()
            .any(|&(_, from, _)| arena.get(from).map_or(true, |g| g.num_voxels == 0));
        let candidate = if emptied { f64::INFINITY } else { sizes.error(arena) };
        if candidate <= error {
            error = candidate;
            kept += 1;
            let moved: Vec<usize> = changes.iter().map(|c| c.0).collect();
            let mut sources: Vec<GrainId> = changes.iter().map(|c| c.1).collect();
            sources.sort_unstable();
            sources.dedup();
            for from in sources {
                members[from].retain(|x| moved.binary_search(x).is_err());
            }
            for &(v, _, to) in &changes {
                members[to].push(v);
            }
        } else {
            reassign(grid, arena, &changes, true, voxel_volume);
        }
    }
    info!(
        "kept {} of {} boundary adjustments, size error {:.4} -> {:.4}",
        kept, iterations, initial, error
    );
    kept
}

// Moves each voxel of `changes` from its first grain to its second, or back when `undo` is set,
// keeping voxel counts and equivalent diameters in step
fn reassign(
    grid: &mut VoxelGrid,
    arena: &mut GrainArena,
    changes: &[(usize, GrainId, GrainId)],
    undo: bool,
    voxel_volume: f64,
) {
    for &(v, from, to) in changes {
        let (from, to) = if undo { (to, from) } else { (from, to) };
        let phase = arena.get(to).map_or(0, |g| g.phase);
        grid.claim(v, to, phase);
        for (id, delta) in [(from, -1i64), (to, 1)] {
            if let Some(g) = arena.get_mut(id) {
                g.num_voxels = (g.num_voxels as i64 + delta).max(0) as usize;
                g.equivalent_diameter = equivalent_diameter(g.num_voxels as f64 * voxel_volume);
            }
        }
    }
}

/// Diameter of the sphere of volume `volume`
pub fn equivalent_diameter(volume: f64) -> f64 {
    2.0 * (volume * 3.0 / (4.0 * PI)).cbrt()
}

/// Builds grain adjacency from the filled grid.
///
/// Sets the surface flag of grains touching the sample faces, the per-voxel count of foreign
/// face neighbours, and each grain's sorted neighbour list with shared face areas. Returns the
/// same-phase grain boundary area of each phase. A boundary between two non-surface grains is
/// counted once; one with a surface grain is counted from the non-surface side only.
pub fn find_neighbors(grid: &mut VoxelGrid, arena: &mut GrainArena) -> BTreeMap<PhaseId, f64> {
    let geometry = grid.geometry;
    let mut areas: Vec<BTreeMap<GrainId, f64>> = vec![BTreeMap::new(); arena.len() + 1];
    let mut surface = vec![false; arena.len() + 1];

    for i in 0..grid.len() {
        let Some(owner) = grid.owner(i) else {
            grid.surface[i] = 0;
            continue;
        };
        if geometry.is_boundary_cell(i) {
            surface[owner] = true;
        }
        let mut foreign = 0u8;
        for (n, axis) in geometry.face_neighbors_with_axis(i) {
            match grid.owner(n) {
                Some(other) if other != owner => {
                    foreign += 1;
                    *areas[owner].entry(other).or_insert(0.0) += geometry.face_area(axis);
                }
                _ => {}
            }
        }
        grid.surface[i] = foreign;
    }

    for (id, grain) in arena.iter_mut() {
        grain.surface = surface[id];
        grain.neighbors = areas[id].keys().copied().collect();
        grain.shared_areas = areas[id].values().copied().collect();
        grain.misorientations.clear();
    }

    let mut totals = BTreeMap::new();
    for (id, grain) in arena.iter() {
        if grain.surface {
            continue;
        }
        for (&other, &area) in grain.neighbors.iter().zip(&grain.shared_areas) {
            let same_phase = arena.get(other).map_or(false, |g| g.phase == grain.phase);
            if same_phase && (other > id || surface[other]) {
                *totals.entry(grain.phase).or_insert(0.0) += area;
            }
        }
    }
    totals
}

/// Inserts precipitate grains into the primary structure until the precipitate phases hold
/// their share of the sample volume.
///
/// Each precipitate is seeded on a grain boundary voxel with its phase's boundary fraction as
/// probability, inside a grain otherwise, and kept only when most of it lands on primary
/// grains. Voxels already held by another precipitate become unassigned and are gap-filled
/// afterwards. Seeding reads the voxel surface flags, so [`find_neighbors`] must have run before
/// and has to run again after. Returns the number of precipitates placed.
pub fn place_precipitates<R: Rng + ?Sized>(
    grid: &mut VoxelGrid,
    arena: &mut GrainArena,
    stats: &StatsInput,
    shape_class: ShapeClass,
    target_volume: f64,
    rng: &mut R,
) -> usize {
    if target_volume <= 0.0 || grid.is_empty() {
        return 0;
    }
    let voxel_volume: f64 = grid.geometry.resolution.iter().product();
    let primary_count = arena.len();
    let is_primary = |owner: i32| owner > 0 && (owner as usize) <= primary_count;

    let mut placed = 0;
    let mut volume = 0.0;
    let mut attempts = 0;
    while volume < target_volume && attempts < MAX_REJECTION_DRAWS {
        attempts += 1;
        let Some(phase) = pick_phase(stats, PhaseType::Precipitate, rng) else {
            break;
        };
        let Some(phase_stats) = stats.phase(phase) else {
            break;
        };
        let mut grain = generate_grain(phase, phase_stats, shape_class, rng);

        let on_boundary = rng.gen::<f64>() <= phase_stats.boundary_fraction;
        let start = rng.gen_range(0..grid.len());
        // falls back to any primary voxel when no voxel of the wanted kind exists
        let scan = |wanted: Option<bool>| {
            (0..grid.len()).map(|k| (start + k) % grid.len()).find(|&i| {
                is_primary(grid.grain_ids[i]) && wanted.map_or(true, |b| (grid.surface[i] > 0) == b)
            })
        };
        let Some(seed) = scan(Some(on_boundary)).or_else(|| scan(None)) else {
            break;
        };

        let centroid = grid.geometry.cell_center(grid.geometry.cell_of_index(seed));
        grain.centroid = centroid;
        let cells = grid.geometry.rasterize(&grain.shape(), &centroid);
        let on_primary = cells.iter().filter(|&&c| is_primary(grid.grain_ids[c])).count();
        if cells.is_empty() || (on_primary as f64) / (cells.len() as f64) <= PRECIPITATE_ACCEPTANCE_FRACTION {
            continue;
        }

        grain.active = true;
        let id = arena.push(grain);
        let mut claimed = 0;
        for &c in &cells {
            if is_primary(grid.grain_ids[c]) {
                grid.claim(c, id, phase);
                claimed += 1;
            } else {
                grid.release(c);
            }
        }
        volume += claimed as f64 * voxel_volume;
        placed += 1;
    }
    info!(
        "placed {} precipitates holding {:.3} of {:.3} volume in {} attempts",
        placed, volume, target_volume, attempts
    );

    for (_, grain) in arena.iter_mut() {
        grain.num_voxels = 0;
    }
    for owner in grid.grain_ids.iter().filter(|&&g| g > 0) {
        if let Some(g) = arena.get_mut(*owner as usize) {
            g.num_voxels += 1;
        }
    }
    drop_empty_grains(grid, arena);
    fill_gaps(grid, arena);
    placed
}
