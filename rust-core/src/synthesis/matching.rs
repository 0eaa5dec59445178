use std::collections::BTreeMap;

use log::{debug, info};
use nalgebra::Vector3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::grain::GrainArena;
use crate::config::{SynthesisConfig, MISORIENTATION_SENTINEL};
use crate::interfaces::{GrainId, PhaseId};
use crate::orientation::Orientation;
use crate::stats::{cumulative_pick, StatsInput};
use crate::symmetries::{misorientation, miso_bin_from_rodrigues, sample_orientation_in_bin, CrystalClass};

/// Simulated texture of one phase, kept in step with the grain orientations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseTexture {
    pub phase: PhaseId,
    pub class: CrystalClass,
    /// Volume-weighted ODF of the non-surface grains
    pub sim_odf: Vec<f64>,
    /// Area-weighted MDF of the counted same-phase boundaries
    pub sim_mdf: Vec<f64>,
    /// Volume of the non-surface grains
    pub unbiased_volume: f64,
    pub total_surface_area: f64,
}

impl PhaseTexture {
    pub fn new(phase: PhaseId, class: CrystalClass) -> Self {
        let bins = class.odf_bin_count();
        Self {
            phase,
            class,
            sim_odf: vec![0.0; bins],
            sim_mdf: vec![0.0; bins],
            unbiased_volume: 0.0,
            total_surface_area: 0.0,
        }
    }

    pub fn odf_error(&self, target: &[f64]) -> f64 {
        squared_error(target, &self.sim_odf)
    }

    pub fn mdf_error(&self, target: &[f64]) -> f64 {
        squared_error(target, &self.sim_mdf)
    }
}

fn squared_error(target: &[f64], simulated: &[f64]) -> f64 {
    target
        .iter()
        .zip(simulated)
        .map(|(t, s)| (t - s) * (t - s))
        .sum()
}

/// Outcome of the matching run of one phase
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchingReport {
    pub phase: PhaseId,
    pub iterations: usize,
    pub accepted: usize,
    pub final_odf_error: f64,
    pub final_mdf_error: f64,
}

/// Draws every grain's orientation from its phase ODF and builds the simulated ODFs.
///
/// Only non-surface grains are counted, weighted by their voxel volume; each simulated ODF is
/// normalised by that unbiased volume.
pub fn assign_orientations<R: Rng + ?Sized>(
    arena: &mut GrainArena,
    stats: &StatsInput,
    voxel_volume: f64,
    rng: &mut R,
) -> BTreeMap<PhaseId, PhaseTexture> {
    let mut textures: BTreeMap<PhaseId, PhaseTexture> = stats
        .phases
        .iter()
        .enumerate()
        .map(|(i, p)| (i + 1, PhaseTexture::new(i + 1, p.crystal_class)))
        .collect();

    for (_, grain) in arena.iter_mut() {
        let (Some(phase), Some(texture)) = (stats.phase(grain.phase), textures.get_mut(&grain.phase)) else {
            continue;
        };
        let bin = cumulative_pick(&phase.odf, rng.gen()).unwrap_or(0);
        grain.orientation = sample_orientation_in_bin(phase.crystal_class, bin, rng);
        grain.odf_bin = bin;
        if !grain.surface {
            let volume = grain.num_voxels as f64 * voxel_volume;
            texture.sim_odf[bin] += volume;
            texture.unbiased_volume += volume;
        }
    }

    for texture in textures.values_mut() {
        if texture.unbiased_volume > 0.0 {
            let v = texture.unbiased_volume;
            texture.sim_odf.iter_mut().for_each(|x| *x /= v);
        }
    }
    textures
}

// Is the boundary between `owner` and `other` accumulated into the MDF from the owner's side?
fn counted_from(arena: &GrainArena, owner: GrainId, other: GrainId) -> bool {
    match (arena.get(owner), arena.get(other)) {
        (Some(a), Some(b)) => !a.surface && (other > owner || b.surface),
        _ => false,
    }
}

/// Stores the Rodrigues disorientation to every neighbour and builds the simulated MDFs.
///
/// Boundaries between different phases carry the sentinel vector and are never binned. Each
/// counted boundary adds its share of the phase's `surface_areas` entry.
pub fn measure_misorientations(
    arena: &mut GrainArena,
    textures: &mut BTreeMap<PhaseId, PhaseTexture>,
    surface_areas: &BTreeMap<PhaseId, f64>,
) {
    for texture in textures.values_mut() {
        texture.total_surface_area = surface_areas.get(&texture.phase).copied().unwrap_or(0.0);
        texture.sim_mdf.iter_mut().for_each(|x| *x = 0.0);
    }

    let sentinel = Vector3::repeat(MISORIENTATION_SENTINEL);
    let mut lists = Vec::with_capacity(arena.len());
    for (id, grain) in arena.iter() {
        let mut list = Vec::with_capacity(grain.neighbors.len());
        for (&other, &area) in grain.neighbors.iter().zip(&grain.shared_areas) {
            let neighbor = match arena.get(other) {
                Some(n) if n.phase == grain.phase => n,
                _ => {
                    list.push(sentinel);
                    continue;
                }
            };
            let Some(texture) = textures.get_mut(&grain.phase) else {
                list.push(sentinel);
                continue;
            };
            let rod = misorientation(texture.class, &grain.orientation.quat, &neighbor.orientation.quat)
                .to_rodrigues();
            if counted_from(arena, id, other) && texture.total_surface_area > 0.0 {
                let bin = miso_bin_from_rodrigues(texture.class, &rod);
                texture.sim_mdf[bin] += area / texture.total_surface_area;
            }
            list.push(rod);
        }
        lists.push(list);
    }
    for ((_, grain), list) in arena.iter_mut().zip(lists) {
        grain.misorientations = list;
    }
}

// One boundary whose misorientation changes with a move
struct BoundaryChange {
    grain: GrainId,
    slot: usize,
    rod: Vector3<f64>,
}

// Trial state of one move: bin deltas and the misorientation entries to rewrite
#[derive(Default)]
struct MoveDelta {
    odf: Vec<(usize, f64)>,
    mdf: Vec<(usize, f64)>,
    boundaries: Vec<BoundaryChange>,
}

impl MoveDelta {
    // MDF and misorientation changes when `id` takes orientation `new`. A `partner` moving in
    // the same step is seen with its new orientation; boundaries with `skip` are left alone.
    fn reorient(
        &mut self,
        arena: &GrainArena,
        texture: &PhaseTexture,
        id: GrainId,
        new: &Orientation,
        partner: Option<(GrainId, &Orientation)>,
        skip: Option<GrainId>,
    ) {
        let Some(grain) = arena.get(id) else {
            return;
        };
        for (slot, (&other, &area)) in grain.neighbors.iter().zip(&grain.shared_areas).enumerate() {
            if Some(other) == skip {
                continue;
            }
            let Some(neighbor) = arena.get(other).filter(|n| n.phase == grain.phase) else {
                continue;
            };
            let other_quat = match partner {
                Some((p, o)) if p == other => o.quat,
                _ => neighbor.orientation.quat,
            };
            let forward = misorientation(texture.class, &new.quat, &other_quat).to_rodrigues();
            let backward = misorientation(texture.class, &other_quat, &new.quat).to_rodrigues();
            let reverse_slot = neighbor.neighbor_slot(id);

            if texture.total_surface_area > 0.0 {
                let share = area / texture.total_surface_area;
                let counted = if counted_from(arena, id, other) {
                    grain.misorientations.get(slot).map(|old| (*old, forward))
                } else if counted_from(arena, other, id) {
                    reverse_slot
                        .and_then(|s| neighbor.misorientations.get(s))
                        .map(|old| (*old, backward))
                } else {
                    None
                };
                if let Some((old, new_rod)) = counted {
                    self.mdf.push((miso_bin_from_rodrigues(texture.class, &old), -share));
                    self.mdf.push((miso_bin_from_rodrigues(texture.class, &new_rod), share));
                }
            }

            self.boundaries.push(BoundaryChange {
                grain: id,
                slot,
                rod: forward,
            });
            if let Some(s) = reverse_slot {
                self.boundaries.push(BoundaryChange {
                    grain: other,
                    slot: s,
                    rod: backward,
                });
            }
        }
    }
}

// Sum over touched bins of (t - s)^2 - (t - s - delta)^2; positive when the move helps
fn squared_error_gain(target: &[f64], simulated: &[f64], deltas: &[(usize, f64)]) -> f64 {
    let mut merged: Vec<(usize, f64)> = Vec::with_capacity(deltas.len());
    for &(bin, d) in deltas {
        match merged.iter_mut().find(|(b, _)| *b == bin) {
            Some(entry) => entry.1 += d,
            None => merged.push((bin, d)),
        }
    }
    merged
        .iter()
        .map(|&(bin, d)| {
            let diff = target[bin] - simulated[bin];
            diff * diff - (diff - d) * (diff - d)
        })
        .sum()
}

fn relative(gain: f64, current: f64) -> f64 {
    if current > 0.0 {
        gain / current
    } else {
        0.0
    }
}

/// Swaps and re-draws orientations of non-surface grains until each phase's simulated ODF and
/// MDF stop improving or the iteration budget runs out.
pub fn match_crystallography<R: Rng + ?Sized>(
    arena: &mut GrainArena,
    stats: &StatsInput,
    textures: &mut BTreeMap<PhaseId, PhaseTexture>,
    config: &SynthesisConfig,
    rng: &mut R,
) -> Vec<MatchingReport> {
    let voxel_volume = config.voxel_volume();
    let mut reports = Vec::new();
    for (&phase, texture) in textures.iter_mut() {
        let Some(phase_stats) = stats.phase(phase) else {
            continue;
        };
        let candidates: Vec<GrainId> = arena
            .iter()
            .filter(|(_, g)| g.phase == phase && !g.surface)
            .map(|(id, _)| id)
            .collect();
        if candidates.is_empty() || texture.unbiased_volume <= 0.0 {
            debug!("phase {} has no interior grains to match", phase);
            continue;
        }
        let (target_odf, target_mdf) = (&phase_stats.odf, &phase_stats.mdf);
        let mut odf_error = texture.odf_error(target_odf);
        let mut mdf_error = texture.mdf_error(target_mdf);
        // ODF share of each grain; voxel counts do not change while matching
        let shares: Vec<f64> = std::iter::once(0.0)
            .chain(
                arena
                    .iter()
                    .map(|(_, g)| g.num_voxels as f64 * voxel_volume / texture.unbiased_volume),
            )
            .collect();
        let weight = |id: GrainId| shares.get(id).copied().unwrap_or(0.0);

        let mut report = MatchingReport {
            phase,
            iterations: 0,
            accepted: 0,
            final_odf_error: odf_error,
            final_mdf_error: mdf_error,
        };
        let mut bad_tries = 0;
        while report.iterations < config.matching_iterations && bad_tries < config.matching_bad_tries {
            report.iterations += 1;
            bad_tries += 1;

            let mut delta = MoveDelta::default();
            let mut reassigned: Vec<(GrainId, Orientation, usize)> = Vec::with_capacity(2);
            if rng.gen::<f64>() < 0.5 {
                let g = candidates[rng.gen_range(0..candidates.len())];
                let Some(old_bin) = arena.get(g).map(|x| x.odf_bin) else {
                    continue;
                };
                let bin = cumulative_pick(target_odf, rng.gen()).unwrap_or(0);
                let orientation = sample_orientation_in_bin(texture.class, bin, rng);
                let w = weight(g);
                delta.odf.push((old_bin, -w));
                delta.odf.push((bin, w));
                delta.reorient(arena, texture, g, &orientation, None, None);
                reassigned.push((g, orientation, bin));
            } else {
                if candidates.len() < 2 {
                    continue;
                }
                let g1 = candidates[rng.gen_range(0..candidates.len())];
                let g2 = candidates[rng.gen_range(0..candidates.len())];
                if g1 == g2 {
                    continue;
                }
                let (Some(a), Some(b)) = (arena.get(g1), arena.get(g2)) else {
                    continue;
                };
                let (o1, bin1, o2, bin2) = (a.orientation, a.odf_bin, b.orientation, b.odf_bin);
                let (w1, w2) = (weight(g1), weight(g2));
                delta.odf.push((bin1, w2 - w1));
                delta.odf.push((bin2, w1 - w2));
                // the g1-g2 boundary is handled once, from g1's side
                delta.reorient(arena, texture, g1, &o2, Some((g2, &o1)), None);
                delta.reorient(arena, texture, g2, &o1, None, Some(g1));
                reassigned.push((g1, o2, bin2));
                reassigned.push((g2, o1, bin1));
            }

            let odf_gain = squared_error_gain(target_odf, &texture.sim_odf, &delta.odf);
            let mdf_gain = squared_error_gain(target_mdf, &texture.sim_mdf, &delta.mdf);
            if relative(odf_gain, odf_error) + relative(mdf_gain, mdf_error) > 0.0 {
                for &(bin, d) in &delta.odf {
                    texture.sim_odf[bin] += d;
                }
                for &(bin, d) in &delta.mdf {
                    texture.sim_mdf[bin] += d;
                }
                odf_error -= odf_gain;
                mdf_error -= mdf_gain;
                for (id, orientation, bin) in reassigned {
                    if let Some(g) = arena.get_mut(id) {
                        g.orientation = orientation;
                        g.odf_bin = bin;
                    }
                }
                for change in delta.boundaries {
                    if let Some(entry) = arena
                        .get_mut(change.grain)
                        .and_then(|g| g.misorientations.get_mut(change.slot))
                    {
                        *entry = change.rod;
                    }
                }
                report.accepted += 1;
                bad_tries = 0;
            }

            if report.iterations % 10_000 == 0 {
                debug!(
                    "matching phase {} iteration {}: odf {:.6}, mdf {:.6}",
                    phase, report.iterations, odf_error, mdf_error
                );
            }
        }

        report.final_odf_error = texture.odf_error(target_odf);
        report.final_mdf_error = texture.mdf_error(target_mdf);
        info!(
            "matched phase {} in {} iterations ({} accepted): odf {:.6}, mdf {:.6}",
            phase, report.iterations, report.accepted, report.final_odf_error, report.final_mdf_error
        );
        reports.push(report);
    }
    reports
}
