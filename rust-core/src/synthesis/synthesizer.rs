use std::collections::BTreeMap;

use log::info;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::grain::{Grain, GrainArena};
use super::matching::{
    assign_orientations, match_crystallography, measure_misorientations, MatchingReport,
    PhaseTexture,
};
use super::packing::{PackingOptimizer, PackingReport, SizeTargets};
use super::population::{generate_primary_population, precipitate_target_volume};
use super::raster::GridGeometry;
use super::voxels::{
    adjust_boundaries, assign_voxels, cleanup_features, drop_empty_grains, fill_gaps,
    find_neighbors, place_precipitates, VoxelGrid,
};
use crate::config::SynthesisConfig;
use crate::error::SynthesisError;
use crate::interfaces::{GrainId, PhaseId};
use crate::orientation::{EulerAngles, Quat};
use crate::shapes::ShapeClass;
use crate::stats::StatsInput;

/// Exported record of one grain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GrainRecord {
    pub id: GrainId,
    pub phase: PhaseId,
    pub euler: EulerAngles,
    pub quat: Quat,
    pub radii: [f64; 3],
    pub shape_class: ShapeClass,
    pub shape_param: f64,
    pub axis_euler: EulerAngles,
    pub volume: f64,
    pub equivalent_diameter: f64,
    pub num_voxels: usize,
    pub surface: bool,
    pub neighbors: Vec<GrainId>,
    pub shared_areas: Vec<f64>,
}

impl GrainRecord {
    pub fn new(id: GrainId, grain: &Grain) -> Self {
        Self {
            id,
            phase: grain.phase,
            euler: grain.orientation.euler,
            quat: grain.orientation.quat,
            radii: grain.radii,
            shape_class: grain.shape_class,
            shape_param: grain.shape_param,
            axis_euler: grain.axis_euler,
            volume: grain.volume,
            equivalent_diameter: grain.equivalent_diameter,
            num_voxels: grain.num_voxels,
            surface: grain.surface,
            neighbors: grain.neighbors.clone(),
            shared_areas: grain.shared_areas.clone(),
        }
    }
}

/// Everything one synthesis run produces
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SynthesisResult {
    pub config: SynthesisConfig,
    pub grains: Vec<GrainRecord>,
    pub voxels: VoxelGrid,
    pub packing: PackingReport,
    pub precipitates_placed: usize,
    pub matching: Vec<MatchingReport>,
}

/// Voxel structure with its adjacency, ready for texture matching
pub struct Microstructure {
    pub arena: GrainArena,
    pub voxels: VoxelGrid,
    pub surface_areas: BTreeMap<PhaseId, f64>,
}

/// Runs the synthesis pipeline with one owned, seeded generator.
///
/// Stages run in order: primary population, packing, voxel assignment with gap filling,
/// boundary adjustment and fragment cleanup, precipitate insertion, orientation assignment and
/// crystallography matching. Each stage is
/// public so callers can stop early or inspect intermediate state.
pub struct Synthesizer {
    config: SynthesisConfig,
    stats: StatsInput,
    rng: ChaCha8Rng,
}

impl Synthesizer {
    pub fn new(config: SynthesisConfig, stats: StatsInput) -> Result<Self, SynthesisError> {
        config.validate()?;
        stats.validate()?;
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Ok(Self { config, stats, rng })
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    pub fn stats(&self) -> &StatsInput {
        &self.stats
    }

    /// Primary grains filling the sample volume, not yet placed
    pub fn generate_primary(&mut self) -> GrainArena {
        let grains = generate_primary_population(
            &self.stats,
            self.config.total_volume(),
            self.config.shape_class,
            &mut self.rng,
        );
        GrainArena::from_grains(grains)
    }

    pub fn pack(&mut self, arena: &mut GrainArena) -> PackingReport {
        let mut optimizer = PackingOptimizer::new(&self.stats, &self.config);
        optimizer.place_initial(arena, &mut self.rng);
        optimizer.optimize(arena, &mut self.rng)
    }

    /// Voxelizes the packed grains, fills the gaps, fits grain sizes by boundary adjustment,
    /// releases disconnected grain pieces and inserts precipitates
    pub fn voxelize(&mut self, mut arena: GrainArena) -> (Microstructure, usize) {
        let geometry = GridGeometry::new(
            self.config.dimensions,
            self.config.resolution,
            self.config.boundary,
        );
        let mut voxels = assign_voxels(&mut arena, geometry);
        drop_empty_grains(&mut voxels, &mut arena);
        fill_gaps(&mut voxels, &mut arena);
        adjust_boundaries(
            &mut voxels,
            &mut arena,
            &SizeTargets::new(&self.stats),
            self.config.boundary_iterations,
            &mut self.rng,
        );
        cleanup_features(&mut voxels, &mut arena, &self.stats);
        let mut surface_areas = find_neighbors(&mut voxels, &mut arena);

        let target = precipitate_target_volume(&self.stats, self.config.total_volume());
        let mut placed = 0;
        if target > 0.0 {
            placed = place_precipitates(
                &mut voxels,
                &mut arena,
                &self.stats,
                self.config.shape_class,
                target,
                &mut self.rng,
            );
            surface_areas = find_neighbors(&mut voxels, &mut arena);
        }
        (
            Microstructure {
                arena,
                voxels,
                surface_areas,
            },
            placed,
        )
    }

    /// Assigns orientations and matches the ODF and MDF of every phase
    pub fn match_textures(
        &mut self,
        structure: &mut Microstructure,
    ) -> (BTreeMap<PhaseId, PhaseTexture>, Vec<MatchingReport>) {
        let arena = &mut structure.arena;
        let mut textures = assign_orientations(
            arena,
            &self.stats,
            self.config.voxel_volume(),
            &mut self.rng,
        );
        measure_misorientations(arena, &mut textures, &structure.surface_areas);
        let reports = match_crystallography(
            arena,
            &self.stats,
            &mut textures,
            &self.config,
            &mut self.rng,
        );
        (textures, reports)
    }

    pub fn run(&mut self) -> SynthesisResult {
        info!(
            "synthesizing {:?} voxels at {:?} with {} phases",
            self.config.dimensions,
            self.config.resolution,
            self.stats.phases.len()
        );
        let mut arena = self.generate_primary();
        let packing = self.pack(&mut arena);
        let (mut structure, precipitates_placed) = self.voxelize(arena);
        let (_, matching) = self.match_textures(&mut structure);

        let grains = structure
            .arena
            .iter()
            .map(|(id, g)| GrainRecord::new(id, g))
            .collect::<Vec<_>>();
        info!("synthesis finished with {} grains", grains.len());
        SynthesisResult {
            config: self.config.clone(),
            grains,
            voxels: structure.voxels,
            packing,
            precipitates_placed,
            matching,
        }
    }
}
