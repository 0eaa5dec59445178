//! Synthesis module: builds a voxelized polycrystal from target statistics.
//!
//! Quick reference
//! - Grains: [`Grain`], [`GrainArena`] (stable 1-based ids, id 0 means unassigned)
//! - Population: [`generate_grain`], [`generate_primary_population`], [`generate_precipitate_population`]
//! - Packing: [`PackingGrid`], [`PackingOptimizer`] with `place_initial` and `optimize`
//! - Voxels: [`assign_voxels`], [`fill_gaps`], [`adjust_boundaries`], [`cleanup_features`],
//!   [`find_neighbors`], [`place_precipitates`]
//! - Texture: [`assign_orientations`], [`measure_misorientations`], [`match_crystallography`]
//! - Pipeline: [`Synthesizer::run`] returning a [`SynthesisResult`]

// ======================== MODULE DECLARATIONS ========================
pub mod grain;
pub mod matching;
pub mod packing;
pub mod population;
pub mod raster;
pub mod synthesizer;
pub mod voxels;

#[cfg(test)]
mod _tests_packing;
#[cfg(test)]
mod _tests_synthesizer;
#[cfg(test)]
mod _tests_voxels;

// ======================== GRAINS & GRIDS ========================
pub use grain::{
    Grain,      // struct - one grain record with shape, placement, topology and texture
    GrainArena, // struct - 1-based grain storage with compaction
};
pub use raster::GridGeometry; // struct - regular cell grid with rasterization of grain shapes

// ======================== POPULATION ========================
pub use population::{
    generate_grain,                  // fn(phase, &PhaseStats, ShapeClass, rng) -> Grain
    generate_precipitate_population, // fn(stats, total_volume, ShapeClass, rng) -> Vec<Grain>
    generate_primary_population,     // fn(stats, total_volume, ShapeClass, rng) -> Vec<Grain>
    pick_phase,                      // fn(stats, PhaseType, rng) -> Option<PhaseId>
    precipitate_target_volume,       // fn(stats, total_volume) -> f64
};

// ======================== PACKING ========================
pub use packing::{
    PackingErrors,              // struct - filling, size and neighbourhood errors
    PackingGrid,                // struct - coarse occupancy grid with incremental filling error
    PackingMove,                // enum - add, remove, swap, replace and move steps
    PackingOptimizer,           // struct - initial placement and the move loop
    PackingReport,              // struct - iterations, accepted moves, final errors
    SizeTargets,                // struct - target size histograms and their error
    update_neighbor_histograms, // fn(arena, id, sign) - shell counts of one grain and its neighbours
};

// ======================== VOXELS & TOPOLOGY ========================
pub use voxels::{
    VoxelGrid,           // struct - grain id, phase and surface count per voxel
    adjust_boundaries,   // fn(grid, arena, SizeTargets, iterations, rng) -> usize
    assign_voxels,       // fn(arena, GridGeometry) -> VoxelGrid
    cleanup_features,    // fn(grid, arena, stats) -> usize - released pieces
    drop_empty_grains,   // fn(grid, arena) -> usize - compaction with id remapping
    equivalent_diameter, // fn(volume) -> f64
    fill_gaps,           // fn(grid, arena) -> usize - majority-vote sweeps
    find_neighbors,      // fn(grid, arena) -> per-phase boundary area
    place_precipitates,  // fn(grid, arena, stats, ShapeClass, target, rng) -> usize
};

// ======================== CRYSTALLOGRAPHY ========================
pub use matching::{
    MatchingReport,          // struct - iterations, accepted moves, final ODF/MDF errors
    PhaseTexture,            // struct - simulated ODF/MDF of one phase
    assign_orientations,     // fn(arena, stats, voxel_volume, rng) -> textures
    match_crystallography,   // fn(arena, stats, textures, config, rng) -> Vec<MatchingReport>
    measure_misorientations, // fn(arena, textures, surface_areas)
};

// ======================== PIPELINE ========================
pub use synthesizer::{
    GrainRecord,     // struct - exported per-grain record
    Microstructure,  // struct - voxelized grains with adjacency
    SynthesisResult, // struct - full run output
    Synthesizer,     // struct - owns config, statistics and the seeded generator
};
