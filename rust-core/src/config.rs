// Constants

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::SynthesisError;
use crate::interfaces::Boundary;
use crate::shapes::ShapeClass;

// Tolerances
pub const PROBABILITY_SUM_TOLERANCE: f64 = 1e-3; // Allowed drift of ODF/MDF/axis-ODF sums from 1
pub const SMALL_ERROR_THRESHOLD: f64 = 0.01; // Candidate errors below this contribute no relative change

// Orientation binning
pub const ROD_SENTINEL_SCALE: f64 = 1e10; // Stand-in magnitude for 180 degree operators in Rodrigues space
pub const MISORIENTATION_SENTINEL: f64 = -100.0; // Marks a boundary between grains of different phases
pub const HOMOCHORIC_NEWTON_ITERATIONS: usize = 20;

// Statistics tables
pub const SIZE_HISTOGRAM_BINS: usize = 40;
pub const NEIGHBOR_SHELLS: usize = 3;
pub const AXIS_ODF_BINS_PER_ANGLE: usize = 36;
pub const AXIS_ODF_BIN_COUNT: usize = 46_656; // 36^3
pub const AXIS_ODF_BIN_WIDTH_DEG: f64 = 5.0;
pub const MICROTEXTURE_BINS: usize = 10;

// Optimizer budgets
pub const PACKING_RESOLUTION_FACTOR: f64 = 4.0; // Packing grid is this much coarser than the voxel grid
pub const DEFAULT_PACKING_ITERATIONS: usize = 25_000;
pub const DEFAULT_PLACEMENT_TRIALS: usize = 10;
pub const DEFAULT_BOUNDARY_ITERATIONS: usize = 10_000;
pub const MATCHING_MAX_ITERATIONS: usize = 100_000;
pub const MATCHING_MAX_BAD_TRIES: usize = 5_000;
pub const PRECIPITATE_ACCEPTANCE_FRACTION: f64 = 0.75; // Share of a precipitate that must land on primary grains
pub const MAX_REJECTION_DRAWS: usize = 10_000;

/// Weights of the three packing error terms in the move acceptance rule
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PackingWeights {
    pub filling: f64,
    pub size: f64,
    pub neighborhood: f64,
}

impl Default for PackingWeights {
    fn default() -> Self {
        Self {
            filling: 1.0,
            size: 1.0,
            neighborhood: 1.0,
        }
    }
}

/// Run configuration for one synthesis
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SynthesisConfig {
    /// Voxel counts along x, y, z
    pub dimensions: [usize; 3],
    /// Voxel edge lengths along x, y, z
    pub resolution: [f64; 3],
    #[serde(default)]
    pub boundary: Boundary,
    pub shape_class: ShapeClass,
    #[serde(default)]
    pub weights: PackingWeights,
    #[serde(default = "default_packing_iterations")]
    pub packing_iterations: usize,
    #[serde(default = "default_placement_trials")]
    pub placement_trials: usize,
    /// Grow/shrink steps fitting voxelized grain sizes to their targets; 0 skips the stage
    #[serde(default = "default_boundary_iterations")]
    pub boundary_iterations: usize,
    #[serde(default = "default_matching_iterations")]
    pub matching_iterations: usize,
    #[serde(default = "default_matching_bad_tries")]
    pub matching_bad_tries: usize,
    #[serde(default)]
    pub seed: u64,
}

fn default_packing_iterations() -> usize {
    DEFAULT_PACKING_ITERATIONS
}

fn default_placement_trials() -> usize {
    DEFAULT_PLACEMENT_TRIALS
}

fn default_boundary_iterations() -> usize {
    DEFAULT_BOUNDARY_ITERATIONS
}

fn default_matching_iterations() -> usize {
    MATCHING_MAX_ITERATIONS
}

fn default_matching_bad_tries() -> usize {
    MATCHING_MAX_BAD_TRIES
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self::new([50, 50, 50], [0.1, 0.1, 0.1], ShapeClass::Ellipsoid)
    }
}

impl SynthesisConfig {
    pub fn new(dimensions: [usize; 3], resolution: [f64; 3], shape_class: ShapeClass) -> Self {
        Self {
            dimensions,
            resolution,
            boundary: Boundary::Bounded,
            shape_class,
            weights: PackingWeights::default(),
            packing_iterations: DEFAULT_PACKING_ITERATIONS,
            placement_trials: DEFAULT_PLACEMENT_TRIALS,
            boundary_iterations: DEFAULT_BOUNDARY_ITERATIONS,
            matching_iterations: MATCHING_MAX_ITERATIONS,
            matching_bad_tries: MATCHING_MAX_BAD_TRIES,
            seed: 0,
        }
    }

    /// Reads a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing configuration {}", path.display()))
    }

    /// Physical edge lengths of the sample box
    pub fn sample_size(&self) -> [f64; 3] {
        [
            self.dimensions[0] as f64 * self.resolution[0],
            self.dimensions[1] as f64 * self.resolution[1],
            self.dimensions[2] as f64 * self.resolution[2],
        ]
    }

    pub fn total_volume(&self) -> f64 {
        let size = self.sample_size();
        size[0] * size[1] * size[2]
    }

    pub fn voxel_volume(&self) -> f64 {
        self.resolution[0] * self.resolution[1] * self.resolution[2]
    }

    /// Checks geometry and packing weights. The packing grid needs no check of its own: with
    /// positive dimensions and resolution, [`GridGeometry::covering`] keeps at least one cell
    /// per axis.
    ///
    /// [`GridGeometry::covering`]: crate::synthesis::GridGeometry::covering
    pub fn validate(&self) -> Result<(), SynthesisError> {
        if self.dimensions.iter().any(|&n| n == 0) {
            return Err(SynthesisError::InvalidGeometry {
                field: "dimensions",
                reason: format!("every axis needs at least one voxel, got {:?}", self.dimensions),
            });
        }
        if self.resolution.iter().any(|&r| !(r.is_finite() && r > 0.0)) {
            return Err(SynthesisError::InvalidGeometry {
                field: "resolution",
                reason: format!("voxel edges must be positive, got {:?}", self.resolution),
            });
        }
        let w = self.weights;
        if [w.filling, w.size, w.neighborhood]
            .iter()
            .any(|&x| !(x.is_finite() && x >= 0.0))
        {
            return Err(SynthesisError::InvalidGeometry {
                field: "weights",
                reason: "packing weights must be non-negative".to_string(),
            });
        }
        if w.filling + w.size + w.neighborhood <= 0.0 {
            return Err(SynthesisError::InvalidGeometry {
                field: "weights",
                reason: "at least one packing weight must be positive".to_string(),
            });
        }
        Ok(())
    }
}
