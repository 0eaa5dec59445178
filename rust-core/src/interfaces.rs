// Definitions that are used throughout all modules

use serde::{Deserialize, Serialize};

/// Grain handle. Ids start at 1; 0 marks an unassigned voxel and negative values a conflict.
pub type GrainId = usize;

/// Phase handle. Ids start at 1; 0 means "no phase".
pub type PhaseId = usize;

// Role of a phase during synthesis
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PhaseType {
    /// Space-filling grains placed by the packing optimizer
    Primary,
    /// Second-phase particles dropped into the packed structure
    Precipitate,
    /// Continuous phase carried for bookkeeping only
    Matrix,
}

// Boundary handling of the packing and voxel grids
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Boundary {
    #[default]
    Bounded,
    Periodic,
}

impl Boundary {
    pub fn is_periodic(self) -> bool {
        matches!(self, Boundary::Periodic)
    }
}
