use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_2, FRAC_PI_4, FRAC_PI_6};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::config::ROD_SENTINEL_SCALE;
use crate::orientation::Quat;

const R: f64 = FRAC_1_SQRT_2;
const S3: f64 = 0.866_025_403_784_438_6; // sqrt(3) / 2

// Rotation operators stored as (x, y, z, w)

/// Proper rotations of the cubic point group 432
pub const CUBIC_OPERATORS: [[f64; 4]; 24] = [
    [0.0, 0.0, 0.0, 1.0],
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [R, 0.0, 0.0, R],
    [0.0, R, 0.0, R],
    [0.0, 0.0, R, R],
    [-R, 0.0, 0.0, R],
    [0.0, -R, 0.0, R],
    [0.0, 0.0, -R, R],
    [R, R, 0.0, 0.0],
    [-R, R, 0.0, 0.0],
    [0.0, R, R, 0.0],
    [0.0, -R, R, 0.0],
    [R, 0.0, R, 0.0],
    [-R, 0.0, R, 0.0],
    [0.5, 0.5, 0.5, 0.5],
    [-0.5, -0.5, -0.5, 0.5],
    [0.5, -0.5, 0.5, 0.5],
    [-0.5, 0.5, -0.5, 0.5],
    [-0.5, 0.5, 0.5, 0.5],
    [0.5, -0.5, -0.5, 0.5],
    [-0.5, -0.5, 0.5, 0.5],
    [0.5, 0.5, -0.5, 0.5],
];

/// Proper rotations of the hexagonal point group 622
pub const HEXAGONAL_OPERATORS: [[f64; 4]; 12] = [
    [0.0, 0.0, 0.0, 1.0],
    [0.0, 0.0, 0.5, S3],
    [0.0, 0.0, S3, 0.5],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, S3, -0.5],
    [0.0, 0.0, 0.5, -S3],
    [1.0, 0.0, 0.0, 0.0],
    [S3, 0.5, 0.0, 0.0],
    [0.5, S3, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [-0.5, S3, 0.0, 0.0],
    [-S3, 0.5, 0.0, 0.0],
];

/// Proper rotations of the orthorhombic point group 222
pub const ORTHORHOMBIC_OPERATORS: [[f64; 4]; 4] = [
    [0.0, 0.0, 0.0, 1.0],
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
];

/// Crystal classes supported by the symmetry engine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CrystalClass {
    Cubic,
    Hexagonal,
    Orthorhombic,
}

/// Homochoric cube that encloses a class's fundamental zone, with its ODF/MDF binning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FzGeometry {
    /// Half-edge of the cube per axis; homochoric coordinates span [-extent, extent]
    pub extents: [f64; 3],
    pub steps: [f64; 3],
    pub bins: [usize; 3],
}

impl FzGeometry {
    fn new(extents: [f64; 3], bins: [usize; 3]) -> Self {
        let steps = [
            2.0 * extents[0] / bins[0] as f64,
            2.0 * extents[1] / bins[1] as f64,
            2.0 * extents[2] / bins[2] as f64,
        ];
        Self {
            extents,
            steps,
            bins,
        }
    }

    pub fn bin_count(&self) -> usize {
        self.bins.iter().product()
    }
}

fn homochoric_extent(angle: f64) -> f64 {
    (0.75 * (angle - angle.sin())).cbrt()
}

impl CrystalClass {
    /// Raw operator table, `(x, y, z, w)` per row
    pub fn operator_table(&self) -> &'static [[f64; 4]] {
        match self {
            CrystalClass::Cubic => &CUBIC_OPERATORS,
            CrystalClass::Hexagonal => &HEXAGONAL_OPERATORS,
            CrystalClass::Orthorhombic => &ORTHORHOMBIC_OPERATORS,
        }
    }

    pub fn operator_count(&self) -> usize {
        self.operator_table().len()
    }

    pub fn symmetry_quats(&self) -> impl Iterator<Item = Quat> {
        self.operator_table()
            .iter()
            .map(|&[x, y, z, w]| Quat::new(w, x, y, z))
    }

    /// Operators as Rodrigues vectors; 180 degree rotations use a large finite stand-in
    pub fn symmetry_rodrigues(&self) -> impl Iterator<Item = Vector3<f64>> {
        self.operator_table().iter().map(|&[x, y, z, w]| {
            let v = Vector3::new(x, y, z);
            if w.abs() < 1e-12 {
                v * ROD_SENTINEL_SCALE
            } else {
                v / w
            }
        })
    }

    pub fn fz_geometry(&self) -> FzGeometry {
        match self {
            CrystalClass::Cubic => {
                let e = homochoric_extent(FRAC_PI_4);
                FzGeometry::new([e; 3], [18; 3])
            }
            CrystalClass::Hexagonal => {
                let e = homochoric_extent(FRAC_PI_2);
                FzGeometry::new([e, e, homochoric_extent(FRAC_PI_6)], [36, 36, 12])
            }
            CrystalClass::Orthorhombic => {
                let e = homochoric_extent(FRAC_PI_2);
                FzGeometry::new([e; 3], [36; 3])
            }
        }
    }

    /// Length of the ODF and MDF arrays for this class
    pub fn odf_bin_count(&self) -> usize {
        self.fz_geometry().bin_count()
    }
}
