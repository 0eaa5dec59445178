// Symmetries module: crystal symmetry tables and the orientation reduction engine
// This module reduces orientations and misorientations into fundamental zones and bins them

// ======================== MODULE DECLARATIONS ========================
pub mod symmetry_operations;
pub mod symmetry_point_groups;


// ======================== CRYSTAL CLASS TABLES ========================
pub use symmetry_point_groups::{
    CrystalClass,           // enum - Cubic (24 ops), Hexagonal (12 ops), Orthorhombic (4 ops)
    FzGeometry,             // struct - homochoric extents, bin steps and bin counts of a class
    CUBIC_OPERATORS,        // const [[f64; 4]; 24] - (x, y, z, w) rotation operators
    HEXAGONAL_OPERATORS,    // const [[f64; 4]; 12]
    ORTHORHOMBIC_OPERATORS, // const [[f64; 4]; 4]
};

// CrystalClass impl methods:
//   operator_table(&self) -> &'static [[f64; 4]]                  - raw operator rows
//   operator_count(&self) -> usize                                 - number of proper rotations
//   symmetry_quats(&self) -> impl Iterator<Item = Quat>            - operators as quaternions
//   symmetry_rodrigues(&self) -> impl Iterator<Item = Vector3>     - operators as Rodrigues vectors
//   fz_geometry(&self) -> FzGeometry                               - ODF/MDF binning cube
//   odf_bin_count(&self) -> usize                                  - 5832, 15552 or 46656

// ======================== REDUCTION ENGINE ========================
pub use symmetry_operations::{
    Misorientation,            // struct - disorientation angle (degrees) and folded axis
    bin_index,                 // fn(&FzGeometry, &Vector3) -> usize - clamped homochoric bin
    fold_axis_into_wedge,      // fn(&Vector3) -> Vector3 - z >= 0, azimuth in [0, 30] degrees
    fz_quat,                   // fn(class, &Quat) -> Quat - smallest-angle equivalent
    fz_rodrigues,              // fn(class, &Vector3) -> Vector3 - equivalent nearest the origin
    miso_bin,                  // fn(class, &Misorientation) -> usize
    miso_bin_from_rodrigues,   // fn(class, &Vector3) -> usize
    misorientation,            // fn(class, &Quat, &Quat) -> Misorientation
    nearest_symmetric_quat,    // fn(class, reference, q) -> Quat - equivalent closest to reference
    odf_bin,                   // fn(class, &Quat) -> usize
    sample_orientation_in_bin, // fn(class, bin, rng) -> Orientation - uniform draw inside a bin
};
