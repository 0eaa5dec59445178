//! Grain shape library
//!
//! Each shape class maps a sphericity value (Omega3) to its shape parameter, sizes its
//! principal radii from a target volume and aspect ratios, and tests containment in the
//! grain's local, axis-normalised frame.

// ======================== MODULE DECLARATIONS ========================
pub mod curves;
pub mod shape_class;

#[cfg(test)]
mod _tests_shapes;

// ======================== SHAPES ========================
pub use curves::{
    CUBE_OCTAHEDRON_CURVE,  // const [(omega3, G); 41]
    nearest_on_curve,       // fn(curve, omega3) -> Option<f64>
    super_ellipsoid_curve,  // fn() -> &'static [(omega3, n)] - lazily computed
    super_ellipsoid_omega3, // fn(n) -> f64
};
pub use shape_class::{
    GrainShape, // struct - class + parameter + radii + axis frame of one grain
    ShapeClass, // enum - Ellipsoid, SuperEllipsoid, CubeOctahedron, Cylinder
};
