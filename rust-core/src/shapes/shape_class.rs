use std::f64::consts::PI;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use statrs::function::gamma::gamma;

use super::curves::{nearest_on_curve, super_ellipsoid_curve, CUBE_OCTAHEDRON_CURVE};

/// Grain shape families. The numeric codes match the statistics file convention.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ShapeClass {
    Ellipsoid = 1,
    SuperEllipsoid = 2,
    CubeOctahedron = 3,
    Cylinder = 4,
}

impl ShapeClass {
    /// Exponent n (super-ellipsoid) or truncation G (cube-octahedron) for a sphericity value.
    ///
    /// Ellipsoids always report 2; cylinders carry no parameter and report 0.
    pub fn shape_parameter_from_omega3(&self, omega3: f64) -> f64 {
        match self {
            ShapeClass::Ellipsoid => 2.0,
            ShapeClass::SuperEllipsoid => {
                nearest_on_curve(super_ellipsoid_curve(), omega3).unwrap_or(2.0)
            }
            ShapeClass::CubeOctahedron => {
                nearest_on_curve(&CUBE_OCTAHEDRON_CURVE, omega3).unwrap_or(0.0)
            }
            ShapeClass::Cylinder => 0.0,
        }
    }

    /// Principal radii `[r1, r1 * b/a, r1 * c/a]` of a shape holding `volume`.
    pub fn radii_from_volume(
        &self,
        volume: f64,
        b_over_a: f64,
        c_over_a: f64,
        param: f64,
    ) -> [f64; 3] {
        let aspect = b_over_a * c_over_a;
        let r1 = match self {
            ShapeClass::Ellipsoid => (volume * 0.75 / PI / aspect).cbrt(),
            ShapeClass::SuperEllipsoid => {
                let n = param;
                let beta1 = gamma(1.0 / n).powi(2) / gamma(2.0 / n);
                let beta2 = gamma(2.0 / n) * gamma(1.0 / n) / gamma(3.0 / n);
                (volume * 1.5 / aspect * (n * n / 4.0) / (beta1 * beta2)).cbrt()
            }
            ShapeClass::CubeOctahedron => {
                let g = param;
                let denom = if g <= 1.0 {
                    6.0 - g.powi(3)
                } else {
                    3.0 + 9.0 * g - 9.0 * g * g + 2.0 * g.powi(3)
                };
                (volume * 6.0 / denom / aspect).cbrt() * 0.5
            }
            ShapeClass::Cylinder => (volume / (2.0 * PI * aspect)).cbrt(),
        };
        [r1, r1 * b_over_a, r1 * c_over_a]
    }

    /// Ratio of the farthest surface point to `r1` for a shape with `r1 >= r2, r3`
    pub fn bounding_factor(&self, param: f64) -> f64 {
        match self {
            ShapeClass::Ellipsoid => 1.0,
            ShapeClass::SuperEllipsoid if param > 2.0 => 3.0_f64.powf(0.5 - 1.0 / param),
            ShapeClass::SuperEllipsoid => 1.0,
            ShapeClass::CubeOctahedron => 3.0_f64.sqrt(),
            ShapeClass::Cylinder => 2.0_f64.sqrt(),
        }
    }

    /// Containment test for a point already divided through by the principal radii.
    pub fn contains(&self, u: &Vector3<f64>, param: f64) -> bool {
        let (a, b, c) = (u.x.abs(), u.y.abs(), u.z.abs());
        match self {
            ShapeClass::Ellipsoid => a * a + b * b + c * c <= 1.0,
            ShapeClass::SuperEllipsoid => a.powf(param) + b.powf(param) + c.powf(param) <= 1.0,
            // cube |u_i| <= 1 cut by the eight corner planes
            ShapeClass::CubeOctahedron => a <= 1.0 && b <= 1.0 && c <= 1.0 && a + b + c <= 3.0 - param,
            ShapeClass::Cylinder => a * a + b * b <= 1.0 && c <= 1.0,
        }
    }
}

/// A realised grain shape: class, parameter, radii and principal-axis frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrainShape {
    pub class: ShapeClass,
    pub param: f64,
    pub radii: [f64; 3],
    /// Passive axis-orientation matrix `g`; local coordinates are `g^T * offset`
    pub frame: Matrix3<f64>,
}

impl GrainShape {
    pub fn bounding_radius(&self) -> f64 {
        self.radii[0] * self.class.bounding_factor(self.param)
    }

    /// Does the sample-frame `offset` from the centroid fall inside the shape?
    pub fn contains_offset(&self, offset: &Vector3<f64>) -> bool {
        let local = self.frame.tr_mul(offset);
        let u = Vector3::new(
            local.x / self.radii[0],
            local.y / self.radii[1],
            local.z / self.radii[2],
        );
        self.class.contains(&u, self.param)
    }
}
