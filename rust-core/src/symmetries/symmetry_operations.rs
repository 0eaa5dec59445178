use nalgebra::Vector3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::symmetry_point_groups::{CrystalClass, FzGeometry};
use crate::orientation::{
    axis_angle_to_homochoric, homochoric_to_rodrigues, quat_to_axis_angle, quat_to_euler,
    quat_to_rodrigues, rodrigues_to_homochoric, rodrigues_to_quat, AxisAngle, Orientation, Quat,
};

/// Disorientation between two crystals: smallest rotation angle over all symmetric variants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Misorientation {
    /// Rotation angle in degrees
    pub angle: f64,
    /// Unit rotation axis with non-negative z, folded into the 0..30 degree azimuthal wedge
    pub axis: Vector3<f64>,
}

impl Misorientation {
    pub fn to_rodrigues(&self) -> Vector3<f64> {
        self.axis * (self.angle.to_radians() * 0.5).tan()
    }

    pub fn to_homochoric(&self) -> Vector3<f64> {
        axis_angle_to_homochoric(self.angle.to_radians(), &self.axis)
    }
}

/// Disorientation between `q1` and `q2` under the class's proper rotations.
///
/// The operators act on the right of `q2^-1 * q1`. The winning axis is then folded so that
/// its z component is non-negative and its azimuth lies within 0..30 degrees.
pub fn misorientation(class: CrystalClass, q1: &Quat, q2: &Quat) -> Misorientation {
    let delta = q2.conjugate() * q1;
    let mut best = AxisAngle {
        angle: f64::INFINITY,
        axis: Vector3::new(0.0, 0.0, 1.0),
    };
    for sym in class.symmetry_quats() {
        let mut qc = delta * sym;
        qc.w = qc.w.clamp(-1.0, 1.0);
        let aa = quat_to_axis_angle(&qc);
        if aa.angle < best.angle {
            best = aa;
        }
    }

    let mag = best.axis.norm();
    let axis = if mag > 0.0 && best.angle > 0.0 {
        best.axis / mag
    } else {
        Vector3::new(0.0, 0.0, 1.0)
    };
    Misorientation {
        angle: best.angle.to_degrees(),
        axis: fold_axis_into_wedge(&axis),
    }
}

/// Flips the axis into the upper hemisphere and mirrors its azimuth into [0, 30] degrees.
pub fn fold_axis_into_wedge(axis: &Vector3<f64>) -> Vector3<f64> {
    let mut n = *axis;
    if n.z < 0.0 {
        n = -n;
    }
    let mut azimuth = n.y.atan2(n.x).to_degrees();
    if azimuth < 0.0 {
        azimuth += 360.0;
    }
    if azimuth > 30.0 {
        let sector = (azimuth / 30.0).floor();
        let remainder = azimuth - 30.0 * sector;
        let folded = if (sector as i64) % 2 == 0 {
            remainder
        } else {
            30.0 - remainder
        };
        let planar = (n.x * n.x + n.y * n.y).sqrt();
        let (s, c) = folded.to_radians().sin_cos();
        n.x = planar * c;
        n.y = planar * s;
    }
    n
}

/// Symmetric equivalent of Rodrigues vector `r` closest to the origin.
///
/// Operators compose on the right, matching the quaternion routines below.
pub fn fz_rodrigues(class: CrystalClass, r: &Vector3<f64>) -> Vector3<f64> {
    let mut best = *r;
    let mut best_norm = r.norm_squared();
    for s in class.symmetry_rodrigues() {
        let denom = 1.0 - r.dot(&s);
        let candidate = (r + s + r.cross(&s)) / denom;
        let norm = candidate.norm_squared();
        if norm < best_norm {
            best_norm = norm;
            best = candidate;
        }
    }
    best
}

/// Symmetric equivalent of `q` nearest to `reference`, returned with non-negative w
pub fn nearest_symmetric_quat(class: CrystalClass, reference: &Quat, q: &Quat) -> Quat {
    let mut best = *q;
    let mut best_dist = f64::INFINITY;
    for sym in class.symmetry_quats() {
        let mut qc = q * sym;
        if qc.w < 0.0 {
            qc = -qc;
        }
        let dist = 1.0 - qc.coords.dot(&reference.coords);
        if dist < best_dist {
            best_dist = dist;
            best = qc;
        }
    }
    best
}

/// Symmetric equivalent of `q` with the smallest rotation angle, returned with non-negative w
pub fn fz_quat(class: CrystalClass, q: &Quat) -> Quat {
    let mut best = *q;
    let mut best_dist = f64::INFINITY;
    for sym in class.symmetry_quats() {
        let qc = q * sym;
        let dist = 1.0 - qc.w * qc.w;
        if dist < best_dist {
            best_dist = dist;
            best = qc;
        }
    }
    if best.w < 0.0 {
        -best
    } else {
        best
    }
}

/// Linear bin index of a homochoric point; each axis coordinate is clamped into the grid.
pub fn bin_index(geometry: &FzGeometry, h: &Vector3<f64>) -> usize {
    let mut b = [0usize; 3];
    for axis in 0..3 {
        let raw = ((h[axis] + geometry.extents[axis]) / geometry.steps[axis]).floor();
        // NaN casts to 0, infinities saturate
        let idx = raw as i64;
        b[axis] = idx.clamp(0, geometry.bins[axis] as i64 - 1) as usize;
    }
    b[2] * geometry.bins[0] * geometry.bins[1] + b[1] * geometry.bins[0] + b[0]
}

/// ODF bin of an orientation after reduction into the fundamental zone
pub fn odf_bin(class: CrystalClass, q: &Quat) -> usize {
    let r = quat_to_rodrigues(&fz_quat(class, q));
    bin_index(&class.fz_geometry(), &rodrigues_to_homochoric(&r))
}

pub fn miso_bin(class: CrystalClass, m: &Misorientation) -> usize {
    bin_index(&class.fz_geometry(), &m.to_homochoric())
}

/// MDF bin of a misorientation stored in Rodrigues form
pub fn miso_bin_from_rodrigues(class: CrystalClass, r: &Vector3<f64>) -> usize {
    bin_index(&class.fz_geometry(), &rodrigues_to_homochoric(r))
}

/// Uniform draw inside one homochoric ODF bin, reduced into the fundamental zone.
pub fn sample_orientation_in_bin<R: Rng + ?Sized>(
    class: CrystalClass,
    bin: usize,
    rng: &mut R,
) -> Orientation {
    let geometry = class.fz_geometry();
    let [n0, n1, _] = geometry.bins;
    let cell = [bin % n0, (bin / n0) % n1, bin / (n0 * n1)];
    let mut h = Vector3::zeros();
    for axis in 0..3 {
        let step = geometry.steps[axis];
        h[axis] = step * cell[axis] as f64 + step * rng.gen::<f64>() - geometry.extents[axis];
    }
    let quat = fz_quat(class, &rodrigues_to_quat(&homochoric_to_rodrigues(&h)));
    Orientation {
        euler: quat_to_euler(&quat),
        quat,
    }
}
