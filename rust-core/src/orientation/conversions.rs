use std::f64::consts::{PI, TAU};

use nalgebra::{Matrix3, Vector3};

use super::representations::{AxisAngle, EulerAngles, Quat};
use crate::config::HOMOCHORIC_NEWTON_ITERATIONS;

fn z_axis() -> Vector3<f64> {
    Vector3::new(0.0, 0.0, 1.0)
}

/// Unit vector along `v`, or `fallback` when `v` has no length
fn unit_or(v: &Vector3<f64>, fallback: Vector3<f64>) -> (Vector3<f64>, f64) {
    let mag = v.norm();
    if mag > 0.0 {
        (v / mag, mag)
    } else {
        (fallback, 0.0)
    }
}

/// (3/4 (w - sin w))^(1/3), the homochoric radius of a rotation by `w`
fn homochoric_radius(w: f64) -> f64 {
    (0.75 * (w - w.sin())).max(0.0).cbrt()
}

pub fn euler_to_quat(e: &EulerAngles) -> Quat {
    let (s, c) = (e.phi * 0.5).sin_cos();
    let (s1, c1) = ((e.phi1 - e.phi2) * 0.5).sin_cos();
    let (s2, c2) = ((e.phi1 + e.phi2) * 0.5).sin_cos();
    Quat::new(c * c2, s * c1, s * s1, c * s2)
}

/// Inverse of [`euler_to_quat`]; phi1 and phi2 come back in [0, 2pi), PHI in [0, pi]
pub fn quat_to_euler(q: &Quat) -> EulerAngles {
    let diff = (-q.j).atan2(-q.i);
    let sum = (-q.k).atan2(-q.w);
    let phi1 = (diff + sum).rem_euclid(TAU);
    let phi2 = (sum - diff).rem_euclid(TAU);
    let phi = 2.0 * (q.k * q.k + q.w * q.w).sqrt().min(1.0).acos();
    // rem_euclid can round up to exactly TAU
    let wrap = |a: f64| if a >= TAU { 0.0 } else { a };
    EulerAngles::new(wrap(phi1), phi, wrap(phi2))
}

pub fn quat_to_rodrigues(q: &Quat) -> Vector3<f64> {
    let (axis, _) = unit_or(&q.imag(), z_axis());
    let half = q.w.clamp(-1.0, 1.0).acos();
    axis * half.tan()
}

pub fn rodrigues_to_quat(r: &Vector3<f64>) -> Quat {
    let (axis, mag) = unit_or(r, Vector3::zeros());
    let w = 2.0 * mag.atan();
    let (s, c) = (w * 0.5).sin_cos();
    Quat::new(c, axis.x * s, axis.y * s, axis.z * s)
}

pub fn axis_angle_to_rodrigues(angle: f64, axis: &Vector3<f64>) -> Vector3<f64> {
    let (n, _) = unit_or(axis, z_axis());
    n * (angle * 0.5).tan()
}

pub fn axis_angle_to_homochoric(angle: f64, axis: &Vector3<f64>) -> Vector3<f64> {
    let (n, _) = unit_or(axis, z_axis());
    n * homochoric_radius(angle)
}

pub fn rodrigues_to_homochoric(r: &Vector3<f64>) -> Vector3<f64> {
    let (n, mag) = unit_or(r, Vector3::zeros());
    let w = 2.0 * mag.atan();
    n * homochoric_radius(w)
}

/// Inverts the homochoric map by Newton iteration on `w - sin w = 4/3 |h|^3`.
pub fn homochoric_to_rodrigues(h: &Vector3<f64>) -> Vector3<f64> {
    let (n, hmag) = unit_or(h, Vector3::zeros());
    if hmag == 0.0 {
        return Vector3::zeros();
    }
    // small-angle series: w - sin w ~ w^3 / 6, so w ~ 2 |h|
    let mut w = 2.0 * hmag;
    if hmag > 1e-5 {
        let x = 4.0 / 3.0 * hmag.powi(3);
        for _ in 0..HOMOCHORIC_NEWTON_ITERATIONS {
            let slope = w.cos() - 1.0;
            if slope == 0.0 {
                break;
            }
            let step = (x - w + w.sin()) / slope;
            w -= step;
            if step.abs() < 1e-15 {
                break;
            }
        }
    }
    n * (w.clamp(0.0, PI) * 0.5).tan()
}

pub fn rodrigues_to_axis_angle(r: &Vector3<f64>) -> AxisAngle {
    let (axis, mag) = unit_or(r, z_axis());
    AxisAngle {
        angle: 2.0 * mag.atan(),
        axis,
    }
}

pub fn euler_to_rodrigues(e: &EulerAngles) -> Vector3<f64> {
    quat_to_rodrigues(&euler_to_quat(e))
}

pub fn rodrigues_to_euler(r: &Vector3<f64>) -> EulerAngles {
    quat_to_euler(&rodrigues_to_quat(r))
}

/// Angle in [0, pi]; rotations past pi are expressed about the negated axis.
pub fn quat_to_axis_angle(q: &Quat) -> AxisAngle {
    let qw = q.w.clamp(-1.0, 1.0);
    let mut angle = 2.0 * qw.acos();
    let s = (1.0 - qw * qw).sqrt();
    let mut axis = if s > 0.0 { q.imag() / s } else { z_axis() };
    if angle > PI {
        angle = TAU - angle;
        axis = -axis;
    }
    AxisAngle { angle, axis }
}

/// Passive rotation matrix `g` taking sample coordinates into crystal coordinates
pub fn euler_to_matrix(e: &EulerAngles) -> Matrix3<f64> {
    let (s1, c1) = e.phi1.sin_cos();
    let (s, c) = e.phi.sin_cos();
    let (s2, c2) = e.phi2.sin_cos();
    Matrix3::new(
        c1 * c2 - s1 * s2 * c,
        s1 * c2 + c1 * s2 * c,
        s2 * s,
        -c1 * s2 - s1 * c2 * c,
        -s1 * s2 + c1 * c2 * c,
        c2 * s,
        s1 * s,
        -c1 * s,
        c,
    )
}
