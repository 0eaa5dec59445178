use nalgebra::{Quaternion, Vector3};
use serde::{Deserialize, Serialize};

use super::conversions::euler_to_quat;

pub type Quat = Quaternion<f64>;

/// Bunge ZXZ Euler angles in radians
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct EulerAngles {
    pub phi1: f64,
    pub phi: f64,
    pub phi2: f64,
}

impl EulerAngles {
    pub fn new(phi1: f64, phi: f64, phi2: f64) -> Self {
        Self { phi1, phi, phi2 }
    }

    pub fn from_degrees(phi1: f64, phi: f64, phi2: f64) -> Self {
        Self::new(phi1.to_radians(), phi.to_radians(), phi2.to_radians())
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.phi1, self.phi, self.phi2]
    }
}

/// Rotation by `angle` radians about the unit vector `axis`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AxisAngle {
    pub angle: f64,
    pub axis: Vector3<f64>,
}

/// A grain orientation: Euler angles with the matching quaternion kept in sync
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Orientation {
    pub euler: EulerAngles,
    pub quat: Quat,
}

impl Orientation {
    pub fn from_euler(euler: EulerAngles) -> Self {
        Self {
            euler,
            quat: euler_to_quat(&euler),
        }
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self::from_euler(EulerAngles::default())
    }
}

pub fn identity_quat() -> Quat {
    Quat::new(1.0, 0.0, 0.0, 0.0)
}

/// Rotation `a` followed by rotation `b`
pub fn compose(a: &Quat, b: &Quat) -> Quat {
    b * a
}

pub fn conjugate(q: &Quat) -> Quat {
    q.conjugate()
}
