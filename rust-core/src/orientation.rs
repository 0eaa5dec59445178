//! Orientation representations and the converters between them
//!
//! Quick reference:
//! - Quaternions are stored scalar-last in the sense of nalgebra's `coords = [i, j, k, w]`;
//!   the identity is `(0, 0, 0, 1)`.
//! - Euler angles follow the Bunge ZXZ convention `(phi1, PHI, phi2)` in radians.
//! - Rodrigues vectors are `axis * tan(angle / 2)`, homochoric vectors are
//!   `axis * (3/4 (angle - sin angle))^(1/3)`.
//! - Composition "a then b" is the Hamilton product `b * a`.

// ======================== MODULE DECLARATIONS ========================
pub mod conversions;
pub mod representations;


// ======================== REPRESENTATIONS ========================
pub use representations::{
    AxisAngle,   // struct - rotation angle (radians) about a unit axis
    EulerAngles, // struct - Bunge (phi1, PHI, phi2) triple
    Orientation, // struct - Euler triple cached alongside its quaternion
    Quat,        // type - nalgebra quaternion of f64
    compose,     // fn(a: &Quat, b: &Quat) -> Quat - rotation a followed by b
    conjugate,   // fn(q: &Quat) -> Quat - inverse of a unit quaternion
    identity_quat, // fn() -> Quat - (0, 0, 0, 1)
};

// ======================== CONVERTERS ========================
pub use conversions::{
    axis_angle_to_homochoric, // fn(angle, axis) -> Vector3 - equal-volume map of an axis-angle pair
    axis_angle_to_rodrigues,  // fn(angle, axis) -> Vector3 - axis * tan(angle/2)
    euler_to_matrix,          // fn(&EulerAngles) -> Matrix3 - passive rotation matrix g
    euler_to_quat,            // fn(&EulerAngles) -> Quat
    euler_to_rodrigues,       // fn(&EulerAngles) -> Vector3
    homochoric_to_rodrigues,  // fn(&Vector3) -> Vector3 - Newton inversion of the volume map
    quat_to_axis_angle,       // fn(&Quat) -> AxisAngle - angle folded into [0, pi]
    quat_to_euler,            // fn(&Quat) -> EulerAngles - phi1, phi2 wrapped into [0, 2pi)
    quat_to_rodrigues,        // fn(&Quat) -> Vector3
    rodrigues_to_axis_angle,  // fn(&Vector3) -> AxisAngle
    rodrigues_to_euler,       // fn(&Vector3) -> EulerAngles
    rodrigues_to_homochoric,  // fn(&Vector3) -> Vector3
    rodrigues_to_quat,        // fn(&Vector3) -> Quat
};
