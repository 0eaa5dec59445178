use std::f64::consts::PI;
use std::sync::OnceLock;

use statrs::function::gamma::gamma;

/// Sphericity (Omega3) against cube-octahedron G value, G from 0 to 2 in steps of 0.05
pub const CUBE_OCTAHEDRON_CURVE: [(f64, f64); 41] = [
    (0.787873524, 0.0),
    (0.78793553, 0.05),
    (0.788341216, 0.1),
    (0.789359741, 0.15),
    (0.791186818, 0.2),
    (0.793953966, 0.25),
    (0.797737494, 0.3),
    (0.802566619, 0.35),
    (0.808430467, 0.4),
    (0.815283954, 0.45),
    (0.823052718, 0.5),
    (0.831637359, 0.55),
    (0.840917349, 0.6),
    (0.850755028, 0.65),
    (0.86100021, 0.7),
    (0.871496036, 0.75),
    (0.882086906, 0.8),
    (0.892629636, 0.85),
    (0.903009489, 0.9),
    (0.913163591, 0.95),
    (0.92311574, 1.0),
    (0.932874613, 1.05),
    (0.941981628, 1.1),
    (0.949904418, 1.15),
    (0.956171947, 1.2),
    (0.96037277, 1.25),
    (0.962158855, 1.3),
    (0.961254001, 1.35),
    (0.957466141, 1.4),
    (0.950703099, 1.45),
    (0.940991385, 1.5),
    (0.92849772, 1.55),
    (0.913552923, 1.6),
    (0.89667764, 1.65),
    (0.878608694, 1.7),
    (0.860322715, 1.75),
    (0.843047317, 1.8),
    (0.828232275, 1.85),
    (0.81740437, 1.9),
    (0.811701359, 1.95),
    (0.810569469, 2.0),
];

/// Omega3 of a super-ellipsoid |x|^n + |y|^n + |z|^n <= 1
pub fn super_ellipsoid_omega3(n: f64) -> f64 {
    let a = gamma(1.0 + 1.0 / n);
    let b = gamma(5.0 / n);
    let c = gamma(3.0 / n);
    let d = gamma(1.0 + 3.0 / n);
    (20.0 * a.powi(3) * b / (c * d.powf(5.0 / 3.0))).powi(3) / (2000.0 * PI * PI / 9.0)
}

/// Sphericity against super-ellipsoid exponent n = 0.25, 0.5, ..., 10, built on first use
pub fn super_ellipsoid_curve() -> &'static [(f64, f64)] {
    static CURVE: OnceLock<Vec<(f64, f64)>> = OnceLock::new();
    CURVE.get_or_init(|| {
        (1..=40)
            .map(|i| {
                let n = 0.25 * i as f64;
                (super_ellipsoid_omega3(n), n)
            })
            .collect()
    })
}

/// Shape parameter of the curve point whose Omega3 is nearest to `omega3`; first match wins ties
pub fn nearest_on_curve(curve: &[(f64, f64)], omega3: f64) -> Option<f64> {
    let mut best: Option<(f64, f64)> = None;
    for &(value, param) in curve {
        let dist = (omega3 - value).abs();
        if best.map_or(true, |(d, _)| dist < d) {
            best = Some((dist, param));
        }
    }
    best.map(|(_, param)| param)
}
