use std::f64::consts::PI;

use log::debug;
use rand::Rng;

use super::grain::Grain;
use crate::config::{AXIS_ODF_BINS_PER_ANGLE, AXIS_ODF_BIN_WIDTH_DEG, MAX_REJECTION_DRAWS};
use crate::interfaces::{PhaseId, PhaseType};
use crate::orientation::EulerAngles;
use crate::shapes::ShapeClass;
use crate::stats::{
    beta_acceptance_probability, cumulative_pick, sample_beta, sample_diameter, PhaseStats,
    StatsInput,
};

// Beta draw that treats unusable coefficients as a symmetric unit distribution
fn beta_or_uniform<R: Rng + ?Sized>(coefficients: (f64, f64), rng: &mut R) -> f64 {
    sample_beta(coefficients.0, coefficients.1, rng).unwrap_or_else(|| rng.gen())
}

/// Aspect ratios (b/a, c/a) by rejection against the c/b Beta density
fn sample_aspect_ratios<R: Rng + ?Sized>(stats: &PhaseStats, bin: usize, rng: &mut R) -> (f64, f64) {
    let bovera = PhaseStats::beta_coefficients(&stats.b_over_a, bin);
    let covera = PhaseStats::beta_coefficients(&stats.c_over_a, bin);
    let coverb = PhaseStats::beta_coefficients(&stats.c_over_b, bin);
    let mut last = (1.0, 1.0);
    for _ in 0..MAX_REJECTION_DRAWS {
        let b = beta_or_uniform(bovera, rng);
        let c = beta_or_uniform(covera, rng);
        if !(b > 0.0 && c > 0.0) {
            continue;
        }
        let ratio = c / b;
        if ratio > 1.0 {
            continue;
        }
        last = (b, c);
        if beta_acceptance_probability(coverb.0, coverb.1, ratio) > rng.gen::<f64>() {
            return (b, c);
        }
    }
    last
}

/// Axis orientation drawn from the 36x36x36 axis-ODF, uniform inside the 5 degree bin
fn sample_axis_orientation<R: Rng + ?Sized>(axis_odf: &[f64], rng: &mut R) -> EulerAngles {
    let n = AXIS_ODF_BINS_PER_ANGLE;
    let bin = cumulative_pick(axis_odf, rng.gen()).unwrap_or(0);
    let cells = [bin % n, (bin / n) % n, bin / (n * n)];
    let mut angles = [0.0; 3];
    for (angle, cell) in angles.iter_mut().zip(cells) {
        *angle = (cell as f64 * AXIS_ODF_BIN_WIDTH_DEG + rng.gen::<f64>() * AXIS_ODF_BIN_WIDTH_DEG)
            .to_radians();
    }
    EulerAngles::new(angles[0], angles[1], angles[2])
}

/// Draws one grain of `phase`: size, aspect ratios, axis orientation and shape.
pub fn generate_grain<R: Rng + ?Sized>(
    phase: PhaseId,
    stats: &PhaseStats,
    shape_class: ShapeClass,
    rng: &mut R,
) -> Grain {
    let diameter = sample_diameter(&stats.size_distribution, rng);
    let volume = 4.0 / 3.0 * PI * (diameter * 0.5).powi(3);
    let bin = stats.diameter_bin(diameter);

    let (b_over_a, c_over_a) = sample_aspect_ratios(stats, bin, rng);
    let axis_euler = sample_axis_orientation(&stats.axis_odf, rng);
    let omega3 = beta_or_uniform(PhaseStats::beta_coefficients(&stats.omega3, bin), rng);
    let shape_param = shape_class.shape_parameter_from_omega3(omega3);

    let mut grain = Grain::new(phase, shape_class);
    grain.volume = volume;
    grain.equivalent_diameter = diameter;
    grain.aspect_ratios = [1.0, b_over_a, c_over_a];
    grain.axis_euler = axis_euler;
    grain.omega3 = omega3;
    grain.shape_param = shape_param;
    grain.radii = shape_class.radii_from_volume(volume, b_over_a, c_over_a, shape_param);
    grain
}

// Phases of one role with their cumulative normalised fractions
fn phase_table(stats: &StatsInput, kind: PhaseType) -> (Vec<PhaseId>, Vec<f64>) {
    stats
        .phases_of_type(kind)
        .filter(|(_, p)| p.phase_fraction > 0.0)
        .map(|(id, p)| (id, p.phase_fraction))
        .unzip()
}

/// Phase picked in proportion to the fractions of the phases of one role
pub fn pick_phase<R: Rng + ?Sized>(stats: &StatsInput, kind: PhaseType, rng: &mut R) -> Option<PhaseId> {
    let (ids, fractions) = phase_table(stats, kind);
    cumulative_pick(&fractions, rng.gen()).map(|i| ids[i])
}

fn generate_until<R: Rng + ?Sized>(
    stats: &StatsInput,
    kind: PhaseType,
    target_volume: f64,
    shape_class: ShapeClass,
    rng: &mut R,
) -> Vec<Grain> {
    let (ids, fractions) = phase_table(stats, kind);
    let mut grains = Vec::new();
    let mut volume = 0.0;
    while volume < target_volume {
        let Some(id) = cumulative_pick(&fractions, rng.gen()).map(|i| ids[i]) else {
            break;
        };
        let Some(phase) = stats.phase(id) else {
            break;
        };
        let grain = generate_grain(id, phase, shape_class, rng);
        volume += grain.volume;
        grains.push(grain);
    }
    debug!(
        "generated {} {:?} grains holding {:.3} of {:.3} volume",
        grains.len(),
        kind,
        volume,
        target_volume
    );
    grains
}

/// Primary grains until their summed volume reaches `total_volume`
pub fn generate_primary_population<R: Rng + ?Sized>(
    stats: &StatsInput,
    total_volume: f64,
    shape_class: ShapeClass,
    rng: &mut R,
) -> Vec<Grain> {
    generate_until(stats, PhaseType::Primary, total_volume, shape_class, rng)
}

/// Precipitate grains until they fill the precipitate phases' share of `total_volume`
pub fn generate_precipitate_population<R: Rng + ?Sized>(
    stats: &StatsInput,
    total_volume: f64,
    shape_class: ShapeClass,
    rng: &mut R,
) -> Vec<Grain> {
    generate_until(
        stats,
        PhaseType::Precipitate,
        precipitate_target_volume(stats, total_volume),
        shape_class,
        rng,
    )
}

pub fn precipitate_target_volume(stats: &StatsInput, total_volume: f64) -> f64 {
    let fraction: f64 = stats
        .phases_of_type(PhaseType::Precipitate)
        .map(|(_, p)| p.phase_fraction)
        .sum();
    total_volume * fraction
}
