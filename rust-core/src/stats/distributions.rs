use std::f64::consts::PI;

use rand::distributions::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta, LogNormal};
use statrs::function::gamma::ln_gamma;

use super::phase_stats::SizeDistribution;
use crate::config::{MAX_REJECTION_DRAWS, NEIGHBOR_SHELLS, SIZE_HISTOGRAM_BINS};

/// Fixed-width diameter histogram spanning `[min/2, 2 max]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SizeHistogram {
    pub offset: f64,
    pub step: f64,
    pub values: Vec<f64>,
}

impl SizeHistogram {
    pub fn empty(size: &SizeDistribution) -> Self {
        let offset = size.min_diameter * 0.5;
        let step = (2.0 * size.max_diameter - offset) / SIZE_HISTOGRAM_BINS as f64;
        Self {
            offset,
            step,
            values: vec![0.0; SIZE_HISTOGRAM_BINS],
        }
    }

    /// Bin of `diameter`, clamped into the histogram
    pub fn bin_of(&self, diameter: f64) -> usize {
        let raw = ((diameter - self.offset) / self.step).floor() as i64;
        raw.clamp(0, self.values.len() as i64 - 1) as usize
    }
}

/// Binned log-normal density the packing optimizer fits the placed grains against
pub fn target_size_distribution(size: &SizeDistribution) -> SizeHistogram {
    let mut hist = SizeHistogram::empty(size);
    let (step, offset) = (hist.step, hist.offset);
    for (j, value) in hist.values.iter_mut().enumerate() {
        let x = j as f64 * step + step * 0.5 + offset;
        let z = x.ln() - size.mu;
        *value = step / (x * size.sigma * (2.0 * PI).sqrt())
            * (-(z * z) / (2.0 * size.sigma * size.sigma)).exp();
    }
    hist
}

/// Expected neighbour counts within 1, 2 and 3 radii, per diameter bin: `A (k + 0.5)^exp + B`
pub fn target_neighbor_distribution(params: &[[f64; 3]]) -> Vec<[f64; NEIGHBOR_SHELLS]> {
    params
        .iter()
        .map(|&[a, b, exponent]| {
            let mut shells = [0.0; NEIGHBOR_SHELLS];
            for (k, shell) in shells.iter_mut().enumerate() {
                *shell = a * (k as f64 + 0.5).powf(exponent) + b;
            }
            shells
        })
        .collect()
}

/// Sum of squared differences scaled by the target's squared magnitude.
///
/// An all-zero target leaves the raw squared error unscaled.
pub fn normalized_ssd(simulated: &[f64], target: &[f64]) -> f64 {
    let (error, scale) = simulated
        .iter()
        .zip(target)
        .fold((0.0, 0.0), |(e, s), (a, b)| (e + (a - b) * (a - b), s + b * b));
    if scale > 0.0 {
        error / scale
    } else {
        error
    }
}

/// Beta density at `x`, used as the acceptance probability of a c/b ratio
pub fn beta_acceptance_probability(alpha: f64, beta: f64, x: f64) -> f64 {
    if !(x > 0.0 && x < 1.0) {
        return if x == 1.0 && beta < 1.0 { f64::INFINITY } else { 0.0 };
    }
    let ln_norm = ln_gamma(alpha + beta) - ln_gamma(alpha) - ln_gamma(beta);
    (ln_norm + (alpha - 1.0) * x.ln() + (beta - 1.0) * (1.0 - x).ln()).exp()
}

/// Index drawn from non-negative `weights` by inverse-CDF linear scan with uniform `u` in [0, 1).
///
/// Weights need not be normalised. Returns `None` when every weight is zero.
pub fn cumulative_pick(weights: &[f64], u: f64) -> Option<usize> {
    let total: f64 = weights.iter().sum();
    if !(total > 0.0) {
        return None;
    }
    let target = u * total;
    let mut running = 0.0;
    let mut last_positive = None;
    for (j, &w) in weights.iter().enumerate() {
        if w > 0.0 {
            running += w;
            last_positive = Some(j);
            if target < running {
                return Some(j);
            }
        }
    }
    last_positive
}

/// Log-normal diameter redrawn until it lands in `[min_diameter, max_diameter)`.
pub fn sample_diameter<R: Rng + ?Sized>(size: &SizeDistribution, rng: &mut R) -> f64 {
    let fallback = 0.5 * (size.min_diameter + size.max_diameter);
    let Ok(dist) = LogNormal::new(size.mu, size.sigma) else {
        return fallback;
    };
    for _ in 0..MAX_REJECTION_DRAWS {
        let d = dist.sample(rng);
        if d >= size.min_diameter && d < size.max_diameter {
            return d;
        }
    }
    log::warn!(
        "size distribution mu={} sigma={} rarely hits [{}, {}); using {}",
        size.mu,
        size.sigma,
        size.min_diameter,
        size.max_diameter,
        fallback
    );
    fallback
}

/// One Beta(alpha, beta) draw; `None` for unusable coefficients
pub fn sample_beta<R: Rng + ?Sized>(alpha: f64, beta: f64, rng: &mut R) -> Option<f64> {
    Beta::new(alpha, beta).ok().map(|d| d.sample(rng))
}
