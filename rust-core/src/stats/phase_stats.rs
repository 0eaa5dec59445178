use serde::{Deserialize, Serialize};

use crate::config::{AXIS_ODF_BIN_COUNT, MICROTEXTURE_BINS, PROBABILITY_SUM_TOLERANCE};
use crate::error::SynthesisError;
use crate::interfaces::{PhaseId, PhaseType};
use crate::symmetries::CrystalClass;

/// Log-normal grain size distribution, truncated to `[min_diameter, max_diameter)`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SizeDistribution {
    /// Mean of ln(diameter)
    pub mu: f64,
    /// Standard deviation of ln(diameter)
    pub sigma: f64,
    pub min_diameter: f64,
    pub max_diameter: f64,
    /// Width of one diameter bin of the shape and neighbour tables
    pub bin_step: f64,
}

impl SizeDistribution {
    /// Diameter bin of `diameter`, clamped to `[0, bins - 1]`
    pub fn diameter_bin(&self, diameter: f64, bins: usize) -> usize {
        let raw = ((diameter - self.min_diameter) / self.bin_step).floor() as i64;
        raw.clamp(0, bins.saturating_sub(1) as i64) as usize
    }
}

/// Target statistics of one phase
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseStats {
    pub crystal_class: CrystalClass,
    pub phase_fraction: f64,
    pub phase_type: PhaseType,
    /// Share of precipitates seeded on grain boundaries
    #[serde(default)]
    pub boundary_fraction: f64,
    pub size_distribution: SizeDistribution,
    /// Beta (alpha, beta) per diameter bin
    pub b_over_a: Vec<[f64; 2]>,
    pub c_over_a: Vec<[f64; 2]>,
    pub c_over_b: Vec<[f64; 2]>,
    pub omega3: Vec<[f64; 2]>,
    /// Power-law (A, B, exponent) per diameter bin
    pub neighbor_params: Vec<[f64; 3]>,
    pub odf: Vec<f64>,
    pub mdf: Vec<f64>,
    pub axis_odf: Vec<f64>,
    /// Checked on input and written back out; no synthesis stage reads it
    pub microtexture: Vec<f64>,
}

impl PhaseStats {
    /// Primary phase of equiaxed grains with a random texture
    pub fn isotropic(crystal_class: CrystalClass, size_distribution: SizeDistribution) -> Self {
        let span = size_distribution.max_diameter - size_distribution.min_diameter;
        let bins = ((span / size_distribution.bin_step).ceil() as usize).max(1);
        let odf_bins = crystal_class.odf_bin_count();
        Self {
            crystal_class,
            phase_fraction: 1.0,
            phase_type: PhaseType::Primary,
            boundary_fraction: 0.0,
            size_distribution,
            b_over_a: vec![[15.0, 1.5]; bins],
            c_over_a: vec![[15.0, 1.5]; bins],
            c_over_b: vec![[15.0, 1.5]; bins],
            omega3: vec![[10.0, 1.5]; bins],
            neighbor_params: vec![[2.0, 0.0, 3.0]; bins],
            odf: vec![1.0 / odf_bins as f64; odf_bins],
            mdf: vec![1.0 / odf_bins as f64; odf_bins],
            axis_odf: vec![1.0 / AXIS_ODF_BIN_COUNT as f64; AXIS_ODF_BIN_COUNT],
            microtexture: vec![1.0 / MICROTEXTURE_BINS as f64; MICROTEXTURE_BINS],
        }
    }

    pub fn diameter_bin_count(&self) -> usize {
        self.b_over_a.len()
    }

    pub fn diameter_bin(&self, diameter: f64) -> usize {
        self.size_distribution
            .diameter_bin(diameter, self.diameter_bin_count())
    }

    /// Beta coefficients for a diameter bin; empty (zero) rows fall back to the nearest
    /// populated row below them.
    pub fn beta_coefficients(table: &[[f64; 2]], bin: usize) -> (f64, f64) {
        let mut row = bin.min(table.len().saturating_sub(1));
        while row > 0 && (table[row][0] == 0.0 || table[row][1] == 0.0) {
            row -= 1;
        }
        table.get(row).map_or((1.0, 1.0), |r| (r[0], r[1]))
    }

    /// Checks table shapes and probability arrays of phase `phase`.
    pub fn validate(&self, phase: PhaseId) -> Result<(), SynthesisError> {
        self.validate_size(phase)?;

        for (field, value) in [
            ("phase_fraction", self.phase_fraction),
            ("boundary_fraction", self.boundary_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SynthesisError::InvalidFraction { phase, field, value });
            }
        }

        let bins = self.diameter_bin_count();
        if bins == 0 {
            return Err(SynthesisError::MissingTable {
                phase,
                field: "b_over_a",
            });
        }
        for (field, table) in [
            ("b_over_a", &self.b_over_a),
            ("c_over_a", &self.c_over_a),
            ("c_over_b", &self.c_over_b),
            ("omega3", &self.omega3),
        ] {
            check_len(phase, field, bins, table.len())?;
            check_beta_table(phase, field, table)?;
        }
        check_len(phase, "neighbor_params", bins, self.neighbor_params.len())?;

        let class_bins = self.crystal_class.odf_bin_count();
        check_probability(phase, "odf", &self.odf, class_bins, true)?;
        check_probability(phase, "mdf", &self.mdf, class_bins, true)?;
        check_probability(phase, "axis_odf", &self.axis_odf, AXIS_ODF_BIN_COUNT, true)?;
        check_probability(phase, "microtexture", &self.microtexture, MICROTEXTURE_BINS, false)?;
        Ok(())
    }

    fn validate_size(&self, phase: PhaseId) -> Result<(), SynthesisError> {
        let size = &self.size_distribution;
        let fail = |field: &'static str, reason: String| -> Result<(), SynthesisError> {
            Err(SynthesisError::InvalidSizeDistribution {
                phase,
                field,
                reason,
            })
        };
        if !(size.sigma.is_finite() && size.sigma > 0.0) {
            return fail("sigma", format!("must be positive, got {}", size.sigma));
        }
        if !size.mu.is_finite() {
            return fail("mu", format!("must be finite, got {}", size.mu));
        }
        if !(size.min_diameter.is_finite() && size.min_diameter > 0.0) {
            return fail(
                "min_diameter",
                format!("must be positive, got {}", size.min_diameter),
            );
        }
        if !(size.max_diameter.is_finite() && size.max_diameter > size.min_diameter) {
            return fail(
                "max_diameter",
                format!(
                    "must exceed min_diameter {}, got {}",
                    size.min_diameter, size.max_diameter
                ),
            );
        }
        if !(size.bin_step.is_finite() && size.bin_step > 0.0) {
            return fail("bin_step", format!("must be positive, got {}", size.bin_step));
        }
        Ok(())
    }
}

fn check_len(
    phase: PhaseId,
    field: &'static str,
    expected: usize,
    found: usize,
) -> Result<(), SynthesisError> {
    if expected != found {
        return Err(SynthesisError::ArrayLengthMismatch {
            phase,
            field,
            expected,
            found,
        });
    }
    Ok(())
}

// Row 0 must be usable; later rows may be zero and fall back to earlier ones
fn check_beta_table(
    phase: PhaseId,
    field: &'static str,
    table: &[[f64; 2]],
) -> Result<(), SynthesisError> {
    for (row, &[alpha, beta]) in table.iter().enumerate() {
        let empty = alpha == 0.0 || beta == 0.0;
        let usable = alpha.is_finite() && beta.is_finite() && alpha > 0.0 && beta > 0.0;
        if !(usable || (empty && row > 0 && alpha >= 0.0 && beta >= 0.0)) {
            return Err(SynthesisError::BadBetaCoefficients {
                phase,
                field,
                row,
                alpha,
                beta,
            });
        }
    }
    Ok(())
}

fn check_probability(
    phase: PhaseId,
    field: &'static str,
    values: &[f64],
    expected: usize,
    normalized: bool,
) -> Result<(), SynthesisError> {
    check_len(phase, field, expected, values.len())?;
    if let Some(index) = values.iter().position(|v| !(v.is_finite() && *v >= 0.0)) {
        return Err(SynthesisError::InvalidProbability {
            phase,
            field,
            index,
        });
    }
    if normalized {
        let sum: f64 = values.iter().sum();
        if (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
            return Err(SynthesisError::NotNormalized { phase, field, sum });
        }
    }
    Ok(())
}

/// Statistics of every phase; phase ids are 1-based positions in `phases`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsInput {
    pub phases: Vec<PhaseStats>,
}

impl StatsInput {
    pub fn phase(&self, id: PhaseId) -> Option<&PhaseStats> {
        id.checked_sub(1).and_then(|i| self.phases.get(i))
    }

    /// `(id, stats)` pairs of the phases with the given role
    pub fn phases_of_type(&self, kind: PhaseType) -> impl Iterator<Item = (PhaseId, &PhaseStats)> {
        self.phases
            .iter()
            .enumerate()
            .filter(move |(_, p)| p.phase_type == kind)
            .map(|(i, p)| (i + 1, p))
    }

    pub fn validate(&self) -> Result<(), SynthesisError> {
        for (i, phase) in self.phases.iter().enumerate() {
            phase.validate(i + 1)?;
        }
        let primary: f64 = self
            .phases_of_type(PhaseType::Primary)
            .map(|(_, p)| p.phase_fraction)
            .sum();
        if primary <= 0.0 {
            return Err(SynthesisError::NoPrimaryPhase);
        }
        Ok(())
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
