//! Target statistics of each phase and the distribution helpers built on them

// ======================== MODULE DECLARATIONS ========================
pub mod distributions;
pub mod phase_stats;


// ======================== PHASE STATISTICS ========================
pub use phase_stats::{
    PhaseStats,       // struct - size, shape, neighbour and texture targets of one phase
    SizeDistribution, // struct - truncated log-normal diameter parameters
    StatsInput,       // struct - all phases; ids are 1-based
};

// ======================== DISTRIBUTIONS ========================
pub use distributions::{
    SizeHistogram,                // struct - 40-bin diameter histogram on [min/2, 2 max]
    beta_acceptance_probability,  // fn(alpha, beta, x) -> f64 - Beta density
    cumulative_pick,              // fn(weights, u) -> Option<usize> - inverse-CDF scan
    normalized_ssd,               // fn(sim, target) -> f64 - sum (a-b)^2 / sum b^2
    sample_beta,                  // fn(alpha, beta, rng) -> Option<f64>
    sample_diameter,              // fn(&SizeDistribution, rng) -> f64 - rejection on [min, max)
    target_neighbor_distribution, // fn(params) -> Vec<[f64; 3]>
    target_size_distribution,     // fn(&SizeDistribution) -> SizeHistogram
};
