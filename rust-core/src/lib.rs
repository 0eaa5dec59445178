//! Polycrystalline microstructure synthesis library
//!
//! This library generates statistically representative 3-D grain structures from target
//! size, shape, neighbourhood, orientation (ODF) and misorientation (MDF) statistics, and
//! provides the crystallographic symmetry engine the synthesizer is built on.

pub mod config;
pub mod error;
pub mod interfaces;
pub mod io;
pub mod orientation;
pub mod shapes;
pub mod stats;
pub mod symmetries;
pub mod synthesis;

pub use error::SynthesisError;

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
