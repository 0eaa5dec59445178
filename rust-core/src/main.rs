use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use env_logger::Env;
use grain_synth::config::SynthesisConfig;
use grain_synth::io::{write_euler_listing, write_result_json, write_vtk_grain_ids};
use grain_synth::shapes::ShapeClass;
use grain_synth::stats::{PhaseStats, SizeDistribution, StatsInput};
use grain_synth::symmetries::CrystalClass;
use grain_synth::synthesis::{SynthesisResult, Synthesizer};
use grain_synth::Result;
use log::{info, warn};

#[derive(Parser)]
#[command(name = "grain-synth")]
#[command(about = "Synthesizes statistically representative polycrystalline microstructures")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Number of threads to use (default: all available cores)
    #[arg(short, long)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize a microstructure from a configuration and phase statistics
    Synthesize {
        /// Geometry and run configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Phase statistics (JSON)
        #[arg(short, long)]
        stats: PathBuf,

        /// Result file (JSON)
        #[arg(short, long, default_value = "microstructure.json")]
        output: PathBuf,

        /// Overrides the seed of the configuration
        #[arg(long)]
        seed: Option<u64>,

        /// Legacy VTK dump of grain ids
        #[arg(long)]
        vtk: Option<PathBuf>,

        /// Plain-text listing of grain Euler angles
        #[arg(long)]
        eulers: Option<PathBuf>,
    },
    /// Synthesize a single cubic phase with random texture
    Demo {
        /// Voxels per axis
        #[arg(short, long, default_value = "50")]
        size: usize,

        /// Voxel edge length
        #[arg(short, long, default_value = "0.1")]
        resolution: f64,

        #[arg(long, default_value = "0")]
        seed: u64,

        /// Result file (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Set thread pool size if specified
    if let Some(threads) = cli.threads {
        #[cfg(feature = "parallel")]
        {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()
                .map_err(|e| format!("Failed to set thread pool size: {}", e))?;
            info!("Using {} threads", threads);
        }
        #[cfg(not(feature = "parallel"))]
        {
            warn!("Thread count specified but parallel feature not enabled. Ignoring.");
        }
    }

    info!("Starting grain-synth v{}", grain_synth::VERSION);

    match cli.command {
        Commands::Synthesize {
            config,
            stats,
            output,
            seed,
            vtk,
            eulers,
        } => {
            info!("Synthesizing from {} and {}", config.display(), stats.display());
            let mut run_config = SynthesisConfig::from_json_file(&config)?;
            if let Some(seed) = seed {
                run_config.seed = seed;
            }
            let text = std::fs::read_to_string(&stats)
                .with_context(|| format!("reading statistics {}", stats.display()))?;
            let stats = StatsInput::from_json(&text)
                .with_context(|| format!("parsing statistics {}", stats.display()))?;
            let result = Synthesizer::new(run_config, stats)?.run();
            write_outputs(&result, &output, vtk.as_deref(), eulers.as_deref())
        }
        Commands::Demo {
            size,
            resolution,
            seed,
            output,
        } => {
            info!("Running demo on {}^3 voxels at resolution {}", size, resolution);
            let result = run_demo(size, resolution, seed)?;
            match output {
                Some(path) => write_outputs(&result, &path, None, None),
                None => {
                    report(&result);
                    Ok(())
                }
            }
        }
    }
}

// Single cubic phase of about 1 unit mean diameter with uniform ODF and MDF
fn run_demo(size: usize, resolution: f64, seed: u64) -> Result<SynthesisResult> {
    let sigma: f64 = 0.1;
    let distribution = SizeDistribution {
        mu: -0.5 * sigma * sigma,
        sigma,
        min_diameter: 0.6,
        max_diameter: 1.6,
        bin_step: 0.2,
    };
    let stats = StatsInput {
        phases: vec![PhaseStats::isotropic(CrystalClass::Cubic, distribution)],
    };
    let mut config = SynthesisConfig::new([size; 3], [resolution; 3], ShapeClass::Ellipsoid);
    config.seed = seed;
    Ok(Synthesizer::new(config, stats)?.run())
}

fn write_outputs(
    result: &SynthesisResult,
    output: &Path,
    vtk: Option<&Path>,
    eulers: Option<&Path>,
) -> Result<()> {
    write_result_json(result, output)?;
    if let Some(path) = vtk {
        write_vtk_grain_ids(&result.voxels, path)?;
    }
    if let Some(path) = eulers {
        write_euler_listing(&result.grains, path)?;
    }
    report(result);
    Ok(())
}

fn report(result: &SynthesisResult) {
    let unassigned = result.voxels.unassigned_count();
    if unassigned > 0 {
        warn!("{} voxels remain unassigned", unassigned);
    }
    println!("grains: {}", result.grains.len());
    println!(
        "packing: {} iterations, filling error {:.4}",
        result.packing.iterations, result.packing.errors.filling
    );
    for m in &result.matching {
        println!(
            "phase {}: odf error {:.6}, mdf error {:.6}",
            m.phase, m.final_odf_error, m.final_mdf_error
        );
    }
}
