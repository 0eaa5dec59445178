#[cfg(test)]
mod _tests_synthesizer {
    use super::super::synthesizer::*;
    use crate::config::SynthesisConfig;
    use crate::error::SynthesisError;
    use crate::interfaces::PhaseType;
    use crate::shapes::ShapeClass;
    use crate::stats::{PhaseStats, SizeDistribution, StatsInput};
    use crate::symmetries::CrystalClass;
    use approx::assert_relative_eq;

    const TOL: f64 = 1e-9;

    fn size(d: f64) -> SizeDistribution {
        SizeDistribution {
            mu: d.ln(),
            sigma: 0.1,
            min_diameter: 0.75 * d,
            max_diameter: 1.5 * d,
            bin_step: 0.25 * d,
        }
    }

    fn stats() -> StatsInput {
        StatsInput {
            phases: vec![PhaseStats::isotropic(CrystalClass::Cubic, size(1.0))],
        }
    }

    fn config(seed: u64) -> SynthesisConfig {
        let mut config = SynthesisConfig::new([16; 3], [0.25; 3], ShapeClass::Ellipsoid);
        config.packing_iterations = 300;
        config.placement_trials = 3;
        config.matching_iterations = 1_000;
        config.matching_bad_tries = 500;
        config.seed = seed;
        config
    }

    fn run(config: SynthesisConfig, stats: StatsInput) -> SynthesisResult {
        match Synthesizer::new(config, stats) {
            Ok(mut s) => s.run(),
            Err(e) => panic!("valid input rejected: {}", e),
        }
    }

    fn check_voxels_match_grains(result: &SynthesisResult) {
        let voxels = &result.voxels;
        assert_eq!(voxels.len(), 16 * 16 * 16);
        assert_eq!(voxels.unassigned_count(), 0);
        for (i, record) in result.grains.iter().enumerate() {
            assert_eq!(record.id, i + 1);
            let held = voxels.grain_ids.iter().filter(|&&g| g == record.id as i32).count();
            assert_eq!(record.num_voxels, held, "grain {}", record.id);
            assert!(held > 0);
            assert_eq!(record.neighbors.len(), record.shared_areas.len());
        }
        for (&owner, &phase) in voxels.grain_ids.iter().zip(&voxels.phases) {
            assert_eq!(result.grains[owner as usize - 1].phase, phase);
        }
    }

    #[test]
    fn test_run_assigns_every_voxel() {
        let result = run(config(5), stats());
        check_voxels_match_grains(&result);
        assert!(result.grains.iter().any(|g| g.surface));
        assert_eq!(result.packing.iterations, 300);
        assert_eq!(result.precipitates_placed, 0);
        assert!(result.matching.len() <= 1);

        // adjacency is symmetric with equal shared areas
        for g in &result.grains {
            for (&other, &area) in g.neighbors.iter().zip(&g.shared_areas) {
                let back = &result.grains[other - 1];
                let slot = back.neighbors.iter().position(|&n| n == g.id).unwrap();
                assert_relative_eq!(back.shared_areas[slot], area, epsilon = TOL);
            }
        }

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("grain_ids"));
    }

    #[test]
    fn test_same_seed_same_result() {
        let a = run(config(9), stats());
        let b = run(config(9), stats());
        assert_eq!(a, b);
    }

    #[test]
    fn test_precipitates_join_the_structure() {
        let mut primary = PhaseStats::isotropic(CrystalClass::Cubic, size(1.5));
        primary.phase_fraction = 0.9;
        let mut ppt = PhaseStats::isotropic(CrystalClass::Hexagonal, size(0.75));
        ppt.phase_type = PhaseType::Precipitate;
        ppt.phase_fraction = 0.1;
        let stats = StatsInput {
            phases: vec![primary, ppt],
        };

        let result = run(config(12), stats);
        check_voxels_match_grains(&result);
        assert!(result.precipitates_placed > 0);
        assert!(result.grains.iter().any(|g| g.phase == 2));
        assert!(result.voxels.phases.iter().any(|&p| p == 2));
    }

    #[test]
    fn test_invalid_input_is_rejected() {
        let mut bad = config(0);
        bad.dimensions = [16, 0, 16];
        assert!(matches!(
            Synthesizer::new(bad, stats()),
            Err(SynthesisError::InvalidGeometry { field: "dimensions", .. })
        ));

        let mut bad = config(0);
        bad.resolution = [0.25, -1.0, 0.25];
        assert!(Synthesizer::new(bad, stats()).is_err());

        let mut stats = stats();
        stats.phases[0].odf[0] += 0.5;
        assert!(matches!(
            Synthesizer::new(config(0), stats),
            Err(SynthesisError::NotNormalized { field: "odf", .. })
        ));
    }

    #[test]
    fn test_records_carry_grain_state() {
        let mut synth = match Synthesizer::new(config(3), stats()) {
            Ok(s) => s,
            Err(e) => panic!("valid input rejected: {}", e),
        };
        let mut arena = synth.generate_primary();
        synth.pack(&mut arena);
        let (structure, placed) = synth.voxelize(arena);
        assert_eq!(placed, 0);
        let (_, grain) = structure.arena.iter().next().unwrap();
        let record = GrainRecord::new(1, grain);
        assert_eq!(record.phase, grain.phase);
        assert_eq!(record.num_voxels, grain.num_voxels);
        assert_eq!(record.neighbors, grain.neighbors);
        assert_relative_eq!(record.equivalent_diameter, grain.equivalent_diameter);
    }

    #[test]
    fn test_fifty_cubed_sample_of_unit_grains() {
        // log-normal with mean diameter exp(mu + sigma^2 / 2) = 1
        let stats = StatsInput {
            phases: vec![PhaseStats::isotropic(
                CrystalClass::Cubic,
                SizeDistribution {
                    mu: -0.005,
                    sigma: 0.1,
                    min_diameter: 0.6,
                    max_diameter: 1.6,
                    bin_step: 0.2,
                },
            )],
        };
        let mut config = SynthesisConfig::new([50; 3], [0.1; 3], ShapeClass::Ellipsoid);
        config.packing_iterations = 1_500;
        config.placement_trials = 3;
        config.boundary_iterations = 500;
        config.matching_iterations = 2_000;
        config.matching_bad_tries = 1_000;
        config.seed = 7;
        let mut synth = match Synthesizer::new(config, stats) {
            Ok(s) => s,
            Err(e) => panic!("valid input rejected: {}", e),
        };

        let mut arena = synth.generate_primary();
        let total: f64 = arena.iter().map(|(_, g)| g.volume).sum();
        let last = arena.get(arena.len()).unwrap().volume;
        assert!(total >= 125.0 - TOL && total - last < 125.0, "population volume {}", total);
        // roughly 125 / (pi / 6) unit grains
        assert!(arena.len() > 150 && arena.len() < 350, "{} grains", arena.len());

        let packing = synth.pack(&mut arena);
        assert_eq!(packing.iterations, 1_500);
        let history = &packing.filling_history;
        assert!(history.windows(2).all(|w| w[1] <= w[0]));
        assert!(packing.errors.filling < history[0]);

        let (mut structure, placed) = synth.voxelize(arena);
        assert_eq!(placed, 0);
        assert_eq!(structure.voxels.len(), 125_000);
        assert_eq!(structure.voxels.unassigned_count(), 0);
        let held: usize = structure.arena.iter().map(|(_, g)| g.num_voxels).sum();
        assert_eq!(held, 125_000);
        assert!(structure.arena.iter().any(|(_, g)| !g.surface));

        let (textures, reports) = synth.match_textures(&mut structure);
        assert_eq!(reports.len(), 1);
        let texture = &textures[&1];
        assert_relative_eq!(texture.sim_odf.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
        assert!(reports[0].final_odf_error.is_finite() && reports[0].final_mdf_error.is_finite());
    }
}
