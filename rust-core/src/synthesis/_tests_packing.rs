#[cfg(test)]
mod _tests_packing {
    use super::super::grain::GrainArena;
    use super::super::packing::*;
    use super::super::population::generate_primary_population;
    use crate::config::{SynthesisConfig, NEIGHBOR_SHELLS};
    use crate::interfaces::Boundary;
    use crate::shapes::ShapeClass;
    use crate::stats::{PhaseStats, SizeDistribution, StatsInput};
    use crate::symmetries::CrystalClass;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const TOL: f64 = 1e-9;

    fn stats() -> StatsInput {
        StatsInput {
            phases: vec![PhaseStats::isotropic(
                CrystalClass::Cubic,
                SizeDistribution {
                    mu: 1.5_f64.ln(),
                    sigma: 0.1,
                    min_diameter: 1.0,
                    max_diameter: 2.0,
                    bin_step: 0.25,
                },
            )],
        }
    }

    // 16^3 voxels of 0.25: a 4 x 4 x 4 sample on a 4^3 packing grid
    fn config() -> SynthesisConfig {
        let mut config = SynthesisConfig::new([16; 3], [0.25; 3], ShapeClass::Ellipsoid);
        config.packing_iterations = 400;
        config.placement_trials = 4;
        config
    }

    fn population(stats: &StatsInput, config: &SynthesisConfig, rng: &mut ChaCha8Rng) -> GrainArena {
        GrainArena::from_grains(generate_primary_population(
            stats,
            config.total_volume(),
            config.shape_class,
            rng,
        ))
    }

    // Shell counts recomputed from scratch over the active grains
    fn brute_force_histograms(arena: &GrainArena) -> Vec<[i64; NEIGHBOR_SHELLS]> {
        arena
            .iter()
            .map(|(id, g)| {
                let mut shells = [0; NEIGHBOR_SHELLS];
                if !g.active {
                    return shells;
                }
                let r = g.equivalent_diameter * 0.5;
                for (other, h) in arena.iter() {
                    if other == id || !h.active {
                        continue;
                    }
                    let d = (h.centroid - g.centroid).norm();
                    for (k, s) in shells.iter_mut().enumerate() {
                        if d < (k + 1) as f64 * r {
                            *s += 1;
                        }
                    }
                }
                shells
            })
            .collect()
    }

    #[test]
    fn test_packing_grid_incremental_error() {
        let mut grid = PackingGrid::new([4.0; 3], [0.25; 3], Boundary::Bounded);
        assert_eq!(grid.geometry().dims, [4, 4, 4]);
        let n = 64.0;
        assert_relative_eq!(grid.filling_error(), 1.0);
        assert_relative_eq!(grid.recompute_filling_error(), 1.0);

        assert_relative_eq!(grid.error_after_adding(&[0, 1]), 1.0 - 2.0 / n, epsilon = TOL);
        grid.add(&[0, 1]);
        assert_relative_eq!(grid.filling_error(), 1.0 - 2.0 / n, epsilon = TOL);
        grid.add(&[1]);
        assert_relative_eq!(grid.filling_error(), 1.0 - 1.0 / n, epsilon = TOL);
        assert_relative_eq!(grid.filling_error(), grid.recompute_filling_error(), epsilon = TOL);
        assert_eq!(grid.owners()[1], 2);

        grid.remove(&[1]);
        assert_relative_eq!(grid.filling_error(), 1.0 - 2.0 / n, epsilon = TOL);
        assert_relative_eq!(grid.filling_error(), grid.recompute_filling_error(), epsilon = TOL);
    }

    #[test]
    fn test_trial_error_leaves_grid_untouched() {
        let mut grid = PackingGrid::new([4.0; 3], [0.25; 3], Boundary::Bounded);
        grid.add(&[3, 4, 5]);
        let before = grid.clone();
        let trial = grid.trial_filling_error(&[5, 6], &[3, 4]);
        assert_eq!(grid.owners(), before.owners());
        assert_eq!(grid.filling_error(), before.filling_error());

        grid.add(&[5, 6]);
        grid.remove(&[3, 4]);
        assert_relative_eq!(trial, grid.filling_error(), epsilon = TOL);
        assert_relative_eq!(trial, grid.recompute_filling_error(), epsilon = TOL);
    }

    #[test]
    fn test_place_initial_activates_every_grain() {
        let (stats, config) = (stats(), config());
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let mut arena = population(&stats, &config, &mut rng);
        let mut optimizer = PackingOptimizer::new(&stats, &config);
        optimizer.place_initial(&mut arena, &mut rng);

        assert!(arena.iter().all(|(_, g)| g.active));
        let covered: usize = arena.iter().map(|(_, g)| g.packing_cells.len()).sum();
        let owned: i32 = optimizer.grid().owners().iter().sum();
        assert_eq!(covered as i32, owned);
        assert_relative_eq!(
            optimizer.grid().filling_error(),
            optimizer.grid().recompute_filling_error(),
            epsilon = TOL
        );
        assert_relative_eq!(optimizer.errors().filling, optimizer.grid().filling_error());

        let expected = brute_force_histograms(&arena);
        for ((_, g), shells) in arena.iter().zip(expected) {
            assert_eq!(g.neighbor_histogram, shells);
        }
    }

    #[test]
    fn test_filling_error_never_rises_on_accepted_moves() {
        // default weights: size and neighbourhood gains must not buy a worse filling
        let (stats, config) = (stats(), config());
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let mut arena = population(&stats, &config, &mut rng);
        let mut optimizer = PackingOptimizer::new(&stats, &config);
        optimizer.place_initial(&mut arena, &mut rng);
        let report = optimizer.optimize(&mut arena, &mut rng);

        assert_eq!(report.iterations, 400);
        for pair in report.filling_history.windows(2) {
            assert!(pair[1] <= pair[0], "{} after {}", pair[1], pair[0]);
        }
        assert!(report.errors.filling <= report.filling_history[0]);
        let accepted: usize = report.accepted.iter().sum();
        assert_eq!(report.filling_history.len(), accepted + 1);
        assert_relative_eq!(
            optimizer.grid().filling_error(),
            optimizer.grid().recompute_filling_error(),
            epsilon = 1e-6
        );
        assert_eq!(report.active_grains, arena.active_ids().len());
    }

    #[test]
    fn test_nudges_keep_grid_and_shells_in_step() {
        let (stats, config) = (stats(), config());
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut arena = population(&stats, &config, &mut rng);
        let mut optimizer = PackingOptimizer::new(&stats, &config);
        optimizer.place_initial(&mut arena, &mut rng);

        let size = config.sample_size();
        let ids: Vec<usize> = arena.ids().collect();
        for k in 0..60 {
            let id = ids[k % ids.len()];
            let before = optimizer.errors().filling;
            let old = arena.get(id).unwrap().centroid;
            if optimizer.nudge(&mut arena, id, &mut rng) {
                assert!(optimizer.errors().filling <= before);
            } else {
                assert_eq!(arena.get(id).unwrap().centroid, old);
            }
            let c = arena.get(id).unwrap().centroid;
            assert!((0..3).all(|a| c[a] > 0.0 && c[a] < size[a]));
        }

        let expected = brute_force_histograms(&arena);
        for ((id, g), shells) in arena.iter().zip(expected) {
            assert_eq!(g.neighbor_histogram, shells, "grain {}", id);
            let cells = optimizer.grid().geometry().rasterize(&g.shape(), &g.centroid);
            assert_eq!(g.packing_cells, cells, "grain {}", id);
        }
        let mut owners = vec![0; optimizer.grid().owners().len()];
        for (_, g) in arena.iter() {
            for &c in &g.packing_cells {
                owners[c] += 1;
            }
        }
        assert_eq!(owners, optimizer.grid().owners());
        assert_relative_eq!(
            optimizer.grid().filling_error(),
            optimizer.grid().recompute_filling_error(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_rejected_moves_restore_topology() {
        let (stats, config) = (stats(), config());
        let mut rng = ChaCha8Rng::seed_from_u64(33);
        let mut arena = population(&stats, &config, &mut rng);
        let mut optimizer = PackingOptimizer::new(&stats, &config);
        optimizer.place_initial(&mut arena, &mut rng);
        optimizer.optimize(&mut arena, &mut rng);

        let expected = brute_force_histograms(&arena);
        for ((id, g), shells) in arena.iter().zip(expected) {
            assert_eq!(g.neighbor_histogram, shells, "grain {}", id);
        }
        // grid occupancy matches the cells of the active grains
        let mut owners = vec![0; optimizer.grid().owners().len()];
        for (_, g) in arena.iter().filter(|(_, g)| g.active) {
            for &c in &g.packing_cells {
                owners[c] += 1;
            }
        }
        assert_eq!(owners, optimizer.grid().owners());
        let errors = optimizer.current_errors(&arena);
        assert_relative_eq!(errors.size, optimizer.errors().size, epsilon = 1e-9);
        assert_relative_eq!(errors.neighborhood, optimizer.errors().neighborhood, epsilon = 1e-9);
    }

    #[test]
    fn test_periodic_packing_has_no_surface_grains() {
        let stats = stats();
        let mut config = config();
        config.boundary = Boundary::Periodic;
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut arena = population(&stats, &config, &mut rng);
        let mut optimizer = PackingOptimizer::new(&stats, &config);
        optimizer.place_initial(&mut arena, &mut rng);
        assert!(arena.iter().all(|(_, g)| !g.surface));
    }

    #[test]
    fn test_update_neighbor_histograms_is_reversible() {
        let (stats, config) = (stats(), config());
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut arena = population(&stats, &config, &mut rng);
        let mut optimizer = PackingOptimizer::new(&stats, &config);
        optimizer.place_initial(&mut arena, &mut rng);
        let before = arena.clone();

        update_neighbor_histograms(&mut arena, 1, -1);
        update_neighbor_histograms(&mut arena, 1, 1);
        assert_eq!(arena, before);
    }
}
