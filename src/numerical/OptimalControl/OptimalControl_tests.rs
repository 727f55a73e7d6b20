#[cfg(test)]
mod tests {
    use crate::numerical::Collocation::Coll_traits::TranscriptionScheme;
    use crate::numerical::Collocation::HermiteSimpson_main::HermiteSimpsonTranscription;
    use crate::numerical::Collocation::Radau_main::RadauTranscription;
    use crate::numerical::OptimalControl::decision_vector::DecisionVector;
    use crate::numerical::OptimalControl::guess_generator::read_guess_file;
    use crate::numerical::OptimalControl::guess_generator::InitialGuessMode;
    use crate::numerical::OptimalControl::path_function_manager::UserPathFunctionManager;
    use crate::numerical::OptimalControl::phase::Phase;
    use crate::numerical::OptimalControl::problem_characteristics::ProblemCharacteristics;
    use crate::numerical::OptimalControl::user_functions::{
        BoundData, FunctionInputData, JacobianType, PathFunctionContainer, UserPathFunction,
    };
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use nalgebra::{DMatrix, DVector};
    use std::io::Write;

    // ------------------------------------------------------------------
    // decision vector
    // ------------------------------------------------------------------

    #[test]
    fn betts_layout_indices_match_reference_problem() {
        // 3 states, 2 controls, 6 state mesh points, 5 control mesh points
        let mut dec_vector = DecisionVector::new();
        dec_vector.initialize(3, 2, 0, 0, 6, 5, 0, 0);
        assert_eq!(dec_vector.num_decision_params(), 30);
        assert_eq!(dec_vector.num_state_points(), 6);
        assert_eq!(dec_vector.num_control_points(), 5);
        assert!(!dec_vector.has_control_at_final_mesh());
        assert_eq!(dec_vector.time_idxs(), vec![0, 1]);
        assert_eq!(dec_vector.state_idxs_at_mesh_point(0, 0), vec![2, 3, 4]);
        assert_eq!(dec_vector.control_idxs_at_mesh_point(0, 0), vec![5, 6]);
        assert_eq!(dec_vector.state_idxs_at_mesh_point(1, 0), vec![7, 8, 9]);
        assert_eq!(dec_vector.state_idxs_at_mesh_point(5, 0), vec![27, 28, 29]);
        assert!(dec_vector.static_idxs().is_empty());
    }

    #[test]
    fn decision_vector_round_trips() {
        let mut dec_vector = DecisionVector::new();
        dec_vector.initialize(2, 1, 0, 1, 4, 3, 0, 0);
        let n = dec_vector.num_decision_params();
        let values = DVector::from_iterator(n, (0..n).map(|i| i as f64 * 0.5 - 1.0));
        dec_vector.set_decision_vector(&values);
        assert_eq!(dec_vector.decision_vector(), &values);

        // bulk array round trips agree with the flat layout
        let state_array = dec_vector.state_array();
        let control_array = dec_vector.control_array();
        dec_vector.set_state_array(&state_array);
        dec_vector.set_control_array(&control_array);
        assert_eq!(dec_vector.decision_vector(), &values);
    }

    #[test]
    #[should_panic(expected = "does not match the initialized length")]
    fn wrong_length_decision_vector_is_fatal() {
        let mut dec_vector = DecisionVector::new();
        dec_vector.initialize(2, 1, 0, 0, 4, 3, 0, 0);
        dec_vector.set_decision_vector(&DVector::zeros(3));
    }

    #[test]
    #[should_panic(expected = "was expected")]
    fn wrong_shape_state_array_is_fatal() {
        let mut dec_vector = DecisionVector::new();
        dec_vector.initialize(2, 1, 0, 0, 4, 3, 0, 0);
        dec_vector.set_state_array(&DMatrix::zeros(3, 2));
    }

    // ------------------------------------------------------------------
    // problem characteristics validation
    // ------------------------------------------------------------------

    #[test]
    #[should_panic(expected = "strictly increasing")]
    fn non_monotonic_mesh_fractions_are_rejected() {
        let mut config = ProblemCharacteristics::new();
        config.set_mesh_interval_fractions(&DVector::from_vec(vec![-1.0, 0.5, 0.2, 1.0]));
        config.set_mesh_interval_num_points(&[4, 4, 4]);
        config.validate_mesh_config();
    }

    #[test]
    #[should_panic(expected = "one less than the length")]
    fn mesh_length_mismatch_is_rejected() {
        let mut config = ProblemCharacteristics::new();
        config.set_mesh_interval_fractions(&DVector::from_vec(vec![-1.0, 1.0]));
        config.set_mesh_interval_num_points(&[4, 4]);
        config.validate_mesh_config();
    }

    #[test]
    fn problem_characteristics_clone_is_independent() {
        let mut config = ProblemCharacteristics::new();
        config.set_num_state_vars(2);
        config.set_mesh_interval_fractions(&DVector::from_vec(vec![-1.0, 1.0]));
        config.set_mesh_interval_num_points(&[4]);
        let mut copy = config.clone();
        copy.set_num_state_vars(5);
        copy.set_mesh_interval_fractions(&DVector::from_vec(vec![-1.0, 0.0, 1.0]));
        copy.set_mesh_interval_num_points(&[4, 4]);
        assert_eq!(config.num_state_vars(), 2);
        assert_eq!(config.mesh_interval_fractions().len(), 2);
        assert_eq!(config.mesh_interval_num_points(), &[4][..]);
    }

    #[test]
    #[should_panic(expected = "less than state upper bound")]
    fn reversed_state_bounds_are_rejected() {
        let mut config = ProblemCharacteristics::new();
        config.set_num_state_vars(1);
        config.set_state_lower_bound(&DVector::from_vec(vec![5.0]));
        config.set_state_upper_bound(&DVector::from_vec(vec![-5.0]));
        config.validate_state_properties();
    }

    // ------------------------------------------------------------------
    // user path function manager: finite differencing + sparsity probing
    // ------------------------------------------------------------------

    #[derive(Clone)]
    struct BilinearPathFunction;

    impl UserPathFunction for BilinearPathFunction {
        fn evaluate_functions(
            &mut self,
            inputs: &FunctionInputData,
            outputs: &mut PathFunctionContainer,
        ) {
            let x = inputs.state_vector()[0];
            let u = inputs.control_vector()[0];
            outputs.set_dyn_functions(&DVector::from_vec(vec![x * u]));
        }
    }

    fn bilinear_manager() -> (UserPathFunctionManager, FunctionInputData, PathFunctionContainer) {
        let mut input = FunctionInputData::new();
        input.initialize(1, 1, 0);
        input.set_state_vector(&DVector::from_vec(vec![2.0]));
        input.set_control_vector(&DVector::from_vec(vec![3.0]));
        input.set_time(0.5);
        let mut container = PathFunctionContainer::new();
        let bounds = BoundData {
            state_lower: DVector::from_vec(vec![-5.0]),
            state_upper: DVector::from_vec(vec![5.0]),
            control_lower: DVector::from_vec(vec![-4.0]),
            control_upper: DVector::from_vec(vec![4.0]),
            static_lower: DVector::zeros(0),
            static_upper: DVector::zeros(0),
            time_lower: 0.0,
            time_upper: 1.0,
        };
        let mut manager = UserPathFunctionManager::new();
        manager.initialize(Box::new(BilinearPathFunction), &mut input, &mut container, &bounds);
        (manager, input, container)
    }

    #[test]
    fn finite_differenced_jacobians_are_accurate() {
        let (_, _, container) = bilinear_manager();
        // f = x*u at (2, 3): df/dx = 3, df/du = 2
        let state_jac = container.dyn_data().jacobian(JacobianType::State);
        let control_jac = container.dyn_data().jacobian(JacobianType::Control);
        let time_jac = container.dyn_data().jacobian(JacobianType::Time);
        assert_relative_eq!(state_jac[(0, 0)], 3.0, max_relative = 1.0e-5);
        assert_relative_eq!(control_jac[(0, 0)], 2.0, max_relative = 1.0e-5);
        assert_abs_diff_eq!(time_jac[(0, 0)], 0.0, epsilon = 1.0e-10);
    }

    #[test]
    fn probed_sparsity_pattern_finds_dependencies() {
        let (manager, _, _) = bilinear_manager();
        let props = manager.dyn_function_properties();
        assert_eq!(props.num_functions(), 1);
        assert_eq!(props.jacobian_pattern(JacobianType::State)[(0, 0)], 1.0);
        assert_eq!(props.jacobian_pattern(JacobianType::Control)[(0, 0)], 1.0);
        assert_eq!(props.jacobian_pattern(JacobianType::Time)[(0, 0)], 0.0);
        assert!(manager.has_dyn_functions());
        assert!(!manager.has_cost_function());
        assert!(!manager.has_alg_functions());
    }

    // ------------------------------------------------------------------
    // phase, end to end: free particle on a Radau mesh
    // ------------------------------------------------------------------

    #[derive(Clone)]
    struct FreeParticlePathFunction;

    impl UserPathFunction for FreeParticlePathFunction {
        fn evaluate_functions(
            &mut self,
            inputs: &FunctionInputData,
            outputs: &mut PathFunctionContainer,
        ) {
            let state = inputs.state_vector();
            // x' = v, v' = 0
            outputs.set_dyn_functions(&DVector::from_vec(vec![state[1], 0.0]));
            // integrand x
            outputs.set_cost_function(&DVector::from_vec(vec![state[0]]));
        }
    }

    fn free_particle_phase(trans: TranscriptionScheme, fractions: Vec<f64>) -> Phase {
        let mut phase = Phase::new(trans);
        phase.set_num_state_vars(2);
        phase.set_num_control_vars(0);
        phase.set_mesh_interval_fractions(&DVector::from_vec(fractions));
        phase.set_mesh_interval_num_points(&[4]);
        phase.set_state_lower_bound(&DVector::from_vec(vec![-10.0, -10.0]));
        phase.set_state_upper_bound(&DVector::from_vec(vec![10.0, 10.0]));
        phase.set_time_lower_bound(0.0);
        phase.set_time_upper_bound(2.0);
        phase.set_time_initial_guess(0.0);
        phase.set_time_final_guess(2.0);
        // x runs linearly 0 -> 2 while v stays 1: exactly the free particle
        phase.set_state_initial_guess(&DVector::from_vec(vec![0.0, 1.0]));
        phase.set_state_final_guess(&DVector::from_vec(vec![2.0, 1.0]));
        phase.set_initial_guess_mode(InitialGuessMode::LinearNoControl);
        phase.set_path_function(Box::new(FreeParticlePathFunction));
        phase
    }

    #[test]
    fn radau_free_particle_defects_vanish_and_cost_is_exact() {
        let mut phase = free_particle_phase(
            TranscriptionScheme::Radau(RadauTranscription::new(3, 10)),
            vec![-1.0, 1.0],
        );
        phase.initialize().unwrap();
        phase.prepare_to_optimize();

        let constraints = phase.get_constraint_vector();
        assert_eq!(constraints.len(), phase.get_num_total_con_nlp());
        for idx in 0..constraints.len() {
            assert_abs_diff_eq!(constraints[idx], 0.0, epsilon = 1.0e-9);
        }

        // integral of x = t over [0, 2] is 2
        assert_abs_diff_eq!(phase.get_cost_function(), 2.0, epsilon = 1.0e-9);
    }

    #[test]
    fn hermite_simpson_free_particle_defects_vanish_and_cost_is_exact() {
        let mut phase = free_particle_phase(
            TranscriptionScheme::HermiteSimpson(HermiteSimpsonTranscription::new()),
            vec![0.0, 1.0],
        );
        phase.initialize().unwrap();
        phase.prepare_to_optimize();

        let constraints = phase.get_constraint_vector();
        for idx in 0..constraints.len() {
            assert_abs_diff_eq!(constraints[idx], 0.0, epsilon = 1.0e-9);
        }
        assert_abs_diff_eq!(phase.get_cost_function(), 2.0, epsilon = 1.0e-9);
    }

    #[test]
    fn decision_vector_round_trips_through_phase() {
        let mut phase = free_particle_phase(
            TranscriptionScheme::Radau(RadauTranscription::new(3, 10)),
            vec![-1.0, 1.0],
        );
        phase.initialize().unwrap();
        phase.prepare_to_optimize();

        let dec_vec = phase.get_dec_vector();
        phase.set_decision_vector(&dec_vec);
        assert_eq!(phase.get_dec_vector(), dec_vec);

        let mut perturbed = dec_vec.clone();
        perturbed[3] += 0.25;
        phase.set_decision_vector(&perturbed);
        assert_eq!(phase.get_dec_vector(), perturbed);
        // perturbing the state guess breaks the exact trajectory
        let constraints = phase.get_constraint_vector();
        assert!(constraints.iter().any(|c| c.abs() > 1.0e-6));
    }

    #[test]
    fn sparsity_pattern_is_superset_of_jacobian() {
        let mut phase = free_particle_phase(
            TranscriptionScheme::Radau(RadauTranscription::new(3, 10)),
            vec![-1.0, 1.0],
        );
        phase.initialize().unwrap();
        phase.prepare_to_optimize();

        let con_jacobian = phase.get_con_jacobian();
        let con_pattern = phase.get_con_sparsity_pattern();
        for (value, (row, col)) in con_jacobian.iter() {
            if *value != 0.0 {
                assert!(
                    con_pattern.get(row, col).is_some(),
                    "constraint jacobian nonzero at ({}, {}) missing from pattern",
                    row,
                    col
                );
            }
        }

        let cost_jacobian = phase.get_cost_jacobian();
        let cost_pattern = phase.get_cost_sparsity_pattern();
        for (value, (row, col)) in cost_jacobian.iter() {
            if *value != 0.0 {
                assert!(cost_pattern.get(row, col).is_some());
            }
        }
    }

    #[test]
    fn mesh_refinement_is_idempotent_on_converged_solution() {
        let mut phase = free_particle_phase(
            TranscriptionScheme::Radau(RadauTranscription::new(3, 10)),
            vec![-1.0, 1.0],
        );
        phase.initialize().unwrap();
        phase.prepare_to_optimize();
        phase.get_constraint_vector();

        let fractions_before = phase.mesh_interval_fractions().clone();
        let num_points_before = phase.mesh_interval_num_points().to_vec();

        let refined_first = phase.refine_mesh(true);
        assert!(!refined_first);
        assert_eq!(phase.mesh_interval_fractions(), &fractions_before);
        assert_eq!(phase.mesh_interval_num_points(), &num_points_before[..]);

        let refined_second = phase.refine_mesh(true);
        assert!(!refined_second);
        assert_eq!(phase.mesh_interval_fractions(), &fractions_before);
        assert_eq!(phase.mesh_interval_num_points(), &num_points_before[..]);
    }

    #[test]
    fn phase_clone_is_a_deep_independent_copy() {
        let mut phase = free_particle_phase(
            TranscriptionScheme::Radau(RadauTranscription::new(3, 10)),
            vec![-1.0, 1.0],
        );
        phase.initialize().unwrap();
        phase.prepare_to_optimize();

        let mut copy = phase.clone();
        copy.set_mesh_interval_num_points(&[7]);
        copy.set_state_upper_bound(&DVector::from_vec(vec![99.0, 99.0]));
        let mut perturbed = copy.get_dec_vector();
        perturbed[2] = 42.0;
        copy.set_decision_vector(&perturbed);

        assert_eq!(phase.mesh_interval_num_points(), &[4][..]);
        assert_relative_eq!(phase.config().state_upper_bound()[0], 10.0);
        assert!((phase.get_dec_vector()[2] - 42.0).abs() > 1.0);
    }

    #[test]
    fn constraint_vector_names_label_defect_rows() {
        let mut phase = free_particle_phase(
            TranscriptionScheme::Radau(RadauTranscription::new(3, 10)),
            vec![-1.0, 1.0],
        );
        phase.initialize().unwrap();
        let names = phase.get_constraint_vector_names();
        assert_eq!(names.len(), phase.get_num_total_con_nlp());
        assert!(names[0].contains("Mesh Index 0"));
        assert!(names[0].contains("State Variable 1"));
    }

    // ------------------------------------------------------------------
    // scaling round trips through a live phase
    // ------------------------------------------------------------------

    #[test]
    fn scaling_round_trips_to_machine_tolerance() {
        let mut phase = free_particle_phase(
            TranscriptionScheme::Radau(RadauTranscription::new(3, 10)),
            vec![-1.0, 1.0],
        );
        phase.initialize().unwrap();
        phase.prepare_to_optimize();
        phase.initialize_scale_utility();

        let con_jacobian = phase.get_con_jacobian();
        phase
            .scale_utility_mut()
            .set_constraint_scaling_jacobian(&con_jacobian);
        phase.scale_utility_mut().set_cost_scaling_user_defined(0.25);
        assert!(phase.scale_utility().is_initialized());

        let dec_vec = phase.get_dec_vector();
        let mut scaled_dec = dec_vec.clone();
        phase.scale_utility().scale_decision_vector(&mut scaled_dec);
        phase.scale_utility().unscale_decision_vector(&mut scaled_dec);
        for idx in 0..dec_vec.len() {
            assert_abs_diff_eq!(scaled_dec[idx], dec_vec[idx], epsilon = 1.0e-10);
        }

        let mut constraints = phase.get_constraint_vector();
        constraints[0] = 0.75; // make the round trip observable
        let reference = constraints.clone();
        phase.scale_utility().scale_constraint_vector(&mut constraints);
        phase.scale_utility().unscale_constraint_vector(&mut constraints);
        for idx in 0..reference.len() {
            assert_abs_diff_eq!(constraints[idx], reference[idx], epsilon = 1.0e-10);
        }

        let cost = 3.2;
        let round_tripped = phase
            .scale_utility()
            .unscale_cost_function(phase.scale_utility().scale_cost_function(cost));
        assert_abs_diff_eq!(round_tripped, cost, epsilon = 1.0e-12);

        let mut jacobian = phase.get_con_jacobian();
        let jacobian_reference = crate::somelinalg::sparse_utils::to_dense(&jacobian);
        phase.scale_utility().scale_jacobian(&mut jacobian);
        phase.scale_utility().unscale_jacobian(&mut jacobian);
        let jacobian_dense = crate::somelinalg::sparse_utils::to_dense(&jacobian);
        for row in 0..jacobian_dense.nrows() {
            for col in 0..jacobian_dense.ncols() {
                assert_abs_diff_eq!(
                    jacobian_dense[(row, col)],
                    jacobian_reference[(row, col)],
                    epsilon = 1.0e-10
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // guess generation
    // ------------------------------------------------------------------

    #[test]
    fn linear_guess_matches_hand_interpolation() {
        let mut phase = free_particle_phase(
            TranscriptionScheme::Radau(RadauTranscription::new(3, 10)),
            vec![-1.0, 1.0],
        );
        phase.initialize().unwrap();
        let state_array = phase.get_state_array();
        let times = phase.get_time_vector();
        for row in 0..state_array.nrows() {
            let fraction = times[row] / 2.0;
            assert_abs_diff_eq!(state_array[(row, 0)], 2.0 * fraction, epsilon = 1.0e-12);
            assert_abs_diff_eq!(state_array[(row, 1)], 1.0, epsilon = 1.0e-12);
        }
    }

    #[test]
    fn guess_arrays_are_interpolated_onto_the_mesh() {
        let mut phase = free_particle_phase(
            TranscriptionScheme::Radau(RadauTranscription::new(3, 10)),
            vec![-1.0, 1.0],
        );
        phase.set_initial_guess_mode(InitialGuessMode::GuessArrays);
        // samples of the same trajectory on a coarse grid
        let times = DVector::from_vec(vec![0.0, 1.0, 2.0]);
        let states = DMatrix::from_row_slice(3, 2, &[0.0, 1.0, 1.0, 1.0, 2.0, 1.0]);
        let controls = DMatrix::zeros(3, 0);
        phase.set_initial_guess_arrays(&times, &states, &controls);
        phase.initialize().unwrap();

        let state_array = phase.get_state_array();
        let mesh_times = phase.get_time_vector();
        for row in 0..state_array.nrows() {
            assert_abs_diff_eq!(state_array[(row, 0)], mesh_times[row], epsilon = 1.0e-12);
        }
    }

    #[test]
    fn guess_file_round_trip_and_temporal_order_error() {
        let dir = tempfile::tempdir().unwrap();
        let good_path = dir.path().join("guess.och");
        let mut file = std::fs::File::create(&good_path).unwrap();
        writeln!(file, "# t  x  v").unwrap();
        writeln!(file, "0.0, 0.0, 1.0").unwrap();
        writeln!(file, "1.0, 1.0, 1.0").unwrap();
        writeln!(file, "2.0, 2.0, 1.0").unwrap();
        drop(file);

        let data = read_guess_file(good_path.to_str().unwrap(), 2, 0).unwrap();
        assert_eq!(data.times.len(), 3);
        assert_relative_eq!(data.states[(1, 0)], 1.0);

        let mut phase = free_particle_phase(
            TranscriptionScheme::Radau(RadauTranscription::new(3, 10)),
            vec![-1.0, 1.0],
        );
        phase.set_initial_guess_mode(InitialGuessMode::OCHFile);
        phase.set_guess_file_name(good_path.to_str().unwrap());
        phase.initialize().unwrap();
        let state_array = phase.get_state_array();
        let mesh_times = phase.get_time_vector();
        for row in 0..state_array.nrows() {
            assert_abs_diff_eq!(state_array[(row, 0)], mesh_times[row], epsilon = 1.0e-12);
        }

        // non-monotonic time samples must be a descriptive error
        let bad_path = dir.path().join("bad.och");
        let mut file = std::fs::File::create(&bad_path).unwrap();
        writeln!(file, "0.0, 0.0, 1.0").unwrap();
        writeln!(file, "2.0, 2.0, 1.0").unwrap();
        writeln!(file, "1.0, 1.0, 1.0").unwrap();
        drop(file);

        let mut bad_phase = free_particle_phase(
            TranscriptionScheme::Radau(RadauTranscription::new(3, 10)),
            vec![-1.0, 1.0],
        );
        bad_phase.set_initial_guess_mode(InitialGuessMode::OCHFile);
        bad_phase.set_guess_file_name(bad_path.to_str().unwrap());
        let err = bad_phase.initialize().unwrap_err();
        assert!(err.contains("data points are not in the correct temporal order"));
    }

    #[test]
    fn guess_mode_parses_from_strings() {
        use std::str::FromStr;
        assert_eq!(
            InitialGuessMode::from_str("LinearUnityControl").unwrap(),
            InitialGuessMode::LinearUnityControl
        );
        assert_eq!(
            InitialGuessMode::from_str("OCHFile").unwrap(),
            InitialGuessMode::OCHFile
        );
        assert!(InitialGuessMode::from_str("NoSuchMode").is_err());
    }
}
