#[cfg(test)]
mod tests {
    use crate::numerical::Collocation::Coll_traits::Transcription;
    use crate::numerical::Collocation::HermiteSimpson_main::HermiteSimpsonTranscription;
    use crate::numerical::Collocation::Radau_main::RadauTranscription;
    use crate::numerical::OptimalControl::decision_vector::DecisionVector;
    use crate::numerical::OptimalControl::function_data::FunctionOutputData;
    use crate::numerical::OptimalControl::path_function_manager::UserPathFunctionManager;
    use crate::numerical::OptimalControl::problem_characteristics::ProblemCharacteristics;
    use crate::numerical::OptimalControl::user_functions::{
        BoundData, FunctionInputData, JacobianType, PathFunctionContainer, UserFunctionProperties,
        UserPathFunction,
    };
    use crate::somelinalg::sparse_utils::to_dense;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use nalgebra::{DMatrix, DVector};

    // ------------------------------------------------------------------
    // Bryson maximum-range problem, degree-5 Radau, one interval: the
    // decision vector, per-point dynamics data and the resulting defect
    // vector/Jacobian are pinned numerically.
    // ------------------------------------------------------------------

    fn bryson_max_config() -> ProblemCharacteristics {
        let mut config = ProblemCharacteristics::new();
        config.set_num_state_vars(3);
        config.set_num_control_vars(2);
        config.set_mesh_interval_fractions(&DVector::from_vec(vec![-1.0, 1.0]));
        config.set_mesh_interval_num_points(&[5]);
        config.set_state_lower_bound(&DVector::from_vec(vec![-10.0, -10.0, -10.0]));
        config.set_state_upper_bound(&DVector::from_vec(vec![10.0, 10.0, 10.0]));
        config.set_control_lower_bound(&DVector::from_vec(vec![-2.0, -2.0]));
        config.set_control_upper_bound(&DVector::from_vec(vec![2.0, 2.0]));
        config.set_state_initial_guess(&DVector::from_vec(vec![0.0, 0.0, 0.0]));
        config.set_state_final_guess(&DVector::from_vec(vec![1.0, 1.0, 1.0]));
        config.set_time_lower_bound(0.0);
        config.set_time_upper_bound(2.0);
        config.set_time_initial_guess(0.0);
        config.set_time_final_guess(2.0);
        config.set_has_defect_cons(true);
        config
    }

    fn bryson_max_dec_vector() -> DecisionVector {
        let mut dec_vector = DecisionVector::new();
        dec_vector.initialize(3, 2, 0, 0, 6, 5, 0, 0);
        let values = vec![
            0.0,
            2.000000000000000,
            0.0,
            0.0,
            0.0,
            -0.000000076604530,
            -1.000000000021982,
            0.011203713932112,
            -0.060092106971108,
            0.414941720985215,
            0.371931438744632,
            -0.928260203224040,
            0.328993933209084,
            -0.312590960539967,
            1.058007166968678,
            0.939464115603286,
            -0.342647304810254,
            1.077589103360819,
            -0.301403382447943,
            1.353685287222132,
            0.941325152410502,
            0.337501048064107,
            1.591627798495716,
            0.005700227057782,
            1.356474785664222,
            0.786340489937462,
            0.617793358588485,
            1.712373981051012,
            0.100000000000000,
            1.340403513677551,
        ];
        dec_vector.set_decision_vector(&DVector::from_vec(values));
        dec_vector
    }

    fn bryson_max_dyn_props() -> UserFunctionProperties {
        let mut props = UserFunctionProperties::new();
        let mut state_pattern = DMatrix::zeros(3, 3);
        state_pattern[(0, 2)] = 1.0;
        state_pattern[(1, 2)] = 1.0;
        let mut control_pattern = DMatrix::zeros(3, 2);
        control_pattern[(0, 0)] = 1.0;
        control_pattern[(1, 1)] = 1.0;
        control_pattern[(2, 1)] = 1.0;
        props.set_jacobian_pattern(JacobianType::State, state_pattern);
        props.set_jacobian_pattern(JacobianType::Control, control_pattern);
        props.set_jacobian_pattern(JacobianType::Time, DMatrix::zeros(3, 1));
        props.set_jacobian_pattern(JacobianType::Static, DMatrix::zeros(3, 0));
        props.set_num_functions(3);
        props.set_has_state_vars(true);
        props.set_has_control_vars(true);
        props
    }

    fn make_dyn_point(
        mesh_idx: usize,
        state_idxs: Vec<usize>,
        control_idxs: Vec<usize>,
        func_values: [f64; 3],
        df0_dv: f64,
        df1_dv: f64,
        df0_du1: f64,
        df1_du2: f64,
        df2_du2: f64,
    ) -> FunctionOutputData {
        let mut data = FunctionOutputData::new();
        data.set_functions(&DVector::from_row_slice(&func_values));
        let mut state_jac = DMatrix::zeros(3, 3);
        state_jac[(0, 2)] = df0_dv;
        state_jac[(1, 2)] = df1_dv;
        let mut control_jac = DMatrix::zeros(3, 2);
        control_jac[(0, 0)] = df0_du1;
        control_jac[(1, 1)] = df1_du2;
        control_jac[(2, 1)] = df2_du2;
        data.set_jacobian(JacobianType::State, &state_jac);
        data.set_jacobian(JacobianType::Control, &control_jac);
        data.set_jacobian(JacobianType::Time, &DMatrix::zeros(3, 1));
        data.set_jacobian(JacobianType::Static, &DMatrix::zeros(3, 0));
        data.set_nlp_data(mesh_idx, 0, state_idxs, control_idxs, Vec::new());
        data
    }

    fn bryson_max_dyn_data() -> Vec<FunctionOutputData> {
        vec![
            make_dyn_point(
                0,
                vec![2, 3, 4],
                vec![5, 6],
                [0.0, 0.0, 1.500000000227480],
                2.026854473646720e-06,
                -1.000000000227480,
                0.0,
                0.0,
                -1.000000000583867,
            ),
            make_dyn_point(
                1,
                vec![7, 8, 9],
                vec![10, 11],
                [
                    1.543300969523187e-01,
                    -3.851737242587722e-01,
                    1.428259962644309e+00,
                ],
                3.719320426642803e-01,
                -9.282599627846722e-01,
                4.149416540921713e-01,
                4.149416538146156e-01,
                -9.999999983634211e-01,
            ),
            make_dyn_point(
                2,
                vec![12, 13, 14],
                vec![15, 16],
                [
                    9.939596132037488e-01,
                    -3.625238819529065e-01,
                    8.426478336712460e-01,
                ],
                9.394639233217816e-01,
                -3.426478339951800e-01,
                1.058007219612023e+00,
                1.058007220167134e+00,
                -9.999999994736442e-01,
            ),
            make_dyn_point(
                3,
                vec![17, 18, 19],
                vec![20, 21],
                [
                    1.274257814357465e+00,
                    4.568710465164262e-01,
                    1.624983541497550e-01,
                ],
                9.413249402179247e-01,
                3.375016460749336e-01,
                1.353685388227888e+00,
                1.353685388782999e+00,
                -1.000000000028756e+00,
            ),
            make_dyn_point(
                4,
                vec![22, 23, 24],
                vec![25, 26],
                [
                    1.066651415884305e+00,
                    8.380204646897436e-01,
                    -1.177929308478450e-01,
                ],
                7.863408257868798e-01,
                6.177929312567443e-01,
                1.356474672586927e+00,
                1.356474673697150e+00,
                -9.999999994736442e-01,
            ),
            make_dyn_point(
                5,
                vec![27, 28, 29],
                vec![30, 31],
                [0.0, 0.0, 0.0],
                0.0,
                0.0,
                0.0,
                0.0,
                0.0,
            ),
        ]
    }

    fn bryson_max_truth_func_values() -> [f64; 15] {
        [
            3.552713678800501e-15,
            2.081668171172169e-15,
            1.998401444325282e-15,
            1.672204319458359e-10,
            6.628542159603512e-11,
            1.310063169057685e-14,
            -1.378752667591243e-11,
            -3.792910430178154e-11,
            -1.998401444325282e-15,
            6.038058941726376e-12,
            -1.674160809983505e-11,
            -8.326672684688674e-15,
            -1.247713043994736e-11,
            1.603561727847591e-11,
            1.720845688168993e-14,
        ]
    }

    fn bryson_max_truth_jacobian() -> DMatrix<f64> {
        // (row, col, value), zero based
        let triplets: [(usize, usize, f64); 139] = [
            (2, 0, 7.500000001137400e-01),
            (3, 0, 7.716504847615936e-02),
            (4, 0, -1.925868621293861e-01),
            (5, 0, 7.141299813221544e-01),
            (6, 0, 4.969798066018744e-01),
            (7, 0, -1.812619409764532e-01),
            (8, 0, 4.213239168356230e-01),
            (9, 0, 6.371289071787324e-01),
            (10, 0, 2.284355232582131e-01),
            (11, 0, 8.124917707487750e-02),
            (12, 0, 5.333257079421525e-01),
            (13, 0, 4.190102323448718e-01),
            (14, 0, -5.889646542392252e-02),
            (2, 1, -7.500000001137400e-01),
            (3, 1, -7.716504847615936e-02),
            (4, 1, 1.925868621293861e-01),
            (5, 1, -7.141299813221544e-01),
            (6, 1, -4.969798066018744e-01),
            (7, 1, 1.812619409764532e-01),
            (8, 1, -4.213239168356230e-01),
            (9, 1, -6.371289071787324e-01),
            (10, 1, -2.284355232582131e-01),
            (11, 1, -8.124917707487750e-02),
            (12, 1, -5.333257079421525e-01),
            (13, 1, -4.190102323448718e-01),
            (14, 1, 5.889646542392252e-02),
            (0, 2, -6.500000000000000e+00),
            (3, 2, -1.404991827639855e+00),
            (6, 2, 3.285313785671800e-01),
            (9, 2, -1.371690388875971e-01),
            (12, 2, 6.685308192460790e-02),
            (1, 3, -6.500000000000000e+00),
            (4, 3, -1.404991827639855e+00),
            (7, 3, 3.285313785671800e-01),
            (10, 3, -1.371690388875971e-01),
            (13, 3, 6.685308192460790e-02),
            (0, 4, -2.026854473646720e-06),
            (1, 4, 1.000000000227480e+00),
            (2, 4, -6.500000000000000e+00),
            (5, 4, -1.404991827639855e+00),
            (8, 4, 3.285313785671800e-01),
            (11, 4, -1.371690388875971e-01),
            (14, 4, 6.685308192460790e-02),
            (2, 6, 1.000000000583867e+00),
            (0, 7, 9.109641155544052e+00),
            (3, 7, -2.906165262904104e-01),
            (6, 7, -1.259160474605532e+00),
            (9, 7, 4.329503901415673e-01),
            (12, 7, -1.998526039699828e-01),
            (1, 8, 9.109641155544052e+00),
            (4, 8, -2.906165262904104e-01),
            (7, 8, -1.259160474605532e+00),
            (10, 8, 4.329503901415673e-01),
            (13, 8, -1.998526039699828e-01),
            (2, 9, 9.109641155544052e+00),
            (3, 9, -3.719320426642803e-01),
            (4, 9, 9.282599627846722e-01),
            (5, 9, -2.906165262904104e-01),
            (8, 9, -1.259160474605532e+00),
            (11, 9, 4.329503901415673e-01),
            (14, 9, -1.998526039699828e-01),
            (3, 10, -4.149416540921713e-01),
            (4, 11, -4.149416538146156e-01),
            (5, 11, 9.999999983634211e-01),
            (0, 12, -4.388557102075239e+00),
            (3, 12, 2.594170453203594e+00),
            (6, 12, -4.283826226985887e-01),
            (9, 12, -1.181898588034305e+00),
            (12, 12, 4.375931981001326e-01),
            (1, 13, -4.388557102075239e+00),
            (4, 13, 2.594170453203594e+00),
            (7, 13, -4.283826226985887e-01),
            (10, 13, -1.181898588034305e+00),
            (13, 13, 4.375931981001326e-01),
            (2, 14, -4.388557102075239e+00),
            (5, 14, 2.594170453203594e+00),
            (6, 14, -9.394639233217816e-01),
            (7, 14, 3.426478339951800e-01),
            (8, 14, -4.283826226985887e-01),
            (11, 14, -1.181898588034305e+00),
            (14, 14, 4.375931981001326e-01),
            (6, 15, -1.058007219612023e+00),
            (7, 16, -1.058007220167134e+00),
            (8, 16, 9.999999994736442e-01),
            (0, 17, 3.485128058328331e+00),
            (3, 17, -1.696575959032477e+00),
            (6, 17, 2.248008562906697e+00),
            (9, 17, -9.030388620418219e-01),
            (12, 17, -1.445971307690058e+00),
            (1, 18, 3.485128058328331e+00),
            (4, 18, -1.696575959032477e+00),
            (7, 18, 2.248008562906697e+00),
            (10, 18, -9.030388620418219e-01),
            (13, 18, -1.445971307690058e+00),
            (2, 19, 3.485128058328331e+00),
            (5, 19, -1.696575959032477e+00),
            (8, 19, 2.248008562906697e+00),
            (9, 19, -9.413249402179247e-01),
            (10, 19, -3.375016460749336e-01),
            (11, 19, -9.030388620418219e-01),
            (14, 19, -1.445971307690058e+00),
            (9, 20, -1.353685388227888e+00),
            (10, 21, -1.353685388782999e+00),
            (11, 21, 1.000000000028756e+00),
            (0, 22, -4.206212111797146e+00),
            (3, 22, 1.939331609862006e+00),
            (6, 22, -2.061082623121687e+00),
            (9, 22, 3.580690360072694e+00),
            (12, 22, -4.377961988969181e+00),
            (1, 23, -4.206212111797146e+00),
            (4, 23, 1.939331609862006e+00),
            (7, 23, -2.061082623121687e+00),
            (10, 23, 3.580690360072694e+00),
            (13, 23, -4.377961988969181e+00),
            (2, 24, -4.206212111797146e+00),
            (5, 24, 1.939331609862006e+00),
            (8, 24, -2.061082623121687e+00),
            (11, 24, 3.580690360072694e+00),
            (12, 24, -7.863408257868798e-01),
            (13, 24, -6.177929312567443e-01),
            (14, 24, -4.377961988969181e+00),
            (12, 25, -1.356474672586927e+00),
            (13, 26, -1.356474673697150e+00),
            (14, 26, 9.999999994736442e-01),
            (0, 27, 2.500000000000000e+00),
            (3, 27, -1.141317750102857e+00),
            (6, 27, 1.172085778951930e+00),
            (9, 27, -1.791534261250537e+00),
            (12, 27, 5.519339620604482e+00),
            (1, 28, 2.500000000000000e+00),
            (4, 28, -1.141317750102857e+00),
            (7, 28, 1.172085778951930e+00),
            (10, 28, -1.791534261250537e+00),
            (13, 28, 5.519339620604482e+00),
            (2, 29, 2.500000000000000e+00),
            (5, 29, -1.141317750102857e+00),
            (8, 29, 1.172085778951930e+00),
            (11, 29, -1.791534261250537e+00),
            (14, 29, 5.519339620604482e+00),
        ];
        let mut dense = DMatrix::zeros(15, 30);
        for &(row, col, value) in triplets.iter() {
            dense[(row, col)] = value;
        }
        dense
    }

    #[test]
    fn bryson_max_defect_function_and_jacobian_match_truth() {
        let mut config = bryson_max_config();
        let dec_vector = bryson_max_dec_vector();
        let dyn_props = bryson_max_dyn_props();
        let dyn_data = bryson_max_dyn_data();

        let mut trans = RadauTranscription::new(3, 10);
        trans.initialize(&mut config);
        assert_eq!(config.num_decision_vars_nlp(), 30);
        assert_eq!(config.num_defect_con_nlp(), 15);
        trans.set_time_vector(0.0, 2.0);
        trans.prepare_to_optimize(&dyn_props, &dyn_data, None, None, &config);

        let (defect_con_vec, defect_con_jacobian) =
            trans.compute_defect_fun_and_jac(&dyn_data, &dec_vector, &config);

        let truth_values = bryson_max_truth_func_values();
        assert_eq!(defect_con_vec.len(), 15);
        for idx in 0..15 {
            assert_abs_diff_eq!(defect_con_vec[idx], truth_values[idx], epsilon = 1.0e-9);
        }

        let truth_jacobian = bryson_max_truth_jacobian();
        let dense_jacobian = to_dense(&defect_con_jacobian);
        assert_eq!(dense_jacobian.nrows(), 15);
        assert_eq!(dense_jacobian.ncols(), 30);
        for row in 0..15 {
            for col in 0..30 {
                assert_abs_diff_eq!(
                    dense_jacobian[(row, col)],
                    truth_jacobian[(row, col)],
                    epsilon = 1.0e-9
                );
            }
        }
    }

    #[test]
    fn bryson_max_sparsity_pattern_covers_jacobian() {
        let mut config = bryson_max_config();
        let dec_vector = bryson_max_dec_vector();
        let dyn_props = bryson_max_dyn_props();
        let dyn_data = bryson_max_dyn_data();

        let mut trans = RadauTranscription::new(3, 10);
        trans.initialize(&mut config);
        trans.set_time_vector(0.0, 2.0);
        trans.prepare_to_optimize(&dyn_props, &dyn_data, None, None, &config);

        let (_, jacobian) = trans.compute_defect_fun_and_jac(&dyn_data, &dec_vector, &config);
        let pattern = trans.compute_defect_sparsity_pattern();
        for (value, (row, col)) in jacobian.iter() {
            if *value != 0.0 {
                assert!(
                    pattern.get(row, col).is_some(),
                    "jacobian nonzero at ({}, {}) missing from the sparsity pattern",
                    row,
                    col
                );
            }
        }
    }

    #[test]
    #[should_panic(expected = "before prepare_to_optimize")]
    fn computing_defects_before_prepare_is_fatal() {
        let mut config = bryson_max_config();
        let dec_vector = bryson_max_dec_vector();
        let dyn_data = bryson_max_dyn_data();
        let mut trans = RadauTranscription::new(3, 10);
        trans.initialize(&mut config);
        trans.set_time_vector(0.0, 2.0);
        trans.compute_defect_fun_and_jac(&dyn_data, &dec_vector, &config);
    }

    #[test]
    #[should_panic(expected = "polynomial degree range")]
    fn out_of_range_polynomial_degrees_are_rejected() {
        RadauTranscription::new(2, 10);
    }

    #[test]
    #[should_panic(expected = "out of the allowed range")]
    fn out_of_range_mesh_points_are_rejected() {
        let mut config = bryson_max_config();
        config.set_mesh_interval_num_points(&[12]);
        let mut trans = RadauTranscription::new(3, 10);
        trans.initialize(&mut config);
    }

    // the path object behind the mesh-refinement regression
    #[derive(Clone)]
    struct BrysonMaxPathObject;

    impl UserPathFunction for BrysonMaxPathObject {
        fn evaluate_functions(
            &mut self,
            inputs: &FunctionInputData,
            outputs: &mut PathFunctionContainer,
        ) {
            let state = inputs.state_vector();
            let control = inputs.control_vector();
            let v = state[2];
            let u1 = control[0];
            let u2 = control[1];
            let g = 1.0;
            let a = 0.5 * g;
            outputs.set_dyn_functions(&DVector::from_vec(vec![v * u1, v * u2, a * g - u2]));
            outputs.set_alg_functions(&DVector::from_vec(vec![u1 * u1 + u2 * u2]));
            outputs.set_alg_upper_bounds(&DVector::from_vec(vec![1.0]));
            outputs.set_alg_lower_bounds(&DVector::from_vec(vec![1.0]));
        }
    }

    fn bryson_max_manager(config: &ProblemCharacteristics) -> UserPathFunctionManager {
        let mut input = FunctionInputData::new();
        input.initialize(3, 2, 0);
        input.set_state_vector(config.state_upper_bound());
        input.set_control_vector(config.control_upper_bound());
        input.set_time(config.time_upper_bound());
        let mut container = PathFunctionContainer::new();
        let bounds = BoundData {
            state_lower: config.state_lower_bound().clone(),
            state_upper: config.state_upper_bound().clone(),
            control_lower: config.control_lower_bound().clone(),
            control_upper: config.control_upper_bound().clone(),
            static_lower: DVector::zeros(0),
            static_upper: DVector::zeros(0),
            time_lower: config.time_lower_bound(),
            time_upper: config.time_upper_bound(),
        };
        let mut manager = UserPathFunctionManager::new();
        manager.initialize(Box::new(BrysonMaxPathObject), &mut input, &mut container, &bounds);
        manager
    }

    #[test]
    fn bryson_max_mesh_refinement_matches_reference_error() {
        let mut config = bryson_max_config();
        let dec_vector = bryson_max_dec_vector();
        let dyn_props = bryson_max_dyn_props();
        let dyn_data = bryson_max_dyn_data();

        let mut trans = RadauTranscription::new(3, 10);
        trans.initialize(&mut config);
        trans.set_time_vector(0.0, 2.0);
        trans.prepare_to_optimize(&dyn_props, &dyn_data, None, None, &config);

        let mut manager = bryson_max_manager(&config);
        let result = trans.refine_mesh(&dec_vector, &mut manager, &config);

        assert_relative_eq!(
            result.max_rel_error_array[0],
            0.003588128329767,
            max_relative = 1.0e-6
        );
        assert!(result.is_mesh_refined);
        // degree 5 wants to grow to 11, above the max of 10, so the interval
        // splits into four minimum-degree pieces
        assert_eq!(result.new_mesh_interval_num_points, vec![3, 3, 3, 3]);
        let fractions = &result.new_mesh_interval_fractions;
        assert_eq!(fractions.len(), 5);
        assert_relative_eq!(fractions[0], -1.0);
        assert_relative_eq!(fractions[1], -0.5, epsilon = 1e-12);
        assert_relative_eq!(fractions[2], 0.0, epsilon = 1e-12);
        assert_relative_eq!(fractions[3], 0.5, epsilon = 1e-12);
        assert_relative_eq!(fractions[4], 1.0);
        assert_eq!(result.new_state_guess.nrows(), 13);
        assert_eq!(result.new_state_guess.ncols(), 3);
        assert_eq!(result.new_control_guess.nrows(), 12);
        assert_eq!(result.new_control_guess.ncols(), 2);
    }

    // ------------------------------------------------------------------
    // Hyper-sensitive problem integral cost regression, degree-3 Radau.
    // ------------------------------------------------------------------

    fn hyp_sen_config() -> ProblemCharacteristics {
        let mut config = ProblemCharacteristics::new();
        config.set_num_state_vars(1);
        config.set_num_control_vars(1);
        config.set_mesh_interval_fractions(&DVector::from_vec(vec![-1.0, 1.0]));
        config.set_mesh_interval_num_points(&[3]);
        config.set_state_lower_bound(&DVector::from_vec(vec![-50.0]));
        config.set_state_upper_bound(&DVector::from_vec(vec![50.0]));
        config.set_control_lower_bound(&DVector::from_vec(vec![-50.0]));
        config.set_control_upper_bound(&DVector::from_vec(vec![50.0]));
        config.set_time_lower_bound(0.0);
        config.set_time_upper_bound(50.0);
        config.set_has_defect_cons(true);
        config.set_has_integral_cost(true);
        config
    }

    fn scalar_props() -> UserFunctionProperties {
        let mut props = UserFunctionProperties::new();
        props.set_jacobian_pattern(JacobianType::State, DMatrix::from_element(1, 1, 1.0));
        props.set_jacobian_pattern(JacobianType::Control, DMatrix::from_element(1, 1, 1.0));
        props.set_jacobian_pattern(JacobianType::Time, DMatrix::zeros(1, 1));
        props.set_jacobian_pattern(JacobianType::Static, DMatrix::zeros(1, 0));
        props.set_num_functions(1);
        props.set_has_state_vars(true);
        props.set_has_control_vars(true);
        props
    }

    fn make_scalar_point(
        mesh_idx: usize,
        state_idx: usize,
        control_idx: usize,
        func_value: f64,
        state_jac: f64,
        control_jac: f64,
    ) -> FunctionOutputData {
        let mut data = FunctionOutputData::new();
        data.set_functions(&DVector::from_vec(vec![func_value]));
        data.set_jacobian(JacobianType::State, &DMatrix::from_element(1, 1, state_jac));
        data.set_jacobian(JacobianType::Control, &DMatrix::from_element(1, 1, control_jac));
        data.set_jacobian(JacobianType::Time, &DMatrix::zeros(1, 1));
        data.set_jacobian(JacobianType::Static, &DMatrix::zeros(1, 0));
        data.set_nlp_data(mesh_idx, 0, vec![state_idx], vec![control_idx], Vec::new());
        data
    }

    #[test]
    fn hyp_sen_integral_cost_matches_truth() {
        let mut config = hyp_sen_config();

        let mut dec_vector = DecisionVector::new();
        dec_vector.initialize(1, 1, 0, 0, 4, 3, 0, 0);
        dec_vector.set_decision_vector(&DVector::from_vec(vec![
            0.0,
            50.000000000000000,
            1.000000000000000,
            0.950878358620457,
            -0.030250049754212,
            -0.052466292811721,
            0.041258252018226,
            0.085967528179871,
            1.000000000000000,
        ]));

        let dyn_props = scalar_props();
        let cost_props = scalar_props();

        let dyn_data = vec![
            make_scalar_point(0, 2, 3, -0.049121641379543, -3.0, 1.0),
            make_scalar_point(1, 4, 5, -0.052438612034511, -0.002745196530397, 1.0),
            make_scalar_point(2, 6, 7, 0.085897296594344, -0.005106730078798, 1.0),
            make_scalar_point(3, 8, 9, -1.0e12, -3.0, 1.0),
        ];
        let cost_data = vec![
            make_scalar_point(0, 2, 3, 0.952084826446367, 1.0, 0.950878358620457),
            make_scalar_point(1, 4, 5, 0.001833888695769, -0.030250049754212, -0.052466292811721),
            make_scalar_point(2, 6, 7, 0.004546329630478, 0.041258252018226, 0.085967528179871),
            make_scalar_point(3, 8, 9, -1.0e12, 1.0, -1.0e12),
        ];

        let mut trans = RadauTranscription::with_default_degrees();
        trans.initialize(&mut config);
        assert_eq!(config.num_decision_vars_nlp(), 9);
        trans.set_time_vector(0.0, 50.0);
        trans.prepare_to_optimize(&dyn_props, &dyn_data, Some(&cost_props), Some(&cost_data), &config);

        let (cost_value, cost_jacobian) = trans.compute_cost_fun_and_jac(&cost_data, &config);
        assert_abs_diff_eq!(cost_value[0], 5.421914864941591, epsilon = 1.0e-9);

        let truth = [
            (0usize, -0.108438297298832),
            (1, 0.108438297298832),
            (2, 5.555555555555555),
            (3, 5.282657547891429),
            (4, -0.775136087026420),
            (5, -1.344411570932912),
            (6, 0.776486621066409),
            (7, 1.617922044984608),
            (8, 0.0),
        ];
        let dense = to_dense(&cost_jacobian);
        assert_eq!(dense.nrows(), 1);
        assert_eq!(dense.ncols(), 9);
        for &(col, value) in truth.iter() {
            assert_abs_diff_eq!(dense[(0, col)], value, epsilon = 1.0e-9);
        }

        let pattern = trans.compute_cost_sparsity_pattern();
        for (value, (row, col)) in cost_jacobian.iter() {
            if *value != 0.0 {
                assert!(pattern.get(row, col).is_some());
            }
        }
    }

    // ------------------------------------------------------------------
    // Hermite-Simpson: an exactly consistent trajectory has zero defects
    // and the Simpson cost quadrature is exact for a linear integrand.
    // ------------------------------------------------------------------

    fn hs_scalar_props() -> UserFunctionProperties {
        let mut props = UserFunctionProperties::new();
        props.set_jacobian_pattern(JacobianType::State, DMatrix::zeros(1, 1));
        props.set_jacobian_pattern(JacobianType::Control, DMatrix::zeros(1, 1));
        props.set_jacobian_pattern(JacobianType::Time, DMatrix::zeros(1, 1));
        props.set_jacobian_pattern(JacobianType::Static, DMatrix::zeros(1, 0));
        props.set_num_functions(1);
        props.set_has_state_vars(true);
        props.set_has_control_vars(true);
        props
    }

    #[test]
    fn hermite_simpson_defects_vanish_on_consistent_trajectory() {
        let mut config = ProblemCharacteristics::new();
        config.set_num_state_vars(1);
        config.set_num_control_vars(1);
        config.set_mesh_interval_fractions(&DVector::from_vec(vec![0.0, 1.0]));
        config.set_mesh_interval_num_points(&[3]);
        config.set_has_defect_cons(true);
        config.set_has_integral_cost(true);

        let mut trans = HermiteSimpsonTranscription::new();
        trans.initialize(&mut config);
        // 2 steps, 5 discretization points
        assert_eq!(trans.num_time_points(), 0); // set by set_time_vector
        trans.set_time_vector(0.0, 1.0);
        assert_eq!(trans.num_time_points(), 5);
        assert_eq!(config.num_defect_con_nlp(), 4);
        assert_eq!(config.num_decision_vars_nlp(), 12);

        let mut dec_vector = DecisionVector::new();
        dec_vector.initialize(
            1,
            1,
            0,
            0,
            trans.num_state_points(),
            trans.num_control_points(),
            trans.num_state_stage_points_per_mesh(),
            trans.num_control_stage_points_per_mesh(),
        );
        assert_eq!(dec_vector.num_decision_params(), 12);
        dec_vector.set_time_vector(&DVector::from_vec(vec![0.0, 1.0]));

        // state y(t) = t matches dynamics y' = 1 exactly
        let taus = [0.0, 0.25, 0.5, 0.75, 1.0];
        let state_array = DMatrix::from_fn(5, 1, |r, _| taus[r]);
        let control_array = DMatrix::zeros(5, 1);
        dec_vector.set_state_array(&state_array);
        dec_vector.set_control_array(&control_array);

        let mut dyn_data = Vec::new();
        let mut cost_data = Vec::new();
        for point in 0..5 {
            let mesh = point / 2;
            let stage = point % 2;
            let state_idxs = dec_vector.state_idxs_at_mesh_point(mesh, stage);
            let control_idxs = dec_vector.control_idxs_at_mesh_point(mesh, stage);

            let mut dyn_point = FunctionOutputData::new();
            dyn_point.set_functions(&DVector::from_vec(vec![1.0]));
            dyn_point.set_jacobian(JacobianType::State, &DMatrix::zeros(1, 1));
            dyn_point.set_jacobian(JacobianType::Control, &DMatrix::zeros(1, 1));
            dyn_point.set_jacobian(JacobianType::Time, &DMatrix::zeros(1, 1));
            dyn_point.set_jacobian(JacobianType::Static, &DMatrix::zeros(1, 0));
            dyn_point.set_nlp_data(mesh, stage, state_idxs.clone(), control_idxs.clone(), Vec::new());
            dyn_data.push(dyn_point);

            // integrand = t, so the integral over [0, 1] is 1/2
            let mut cost_point = FunctionOutputData::new();
            cost_point.set_functions(&DVector::from_vec(vec![taus[point]]));
            cost_point.set_jacobian(JacobianType::State, &DMatrix::zeros(1, 1));
            cost_point.set_jacobian(JacobianType::Control, &DMatrix::zeros(1, 1));
            cost_point.set_jacobian(JacobianType::Time, &DMatrix::zeros(1, 1));
            cost_point.set_jacobian(JacobianType::Static, &DMatrix::zeros(1, 0));
            cost_point.set_nlp_data(mesh, stage, state_idxs, control_idxs, Vec::new());
            cost_data.push(cost_point);
        }

        let props = hs_scalar_props();
        trans.prepare_to_optimize(&props, &dyn_data, Some(&props), Some(&cost_data), &config);

        let (defects, _) = trans.compute_defect_fun_and_jac(&dyn_data, &dec_vector, &config);
        assert_eq!(defects.len(), 4);
        for idx in 0..defects.len() {
            assert_abs_diff_eq!(defects[idx], 0.0, epsilon = 1.0e-12);
        }

        let (cost, _) = trans.compute_cost_fun_and_jac(&cost_data, &config);
        assert_abs_diff_eq!(cost[0], 0.5, epsilon = 1.0e-12);
    }
}
