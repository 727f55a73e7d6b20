//! Radau pseudospectral transcription.
//!
//! Discretizes each mesh interval with Legendre-Gauss-Radau collocation
//! points: state decision variables at every point plus the interval end,
//! control only at the collocation points (the terminal phase point carries
//! state but no control). Defect constraints are
//!   D*y - (dt/2)*f(y, u, t) = 0
//! with D the multi-segment LGR differentiation matrix, expressed in the
//! Betts form A*z + B*q with A holding the D entries scattered over state
//! columns, B the identity, and q = -(dt/2)*f. The integral cost is the LGR
//! quadrature of the integrand. Mesh refinement estimates the transcription
//! error per interval from a one-degree-higher interpolant of the current
//! solution against integrated dynamics, grows the polynomial degree when
//! it stays within range and splits the interval otherwise.
use super::radau_math::{
    compute_multi_segment_lgr_nodes, compute_single_seg_lgr_nodes, lagrange_diff_matrix,
};
use super::Coll_traits::{
    CollocationBase, MeshRefinementResult, PointType, Transcription,
};
use crate::numerical::OptimalControl::decision_vector::DecisionVector;
use crate::numerical::OptimalControl::function_data::FunctionOutputData;
use crate::numerical::OptimalControl::path_function_manager::{
    evaluate_dynamics_off_mesh, UserPathFunctionManager,
};
use crate::numerical::OptimalControl::problem_characteristics::ProblemCharacteristics;
use crate::numerical::OptimalControl::user_functions::{JacobianType, UserFunctionProperties};
use crate::somelinalg::bary_interpolation::BaryLagrangeInterpolator;
use crate::somelinalg::sparse_utils::{zeros, SparseMatrixBuilder};
use log::info;
use nalgebra::{DMatrix, DVector};
use sprs::CsMat;

/// Hard lower limit on the per-interval polynomial degree.
pub const MIN_POLYNOMIAL_DEGREE_LB: usize = 3;
/// Hard upper limit on the per-interval polynomial degree.
pub const MAX_POLYNOMIAL_DEGREE_UB: usize = 15;

#[derive(Clone)]
pub struct RadauTranscription {
    base: CollocationBase,
    /// scaled discretization points, terminal +1 included
    radau_points: DVector<f64>,
    radau_diff_matrix: CsMat<f64>,
    min_polynomial_degree: usize,
    max_polynomial_degree: usize,
    state_interpolators: Vec<BaryLagrangeInterpolator>,
    control_interpolators: Vec<BaryLagrangeInterpolator>,
    #[allow(dead_code)]
    is_interpolators_initialized: bool,
}

impl RadauTranscription {
    /// Degree bounds outside [MIN_POLYNOMIAL_DEGREE_LB,
    /// MAX_POLYNOMIAL_DEGREE_UB] are a configuration error, never clamped.
    pub fn new(min_polynomial_degree: usize, max_polynomial_degree: usize) -> RadauTranscription {
        if min_polynomial_degree < MIN_POLYNOMIAL_DEGREE_LB
            || max_polynomial_degree > MAX_POLYNOMIAL_DEGREE_UB
        {
            panic!(
                "RadauTranscription: the given min and/or max polynomial degree is invalid; \
                 the possible polynomial degree range is [{}, {}]",
                MIN_POLYNOMIAL_DEGREE_LB, MAX_POLYNOMIAL_DEGREE_UB
            );
        }
        let mut base = CollocationBase::default();
        base.rel_error_tol = 1.0e-6;
        RadauTranscription {
            base,
            radau_points: DVector::zeros(0),
            radau_diff_matrix: zeros(1, 1),
            min_polynomial_degree,
            max_polynomial_degree,
            state_interpolators: Vec::new(),
            control_interpolators: Vec::new(),
            is_interpolators_initialized: false,
        }
    }

    pub fn with_default_degrees() -> RadauTranscription {
        RadauTranscription::new(3, 14)
    }

    fn check_mesh_interval_num_points(&self, config: &ProblemCharacteristics) {
        for (idx, &num_points) in config.mesh_interval_num_points().iter().enumerate() {
            if num_points < self.min_polynomial_degree || num_points > self.max_polynomial_degree + 1 {
                panic!(
                    "RadauTranscription: at interval {}, the current number of mesh points ({}) \
                     is out of the allowed range [{}, {}]",
                    idx + 1,
                    num_points,
                    self.min_polynomial_degree,
                    self.max_polynomial_degree + 1
                );
            }
        }
    }

    fn initialize_constant_defect_matrices(
        &mut self,
        dyn_props: &UserFunctionProperties,
        dyn_values: &[FunctionOutputData],
        config: &ProblemCharacteristics,
    ) {
        if !config.has_defect_cons() || self.base.is_con_mat_initialized {
            return;
        }
        let num_states = config.num_state_vars();

        // A: differentiation matrix entries scattered over state columns,
        // B: identity over the defect rows
        let mut con_idx = 0;
        let mut low_idx = 0;
        for interval_idx in 0..config.num_mesh_intervals() {
            let num_points = config.num_points_in_mesh_interval(interval_idx);
            for row_idx in 0..num_points {
                for state_idx in 0..num_states {
                    for point_idx in 0..num_points + 1 {
                        let state_idxs = dyn_values[low_idx + point_idx].state_idxs();
                        let value = self
                            .radau_diff_matrix
                            .get(low_idx + row_idx, low_idx + point_idx)
                            .copied()
                            .unwrap_or(0.0);
                        if value != 0.0 {
                            self.base.defect_nlp_data.insert_a_element(
                                con_idx,
                                state_idxs[state_idx],
                                value,
                            );
                        }
                    }
                    self.base.defect_nlp_data.insert_b_element(con_idx, con_idx, 1.0);
                    con_idx += 1;
                }
            }
            low_idx += num_points;
        }

        // D: structural pattern of dq/dz
        let state_pattern = dyn_props.jacobian_pattern(JacobianType::State);
        let control_pattern = dyn_props.jacobian_pattern(JacobianType::Control);
        let static_pattern = dyn_props.jacobian_pattern(JacobianType::Static);
        for func_idx in 0..self.base.num_mesh_points {
            let data = &dyn_values[func_idx];
            let con_start = data.mesh_idx() * num_states;
            for row_idx in 0..num_states {
                self.base.defect_nlp_data.insert_d_element(con_start + row_idx, 0, 1.0);
                self.base.defect_nlp_data.insert_d_element(con_start + row_idx, 1, 1.0);
                if config.has_state_vars() {
                    let state_idxs = data.state_idxs();
                    for col_idx in 0..config.num_state_vars() {
                        let value = state_pattern[(row_idx, col_idx)];
                        if value != 0.0 {
                            self.base.defect_nlp_data.insert_d_element(
                                con_start + row_idx,
                                state_idxs[col_idx],
                                value,
                            );
                        }
                    }
                }
                if config.has_control_vars() {
                    let control_idxs = data.control_idxs();
                    for col_idx in 0..config.num_control_vars() {
                        let value = control_pattern[(row_idx, col_idx)];
                        if value != 0.0 {
                            self.base.defect_nlp_data.insert_d_element(
                                con_start + row_idx,
                                control_idxs[col_idx],
                                value,
                            );
                        }
                    }
                }
                if config.has_static_vars() {
                    let static_idxs = data.static_idxs();
                    for col_idx in 0..config.num_static_vars() {
                        let value = static_pattern[(row_idx, col_idx)];
                        if value != 0.0 {
                            self.base.defect_nlp_data.insert_d_element(
                                con_start + row_idx,
                                static_idxs[col_idx],
                                value,
                            );
                        }
                    }
                }
            }
        }

        self.base.defect_nlp_data.finalize_matrices();
        self.base.is_con_mat_initialized = true;
    }

    fn initialize_constant_cost_matrices(
        &mut self,
        cost_props: &UserFunctionProperties,
        cost_values: &[FunctionOutputData],
        config: &ProblemCharacteristics,
    ) {
        if !config.has_integral_cost() || self.base.is_cost_mat_initialized {
            return;
        }
        // A is all zeros for the Radau cost quadrature
        let state_pattern = cost_props.jacobian_pattern(JacobianType::State);
        let control_pattern = cost_props.jacobian_pattern(JacobianType::Control);
        let static_pattern = cost_props.jacobian_pattern(JacobianType::Static);

        let num_iterations = cost_values.len() - 1;
        for func_idx in 0..num_iterations {
            let data = &cost_values[func_idx];
            let mesh_idx = data.mesh_idx();
            self.base
                .cost_nlp_data
                .insert_b_element(0, func_idx, -self.base.quadrature_weights[mesh_idx]);

            self.base.cost_nlp_data.insert_d_element(func_idx, 0, 1.0);
            self.base.cost_nlp_data.insert_d_element(func_idx, 1, 1.0);
            if config.has_state_vars() {
                let state_idxs = data.state_idxs();
                for col_idx in 0..config.num_state_vars() {
                    if state_pattern[(0, col_idx)] != 0.0 {
                        self.base.cost_nlp_data.insert_d_element(
                            func_idx,
                            state_idxs[col_idx],
                            state_pattern[(0, col_idx)],
                        );
                    }
                }
            }
            if config.has_control_vars() {
                let control_idxs = data.control_idxs();
                for col_idx in 0..config.num_control_vars() {
                    if control_pattern[(0, col_idx)] != 0.0 {
                        self.base.cost_nlp_data.insert_d_element(
                            func_idx,
                            control_idxs[col_idx],
                            control_pattern[(0, col_idx)],
                        );
                    }
                }
            }
            if config.has_static_vars() {
                let static_idxs = data.static_idxs();
                for col_idx in 0..config.num_static_vars() {
                    if static_pattern[(0, col_idx)] != 0.0 {
                        self.base.cost_nlp_data.insert_d_element(
                            func_idx,
                            static_idxs[col_idx],
                            static_pattern[(0, col_idx)],
                        );
                    }
                }
            }
        }

        self.base.cost_nlp_data.finalize_matrices();
        self.base.is_cost_mat_initialized = true;
    }

    /// Per-iteration fill: q = -(dt/2)*f and dq/dz chain-ruled into the
    /// decision-vector columns, laid over the D pattern.
    fn fill_dynamic_defect_con_matrices(
        &self,
        func_data: &[FunctionOutputData],
        config: &ProblemCharacteristics,
    ) -> (DVector<f64>, CsMat<f64>) {
        let num_states = config.num_state_vars();
        let dt_by_2 = 0.5 * self.base.delta_time;
        let mut q_vector = DVector::zeros(config.num_defect_con_nlp());
        let mut par_q = SparseMatrixBuilder::with_pattern_of(self.base.defect_nlp_data.d_matrix());

        // the terminal point carries no collocation equation
        for func_idx in 0..func_data.len() - 1 {
            let data = &func_data[func_idx];
            let mesh_idx = data.mesh_idx();
            let con_start = mesh_idx * num_states;
            let d_time_d_ti = self.dcurrent_time_dti(mesh_idx, 0);
            let d_time_d_tf = self.dcurrent_time_dtf(mesh_idx, 0);

            let func_values = data.function_values();
            let time_jac = data.jacobian(JacobianType::Time);

            for idx in 0..num_states {
                q_vector[con_start + idx] = -dt_by_2 * func_values[idx];

                let ti_term = 0.5 * func_values[idx] - dt_by_2 * d_time_d_ti * time_jac[(idx, 0)];
                if ti_term != 0.0 {
                    par_q.set_element(con_start + idx, 0, ti_term);
                }
                let tf_term = -0.5 * func_values[idx] - dt_by_2 * d_time_d_tf * time_jac[(idx, 0)];
                if tf_term != 0.0 {
                    par_q.set_element(con_start + idx, 1, tf_term);
                }

                if config.has_state_vars() {
                    let state_jac = data.jacobian(JacobianType::State);
                    let state_idxs = data.state_idxs();
                    for col_idx in 0..state_idxs.len() {
                        let value = state_jac[(idx, col_idx)];
                        if value != 0.0 {
                            par_q.set_element(con_start + idx, state_idxs[col_idx], -dt_by_2 * value);
                        }
                    }
                }
                if config.has_control_vars() {
                    let control_jac = data.jacobian(JacobianType::Control);
                    let control_idxs = data.control_idxs();
                    for col_idx in 0..control_idxs.len() {
                        let value = control_jac[(idx, col_idx)];
                        if value != 0.0 {
                            par_q.set_element(con_start + idx, control_idxs[col_idx], -dt_by_2 * value);
                        }
                    }
                }
                if config.has_static_vars() {
                    let static_jac = data.jacobian(JacobianType::Static);
                    let static_idxs = data.static_idxs();
                    for col_idx in 0..static_idxs.len() {
                        let value = static_jac[(idx, col_idx)];
                        if value != 0.0 {
                            par_q.set_element(con_start + idx, static_idxs[col_idx], -dt_by_2 * value);
                        }
                    }
                }
            }
        }
        (q_vector, par_q.build())
    }

    fn fill_dynamic_cost_func_matrices(
        &self,
        func_data: &[FunctionOutputData],
        config: &ProblemCharacteristics,
    ) -> (DVector<f64>, CsMat<f64>) {
        let dt_by_2 = 0.5 * self.base.delta_time;
        let mut q_vector = DVector::zeros(self.base.num_mesh_points);
        let mut par_q = SparseMatrixBuilder::with_pattern_of(self.base.cost_nlp_data.d_matrix());

        for func_idx in 0..func_data.len() - 1 {
            let data = &func_data[func_idx];
            let mesh_idx = data.mesh_idx();
            let d_time_d_ti = self.dcurrent_time_dti(mesh_idx, 0);
            let d_time_d_tf = self.dcurrent_time_dtf(mesh_idx, 0);

            let func_values = data.function_values();
            let time_jac = data.jacobian(JacobianType::Time);

            q_vector[func_idx] = -dt_by_2 * func_values[0];

            let ti_term = 0.5 * func_values[0] - dt_by_2 * d_time_d_ti * time_jac[(0, 0)];
            if ti_term != 0.0 {
                par_q.set_element(func_idx, 0, ti_term);
            }
            let tf_term = -0.5 * func_values[0] - dt_by_2 * d_time_d_tf * time_jac[(0, 0)];
            if tf_term != 0.0 {
                par_q.set_element(func_idx, 1, tf_term);
            }

            if config.has_state_vars() {
                let state_jac = data.jacobian(JacobianType::State);
                let state_idxs = data.state_idxs();
                for col_idx in 0..state_idxs.len() {
                    let value = state_jac[(0, col_idx)];
                    if value != 0.0 {
                        par_q.set_element(func_idx, state_idxs[col_idx], -dt_by_2 * value);
                    }
                }
            }
            if config.has_control_vars() {
                let control_jac = data.jacobian(JacobianType::Control);
                let control_idxs = data.control_idxs();
                for col_idx in 0..control_idxs.len() {
                    let value = control_jac[(0, col_idx)];
                    if value != 0.0 {
                        par_q.set_element(func_idx, control_idxs[col_idx], -dt_by_2 * value);
                    }
                }
            }
            if config.has_static_vars() {
                let static_jac = data.jacobian(JacobianType::Static);
                let static_idxs = data.static_idxs();
                for col_idx in 0..static_idxs.len() {
                    let value = static_jac[(0, col_idx)];
                    if value != 0.0 {
                        par_q.set_element(func_idx, static_idxs[col_idx], -dt_by_2 * value);
                    }
                }
            }
        }
        (q_vector, par_q.build())
    }

    /// One barycentric interpolator pair per allowed polynomial degree:
    /// values on the degree-p LGR grid (state: plus the interval end)
    /// interpolated onto the interior nodes of the degree-(p+1) grid.
    fn init_state_and_control_interpolators(&mut self) {
        self.state_interpolators.clear();
        self.control_interpolators.clear();
        for degree in self.min_polynomial_degree..=self.max_polynomial_degree {
            let (lgr_nodes, _) = compute_single_seg_lgr_nodes(degree - 1);
            let (aug_nodes, _) = compute_single_seg_lgr_nodes(degree);

            let mut nodes_plus_one = DVector::zeros(degree + 1);
            let mut interp_points = DVector::zeros(degree);
            for idx in 0..degree {
                nodes_plus_one[idx] = lgr_nodes[idx];
                interp_points[idx] = aug_nodes[idx + 1];
            }
            nodes_plus_one[degree] = 1.0;

            self.control_interpolators
                .push(BaryLagrangeInterpolator::from_nodes_and_points(&lgr_nodes, &interp_points));
            self.state_interpolators.push(BaryLagrangeInterpolator::from_nodes_and_points(
                &nodes_plus_one,
                &interp_points,
            ));
        }
        self.is_interpolators_initialized = true;
    }

    /// Column-wise state and control of one mesh interval; the first index
    /// of each returned Vec is the variable, the inner vector runs over the
    /// interval's mesh points.
    fn state_and_control_in_mesh(
        &self,
        interval_idx: usize,
        dec_vector: &DecisionVector,
        config: &ProblemCharacteristics,
        has_final_state: bool,
        has_final_control: bool,
    ) -> (Vec<DVector<f64>>, Vec<DVector<f64>>) {
        let mesh_num_points = config.mesh_interval_num_points();
        let point_sum: usize = mesh_num_points[..interval_idx].iter().sum();
        let num_points_in_mesh = mesh_num_points[interval_idx];

        let num_state_idxs = if has_final_state {
            num_points_in_mesh + 1
        } else {
            num_points_in_mesh
        };
        let num_control_idxs = if has_final_control {
            if interval_idx == mesh_num_points.len() - 1 {
                panic!(
                    "RadauTranscription::state_and_control_in_mesh: at the final interval it is \
                     impossible to obtain the control vector at the final mesh point"
                );
            }
            num_points_in_mesh + 1
        } else {
            num_points_in_mesh
        };

        let mut state_columns =
            vec![DVector::zeros(num_state_idxs); config.num_state_vars()];
        let mut control_columns =
            vec![DVector::zeros(num_control_idxs); config.num_control_vars()];

        for idx in 0..num_state_idxs {
            let state = dec_vector.state_at_mesh_point(point_sum + idx, 0);
            for var in 0..config.num_state_vars() {
                state_columns[var][idx] = state[var];
            }
        }
        for idx in 0..num_control_idxs {
            let control = dec_vector.control_at_mesh_point(point_sum + idx, 0);
            for var in 0..config.num_control_vars() {
                control_columns[var][idx] = control[var];
            }
        }
        (state_columns, control_columns)
    }

    /// Transcription error estimate for one mesh interval: interpolate the
    /// current solution onto a one-degree-higher LGR grid, integrate the
    /// dynamics there through the inverse differentiation matrix and compare
    /// against the interpolated states.
    ///
    /// The vector-state path (numStateVars > 1) takes the maximum over
    /// components; it has not been numerically validated beyond the
    /// regression cases and should be treated with care on new problems.
    fn max_rel_error_in_mesh(
        &self,
        interval_idx: usize,
        dec_vector: &DecisionVector,
        manager: &mut UserPathFunctionManager,
        config: &ProblemCharacteristics,
    ) -> f64 {
        let num_states = config.num_state_vars();
        let num_controls = config.num_control_vars();
        let n_old = config.num_points_in_mesh_interval(interval_idx);
        let n_new = n_old + 1;

        let fractions = config.mesh_interval_fractions();
        let fa = fractions[interval_idx];
        let fb = fractions[interval_idx + 1];
        let half_width = 0.5 * (fb - fa);
        let center = 0.5 * (fa + fb);

        let (new_local_nodes, _) = compute_single_seg_lgr_nodes(n_new - 1);
        let mut new_points = DVector::zeros(n_new);
        let mut aug_points = DVector::zeros(n_new + 1);
        let mut new_times = DVector::zeros(n_new);
        let t0 = self.base.time_vector[0];
        let delta_time = self.base.delta_time;
        for idx in 0..n_new {
            new_points[idx] = center + half_width * new_local_nodes[idx];
            aug_points[idx] = new_points[idx];
            new_times[idx] = t0 + delta_time * (new_points[idx] + 1.0) / 2.0;
        }
        aug_points[n_new] = fb;

        let (state_columns, control_columns) =
            self.state_and_control_in_mesh(interval_idx, dec_vector, config, true, false);

        // interpolate the current solution onto the interior new nodes
        let interp_idx = n_old - self.min_polynomial_degree;
        let mut int_state_columns: Vec<DVector<f64>> = Vec::with_capacity(num_states);
        for var in 0..num_states {
            int_state_columns
                .push(self.state_interpolators[interp_idx].interpolate(&state_columns[var]));
        }
        let mut int_control_columns: Vec<DVector<f64>> = Vec::with_capacity(num_controls);
        for var in 0..num_controls {
            int_control_columns
                .push(self.control_interpolators[interp_idx].interpolate(&control_columns[var]));
        }

        // dynamics at the new nodes
        let statics = config.static_vector().clone();
        let mut dyn_func_array = DMatrix::zeros(n_new, num_states);
        for point_idx in 0..n_new {
            let mut state = DVector::zeros(num_states);
            let mut control = DVector::zeros(num_controls);
            if point_idx == 0 {
                for var in 0..num_states {
                    state[var] = state_columns[var][0];
                }
                for var in 0..num_controls {
                    control[var] = control_columns[var][0];
                }
            } else {
                for var in 0..num_states {
                    state[var] = int_state_columns[var][point_idx - 1];
                }
                for var in 0..num_controls {
                    control[var] = int_control_columns[var][point_idx - 1];
                }
            }
            let dynamics = evaluate_dynamics_off_mesh(
                manager,
                new_times[point_idx],
                &state,
                &control,
                &statics,
                num_states,
                num_controls,
                config.num_static_vars(),
            );
            for var in 0..num_states {
                dyn_func_array[(point_idx, var)] = dynamics[var];
            }
        }

        // integration matrix: inverse of the differentiation matrix with the
        // first column (known initial value) and last row removed
        let full_diff = lagrange_diff_matrix(&aug_points);
        let mut reduced_diff = DMatrix::zeros(n_new, n_new);
        for row in 0..n_new {
            for col in 0..n_new {
                reduced_diff[(row, col)] = full_diff[(row, col + 1)];
            }
        }
        let integration_matrix = reduced_diff.try_inverse().unwrap_or_else(|| {
            panic!(
                "RadauTranscription: failed to invert the integration matrix while estimating \
                 the mesh error in interval {}",
                interval_idx
            )
        });

        let mut integral_terms = DMatrix::zeros(n_new, num_states);
        for idx in 0..n_new {
            for var in 0..num_states {
                let mut acc = 0.0;
                for k in 0..n_new {
                    acc += integration_matrix[(idx, k)] * dyn_func_array[(k, var)];
                }
                integral_terms[(idx, var)] = delta_time / 2.0 * acc;
            }
        }

        let mut max_state_rel_error: f64 = 0.0;
        for var in 0..num_states {
            let mut max_abs_error: f64 = 0.0;
            let mut max_abs_state: f64 = state_columns[var][0].abs();
            for idx in 0..n_new {
                let state = if idx != n_new - 1 {
                    int_state_columns[var][idx]
                } else {
                    // no interpolation at the interval end point
                    state_columns[var][n_new - 1]
                };
                let error = state - state_columns[var][0] - integral_terms[(idx, var)];
                max_abs_error = max_abs_error.max(error.abs());
                max_abs_state = max_abs_state.max(state.abs());
            }
            max_state_rel_error = max_state_rel_error.max(max_abs_error / (1.0 + max_abs_state));
        }
        max_state_rel_error
    }
}

impl Transcription for RadauTranscription {
    fn initialize(&mut self, config: &mut ProblemCharacteristics) {
        self.check_mesh_interval_num_points(config);

        let (points, weights, diff_matrix) = compute_multi_segment_lgr_nodes(
            config.mesh_interval_fractions(),
            config.mesh_interval_num_points(),
        )
        .unwrap_or_else(|err| {
            panic!(
                "RadauTranscription::initialize failed to generate mesh points: {}. For the \
                 Radau collocation method, the first and last segment points must be -1 and 1 \
                 respectively, and the points must be monotonically increasing",
                err
            )
        });

        self.base.discretization_points = points.clone();
        self.radau_points = points;
        self.base.quadrature_weights = weights;
        self.radau_diff_matrix = diff_matrix;

        self.base.num_mesh_points = self.base.quadrature_weights.len();
        self.base.num_state_points = self.base.num_mesh_points + 1;
        self.base.num_control_points = self.base.num_mesh_points;
        self.base.num_path_constraint_points = self.base.num_mesh_points;
        self.base.num_state_stage_points_per_mesh = 0;
        self.base.num_control_stage_points_per_mesh = 0;

        config.set_num_defect_con_nlp(config.num_state_vars() * self.base.num_mesh_points);
        config.set_num_state_vars_nlp(config.num_state_vars() * self.base.num_state_points);
        config.set_num_control_vars_nlp(config.num_control_vars() * self.base.num_control_points);
        let num_decision_vars_nlp = config.num_state_vars_nlp()
            + config.num_control_vars_nlp()
            + config.num_time_vars_nlp()
            + config.num_static_vars();
        config.set_num_decision_vars_nlp(num_decision_vars_nlp);

        self.base.time_vector_type = vec![PointType::StateAndControl; self.base.num_state_points];
        self.base.time_vector_type[self.base.num_state_points - 1] = PointType::StateOnly;

        self.base.is_con_mat_initialized = false;
        self.base.is_cost_mat_initialized = false;

        self.base
            .defect_nlp_data
            .initialize(config.num_defect_con_nlp(), num_decision_vars_nlp, config.num_defect_con_nlp());
        self.base
            .cost_nlp_data
            .initialize(1, num_decision_vars_nlp, self.base.num_mesh_points);

        self.init_state_and_control_interpolators();
    }

    fn prepare_to_optimize(
        &mut self,
        dyn_props: &UserFunctionProperties,
        dyn_values: &[FunctionOutputData],
        cost_props: Option<&UserFunctionProperties>,
        cost_values: Option<&[FunctionOutputData]>,
        config: &ProblemCharacteristics,
    ) {
        self.initialize_constant_defect_matrices(dyn_props, dyn_values, config);
        if let (Some(props), Some(values)) = (cost_props, cost_values) {
            self.initialize_constant_cost_matrices(props, values, config);
        }
    }

    fn set_time_vector(&mut self, initial_time: f64, final_time: f64) {
        self.base.delta_time = final_time - initial_time;
        let mut time_vector = DVector::zeros(self.radau_points.len());
        for idx in 0..self.radau_points.len() {
            time_vector[idx] =
                self.base.delta_time * (self.radau_points[idx] + 1.0) / 2.0 + initial_time;
        }
        self.base.time_vector = time_vector;
        self.base.num_time_points = self.base.num_mesh_points + 1;
    }

    fn compute_defect_fun_and_jac(
        &self,
        func_data: &[FunctionOutputData],
        dec_vector: &DecisionVector,
        config: &ProblemCharacteristics,
    ) -> (DVector<f64>, CsMat<f64>) {
        if !self.base.is_con_mat_initialized {
            panic!(
                "RadauTranscription::compute_defect_fun_and_jac called before \
                 prepare_to_optimize completed"
            );
        }
        let (q_vector, par_q) = self.fill_dynamic_defect_con_matrices(func_data, config);
        let func_values = self
            .base
            .defect_nlp_data
            .compute_functions(&q_vector, dec_vector.decision_vector());
        let jacobian = self.base.defect_nlp_data.compute_jacobian(&par_q);
        (func_values, jacobian)
    }

    fn compute_cost_fun_and_jac(
        &self,
        func_data: &[FunctionOutputData],
        config: &ProblemCharacteristics,
    ) -> (DVector<f64>, CsMat<f64>) {
        if !self.base.is_cost_mat_initialized {
            panic!(
                "RadauTranscription::compute_cost_fun_and_jac called before \
                 prepare_to_optimize completed"
            );
        }
        let (q_vector, par_q) = self.fill_dynamic_cost_func_matrices(func_data, config);
        let cost_value = self.base.cost_nlp_data.compute_functions_b_only(&q_vector);
        let jacobian = self.base.cost_nlp_data.compute_jacobian(&par_q);
        (cost_value, jacobian)
    }

    fn compute_defect_sparsity_pattern(&mut self) -> CsMat<f64> {
        self.base.defect_nlp_data.jac_sparsity_pattern()
    }

    fn compute_cost_sparsity_pattern(&mut self) -> CsMat<f64> {
        self.base.cost_nlp_data.jac_sparsity_pattern()
    }

    fn refine_mesh(
        &mut self,
        dec_vector: &DecisionVector,
        manager: &mut UserPathFunctionManager,
        config: &ProblemCharacteristics,
    ) -> MeshRefinementResult {
        let num_states = config.num_state_vars();
        let num_controls = config.num_control_vars();
        let old_fractions = config.mesh_interval_fractions().clone();
        let old_num_points = config.mesh_interval_num_points().to_vec();

        let mut is_mesh_refined = false;
        let mut new_num_points: Vec<usize> = Vec::new();
        let mut new_fraction_values: Vec<f64> = vec![-1.0];
        let mut max_rel_errors: Vec<f64> = Vec::new();
        // accumulated per-interval guesses; outer index interval, inner state var
        let mut state_acc: Vec<Vec<DVector<f64>>> = Vec::new();
        let mut control_acc: Vec<Vec<DVector<f64>>> = Vec::new();

        for interval_idx in 0..config.num_mesh_intervals() {
            let polynomial_degree = old_num_points[interval_idx];
            let max_rel_error =
                self.max_rel_error_in_mesh(interval_idx, dec_vector, manager, config);
            max_rel_errors.push(max_rel_error);
            info!(
                "mesh interval {}: max relative error = {:e}",
                interval_idx, max_rel_error
            );

            let (state_columns, control_columns) =
                self.state_and_control_in_mesh(interval_idx, dec_vector, config, false, false);

            if max_rel_error <= self.base.rel_error_tol {
                // accurate enough, keep the interval as is
                new_num_points.push(polynomial_degree);
                new_fraction_values.push(old_fractions[interval_idx + 1]);
                state_acc.push(state_columns);
                control_acc.push(control_columns);
                continue;
            }

            // grow the degree; split the interval when the degree runs out
            let log_nq = (polynomial_degree as f64).ln();
            let log_error_ratio = (max_rel_error / self.base.rel_error_tol).ln();
            let degree_diff = (log_error_ratio / log_nq).ceil() as usize;
            let new_degree = polynomial_degree + degree_diff.max(1);

            let mut local_fractions: Vec<f64> = vec![-1.0];
            let mut local_num_points: Vec<usize> = Vec::new();
            if new_degree <= self.max_polynomial_degree {
                new_num_points.push(new_degree);
                new_fraction_values.push(old_fractions[interval_idx + 1]);
                local_fractions.push(1.0);
                local_num_points.push(new_degree);
            } else {
                let degree_ratio =
                    (new_degree as f64 / self.min_polynomial_degree as f64).ceil() as usize;
                let num_sub_intervals = degree_ratio.max(2);
                let interval_length =
                    old_fractions[interval_idx + 1] - old_fractions[interval_idx];
                for sub_idx in 0..num_sub_intervals {
                    local_num_points.push(self.min_polynomial_degree);
                    new_num_points.push(self.min_polynomial_degree);
                    local_fractions
                        .push(-1.0 + (sub_idx as f64 + 1.0) * 2.0 / num_sub_intervals as f64);
                    new_fraction_values.push(
                        old_fractions[interval_idx]
                            + (sub_idx as f64 + 1.0) * interval_length / num_sub_intervals as f64,
                    );
                }
            }
            is_mesh_refined = true;

            // interpolate the current solution onto the new local grid
            let local_fraction_vec = DVector::from_vec(local_fractions);
            let (new_local_points, _, _) =
                compute_multi_segment_lgr_nodes(&local_fraction_vec, &local_num_points)
                    .expect("mesh refinement produced an invalid local grid");
            let num_new_points = new_local_points.len();
            let mut interp_points = DVector::zeros(num_new_points - 2);
            for idx in 1..num_new_points - 1 {
                interp_points[idx - 1] = new_local_points[idx];
            }
            let (old_local_nodes, _) = compute_single_seg_lgr_nodes(polynomial_degree - 1);
            let interp =
                BaryLagrangeInterpolator::from_nodes_and_points(&old_local_nodes, &interp_points);

            let mut interval_states: Vec<DVector<f64>> = Vec::with_capacity(num_states);
            for var in 0..num_states {
                let interpolated = interp.interpolate(&state_columns[var]);
                let mut column = DVector::zeros(interpolated.len() + 1);
                column[0] = state_columns[var][0];
                for idx in 0..interpolated.len() {
                    column[idx + 1] = interpolated[idx];
                }
                interval_states.push(column);
            }
            let mut interval_controls: Vec<DVector<f64>> = Vec::with_capacity(num_controls);
            for var in 0..num_controls {
                let interpolated = interp.interpolate(&control_columns[var]);
                let mut column = DVector::zeros(interpolated.len() + 1);
                column[0] = control_columns[var][0];
                for idx in 0..interpolated.len() {
                    column[idx + 1] = interpolated[idx];
                }
                interval_controls.push(column);
            }
            state_acc.push(interval_states);
            control_acc.push(interval_controls);
        }

        // assemble the new guesses
        let num_new_mesh_points: usize = new_num_points.iter().sum::<usize>() + 1;
        let mut new_state_guess = DMatrix::zeros(num_new_mesh_points, num_states);
        let mut new_control_guess = DMatrix::zeros(num_new_mesh_points - 1, num_controls);

        let mut row_counter = 0;
        for interval_idx in 0..state_acc.len() {
            let rows_in_interval = state_acc[interval_idx][0].len();
            for row in 0..rows_in_interval {
                for var in 0..num_states {
                    new_state_guess[(row_counter + row, var)] =
                        state_acc[interval_idx][var][row];
                }
                for var in 0..num_controls {
                    new_control_guess[(row_counter + row, var)] =
                        control_acc[interval_idx][var][row];
                }
            }
            row_counter += rows_in_interval;
        }
        let final_state = dec_vector.state_at_mesh_point(self.base.num_state_points - 1, 0);
        for var in 0..num_states {
            new_state_guess[(num_new_mesh_points - 1, var)] = final_state[var];
        }

        MeshRefinementResult {
            is_mesh_refined,
            new_mesh_interval_num_points: new_num_points,
            new_mesh_interval_fractions: DVector::from_vec(new_fraction_values),
            max_rel_error_array: DVector::from_vec(max_rel_errors),
            new_state_guess,
            new_control_guess,
        }
    }

    fn mesh_index(&self, point_idx: usize) -> usize {
        point_idx
    }

    fn stage_index(&self, _point_idx: usize) -> usize {
        0
    }

    fn dcurrent_time_dti(&self, mesh_idx: usize, _stage_idx: usize) -> f64 {
        (1.0 - self.base.discretization_points[mesh_idx]) / 2.0
    }

    fn dcurrent_time_dtf(&self, mesh_idx: usize, _stage_idx: usize) -> f64 {
        (1.0 + self.base.discretization_points[mesh_idx]) / 2.0
    }

    fn time_at_point(&self, point_idx: usize) -> f64 {
        self.base.time_at_point(point_idx)
    }

    fn time_vector(&self) -> &DVector<f64> {
        &self.base.time_vector
    }

    fn time_vector_type(&self) -> &[PointType] {
        &self.base.time_vector_type
    }

    fn num_time_points(&self) -> usize {
        self.base.num_time_points
    }

    fn num_state_points(&self) -> usize {
        self.base.num_state_points
    }

    fn num_control_points(&self) -> usize {
        self.base.num_control_points
    }

    fn num_path_constraint_points(&self) -> usize {
        self.base.num_path_constraint_points
    }

    fn num_state_stage_points_per_mesh(&self) -> usize {
        self.base.num_state_stage_points_per_mesh
    }

    fn num_control_stage_points_per_mesh(&self) -> usize {
        self.base.num_control_stage_points_per_mesh
    }

    fn defect_matrix_num_nonzeros(&self) -> [usize; 3] {
        self.base.defect_nlp_data.matrix_num_nonzeros()
    }

    fn set_relative_error_tol(&mut self, tol: f64) {
        self.base.rel_error_tol = tol;
    }

    fn set_phase_num(&mut self, phase_num: usize) {
        self.base.phase_num = phase_num;
    }
}
