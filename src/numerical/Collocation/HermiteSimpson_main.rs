//! Hermite-Simpson transcription (Lobatto IIIA, separated form).
//!
//! Every mesh step carries state and control at its start, midpoint and end
//! (endpoints shared between neighboring steps, control present at the
//! terminal phase point). Two defect blocks per step tie the midpoint and
//! end states to the dynamics through the Lobatto IIIA tableau
//!   c = [0, 1/2, 1]
//!   a = [[5/24, 1/3, -1/24],
//!        [ 1/6, 2/3,  1/6]]
//!   b = [1/6, 2/3, 1/6]
//! which is algebraically identical to the classic Hermite interpolation +
//! Simpson quadrature pair. The time grid is normalized to [0, 1]; mesh
//! fractions on any other span are normalized with a logged warning. Mesh
//! refinement estimates the per-step error by Romberg integration of the
//! dynamics along the discrete solution and adds steps to the violating
//! intervals, re-sampling the guess by linear interpolation.
use super::Coll_traits::{CollocationBase, MeshRefinementResult, PointType, Transcription};
use crate::numerical::OptimalControl::decision_vector::DecisionVector;
use crate::numerical::OptimalControl::function_data::FunctionOutputData;
use crate::numerical::OptimalControl::path_function_manager::{
    evaluate_dynamics_off_mesh, UserPathFunctionManager,
};
use crate::numerical::OptimalControl::problem_characteristics::ProblemCharacteristics;
use crate::numerical::OptimalControl::user_functions::{JacobianType, UserFunctionProperties};
use crate::somelinalg::sparse_utils::SparseMatrixBuilder;
use log::{info, warn};
use nalgebra::{DMatrix, DVector};
use sprs::CsMat;

const STAGE_TIMES: [f64; 3] = [0.0, 0.5, 1.0];
const BUTCHER_A: [[f64; 3]; 2] = [
    [5.0 / 24.0, 1.0 / 3.0, -1.0 / 24.0],
    [1.0 / 6.0, 2.0 / 3.0, 1.0 / 6.0],
];
const BUTCHER_B: [f64; 3] = [1.0 / 6.0, 2.0 / 3.0, 1.0 / 6.0];

const NUM_STAGES: usize = 2;
const ROMBERG_DEPTH: usize = 5;
/// refinement never pushes an interval past this many mesh points
const MAX_TOTAL_NODES_PER_INTERVAL: usize = 20;

#[derive(Clone)]
pub struct HermiteSimpsonTranscription {
    base: CollocationBase,
    /// nondimensional step width per step, on the [0, 1] grid
    step_sizes: Vec<f64>,
    num_steps_in_phase: usize,
}

impl HermiteSimpsonTranscription {
    pub fn new() -> HermiteSimpsonTranscription {
        HermiteSimpsonTranscription {
            base: CollocationBase::default(),
            step_sizes: Vec::new(),
            num_steps_in_phase: 0,
        }
    }

    fn point_idx(mesh_idx: usize, stage_idx: usize) -> usize {
        NUM_STAGES * mesh_idx + stage_idx
    }

    /// Normalize mesh fractions to [0, 1], warning when the configured span
    /// differs.
    fn normalize_mesh_fractions(fractions: &DVector<f64>) -> DVector<f64> {
        let n = fractions.len();
        if fractions[0] != 0.0 || fractions[n - 1] != 1.0 {
            warn!(
                "HermiteSimpsonTranscription: mesh fractions span [{}, {}]; normalizing to [0, 1]",
                fractions[0],
                fractions[n - 1]
            );
        }
        let span = fractions[n - 1] - fractions[0];
        let mut normalized = DVector::zeros(n);
        for idx in 1..n {
            normalized[idx] = (fractions[idx] - fractions[0]) / span;
        }
        normalized[n - 1] = 1.0;
        normalized
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

        for step_idx in 0..self.num_steps_in_phase {
            let step_size = self.step_sizes[step_idx];
            for defect_idx in 0..NUM_STAGES {
                let row_start = (NUM_STAGES * step_idx + defect_idx) * num_states;
                for sub_point in 0..NUM_STAGES + 1 {
                    let point = Self::point_idx(step_idx, 0) + sub_point;
                    let state_idxs = dyn_values[point].state_idxs();
                    // A: +1 on the defect's target state, -1 on the step base
                    let coefficient = if sub_point == 0 {
                        -1.0
                    } else if sub_point == defect_idx + 1 {
                        1.0
                    } else {
                        0.0
                    };
                    if coefficient != 0.0 {
                        for state_idx in 0..num_states {
                            self.base.defect_nlp_data.insert_a_element(
                                row_start + state_idx,
                                state_idxs[state_idx],
                                coefficient,
                            );
                        }
                    }
                    // B: step-scaled tableau coefficient over the point's
                    // ODE right-hand-side slot in q
                    let b_value = step_size * BUTCHER_A[defect_idx][sub_point];
                    if b_value != 0.0 {
                        for state_idx in 0..num_states {
                            self.base.defect_nlp_data.insert_b_element(
                                row_start + state_idx,
                                point * num_states + state_idx,
                                b_value,
                            );
                        }
                    }
                }
            }
        }

        // D: per-point dq/dz structure
        let state_pattern = dyn_props.jacobian_pattern(JacobianType::State);
        let control_pattern = dyn_props.jacobian_pattern(JacobianType::Control);
        let static_pattern = dyn_props.jacobian_pattern(JacobianType::Static);
        for (func_idx, data) in dyn_values.iter().enumerate() {
            let row_start = func_idx * num_states;
            for row in 0..num_states {
                self.base.defect_nlp_data.insert_d_element(row_start + row, 0, 1.0);
                self.base.defect_nlp_data.insert_d_element(row_start + row, 1, 1.0);
                if config.has_state_vars() {
                    let state_idxs = data.state_idxs();
                    for col in 0..config.num_state_vars() {
                        if state_pattern[(row, col)] != 0.0 {
                            self.base.defect_nlp_data.insert_d_element(
                                row_start + row,
                                state_idxs[col],
                                state_pattern[(row, col)],
                            );
                        }
                    }
                }
                if config.has_control_vars() {
                    let control_idxs = data.control_idxs();
                    for col in 0..config.num_control_vars() {
                        if control_pattern[(row, col)] != 0.0 {
                            self.base.defect_nlp_data.insert_d_element(
                                row_start + row,
                                control_idxs[col],
                                control_pattern[(row, col)],
                            );
                        }
                    }
                }
                if config.has_static_vars() {
                    let static_idxs = data.static_idxs();
                    for col in 0..config.num_static_vars() {
                        if static_pattern[(row, col)] != 0.0 {
                            self.base.defect_nlp_data.insert_d_element(
                                row_start + row,
                                static_idxs[col],
                                static_pattern[(row, col)],
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
        // B: Simpson weights accumulated per point (shared step endpoints
        // collect contributions from both neighbors)
        for step_idx in 0..self.num_steps_in_phase {
            let step_size = self.step_sizes[step_idx];
            for sub_point in 0..NUM_STAGES + 1 {
                let point = Self::point_idx(step_idx, 0) + sub_point;
                self.base
                    .cost_nlp_data
                    .insert_b_element(0, point, -BUTCHER_B[sub_point] * step_size);
            }
        }

        let state_pattern = cost_props.jacobian_pattern(JacobianType::State);
        let control_pattern = cost_props.jacobian_pattern(JacobianType::Control);
        let static_pattern = cost_props.jacobian_pattern(JacobianType::Static);
        for (func_idx, data) in cost_values.iter().enumerate() {
            self.base.cost_nlp_data.insert_d_element(func_idx, 0, 1.0);
            self.base.cost_nlp_data.insert_d_element(func_idx, 1, 1.0);
            if config.has_state_vars() {
                let state_idxs = data.state_idxs();
                for col in 0..config.num_state_vars() {
                    if state_pattern[(0, col)] != 0.0 {
                        self.base.cost_nlp_data.insert_d_element(
                            func_idx,
                            state_idxs[col],
                            state_pattern[(0, col)],
                        );
                    }
                }
            }
            if config.has_control_vars() {
                let control_idxs = data.control_idxs();
                for col in 0..config.num_control_vars() {
                    if control_pattern[(0, col)] != 0.0 {
                        self.base.cost_nlp_data.insert_d_element(
                            func_idx,
                            control_idxs[col],
                            control_pattern[(0, col)],
                        );
                    }
                }
            }
            if config.has_static_vars() {
                let static_idxs = data.static_idxs();
                for col in 0..config.num_static_vars() {
                    if static_pattern[(0, col)] != 0.0 {
                        self.base.cost_nlp_data.insert_d_element(
                            func_idx,
                            static_idxs[col],
                            static_pattern[(0, col)],
                        );
                    }
                }
            }
        }

        self.base.cost_nlp_data.finalize_matrices();
        self.base.is_cost_mat_initialized = true;
    }

    /// q = -dt*f per point, dq/dz chain-ruled over the D pattern.
    fn fill_dynamic_defect_con_matrices(
        &self,
        func_data: &[FunctionOutputData],
        config: &ProblemCharacteristics,
    ) -> (DVector<f64>, CsMat<f64>) {
        let num_states = config.num_state_vars();
        let delta_time = self.base.delta_time;
        let mut q_vector = DVector::zeros(func_data.len() * num_states);
        let mut par_q = SparseMatrixBuilder::with_pattern_of(self.base.defect_nlp_data.d_matrix());

        for (func_idx, data) in func_data.iter().enumerate() {
            let row_start = func_idx * num_states;
            let d_time_d_ti = self.dcurrent_time_dti(data.mesh_idx(), data.stage_idx());
            let d_time_d_tf = self.dcurrent_time_dtf(data.mesh_idx(), data.stage_idx());
            let func_values = data.function_values();
            let time_jac = data.jacobian(JacobianType::Time);

            for row in 0..num_states {
                q_vector[row_start + row] = -delta_time * func_values[row];

                let ti_term = func_values[row] - delta_time * d_time_d_ti * time_jac[(row, 0)];
                if ti_term != 0.0 {
                    par_q.set_element(row_start + row, 0, ti_term);
                }
                let tf_term = -func_values[row] - delta_time * d_time_d_tf * time_jac[(row, 0)];
                if tf_term != 0.0 {
                    par_q.set_element(row_start + row, 1, tf_term);
                }

                if config.has_state_vars() {
                    let state_jac = data.jacobian(JacobianType::State);
                    let state_idxs = data.state_idxs();
                    for col in 0..state_idxs.len() {
                        let value = state_jac[(row, col)];
                        if value != 0.0 {
                            par_q.set_element(row_start + row, state_idxs[col], -delta_time * value);
                        }
                    }
                }
                if config.has_control_vars() {
                    let control_jac = data.jacobian(JacobianType::Control);
                    let control_idxs = data.control_idxs();
                    for col in 0..control_idxs.len() {
                        let value = control_jac[(row, col)];
                        if value != 0.0 {
                            par_q.set_element(row_start + row, control_idxs[col], -delta_time * value);
                        }
                    }
                }
                if config.has_static_vars() {
                    let static_jac = data.jacobian(JacobianType::Static);
                    let static_idxs = data.static_idxs();
                    for col in 0..static_idxs.len() {
                        let value = static_jac[(row, col)];
                        if value != 0.0 {
                            par_q.set_element(row_start + row, static_idxs[col], -delta_time * value);
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
        let delta_time = self.base.delta_time;
        let mut q_vector = DVector::zeros(func_data.len());
        let mut par_q = SparseMatrixBuilder::with_pattern_of(self.base.cost_nlp_data.d_matrix());

        for (func_idx, data) in func_data.iter().enumerate() {
            let d_time_d_ti = self.dcurrent_time_dti(data.mesh_idx(), data.stage_idx());
            let d_time_d_tf = self.dcurrent_time_dtf(data.mesh_idx(), data.stage_idx());
            let func_values = data.function_values();
            let time_jac = data.jacobian(JacobianType::Time);

            q_vector[func_idx] = -delta_time * func_values[0];

            let ti_term = func_values[0] - delta_time * d_time_d_ti * time_jac[(0, 0)];
            if ti_term != 0.0 {
                par_q.set_element(func_idx, 0, ti_term);
            }
            let tf_term = -func_values[0] - delta_time * d_time_d_tf * time_jac[(0, 0)];
            if tf_term != 0.0 {
                par_q.set_element(func_idx, 1, tf_term);
            }

            if config.has_state_vars() {
                let state_jac = data.jacobian(JacobianType::State);
                let state_idxs = data.state_idxs();
                for col in 0..state_idxs.len() {
                    let value = state_jac[(0, col)];
                    if value != 0.0 {
                        par_q.set_element(func_idx, state_idxs[col], -delta_time * value);
                    }
                }
            }
            if config.has_control_vars() {
                let control_jac = data.jacobian(JacobianType::Control);
                let control_idxs = data.control_idxs();
                for col in 0..control_idxs.len() {
                    let value = control_jac[(0, col)];
                    if value != 0.0 {
                        par_q.set_element(func_idx, control_idxs[col], -delta_time * value);
                    }
                }
            }
            if config.has_static_vars() {
                let static_jac = data.jacobian(JacobianType::Static);
                let static_idxs = data.static_idxs();
                for col in 0..static_idxs.len() {
                    let value = static_jac[(0, col)];
                    if value != 0.0 {
                        par_q.set_element(func_idx, static_idxs[col], -delta_time * value);
                    }
                }
            }
        }
        (q_vector, par_q.build())
    }

    /// Per-interval max relative error: Romberg-integrate the dynamics along
    /// the quadratically interpolated solution of every step and compare to
    /// the discrete state increment.
    fn max_rel_error_in_interval(
        &self,
        first_step: usize,
        num_steps: usize,
        dec_vector: &DecisionVector,
        manager: &mut UserPathFunctionManager,
        config: &ProblemCharacteristics,
    ) -> f64 {
        let num_states = config.num_state_vars();
        let num_controls = config.num_control_vars();
        let num_statics = config.num_static_vars();
        let statics = config.static_vector().clone();
        let delta_time = self.base.delta_time;
        let t0 = self.base.time_vector[0];

        let mut max_rel_error: f64 = 0.0;
        for step in first_step..first_step + num_steps {
            let base_point = NUM_STAGES * step;
            // the three points of this step in nondimensional time
            let taus = [
                self.base.discretization_points[base_point],
                self.base.discretization_points[base_point + 1],
                self.base.discretization_points[base_point + 2],
            ];
            let mut states: Vec<DVector<f64>> = Vec::with_capacity(3);
            let mut controls: Vec<DVector<f64>> = Vec::with_capacity(3);
            for sub in 0..3 {
                let point = base_point + sub;
                let mesh = point / NUM_STAGES;
                let stage = point % NUM_STAGES;
                states.push(dec_vector.state_at_mesh_point(mesh, stage));
                controls.push(if num_controls > 0 {
                    dec_vector.control_at_mesh_point(mesh, stage)
                } else {
                    DVector::zeros(0)
                });
            }

            let integral = romberg_integrate_vector(
                |tau| {
                    let mut state = DVector::zeros(num_states);
                    for var in 0..num_states {
                        state[var] = quadratic_eval(
                            &taus,
                            &[states[0][var], states[1][var], states[2][var]],
                            tau,
                        );
                    }
                    let mut control = DVector::zeros(num_controls);
                    for var in 0..num_controls {
                        control[var] = quadratic_eval(
                            &taus,
                            &[controls[0][var], controls[1][var], controls[2][var]],
                            tau,
                        );
                    }
                    let time = t0 + tau * delta_time;
                    evaluate_dynamics_off_mesh(
                        manager,
                        time,
                        &state,
                        &control,
                        &statics,
                        num_states,
                        num_controls,
                        num_statics,
                    )
                    .scale(delta_time)
                },
                taus[0],
                taus[2],
                num_states,
                ROMBERG_DEPTH,
            );

            for var in 0..num_states {
                let increment = states[2][var] - states[0][var];
                let error = (increment - integral[var]).abs();
                let scale = 1.0
                    + states[0][var]
                        .abs()
                        .max(states[1][var].abs())
                        .max(states[2][var].abs());
                max_rel_error = max_rel_error.max(error / scale);
            }
        }
        max_rel_error
    }
}

impl Transcription for HermiteSimpsonTranscription {
    fn initialize(&mut self, config: &mut ProblemCharacteristics) {
        for (idx, &num_points) in config.mesh_interval_num_points().iter().enumerate() {
            if num_points < 2 {
                panic!(
                    "HermiteSimpsonTranscription: at interval {}, at least 2 mesh points are \
                     required, got {}",
                    idx + 1,
                    num_points
                );
            }
        }

        let fractions = Self::normalize_mesh_fractions(config.mesh_interval_fractions());
        for idx in 1..fractions.len() {
            if fractions[idx] <= fractions[idx - 1] {
                panic!(
                    "HermiteSimpsonTranscription: mesh interval fractions must be strictly \
                     increasing"
                );
            }
        }
        config.set_mesh_interval_fractions(&fractions);

        let mesh_num_points = config.mesh_interval_num_points().to_vec();
        let num_steps: usize = mesh_num_points.iter().map(|&n| n - 1).sum();
        self.num_steps_in_phase = num_steps;
        let total_points = NUM_STAGES * num_steps + 1;

        let mut points = DVector::zeros(total_points);
        let mut step_sizes = Vec::with_capacity(num_steps);
        let mut point_idx = 0;
        for interval_idx in 0..mesh_num_points.len() {
            let duration = fractions[interval_idx + 1] - fractions[interval_idx];
            let step_size = duration / (mesh_num_points[interval_idx] - 1) as f64;
            for _step in 0..mesh_num_points[interval_idx] - 1 {
                step_sizes.push(step_size);
                for stage in 0..NUM_STAGES {
                    point_idx += 1;
                    points[point_idx] = points[point_idx - 1]
                        + step_size * (STAGE_TIMES[stage + 1] - STAGE_TIMES[stage]);
                }
            }
        }
        // remove accumulated roundoff at the terminal point
        points[total_points - 1] = 1.0;
        self.base.discretization_points = points;
        self.step_sizes = step_sizes;

        self.base.num_mesh_points = total_points;
        self.base.num_state_points = num_steps + 1;
        self.base.num_control_points = num_steps + 1;
        self.base.num_path_constraint_points = total_points;
        self.base.num_state_stage_points_per_mesh = 1;
        self.base.num_control_stage_points_per_mesh = 1;
        self.base.quadrature_weights = DVector::from_vec(BUTCHER_B.to_vec());

        self.base.time_vector_type = vec![PointType::StateAndControl; total_points];

        config.set_num_state_vars_nlp(config.num_state_vars() * total_points);
        config.set_num_control_vars_nlp(config.num_control_vars() * total_points);
        config.set_num_defect_con_nlp(config.num_state_vars() * (total_points - 1));
        let num_decision_vars_nlp = config.num_state_vars_nlp()
            + config.num_control_vars_nlp()
            + config.num_time_vars_nlp()
            + config.num_static_vars();
        config.set_num_decision_vars_nlp(num_decision_vars_nlp);

        let num_ode_rhs = total_points * config.num_state_vars();
        self.base.defect_nlp_data.initialize(
            config.num_defect_con_nlp(),
            num_decision_vars_nlp,
            num_ode_rhs,
        );
        self.base
            .cost_nlp_data
            .initialize(1, num_decision_vars_nlp, total_points);

        self.base.is_con_mat_initialized = false;
        self.base.is_cost_mat_initialized = false;
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
        let n = self.base.discretization_points.len();
        let mut time_vector = DVector::zeros(n);
        for idx in 0..n {
            time_vector[idx] =
                self.base.discretization_points[idx] * self.base.delta_time + initial_time;
        }
        self.base.time_vector = time_vector;
        self.base.num_time_points = self.base.num_mesh_points;
    }

    fn compute_defect_fun_and_jac(
        &self,
        func_data: &[FunctionOutputData],
        dec_vector: &DecisionVector,
        config: &ProblemCharacteristics,
    ) -> (DVector<f64>, CsMat<f64>) {
        if !self.base.is_con_mat_initialized {
            panic!(
                "HermiteSimpsonTranscription::compute_defect_fun_and_jac called before \
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
                "HermiteSimpsonTranscription::compute_cost_fun_and_jac called before \
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
        let old_num_points = config.mesh_interval_num_points().to_vec();
        let fractions = config.mesh_interval_fractions().clone();

        let mut is_mesh_refined = false;
        let mut new_num_points = Vec::with_capacity(old_num_points.len());
        let mut max_rel_errors = Vec::with_capacity(old_num_points.len());

        let mut first_step = 0;
        for interval_idx in 0..old_num_points.len() {
            let num_steps = old_num_points[interval_idx] - 1;
            let max_rel_error =
                self.max_rel_error_in_interval(first_step, num_steps, dec_vector, manager, config);
            max_rel_errors.push(max_rel_error);
            info!(
                "mesh interval {}: max relative error = {:e}",
                interval_idx, max_rel_error
            );

            if max_rel_error <= self.base.rel_error_tol {
                new_num_points.push(old_num_points[interval_idx]);
            } else {
                let log_nq = (old_num_points[interval_idx] as f64).ln();
                let log_error_ratio = (max_rel_error / self.base.rel_error_tol).ln();
                let added = ((log_error_ratio / log_nq).ceil() as usize).max(1);
                let proposed = (old_num_points[interval_idx] + added).min(MAX_TOTAL_NODES_PER_INTERVAL);
                if proposed > old_num_points[interval_idx] {
                    is_mesh_refined = true;
                }
                new_num_points.push(proposed);
            }
            first_step += num_steps;
        }

        // sample the current solution onto the refined grid by linear
        // interpolation over the existing discretization points
        let new_num_steps: usize = new_num_points.iter().map(|&n| n - 1).sum();
        let new_total_points = NUM_STAGES * new_num_steps + 1;
        let mut new_taus = DVector::zeros(new_total_points);
        let mut point_idx = 0;
        for interval_idx in 0..new_num_points.len() {
            let duration = fractions[interval_idx + 1] - fractions[interval_idx];
            let step_size = duration / (new_num_points[interval_idx] - 1) as f64;
            for _step in 0..new_num_points[interval_idx] - 1 {
                for stage in 0..NUM_STAGES {
                    point_idx += 1;
                    new_taus[point_idx] = new_taus[point_idx - 1]
                        + step_size * (STAGE_TIMES[stage + 1] - STAGE_TIMES[stage]);
                }
            }
        }
        new_taus[new_total_points - 1] = 1.0;

        let old_taus = &self.base.discretization_points;
        let old_states = dec_vector.state_array();
        let old_controls = dec_vector.control_array();
        let mut new_state_guess = DMatrix::zeros(new_total_points, num_states);
        let mut new_control_guess = DMatrix::zeros(new_total_points, num_controls);
        for row in 0..new_total_points {
            let tau = new_taus[row];
            let (seg, weight) = linear_segment(old_taus, tau);
            for var in 0..num_states {
                new_state_guess[(row, var)] = (1.0 - weight) * old_states[(seg, var)]
                    + weight * old_states[(seg + 1, var)];
            }
            for var in 0..num_controls {
                new_control_guess[(row, var)] = (1.0 - weight) * old_controls[(seg, var)]
                    + weight * old_controls[(seg + 1, var)];
            }
        }

        MeshRefinementResult {
            is_mesh_refined,
            new_mesh_interval_num_points: new_num_points,
            new_mesh_interval_fractions: fractions,
            max_rel_error_array: DVector::from_vec(max_rel_errors),
            new_state_guess,
            new_control_guess,
        }
    }

    fn mesh_index(&self, point_idx: usize) -> usize {
        point_idx / NUM_STAGES
    }

    fn stage_index(&self, point_idx: usize) -> usize {
        point_idx % NUM_STAGES
    }

    fn dcurrent_time_dti(&self, mesh_idx: usize, stage_idx: usize) -> f64 {
        1.0 - self.base.discretization_points[Self::point_idx(mesh_idx, stage_idx)]
    }

    fn dcurrent_time_dtf(&self, mesh_idx: usize, stage_idx: usize) -> f64 {
        self.base.discretization_points[Self::point_idx(mesh_idx, stage_idx)]
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

/// Evaluate the quadratic through (nodes[i], values[i]) at x.
fn quadratic_eval(nodes: &[f64; 3], values: &[f64; 3], x: f64) -> f64 {
    let l0 = (x - nodes[1]) * (x - nodes[2]) / ((nodes[0] - nodes[1]) * (nodes[0] - nodes[2]));
    let l1 = (x - nodes[0]) * (x - nodes[2]) / ((nodes[1] - nodes[0]) * (nodes[1] - nodes[2]));
    let l2 = (x - nodes[0]) * (x - nodes[1]) / ((nodes[2] - nodes[0]) * (nodes[2] - nodes[1]));
    values[0] * l0 + values[1] * l1 + values[2] * l2
}

/// Vector-valued Romberg integration of `eval` over [a, b] with the given
/// extrapolation depth.
fn romberg_integrate_vector<F>(
    mut eval: F,
    a: f64,
    b: f64,
    dim: usize,
    depth: usize,
) -> DVector<f64>
where
    F: FnMut(f64) -> DVector<f64>,
{
    let mut table: Vec<Vec<DVector<f64>>> = Vec::with_capacity(depth);
    let f_a = eval(a);
    let f_b = eval(b);
    let mut trapezoid = (&f_a + &f_b).scale(0.5 * (b - a));
    table.push(vec![trapezoid.clone()]);

    for level in 1..depth {
        let num_new = 1usize << (level - 1);
        let h = (b - a) / (1usize << level) as f64;
        let mut new_sum = DVector::zeros(dim);
        for k in 0..num_new {
            let x = a + (2 * k + 1) as f64 * h;
            new_sum += eval(x);
        }
        trapezoid = table[level - 1][0].scale(0.5) + new_sum.scale(h);
        let mut row = vec![trapezoid.clone()];
        for m in 1..=level {
            let factor = 4f64.powi(m as i32);
            let richardson =
                (row[m - 1].scale(factor) - table[level - 1][m - 1].clone()).scale(1.0 / (factor - 1.0));
            row.push(richardson);
        }
        table.push(row);
    }
    table[depth - 1][depth - 1].clone()
}

/// Locate tau in the old grid and return (segment index, local weight).
fn linear_segment(taus: &DVector<f64>, tau: f64) -> (usize, f64) {
    let n = taus.len();
    if tau <= taus[0] {
        return (0, 0.0);
    }
    if tau >= taus[n - 1] {
        return (n - 2, 1.0);
    }
    let mut seg = 0;
    while seg < n - 2 && taus[seg + 1] <= tau {
        seg += 1;
    }
    let width = taus[seg + 1] - taus[seg];
    (seg, (tau - taus[seg]) / width)
}
