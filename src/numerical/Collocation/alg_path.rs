//! Algebraic path-constraint NLP utility.
//!
//! Path constraints are pointwise, so A is identically zero, B is the
//! identity over the stacked per-point function values and D holds the
//! per-point Jacobian patterns. Time columns use the dTau/dt0 and dTau/dtf
//! arrays precomputed by the transcription for the constraint points.
use super::nlp_function_data::NlpFunctionData;
use crate::numerical::OptimalControl::function_data::FunctionOutputData;
use crate::numerical::OptimalControl::user_functions::{JacobianType, UserFunctionProperties};
use crate::somelinalg::sparse_utils::SparseMatrixBuilder;
use nalgebra::DVector;
use sprs::CsMat;

#[derive(Clone)]
pub struct NLPFuncUtilAlgPath {
    num_function_points: usize,
    num_functions_per_point: usize,
    num_functions: usize,
    num_decision_params: usize,
    has_state_vars: bool,
    has_control_vars: bool,
    has_static_vars: bool,
    d_time_d_ti: DVector<f64>,
    d_time_d_tf: DVector<f64>,
    data_func_util: NlpFunctionData,
}

impl Default for NLPFuncUtilAlgPath {
    fn default() -> Self {
        NLPFuncUtilAlgPath {
            num_function_points: 0,
            num_functions_per_point: 0,
            num_functions: 0,
            num_decision_params: 0,
            has_state_vars: false,
            has_control_vars: false,
            has_static_vars: false,
            d_time_d_ti: DVector::zeros(0),
            d_time_d_tf: DVector::zeros(0),
            data_func_util: NlpFunctionData::new(),
        }
    }
}

impl NLPFuncUtilAlgPath {
    pub fn new() -> NLPFuncUtilAlgPath {
        NLPFuncUtilAlgPath::default()
    }

    pub fn initialize(
        &mut self,
        func_props: &UserFunctionProperties,
        func_data: &[FunctionOutputData],
        num_decision_params: usize,
        num_func_points: usize,
        d_time_d_ti: &DVector<f64>,
        d_time_d_tf: &DVector<f64>,
    ) {
        self.num_function_points = num_func_points;
        self.num_functions_per_point = func_props.num_functions();
        self.num_functions = self.num_functions_per_point * num_func_points;
        self.num_decision_params = num_decision_params;
        self.has_state_vars = func_props.has_state_vars();
        self.has_control_vars = func_props.has_control_vars();
        self.has_static_vars = func_props.has_static_vars();
        self.d_time_d_ti = d_time_d_ti.clone();
        self.d_time_d_tf = d_time_d_tf.clone();

        self.data_func_util
            .initialize(self.num_functions, num_decision_params, self.num_functions);
        self.initialize_constant_nlp_matrices(func_props, func_data);
    }

    fn initialize_constant_nlp_matrices(
        &mut self,
        func_props: &UserFunctionProperties,
        func_data: &[FunctionOutputData],
    ) {
        // A is all zeros; B is the identity over stacked point functions
        let state_pattern = func_props.jacobian_pattern(JacobianType::State);
        let control_pattern = func_props.jacobian_pattern(JacobianType::Control);
        let time_pattern = func_props.jacobian_pattern(JacobianType::Time);
        let static_pattern = func_props.jacobian_pattern(JacobianType::Static);

        let mut low_idx = 0;
        for point_idx in 0..self.num_function_points {
            for func_idx in 0..self.num_functions_per_point {
                self.data_func_util
                    .insert_b_element(low_idx + func_idx, low_idx + func_idx, 1.0);
            }

            if self.has_state_vars {
                let state_idxs = func_data[point_idx].state_idxs();
                for row in 0..state_pattern.nrows() {
                    for col in 0..state_pattern.ncols() {
                        if state_pattern[(row, col)] != 0.0 {
                            self.data_func_util.insert_d_element(
                                low_idx + row,
                                state_idxs[col],
                                1.0,
                            );
                        }
                    }
                }
            }
            if self.has_control_vars {
                let control_idxs = func_data[point_idx].control_idxs();
                for row in 0..control_pattern.nrows() {
                    for col in 0..control_pattern.ncols() {
                        if control_pattern[(row, col)] != 0.0 {
                            self.data_func_util.insert_d_element(
                                low_idx + row,
                                control_idxs[col],
                                1.0,
                            );
                        }
                    }
                }
            }
            if self.has_static_vars {
                let static_idxs = func_data[point_idx].static_idxs();
                for row in 0..static_pattern.nrows() {
                    for col in 0..static_pattern.ncols() {
                        if static_pattern[(row, col)] != 0.0 {
                            self.data_func_util.insert_d_element(
                                low_idx + row,
                                static_idxs[col],
                                1.0,
                            );
                        }
                    }
                }
            }
            for row in 0..time_pattern.nrows() {
                if time_pattern[(row, 0)] != 0.0 {
                    self.data_func_util.insert_d_element(low_idx + row, 0, 1.0);
                    self.data_func_util.insert_d_element(low_idx + row, 1, 1.0);
                }
            }

            low_idx += self.num_functions_per_point;
        }

        self.data_func_util.finalize_matrices();
    }

    pub fn compute_func_and_jac(
        &self,
        func_data: &[FunctionOutputData],
    ) -> (DVector<f64>, CsMat<f64>) {
        let (q_vector, par_q) = self.fill_user_nlp_matrices(func_data);
        let func_values = self.data_func_util.compute_functions_b_only(&q_vector);
        let jacobian = self.data_func_util.compute_jacobian(&par_q);
        (func_values, jacobian)
    }

    pub fn compute_sparsity(&mut self) -> CsMat<f64> {
        self.data_func_util.jac_sparsity_pattern()
    }

    pub fn matrix_num_nonzeros(&self) -> [usize; 3] {
        self.data_func_util.matrix_num_nonzeros()
    }

    fn fill_user_nlp_matrices(
        &self,
        func_data: &[FunctionOutputData],
    ) -> (DVector<f64>, CsMat<f64>) {
        let mut q_vector = DVector::zeros(self.num_functions);
        let mut par_q = SparseMatrixBuilder::with_pattern_of(self.data_func_util.d_matrix());

        let mut low_idx = 0;
        for point_idx in 0..self.num_function_points {
            let data = &func_data[point_idx];
            let func_values = data.function_values();
            let time_jac = data.jacobian(JacobianType::Time);

            for func_idx in 0..self.num_functions_per_point {
                q_vector[low_idx + func_idx] = func_values[func_idx];

                if self.has_state_vars {
                    let state_jac = data.jacobian(JacobianType::State);
                    let state_idxs = data.state_idxs();
                    for col in 0..state_idxs.len() {
                        let value = state_jac[(func_idx, col)];
                        if value != 0.0 {
                            par_q.set_element(low_idx + func_idx, state_idxs[col], value);
                        }
                    }
                }
                if self.has_control_vars {
                    let control_jac = data.jacobian(JacobianType::Control);
                    let control_idxs = data.control_idxs();
                    for col in 0..control_idxs.len() {
                        let value = control_jac[(func_idx, col)];
                        if value != 0.0 {
                            par_q.set_element(low_idx + func_idx, control_idxs[col], value);
                        }
                    }
                }
                if self.has_static_vars {
                    let static_jac = data.jacobian(JacobianType::Static);
                    let static_idxs = data.static_idxs();
                    for col in 0..static_idxs.len() {
                        let value = static_jac[(func_idx, col)];
                        if value != 0.0 {
                            par_q.set_element(low_idx + func_idx, static_idxs[col], value);
                        }
                    }
                }

                let ti_value = time_jac[(func_idx, 0)] * self.d_time_d_ti[point_idx];
                if ti_value != 0.0 {
                    par_q.set_element(low_idx + func_idx, 0, ti_value);
                }
                let tf_value = time_jac[(func_idx, 0)] * self.d_time_d_tf[point_idx];
                if tf_value != 0.0 {
                    par_q.set_element(low_idx + func_idx, 1, tf_value);
                }
            }
            low_idx += self.num_functions_per_point;
        }
        (q_vector, par_q.build())
    }
}
