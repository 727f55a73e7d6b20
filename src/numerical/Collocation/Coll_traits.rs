//! The transcription contract shared by all collocation schemes.
//!
//! A transcription owns the discretization time grid and the constant
//! Betts matrices, and follows a two-phase initialization contract:
//!   1. initialize(config)        - sizes the discretization, sets point
//!      counts and the NLP-side counts on the configuration. Must be called
//!      before anything else.
//!   2. prepare_to_optimize(...)  - given the user function properties and
//!      one representative evaluation at every point, builds the constant
//!      A/B/D matrices. Must be repeated whenever the mesh changes.
//! Computing functions or Jacobians before step 2 completes is a programmer
//! error and panics. Dispatch over the concrete schemes goes through the
//! TranscriptionScheme enum rather than boxed trait objects, which keeps
//! the phase deep-clonable by plain derive.
use super::nlp_function_data::NlpFunctionData;
use super::HermiteSimpson_main::HermiteSimpsonTranscription;
use super::Radau_main::RadauTranscription;
use crate::numerical::OptimalControl::decision_vector::DecisionVector;
use crate::numerical::OptimalControl::function_data::FunctionOutputData;
use crate::numerical::OptimalControl::path_function_manager::UserPathFunctionManager;
use crate::numerical::OptimalControl::problem_characteristics::ProblemCharacteristics;
use crate::numerical::OptimalControl::user_functions::UserFunctionProperties;
use enum_dispatch::enum_dispatch;
use nalgebra::{DMatrix, DVector};
use sprs::CsMat;

/// What kind of decision data a discretization point carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointType {
    StateAndControl,
    StateOnly,
    ControlOnly,
}

/// Everything refine_mesh reports back to the phase.
#[derive(Debug, Clone)]
pub struct MeshRefinementResult {
    pub is_mesh_refined: bool,
    pub new_mesh_interval_num_points: Vec<usize>,
    pub new_mesh_interval_fractions: DVector<f64>,
    pub max_rel_error_array: DVector<f64>,
    pub new_state_guess: DMatrix<f64>,
    pub new_control_guess: DMatrix<f64>,
}

/// Discretization state and constant-matrix containers shared by every
/// scheme.
#[derive(Clone)]
pub struct CollocationBase {
    pub discretization_points: DVector<f64>,
    pub time_vector: DVector<f64>,
    pub quadrature_weights: DVector<f64>,
    pub time_vector_type: Vec<PointType>,
    pub num_mesh_points: usize,
    pub num_state_points: usize,
    pub num_control_points: usize,
    pub num_path_constraint_points: usize,
    pub num_time_points: usize,
    pub num_state_stage_points_per_mesh: usize,
    pub num_control_stage_points_per_mesh: usize,
    pub delta_time: f64,
    pub phase_num: usize,
    pub rel_error_tol: f64,
    pub defect_nlp_data: NlpFunctionData,
    pub cost_nlp_data: NlpFunctionData,
    pub is_con_mat_initialized: bool,
    pub is_cost_mat_initialized: bool,
}

impl Default for CollocationBase {
    fn default() -> Self {
        CollocationBase {
            discretization_points: DVector::zeros(0),
            time_vector: DVector::zeros(0),
            quadrature_weights: DVector::zeros(0),
            time_vector_type: Vec::new(),
            num_mesh_points: 0,
            num_state_points: 0,
            num_control_points: 0,
            num_path_constraint_points: 0,
            num_time_points: 0,
            num_state_stage_points_per_mesh: 0,
            num_control_stage_points_per_mesh: 0,
            delta_time: 0.0,
            phase_num: 0,
            rel_error_tol: 1.0e-5,
            defect_nlp_data: NlpFunctionData::new(),
            cost_nlp_data: NlpFunctionData::new(),
            is_con_mat_initialized: false,
            is_cost_mat_initialized: false,
        }
    }
}

impl CollocationBase {
    pub fn time_at_point(&self, point_idx: usize) -> f64 {
        if point_idx >= self.time_vector.len() {
            panic!(
                "CollocationBase::time_at_point: point index {} exceeds the number of \
                 elements in the time vector ({})",
                point_idx,
                self.time_vector.len()
            );
        }
        self.time_vector[point_idx]
    }
}

#[enum_dispatch]
pub trait Transcription {
    /// First half of initialization: compute the discretization and set the
    /// NLP-side dimension data on the configuration.
    fn initialize(&mut self, config: &mut ProblemCharacteristics);

    /// Second half: build the constant A/B/D matrices from the user function
    /// properties and one evaluation per discretization point.
    fn prepare_to_optimize(
        &mut self,
        dyn_props: &UserFunctionProperties,
        dyn_values: &[FunctionOutputData],
        cost_props: Option<&UserFunctionProperties>,
        cost_values: Option<&[FunctionOutputData]>,
        config: &ProblemCharacteristics,
    );

    /// Dimensionalize the time grid for the current phase times.
    fn set_time_vector(&mut self, initial_time: f64, final_time: f64);

    /// Defect constraint vector and sparse Jacobian at the current point.
    fn compute_defect_fun_and_jac(
        &self,
        func_data: &[FunctionOutputData],
        dec_vector: &DecisionVector,
        config: &ProblemCharacteristics,
    ) -> (DVector<f64>, CsMat<f64>);

    /// Quadrature cost (1-vector) and its sparse gradient row.
    fn compute_cost_fun_and_jac(
        &self,
        func_data: &[FunctionOutputData],
        config: &ProblemCharacteristics,
    ) -> (DVector<f64>, CsMat<f64>);

    fn compute_defect_sparsity_pattern(&mut self) -> CsMat<f64>;

    fn compute_cost_sparsity_pattern(&mut self) -> CsMat<f64>;

    /// Estimate per-interval transcription error and propose a new mesh
    /// with an interpolated initial guess.
    fn refine_mesh(
        &mut self,
        dec_vector: &DecisionVector,
        manager: &mut UserPathFunctionManager,
        config: &ProblemCharacteristics,
    ) -> MeshRefinementResult;

    fn mesh_index(&self, point_idx: usize) -> usize;

    fn stage_index(&self, point_idx: usize) -> usize;

    /// Partial of the (nondimensional) time at a point with respect to the
    /// phase initial time.
    fn dcurrent_time_dti(&self, mesh_idx: usize, stage_idx: usize) -> f64;

    /// Partial with respect to the phase final time.
    fn dcurrent_time_dtf(&self, mesh_idx: usize, stage_idx: usize) -> f64;

    fn time_at_point(&self, point_idx: usize) -> f64;

    fn time_vector(&self) -> &DVector<f64>;

    fn time_vector_type(&self) -> &[PointType];

    fn num_time_points(&self) -> usize;

    fn num_state_points(&self) -> usize;

    fn num_control_points(&self) -> usize;

    fn num_path_constraint_points(&self) -> usize;

    fn num_state_stage_points_per_mesh(&self) -> usize;

    fn num_control_stage_points_per_mesh(&self) -> usize;

    fn defect_matrix_num_nonzeros(&self) -> [usize; 3];

    fn set_relative_error_tol(&mut self, tol: f64);

    fn set_phase_num(&mut self, phase_num: usize);
}

/// The available transcription schemes.
#[enum_dispatch(Transcription)]
#[derive(Clone)]
pub enum TranscriptionScheme {
    Radau(RadauTranscription),
    HermiteSimpson(HermiteSimpsonTranscription),
}
