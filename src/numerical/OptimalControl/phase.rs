//! Phase orchestrator.
//!
//! One Phase owns one decision vector, one problem configuration, one
//! transcription, one user function manager, one guess generator and one
//! scaling utility, all by value - cloning a phase yields a fully
//! independent deep copy. Lifecycle: configure -> initialize() ->
//! prepare_to_optimize() -> optimizer loop (set_decision_vector /
//! constraint + cost getters) -> refine_mesh() -> initialize() again, with
//! is_refining short-circuiting guess generation to the refined guess.
//!
//! Two dirty flags gate recomputation: setting a decision vector marks both
//! only when it actually differs element-wise from the stored one (and
//! rezeroes the cached cost Jacobian so quadrature sums never accumulate
//! across iterations). check_functions() recomputes user functions first,
//! then - in this fixed order - defect constraints, integral cost and
//! algebraic path constraints, then clears the NLP-dirty flag. Result
//! getters called before initialize() return empty data rather than
//! computing.
use crate::numerical::Collocation::alg_path::NLPFuncUtilAlgPath;
use crate::numerical::Collocation::Coll_traits::{PointType, Transcription, TranscriptionScheme};
use crate::numerical::OptimalControl::decision_vector::DecisionVector;
use crate::numerical::OptimalControl::function_data::FunctionOutputData;
use crate::numerical::OptimalControl::guess_generator::{
    GuessGenerator, InitialGuessMode, TrajectoryGuessData, TrajectoryGuessSource,
};
use crate::numerical::OptimalControl::path_function_manager::UserPathFunctionManager;
use crate::numerical::OptimalControl::problem_characteristics::ProblemCharacteristics;
use crate::numerical::OptimalControl::scaling::ScaleUtility;
use crate::numerical::OptimalControl::user_functions::{
    BoundData, FunctionInputData, PathFunctionContainer, UserFunctionProperties, UserPathFunction,
};
use crate::somelinalg::sparse_utils::{to_triplets, vstack_rows, zeros};
use crate::Utils::reports;
use log::info;
use nalgebra::{DMatrix, DVector};
use sprs::CsMat;

#[derive(Clone)]
pub struct Phase {
    config: ProblemCharacteristics,
    dec_vector: DecisionVector,
    trans_util: TranscriptionScheme,
    path_function_manager: UserPathFunctionManager,
    path_function_input_data: FunctionInputData,
    guess_generator: GuessGenerator,
    scale_util: ScaleUtility,
    alg_path_util: NLPFuncUtilAlgPath,
    path_function: Option<Box<dyn UserPathFunction>>,

    user_dyn_function_data: Vec<FunctionOutputData>,
    user_alg_function_data: Vec<FunctionOutputData>,
    cost_int_function_data: Vec<FunctionOutputData>,
    dyn_function_props: Option<UserFunctionProperties>,
    cost_function_props: Option<UserFunctionProperties>,
    alg_function_props: Option<UserFunctionProperties>,

    defect_con_vec: DVector<f64>,
    alg_path_con_vec: DVector<f64>,
    cost_function_integral: f64,
    defect_con_jacobian: CsMat<f64>,
    alg_path_con_jacobian: CsMat<f64>,
    nlp_cost_jacobian: CsMat<f64>,
    con_sparsity_pattern: CsMat<f64>,
    cost_sparsity_pattern: CsMat<f64>,

    num_defect_con_nlp: usize,
    num_alg_path_con_nlp: usize,
    defect_con_lower_bound: DVector<f64>,
    defect_con_upper_bound: DVector<f64>,
    alg_path_con_lower_bound: DVector<f64>,
    alg_path_con_upper_bound: DVector<f64>,
    all_con_lower_bound: DVector<f64>,
    all_con_upper_bound: DVector<f64>,
    decision_vec_lower_bound: DVector<f64>,
    decision_vec_upper_bound: DVector<f64>,
    alg_path_con_vec_names: Vec<String>,

    phase_num: usize,
    initial_guess_mode: InitialGuessMode,
    guess_file_name: String,
    guess_array_data: Option<TrajectoryGuessData>,
    user_guess_source: Option<Box<dyn TrajectoryGuessSource>>,
    relative_error_tol: f64,
    max_rel_error_vec: DVector<f64>,
    new_state_guess: DMatrix<f64>,
    new_control_guess: DMatrix<f64>,

    is_initialized: bool,
    is_refining: bool,
    recompute_user_functions: bool,
    recompute_nlp_functions: bool,
}

impl Phase {
    pub fn new(trans_util: TranscriptionScheme) -> Phase {
        Phase {
            config: ProblemCharacteristics::new(),
            dec_vector: DecisionVector::new(),
            trans_util,
            path_function_manager: UserPathFunctionManager::new(),
            path_function_input_data: FunctionInputData::new(),
            guess_generator: GuessGenerator::new(),
            scale_util: ScaleUtility::new(),
            alg_path_util: NLPFuncUtilAlgPath::new(),
            path_function: None,
            user_dyn_function_data: Vec::new(),
            user_alg_function_data: Vec::new(),
            cost_int_function_data: Vec::new(),
            dyn_function_props: None,
            cost_function_props: None,
            alg_function_props: None,
            defect_con_vec: DVector::zeros(0),
            alg_path_con_vec: DVector::zeros(0),
            cost_function_integral: 0.0,
            defect_con_jacobian: zeros(0, 0),
            alg_path_con_jacobian: zeros(0, 0),
            nlp_cost_jacobian: zeros(0, 0),
            con_sparsity_pattern: zeros(0, 0),
            cost_sparsity_pattern: zeros(0, 0),
            num_defect_con_nlp: 0,
            num_alg_path_con_nlp: 0,
            defect_con_lower_bound: DVector::zeros(0),
            defect_con_upper_bound: DVector::zeros(0),
            alg_path_con_lower_bound: DVector::zeros(0),
            alg_path_con_upper_bound: DVector::zeros(0),
            all_con_lower_bound: DVector::zeros(0),
            all_con_upper_bound: DVector::zeros(0),
            decision_vec_lower_bound: DVector::zeros(0),
            decision_vec_upper_bound: DVector::zeros(0),
            alg_path_con_vec_names: Vec::new(),
            phase_num: 0,
            initial_guess_mode: InitialGuessMode::LinearNoControl,
            guess_file_name: String::new(),
            guess_array_data: None,
            user_guess_source: None,
            relative_error_tol: 1.0e-5,
            max_rel_error_vec: DVector::zeros(0),
            new_state_guess: DMatrix::zeros(0, 0),
            new_control_guess: DMatrix::zeros(0, 0),
            is_initialized: false,
            is_refining: false,
            recompute_user_functions: true,
            recompute_nlp_functions: true,
        }
    }

    // -----------------------------------------------------------------
    // configuration passthroughs
    // -----------------------------------------------------------------

    pub fn config(&self) -> &ProblemCharacteristics {
        &self.config
    }

    pub fn set_num_state_vars(&mut self, num: usize) {
        self.config.set_num_state_vars(num);
    }

    pub fn set_num_control_vars(&mut self, num: usize) {
        self.config.set_num_control_vars(num);
    }

    pub fn set_num_static_vars(&mut self, num: usize) {
        self.config.set_num_static_vars(num);
    }

    pub fn num_state_vars(&self) -> usize {
        self.config.num_state_vars()
    }

    pub fn num_control_vars(&self) -> usize {
        self.config.num_control_vars()
    }

    pub fn num_static_vars(&self) -> usize {
        self.config.num_static_vars()
    }

    pub fn set_mesh_interval_fractions(&mut self, fractions: &DVector<f64>) {
        self.config.set_mesh_interval_fractions(fractions);
    }

    pub fn mesh_interval_fractions(&self) -> &DVector<f64> {
        self.config.mesh_interval_fractions()
    }

    pub fn set_mesh_interval_num_points(&mut self, num_points: &[usize]) {
        self.config.set_mesh_interval_num_points(num_points);
    }

    pub fn mesh_interval_num_points(&self) -> &[usize] {
        self.config.mesh_interval_num_points()
    }

    pub fn set_state_lower_bound(&mut self, bound: &DVector<f64>) {
        self.config.set_state_lower_bound(bound);
    }

    pub fn set_state_upper_bound(&mut self, bound: &DVector<f64>) {
        self.config.set_state_upper_bound(bound);
    }

    pub fn set_control_lower_bound(&mut self, bound: &DVector<f64>) {
        self.config.set_control_lower_bound(bound);
    }

    pub fn set_control_upper_bound(&mut self, bound: &DVector<f64>) {
        self.config.set_control_upper_bound(bound);
    }

    pub fn set_static_lower_bound(&mut self, bound: &DVector<f64>) {
        self.config.set_static_lower_bound(bound);
    }

    pub fn set_static_upper_bound(&mut self, bound: &DVector<f64>) {
        self.config.set_static_upper_bound(bound);
    }

    pub fn set_static_guess(&mut self, guess: &DVector<f64>) {
        self.config.set_static_vector(guess);
    }

    pub fn set_time_lower_bound(&mut self, bound: f64) {
        self.config.set_time_lower_bound(bound);
    }

    pub fn set_time_upper_bound(&mut self, bound: f64) {
        self.config.set_time_upper_bound(bound);
    }

    pub fn set_time_initial_guess(&mut self, guess: f64) {
        self.config.set_time_initial_guess(guess);
    }

    pub fn set_time_final_guess(&mut self, guess: f64) {
        self.config.set_time_final_guess(guess);
    }

    pub fn set_state_initial_guess(&mut self, guess: &DVector<f64>) {
        self.config.set_state_initial_guess(guess);
    }

    pub fn set_state_final_guess(&mut self, guess: &DVector<f64>) {
        self.config.set_state_final_guess(guess);
    }

    pub fn set_path_function(&mut self, path_function: Box<dyn UserPathFunction>) {
        self.path_function = Some(path_function);
    }

    pub fn set_initial_guess_mode(&mut self, mode: InitialGuessMode) {
        self.initial_guess_mode = mode;
    }

    pub fn set_guess_file_name(&mut self, name: &str) {
        self.guess_file_name = name.to_string();
    }

    pub fn set_initial_guess_arrays(
        &mut self,
        times: &DVector<f64>,
        states: &DMatrix<f64>,
        controls: &DMatrix<f64>,
    ) {
        self.guess_array_data = Some(TrajectoryGuessData {
            times: times.clone(),
            states: states.clone(),
            controls: controls.clone(),
        });
    }

    pub fn set_user_guess_source(&mut self, source: Box<dyn TrajectoryGuessSource>) {
        self.user_guess_source = Some(source);
    }

    pub fn set_relative_error_tol(&mut self, tol: f64) {
        self.relative_error_tol = tol;
    }

    pub fn set_phase_number(&mut self, phase_num: usize) {
        self.phase_num = phase_num;
    }

    pub fn phase_number(&self) -> usize {
        self.phase_num
    }

    // -----------------------------------------------------------------
    // lifecycle
    // -----------------------------------------------------------------

    /// Full (re-)initialization. Configuration errors panic; malformed
    /// guess data (bad guess file, non-monotonic sample times) comes back
    /// as Err.
    pub fn initialize(&mut self) -> Result<(), String> {
        self.is_initialized = false;
        self.recompute_user_functions = true;

        self.config.validate_mesh_config();
        self.config.validate_state_properties();
        self.config.validate_control_properties();
        self.config.validate_time_properties();
        self.config.validate_static_properties();

        self.trans_util.initialize(&mut self.config);
        self.initialize_decision_vector();
        self.initialize_time_vector();
        self.initialize_user_functions();
        self.set_problem_characteristics();
        self.set_constraint_properties();
        self.set_initial_guess()?;
        self.set_constraint_bounds();
        self.set_decision_vector_bounds();
        self.initialize_jacobians();
        self.path_function_input_data.initialize(
            self.config.num_state_vars(),
            self.config.num_control_vars(),
            self.config.num_static_vars(),
        );
        self.initialize_nlp_helpers();

        self.trans_util.set_relative_error_tol(self.relative_error_tol);
        self.is_initialized = true;
        Ok(())
    }

    /// To be called after all phases are initialized but before the
    /// optimizer starts: fixes the structural sparsity patterns.
    pub fn prepare_to_optimize(&mut self) {
        self.compute_sparsity_pattern();
    }

    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    // -----------------------------------------------------------------
    // optimizer-facing API
    // -----------------------------------------------------------------

    /// Store a new decision vector; flags recomputation only when the
    /// incoming vector differs element-wise from the stored one.
    pub fn set_decision_vector(&mut self, new_dec_vec: &DVector<f64>) {
        let num_vars_nlp = self.config.num_decision_vars_nlp();
        if new_dec_vec.len() != num_vars_nlp {
            panic!(
                "Phase::set_decision_vector: length of decision vector must be equal to \
                 numDecisionVarsNLP ({}), got {}",
                num_vars_nlp,
                new_dec_vec.len()
            );
        }
        let old_dec_vec = self.dec_vector.decision_vector();
        let is_new = old_dec_vec
            .iter()
            .zip(new_dec_vec.iter())
            .any(|(old, new)| old != new);

        self.dec_vector.set_decision_vector(new_dec_vec);

        let time_vector = self.dec_vector.time_vector();
        self.trans_util.set_time_vector(time_vector[0], time_vector[1]);
        self.config.set_time_initial_guess(time_vector[0]);
        self.config.set_time_final_guess(time_vector[1]);

        if is_new {
            self.recompute_user_functions = true;
            self.recompute_nlp_functions = true;
            // rezero so quadrature terms never sum across iterations
            self.nlp_cost_jacobian = zeros(1, num_vars_nlp);
        }
    }

    pub fn get_dec_vector(&self) -> DVector<f64> {
        self.dec_vector.decision_vector().clone()
    }

    pub fn decision_vector(&self) -> &DecisionVector {
        &self.dec_vector
    }

    /// Assembled constraint vector (defect rows first, then algebraic
    /// path rows). Empty before initialize().
    pub fn get_constraint_vector(&mut self) -> DVector<f64> {
        if !self.is_initialized {
            return DVector::zeros(0);
        }
        self.check_functions();
        let mut result = DVector::zeros(self.config.num_total_con_nlp());
        if self.path_function_manager.has_dyn_functions() {
            for (offset, idx) in (self.defect_con_start_idx()..self.defect_con_end_idx()).enumerate()
            {
                result[idx] = self.defect_con_vec[offset];
            }
        }
        if self.path_function_manager.has_alg_functions() {
            for (offset, idx) in
                (self.alg_path_con_start_idx()..self.alg_path_con_end_idx()).enumerate()
            {
                result[idx] = self.alg_path_con_vec[offset];
            }
        }
        result
    }

    pub fn get_cost_function(&mut self) -> f64 {
        if !self.is_initialized {
            return 0.0;
        }
        self.check_functions();
        let mut cost = 0.0;
        if self.path_function_manager.has_cost_function() {
            cost += self.cost_function_integral;
        }
        cost
    }

    /// Sparse constraint Jacobian (rows follow the constraint vector
    /// ordering).
    pub fn get_con_jacobian(&mut self) -> CsMat<f64> {
        if !self.is_initialized {
            return zeros(0, 0);
        }
        self.check_functions();
        let has_defect = self.config.has_defect_cons();
        let has_alg = self.config.has_alg_path_cons();
        match (has_defect, has_alg) {
            (true, true) => vstack_rows(&[&self.defect_con_jacobian, &self.alg_path_con_jacobian]),
            (true, false) => self.defect_con_jacobian.clone(),
            (false, true) => self.alg_path_con_jacobian.clone(),
            (false, false) => zeros(
                self.config.num_total_con_nlp(),
                self.config.num_decision_vars_nlp(),
            ),
        }
    }

    pub fn get_cost_jacobian(&mut self) -> CsMat<f64> {
        if !self.is_initialized {
            return zeros(0, 0);
        }
        self.check_functions();
        self.nlp_cost_jacobian.clone()
    }

    pub fn get_con_sparsity_pattern(&self) -> CsMat<f64> {
        self.con_sparsity_pattern.clone()
    }

    pub fn get_cost_sparsity_pattern(&self) -> CsMat<f64> {
        self.cost_sparsity_pattern.clone()
    }

    pub fn get_dec_vec_lower_bound(&self) -> &DVector<f64> {
        &self.decision_vec_lower_bound
    }

    pub fn get_dec_vec_upper_bound(&self) -> &DVector<f64> {
        &self.decision_vec_upper_bound
    }

    pub fn get_all_con_lower_bound(&self) -> &DVector<f64> {
        &self.all_con_lower_bound
    }

    pub fn get_all_con_upper_bound(&self) -> &DVector<f64> {
        &self.all_con_upper_bound
    }

    pub fn get_num_total_con_nlp(&self) -> usize {
        self.config.num_total_con_nlp()
    }

    pub fn get_num_decision_vars_nlp(&self) -> usize {
        self.config.num_decision_vars_nlp()
    }

    pub fn get_num_nlp_nonzeros(&self) -> [usize; 3] {
        self.trans_util.defect_matrix_num_nonzeros()
    }

    /// Start of the defect rows in the constraint vector.
    pub fn defect_con_start_idx(&self) -> usize {
        0
    }

    /// One past the last defect row.
    pub fn defect_con_end_idx(&self) -> usize {
        self.num_defect_con_nlp
    }

    pub fn alg_path_con_start_idx(&self) -> usize {
        self.num_defect_con_nlp
    }

    pub fn alg_path_con_end_idx(&self) -> usize {
        self.num_defect_con_nlp + self.num_alg_path_con_nlp
    }

    pub fn has_alg_path_cons(&self) -> bool {
        self.config.has_alg_path_cons()
    }

    /// Human-readable labels for each constraint row.
    pub fn get_constraint_vector_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if self.path_function_manager.has_dyn_functions() {
            let num_states = self.config.num_state_vars();
            let mut mesh_idx = 0;
            let mut state_var = 0;
            for _ in self.defect_con_start_idx()..self.defect_con_end_idx() {
                state_var += 1;
                names.push(format!(
                    "Phase {}, Mesh Index {}: State Variable {}",
                    self.phase_num, mesh_idx, state_var
                ));
                if state_var == num_states {
                    mesh_idx += 1;
                    state_var = 0;
                }
            }
        }
        if self.path_function_manager.has_alg_functions() {
            let num_alg = self.path_function_manager.num_alg_functions();
            let mut mesh_idx = 0;
            let mut alg_fun = 0;
            for _ in self.alg_path_con_start_idx()..self.alg_path_con_end_idx() {
                let label = if self.alg_path_con_vec_names.is_empty() {
                    format!("User Path Constraint {}", alg_fun)
                } else {
                    self.alg_path_con_vec_names[alg_fun].clone()
                };
                names.push(format!(
                    "Phase {}, Mesh Index {}: {}",
                    self.phase_num, mesh_idx, label
                ));
                alg_fun += 1;
                if alg_fun == num_alg {
                    mesh_idx += 1;
                    alg_fun = 0;
                }
            }
        }
        names
    }

    // -----------------------------------------------------------------
    // state/control/time views
    // -----------------------------------------------------------------

    pub fn get_state_array(&self) -> DMatrix<f64> {
        self.dec_vector.state_array()
    }

    pub fn get_control_array(&self) -> DMatrix<f64> {
        self.dec_vector.control_array()
    }

    pub fn set_state_array(&mut self, state_array: &DMatrix<f64>) {
        self.recompute_user_functions = true;
        self.recompute_nlp_functions = true;
        self.dec_vector.set_state_array(state_array);
    }

    pub fn set_control_array(&mut self, control_array: &DMatrix<f64>) {
        self.recompute_user_functions = true;
        self.recompute_nlp_functions = true;
        self.dec_vector.set_control_array(control_array);
    }

    pub fn get_static_vector(&self) -> DVector<f64> {
        self.dec_vector.static_vector()
    }

    pub fn get_time_vector(&self) -> DVector<f64> {
        self.trans_util.time_vector().clone()
    }

    pub fn get_initial_final_time(&self) -> DVector<f64> {
        DVector::from_vec(vec![self.dec_vector.first_time(), self.dec_vector.last_time()])
    }

    pub fn get_first_time(&self) -> f64 {
        self.dec_vector.first_time()
    }

    pub fn get_last_time(&self) -> f64 {
        self.dec_vector.last_time()
    }

    pub fn get_max_rel_error_vec(&self) -> &DVector<f64> {
        &self.max_rel_error_vec
    }

    pub fn dyn_function_props(&self) -> Option<&UserFunctionProperties> {
        self.dyn_function_props.as_ref()
    }

    pub fn cost_function_props(&self) -> Option<&UserFunctionProperties> {
        self.cost_function_props.as_ref()
    }

    pub fn alg_function_props(&self) -> Option<&UserFunctionProperties> {
        self.alg_function_props.as_ref()
    }

    // -----------------------------------------------------------------
    // scaling
    // -----------------------------------------------------------------

    /// Wire the scaling utility to this phase: decision-vector weights from
    /// the bounds, sparsity triplets from the constraint pattern. Call after
    /// prepare_to_optimize().
    pub fn initialize_scale_utility(&mut self) {
        let (rows, cols, _) = to_triplets(&self.con_sparsity_pattern);
        self.scale_util.initialize(
            self.config.num_decision_vars_nlp(),
            self.config.num_total_con_nlp(),
            rows,
            cols,
        );
        self.scale_util.set_dec_vec_scaling_bounds(
            &self.decision_vec_upper_bound,
            &self.decision_vec_lower_bound,
        );
    }

    pub fn scale_utility(&self) -> &ScaleUtility {
        &self.scale_util
    }

    pub fn scale_utility_mut(&mut self) -> &mut ScaleUtility {
        &mut self.scale_util
    }

    // -----------------------------------------------------------------
    // mesh refinement
    // -----------------------------------------------------------------

    /// Run the transcription's mesh refinement. When the mesh changed and
    /// `if_update_mesh` is set, the configuration is updated in place; the
    /// caller then re-runs initialize(), which picks up the refined guess.
    pub fn refine_mesh(&mut self, if_update_mesh: bool) -> bool {
        self.is_refining = true;
        let result = self.trans_util.refine_mesh(
            &self.dec_vector,
            &mut self.path_function_manager,
            &self.config,
        );
        self.max_rel_error_vec = result.max_rel_error_array.clone();
        self.new_state_guess = result.new_state_guess.clone();
        self.new_control_guess = result.new_control_guess.clone();
        if result.is_mesh_refined && if_update_mesh {
            self.config
                .set_mesh_interval_fractions(&result.new_mesh_interval_fractions);
            self.config
                .set_mesh_interval_num_points(&result.new_mesh_interval_num_points);
            self.recompute_user_functions = true;
            self.recompute_nlp_functions = true;
        }
        result.is_mesh_refined
    }

    // -----------------------------------------------------------------
    // recomputation gate
    // -----------------------------------------------------------------

    /// The single recomputation gate: user functions first when stale, then
    /// defect constraints, integral cost and algebraic path constraints in
    /// that order.
    pub fn check_functions(&mut self) {
        if self.recompute_user_functions {
            self.compute_user_functions();
        }
        if self.recompute_nlp_functions {
            if self.config.has_defect_cons() {
                self.compute_defect_constraints();
            }
            if self.path_function_manager.has_cost_function() {
                self.cost_function_integral = 0.0;
                self.compute_integral_cost();
            }
            if self.config.has_alg_path_cons() {
                self.compute_algebraic_path_constraints();
            }
            self.recompute_nlp_functions = false;
        }
    }

    pub fn set_recompute_user_functions(&mut self, flag: bool) {
        self.recompute_user_functions = flag;
    }

    // -----------------------------------------------------------------
    // reports
    // -----------------------------------------------------------------

    pub fn report_bounds_data(&self) {
        let table = reports::bounds_report(
            self.config.state_lower_bound(),
            self.config.state_upper_bound(),
            self.config.control_lower_bound(),
            self.config.control_upper_bound(),
            self.config.static_lower_bound(),
            self.config.static_upper_bound(),
            self.config.time_lower_bound(),
            self.config.time_upper_bound(),
        );
        info!("phase {} bounds:\n{}", self.phase_num, table);
    }

    pub fn report_decision_vector_data(&self) {
        let types = self.trans_util.time_vector_type();
        let has_state: Vec<bool> = types
            .iter()
            .map(|t| matches!(t, PointType::StateAndControl | PointType::StateOnly))
            .collect();
        let has_control: Vec<bool> = types
            .iter()
            .map(|t| matches!(t, PointType::StateAndControl | PointType::ControlOnly))
            .collect();
        let table = reports::decision_vector_report(
            self.trans_util.time_vector(),
            &self.dec_vector.state_array(),
            &self.dec_vector.control_array(),
            &has_state,
            &has_control,
            &self.dec_vector.static_vector(),
        );
        info!("phase {} decision vector:\n{}", self.phase_num, table);
    }

    pub fn report_defect_constraint_data(&self) {
        let table =
            reports::defect_constraint_report(&self.defect_con_vec, self.config.num_state_vars());
        info!("phase {} defect constraints:\n{}", self.phase_num, table);
    }

    // -----------------------------------------------------------------
    // internals
    // -----------------------------------------------------------------

    fn initialize_decision_vector(&mut self) {
        self.dec_vector.initialize(
            self.config.num_state_vars(),
            self.config.num_control_vars(),
            self.config.num_integral_vars(),
            self.config.num_static_vars(),
            self.trans_util.num_state_points(),
            self.trans_util.num_control_points(),
            self.trans_util.num_state_stage_points_per_mesh(),
            self.trans_util.num_control_stage_points_per_mesh(),
        );
        if self.config.num_static_vars() > 0 {
            self.dec_vector.set_static_vector(self.config.static_vector());
        }
    }

    fn initialize_time_vector(&mut self) {
        let time_vector = DVector::from_vec(vec![
            self.config.time_initial_guess(),
            self.config.time_final_guess(),
        ]);
        self.dec_vector.set_time_vector(&time_vector);
        self.trans_util
            .set_time_vector(time_vector[0], time_vector[1]);
    }

    fn initialize_user_functions(&mut self) {
        let path_function = self
            .path_function
            .as_ref()
            .unwrap_or_else(|| panic!("Phase {}: a path function must be set before initialize", self.phase_num))
            .clone();

        self.path_function_input_data.initialize(
            self.config.num_state_vars(),
            self.config.num_control_vars(),
            self.config.num_static_vars(),
        );
        self.path_function_input_data
            .set_state_vector(self.config.state_upper_bound());
        self.path_function_input_data
            .set_time(self.config.time_upper_bound());
        if self.config.num_control_vars() > 0 {
            self.path_function_input_data
                .set_control_vector(self.config.control_upper_bound());
        }
        if self.config.num_static_vars() > 0 {
            self.path_function_input_data
                .set_static_vector(self.config.static_upper_bound());
        }
        self.path_function_input_data.set_phase_num(self.phase_num);

        let bound_data = BoundData {
            state_lower: self.config.state_lower_bound().clone(),
            state_upper: self.config.state_upper_bound().clone(),
            control_lower: self.config.control_lower_bound().clone(),
            control_upper: self.config.control_upper_bound().clone(),
            static_lower: self.config.static_lower_bound().clone(),
            static_upper: self.config.static_upper_bound().clone(),
            time_lower: self.config.time_lower_bound(),
            time_upper: self.config.time_upper_bound(),
        };

        let mut container = PathFunctionContainer::new();
        self.path_function_manager = UserPathFunctionManager::new();
        self.path_function_manager.initialize(
            path_function,
            &mut self.path_function_input_data,
            &mut container,
            &bound_data,
        );
        self.alg_path_con_vec_names = container.alg_data().function_names().to_vec();
    }

    fn set_problem_characteristics(&mut self) {
        if self.path_function_manager.has_alg_functions() {
            self.config.set_has_alg_path_cons(true);
        }
        if self.path_function_manager.has_dyn_functions() {
            self.config.set_has_defect_cons(true);
        }
        if self.path_function_manager.has_cost_function() {
            self.config.set_has_integral_cost(true);
        }
    }

    fn set_constraint_properties(&mut self) {
        self.num_alg_path_con_nlp = self.trans_util.num_path_constraint_points()
            * self.path_function_manager.num_alg_functions();
        self.num_defect_con_nlp = self.config.num_defect_con_nlp();
        self.config
            .set_num_total_con_nlp(self.num_defect_con_nlp + self.num_alg_path_con_nlp);
    }

    fn set_initial_guess(&mut self) -> Result<(), String> {
        if !self.is_refining {
            self.set_initial_guess_from_guess_gen()
        } else {
            self.dec_vector.set_state_array(&self.new_state_guess.clone());
            self.dec_vector
                .set_control_array(&self.new_control_guess.clone());
            Ok(())
        }
    }

    fn set_initial_guess_from_guess_gen(&mut self) -> Result<(), String> {
        self.guess_generator.initialize(
            self.trans_util.time_vector(),
            self.dec_vector.num_state_vars(),
            self.dec_vector.num_state_points(),
            self.dec_vector.num_control_vars(),
            self.dec_vector.num_control_points(),
            self.initial_guess_mode,
        );
        let (state_guess, control_guess) = match self.initial_guess_mode {
            InitialGuessMode::LinearNoControl
            | InitialGuessMode::LinearUnityControl
            | InitialGuessMode::LinearCoast => self.guess_generator.compute_linear_guess(
                self.config.state_initial_guess(),
                self.config.state_final_guess(),
            ),
            InitialGuessMode::UserGuessClass => {
                let source = self
                    .user_guess_source
                    .as_ref()
                    .ok_or_else(|| "UserGuessClass guess mode requires a guess source".to_string())?;
                self.guess_generator.compute_user_function_guess(&**source)?
            }
            InitialGuessMode::OCHFile => self
                .guess_generator
                .compute_guess_from_och_file(&self.guess_file_name)?,
            InitialGuessMode::GuessArrays => {
                let data = self
                    .guess_array_data
                    .as_ref()
                    .ok_or_else(|| "GuessArrays guess mode requires guess arrays".to_string())?;
                self.guess_generator.compute_guess_from_array_data(data)?
            }
        };
        self.dec_vector.set_state_array(&state_guess);
        self.dec_vector.set_control_array(&control_guess);
        Ok(())
    }

    fn set_constraint_bounds(&mut self) {
        // defect constraints are equality constraints at zero
        self.defect_con_lower_bound = DVector::zeros(self.num_defect_con_nlp);
        self.defect_con_upper_bound = DVector::zeros(self.num_defect_con_nlp);

        // path constraint bounds tile per constraint point
        if self.path_function_manager.has_alg_functions() {
            let num_alg = self.path_function_manager.num_alg_functions();
            let lower = self.path_function_manager.alg_functions_lower_bounds().clone();
            let upper = self.path_function_manager.alg_functions_upper_bounds().clone();
            self.alg_path_con_lower_bound = DVector::zeros(self.num_alg_path_con_nlp);
            self.alg_path_con_upper_bound = DVector::zeros(self.num_alg_path_con_nlp);
            let mut low_idx = 0;
            for _ in 0..self.trans_util.num_path_constraint_points() {
                for ii in 0..num_alg {
                    self.alg_path_con_lower_bound[low_idx + ii] = lower[ii];
                    self.alg_path_con_upper_bound[low_idx + ii] = upper[ii];
                }
                low_idx += num_alg;
            }
        } else {
            self.alg_path_con_lower_bound = DVector::zeros(0);
            self.alg_path_con_upper_bound = DVector::zeros(0);
        }

        let total = self.num_defect_con_nlp + self.num_alg_path_con_nlp;
        self.all_con_lower_bound = DVector::zeros(total);
        self.all_con_upper_bound = DVector::zeros(total);
        if self.path_function_manager.has_dyn_functions() {
            for (offset, idx) in (self.defect_con_start_idx()..self.defect_con_end_idx()).enumerate()
            {
                self.all_con_lower_bound[idx] = self.defect_con_lower_bound[offset];
                self.all_con_upper_bound[idx] = self.defect_con_upper_bound[offset];
            }
        }
        if self.path_function_manager.has_alg_functions() {
            for (offset, idx) in
                (self.alg_path_con_start_idx()..self.alg_path_con_end_idx()).enumerate()
            {
                self.all_con_lower_bound[idx] = self.alg_path_con_lower_bound[offset];
                self.all_con_upper_bound[idx] = self.alg_path_con_upper_bound[offset];
            }
        }
    }

    fn set_decision_vector_bounds(&mut self) {
        // a scratch decision vector does the layout bookkeeping
        let mut bound_vector = DecisionVector::new();
        bound_vector.initialize(
            self.config.num_state_vars(),
            self.config.num_control_vars(),
            self.config.num_integral_vars(),
            self.config.num_static_vars(),
            self.trans_util.num_state_points(),
            self.trans_util.num_control_points(),
            self.trans_util.num_state_stage_points_per_mesh(),
            self.trans_util.num_control_stage_points_per_mesh(),
        );

        let num_state_points = bound_vector.num_state_points();
        let num_control_points = bound_vector.num_control_points();
        let tile = |bound: &DVector<f64>, rows: usize| -> DMatrix<f64> {
            DMatrix::from_fn(rows, bound.len(), |_r, c| bound[c])
        };

        let lower_state = tile(self.config.state_lower_bound(), num_state_points);
        let upper_state = tile(self.config.state_upper_bound(), num_state_points);

        bound_vector.set_state_array(&lower_state);
        if self.config.has_control_vars() {
            bound_vector
                .set_control_array(&tile(self.config.control_lower_bound(), num_control_points));
        }
        bound_vector.set_time_vector(&DVector::from_vec(vec![
            self.config.time_lower_bound(),
            self.config.time_lower_bound(),
        ]));
        if self.config.num_static_vars() > 0 {
            bound_vector.set_static_vector(self.config.static_lower_bound());
        }
        self.decision_vec_lower_bound = bound_vector.decision_vector().clone();

        bound_vector.set_state_array(&upper_state);
        if self.config.has_control_vars() {
            bound_vector
                .set_control_array(&tile(self.config.control_upper_bound(), num_control_points));
        }
        bound_vector.set_time_vector(&DVector::from_vec(vec![
            self.config.time_upper_bound(),
            self.config.time_upper_bound(),
        ]));
        if self.config.num_static_vars() > 0 {
            bound_vector.set_static_vector(self.config.static_upper_bound());
        }
        self.decision_vec_upper_bound = bound_vector.decision_vector().clone();
    }

    fn initialize_jacobians(&mut self) {
        let num_vars = self.config.num_decision_vars_nlp();
        self.defect_con_jacobian = zeros(self.num_defect_con_nlp, num_vars);
        self.alg_path_con_jacobian = zeros(self.num_alg_path_con_nlp, num_vars);
        self.nlp_cost_jacobian = zeros(1, num_vars);
    }

    fn initialize_nlp_helpers(&mut self) {
        self.dyn_function_props = if self.path_function_manager.has_dyn_functions() {
            Some(self.path_function_manager.dyn_function_properties())
        } else {
            None
        };
        self.cost_function_props = if self.path_function_manager.has_cost_function() {
            Some(self.path_function_manager.cost_function_properties())
        } else {
            None
        };

        self.compute_user_functions();

        let dyn_props = self
            .dyn_function_props
            .as_ref()
            .unwrap_or_else(|| panic!("Phase {}: the path function defines no dynamics functions", self.phase_num))
            .clone();
        let cost_props = self.cost_function_props.clone();
        if let Some(cost_props) = cost_props.as_ref() {
            self.trans_util.prepare_to_optimize(
                &dyn_props,
                &self.user_dyn_function_data,
                Some(cost_props),
                Some(&self.cost_int_function_data),
                &self.config,
            );
        } else {
            self.trans_util.prepare_to_optimize(
                &dyn_props,
                &self.user_dyn_function_data,
                None,
                None,
                &self.config,
            );
        }
        self.trans_util.set_phase_num(self.phase_num);

        if self.path_function_manager.has_alg_functions() {
            let mut alg_props = self.path_function_manager.alg_function_properties();
            alg_props.set_has_state_vars(self.config.has_state_vars());
            alg_props.set_has_control_vars(self.config.has_control_vars());
            alg_props.set_has_static_vars(self.config.has_static_vars());
            self.alg_function_props = Some(alg_props.clone());

            let num_path_con_points = self.trans_util.num_path_constraint_points();
            let mut d_time_d_ti = DVector::zeros(num_path_con_points);
            let mut d_time_d_tf = DVector::zeros(num_path_con_points);
            for pt_idx in 0..num_path_con_points {
                let mesh_idx = self.user_alg_function_data[pt_idx].mesh_idx();
                let stage_idx = self.user_alg_function_data[pt_idx].stage_idx();
                d_time_d_ti[pt_idx] = self.trans_util.dcurrent_time_dti(mesh_idx, stage_idx);
                d_time_d_tf[pt_idx] = self.trans_util.dcurrent_time_dtf(mesh_idx, stage_idx);
            }
            self.alg_path_util.initialize(
                &alg_props,
                &self.user_alg_function_data,
                self.dec_vector.num_decision_params(),
                num_path_con_points,
                &d_time_d_ti,
                &d_time_d_tf,
            );
        }
    }

    fn compute_user_functions(&mut self) {
        // keep the configuration's static copy in sync with the decision
        // vector before evaluating
        if self.config.num_static_vars() > 0 {
            self.config.set_static_vector(&self.dec_vector.static_vector());
        }
        self.compute_path_functions();
        self.recompute_user_functions = false;
        self.recompute_nlp_functions = true;
    }

    fn compute_path_functions(&mut self) {
        let tv_types = self.trans_util.time_vector_type().to_vec();
        let num_time_points = self.trans_util.num_time_points();

        self.user_dyn_function_data.clear();
        self.user_alg_function_data.clear();
        self.cost_int_function_data.clear();

        let static_idxs = self.dec_vector.static_idxs();

        for point_idx in 0..num_time_points {
            let point_type = tv_types[point_idx];
            let mesh_idx = self.trans_util.mesh_index(point_idx);
            let stage_idx = self.trans_util.stage_index(point_idx);
            let state_idxs = self.dec_vector.state_idxs_at_mesh_point(mesh_idx, stage_idx);
            let control_idxs = self
                .dec_vector
                .control_idxs_at_mesh_point(mesh_idx, stage_idx);

            self.prepare_path_function(mesh_idx, stage_idx, point_type, point_idx);

            let mut container = PathFunctionContainer::new();
            self.path_function_manager
                .evaluate_user_function(&mut self.path_function_input_data, &mut container);
            self.path_function_manager.evaluate_user_jacobian(
                &mut self.path_function_input_data,
                &mut container,
                false,
            );

            if self.path_function_manager.has_dyn_functions() {
                let mut dyn_data = container.dyn_data().clone();
                dyn_data.set_nlp_data(
                    mesh_idx,
                    stage_idx,
                    state_idxs.clone(),
                    control_idxs.clone(),
                    static_idxs.clone(),
                );
                self.user_dyn_function_data.push(dyn_data);
            }
            if self.path_function_manager.has_cost_function() {
                let mut cost_data = container.cost_data().clone();
                cost_data.set_nlp_data(
                    mesh_idx,
                    stage_idx,
                    state_idxs.clone(),
                    control_idxs.clone(),
                    static_idxs.clone(),
                );
                self.cost_int_function_data.push(cost_data);
            }
            if self.path_function_manager.has_alg_functions() {
                let mut alg_data = container.alg_data().clone();
                alg_data.set_nlp_data(
                    mesh_idx,
                    stage_idx,
                    state_idxs.clone(),
                    control_idxs.clone(),
                    static_idxs.clone(),
                );
                self.user_alg_function_data.push(alg_data);
            }
        }
    }

    fn prepare_path_function(
        &mut self,
        mesh_idx: usize,
        stage_idx: usize,
        point_type: PointType,
        point_idx: usize,
    ) {
        self.path_function_input_data.set_phase_num(self.phase_num);
        match point_type {
            PointType::StateAndControl | PointType::StateOnly => {
                self.path_function_input_data
                    .set_state_vector(&self.dec_vector.state_at_mesh_point(mesh_idx, stage_idx));
            }
            PointType::ControlOnly => {
                let nans =
                    DVector::from_element(self.config.num_state_vars(), f64::NAN);
                self.path_function_input_data.set_state_vector(&nans);
            }
        }
        match point_type {
            PointType::StateAndControl | PointType::ControlOnly => {
                self.path_function_input_data.set_control_vector(
                    &self.dec_vector.control_at_mesh_point(mesh_idx, stage_idx),
                );
            }
            PointType::StateOnly => {
                let nans =
                    DVector::from_element(self.config.num_control_vars(), f64::NAN);
                self.path_function_input_data.set_control_vector(&nans);
            }
        }
        self.path_function_input_data
            .set_time(self.trans_util.time_at_point(point_idx));
        self.path_function_input_data
            .set_static_vector(&self.dec_vector.static_vector());
    }

    fn compute_defect_constraints(&mut self) {
        if !self.is_initialized {
            return;
        }
        let (func_values, jacobian) = self.trans_util.compute_defect_fun_and_jac(
            &self.user_dyn_function_data,
            &self.dec_vector,
            &self.config,
        );
        self.defect_con_vec = func_values;
        self.defect_con_jacobian = jacobian;
    }

    fn compute_integral_cost(&mut self) {
        if !self.is_initialized {
            return;
        }
        let (func_values, jacobian) = self
            .trans_util
            .compute_cost_fun_and_jac(&self.cost_int_function_data, &self.config);
        self.cost_function_integral = func_values[0];
        self.nlp_cost_jacobian = jacobian;
    }

    fn compute_algebraic_path_constraints(&mut self) {
        if !self.is_initialized {
            return;
        }
        let (func_values, jacobian) = self
            .alg_path_util
            .compute_func_and_jac(&self.user_alg_function_data);
        self.alg_path_con_vec = func_values;
        self.alg_path_con_jacobian = jacobian;
    }

    fn compute_sparsity_pattern(&mut self) {
        let num_vars = self.config.num_decision_vars_nlp();
        let mut blocks: Vec<CsMat<f64>> = Vec::new();
        if self.config.has_defect_cons() {
            blocks.push(self.trans_util.compute_defect_sparsity_pattern());
        }
        if self.config.has_alg_path_cons() {
            blocks.push(self.alg_path_util.compute_sparsity());
        }
        self.con_sparsity_pattern = match blocks.len() {
            0 => zeros(self.config.num_total_con_nlp(), num_vars),
            1 => blocks[0].clone(),
            _ => vstack_rows(&blocks.iter().collect::<Vec<_>>()),
        };
        self.cost_sparsity_pattern = if self.config.has_integral_cost() {
            self.trans_util.compute_cost_sparsity_pattern()
        } else {
            zeros(1, num_vars)
        };
    }
}
