//! Per-point user function output: values, Jacobians and NLP bookkeeping.
//!
//! One FunctionOutputData instance holds everything the transcription needs
//! about one function type (dynamics, algebraic, or cost integrand) at one
//! discretization point: function values, the analytic or finite-differenced
//! Jacobians with respect to state/control/time/static variables, optional
//! bounds (algebraic constraints only), and the global decision-vector
//! column indices used to scatter the per-point Jacobian block into the
//! phase-level sparse Jacobian. Jacobian blocks are stored as Options and
//! every accessor panics if a block is requested before it was set - the
//! manager always sets all four blocks (finite differencing whatever the
//! user did not supply), so a panic here means a usage-sequence bug.
use super::user_functions::JacobianType;
use nalgebra::{DMatrix, DVector};

#[derive(Debug, Clone)]
pub struct FunctionOutputData {
    has_user_function: bool,
    num_functions: usize,
    is_initializing: bool,
    function_values: DVector<f64>,
    function_names: Vec<String>,
    upper_bounds: DVector<f64>,
    lower_bounds: DVector<f64>,
    upper_bounds_set: bool,
    lower_bounds_set: bool,
    state_jacobian: Option<DMatrix<f64>>,
    control_jacobian: Option<DMatrix<f64>>,
    time_jacobian: Option<DMatrix<f64>>,
    static_jacobian: Option<DMatrix<f64>>,
    has_user_state_jacobian: bool,
    has_user_control_jacobian: bool,
    has_user_time_jacobian: bool,
    has_user_static_jacobian: bool,
    mesh_idx: usize,
    stage_idx: usize,
    state_idxs: Vec<usize>,
    control_idxs: Vec<usize>,
    static_idxs: Vec<usize>,
}

impl Default for FunctionOutputData {
    fn default() -> Self {
        FunctionOutputData {
            has_user_function: false,
            num_functions: 0,
            is_initializing: true,
            function_values: DVector::zeros(0),
            function_names: Vec::new(),
            upper_bounds: DVector::zeros(0),
            lower_bounds: DVector::zeros(0),
            upper_bounds_set: false,
            lower_bounds_set: false,
            state_jacobian: None,
            control_jacobian: None,
            time_jacobian: None,
            static_jacobian: None,
            has_user_state_jacobian: false,
            has_user_control_jacobian: false,
            has_user_time_jacobian: false,
            has_user_static_jacobian: false,
            mesh_idx: 0,
            stage_idx: 0,
            state_idxs: Vec::new(),
            control_idxs: Vec::new(),
            static_idxs: Vec::new(),
        }
    }
}

impl FunctionOutputData {
    pub fn new() -> FunctionOutputData {
        FunctionOutputData::default()
    }

    /// Set the function values. The first call (while initializing) fixes
    /// the function count; later calls must match it.
    pub fn set_functions(&mut self, func_values: &DVector<f64>) {
        if self.is_initializing {
            self.has_user_function = true;
            self.num_functions = func_values.len();
        } else if func_values.len() != self.num_functions {
            panic!(
                "FunctionOutputData::set_functions: got {} values but {} functions were declared",
                func_values.len(),
                self.num_functions
            );
        }
        self.function_values = func_values.clone();
    }

    pub fn set_num_functions(&mut self, num_functions: usize) {
        self.num_functions = num_functions;
        self.has_user_function = num_functions > 0;
    }

    pub fn set_is_initializing(&mut self, is_initializing: bool) {
        self.is_initializing = is_initializing;
    }

    pub fn is_initializing(&self) -> bool {
        self.is_initializing
    }

    pub fn has_user_function(&self) -> bool {
        self.has_user_function
    }

    pub fn num_functions(&self) -> usize {
        self.num_functions
    }

    pub fn function_values(&self) -> &DVector<f64> {
        &self.function_values
    }

    pub fn set_function_names(&mut self, names: Vec<String>) {
        self.function_names = names;
    }

    pub fn function_names(&self) -> &[String] {
        &self.function_names
    }

    pub fn set_upper_bounds(&mut self, upper: &DVector<f64>) {
        if !self.is_initializing && upper.len() != self.num_functions {
            panic!(
                "FunctionOutputData::set_upper_bounds: got {} bounds for {} functions",
                upper.len(),
                self.num_functions
            );
        }
        self.upper_bounds = upper.clone();
        self.upper_bounds_set = true;
    }

    pub fn set_lower_bounds(&mut self, lower: &DVector<f64>) {
        if !self.is_initializing && lower.len() != self.num_functions {
            panic!(
                "FunctionOutputData::set_lower_bounds: got {} bounds for {} functions",
                lower.len(),
                self.num_functions
            );
        }
        self.lower_bounds = lower.clone();
        self.lower_bounds_set = true;
    }

    pub fn upper_bounds(&self) -> &DVector<f64> {
        &self.upper_bounds
    }

    pub fn lower_bounds(&self) -> &DVector<f64> {
        &self.lower_bounds
    }

    pub fn bounds_set(&self) -> bool {
        self.upper_bounds_set && self.lower_bounds_set
    }

    /// Store a Jacobian block. While initializing, this also marks the block
    /// as user-supplied (analytic) so the manager skips finite differencing
    /// for it afterwards.
    pub fn set_jacobian(&mut self, jac_type: JacobianType, jacobian: &DMatrix<f64>) {
        if !self.is_initializing && jacobian.nrows() != self.num_functions {
            panic!(
                "FunctionOutputData::set_jacobian: {} Jacobian has {} rows but {} functions were declared",
                jac_type,
                jacobian.nrows(),
                self.num_functions
            );
        }
        if self.is_initializing {
            match jac_type {
                JacobianType::State => self.has_user_state_jacobian = true,
                JacobianType::Control => self.has_user_control_jacobian = true,
                JacobianType::Time => self.has_user_time_jacobian = true,
                JacobianType::Static => self.has_user_static_jacobian = true,
            }
        }
        match jac_type {
            JacobianType::State => self.state_jacobian = Some(jacobian.clone()),
            JacobianType::Control => self.control_jacobian = Some(jacobian.clone()),
            JacobianType::Time => self.time_jacobian = Some(jacobian.clone()),
            JacobianType::Static => self.static_jacobian = Some(jacobian.clone()),
        }
    }

    pub fn jacobian(&self, jac_type: JacobianType) -> &DMatrix<f64> {
        let block = match jac_type {
            JacobianType::State => &self.state_jacobian,
            JacobianType::Control => &self.control_jacobian,
            JacobianType::Time => &self.time_jacobian,
            JacobianType::Static => &self.static_jacobian,
        };
        block.as_ref().unwrap_or_else(|| {
            panic!(
                "FunctionOutputData: {} Jacobian requested before it was set",
                jac_type
            )
        })
    }

    pub fn has_user_jacobian(&self, jac_type: JacobianType) -> bool {
        match jac_type {
            JacobianType::State => self.has_user_state_jacobian,
            JacobianType::Control => self.has_user_control_jacobian,
            JacobianType::Time => self.has_user_time_jacobian,
            JacobianType::Static => self.has_user_static_jacobian,
        }
    }

    /// Zero-fill any Jacobian block that has not been set yet, given the
    /// variable counts. Declared-but-never-set blocks therefore contribute
    /// exact zeros instead of undefined data.
    pub fn zero_fill_missing_jacobians(
        &mut self,
        num_state_vars: usize,
        num_control_vars: usize,
        num_static_vars: usize,
    ) {
        let nf = self.num_functions;
        if self.state_jacobian.is_none() {
            self.state_jacobian = Some(DMatrix::zeros(nf, num_state_vars));
        }
        if self.control_jacobian.is_none() {
            self.control_jacobian = Some(DMatrix::zeros(nf, num_control_vars));
        }
        if self.time_jacobian.is_none() {
            self.time_jacobian = Some(DMatrix::zeros(nf, 1));
        }
        if self.static_jacobian.is_none() {
            self.static_jacobian = Some(DMatrix::zeros(nf, num_static_vars));
        }
    }

    /// Record where this point's variables live in the decision vector.
    pub fn set_nlp_data(
        &mut self,
        mesh_idx: usize,
        stage_idx: usize,
        state_idxs: Vec<usize>,
        control_idxs: Vec<usize>,
        static_idxs: Vec<usize>,
    ) {
        self.mesh_idx = mesh_idx;
        self.stage_idx = stage_idx;
        self.state_idxs = state_idxs;
        self.control_idxs = control_idxs;
        self.static_idxs = static_idxs;
    }

    pub fn mesh_idx(&self) -> usize {
        self.mesh_idx
    }

    pub fn stage_idx(&self) -> usize {
        self.stage_idx
    }

    pub fn state_idxs(&self) -> &[usize] {
        &self.state_idxs
    }

    pub fn control_idxs(&self) -> &[usize] {
        &self.control_idxs
    }

    pub fn static_idxs(&self) -> &[usize] {
        &self.static_idxs
    }
}
