//! The user function callback contract.
//!
//! A problem author implements UserPathFunction for their own type:
//! evaluate_functions must set the dynamics vector (and, when present, the
//! algebraic path constraint values with their bounds and/or the scalar cost
//! integrand) on the output container; evaluate_jacobians may set any
//! analytic Jacobian blocks - whatever is left unset is finite-differenced
//! by the manager. The same object is evaluated at every discretization
//! point with fresh FunctionInputData, so implementations should be pure
//! functions of the inputs.
use super::function_data::FunctionOutputData;
use nalgebra::{DMatrix, DVector};
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum FunctionType {
    Dynamics,
    Algebraic,
    Cost,
}

pub const ALL_FUNCTION_TYPES: [FunctionType; 3] = [
    FunctionType::Dynamics,
    FunctionType::Algebraic,
    FunctionType::Cost,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum JacobianType {
    State,
    Control,
    Time,
    Static,
}

pub const ALL_JACOBIAN_TYPES: [JacobianType; 4] = [
    JacobianType::State,
    JacobianType::Control,
    JacobianType::Time,
    JacobianType::Static,
];

/// Inputs handed to the user function at one evaluation point.
#[derive(Debug, Clone)]
pub struct FunctionInputData {
    state_vector: DVector<f64>,
    control_vector: DVector<f64>,
    static_vector: DVector<f64>,
    time: f64,
    phase_num: usize,
    num_state_vars: usize,
    num_control_vars: usize,
    num_static_vars: usize,
    is_perturbing: bool,
    is_sparsity: bool,
}

impl Default for FunctionInputData {
    fn default() -> Self {
        FunctionInputData {
            state_vector: DVector::zeros(0),
            control_vector: DVector::zeros(0),
            static_vector: DVector::zeros(0),
            time: 0.0,
            phase_num: 0,
            num_state_vars: 0,
            num_control_vars: 0,
            num_static_vars: 0,
            is_perturbing: false,
            is_sparsity: false,
        }
    }
}

impl FunctionInputData {
    pub fn new() -> FunctionInputData {
        FunctionInputData::default()
    }

    pub fn initialize(&mut self, num_state_vars: usize, num_control_vars: usize, num_static_vars: usize) {
        self.num_state_vars = num_state_vars;
        self.num_control_vars = num_control_vars;
        self.num_static_vars = num_static_vars;
        self.state_vector = DVector::zeros(num_state_vars);
        self.control_vector = DVector::zeros(num_control_vars);
        self.static_vector = DVector::zeros(num_static_vars);
    }

    pub fn set_state_vector(&mut self, state: &DVector<f64>) {
        self.state_vector = state.clone();
    }

    pub fn set_control_vector(&mut self, control: &DVector<f64>) {
        self.control_vector = control.clone();
    }

    pub fn set_static_vector(&mut self, statics: &DVector<f64>) {
        self.static_vector = statics.clone();
    }

    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    pub fn set_phase_num(&mut self, phase_num: usize) {
        self.phase_num = phase_num;
    }

    pub fn set_is_perturbing(&mut self, is_perturbing: bool) {
        self.is_perturbing = is_perturbing;
    }

    pub fn set_is_sparsity(&mut self, is_sparsity: bool) {
        self.is_sparsity = is_sparsity;
    }

    pub fn state_vector(&self) -> &DVector<f64> {
        &self.state_vector
    }

    pub fn control_vector(&self) -> &DVector<f64> {
        &self.control_vector
    }

    pub fn static_vector(&self) -> &DVector<f64> {
        &self.static_vector
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn phase_num(&self) -> usize {
        self.phase_num
    }

    pub fn num_state_vars(&self) -> usize {
        self.num_state_vars
    }

    pub fn num_control_vars(&self) -> usize {
        self.num_control_vars
    }

    pub fn num_static_vars(&self) -> usize {
        self.num_static_vars
    }

    /// True while the manager is finite-differencing; user functions that
    /// cache expensive intermediates can branch on this.
    pub fn is_perturbing(&self) -> bool {
        self.is_perturbing
    }

    /// True while the manager probes the sparsity pattern with random inputs.
    pub fn is_sparsity(&self) -> bool {
        self.is_sparsity
    }
}

/// Variable bounds handed to the manager for sparsity probing.
#[derive(Debug, Clone)]
pub struct BoundData {
    pub state_lower: DVector<f64>,
    pub state_upper: DVector<f64>,
    pub control_lower: DVector<f64>,
    pub control_upper: DVector<f64>,
    pub static_lower: DVector<f64>,
    pub static_upper: DVector<f64>,
    pub time_lower: f64,
    pub time_upper: f64,
}

impl Default for BoundData {
    fn default() -> Self {
        BoundData {
            state_lower: DVector::zeros(0),
            state_upper: DVector::zeros(0),
            control_lower: DVector::zeros(0),
            control_upper: DVector::zeros(0),
            static_lower: DVector::zeros(0),
            static_upper: DVector::zeros(0),
            time_lower: 0.0,
            time_upper: 0.0,
        }
    }
}

/// Structural description of one user function block: how many functions and
/// which Jacobian entries can ever be nonzero.
#[derive(Debug, Clone)]
pub struct UserFunctionProperties {
    num_functions: usize,
    state_jacobian_pattern: DMatrix<f64>,
    control_jacobian_pattern: DMatrix<f64>,
    time_jacobian_pattern: DMatrix<f64>,
    static_jacobian_pattern: DMatrix<f64>,
    has_state_vars: bool,
    has_control_vars: bool,
    has_static_vars: bool,
}

impl Default for UserFunctionProperties {
    fn default() -> Self {
        UserFunctionProperties {
            num_functions: 0,
            state_jacobian_pattern: DMatrix::zeros(0, 0),
            control_jacobian_pattern: DMatrix::zeros(0, 0),
            time_jacobian_pattern: DMatrix::zeros(0, 0),
            static_jacobian_pattern: DMatrix::zeros(0, 0),
            has_state_vars: false,
            has_control_vars: false,
            has_static_vars: false,
        }
    }
}

impl UserFunctionProperties {
    pub fn new() -> UserFunctionProperties {
        UserFunctionProperties::default()
    }

    pub fn set_num_functions(&mut self, num_functions: usize) {
        self.num_functions = num_functions;
    }

    pub fn num_functions(&self) -> usize {
        self.num_functions
    }

    pub fn set_jacobian_pattern(&mut self, jac_type: JacobianType, pattern: DMatrix<f64>) {
        match jac_type {
            JacobianType::State => self.state_jacobian_pattern = pattern,
            JacobianType::Control => self.control_jacobian_pattern = pattern,
            JacobianType::Time => self.time_jacobian_pattern = pattern,
            JacobianType::Static => self.static_jacobian_pattern = pattern,
        }
    }

    pub fn jacobian_pattern(&self, jac_type: JacobianType) -> &DMatrix<f64> {
        match jac_type {
            JacobianType::State => &self.state_jacobian_pattern,
            JacobianType::Control => &self.control_jacobian_pattern,
            JacobianType::Time => &self.time_jacobian_pattern,
            JacobianType::Static => &self.static_jacobian_pattern,
        }
    }

    pub fn set_has_state_vars(&mut self, has: bool) {
        self.has_state_vars = has;
    }

    pub fn set_has_control_vars(&mut self, has: bool) {
        self.has_control_vars = has;
    }

    pub fn set_has_static_vars(&mut self, has: bool) {
        self.has_static_vars = has;
    }

    pub fn has_state_vars(&self) -> bool {
        self.has_state_vars
    }

    pub fn has_control_vars(&self) -> bool {
        self.has_control_vars
    }

    pub fn has_static_vars(&self) -> bool {
        self.has_static_vars
    }
}

/// Output container for one evaluation point: dynamics, algebraic path and
/// cost integrand data side by side. The three blocks are cleared/reset
/// together.
#[derive(Debug, Clone, Default)]
pub struct PathFunctionContainer {
    dyn_data: FunctionOutputData,
    alg_data: FunctionOutputData,
    cost_data: FunctionOutputData,
}

impl PathFunctionContainer {
    pub fn new() -> PathFunctionContainer {
        PathFunctionContainer::default()
    }

    pub fn data(&self, func_type: FunctionType) -> &FunctionOutputData {
        match func_type {
            FunctionType::Dynamics => &self.dyn_data,
            FunctionType::Algebraic => &self.alg_data,
            FunctionType::Cost => &self.cost_data,
        }
    }

    pub fn data_mut(&mut self, func_type: FunctionType) -> &mut FunctionOutputData {
        match func_type {
            FunctionType::Dynamics => &mut self.dyn_data,
            FunctionType::Algebraic => &mut self.alg_data,
            FunctionType::Cost => &mut self.cost_data,
        }
    }

    pub fn dyn_data(&self) -> &FunctionOutputData {
        &self.dyn_data
    }

    pub fn alg_data(&self) -> &FunctionOutputData {
        &self.alg_data
    }

    pub fn cost_data(&self) -> &FunctionOutputData {
        &self.cost_data
    }

    pub fn set_is_initializing(&mut self, is_initializing: bool) {
        self.dyn_data.set_is_initializing(is_initializing);
        self.alg_data.set_is_initializing(is_initializing);
        self.cost_data.set_is_initializing(is_initializing);
    }

    // -- convenience setters used from inside user evaluate_* methods --

    pub fn set_dyn_functions(&mut self, values: &DVector<f64>) {
        self.dyn_data.set_functions(values);
    }

    pub fn set_alg_functions(&mut self, values: &DVector<f64>) {
        self.alg_data.set_functions(values);
    }

    pub fn set_cost_function(&mut self, values: &DVector<f64>) {
        if values.len() != 1 {
            panic!("PathFunctionContainer::set_cost_function: the cost integrand must be scalar");
        }
        self.cost_data.set_functions(values);
    }

    pub fn set_alg_upper_bounds(&mut self, upper: &DVector<f64>) {
        self.alg_data.set_upper_bounds(upper);
    }

    pub fn set_alg_lower_bounds(&mut self, lower: &DVector<f64>) {
        self.alg_data.set_lower_bounds(lower);
    }

    pub fn set_alg_function_names(&mut self, names: Vec<String>) {
        self.alg_data.set_function_names(names);
    }

    pub fn set_jacobian(&mut self, func_type: FunctionType, jac_type: JacobianType, jacobian: &DMatrix<f64>) {
        self.data_mut(func_type).set_jacobian(jac_type, jacobian);
    }
}

/// Object-safe clone support so boxed user functions (and everything owning
/// them, Phase included) stay deep-clonable.
pub trait UserPathFunctionClone {
    fn clone_box(&self) -> Box<dyn UserPathFunction>;
}

impl<T> UserPathFunctionClone for T
where
    T: 'static + UserPathFunction + Clone,
{
    fn clone_box(&self) -> Box<dyn UserPathFunction> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn UserPathFunction> {
    fn clone(&self) -> Box<dyn UserPathFunction> {
        self.clone_box()
    }
}

/// The extension point: problem-specific dynamics, algebraic path
/// constraints and cost integrand.
pub trait UserPathFunction: UserPathFunctionClone {
    fn evaluate_functions(&mut self, inputs: &FunctionInputData, outputs: &mut PathFunctionContainer);

    /// Set analytic Jacobian blocks; the default supplies none, leaving all
    /// of them to finite differencing.
    fn evaluate_jacobians(&mut self, _inputs: &FunctionInputData, _outputs: &mut PathFunctionContainer) {}

    /// Optional analytic sparsity pattern for a function/variable pair;
    /// entries found by random probing are OR-ed on top.
    fn jacobian_pattern(&self, _func_type: FunctionType, _jac_type: JacobianType) -> Option<DMatrix<f64>> {
        None
    }

    fn state_perturbation(&self) -> f64 {
        1.0e-7
    }

    fn control_perturbation(&self) -> f64 {
        1.0e-7
    }

    fn time_perturbation(&self) -> f64 {
        1.0e-7
    }

    fn static_perturbation(&self) -> f64 {
        1.0e-7
    }
}
