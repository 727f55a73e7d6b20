//! Drives user path function evaluation.
//!
//! The manager owns the user's function object and implements the evaluation
//! protocol the transcription relies on:
//!  - at initialization it sizes the function data, determines which
//!    Jacobian blocks the user supplies analytically, and probes the
//!    Jacobian sparsity patterns by sampling the functions at the variable
//!    bounds and at random interior points;
//!  - at every evaluation it computes the function values and fills in by
//!    central-free forward finite differencing every Jacobian block the user
//!    did not provide.
//! Evaluation is strictly synchronous and sequential; a slow user function
//! simply blocks the caller.
use super::user_functions::{
    BoundData, FunctionInputData, FunctionType, JacobianType, PathFunctionContainer,
    UserFunctionProperties, UserPathFunction, ALL_FUNCTION_TYPES, ALL_JACOBIAN_TYPES,
};
use log::warn;
use nalgebra::{DMatrix, DVector};
use rand::Rng;

const NUM_SPARSITY_SAMPLES: usize = 100;

fn ftype_idx(func_type: FunctionType) -> usize {
    match func_type {
        FunctionType::Dynamics => 0,
        FunctionType::Algebraic => 1,
        FunctionType::Cost => 2,
    }
}

fn jtype_idx(jac_type: JacobianType) -> usize {
    match jac_type {
        JacobianType::State => 0,
        JacobianType::Control => 1,
        JacobianType::Time => 2,
        JacobianType::Static => 3,
    }
}

#[derive(Clone)]
pub struct UserPathFunctionManager {
    user_function: Option<Box<dyn UserPathFunction>>,
    is_initializing: bool,
    #[allow(dead_code)]
    has_function: bool,
    num_state_vars: usize,
    num_control_vars: usize,
    num_time_vars: usize,
    num_static_vars: usize,
    /// variable count per JacobianType
    num_vars: [usize; 4],
    /// function count per FunctionType
    num_functions: [usize; 3],
    has_functions: [bool; 3],
    has_cost_function: bool,
    /// jac_pattern[ftype][jtype]
    jac_pattern: Vec<Vec<DMatrix<f64>>>,
    needs_jacobian_finite_diff: [[bool; 4]; 3],
    alg_func_upper_bound: DVector<f64>,
    alg_func_lower_bound: DVector<f64>,
}

impl Default for UserPathFunctionManager {
    fn default() -> Self {
        UserPathFunctionManager {
            user_function: None,
            is_initializing: false,
            has_function: false,
            num_state_vars: 0,
            num_control_vars: 0,
            num_time_vars: 0,
            num_static_vars: 0,
            num_vars: [0; 4],
            num_functions: [0; 3],
            has_functions: [false; 3],
            has_cost_function: false,
            jac_pattern: Vec::new(),
            needs_jacobian_finite_diff: [[false; 4]; 3],
            alg_func_upper_bound: DVector::zeros(0),
            alg_func_lower_bound: DVector::zeros(0),
        }
    }
}

impl UserPathFunctionManager {
    pub fn new() -> UserPathFunctionManager {
        UserPathFunctionManager::default()
    }

    /// Full initialization protocol. `input` must carry a representative
    /// (in-bounds) nominal point; on return it is restored to that point and
    /// `container` holds a consistent evaluation at it.
    pub fn initialize(
        &mut self,
        user_function: Box<dyn UserPathFunction>,
        input: &mut FunctionInputData,
        container: &mut PathFunctionContainer,
        bounds: &BoundData,
    ) {
        self.is_initializing = true;

        self.num_state_vars = input.num_state_vars();
        self.num_control_vars = input.num_control_vars();
        self.num_time_vars = 1;
        self.num_static_vars = input.num_static_vars();
        self.num_vars = [
            self.num_state_vars,
            self.num_control_vars,
            self.num_time_vars,
            self.num_static_vars,
        ];

        self.has_function = true;
        self.user_function = Some(user_function);

        // First evaluation with the container in initializing mode fixes the
        // function counts and records which Jacobian blocks are analytic.
        input.set_is_perturbing(false);
        container.set_is_initializing(true);
        {
            let uf = self.user_function.as_mut().unwrap();
            uf.evaluate_functions(input, container);
            uf.evaluate_jacobians(input, container);
        }
        container.set_is_initializing(false);

        for func_type in ALL_FUNCTION_TYPES {
            let data = container.data(func_type);
            self.has_functions[ftype_idx(func_type)] = data.has_user_function();
            self.num_functions[ftype_idx(func_type)] = data.num_functions();
        }
        self.has_cost_function = self.has_functions[ftype_idx(FunctionType::Cost)];

        // Allocate zeroed pattern matrices and lay user-provided analytic
        // patterns on top.
        self.jac_pattern = Vec::new();
        for func_type in ALL_FUNCTION_TYPES {
            let mut per_func = Vec::new();
            for jac_type in ALL_JACOBIAN_TYPES {
                let nf = self.num_functions[ftype_idx(func_type)];
                let nv = self.num_vars[jtype_idx(jac_type)];
                let user_pattern = self
                    .user_function
                    .as_ref()
                    .unwrap()
                    .jacobian_pattern(func_type, jac_type);
                let pattern = match user_pattern {
                    Some(p) => {
                        if p.nrows() != nf || p.ncols() != nv {
                            panic!(
                                "Sparsity pattern failed to evaluate: the provided {} {} pattern is {}x{} \
                                 but {} functions over {} variables were declared",
                                func_type,
                                jac_type,
                                p.nrows(),
                                p.ncols(),
                                nf,
                                nv
                            );
                        }
                        p
                    }
                    None => DMatrix::zeros(nf, nv),
                };
                per_func.push(pattern);
            }
            self.jac_pattern.push(per_func);
        }

        self.compute_sparsity_patterns(input, container, bounds);

        // Sparsity probing moved the inputs around; re-evaluate at the
        // nominal point so the container is consistent with it again.
        self.evaluate_user_function(input, container);

        self.is_initializing = false;

        if self.has_functions[ftype_idx(FunctionType::Algebraic)] {
            if !container.alg_data().bounds_set() {
                panic!(
                    "UserPathFunctionManager: algebraic path functions were set but their \
                     lower/upper bounds were not; call the bound setters in evaluate_functions"
                );
            }
            self.alg_func_upper_bound = container.alg_data().upper_bounds().clone();
            self.alg_func_lower_bound = container.alg_data().lower_bounds().clone();
        }

        // Flag Jacobian blocks that need finite differencing.
        for func_type in ALL_FUNCTION_TYPES {
            if self.has_functions[ftype_idx(func_type)] {
                let data = container.data(func_type);
                for jac_type in ALL_JACOBIAN_TYPES {
                    if !data.has_user_jacobian(jac_type) {
                        self.needs_jacobian_finite_diff[ftype_idx(func_type)][jtype_idx(jac_type)] = true;
                    }
                }
            }
        }

        // Complete the first full evaluation (FD + analytic Jacobians).
        self.evaluate_user_jacobian(input, container, false);
        self.check_declared_pattern_entries(container);
    }

    pub fn evaluate_user_function(
        &mut self,
        input: &mut FunctionInputData,
        container: &mut PathFunctionContainer,
    ) {
        input.set_is_perturbing(false);
        self.user_function
            .as_mut()
            .expect("UserPathFunctionManager: no user function set; call initialize first")
            .evaluate_functions(input, container);
    }

    /// Evaluate functions (optionally) and all Jacobians: finite differences
    /// for blocks without analytic versions, then the user's analytic blocks
    /// on top.
    pub fn evaluate_user_jacobian(
        &mut self,
        input: &mut FunctionInputData,
        container: &mut PathFunctionContainer,
        is_computing_functions: bool,
    ) {
        if is_computing_functions {
            self.evaluate_user_function(input, container);
        }
        if self.is_initializing {
            return;
        }
        input.set_is_perturbing(true);
        for func_type in ALL_FUNCTION_TYPES {
            self.finite_difference_jacobians(func_type, input, container);
        }
        // Restore nominal function values and let the user overwrite any
        // finite-differenced blocks with analytic ones.
        input.set_is_perturbing(false);
        {
            let uf = self.user_function.as_mut().unwrap();
            uf.evaluate_functions(input, container);
            uf.evaluate_jacobians(input, container);
        }
        for func_type in ALL_FUNCTION_TYPES {
            if self.has_functions[ftype_idx(func_type)] {
                container.data_mut(func_type).zero_fill_missing_jacobians(
                    self.num_state_vars,
                    self.num_control_vars,
                    self.num_static_vars,
                );
            }
        }
    }

    pub fn dyn_function_properties(&self) -> UserFunctionProperties {
        self.function_properties(FunctionType::Dynamics)
    }

    pub fn alg_function_properties(&self) -> UserFunctionProperties {
        self.function_properties(FunctionType::Algebraic)
    }

    pub fn cost_function_properties(&self) -> UserFunctionProperties {
        self.function_properties(FunctionType::Cost)
    }

    fn function_properties(&self, func_type: FunctionType) -> UserFunctionProperties {
        let mut props = UserFunctionProperties::new();
        for jac_type in ALL_JACOBIAN_TYPES {
            props.set_jacobian_pattern(
                jac_type,
                self.jac_pattern[ftype_idx(func_type)][jtype_idx(jac_type)].clone(),
            );
        }
        props.set_num_functions(self.num_functions[ftype_idx(func_type)]);
        props.set_has_state_vars(self.num_state_vars > 0);
        props.set_has_control_vars(self.num_control_vars > 0);
        props.set_has_static_vars(self.num_static_vars > 0);
        props
    }

    pub fn has_dyn_functions(&self) -> bool {
        self.has_functions[ftype_idx(FunctionType::Dynamics)]
    }

    pub fn has_alg_functions(&self) -> bool {
        self.has_functions[ftype_idx(FunctionType::Algebraic)]
    }

    pub fn has_cost_function(&self) -> bool {
        self.has_cost_function
    }

    pub fn num_alg_functions(&self) -> usize {
        self.num_functions[ftype_idx(FunctionType::Algebraic)]
    }

    pub fn alg_functions_upper_bounds(&self) -> &DVector<f64> {
        &self.alg_func_upper_bound
    }

    pub fn alg_functions_lower_bounds(&self) -> &DVector<f64> {
        &self.alg_func_lower_bound
    }

    // ---------------------------------------------------------------------
    // internals
    // ---------------------------------------------------------------------

    fn finite_difference_jacobians(
        &mut self,
        func_type: FunctionType,
        input: &mut FunctionInputData,
        container: &mut PathFunctionContainer,
    ) {
        let fi = ftype_idx(func_type);
        if !self.has_functions[fi] {
            return;
        }
        let needs_any = ALL_JACOBIAN_TYPES
            .iter()
            .any(|&j| self.needs_jacobian_finite_diff[fi][jtype_idx(j)]);
        if !needs_any {
            return;
        }

        let num_funcs = self.num_functions[fi];
        let nom_values = container.data(func_type).function_values().clone();
        let nom_time = input.time();
        let nom_state = input.state_vector().clone();
        let nom_control = input.control_vector().clone();
        let nom_static = input.static_vector().clone();

        for jac_type in ALL_JACOBIAN_TYPES {
            if !self.needs_jacobian_finite_diff[fi][jtype_idx(jac_type)] {
                continue;
            }
            let num_vars = self.num_vars[jtype_idx(jac_type)];
            let pert_size = {
                let uf = self.user_function.as_ref().unwrap();
                match jac_type {
                    JacobianType::State => uf.state_perturbation(),
                    JacobianType::Control => uf.control_perturbation(),
                    JacobianType::Time => uf.time_perturbation(),
                    JacobianType::Static => uf.static_perturbation(),
                }
            };

            let mut jacobian = DMatrix::zeros(num_funcs, num_vars);
            for var_idx in 0..num_vars {
                match jac_type {
                    JacobianType::State => {
                        let mut perturbed = nom_state.clone();
                        perturbed[var_idx] += pert_size;
                        input.set_state_vector(&perturbed);
                    }
                    JacobianType::Control => {
                        let mut perturbed = nom_control.clone();
                        perturbed[var_idx] += pert_size;
                        input.set_control_vector(&perturbed);
                    }
                    JacobianType::Time => {
                        input.set_time(nom_time + pert_size);
                    }
                    JacobianType::Static => {
                        let mut perturbed = nom_static.clone();
                        perturbed[var_idx] += pert_size;
                        input.set_static_vector(&perturbed);
                    }
                }
                self.user_function
                    .as_mut()
                    .unwrap()
                    .evaluate_functions(input, container);
                let pert_values = container.data(func_type).function_values();
                for func_idx in 0..num_funcs {
                    jacobian[(func_idx, var_idx)] =
                        (pert_values[func_idx] - nom_values[func_idx]) / pert_size;
                }
            }

            // back to the nominal point before the next variable family
            match jac_type {
                JacobianType::State => input.set_state_vector(&nom_state),
                JacobianType::Control => input.set_control_vector(&nom_control),
                JacobianType::Time => input.set_time(nom_time),
                JacobianType::Static => input.set_static_vector(&nom_static),
            }
            container.data_mut(func_type).set_jacobian(jac_type, &jacobian);
        }
    }

    /// Probe the Jacobian sparsity patterns: evaluate at the lower bound, the
    /// upper bound, and NUM_SPARSITY_SAMPLES random interior points; any
    /// single-variable change that moves a function value marks the
    /// corresponding pattern entry.
    fn compute_sparsity_patterns(
        &mut self,
        input: &mut FunctionInputData,
        container: &mut PathFunctionContainer,
        bounds: &BoundData,
    ) {
        input.set_is_sparsity(true);

        let nom_time = input.time();
        let nom_state = input.state_vector().clone();
        let nom_control = input.control_vector().clone();
        let nom_static = input.static_vector().clone();

        let mut rng = rand::rng();

        // lower bound, upper bound, then random interior nominals
        for sample_idx in 0..(NUM_SPARSITY_SAMPLES + 2) {
            let (time, state, control, statics) = match sample_idx {
                0 => (
                    bounds.time_lower,
                    bounds.state_lower.clone(),
                    bounds.control_lower.clone(),
                    bounds.static_lower.clone(),
                ),
                1 => (
                    bounds.time_upper,
                    bounds.state_upper.clone(),
                    bounds.control_upper.clone(),
                    bounds.static_upper.clone(),
                ),
                _ => (
                    random_scalar(&mut rng, bounds.time_lower, bounds.time_upper),
                    random_vector(&mut rng, &bounds.state_lower, &bounds.state_upper),
                    random_vector(&mut rng, &bounds.control_lower, &bounds.control_upper),
                    random_vector(&mut rng, &bounds.static_lower, &bounds.static_upper),
                ),
            };
            input.set_time(time);
            input.set_state_vector(&state);
            if self.num_control_vars > 0 {
                input.set_control_vector(&control);
            }
            if self.num_static_vars > 0 {
                input.set_static_vector(&statics);
            }
            self.evaluate_user_function(input, container);

            let rand_time = random_scalar(&mut rng, bounds.time_lower, bounds.time_upper);
            let rand_state = random_vector(&mut rng, &bounds.state_lower, &bounds.state_upper);
            let rand_control = random_vector(&mut rng, &bounds.control_lower, &bounds.control_upper);
            let rand_static = random_vector(&mut rng, &bounds.static_lower, &bounds.static_upper);
            self.update_sparsity_patterns(
                input,
                container,
                rand_time,
                &rand_state,
                &rand_control,
                &rand_static,
            );
        }

        input.set_time(nom_time);
        input.set_state_vector(&nom_state);
        input.set_control_vector(&nom_control);
        if self.num_static_vars > 0 {
            input.set_static_vector(&nom_static);
        }
        input.set_is_sparsity(false);
    }

    fn update_sparsity_patterns(
        &mut self,
        input: &mut FunctionInputData,
        container: &mut PathFunctionContainer,
        rand_time: f64,
        rand_state: &DVector<f64>,
        rand_control: &DVector<f64>,
        rand_static: &DVector<f64>,
    ) {
        let mut nom_func_vals: Vec<DVector<f64>> = Vec::new();
        for func_type in ALL_FUNCTION_TYPES {
            nom_func_vals.push(container.data(func_type).function_values().clone());
        }
        let nom_time = input.time();
        let nom_state = input.state_vector().clone();
        let nom_control = input.control_vector().clone();
        let nom_static = input.static_vector().clone();

        for jac_type in ALL_JACOBIAN_TYPES {
            let num_vars = self.num_vars[jtype_idx(jac_type)];
            for var_idx in 0..num_vars {
                match jac_type {
                    JacobianType::State => {
                        let mut delta = nom_state.clone();
                        delta[var_idx] = rand_state[var_idx];
                        input.set_state_vector(&delta);
                    }
                    JacobianType::Control => {
                        let mut delta = nom_control.clone();
                        delta[var_idx] = rand_control[var_idx];
                        input.set_control_vector(&delta);
                    }
                    JacobianType::Time => {
                        input.set_time(rand_time);
                    }
                    JacobianType::Static => {
                        let mut delta = nom_static.clone();
                        delta[var_idx] = rand_static[var_idx];
                        input.set_static_vector(&delta);
                    }
                }
                self.evaluate_user_function(input, container);
                for func_type in ALL_FUNCTION_TYPES {
                    let fi = ftype_idx(func_type);
                    if !self.has_functions[fi] {
                        continue;
                    }
                    let pert_vals = container.data(func_type).function_values();
                    for func_idx in 0..self.num_functions[fi] {
                        if nom_func_vals[fi][func_idx] != pert_vals[func_idx] {
                            self.jac_pattern[fi][jtype_idx(jac_type)][(func_idx, var_idx)] = 1.0;
                        }
                    }
                }
                // undo this variable before moving to the next
                match jac_type {
                    JacobianType::State => input.set_state_vector(&nom_state),
                    JacobianType::Control => input.set_control_vector(&nom_control),
                    JacobianType::Time => input.set_time(nom_time),
                    JacobianType::Static => input.set_static_vector(&nom_static),
                }
            }
        }
    }

    /// Diagnostic: a pattern entry declared nonzero whose Jacobian value is
    /// exactly zero at the initialization point is suspicious (but legal).
    fn check_declared_pattern_entries(&self, container: &PathFunctionContainer) {
        for func_type in ALL_FUNCTION_TYPES {
            let fi = ftype_idx(func_type);
            if !self.has_functions[fi] {
                continue;
            }
            let data = container.data(func_type);
            for jac_type in ALL_JACOBIAN_TYPES {
                if !data.has_user_jacobian(jac_type) {
                    continue;
                }
                let pattern = &self.jac_pattern[fi][jtype_idx(jac_type)];
                let jacobian = data.jacobian(jac_type);
                for row in 0..pattern.nrows() {
                    for col in 0..pattern.ncols() {
                        if pattern[(row, col)] != 0.0 && jacobian[(row, col)] == 0.0 {
                            warn!(
                                "{} {} Jacobian entry ({}, {}) is declared nonzero but evaluated \
                                 to zero at the initialization point",
                                func_type, jac_type, row, col
                            );
                        }
                    }
                }
            }
        }
    }
}

fn random_scalar<R: Rng>(rng: &mut R, lower: f64, upper: f64) -> f64 {
    if upper > lower {
        rng.random_range(lower..upper)
    } else {
        lower
    }
}

fn random_vector<R: Rng>(rng: &mut R, lower: &DVector<f64>, upper: &DVector<f64>) -> DVector<f64> {
    let mut v = DVector::zeros(lower.len());
    for i in 0..lower.len() {
        v[i] = random_scalar(rng, lower[i], upper[i]);
    }
    v
}

/// Evaluate the user dynamics at an arbitrary (time, state, control) point,
/// outside the decision-vector mesh. Used by mesh refinement.
pub fn evaluate_dynamics_off_mesh(
    manager: &mut UserPathFunctionManager,
    time: f64,
    state: &DVector<f64>,
    control: &DVector<f64>,
    statics: &DVector<f64>,
    num_state_vars: usize,
    num_control_vars: usize,
    num_static_vars: usize,
) -> DVector<f64> {
    let mut input = FunctionInputData::new();
    input.initialize(num_state_vars, num_control_vars, num_static_vars);
    input.set_time(time);
    input.set_state_vector(state);
    input.set_control_vector(control);
    if num_static_vars > 0 {
        input.set_static_vector(statics);
    }
    let mut container = PathFunctionContainer::new();
    manager.evaluate_user_function(&mut input, &mut container);
    container.dyn_data().function_values().clone()
}
