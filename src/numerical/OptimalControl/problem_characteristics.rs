//! Validated, queryable problem configuration.
//!
//! Holds the problem-side dimensions (state/control/static/integral/time
//! variable counts), the NLP-side counts filled in by the transcription,
//! flags for which function types exist, bounds and initial/final guesses,
//! and the mesh description. The validate_* methods check internal
//! consistency before the phase proceeds to transcription setup; any
//! violation is fatal with a message naming the offending quantity. Each
//! phase owns exactly one instance; mesh refinement replaces the mesh fields
//! in place.
use nalgebra::DVector;

pub const BOUND_TOLERANCE: f64 = 1.0e-5;

#[derive(Debug, Clone)]
pub struct ProblemCharacteristics {
    // problem-side variable counts
    num_state_vars: usize,
    num_control_vars: usize,
    num_integral_vars: usize,
    num_static_vars: usize,
    num_time_vars: usize,
    // NLP-side counts (set by the transcription)
    num_state_vars_nlp: usize,
    num_control_vars_nlp: usize,
    num_time_vars_nlp: usize,
    num_decision_vars_nlp: usize,
    num_defect_con_nlp: usize,
    num_total_con_nlp: usize,
    // function type flags
    has_state_vars: bool,
    has_control_vars: bool,
    has_integral_vars: bool,
    has_static_vars: bool,
    has_time_vars: bool,
    has_defect_cons: bool,
    has_alg_path_cons: bool,
    has_integral_cost: bool,
    has_algebraic_cost: bool,
    // mesh description
    mesh_interval_fractions: DVector<f64>,
    mesh_interval_num_points: Vec<usize>,
    // bounds and guesses
    state_lower_bound: DVector<f64>,
    state_upper_bound: DVector<f64>,
    state_initial_guess: DVector<f64>,
    state_final_guess: DVector<f64>,
    state_initial_guess_set: bool,
    state_final_guess_set: bool,
    control_lower_bound: DVector<f64>,
    control_upper_bound: DVector<f64>,
    static_lower_bound: DVector<f64>,
    static_upper_bound: DVector<f64>,
    static_vector: DVector<f64>,
    static_guess_set: bool,
    time_lower_bound: f64,
    time_upper_bound: f64,
    time_initial_guess: f64,
    time_final_guess: f64,
    time_initial_guess_set: bool,
    time_final_guess_set: bool,
}

impl Default for ProblemCharacteristics {
    fn default() -> Self {
        ProblemCharacteristics {
            num_state_vars: 0,
            num_control_vars: 0,
            num_integral_vars: 0,
            num_static_vars: 0,
            num_time_vars: 2,
            num_state_vars_nlp: 0,
            num_control_vars_nlp: 0,
            num_time_vars_nlp: 2,
            num_decision_vars_nlp: 0,
            num_defect_con_nlp: 0,
            num_total_con_nlp: 0,
            has_state_vars: false,
            has_control_vars: false,
            has_integral_vars: false,
            has_static_vars: false,
            has_time_vars: false,
            has_defect_cons: false,
            has_alg_path_cons: false,
            has_integral_cost: false,
            has_algebraic_cost: false,
            mesh_interval_fractions: DVector::zeros(0),
            mesh_interval_num_points: Vec::new(),
            state_lower_bound: DVector::zeros(0),
            state_upper_bound: DVector::zeros(0),
            state_initial_guess: DVector::zeros(0),
            state_final_guess: DVector::zeros(0),
            state_initial_guess_set: false,
            state_final_guess_set: false,
            control_lower_bound: DVector::zeros(0),
            control_upper_bound: DVector::zeros(0),
            static_lower_bound: DVector::zeros(0),
            static_upper_bound: DVector::zeros(0),
            static_vector: DVector::zeros(0),
            static_guess_set: false,
            time_lower_bound: 0.0,
            time_upper_bound: 0.0,
            time_initial_guess: 0.0,
            time_final_guess: 0.0,
            time_initial_guess_set: false,
            time_final_guess_set: false,
        }
    }
}

impl ProblemCharacteristics {
    pub fn new() -> ProblemCharacteristics {
        ProblemCharacteristics::default()
    }

    // -----------------------------------------------------------------
    // problem-side dimensions
    // -----------------------------------------------------------------

    pub fn set_num_state_vars(&mut self, num: usize) {
        self.num_state_vars = num;
        self.has_state_vars = num > 0;
    }

    pub fn num_state_vars(&self) -> usize {
        self.num_state_vars
    }

    pub fn set_num_control_vars(&mut self, num: usize) {
        self.num_control_vars = num;
        self.has_control_vars = num > 0;
    }

    pub fn num_control_vars(&self) -> usize {
        self.num_control_vars
    }

    pub fn set_num_integral_vars(&mut self, num: usize) {
        self.num_integral_vars = num;
        self.has_integral_vars = num > 0;
    }

    pub fn num_integral_vars(&self) -> usize {
        self.num_integral_vars
    }

    pub fn set_num_static_vars(&mut self, num: usize) {
        self.num_static_vars = num;
        self.has_static_vars = num > 0;
        if self.static_vector.len() != num {
            self.static_vector = DVector::zeros(num);
        }
    }

    pub fn num_static_vars(&self) -> usize {
        self.num_static_vars
    }

    pub fn num_time_vars(&self) -> usize {
        self.num_time_vars
    }

    pub fn has_state_vars(&self) -> bool {
        self.has_state_vars
    }

    pub fn has_control_vars(&self) -> bool {
        self.has_control_vars
    }

    pub fn has_integral_vars(&self) -> bool {
        self.has_integral_vars
    }

    pub fn has_static_vars(&self) -> bool {
        self.has_static_vars
    }

    pub fn has_time_vars(&self) -> bool {
        self.has_time_vars
    }

    // -----------------------------------------------------------------
    // NLP-side dimensions
    // -----------------------------------------------------------------

    pub fn set_num_state_vars_nlp(&mut self, num: usize) {
        self.num_state_vars_nlp = num;
    }

    pub fn num_state_vars_nlp(&self) -> usize {
        self.num_state_vars_nlp
    }

    pub fn set_num_control_vars_nlp(&mut self, num: usize) {
        self.num_control_vars_nlp = num;
    }

    pub fn num_control_vars_nlp(&self) -> usize {
        self.num_control_vars_nlp
    }

    pub fn num_time_vars_nlp(&self) -> usize {
        self.num_time_vars_nlp
    }

    pub fn set_num_decision_vars_nlp(&mut self, num: usize) {
        self.num_decision_vars_nlp = num;
    }

    pub fn num_decision_vars_nlp(&self) -> usize {
        self.num_decision_vars_nlp
    }

    pub fn set_num_defect_con_nlp(&mut self, num: usize) {
        self.num_defect_con_nlp = num;
    }

    pub fn num_defect_con_nlp(&self) -> usize {
        self.num_defect_con_nlp
    }

    pub fn set_num_total_con_nlp(&mut self, num: usize) {
        self.num_total_con_nlp = num;
    }

    pub fn num_total_con_nlp(&self) -> usize {
        self.num_total_con_nlp
    }

    // -----------------------------------------------------------------
    // function type flags
    // -----------------------------------------------------------------

    pub fn set_has_defect_cons(&mut self, has: bool) {
        self.has_defect_cons = has;
    }

    pub fn has_defect_cons(&self) -> bool {
        self.has_defect_cons
    }

    pub fn set_has_alg_path_cons(&mut self, has: bool) {
        self.has_alg_path_cons = has;
    }

    pub fn has_alg_path_cons(&self) -> bool {
        self.has_alg_path_cons
    }

    pub fn set_has_integral_cost(&mut self, has: bool) {
        self.has_integral_cost = has;
    }

    pub fn has_integral_cost(&self) -> bool {
        self.has_integral_cost
    }

    pub fn set_has_algebraic_cost(&mut self, has: bool) {
        self.has_algebraic_cost = has;
    }

    pub fn has_algebraic_cost(&self) -> bool {
        self.has_algebraic_cost
    }

    // -----------------------------------------------------------------
    // mesh description
    // -----------------------------------------------------------------

    pub fn set_mesh_interval_fractions(&mut self, fractions: &DVector<f64>) {
        self.mesh_interval_fractions = fractions.clone();
    }

    pub fn mesh_interval_fractions(&self) -> &DVector<f64> {
        &self.mesh_interval_fractions
    }

    pub fn set_mesh_interval_num_points(&mut self, num_points: &[usize]) {
        self.mesh_interval_num_points = num_points.to_vec();
    }

    pub fn mesh_interval_num_points(&self) -> &[usize] {
        &self.mesh_interval_num_points
    }

    pub fn num_mesh_intervals(&self) -> usize {
        self.mesh_interval_num_points.len()
    }

    pub fn num_points_in_mesh_interval(&self, interval_idx: usize) -> usize {
        self.mesh_interval_num_points[interval_idx]
    }

    // -----------------------------------------------------------------
    // bounds and guesses
    // -----------------------------------------------------------------

    pub fn set_state_lower_bound(&mut self, bound: &DVector<f64>) {
        self.state_lower_bound = bound.clone();
    }

    pub fn state_lower_bound(&self) -> &DVector<f64> {
        &self.state_lower_bound
    }

    pub fn set_state_upper_bound(&mut self, bound: &DVector<f64>) {
        self.state_upper_bound = bound.clone();
    }

    pub fn state_upper_bound(&self) -> &DVector<f64> {
        &self.state_upper_bound
    }

    pub fn set_state_initial_guess(&mut self, guess: &DVector<f64>) {
        self.state_initial_guess = guess.clone();
        self.state_initial_guess_set = true;
    }

    pub fn state_initial_guess(&self) -> &DVector<f64> {
        &self.state_initial_guess
    }

    pub fn set_state_final_guess(&mut self, guess: &DVector<f64>) {
        self.state_final_guess = guess.clone();
        self.state_final_guess_set = true;
    }

    pub fn state_final_guess(&self) -> &DVector<f64> {
        &self.state_final_guess
    }

    pub fn set_control_lower_bound(&mut self, bound: &DVector<f64>) {
        self.control_lower_bound = bound.clone();
    }

    pub fn control_lower_bound(&self) -> &DVector<f64> {
        &self.control_lower_bound
    }

    pub fn set_control_upper_bound(&mut self, bound: &DVector<f64>) {
        self.control_upper_bound = bound.clone();
    }

    pub fn control_upper_bound(&self) -> &DVector<f64> {
        &self.control_upper_bound
    }

    pub fn set_static_lower_bound(&mut self, bound: &DVector<f64>) {
        self.static_lower_bound = bound.clone();
    }

    pub fn static_lower_bound(&self) -> &DVector<f64> {
        &self.static_lower_bound
    }

    pub fn set_static_upper_bound(&mut self, bound: &DVector<f64>) {
        self.static_upper_bound = bound.clone();
    }

    pub fn static_upper_bound(&self) -> &DVector<f64> {
        &self.static_upper_bound
    }

    pub fn set_static_vector(&mut self, statics: &DVector<f64>) {
        if statics.len() != self.num_static_vars {
            panic!(
                "ProblemCharacteristics::set_static_vector: got {} entries for {} static variables",
                statics.len(),
                self.num_static_vars
            );
        }
        self.static_vector = statics.clone();
        self.static_guess_set = true;
    }

    pub fn static_vector(&self) -> &DVector<f64> {
        &self.static_vector
    }

    pub fn set_time_lower_bound(&mut self, bound: f64) {
        self.time_lower_bound = bound;
    }

    pub fn time_lower_bound(&self) -> f64 {
        self.time_lower_bound
    }

    pub fn set_time_upper_bound(&mut self, bound: f64) {
        self.time_upper_bound = bound;
    }

    pub fn time_upper_bound(&self) -> f64 {
        self.time_upper_bound
    }

    pub fn set_time_initial_guess(&mut self, guess: f64) {
        self.time_initial_guess = guess;
        self.time_initial_guess_set = true;
    }

    pub fn time_initial_guess(&self) -> f64 {
        self.time_initial_guess
    }

    pub fn set_time_final_guess(&mut self, guess: f64) {
        self.time_final_guess = guess;
        self.time_final_guess_set = true;
    }

    pub fn time_final_guess(&self) -> f64 {
        self.time_final_guess
    }

    // -----------------------------------------------------------------
    // validation
    // -----------------------------------------------------------------

    /// Mesh: fractions length = intervals + 1, strictly increasing.
    pub fn validate_mesh_config(&self) {
        if self.mesh_interval_num_points.len() + 1 != self.mesh_interval_fractions.len() {
            panic!(
                "ProblemCharacteristics::validate_mesh_config: length of meshIntervalNumPoints \
                 ({}) must be one less than the length of meshIntervalFractions ({})",
                self.mesh_interval_num_points.len(),
                self.mesh_interval_fractions.len()
            );
        }
        for i in 1..self.mesh_interval_fractions.len() {
            if self.mesh_interval_fractions[i] <= self.mesh_interval_fractions[i - 1] {
                panic!(
                    "ProblemCharacteristics::validate_mesh_config: meshIntervalFractions must be \
                     strictly increasing, violated at entry {}",
                    i
                );
            }
        }
    }

    pub fn validate_state_properties(&self) {
        if self.state_lower_bound.len() != self.num_state_vars {
            panic!(
                "ProblemCharacteristics::validate_state_properties: length of stateLowerBound \
                 must be numStateVars"
            );
        }
        if self.state_upper_bound.len() != self.num_state_vars {
            panic!(
                "ProblemCharacteristics::validate_state_properties: length of stateUpperBound \
                 must be numStateVars"
            );
        }
        if self.state_initial_guess_set {
            if self.state_initial_guess.len() != self.num_state_vars {
                panic!(
                    "ProblemCharacteristics::validate_state_properties: length of \
                     stateInitialGuess must be numStateVars"
                );
            }
            for idx in 0..self.num_state_vars {
                if self.state_initial_guess[idx] > self.state_upper_bound[idx]
                    || self.state_initial_guess[idx] < self.state_lower_bound[idx]
                {
                    panic!(
                        "ProblemCharacteristics::validate_state_properties: stateInitialGuess \
                         element {} must fall between upper and lower bounds",
                        idx
                    );
                }
            }
        }
        if self.state_final_guess_set {
            if self.state_final_guess.len() != self.num_state_vars {
                panic!(
                    "ProblemCharacteristics::validate_state_properties: length of \
                     stateFinalGuess must be numStateVars"
                );
            }
            for idx in 0..self.num_state_vars {
                if self.state_final_guess[idx] > self.state_upper_bound[idx]
                    || self.state_final_guess[idx] < self.state_lower_bound[idx]
                {
                    panic!(
                        "ProblemCharacteristics::validate_state_properties: stateFinalGuess \
                         element {} must fall between upper and lower bounds",
                        idx
                    );
                }
            }
        }
        for idx in 0..self.num_state_vars {
            if self.state_lower_bound[idx] > self.state_upper_bound[idx] - BOUND_TOLERANCE {
                panic!(
                    "ProblemCharacteristics::validate_state_properties: state lower bound for \
                     state id {} must be at least {} less than state upper bound",
                    idx, BOUND_TOLERANCE
                );
            }
        }
    }

    pub fn validate_control_properties(&self) {
        if self.control_lower_bound.len() != self.num_control_vars {
            panic!(
                "ProblemCharacteristics::validate_control_properties: length of \
                 controlLowerBound must be numControlVars"
            );
        }
        if self.control_upper_bound.len() != self.num_control_vars {
            panic!(
                "ProblemCharacteristics::validate_control_properties: length of \
                 controlUpperBound must be numControlVars"
            );
        }
        for idx in 0..self.num_control_vars {
            if self.control_lower_bound[idx] > self.control_upper_bound[idx] - BOUND_TOLERANCE {
                panic!(
                    "ProblemCharacteristics::validate_control_properties: control lower bound \
                     for control id {} must be at least {} less than control upper bound",
                    idx, BOUND_TOLERANCE
                );
            }
        }
    }

    pub fn validate_time_properties(&self) {
        if self.time_initial_guess_set
            && (self.time_initial_guess > self.time_upper_bound
                || self.time_initial_guess < self.time_lower_bound)
        {
            panic!(
                "ProblemCharacteristics::validate_time_properties: timeInitialGuess must fall \
                 between upper and lower bounds"
            );
        }
        if self.time_final_guess_set
            && (self.time_final_guess > self.time_upper_bound
                || self.time_final_guess < self.time_lower_bound)
        {
            panic!(
                "ProblemCharacteristics::validate_time_properties: timeFinalGuess must fall \
                 between upper and lower bounds"
            );
        }
        if self.time_lower_bound > self.time_upper_bound - BOUND_TOLERANCE {
            panic!(
                "ProblemCharacteristics::validate_time_properties: time lower bound must be {} \
                 less than time upper bound",
                BOUND_TOLERANCE
            );
        }
    }

    pub fn validate_static_properties(&self) {
        if self.num_static_vars == 0 {
            return;
        }
        if self.static_lower_bound.len() != self.num_static_vars {
            panic!(
                "ProblemCharacteristics::validate_static_properties: length of \
                 staticLowerBound must be numStaticVars"
            );
        }
        if self.static_upper_bound.len() != self.num_static_vars {
            panic!(
                "ProblemCharacteristics::validate_static_properties: length of \
                 staticUpperBound must be numStaticVars"
            );
        }
        if self.static_guess_set {
            for idx in 0..self.num_static_vars {
                if self.static_vector[idx] > self.static_upper_bound[idx]
                    || self.static_vector[idx] < self.static_lower_bound[idx]
                {
                    panic!(
                        "ProblemCharacteristics::validate_static_properties: static guess \
                         element {} must fall between upper and lower bounds",
                        idx
                    );
                }
            }
        }
        for idx in 0..self.num_static_vars {
            if self.static_lower_bound[idx] > self.static_upper_bound[idx] - BOUND_TOLERANCE {
                panic!(
                    "ProblemCharacteristics::validate_static_properties: static lower bound for \
                     static id {} must be at least {} less than static upper bound",
                    idx, BOUND_TOLERANCE
                );
            }
        }
    }
}
