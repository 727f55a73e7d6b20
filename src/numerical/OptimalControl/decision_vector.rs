//! Betts-layout decision vector.
//!
//! Single source of truth for "where is variable X in the flat optimization
//! array". Layout:
//!   Z = [t0, tf, (y_00 u_00 .. y_0s u_0s), (y_10 u_10 ..), ..., y_final,
//!        statics, integrals]
//! i.e. state and control interleave per mesh/stage point after the two time
//! variables; static then integral parameters close the vector. For Radau
//! collocation the final mesh point carries state only (no control); for
//! Hermite-Simpson every point carries both. Sizes are fixed once by
//! initialize(); every bulk setter is dimension-checked against them and
//! fails loudly on mismatch - nothing is ever silently truncated or padded.
use nalgebra::{DMatrix, DVector};

#[derive(Debug, Clone)]
pub struct DecisionVector {
    num_state_vars: usize,
    num_control_vars: usize,
    num_integral_params: usize,
    num_static_params: usize,
    num_state_mesh_points: usize,
    num_control_mesh_points: usize,
    num_state_stage_points: usize,
    num_control_stage_points: usize,
    num_state_points: usize,
    num_control_points: usize,
    num_decision_params: usize,
    num_state_params: usize,
    num_control_params: usize,
    num_state_and_control_vars: usize,
    num_stage_points: usize,
    has_control_at_final_mesh: bool,
    time_start_idx: usize,
    time_stop_idx: usize,
    static_start_idx: usize,
    integral_start_idx: usize,
    decision_vector: DVector<f64>,
    is_initialized: bool,
}

impl Default for DecisionVector {
    fn default() -> Self {
        DecisionVector {
            num_state_vars: 0,
            num_control_vars: 0,
            num_integral_params: 0,
            num_static_params: 0,
            num_state_mesh_points: 0,
            num_control_mesh_points: 0,
            num_state_stage_points: 0,
            num_control_stage_points: 0,
            num_state_points: 0,
            num_control_points: 0,
            num_decision_params: 0,
            num_state_params: 0,
            num_control_params: 0,
            num_state_and_control_vars: 0,
            num_stage_points: 0,
            has_control_at_final_mesh: false,
            time_start_idx: 0,
            time_stop_idx: 1,
            static_start_idx: 0,
            integral_start_idx: 0,
            decision_vector: DVector::zeros(0),
            is_initialized: false,
        }
    }
}

impl DecisionVector {
    pub fn new() -> DecisionVector {
        DecisionVector::default()
    }

    /// One-time sizing. Mesh refinement re-initializes with new point counts.
    pub fn initialize(
        &mut self,
        num_state_vars: usize,
        num_control_vars: usize,
        num_integral_params: usize,
        num_static_params: usize,
        num_state_mesh_points: usize,
        num_control_mesh_points: usize,
        num_state_stage_points: usize,
        num_control_stage_points: usize,
    ) {
        if num_state_vars == 0 {
            panic!("DecisionVector: numStateVars must be greater than 0");
        }
        if num_state_mesh_points == 0 {
            panic!("DecisionVector: numStateMeshPoints must be greater than 0");
        }
        if num_control_mesh_points == 0 {
            panic!("DecisionVector: numControlMeshPoints must be greater than 0");
        }
        if num_state_stage_points != num_control_stage_points {
            panic!("DecisionVector: numStateStagePoints must be equal to numControlStagePoints");
        }

        self.num_state_vars = num_state_vars;
        self.num_control_vars = num_control_vars;
        self.num_integral_params = num_integral_params;
        self.num_static_params = num_static_params;
        self.num_state_mesh_points = num_state_mesh_points;
        self.num_control_mesh_points = num_control_mesh_points;
        self.num_state_stage_points = num_state_stage_points;
        self.num_control_stage_points = num_control_stage_points;

        self.num_state_points = (num_state_mesh_points - 1) * (1 + num_state_stage_points) + 1;
        if num_state_mesh_points == num_control_mesh_points {
            self.has_control_at_final_mesh = true;
            self.num_control_points =
                (num_control_mesh_points - 1) * (1 + num_control_stage_points) + 1;
        } else {
            self.has_control_at_final_mesh = false;
            self.num_control_points = num_control_mesh_points * (1 + num_control_stage_points);
        }

        self.num_state_params = num_state_vars * self.num_state_points;
        self.num_control_params = num_control_vars * self.num_control_points;
        self.num_decision_params = self.num_state_params
            + self.num_control_params
            + num_integral_params
            + num_static_params
            + 2;

        self.time_start_idx = 0;
        self.time_stop_idx = 1;
        self.static_start_idx = 2 + self.num_state_params + self.num_control_params;
        self.integral_start_idx = self.static_start_idx + num_static_params;

        self.num_state_and_control_vars = num_state_vars + num_control_vars;
        self.num_stage_points = num_state_stage_points;

        self.decision_vector = DVector::zeros(self.num_decision_params);
        self.is_initialized = true;
    }

    // -----------------------------------------------------------------
    // whole-vector access
    // -----------------------------------------------------------------

    pub fn set_decision_vector(&mut self, dec_vector: &DVector<f64>) {
        if !self.is_initialized {
            panic!("DecisionVector::set_decision_vector: initialize must be called first");
        }
        if dec_vector.len() != self.num_decision_params {
            panic!(
                "DecisionVector::set_decision_vector: vector length {} does not match the \
                 initialized length {}",
                dec_vector.len(),
                self.num_decision_params
            );
        }
        self.decision_vector.copy_from(dec_vector);
    }

    pub fn decision_vector(&self) -> &DVector<f64> {
        &self.decision_vector
    }

    pub fn num_decision_params(&self) -> usize {
        self.num_decision_params
    }

    pub fn num_state_points(&self) -> usize {
        self.num_state_points
    }

    pub fn num_control_points(&self) -> usize {
        self.num_control_points
    }

    pub fn num_state_vars(&self) -> usize {
        self.num_state_vars
    }

    pub fn num_control_vars(&self) -> usize {
        self.num_control_vars
    }

    pub fn has_control_at_final_mesh(&self) -> bool {
        self.has_control_at_final_mesh
    }

    // -----------------------------------------------------------------
    // time chunk
    // -----------------------------------------------------------------

    pub fn set_time_vector(&mut self, time_vector: &DVector<f64>) {
        if time_vector.len() != 2 {
            panic!("DecisionVector::set_time_vector: time vector must have exactly 2 entries");
        }
        self.decision_vector[self.time_start_idx] = time_vector[0];
        self.decision_vector[self.time_stop_idx] = time_vector[1];
    }

    pub fn time_vector(&self) -> DVector<f64> {
        DVector::from_vec(vec![
            self.decision_vector[self.time_start_idx],
            self.decision_vector[self.time_stop_idx],
        ])
    }

    pub fn first_time(&self) -> f64 {
        self.decision_vector[self.time_start_idx]
    }

    pub fn last_time(&self) -> f64 {
        self.decision_vector[self.time_stop_idx]
    }

    pub fn time_idxs(&self) -> Vec<usize> {
        (self.time_start_idx..=self.time_stop_idx).collect()
    }

    pub fn initial_time_idx(&self) -> usize {
        self.time_start_idx
    }

    pub fn final_time_idx(&self) -> usize {
        self.time_stop_idx
    }

    // -----------------------------------------------------------------
    // static / integral chunks
    // -----------------------------------------------------------------

    pub fn set_static_vector(&mut self, static_vector: &DVector<f64>) {
        if static_vector.len() != self.num_static_params {
            panic!(
                "DecisionVector::set_static_vector: got {} entries but {} static parameters \
                 were declared",
                static_vector.len(),
                self.num_static_params
            );
        }
        for ii in 0..self.num_static_params {
            self.decision_vector[self.static_start_idx + ii] = static_vector[ii];
        }
    }

    pub fn static_vector(&self) -> DVector<f64> {
        let mut statics = DVector::zeros(self.num_static_params);
        for ii in 0..self.num_static_params {
            statics[ii] = self.decision_vector[self.static_start_idx + ii];
        }
        statics
    }

    /// Global indices of the static chunk; empty when there are no statics.
    pub fn static_idxs(&self) -> Vec<usize> {
        (self.static_start_idx..self.static_start_idx + self.num_static_params).collect()
    }

    pub fn set_integral_vector(&mut self, integral_vector: &DVector<f64>) {
        if integral_vector.len() != self.num_integral_params {
            panic!(
                "DecisionVector::set_integral_vector: got {} entries but {} integral parameters \
                 were declared",
                integral_vector.len(),
                self.num_integral_params
            );
        }
        for ii in 0..self.num_integral_params {
            self.decision_vector[self.integral_start_idx + ii] = integral_vector[ii];
        }
    }

    pub fn integral_vector(&self) -> DVector<f64> {
        let mut integrals = DVector::zeros(self.num_integral_params);
        for ii in 0..self.num_integral_params {
            integrals[ii] = self.decision_vector[self.integral_start_idx + ii];
        }
        integrals
    }

    // -----------------------------------------------------------------
    // per-point state/control access
    // -----------------------------------------------------------------

    /// Global indices of the state variables at (mesh point, stage point).
    pub fn state_idxs_at_mesh_point(&self, mesh_idx: usize, stage_idx: usize) -> Vec<usize> {
        self.validate_mesh_stage_idxs(mesh_idx, stage_idx);
        let ind_start = self.time_stop_idx
            + mesh_idx * (self.num_stage_points + 1) * self.num_state_and_control_vars
            + stage_idx * self.num_state_and_control_vars
            + 1;
        (ind_start..ind_start + self.num_state_vars).collect()
    }

    /// Global indices of the control variables at (mesh point, stage point).
    pub fn control_idxs_at_mesh_point(&self, mesh_idx: usize, stage_idx: usize) -> Vec<usize> {
        self.validate_mesh_stage_idxs(mesh_idx, stage_idx);
        let ind_start = self.time_stop_idx
            + mesh_idx * (self.num_stage_points + 1) * self.num_state_and_control_vars
            + stage_idx * self.num_state_and_control_vars
            + self.num_state_vars
            + 1;
        (ind_start..ind_start + self.num_control_vars).collect()
    }

    pub fn state_at_mesh_point(&self, mesh_idx: usize, stage_idx: usize) -> DVector<f64> {
        let idxs = self.state_idxs_at_mesh_point(mesh_idx, stage_idx);
        DVector::from_iterator(idxs.len(), idxs.iter().map(|&i| self.decision_vector[i]))
    }

    pub fn control_at_mesh_point(&self, mesh_idx: usize, stage_idx: usize) -> DVector<f64> {
        let idxs = self.control_idxs_at_mesh_point(mesh_idx, stage_idx);
        DVector::from_iterator(idxs.len(), idxs.iter().map(|&i| self.decision_vector[i]))
    }

    pub fn set_state_at_mesh_point(&mut self, mesh_idx: usize, stage_idx: usize, state: &DVector<f64>) {
        if state.len() != self.num_state_vars {
            panic!(
                "DecisionVector::set_state_at_mesh_point: got {} entries for {} state variables",
                state.len(),
                self.num_state_vars
            );
        }
        let idxs = self.state_idxs_at_mesh_point(mesh_idx, stage_idx);
        for (k, &idx) in idxs.iter().enumerate() {
            self.decision_vector[idx] = state[k];
        }
    }

    pub fn set_control_at_mesh_point(&mut self, mesh_idx: usize, stage_idx: usize, control: &DVector<f64>) {
        if control.len() != self.num_control_vars {
            panic!(
                "DecisionVector::set_control_at_mesh_point: got {} entries for {} control variables",
                control.len(),
                self.num_control_vars
            );
        }
        let idxs = self.control_idxs_at_mesh_point(mesh_idx, stage_idx);
        for (k, &idx) in idxs.iter().enumerate() {
            self.decision_vector[idx] = control[k];
        }
    }

    pub fn first_state_vector(&self) -> DVector<f64> {
        self.state_at_mesh_point(0, 0)
    }

    pub fn last_state_vector(&self) -> DVector<f64> {
        self.state_at_mesh_point(self.num_state_mesh_points - 1, 0)
    }

    pub fn final_state_idxs(&self) -> Vec<usize> {
        self.state_idxs_at_mesh_point(self.num_state_mesh_points - 1, 0)
    }

    pub fn initial_state_idxs(&self) -> Vec<usize> {
        self.state_idxs_at_mesh_point(0, 0)
    }

    // -----------------------------------------------------------------
    // bulk array access
    // -----------------------------------------------------------------

    /// Overwrite all state values from a (numStatePoints x numStateVars)
    /// array, rows in mesh/stage order.
    pub fn set_state_array(&mut self, state_array: &DMatrix<f64>) {
        if state_array.nrows() != self.num_state_points || state_array.ncols() != self.num_state_vars {
            panic!(
                "DecisionVector::set_state_array: array is {}x{} but {}x{} was expected",
                state_array.nrows(),
                state_array.ncols(),
                self.num_state_points,
                self.num_state_vars
            );
        }
        let mut row_idx = 0;
        for mesh in 0..self.num_state_mesh_points - 1 {
            for stage in 0..=self.num_state_stage_points {
                let idxs = self.state_idxs_at_mesh_point(mesh, stage);
                for ii in 0..self.num_state_vars {
                    self.decision_vector[idxs[ii]] = state_array[(row_idx, ii)];
                }
                row_idx += 1;
            }
        }
        // final mesh point has no stages
        let idxs_final = self.state_idxs_at_mesh_point(self.num_state_mesh_points - 1, 0);
        for ii in 0..self.num_state_vars {
            self.decision_vector[idxs_final[ii]] = state_array[(row_idx, ii)];
        }
    }

    pub fn state_array(&self) -> DMatrix<f64> {
        let mut state_array = DMatrix::zeros(self.num_state_points, self.num_state_vars);
        let mut row_idx = 0;
        for mesh in 0..self.num_state_mesh_points - 1 {
            for stage in 0..=self.num_state_stage_points {
                let idxs = self.state_idxs_at_mesh_point(mesh, stage);
                for ii in 0..self.num_state_vars {
                    state_array[(row_idx, ii)] = self.decision_vector[idxs[ii]];
                }
                row_idx += 1;
            }
        }
        let idxs_final = self.state_idxs_at_mesh_point(self.num_state_mesh_points - 1, 0);
        for ii in 0..self.num_state_vars {
            state_array[(row_idx, ii)] = self.decision_vector[idxs_final[ii]];
        }
        state_array
    }

    /// Overwrite all control values from a (numControlPoints x
    /// numControlVars) array.
    pub fn set_control_array(&mut self, control_array: &DMatrix<f64>) {
        if self.num_control_vars == 0 {
            return;
        }
        if control_array.nrows() != self.num_control_points
            || control_array.ncols() != self.num_control_vars
        {
            panic!(
                "DecisionVector::set_control_array: array is {}x{} but {}x{} was expected",
                control_array.nrows(),
                control_array.ncols(),
                self.num_control_points,
                self.num_control_vars
            );
        }
        let num_mesh_loops = if self.has_control_at_final_mesh {
            self.num_control_mesh_points - 1
        } else {
            self.num_control_mesh_points
        };
        let mut row_idx = 0;
        for mesh in 0..num_mesh_loops {
            for stage in 0..=self.num_control_stage_points {
                let idxs = self.control_idxs_at_mesh_point(mesh, stage);
                for cc in 0..self.num_control_vars {
                    self.decision_vector[idxs[cc]] = control_array[(row_idx, cc)];
                }
                row_idx += 1;
            }
        }
        if self.has_control_at_final_mesh {
            let idxs_final = self.control_idxs_at_mesh_point(num_mesh_loops, 0);
            for cc in 0..self.num_control_vars {
                self.decision_vector[idxs_final[cc]] = control_array[(row_idx, cc)];
            }
        }
    }

    pub fn control_array(&self) -> DMatrix<f64> {
        let mut control_array = DMatrix::zeros(self.num_control_points, self.num_control_vars);
        let num_mesh_loops = if self.has_control_at_final_mesh {
            self.num_control_mesh_points - 1
        } else {
            self.num_control_mesh_points
        };
        let mut row_idx = 0;
        for mesh in 0..num_mesh_loops {
            for stage in 0..=self.num_control_stage_points {
                let idxs = self.control_idxs_at_mesh_point(mesh, stage);
                for cc in 0..self.num_control_vars {
                    control_array[(row_idx, cc)] = self.decision_vector[idxs[cc]];
                }
                row_idx += 1;
            }
        }
        if self.has_control_at_final_mesh {
            let idxs_final = self.control_idxs_at_mesh_point(num_mesh_loops, 0);
            for cc in 0..self.num_control_vars {
                control_array[(row_idx, cc)] = self.decision_vector[idxs_final[cc]];
            }
        }
        control_array
    }

    fn validate_mesh_stage_idxs(&self, mesh_idx: usize, stage_idx: usize) {
        if stage_idx > self.num_stage_points {
            panic!(
                "DecisionVector: stageIdx {} exceeds the number of stage points {}",
                stage_idx, self.num_stage_points
            );
        }
        if mesh_idx > self.num_state_mesh_points {
            panic!(
                "DecisionVector: meshIdx {} exceeds the number of state mesh points {}",
                mesh_idx, self.num_state_mesh_points
            );
        }
    }
}
