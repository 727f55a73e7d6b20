//! Linear scale-and-shift conditioning of the NLP.
//!
//! Decision variables get a diagonal weight and shift, typically derived
//! from their bounds so the scaled variables live in [-1/2, 1/2]; constraint
//! rows and the cost get scalar weights (user supplied, Jacobian-row-norm
//! derived, or tied to the matching state weight for defect rows). Apply
//! followed by unapply round-trips to the original values. Every Scale/
//! UnScale call requires the utility to be initialized first - scaling with
//! an uninitialized utility is a usage-sequence error.
use nalgebra::DVector;
use sprs::{CsMat, TriMat};

#[derive(Debug, Clone)]
pub struct ScaleUtility {
    num_vars: usize,
    num_cons: usize,
    jac_row_idx_vec: Vec<usize>,
    jac_col_idx_vec: Vec<usize>,
    cost_weight: f64,
    /// index 0 is the cost weight, 1..=numCons the constraint weights
    con_vec_weight: DVector<f64>,
    dec_vec_weight: DVector<f64>,
    dec_vec_shift: DVector<f64>,
    if_defect: Vec<bool>,
    which_state_var: Vec<usize>,
    is_initialized: bool,
}

impl Default for ScaleUtility {
    fn default() -> Self {
        ScaleUtility {
            num_vars: 0,
            num_cons: 0,
            jac_row_idx_vec: Vec::new(),
            jac_col_idx_vec: Vec::new(),
            cost_weight: 1.0,
            con_vec_weight: DVector::zeros(0),
            dec_vec_weight: DVector::zeros(0),
            dec_vec_shift: DVector::zeros(0),
            if_defect: Vec::new(),
            which_state_var: Vec::new(),
            is_initialized: false,
        }
    }
}

impl ScaleUtility {
    pub fn new() -> ScaleUtility {
        ScaleUtility::default()
    }

    /// Size the utility and record the Jacobian sparsity (row/col index
    /// pairs of the nonzero entries). Weights start at one, shifts at zero.
    pub fn initialize(
        &mut self,
        num_vars: usize,
        num_cons: usize,
        jac_row_idxs: Vec<usize>,
        jac_col_idxs: Vec<usize>,
    ) {
        if jac_row_idxs.len() != jac_col_idxs.len() {
            panic!(
                "ScaleUtility::initialize: Jacobian row index vector ({}) and column index \
                 vector ({}) must be the same length",
                jac_row_idxs.len(),
                jac_col_idxs.len()
            );
        }
        self.num_vars = num_vars;
        self.num_cons = num_cons;
        self.jac_row_idx_vec = jac_row_idxs;
        self.jac_col_idx_vec = jac_col_idxs;

        self.cost_weight = 1.0;
        self.con_vec_weight = DVector::from_element(num_cons + 1, 1.0);
        self.dec_vec_weight = DVector::from_element(num_vars, 1.0);
        self.dec_vec_shift = DVector::zeros(num_vars);
        self.if_defect = vec![false; num_cons];
        self.which_state_var = vec![0; num_cons];
        self.is_initialized = false;
    }

    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    pub fn scale_decision_vector(&self, dec_vec: &mut DVector<f64>) {
        for var_idx in 0..self.num_vars {
            dec_vec[var_idx] = dec_vec[var_idx] * self.dec_vec_weight[var_idx]
                + self.dec_vec_shift[var_idx];
        }
    }

    pub fn unscale_decision_vector(&self, dec_vec: &mut DVector<f64>) {
        for var_idx in 0..self.num_vars {
            dec_vec[var_idx] = (dec_vec[var_idx] - self.dec_vec_shift[var_idx])
                / self.dec_vec_weight[var_idx];
        }
    }

    pub fn scale_constraint_vector(&self, con_vec: &mut DVector<f64>) {
        if !self.is_initialized {
            panic!("Constraint scaling must be calculated before scaling the constraint vector");
        }
        for con_idx in 0..self.num_cons {
            con_vec[con_idx] *= self.con_vec_weight[con_idx + 1];
        }
    }

    pub fn unscale_constraint_vector(&self, con_vec: &mut DVector<f64>) {
        if !self.is_initialized {
            panic!("Constraint scaling must be calculated before unscaling the constraint vector");
        }
        for con_idx in 0..self.num_cons {
            con_vec[con_idx] /= self.con_vec_weight[con_idx + 1];
        }
    }

    pub fn scale_cost_function(&self, cost: f64) -> f64 {
        cost * self.cost_weight
    }

    pub fn unscale_cost_function(&self, cost: f64) -> f64 {
        cost / self.cost_weight
    }

    /// Multiply row and column weights onto the nonzero entries. Rows of
    /// the passed Jacobian are constraint rows (the cost gradient is scaled
    /// separately through the cost weight). With no registered sparsity
    /// (the optimizer is finite differencing) there is nothing to do.
    pub fn scale_jacobian(&self, jac: &mut CsMat<f64>) {
        if !self.is_initialized {
            panic!("Constraint scaling must be calculated before scaling the jacobian");
        }
        if self.jac_row_idx_vec.is_empty() {
            return;
        }
        let mut scaled = TriMat::new(jac.shape());
        for (value, (row, col)) in jac.iter() {
            scaled.add_triplet(
                row,
                col,
                value * self.con_vec_weight[row + 1] / self.dec_vec_weight[col],
            );
        }
        *jac = scaled.to_csr();
    }

    pub fn unscale_jacobian(&self, jac: &mut CsMat<f64>) {
        if !self.is_initialized {
            panic!("Constraint scaling must be calculated before unscaling the jacobian");
        }
        if self.jac_row_idx_vec.is_empty() {
            return;
        }
        let mut unscaled = TriMat::new(jac.shape());
        for (value, (row, col)) in jac.iter() {
            unscaled.add_triplet(
                row,
                col,
                value / self.con_vec_weight[row + 1] * self.dec_vec_weight[col],
            );
        }
        *jac = unscaled.to_csr();
    }

    /// Weights/shifts from variable bounds: w = 1/(ub - lb),
    /// shift = 1/2 - ub*w, so scaled variables span [-1/2, 1/2].
    pub fn set_dec_vec_scaling_bounds(
        &mut self,
        dec_vec_upper: &DVector<f64>,
        dec_vec_lower: &DVector<f64>,
    ) {
        for var_idx in 0..self.num_vars {
            self.dec_vec_weight[var_idx] =
                1.0 / (dec_vec_upper[var_idx] - dec_vec_lower[var_idx]);
            self.dec_vec_shift[var_idx] =
                0.5 - dec_vec_upper[var_idx] * self.dec_vec_weight[var_idx];
        }
    }

    pub fn set_constraint_scaling_user_defined(&mut self, con_vec_weights: &DVector<f64>) {
        if con_vec_weights.len() != self.num_cons {
            panic!("Length of constraint weight vector must be equal to numCons");
        }
        self.con_vec_weight[0] = self.cost_weight;
        for ii in 1..self.con_vec_weight.len() {
            self.con_vec_weight[ii] = con_vec_weights[ii - 1];
        }
        self.is_initialized = true;
    }

    pub fn set_cost_scaling_user_defined(&mut self, cost_weight: f64) {
        self.cost_weight = cost_weight;
        self.con_vec_weight[0] = cost_weight;
    }

    /// Constraint weights that normalize each row of the (decision-variable
    /// scaled) Jacobian. The decision vector scale must be set first.
    pub fn set_constraint_scaling_jacobian(&mut self, jac: &CsMat<f64>) {
        let mut row_norms_sq = vec![0.0; self.num_cons];
        for (val, (row, col)) in jac.iter() {
            let scaled = val * self.dec_vec_weight[col];
            row_norms_sq[row] += scaled * scaled;
        }
        self.con_vec_weight[0] = self.cost_weight;
        for con_idx in 0..self.num_cons {
            let norm = row_norms_sq[con_idx].sqrt();
            let inv_norm = 1.0 / norm;
            let scale = if inv_norm.abs() >= 1.0e-4 && inv_norm.abs() <= 1.0e10 {
                inv_norm
            } else {
                1.0
            };
            self.con_vec_weight[con_idx + 1] = scale;
        }
        self.is_initialized = true;
    }

    /// Defect rows scale with their state variable's weight; all other rows
    /// by the Jacobian row norm. if_defect/which_state_var must be set
    /// beforehand; the state weights sit at columns 2.. of the decision
    /// vector.
    pub fn set_constraint_scaling_defect_and_user(&mut self, jac: &CsMat<f64>) {
        let mut row_norms_sq = vec![0.0; self.num_cons];
        for (val, (row, col)) in jac.iter() {
            let scaled = val * self.dec_vec_weight[col];
            row_norms_sq[row] += scaled * scaled;
        }
        self.con_vec_weight[0] = self.cost_weight;
        for con_idx in 0..self.num_cons {
            if self.if_defect[con_idx] {
                self.con_vec_weight[con_idx + 1] =
                    self.dec_vec_weight[self.which_state_var[con_idx] + 2];
            } else {
                let norm = row_norms_sq[con_idx].sqrt();
                let inv_norm = 1.0 / norm;
                let scale = if inv_norm.abs() >= 1.0e-4 && inv_norm.abs() <= 1.0e10 {
                    inv_norm
                } else {
                    1.0
                };
                self.con_vec_weight[con_idx + 1] = scale;
            }
        }
        self.is_initialized = true;
    }

    pub fn set_which_state_var(&mut self, which_state_var: Vec<usize>) {
        self.which_state_var = which_state_var;
    }

    pub fn set_if_defect(&mut self, if_defect: Vec<bool>) {
        self.if_defect = if_defect;
    }

    pub fn cost_weight(&self) -> f64 {
        self.cost_weight
    }

    pub fn con_vec_weights(&self) -> DVector<f64> {
        let n = self.con_vec_weight.len();
        let mut weights = DVector::zeros(n - 1);
        for ii in 0..n - 1 {
            weights[ii] = self.con_vec_weight[ii + 1];
        }
        weights
    }

    pub fn dec_vec_weights(&self) -> &DVector<f64> {
        &self.dec_vec_weight
    }
}
