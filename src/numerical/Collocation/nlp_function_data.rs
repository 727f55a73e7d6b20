//! Constant-matrix container for the Betts NLP formulation.
//!
//! For one block of NLP functions (defects, quadrature cost, or path
//! constraints):
//!   func(z) = A*z + B*q(z)
//!   jac(z)  = A + B*dq/dz
//! A and B never change for a fixed mesh; D stores the structural pattern of
//! dq/dz so the per-iteration fill can pre-allocate the exact sparsity and
//! the total Jacobian pattern is pat(A) + pat(B)*pat(D). The container is
//! populated through insert_* calls during transcription initialization and
//! must be finalized before any compute call - computing on an unfinalized
//! container is a usage-sequence error and panics.
use crate::somelinalg::sparse_utils::{mat_vec_prod, pattern_ones, SparseMatrixBuilder};
use nalgebra::{DMatrix, DVector};
use sprs::CsMat;

#[derive(Clone)]
pub struct NlpFunctionData {
    num_funcs: usize,
    num_vars: usize,
    num_q: usize,
    a_matrix: Option<CsMat<f64>>,
    b_matrix: Option<CsMat<f64>>,
    d_matrix: Option<CsMat<f64>>,
    jac_sparsity_pattern: Option<CsMat<f64>>,
    // builders are rebuilt from scratch on every initialize() call
    a_builder: Vec<(usize, usize, f64)>,
    b_builder: Vec<(usize, usize, f64)>,
    d_builder: Vec<(usize, usize, f64)>,
}

impl Default for NlpFunctionData {
    fn default() -> Self {
        NlpFunctionData {
            num_funcs: 0,
            num_vars: 0,
            num_q: 0,
            a_matrix: None,
            b_matrix: None,
            d_matrix: None,
            jac_sparsity_pattern: None,
            a_builder: Vec::new(),
            b_builder: Vec::new(),
            d_builder: Vec::new(),
        }
    }
}

impl NlpFunctionData {
    pub fn new() -> NlpFunctionData {
        NlpFunctionData::default()
    }

    /// Size the container: `num_funcs` NLP functions over `num_vars`
    /// decision variables with a q-vector of length `num_q`. Resets any
    /// previously built matrices (mesh refinement path).
    pub fn initialize(&mut self, num_funcs: usize, num_vars: usize, num_q: usize) {
        self.num_funcs = num_funcs;
        self.num_vars = num_vars;
        self.num_q = num_q;
        self.a_matrix = None;
        self.b_matrix = None;
        self.d_matrix = None;
        self.jac_sparsity_pattern = None;
        self.a_builder.clear();
        self.b_builder.clear();
        self.d_builder.clear();
    }

    pub fn num_funcs(&self) -> usize {
        self.num_funcs
    }

    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    pub fn num_q(&self) -> usize {
        self.num_q
    }

    pub fn insert_a_element(&mut self, row: usize, col: usize, value: f64) {
        self.check_insert(row, col, self.num_funcs, self.num_vars, "A");
        self.a_builder.push((row, col, value));
    }

    pub fn insert_b_element(&mut self, row: usize, col: usize, value: f64) {
        self.check_insert(row, col, self.num_funcs, self.num_q, "B");
        self.b_builder.push((row, col, value));
    }

    pub fn insert_d_element(&mut self, row: usize, col: usize, value: f64) {
        self.check_insert(row, col, self.num_q, self.num_vars, "D");
        self.d_builder.push((row, col, value));
    }

    /// Insert the nonzeros of a dense block into A with the given offsets.
    pub fn insert_a_dense_block(&mut self, row_offset: usize, col_offset: usize, block: &DMatrix<f64>) {
        for row in 0..block.nrows() {
            for col in 0..block.ncols() {
                let value = block[(row, col)];
                if value != 0.0 {
                    self.insert_a_element(row_offset + row, col_offset + col, value);
                }
            }
        }
    }

    /// Insert the nonzeros of a dense block into B with the given offsets.
    pub fn insert_b_dense_block(&mut self, row_offset: usize, col_offset: usize, block: &DMatrix<f64>) {
        for row in 0..block.nrows() {
            for col in 0..block.ncols() {
                let value = block[(row, col)];
                if value != 0.0 {
                    self.insert_b_element(row_offset + row, col_offset + col, value);
                }
            }
        }
    }

    /// Insert the nonzeros of a dense block into D with the given offsets.
    pub fn insert_d_dense_block(&mut self, row_offset: usize, col_offset: usize, block: &DMatrix<f64>) {
        for row in 0..block.nrows() {
            for col in 0..block.ncols() {
                let value = block[(row, col)];
                if value != 0.0 {
                    self.insert_d_element(row_offset + row, col_offset + col, value);
                }
            }
        }
    }

    /// Freeze the inserted triplets into compressed matrices.
    pub fn finalize_matrices(&mut self) {
        let mut a_builder = SparseMatrixBuilder::new(self.num_funcs, self.num_vars);
        for &(r, c, v) in &self.a_builder {
            a_builder.set_element(r, c, v);
        }
        let mut b_builder = SparseMatrixBuilder::new(self.num_funcs, self.num_q);
        for &(r, c, v) in &self.b_builder {
            b_builder.set_element(r, c, v);
        }
        let mut d_builder = SparseMatrixBuilder::new(self.num_q, self.num_vars);
        for &(r, c, v) in &self.d_builder {
            d_builder.set_element(r, c, v);
        }
        self.a_matrix = Some(a_builder.build());
        self.b_matrix = Some(b_builder.build());
        self.d_matrix = Some(d_builder.build());
        self.jac_sparsity_pattern = None;
    }

    pub fn is_finalized(&self) -> bool {
        self.a_matrix.is_some()
    }

    pub fn a_matrix(&self) -> &CsMat<f64> {
        self.a_matrix
            .as_ref()
            .expect("NlpFunctionData: A matrix requested before finalize_matrices was called")
    }

    pub fn b_matrix(&self) -> &CsMat<f64> {
        self.b_matrix
            .as_ref()
            .expect("NlpFunctionData: B matrix requested before finalize_matrices was called")
    }

    pub fn d_matrix(&self) -> &CsMat<f64> {
        self.d_matrix
            .as_ref()
            .expect("NlpFunctionData: D matrix requested before finalize_matrices was called")
    }

    /// func = A*z + B*q
    pub fn compute_functions(&self, q_vector: &DVector<f64>, dec_vector: &DVector<f64>) -> DVector<f64> {
        let mut func_values = DVector::zeros(self.num_funcs);
        mat_vec_prod(self.a_matrix(), dec_vector, &mut func_values, true);
        mat_vec_prod(self.b_matrix(), q_vector, &mut func_values, false);
        func_values
    }

    /// func = B*q (for blocks whose A is identically zero)
    pub fn compute_functions_b_only(&self, q_vector: &DVector<f64>) -> DVector<f64> {
        let mut func_values = DVector::zeros(self.num_funcs);
        mat_vec_prod(self.b_matrix(), q_vector, &mut func_values, true);
        func_values
    }

    /// jac = A + B * par_q
    pub fn compute_jacobian(&self, par_q_matrix: &CsMat<f64>) -> CsMat<f64> {
        let bq = self.b_matrix() * par_q_matrix;
        self.a_matrix() + &bq
    }

    /// Structural pattern of the Jacobian: pat(A) + pat(B)*pat(D), cached.
    pub fn jac_sparsity_pattern(&mut self) -> CsMat<f64> {
        if self.jac_sparsity_pattern.is_none() {
            let a_pattern = pattern_ones(self.a_matrix());
            let b_pattern = pattern_ones(self.b_matrix());
            let d_pattern = pattern_ones(self.d_matrix());
            let bd = &b_pattern * &d_pattern;
            self.jac_sparsity_pattern = Some(pattern_ones(&(&a_pattern + &bd)));
        }
        self.jac_sparsity_pattern.as_ref().unwrap().clone()
    }

    /// Nonzero counts of [A, B, D].
    pub fn matrix_num_nonzeros(&self) -> [usize; 3] {
        [
            self.a_matrix().nnz(),
            self.b_matrix().nnz(),
            self.d_matrix().nnz(),
        ]
    }

    fn check_insert(&self, row: usize, col: usize, nrows: usize, ncols: usize, name: &str) {
        if row >= nrows || col >= ncols {
            panic!(
                "NlpFunctionData: {} matrix insert at ({}, {}) is outside the sized shape ({}, {})",
                name, row, col, nrows, ncols
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::somelinalg::sparse_utils::to_dense;

    fn small_data() -> NlpFunctionData {
        // 2 functions, 3 vars, 2 q entries
        let mut data = NlpFunctionData::new();
        data.initialize(2, 3, 2);
        data.insert_a_element(0, 0, 1.0);
        data.insert_a_element(1, 2, -2.0);
        data.insert_b_element(0, 0, 1.0);
        data.insert_b_element(1, 1, 1.0);
        data.insert_d_element(0, 1, 1.0);
        data.insert_d_element(1, 2, 1.0);
        data.finalize_matrices();
        data
    }

    #[test]
    fn computes_functions_and_jacobian() {
        let data = small_data();
        let z = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let q = DVector::from_vec(vec![10.0, 20.0]);
        let f = data.compute_functions(&q, &z);
        assert_relative_eq!(f[0], 1.0 + 10.0);
        assert_relative_eq!(f[1], -6.0 + 20.0);

        // dq/dz placed on the D pattern
        let mut par_q = SparseMatrixBuilder::with_pattern_of(data.d_matrix());
        par_q.set_element(0, 1, 5.0);
        par_q.set_element(1, 2, 7.0);
        let jac = data.compute_jacobian(&par_q.build());
        let dense = to_dense(&jac);
        assert_relative_eq!(dense[(0, 0)], 1.0);
        assert_relative_eq!(dense[(0, 1)], 5.0);
        assert_relative_eq!(dense[(1, 2)], -2.0 + 7.0);
    }

    #[test]
    fn sparsity_pattern_covers_a_and_bd() {
        let mut data = small_data();
        let pattern = data.jac_sparsity_pattern();
        assert!(pattern.get(0, 0).is_some());
        assert!(pattern.get(0, 1).is_some());
        assert!(pattern.get(1, 2).is_some());
        assert!(pattern.get(0, 2).is_none());
    }

    #[test]
    #[should_panic(expected = "before finalize_matrices")]
    fn computing_before_finalize_is_fatal() {
        let mut data = NlpFunctionData::new();
        data.initialize(1, 1, 1);
        let q = DVector::zeros(1);
        let z = DVector::zeros(1);
        data.compute_functions(&q, &z);
    }
}
