//! Sparse matrix helpers used by the collocation transcription.
//!
//! All cross-module Jacobians and constant matrices live as sprs CsMat<f64>
//! in CSR form (row = constraint index, col = decision variable index).
//! Assembly goes through SparseMatrixBuilder which wraps a triplet matrix:
//! duplicates are summed on build, so "insert structural zero, then add the
//! value" reproduces overwrite-into-pattern semantics without mutating a
//! compressed matrix in place. Matrices are never grown implicitly - a block
//! that does not fit the declared shape is a panic, not a resize.
use nalgebra::{DMatrix, DVector};
use sprs::{CsMat, TriMat};

/// Triplet-backed builder for a sparse matrix of fixed shape.
pub struct SparseMatrixBuilder {
    nrows: usize,
    ncols: usize,
    tri: TriMat<f64>,
}

impl SparseMatrixBuilder {
    pub fn new(nrows: usize, ncols: usize) -> SparseMatrixBuilder {
        SparseMatrixBuilder {
            nrows,
            ncols,
            tri: TriMat::new((nrows, ncols)),
        }
    }

    /// Builder pre-seeded with explicit zeros at every stored position of
    /// `pattern`, so the built matrix keeps the pattern structure even where
    /// no value lands.
    pub fn with_pattern_of(pattern: &CsMat<f64>) -> SparseMatrixBuilder {
        let (nrows, ncols) = (pattern.rows(), pattern.cols());
        let mut builder = SparseMatrixBuilder::new(nrows, ncols);
        for (_val, (row, col)) in pattern.iter() {
            builder.tri.add_triplet(row, col, 0.0);
        }
        builder
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// Add a single element (summed with anything already at that position).
    pub fn set_element(&mut self, row: usize, col: usize, value: f64) {
        if row >= self.nrows || col >= self.ncols {
            panic!(
                "SparseMatrixBuilder::set_element: position ({}, {}) is outside the declared shape ({}, {})",
                row, col, self.nrows, self.ncols
            );
        }
        self.tri.add_triplet(row, col, value);
    }

    /// Insert the nonzero entries of a dense block with the given offsets.
    pub fn set_dense_block(&mut self, row_offset: usize, col_offset: usize, block: &DMatrix<f64>) {
        if row_offset + block.nrows() > self.nrows || col_offset + block.ncols() > self.ncols {
            panic!(
                "SparseMatrixBuilder::set_dense_block: block {}x{} at offset ({}, {}) exceeds shape ({}, {})",
                block.nrows(),
                block.ncols(),
                row_offset,
                col_offset,
                self.nrows,
                self.ncols
            );
        }
        for row in 0..block.nrows() {
            for col in 0..block.ncols() {
                let value = block[(row, col)];
                if value != 0.0 {
                    self.tri.add_triplet(row_offset + row, col_offset + col, value);
                }
            }
        }
    }

    /// Insert a vector of values at explicit (row, col) index pairs.
    pub fn set_indexed_block(&mut self, row_idxs: &[usize], col_idxs: &[usize], values: &DVector<f64>) {
        assert_eq!(
            row_idxs.len(),
            col_idxs.len(),
            "SparseMatrixBuilder::set_indexed_block: row and column index arrays must be the same length"
        );
        assert_eq!(
            row_idxs.len(),
            values.len(),
            "SparseMatrixBuilder::set_indexed_block: index arrays and value vector must be the same length"
        );
        for k in 0..values.len() {
            self.set_element(row_idxs[k], col_idxs[k], values[k]);
        }
    }

    pub fn build(&self) -> CsMat<f64> {
        self.tri.to_csr()
    }
}

/// Sparsity pattern with ones at every stored position.
pub fn pattern_ones(m: &CsMat<f64>) -> CsMat<f64> {
    m.map(|_| 1.0)
}

/// Same structure as the input, all stored values zeroed. Used to
/// pre-structure the dq/dz matrix before filling it each iteration.
pub fn pattern_zeros(m: &CsMat<f64>) -> CsMat<f64> {
    m.map(|_| 0.0)
}

/// y = A*x (initialize == true) or y += A*x (initialize == false).
pub fn mat_vec_prod(a: &CsMat<f64>, x: &DVector<f64>, y: &mut DVector<f64>, initialize: bool) {
    assert_eq!(
        a.cols(),
        x.len(),
        "mat_vec_prod: matrix has {} columns but vector has {} entries",
        a.cols(),
        x.len()
    );
    assert_eq!(
        a.rows(),
        y.len(),
        "mat_vec_prod: matrix has {} rows but output vector has {} entries",
        a.rows(),
        y.len()
    );
    if initialize {
        y.fill(0.0);
    }
    for (val, (row, col)) in a.iter() {
        y[row] += val * x[col];
    }
}

/// COO (three-vector) form of the stored entries, row-major order.
pub fn to_triplets(m: &CsMat<f64>) -> (Vec<usize>, Vec<usize>, Vec<f64>) {
    let mut rows = Vec::with_capacity(m.nnz());
    let mut cols = Vec::with_capacity(m.nnz());
    let mut vals = Vec::with_capacity(m.nnz());
    for (val, (row, col)) in m.iter() {
        rows.push(row);
        cols.push(col);
        vals.push(*val);
    }
    (rows, cols, vals)
}

pub fn num_nonzeros(m: &CsMat<f64>) -> usize {
    m.nnz()
}

pub fn abs_total_sum(m: &CsMat<f64>) -> f64 {
    m.iter().map(|(val, _)| val.abs()).sum()
}

pub fn to_dense(m: &CsMat<f64>) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(m.rows(), m.cols());
    for (val, (row, col)) in m.iter() {
        dense[(row, col)] = *val;
    }
    dense
}

pub fn dense_to_sparse(m: &DMatrix<f64>) -> CsMat<f64> {
    let mut builder = SparseMatrixBuilder::new(m.nrows(), m.ncols());
    builder.set_dense_block(0, 0, m);
    builder.build()
}

/// Stack matrices with identical column counts on top of each other.
pub fn vstack_rows(blocks: &[&CsMat<f64>]) -> CsMat<f64> {
    assert!(!blocks.is_empty(), "vstack_rows: nothing to stack");
    let views: Vec<_> = blocks.iter().map(|b| b.view()).collect();
    sprs::vstack(&views)
}

/// Empty (all-zero) CSR matrix of the given shape.
pub fn zeros(nrows: usize, ncols: usize) -> CsMat<f64> {
    CsMat::zero((nrows, ncols))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn builder_sums_duplicates_and_keeps_structural_zeros() {
        let mut builder = SparseMatrixBuilder::new(2, 3);
        builder.set_element(0, 1, 0.0);
        builder.set_element(0, 1, 2.5);
        builder.set_element(1, 2, -1.0);
        let m = builder.build();
        assert_eq!(m.nnz(), 2);
        assert_relative_eq!(*m.get(0, 1).unwrap(), 2.5);

        let pattern = pattern_zeros(&m);
        assert_eq!(pattern.nnz(), 2);
        assert_relative_eq!(*pattern.get(1, 2).unwrap(), 0.0);
    }

    #[test]
    #[should_panic(expected = "outside the declared shape")]
    fn builder_rejects_out_of_shape_inserts() {
        let mut builder = SparseMatrixBuilder::new(2, 2);
        builder.set_element(2, 0, 1.0);
    }

    #[test]
    fn mat_vec_prod_accumulates() {
        let mut builder = SparseMatrixBuilder::new(2, 2);
        builder.set_dense_block(0, 0, &DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 0.0, 3.0]));
        let a = builder.build();
        let x = DVector::from_vec(vec![1.0, 1.0]);
        let mut y = DVector::from_vec(vec![10.0, 10.0]);
        mat_vec_prod(&a, &x, &mut y, true);
        assert_relative_eq!(y[0], 3.0);
        assert_relative_eq!(y[1], 3.0);
        mat_vec_prod(&a, &x, &mut y, false);
        assert_relative_eq!(y[0], 6.0);
    }

    #[test]
    fn vstack_keeps_row_offsets() {
        let top = dense_to_sparse(&DMatrix::from_row_slice(1, 2, &[1.0, 0.0]));
        let bottom = dense_to_sparse(&DMatrix::from_row_slice(2, 2, &[0.0, 2.0, 3.0, 0.0]));
        let stacked = vstack_rows(&[&top, &bottom]);
        assert_eq!(stacked.rows(), 3);
        assert_relative_eq!(*stacked.get(1, 1).unwrap(), 2.0);
        assert_relative_eq!(*stacked.get(2, 0).unwrap(), 3.0);
    }
}
