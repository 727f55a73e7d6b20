//! Barycentric Lagrange interpolation.
//!
//! Interpolates function samples given on a fixed, strictly increasing node
//! set onto a second strictly increasing point set. Nodes and interpolation
//! points must not coincide: the barycentric kernel 1/(x - x_j) blows up on a
//! node, and the mesh refinement code always has the exact nodal value
//! available anyway. Weights and the interpolation matrix are precomputed
//! once per (nodes, points) pair and reused for every state/control column.
use itertools::Itertools;
use nalgebra::{DMatrix, DVector};

#[derive(Debug, Clone)]
pub struct BaryLagrangeInterpolator {
    ind_var_vec: DVector<f64>,
    interp_point_vec: DVector<f64>,
    weight_vec: DVector<f64>,
    bary_matrix: DMatrix<f64>,
    is_ind_var_set: bool,
    is_interp_points_set: bool,
}

impl Default for BaryLagrangeInterpolator {
    fn default() -> Self {
        BaryLagrangeInterpolator {
            ind_var_vec: DVector::zeros(0),
            interp_point_vec: DVector::zeros(0),
            weight_vec: DVector::zeros(0),
            bary_matrix: DMatrix::zeros(0, 0),
            is_ind_var_set: false,
            is_interp_points_set: false,
        }
    }
}

impl BaryLagrangeInterpolator {
    pub fn new() -> BaryLagrangeInterpolator {
        BaryLagrangeInterpolator::default()
    }

    /// Shorthand constructor setting both vectors at once.
    pub fn from_nodes_and_points(
        ind_var_vec: &DVector<f64>,
        interp_point_vec: &DVector<f64>,
    ) -> BaryLagrangeInterpolator {
        let mut interp = BaryLagrangeInterpolator::new();
        interp.set_ind_var_vec(ind_var_vec);
        interp.set_interp_point_vec(interp_point_vec);
        interp
    }

    /// Set the independent variable (node) vector; must be strictly
    /// increasing with at least two entries.
    pub fn set_ind_var_vec(&mut self, ind_var_vec: &DVector<f64>) {
        if ind_var_vec.len() < 2 {
            panic!("BaryLagrangeInterpolator: at least two independent variable values are required");
        }
        if !is_strictly_increasing(ind_var_vec) {
            panic!("BaryLagrangeInterpolator: independent variable vector must be strictly increasing");
        }
        self.ind_var_vec = ind_var_vec.clone();
        self.is_ind_var_set = true;
        self.compute_weight_vec();
        if self.is_interp_points_set {
            self.check_interp_points();
            self.compute_bary_matrix();
        }
    }

    /// Set the interpolation points; must be strictly increasing and
    /// distinct from every node. Points slightly outside the node range are
    /// allowed (the barycentric form extrapolates smoothly), which the mesh
    /// refinement relies on when the refined grid reaches past the last
    /// collocation node.
    pub fn set_interp_point_vec(&mut self, interp_point_vec: &DVector<f64>) {
        if interp_point_vec.len() < 1 {
            panic!("BaryLagrangeInterpolator: at least one interpolation point is required");
        }
        if !is_strictly_increasing(interp_point_vec) {
            panic!("BaryLagrangeInterpolator: interpolation point vector must be strictly increasing");
        }
        self.interp_point_vec = interp_point_vec.clone();
        self.is_interp_points_set = true;
        if self.is_ind_var_set {
            self.check_interp_points();
            self.compute_bary_matrix();
        }
    }

    pub fn num_ind_var(&self) -> usize {
        self.ind_var_vec.len()
    }

    pub fn num_interp_points(&self) -> usize {
        self.interp_point_vec.len()
    }

    /// Interpolate one column of samples (one per node) onto the
    /// interpolation points.
    pub fn interpolate(&self, func_values: &DVector<f64>) -> DVector<f64> {
        if !self.is_ind_var_set || !self.is_interp_points_set {
            panic!("BaryLagrangeInterpolator: nodes and interpolation points must be set before interpolating");
        }
        if func_values.len() != self.ind_var_vec.len() {
            panic!(
                "BaryLagrangeInterpolator: got {} function values for {} nodes",
                func_values.len(),
                self.ind_var_vec.len()
            );
        }
        &self.bary_matrix * func_values
    }

    fn compute_weight_vec(&mut self) {
        let n = self.ind_var_vec.len();
        let mut weights = DVector::zeros(n);
        for j in 0..n {
            let mut w = 1.0;
            for k in 0..n {
                if k != j {
                    w *= self.ind_var_vec[j] - self.ind_var_vec[k];
                }
            }
            weights[j] = 1.0 / w;
        }
        self.weight_vec = weights;
    }

    fn compute_bary_matrix(&mut self) {
        let n_pts = self.interp_point_vec.len();
        let n_nodes = self.ind_var_vec.len();
        let mut bary = DMatrix::zeros(n_pts, n_nodes);
        for i in 0..n_pts {
            let x = self.interp_point_vec[i];
            let mut denom = 0.0;
            for j in 0..n_nodes {
                denom += self.weight_vec[j] / (x - self.ind_var_vec[j]);
            }
            for j in 0..n_nodes {
                bary[(i, j)] = (self.weight_vec[j] / (x - self.ind_var_vec[j])) / denom;
            }
        }
        self.bary_matrix = bary;
    }

    fn check_interp_points(&self) {
        for i in 0..self.interp_point_vec.len() {
            let x = self.interp_point_vec[i];
            for j in 0..self.ind_var_vec.len() {
                if x == self.ind_var_vec[j] {
                    panic!(
                        "BaryLagrangeInterpolator: interpolation point {} coincides with a node; \
                         coincident points are not allowed",
                        x
                    );
                }
            }
        }
    }
}

pub fn is_strictly_increasing(v: &DVector<f64>) -> bool {
    v.iter().tuple_windows().all(|(a, b)| b > a)
}
