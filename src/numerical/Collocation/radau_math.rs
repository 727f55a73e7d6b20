//! Legendre-Gauss-Radau (LGR) collocation mathematics.
//!
//! The N-point LGR set on [-1, 1) is {-1} plus the N-1 interior roots of
//! P_{N-1}(x) + P_N(x). Interior roots are found by Newton iteration on the
//! Legendre three-term recurrence starting from Chebyshev-Gauss-Radau seeds
//! x_k = -cos(2*pi*k/(2N-1)), which interlace the target roots tightly enough
//! that a handful of iterations reaches machine precision for every degree
//! this crate allows (N <= 16).
//!
//! Quadrature weights:
//!   w_0 = 2/N^2,   w_k = (1 - x_k) / (N^2 * P_{N-1}(x_k)^2)
//!
//! Differentiation matrices come from the barycentric form on arbitrary
//! nodes: D_ij = (w_j/w_i)/(x_i - x_j), D_ii = -sum_{j != i} D_ij.
use crate::somelinalg::sparse_utils::SparseMatrixBuilder;
use nalgebra::{DMatrix, DVector};
use sprs::CsMat;

const NEWTON_TOL: f64 = 5.0e-16;
const NEWTON_MAX_ITER: usize = 50;

/// Value of the Legendre polynomial pair (P_{n-1}(x), P_n(x)).
fn legendre_pair(n: usize, x: f64) -> (f64, f64) {
    if n == 0 {
        return (0.0, 1.0);
    }
    let mut p_prev = 1.0; // P_0
    let mut p = x; // P_1
    for k in 1..n {
        let kf = k as f64;
        let p_next = ((2.0 * kf + 1.0) * x * p - kf * p_prev) / (kf + 1.0);
        p_prev = p;
        p = p_next;
    }
    (p_prev, p)
}

/// Compute the N-point LGR nodes (ascending, nodes[0] == -1 exactly) and the
/// corresponding quadrature weights on [-1, 1].
pub fn compute_single_seg_lgr_nodes(degree: usize) -> (DVector<f64>, DVector<f64>) {
    let n = degree + 1; // number of points
    if n < 2 {
        panic!("compute_single_seg_lgr_nodes: at least 2 LGR points are required (degree >= 1)");
    }
    let nf = n as f64;
    let mut nodes = DVector::zeros(n);
    nodes[0] = -1.0;

    // interior roots of P_{N-1} + P_N via Newton from Chebyshev-Radau seeds
    for k in 1..n {
        let mut x = -(2.0 * std::f64::consts::PI * k as f64 / (2.0 * nf - 1.0)).cos();
        for _ in 0..NEWTON_MAX_ITER {
            let (p_nm1, p_n) = legendre_pair(n, x);
            let f = p_nm1 + p_n;
            // derivative from the standard identity, valid away from +-1
            let (p_nm2, _) = legendre_pair(n - 1, x);
            let dp_n = nf * (x * p_n - p_nm1) / (x * x - 1.0);
            let dp_nm1 = (nf - 1.0) * (x * p_nm1 - p_nm2) / (x * x - 1.0);
            let df = dp_nm1 + dp_n;
            let dx = f / df;
            x -= dx;
            if dx.abs() < NEWTON_TOL {
                break;
            }
        }
        nodes[k] = x;
    }

    let mut weights = DVector::zeros(n);
    weights[0] = 2.0 / (nf * nf);
    for k in 1..n {
        let (p_nm1, _) = legendre_pair(n, nodes[k]);
        weights[k] = (1.0 - nodes[k]) / (nf * nf * p_nm1 * p_nm1);
    }
    (nodes, weights)
}

/// Barycentric weights for an arbitrary node set.
fn barycentric_weights(points: &DVector<f64>) -> DVector<f64> {
    let n = points.len();
    let mut weights = DVector::zeros(n);
    for j in 0..n {
        let mut w = 1.0;
        for k in 0..n {
            if k != j {
                w *= points[j] - points[k];
            }
        }
        weights[j] = 1.0 / w;
    }
    weights
}

/// Dense Lagrange differentiation matrix on an arbitrary strictly increasing
/// node set: row i holds the derivative of the interpolating polynomial at
/// node i expressed in the nodal values.
pub fn lagrange_diff_matrix(points: &DVector<f64>) -> DMatrix<f64> {
    let n = points.len();
    if n < 2 {
        panic!("lagrange_diff_matrix: at least 2 points are required");
    }
    let w = barycentric_weights(points);
    let mut d = DMatrix::zeros(n, n);
    for i in 0..n {
        let mut diag = 0.0;
        for j in 0..n {
            if i != j {
                let entry = (w[j] / w[i]) / (points[i] - points[j]);
                d[(i, j)] = entry;
                diag -= entry;
            }
        }
        d[(i, i)] = diag;
    }
    d
}

/// Multi-segment LGR discretization over mesh interval fractions spanning
/// [-1, 1]. Returns the discretization points (collocation points plus the
/// terminal +1, so the grid covers every state point), quadrature weights
/// for the collocation points only, and the sparse block differentiation
/// matrix of shape (total collocation points) x (total + 1).
///
/// Errors when the fractions do not start at -1, do not end at +1, or are
/// not strictly increasing.
pub fn compute_multi_segment_lgr_nodes(
    mesh_fractions: &DVector<f64>,
    mesh_num_points: &[usize],
) -> Result<(DVector<f64>, DVector<f64>, CsMat<f64>), String> {
    let num_intervals = mesh_num_points.len();
    if mesh_fractions.len() != num_intervals + 1 {
        return Err(format!(
            "mesh fractions length {} must be one more than the number of mesh intervals {}",
            mesh_fractions.len(),
            num_intervals
        ));
    }
    if mesh_fractions[0] != -1.0 || mesh_fractions[num_intervals] != 1.0 {
        return Err("the first and last segment points must be -1 and 1 respectively".to_string());
    }
    for i in 1..mesh_fractions.len() {
        if mesh_fractions[i] <= mesh_fractions[i - 1] {
            return Err("mesh interval fractions must be monotonically increasing".to_string());
        }
    }

    let total_points: usize = mesh_num_points.iter().sum();
    let mut points = DVector::zeros(total_points + 1);
    let mut weights = DVector::zeros(total_points);
    let mut diff_builder = SparseMatrixBuilder::new(total_points, total_points + 1);

    let mut low_idx = 0;
    for interval_idx in 0..num_intervals {
        let n = mesh_num_points[interval_idx];
        let fa = mesh_fractions[interval_idx];
        let fb = mesh_fractions[interval_idx + 1];
        let half_width = 0.5 * (fb - fa);
        let (local_nodes, local_weights) = compute_single_seg_lgr_nodes(n - 1);

        // interval nodes in global tau, plus the interval end point shared
        // with the next interval (or the appended final point)
        let mut aug_nodes = DVector::zeros(n + 1);
        for k in 0..n {
            let tau = fa + (local_nodes[k] + 1.0) * half_width;
            points[low_idx + k] = tau;
            weights[low_idx + k] = local_weights[k] * half_width;
            aug_nodes[k] = tau;
        }
        aug_nodes[n] = fb;

        let local_diff = lagrange_diff_matrix(&aug_nodes);
        for row in 0..n {
            for col in 0..n + 1 {
                let value = local_diff[(row, col)];
                if value != 0.0 {
                    diff_builder.set_element(low_idx + row, low_idx + col, value);
                }
            }
        }
        low_idx += n;
    }
    points[total_points] = 1.0;

    Ok((points, weights, diff_builder.build()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn two_point_lgr_matches_closed_form() {
        let (nodes, weights) = compute_single_seg_lgr_nodes(1);
        assert_relative_eq!(nodes[0], -1.0);
        assert_relative_eq!(nodes[1], 1.0 / 3.0, epsilon = 1e-14);
        assert_relative_eq!(weights[0], 0.5, epsilon = 1e-14);
        assert_relative_eq!(weights[1], 1.5, epsilon = 1e-14);
    }

    #[test]
    fn weights_sum_to_two_and_integrate_polynomials() {
        for degree in 2..12 {
            let (nodes, weights) = compute_single_seg_lgr_nodes(degree);
            let n = degree + 1;
            assert_relative_eq!(weights.sum(), 2.0, epsilon = 1e-12);
            // N-point Radau rule is exact to degree 2N-2
            let power = 2 * n - 2;
            let quad: f64 = (0..n).map(|k| weights[k] * nodes[k].powi(power as i32)).sum();
            let exact = 2.0 / (power as f64 + 1.0);
            assert_relative_eq!(quad, exact, epsilon = 1e-10);
        }
    }

    #[test]
    fn nodes_are_ascending_and_interior() {
        let (nodes, _) = compute_single_seg_lgr_nodes(9);
        for k in 1..nodes.len() {
            assert!(nodes[k] > nodes[k - 1]);
            assert!(nodes[k] < 1.0);
        }
    }

    #[test]
    fn diff_matrix_differentiates_polynomials_exactly() {
        let points = DVector::from_vec(vec![-1.0, -0.5, 0.3, 0.7, 1.0]);
        let d = lagrange_diff_matrix(&points);
        let values = points.map(|x| x * x * x - 2.0 * x);
        let derivs = &d * &values;
        for (i, &x) in points.iter().enumerate() {
            assert_relative_eq!(derivs[i], 3.0 * x * x - 2.0, epsilon = 1e-11);
        }
    }

    #[test]
    fn multi_segment_assembly_shares_interval_endpoints() {
        let fractions = DVector::from_vec(vec![-1.0, 0.0, 1.0]);
        let (points, weights, diff) =
            compute_multi_segment_lgr_nodes(&fractions, &[4, 3]).unwrap();
        assert_eq!(points.len(), 8);
        assert_eq!(weights.len(), 7);
        assert_eq!(diff.rows(), 7);
        assert_eq!(diff.cols(), 8);
        assert_relative_eq!(points[0], -1.0);
        // second interval starts at the shared fraction
        assert_relative_eq!(points[4], 0.0, epsilon = 1e-14);
        assert_relative_eq!(points[7], 1.0);
        assert_relative_eq!(weights.sum(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn multi_segment_rejects_bad_fractions() {
        let fractions = DVector::from_vec(vec![-1.0, 0.5, 0.2, 1.0]);
        let result = compute_multi_segment_lgr_nodes(&fractions, &[3, 3, 3]);
        assert!(result.unwrap_err().contains("monotonically increasing"));

        let fractions = DVector::from_vec(vec![-0.5, 1.0]);
        let result = compute_multi_segment_lgr_nodes(&fractions, &[3]);
        assert!(result.unwrap_err().contains("-1 and 1"));
    }
}
