//! collocation transcription engines
//!
//! This module turns user dynamics/cost/path-constraint evaluations at
//! discretization points into NLP-ready defect constraint vectors, quadrature
//! cost and their sparse Jacobians, using the Betts formulation
//! func = A*z + B*q(z),  jac = A + B*dq/dz
//! where A, B and the sparsity skeleton D are constant for a fixed mesh and
//! only q and dq/dz are refilled at every optimizer iteration.
pub mod radau_math;
pub mod nlp_function_data;
pub mod Coll_traits;
pub mod Radau_main;
pub mod HermiteSimpson_main;
pub mod alg_path;
mod Collocation_tests;
