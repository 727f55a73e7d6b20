//! some linear algebra functions used throughout the code
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
/// sparse matrix helpers (block insertion, patterns, products) over the sprs crate
pub mod sparse_utils;
/// barycentric Lagrange interpolation on strictly increasing nodes
pub mod bary_interpolation;
