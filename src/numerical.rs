//! numerical machinery of the crate
//!
//! Collocation - transcription of continuous optimal control dynamics into
//! sparse NLP defect constraints and quadrature cost (Radau pseudospectral and
//! Hermite-Simpson schemes), with adaptive mesh refinement
//!
//! OptimalControl - the problem-facing layer: decision vector bookkeeping,
//! validated problem configuration, user function callbacks and their
//! manager, initial guess construction, scaling and the Phase orchestrator
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
pub mod Collocation;
pub mod OptimalControl;
