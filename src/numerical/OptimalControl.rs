//! problem-facing layer of the optimal control transcription
pub mod decision_vector;
pub mod problem_characteristics;
pub mod user_functions;
pub mod function_data;
pub mod path_function_manager;
pub mod guess_generator;
pub mod scaling;
pub mod phase;
mod OptimalControl_tests;
