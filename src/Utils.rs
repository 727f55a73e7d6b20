//! different utility modules used throughout the project
/// tiny module to set up logging (terminal + file)
pub mod logger;
/// pretty-printed report tables for phase data
pub mod reports;
