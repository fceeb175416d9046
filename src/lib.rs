//! Report-card grade engine: normalizes primary (monthly) and secondary
//! (trimester) grades, computes coefficient-weighted averages, ranks students
//! within a class and assembles the per-student bulletin view.

pub mod bulletin;
pub mod calc;
pub mod config;
pub mod ipc;
pub mod model;
pub mod normalize;
pub mod ranking;
pub mod telemetry;
