// src/stats/mod.rs

pub mod estimator;

pub use estimator::{ProbabilityEstimate, estimate};
