//! # Error Taxonomy
//!
//! Fatal conditions (bad configuration, uncovered data windows, infeasible
//! benchmark episodes) are surfaced as typed errors. Bad control decisions
//! (invalid actions, overcharging, grid overloading) are never errors: they
//! are penalized through the reward and the simulation continues.

use thiserror::Error;

/// Simulation-level errors
#[derive(Debug, Error)]
pub enum SimError {
    /// Invalid or inconsistent parameters, fatal at construction
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Requested episode window not covered by the input series, fatal at reset
    #[error("data alignment error: {0}")]
    DataAlignment(String),

    /// The LP benchmark cannot satisfy its hard constraints for this episode.
    /// Reported per episode; the caller decides whether to relax and retry
    /// or abort the benchmark run.
    #[error("infeasible optimization for episode starting at step {start_step}: {reason}")]
    InfeasibleOptimization { start_step: usize, reason: String },

    /// Solver failure other than infeasibility (unbounded, internal error)
    #[error("solver failure: {0}")]
    Solver(String),
}

impl SimError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        SimError::Configuration(msg.into())
    }

    pub fn data_alignment(msg: impl Into<String>) -> Self {
        SimError::DataAlignment(msg.into())
    }
}
