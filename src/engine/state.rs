//! Mutable per-episode working set.
//!
//! Per-vehicle state is a flat, index-addressed array-of-structs owned
//! exclusively by the episode state; engine replicas never share it.

use serde::{Deserialize, Serialize};

use super::reward::RewardBreakdown;

/// One vehicle's mutable state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VehicleState {
    /// State of charge, fraction of usable capacity in [0, 1]
    pub soc: f64,
    /// State of health, fraction in (0, 1], non-increasing within an episode
    pub soh: f64,
    /// Plugged in and controllable this step
    pub plugged_in: bool,
    /// Target-SoC bonus already granted in the current dwell window
    pub target_bonus_given: bool,
}

/// The engine's mutable working set for one episode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpisodeState {
    /// Steps taken within the episode
    pub step: usize,
    /// Absolute step in the data horizon where the episode starts
    pub start_step: usize,
    pub vehicles: Vec<VehicleState>,
    /// Reward terms accumulated over the episode
    pub cumulative: RewardBreakdown,
}

impl EpisodeState {
    pub fn new(start_step: usize, init_soc: f64, soh: &[f64]) -> Self {
        Self {
            step: 0,
            start_step,
            vehicles: soh
                .iter()
                .map(|&soh| VehicleState {
                    soc: init_soc,
                    soh,
                    plugged_in: true,
                    target_bonus_given: false,
                })
                .collect(),
            cumulative: RewardBreakdown::default(),
        }
    }

    /// Absolute step in the data horizon for the current episode step.
    pub fn absolute_step(&self) -> usize {
        self.start_step + self.step
    }
}
