//! Reward terms and weighting.
//!
//! Every term is always computed and reported in diagnostics; an `ignore_*`
//! toggle zeroes its coefficient in the weighted total so that runs stay
//! comparable across configurations.

use serde::{Deserialize, Serialize};

use crate::config::RewardConfig;

/// Per-step (and cumulative) reward terms, kept raw and unweighted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardBreakdown {
    /// Shaped monetary term: feed-in revenue minus grid cost, signed
    pub energy_net: f64,
    /// Energy drawn above the grid connection limit (kWh)
    pub overload_kwh: f64,
    /// Summed magnitude of attempted actions on unavailable vehicles
    pub invalid_action: f64,
    /// Summed power commanded beyond the target-SoC headroom (kW)
    pub overcharge_kw: f64,
    /// Vehicles that first reached target SoC this step
    pub target_bonus: f64,
    /// Summed SoH decrement across the fleet (diagnostic only)
    pub soh_loss: f64,
}

impl RewardBreakdown {
    /// Signed sum of all enabled terms.
    pub fn total(&self, weights: &RewardWeights) -> f64 {
        weights.cost * self.energy_net - weights.overloading * self.overload_kwh
            - weights.invalid_action * self.invalid_action
            - weights.overcharging * self.overcharge_kw
            + weights.target_bonus * self.target_bonus
    }

    pub fn accumulate(&mut self, other: &RewardBreakdown) {
        self.energy_net += other.energy_net;
        self.overload_kwh += other.overload_kwh;
        self.invalid_action += other.invalid_action;
        self.overcharge_kw += other.overcharge_kw;
        self.target_bonus += other.target_bonus;
        self.soh_loss += other.soh_loss;
    }
}

/// Term coefficients after applying the `ignore_*` toggles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RewardWeights {
    pub cost: f64,
    pub overloading: f64,
    pub invalid_action: f64,
    pub overcharging: f64,
    pub target_bonus: f64,
}

impl RewardWeights {
    pub fn from_config(cfg: &RewardConfig) -> Self {
        let gate = |ignored: bool, coef: f64| if ignored { 0.0 } else { coef };
        Self {
            cost: gate(cfg.ignore_price_reward, 1.0),
            overloading: gate(cfg.ignore_overloading_penalty, cfg.overloading_coef),
            invalid_action: gate(cfg.ignore_invalid_penalty, cfg.invalid_action_coef),
            overcharging: gate(cfg.ignore_overcharging_penalty, cfg.overcharging_coef),
            target_bonus: gate(cfg.ignore_soc_reward, cfg.target_soc_bonus),
        }
    }
}

/// Shape the raw monetary net by the configured multiplier and exponent,
/// preserving sign.
pub fn shape_monetary(net: f64, cost_mul: f64, cost_exp: f64) -> f64 {
    cost_mul * net.signum() * net.abs().powf(cost_exp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignored_terms_zero_their_coefficients() {
        let cfg = RewardConfig {
            ignore_overloading_penalty: true,
            ignore_soc_reward: true,
            ..Default::default()
        };
        let weights = RewardWeights::from_config(&cfg);
        assert_eq!(weights.overloading, 0.0);
        assert_eq!(weights.target_bonus, 0.0);
        assert_eq!(weights.cost, 1.0);
        assert!(weights.invalid_action > 0.0);
    }

    #[test]
    fn test_total_is_signed_sum() {
        let breakdown = RewardBreakdown {
            energy_net: -2.0,
            overload_kwh: 3.0,
            invalid_action: 1.0,
            overcharge_kw: 0.5,
            target_bonus: 1.0,
            soh_loss: 0.0,
        };
        let weights = RewardWeights {
            cost: 1.0,
            overloading: 1.0,
            invalid_action: 0.1,
            overcharging: 0.05,
            target_bonus: 1.0,
        };
        let expected = -2.0 - 3.0 - 0.1 - 0.025 + 1.0;
        assert!((breakdown.total(&weights) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_ignored_term_still_reported() {
        // diagnostics keep the raw term even when its weight is zero
        let breakdown = RewardBreakdown { overload_kwh: 5.0, ..Default::default() };
        let cfg = RewardConfig { ignore_overloading_penalty: true, ..Default::default() };
        let weights = RewardWeights::from_config(&cfg);
        assert_eq!(breakdown.total(&weights), 0.0);
        assert_eq!(breakdown.overload_kwh, 5.0);
    }

    #[test]
    fn test_monetary_shaping_preserves_sign() {
        assert!(shape_monetary(-4.0, 1.0, 0.5) < 0.0);
        assert!((shape_monetary(-4.0, 1.0, 0.5) + 2.0).abs() < 1e-12);
        assert!((shape_monetary(9.0, 2.0, 0.5) - 6.0).abs() < 1e-12);
        assert_eq!(shape_monetary(0.0, 1.0, 1.0), 0.0);
    }

    #[test]
    fn test_accumulate() {
        let mut total = RewardBreakdown::default();
        total.accumulate(&RewardBreakdown { energy_net: -1.0, target_bonus: 1.0, ..Default::default() });
        total.accumulate(&RewardBreakdown { energy_net: -0.5, ..Default::default() });
        assert!((total.energy_net + 1.5).abs() < 1e-12);
        assert_eq!(total.target_bonus, 1.0);
    }
}
