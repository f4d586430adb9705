//! # Benchmark Runner
//!
//! Drives one [`SimulationEngine`] with one fixed [`ChargingStrategy`] across
//! episodes, recording a full per-step, per-vehicle telemetry row. No
//! learning; a purely deterministic driver loop, replicated independently
//! per benchmark.

use anyhow::{Context, Result};
use itertools::izip;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::SimulationEngine;
use crate::error::SimError;
use crate::strategy::ChargingStrategy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Episodes to run
    pub episodes: usize,
    /// Abort the whole run on the first infeasible LP episode instead of
    /// skipping it
    pub abort_on_infeasible: bool,
    /// Ask the strategy to relax its hard constraints and retry once before
    /// skipping an infeasible episode
    pub relax_on_infeasible: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            episodes: 1,
            abort_on_infeasible: false,
            relax_on_infeasible: false,
        }
    }
}

/// One vehicle-step of telemetry. Step-level values (grid draw, reward
/// terms) are repeated on each vehicle's row of that step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRow {
    pub episode: usize,
    pub step: usize,
    pub vehicle: usize,
    pub soc: f64,
    pub soh: f64,
    pub plugged_in: bool,
    pub action: f64,
    pub power_kw: f64,
    pub invalid_action: bool,
    pub grid_draw_kw: f64,
    pub buy_price: f64,
    pub reward: f64,
    pub energy_net: f64,
    pub overload_kwh: f64,
    pub overcharge_kw: f64,
    pub target_bonus: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub episode: usize,
    pub start_step: usize,
    pub steps: usize,
    pub total_reward: f64,
    /// Summed shaped monetary term (negative = net expense)
    pub total_energy_net: f64,
    pub soh_loss: f64,
    pub infeasible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub run_id: Uuid,
    pub strategy: String,
    pub rows: Vec<TelemetryRow>,
    pub episodes: Vec<EpisodeSummary>,
    pub infeasible_episodes: usize,
}

impl BenchmarkReport {
    /// Net charging cost across completed episodes (positive = money spent).
    pub fn total_cost(&self) -> f64 {
        -self
            .episodes
            .iter()
            .filter(|e| !e.infeasible)
            .map(|e| e.total_energy_net)
            .sum::<f64>()
    }

    pub fn total_reward(&self) -> f64 {
        self.episodes.iter().map(|e| e.total_reward).sum()
    }
}

pub struct BenchmarkRunner {
    engine: SimulationEngine,
    strategy: Box<dyn ChargingStrategy>,
    cfg: BenchmarkConfig,
}

impl BenchmarkRunner {
    pub fn new(
        engine: SimulationEngine,
        strategy: Box<dyn ChargingStrategy>,
        cfg: BenchmarkConfig,
    ) -> Self {
        Self { engine, strategy, cfg }
    }

    pub fn run(&mut self) -> Result<BenchmarkReport> {
        let run_id = Uuid::new_v4();
        let mut rows = Vec::new();
        let mut episodes = Vec::new();
        let mut infeasible_episodes = 0usize;

        info!(%run_id, strategy = self.strategy.name(), episodes = self.cfg.episodes, "benchmark run started");

        for episode in 0..self.cfg.episodes {
            let mut observation = self
                .engine
                .reset(None)
                .with_context(|| format!("resetting episode {episode}"))?;
            let start_step = self.engine.state().start_step;

            let ctx = self.engine.episode_context();
            if let Err(err) = self.strategy.begin_episode(&ctx) {
                match err {
                    SimError::InfeasibleOptimization { .. } => {
                        warn!(episode, %err, "episode infeasible");
                        let recovered = self.cfg.relax_on_infeasible
                            && self.strategy.relax_target()
                            && self.strategy.begin_episode(&ctx).is_ok();
                        if !recovered {
                            infeasible_episodes += 1;
                            episodes.push(EpisodeSummary {
                                episode,
                                start_step,
                                steps: 0,
                                total_reward: 0.0,
                                total_energy_net: 0.0,
                                soh_loss: 0.0,
                                infeasible: true,
                            });
                            if self.cfg.abort_on_infeasible {
                                anyhow::bail!("aborting benchmark: episode {episode} infeasible");
                            }
                            continue;
                        }
                    }
                    other => {
                        return Err(other)
                            .with_context(|| format!("strategy failed on episode {episode}"));
                    }
                }
            }

            let mut total_reward = 0.0;
            let mut total_energy_net = 0.0;
            let episode_length = self.engine.config().time.episode_length;
            for _ in 0..episode_length {
                let actions = self.strategy.decide(&observation);
                let result = self
                    .engine
                    .step(&actions)
                    .with_context(|| format!("stepping episode {episode}"))?;

                let step = result.observation.episode_step - 1;
                for (vehicle, (action, power_kw, invalid)) in izip!(
                    &actions,
                    &result.diagnostics.vehicle_power_kw,
                    &result.diagnostics.invalid_action
                )
                .enumerate()
                {
                    let v = &result.observation.vehicles[vehicle];
                    rows.push(TelemetryRow {
                        episode,
                        step,
                        vehicle,
                        soc: v.soc,
                        soh: v.soh,
                        plugged_in: v.plugged_in,
                        action: *action,
                        power_kw: *power_kw,
                        invalid_action: *invalid,
                        grid_draw_kw: result.diagnostics.grid_draw_kw,
                        buy_price: result.diagnostics.buy_price,
                        reward: result.reward,
                        energy_net: result.diagnostics.breakdown.energy_net,
                        overload_kwh: result.diagnostics.breakdown.overload_kwh,
                        overcharge_kw: result.diagnostics.breakdown.overcharge_kw,
                        target_bonus: result.diagnostics.breakdown.target_bonus,
                    });
                }

                total_reward += result.reward;
                total_energy_net += result.diagnostics.breakdown.energy_net;
                observation = result.observation;
                if result.done {
                    break;
                }
            }

            episodes.push(EpisodeSummary {
                episode,
                start_step,
                steps: self.engine.state().step,
                total_reward,
                total_energy_net,
                soh_loss: self.engine.state().cumulative.soh_loss,
                infeasible: false,
            });
        }

        info!(%run_id, infeasible_episodes, rows = rows.len(), "benchmark run finished");

        Ok(BenchmarkReport {
            run_id,
            strategy: self.strategy.name().to_string(),
            rows,
            episodes,
            infeasible_episodes,
        })
    }
}
