//! The simulation engine: reset/step state machine over one fleet.

use std::f64::consts::TAU;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{SimConfig, TimePicker};
use crate::degradation::{self, DegradationModel, StressContext};
use crate::error::SimError;
use crate::schedule::VehicleSchedule;
use crate::timeseries::MarketContext;

use super::context::{EpisodeContext, VehicleParams};
use super::observation::{Observation, VehicleObservation};
use super::reward::{shape_monetary, RewardBreakdown, RewardWeights};
use super::state::EpisodeState;

/// Engine lifecycle. `Reset` → `Stepping` (repeated) → `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitingReset,
    Stepping,
    Done,
}

/// Per-step diagnostics alongside the scalar reward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDiagnostics {
    /// Raw reward terms for this step (unweighted)
    pub breakdown: RewardBreakdown,
    /// Net site draw: vehicles + building load - PV (kW)
    pub grid_draw_kw: f64,
    /// Draw above the grid connection limit (kW), zero when within limits
    pub overload_kw: f64,
    /// Realized grid-side power per vehicle (kW, negative = feed-in)
    pub vehicle_power_kw: Vec<f64>,
    /// Vehicles that attempted a non-zero action while unavailable
    pub invalid_action: Vec<bool>,
    /// Buy tariff at this step (currency/kWh)
    pub buy_price: f64,
}

/// Result of one `step` call.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    pub diagnostics: StepDiagnostics,
}

/// Owns per-vehicle battery state, advances time, applies action vectors,
/// and computes reward and termination. Single-threaded and synchronous;
/// replicate whole instances for parallel runs.
pub struct SimulationEngine {
    cfg: SimConfig,
    weights: RewardWeights,
    market: Arc<MarketContext>,
    schedules: Arc<Vec<VehicleSchedule>>,
    degradation: Option<Box<dyn DegradationModel>>,
    rng: StdRng,
    eval_cursor: usize,
    carried_soh: Option<Vec<f64>>,
    state: EpisodeState,
    phase: Phase,
}

impl SimulationEngine {
    pub fn new(
        cfg: SimConfig,
        market: Arc<MarketContext>,
        schedules: Arc<Vec<VehicleSchedule>>,
    ) -> Result<Self, SimError> {
        cfg.validate()?;
        if schedules.len() != cfg.fleet.n_vehicles {
            return Err(SimError::configuration(format!(
                "{} schedules for a fleet of {}",
                schedules.len(),
                cfg.fleet.n_vehicles
            )));
        }
        if market.steps_per_hour != cfg.time.time_steps_per_hour {
            return Err(SimError::configuration(format!(
                "market resolution {} steps/h does not match configured {}",
                market.steps_per_hour, cfg.time.time_steps_per_hour
            )));
        }

        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let weights = RewardWeights::from_config(&cfg.reward);
        let degradation = degradation::from_config(&cfg.degradation);

        Ok(Self {
            cfg,
            weights,
            market,
            schedules,
            degradation,
            rng,
            eval_cursor: 0,
            carried_soh: None,
            state: EpisodeState::default(),
            phase: Phase::AwaitingReset,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.cfg
    }

    pub fn state(&self) -> &EpisodeState {
        &self.state
    }

    /// Latest feasible episode start so that the episode span plus the
    /// longest lookahead stays inside every input series.
    fn max_start_step(&self) -> Result<usize, SimError> {
        let span = self.cfg.time.episode_length + self.cfg.time.max_lookahead_steps();
        let data_len = self
            .schedules
            .iter()
            .map(|s| s.horizon_steps)
            .chain([self.market.len()])
            .min()
            .unwrap_or(0);
        data_len.checked_sub(span).ok_or_else(|| {
            SimError::data_alignment(format!(
                "episode span of {span} steps exceeds the {data_len} steps of aligned data"
            ))
        })
    }

    /// Start a new episode. An explicit seed re-seeds the engine RNG first
    /// (random episode placement becomes reproducible).
    pub fn reset(&mut self, seed: Option<u64>) -> Result<Observation, SimError> {
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }

        let max_start = self.max_start_step()?;
        let start_step = match self.cfg.time.time_picker {
            TimePicker::Random => self.rng.gen_range(0..=max_start),
            TimePicker::Static => {
                let start = self.cfg.time.static_start_step;
                if start > max_start {
                    return Err(SimError::data_alignment(format!(
                        "static start step {start} exceeds latest feasible start {max_start}"
                    )));
                }
                start
            }
            TimePicker::Eval => {
                if self.eval_cursor > max_start {
                    self.eval_cursor = 0;
                }
                let start = self.eval_cursor;
                self.eval_cursor += self.cfg.time.episode_length;
                start
            }
        };

        let soh = match (&self.carried_soh, self.cfg.degradation.carry_soh) {
            (Some(carried), true) => carried.clone(),
            _ => vec![self.cfg.degradation.init_soh; self.cfg.fleet.n_vehicles],
        };
        self.state = EpisodeState::new(start_step, self.cfg.fleet.init_soc, &soh);
        for (i, vehicle) in self.state.vehicles.iter_mut().enumerate() {
            vehicle.plugged_in = !self.schedules[i].is_away(start_step);
        }
        self.phase = Phase::Stepping;

        info!(start_step, picker = %self.cfg.time.time_picker, "episode reset");
        Ok(self.observation())
    }

    /// Advance one step. Out-of-range action entries are clamped, never
    /// rejected. Calling `step` on a finished episode returns the terminal
    /// observation again with zero reward.
    pub fn step(&mut self, actions: &[f64]) -> Result<StepResult, SimError> {
        match self.phase {
            Phase::AwaitingReset => {
                return Err(SimError::configuration("step() called before reset()"));
            }
            Phase::Done => {
                let observation = self.observation();
                let n = self.cfg.fleet.n_vehicles;
                return Ok(StepResult {
                    observation,
                    reward: 0.0,
                    done: true,
                    diagnostics: StepDiagnostics {
                        breakdown: RewardBreakdown::default(),
                        grid_draw_kw: 0.0,
                        overload_kw: 0.0,
                        vehicle_power_kw: vec![0.0; n],
                        invalid_action: vec![false; n],
                        buy_price: 0.0,
                    },
                });
            }
            Phase::Stepping => {}
        }
        if actions.len() != self.cfg.fleet.n_vehicles {
            return Err(SimError::configuration(format!(
                "action vector of length {} for a fleet of {}",
                actions.len(),
                self.cfg.fleet.n_vehicles
            )));
        }

        let abs = self.state.absolute_step();
        let dt = self.cfg.time.dt_hours();
        let fleet = &self.cfg.fleet;
        let action_floor = if fleet.v2g { -1.0 } else { 0.0 };
        let p_max = fleet.max_power_kw();

        let mut breakdown = RewardBreakdown::default();
        let mut vehicle_power_kw = vec![0.0; actions.len()];
        let mut invalid_action = vec![false; actions.len()];
        let mut buy_energy_kwh = 0.0;
        let mut feed_energy_kwh = 0.0;

        for (i, &raw) in actions.iter().enumerate() {
            let attempted = raw.clamp(action_floor, 1.0);
            let schedule = &self.schedules[i];
            let vehicle = &mut self.state.vehicles[i];
            let usable_cap = fleet.init_battery_cap * vehicle.soh;
            let soc_before = vehicle.soc;
            let mut throughput_kwh = 0.0;

            if schedule.is_away(abs) {
                vehicle.plugged_in = false;
                // fresh bonus latch for the next dwell window
                vehicle.target_bonus_given = false;
                if attempted != 0.0 {
                    breakdown.invalid_action += attempted.abs();
                    invalid_action[i] = true;
                }
                if let Some(trip) = schedule.departure_at(abs) {
                    // trip consumption hits the battery at departure,
                    // independent of the action
                    vehicle.soc = (vehicle.soc - trip.consumption_kwh / usable_cap).max(0.0);
                    throughput_kwh += trip.consumption_kwh.min(soc_before * usable_cap);
                }
            } else {
                vehicle.plugged_in = true;
                let requested_kw = attempted * p_max;
                if requested_kw > 0.0 {
                    // charging: bounded by the headroom to target SoC
                    let headroom_kwh = (fleet.target_soc - vehicle.soc).max(0.0) * usable_cap;
                    let headroom_kw = headroom_kwh / (fleet.charging_eff * dt);
                    let power_kw = requested_kw.min(headroom_kw);
                    let excess_kw = requested_kw - power_kw;
                    if excess_kw > 0.0 {
                        breakdown.overcharge_kw += excess_kw;
                    }
                    let stored_kwh = power_kw * dt * fleet.charging_eff;
                    vehicle.soc = (vehicle.soc + stored_kwh / usable_cap).min(1.0);
                    throughput_kwh += stored_kwh;
                    buy_energy_kwh += power_kw * dt;
                    vehicle_power_kw[i] = power_kw;
                } else if requested_kw < 0.0 {
                    // discharging: bounded by the energy left in the pack
                    let deliverable_kw =
                        vehicle.soc * usable_cap * fleet.discharging_eff / dt;
                    let power_kw = requested_kw.max(-deliverable_kw);
                    let drained_kwh = -power_kw * dt / fleet.discharging_eff;
                    vehicle.soc = (vehicle.soc - drained_kwh / usable_cap).max(0.0);
                    throughput_kwh += drained_kwh;
                    feed_energy_kwh += -power_kw * dt;
                    vehicle_power_kw[i] = power_kw;
                }

                if !vehicle.target_bonus_given && vehicle.soc + 1e-9 >= fleet.target_soc {
                    breakdown.target_bonus += 1.0;
                    vehicle.target_bonus_given = true;
                }
            }

            if let Some(model) = &self.degradation {
                let decrement = model.step_decrement(&StressContext {
                    dt_hours: dt,
                    soc_before,
                    soc_after: vehicle.soc,
                    throughput_kwh,
                    capacity_kwh: fleet.init_battery_cap,
                    ambient_temp_c: self.cfg.degradation.ambient_temp_c,
                });
                let floored =
                    (vehicle.soh - decrement).max(self.cfg.degradation.soh_floor);
                breakdown.soh_loss += vehicle.soh - floored;
                vehicle.soh = floored;
            }
        }

        // site aggregation against the shared grid connection
        let vehicle_draw_kw: f64 = vehicle_power_kw.iter().sum();
        let grid_draw_kw =
            vehicle_draw_kw + self.market.building_load_kw[abs] - self.market.pv_generation_kw[abs];
        let overload_kw = (grid_draw_kw - self.cfg.grid.grid_connection_kw).max(0.0);
        breakdown.overload_kwh = overload_kw * dt;

        // economics: vehicle energy valued at the current tariffs
        let buy_price = self.market.buy_tariff[abs];
        let expense = buy_energy_kwh * buy_price;
        let revenue = feed_energy_kwh * self.market.feed_in_tariff[abs];
        breakdown.energy_net = shape_monetary(
            revenue - expense,
            self.cfg.reward.cost_mul,
            self.cfg.reward.cost_exp,
        );

        let reward = breakdown.total(&self.weights);
        self.state.cumulative.accumulate(&breakdown);
        self.state.step += 1;

        let span_left = self.cfg.time.max_lookahead_steps() + 1;
        let done = self.state.step >= self.cfg.time.episode_length
            || !self.market.covers(self.state.absolute_step(), span_left);
        if done {
            self.phase = Phase::Done;
            if self.cfg.degradation.carry_soh {
                self.carried_soh =
                    Some(self.state.vehicles.iter().map(|v| v.soh).collect());
            }
            debug!(
                steps = self.state.step,
                total_reward = self.state.cumulative.total(&self.weights),
                "episode finished"
            );
        }

        Ok(StepResult {
            observation: self.observation(),
            reward,
            done,
            diagnostics: StepDiagnostics {
                breakdown,
                grid_draw_kw,
                overload_kw,
                vehicle_power_kw,
                invalid_action,
                buy_price,
            },
        })
    }

    /// Observation for the current step.
    pub fn observation(&self) -> Observation {
        let abs = self.state.absolute_step();
        let dt = self.cfg.time.dt_hours();
        let fleet = &self.cfg.fleet;
        let hour = self.market.hour_of_day(abs);
        let angle = TAU * hour / 24.0;

        let vehicles = self
            .state
            .vehicles
            .iter()
            .zip(self.schedules.iter())
            .map(|(v, schedule)| {
                let plugged_in = !schedule.is_away(abs);
                let hours_to_departure = schedule
                    .next_departure_after(abs)
                    .map(|d| (d - abs) as f64 * dt);
                let laxity = match (plugged_in, hours_to_departure) {
                    (true, Some(ttd)) => {
                        let needed_kwh =
                            (fleet.target_soc - v.soc).max(0.0) * fleet.init_battery_cap * v.soh;
                        let hours_needed =
                            needed_kwh / (fleet.max_power_kw() * fleet.charging_eff);
                        Some(if hours_needed > 0.0 { ttd / hours_needed } else { f64::MAX })
                    }
                    _ => None,
                };
                VehicleObservation {
                    soc: v.soc,
                    soh: v.soh,
                    plugged_in,
                    hours_to_departure,
                    laxity,
                }
            })
            .collect();

        Observation {
            episode_step: self.state.step,
            hour_of_day: hour,
            hour_sin: angle.sin(),
            hour_cos: angle.cos(),
            weekday: self.market.weekday(abs),
            vehicles,
            price_lookahead: self
                .market
                .price_window(abs, self.cfg.time.price_lookahead_steps())
                .to_vec(),
            load_lookahead: self
                .market
                .load_window(abs, self.cfg.time.bl_pv_lookahead_steps())
                .to_vec(),
            pv_lookahead: self
                .market
                .pv_window(abs, self.cfg.time.bl_pv_lookahead_steps())
                .to_vec(),
        }
    }

    /// Full-horizon, episode-relative snapshot for perfect-foresight
    /// planners. Reflects vehicle state at the time of the call; intended to
    /// be taken right after `reset`.
    pub fn episode_context(&self) -> EpisodeContext {
        let start = self.state.start_step;
        let horizon = self.cfg.time.episode_length;
        let fleet = &self.cfg.fleet;

        let away = self
            .schedules
            .iter()
            .map(|s| (0..horizon).map(|t| s.is_away(start + t)).collect())
            .collect();
        let departures = self
            .schedules
            .iter()
            .map(|s| {
                (0..horizon)
                    .filter_map(|t| {
                        s.departure_at(start + t).map(|trip| (t, trip.consumption_kwh))
                    })
                    .collect()
            })
            .collect();
        let vehicles = self
            .state
            .vehicles
            .iter()
            .map(|v| VehicleParams {
                usable_capacity_kwh: fleet.init_battery_cap * v.soh,
                max_power_kw: fleet.max_power_kw(),
                charging_eff: fleet.charging_eff,
                discharging_eff: fleet.discharging_eff,
                init_soc: v.soc,
            })
            .collect();

        EpisodeContext {
            start_step: start,
            horizon,
            dt_hours: self.cfg.time.dt_hours(),
            buy_tariff: self.market.buy_tariff[start..start + horizon].to_vec(),
            feed_in_tariff: self.market.feed_in_tariff[start..start + horizon].to_vec(),
            building_load_kw: self.market.building_load_kw[start..start + horizon].to_vec(),
            pv_generation_kw: self.market.pv_generation_kw[start..start + horizon].to_vec(),
            away,
            departures,
            vehicles,
            grid_connection_kw: self.cfg.grid.grid_connection_kw,
            v2g: fleet.v2g,
            target_soc: fleet.target_soc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TariffConfig;
    use crate::schedule::TripEvent;

    fn flat_market(n_steps: usize) -> Arc<MarketContext> {
        Arc::new(MarketContext::flat(
            SimConfig::simulation_origin(),
            4,
            n_steps,
            0.30,
            &TariffConfig::default(),
        ))
    }

    fn one_trip_schedule(n_steps: usize) -> Arc<Vec<VehicleSchedule>> {
        Arc::new(vec![VehicleSchedule::new(
            vec![TripEvent { departure_step: 32, return_step: 60, consumption_kwh: 20.0 }],
            n_steps,
        )
        .unwrap()])
    }

    fn engine() -> SimulationEngine {
        let cfg = SimConfig::default();
        let span = cfg.time.episode_length + cfg.time.max_lookahead_steps();
        SimulationEngine::new(cfg, flat_market(span), one_trip_schedule(span)).unwrap()
    }

    #[test]
    fn test_step_before_reset_is_an_error() {
        let mut engine = engine();
        assert!(matches!(engine.step(&[0.0]), Err(SimError::Configuration(_))));
    }

    #[test]
    fn test_reset_initializes_fleet() {
        let mut engine = engine();
        let obs = engine.reset(Some(1)).unwrap();
        assert_eq!(obs.vehicles.len(), 1);
        assert_eq!(obs.vehicles[0].soc, 0.5);
        assert!(obs.vehicles[0].plugged_in);
        assert_eq!(obs.price_lookahead.len(), 32);
    }

    #[test]
    fn test_full_charge_action_respects_target_headroom() {
        let mut engine = engine();
        engine.reset(Some(1)).unwrap();
        let mut soc = 0.5;
        for _ in 0..32 {
            let result = engine.step(&[1.0]).unwrap();
            let new_soc = result.observation.vehicles[0].soc;
            assert!(new_soc >= soc);
            assert!(new_soc <= engine.config().fleet.target_soc + 1e-9);
            soc = new_soc;
        }
        assert!((soc - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_departure_applies_trip_consumption() {
        let mut engine = engine();
        engine.reset(Some(1)).unwrap();
        // idle until just before departure at step 32
        for _ in 0..32 {
            engine.step(&[0.0]).unwrap();
        }
        let before = engine.state().vehicles[0].soc;
        let result = engine.step(&[0.0]).unwrap();
        let after = engine.state().vehicles[0].soc;
        // 20 kWh on a 60 kWh pack
        assert!((before - after - 20.0 / 60.0).abs() < 1e-3);
        assert!(!result.observation.vehicles[0].plugged_in);
    }

    #[test]
    fn test_invalid_action_on_away_vehicle_is_penalized_not_applied() {
        let mut engine = engine();
        engine.reset(Some(1)).unwrap();
        for _ in 0..33 {
            engine.step(&[0.0]).unwrap();
        }
        // vehicle is away now; command full power anyway
        let result = engine.step(&[1.0]).unwrap();
        assert!(result.diagnostics.invalid_action[0]);
        assert!(result.diagnostics.breakdown.invalid_action > 0.0);
        assert_eq!(result.diagnostics.vehicle_power_kw[0], 0.0);
    }

    #[test]
    fn test_action_clamped_not_rejected() {
        let mut engine = engine();
        engine.reset(Some(1)).unwrap();
        let result = engine.step(&[7.5]).unwrap();
        // clamped to 1.0: power is bounded by the 11 kW charger
        assert!(result.diagnostics.vehicle_power_kw[0] <= 11.0 + 1e-9);
    }

    #[test]
    fn test_discharge_requires_v2g() {
        let mut engine = engine();
        engine.reset(Some(1)).unwrap();
        let result = engine.step(&[-1.0]).unwrap();
        assert_eq!(result.diagnostics.vehicle_power_kw[0], 0.0);
    }

    #[test]
    fn test_episode_terminates_at_step_budget() {
        let mut engine = engine();
        engine.reset(Some(1)).unwrap();
        let mut done = false;
        for _ in 0..96 {
            done = engine.step(&[0.0]).unwrap().done;
        }
        assert!(done);
        // stepping past the end is benign
        let result = engine.step(&[0.0]).unwrap();
        assert!(result.done);
        assert_eq!(result.reward, 0.0);
    }

    #[test]
    fn test_overload_penalty_scales_with_excess() {
        let mut cfg = SimConfig::default();
        cfg.fleet.n_vehicles = 1;
        cfg.grid.grid_connection_kw = 5.0;
        let span = cfg.time.episode_length + cfg.time.max_lookahead_steps();
        let mut engine =
            SimulationEngine::new(cfg, flat_market(span), one_trip_schedule(span)).unwrap();
        engine.reset(Some(1)).unwrap();
        // 11 kW of charging against a 5 kW limit
        let result = engine.step(&[1.0]).unwrap();
        assert!((result.diagnostics.overload_kw - 6.0).abs() < 1e-9);
        assert!(result.diagnostics.breakdown.overload_kwh > 0.0);
    }

    #[test]
    fn test_degradation_disabled_keeps_soh_exact() {
        let mut cfg = SimConfig::default();
        cfg.degradation.calculate_degradation = false;
        let span = cfg.time.episode_length + cfg.time.max_lookahead_steps();
        let mut engine =
            SimulationEngine::new(cfg, flat_market(span), one_trip_schedule(span)).unwrap();
        engine.reset(Some(1)).unwrap();
        for _ in 0..96 {
            engine.step(&[1.0]).unwrap();
        }
        assert_eq!(engine.state().vehicles[0].soh, 1.0);
    }

    #[test]
    fn test_soh_monotonically_non_increasing() {
        let mut engine = engine();
        engine.reset(Some(1)).unwrap();
        let mut soh = engine.state().vehicles[0].soh;
        for _ in 0..96 {
            engine.step(&[1.0]).unwrap();
            let next = engine.state().vehicles[0].soh;
            assert!(next <= soh);
            soh = next;
        }
        assert!(soh < 1.0);
    }

    #[test]
    fn test_mismatched_action_vector_rejected() {
        let mut engine = engine();
        engine.reset(Some(1)).unwrap();
        assert!(engine.step(&[0.0, 0.0]).is_err());
    }

    #[test]
    fn test_episode_context_snapshot() {
        let mut engine = engine();
        engine.reset(Some(1)).unwrap();
        let ctx = engine.episode_context();
        assert_eq!(ctx.horizon, 96);
        assert_eq!(ctx.n_vehicles(), 1);
        assert!(ctx.away[0][40]);
        assert!(!ctx.away[0][10]);
        assert_eq!(ctx.departures[0], vec![(32, 20.0)]);
        assert_eq!(ctx.buy_tariff.len(), 96);
    }

    #[test]
    fn test_short_data_is_rejected_at_reset() {
        let cfg = SimConfig::default();
        let mut engine =
            SimulationEngine::new(cfg, flat_market(50), one_trip_schedule(50)).unwrap();
        assert!(matches!(engine.reset(None), Err(SimError::DataAlignment(_))));
    }

    #[test]
    fn test_eval_picker_walks_forward() {
        let mut cfg = SimConfig::default();
        cfg.time.time_picker = TimePicker::Eval;
        let n = 3 * 96 + cfg.time.max_lookahead_steps();
        let mut engine =
            SimulationEngine::new(cfg, flat_market(n), one_trip_schedule(n)).unwrap();
        engine.reset(None).unwrap();
        let first = engine.state().start_step;
        engine.reset(None).unwrap();
        let second = engine.state().start_step;
        assert_eq!(first, 0);
        assert_eq!(second, 96);
    }
}
