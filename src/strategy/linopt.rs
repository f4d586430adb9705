//! Linear-optimization benchmark strategy.
//!
//! Formulates the episode as a linear program under perfect foresight: the
//! full price/tariff trajectory and every trip are known at plan time. The
//! solved plan is committed in `begin_episode` and replayed step by step.
//!
//! Decision variables are per-vehicle per-step charging power (plus
//! discharging power when bidirectional charging is enabled). The objective
//! minimizes net cost over the horizon; constraints enforce charger power
//! bounds masked by availability, SoC dynamics with asymmetric efficiencies,
//! SoC limits, forced trip consumption at departures, target SoC at every
//! departure (hard, or penalized slack when relaxed), and the aggregate grid
//! connection limit per step.
//!
//! Infeasibility (target unreachable given charger power and dwell time) is
//! surfaced as a distinct error; the caller decides whether to relax the
//! target constraint and retry or skip the episode.

use good_lp::*;
use tracing::{debug, info};

use crate::engine::{EpisodeContext, Observation};
use crate::error::SimError;

use super::ChargingStrategy;

/// Objective weight on target-SoC slack in the relaxed formulation. Large
/// enough that slack is only used when the hard constraint cannot hold.
const SLACK_PENALTY: f64 = 1.0e4;

pub struct LinearOptimization {
    soft_target: bool,
    /// Committed plan: `plan[t][v]`, normalized actions
    plan: Vec<Vec<f64>>,
}

impl LinearOptimization {
    pub fn new() -> Self {
        Self { soft_target: false, plan: Vec::new() }
    }

    pub fn with_soft_target() -> Self {
        Self { soft_target: true, plan: Vec::new() }
    }

    fn solve(&self, ctx: &EpisodeContext) -> Result<Vec<Vec<f64>>, SimError> {
        let n = ctx.n_vehicles();
        let horizon = ctx.horizon;
        let dt = ctx.dt_hours;

        let mut vars = ProblemVariables::new();

        // charging power (kW, grid side), zero while away
        let charge: Vec<Vec<Variable>> = (0..n)
            .map(|v| {
                let p_max = ctx.vehicles[v].max_power_kw;
                (0..horizon)
                    .map(|t| {
                        let bound = if ctx.away[v][t] { 0.0 } else { p_max };
                        vars.add(variable().min(0.0).max(bound))
                    })
                    .collect()
            })
            .collect();

        // discharging power (kW, grid side), only with bidirectional charging
        let discharge: Option<Vec<Vec<Variable>>> = ctx.v2g.then(|| {
            (0..n)
                .map(|v| {
                    let p_max = ctx.vehicles[v].max_power_kw;
                    (0..horizon)
                        .map(|t| {
                            let bound = if ctx.away[v][t] { 0.0 } else { p_max };
                            vars.add(variable().min(0.0).max(bound))
                        })
                        .collect()
                })
                .collect()
        });

        // state of charge, one extra node past the horizon
        let soc: Vec<Vec<Variable>> = (0..n)
            .map(|_| vars.add_vector(variable().min(0.0).max(1.0), horizon + 1))
            .collect();

        // target-SoC slack per departure in the relaxed formulation
        let slack: Vec<Vec<Variable>> = (0..n)
            .map(|v| {
                if self.soft_target {
                    vars.add_vector(variable().min(0.0), ctx.departures[v].len())
                } else {
                    Vec::new()
                }
            })
            .collect();

        // objective: buy cost minus feed-in revenue, plus slack penalties
        let energy_cost = (0..horizon)
            .map(|t| {
                let buy = ctx.buy_tariff[t] * dt;
                let feed = ctx.feed_in_tariff[t] * dt;
                let mut step_cost = (0..n).map(|v| charge[v][t] * buy).sum::<Expression>();
                if let Some(discharge) = &discharge {
                    step_cost -= (0..n).map(|v| discharge[v][t] * feed).sum::<Expression>();
                }
                step_cost
            })
            .sum::<Expression>();
        let slack_cost = slack
            .iter()
            .flatten()
            .map(|s| *s * SLACK_PENALTY)
            .sum::<Expression>();
        let objective = energy_cost + slack_cost;

        let mut model = vars.minimise(objective).using(default_solver);

        for v in 0..n {
            let params = &ctx.vehicles[v];
            let cap = params.usable_capacity_kwh;

            model = model.with(constraint!(soc[v][0] == params.init_soc));

            let mut next_departure = 0usize;
            for t in 0..horizon {
                // SoC dynamics with asymmetric efficiencies
                let mut delta: Expression = charge[v][t] * (params.charging_eff * dt / cap);
                if let Some(discharge) = &discharge {
                    delta -= discharge[v][t] * (dt / (params.discharging_eff * cap));
                }
                let departing = ctx.departures[v]
                    .get(next_departure)
                    .map_or(false, |(step, _)| *step == t);
                let trip_kwh = if departing { ctx.departures[v][next_departure].1 } else { 0.0 };
                model = model
                    .with(constraint!(soc[v][t + 1] == soc[v][t] + delta - trip_kwh / cap));

                // target SoC at the moment of departure
                if departing {
                    if self.soft_target {
                        model = model.with(constraint!(
                            soc[v][t] + slack[v][next_departure] >= ctx.target_soc
                        ));
                    } else {
                        model = model.with(constraint!(soc[v][t] >= ctx.target_soc));
                    }
                    next_departure += 1;
                }
            }
        }

        // aggregate grid connection limit, net of building load and PV
        for t in 0..horizon {
            let headroom = (ctx.grid_connection_kw - ctx.building_load_kw[t]
                + ctx.pv_generation_kw[t])
                .max(0.0);
            let mut fleet_draw = (0..n)
                .map(|v| Expression::from(charge[v][t]))
                .sum::<Expression>();
            if let Some(discharge) = &discharge {
                fleet_draw -= (0..n)
                    .map(|v| Expression::from(discharge[v][t]))
                    .sum::<Expression>();
            }
            model = model.with(constraint!(fleet_draw <= headroom));
        }

        let solution = match model.solve() {
            Ok(solution) => solution,
            Err(ResolutionError::Infeasible) => {
                return Err(SimError::InfeasibleOptimization {
                    start_step: ctx.start_step,
                    reason: "target SoC unreachable under charger power, dwell time and grid limits"
                        .to_string(),
                })
            }
            Err(other) => return Err(SimError::Solver(other.to_string())),
        };

        let plan = (0..horizon)
            .map(|t| {
                (0..n)
                    .map(|v| {
                        let mut power_kw = solution.value(charge[v][t]);
                        if let Some(discharge) = &discharge {
                            power_kw -= solution.value(discharge[v][t]);
                        }
                        (power_kw / ctx.vehicles[v].max_power_kw).clamp(-1.0, 1.0)
                    })
                    .collect()
            })
            .collect();
        Ok(plan)
    }
}

impl Default for LinearOptimization {
    fn default() -> Self {
        Self::new()
    }
}

impl ChargingStrategy for LinearOptimization {
    fn name(&self) -> &'static str {
        "linear_optimization"
    }

    fn begin_episode(&mut self, ctx: &EpisodeContext) -> Result<(), SimError> {
        info!(
            start_step = ctx.start_step,
            horizon = ctx.horizon,
            vehicles = ctx.n_vehicles(),
            soft_target = self.soft_target,
            "solving episode LP"
        );
        self.plan = self.solve(ctx)?;
        Ok(())
    }

    fn decide(&mut self, observation: &Observation) -> Vec<f64> {
        match self.plan.get(observation.episode_step) {
            Some(actions) => actions.clone(),
            None => vec![0.0; observation.vehicles.len()],
        }
    }

    fn relax_target(&mut self) -> bool {
        if self.soft_target {
            return false;
        }
        debug!("relaxing hard target-SoC constraint to penalized slack");
        self.soft_target = true;
        true
    }
}
