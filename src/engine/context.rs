//! Perfect-foresight episode context.
//!
//! A full-horizon, episode-relative snapshot of prices, tariffs, building
//! load, PV, availability and departures. This is the oracle the
//! linear-optimization benchmark plans against; heuristic strategies only
//! read the per-step observation.

use serde::{Deserialize, Serialize};

/// Static parameters of one vehicle for the episode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VehicleParams {
    /// Capacity scaled by SoH at episode start (kWh)
    pub usable_capacity_kwh: f64,
    /// min(wallbox power, onboard-charger max) (kW)
    pub max_power_kw: f64,
    pub charging_eff: f64,
    pub discharging_eff: f64,
    /// SoC at episode start
    pub init_soc: f64,
}

/// Everything a perfect-foresight planner needs for one episode.
/// All step indices are episode-relative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeContext {
    /// Absolute step in the data horizon where the episode starts
    pub start_step: usize,
    /// Episode length in steps
    pub horizon: usize,
    /// Step duration (hours)
    pub dt_hours: f64,
    pub buy_tariff: Vec<f64>,
    pub feed_in_tariff: Vec<f64>,
    pub building_load_kw: Vec<f64>,
    pub pv_generation_kw: Vec<f64>,
    /// `away[v][t]`: vehicle `v` is on a trip at step `t`
    pub away: Vec<Vec<bool>>,
    /// Per vehicle: (step, kWh) trip consumptions applied at departure
    pub departures: Vec<Vec<(usize, f64)>>,
    pub vehicles: Vec<VehicleParams>,
    pub grid_connection_kw: f64,
    pub v2g: bool,
    pub target_soc: f64,
}

impl EpisodeContext {
    pub fn n_vehicles(&self) -> usize {
        self.vehicles.len()
    }
}
