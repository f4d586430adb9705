//! Spread charging evenly across the dwell window.
//!
//! For each plugged-in vehicle, command the minimum constant power that
//! reaches target SoC exactly at the next departure minus the configured
//! laxity margin, using the vehicle's own schedule rather than a forecast.

use crate::config::FleetConfig;
use crate::engine::Observation;

use super::ChargingStrategy;

pub struct Distributed {
    fleet: FleetConfig,
}

impl Distributed {
    pub fn new(fleet: FleetConfig) -> Self {
        Self { fleet }
    }
}

impl ChargingStrategy for Distributed {
    fn name(&self) -> &'static str {
        "distributed"
    }

    fn decide(&mut self, observation: &Observation) -> Vec<f64> {
        let p_max = self.fleet.max_power_kw();
        observation
            .vehicles
            .iter()
            .map(|v| {
                if !v.plugged_in || v.soc >= self.fleet.target_soc {
                    return 0.0;
                }
                let Some(ttd) = v.hours_to_departure else {
                    // no deadline left in the horizon: nothing forces charging
                    return 0.0;
                };
                let needed_kwh = (self.fleet.target_soc - v.soc)
                    * self.fleet.init_battery_cap
                    * v.soh;
                let dwell_h = ttd - self.fleet.min_laxity;
                if dwell_h <= 0.0 {
                    // past the laxity margin; catch up at full power
                    return 1.0;
                }
                let required_kw = needed_kwh / (self.fleet.charging_eff * dwell_h);
                (required_kw / p_max).clamp(0.0, 1.0)
            })
            .collect()
    }
}
