//! The observation handed to a charging strategy each step: vehicle states
//! plus the market lookahead context.

use serde::{Deserialize, Serialize};

/// Per-vehicle view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VehicleObservation {
    pub soc: f64,
    pub soh: f64,
    pub plugged_in: bool,
    /// Hours until the next departure, if one remains in the data horizon
    pub hours_to_departure: Option<f64>,
    /// Dwell time over minimum charge time to target; the scheduling
    /// feasibility margin. `None` while away or with no pending departure.
    pub laxity: Option<f64>,
}

/// Full observation for one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Step index within the episode
    pub episode_step: usize,
    /// Fractional hour of day at this step
    pub hour_of_day: f64,
    pub hour_sin: f64,
    pub hour_cos: f64,
    /// Weekday index, Monday = 0
    pub weekday: u32,
    pub vehicles: Vec<VehicleObservation>,
    /// Buy-tariff lookahead window (currency/kWh), current step first
    pub price_lookahead: Vec<f64>,
    /// Building-load lookahead window (kW)
    pub load_lookahead: Vec<f64>,
    /// PV generation lookahead window (kW)
    pub pv_lookahead: Vec<f64>,
}

impl Observation {
    /// Flatten into a feature vector for an external policy. Missing
    /// departure information is encoded as -1.
    pub fn flatten(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(
            4 + 5 * self.vehicles.len()
                + self.price_lookahead.len()
                + self.load_lookahead.len()
                + self.pv_lookahead.len(),
        );
        out.push(self.hour_sin);
        out.push(self.hour_cos);
        out.push(self.weekday as f64 / 6.0);
        out.push(if self.weekday >= 5 { 1.0 } else { 0.0 });
        for v in &self.vehicles {
            out.push(v.soc);
            out.push(v.soh);
            out.push(if v.plugged_in { 1.0 } else { 0.0 });
            out.push(v.hours_to_departure.unwrap_or(-1.0));
            out.push(v.laxity.unwrap_or(-1.0));
        }
        out.extend_from_slice(&self.price_lookahead);
        out.extend_from_slice(&self.load_lookahead);
        out.extend_from_slice(&self.pv_lookahead);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_layout() {
        let obs = Observation {
            episode_step: 3,
            hour_of_day: 6.0,
            hour_sin: 1.0,
            hour_cos: 0.0,
            weekday: 5,
            vehicles: vec![VehicleObservation {
                soc: 0.5,
                soh: 1.0,
                plugged_in: false,
                hours_to_departure: None,
                laxity: None,
            }],
            price_lookahead: vec![0.3, 0.4],
            load_lookahead: vec![1.0],
            pv_lookahead: vec![0.0],
        };
        let flat = obs.flatten();
        assert_eq!(flat.len(), 4 + 5 + 2 + 1 + 1);
        assert_eq!(flat[3], 1.0); // weekend flag
        assert_eq!(flat[6], 0.0); // unplugged
        assert_eq!(flat[7], -1.0); // no pending departure
    }
}
