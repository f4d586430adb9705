//! Charge at maximum available power whenever plugged in and below target.

use crate::engine::Observation;

use super::ChargingStrategy;

pub struct Uncontrolled {
    target_soc: f64,
}

impl Uncontrolled {
    pub fn new(target_soc: f64) -> Self {
        Self { target_soc }
    }
}

impl ChargingStrategy for Uncontrolled {
    fn name(&self) -> &'static str {
        "uncontrolled"
    }

    fn decide(&mut self, observation: &Observation) -> Vec<f64> {
        observation
            .vehicles
            .iter()
            .map(|v| {
                if v.plugged_in && v.soc < self.target_soc {
                    1.0
                } else {
                    0.0
                }
            })
            .collect()
    }
}
