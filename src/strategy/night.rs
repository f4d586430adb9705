//! Charge at maximum power only inside a configured clock-time window.

use crate::engine::Observation;

use super::ChargingStrategy;

pub struct NightWindow {
    target_soc: f64,
    /// Window start hour (inclusive), 24h clock
    start_hour: f64,
    /// Window end hour (exclusive)
    end_hour: f64,
}

impl NightWindow {
    pub fn new(target_soc: f64, start_hour: f64, end_hour: f64) -> Self {
        Self { target_soc, start_hour, end_hour }
    }

    /// Window membership, handling windows that wrap past midnight.
    fn in_window(&self, hour: f64) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

impl ChargingStrategy for NightWindow {
    fn name(&self) -> &'static str {
        "night_window"
    }

    fn decide(&mut self, observation: &Observation) -> Vec<f64> {
        let charging_time = self.in_window(observation.hour_of_day);
        observation
            .vehicles
            .iter()
            .map(|v| {
                if charging_time && v.plugged_in && v.soc < self.target_soc {
                    1.0
                } else {
                    0.0
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::VehicleObservation;

    fn obs(hour: f64) -> Observation {
        Observation {
            episode_step: 0,
            hour_of_day: hour,
            hour_sin: 0.0,
            hour_cos: 1.0,
            weekday: 0,
            vehicles: vec![VehicleObservation {
                soc: 0.4,
                soh: 1.0,
                plugged_in: true,
                hours_to_departure: Some(6.0),
                laxity: Some(2.0),
            }],
            price_lookahead: vec![],
            load_lookahead: vec![],
            pv_lookahead: vec![],
        }
    }

    #[test]
    fn test_charges_only_inside_window() {
        let mut strategy = NightWindow::new(0.85, 1.0, 5.0);
        assert_eq!(strategy.decide(&obs(2.0)), vec![1.0]);
        assert_eq!(strategy.decide(&obs(5.0)), vec![0.0]);
        assert_eq!(strategy.decide(&obs(12.0)), vec![0.0]);
    }

    #[test]
    fn test_window_wrapping_midnight() {
        let mut strategy = NightWindow::new(0.85, 22.0, 2.0);
        assert_eq!(strategy.decide(&obs(23.0)), vec![1.0]);
        assert_eq!(strategy.decide(&obs(1.0)), vec![1.0]);
        assert_eq!(strategy.decide(&obs(3.0)), vec![0.0]);
    }
}
