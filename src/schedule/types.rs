use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// One trip: the vehicle is away during `[departure_step, return_step)` and
/// `consumption_kwh` is drawn from the battery at the moment of departure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TripEvent {
    pub departure_step: usize,
    pub return_step: usize,
    pub consumption_kwh: f64,
}

/// Ordered, non-overlapping trip events for one vehicle over the data horizon.
///
/// Invariant: departure always precedes the paired return, and consecutive
/// events never overlap. The vehicle is available (pluggable) in the gaps
/// between a return and the next departure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleSchedule {
    pub trips: Vec<TripEvent>,
    pub horizon_steps: usize,
}

impl VehicleSchedule {
    pub fn new(trips: Vec<TripEvent>, horizon_steps: usize) -> Result<Self, SimError> {
        let schedule = Self { trips, horizon_steps };
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        for trip in &self.trips {
            if trip.departure_step >= trip.return_step {
                return Err(SimError::configuration(format!(
                    "trip departure at step {} does not precede return at step {}",
                    trip.departure_step, trip.return_step
                )));
            }
            if trip.consumption_kwh < 0.0 {
                return Err(SimError::configuration("negative trip consumption"));
            }
        }
        for pair in self.trips.windows(2) {
            if pair[1].departure_step < pair[0].return_step {
                return Err(SimError::configuration(format!(
                    "overlapping trips: return at step {} after next departure at step {}",
                    pair[0].return_step, pair[1].departure_step
                )));
            }
        }
        Ok(())
    }

    /// Vehicle is away during `[departure, return)`.
    pub fn is_away(&self, step: usize) -> bool {
        self.trip_covering(step).is_some()
    }

    /// The trip departing exactly at `step`, if any.
    pub fn departure_at(&self, step: usize) -> Option<&TripEvent> {
        let idx = self.trips.partition_point(|t| t.departure_step < step);
        self.trips.get(idx).filter(|t| t.departure_step == step)
    }

    /// The trip the vehicle is away on at `step`, if any.
    pub fn trip_covering(&self, step: usize) -> Option<&TripEvent> {
        let idx = self.trips.partition_point(|t| t.return_step <= step);
        self.trips
            .get(idx)
            .filter(|t| t.departure_step <= step && step < t.return_step)
    }

    /// Departure step of the next trip at or after `step`.
    pub fn next_departure_after(&self, step: usize) -> Option<usize> {
        let idx = self.trips.partition_point(|t| t.departure_step < step);
        self.trips.get(idx).map(|t| t.departure_step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> VehicleSchedule {
        VehicleSchedule::new(
            vec![
                TripEvent { departure_step: 10, return_step: 20, consumption_kwh: 5.0 },
                TripEvent { departure_step: 40, return_step: 50, consumption_kwh: 8.0 },
            ],
            96,
        )
        .unwrap()
    }

    #[test]
    fn test_availability_windows() {
        let s = schedule();
        assert!(!s.is_away(9));
        assert!(s.is_away(10)); // away from the departure step
        assert!(s.is_away(19));
        assert!(!s.is_away(20)); // available again at return
        assert!(!s.is_away(39));
        assert!(s.is_away(45));
    }

    #[test]
    fn test_departure_lookup() {
        let s = schedule();
        assert_eq!(s.departure_at(10).unwrap().consumption_kwh, 5.0);
        assert!(s.departure_at(11).is_none());
        assert_eq!(s.next_departure_after(0), Some(10));
        assert_eq!(s.next_departure_after(10), Some(10));
        assert_eq!(s.next_departure_after(11), Some(40));
        assert_eq!(s.next_departure_after(41), None);
    }

    #[test]
    fn test_inverted_trip_rejected() {
        let result = VehicleSchedule::new(
            vec![TripEvent { departure_step: 20, return_step: 10, consumption_kwh: 1.0 }],
            96,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_overlapping_trips_rejected() {
        let result = VehicleSchedule::new(
            vec![
                TripEvent { departure_step: 10, return_step: 30, consumption_kwh: 1.0 },
                TripEvent { departure_step: 25, return_step: 40, consumption_kwh: 1.0 },
            ],
            96,
        );
        assert!(result.is_err());
    }
}
