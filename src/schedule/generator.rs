//! Stochastic trip schedule generation.
//!
//! For each calendar day the generator classifies weekday/weekend, samples
//! departure and return hours, trip distance and per-km consumption from the
//! configured normal distributions, and emits one [`TripEvent`] when the
//! sampled window is physically plausible. Out-of-bound samples are resampled
//! up to a fixed attempt budget and clamped as a last resort.
//!
//! Deterministic given a seed; omitting the seed draws entropy.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

use crate::config::{BoundedNormal, DayStats, ScheduleConfig, SimConfig};
use crate::error::SimError;

use super::{TripEvent, VehicleSchedule};

/// Resample attempts before falling back to clamping.
const RESAMPLE_ATTEMPTS: usize = 8;

/// Minimum dwell-at-destination gap between departure and return (hours).
const MIN_TRIP_GAP_HOURS: f64 = 0.25;

pub struct ScheduleGenerator {
    cfg: ScheduleConfig,
    steps_per_hour: u32,
    rng: StdRng,
}

impl ScheduleGenerator {
    pub fn new(cfg: ScheduleConfig, steps_per_hour: u32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { cfg, steps_per_hour, rng }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(
            config.schedule.clone(),
            config.time.time_steps_per_hour,
            config.seed,
        )
    }

    /// Generate schedules for `n_vehicles` over `days` calendar days starting
    /// at `start_date`. `usable_capacity_kwh` bounds each trip so it never
    /// implies a negative post-trip SoC (capacity net of the reserve).
    pub fn generate_fleet(
        &mut self,
        n_vehicles: usize,
        start_date: NaiveDate,
        days: usize,
        usable_capacity_kwh: f64,
    ) -> Result<Vec<VehicleSchedule>, SimError> {
        (0..n_vehicles)
            .map(|_| self.generate_vehicle(start_date, days, usable_capacity_kwh))
            .collect()
    }

    fn generate_vehicle(
        &mut self,
        start_date: NaiveDate,
        days: usize,
        usable_capacity_kwh: f64,
    ) -> Result<VehicleSchedule, SimError> {
        let day_steps = 24 * self.steps_per_hour as usize;
        let horizon_steps = days * day_steps;
        let max_energy = self
            .cfg
            .max_trip_consumption_kwh
            .min(usable_capacity_kwh * (1.0 - self.cfg.min_reserve_soc));

        let mut trips = Vec::with_capacity(days);
        for day in 0..days {
            let date = start_date + Duration::days(day as i64);
            let stats = if is_weekend(date) {
                self.cfg.weekend()
            } else {
                self.cfg.weekday()
            };

            let Some((departure_h, return_h)) = self.sample_trip_window(&stats) else {
                continue; // vehicle stays home this day
            };

            let distance_km = self.sample_bounded(&stats.distance_km);
            let consumption_per_km = self.sample_bounded(&stats.consumption_kwh_per_km);
            let consumption_kwh = (distance_km * consumption_per_km).min(max_energy);

            let day_offset = day * day_steps;
            let departure_step = day_offset + self.hour_to_step(departure_h);
            let return_step = (day_offset + self.hour_to_step(return_h)).min(horizon_steps);
            if departure_step >= return_step {
                continue; // window collapsed at this resolution
            }

            trips.push(TripEvent {
                departure_step,
                return_step,
                consumption_kwh,
            });
        }

        VehicleSchedule::new(trips, horizon_steps)
    }

    /// Sample a (departure, return) hour pair. Returns `None` when no valid
    /// window exists for the day (the sampled departure would not precede the
    /// return even after clamping).
    fn sample_trip_window(&mut self, stats: &DayStats) -> Option<(f64, f64)> {
        let departure = self.sample_bounded(&stats.departure_hour);
        for _ in 0..RESAMPLE_ATTEMPTS {
            let ret = self.sample_bounded(&stats.return_hour);
            if ret >= departure + MIN_TRIP_GAP_HOURS {
                return Some((departure, ret));
            }
        }
        // last resort: clamp the return to the latest allowed hour
        let ret = stats.return_hour.max;
        if ret >= departure + MIN_TRIP_GAP_HOURS {
            debug!(departure, ret, "return hour clamped after resample budget");
            return Some((departure, ret));
        }
        None
    }

    /// Draw from the normal distribution, resampling out-of-bound values up
    /// to the attempt budget, then clamping.
    fn sample_bounded(&mut self, bounds: &BoundedNormal) -> f64 {
        let normal = Normal::new(bounds.mean, bounds.std).unwrap();
        for _ in 0..RESAMPLE_ATTEMPTS {
            let sample = normal.sample(&mut self.rng);
            if sample >= bounds.min && sample <= bounds.max {
                return sample;
            }
        }
        let clamped = normal.sample(&mut self.rng).clamp(bounds.min, bounds.max);
        debug!(mean = bounds.mean, clamped, "sample clamped after resample budget");
        clamped
    }

    fn hour_to_step(&self, hour: f64) -> usize {
        (hour * self.steps_per_hour as f64).round() as usize
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}
