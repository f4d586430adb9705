//! # Vehicle Trip Schedules
//!
//! Per-vehicle sequences of trip events (departure, return, trip consumption)
//! produced by a stochastic generator from per-weekday/weekend statistical
//! parameters. The generator is the only stochastic subsystem of the core;
//! everything downstream is deterministic given its output.

pub mod generator;
pub mod types;

pub use generator::ScheduleGenerator;
pub use types::{TripEvent, VehicleSchedule};
