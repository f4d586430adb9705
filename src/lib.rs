//! # EV Fleet Charging Simulation
//!
//! Simulates a fleet of electric vehicles charging under real-world
//! constraints (stochastic usage schedules, time-varying prices and tariffs,
//! building load, PV generation, a shared grid connection limit, and battery
//! degradation) and exposes the simulation as a controllable step-based
//! environment.
//!
//! ## Architecture
//!
//! - [`timeseries`]: resamples external price/load/PV series to the
//!   simulation resolution and serves lookahead windows
//! - [`schedule`]: stochastic trip schedule generation per vehicle
//! - [`degradation`]: battery state-of-health models (empirical and
//!   stress-based)
//! - [`engine`]: the per-step state transition, reward computation and
//!   termination logic behind `reset`/`step`
//! - [`strategy`]: pluggable charging policies, from rule-based heuristics to
//!   a perfect-foresight linear-optimization benchmark
//! - [`benchmark`]: a deterministic driver loop collecting per-step telemetry
//!
//! The core is single-threaded and synchronous; engine instances own their
//! state exclusively and can be replicated across parallel workers with no
//! shared mutable resources.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use ev_fleet_sim::benchmark::{BenchmarkConfig, BenchmarkRunner};
//! use ev_fleet_sim::config::SimConfig;
//! use ev_fleet_sim::engine::SimulationEngine;
//! use ev_fleet_sim::schedule::ScheduleGenerator;
//! use ev_fleet_sim::strategy::StrategyKind;
//! use ev_fleet_sim::timeseries::MarketContext;
//!
//! # fn main() -> anyhow::Result<()> {
//! ev_fleet_sim::telemetry::init_tracing();
//! let cfg = SimConfig::load()?;
//! let market = Arc::new(MarketContext::synthetic_daily(
//!     SimConfig::simulation_origin(), 4, 30, 0.30, 8.0, 10.0, &cfg.tariff,
//! ));
//! let usable = cfg.fleet.init_battery_cap * cfg.degradation.init_soh;
//! let schedules = Arc::new(ScheduleGenerator::from_config(&cfg).generate_fleet(
//!     cfg.fleet.n_vehicles,
//!     SimConfig::simulation_origin().date(),
//!     30,
//!     usable,
//! )?);
//!
//! let engine = SimulationEngine::new(cfg.clone(), market, schedules)?;
//! let strategy = StrategyKind::LinearOptimization.build(&cfg);
//! let mut runner = BenchmarkRunner::new(engine, strategy, BenchmarkConfig::default());
//! let report = runner.run()?;
//! println!("total cost: {:.2}", report.total_cost());
//! # Ok(())
//! # }
//! ```

pub mod benchmark;
pub mod config;
pub mod degradation;
pub mod engine;
pub mod error;
pub mod schedule;
pub mod strategy;
pub mod telemetry;
pub mod timeseries;

pub use benchmark::{BenchmarkConfig, BenchmarkReport, BenchmarkRunner, TelemetryRow};
pub use config::{SimConfig, TimePicker};
pub use engine::{Observation, SimulationEngine, StepResult};
pub use error::SimError;
pub use schedule::{ScheduleGenerator, VehicleSchedule};
pub use strategy::{ChargingStrategy, StrategyKind};
pub use timeseries::{MarketContext, TimeSeriesProvider};
