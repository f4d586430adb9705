//! # Simulation Configuration
//!
//! The full configuration surface of the simulation core. Everything is
//! serde-deserializable so configs round-trip through TOML files and
//! environment variables; `SimConfig::load` merges both via figment.
//!
//! Malformed configuration (negative capacities, inverted bounds, zero fleet)
//! is a fatal construction-time error raised by [`SimConfig::validate`].

use anyhow::Result;
use chrono::NaiveDateTime;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::SimError;

/// Episode start selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TimePicker {
    /// Draw a feasible episode start from the seeded RNG
    Random,
    /// Always start at `static_start_step` (reproducible evaluation)
    Static,
    /// Walk forward sequentially across resets
    Eval,
}

/// Time discretization and episode placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// Simulation steps per hour (4 = 15-minute resolution)
    pub time_steps_per_hour: u32,
    /// Steps per episode
    pub episode_length: usize,
    /// Price forecast horizon exposed to strategies (hours)
    pub price_lookahead: u32,
    /// Building-load / PV forecast horizon (hours)
    pub bl_pv_lookahead: u32,
    /// Episode start selection policy
    pub time_picker: TimePicker,
    /// Fixed start step for `TimePicker::Static`
    pub static_start_step: usize,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            time_steps_per_hour: 4, // 15-minute steps
            episode_length: 96,     // one day
            price_lookahead: 8,
            bl_pv_lookahead: 4,
            time_picker: TimePicker::Static,
            static_start_step: 0,
        }
    }
}

impl TimeConfig {
    /// Step duration in hours
    pub fn dt_hours(&self) -> f64 {
        1.0 / self.time_steps_per_hour as f64
    }

    /// Price lookahead in steps
    pub fn price_lookahead_steps(&self) -> usize {
        (self.price_lookahead * self.time_steps_per_hour) as usize
    }

    /// Load/PV lookahead in steps
    pub fn bl_pv_lookahead_steps(&self) -> usize {
        (self.bl_pv_lookahead * self.time_steps_per_hour) as usize
    }

    /// The longest lookahead, used for episode placement checks
    pub fn max_lookahead_steps(&self) -> usize {
        self.price_lookahead_steps().max(self.bl_pv_lookahead_steps())
    }
}

/// Fleet-wide vehicle and charger parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Number of vehicles
    pub n_vehicles: usize,
    /// Battery capacity per vehicle (kWh)
    pub init_battery_cap: f64,
    /// Onboard-charger max power (kW)
    pub obc_max_power: f64,
    /// Wallbox charger power (kW)
    pub charger_power: f64,
    /// Charging efficiency (0, 1]; reduces energy delivered to the battery
    pub charging_eff: f64,
    /// Discharging efficiency (0, 1]; increases energy drawn from the battery
    pub discharging_eff: f64,
    /// Target state of charge at departure, fraction in (0, 1]
    pub target_soc: f64,
    /// Scheduling slack reserved before departure (hours)
    pub min_laxity: f64,
    /// Initial state of charge, fraction in [0, 1]
    pub init_soc: f64,
    /// Allow bidirectional charging (vehicle-to-grid)
    pub v2g: bool,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            n_vehicles: 1,
            init_battery_cap: 60.0, // Typical mid-size EV
            obc_max_power: 11.0,
            charger_power: 11.0,
            charging_eff: 0.91,
            discharging_eff: 0.91,
            target_soc: 0.85,
            min_laxity: 0.25, // 15 minutes of slack
            init_soc: 0.5,
            v2g: false,
        }
    }
}

impl FleetConfig {
    /// Effective per-vehicle power bound: min(wallbox, onboard charger)
    pub fn max_power_kw(&self) -> f64 {
        self.charger_power.min(self.obc_max_power)
    }
}

/// Grid connection parameters shared by the whole site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Grid connection limit for the whole site (kW)
    pub grid_connection_kw: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            grid_connection_kw: 22.0,
        }
    }
}

/// Battery degradation model selection and coefficients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DegradationConfig {
    /// Master toggle; off keeps SoH fixed at `init_soh` for the whole run
    pub calculate_degradation: bool,
    /// Use the simplified empirical variant instead of the stress-based one
    pub deg_emp: bool,
    /// Initial state of health, fraction in (0, 1]
    pub init_soh: f64,
    /// SoH floor; decrements never push SoH below this
    pub soh_floor: f64,
    /// Carry end-of-episode SoH into the next reset
    pub carry_soh: bool,
    /// Ambient temperature seen by the stress model (°C)
    pub ambient_temp_c: f64,
    /// Empirical: SoH lost per equivalent full cycle
    pub emp_loss_per_efc: f64,
    /// Stress: calendar fade per day at 25°C and mid SoC
    pub calendar_fade_per_day: f64,
    /// Stress: temperature sensitivity per 10°C above 25°C
    pub calendar_temp_sensitivity: f64,
    /// Stress: cyclic fade per equivalent full cycle at 100% DoD
    pub cyclic_fade_per_efc: f64,
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            calculate_degradation: true,
            deg_emp: false,
            init_soh: 1.0,
            soh_floor: 0.6, // Common end-of-life threshold
            carry_soh: false,
            ambient_temp_c: 20.0,
            emp_loss_per_efc: 6.0e-5,
            calendar_fade_per_day: 5.0e-6,
            calendar_temp_sensitivity: 0.6,
            cyclic_fade_per_efc: 8.0e-5,
        }
    }
}

/// Reward term coefficients and per-term toggles.
///
/// An `ignore_*` flag zeroes the term's coefficient; the term itself is still
/// computed and reported in diagnostics so runs stay comparable across
/// configurations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Multiplier shaping the monetary term
    pub cost_mul: f64,
    /// Exponent shaping the monetary term magnitude
    pub cost_exp: f64,
    /// Penalty per kWh of grid draw above the connection limit
    pub overloading_coef: f64,
    /// Penalty per unit of attempted action on an unavailable vehicle
    pub invalid_action_coef: f64,
    /// Penalty per kW of commanded power beyond the target-SoC headroom
    pub overcharging_coef: f64,
    /// One-time bonus when a vehicle first reaches target SoC in a dwell window
    pub target_soc_bonus: f64,
    pub ignore_price_reward: bool,
    pub ignore_overloading_penalty: bool,
    pub ignore_invalid_penalty: bool,
    pub ignore_overcharging_penalty: bool,
    pub ignore_soc_reward: bool,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            cost_mul: 1.0,
            cost_exp: 1.0,
            overloading_coef: 1.0,
            invalid_action_coef: 0.1,
            overcharging_coef: 0.05,
            target_soc_bonus: 1.0,
            ignore_price_reward: false,
            ignore_overloading_penalty: false,
            ignore_invalid_penalty: false,
            ignore_overcharging_penalty: false,
            ignore_soc_reward: false,
        }
    }
}

/// Tariff derivation coefficients applied to the spot price.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TariffConfig {
    /// Additive markup on the spot price (currency/kWh)
    pub spot_markup: f64,
    /// Multiplicative factor on the spot price
    pub spot_mul: f64,
    /// Deduction from the spot price for fed-in energy (currency/kWh)
    pub feed_in_ded: f64,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            spot_markup: 0.05,
            spot_mul: 1.0,
            feed_in_ded: 0.1,
        }
    }
}

/// Bounded normal distribution parameters for one sampled quantity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundedNormal {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl BoundedNormal {
    pub fn new(mean: f64, std: f64, min: f64, max: f64) -> Self {
        Self { mean, std, min, max }
    }
}

/// Statistical trip parameters for one day class (weekday or weekend).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayStats {
    /// Departure hour of day
    pub departure_hour: BoundedNormal,
    /// Return hour of day
    pub return_hour: BoundedNormal,
    /// Round-trip distance (km)
    pub distance_km: BoundedNormal,
    /// Per-km consumption (kWh/km)
    pub consumption_kwh_per_km: BoundedNormal,
}

/// Schedule generation parameters; `custom_weekday`/`custom_weekend` override
/// the built-in commuter defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub custom_weekday: Option<DayStats>,
    pub custom_weekend: Option<DayStats>,
    /// Hard cap on a single trip's energy (kWh), a range/charge limit
    pub max_trip_consumption_kwh: f64,
    /// SoC reserve a trip may never dip into, fraction of usable capacity
    pub min_reserve_soc: f64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            custom_weekday: None,
            custom_weekend: None,
            max_trip_consumption_kwh: 50.0,
            min_reserve_soc: 0.05,
        }
    }
}

impl ScheduleConfig {
    /// Built-in weekday commuter profile
    pub fn default_weekday() -> DayStats {
        DayStats {
            departure_hour: BoundedNormal::new(7.5, 1.0, 5.0, 11.0),
            return_hour: BoundedNormal::new(17.5, 1.5, 12.0, 23.0),
            distance_km: BoundedNormal::new(50.0, 15.0, 5.0, 200.0),
            consumption_kwh_per_km: BoundedNormal::new(0.18, 0.03, 0.1, 0.3),
        }
    }

    /// Built-in weekend profile: later departures, shorter trips
    pub fn default_weekend() -> DayStats {
        DayStats {
            departure_hour: BoundedNormal::new(10.0, 2.0, 6.0, 14.0),
            return_hour: BoundedNormal::new(18.0, 2.5, 14.5, 23.5),
            distance_km: BoundedNormal::new(35.0, 20.0, 5.0, 200.0),
            consumption_kwh_per_km: BoundedNormal::new(0.18, 0.03, 0.1, 0.3),
        }
    }

    pub fn weekday(&self) -> DayStats {
        self.custom_weekday.clone().unwrap_or_else(Self::default_weekday)
    }

    pub fn weekend(&self) -> DayStats {
        self.custom_weekend.clone().unwrap_or_else(Self::default_weekend)
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SimConfig {
    pub time: TimeConfig,
    pub fleet: FleetConfig,
    pub grid: GridConfig,
    pub degradation: DegradationConfig,
    pub reward: RewardConfig,
    pub tariff: TariffConfig,
    pub schedule: ScheduleConfig,
    /// RNG seed; omitting it makes schedule generation and random episode
    /// placement non-reproducible by design
    pub seed: Option<u64>,
}

impl SimConfig {
    /// Load configuration from `config/default.toml` merged with
    /// `EVFLEET__`-prefixed environment variables.
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("EVFLEET__").split("__"));
        let cfg: SimConfig = figment.extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Wall-clock anchor for step 0 of the data horizon. Schedules and market
    /// series are both laid out against this origin.
    pub fn simulation_origin() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid hardcoded origin")
    }

    /// Fatal construction-time validation.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.time.time_steps_per_hour == 0 {
            return Err(SimError::configuration("time_steps_per_hour must be positive"));
        }
        if self.time.episode_length == 0 {
            return Err(SimError::configuration("episode_length must be positive"));
        }
        if self.fleet.n_vehicles == 0 {
            return Err(SimError::configuration("fleet must contain at least one vehicle"));
        }
        if self.fleet.init_battery_cap <= 0.0 {
            return Err(SimError::configuration(format!(
                "init_battery_cap must be positive, got {}",
                self.fleet.init_battery_cap
            )));
        }
        if self.fleet.obc_max_power <= 0.0 || self.fleet.charger_power <= 0.0 {
            return Err(SimError::configuration("charger powers must be positive"));
        }
        for (name, eff) in [
            ("charging_eff", self.fleet.charging_eff),
            ("discharging_eff", self.fleet.discharging_eff),
        ] {
            if !(eff > 0.0 && eff <= 1.0) {
                return Err(SimError::configuration(format!(
                    "{name} must be in (0, 1], got {eff}"
                )));
            }
        }
        if !(self.fleet.target_soc > 0.0 && self.fleet.target_soc <= 1.0) {
            return Err(SimError::configuration(format!(
                "target_soc must be in (0, 1], got {}",
                self.fleet.target_soc
            )));
        }
        if !(0.0..=1.0).contains(&self.fleet.init_soc) {
            return Err(SimError::configuration("init_soc must be in [0, 1]"));
        }
        if self.fleet.min_laxity < 0.0 {
            return Err(SimError::configuration("min_laxity must be non-negative"));
        }
        if self.grid.grid_connection_kw <= 0.0 {
            return Err(SimError::configuration("grid_connection_kw must be positive"));
        }
        if !(self.degradation.init_soh > 0.0 && self.degradation.init_soh <= 1.0) {
            return Err(SimError::configuration(format!(
                "init_soh must be in (0, 1], got {}",
                self.degradation.init_soh
            )));
        }
        if !(0.0..1.0).contains(&self.degradation.soh_floor) {
            return Err(SimError::configuration("soh_floor must be in [0, 1)"));
        }
        if self.reward.cost_exp <= 0.0 {
            return Err(SimError::configuration("cost_exp must be positive"));
        }
        if !(0.0..1.0).contains(&self.schedule.min_reserve_soc) {
            return Err(SimError::configuration("min_reserve_soc must be in [0, 1)"));
        }
        if self.schedule.max_trip_consumption_kwh <= 0.0 {
            return Err(SimError::configuration("max_trip_consumption_kwh must be positive"));
        }
        for (label, stats) in [
            ("weekday", self.schedule.weekday()),
            ("weekend", self.schedule.weekend()),
        ] {
            for (name, b) in [
                ("departure_hour", stats.departure_hour),
                ("return_hour", stats.return_hour),
                ("distance_km", stats.distance_km),
                ("consumption_kwh_per_km", stats.consumption_kwh_per_km),
            ] {
                if b.std < 0.0 || !b.std.is_finite() {
                    return Err(SimError::configuration(format!(
                        "{label}.{name}: std must be finite and non-negative"
                    )));
                }
                if b.min > b.max {
                    return Err(SimError::configuration(format!(
                        "{label}.{name}: inverted bounds [{}, {}]",
                        b.min, b.max
                    )));
                }
            }
        }
        Ok(())
    }
}
