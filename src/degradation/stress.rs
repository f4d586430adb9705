//! Stress-based aging: calendar fade plus cyclic fade.
//!
//! Calendar fade runs whenever time passes, scaled by temperature (doubling
//! behavior above 25°C controlled by the sensitivity coefficient) and by the
//! SoC the pack rests at (storage near full ages faster). Cyclic fade scales
//! with throughput, weighted by the step's depth of discharge so that deep
//! swings cost more than shallow ones at equal energy moved.

use super::{DegradationModel, StressContext};

const REFERENCE_TEMP_C: f64 = 25.0;

#[derive(Debug, Clone, Copy)]
pub struct StressDegradation {
    calendar_fade_per_day: f64,
    calendar_temp_sensitivity: f64,
    cyclic_fade_per_efc: f64,
}

impl StressDegradation {
    pub fn new(
        calendar_fade_per_day: f64,
        calendar_temp_sensitivity: f64,
        cyclic_fade_per_efc: f64,
    ) -> Self {
        Self {
            calendar_fade_per_day,
            calendar_temp_sensitivity,
            cyclic_fade_per_efc,
        }
    }

    /// Calendar component: active even while idle.
    fn calendar(&self, ctx: &StressContext) -> f64 {
        let days = ctx.dt_hours / 24.0;
        let temp_factor =
            (self.calendar_temp_sensitivity * (ctx.ambient_temp_c - REFERENCE_TEMP_C) / 10.0).exp();
        // resting near full charge stresses the anode; scale 0.4..1.0 over SoC
        let rest_soc = 0.5 * (ctx.soc_before + ctx.soc_after);
        let soc_factor = 0.4 + 0.6 * rest_soc;
        self.calendar_fade_per_day * temp_factor * soc_factor * days
    }

    /// Cyclic component: throughput weighted by depth of discharge.
    fn cyclic(&self, ctx: &StressContext) -> f64 {
        if ctx.capacity_kwh <= 0.0 {
            return 0.0;
        }
        let efc = ctx.throughput_kwh / (2.0 * ctx.capacity_kwh);
        let dod = (ctx.soc_after - ctx.soc_before).abs();
        // shallow cycles are cheaper than one deep cycle of equal throughput
        let dod_factor = 0.5 + 0.5 * dod;
        self.cyclic_fade_per_efc * dod_factor * efc
    }
}

impl DegradationModel for StressDegradation {
    fn step_decrement(&self, ctx: &StressContext) -> f64 {
        if ctx.dt_hours <= 0.0 {
            return 0.0;
        }
        (self.calendar(ctx) + self.cyclic(ctx)).max(0.0)
    }
}
