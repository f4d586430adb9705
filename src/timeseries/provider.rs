//! Uniform resampling of raw time-indexed series and lookahead access.
//!
//! Lookahead end-of-data policy: episode placement is validated up front
//! (see [`MarketContext::covers`]), so every window inside an accepted
//! episode is always full. Windows are never wrapped, truncated or
//! zero-filled.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TariffConfig;
use crate::error::SimError;

/// A raw time-indexed series at arbitrary native resolution.
/// Timestamps must be strictly increasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSeries {
    pub timestamps: Vec<NaiveDateTime>,
    pub values: Vec<f64>,
}

impl RawSeries {
    pub fn new(timestamps: Vec<NaiveDateTime>, values: Vec<f64>) -> Result<Self, SimError> {
        if timestamps.len() != values.len() {
            return Err(SimError::data_alignment(format!(
                "series length mismatch: {} timestamps vs {} values",
                timestamps.len(),
                values.len()
            )));
        }
        if timestamps.is_empty() {
            return Err(SimError::data_alignment("empty series"));
        }
        if timestamps.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SimError::data_alignment("timestamps must be strictly increasing"));
        }
        Ok(Self { timestamps, values })
    }

    /// Resample onto a uniform grid of `n` steps of `dt` starting at `start`.
    ///
    /// Raw points finer than the grid are averaged per bin; coarser points are
    /// forward-filled. A grid point before the first raw timestamp means the
    /// series does not cover the requested span.
    fn resample(&self, start: NaiveDateTime, dt: Duration, n: usize) -> Result<Vec<f64>, SimError> {
        let end = start + dt * n as i32;
        if start < self.timestamps[0] || end > *self.timestamps.last().expect("non-empty") + dt {
            return Err(SimError::data_alignment(format!(
                "series covers [{} .. {}] but [{} .. {}] was requested",
                self.timestamps[0],
                self.timestamps.last().expect("non-empty"),
                start,
                end
            )));
        }

        let mut out = Vec::with_capacity(n);
        let mut cursor = 0usize;
        for i in 0..n {
            let bin_start = start + dt * i as i32;
            let bin_end = bin_start + dt;

            // advance to the last raw point at or before bin_start
            while cursor + 1 < self.timestamps.len() && self.timestamps[cursor + 1] <= bin_start {
                cursor += 1;
            }

            // average raw points inside the bin; forward-fill otherwise
            let mut sum = 0.0;
            let mut count = 0usize;
            let mut j = cursor;
            while j < self.timestamps.len() && self.timestamps[j] < bin_end {
                if self.timestamps[j] >= bin_start {
                    sum += self.values[j];
                    count += 1;
                }
                j += 1;
            }
            if count > 0 {
                out.push(sum / count as f64);
            } else {
                out.push(self.values[cursor]);
            }
        }
        Ok(out)
    }
}

/// Uniformly-sampled market and load context, read-only and shared by every
/// vehicle in a timestep. Identical across all engine replicas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketContext {
    /// Wall-clock timestamp of step 0
    pub start: NaiveDateTime,
    pub steps_per_hour: u32,
    pub spot_price: Vec<f64>,
    pub buy_tariff: Vec<f64>,
    pub feed_in_tariff: Vec<f64>,
    pub building_load_kw: Vec<f64>,
    pub pv_generation_kw: Vec<f64>,
}

impl MarketContext {
    pub fn len(&self) -> usize {
        self.spot_price.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spot_price.is_empty()
    }

    /// Whether steps `[start_step, start_step + span)` are covered.
    pub fn covers(&self, start_step: usize, span: usize) -> bool {
        start_step + span <= self.len()
    }

    pub fn price_window(&self, step: usize, horizon: usize) -> &[f64] {
        &self.buy_tariff[step..step + horizon]
    }

    pub fn load_window(&self, step: usize, horizon: usize) -> &[f64] {
        &self.building_load_kw[step..step + horizon]
    }

    pub fn pv_window(&self, step: usize, horizon: usize) -> &[f64] {
        &self.pv_generation_kw[step..step + horizon]
    }

    /// Hour of day (fractional) at a step.
    pub fn hour_of_day(&self, step: usize) -> f64 {
        let minutes = step as i64 * 60 / self.steps_per_hour as i64;
        let t = self.start + Duration::minutes(minutes);
        use chrono::Timelike;
        t.time().hour() as f64 + t.time().minute() as f64 / 60.0
    }

    /// Weekday index at a step (Mon = 0).
    pub fn weekday(&self, step: usize) -> u32 {
        let minutes = step as i64 * 60 / self.steps_per_hour as i64;
        let t = self.start + Duration::minutes(minutes);
        use chrono::Datelike;
        t.weekday().num_days_from_monday()
    }

    /// Synthetic context: flat spot price, zero building load and PV.
    /// Useful for benchmarks and tests where economics must be transparent.
    pub fn flat(
        start: NaiveDateTime,
        steps_per_hour: u32,
        n_steps: usize,
        spot_price: f64,
        tariff: &TariffConfig,
    ) -> Self {
        let spot = vec![spot_price; n_steps];
        let (buy, feed) = derive_tariffs(&spot, tariff);
        Self {
            start,
            steps_per_hour,
            spot_price: spot,
            buy_tariff: buy,
            feed_in_tariff: feed,
            building_load_kw: vec![0.0; n_steps],
            pv_generation_kw: vec![0.0; n_steps],
        }
    }

    /// Synthetic context with a daily price/load/PV shape: cheap nights,
    /// expensive evenings, midday PV bell.
    pub fn synthetic_daily(
        start: NaiveDateTime,
        steps_per_hour: u32,
        days: usize,
        base_price: f64,
        base_load_kw: f64,
        pv_peak_kw: f64,
        tariff: &TariffConfig,
    ) -> Self {
        let n_steps = days * 24 * steps_per_hour as usize;
        let mut spot = Vec::with_capacity(n_steps);
        let mut load = Vec::with_capacity(n_steps);
        let mut pv = Vec::with_capacity(n_steps);
        for step in 0..n_steps {
            let hour = (step / steps_per_hour as usize) % 24;
            let h = hour as f64;
            // evening peak around 19:00, cheap early morning
            let price_shape = 1.0 + 0.4 * (std::f64::consts::TAU * (h - 7.0) / 24.0).sin();
            spot.push(base_price * price_shape);
            let load_shape = 0.6 + 0.4 * (std::f64::consts::TAU * (h - 6.0) / 24.0).sin();
            load.push(base_load_kw * load_shape);
            // PV bell between 06:00 and 18:00
            let pv_kw = if (6.0..18.0).contains(&h) {
                pv_peak_kw * (std::f64::consts::PI * (h - 6.0) / 12.0).sin()
            } else {
                0.0
            };
            pv.push(pv_kw.max(0.0));
        }
        let (buy, feed) = derive_tariffs(&spot, tariff);
        Self {
            start,
            steps_per_hour,
            spot_price: spot,
            buy_tariff: buy,
            feed_in_tariff: feed,
            building_load_kw: load,
            pv_generation_kw: pv,
        }
    }
}

fn derive_tariffs(spot: &[f64], tariff: &TariffConfig) -> (Vec<f64>, Vec<f64>) {
    let buy = spot
        .iter()
        .map(|p| p * tariff.spot_mul + tariff.spot_markup)
        .collect();
    let feed = spot
        .iter()
        .map(|p| (p - tariff.feed_in_ded).max(0.0))
        .collect();
    (buy, feed)
}

/// Builder that aligns raw series onto the simulation grid.
///
/// The spot price series is required; building load and PV default to zero
/// when absent, and tariffs are derived from the spot price unless an
/// explicit buy/feed-in pair is supplied.
pub struct TimeSeriesProvider {
    start: NaiveDateTime,
    steps_per_hour: u32,
    n_steps: usize,
    spot: Option<RawSeries>,
    buy: Option<RawSeries>,
    feed_in: Option<RawSeries>,
    building_load: Option<RawSeries>,
    pv: Option<RawSeries>,
}

impl TimeSeriesProvider {
    pub fn new(start: NaiveDateTime, steps_per_hour: u32, n_steps: usize) -> Self {
        Self {
            start,
            steps_per_hour,
            n_steps,
            spot: None,
            buy: None,
            feed_in: None,
            building_load: None,
            pv: None,
        }
    }

    pub fn with_spot_price(mut self, series: RawSeries) -> Self {
        self.spot = Some(series);
        self
    }

    /// Explicit tariff pair; overrides derivation from the spot price.
    pub fn with_tariffs(mut self, buy: RawSeries, feed_in: RawSeries) -> Self {
        self.buy = Some(buy);
        self.feed_in = Some(feed_in);
        self
    }

    pub fn with_building_load(mut self, series: RawSeries) -> Self {
        self.building_load = Some(series);
        self
    }

    pub fn with_pv_generation(mut self, series: RawSeries) -> Self {
        self.pv = Some(series);
        self
    }

    pub fn build(self, tariff: &TariffConfig) -> Result<MarketContext, SimError> {
        let dt = Duration::minutes(60 / self.steps_per_hour as i64);
        let spot_raw = self
            .spot
            .ok_or_else(|| SimError::data_alignment("spot price series is required"))?;
        let spot = spot_raw.resample(self.start, dt, self.n_steps)?;

        let (buy_tariff, feed_in_tariff) = match (self.buy, self.feed_in) {
            (Some(b), Some(f)) => (
                b.resample(self.start, dt, self.n_steps)?,
                f.resample(self.start, dt, self.n_steps)?,
            ),
            _ => derive_tariffs(&spot, tariff),
        };

        let building_load_kw = match self.building_load {
            Some(s) => s.resample(self.start, dt, self.n_steps)?,
            None => vec![0.0; self.n_steps],
        };
        let pv_generation_kw = match self.pv {
            Some(s) => s.resample(self.start, dt, self.n_steps)?,
            None => vec![0.0; self.n_steps],
        };

        debug!(
            steps = self.n_steps,
            steps_per_hour = self.steps_per_hour,
            "market context built"
        );

        Ok(MarketContext {
            start: self.start,
            steps_per_hour: self.steps_per_hour,
            spot_price: spot,
            buy_tariff,
            feed_in_tariff,
            building_load_kw,
            pv_generation_kw,
        })
    }
}
