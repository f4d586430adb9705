//! # Market & Load Time Series
//!
//! Aligns external price, building-load and PV series to the simulation's
//! fixed resolution and exposes per-step values plus fixed-length lookahead
//! windows. Tariffs are derived from the spot price unless supplied
//! explicitly.

pub mod provider;

pub use provider::{MarketContext, RawSeries, TimeSeriesProvider};
