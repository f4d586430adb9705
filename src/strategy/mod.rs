//! # Charging Strategies
//!
//! A charging strategy consumes the current observation and emits one
//! normalized action per vehicle in [-1, 1]. Strategies are stateless across
//! calls except where a committed multi-step plan is required
//! ([`LinearOptimization`]).
//!
//! Variants: [`Uncontrolled`] (max power whenever below target),
//! [`Distributed`] (minimum constant power meeting the departure deadline),
//! [`NightWindow`] (max power inside a clock window), [`LinearOptimization`]
//! (perfect-foresight LP benchmark), and [`ExternalPolicy`] (actions injected
//! by an outside learner).

pub mod distributed;
pub mod external;
pub mod linopt;
pub mod night;
pub mod uncontrolled;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::config::SimConfig;
use crate::engine::{EpisodeContext, Observation};
use crate::error::SimError;

pub use distributed::Distributed;
pub use external::ExternalPolicy;
pub use linopt::LinearOptimization;
pub use night::NightWindow;
pub use uncontrolled::Uncontrolled;

/// A charging policy driving the simulation engine.
pub trait ChargingStrategy {
    fn name(&self) -> &'static str;

    /// Called once per episode before the first `decide`. Strategies that
    /// commit a multi-step plan solve here; infeasibility of the LP benchmark
    /// is reported from this hook.
    fn begin_episode(&mut self, _ctx: &EpisodeContext) -> Result<(), SimError> {
        Ok(())
    }

    /// One normalized action per vehicle for the current observation.
    fn decide(&mut self, observation: &Observation) -> Vec<f64>;

    /// Ask the strategy to relax its hard constraints after an infeasible
    /// episode. Returns whether a relaxation was applied (so the caller may
    /// retry `begin_episode`).
    fn relax_target(&mut self) -> bool {
        false
    }
}

/// Strategy selection tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Uncontrolled,
    Distributed,
    NightWindow,
    LinearOptimization,
}

impl StrategyKind {
    /// Build the strategy with parameters taken from the simulation config.
    pub fn build(self, config: &SimConfig) -> Box<dyn ChargingStrategy> {
        match self {
            StrategyKind::Uncontrolled => Box::new(Uncontrolled::new(config.fleet.target_soc)),
            StrategyKind::Distributed => Box::new(Distributed::new(config.fleet.clone())),
            StrategyKind::NightWindow => {
                Box::new(NightWindow::new(config.fleet.target_soc, 1.0, 5.0))
            }
            StrategyKind::LinearOptimization => Box::new(LinearOptimization::new()),
        }
    }
}
