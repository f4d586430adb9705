//! Adapter for actions produced outside the core (an RL policy).
//!
//! The learner pushes action vectors; `decide` replays them in order and
//! falls back to zeros when the queue runs dry.

use std::collections::VecDeque;

use tracing::warn;

use crate::engine::Observation;

use super::ChargingStrategy;

#[derive(Default)]
pub struct ExternalPolicy {
    queue: VecDeque<Vec<f64>>,
}

impl ExternalPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_action(&mut self, actions: Vec<f64>) {
        self.queue.push_back(actions);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl ChargingStrategy for ExternalPolicy {
    fn name(&self) -> &'static str {
        "external"
    }

    fn decide(&mut self, observation: &Observation) -> Vec<f64> {
        match self.queue.pop_front() {
            Some(actions) => actions,
            None => {
                warn!(step = observation.episode_step, "external policy starved, idling fleet");
                vec![0.0; observation.vehicles.len()]
            }
        }
    }
}
