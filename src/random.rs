//! Random sources for the simulation.
//!
//! Every random decision in the engine and the tick driver is a single
//! uniform draw from `[0, 1)`. [`UniformSource`] is implemented for every
//! [`rand::RngCore`], so a seeded `StdRng` or `thread_rng()` can be passed
//! directly. [`ScriptedSource`] replays a fixed sequence of draws, which
//! lets tests force a specific branch of the decision procedure.

use rand::{Rng, RngCore};
use std::collections::VecDeque;

/// A source of independent uniform draws in `[0, 1)`.
pub trait UniformSource {
    /// Next uniform draw in `[0, 1)`.
    fn next_uniform(&mut self) -> f64;

    /// Symmetric random step in `(-magnitude, magnitude)`.
    fn walk_step(&mut self, magnitude: f64) -> f64 {
        (self.next_uniform() * 2.0 - 1.0) * magnitude
    }

    /// Bernoulli trial succeeding when the draw is below `probability`.
    fn chance(&mut self, probability: f64) -> bool {
        self.next_uniform() < probability
    }
}

impl<R: RngCore + ?Sized> UniformSource for R {
    fn next_uniform(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

/// Replays a fixed sequence of draws.
///
/// Panics when exhausted, so a test that consumes more draws than it
/// scripted fails loudly instead of silently wrapping.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    draws: VecDeque<f64>,
    consumed: usize,
}

impl ScriptedSource {
    /// Create a source replaying `draws` in order.
    pub fn new(draws: impl IntoIterator<Item = f64>) -> Self {
        Self {
            draws: draws.into_iter().collect(),
            consumed: 0,
        }
    }

    /// Append more draws to the end of the script.
    pub fn extend(&mut self, draws: impl IntoIterator<Item = f64>) {
        self.draws.extend(draws);
    }

    /// Number of draws not yet consumed.
    pub fn remaining(&self) -> usize {
        self.draws.len()
    }

    /// Number of draws consumed so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }
}

impl UniformSource for ScriptedSource {
    fn next_uniform(&mut self) -> f64 {
        match self.draws.pop_front() {
            Some(draw) => {
                self.consumed += 1;
                draw
            }
            None => panic!(
                "scripted random source exhausted after {} draws",
                self.consumed
            ),
        }
    }
}
